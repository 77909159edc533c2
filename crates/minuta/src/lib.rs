#![doc = include_str!("../README.md")]

mod placeholder;
mod substitute;
mod template;

pub use placeholder::extract;
pub use substitute::substitute;
pub use template::{Template, TemplateId, ValueMap};
