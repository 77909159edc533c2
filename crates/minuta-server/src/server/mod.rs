//! Service internals: configuration, errors, the render backend pool, the
//! PDF renderer, and the HTTP boundary.

pub mod config;
pub mod error;
pub mod pool;
pub mod render;
pub mod service;
pub mod store;
pub mod telemetry;
