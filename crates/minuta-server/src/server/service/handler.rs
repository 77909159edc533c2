//! HTTP routes and handlers for the document generation service.
//!
//! ## Responsibilities
//!
//! - Resolve template ids against the store, mapping unknown ids to
//!   `template_not_found`.
//! - Serve form previews: the ordered placeholder names a client needs to
//!   build an input form.
//! - Merge caller values into templates and return either the resolved body
//!   (`/generate`) or rendered PDF bytes (`/render`).
//!
//! Every failure body carries a stable `kind` discriminator; PDF responses
//! suggest a filename derived from the template title.

use crate::server::error::{Error, Result};
use crate::server::pool::manager::{BrowserPool, PoolStats};
use crate::server::render::supervisor::RenderSupervisor;
use crate::server::store::TemplateStore;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use minuta::{Template, TemplateId, ValueMap, extract, substitute};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for all handlers.
pub struct AppState {
    pub store: Arc<dyn TemplateStore>,
    pub supervisor: Arc<RenderSupervisor>,
    pub pool: BrowserPool,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/documents/{id}", get(template_detail))
        .route("/documents/{id}/form", get(form_preview))
        .route("/documents/{id}/generate", post(generate))
        .route("/documents/{id}/render", post(render))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    pool: PoolStats,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        pool: state.pool.stats(),
    })
}

async fn template_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TemplateId>,
) -> Result<Json<Template>> {
    let template = state.store.fetch(id).ok_or(Error::TemplateNotFound { id })?;
    Ok(Json(template))
}

/// Everything a client needs to build an input form for a template.
#[derive(Serialize)]
struct FormPreview {
    id: TemplateId,
    title: String,
    /// Unique placeholder names in first-seen order.
    placeholders: Vec<String>,
    body: String,
}

async fn form_preview(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TemplateId>,
) -> Result<Json<FormPreview>> {
    let template = state.store.fetch(id).ok_or(Error::TemplateNotFound { id })?;
    let placeholders = extract(&template.body);
    Ok(Json(FormPreview {
        id: template.id,
        title: template.title,
        placeholders,
        body: template.body,
    }))
}

#[derive(Serialize)]
struct GeneratedDocument {
    generated_content: String,
}

/// Merges values into the template and returns the resolved body as JSON,
/// without rendering.
async fn generate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TemplateId>,
    Json(values): Json<ValueMap>,
) -> Result<Json<GeneratedDocument>> {
    let template = state.store.fetch(id).ok_or(Error::TemplateNotFound { id })?;
    Ok(Json(GeneratedDocument {
        generated_content: substitute(&template.body, &values),
    }))
}

/// Merges values into the template, renders to PDF, and streams the bytes.
async fn render(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TemplateId>,
    Json(values): Json<ValueMap>,
) -> Result<Response> {
    let template = state.store.fetch(id).ok_or(Error::TemplateNotFound { id })?;
    let resolved = substitute(&template.body, &values);
    let bytes = state.supervisor.render(resolved).await?;

    let filename = suggested_filename(&template.title);
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_owned()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
    ];
    Ok((headers, bytes).into_response())
}

/// Filename suggested to the client: the template title with whitespace runs
/// normalized to `-` (quotes stripped to keep the header value well-formed).
fn suggested_filename(title: &str) -> String {
    let stem = title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .replace('"', "");
    if stem.is_empty() {
        "documento.pdf".to_owned()
    } else {
        format!("{stem}.pdf")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_normalize_title_whitespace() {
        assert_eq!(
            suggested_filename("Contrato de Prestação"),
            "Contrato-de-Prestação.pdf"
        );
        assert_eq!(suggested_filename("  Recibo\t2026  "), "Recibo-2026.pdf");
        assert_eq!(suggested_filename("Laudo \"final\""), "Laudo-final.pdf");
        assert_eq!(suggested_filename(""), "documento.pdf");
    }
}
