//! HTTP surface for the file tree UI.
//!
//! - `GET /file-tree` - the whole customer → file hierarchy as JSON
//! - `GET /file?path=<location>[&download=1]` - one file out of the archive
//! - `GET /health` - liveness

use std::sync::Arc;

use axum::{
    extract::Query,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use axum_macros::debug_handler;
use serde::Deserialize;
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::abstract_server::{ArchiveStore, ErrorLayer, RowSource, ServerError};
use crate::file_format::file_tree::TreeStats;
use crate::hierarchy::HierarchyBuilder;

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::StickyProblem(details) => match details.layer {
                ErrorLayer::BadInput => StatusCode::BAD_REQUEST,
                ErrorLayer::ServerLayer | ErrorLayer::DataLayer => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ServerError::TransientProblem(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(kind = self.kind(), "{}", self);
        } else {
            warn!(kind = self.kind(), "{}", self);
        }
        let body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// Everything the handlers need, shared read-only between requests.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    rows: Box<dyn RowSource + Send + Sync>,
    archive: Box<dyn ArchiveStore + Send + Sync>,
    builder: HierarchyBuilder,
}

impl AppState {
    pub fn new(
        rows: Box<dyn RowSource + Send + Sync>,
        archive: Box<dyn ArchiveStore + Send + Sync>,
        builder: HierarchyBuilder,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                rows,
                archive,
                builder,
            }),
        }
    }
}

#[debug_handler]
async fn handle_file_tree(Extension(state): Extension<AppState>) -> Result<Response, ServerError> {
    let rows = state.inner.rows.fetch_rows().await?;
    let forest = state.inner.builder.build(&rows)?;

    let stats = TreeStats::of(&forest);
    info!(
        rows = rows.len(),
        customers = stats.customers,
        trials = stats.trials,
        files = stats.files,
        "built file tree"
    );

    // Pretty-printed because people do look at this endpoint in a browser.
    let body = serde_json::to_string_pretty(&forest)?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

#[derive(Debug, Deserialize)]
struct FileParams {
    path: Option<String>,
    download: Option<String>,
}

impl FileParams {
    fn wants_download(&self) -> bool {
        matches!(self.download.as_deref(), Some("1") | Some("true"))
    }
}

/// The last path segment, stripped of anything that would break out of the
/// quoted `filename` parameter.
fn download_filename(path: &str) -> String {
    let basename = path.rsplit('/').next().unwrap_or(path);
    basename
        .chars()
        .filter(|c| *c != '"' && *c != '\\' && !c.is_control())
        .collect()
}

#[debug_handler]
async fn handle_file(
    Extension(state): Extension<AppState>,
    Query(params): Query<FileParams>,
) -> Result<Response, ServerError> {
    let path = match &params.path {
        Some(path) => path,
        None => {
            return Err(ServerError::bad_input("No 'path' parameter, no file!"));
        }
    };

    let contents = state.inner.archive.fetch_file(path).await?;

    let mut header_map = HeaderMap::new();
    if params.wants_download() {
        header_map.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        let disposition = format!("attachment; filename=\"{}\"", download_filename(path));
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            header_map.insert(header::CONTENT_DISPOSITION, value);
        }
        return Ok((header_map, contents).into_response());
    }

    header_map.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    let text = String::from_utf8_lossy(&contents).into_owned();
    Ok((header_map, text).into_response())
}

async fn handle_health() -> &'static str {
    "OK"
}

/// Builds the router.  The UI is served from a different origin than this
/// API, hence the permissive CORS.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/file-tree", get(handle_file_tree))
        .route("/file", get(handle_file))
        .route("/health", get(handle_health))
        .layer(Extension(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstract_server::ErrorDetails;

    #[test]
    fn test_status_codes() {
        let details = |layer| ErrorDetails {
            layer,
            message: "x".to_string(),
        };
        assert_eq!(
            ServerError::StickyProblem(details(ErrorLayer::BadInput)).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::StickyProblem(details(ErrorLayer::DataLayer)).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServerError::TransientProblem(details(ErrorLayer::ServerLayer)).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ServerError::NotFound("a".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_download_filename() {
        assert_eq!(download_filename("t1/sim/out.log"), "out.log");
        assert_eq!(download_filename("plain.txt"), "plain.txt");
        assert_eq!(download_filename("a/we\"ird\\name"), "weirdname");
    }

    #[test]
    fn test_wants_download() {
        let params = |download: Option<&str>| FileParams {
            path: None,
            download: download.map(|d| d.to_string()),
        };
        assert!(params(Some("1")).wants_download());
        assert!(params(Some("true")).wants_download());
        assert!(!params(Some("0")).wants_download());
        assert!(!params(None).wants_download());
    }
}
