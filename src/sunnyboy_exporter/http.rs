// sunnyboy_exporter - Prometheus metrics exporter for SMA Sunny Boy inverters
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use crate::exporter::SunnyBoyExporter;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

const TEXT_FORMAT: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";
const RESERVED_PATHS: &[&str] = &["/", "/-/healthy", "/-/ready"];

/// Shared state for every HTTP request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    exporter: Arc<SunnyBoyExporter>,
    metrics_path: String,
}

impl RequestContext {
    pub fn new(exporter: Arc<SunnyBoyExporter>, metrics_path: &str) -> Self {
        RequestContext {
            exporter,
            metrics_path: metrics_path.to_owned(),
        }
    }
}

/// Return an error if `path` can't be used to serve metrics because it's not absolute
/// or collides with one of the other routes.
pub fn check_metrics_path(path: &str) -> Result<(), String> {
    if !path.starts_with('/') {
        return Err(format!("metrics path {} must start with '/'", path));
    }

    if RESERVED_PATHS.contains(&path) {
        return Err(format!("metrics path {} is reserved", path));
    }

    Ok(())
}

/// Build the router serving metrics, health checks, and a landing page.
pub fn app(context: RequestContext) -> Router {
    let metrics_path = context.metrics_path.clone();

    Router::new()
        .route(&metrics_path, get(text_metrics))
        .route("/", get(index))
        .route("/-/healthy", get(ok))
        .route("/-/ready", get(ok))
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

async fn text_metrics(State(context): State<RequestContext>) -> Response {
    match context.exporter.gather().await {
        Ok(buf) => {
            tracing::debug!(message = "encoded metrics to text format", num_bytes = buf.len());
            ([(CONTENT_TYPE, TEXT_FORMAT)], buf).into_response()
        }
        Err(e) => {
            tracing::error!(message = "error encoding metrics", error = %e);
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

async fn index(State(context): State<RequestContext>) -> Html<String> {
    Html(format!(
        "<html>\n\
         <head><title>Sunny Boy Exporter</title></head>\n\
         <body>\n\
         <h1>Sunny Boy Exporter</h1>\n\
         <p><a href='{}'>Metrics</a></p>\n\
         </body>\n\
         </html>\n",
        context.metrics_path
    ))
}

async fn ok() -> &'static str {
    "OK"
}

#[cfg(test)]
mod test {
    use super::check_metrics_path;

    #[test]
    fn test_check_metrics_path() {
        assert!(check_metrics_path("/metrics").is_ok());
        assert!(check_metrics_path("/sma/metrics").is_ok());
        assert!(check_metrics_path("metrics").is_err());
        assert!(check_metrics_path("/").is_err());
        assert!(check_metrics_path("/-/ready").is_err());
    }
}
