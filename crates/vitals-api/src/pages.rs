//! HTML index page.

use askama::Template;
use axum::extract::State;
use axum::response::Html;

use vitals_core::Metric;

use crate::ApiState;
use crate::error::ApiError;

struct MetricRow {
    id: String,
    kind: String,
    value: String,
}

impl MetricRow {
    fn from_metric(metric: &Metric) -> Self {
        Self {
            id: metric.id.clone(),
            kind: metric.kind.to_string(),
            value: metric.render_value().unwrap_or_default(),
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    rows: Vec<MetricRow>,
}

/// GET /
pub async fn index(State(state): State<ApiState>) -> Result<Html<String>, ApiError> {
    let metrics = state.store.list().await?;
    let page = IndexTemplate {
        rows: metrics.iter().map(MetricRow::from_metric).collect(),
    };
    Ok(Html(page.render().unwrap_or_else(|e| {
        format!("<pre>Template error: {e}</pre>")
    })))
}
