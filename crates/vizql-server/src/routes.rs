//! HTTP surface: chart data queries, the full render pipeline, and chart
//! agent output intake.
//!
//! Validation failures answer 400 and never reach the query layer;
//! execution failures answer 500 with a generic message and the driver
//! detail attached separately.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use vizql_duck::{ExecutionError, Pool, QueryResult};
use vizql_render::RendererRegistry;
use vizql_spec::{ChartSpec, Row};
use vizql_sql::CompileError;
use vizql_transform::TransformError;

use crate::agent::{self, AgentError, ChartRequest};
use crate::fetch::LatestFetch;

pub struct AppState {
    pub pool: Pool,
    pub registry: RendererRegistry,
    /// Most recent rendered chart, guarded against out-of-order fetches.
    pub latest_render: LatestFetch<String>,
}

impl AppState {
    pub fn new(pool: Pool, registry: RendererRegistry) -> Self {
        Self {
            pool,
            registry,
            latest_render: LatestFetch::new(),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chart", post(chart_data))
        .route("/api/chart/render", post(chart_render))
        .route("/api/chart/latest", get(latest_chart))
        .route("/api/agent/chart", post(agent_chart))
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("query failed")]
    Execution(#[from] ExecutionError),
}

impl From<CompileError> for ApiError {
    fn from(err: CompileError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<TransformError> for ApiError {
    fn from(err: TransformError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            ApiError::Validation(message) => {
                (StatusCode::BAD_REQUEST, message.clone(), None)
            }
            ApiError::Execution(source) => {
                error!(error = %source, "chart query failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "query failed".to_string(),
                    Some(source.to_string()),
                )
            }
        };
        let body = ErrorBody {
            success: false,
            error,
            details,
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ChartDataResponse {
    pub success: bool,
    pub data: Vec<Row>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderResponse {
    pub success: bool,
    pub svg: String,
    pub row_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct AgentChartBody {
    pub output: String,
}

async fn health() -> &'static str {
    "ok"
}

/// POST /api/chart - compile and execute a chart data request, returning
/// raw rows.
async fn chart_data(
    State(state): State<Arc<AppState>>,
    Json(spec): Json<ChartSpec>,
) -> Result<Json<ChartDataResponse>, ApiError> {
    let result = run_query(&state, &spec).await?;
    Ok(Json(ChartDataResponse {
        success: true,
        data: result.rows,
    }))
}

/// POST /api/chart/render - full pipeline: compile, execute, transform,
/// render to SVG.
async fn chart_render(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChartRequest>,
) -> Result<Json<RenderResponse>, ApiError> {
    request.validate()?;
    render_request(&state, request).await
}

/// POST /api/agent/chart - raw chart-agent text in, rendered chart out.
async fn agent_chart(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AgentChartBody>,
) -> Result<Json<RenderResponse>, ApiError> {
    let request = agent::parse_agent_output(&body.output)?;
    render_request(&state, request).await
}

async fn run_query(state: &AppState, spec: &ChartSpec) -> Result<QueryResult, ApiError> {
    let query_id = Uuid::new_v4();
    let sql = vizql_sql::compile(spec)?;
    debug!(%query_id, fingerprint = %spec.fingerprint(), sql = %sql, "compiled chart query");

    let conn = state.pool.acquire().await?;
    let result = conn.query(&sql)?;
    info!(%query_id, rows = result.row_count(), "chart query executed");
    Ok(result)
}

/// GET /api/chart/latest - the most recently rendered chart, if any.
async fn latest_chart(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RenderResponse>, ApiError> {
    match state.latest_render.latest().await {
        Some(svg) => Ok(Json(RenderResponse {
            success: true,
            svg,
            row_count: 0,
        })),
        None => Err(ApiError::Validation("no chart rendered yet".to_string())),
    }
}

async fn render_request(
    state: &AppState,
    request: ChartRequest,
) -> Result<Json<RenderResponse>, ApiError> {
    // Generation token: a render that finishes after a newer one started
    // must not become "latest".
    let token = state.latest_render.begin();

    let spec = request.to_spec();
    let result = run_query(state, &spec).await?;
    let processed =
        vizql_transform::transform(&result.rows, &spec, request.chart_type, &request.config)?;
    let svg = state
        .registry
        .render(request.chart_type.as_str(), &processed, &request.config);

    state.latest_render.complete(token, svg.clone()).await;
    Ok(Json(RenderResponse {
        success: true,
        svg,
        row_count: result.row_count(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vizql_spec::FieldMapping;

    async fn seeded_state() -> Arc<AppState> {
        let pool = Pool::open(None, 1, Duration::from_secs(5)).expect("pool");
        {
            let conn = pool.acquire().await.expect("conn");
            conn.execute_batch(
                "CREATE TABLE sales (month VARCHAR, revenue DOUBLE, region VARCHAR);
                 INSERT INTO sales VALUES
                   ('Jan', 100.0, 'EU'), ('Jan', 80.0, 'US'), ('Feb', 60.0, 'EU');",
            )
            .expect("seed");
        }
        Arc::new(AppState::new(pool, RendererRegistry::with_builtins()))
    }

    fn spec() -> ChartSpec {
        let mut spec = ChartSpec::for_table("sales");
        spec.dimensions.push(FieldMapping::new("month", "Month"));
        spec.measures.push(FieldMapping::new("revenue", "Revenue"));
        spec
    }

    #[tokio::test]
    async fn test_chart_data_returns_rows() {
        let state = seeded_state().await;
        let response = chart_data(State(state), Json(spec())).await.expect("ok");
        assert!(response.0.success);
        assert_eq!(response.0.data.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_spec_is_validation_error() {
        let state = seeded_state().await;
        let mut bad = spec();
        bad.table = "sales; DROP TABLE sales".to_string();
        match chart_data(State(state), Json(bad)).await {
            Err(ApiError::Validation(_)) => {}
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_table_is_execution_error() {
        let state = seeded_state().await;
        let mut bad = spec();
        bad.table = "missing_table".to_string();
        match chart_data(State(state), Json(bad)).await {
            Err(ApiError::Execution(_)) => {}
            other => panic!("expected execution error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_agent_chart_renders_svg() {
        let state = seeded_state().await;
        let output = r#"Here you go:
```json
{
  "type": "bar",
  "dataSource": {"table": "sales", "field": ["month", "revenue"]},
  "dimensions": [{"field": "month", "name": "Month"}],
  "measures": [{"field": "revenue", "name": "Revenue"}],
  "config": {"title": "Revenue by Month"}
}
```"#;
        let response = agent_chart(
            State(state),
            Json(AgentChartBody {
                output: output.to_string(),
            }),
        )
        .await
        .expect("ok");
        assert!(response.0.success);
        assert!(response.0.svg.starts_with("<svg"));
        assert!(response.0.svg.contains("Revenue by Month"));
        assert_eq!(response.0.row_count, 2);
    }

    #[tokio::test]
    async fn test_latest_chart_tracks_last_render() {
        let state = seeded_state().await;
        match latest_chart(State(state.clone())).await {
            Err(ApiError::Validation(_)) => {}
            other => panic!("expected validation error before any render, got {other:?}"),
        }

        let request: ChartRequest = serde_json::from_str(
            r#"{
                "type": "pie",
                "dataSource": {"table": "sales", "field": []},
                "dimensions": [{"field": "month", "name": "Month"}],
                "measures": [{"field": "revenue", "name": "Revenue"}],
                "config": {"title": "Share"}
            }"#,
        )
        .expect("request");
        let rendered = chart_render(State(state.clone()), Json(request))
            .await
            .expect("render");

        let latest = latest_chart(State(state)).await.expect("latest");
        assert_eq!(latest.0.svg, rendered.0.svg);
    }

    #[tokio::test]
    async fn test_agent_prose_is_rejected() {
        let state = seeded_state().await;
        let result = agent_chart(
            State(state),
            Json(AgentChartBody {
                output: "Sorry, I can't chart that.".to_string(),
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }
}
