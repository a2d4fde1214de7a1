use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{
        Json, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::config::{
    DEFAULT_EQUITY_ALLOCATION, DEFAULT_LOAN_TERM_YEARS, DEFAULT_REGION, DEFAULT_ROOMS,
    MAX_LOAN_TERM_YEARS, ScenarioArgs, build_request,
};
use crate::core::{
    Assumptions, Comparison, ScenarioRequest, ScenarioState, Year, YearRange, compare,
};
use crate::data::ReferenceData;
use crate::error::SimulationError;

/// Shared, read-only state of every request.
#[derive(Clone)]
pub struct AppState {
    reference: Arc<ReferenceData>,
    assumptions: Assumptions,
}

impl AppState {
    pub fn new(reference: Arc<ReferenceData>) -> Self {
        Self {
            reference,
            assumptions: Assumptions::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ComparePayload {
    region: Option<String>,
    rooms: Option<String>,
    start_year: Option<Year>,
    loan_term: Option<u32>,
    equity_allocation: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    datasets: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScenarioDefaults {
    region: &'static str,
    rooms: &'static str,
    start_year: Option<Year>,
    loan_term: u32,
    equity_allocation: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OptionsResponse {
    regions: Vec<String>,
    room_categories: Vec<String>,
    available_years: Vec<Year>,
    max_loan_term: u32,
    defaults: ScenarioDefaults,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareResponse {
    state: ScenarioState,
    #[serde(flatten)]
    comparison: Comparison,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScenarioErrorResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<ScenarioState>,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    valid_range: Option<YearRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    price_years: Option<YearRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rent_years: Option<YearRange>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/options", get(options_handler))
        .route(
            "/api/compare",
            get(compare_get_handler).post(compare_post_handler),
        )
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(port: u16, reference: Arc<ReferenceData>) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = create_router(AppState::new(reference));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("comparison API listening on http://{addr}");
    tracing::info!("local access: http://127.0.0.1:{port}/api/options");

    axum::serve(listener, app).await
}

async fn health_handler(State(state): State<AppState>) -> Response {
    json_response(
        StatusCode::OK,
        HealthResponse {
            status: "ok",
            datasets: state.reference.dataset_count(),
        },
    )
}

async fn options_handler(State(state): State<AppState>) -> Response {
    json_response(StatusCode::OK, options_response(&state.reference))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn compare_get_handler(
    State(state): State<AppState>,
    payload: Result<Query<ComparePayload>, QueryRejection>,
) -> Response {
    match payload {
        Ok(Query(payload)) => compare_response(&state, payload),
        Err(rejection) => invalid_payload(rejection.body_text()),
    }
}

async fn compare_post_handler(
    State(state): State<AppState>,
    payload: Result<Json<ComparePayload>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(payload)) => compare_response(&state, payload),
        Err(rejection) => invalid_payload(rejection.body_text()),
    }
}

fn invalid_payload(detail: String) -> Response {
    let msg = format!("Invalid API payload: {detail}");
    tracing::warn!("{msg}");
    error_response(StatusCode::BAD_REQUEST, &msg)
}

fn options_response(reference: &ReferenceData) -> OptionsResponse {
    let available_years = reference.available_years();
    OptionsResponse {
        regions: reference.regions(),
        room_categories: reference.room_categories(),
        defaults: ScenarioDefaults {
            region: DEFAULT_REGION,
            rooms: DEFAULT_ROOMS,
            start_year: available_years.first().copied(),
            loan_term: DEFAULT_LOAN_TERM_YEARS,
            equity_allocation: DEFAULT_EQUITY_ALLOCATION,
        },
        available_years,
        max_loan_term: MAX_LOAN_TERM_YEARS,
    }
}

fn compare_response(state: &AppState, payload: ComparePayload) -> Response {
    let request = match api_request_from_payload(payload, state.reference.default_start_year()) {
        Ok(request) => request,
        Err(msg) => return invalid_payload(msg),
    };

    match compare(&state.reference, &request, &state.assumptions) {
        Ok(comparison) => json_response(
            StatusCode::OK,
            CompareResponse {
                state: ScenarioState::Ok,
                comparison,
            },
        ),
        Err(err) => simulation_error_response(&request, &err),
    }
}

fn simulation_error_response(request: &ScenarioRequest, err: &SimulationError) -> Response {
    if !err.is_recoverable() {
        tracing::error!(
            region = %request.region,
            rooms = %request.rooms,
            start_year = request.start_year,
            "comparison failed: {err}"
        );
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
    }

    tracing::warn!(
        region = %request.region,
        rooms = %request.rooms,
        start_year = request.start_year,
        "scenario rejected: {err}"
    );
    json_response(StatusCode::UNPROCESSABLE_ENTITY, scenario_error_body(err))
}

fn scenario_error_body(err: &SimulationError) -> ScenarioErrorResponse {
    let mut body = ScenarioErrorResponse {
        state: err.scenario_state(),
        error: err.to_string(),
        valid_range: None,
        price_years: None,
        rent_years: None,
    };
    match err {
        SimulationError::InvalidRange { valid, .. } => body.valid_range = Some(*valid),
        SimulationError::NoOverlap {
            price_years,
            rent_years,
        } => {
            body.price_years = *price_years;
            body.rent_years = *rent_years;
        }
        _ => {}
    }
    body
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(
    json: &str,
    default_start_year: Option<Year>,
) -> Result<ScenarioRequest, String> {
    let payload = serde_json::from_str::<ComparePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload, default_start_year)
}

fn api_request_from_payload(
    payload: ComparePayload,
    default_start_year: Option<Year>,
) -> Result<ScenarioRequest, String> {
    let mut args = ScenarioArgs::default();

    if let Some(v) = payload.region {
        args.region = v;
    }
    if let Some(v) = payload.rooms {
        args.rooms = v;
    }
    if let Some(v) = payload.start_year {
        args.start_year = Some(v);
    }
    if let Some(v) = payload.loan_term {
        args.loan_term = v;
    }
    if let Some(v) = payload.equity_allocation {
        args.equity_allocation = v;
    }

    build_request(args, default_start_year)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::sample_reference;
    use serde_json::Value;

    fn sample_state() -> AppState {
        AppState::new(Arc::new(sample_reference()))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[test]
    fn api_request_defaults_match_dashboard() {
        let request = api_request_from_json("{}", Some(1998)).expect("valid payload");
        assert_eq!(request.region, DEFAULT_REGION);
        assert_eq!(request.rooms, DEFAULT_ROOMS);
        assert_eq!(request.start_year, 1998);
        assert_eq!(request.loan_term_years, 25);
        assert_eq!(request.equity_allocation, 80.0);
    }

    #[test]
    fn api_request_reads_camel_case_fields() {
        let request = api_request_from_json(
            r#"{"region":"חיפה","rooms":"3-3.5","startYear":2005,"loanTerm":15,"equityAllocation":60}"#,
            Some(1998),
        )
        .expect("valid payload");
        assert_eq!(request.region, "חיפה");
        assert_eq!(request.rooms, "3-3.5");
        assert_eq!(request.start_year, 2005);
        assert_eq!(request.loan_term_years, 15);
        assert_eq!(request.equity_allocation, 60.0);
    }

    #[test]
    fn api_request_rejects_invalid_values() {
        let err = api_request_from_json(r#"{"loanTerm":0}"#, Some(2000)).expect_err("zero term");
        assert!(err.contains("--loan-term"));

        let err = api_request_from_json(r#"{"equityAllocation":101}"#, Some(2000))
            .expect_err("allocation above 100");
        assert!(err.contains("--equity-allocation"));

        let err = api_request_from_json(r#"{"startYear":"soon"}"#, Some(2000))
            .expect_err("non-numeric year");
        assert!(err.contains("Invalid API JSON payload"));
    }

    #[test]
    fn options_list_selectable_values() {
        let options = options_response(&sample_reference());
        let json = serde_json::to_value(&options).expect("serializable");

        assert_eq!(json["regions"], serde_json::json!(["חיפה", "כולם"]));
        assert_eq!(json["defaults"]["startYear"], 1995);
        assert_eq!(json["defaults"]["loanTerm"], 25);
        assert_eq!(json["availableYears"][0], 1995);
        assert_eq!(json["maxLoanTerm"], 50);
    }

    #[test]
    fn no_overlap_body_carries_both_ranges() {
        let err = SimulationError::NoOverlap {
            price_years: Some(YearRange::new(2005, 2010)),
            rent_years: Some(YearRange::new(2012, 2020)),
        };
        let json = serde_json::to_value(scenario_error_body(&err)).expect("serializable");

        assert_eq!(json["state"], "NO_OVERLAP");
        assert_eq!(json["priceYears"]["first"], 2005);
        assert_eq!(json["rentYears"]["last"], 2020);
        assert!(json.get("validRange").is_none());
    }

    #[tokio::test]
    async fn compare_returns_records_and_summary() {
        let payload = ComparePayload {
            start_year: Some(2000),
            ..ComparePayload::default()
        };
        let response = compare_response(&sample_state(), payload);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-store"
        );

        let json = body_json(response).await;
        assert_eq!(json["state"], "OK");
        assert_eq!(json["rows"].as_array().map(Vec::len), Some(23));
        assert_eq!(json["apartment"][0]["year"], 2000);
        assert!(json["portfolio"][0]["cumulativePrincipal"].is_number());
        assert_eq!(json["summary"]["winnerBasis"], "cumulative-area");
        assert_eq!(json["summary"]["finalYear"], 2022);
    }

    #[tokio::test]
    async fn out_of_range_start_year_is_unprocessable() {
        let payload = ComparePayload {
            start_year: Some(1990),
            ..ComparePayload::default()
        };
        let response = compare_response(&sample_state(), payload);
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let json = body_json(response).await;
        assert_eq!(json["state"], "START_YEAR_OUT_OF_RANGE");
        assert_eq!(json["validRange"]["first"], 1998);
        assert_eq!(json["validRange"]["last"], 2023);
    }

    #[tokio::test]
    async fn invalid_payload_is_a_bad_request() {
        let payload = ComparePayload {
            loan_term: Some(80),
            ..ComparePayload::default()
        };
        let response = compare_response(&sample_state(), payload);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("--loan-term"));
    }

    #[tokio::test]
    async fn unknown_dataset_has_no_state() {
        let payload = ComparePayload {
            region: Some("אילת".to_string()),
            start_year: Some(2000),
            ..ComparePayload::default()
        };
        let response = compare_response(&sample_state(), payload);
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let json = body_json(response).await;
        assert!(json.get("state").is_none());
        assert!(json["error"].as_str().unwrap().contains("אילת"));
    }
}
