use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{ArgAction, Parser};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    AggregateOutcome, PlanSettings, ProjectionPoint, RawPlan, RawPlanSettings, RawTickerInput,
    SimulationOutput, TickerCashflow, ValidationReport, WeightedProfile, aggregate,
    normalize_weights, validate_plan,
};

// Canonical plan in human units (rates in percent, date as ISO string).
// Doubles as the API's defaults: payload fields override it one by one.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "divcast",
    about = "Dividend reinvestment projector (payout frequency + DPS growth + weighted portfolios)"
)]
struct Cli {
    #[arg(long, default_value = "SCHD")]
    ticker: String,
    #[arg(long, default_value_t = 27.5, help = "Share price at the start of the plan")]
    initial_price: f64,
    #[arg(long, default_value_t = 3.5, help = "Starting dividend yield in percent")]
    dividend_yield: f64,
    #[arg(
        long,
        default_value_t = 6.0,
        help = "Annual dividend-per-share growth in percent"
    )]
    dividend_growth: f64,
    #[arg(
        long,
        default_value_t = 8.5,
        help = "Expected total return CAGR in percent, dividends included"
    )]
    expected_total_return: f64,
    #[arg(
        long,
        default_value = "quarterly",
        help = "Payout frequency: monthly, quarterly, semiannual, or annual"
    )]
    frequency: String,
    #[arg(long, default_value_t = 10_000.0)]
    initial_investment: f64,
    #[arg(long, default_value_t = 500.0)]
    monthly_contribution: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Monthly dividend goal used for the reached-year marker"
    )]
    target_monthly_dividend: f64,
    #[arg(long, default_value = "2026-01-01", help = "Plan start date, YYYY-MM-DD")]
    investment_start_date: String,
    #[arg(long, default_value_t = 20.0, help = "Plan horizon in whole years, 1 to 60")]
    duration_years: f64,
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    reinvest_dividends: bool,
    #[arg(
        long,
        default_value_t = 100.0,
        help = "Share of each after-tax payout reinvested, in percent"
    )]
    reinvest_dividend_percent: f64,
    #[arg(long, help = "Flat dividend tax rate in percent")]
    tax_rate: Option<f64>,
    #[arg(
        long,
        default_value = "sameMonth",
        help = "Reinvestment timing: sameMonth or nextMonth"
    )]
    reinvest_timing: String,
    #[arg(
        long,
        default_value = "annualStep",
        help = "DPS growth mode: annualStep or monthlySmooth"
    )]
    dps_growth_mode: String,
    #[arg(long, help = "Post-horizon projection length in years, minimum 5")]
    projection_years: Option<u32>,
}

// One portfolio entry. Unset fields fall back to the base plan's ticker.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct TickerPayload {
    ticker: Option<String>,
    initial_price: Option<f64>,
    dividend_yield: Option<f64>,
    dividend_growth: Option<f64>,
    expected_total_return: Option<f64>,
    frequency: Option<String>,
    weight: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    ticker: Option<String>,
    initial_price: Option<f64>,
    dividend_yield: Option<f64>,
    dividend_growth: Option<f64>,
    expected_total_return: Option<f64>,
    frequency: Option<String>,

    initial_investment: Option<f64>,
    monthly_contribution: Option<f64>,
    target_monthly_dividend: Option<f64>,
    investment_start_date: Option<String>,
    duration_years: Option<f64>,
    reinvest_dividends: Option<bool>,
    reinvest_dividend_percent: Option<f64>,
    tax_rate: Option<f64>,
    reinvest_timing: Option<String>,
    dps_growth_mode: Option<String>,
    projection_years: Option<u32>,

    // Present and non-empty switches from the single base ticker to a
    // weighted portfolio.
    tickers: Option<Vec<TickerPayload>>,
}

#[derive(Debug)]
struct ApiRequest {
    profiles: Vec<WeightedProfile>,
    settings: PlanSettings,
    projection_years: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    ticker_count: usize,
    duration_years: u32,
    target_monthly_dividend: f64,
    simulation: Option<SimulationOutput>,
    cashflow_by_ticker: Vec<TickerCashflow>,
    post_investment_projection: Vec<ProjectionPoint>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    errors: Vec<String>,
}

fn raw_ticker_from_cli(cli: &Cli) -> RawTickerInput {
    RawTickerInput {
        ticker: cli.ticker.clone(),
        initial_price: cli.initial_price,
        dividend_yield: cli.dividend_yield,
        dividend_growth: cli.dividend_growth,
        expected_total_return: cli.expected_total_return,
        frequency: cli.frequency.clone(),
    }
}

fn raw_settings_from_cli(cli: &Cli) -> RawPlanSettings {
    RawPlanSettings {
        initial_investment: cli.initial_investment,
        monthly_contribution: cli.monthly_contribution,
        target_monthly_dividend: cli.target_monthly_dividend,
        investment_start_date: cli.investment_start_date.clone(),
        duration_years: cli.duration_years,
        reinvest_dividends: cli.reinvest_dividends,
        reinvest_dividend_percent: cli.reinvest_dividend_percent,
        tax_rate: cli.tax_rate,
        reinvest_timing: cli.reinvest_timing.clone(),
        dps_growth_mode: cli.dps_growth_mode.clone(),
    }
}

fn merge_ticker_payload(cli: &Cli, entry: &TickerPayload) -> RawTickerInput {
    RawTickerInput {
        ticker: entry.ticker.clone().unwrap_or_else(|| cli.ticker.clone()),
        initial_price: entry.initial_price.unwrap_or(cli.initial_price),
        dividend_yield: entry.dividend_yield.unwrap_or(cli.dividend_yield),
        dividend_growth: entry.dividend_growth.unwrap_or(cli.dividend_growth),
        expected_total_return: entry
            .expected_total_return
            .unwrap_or(cli.expected_total_return),
        frequency: entry.frequency.clone().unwrap_or_else(|| cli.frequency.clone()),
    }
}

fn apply_payload(cli: &mut Cli, payload: &SimulatePayload) {
    if let Some(v) = &payload.ticker {
        cli.ticker = v.clone();
    }
    if let Some(v) = payload.initial_price {
        cli.initial_price = v;
    }
    if let Some(v) = payload.dividend_yield {
        cli.dividend_yield = v;
    }
    if let Some(v) = payload.dividend_growth {
        cli.dividend_growth = v;
    }
    if let Some(v) = payload.expected_total_return {
        cli.expected_total_return = v;
    }
    if let Some(v) = &payload.frequency {
        cli.frequency = v.clone();
    }
    if let Some(v) = payload.initial_investment {
        cli.initial_investment = v;
    }
    if let Some(v) = payload.monthly_contribution {
        cli.monthly_contribution = v;
    }
    if let Some(v) = payload.target_monthly_dividend {
        cli.target_monthly_dividend = v;
    }
    if let Some(v) = &payload.investment_start_date {
        cli.investment_start_date = v.clone();
    }
    if let Some(v) = payload.duration_years {
        cli.duration_years = v;
    }
    if let Some(v) = payload.reinvest_dividends {
        cli.reinvest_dividends = v;
    }
    if let Some(v) = payload.reinvest_dividend_percent {
        cli.reinvest_dividend_percent = v;
    }
    if let Some(v) = payload.tax_rate {
        cli.tax_rate = Some(v);
    }
    if let Some(v) = &payload.reinvest_timing {
        cli.reinvest_timing = v.clone();
    }
    if let Some(v) = &payload.dps_growth_mode {
        cli.dps_growth_mode = v.clone();
    }
    if let Some(v) = payload.projection_years {
        cli.projection_years = Some(v);
    }
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest, Vec<String>> {
    let mut cli = default_cli_for_api();
    apply_payload(&mut cli, &payload);

    let raw_settings = raw_settings_from_cli(&cli);
    let base_plan = RawPlan {
        ticker: raw_ticker_from_cli(&cli),
        settings: raw_settings.clone(),
    };

    let entries = payload.tickers.unwrap_or_default();
    if entries.is_empty() {
        let (ticker, settings) = base_plan.into_typed().map_err(|report| report.errors)?;
        return Ok(ApiRequest {
            profiles: vec![WeightedProfile {
                ticker,
                weight: 1.0,
            }],
            settings,
            projection_years: cli.projection_years,
        });
    }

    // The base ticker's defaults are always valid, so the base plan's report
    // isolates settings violations; per-entry reports add ticker violations.
    let settings_errors = validate_plan(&base_plan).errors;
    let mut errors = settings_errors.clone();
    let mut typed_entries = Vec::with_capacity(entries.len());

    for (idx, entry) in entries.iter().enumerate() {
        let plan = RawPlan {
            ticker: merge_ticker_payload(&cli, entry),
            settings: raw_settings.clone(),
        };
        match plan.into_typed() {
            Ok((ticker, _)) => typed_entries.push((ticker, entry.weight)),
            Err(report) => {
                for message in report.errors {
                    if !settings_errors.contains(&message) {
                        errors.push(format!("tickers[{idx}]: {message}"));
                    }
                }
            }
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let (_, settings) = base_plan
        .into_typed()
        .map_err(|report| report.errors)?;

    Ok(ApiRequest {
        profiles: normalize_weights(typed_entries),
        settings,
        projection_years: cli.projection_years,
    })
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/api/health", get(health_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/validate", post(validate_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "divcast API listening");

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, vec!["Not found".to_string()])
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload)
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload)
}

async fn validate_handler(Json(payload): Json<SimulatePayload>) -> Response {
    let body = match api_request_from_payload(payload) {
        Ok(_) => ValidationReport {
            is_valid: true,
            errors: Vec::new(),
        },
        Err(errors) => ValidationReport {
            is_valid: false,
            errors,
        },
    };
    json_response(StatusCode::OK, body)
}

fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(errors) => return error_response(StatusCode::BAD_REQUEST, errors),
    };

    let outcome = aggregate(
        &request.profiles,
        &request.settings,
        request.projection_years,
    );
    json_response(
        StatusCode::OK,
        build_simulate_response(&request, outcome),
    )
}

fn build_simulate_response(request: &ApiRequest, outcome: AggregateOutcome) -> SimulateResponse {
    SimulateResponse {
        ticker_count: request.profiles.len(),
        duration_years: request.settings.duration_years,
        target_monthly_dividend: request.settings.target_monthly_dividend,
        simulation: outcome.simulation,
        cashflow_by_ticker: outcome.cashflow_by_ticker,
        post_investment_projection: outcome.post_investment_projection,
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, errors: Vec<String>) -> Response {
    json_response(status, ErrorResponse { errors })
}

fn default_cli_for_api() -> Cli {
    Cli {
        ticker: "SCHD".to_string(),
        initial_price: 27.5,
        dividend_yield: 3.5,
        dividend_growth: 6.0,
        expected_total_return: 8.5,
        frequency: "quarterly".to_string(),
        initial_investment: 10_000.0,
        monthly_contribution: 500.0,
        target_monthly_dividend: 0.0,
        investment_start_date: "2026-01-01".to_string(),
        duration_years: 20.0,
        reinvest_dividends: true,
        reinvest_dividend_percent: 100.0,
        tax_rate: None,
        reinvest_timing: "sameMonth".to_string(),
        dps_growth_mode: "annualStep".to_string(),
        projection_years: None,
    }
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, Vec<String>> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| vec![format!("Invalid API JSON payload: {e}")])?;
    api_request_from_payload(payload)
}
