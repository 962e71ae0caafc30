use axum::{
    Router,
    extract::{Json, Query},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::core::{
    Allocation, BandsResult, Buckets, CancelToken, Contributions, DEFAULT_LONGEVITY_CLAMP_AGE,
    DEFAULT_SIMULATION_COUNT, Gender, Guardrails, HealthStatus, IncomeKind, IncomeStream,
    LtcAssumptions, MODEL_VERSION, MarketAssumptions, ParameterSet, Person, ScoreResult,
    SimError, TaxMode, TaxSettings, simulate_bands, simulate_score,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
enum CliHealth {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl From<CliHealth> for HealthStatus {
    fn from(value: CliHealth) -> Self {
        match value {
            CliHealth::Excellent => HealthStatus::Excellent,
            CliHealth::Good => HealthStatus::Good,
            CliHealth::Fair => HealthStatus::Fair,
            CliHealth::Poor => HealthStatus::Poor,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
enum CliGender {
    Male,
    Female,
}

impl From<CliGender> for Gender {
    fn from(value: CliGender) -> Self {
        match value {
            CliGender::Male => Gender::Male,
            CliGender::Female => Gender::Female,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum CliTaxMode {
    Flat,
    Brackets,
}

impl From<CliTaxMode> for TaxMode {
    fn from(value: CliTaxMode) -> Self {
        match value {
            CliTaxMode::Flat => TaxMode::Flat,
            CliTaxMode::Brackets => TaxMode::Brackets,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "retire",
    about = "Monte Carlo retirement success and balance-band estimator"
)]
struct App {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON HTTP API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Print the success score for one household as JSON.
    Score(Cli),
    /// Print yearly balance percentile bands for one household as JSON.
    Bands(Cli),
}

#[derive(Args, Debug, Clone)]
struct Cli {
    #[arg(long)]
    current_age: u32,
    #[arg(long)]
    retirement_age: u32,
    #[arg(long, default_value_t = 100, help = "Age by which the person is assumed dead")]
    life_expectancy: u32,
    #[arg(long, value_enum, default_value_t = CliHealth::Good)]
    health: CliHealth,
    #[arg(long, value_enum, default_value_t = CliGender::Male)]
    gender: CliGender,
    #[arg(long, default_value_t = 0.0, help = "Annual Social Security benefit in today's dollars")]
    social_security: f64,
    #[arg(long, default_value_t = 67)]
    social_security_claim_age: u32,
    #[arg(long, default_value_t = 0.0)]
    pension_income: f64,
    #[arg(long, default_value_t = 65)]
    pension_start_age: u32,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Share of the pension paid to a surviving spouse in percent"
    )]
    pension_survivor_share: f64,
    #[arg(long, default_value_t = 0.0)]
    part_time_income: f64,
    #[arg(long)]
    part_time_end_age: Option<u32>,

    #[arg(long, help = "Spouse age; omit for a single household")]
    spouse_current_age: Option<u32>,
    #[arg(long)]
    spouse_retirement_age: Option<u32>,
    #[arg(long, default_value_t = 100)]
    spouse_life_expectancy: u32,
    #[arg(long, value_enum, default_value_t = CliHealth::Good)]
    spouse_health: CliHealth,
    #[arg(long, value_enum, default_value_t = CliGender::Female)]
    spouse_gender: CliGender,
    #[arg(long, default_value_t = 0.0)]
    spouse_social_security: f64,
    #[arg(long, default_value_t = 67)]
    spouse_social_security_claim_age: u32,

    #[arg(long, default_value_t = 0.0)]
    tax_deferred: f64,
    #[arg(long, default_value_t = 0.0)]
    tax_free: f64,
    #[arg(long, default_value_t = 0.0)]
    capital_gains: f64,
    #[arg(long, help = "Cost basis of the taxable account; defaults to its balance")]
    capital_gains_basis: Option<f64>,
    #[arg(long, default_value_t = 0.0)]
    cash: f64,

    #[arg(long, default_value_t = 60.0, help = "Stock weight in percent")]
    stock_allocation: f64,
    #[arg(long, default_value_t = 35.0, help = "Bond weight in percent")]
    bond_allocation: f64,
    #[arg(long, default_value_t = 5.0, help = "Cash weight in percent")]
    cash_allocation: f64,

    #[arg(long, default_value_t = 7.0, help = "Expected annual stock return in percent")]
    stock_return: f64,
    #[arg(long, default_value_t = 16.0, help = "Stock return volatility in percent")]
    stock_volatility: f64,
    #[arg(long, default_value_t = 4.0)]
    bond_return: f64,
    #[arg(long, default_value_t = 6.0)]
    bond_volatility: f64,
    #[arg(long, default_value_t = 2.5)]
    cash_return: f64,
    #[arg(long, default_value_t = 2.5, help = "Annual inflation in percent")]
    inflation: f64,

    #[arg(long, help = "Annual spending in today's dollars")]
    annual_expenses: f64,
    #[arg(
        long,
        default_value_t = 30.0,
        help = "Share of spending that guardrails may cut or raise, in percent"
    )]
    discretionary_share: f64,
    #[arg(long, default_value_t = 0.0)]
    healthcare_annual: f64,
    #[arg(long, default_value_t = 5.0)]
    healthcare_inflation: f64,
    #[arg(
        long,
        default_value_t = 70.0,
        help = "Discretionary spending kept by a surviving spouse, in percent"
    )]
    survivor_expense_factor: f64,
    #[arg(long, help = "Initial withdrawal rate anchor in percent")]
    withdrawal_rate_target: Option<f64>,
    #[arg(long, default_value_t = 0.0)]
    legacy_goal: f64,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    guardrails: bool,
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    ltc: bool,
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    ltc_insurance: bool,
    #[arg(long, default_value_t = 0.0)]
    ltc_policy_benefit: f64,
    #[arg(long, default_value_t = 3)]
    ltc_policy_years: u32,

    #[arg(long, default_value_t = 0.0)]
    tax_deferred_contribution: f64,
    #[arg(long, default_value_t = 0.0)]
    tax_free_contribution: f64,
    #[arg(long, default_value_t = 0.0)]
    taxable_contribution: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Annual growth of pre-retirement contributions in percent"
    )]
    contribution_growth_rate: f64,

    #[arg(long, value_enum, default_value_t = CliTaxMode::Brackets)]
    tax_mode: CliTaxMode,
    #[arg(long, default_value_t = 15.0, help = "Ordinary rate in percent when --tax-mode flat")]
    flat_tax_rate: f64,
    #[arg(long, default_value = "")]
    state: String,

    #[arg(long, default_value_t = 100)]
    horizon_age: u32,
    #[arg(long, default_value_t = DEFAULT_SIMULATION_COUNT)]
    simulations: u32,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[arg(long, default_value_t = DEFAULT_LONGEVITY_CLAMP_AGE)]
    longevity_age: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    current_age: Option<u32>,
    retirement_age: Option<u32>,
    life_expectancy: Option<u32>,
    health: Option<CliHealth>,
    gender: Option<CliGender>,
    social_security: Option<f64>,
    social_security_claim_age: Option<u32>,
    pension_income: Option<f64>,
    pension_start_age: Option<u32>,
    pension_survivor_share: Option<f64>,
    part_time_income: Option<f64>,
    part_time_end_age: Option<u32>,

    spouse_current_age: Option<u32>,
    spouse_retirement_age: Option<u32>,
    spouse_life_expectancy: Option<u32>,
    spouse_health: Option<CliHealth>,
    spouse_gender: Option<CliGender>,
    spouse_social_security: Option<f64>,
    spouse_social_security_claim_age: Option<u32>,

    tax_deferred: Option<f64>,
    tax_free: Option<f64>,
    capital_gains: Option<f64>,
    capital_gains_basis: Option<f64>,
    cash: Option<f64>,

    stock_allocation: Option<f64>,
    bond_allocation: Option<f64>,
    cash_allocation: Option<f64>,
    stock_return: Option<f64>,
    stock_volatility: Option<f64>,
    bond_return: Option<f64>,
    bond_volatility: Option<f64>,
    cash_return: Option<f64>,
    inflation: Option<f64>,

    annual_expenses: Option<f64>,
    discretionary_share: Option<f64>,
    healthcare_annual: Option<f64>,
    healthcare_inflation: Option<f64>,
    survivor_expense_factor: Option<f64>,
    withdrawal_rate_target: Option<f64>,
    legacy_goal: Option<f64>,

    guardrails: Option<bool>,
    ltc: Option<bool>,
    ltc_insurance: Option<bool>,
    ltc_policy_benefit: Option<f64>,
    ltc_policy_years: Option<u32>,

    tax_deferred_contribution: Option<f64>,
    tax_free_contribution: Option<f64>,
    taxable_contribution: Option<f64>,
    contribution_growth_rate: Option<f64>,

    tax_mode: Option<CliTaxMode>,
    flat_tax_rate: Option<f64>,
    state: Option<String>,

    horizon_age: Option<u32>,
    simulations: Option<u32>,
    seed: Option<u64>,
    longevity_age: Option<u32>,
}

#[derive(Debug)]
struct ApiRequest {
    params: ParameterSet,
    simulations: u32,
    longevity_age: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScoreResponse {
    #[serde(flatten)]
    result: ScoreResult,
    cache_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BandsResponse {
    #[serde(flatten)]
    result: BandsResult,
    cache_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    model_version: u32,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn percent(value: f64) -> f64 {
    value / 100.0
}

fn person_streams(
    social_security: f64,
    claim_age: u32,
    extra: impl IntoIterator<Item = IncomeStream>,
) -> Vec<IncomeStream> {
    let mut streams = Vec::new();
    if social_security > 0.0 {
        streams.push(IncomeStream {
            kind: IncomeKind::SocialSecurity,
            annual_amount: social_security,
            start_age: claim_age,
            end_age: None,
            inflation_indexed: true,
            survivor_share: 0.0,
        });
    }
    streams.extend(extra.into_iter().filter(|s| s.annual_amount > 0.0));
    streams
}

fn build_request(cli: Cli) -> Result<ApiRequest, String> {
    if cli.simulations == 0 {
        return Err("--simulations must be > 0".to_string());
    }

    if cli.annual_expenses < 0.0 || !cli.annual_expenses.is_finite() {
        return Err("--annual-expenses must be >= 0".to_string());
    }

    if cli.spouse_retirement_age.is_some() && cli.spouse_current_age.is_none() {
        return Err("--spouse-retirement-age requires --spouse-current-age".to_string());
    }

    if cli.part_time_income > 0.0 && cli.part_time_end_age.is_none() {
        return Err("--part-time-end-age is required when --part-time-income > 0".to_string());
    }

    if cli.longevity_age <= cli.current_age {
        return Err("--longevity-age must be > --current-age".to_string());
    }

    if cli.contribution_growth_rate <= -100.0 {
        return Err("--contribution-growth-rate must be > -100".to_string());
    }

    let capital_gains_basis = cli.capital_gains_basis.unwrap_or(cli.capital_gains);
    if capital_gains_basis < 0.0 || capital_gains_basis > cli.capital_gains {
        return Err("--capital-gains-basis must be between 0 and --capital-gains".to_string());
    }

    let pension = IncomeStream {
        kind: IncomeKind::Pension,
        annual_amount: cli.pension_income,
        start_age: cli.pension_start_age,
        end_age: None,
        inflation_indexed: false,
        survivor_share: percent(cli.pension_survivor_share),
    };
    let part_time = IncomeStream {
        kind: IncomeKind::PartTime,
        annual_amount: cli.part_time_income,
        start_age: cli.retirement_age,
        end_age: cli.part_time_end_age,
        inflation_indexed: true,
        survivor_share: 0.0,
    };
    let primary = Person {
        current_age: cli.current_age,
        retirement_age: cli.retirement_age,
        life_expectancy_ceiling: cli.life_expectancy,
        health: cli.health.into(),
        gender: cli.gender.into(),
        income_streams: person_streams(
            cli.social_security,
            cli.social_security_claim_age,
            [pension, part_time],
        ),
    };

    let spouse = cli.spouse_current_age.map(|current_age| Person {
        current_age,
        retirement_age: cli.spouse_retirement_age.unwrap_or(current_age),
        life_expectancy_ceiling: cli.spouse_life_expectancy,
        health: cli.spouse_health.into(),
        gender: cli.spouse_gender.into(),
        income_streams: person_streams(
            cli.spouse_social_security,
            cli.spouse_social_security_claim_age,
            [],
        ),
    });

    let buckets = Buckets {
        tax_deferred: cli.tax_deferred,
        tax_free: cli.tax_free,
        capital_gains: cli.capital_gains,
        cash_equivalents: cli.cash,
    };

    let params = ParameterSet {
        primary,
        spouse,
        horizon_age: cli.horizon_age,
        total_assets: buckets.total(),
        buckets,
        capital_gains_basis,
        allocation: Allocation {
            stocks: percent(cli.stock_allocation),
            bonds: percent(cli.bond_allocation),
            cash: percent(cli.cash_allocation),
        },
        market: MarketAssumptions {
            stock_return: percent(cli.stock_return),
            stock_volatility: percent(cli.stock_volatility),
            bond_return: percent(cli.bond_return),
            bond_volatility: percent(cli.bond_volatility),
            cash_return: percent(cli.cash_return),
            inflation: percent(cli.inflation),
        },
        annual_expenses: cli.annual_expenses,
        discretionary_fraction: percent(cli.discretionary_share),
        healthcare_annual: cli.healthcare_annual,
        healthcare_inflation: percent(cli.healthcare_inflation),
        survivor_expense_factor: percent(cli.survivor_expense_factor),
        withdrawal_rate_target: cli.withdrawal_rate_target.map(percent),
        legacy_goal: cli.legacy_goal,
        guardrails: Guardrails {
            enabled: cli.guardrails,
            ..Guardrails::default()
        },
        ltc: LtcAssumptions {
            enabled: cli.ltc,
            insurance_owned: cli.ltc_insurance,
            policy_annual_benefit: cli.ltc_policy_benefit,
            policy_benefit_years: cli.ltc_policy_years,
            ..LtcAssumptions::default()
        },
        contributions: Contributions {
            tax_deferred: cli.tax_deferred_contribution,
            tax_free: cli.tax_free_contribution,
            capital_gains: cli.taxable_contribution,
            growth_rate: percent(cli.contribution_growth_rate),
            ..Contributions::default()
        },
        tax: TaxSettings {
            mode: cli.tax_mode.into(),
            state: cli.state,
            flat_ordinary_rate: percent(cli.flat_tax_rate),
            ..TaxSettings::default()
        },
        seed: cli.seed,
    };
    params.validate().map_err(|e| e.to_string())?;

    Ok(ApiRequest {
        params,
        simulations: cli.simulations,
        longevity_age: cli.longevity_age,
    })
}

/// Parses the command line and runs the selected subcommand.
pub async fn run_cli() -> Result<(), String> {
    let app = App::parse();
    match app.command {
        Command::Serve { port } => run_http_server(port)
            .await
            .map_err(|e| format!("Server error: {e}")),
        Command::Score(cli) => {
            let request = build_request(cli)?;
            let response = score_response(request).await.map_err(|e| e.to_string())?;
            print_json(&response)
        }
        Command::Bands(cli) => {
            let request = build_request(cli)?;
            let response = bands_response(request).await.map_err(|e| e.to_string())?;
            print_json(&response)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{text}");
    Ok(())
}

async fn score_response(request: ApiRequest) -> Result<ScoreResponse, SimError> {
    let cache_key = request.params.cache_key()?;
    let result = simulate_score(
        Arc::new(request.params),
        request.simulations,
        CancelToken::new(),
    )
    .await?;
    Ok(ScoreResponse { result, cache_key })
}

async fn bands_response(request: ApiRequest) -> Result<BandsResponse, SimError> {
    let cache_key = request.params.cache_key()?;
    let result = simulate_bands(
        Arc::new(request.params),
        request.simulations,
        request.longevity_age,
        CancelToken::new(),
    )
    .await?;
    Ok(BandsResponse { result, cache_key })
}

pub fn router() -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/score", get(score_get_handler).post(score_post_handler))
        .route("/api/bands", get(bands_get_handler).post(bands_post_handler))
        .fallback(not_found_handler)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("retirement simulation API listening on http://{addr}");
    axum::serve(listener, router()).await
}

async fn health_handler() -> Response {
    json_response(
        StatusCode::OK,
        HealthResponse {
            status: "ok",
            model_version: MODEL_VERSION,
        },
    )
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn score_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    score_handler_impl(payload).await
}

async fn score_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    score_handler_impl(payload).await
}

async fn bands_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    bands_handler_impl(payload).await
}

async fn bands_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    bands_handler_impl(payload).await
}

async fn score_handler_impl(payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    match score_response(request).await {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(err) => sim_error_response(&err),
    }
}

async fn bands_handler_impl(payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    match bands_response(request).await {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(err) => sim_error_response(&err),
    }
}

fn status_for(err: &SimError) -> StatusCode {
    match err {
        SimError::Validation(_) => StatusCode::BAD_REQUEST,
        SimError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        SimError::WorkerFailed { .. } | SimError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn sim_error_response(err: &SimError) -> Response {
    let status = status_for(err);
    if status.is_server_error() {
        warn!("simulation request failed: {err}");
    }
    error_response(status, &err.to_string())
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
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
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.current_age {
        cli.current_age = v;
    }
    if let Some(v) = payload.retirement_age {
        cli.retirement_age = v;
    }
    if let Some(v) = payload.life_expectancy {
        cli.life_expectancy = v;
    }
    if let Some(v) = payload.health {
        cli.health = v;
    }
    if let Some(v) = payload.gender {
        cli.gender = v;
    }
    if let Some(v) = payload.social_security {
        cli.social_security = v;
    }
    if let Some(v) = payload.social_security_claim_age {
        cli.social_security_claim_age = v;
    }
    if let Some(v) = payload.pension_income {
        cli.pension_income = v;
    }
    if let Some(v) = payload.pension_start_age {
        cli.pension_start_age = v;
    }
    if let Some(v) = payload.pension_survivor_share {
        cli.pension_survivor_share = v;
    }
    if let Some(v) = payload.part_time_income {
        cli.part_time_income = v;
    }
    if payload.part_time_end_age.is_some() {
        cli.part_time_end_age = payload.part_time_end_age;
    }

    if payload.spouse_current_age.is_some() {
        cli.spouse_current_age = payload.spouse_current_age;
    }
    if payload.spouse_retirement_age.is_some() {
        cli.spouse_retirement_age = payload.spouse_retirement_age;
    }
    if let Some(v) = payload.spouse_life_expectancy {
        cli.spouse_life_expectancy = v;
    }
    if let Some(v) = payload.spouse_health {
        cli.spouse_health = v;
    }
    if let Some(v) = payload.spouse_gender {
        cli.spouse_gender = v;
    }
    if let Some(v) = payload.spouse_social_security {
        cli.spouse_social_security = v;
    }
    if let Some(v) = payload.spouse_social_security_claim_age {
        cli.spouse_social_security_claim_age = v;
    }

    if let Some(v) = payload.tax_deferred {
        cli.tax_deferred = v;
    }
    if let Some(v) = payload.tax_free {
        cli.tax_free = v;
    }
    if let Some(v) = payload.capital_gains {
        cli.capital_gains = v;
        cli.capital_gains_basis = None;
    }
    if payload.capital_gains_basis.is_some() {
        cli.capital_gains_basis = payload.capital_gains_basis;
    }
    if let Some(v) = payload.cash {
        cli.cash = v;
    }

    if let Some(v) = payload.stock_allocation {
        cli.stock_allocation = v;
    }
    if let Some(v) = payload.bond_allocation {
        cli.bond_allocation = v;
    }
    if let Some(v) = payload.cash_allocation {
        cli.cash_allocation = v;
    }
    if let Some(v) = payload.stock_return {
        cli.stock_return = v;
    }
    if let Some(v) = payload.stock_volatility {
        cli.stock_volatility = v;
    }
    if let Some(v) = payload.bond_return {
        cli.bond_return = v;
    }
    if let Some(v) = payload.bond_volatility {
        cli.bond_volatility = v;
    }
    if let Some(v) = payload.cash_return {
        cli.cash_return = v;
    }
    if let Some(v) = payload.inflation {
        cli.inflation = v;
    }

    if let Some(v) = payload.annual_expenses {
        cli.annual_expenses = v;
    }
    if let Some(v) = payload.discretionary_share {
        cli.discretionary_share = v;
    }
    if let Some(v) = payload.healthcare_annual {
        cli.healthcare_annual = v;
    }
    if let Some(v) = payload.healthcare_inflation {
        cli.healthcare_inflation = v;
    }
    if let Some(v) = payload.survivor_expense_factor {
        cli.survivor_expense_factor = v;
    }
    if payload.withdrawal_rate_target.is_some() {
        cli.withdrawal_rate_target = payload.withdrawal_rate_target;
    }
    if let Some(v) = payload.legacy_goal {
        cli.legacy_goal = v;
    }

    if let Some(v) = payload.guardrails {
        cli.guardrails = v;
    }
    if let Some(v) = payload.ltc {
        cli.ltc = v;
    }
    if let Some(v) = payload.ltc_insurance {
        cli.ltc_insurance = v;
    }
    if let Some(v) = payload.ltc_policy_benefit {
        cli.ltc_policy_benefit = v;
    }
    if let Some(v) = payload.ltc_policy_years {
        cli.ltc_policy_years = v;
    }

    if let Some(v) = payload.tax_deferred_contribution {
        cli.tax_deferred_contribution = v;
    }
    if let Some(v) = payload.tax_free_contribution {
        cli.tax_free_contribution = v;
    }
    if let Some(v) = payload.taxable_contribution {
        cli.taxable_contribution = v;
    }
    if let Some(v) = payload.contribution_growth_rate {
        cli.contribution_growth_rate = v;
    }

    if let Some(v) = payload.tax_mode {
        cli.tax_mode = v;
    }
    if let Some(v) = payload.flat_tax_rate {
        cli.flat_tax_rate = v;
    }
    if let Some(v) = payload.state {
        cli.state = v;
    }

    if let Some(v) = payload.horizon_age {
        cli.horizon_age = v;
    }
    if let Some(v) = payload.simulations {
        cli.simulations = v;
    }
    if let Some(v) = payload.seed {
        cli.seed = v;
    }
    if let Some(v) = payload.longevity_age {
        cli.longevity_age = v;
    }

    build_request(cli)
}

fn default_cli_for_api() -> Cli {
    Cli {
        current_age: 60,
        retirement_age: 65,
        life_expectancy: 100,
        health: CliHealth::Good,
        gender: CliGender::Male,
        social_security: 30_000.0,
        social_security_claim_age: 67,
        pension_income: 0.0,
        pension_start_age: 65,
        pension_survivor_share: 0.0,
        part_time_income: 0.0,
        part_time_end_age: None,
        spouse_current_age: None,
        spouse_retirement_age: None,
        spouse_life_expectancy: 100,
        spouse_health: CliHealth::Good,
        spouse_gender: CliGender::Female,
        spouse_social_security: 0.0,
        spouse_social_security_claim_age: 67,
        tax_deferred: 600_000.0,
        tax_free: 150_000.0,
        capital_gains: 200_000.0,
        capital_gains_basis: Some(120_000.0),
        cash: 50_000.0,
        stock_allocation: 60.0,
        bond_allocation: 35.0,
        cash_allocation: 5.0,
        stock_return: 7.0,
        stock_volatility: 16.0,
        bond_return: 4.0,
        bond_volatility: 6.0,
        cash_return: 2.5,
        inflation: 2.5,
        annual_expenses: 70_000.0,
        discretionary_share: 30.0,
        healthcare_annual: 8_000.0,
        healthcare_inflation: 5.0,
        survivor_expense_factor: 70.0,
        withdrawal_rate_target: None,
        legacy_goal: 0.0,
        guardrails: true,
        ltc: false,
        ltc_insurance: false,
        ltc_policy_benefit: 0.0,
        ltc_policy_years: 3,
        tax_deferred_contribution: 20_000.0,
        tax_free_contribution: 7_000.0,
        taxable_contribution: 5_000.0,
        contribution_growth_rate: 0.0,
        tax_mode: CliTaxMode::Brackets,
        flat_tax_rate: 15.0,
        state: String::new(),
        horizon_age: 100,
        simulations: DEFAULT_SIMULATION_COUNT,
        seed: 0,
        longevity_age: DEFAULT_LONGEVITY_CLAMP_AGE,
    }
}
