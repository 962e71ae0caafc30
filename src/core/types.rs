use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl HealthStatus {
    pub fn hazard_multiplier(self) -> f64 {
        match self {
            HealthStatus::Excellent => 0.7,
            HealthStatus::Good => 1.0,
            HealthStatus::Fair => 1.5,
            HealthStatus::Poor => 2.2,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn ltc_duration_factor(self) -> f64 {
        match self {
            Gender::Male => 0.85,
            Gender::Female => 1.15,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IncomeKind {
    SocialSecurity,
    Pension,
    PartTime,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeStream {
    pub kind: IncomeKind,
    /// Today's dollars.
    pub annual_amount: f64,
    pub start_age: u32,
    pub end_age: Option<u32>,
    pub inflation_indexed: bool,
    /// Fraction of the stream that keeps paying a surviving spouse.
    pub survivor_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub current_age: u32,
    pub retirement_age: u32,
    pub life_expectancy_ceiling: u32,
    pub health: HealthStatus,
    pub gender: Gender,
    pub income_streams: Vec<IncomeStream>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buckets {
    pub tax_deferred: f64,
    pub tax_free: f64,
    pub capital_gains: f64,
    pub cash_equivalents: f64,
}

impl Buckets {
    pub fn total(&self) -> f64 {
        self.tax_deferred + self.tax_free + self.capital_gains + self.cash_equivalents
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub stocks: f64,
    pub bonds: f64,
    pub cash: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketAssumptions {
    pub stock_return: f64,
    pub stock_volatility: f64,
    pub bond_return: f64,
    pub bond_volatility: f64,
    pub cash_return: f64,
    pub inflation: f64,
}

impl Default for MarketAssumptions {
    fn default() -> Self {
        Self {
            stock_return: 0.07,
            stock_volatility: 0.16,
            bond_return: 0.04,
            bond_volatility: 0.06,
            cash_return: 0.025,
            inflation: 0.025,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guardrails {
    pub enabled: bool,
    /// Cut when the current withdrawal rate exceeds anchor × upper_band.
    pub upper_band: f64,
    /// Raise when the current withdrawal rate falls below anchor × lower_band.
    pub lower_band: f64,
    pub adjustment: f64,
    pub min_multiplier: f64,
    pub max_multiplier: f64,
}

impl Default for Guardrails {
    fn default() -> Self {
        Self {
            enabled: true,
            upper_band: 1.2,
            lower_band: 0.8,
            adjustment: 0.10,
            min_multiplier: 0.5,
            max_multiplier: 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LtcAssumptions {
    pub enabled: bool,
    pub insurance_owned: bool,
    pub lifetime_probability: f64,
    pub onset_min_age: u32,
    pub onset_max_age: u32,
    pub mean_duration_years: f64,
    pub max_duration_years: u32,
    /// Today's dollars.
    pub annual_cost_min: f64,
    pub annual_cost_max: f64,
    pub cost_inflation: f64,
    pub policy_annual_benefit: f64,
    pub policy_benefit_years: u32,
}

impl Default for LtcAssumptions {
    fn default() -> Self {
        Self {
            enabled: false,
            insurance_owned: false,
            lifetime_probability: 0.5,
            onset_min_age: 75,
            onset_max_age: 90,
            mean_duration_years: 2.5,
            max_duration_years: 10,
            annual_cost_min: 60_000.0,
            annual_cost_max: 110_000.0,
            cost_inflation: 0.045,
            policy_annual_benefit: 0.0,
            policy_benefit_years: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contributions {
    pub tax_deferred: f64,
    pub tax_free: f64,
    pub capital_gains: f64,
    pub growth_rate: f64,
    pub tax_deferred_limit: f64,
    pub tax_free_limit: f64,
    pub catch_up_age: u32,
    pub tax_deferred_catch_up: f64,
    pub tax_free_catch_up: f64,
    pub limit_growth_rate: f64,
    pub limit_rounding: f64,
}

impl Default for Contributions {
    fn default() -> Self {
        Self {
            tax_deferred: 0.0,
            tax_free: 0.0,
            capital_gains: 0.0,
            growth_rate: 0.0,
            tax_deferred_limit: 23_000.0,
            tax_free_limit: 7_000.0,
            catch_up_age: 50,
            tax_deferred_catch_up: 7_500.0,
            tax_free_catch_up: 1_000.0,
            limit_growth_rate: 0.025,
            limit_rounding: 500.0,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilingStatus {
    Single,
    MarriedJoint,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaxMode {
    Flat,
    Brackets,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBracket {
    /// Lower bound of taxable income for this rate, in base-year dollars.
    pub threshold: f64,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxSettings {
    pub mode: TaxMode,
    pub state: String,
    pub base_year: i32,
    pub flat_ordinary_rate: f64,
    pub flat_capital_gains_rate: f64,
    pub single_brackets: Vec<TaxBracket>,
    pub joint_brackets: Vec<TaxBracket>,
    pub single_standard_deduction: f64,
    pub joint_standard_deduction: f64,
    pub capital_gains_rate: f64,
    pub bracket_inflation: f64,
}

impl Default for TaxSettings {
    fn default() -> Self {
        let single = [
            (0.0, 0.10),
            (11_600.0, 0.12),
            (47_150.0, 0.22),
            (100_525.0, 0.24),
            (191_950.0, 0.32),
            (243_725.0, 0.35),
            (609_350.0, 0.37),
        ];
        let to_brackets = |rows: &[(f64, f64)], scale: f64| {
            rows.iter()
                .map(|&(threshold, rate)| TaxBracket {
                    threshold: threshold * scale,
                    rate,
                })
                .collect::<Vec<_>>()
        };
        Self {
            mode: TaxMode::Brackets,
            state: String::new(),
            base_year: 2024,
            flat_ordinary_rate: 0.15,
            flat_capital_gains_rate: 0.15,
            single_brackets: to_brackets(&single, 1.0),
            joint_brackets: to_brackets(&single, 2.0),
            single_standard_deduction: 14_600.0,
            joint_standard_deduction: 29_200.0,
            capital_gains_rate: 0.15,
            bracket_inflation: 0.025,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSet {
    pub primary: Person,
    pub spouse: Option<Person>,
    pub horizon_age: u32,
    pub buckets: Buckets,
    pub capital_gains_basis: f64,
    pub total_assets: f64,
    pub allocation: Allocation,
    pub market: MarketAssumptions,
    pub annual_expenses: f64,
    pub discretionary_fraction: f64,
    pub healthcare_annual: f64,
    pub healthcare_inflation: f64,
    pub survivor_expense_factor: f64,
    pub withdrawal_rate_target: Option<f64>,
    pub legacy_goal: f64,
    pub guardrails: Guardrails,
    pub ltc: LtcAssumptions,
    pub contributions: Contributions,
    pub tax: TaxSettings,
    pub seed: u64,
}

impl ParameterSet {
    pub fn filing_status(&self, spouse_alive: bool) -> FilingStatus {
        if self.spouse.is_some() && spouse_alive {
            FilingStatus::MarriedJoint
        } else {
            FilingStatus::Single
        }
    }

    /// Allocation-weighted expected nominal return of the invested buckets.
    pub fn expected_portfolio_return(&self) -> f64 {
        self.allocation.stocks * self.market.stock_return
            + self.allocation.bonds * self.market.bond_return
            + self.allocation.cash * self.market.cash_return
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketRegime {
    Bull,
    Normal,
    Bear,
    Crisis,
}

impl MarketRegime {
    pub const ALL: [MarketRegime; 4] = [
        MarketRegime::Bull,
        MarketRegime::Normal,
        MarketRegime::Bear,
        MarketRegime::Crisis,
    ];

    pub fn index(self) -> usize {
        match self {
            MarketRegime::Bull => 0,
            MarketRegime::Normal => 1,
            MarketRegime::Bear => 2,
            MarketRegime::Crisis => 3,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Accumulating,
    Withdrawing,
    Depleted,
}

/// One simulated year. Money fields are in today's dollars.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRecord {
    pub year: u32,
    pub age: u32,
    pub spouse_age: Option<u32>,
    pub market_regime: MarketRegime,
    pub phase: Phase,
    pub portfolio_balance: f64,
    pub withdrawal: f64,
    pub guaranteed_income: f64,
    pub tax_paid: f64,
    pub ltc_cost: f64,
    pub alive_self: bool,
    pub alive_spouse: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationPath {
    pub years: Vec<YearRecord>,
    pub depleted_year: Option<u32>,
    /// Today's dollars at the terminal year, or at the horizon when projected.
    pub terminal_balance: f64,
    pub success: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Score,
    Bands,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScorePart {
    pub successes: u32,
    pub total: u32,
    pub median_ending_balance: f64,
    pub percentile10: f64,
    pub percentile90: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandsPerYear {
    pub p05: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub count: u32,
    pub age: u32,
}

/// Keyed by year index from the start of the simulation.
pub type BandsPart = BTreeMap<u32, BandsPerYear>;

#[derive(Debug, Clone, PartialEq)]
pub enum PartialResult {
    Score(ScorePart),
    Bands(BandsPart),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub successes: u32,
    pub total: u32,
    pub median_ending_balance: f64,
    pub percentile10: f64,
    pub percentile90: f64,
    pub success_probability: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BandSeries {
    pub p05: Vec<f64>,
    pub p25: Vec<f64>,
    pub p50: Vec<f64>,
    pub p75: Vec<f64>,
    pub p95: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandsMeta {
    pub current_age: u32,
    pub longevity_age: u32,
    pub runs: u32,
    pub calculated_at: String,
    pub model_version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandsResult {
    pub ages: Vec<u32>,
    pub percentiles: BandSeries,
    pub meta: BandsMeta,
}
