mod aggregate;
mod contributions;
mod error;
mod ltc;
mod market;
mod mortality;
mod orchestrator;
mod params;
mod report;
mod rng;
mod simulator;
mod tax;
mod types;
mod withdrawal;

#[cfg(test)]
mod fixtures;

pub use aggregate::{DEFAULT_LONGEVITY_CLAMP_AGE, merge_bands, merge_scores, percentile};
pub use error::{SimError, SimResult};
pub use ltc::{LifetimeEpisodeModel, LtcCoverage, LtcModel, PolicyCoverage, SelfPay};
pub use market::{AnnualReturns, RegimeSwitchingModel, ReturnModel};
pub use mortality::{LifeTable, LifeTableMortality, MortalityModel};
pub use orchestrator::{
    CancelToken, partition, run, run_with_models, run_with_workers, worker_count, worker_seed,
};
pub use params::MODEL_VERSION;
pub use report::{DEFAULT_SIMULATION_COUNT, simulate_bands, simulate_score};
pub use rng::SimRng;
pub use simulator::{ModelFactory, ParameterModels, PathSimulator, SimulationModels};
pub use tax::{BracketTaxEngine, FlatTaxEngine, TaxEngine};
pub use types::{
    Allocation, BandSeries, BandsMeta, BandsPart, BandsPerYear, BandsResult, Buckets,
    Contributions, FilingStatus, Gender, Guardrails, HealthStatus, IncomeKind, IncomeStream,
    LtcAssumptions, MarketAssumptions, MarketRegime, ParameterSet, PartialResult, Person, Phase,
    ReportKind, ScorePart, ScoreResult, SimulationPath, TaxBracket, TaxMode, TaxSettings,
    YearRecord,
};
pub use withdrawal::{WithdrawalEngine, WithdrawalOutcome};
