use std::sync::Arc;

use super::aggregate::{bands_result, merge_bands, merge_scores, score_result};
use super::error::{SimError, SimResult};
use super::orchestrator::{CancelToken, run};
use super::types::{BandsResult, ParameterSet, PartialResult, ReportKind, ScoreResult};

pub const DEFAULT_SIMULATION_COUNT: u32 = 1_000;

fn unexpected_part(kind: ReportKind) -> SimError {
    SimError::WorkerFailed {
        worker: 0,
        reason: format!("worker returned a part that does not match the {kind:?} request"),
    }
}

/// Success probability and ending-balance statistics over `runs` paths.
pub async fn simulate_score(
    params: Arc<ParameterSet>,
    runs: u32,
    cancel: CancelToken,
) -> SimResult<ScoreResult> {
    let parts = run(params, runs, ReportKind::Score, cancel).await?;
    let scores = parts
        .into_iter()
        .map(|part| match part {
            PartialResult::Score(score) => Ok(score),
            PartialResult::Bands(_) => Err(unexpected_part(ReportKind::Score)),
        })
        .collect::<SimResult<Vec<_>>>()?;
    Ok(score_result(merge_scores(&scores)))
}

/// Yearly real-balance percentile bands, reported up to `longevity_age`.
pub async fn simulate_bands(
    params: Arc<ParameterSet>,
    runs: u32,
    longevity_age: u32,
    cancel: CancelToken,
) -> SimResult<BandsResult> {
    let current_age = params.primary.current_age;
    let parts = run(params, runs, ReportKind::Bands, cancel).await?;
    let bands = parts
        .into_iter()
        .map(|part| match part {
            PartialResult::Bands(bands) => Ok(bands),
            PartialResult::Score(_) => Err(unexpected_part(ReportKind::Bands)),
        })
        .collect::<SimResult<Vec<_>>>()?;
    let merged = merge_bands(&bands);
    Ok(bands_result(&merged, current_age, longevity_age, runs))
}

#[cfg(test)]
mod tests {
    use super::super::aggregate::DEFAULT_LONGEVITY_CLAMP_AGE;
    use super::super::fixtures::{income_matched_retiree, sample_params, social_security};
    use super::*;
    use crate::core::types::{HealthStatus, MarketAssumptions};

    fn flat_market(rate: f64) -> MarketAssumptions {
        MarketAssumptions {
            stock_return: rate,
            stock_volatility: 0.0,
            bond_return: rate,
            bond_volatility: 0.0,
            cash_return: rate,
            inflation: rate,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn example_scenario_holds_its_real_value() {
        let mut params = income_matched_retiree();
        params.market = flat_market(0.03);
        let score = simulate_score(Arc::new(params), 200, CancelToken::new())
            .await
            .expect("score");
        assert_eq!(score.total, 200);
        assert_eq!(score.success_probability, 1.0);
        assert!(
            (score.median_ending_balance - 1_000_000.0).abs() < 1.0,
            "median {}",
            score.median_ending_balance
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn guaranteed_income_surplus_always_succeeds() {
        for volatility in [0.0, 0.2, 0.6] {
            let mut params = income_matched_retiree();
            params.primary.income_streams = vec![social_security(55_000.0, 65)];
            params.market.stock_volatility = volatility;
            params.market.bond_volatility = volatility / 2.0;
            let score = simulate_score(Arc::new(params), 300, CancelToken::new())
                .await
                .expect("score");
            assert_eq!(score.success_probability, 1.0, "volatility {volatility}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn guaranteed_income_surplus_survives_ltc_shocks() {
        let mut params = income_matched_retiree();
        params.primary.income_streams = vec![social_security(55_000.0, 65)];
        params.ltc.enabled = true;
        let score = simulate_score(Arc::new(params), 400, CancelToken::new())
            .await
            .expect("score");
        assert!(score.success_probability >= 0.98, "{score:?}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn longevity_clamp_limits_reported_ages() {
        let mut params = income_matched_retiree();
        params.primary.current_age = 70;
        params.primary.retirement_age = 70;
        params.primary.health = HealthStatus::Excellent;
        params.primary.income_streams = vec![social_security(40_000.0, 67)];
        let bands = simulate_bands(
            Arc::new(params),
            400,
            DEFAULT_LONGEVITY_CLAMP_AGE,
            CancelToken::new(),
        )
        .await
        .expect("bands");
        assert_eq!(bands.ages.len(), 93 - 70 + 1);
        assert_eq!(bands.ages.first(), Some(&70));
        assert_eq!(bands.ages.last(), Some(&93));
        assert_eq!(bands.meta.current_age, 70);
        assert_eq!(bands.meta.longevity_age, 93);
        assert_eq!(bands.meta.runs, 400);
        for i in 0..bands.ages.len() {
            let p = &bands.percentiles;
            assert!(p.p05[i] <= p.p25[i] && p.p25[i] <= p.p50[i]);
            assert!(p.p50[i] <= p.p75[i] && p.p75[i] <= p.p95[i]);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn repeated_runs_merge_to_identical_results() {
        let params = Arc::new(sample_params());
        let a = simulate_score(Arc::clone(&params), 120, CancelToken::new())
            .await
            .expect("score a");
        let b = simulate_score(Arc::clone(&params), 120, CancelToken::new())
            .await
            .expect("score b");
        assert_eq!(a, b);

        let a = simulate_bands(Arc::clone(&params), 60, 95, CancelToken::new())
            .await
            .expect("bands a");
        let b = simulate_bands(params, 60, 95, CancelToken::new())
            .await
            .expect("bands b");
        assert_eq!(a.ages, b.ages);
        assert_eq!(a.percentiles, b.percentiles);
    }
}
