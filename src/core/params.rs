use sha2::{Digest, Sha256};

use super::error::{SimError, SimResult};
use super::types::{IncomeStream, ParameterSet, Person, TaxBracket};

/// Bumped whenever a model change can alter results for identical inputs.
pub const MODEL_VERSION: u32 = 3;

const BUCKET_SUM_TOLERANCE: f64 = 1.0;
const ALLOCATION_TOLERANCE: f64 = 0.01;
const MAX_HORIZON_AGE: u32 = 125;

fn invalid<T>(msg: impl Into<String>) -> SimResult<T> {
    Err(SimError::Validation(msg.into()))
}

fn non_negative(name: &str, value: f64) -> SimResult<()> {
    if !value.is_finite() || value < 0.0 {
        return invalid(format!("{name} must be a finite amount >= 0"));
    }
    Ok(())
}

fn unit_interval(name: &str, value: f64) -> SimResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return invalid(format!("{name} must be between 0 and 1"));
    }
    Ok(())
}

fn validate_person(label: &str, person: &Person, horizon_age: u32) -> SimResult<()> {
    if person.retirement_age < person.current_age {
        return invalid(format!("{label}.retirementAge must be >= {label}.currentAge"));
    }
    if person.life_expectancy_ceiling <= person.current_age {
        return invalid(format!(
            "{label}.lifeExpectancyCeiling must be > {label}.currentAge"
        ));
    }
    if person.current_age >= horizon_age {
        return invalid(format!("{label}.currentAge must be < horizonAge"));
    }
    for (idx, stream) in person.income_streams.iter().enumerate() {
        validate_stream(&format!("{label}.incomeStreams[{idx}]"), stream)?;
    }
    Ok(())
}

fn validate_stream(label: &str, stream: &IncomeStream) -> SimResult<()> {
    non_negative(&format!("{label}.annualAmount"), stream.annual_amount)?;
    unit_interval(&format!("{label}.survivorShare"), stream.survivor_share)?;
    if let Some(end) = stream.end_age {
        if end < stream.start_age {
            return invalid(format!("{label}.endAge must be >= startAge"));
        }
    }
    Ok(())
}

fn validate_brackets(label: &str, brackets: &[TaxBracket]) -> SimResult<()> {
    let mut prev = f64::NEG_INFINITY;
    for bracket in brackets {
        non_negative(&format!("{label} threshold"), bracket.threshold)?;
        unit_interval(&format!("{label} rate"), bracket.rate)?;
        if bracket.threshold < prev {
            return invalid(format!("{label} must be sorted by threshold"));
        }
        prev = bracket.threshold;
    }
    Ok(())
}

impl ParameterSet {
    /// Rejects malformed input before any simulation starts.
    pub fn validate(&self) -> SimResult<()> {
        if self.horizon_age > MAX_HORIZON_AGE {
            return invalid(format!("horizonAge must be <= {MAX_HORIZON_AGE}"));
        }
        validate_person("primary", &self.primary, self.horizon_age)?;
        if let Some(spouse) = &self.spouse {
            validate_person("spouse", spouse, self.horizon_age)?;
        }

        let b = &self.buckets;
        for (name, value) in [
            ("buckets.taxDeferred", b.tax_deferred),
            ("buckets.taxFree", b.tax_free),
            ("buckets.capitalGains", b.capital_gains),
            ("buckets.cashEquivalents", b.cash_equivalents),
            ("capitalGainsBasis", self.capital_gains_basis),
            ("totalAssets", self.total_assets),
            ("annualExpenses", self.annual_expenses),
            ("healthcareAnnual", self.healthcare_annual),
            ("legacyGoal", self.legacy_goal),
        ] {
            non_negative(name, value)?;
        }
        if (b.total() - self.total_assets).abs() > BUCKET_SUM_TOLERANCE {
            return invalid("bucket balances must sum to totalAssets");
        }
        if self.capital_gains_basis > b.capital_gains + BUCKET_SUM_TOLERANCE {
            return invalid("capitalGainsBasis must be <= buckets.capitalGains");
        }

        let a = &self.allocation;
        for (name, weight) in [
            ("allocation.stocks", a.stocks),
            ("allocation.bonds", a.bonds),
            ("allocation.cash", a.cash),
        ] {
            unit_interval(name, weight)?;
        }
        if (a.stocks + a.bonds + a.cash - 1.0).abs() > ALLOCATION_TOLERANCE {
            return invalid("allocation weights must sum to 1.0");
        }

        let m = &self.market;
        for (name, rate) in [
            ("market.stockReturn", m.stock_return),
            ("market.bondReturn", m.bond_return),
            ("market.cashReturn", m.cash_return),
            ("market.inflation", m.inflation),
            ("healthcareInflation", self.healthcare_inflation),
        ] {
            if !rate.is_finite() || rate <= -1.0 {
                return invalid(format!("{name} must be > -100%"));
            }
        }
        if !m.stock_volatility.is_finite() || !m.bond_volatility.is_finite() {
            return invalid("market volatilities must be finite");
        }

        unit_interval("discretionaryFraction", self.discretionary_fraction)?;
        unit_interval("survivorExpenseFactor", self.survivor_expense_factor)?;
        if let Some(rate) = self.withdrawal_rate_target {
            if !(rate > 0.0 && rate <= 1.0) {
                return invalid("withdrawalRateTarget must be in (0, 1]");
            }
        }

        let g = &self.guardrails;
        for (name, value) in [
            ("guardrails.lowerBand", g.lower_band),
            ("guardrails.upperBand", g.upper_band),
            ("guardrails.adjustment", g.adjustment),
            ("guardrails.minMultiplier", g.min_multiplier),
            ("guardrails.maxMultiplier", g.max_multiplier),
        ] {
            if !value.is_finite() {
                return invalid(format!("{name} must be finite"));
            }
        }
        if g.lower_band <= 0.0 || g.upper_band <= 0.0 || !g.upper_band.is_finite() {
            return invalid("guardrail bands must be > 0");
        }
        if g.lower_band > g.upper_band {
            return invalid("guardrails.lowerBand must be <= guardrails.upperBand");
        }
        if !(0.0..1.0).contains(&g.adjustment) {
            return invalid("guardrails.adjustment must be in [0, 1)");
        }
        if g.min_multiplier > 1.0 || g.max_multiplier < 1.0 || g.min_multiplier < 0.0 {
            return invalid("guardrail multipliers must satisfy 0 <= min <= 1 <= max");
        }

        let l = &self.ltc;
        unit_interval("ltc.lifetimeProbability", l.lifetime_probability)?;
        if l.onset_min_age > l.onset_max_age {
            return invalid("ltc.onsetMinAge must be <= ltc.onsetMaxAge");
        }
        non_negative("ltc.annualCostMin", l.annual_cost_min)?;
        non_negative("ltc.annualCostMax", l.annual_cost_max)?;
        non_negative("ltc.policyAnnualBenefit", l.policy_annual_benefit)?;
        if l.annual_cost_min > l.annual_cost_max {
            return invalid("ltc.annualCostMin must be <= ltc.annualCostMax");
        }
        if !(l.mean_duration_years > 0.0) || l.max_duration_years == 0 {
            return invalid("ltc duration settings must be > 0");
        }
        if !l.cost_inflation.is_finite() || l.cost_inflation <= -1.0 {
            return invalid("ltc.costInflation must be > -100%");
        }

        let c = &self.contributions;
        for (name, value) in [
            ("contributions.taxDeferred", c.tax_deferred),
            ("contributions.taxFree", c.tax_free),
            ("contributions.capitalGains", c.capital_gains),
            ("contributions.taxDeferredLimit", c.tax_deferred_limit),
            ("contributions.taxFreeLimit", c.tax_free_limit),
            ("contributions.taxDeferredCatchUp", c.tax_deferred_catch_up),
            ("contributions.taxFreeCatchUp", c.tax_free_catch_up),
            ("contributions.limitRounding", c.limit_rounding),
        ] {
            non_negative(name, value)?;
        }
        if !c.growth_rate.is_finite() || c.growth_rate <= -1.0 {
            return invalid("contributions.growthRate must be > -100%");
        }

        let t = &self.tax;
        unit_interval("tax.flatOrdinaryRate", t.flat_ordinary_rate)?;
        unit_interval("tax.flatCapitalGainsRate", t.flat_capital_gains_rate)?;
        unit_interval("tax.capitalGainsRate", t.capital_gains_rate)?;
        non_negative("tax.singleStandardDeduction", t.single_standard_deduction)?;
        non_negative("tax.jointStandardDeduction", t.joint_standard_deduction)?;
        validate_brackets("tax.singleBrackets", &t.single_brackets)?;
        validate_brackets("tax.jointBrackets", &t.joint_brackets)?;

        Ok(())
    }

    /// Stable key for an external result cache: identical inputs under the
    /// same model version map to the same key.
    pub fn cache_key(&self) -> SimResult<String> {
        let canonical = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(MODEL_VERSION.to_le_bytes());
        hasher.update(&canonical);
        Ok(format!("{:x}", hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::sample_params;
    use super::*;

    fn assert_rejected(params: &ParameterSet, needle: &str) {
        match params.validate() {
            Err(SimError::Validation(msg)) => {
                assert!(msg.contains(needle), "expected '{needle}' in '{msg}'")
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn sample_params_are_valid() {
        sample_params().validate().expect("fixture must validate");
    }

    #[test]
    fn rejects_retirement_before_current_age() {
        let mut params = sample_params();
        params.primary.retirement_age = params.primary.current_age - 1;
        assert_rejected(&params, "primary.retirementAge");
    }

    #[test]
    fn rejects_non_finite_guardrail_settings() {
        let mut params = sample_params();
        params.guardrails.min_multiplier = f64::NAN;
        assert_rejected(&params, "guardrails.minMultiplier");

        let mut params = sample_params();
        params.guardrails.max_multiplier = f64::NAN;
        assert_rejected(&params, "guardrails.maxMultiplier");

        let mut params = sample_params();
        params.guardrails.lower_band = f64::NAN;
        assert_rejected(&params, "guardrails.lowerBand");
    }

    #[test]
    fn rejects_negative_bucket() {
        let mut params = sample_params();
        params.buckets.cash_equivalents = -5.0;
        assert_rejected(&params, "buckets.cashEquivalents");
    }

    #[test]
    fn rejects_bucket_total_mismatch() {
        let mut params = sample_params();
        params.total_assets += 10_000.0;
        assert_rejected(&params, "totalAssets");
    }

    #[test]
    fn rejects_allocation_not_summing_to_one() {
        let mut params = sample_params();
        params.allocation.stocks = 0.9;
        params.allocation.bonds = 0.3;
        params.allocation.cash = 0.0;
        assert_rejected(&params, "allocation weights");
    }

    #[test]
    fn allocation_within_epsilon_is_accepted() {
        let mut params = sample_params();
        params.allocation.stocks = 0.6;
        params.allocation.bonds = 0.395;
        params.allocation.cash = 0.0;
        params.validate().expect("within tolerance");
    }

    #[test]
    fn rejects_inverted_guardrails() {
        let mut params = sample_params();
        params.guardrails.lower_band = 1.3;
        params.guardrails.upper_band = 1.2;
        assert_rejected(&params, "guardrails.lowerBand");
    }

    #[test]
    fn extreme_volatility_is_not_a_validation_error() {
        let mut params = sample_params();
        params.market.stock_volatility = 4.0;
        params.validate().expect("volatility is clamped by the model");
    }

    #[test]
    fn cache_key_is_stable_and_input_sensitive() {
        let params = sample_params();
        let a = params.cache_key().expect("key");
        let b = params.clone().cache_key().expect("key");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let mut changed = params;
        changed.annual_expenses += 1.0;
        assert_ne!(a, changed.cache_key().expect("key"));
    }
}
