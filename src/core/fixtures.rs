use super::types::{
    Allocation, Buckets, Contributions, Gender, Guardrails, HealthStatus, IncomeKind,
    IncomeStream, LtcAssumptions, MarketAssumptions, ParameterSet, Person, TaxSettings,
};

pub fn social_security(annual_amount: f64, claim_age: u32) -> IncomeStream {
    IncomeStream {
        kind: IncomeKind::SocialSecurity,
        annual_amount,
        start_age: claim_age,
        end_age: None,
        inflation_indexed: true,
        survivor_share: 0.0,
    }
}

pub fn sample_params() -> ParameterSet {
    ParameterSet {
        primary: Person {
            current_age: 60,
            retirement_age: 65,
            life_expectancy_ceiling: 100,
            health: HealthStatus::Good,
            gender: Gender::Male,
            income_streams: vec![social_security(30_000.0, 67)],
        },
        spouse: Some(Person {
            current_age: 58,
            retirement_age: 63,
            life_expectancy_ceiling: 100,
            health: HealthStatus::Good,
            gender: Gender::Female,
            income_streams: vec![social_security(20_000.0, 67)],
        }),
        horizon_age: 100,
        buckets: Buckets {
            tax_deferred: 600_000.0,
            tax_free: 150_000.0,
            capital_gains: 200_000.0,
            cash_equivalents: 50_000.0,
        },
        capital_gains_basis: 120_000.0,
        total_assets: 1_000_000.0,
        allocation: Allocation {
            stocks: 0.6,
            bonds: 0.35,
            cash: 0.05,
        },
        market: MarketAssumptions::default(),
        annual_expenses: 70_000.0,
        discretionary_fraction: 0.3,
        healthcare_annual: 8_000.0,
        healthcare_inflation: 0.05,
        survivor_expense_factor: 0.7,
        withdrawal_rate_target: None,
        legacy_goal: 0.0,
        guardrails: Guardrails::default(),
        ltc: LtcAssumptions::default(),
        contributions: Contributions {
            tax_deferred: 20_000.0,
            tax_free: 7_000.0,
            capital_gains: 5_000.0,
            ..Contributions::default()
        },
        tax: TaxSettings::default(),
        seed: 0,
    }
}

/// Single retiree whose only asset is a tax-deferred account and whose
/// guaranteed income exactly matches spending.
pub fn income_matched_retiree() -> ParameterSet {
    let mut params = sample_params();
    params.primary = Person {
        current_age: 65,
        retirement_age: 65,
        life_expectancy_ceiling: 100,
        health: HealthStatus::Good,
        gender: Gender::Male,
        income_streams: vec![social_security(40_000.0, 65)],
    };
    params.spouse = None;
    params.buckets = Buckets {
        tax_deferred: 1_000_000.0,
        tax_free: 0.0,
        capital_gains: 0.0,
        cash_equivalents: 0.0,
    };
    params.capital_gains_basis = 0.0;
    params.total_assets = 1_000_000.0;
    params.annual_expenses = 40_000.0;
    params.healthcare_annual = 0.0;
    params.contributions = Contributions::default();
    params
}
