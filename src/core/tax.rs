use super::types::{FilingStatus, TaxBracket, TaxMode, TaxSettings};

/// Pure tax function. Amounts are nominal dollars of `year`.
pub trait TaxEngine: Send + Sync {
    fn compute_tax(
        &self,
        ordinary_income: f64,
        capital_gains: f64,
        filing_status: FilingStatus,
        state: &str,
        year: i32,
    ) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatTaxEngine {
    pub ordinary_rate: f64,
    pub capital_gains_rate: f64,
}

impl TaxEngine for FlatTaxEngine {
    fn compute_tax(
        &self,
        ordinary_income: f64,
        capital_gains: f64,
        _filing_status: FilingStatus,
        _state: &str,
        _year: i32,
    ) -> f64 {
        ordinary_income.max(0.0) * self.ordinary_rate.clamp(0.0, 1.0)
            + capital_gains.max(0.0) * self.capital_gains_rate.clamp(0.0, 1.0)
    }
}

/// Progressive ordinary brackets with a standard deduction and a flat
/// capital-gains rate; thresholds are indexed from the base year.
#[derive(Debug, Clone, PartialEq)]
pub struct BracketTaxEngine {
    single: Vec<TaxBracket>,
    joint: Vec<TaxBracket>,
    single_deduction: f64,
    joint_deduction: f64,
    capital_gains_rate: f64,
    base_year: i32,
    indexation: f64,
}

impl BracketTaxEngine {
    pub fn from_settings(settings: &TaxSettings) -> Self {
        Self {
            single: settings.single_brackets.clone(),
            joint: settings.joint_brackets.clone(),
            single_deduction: settings.single_standard_deduction,
            joint_deduction: settings.joint_standard_deduction,
            capital_gains_rate: settings.capital_gains_rate,
            base_year: settings.base_year,
            indexation: settings.bracket_inflation,
        }
    }

    fn index_factor(&self, year: i32) -> f64 {
        (1.0 + self.indexation).powi(year - self.base_year)
    }
}

fn progressive_tax(taxable: f64, brackets: &[TaxBracket], scale: f64) -> f64 {
    let mut tax = 0.0;
    for (idx, bracket) in brackets.iter().enumerate() {
        let lower = bracket.threshold * scale;
        if taxable <= lower {
            break;
        }
        let upper = brackets
            .get(idx + 1)
            .map(|next| next.threshold * scale)
            .unwrap_or(f64::INFINITY);
        tax += (taxable.min(upper) - lower) * bracket.rate;
    }
    tax
}

impl TaxEngine for BracketTaxEngine {
    fn compute_tax(
        &self,
        ordinary_income: f64,
        capital_gains: f64,
        filing_status: FilingStatus,
        _state: &str,
        year: i32,
    ) -> f64 {
        let scale = self.index_factor(year);
        let (brackets, deduction) = match filing_status {
            FilingStatus::Single => (&self.single, self.single_deduction),
            FilingStatus::MarriedJoint => (&self.joint, self.joint_deduction),
        };
        let deduction = deduction * scale;
        let ordinary = ordinary_income.max(0.0);
        let taxable_ordinary = (ordinary - deduction).max(0.0);
        let unused_deduction = (deduction - ordinary).max(0.0);
        let taxable_gains = (capital_gains.max(0.0) - unused_deduction).max(0.0);

        progressive_tax(taxable_ordinary, brackets, scale)
            + taxable_gains * self.capital_gains_rate.clamp(0.0, 1.0)
    }
}

pub fn tax_engine_for(settings: &TaxSettings) -> Box<dyn TaxEngine> {
    match settings.mode {
        TaxMode::Flat => Box::new(FlatTaxEngine {
            ordinary_rate: settings.flat_ordinary_rate,
            capital_gains_rate: settings.flat_capital_gains_rate,
        }),
        TaxMode::Brackets => Box::new(BracketTaxEngine::from_settings(settings)),
    }
}
