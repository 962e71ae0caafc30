use super::types::Contributions;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContributionFlow {
    pub tax_deferred: f64,
    pub tax_free: f64,
    pub capital_gains: f64,
}

impl ContributionFlow {
    pub fn total(self) -> f64 {
        self.tax_deferred + self.tax_free + self.capital_gains
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContributionLimits {
    pub tax_deferred: f64,
    pub tax_free: f64,
}

/// Grows statutory ceilings and desired contributions year over year and
/// caps the tax-advantaged ones; anything over a ceiling spills into the
/// taxable brokerage bucket.
#[derive(Debug, Clone, Copy)]
pub struct ContributionScheduler {
    settings: Contributions,
}

impl ContributionScheduler {
    pub fn new(settings: Contributions) -> Self {
        Self { settings }
    }

    fn round_down(&self, value: f64) -> f64 {
        let step = self.settings.limit_rounding;
        if step <= 0.0 {
            value
        } else {
            (value / step).floor() * step
        }
    }

    pub fn limits(&self, years_since_start: u32, age: u32) -> ContributionLimits {
        let s = &self.settings;
        let growth = (1.0 + s.limit_growth_rate).powi(years_since_start as i32);
        let catch_up = age >= s.catch_up_age;

        let mut tax_deferred = self.round_down(s.tax_deferred_limit * growth);
        let mut tax_free = self.round_down(s.tax_free_limit * growth);
        if catch_up {
            tax_deferred += self.round_down(s.tax_deferred_catch_up * growth);
            tax_free += self.round_down(s.tax_free_catch_up * growth);
        }

        ContributionLimits {
            tax_deferred: tax_deferred.max(0.0),
            tax_free: tax_free.max(0.0),
        }
    }

    pub fn schedule(&self, years_since_start: u32, age: u32) -> ContributionFlow {
        let s = &self.settings;
        let multiplier = (1.0 + s.growth_rate).powi(years_since_start as i32);
        let desired_deferred = (s.tax_deferred * multiplier).max(0.0);
        let desired_free = (s.tax_free * multiplier).max(0.0);
        let desired_taxable = (s.capital_gains * multiplier).max(0.0);

        let limits = self.limits(years_since_start, age);
        let tax_deferred = desired_deferred.min(limits.tax_deferred);
        let tax_free = desired_free.min(limits.tax_free);
        let overflow = (desired_deferred - tax_deferred) + (desired_free - tax_free);

        ContributionFlow {
            tax_deferred,
            tax_free,
            capital_gains: desired_taxable + overflow,
        }
    }
}
