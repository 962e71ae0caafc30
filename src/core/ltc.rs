use super::rng::SimRng;
use super::types::{LtcAssumptions, Person};

/// A single lifetime long-term-care episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LtcEpisode {
    pub onset_age: u32,
    pub duration_years: u32,
    /// Today's dollars at simulation start.
    pub annual_cost: f64,
    pub cost_inflation: f64,
}

impl LtcEpisode {
    pub fn is_active(&self, age: u32) -> bool {
        age >= self.onset_age && age < self.onset_age + self.duration_years
    }

    /// Nominal cost for simulation year `year`, inflated from year 0.
    pub fn nominal_cost(&self, year: u32) -> f64 {
        self.annual_cost * (1.0 + self.cost_inflation).powi(year as i32)
    }
}

pub trait LtcModel: Send + Sync {
    fn maybe_trigger_episode(&self, person: &Person, age: u32, rng: &mut SimRng)
    -> Option<LtcEpisode>;
}

/// Converts a lifetime episode probability into a flat per-year onset hazard
/// across the onset window.
#[derive(Debug, Clone, PartialEq)]
pub struct LifetimeEpisodeModel {
    assumptions: LtcAssumptions,
    annual_onset_probability: f64,
}

impl LifetimeEpisodeModel {
    pub fn new(assumptions: LtcAssumptions) -> Self {
        let window = (assumptions.onset_max_age - assumptions.onset_min_age + 1) as f64;
        let lifetime = assumptions.lifetime_probability.clamp(0.0, 1.0);
        let annual_onset_probability = 1.0 - (1.0 - lifetime).powf(1.0 / window);
        Self {
            assumptions,
            annual_onset_probability,
        }
    }

    pub fn annual_onset_probability(&self) -> f64 {
        self.annual_onset_probability
    }
}

impl LtcModel for LifetimeEpisodeModel {
    fn maybe_trigger_episode(
        &self,
        person: &Person,
        age: u32,
        rng: &mut SimRng,
    ) -> Option<LtcEpisode> {
        let a = &self.assumptions;
        if !a.enabled || age < a.onset_min_age || age > a.onset_max_age {
            return None;
        }
        if !rng.chance(self.annual_onset_probability) {
            return None;
        }

        let mean = a.mean_duration_years * person.gender.ltc_duration_factor();
        let duration_years = (rng.exponential(mean).ceil() as u32).clamp(1, a.max_duration_years);
        let annual_cost = rng.uniform(a.annual_cost_min, a.annual_cost_max);

        Some(LtcEpisode {
            onset_age: age,
            duration_years,
            annual_cost,
            cost_inflation: a.cost_inflation,
        })
    }
}

/// Insurance hook: how much of a year's nominal LTC cost a policy pays.
pub trait LtcCoverage: Send + Sync {
    fn covered(&self, episode_year: u32, nominal_cost: f64, price_index: f64) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SelfPay;

impl LtcCoverage for SelfPay {
    fn covered(&self, _episode_year: u32, _nominal_cost: f64, _price_index: f64) -> f64 {
        0.0
    }
}

/// Inflation-indexed annual benefit for a limited number of claim years.
#[derive(Debug, Clone, Copy)]
pub struct PolicyCoverage {
    pub annual_benefit: f64,
    pub benefit_years: u32,
}

impl LtcCoverage for PolicyCoverage {
    fn covered(&self, episode_year: u32, nominal_cost: f64, price_index: f64) -> f64 {
        if episode_year >= self.benefit_years {
            return 0.0;
        }
        (self.annual_benefit * price_index).min(nominal_cost).max(0.0)
    }
}

pub fn coverage_for(assumptions: &LtcAssumptions) -> Box<dyn LtcCoverage> {
    if assumptions.insurance_owned && assumptions.policy_annual_benefit > 0.0 {
        Box::new(PolicyCoverage {
            annual_benefit: assumptions.policy_annual_benefit,
            benefit_years: assumptions.policy_benefit_years,
        })
    } else {
        Box::new(SelfPay)
    }
}
