use super::rng::SimRng;
use super::types::HealthStatus;

pub trait MortalityModel: Send + Sync {
    /// One-year death probability after health adjustment.
    fn hazard(&self, age: u32, health: HealthStatus) -> f64;

    fn step_survival(&self, age: u32, health: HealthStatus, rng: &mut SimRng) -> bool {
        !rng.chance(self.hazard(age, health))
    }
}

/// Period life table of one-year death probabilities q(x).
#[derive(Debug, Clone, PartialEq)]
pub struct LifeTable {
    start_age: u32,
    qx: Vec<f64>,
}

impl LifeTable {
    pub fn from_rates(start_age: u32, qx: Vec<f64>) -> Self {
        let qx = qx
            .into_iter()
            .map(|q| if q.is_finite() { q.clamp(0.0, 1.0) } else { 1.0 })
            .collect();
        Self { start_age, qx }
    }

    /// Gompertz-shaped unisex table from age 0 to 119.
    pub fn gompertz(a: f64, b: f64) -> Self {
        let qx = (0..120_u32)
            .map(|age| (a * (b * age as f64).exp()).min(1.0))
            .collect();
        Self::from_rates(0, qx)
    }

    pub fn base_hazard(&self, age: u32) -> f64 {
        if age < self.start_age {
            return self.qx.first().copied().unwrap_or(1.0);
        }
        self.qx
            .get((age - self.start_age) as usize)
            .copied()
            .unwrap_or(1.0)
    }

    pub fn end_age(&self) -> u32 {
        self.start_age + self.qx.len() as u32
    }
}

impl Default for LifeTable {
    fn default() -> Self {
        Self::gompertz(0.000_025, 0.094)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LifeTableMortality {
    table: LifeTable,
}

impl LifeTableMortality {
    pub fn new(table: LifeTable) -> Self {
        Self { table }
    }
}

impl MortalityModel for LifeTableMortality {
    fn hazard(&self, age: u32, health: HealthStatus) -> f64 {
        (self.table.base_hazard(age) * health.hazard_multiplier()).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_increasing_with_age() {
        let table = LifeTable::default();
        let mut prev = 0.0;
        for age in 30..table.end_age() {
            let q = table.base_hazard(age);
            assert!(q >= prev, "q({age}) = {q} < {prev}");
            prev = q;
        }
        let q65 = table.base_hazard(65);
        assert!((0.005..0.03).contains(&q65), "q65 {q65}");
    }

    #[test]
    fn past_table_end_death_is_certain() {
        let table = LifeTable::from_rates(60, vec![0.01, 0.02]);
        assert_eq!(table.base_hazard(61), 0.02);
        assert_eq!(table.base_hazard(62), 1.0);
        assert_eq!(table.base_hazard(50), 0.01);
    }

    #[test]
    fn health_multipliers_scale_hazard() {
        let model = LifeTableMortality::default();
        let base = model.hazard(70, HealthStatus::Good);
        assert!((model.hazard(70, HealthStatus::Excellent) - base * 0.7).abs() < 1e-12);
        assert!((model.hazard(70, HealthStatus::Fair) - base * 1.5).abs() < 1e-12);
        assert!((model.hazard(70, HealthStatus::Poor) - base * 2.2).abs() < 1e-12);
    }

    #[test]
    fn adjusted_hazard_never_exceeds_one() {
        let model = LifeTableMortality::new(LifeTable::from_rates(0, vec![0.8; 120]));
        assert_eq!(model.hazard(90, HealthStatus::Poor), 1.0);
    }

    #[test]
    fn poor_health_dies_sooner_on_average() {
        let model = LifeTableMortality::default();
        let mean_death_age = |health: HealthStatus, seed: u64| {
            let mut rng = SimRng::new(seed);
            let n = 4_000;
            let mut total = 0_u64;
            for _ in 0..n {
                let mut age = 65;
                while age < 120 && model.step_survival(age, health, &mut rng) {
                    age += 1;
                }
                total += age as u64;
            }
            total as f64 / n as f64
        };
        let excellent = mean_death_age(HealthStatus::Excellent, 1);
        let poor = mean_death_age(HealthStatus::Poor, 2);
        assert!(excellent > poor + 3.0, "excellent {excellent} poor {poor}");
    }
}
