//! Regime-switching annual return generator.
//!
//! Each regime shifts and scales the user's return assumptions in units of
//! the user's own volatility. With zero volatility every regime collapses to
//! the expected return, and the stationary-weighted drift is close to zero so
//! the expected return stays the long-run mean.

use log::trace;

use super::rng::SimRng;
use super::types::{MarketAssumptions, MarketRegime};

const MIN_RETURN: f64 = -0.95;
const MAX_RETURN: f64 = 2.5;
const MAX_VOLATILITY: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnualReturns {
    pub stock: f64,
    pub bond: f64,
    pub cash: f64,
}

pub trait ReturnModel: Send + Sync {
    fn initial_state(&self) -> MarketRegime;

    /// Draw the next regime and that year's returns.
    fn next_return(&self, state: MarketRegime, rng: &mut SimRng) -> (AnnualReturns, MarketRegime);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeParams {
    /// Added to the expected return, in multiples of the asset's volatility.
    pub stock_drift: f64,
    pub stock_vol_scale: f64,
    pub bond_drift: f64,
    pub bond_vol_scale: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegimeSwitchingModel {
    assumptions: MarketAssumptions,
    params: [RegimeParams; 4],
    /// Row = current regime, column = next regime, both in `MarketRegime::ALL` order.
    transitions: [[f64; 4]; 4],
}

impl RegimeSwitchingModel {
    pub fn new(assumptions: MarketAssumptions) -> Self {
        Self {
            assumptions,
            params: [
                RegimeParams {
                    stock_drift: 0.38,
                    stock_vol_scale: 0.8,
                    bond_drift: -0.11,
                    bond_vol_scale: 0.9,
                },
                RegimeParams {
                    stock_drift: 0.10,
                    stock_vol_scale: 1.0,
                    bond_drift: -0.01,
                    bond_vol_scale: 1.0,
                },
                RegimeParams {
                    stock_drift: -0.85,
                    stock_vol_scale: 1.3,
                    bond_drift: 0.20,
                    bond_vol_scale: 1.2,
                },
                RegimeParams {
                    stock_drift: -1.90,
                    stock_vol_scale: 2.0,
                    bond_drift: 0.45,
                    bond_vol_scale: 1.5,
                },
            ],
            transitions: [
                [0.70, 0.22, 0.06, 0.02],
                [0.20, 0.65, 0.12, 0.03],
                [0.15, 0.45, 0.35, 0.05],
                [0.10, 0.40, 0.20, 0.30],
            ],
        }
    }

    pub fn regime_params(&self, regime: MarketRegime) -> RegimeParams {
        self.params[regime.index()]
    }

    pub fn transition_row(&self, regime: MarketRegime) -> [f64; 4] {
        self.transitions[regime.index()]
    }

    /// Expected number of consecutive years spent in `regime` once entered.
    pub fn expected_duration(&self, regime: MarketRegime) -> f64 {
        let stay = self.transitions[regime.index()][regime.index()];
        1.0 / (1.0 - stay).max(1e-9)
    }

    /// Long-run share of years spent in each regime.
    pub fn stationary_distribution(&self) -> [f64; 4] {
        let mut dist = [0.25; 4];
        for _ in 0..500 {
            let mut next = [0.0; 4];
            for (from, weight) in dist.iter().enumerate() {
                for (to, slot) in next.iter_mut().enumerate() {
                    *slot += weight * self.transitions[from][to];
                }
            }
            dist = next;
        }
        dist
    }

    fn next_regime(&self, state: MarketRegime, rng: &mut SimRng) -> MarketRegime {
        let row = self.transitions[state.index()];
        let draw = rng.next_f64() * row.iter().sum::<f64>();
        let mut cumulative = 0.0;
        for (regime, p) in MarketRegime::ALL.iter().zip(row) {
            cumulative += p;
            if draw < cumulative {
                return *regime;
            }
        }
        state
    }
}

fn clamp_volatility(vol: f64) -> f64 {
    if vol.is_finite() {
        vol.clamp(0.0, MAX_VOLATILITY)
    } else {
        0.0
    }
}

fn clamp_return(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(MIN_RETURN, MAX_RETURN)
    } else {
        trace!("non-finite return draw replaced with 0");
        0.0
    }
}

impl ReturnModel for RegimeSwitchingModel {
    fn initial_state(&self) -> MarketRegime {
        MarketRegime::Normal
    }

    fn next_return(&self, state: MarketRegime, rng: &mut SimRng) -> (AnnualReturns, MarketRegime) {
        let regime = self.next_regime(state, rng);
        let p = self.params[regime.index()];
        let a = &self.assumptions;

        let stock_vol = clamp_volatility(a.stock_volatility);
        let bond_vol = clamp_volatility(a.bond_volatility);
        let z_stock = rng.standard_normal();
        let z_bond = rng.standard_normal();

        let stock = a.stock_return + stock_vol * (p.stock_drift + p.stock_vol_scale * z_stock);
        let bond = a.bond_return + bond_vol * (p.bond_drift + p.bond_vol_scale * z_bond);

        let returns = AnnualReturns {
            stock: clamp_return(stock),
            bond: clamp_return(bond),
            cash: clamp_return(a.cash_return),
        };
        (returns, regime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> RegimeSwitchingModel {
        RegimeSwitchingModel::new(MarketAssumptions::default())
    }

    #[test]
    fn transition_rows_are_distributions() {
        let m = model();
        for regime in MarketRegime::ALL {
            let row = m.transition_row(regime);
            assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-12);
            assert!(row.iter().all(|p| *p >= 0.0));
        }
    }

    #[test]
    fn stress_regimes_are_shorter_lived() {
        let m = model();
        let bull = m.expected_duration(MarketRegime::Bull);
        let normal = m.expected_duration(MarketRegime::Normal);
        for stress in [MarketRegime::Bear, MarketRegime::Crisis] {
            let d = m.expected_duration(stress);
            assert!(d < bull && d < normal, "{stress:?} lasts {d}");
        }
        let back_from_crisis = m.transition_row(MarketRegime::Crisis)[MarketRegime::Normal.index()]
            + m.transition_row(MarketRegime::Crisis)[MarketRegime::Bull.index()];
        let into_crisis = m.transition_row(MarketRegime::Normal)[MarketRegime::Crisis.index()];
        assert!(back_from_crisis > into_crisis);
    }

    #[test]
    fn stationary_drift_is_near_zero() {
        let m = model();
        let dist = m.stationary_distribution();
        let stock: f64 = MarketRegime::ALL
            .iter()
            .map(|r| dist[r.index()] * m.regime_params(*r).stock_drift)
            .sum();
        let bond: f64 = MarketRegime::ALL
            .iter()
            .map(|r| dist[r.index()] * m.regime_params(*r).bond_drift)
            .sum();
        assert!(stock.abs() < 0.01, "stock drift {stock}");
        assert!(bond.abs() < 0.01, "bond drift {bond}");
    }

    #[test]
    fn zero_volatility_returns_expected_values_in_every_regime() {
        let assumptions = MarketAssumptions {
            stock_volatility: 0.0,
            bond_volatility: 0.0,
            ..MarketAssumptions::default()
        };
        let m = RegimeSwitchingModel::new(assumptions);
        let mut rng = SimRng::new(9);
        let mut state = m.initial_state();
        for _ in 0..200 {
            let (r, next) = m.next_return(state, &mut rng);
            assert_eq!(r.stock, assumptions.stock_return);
            assert_eq!(r.bond, assumptions.bond_return);
            assert_eq!(r.cash, assumptions.cash_return);
            state = next;
        }
    }

    #[test]
    fn extreme_volatility_is_clamped_not_rejected() {
        let assumptions = MarketAssumptions {
            stock_volatility: 50.0,
            bond_volatility: f64::NAN,
            ..MarketAssumptions::default()
        };
        let m = RegimeSwitchingModel::new(assumptions);
        let mut rng = SimRng::new(1);
        let mut state = m.initial_state();
        for _ in 0..500 {
            let (r, next) = m.next_return(state, &mut rng);
            assert!((MIN_RETURN..=MAX_RETURN).contains(&r.stock));
            assert_eq!(r.bond, assumptions.bond_return);
            state = next;
        }
    }

    #[test]
    fn long_run_mean_tracks_expected_return() {
        let m = model();
        let mut rng = SimRng::new(2024);
        let mut state = m.initial_state();
        let n = 40_000;
        let mut sum = 0.0;
        for _ in 0..n {
            let (r, next) = m.next_return(state, &mut rng);
            sum += r.stock;
            state = next;
        }
        let mean = sum / n as f64;
        assert!((mean - 0.07).abs() < 0.01, "mean {mean}");
    }

    #[test]
    fn every_regime_is_visited() {
        let m = model();
        let mut rng = SimRng::new(5);
        let mut state = m.initial_state();
        let mut seen = [false; 4];
        for _ in 0..2_000 {
            let (_, next) = m.next_return(state, &mut rng);
            seen[next.index()] = true;
            state = next;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
