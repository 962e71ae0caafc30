use std::collections::BTreeMap;

use chrono::Utc;

use super::params::MODEL_VERSION;
use super::types::{
    BandSeries, BandsMeta, BandsPart, BandsPerYear, BandsResult, ScorePart, ScoreResult,
};

pub const DEFAULT_LONGEVITY_CLAMP_AGE: u32 = 93;

/// Linear-interpolation percentile, `p` in 0..=100. Sorts `values` in place.
pub fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len();
    if n == 1 {
        return values[0];
    }

    let rank = (p / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        values[lower]
    } else {
        let w = rank - lower as f64;
        values[lower] * (1.0 - w) + values[upper] * w
    }
}

/// One worker's raw balances for a single simulated year.
#[derive(Debug, Clone, Default)]
pub struct YearSamples {
    pub age: u32,
    pub balances: Vec<f64>,
}

pub fn summarize_score(successes: u32, terminal_balances: &mut [f64]) -> ScorePart {
    ScorePart {
        successes,
        total: terminal_balances.len() as u32,
        median_ending_balance: percentile(terminal_balances, 50.0),
        percentile10: percentile(terminal_balances, 10.0),
        percentile90: percentile(terminal_balances, 90.0),
    }
}

fn band_of(age: u32, values: &mut [f64]) -> BandsPerYear {
    BandsPerYear {
        p05: percentile(values, 5.0),
        p25: percentile(values, 25.0),
        p50: percentile(values, 50.0),
        p75: percentile(values, 75.0),
        p95: percentile(values, 95.0),
        count: values.len() as u32,
        age,
    }
}

pub fn summarize_bands(samples: BTreeMap<u32, YearSamples>) -> BandsPart {
    samples
        .into_iter()
        .filter(|(_, s)| !s.balances.is_empty())
        .map(|(year, mut s)| (year, band_of(s.age, &mut s.balances)))
        .collect()
}

fn score_order_key(part: &ScorePart) -> (u32, u32, u64, u64, u64) {
    (
        part.total,
        part.successes,
        part.median_ending_balance.to_bits(),
        part.percentile10.to_bits(),
        part.percentile90.to_bits(),
    )
}

/// Sums counts exactly; the balance statistics are averaged with each worker
/// weighted by its share of iterations. Parts are put in a canonical order
/// first so the floating-point sums do not depend on arrival order.
pub fn merge_scores(parts: &[ScorePart]) -> ScorePart {
    let mut ordered: Vec<&ScorePart> = parts.iter().collect();
    ordered.sort_by_key(|p| score_order_key(p));

    let successes = ordered.iter().map(|p| p.successes).sum();
    let total: u32 = ordered.iter().map(|p| p.total).sum();
    if total == 0 {
        return ScorePart {
            successes,
            total,
            median_ending_balance: 0.0,
            percentile10: 0.0,
            percentile90: 0.0,
        };
    }

    let weighted = |stat: fn(&ScorePart) -> f64| -> f64 {
        ordered
            .iter()
            .map(|p| stat(p) * p.total as f64 / total as f64)
            .sum()
    };

    ScorePart {
        successes,
        total,
        median_ending_balance: weighted(|p| p.median_ending_balance),
        percentile10: weighted(|p| p.percentile10),
        percentile90: weighted(|p| p.percentile90),
    }
}

/// Rebuilds `count` points from five reported percentiles: the point at rank
/// `(i + 0.5) / count` takes the value of the band it falls into.
pub fn synthesize_points(band: &BandsPerYear) -> Vec<f64> {
    let count = band.count as usize;
    (0..count)
        .map(|i| {
            let q = (i as f64 + 0.5) / count as f64;
            if q < 0.05 {
                band.p05
            } else if q < 0.25 {
                band.p25
            } else if q < 0.50 {
                band.p50
            } else if q < 0.75 {
                band.p75
            } else {
                band.p95
            }
        })
        .collect()
}

/// Approximate merge of per-worker bands: synthesize each worker's points,
/// pool them per year, then recompute the five percentiles on the pool.
pub fn merge_bands(parts: &[BandsPart]) -> BandsPart {
    let mut pooled: BTreeMap<u32, YearSamples> = BTreeMap::new();
    for part in parts {
        for (year, band) in part {
            let entry = pooled.entry(*year).or_insert_with(|| YearSamples {
                age: band.age,
                balances: Vec::new(),
            });
            entry.balances.extend(synthesize_points(band));
        }
    }
    summarize_bands(pooled)
}

pub fn score_result(merged: ScorePart) -> ScoreResult {
    let success_probability = if merged.total == 0 {
        0.0
    } else {
        merged.successes as f64 / merged.total as f64
    };
    ScoreResult {
        successes: merged.successes,
        total: merged.total,
        median_ending_balance: merged.median_ending_balance,
        percentile10: merged.percentile10,
        percentile90: merged.percentile90,
        success_probability,
    }
}

/// Flattens merged bands into parallel series, dropping ages beyond
/// `longevity_age`.
pub fn bands_result(
    merged: &BandsPart,
    current_age: u32,
    longevity_age: u32,
    runs: u32,
) -> BandsResult {
    let mut ages = Vec::new();
    let mut percentiles = BandSeries::default();
    for band in merged.values().filter(|b| b.age <= longevity_age) {
        ages.push(band.age);
        percentiles.p05.push(band.p05);
        percentiles.p25.push(band.p25);
        percentiles.p50.push(band.p50);
        percentiles.p75.push(band.p75);
        percentiles.p95.push(band.p95);
    }

    BandsResult {
        ages,
        percentiles,
        meta: BandsMeta {
            current_age,
            longevity_age,
            runs,
            calculated_at: Utc::now().to_rfc3339(),
            model_version: MODEL_VERSION,
        },
    }
}
