use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use log::{debug, info, warn};
use tokio::task::JoinSet;

use super::aggregate::{YearSamples, summarize_bands, summarize_score};
use super::error::{SimError, SimResult};
use super::rng::SimRng;
use super::simulator::{ModelFactory, ParameterModels, PathSimulator, SimulationModels};
use super::types::{ParameterSet, PartialResult, ReportKind};

pub const MIN_WORKERS: usize = 2;
pub const MAX_WORKERS: usize = 8;
pub const WORKER_SEED_STRIDE: u64 = 1_000;

pub fn worker_count(available_cores: usize) -> usize {
    available_cores.clamp(MIN_WORKERS, MAX_WORKERS)
}

pub fn default_worker_count() -> usize {
    let cores = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(MIN_WORKERS);
    worker_count(cores)
}

/// Even split of `total` over `workers`; the first `total % workers` get one extra.
pub fn partition(total: u32, workers: usize) -> Vec<u32> {
    if workers == 0 {
        return Vec::new();
    }
    let workers_u32 = workers as u32;
    let base = total / workers_u32;
    let remainder = total % workers_u32;
    (0..workers_u32)
        .map(|idx| base + u32::from(idx < remainder))
        .collect()
}

pub fn worker_seed(base_seed: u64, worker_index: usize) -> u64 {
    base_seed.wrapping_add(worker_index as u64 * WORKER_SEED_STRIDE)
}

/// Cooperative cancellation flag, checked by workers between paths.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Runs `runs` paths with one worker-local RNG and summarizes them for `kind`.
pub fn run_partition(
    params: &ParameterSet,
    models: &SimulationModels,
    runs: u32,
    seed: u64,
    kind: ReportKind,
    cancel: &CancelToken,
) -> SimResult<PartialResult> {
    let simulator = PathSimulator::new(params, models);
    let mut rng = SimRng::new(seed);

    let mut successes = 0_u32;
    let mut terminal = Vec::with_capacity(runs as usize);
    let mut by_year: BTreeMap<u32, YearSamples> = BTreeMap::new();

    for _ in 0..runs {
        if cancel.is_cancelled() {
            return Err(SimError::Cancelled);
        }
        let path = simulator.simulate(&mut rng);
        match kind {
            ReportKind::Score => {
                successes += u32::from(path.success);
                terminal.push(path.terminal_balance);
            }
            ReportKind::Bands => {
                for record in &path.years {
                    let entry = by_year.entry(record.year).or_insert_with(|| YearSamples {
                        age: record.age,
                        balances: Vec::new(),
                    });
                    entry.balances.push(record.portfolio_balance);
                }
            }
        }
    }

    Ok(match kind {
        ReportKind::Score => PartialResult::Score(summarize_score(successes, &mut terminal)),
        ReportKind::Bands => PartialResult::Bands(summarize_bands(by_year)),
    })
}

/// Cancels the token on drop unless disarmed, so dropping the run future
/// stops the workers it spawned.
struct CancelOnDrop<'a> {
    token: &'a CancelToken,
    armed: bool,
}

impl<'a> CancelOnDrop<'a> {
    fn new(token: &'a CancelToken) -> Self {
        Self { token, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!("run ended early, stopping outstanding workers");
            self.token.cancel();
        }
    }
}

fn panic_reason(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "worker panicked".to_string()
    }
}

/// Fans `total_iterations` out over the default worker count.
pub async fn run(
    params: Arc<ParameterSet>,
    total_iterations: u32,
    kind: ReportKind,
    cancel: CancelToken,
) -> SimResult<Vec<PartialResult>> {
    run_with_workers(params, total_iterations, kind, default_worker_count(), cancel).await
}

pub async fn run_with_workers(
    params: Arc<ParameterSet>,
    total_iterations: u32,
    kind: ReportKind,
    workers: usize,
    cancel: CancelToken,
) -> SimResult<Vec<PartialResult>> {
    run_with_models(
        params,
        Arc::new(ParameterModels),
        total_iterations,
        kind,
        workers,
        cancel,
    )
    .await
}

/// Validates, then runs one blocking task per partition with models from
/// `models`. The first failure, whichever worker reports it, cancels the rest
/// and discards every partial result. Parts come back in worker order.
pub async fn run_with_models(
    params: Arc<ParameterSet>,
    models: Arc<dyn ModelFactory>,
    total_iterations: u32,
    kind: ReportKind,
    workers: usize,
    cancel: CancelToken,
) -> SimResult<Vec<PartialResult>> {
    params.validate()?;
    if total_iterations == 0 {
        return Err(SimError::Validation(
            "simulationCount must be > 0".to_string(),
        ));
    }

    let sizes = partition(total_iterations, workers.max(1));
    info!(
        "starting {kind:?} run: {total_iterations} paths over {} workers",
        sizes.len()
    );

    let guard = CancelOnDrop::new(&cancel);
    let mut tasks = JoinSet::new();
    for (index, &runs) in sizes.iter().enumerate() {
        let params = Arc::clone(&params);
        let models = Arc::clone(&models);
        let cancel = cancel.clone();
        let seed = worker_seed(params.seed, index);
        debug!("worker {index}: {runs} paths, seed {seed}");
        tasks.spawn_blocking(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                let models = models.build(&params, index);
                run_partition(&params, &models, runs, seed, kind, &cancel)
            }));
            let result = outcome.unwrap_or_else(|payload| {
                Err(SimError::WorkerFailed {
                    worker: index,
                    reason: panic_reason(payload),
                })
            });
            (index, result)
        });
    }

    let mut slots: Vec<Option<PartialResult>> = sizes.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        let (index, result) = match joined {
            Ok(finished) => finished,
            Err(join_error) => {
                // Join errors carry no worker index; blame the first unfinished one.
                let index = slots.iter().position(Option::is_none).unwrap_or(0);
                let err = SimError::WorkerFailed {
                    worker: index,
                    reason: join_error.to_string(),
                };
                (index, Err(err))
            }
        };
        match result {
            Ok(part) => slots[index] = Some(part),
            Err(err) => {
                warn!("worker {index} aborted the run: {err}");
                cancel.cancel();
                return Err(err);
            }
        }
    }
    guard.disarm();

    let parts: Vec<PartialResult> = slots.into_iter().flatten().collect();
    info!("{kind:?} run finished: {} partial results", parts.len());
    Ok(parts)
}
