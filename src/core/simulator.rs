use super::contributions::ContributionScheduler;
use super::ltc::{LifetimeEpisodeModel, LtcCoverage, LtcEpisode, LtcModel, coverage_for};
use super::market::{RegimeSwitchingModel, ReturnModel};
use super::mortality::{LifeTableMortality, MortalityModel};
use super::rng::SimRng;
use super::tax::{TaxEngine, tax_engine_for};
use super::types::{IncomeStream, ParameterSet, Person, Phase, SimulationPath, YearRecord};
use super::withdrawal::{SpendingNeed, TaxYear, WithdrawalEngine};

/// Swappable stochastic models shared read-only by every worker.
pub struct SimulationModels {
    pub market: Box<dyn ReturnModel>,
    pub mortality: Box<dyn MortalityModel>,
    pub ltc: Box<dyn LtcModel>,
    pub ltc_coverage: Box<dyn LtcCoverage>,
    pub tax: Box<dyn TaxEngine>,
}

impl SimulationModels {
    pub fn from_params(params: &ParameterSet) -> Self {
        Self {
            market: Box::new(RegimeSwitchingModel::new(params.market)),
            mortality: Box::new(LifeTableMortality::default()),
            ltc: Box::new(LifetimeEpisodeModel::new(params.ltc)),
            ltc_coverage: coverage_for(&params.ltc),
            tax: tax_engine_for(&params.tax),
        }
    }
}

/// Builds the models one worker runs with. Called once per worker, on that
/// worker's thread.
pub trait ModelFactory: Send + Sync {
    fn build(&self, params: &ParameterSet, worker: usize) -> SimulationModels;
}

/// Models derived from the parameter set alone, identical for every worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterModels;

impl ModelFactory for ParameterModels {
    fn build(&self, params: &ParameterSet, _worker: usize) -> SimulationModels {
        SimulationModels::from_params(params)
    }
}

#[derive(Debug, Clone, Copy)]
struct PersonState {
    alive: bool,
    episode: Option<LtcEpisode>,
    had_episode: bool,
}

impl PersonState {
    fn new() -> Self {
        Self {
            alive: true,
            episode: None,
            had_episode: false,
        }
    }
}

pub struct PathSimulator<'a> {
    params: &'a ParameterSet,
    models: &'a SimulationModels,
    contributions: ContributionScheduler,
}

impl<'a> PathSimulator<'a> {
    pub fn new(params: &'a ParameterSet, models: &'a SimulationModels) -> Self {
        Self {
            params,
            models,
            contributions: ContributionScheduler::new(params.contributions),
        }
    }

    /// Runs one trajectory from today until both people have died or the
    /// primary passes the horizon age.
    pub fn simulate(&self, rng: &mut SimRng) -> SimulationPath {
        let params = self.params;
        let inflation = params.market.inflation;
        let mut engine = WithdrawalEngine::new(params, self.models.tax.as_ref());
        let mut regime = self.models.market.initial_state();

        let mut primary = PersonState::new();
        let mut spouse = params.spouse.as_ref().map(|_| PersonState::new());
        let span = params.horizon_age.saturating_sub(params.primary.current_age) + 1;
        let mut years = Vec::with_capacity(span as usize);

        let mut year = 0_u32;
        loop {
            let age = params.primary.current_age + year;
            let spouse_age = params.spouse.as_ref().map(|s| s.current_age + year);
            if age > params.horizon_age {
                break;
            }

            primary.alive &= age < params.primary.life_expectancy_ceiling;
            if let (Some(state), Some(person), Some(s_age)) =
                (spouse.as_mut(), params.spouse.as_ref(), spouse_age)
            {
                state.alive &= s_age < person.life_expectancy_ceiling;
            }
            let spouse_alive = spouse.map(|s| s.alive).unwrap_or(false);
            if !primary.alive && !spouse_alive {
                break;
            }

            let price_index = (1.0 + inflation).powi(year as i32);
            let (returns, next_regime) = self.models.market.next_return(regime, rng);
            regime = next_regime;

            let mut ltc_cost = self.ltc_cost(&params.primary, &mut primary, age, year, price_index, rng);
            if let (Some(state), Some(person), Some(s_age)) =
                (spouse.as_mut(), params.spouse.as_ref(), spouse_age)
            {
                ltc_cost += self.ltc_cost(person, state, s_age, year, price_index, rng);
            }

            let guaranteed_income = self.guaranteed_income(year, price_index, primary.alive, spouse_alive);

            engine.begin_year(year);
            let (withdrawal, tax_paid) = match engine.phase() {
                Phase::Accumulating => {
                    engine.contribute(self.contributions.schedule(year, age));
                    (0.0, 0.0)
                }
                Phase::Withdrawing => {
                    let need = self.spending_need(year, price_index, ltc_cost, primary.alive, spouse_alive);
                    let tax_year = TaxYear {
                        filing_status: params.filing_status(primary.alive && spouse_alive),
                        state: &params.tax.state,
                        calendar_year: params.tax.base_year + year as i32,
                        ordinary_base: guaranteed_income,
                    };
                    let outcome = engine.withdraw_year(year, need, guaranteed_income, tax_year);
                    (outcome.withdrawn_gross, outcome.tax_paid)
                }
                Phase::Depleted => (0.0, 0.0),
            };
            engine.apply_returns(&returns);

            let end_of_year_index = price_index * (1.0 + inflation);
            years.push(YearRecord {
                year,
                age,
                spouse_age,
                market_regime: regime,
                phase: engine.phase(),
                portfolio_balance: (engine.balance() / end_of_year_index).max(0.0),
                withdrawal: withdrawal / price_index,
                guaranteed_income: guaranteed_income / price_index,
                tax_paid: tax_paid / price_index,
                ltc_cost: ltc_cost / price_index,
                alive_self: primary.alive,
                alive_spouse: spouse_alive,
            });

            if primary.alive {
                primary.alive = self.models.mortality.step_survival(age, params.primary.health, rng);
            }
            if let (Some(state), Some(person), Some(s_age)) =
                (spouse.as_mut(), params.spouse.as_ref(), spouse_age)
            {
                if state.alive {
                    state.alive = self.models.mortality.step_survival(s_age, person.health, rng);
                }
            }
            year += 1;
        }

        let last = years.last();
        let last_balance = last.map(|r| r.portfolio_balance).unwrap_or(0.0);
        let last_age = last.map(|r| r.age).unwrap_or(params.primary.current_age);
        let terminal_balance = if params.legacy_goal > 0.0 && last_age < params.horizon_age {
            project_to_horizon(params, last_balance, params.horizon_age - last_age)
        } else {
            last_balance
        };
        let success = if params.legacy_goal > 0.0 {
            terminal_balance >= params.legacy_goal
        } else {
            terminal_balance > 0.0
        };

        SimulationPath {
            years,
            depleted_year: engine.depleted_year(),
            terminal_balance,
            success,
        }
    }

    fn ltc_cost(
        &self,
        person: &Person,
        state: &mut PersonState,
        age: u32,
        year: u32,
        price_index: f64,
        rng: &mut SimRng,
    ) -> f64 {
        if !state.alive {
            return 0.0;
        }
        if !state.had_episode {
            if let Some(episode) = self.models.ltc.maybe_trigger_episode(person, age, rng) {
                state.episode = Some(episode);
                state.had_episode = true;
            }
        }
        let Some(episode) = state.episode else {
            return 0.0;
        };
        if !episode.is_active(age) {
            return 0.0;
        }
        let cost = episode.nominal_cost(year);
        let covered = self
            .models
            .ltc_coverage
            .covered(age - episode.onset_age, cost, price_index);
        (cost - covered).max(0.0)
    }

    fn guaranteed_income(&self, year: u32, price_index: f64, primary_alive: bool, spouse_alive: bool) -> f64 {
        let params = self.params;
        let mut total = person_income(&params.primary, year, price_index, primary_alive, spouse_alive);
        if let Some(spouse) = &params.spouse {
            total += person_income(spouse, year, price_index, spouse_alive, primary_alive);
        }
        total
    }

    fn spending_need(
        &self,
        year: u32,
        price_index: f64,
        ltc_cost: f64,
        primary_alive: bool,
        spouse_alive: bool,
    ) -> SpendingNeed {
        let params = self.params;
        let base = params.annual_expenses * price_index;
        let survivor_only = params.spouse.is_some() && !(primary_alive && spouse_alive);
        let survivor_factor = if survivor_only {
            params.survivor_expense_factor
        } else {
            1.0
        };

        SpendingNeed {
            essential: base * (1.0 - params.discretionary_fraction),
            discretionary: base * params.discretionary_fraction * survivor_factor,
            healthcare: params.healthcare_annual
                * (1.0 + params.healthcare_inflation).powi(year as i32),
            ltc: ltc_cost,
        }
    }
}

fn stream_amount(stream: &IncomeStream, owner_age: u32, price_index: f64) -> f64 {
    let started = owner_age >= stream.start_age;
    let ended = stream.end_age.is_some_and(|end| owner_age >= end);
    if !started || ended {
        return 0.0;
    }
    if stream.inflation_indexed {
        stream.annual_amount * price_index
    } else {
        stream.annual_amount
    }
}

fn person_income(
    person: &Person,
    year: u32,
    price_index: f64,
    owner_alive: bool,
    partner_alive: bool,
) -> f64 {
    let age = person.current_age + year;
    person
        .income_streams
        .iter()
        .map(|stream| {
            let amount = stream_amount(stream, age, price_index);
            if owner_alive {
                amount
            } else if partner_alive {
                amount * stream.survivor_share
            } else {
                0.0
            }
        })
        .sum()
}

/// Closed-form value at the horizon of a balance left untouched after the
/// household's last death, compounding at the expected real return.
pub fn project_to_horizon(params: &ParameterSet, real_balance: f64, years: u32) -> f64 {
    if real_balance <= 0.0 {
        return 0.0;
    }
    let real_return =
        (1.0 + params.expected_portfolio_return()) / (1.0 + params.market.inflation) - 1.0;
    (real_balance * (1.0 + real_return).powi(years as i32)).max(0.0)
}
