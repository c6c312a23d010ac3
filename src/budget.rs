use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::sync::Mutex;
use tracing::warn;

/// Snapshot of spend against the configured ceilings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetStatus {
    pub daily_spend: f64,
    pub monthly_spend: f64,
    pub daily_limit: f64,
    pub monthly_limit: f64,
    pub daily_ratio: f64,
    pub monthly_ratio: f64,
    pub alert_threshold: f64,
    pub within_budget: bool,
    pub last_reset_date: NaiveDate,
}

#[derive(Debug)]
struct BudgetState {
    daily_spend: f64,
    monthly_spend: f64,
    last_reset_date: NaiveDate,
}

/// Tracks spend against daily and monthly limits.
///
/// Crossing the alert threshold only flips `within_budget`; spending is
/// never refused.
#[derive(Debug)]
pub struct BudgetManager {
    daily_limit: f64,
    monthly_limit: f64,
    alert_threshold: f64,
    state: Mutex<BudgetState>,
}

impl BudgetManager {
    pub fn new(daily_limit: f64, monthly_limit: f64, alert_threshold: f64) -> Self {
        Self::starting_on(daily_limit, monthly_limit, alert_threshold, Local::now().date_naive())
    }

    pub fn starting_on(daily_limit: f64, monthly_limit: f64, alert_threshold: f64, date: NaiveDate) -> Self {
        Self {
            daily_limit,
            monthly_limit,
            alert_threshold,
            state: Mutex::new(BudgetState {
                daily_spend: 0.0,
                monthly_spend: 0.0,
                last_reset_date: date,
            }),
        }
    }

    /// Add `amount` to both counters; returns whether spend stays under the alert threshold
    pub fn record_cost(&self, amount: f64) -> bool {
        self.record_cost_at(amount, Local::now().naive_local())
    }

    pub fn record_cost_at(&self, amount: f64, now: NaiveDateTime) -> bool {
        let amount = if amount.is_finite() && amount >= 0.0 {
            amount
        } else {
            warn!(amount, "Ignoring invalid cost amount");
            0.0
        };

        let mut state = self.lock();
        roll_over(&mut state, now.date());

        state.daily_spend += amount;
        state.monthly_spend += amount;

        self.within(&state)
    }

    pub fn status(&self) -> BudgetStatus {
        self.status_at(Local::now().naive_local())
    }

    pub fn status_at(&self, now: NaiveDateTime) -> BudgetStatus {
        let mut state = self.lock();
        roll_over(&mut state, now.date());

        let (daily_ratio, monthly_ratio) = self.ratios(&state);
        BudgetStatus {
            daily_spend: state.daily_spend,
            monthly_spend: state.monthly_spend,
            daily_limit: self.daily_limit,
            monthly_limit: self.monthly_limit,
            daily_ratio,
            monthly_ratio,
            alert_threshold: self.alert_threshold,
            within_budget: self.within(&state),
            last_reset_date: state.last_reset_date,
        }
    }

    pub fn daily_limit(&self) -> f64 {
        self.daily_limit
    }

    fn ratios(&self, state: &BudgetState) -> (f64, f64) {
        (
            state.daily_spend / self.daily_limit,
            state.monthly_spend / self.monthly_limit,
        )
    }

    fn within(&self, state: &BudgetState) -> bool {
        let (daily, monthly) = self.ratios(state);
        daily <= self.alert_threshold && monthly <= self.alert_threshold
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BudgetState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Zero the counters whose calendar period has ended
fn roll_over(state: &mut BudgetState, today: NaiveDate) {
    if today == state.last_reset_date {
        return;
    }

    let last = state.last_reset_date;
    if today.year() != last.year() || today.month() != last.month() {
        state.monthly_spend = 0.0;
    }
    state.daily_spend = 0.0;
    state.last_reset_date = today;
}
