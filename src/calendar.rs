//! Calendar queries: the pruned daily agenda and completion rates.

use chrono::NaiveDate;
use fieldplan_core::{
    aggregate::{daily_agenda, AgendaEntry, AgendaOptions},
    config::ScheduleConfig,
    error::PlanError,
    model::DayRange,
};
use fieldplan_store::Store;
use serde::{Deserialize, Serialize};

/// Window selection shared by the API and the CLI: either `from`/`to`
/// (a lone `from` is one day) or `year`/`month`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WindowQuery {
    pub owner: i64,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub field: Option<i64>,
}

impl WindowQuery {
    pub fn window(&self) -> Result<DayRange, PlanError> {
        let invalid = |msg: &str| PlanError::InvalidScheduleInput(msg.to_string());
        match (self.from, self.to, self.year, self.month) {
            (Some(from), to, None, None) => {
                DayRange::new(from, to.unwrap_or(from)).ok_or_else(|| invalid("`to` is before `from`"))
            }
            (None, None, Some(year), Some(month)) => {
                DayRange::month(year, month).ok_or_else(|| invalid("month must be 1-12"))
            }
            _ => Err(invalid("give either from[/to] or year and month")),
        }
    }
}

pub fn agenda_options(config: &ScheduleConfig) -> AgendaOptions {
    AgendaOptions {
        max_per_day: config.max_per_day,
        threshold: config.display_threshold,
    }
}

/// Date-ordered agenda for the window, capped and de-cluttered per day.
pub async fn agenda(
    store: &Store,
    query: &WindowQuery,
    opts: AgendaOptions,
) -> Result<Vec<AgendaEntry>, PlanError> {
    let window = query.window()?;
    let tasks = store.tasks_in_window(query.owner, window, query.field).await?;
    Ok(daily_agenda(&tasks, window, opts))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Completion {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub done: u64,
    pub total: u64,
    /// Percent, truncated.
    pub rate: u32,
}

pub async fn completion(store: &Store, query: &WindowQuery) -> Result<Completion, PlanError> {
    let window = query.window()?;
    let counts = store.progress_counts(query.owner, window, query.field).await?;
    Ok(Completion {
        from: window.start,
        to: window.end,
        done: counts.done,
        total: counts.total,
        rate: counts.rate(),
    })
}
