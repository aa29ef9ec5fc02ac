//! Calendar view: expand tasks into per-day occurrences and prune clutter.

use crate::model::{DayRange, Task};
use crate::similarity::SimilarityIndex;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One task shown on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgendaEntry {
    #[serde(flatten)]
    pub task: Task,
    pub date: NaiveDate,
}

/// Knobs for [`daily_agenda`].
#[derive(Debug, Clone, Copy)]
pub struct AgendaOptions {
    pub max_per_day: usize,
    pub threshold: f64,
}

impl Default for AgendaOptions {
    fn default() -> Self {
        Self {
            max_per_day: 2,
            threshold: 0.85,
        }
    }
}

/// Group every in-window day of every task by date.
pub fn expand(tasks: &[Task], window: DayRange) -> BTreeMap<NaiveDate, Vec<&Task>> {
    let mut by_day: BTreeMap<NaiveDate, Vec<&Task>> = BTreeMap::new();
    for task in tasks {
        if let Some(visible) = task.occupied_range().intersect(&window) {
            for day in visible.days() {
                by_day.entry(day).or_default().push(task);
            }
        }
    }
    by_day
}

/// Build the pruned, date-ordered agenda for `window`.
///
/// Per day, candidates are ranked by priority (urgent first) then by longer
/// period, and kept greedily unless their name-plus-content text
/// near-duplicates something already kept that day or kept on the previous
/// day. At most `max_per_day` survive.
pub fn daily_agenda(tasks: &[Task], window: DayRange, opts: AgendaOptions) -> Vec<AgendaEntry> {
    let mut out = Vec::new();
    let mut prev: Option<(NaiveDate, Vec<&Task>)> = None;

    for (date, mut candidates) in expand(tasks, window) {
        candidates.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(b.period.cmp(&a.period))
                .then(a.start_date.cmp(&b.start_date))
                .then(a.task_id.cmp(&b.task_id))
        });

        let carried: Vec<&Task> = match prev.take() {
            Some((prev_date, kept)) if prev_date + Duration::days(1) == date => kept,
            _ => Vec::new(),
        };

        let texts: Vec<_> = carried
            .iter()
            .chain(candidates.iter())
            .map(|t| t.text())
            .collect();
        let index = SimilarityIndex::fit(&texts);

        // Indices into `texts` of everything a candidate is compared against.
        let mut blockers: Vec<usize> = (0..carried.len()).collect();
        let mut kept: Vec<&Task> = Vec::new();

        for (offset, &candidate) in candidates.iter().enumerate() {
            if kept.len() >= opts.max_per_day {
                break;
            }
            let idx = carried.len() + offset;
            let duplicate = blockers
                .iter()
                .any(|&other| index.full_score(idx, other) >= opts.threshold);
            if duplicate {
                tracing::debug!(
                    "agenda {date}: pruned '{}' as near-duplicate",
                    candidate.task_name
                );
                continue;
            }
            blockers.push(idx);
            kept.push(candidate);
        }

        out.extend(kept.iter().map(|t| AgendaEntry {
            task: (*t).clone(),
            date,
        }));
        prev = Some((date, kept));
    }

    out
}

/// `done / total * 100`, truncated; zero when there are no rows.
pub fn completion_rate(done: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    (done.min(total) * 100 / total) as u32
}
