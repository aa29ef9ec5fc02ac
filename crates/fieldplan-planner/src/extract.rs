//! Duration and repeat hints pulled from free text such as "3일간 매일 관수".

use fieldplan_core::model::{LooseNumber, RawCandidate};

/// Repeat phrases, checked in this order.
const CYCLE_KEYWORDS: &[(&str, u32)] = &[
    ("매일", 1),
    ("매주", 7),
    ("격주", 14),
    ("매달", 30),
    ("한 달마다", 30),
];

fn unit_days(count: u32, rest: &str) -> Option<u32> {
    if rest.starts_with('일') {
        Some(count)
    } else if rest.starts_with('주') {
        count.checked_mul(7)
    } else if rest.starts_with("개월") || rest.starts_with('달') {
        count.checked_mul(30)
    } else if rest.starts_with("시간") {
        // Half-days round to even, minimum one day.
        let days = (f64::from(count) / 24.0).round_ties_even() as u32;
        Some(days.max(1))
    } else {
        None
    }
}

/// First `N일`, `N주`, `N개월`/`N달` or `N시간` in `text`, in days.
pub fn extract_period_days(text: &str) -> Option<u32> {
    let mut rest = text;
    while let Some(start) = rest.find(|c: char| c.is_ascii_digit()) {
        let tail = &rest[start..];
        let len = tail
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(tail.len());
        let (digits, after) = tail.split_at(len);
        if let Ok(count) = digits.parse::<u32>() {
            if let Some(days) = unit_days(count, after) {
                return Some(days);
            }
        }
        rest = after;
    }
    None
}

/// Repeat interval named by a phrase like `매주`.
pub fn extract_cycle_days(text: &str) -> Option<u32> {
    CYCLE_KEYWORDS
        .iter()
        .find(|(keyword, _)| text.contains(keyword))
        .map(|(_, days)| *days)
}

/// Fill a missing period or cycle from the candidate's content.
pub fn fill_from_content(candidate: &mut RawCandidate) {
    let Some(content) = candidate.task_content.as_deref() else {
        return;
    };
    if candidate.period.is_none() {
        candidate.period = extract_period_days(content).map(|d| LooseNumber::Int(i64::from(d)));
    }
    if candidate.cycle.is_none() {
        candidate.cycle = extract_cycle_days(content).map(|d| LooseNumber::Int(i64::from(d)));
    }
}
