//! Candidate normalization: the single place raw planner shapes are decoded.
//!
//! Pure functions. The fatal inputs are a missing or unparseable start date
//! and a period longer than [`MAX_PERIOD_DAYS`]; every other numeric field
//! falls back to a documented default.

use crate::error::PlanError;
use crate::model::{
    mentions_pest, LooseNumber, NewTask, RawCandidate, RawPatch, StartInput, TaskPatch,
    DEFAULT_PRIORITY, MAX_PERIOD_DAYS, MAX_PRIORITY, MIN_PRIORITY,
};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

const DEFAULT_PERIOD: u32 = 1;
const DEFAULT_CYCLE: u32 = 0;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

/// Turn a raw candidate into a [`NewTask`] anchored in `offset`.
pub fn normalize(raw: &RawCandidate, offset: FixedOffset) -> Result<NewTask, PlanError> {
    let start_input = raw
        .start_date
        .as_ref()
        .ok_or_else(|| PlanError::InvalidScheduleInput("missing start_date".into()))?;
    let start_date = parse_start(start_input, offset)?;

    let task_content = raw
        .task_content
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    let period = coerce_period(raw.period.as_ref())?;
    let repeat_interval_hint = coerce_count(raw.cycle.as_ref()).unwrap_or(DEFAULT_CYCLE);

    Ok(NewTask {
        task_name: raw.task_name.trim().to_string(),
        is_pest: mentions_pest(&task_content),
        task_content,
        priority: coerce_priority(raw.priority.as_ref()),
        period,
        repeat_interval_hint,
        start_date,
    })
}

/// Resolve a start value to the start of its calendar day in `offset`.
///
/// Zoned instants are first converted into `offset`, so the calendar day is
/// always the one observed in the configured zone.
pub fn parse_start(input: &StartInput, offset: FixedOffset) -> Result<DateTime<FixedOffset>, PlanError> {
    let day = match input {
        StartInput::Date(d) => *d,
        StartInput::Naive(dt) => dt.date(),
        StartInput::Zoned(dt) => dt.with_timezone(&offset).date_naive(),
        StartInput::Text(text) => parse_day_text(text, offset)?,
    };
    day_start(day, offset)
}

/// Midnight of `day` in `offset`.
pub fn day_start(day: NaiveDate, offset: FixedOffset) -> Result<DateTime<FixedOffset>, PlanError> {
    day.and_time(NaiveTime::MIN)
        .and_local_timezone(offset)
        .single()
        .ok_or_else(|| PlanError::InvalidScheduleInput(format!("cannot localize {day}")))
}

fn parse_day_text(text: &str, offset: FixedOffset) -> Result<NaiveDate, PlanError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PlanError::InvalidScheduleInput("empty start_date".into()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&offset).date_naive());
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Ok(dt.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return Ok(d);
        }
    }

    Err(PlanError::InvalidScheduleInput(format!(
        "unparseable start_date '{text}'"
    )))
}

/// Coerce a loose number to a non-negative count by keeping only its digits.
///
/// Returns `None` when nothing numeric remains, so callers apply their default.
pub fn coerce_count(value: Option<&LooseNumber>) -> Option<u32> {
    match value? {
        LooseNumber::Int(i) => u32::try_from(i.unsigned_abs()).ok(),
        LooseNumber::Float(f) if f.is_finite() => Some(f.abs().trunc().min(f64::from(u32::MAX)) as u32),
        LooseNumber::Float(_) => None,
        LooseNumber::Text(s) => strip_digits(s),
    }
}

/// Digits of `s` parsed as a number, e.g. `"3일"` → 3.
pub fn strip_digits(s: &str) -> Option<u32> {
    let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Period in days: missing or non-numeric is one day, zero becomes one, and
/// anything past [`MAX_PERIOD_DAYS`] is rejected.
pub fn coerce_period(value: Option<&LooseNumber>) -> Result<u32, PlanError> {
    let period = coerce_count(value).unwrap_or(DEFAULT_PERIOD).max(1);
    if period > MAX_PERIOD_DAYS {
        return Err(PlanError::InvalidScheduleInput(format!(
            "period {period} exceeds {MAX_PERIOD_DAYS} days"
        )));
    }
    Ok(period)
}

/// Integer priority clamped to the domain range; anything else is the default.
pub fn coerce_priority(value: Option<&LooseNumber>) -> i64 {
    let parsed = match value {
        Some(LooseNumber::Int(i)) => Some(*i),
        Some(LooseNumber::Float(f)) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
        Some(LooseNumber::Text(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed
        .map(|p| p.clamp(MIN_PRIORITY, MAX_PRIORITY))
        .unwrap_or(DEFAULT_PRIORITY)
}

/// Decode a partial update with the same rules as [`normalize`]. A bad start
/// date, an oversized period or an emptied name is rejected.
pub fn normalize_patch(raw: &RawPatch, offset: FixedOffset) -> Result<TaskPatch, PlanError> {
    let task_name = match raw.task_name.as_deref().map(str::trim) {
        Some("") => {
            return Err(PlanError::InvalidScheduleInput(
                "task_name cannot be empty".into(),
            ))
        }
        other => other.map(str::to_string),
    };
    let start_date = raw
        .start_date
        .as_ref()
        .map(|s| parse_start(s, offset))
        .transpose()?;

    Ok(TaskPatch {
        task_name,
        task_content: raw.task_content.as_deref().map(|c| c.trim().to_string()),
        priority: raw.priority.as_ref().map(|p| coerce_priority(Some(p))),
        period: raw
            .period
            .as_ref()
            .map(|p| coerce_period(Some(p)))
            .transpose()?,
        start_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn kst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    #[test]
    fn test_normalize_defaults() {
        let raw = RawCandidate::new("물주기", "매일 물을 준다", "2025-06-01");
        let task = normalize(&raw, kst()).unwrap();
        assert_eq!(task.period, 1);
        assert_eq!(task.repeat_interval_hint, 0);
        assert_eq!(task.priority, DEFAULT_PRIORITY);
        assert!(!task.is_pest);
        assert_eq!(task.first_day(), NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(task.start_date.hour(), 0);
        assert_eq!(task.start_date.offset().local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn test_normalize_strips_non_digits() {
        let raw = RawCandidate::new("방제", "진딧물 방제", "2025-06-01")
            .with_period("3일")
            .with_cycle("7일마다");
        let task = normalize(&raw, kst()).unwrap();
        assert_eq!(task.period, 3);
        assert_eq!(task.repeat_interval_hint, 7);
        assert!(task.is_pest);
    }

    #[test]
    fn test_normalize_empty_numeric_text_defaults() {
        let raw = RawCandidate::new("관찰", "", "2025-06-01")
            .with_period("며칠")
            .with_cycle("");
        let task = normalize(&raw, kst()).unwrap();
        assert_eq!(task.period, 1);
        assert_eq!(task.repeat_interval_hint, 0);
    }

    #[test]
    fn test_normalize_zero_period_is_one_day() {
        let raw = RawCandidate::new("관찰", "", "2025-06-01").with_period(0_i64);
        assert_eq!(normalize(&raw, kst()).unwrap().period, 1);
    }

    #[test]
    fn test_normalize_rejects_oversized_period() {
        let raw = RawCandidate::new("물주기", "매일 물을 준다", "2025-06-01").with_period("999999999일");
        assert!(matches!(
            normalize(&raw, kst()),
            Err(PlanError::InvalidScheduleInput(_))
        ));

        let raw = RawCandidate::new("물주기", "", "2025-06-01").with_period(i64::from(MAX_PERIOD_DAYS));
        assert_eq!(normalize(&raw, kst()).unwrap().period, MAX_PERIOD_DAYS);

        let mut raw = RawCandidate::new("물주기", "", "2025-06-01");
        raw.period = Some(LooseNumber::Float(1.0e12));
        assert!(normalize(&raw, kst()).is_err());
    }

    #[test]
    fn test_normalize_missing_or_bad_date_fails() {
        let mut raw = RawCandidate::new("관찰", "", "2025-06-01");
        raw.start_date = None;
        assert!(matches!(
            normalize(&raw, kst()),
            Err(PlanError::InvalidScheduleInput(_))
        ));

        let raw = RawCandidate::new("관찰", "", "next tuesday");
        assert!(matches!(
            normalize(&raw, kst()),
            Err(PlanError::InvalidScheduleInput(_))
        ));

        let raw = RawCandidate::new("관찰", "", "2025-02-30");
        assert!(normalize(&raw, kst()).is_err());
    }

    #[test]
    fn test_parse_start_zoned_converts_to_configured_day() {
        // 20:00 UTC on June 1st is already June 2nd in +09:00.
        let start = parse_start(&"2025-06-01T20:00:00Z".into(), kst()).unwrap();
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
    }

    #[test]
    fn test_parse_start_naive_datetime_keeps_day() {
        let start = parse_start(&"2025-06-01T23:30:00".into(), kst()).unwrap();
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(start.hour(), 0);
    }

    #[test]
    fn test_priority_coercion() {
        assert_eq!(coerce_priority(Some(&LooseNumber::Int(1))), 1);
        assert_eq!(coerce_priority(Some(&LooseNumber::Int(9))), 3);
        assert_eq!(coerce_priority(Some(&LooseNumber::Text("2".into()))), 2);
        assert_eq!(coerce_priority(Some(&LooseNumber::Text("high".into()))), 3);
        assert_eq!(coerce_priority(Some(&LooseNumber::Float(1.5))), 3);
        assert_eq!(coerce_priority(None), 3);
    }

    #[test]
    fn test_name_is_not_truncated_before_persistence() {
        let long = "가".repeat(80);
        let raw = RawCandidate::new(&long, "", "2025-06-01");
        let task = normalize(&raw, kst()).unwrap();
        assert_eq!(task.task_name.chars().count(), 80);
        assert_eq!(task.stored_name().chars().count(), 50);
    }

    #[test]
    fn test_normalize_patch() {
        let raw = RawPatch {
            task_name: Some(" 관수 ".into()),
            period: Some(LooseNumber::Text("4일".into())),
            priority: Some(LooseNumber::Int(0)),
            start_date: Some("2025-06-03".into()),
            ..RawPatch::default()
        };
        let patch = normalize_patch(&raw, kst()).unwrap();
        assert_eq!(patch.task_name.as_deref(), Some("관수"));
        assert_eq!(patch.period, Some(4));
        assert_eq!(patch.priority, Some(1));
        assert!(patch.touches_range());
        assert!(patch.task_content.is_none());

        assert!(normalize_patch(&RawPatch::default(), kst()).unwrap().is_empty());
    }

    #[test]
    fn test_normalize_patch_rejects_bad_input() {
        let bad_date = RawPatch {
            start_date: Some("soon".into()),
            ..RawPatch::default()
        };
        assert!(normalize_patch(&bad_date, kst()).is_err());

        let long_period = RawPatch {
            period: Some(LooseNumber::Int(50_000_000)),
            ..RawPatch::default()
        };
        assert!(matches!(
            normalize_patch(&long_period, kst()),
            Err(PlanError::InvalidScheduleInput(_))
        ));

        let empty_name = RawPatch {
            task_name: Some("  ".into()),
            ..RawPatch::default()
        };
        assert!(matches!(
            normalize_patch(&empty_name, kst()),
            Err(PlanError::InvalidScheduleInput(_))
        ));
    }
}
