//! Decode generator output into candidates and keywords.
//!
//! Output shapes are loose: fenced or bare JSON, keys with stray text,
//! single entries that do not decode. Bad entries are dropped with a
//! warning; output that is not JSON at all yields nothing.

use crate::extract::fill_from_content;
use chrono::NaiveDate;
use fieldplan_core::model::{decode_keywords, KeywordInput, RawCandidate, StartInput};
use fieldplan_core::normalize::strip_digits;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// Daily runs keep at most this many candidates.
pub const DAILY_MAX_CANDIDATES: usize = 3;

/// The JSON document inside `text`: a fenced block if present, otherwise the
/// span from the first `[` or `{` to the last matching closer.
pub fn json_payload(text: &str) -> &str {
    let text = text.trim();
    if let Some(start) = text.find("```") {
        let body = &text[start + 3..];
        let body = body.find('\n').map_or(body, |nl| &body[nl + 1..]);
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }

    let open = text.find(&['[', '{'][..]);
    let close = text.rfind(&[']', '}'][..]);
    match (open, close) {
        (Some(o), Some(c)) if o < c => &text[o..=c],
        _ => text,
    }
}

fn parse(label: &str, text: &str) -> Option<Value> {
    match serde_json::from_str(json_payload(text)) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{label}: generator output is not JSON ({e}), no candidates");
            None
        }
    }
}

fn candidates_from(label: &str, items: Vec<Value>) -> Vec<RawCandidate> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<RawCandidate>(item) {
            Ok(mut c) if !c.task_name.trim().is_empty() => {
                fill_from_content(&mut c);
                Some(c)
            }
            Ok(_) => {
                warn!("{label}: dropping candidate without task_name");
                None
            }
            Err(e) => {
                warn!("{label}: dropping undecodable candidate: {e}");
                None
            }
        })
        .collect()
}

fn list_of(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum KeywordOutput {
    List(Vec<KeywordInput>),
    Wrapped { keywords: Vec<KeywordInput> },
}

/// Keyword list, bare or wrapped in `{"keywords": [...]}`.
pub fn decode_keyword_output(text: &str) -> Vec<String> {
    let Some(value) = parse("keywords", text) else {
        return Vec::new();
    };
    match serde_json::from_value::<KeywordOutput>(value) {
        Ok(KeywordOutput::List(items)) | Ok(KeywordOutput::Wrapped { keywords: items }) => {
            decode_keywords(items)
        }
        Err(e) => {
            warn!("keywords: unexpected shape ({e}), no keywords");
            Vec::new()
        }
    }
}

/// Array of today's candidates, capped at [`DAILY_MAX_CANDIDATES`]. Entries
/// without a start date start `today`.
pub fn decode_daily(text: &str, today: NaiveDate) -> Vec<RawCandidate> {
    let Some(value) = parse("daily", text) else {
        return Vec::new();
    };
    let mut out = candidates_from("daily", list_of(value));
    out.truncate(DAILY_MAX_CANDIDATES);
    for c in &mut out {
        if c.start_date.is_none() {
            c.start_date = Some(StartInput::Date(today));
        }
    }
    out
}

/// Object keyed by `YYYY-MM-DD`; the key is each candidate's start date.
pub fn decode_dated(text: &str) -> Vec<RawCandidate> {
    let Some(Value::Object(map)) = parse("biweekly", text) else {
        warn!("biweekly: expected an object keyed by date");
        return Vec::new();
    };

    let mut out = Vec::new();
    for (key, items) in map {
        let Ok(date) = NaiveDate::parse_from_str(key.trim(), "%Y-%m-%d") else {
            warn!("biweekly: skipping non-date key '{key}'");
            continue;
        };
        for mut c in candidates_from("biweekly", list_of(items)) {
            c.start_date = Some(StartInput::Date(date));
            out.push(c);
        }
    }
    out
}

/// Object keyed by day of month (`"1"`, `"15일"`) within `year`/`month`.
/// Days that do not exist in that month are skipped.
pub fn decode_day_keyed(text: &str, year: i32, month: u32) -> Vec<RawCandidate> {
    let Some(Value::Object(map)) = parse("monthly", text) else {
        warn!("monthly: expected an object keyed by day");
        return Vec::new();
    };

    // Order by day rather than by key text ("10" < "2").
    let mut by_day: BTreeMap<NaiveDate, Vec<Value>> = BTreeMap::new();
    for (key, items) in map {
        let Some(date) = strip_digits(&key).and_then(|d| NaiveDate::from_ymd_opt(year, month, d))
        else {
            warn!("monthly: skipping invalid day key '{key}'");
            continue;
        };
        by_day.entry(date).or_default().extend(list_of(items));
    }

    let mut out = Vec::new();
    for (date, items) in by_day {
        for mut c in candidates_from("monthly", items) {
            c.start_date = Some(StartInput::Date(date));
            out.push(c);
        }
    }
    out
}

/// One candidate from a free-form answer: the request names the task, the
/// answer is its content, and period/cycle come from the answer text.
pub fn candidate_from_advice(message: &str, answer: &str, today: NaiveDate) -> RawCandidate {
    let mut c = RawCandidate {
        task_name: message.trim().to_string(),
        task_content: Some(answer.trim().to_string()),
        start_date: Some(StartInput::Date(today)),
        ..RawCandidate::default()
    };
    fill_from_content(&mut c);
    c
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldplan_core::model::LooseNumber;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    #[test]
    fn test_json_payload_fenced_and_wrapped() {
        assert_eq!(json_payload("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(json_payload("추천 목록입니다: [\"관수\"] 참고하세요"), "[\"관수\"]");
        assert_eq!(json_payload("no json"), "no json");
    }

    #[test]
    fn test_keyword_shapes() {
        assert_eq!(
            decode_keyword_output(r#"["관수", {"keyword": "적심"}]"#),
            vec!["관수", "적심"]
        );
        assert_eq!(decode_keyword_output(r#"{"keywords": ["방제"]}"#), vec!["방제"]);
        assert!(decode_keyword_output("관수, 적심").is_empty());
    }

    #[test]
    fn test_daily_caps_and_defaults_start() {
        let text = r#"[
            {"task_name": "방제", "task_content": "진딧물 방제", "period": 1},
            {"task_name": "관수", "task_content": "2일 동안 매일"},
            {"task_name": "환기", "task_content": "하우스 환기"},
            {"task_name": "점검", "task_content": "배수로 점검"}
        ]"#;
        let out = decode_daily(text, day(6, 1));
        assert_eq!(out.len(), DAILY_MAX_CANDIDATES);
        assert!(out
            .iter()
            .all(|c| c.start_date == Some(StartInput::Date(day(6, 1)))));
        assert_eq!(out[1].period, Some(LooseNumber::Int(2)));
        assert_eq!(out[1].cycle, Some(LooseNumber::Int(1)));
    }

    #[test]
    fn test_daily_drops_bad_entries() {
        let text = r#"[{"task_name": ""}, "관수", {"task_name": "환기", "period": "1일"}]"#;
        let out = decode_daily(text, day(6, 1));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].task_name, "환기");
    }

    #[test]
    fn test_unparseable_output_is_empty() {
        assert!(decode_daily("죄송합니다, 지금은 답할 수 없습니다.", day(6, 1)).is_empty());
        assert!(decode_dated("[]").is_empty());
        assert!(decode_day_keyed("", 2025, 6).is_empty());
    }

    #[test]
    fn test_dated_keys_become_start_dates() {
        let text = r#"{
            "2025-06-02": [{"task_name": "관수", "task_content": "매일 물주기", "period": 2, "cycle": 7}],
            "다음주": [{"task_name": "무시"}],
            "2025-06-09": {"task_name": "적심", "task_content": "곁순 제거", "start_date": "2025-01-01"}
        }"#;
        let out = decode_dated(text);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].start_date, Some(StartInput::Date(day(6, 2))));
        assert_eq!(out[1].task_name, "적심");
        assert_eq!(out[1].start_date, Some(StartInput::Date(day(6, 9))));
    }

    #[test]
    fn test_day_keys_strip_and_validate() {
        let text = r#"{
            "10일": [{"task_name": "수확", "task_content": "1차 수확"}],
            "2": [{"task_name": "관수", "task_content": "매주 관수"}],
            "31": [{"task_name": "없는 날"}],
            "말일": [{"task_name": "무시"}]
        }"#;
        let out = decode_day_keyed(text, 2025, 6);
        let names: Vec<&str> = out.iter().map(|c| c.task_name.as_str()).collect();
        assert_eq!(names, vec!["관수", "수확"]);
        assert_eq!(out[0].start_date, Some(StartInput::Date(day(6, 2))));
        assert_eq!(out[0].cycle, Some(LooseNumber::Int(7)));
        assert_eq!(out[1].start_date, Some(StartInput::Date(day(6, 10))));
    }

    #[test]
    fn test_candidate_from_advice() {
        let c = candidate_from_advice(
            " 토마토 곁순 제거 ",
            "곁순은 매주 제거하고 3일 뒤 상태를 확인하세요.",
            day(6, 1),
        );
        assert_eq!(c.task_name, "토마토 곁순 제거");
        assert_eq!(c.period, Some(LooseNumber::Int(3)));
        assert_eq!(c.cycle, Some(LooseNumber::Int(7)));
    }
}
