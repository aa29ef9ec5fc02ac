//! Prompt templates for the planning runs.

use chrono::{Datelike, NaiveDate};
use fieldplan_core::model::Field;
use serde::Serialize;

/// Crop growth stage, derived from days since the field was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthStage {
    Sowing,
    EarlyGrowth,
    Growth,
    LateGrowth,
}

impl GrowthStage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sowing => "파종 직후",
            Self::EarlyGrowth => "초기 생육기",
            Self::Growth => "성장기",
            Self::LateGrowth => "후기 생육기",
        }
    }
}

/// `<30` days sowing, `<60` early growth, `<90` growth, then late growth.
/// A start date in the future counts as sowing.
pub fn growth_stage(field_start: NaiveDate, today: NaiveDate) -> GrowthStage {
    match (today - field_start).num_days() {
        d if d < 30 => GrowthStage::Sowing,
        d if d < 60 => GrowthStage::EarlyGrowth,
        d if d < 90 => GrowthStage::Growth,
        _ => GrowthStage::LateGrowth,
    }
}

/// A system instruction plus the user prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanPrompt {
    pub system: &'static str,
    pub user: String,
}

const KEYWORDS_SYSTEM: &str = "너는 농업 키워드 전문가야.";
const KEYWORDS_TEMPLATE: &str = "작물: {crop}
월: {month}월
생육 단계: {stage}
지역: {address}
위 조건을 바탕으로 이번 달 주요 농작업 키워드 5~7개를 JSON 배열로 추천해줘.";

const DAILY_SYSTEM: &str = "너는 병해충 대응 전문가야.";
const DAILY_TEMPLATE: &str = r#"작물: {crop}
날짜: {date}
위치: {address}
병해충 정보: {pest}
날씨 정보: {weather}
오늘 필요한 대응 작업을 최대 3개 JSON 배열로 출력해줘.
형식:
[
  {"task_name": "작업명", "task_content": "내용", "period": 1, "cycle": 1, "priority": 1}
]"#;

const BIWEEKLY_SYSTEM: &str = "너는 농업 일정 전문가야.";
const BIWEEKLY_TEMPLATE: &str = r#"작물: {crop}
위치: {address}
시작일: {date}
지난 주 작업: {previous}
키워드: {keywords}
다음 2주 동안 해야 할 일들을 날짜별로 JSON 형식으로 추천해줘.
형식:
{
  "YYYY-MM-DD": [
    {"task_name": "작업명", "task_content": "내용", "period": 2, "cycle": 7, "priority": 2}
  ]
}"#;

const MONTHLY_SYSTEM: &str = "너는 월간 농업 계획 전문가야.";
const MONTHLY_TEMPLATE: &str = r#"작물: {crop}
위치: {address}
키워드: {keywords}
이번 {month}월에 해야 할 일을 날짜별로 JSON 형식으로 출력해줘.
형식:
{
  "1": [
    {"task_name": "작업명", "task_content": "내용", "period": 3, "cycle": 7, "priority": 3}
  ]
}"#;

const ADVICE_SYSTEM: &str = "너는 농업 전문가야. 입력에 따라 구체적인 농작업을 설명해줘.";

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "없음".to_string()
    } else {
        items.join(", ")
    }
}

fn base(template: &str, field: &Field) -> String {
    template
        .replace("{crop}", &field.crop_name)
        .replace("{address}", &field.address)
}

/// Monthly keyword suggestion for `today`'s month.
pub fn keywords_prompt(field: &Field, today: NaiveDate) -> PlanPrompt {
    let stage = growth_stage(field.start_date, today);
    PlanPrompt {
        system: KEYWORDS_SYSTEM,
        user: base(KEYWORDS_TEMPLATE, field)
            .replace("{month}", &today.month().to_string())
            .replace("{stage}", stage.label()),
    }
}

pub fn daily_prompt(field: &Field, today: NaiveDate, pest_info: &str, weather_info: &str) -> PlanPrompt {
    PlanPrompt {
        system: DAILY_SYSTEM,
        user: base(DAILY_TEMPLATE, field)
            .replace("{date}", &today.to_string())
            .replace("{pest}", if pest_info.is_empty() { "없음" } else { pest_info })
            .replace("{weather}", if weather_info.is_empty() { "없음" } else { weather_info }),
    }
}

/// Two weeks from `start`, with last week's task names as context.
pub fn biweekly_prompt(
    field: &Field,
    start: NaiveDate,
    previous: &[String],
    keywords: &[String],
) -> PlanPrompt {
    PlanPrompt {
        system: BIWEEKLY_SYSTEM,
        user: base(BIWEEKLY_TEMPLATE, field)
            .replace("{date}", &start.to_string())
            .replace("{previous}", &join_or_none(previous))
            .replace("{keywords}", &join_or_none(keywords)),
    }
}

pub fn monthly_prompt(field: &Field, month: u32, keywords: &[String]) -> PlanPrompt {
    PlanPrompt {
        system: MONTHLY_SYSTEM,
        user: base(MONTHLY_TEMPLATE, field)
            .replace("{month}", &month.to_string())
            .replace("{keywords}", &join_or_none(keywords)),
    }
}

/// Free-form request; the answer becomes one task's content.
pub fn advice_prompt(message: &str) -> PlanPrompt {
    PlanPrompt {
        system: ADVICE_SYSTEM,
        user: message.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field() -> Field {
        Field {
            id: 1,
            owner_id: 1,
            crop_name: "토마토".into(),
            address: "전북 전주시".into(),
            start_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            description: String::new(),
            geometry: None,
        }
    }

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    #[test]
    fn test_growth_stage_boundaries() {
        let start = day(4, 1);
        assert_eq!(growth_stage(start, day(3, 20)), GrowthStage::Sowing);
        assert_eq!(growth_stage(start, day(4, 30)), GrowthStage::Sowing); // 29 days
        assert_eq!(growth_stage(start, day(5, 1)), GrowthStage::EarlyGrowth); // 30
        assert_eq!(growth_stage(start, day(5, 31)), GrowthStage::Growth); // 60
        assert_eq!(growth_stage(start, day(6, 30)), GrowthStage::LateGrowth); // 90
    }

    #[test]
    fn test_keywords_prompt_fills_context() {
        let p = keywords_prompt(&field(), day(6, 15));
        assert_eq!(p.system, KEYWORDS_SYSTEM);
        assert!(p.user.contains("작물: 토마토"));
        assert!(p.user.contains("월: 6월"));
        assert!(p.user.contains("생육 단계: 성장기"));
        assert!(!p.user.contains('{'));
    }

    #[test]
    fn test_biweekly_prompt_without_history() {
        let p = biweekly_prompt(&field(), day(6, 1), &[], &["관수".into(), "적심".into()]);
        assert!(p.user.contains("지난 주 작업: 없음"));
        assert!(p.user.contains("키워드: 관수, 적심"));
        assert!(p.user.contains("\"YYYY-MM-DD\""));
    }

    #[test]
    fn test_daily_prompt_defaults_missing_context() {
        let p = daily_prompt(&field(), day(6, 1), "진딧물 관찰됨", "");
        assert!(p.user.contains("병해충 정보: 진딧물 관찰됨"));
        assert!(p.user.contains("날씨 정보: 없음"));
        assert!(p.user.contains("날짜: 2025-06-01"));
    }

    #[test]
    fn test_monthly_prompt() {
        let p = monthly_prompt(&field(), 7, &["수확".into()]);
        assert!(p.user.contains("이번 7월에"));
        assert_eq!(p.system, MONTHLY_SYSTEM);
    }
}
