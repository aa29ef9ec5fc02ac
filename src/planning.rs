//! Planning runs: prompt the generator, decode its answer into candidates,
//! and feed them through the scheduler.

use crate::scheduler::{ScheduleOutcome, Scheduler};
use chrono::{Datelike, Duration, NaiveDate};
use fieldplan_core::{
    config::PlannerConfig,
    error::PlanError,
    model::{DayRange, Field, MonthlyKeywords, RawCandidate},
};
use fieldplan_planner::{decode, prompts, PlanPrompt, TextGenerator};
use fieldplan_store::Store;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Which planning run to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanRun {
    Keywords,
    Daily,
    Biweekly,
    Monthly,
    Advice,
}

impl PlanRun {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keywords => "keywords",
            Self::Daily => "daily",
            Self::Biweekly => "biweekly",
            Self::Monthly => "monthly",
            Self::Advice => "advice",
        }
    }
}

impl fmt::Display for PlanRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanRun {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keywords" => Ok(Self::Keywords),
            "daily" => Ok(Self::Daily),
            "biweekly" => Ok(Self::Biweekly),
            "monthly" => Ok(Self::Monthly),
            "advice" => Ok(Self::Advice),
            other => Err(format!(
                "unknown run '{other}', expected keywords, daily, biweekly, monthly or advice"
            )),
        }
    }
}

/// Per-run inputs beyond the field itself.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlanInput {
    #[serde(default)]
    pub pest_info: Option<String>,
    #[serde(default)]
    pub weather_info: Option<String>,
    /// Request text for advice runs.
    #[serde(default)]
    pub message: Option<String>,
}

/// Outcome counts of feeding candidates through the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlanReport {
    pub candidates: usize,
    pub created: Vec<String>,
    pub duplicates: usize,
    pub rejected: usize,
}

pub struct Planner {
    generator: Arc<dyn TextGenerator>,
    store: Store,
    config: PlannerConfig,
}

impl Planner {
    pub fn new(generator: Arc<dyn TextGenerator>, store: Store, config: PlannerConfig) -> Self {
        Self {
            generator,
            store,
            config,
        }
    }

    async fn ask(&self, prompt: PlanPrompt) -> Result<String, PlanError> {
        self.generator.complete(prompt.system, &prompt.user).await
    }

    /// Generate and store this month's keywords for `field`.
    pub async fn monthly_keywords(
        &self,
        field: &Field,
        today: NaiveDate,
    ) -> Result<Vec<String>, PlanError> {
        let answer = self.ask(prompts::keywords_prompt(field, today)).await?;
        let keywords = decode::decode_keyword_output(&answer);
        if keywords.is_empty() {
            warn!("field {}: generator returned no keywords", field.id);
            return Ok(keywords);
        }
        self.store
            .put_keywords(&MonthlyKeywords {
                field_id: field.id,
                year: today.year(),
                month: today.month(),
                keywords: keywords.clone(),
            })
            .await?;
        info!("field {}: stored {} keyword(s)", field.id, keywords.len());
        Ok(keywords)
    }

    /// Stored keywords for the month of `day`, generating them when absent.
    async fn keywords_for(&self, field: &Field, day: NaiveDate) -> Result<Vec<String>, PlanError> {
        match self.store.get_keywords(field.id, day.year(), day.month()).await? {
            Some(entry) => Ok(entry.keywords),
            None => self.monthly_keywords(field, day).await,
        }
    }

    pub async fn daily(
        &self,
        field: &Field,
        today: NaiveDate,
        input: &PlanInput,
    ) -> Result<Vec<RawCandidate>, PlanError> {
        let pest = input.pest_info.as_deref().unwrap_or(&self.config.pest_info);
        let weather = input
            .weather_info
            .as_deref()
            .unwrap_or(&self.config.weather_info);
        let answer = self
            .ask(prompts::daily_prompt(field, today, pest, weather))
            .await?;
        Ok(decode::decode_daily(&answer, today))
    }

    /// Two weeks from `start`, informed by the previous week's task names.
    pub async fn biweekly(
        &self,
        field: &Field,
        start: NaiveDate,
    ) -> Result<Vec<RawCandidate>, PlanError> {
        let last_week = DayRange {
            start: start - Duration::days(7),
            end: start - Duration::days(1),
        };
        let previous = self.store.task_names_starting_in(field.id, last_week).await?;
        let keywords = self.keywords_for(field, start).await?;
        let answer = self
            .ask(prompts::biweekly_prompt(field, start, &previous, &keywords))
            .await?;
        Ok(decode::decode_dated(&answer))
    }

    pub async fn monthly(
        &self,
        field: &Field,
        today: NaiveDate,
    ) -> Result<Vec<RawCandidate>, PlanError> {
        let keywords = self.keywords_for(field, today).await?;
        let answer = self
            .ask(prompts::monthly_prompt(field, today.month(), &keywords))
            .await?;
        Ok(decode::decode_day_keyed(&answer, today.year(), today.month()))
    }

    /// One task from a free-form request, starting `today`.
    pub async fn advice(&self, message: &str, today: NaiveDate) -> Result<RawCandidate, PlanError> {
        if message.trim().is_empty() {
            return Err(PlanError::InvalidScheduleInput("advice needs a message".into()));
        }
        let answer = self.ask(prompts::advice_prompt(message)).await?;
        Ok(decode::candidate_from_advice(message, &answer, today))
    }

    /// Candidates for a task-producing run.
    pub async fn candidates(
        &self,
        run: PlanRun,
        field: &Field,
        today: NaiveDate,
        input: &PlanInput,
    ) -> Result<Vec<RawCandidate>, PlanError> {
        let candidates = match run {
            PlanRun::Daily => self.daily(field, today, input).await?,
            PlanRun::Biweekly => self.biweekly(field, today).await?,
            PlanRun::Monthly => self.monthly(field, today).await?,
            PlanRun::Advice => {
                vec![self.advice(input.message.as_deref().unwrap_or(""), today).await?]
            }
            PlanRun::Keywords => {
                return Err(PlanError::InvalidScheduleInput(
                    "keywords run produces no tasks".into(),
                ))
            }
        };
        info!(
            "{run} run for field {}: {} candidate(s) from {}",
            field.id,
            candidates.len(),
            self.generator.name()
        );
        Ok(candidates)
    }
}

/// Schedule every candidate, counting outcomes. Individual failures are
/// logged and counted, never propagated.
pub async fn apply(
    scheduler: &Scheduler,
    owner_id: i64,
    field_id: i64,
    candidates: &[RawCandidate],
) -> PlanReport {
    let mut report = PlanReport {
        candidates: candidates.len(),
        ..PlanReport::default()
    };
    for candidate in candidates {
        match scheduler.schedule(owner_id, field_id, candidate).await {
            Ok(ScheduleOutcome::Created { task }) => report.created.push(task.task_id),
            Ok(ScheduleOutcome::Duplicate { .. }) => report.duplicates += 1,
            Err(e) => {
                error!("field {field_id}: '{}' not scheduled: {e}", candidate.task_name);
                report.rejected += 1;
            }
        }
    }
    report
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays canned answers in order and records every prompt.
    pub(crate) struct ScriptedGenerator {
        answers: Mutex<Vec<String>>,
        pub(crate) prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        pub(crate) fn new(answers: &[&str]) -> Self {
            Self {
                answers: Mutex::new(answers.iter().rev().map(|a| a.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _system: &str, prompt: &str) -> Result<String, PlanError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answers
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| PlanError::Generator("script exhausted".into()))
        }
    }
}
