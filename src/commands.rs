//! CLI command handlers. Results are printed to stdout as JSON lines.

use crate::api::{self, ApiState};
use crate::calendar::{self, WindowQuery};
use crate::planning::{self, PlanInput, PlanRun, Planner};
use crate::queue::CandidateQueue;
use crate::scheduler::Scheduler;
use crate::tracker::{self, ProgressEntry};
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use fieldplan_core::{
    config::Config,
    model::{Field, RawCandidate},
};
use fieldplan_planner::CommandGenerator;
use fieldplan_store::Store;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

async fn open_scheduler(config: &Config) -> anyhow::Result<Scheduler> {
    let store = Store::new(&config.store).await?;
    Ok(Scheduler::new(store, &config.schedule)?)
}

fn build_planner(config: &Config, store: &Store) -> Option<Planner> {
    let generator = CommandGenerator::from_config(&config.planner)?;
    Some(Planner::new(
        Arc::new(generator),
        store.clone(),
        config.planner.clone(),
    ))
}

fn today(scheduler: &Scheduler) -> NaiveDate {
    Utc::now().with_timezone(&scheduler.offset()).date_naive()
}

async fn field_owner(store: &Store, field_id: i64) -> anyhow::Result<i64> {
    store
        .get_field(field_id)
        .await?
        .map(|f| f.owner_id)
        .with_context(|| format!("field {field_id} is not registered"))
}

/// One candidate object or an array of them.
fn parse_candidates(text: &str) -> anyhow::Result<Vec<RawCandidate>> {
    let value: Value = serde_json::from_str(text).context("candidate file is not JSON")?;
    let candidates = match value {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<RawCandidate>, _>>()?,
        other => vec![serde_json::from_value(other)?],
    };
    Ok(candidates)
}

/// Handle the `serve` subcommand.
pub async fn handle_serve(config: Config) -> anyhow::Result<()> {
    let scheduler = Arc::new(open_scheduler(&config).await?);
    let (queue, worker) = CandidateQueue::spawn(scheduler.clone(), &config.queue);

    let mut state = ApiState::new(
        scheduler.clone(),
        calendar::agenda_options(&config.schedule),
        &config.api.api_key,
    )
    .with_queue(queue);
    match build_planner(&config, scheduler.store()) {
        Some(planner) => state = state.with_planner(Arc::new(planner)),
        None => warn!("planner.command is empty, planning runs disabled"),
    }

    info!(
        "fieldplan serving | db: {} | auth: {}",
        config.store.db_path,
        if config.api.api_key.is_empty() {
            "disabled"
        } else {
            "enforced"
        }
    );
    let served = api::serve(&config.api, state).await;

    // The router held the last sender; the worker drains and exits.
    match worker.await {
        Ok(stats) => info!("queue drained: {stats:?}"),
        Err(e) => warn!("queue worker ended abnormally: {e}"),
    }
    scheduler.store().close().await;
    served
}

/// Handle the `field` subcommand.
pub async fn handle_field(config: &Config, file: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let field: Field = serde_json::from_str(&text).context("invalid field JSON")?;
    let store = Store::new(&config.store).await?;
    store.upsert_field(&field).await?;
    print_json(&field)
}

/// Handle the `schedule` subcommand. Each candidate prints its own outcome.
pub async fn handle_schedule(
    config: &Config,
    owner: Option<i64>,
    field_id: i64,
    file: &Path,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let candidates = parse_candidates(&text)?;
    let scheduler = open_scheduler(config).await?;
    let owner_id = match owner {
        Some(id) => id,
        None => field_owner(scheduler.store(), field_id).await?,
    };

    for candidate in &candidates {
        match scheduler.schedule(owner_id, field_id, candidate).await {
            Ok(outcome) => print_json(&outcome)?,
            Err(e) => print_json(&json!({
                "task_name": candidate.task_name,
                "error": e.to_string(),
                "kind": e.kind(),
            }))?,
        }
    }
    Ok(())
}

/// Handle the `plan` subcommand.
pub async fn handle_plan(
    config: &Config,
    field_id: i64,
    run: PlanRun,
    date: Option<NaiveDate>,
    owner: Option<i64>,
    input: &PlanInput,
) -> anyhow::Result<()> {
    let scheduler = open_scheduler(config).await?;
    let planner = build_planner(config, scheduler.store())
        .context("planner.command is not configured")?;
    let field = scheduler
        .store()
        .get_field(field_id)
        .await?
        .with_context(|| format!("field {field_id} is not registered"))?;
    let day = date.unwrap_or_else(|| today(&scheduler));

    if run == PlanRun::Keywords {
        let keywords = planner.monthly_keywords(&field, day).await?;
        return print_json(&json!({"run": run, "keywords": keywords}));
    }

    let candidates = planner.candidates(run, &field, day, input).await?;
    let report = planning::apply(
        &scheduler,
        owner.unwrap_or(field.owner_id),
        field_id,
        &candidates,
    )
    .await;
    print_json(&json!({"run": run, "report": report}))
}

/// Handle the `agenda` subcommand.
pub async fn handle_agenda(config: &Config, query: &WindowQuery) -> anyhow::Result<()> {
    let store = Store::new(&config.store).await?;
    let entries =
        calendar::agenda(&store, query, calendar::agenda_options(&config.schedule)).await?;
    for entry in &entries {
        print_json(entry)?;
    }
    Ok(())
}

/// Handle the `progress` subcommand.
pub async fn handle_progress(
    config: &Config,
    task_id: &str,
    date: &str,
    status: &str,
) -> anyhow::Result<()> {
    let store = Store::new(&config.store).await?;
    let report =
        tracker::update_progress(&store, task_id, &[ProgressEntry::new(date, status)]).await?;
    print_json(&report)
}

/// Handle the `completion` subcommand.
pub async fn handle_completion(config: &Config, query: &WindowQuery) -> anyhow::Result<()> {
    let store = Store::new(&config.store).await?;
    print_json(&calendar::completion(&store, query).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldplan_core::config::StoreConfig;
    use std::io::Write;

    #[test]
    fn test_parse_candidates_single_and_array() {
        let single = parse_candidates(
            r#"{"task_name": "물주기", "task_content": "매일", "start_date": "2025-06-01"}"#,
        )
        .unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].task_name, "물주기");

        let many = parse_candidates(
            r#"[{"task_name": "물주기", "period": "3일"}, {"task_name": "환기", "priority": 1}]"#,
        )
        .unwrap();
        assert_eq!(many.len(), 2);

        assert!(parse_candidates("not json").is_err());
    }

    #[tokio::test]
    async fn test_field_then_schedule_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            store: StoreConfig {
                db_path: dir.path().join("plan.db").to_string_lossy().into_owned(),
            },
            ..Config::default()
        };

        let mut field_file = tempfile::NamedTempFile::new().unwrap();
        write!(
            field_file,
            r#"{{"id": 5, "owner_id": 9, "crop_name": "고추", "start_date": "2025-04-01"}}"#
        )
        .unwrap();
        handle_field(&config, field_file.path()).await.unwrap();

        let mut tasks_file = tempfile::NamedTempFile::new().unwrap();
        write!(
            tasks_file,
            r#"[{{"task_name": "물주기", "task_content": "매일 물을 준다", "start_date": "2025-06-01"}},
               {{"task_name": "물주기", "task_content": "매일 물을 준다", "start_date": "2025-06-01"}}]"#
        )
        .unwrap();
        handle_schedule(&config, None, 5, tasks_file.path())
            .await
            .unwrap();

        let store = Store::new(&config.store).await.unwrap();
        let tasks = store.list_tasks(9, Some(5)).await.unwrap();
        assert_eq!(tasks.len(), 1);

        assert!(handle_schedule(&config, None, 6, tasks_file.path())
            .await
            .is_err());
    }
}
