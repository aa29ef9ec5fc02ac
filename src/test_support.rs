//! Shared fixtures for the binary's tests.

use crate::scheduler::Scheduler;
use chrono::NaiveDate;
use fieldplan_core::{config::ScheduleConfig, model::Field};
use fieldplan_store::Store;

pub(crate) fn tomato_field(id: i64) -> Field {
    Field {
        id,
        owner_id: 1,
        crop_name: "토마토".to_string(),
        address: "전북 전주시".to_string(),
        start_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
        description: String::new(),
        geometry: None,
    }
}

pub(crate) async fn store_with_field() -> Store {
    let store = Store::in_memory().await.unwrap();
    store.upsert_field(&tomato_field(1)).await.unwrap();
    store
}

pub(crate) fn scheduler(store: Store) -> Scheduler {
    scheduler_with(store, &ScheduleConfig::default())
}

pub(crate) fn scheduler_with(store: Store, config: &ScheduleConfig) -> Scheduler {
    Scheduler::new(store, config).unwrap()
}
