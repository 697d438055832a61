//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use tokio::sync::Notify;

use booking_sync::app::models::{
    CreateReservation, OwnerIdentity, RemoteReservation, ReservationKind, ReservationStatus,
};
use booking_sync::app::{
    DurableKeyValueStore, EngineConfig, MemoryStore, OwnerKey, RemoteReservationGateway, SyncEngine,
};
use booking_sync::errors::{GatewayError, GatewayResult, StoreResult};

/// In-memory booking service with scriptable failures
///
/// Successful creates are added to the owner's server-side list only when
/// `visible_after_create` is set, which models read-after-write lag.
#[derive(Default)]
pub struct ScriptedGateway {
    next_id: Mutex<i64>,
    server: Mutex<Vec<(OwnerIdentity, RemoteReservation)>>,
    create_failures: Mutex<VecDeque<GatewayError>>,
    cancel_failures: Mutex<VecDeque<GatewayError>>,
    list_failures: Mutex<VecDeque<GatewayError>>,
    visible_after_create: Mutex<bool>,
    latency: Mutex<Option<Duration>>,
    pub list_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub cancel_calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new() -> Arc<Self> {
        let gateway = Self::default();
        *gateway.next_id.lock().unwrap() = 100;
        Arc::new(gateway)
    }

    pub fn next_id(&self, id: i64) {
        *self.next_id.lock().unwrap() = id;
    }

    pub fn add_server_item(&self, owner: &OwnerIdentity, item: RemoteReservation) {
        self.server.lock().unwrap().push((owner.clone(), item));
    }

    pub fn remove_server_item(&self, id: i64) {
        self.server.lock().unwrap().retain(|(_, item)| item.id != id);
    }

    pub fn fail_next_create(&self, error: GatewayError) {
        self.create_failures.lock().unwrap().push_back(error);
    }

    pub fn fail_next_cancel(&self, error: GatewayError) {
        self.cancel_failures.lock().unwrap().push_back(error);
    }

    pub fn fail_next_list(&self, error: GatewayError) {
        self.list_failures.lock().unwrap().push_back(error);
    }

    pub fn set_visible_after_create(&self, visible: bool) {
        *self.visible_after_create.lock().unwrap() = visible;
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    pub fn clear_latency(&self) {
        *self.latency.lock().unwrap() = None;
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl RemoteReservationGateway for ScriptedGateway {
    async fn create(
        &self,
        owner: &OwnerIdentity,
        request: &CreateReservation,
    ) -> GatewayResult<i64> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.wait().await;
        if let Some(error) = self.create_failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        let id = {
            let mut next = self.next_id.lock().unwrap();
            let id = *next;
            *next += 1;
            id
        };
        if *self.visible_after_create.lock().unwrap() {
            let item = RemoteReservation {
                id,
                kind: request.kind,
                counterpart_id: request.counterpart_id.clone(),
                counterpart_name: request.counterpart_name.clone(),
                title: request.title.clone(),
                start_at: request.start_at,
                end_at: request.end_at,
                pre_question: request.pre_question.clone(),
            };
            self.add_server_item(owner, item);
        }
        Ok(id)
    }

    async fn cancel(&self, _owner: &OwnerIdentity, id: i64) -> GatewayResult<()> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.wait().await;
        if let Some(error) = self.cancel_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.remove_server_item(id);
        Ok(())
    }

    async fn list(
        &self,
        owner: &OwnerIdentity,
        _status: ReservationStatus,
        kind: Option<ReservationKind>,
    ) -> GatewayResult<Vec<RemoteReservation>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        // The list is read on arrival and delivered after the latency
        let failure = self.list_failures.lock().unwrap().pop_front();
        let listed: Vec<RemoteReservation> = self
            .server
            .lock()
            .unwrap()
            .iter()
            .filter(|(listed_for, item)| {
                listed_for == owner && kind.map_or(true, |k| item.kind == k)
            })
            .map(|(_, item)| item.clone())
            .collect();
        self.wait().await;
        match failure {
            Some(error) => Err(error),
            None => Ok(listed),
        }
    }
}

/// Memory store that can hold one save until released
#[derive(Default)]
pub struct GatedStore {
    inner: MemoryStore,
    hold: AtomicBool,
    entered: Notify,
    gate: Notify,
}

impl GatedStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Park the next save until [`GatedStore::release`]
    pub fn hold_next_save(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    /// Wait until the held save has started
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl DurableKeyValueStore for GatedStore {
    async fn save(&self, key: &OwnerKey, snapshot: &[u8]) -> StoreResult<()> {
        if self.hold.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.gate.notified().await;
        }
        self.inner.save(key, snapshot).await
    }

    async fn load(&self, key: &OwnerKey) -> StoreResult<Option<Vec<u8>>> {
        self.inner.load(key).await
    }

    async fn clear(&self, key: &OwnerKey) -> StoreResult<()> {
        self.inner.clear(key).await
    }
}

/// Engine without background refreshes, so gateway call counts are exact
pub fn quiet_engine(gateway: Arc<ScriptedGateway>) -> (SyncEngine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let engine = SyncEngine::new(
        EngineConfig::default().without_background_refresh(),
        gateway,
        store.clone(),
    );
    (engine, store)
}

pub fn item(id: i64, kind: ReservationKind, counterpart: &str) -> RemoteReservation {
    RemoteReservation {
        id,
        kind,
        counterpart_id: counterpart.to_string(),
        counterpart_name: None,
        title: None,
        start_at: None,
        end_at: None,
        pre_question: None,
    }
}

pub fn slot(hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 11, 9)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

pub fn personal_with_coach_7() -> CreateReservation {
    CreateReservation::personal("coach-7", slot(14), slot(15))
}
