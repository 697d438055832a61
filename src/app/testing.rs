//! Scripted gateway for unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::app::gateway::RemoteReservationGateway;
use crate::app::models::{
    CreateReservation, OwnerIdentity, RemoteReservation, ReservationKind, ReservationStatus,
};
use crate::errors::{GatewayError, GatewayResult};

/// Gateway whose responses are queued up front by the test
#[derive(Debug, Default)]
pub struct FakeGateway {
    creates: Mutex<VecDeque<GatewayResult<i64>>>,
    cancels: Mutex<VecDeque<GatewayResult<()>>>,
    list_failures: Mutex<VecDeque<GatewayError>>,
    server: Mutex<Vec<RemoteReservation>>,
    delay: Mutex<Option<Duration>>,
    list_calls: AtomicUsize,
    create_calls: AtomicUsize,
    cancel_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_create(&self, result: GatewayResult<i64>) {
        self.creates.lock().unwrap().push_back(result);
    }

    pub fn push_cancel(&self, result: GatewayResult<()>) {
        self.cancels.lock().unwrap().push_back(result);
    }

    pub fn push_list_failure(&self, error: GatewayError) {
        self.list_failures.lock().unwrap().push_back(error);
    }

    pub fn set_server(&self, items: Vec<RemoteReservation>) {
        *self.server.lock().unwrap() = items;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Server item helper
pub fn remote(id: i64, kind: ReservationKind, counterpart: &str) -> RemoteReservation {
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

#[async_trait]
impl RemoteReservationGateway for FakeGateway {
    async fn create(&self, _owner: &OwnerIdentity, _request: &CreateReservation) -> GatewayResult<i64> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await;
        let result = self.creates.lock().unwrap().pop_front().unwrap_or(Ok(1000));
        self.leave();
        result
    }

    async fn cancel(&self, _owner: &OwnerIdentity, _id: i64) -> GatewayResult<()> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await;
        let result = self.cancels.lock().unwrap().pop_front().unwrap_or(Ok(()));
        self.leave();
        result
    }

    async fn list(
        &self,
        _owner: &OwnerIdentity,
        _status: ReservationStatus,
        kind: Option<ReservationKind>,
    ) -> GatewayResult<Vec<RemoteReservation>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await;
        let failure = self.list_failures.lock().unwrap().pop_front();
        let result = match failure {
            Some(error) => Err(error),
            None => Ok(self
                .server
                .lock()
                .unwrap()
                .iter()
                .filter(|item| kind.map_or(true, |k| item.kind == k))
                .cloned()
                .collect()),
        };
        self.leave();
        result
    }
}
