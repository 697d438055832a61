//! Reservation data model
//!
//! `RemoteReservation` is the shape the booking service returns and the shape
//! persisted per owner. `ReservationRecord` is the same booking stamped with
//! the owner session that observed it, which is what the cache holds.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::app::hash::OwnerKey;

/// Kind of booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationKind {
    /// One-to-one session with a coach
    Personal,
    /// Seat in a group class
    Group,
}

impl ReservationKind {
    /// Wire representation used in query strings
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationKind::Personal => "PERSONAL",
            ReservationKind::Group => "GROUP",
        }
    }
}

impl fmt::Display for ReservationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ReservationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "personal" => Ok(ReservationKind::Personal),
            "group" => Ok(ReservationKind::Group),
            other => Err(format!("unknown reservation kind: {other}")),
        }
    }
}

/// Status partition used by list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Upcoming,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    /// Wire representation used in query strings
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Upcoming => "upcoming",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "upcoming" => Ok(ReservationStatus::Upcoming),
            "completed" => Ok(ReservationStatus::Completed),
            "cancelled" | "canceled" => Ok(ReservationStatus::Cancelled),
            other => Err(format!("unknown reservation status: {other}")),
        }
    }
}

/// Opaque token identifying the authenticated session
///
/// The `Debug` output is redacted; use [`OwnerIdentity::key`] when a printable
/// or storable handle is needed.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OwnerIdentity(Arc<str>);

impl OwnerIdentity {
    pub fn new(token: impl Into<String>) -> Self {
        OwnerIdentity(Arc::from(token.into()))
    }

    /// Raw token, for authenticating gateway calls
    pub fn token(&self) -> &str {
        &self.0
    }

    /// Digest used for store keys and logging
    pub fn key(&self) -> OwnerKey {
        OwnerKey::derive(&self.0)
    }
}

impl fmt::Debug for OwnerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OwnerIdentity({})", self.key())
    }
}

/// Booking as returned by the booking service list endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteReservation {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ReservationKind,
    #[serde(default)]
    pub counterpart_id: String,
    #[serde(default)]
    pub counterpart_name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub end_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub pre_question: Option<String>,
}

/// One booking visible to the current owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationRecord {
    pub id: i64,
    pub kind: ReservationKind,
    /// Coach or class id; may be empty for group bookings until resolved
    pub counterpart_id: String,
    pub start_at: Option<NaiveDateTime>,
    pub end_at: Option<NaiveDateTime>,
    pub title: Option<String>,
    pub counterpart_name: Option<String>,
    pub pre_question: Option<String>,
    pub owner_identity: OwnerIdentity,
}

impl ReservationRecord {
    /// Map an authoritative server item into a record owned by `owner`
    pub fn from_remote(remote: RemoteReservation, owner: &OwnerIdentity) -> Self {
        Self {
            id: remote.id,
            kind: remote.kind,
            counterpart_id: remote.counterpart_id,
            start_at: remote.start_at,
            end_at: remote.end_at,
            title: remote.title,
            counterpart_name: remote.counterpart_name,
            pre_question: remote.pre_question,
            owner_identity: owner.clone(),
        }
    }

    /// Build the optimistic record for a create the service acknowledged
    pub fn from_request(id: i64, request: &CreateReservation, owner: &OwnerIdentity) -> Self {
        Self {
            id,
            kind: request.kind,
            counterpart_id: request.counterpart_id.clone(),
            start_at: request.start_at,
            end_at: request.end_at,
            title: request.title.clone(),
            counterpart_name: request.counterpart_name.clone(),
            pre_question: request.pre_question.clone(),
            owner_identity: owner.clone(),
        }
    }

    /// Owner-free form used for persistence
    pub fn to_remote(&self) -> RemoteReservation {
        RemoteReservation {
            id: self.id,
            kind: self.kind,
            counterpart_id: self.counterpart_id.clone(),
            counterpart_name: self.counterpart_name.clone(),
            title: self.title.clone(),
            start_at: self.start_at,
            end_at: self.end_at,
            pre_question: self.pre_question.clone(),
        }
    }

    pub fn is_owned_by(&self, owner: &OwnerIdentity) -> bool {
        &self.owner_identity == owner
    }
}

/// A booking request submitted by the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReservation {
    #[serde(rename = "type")]
    pub kind: ReservationKind,
    pub counterpart_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_at: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_at: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterpart_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_question: Option<String>,
}

impl CreateReservation {
    /// Personal session with a coach in a fixed time slot
    pub fn personal(
        coach_id: impl Into<String>,
        start_at: NaiveDateTime,
        end_at: NaiveDateTime,
    ) -> Self {
        Self {
            kind: ReservationKind::Personal,
            counterpart_id: coach_id.into(),
            start_at: Some(start_at),
            end_at: Some(end_at),
            title: None,
            counterpart_name: None,
            pre_question: None,
        }
    }

    /// Seat in a group class; the class carries its own schedule
    pub fn group(class_id: impl Into<String>) -> Self {
        Self {
            kind: ReservationKind::Group,
            counterpart_id: class_id.into(),
            start_at: None,
            end_at: None,
            title: None,
            counterpart_name: None,
            pre_question: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_counterpart_name(mut self, name: impl Into<String>) -> Self {
        self.counterpart_name = Some(name.into());
        self
    }

    pub fn with_pre_question(mut self, question: impl Into<String>) -> Self {
        self.pre_question = Some(question.into());
        self
    }

    /// Whether `record` is the booking this request would have produced
    ///
    /// Group bookings may come back with an unresolved counterpart, in which
    /// case the class id is compared against the record id.
    pub fn matches(&self, record: &ReservationRecord) -> bool {
        if self.kind != record.kind {
            return false;
        }

        if !record.counterpart_id.is_empty() && record.counterpart_id == self.counterpart_id {
            return match (self.start_at, record.start_at) {
                (Some(wanted), Some(found)) => wanted == found,
                _ => true,
            };
        }

        self.kind == ReservationKind::Group && record.id.to_string() == self.counterpart_id
    }
}

/// Immutable ordered copy of the active owner's records
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    owner: Option<OwnerKey>,
    version: u64,
    records: Arc<[ReservationRecord]>,
}

impl CacheSnapshot {
    pub fn new(owner: Option<OwnerKey>, version: u64, records: Vec<ReservationRecord>) -> Self {
        Self {
            owner,
            version,
            records: records.into(),
        }
    }

    /// Snapshot with no active owner
    pub fn empty(version: u64) -> Self {
        Self::new(None, version, Vec::new())
    }

    /// Key of the owner this snapshot belongs to
    pub fn owner(&self) -> Option<OwnerKey> {
        self.owner
    }

    /// Monotonic emission sequence number
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn records(&self) -> &[ReservationRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReservationRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&ReservationRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> Vec<i64> {
        self.records.iter().map(|r| r.id).collect()
    }
}
