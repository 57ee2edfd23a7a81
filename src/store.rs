use async_trait::async_trait;
use dashmap::DashMap;
use ulid::Ulid;

use crate::model::{Booking, BookingStatus, Ms};

/// Storage failure, propagated upward unchanged.
#[derive(Debug)]
pub struct StoreError(pub String);

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "store error: {}", self.0)
    }
}

impl std::error::Error for StoreError {}

/// Persistence boundary. The engine only requires these operations, not a
/// specific storage technology.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert or replace. Returns the stored booking.
    async fn save(&self, booking: Booking) -> Result<Booking, StoreError>;

    async fn find_by_id(&self, id: Ulid) -> Result<Option<Booking>, StoreError>;

    /// All bookings for an agent. With `active_only`, keeps only statuses
    /// that still occupy the calendar.
    async fn find_by_agent(
        &self,
        agent_id: Ulid,
        active_only: bool,
    ) -> Result<Vec<Booking>, StoreError>;

    async fn find_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>, StoreError>;

    /// Bookings in `status` whose lifecycle anchor is strictly before
    /// `threshold`. The anchor is `created_at` for Pending (how long the
    /// request has waited) and the slot start otherwise.
    async fn find_by_status_before(
        &self,
        status: BookingStatus,
        threshold: Ms,
    ) -> Result<Vec<Booking>, StoreError>;

    async fn all(&self) -> Result<Vec<Booking>, StoreError>;
}

/// In-memory store: the single authoritative copy of every booking plus an
/// agent index for calendar scans.
pub struct InMemoryStore {
    bookings: DashMap<Ulid, Booking>,
    by_agent: DashMap<Ulid, Vec<Ulid>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            bookings: DashMap::new(),
            by_agent: DashMap::new(),
        }
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn save(&self, booking: Booking) -> Result<Booking, StoreError> {
        let mut ids = self.by_agent.entry(booking.agent_id).or_default();
        if !ids.contains(&booking.id) {
            ids.push(booking.id);
        }
        drop(ids);
        self.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn find_by_id(&self, id: Ulid) -> Result<Option<Booking>, StoreError> {
        Ok(self.bookings.get(&id).map(|e| e.value().clone()))
    }

    async fn find_by_agent(
        &self,
        agent_id: Ulid,
        active_only: bool,
    ) -> Result<Vec<Booking>, StoreError> {
        let ids = self
            .by_agent
            .get(&agent_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| self.bookings.get(id).map(|e| e.value().clone()))
            .filter(|b| !active_only || b.status.occupies_calendar())
            .collect())
    }

    async fn find_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>, StoreError> {
        Ok(self
            .bookings
            .iter()
            .filter(|e| e.value().status == status)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn find_by_status_before(
        &self,
        status: BookingStatus,
        threshold: Ms,
    ) -> Result<Vec<Booking>, StoreError> {
        Ok(self
            .bookings
            .iter()
            .filter(|e| {
                let b = e.value();
                let anchor = match status {
                    BookingStatus::Pending => b.created_at,
                    _ => b.slot.start,
                };
                b.status == status && anchor < threshold
            })
            .map(|e| e.value().clone())
            .collect())
    }

    async fn all(&self) -> Result<Vec<Booking>, StoreError> {
        Ok(self.bookings.iter().map(|e| e.value().clone()).collect())
    }
}
