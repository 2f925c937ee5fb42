//! Read-only collaborator boundaries.
//!
//! The notification core never owns business data; it reads the minimum it
//! needs through these traits: user identity for addressing, and a booking
//! read model for the reminder scan. Memory implementations back development
//! and tests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Minimal identity needed to address a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: i64,
    pub email: String,
    pub display_name: String,
}

/// User directory lookup (id to email/display name).
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn identity(&self, user_id: i64) -> Result<Option<UserIdentity>>;
}

/// Which side of a booking a party is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    Client,
    Vendor,
}

/// One party on a booking, already resolved to an address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingParty {
    pub user_id: i64,
    pub email: String,
    pub name: String,
    pub role: PartyRole,
}

/// Read-model view of a booking, enough for reminder generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSnapshot {
    pub id: i64,
    pub service_name: String,
    pub event_date: NaiveDate,
    pub client: BookingParty,
    pub vendor: BookingParty,
    /// Vendor has not yet accepted or declined
    pub awaiting_vendor_approval: bool,
    /// Accepted but the client has not paid
    pub awaiting_client_payment: bool,
    pub payment_completed: bool,
    pub created_at: DateTime<Utc>,
}

impl BookingSnapshot {
    pub fn parties(&self) -> [&BookingParty; 2] {
        [&self.client, &self.vendor]
    }
}

/// Booking read model consumed by the reminder scheduler.
#[async_trait]
pub trait BookingReadModel: Send + Sync {
    /// Confirmed bookings whose event date is exactly `date`.
    async fn confirmed_on(&self, date: NaiveDate) -> Result<Vec<BookingSnapshot>>;

    /// Bookings still awaiting vendor approval, created before `older_than`.
    async fn pending_vendor_approval(&self, older_than: DateTime<Utc>) -> Result<Vec<BookingSnapshot>>;

    /// Bookings still awaiting client payment, created before `older_than`.
    async fn pending_client_payment(&self, older_than: DateTime<Utc>) -> Result<Vec<BookingSnapshot>>;

    /// Bookings whose event date is exactly `date` and payment is complete.
    async fn completed_on(&self, date: NaiveDate) -> Result<Vec<BookingSnapshot>>;
}

/// In-memory user directory.
pub struct MemoryUserDirectory {
    users: DashMap<i64, UserIdentity>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
        }
    }

    pub fn insert(&self, identity: UserIdentity) {
        self.users.insert(identity.id, identity);
    }
}

impl Default for MemoryUserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn identity(&self, user_id: i64) -> Result<Option<UserIdentity>> {
        Ok(self.users.get(&user_id).map(|u| u.clone()))
    }
}

/// In-memory booking read model.
pub struct MemoryBookingReadModel {
    bookings: DashMap<i64, BookingSnapshot>,
}

impl MemoryBookingReadModel {
    pub fn new() -> Self {
        Self {
            bookings: DashMap::new(),
        }
    }

    pub fn insert(&self, booking: BookingSnapshot) {
        self.bookings.insert(booking.id, booking);
    }

    fn filter<F>(&self, predicate: F) -> Vec<BookingSnapshot>
    where
        F: Fn(&BookingSnapshot) -> bool,
    {
        self.bookings
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }
}

impl Default for MemoryBookingReadModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingReadModel for MemoryBookingReadModel {
    async fn confirmed_on(&self, date: NaiveDate) -> Result<Vec<BookingSnapshot>> {
        Ok(self.filter(|b| {
            b.event_date == date && !b.awaiting_vendor_approval
        }))
    }

    async fn pending_vendor_approval(&self, older_than: DateTime<Utc>) -> Result<Vec<BookingSnapshot>> {
        Ok(self.filter(|b| b.awaiting_vendor_approval && b.created_at < older_than))
    }

    async fn pending_client_payment(&self, older_than: DateTime<Utc>) -> Result<Vec<BookingSnapshot>> {
        Ok(self.filter(|b| {
            !b.awaiting_vendor_approval && b.awaiting_client_payment && b.created_at < older_than
        }))
    }

    async fn completed_on(&self, date: NaiveDate) -> Result<Vec<BookingSnapshot>> {
        Ok(self.filter(|b| b.event_date == date && b.payment_completed))
    }
}
