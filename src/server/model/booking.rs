use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub(crate) type BookingId = Uuid;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum BookingType {
    #[display("table")]
    Table,
    #[display("event")]
    Event,
}

impl FromStr for BookingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "table" => Ok(Self::Table),
            "event" => Ok(Self::Event),
            s => Err(format!("Invalid booking type: {s}")),
        }
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum BookingStatus {
    #[display("pending")]
    Pending,
    #[display("confirmed")]
    Confirmed,
    #[display("rejected")]
    Rejected,
    #[display("cancelled")]
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 4] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Rejected,
        BookingStatus::Cancelled,
    ];
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.to_string() == s)
            .ok_or_else(|| format!("Invalid booking status: {s}"))
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EventDetails {
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub decoration_package: Option<String>,
    #[serde(default)]
    pub custom_requirements: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Booking {
    pub id: BookingId,
    pub booking_type: BookingType,
    pub customer_name: String,
    pub phone: String,
    pub date: NaiveDate,
    /// `HH:MM`
    pub time: String,
    pub guests: u32,
    pub event_details: Option<EventDetails>,
    pub status: BookingStatus,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PostBookingRequest {
    pub booking_type: BookingType,
    pub customer_name: String,
    pub phone: String,
    pub date: NaiveDate,
    pub time: String,
    pub guests: i64,
    #[serde(default)]
    pub event_details: Option<EventDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PatchBookingStatusRequest {
    pub status: BookingStatus,
    #[serde(default)]
    pub version: Option<u64>,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub(crate) struct BookingFilter {
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GetBookingsResponse {
    pub count: usize,
    pub bookings: Vec<Booking>,
}
