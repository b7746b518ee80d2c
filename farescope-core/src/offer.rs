use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single bookable flight option returned by a supplier source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightOffer {
    pub id: Uuid,
    /// Identifier of the source that produced this offer
    pub source: String,
    pub airline: String,
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub stops: u32,
    pub duration_minutes: i64,
    pub price_amount: i32,
    pub price_currency: String,
    /// Opaque relevance key assigned upstream; used only as a sort key here
    pub score: f64,
}
