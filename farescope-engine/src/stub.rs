use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveTime, TimeZone, Utc};
use rand::Rng;
use uuid::Uuid;

use farescope_core::{
    AdapterError, AdapterHealth, FlightOffer, SearchAdapter, SearchCriteria,
};

enum StubOutcome {
    /// Deterministic synthetic offers derived from the criteria
    Generate { offers: usize, base_price: i32 },
    /// Scripted result set, returned verbatim
    Fixed(Vec<FlightOffer>),
    /// Scripted upstream failure
    Fail(String),
}

/// In-process stand-in for an external supplier. Used for demo wiring and in
/// tests, where the call counter proves that filter/sort never re-query.
pub struct StubFlightAdapter {
    id: String,
    airline: String,
    latency: Duration,
    jitter_ms: u64,
    outcome: StubOutcome,
    online: bool,
    calls: AtomicUsize,
}

impl StubFlightAdapter {
    pub fn generating(id: &str, airline: &str, offers: usize, base_price: i32) -> Self {
        Self {
            id: id.to_string(),
            airline: airline.to_string(),
            latency: Duration::from_millis(0),
            jitter_ms: 0,
            outcome: StubOutcome::Generate { offers, base_price },
            online: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fixed(id: &str, airline: &str, offers: Vec<FlightOffer>) -> Self {
        Self {
            id: id.to_string(),
            airline: airline.to_string(),
            latency: Duration::from_millis(0),
            jitter_ms: 0,
            outcome: StubOutcome::Fixed(offers),
            online: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(id: &str, airline: &str, message: &str) -> Self {
        Self {
            id: id.to_string(),
            airline: airline.to_string(),
            latency: Duration::from_millis(0),
            jitter_ms: 0,
            outcome: StubOutcome::Fail(message.to_string()),
            online: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Random extra latency per call, simulating an unreliable upstream
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter_ms = jitter.as_millis() as u64;
        self
    }

    /// Report unreachable from health probes and fail every search
    pub fn offline(mut self) -> Self {
        self.online = false;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn generate(&self, criteria: &SearchCriteria, count: usize, base_price: i32) -> Vec<FlightOffer> {
        (0..count)
            .map(|n| {
                let departure_time = NaiveTime::from_hms_opt(6 + (n as u32 % 8) * 2, 0, 0)
                    .unwrap_or(NaiveTime::MIN);
                let departure = Utc
                    .from_utc_datetime(&criteria.departure_date.and_time(departure_time));
                let duration_minutes = 360 + (n as i64 % 4) * 45;
                let price = base_price + (n as i32) * 1500;

                FlightOffer {
                    id: Uuid::new_v4(),
                    source: self.id.clone(),
                    airline: self.airline.clone(),
                    flight_number: format!("{}{}", self.airline, 100 + n),
                    origin: criteria.origin.to_uppercase(),
                    destination: criteria.destination.to_uppercase(),
                    departure_time: departure,
                    arrival_time: departure + chrono::Duration::minutes(duration_minutes),
                    stops: (n as u32) % 3,
                    duration_minutes,
                    price_amount: price,
                    price_currency: "USD".to_string(),
                    score: 100.0 - n as f64,
                }
            })
            .collect()
    }
}

#[async_trait]
impl SearchAdapter for StubFlightAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<FlightOffer>, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut delay = self.latency;
        if self.jitter_ms > 0 {
            let extra = rand::thread_rng().gen_range(0..=self.jitter_ms);
            delay += Duration::from_millis(extra);
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if !self.online {
            return Err(AdapterError::Unreachable(self.id.clone()));
        }

        match &self.outcome {
            StubOutcome::Generate { offers, base_price } => {
                Ok(self.generate(criteria, *offers, *base_price))
            }
            StubOutcome::Fixed(offers) => Ok(offers.clone()),
            StubOutcome::Fail(message) => Err(AdapterError::Upstream(message.clone())),
        }
    }

    async fn health_check(&self) -> AdapterHealth {
        AdapterHealth {
            source: self.id.clone(),
            reachable: self.online,
            last_latency_ms: Some(self.latency.as_millis() as u64),
        }
    }
}
