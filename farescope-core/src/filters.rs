use std::cmp::Ordering;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::offer::FlightOffer;

/// Enumerated filter configuration; absent fields do not constrain.
/// All recognized predicates are AND-combined.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlightFilters {
    pub price_min: Option<i32>,
    pub price_max: Option<i32>,
    pub airlines: Option<Vec<String>>,
    pub max_stops: Option<u32>,
    pub duration_min: Option<i64>,
    pub duration_max: Option<i64>,
    pub departure_after: Option<NaiveTime>,
    pub departure_before: Option<NaiveTime>,
}

impl FlightFilters {
    pub fn matches(&self, offer: &FlightOffer) -> bool {
        if let Some(min) = self.price_min {
            if offer.price_amount < min {
                return false;
            }
        }
        if let Some(max) = self.price_max {
            if offer.price_amount > max {
                return false;
            }
        }
        if let Some(airlines) = &self.airlines {
            if !airlines
                .iter()
                .any(|a| a.eq_ignore_ascii_case(&offer.airline))
            {
                return false;
            }
        }
        if let Some(max_stops) = self.max_stops {
            if offer.stops > max_stops {
                return false;
            }
        }
        if let Some(min) = self.duration_min {
            if offer.duration_minutes < min {
                return false;
            }
        }
        if let Some(max) = self.duration_max {
            if offer.duration_minutes > max {
                return false;
            }
        }
        let departure = offer.departure_time.time();
        if let Some(after) = self.departure_after {
            if departure < after {
                return false;
            }
        }
        if let Some(before) = self.departure_before {
            if departure > before {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, offers: &[FlightOffer]) -> Vec<FlightOffer> {
        offers
            .iter()
            .filter(|o| self.matches(o))
            .cloned()
            .collect()
    }

    /// Canonical rendering of the filter parameters; equal filters always
    /// produce the same key regardless of airline ordering or casing.
    pub fn cache_key(&self) -> String {
        let airlines = self.airlines.as_ref().map(|list| {
            let mut normalized: Vec<String> =
                list.iter().map(|a| a.trim().to_uppercase()).collect();
            normalized.sort();
            normalized.dedup();
            normalized.join(",")
        });

        format!(
            "price={}..{}|airlines={}|stops={}|duration={}..{}|departure={}..{}",
            fmt_opt(self.price_min),
            fmt_opt(self.price_max),
            airlines.unwrap_or_else(|| "*".to_string()),
            fmt_opt(self.max_stops),
            fmt_opt(self.duration_min),
            fmt_opt(self.duration_max),
            self.departure_after
                .map(|t| t.format("%H:%M").to_string())
                .unwrap_or_else(|| "*".to_string()),
            self.departure_before
                .map(|t| t.format("%H:%M").to_string())
                .unwrap_or_else(|| "*".to_string()),
        )
    }
}

fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "*".to_string())
}

/// Recognized sort keys
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Price,
    Duration,
    Score,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Price => "price",
            SortKey::Duration => "duration",
            SortKey::Score => "score",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ascending",
            SortOrder::Descending => "descending",
        }
    }
}

/// Ties on the primary key always break the same way: price ascending, then
/// duration ascending, then source id lexicographic. Repeated calls on the
/// same set therefore reproduce the same ordering.
fn tie_break(a: &FlightOffer, b: &FlightOffer) -> Ordering {
    a.price_amount
        .cmp(&b.price_amount)
        .then_with(|| a.duration_minutes.cmp(&b.duration_minutes))
        .then_with(|| a.source.cmp(&b.source))
}

/// Stable sort by the requested key and order
pub fn sort_offers(offers: &mut [FlightOffer], key: SortKey, order: SortOrder) {
    offers.sort_by(|a, b| {
        let primary = match key {
            SortKey::Price => a.price_amount.cmp(&b.price_amount),
            SortKey::Duration => a.duration_minutes.cmp(&b.duration_minutes),
            SortKey::Score => a.score.total_cmp(&b.score),
        };
        let primary = match order {
            SortOrder::Ascending => primary,
            SortOrder::Descending => primary.reverse(),
        };
        primary.then_with(|| tie_break(a, b))
    });
}

/// Ordering applied to the aggregated raw view after all sources settle
pub fn default_sort(offers: &mut [FlightOffer]) {
    offers.sort_by(tie_break);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn offer(source: &str, airline: &str, price: i32, duration: i64, stops: u32) -> FlightOffer {
        let departure = Utc.with_ymd_and_hms(2026, 12, 25, 9, 30, 0).unwrap();
        FlightOffer {
            id: Uuid::new_v4(),
            source: source.to_string(),
            airline: airline.to_string(),
            flight_number: format!("{}100", airline),
            origin: "JFK".to_string(),
            destination: "LHR".to_string(),
            departure_time: departure,
            arrival_time: departure + chrono::Duration::minutes(duration),
            stops,
            duration_minutes: duration,
            price_amount: price,
            price_currency: "USD".to_string(),
            score: price as f64,
        }
    }

    #[test]
    fn test_price_range_filter() {
        // Raw set with prices 80..450; range [100, 300] keeps exactly three
        let offers = vec![
            offer("amadeus", "BA", 80, 400, 0),
            offer("amadeus", "BA", 150, 410, 1),
            offer("sabre", "AA", 220, 390, 0),
            offer("sabre", "AA", 310, 420, 2),
            offer("kiwi", "VS", 450, 380, 0),
        ];

        let filters = FlightFilters {
            price_min: Some(100),
            price_max: Some(300),
            ..Default::default()
        };

        let filtered = filters.apply(&offers);
        assert_eq!(filtered.len(), 3);
        assert!(filtered
            .iter()
            .all(|o| o.price_amount >= 100 && o.price_amount <= 300));
    }

    #[test]
    fn test_combined_predicates_are_anded() {
        let offers = vec![
            offer("amadeus", "BA", 200, 400, 0),
            offer("amadeus", "AA", 200, 400, 0),
            offer("sabre", "BA", 200, 400, 3),
        ];

        let filters = FlightFilters {
            airlines: Some(vec!["ba".to_string()]),
            max_stops: Some(1),
            ..Default::default()
        };

        let filtered = filters.apply(&offers);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].airline, "BA");
        assert_eq!(filtered[0].stops, 0);
    }

    #[test]
    fn test_cache_key_is_order_insensitive() {
        let a = FlightFilters {
            airlines: Some(vec!["ba".to_string(), "AA".to_string()]),
            price_max: Some(300),
            ..Default::default()
        };
        let b = FlightFilters {
            airlines: Some(vec!["AA".to_string(), "BA".to_string()]),
            price_max: Some(300),
            ..Default::default()
        };
        assert_eq!(a.cache_key(), b.cache_key());
        assert_ne!(a.cache_key(), FlightFilters::default().cache_key());
    }

    #[test]
    fn test_sort_preserves_multiset_and_breaks_ties() {
        let mut offers = vec![
            offer("sabre", "AA", 200, 500, 0),
            offer("amadeus", "BA", 200, 400, 0),
            offer("kiwi", "VS", 100, 450, 0),
            offer("amadeus", "BA", 200, 400, 1),
        ];
        let ids: Vec<Uuid> = offers.iter().map(|o| o.id).collect();

        sort_offers(&mut offers, SortKey::Price, SortOrder::Ascending);

        // Same multiset of elements
        let mut sorted_ids: Vec<Uuid> = offers.iter().map(|o| o.id).collect();
        sorted_ids.sort();
        let mut expected = ids.clone();
        expected.sort();
        assert_eq!(sorted_ids, expected);

        // 100 first, then the 200s tie-broken by duration, then source
        assert_eq!(offers[0].price_amount, 100);
        assert_eq!(offers[1].duration_minutes, 400);
        assert_eq!(offers[1].source, "amadeus");
        assert_eq!(offers[3].source, "sabre");
    }

    #[test]
    fn test_descending_primary_keeps_ascending_tie_break() {
        let mut offers = vec![
            offer("sabre", "AA", 300, 200, 0),
            offer("amadeus", "BA", 100, 200, 0),
            offer("kiwi", "VS", 200, 200, 0),
        ];
        sort_offers(&mut offers, SortKey::Duration, SortOrder::Descending);

        // All durations equal: tie-break is price ascending even though the
        // primary order is descending
        let prices: Vec<i32> = offers.iter().map(|o| o.price_amount).collect();
        assert_eq!(prices, vec![100, 200, 300]);
    }
}
