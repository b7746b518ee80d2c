use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Maximum passengers per search request
pub const MAX_PASSENGERS: u32 = 9;

/// Immutable search criteria, created once at dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub passengers: u32,
    pub cabin_class: Option<String>,
}

impl SearchCriteria {
    /// Structural validation, performed before any source is contacted
    pub fn validate(&self) -> Result<(), CriteriaError> {
        if self.origin.trim().is_empty() {
            return Err(CriteriaError::EmptyOrigin);
        }
        if self.destination.trim().is_empty() {
            return Err(CriteriaError::EmptyDestination);
        }
        if self.origin.trim().eq_ignore_ascii_case(self.destination.trim()) {
            return Err(CriteriaError::SameAirports(self.origin.trim().to_uppercase()));
        }
        if let Some(return_date) = self.return_date {
            if return_date < self.departure_date {
                return Err(CriteriaError::ReturnBeforeDeparture {
                    departure: self.departure_date,
                    ret: return_date,
                });
            }
        }
        if self.passengers == 0 || self.passengers > MAX_PASSENGERS {
            return Err(CriteriaError::PassengerCount(self.passengers));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CriteriaError {
    #[error("Origin airport code must not be empty")]
    EmptyOrigin,

    #[error("Destination airport code must not be empty")]
    EmptyDestination,

    #[error("Origin and destination are both {0}")]
    SameAirports(String),

    #[error("Return date {ret} precedes departure date {departure}")]
    ReturnBeforeDeparture { departure: NaiveDate, ret: NaiveDate },

    #[error("Passenger count {0} outside the allowed 1..=9 range")]
    PassengerCount(u32),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn criteria() -> SearchCriteria {
        SearchCriteria {
            origin: "JFK".to_string(),
            destination: "LHR".to_string(),
            departure_date: NaiveDate::from_ymd_opt(2026, 12, 25).unwrap(),
            return_date: None,
            passengers: 2,
            cabin_class: None,
        }
    }

    #[test]
    fn test_criteria_deserialization() {
        let json = r#"
            {
                "origin": "JFK",
                "destination": "LHR",
                "departure_date": "2026-12-25",
                "passengers": 2
            }
        "#;
        let parsed: SearchCriteria = serde_json::from_str(json).expect("Failed to deserialize");
        assert_eq!(parsed.origin, "JFK");
        assert_eq!(parsed.departure_date, NaiveDate::from_ymd_opt(2026, 12, 25).unwrap());
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_empty_airports_rejected() {
        let mut c = criteria();
        c.origin = "  ".to_string();
        assert!(matches!(c.validate(), Err(CriteriaError::EmptyOrigin)));

        let mut c = criteria();
        c.destination = String::new();
        assert!(matches!(c.validate(), Err(CriteriaError::EmptyDestination)));
    }

    #[test]
    fn test_date_ordering_rejected() {
        let mut c = criteria();
        c.return_date = Some(NaiveDate::from_ymd_opt(2026, 12, 20).unwrap());
        assert!(matches!(
            c.validate(),
            Err(CriteriaError::ReturnBeforeDeparture { .. })
        ));

        // Same-day return is a valid day trip
        c.return_date = Some(c.departure_date);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_passenger_bounds() {
        let mut c = criteria();
        c.passengers = 0;
        assert!(matches!(c.validate(), Err(CriteriaError::PassengerCount(0))));

        c.passengers = MAX_PASSENGERS + 1;
        assert!(c.validate().is_err());

        c.passengers = MAX_PASSENGERS;
        assert!(c.validate().is_ok());
    }
}
