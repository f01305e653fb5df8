//! Source of resolution data.

use crate::model::{DirectorRecord, ResolutionRequest};

/// Looks up a resolution and its directors by resolution id.
pub trait ResolutionStore: Send + Sync {
    fn find(&self, resolution_id: &str) -> Option<ResolutionRequest>;
}

/// Seeded data served for every resolution id until a real store is wired in.
#[derive(Debug, Clone)]
pub struct StaticResolutionStore {
    company_name: String,
    date: String,
    time: String,
    address: String,
    directors: Vec<DirectorRecord>,
}

impl StaticResolutionStore {
    pub fn new(
        company_name: impl Into<String>,
        date: impl Into<String>,
        time: impl Into<String>,
        address: impl Into<String>,
        directors: Vec<DirectorRecord>,
    ) -> Self {
        Self {
            company_name: company_name.into(),
            date: date.into(),
            time: time.into(),
            address: address.into(),
            directors,
        }
    }

    /// The demo board used by the service out of the box.
    pub fn seeded() -> Self {
        let director = |id: &str, name: &str, pan: &str, email: &str| DirectorRecord {
            id: id.to_string(),
            name: name.to_string(),
            pan_number: pan.to_string(),
            email: email.to_string(),
        };

        Self::new(
            "Demo Pvt Ltd",
            "15/01/2025",
            "11:00 AM",
            "Registered Office, 12 Park Street, Kolkata 700016",
            vec![
                director("1", "John Doe", "ABCDE1234F", "john.doe@example.com"),
                director("2", "Jane Smith", "PQRSX5678K", "jane.smith@example.com"),
                director("3", "Ravi Kumar", "LMNOP9012Z", "ravi.kumar@example.com"),
            ],
        )
    }
}

impl ResolutionStore for StaticResolutionStore {
    fn find(&self, resolution_id: &str) -> Option<ResolutionRequest> {
        Some(ResolutionRequest {
            resolution_id: resolution_id.to_string(),
            company_name: self.company_name.clone(),
            date: self.date.clone(),
            time: self.time.clone(),
            address: self.address.clone(),
            directors: self.directors.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_store_echoes_id() {
        let store = StaticResolutionStore::seeded();
        let res = store.find("RES-2025-001").unwrap();
        assert_eq!(res.resolution_id, "RES-2025-001");
        assert_eq!(res.directors.len(), 3);
        assert_eq!(res.directors[0].name, "John Doe");
    }
}
