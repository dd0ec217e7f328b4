//! Location reporting with a TTL. One live row per user; every report
//! replaces the last and pushes the expiry forward.

use crate::config::ProximityConfig;
use crate::database::models::LocationRecord;
use crate::database::repositories::LocationRepository;
use crate::database::Database;
use crate::utils::now_ts;
use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct LocationService {
    database: Database,
    config: ProximityConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLocationInput {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub is_simulated: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationView {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub is_simulated: bool,
    pub updated_at: i64,
    pub expires_at: i64,
}

impl LocationService {
    pub fn new(database: Database, config: ProximityConfig) -> Self {
        Self { database, config }
    }

    pub fn update(&self, user_id: i64, input: UpdateLocationInput) -> Result<LocationView> {
        self.update_at(user_id, input, now_ts())
    }

    pub fn update_at(
        &self,
        user_id: i64,
        input: UpdateLocationInput,
        now: i64,
    ) -> Result<LocationView> {
        if !(-90.0..=90.0).contains(&input.latitude) {
            anyhow::bail!("latitude must be between -90 and 90");
        }
        if !(-180.0..=180.0).contains(&input.longitude) {
            anyhow::bail!("longitude must be between -180 and 180");
        }

        let record = LocationRecord {
            user_id,
            latitude: input.latitude,
            longitude: input.longitude,
            accuracy: input.accuracy,
            is_simulated: input.is_simulated,
            updated_at: now,
            expires_at: now + self.config.location_ttl_secs,
        };
        self.database
            .with_repositories(|repos| repos.locations().upsert(&record))?;

        Ok(LocationView {
            latitude: record.latitude,
            longitude: record.longitude,
            accuracy: record.accuracy,
            is_simulated: record.is_simulated,
            updated_at: record.updated_at,
            expires_at: record.expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{NewUser, VisibilityMode};
    use crate::database::repositories::UserRepository;
    use rusqlite::Connection;

    fn setup() -> (Database, LocationService, i64) {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let db = Database::from_connection(conn, true);
        db.ensure_migrations().expect("migrations");
        let user = db
            .with_repositories(|repos| {
                repos.users().create(&NewUser {
                    device_secret: "secret-ava".into(),
                    friend_code: "AVAAVAAV".into(),
                    mode: VisibilityMode::Friends,
                    radius_meters: 1000,
                    created_at: 0,
                })
            })
            .expect("seed user");
        let service = LocationService::new(db.clone(), ProximityConfig::default());
        (db, service, user.id)
    }

    #[test]
    fn update_sets_the_ttl_from_config() {
        let (db, service, user_id) = setup();
        let view = service
            .update_at(
                user_id,
                UpdateLocationInput {
                    latitude: 49.2827,
                    longitude: -123.1207,
                    accuracy: Some(8.0),
                    is_simulated: false,
                },
                1_000,
            )
            .expect("update");
        assert_eq!(view.expires_at, 1_000 + 24 * 60 * 60);

        let stored = db
            .with_repositories(|repos| repos.locations().get(user_id))
            .unwrap()
            .unwrap();
        assert_eq!(stored.latitude, 49.2827);
    }

    #[test]
    fn every_update_resets_the_expiry() {
        let (db, service, user_id) = setup();
        let input = UpdateLocationInput {
            latitude: 49.2827,
            longitude: -123.1207,
            accuracy: None,
            is_simulated: false,
        };
        service.update_at(user_id, input.clone(), 1_000).expect("first update");
        service.update_at(user_id, input, 5_000).expect("second update");

        let stored = db
            .with_repositories(|repos| repos.locations().get(user_id))
            .unwrap()
            .unwrap();
        assert_eq!(stored.expires_at, 5_000 + 24 * 60 * 60);
        assert_eq!(stored.updated_at, 5_000);
    }

    #[test]
    fn out_of_range_coordinates_are_rejected_before_any_write() {
        let (db, service, user_id) = setup();
        let err = service
            .update_at(
                user_id,
                UpdateLocationInput {
                    latitude: 91.0,
                    longitude: 0.0,
                    accuracy: None,
                    is_simulated: false,
                },
                1_000,
            )
            .unwrap_err();
        assert!(err.to_string().contains("latitude must be between"));

        let err = service
            .update_at(
                user_id,
                UpdateLocationInput {
                    latitude: 0.0,
                    longitude: -180.5,
                    accuracy: None,
                    is_simulated: false,
                },
                1_000,
            )
            .unwrap_err();
        assert!(err.to_string().contains("longitude must be between"));

        let stored = db.with_repositories(|repos| repos.locations().get(user_id)).unwrap();
        assert!(stored.is_none());
    }
}
