//! The proximity query pipeline: requester location, candidate resolution,
//! radius filter, distance/bearing annotation, alert tracking.

use crate::alerts::ProximityTracker;
use crate::config::ProximityConfig;
use crate::database::models::UserRecord;
use crate::database::repositories::LocationRepository;
use crate::database::Database;
use crate::geo::{self, DistanceBand};
use crate::utils::now_ts;
use crate::visibility::{QueryScope, VisibilityResolver};
use anyhow::Result;
use serde::Serialize;

#[derive(Clone)]
pub struct NearbyService {
    database: Database,
    resolver: VisibilityResolver,
    tracker: ProximityTracker,
}

impl NearbyService {
    pub fn new(database: Database, config: ProximityConfig) -> Self {
        let resolver = VisibilityResolver::new(database.clone());
        let tracker = ProximityTracker::new(database.clone(), config);
        Self {
            database,
            resolver,
            tracker,
        }
    }

    pub fn get_nearby(&self, requester: &UserRecord, scope: QueryScope) -> Result<NearbyResult> {
        self.get_nearby_at(requester, scope, now_ts())
    }

    pub fn get_nearby_at(
        &self,
        requester: &UserRecord,
        scope: QueryScope,
        now: i64,
    ) -> Result<NearbyResult> {
        let location = self
            .database
            .with_repositories(|repos| repos.locations().get(requester.id))?;
        let Some(location) = location else {
            return Ok(NearbyResult::empty(
                requester.radius_meters,
                "No location data available. Update your location first.",
            ));
        };
        // An expired own location is indistinguishable from a missing one.
        if location.expires_at <= now {
            return Ok(NearbyResult::empty(
                requester.radius_meters,
                "Location expired. Update your location to see nearby friends.",
            ));
        }

        let candidates = self.resolver.resolve(requester, scope, now)?;

        let mut nearby = Vec::new();
        for candidate in candidates {
            let distance = geo::distance_meters(
                location.latitude,
                location.longitude,
                candidate.latitude,
                candidate.longitude,
            );
            // Inclusive raw comparison; rounding is output-only.
            if distance > requester.radius_meters as f64 {
                continue;
            }
            let bearing = geo::initial_bearing_degrees(
                location.latitude,
                location.longitude,
                candidate.latitude,
                candidate.longitude,
            );
            nearby.push(NearbyEntry {
                user_id: candidate.user_id,
                display_name: candidate.display_name,
                friend_code: candidate.friend_code,
                is_friend: candidate.is_friend,
                distance: distance.round() as i64,
                distance_category: DistanceBand::for_distance(distance),
                bearing: (bearing.round() as i64) % 360,
                latitude: candidate.latitude,
                longitude: candidate.longitude,
                last_updated: candidate.updated_at,
            });
        }
        // Stable: equidistant entries keep resolver order.
        nearby.sort_by_key(|entry| entry.distance);

        let new_alerts = match scope {
            QueryScope::Friends => self.tracker.track(requester.id, &nearby, now)?,
            // Event tracking only applies to friend relationships.
            QueryScope::Everyone => Vec::new(),
        };

        Ok(NearbyResult {
            nearby,
            new_alerts,
            requester_location: Some(RequesterLocation {
                latitude: location.latitude,
                longitude: location.longitude,
                last_updated: location.updated_at,
            }),
            radius_meters: requester.radius_meters,
            message: None,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyEntry {
    pub user_id: i64,
    pub display_name: Option<String>,
    /// Only present for friends; a stranger's code is never revealed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friend_code: Option<String>,
    pub is_friend: bool,
    /// Whole meters.
    pub distance: i64,
    pub distance_category: DistanceBand,
    /// Whole degrees, 0 = north.
    pub bearing: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub last_updated: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequesterLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub last_updated: i64,
}

/// Empty states carry a message so clients can tell "no one nearby" apart
/// from "something went wrong".
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyResult {
    pub nearby: Vec<NearbyEntry>,
    pub new_alerts: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester_location: Option<RequesterLocation>,
    pub radius_meters: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl NearbyResult {
    fn empty(radius_meters: i64, message: &str) -> Self {
        Self {
            nearby: Vec::new(),
            new_alerts: Vec::new(),
            requester_location: None,
            radius_meters,
            message: Some(message.to_string()),
        }
    }
}
