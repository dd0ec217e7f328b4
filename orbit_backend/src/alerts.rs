//! Edge-triggered "entered proximity" detection. The only persisted signal
//! is an IN event; staleness is inferred from the absence of a recent row,
//! never from explicit OUT transitions.

use crate::config::ProximityConfig;
use crate::database::models::ProximityEventRecord;
use crate::database::repositories::ProximityEventRepository;
use crate::database::Database;
use crate::nearby::NearbyEntry;
use anyhow::Result;
use std::collections::HashSet;

#[derive(Clone)]
pub struct ProximityTracker {
    database: Database,
    config: ProximityConfig,
}

impl ProximityTracker {
    pub fn new(database: Database, config: ProximityConfig) -> Self {
        Self { database, config }
    }

    /// Returns the counterpart ids newly entering range. A counterpart
    /// already alerted inside the cooldown window stays in the nearby list
    /// but is omitted here. A failed event write is logged and suppresses
    /// that one alert; the rest of the batch still goes through.
    pub fn track(&self, requester_id: i64, nearby: &[NearbyEntry], now: i64) -> Result<Vec<i64>> {
        if nearby.is_empty() {
            return Ok(Vec::new());
        }
        let since = now - self.config.alert_cooldown_secs;
        let retention = self.config.location_ttl_secs;

        self.database.with_repositories(|repos| {
            let events = repos.proximity_events();
            let recently_alerted: HashSet<i64> = events
                .list_recent_counterpart_ids(requester_id, since, now)?
                .into_iter()
                .collect();

            let mut new_alerts = Vec::new();
            for entry in nearby {
                if recently_alerted.contains(&entry.user_id) {
                    continue;
                }
                let record = ProximityEventRecord {
                    user_id: requester_id,
                    friend_id: entry.user_id,
                    distance: entry.distance as f64,
                    created_at: now,
                    expires_at: now + retention,
                };
                // Write first, report second: an alert without a dedup row
                // would repeat on the next poll.
                match events.insert(&record) {
                    Ok(()) => new_alerts.push(entry.user_id),
                    Err(err) => tracing::warn!(
                        error = ?err,
                        requester_id,
                        counterpart_id = entry.user_id,
                        "failed to record proximity event, alert suppressed for this poll"
                    ),
                }
            }
            Ok(new_alerts)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{NewUser, UserRecord, VisibilityMode};
    use crate::database::repositories::UserRepository;
    use crate::geo::DistanceBand;
    use rusqlite::Connection;

    fn setup_database() -> Database {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let db = Database::from_connection(conn, true);
        db.ensure_migrations().expect("migrations");
        db
    }

    fn seed_user(db: &Database, tag: &str) -> UserRecord {
        db.with_repositories(|repos| {
            repos.users().create(&NewUser {
                device_secret: format!("secret-{tag}"),
                friend_code: format!("{:0>8}", tag.to_uppercase()),
                mode: VisibilityMode::Friends,
                radius_meters: 1000,
                created_at: 0,
            })
        })
        .expect("seed user")
    }

    fn nearby_entry(user_id: i64, distance: i64) -> NearbyEntry {
        NearbyEntry {
            user_id,
            display_name: None,
            friend_code: Some("00000000".into()),
            is_friend: true,
            distance,
            distance_category: DistanceBand::for_distance(distance as f64),
            bearing: 0,
            latitude: 49.0,
            longitude: -123.0,
            last_updated: 0,
        }
    }

    const COOLDOWN: i64 = 30 * 60;

    fn tracker(db: &Database) -> ProximityTracker {
        ProximityTracker::new(db.clone(), ProximityConfig::default())
    }

    #[test]
    fn first_poll_alerts_second_poll_is_silent() {
        let db = setup_database();
        let ava = seed_user(&db, "ava");
        let ben = seed_user(&db, "ben");
        let tracker = tracker(&db);

        let nearby = vec![nearby_entry(ben.id, 250)];
        assert_eq!(tracker.track(ava.id, &nearby, 1_000).unwrap(), vec![ben.id]);
        assert!(tracker.track(ava.id, &nearby, 1_030).unwrap().is_empty());
    }

    #[test]
    fn alert_reappears_after_the_cooldown_elapses() {
        let db = setup_database();
        let ava = seed_user(&db, "ava");
        let ben = seed_user(&db, "ben");
        let tracker = tracker(&db);

        let nearby = vec![nearby_entry(ben.id, 250)];
        assert_eq!(tracker.track(ava.id, &nearby, 1_000).unwrap(), vec![ben.id]);
        // still inside the window
        assert!(tracker.track(ava.id, &nearby, 1_000 + COOLDOWN - 1).unwrap().is_empty());
        // window over, the same friend is "new" again
        assert_eq!(
            tracker.track(ava.id, &nearby, 1_000 + COOLDOWN + 1).unwrap(),
            vec![ben.id]
        );
    }

    #[test]
    fn dedup_is_per_counterpart() {
        let db = setup_database();
        let ava = seed_user(&db, "ava");
        let ben = seed_user(&db, "ben");
        let cleo = seed_user(&db, "cleo");
        let tracker = tracker(&db);

        assert_eq!(
            tracker.track(ava.id, &[nearby_entry(ben.id, 250)], 1_000).unwrap(),
            vec![ben.id]
        );
        // cleo shows up later; only she is new
        let both = vec![nearby_entry(ben.id, 260), nearby_entry(cleo.id, 400)];
        assert_eq!(tracker.track(ava.id, &both, 1_060).unwrap(), vec![cleo.id]);
    }

    #[test]
    fn one_failed_insert_does_not_abort_the_batch() {
        let db = setup_database();
        let ava = seed_user(&db, "ava");
        let ben = seed_user(&db, "ben");
        let tracker = tracker(&db);

        // id 9999 has no users row, so its event insert violates the foreign
        // key; ben's alert must still land and the call must succeed.
        let nearby = vec![nearby_entry(9999, 100), nearby_entry(ben.id, 250)];
        let alerts = tracker.track(ava.id, &nearby, 1_000).unwrap();
        assert_eq!(alerts, vec![ben.id]);
    }
}
