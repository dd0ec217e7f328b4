//! Demo fixtures: a small cast clustered around downtown Vancouver with
//! friendships, one pending request, and one block pair. Credentials are
//! freshly issued and printed so a client can log straight in.

use crate::accounts::AccountService;
use crate::config::ProximityConfig;
use crate::database::models::{SettingsUpdate, VisibilityMode};
use crate::database::repositories::{
    BlockedUserRepository, FriendRequestRepository, FriendshipRepository,
};
use crate::database::Database;
use crate::location::{LocationService, UpdateLocationInput};
use crate::utils::now_ts;
use anyhow::Result;

struct DemoUser {
    name: &'static str,
    mode: VisibilityMode,
    latitude: f64,
    longitude: f64,
}

const CAST: [DemoUser; 5] = [
    DemoUser {
        name: "Aurora",
        mode: VisibilityMode::Friends,
        latitude: 49.2827,
        longitude: -123.1207,
    },
    DemoUser {
        name: "Basil",
        mode: VisibilityMode::Friends,
        latitude: 49.2850,
        longitude: -123.1207,
    },
    DemoUser {
        name: "Cedar",
        mode: VisibilityMode::Friends,
        latitude: 49.2870,
        longitude: -123.1350,
    },
    DemoUser {
        name: "Dahlia",
        mode: VisibilityMode::Friends,
        latitude: 49.2780,
        longitude: -123.1150,
    },
    DemoUser {
        name: "Ember",
        mode: VisibilityMode::Everyone,
        latitude: 49.2900,
        longitude: -123.0900,
    },
];

/// Re-running registers a fresh cast rather than failing on the old one.
pub fn run(database: &Database, config: &ProximityConfig) -> Result<()> {
    let accounts = AccountService::new(database.clone(), *config);
    let locations = LocationService::new(database.clone(), *config);

    let mut seeded = Vec::with_capacity(CAST.len());
    for demo in &CAST {
        let registered = accounts.register()?;
        accounts.update_settings(
            registered.user_id,
            SettingsUpdate {
                display_name: Some(Some(demo.name.to_string())),
                mode: Some(demo.mode),
                ..Default::default()
            },
        )?;
        locations.update(
            registered.user_id,
            UpdateLocationInput {
                latitude: demo.latitude,
                longitude: demo.longitude,
                accuracy: Some(10.0),
                is_simulated: true,
            },
        )?;
        seeded.push(registered);
    }

    let now = now_ts();
    database.with_repositories(|repos| {
        // Aurora is friends with Basil and Cedar; Dahlia wants in; Cedar and
        // Dahlia cannot see each other.
        repos.friendships().create_pair(seeded[0].user_id, seeded[1].user_id, now)?;
        repos.friendships().create_pair(seeded[0].user_id, seeded[2].user_id, now)?;
        repos.friend_requests().create(seeded[3].user_id, seeded[0].user_id, now)?;
        repos.blocked_users().block(seeded[2].user_id, seeded[3].user_id, now)?;
        Ok(())
    })?;

    tracing::info!(users = seeded.len(), "demo cast seeded");
    println!("Seeded demo users (log in with the device secret):");
    for (registered, demo) in seeded.iter().zip(CAST.iter()) {
        println!(
            "  {:<8} userId={} friendCode={} deviceSecret={}",
            demo.name, registered.user_id, registered.friend_code, registered.device_secret
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repositories::LocationRepository;
    use rusqlite::Connection;

    #[test]
    fn seeding_twice_registers_two_casts() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let db = Database::from_connection(conn, true);
        db.ensure_migrations().expect("migrations");
        let config = ProximityConfig::default();

        run(&db, &config).expect("first seed");
        run(&db, &config).expect("second seed");

        let located = db
            .with_repositories(|repos| {
                repos.locations().list_located_in_mode(
                    VisibilityMode::Everyone,
                    0,
                    now_ts(),
                )
            })
            .unwrap();
        assert_eq!(located.len(), 2, "one opted-in user per cast");
    }
}
