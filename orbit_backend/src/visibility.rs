//! Resolves, for a requester and a query scope, the counterpart set eligible
//! for distance math. Privacy rules live here; geometry does not.

use crate::database::models::{LocatedUserRecord, UserRecord, VisibilityMode};
use crate::database::repositories::{
    BlockedUserRepository, FriendshipRepository, LocationRepository,
};
use crate::database::Database;
use anyhow::Result;
use std::collections::HashSet;
use std::str::FromStr;
use thiserror::Error;

/// Query mode: mutual friends only, or the opt-in stranger pool as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryScope {
    Friends,
    Everyone,
}

#[derive(Debug, Error)]
#[error("unknown scope {0:?}, expected \"friends\" or \"everyone\"")]
pub struct ParseScopeError(pub String);

impl FromStr for QueryScope {
    type Err = ParseScopeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "friends" => Ok(QueryScope::Friends),
            "everyone" => Ok(QueryScope::Everyone),
            other => Err(ParseScopeError(other.to_string())),
        }
    }
}

/// A counterpart eligible for distance computation. `friend_code` is only
/// populated for actual friends; strangers never expose theirs.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub user_id: i64,
    pub display_name: Option<String>,
    pub friend_code: Option<String>,
    pub is_friend: bool,
    pub latitude: f64,
    pub longitude: f64,
    pub updated_at: i64,
}

impl Candidate {
    fn friend(record: LocatedUserRecord) -> Self {
        Self {
            user_id: record.user_id,
            display_name: record.display_name,
            friend_code: Some(record.friend_code),
            is_friend: true,
            latitude: record.latitude,
            longitude: record.longitude,
            updated_at: record.updated_at,
        }
    }

    fn stranger(record: LocatedUserRecord) -> Self {
        Self {
            user_id: record.user_id,
            display_name: record.display_name,
            friend_code: None,
            is_friend: false,
            latitude: record.latitude,
            longitude: record.longitude,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct VisibilityResolver {
    database: Database,
}

impl VisibilityResolver {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Empty candidate lists are valid results, never errors.
    pub fn resolve(
        &self,
        requester: &UserRecord,
        scope: QueryScope,
        now: i64,
    ) -> Result<Vec<Candidate>> {
        match scope {
            QueryScope::Friends => self.resolve_friends(requester, now),
            QueryScope::Everyone => self.resolve_everyone(requester, now),
        }
    }

    /// Friends minus blocks (both directions), restricted to counterparts
    /// with an unexpired location whose mode is not OFF. A friend in
    /// EVERYONE mode is still a friend; OFF hides a user from everyone.
    fn resolve_friends(&self, requester: &UserRecord, now: i64) -> Result<Vec<Candidate>> {
        let requester_id = requester.id;
        self.database.with_repositories(|repos| {
            let friend_ids = repos.friendships().list_friend_ids(requester_id)?;
            if friend_ids.is_empty() {
                return Ok(Vec::new());
            }
            let blocked: HashSet<i64> = repos
                .blocked_users()
                .list_blocked_ids_both_directions(requester_id)?
                .into_iter()
                .collect();
            let visible_ids: Vec<i64> = friend_ids
                .into_iter()
                .filter(|id| !blocked.contains(id))
                .collect();
            if visible_ids.is_empty() {
                return Ok(Vec::new());
            }
            let rows = repos
                .locations()
                .list_located_in(&visible_ids, requester_id, now)?;
            Ok(rows
                .into_iter()
                .filter(|row| row.mode != VisibilityMode::Off)
                .map(Candidate::friend)
                .collect())
        })
    }

    /// Opt-in stranger pool plus the friends-scope result folded in. The
    /// stranger half is gated on the requester being discoverable too: you
    /// must be in EVERYONE mode to see EVERYONE-mode strangers.
    fn resolve_everyone(&self, requester: &UserRecord, now: i64) -> Result<Vec<Candidate>> {
        let mut candidates = Vec::new();

        if requester.mode == VisibilityMode::Everyone {
            let requester_id = requester.id;
            let strangers = self.database.with_repositories(|repos| {
                let friend_ids: HashSet<i64> = repos
                    .friendships()
                    .list_friend_ids(requester_id)?
                    .into_iter()
                    .collect();
                let blocked: HashSet<i64> = repos
                    .blocked_users()
                    .list_blocked_ids_both_directions(requester_id)?
                    .into_iter()
                    .collect();
                let rows = repos.locations().list_located_in_mode(
                    VisibilityMode::Everyone,
                    requester_id,
                    now,
                )?;
                // Friends are folded in below with their codes attached.
                Ok(rows
                    .into_iter()
                    .filter(|row| {
                        !friend_ids.contains(&row.user_id) && !blocked.contains(&row.user_id)
                    })
                    .map(Candidate::stranger)
                    .collect::<Vec<_>>())
            })?;
            candidates.extend(strangers);
        }

        candidates.extend(self.resolve_friends(requester, now)?);
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{LocationRecord, NewUser};
    use crate::database::repositories::UserRepository;
    use rusqlite::Connection;

    fn setup_database() -> Database {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let db = Database::from_connection(conn, true);
        db.ensure_migrations().expect("migrations");
        db
    }

    fn seed_user(db: &Database, tag: &str, mode: VisibilityMode) -> UserRecord {
        db.with_repositories(|repos| {
            repos.users().create(&NewUser {
                device_secret: format!("secret-{tag}"),
                friend_code: format!("{:0>8}", tag.to_uppercase()),
                mode,
                radius_meters: 1000,
                created_at: 0,
            })
        })
        .expect("seed user")
    }

    fn place(db: &Database, user_id: i64, expires_at: i64) {
        db.with_repositories(|repos| {
            repos.locations().upsert(&LocationRecord {
                user_id,
                latitude: 49.2827,
                longitude: -123.1207,
                accuracy: None,
                is_simulated: false,
                updated_at: 0,
                expires_at,
            })
        })
        .expect("place");
    }

    fn befriend(db: &Database, a: i64, b: i64) {
        db.with_repositories(|repos| repos.friendships().create_pair(a, b, 0)).expect("befriend");
    }

    const NOW: i64 = 100;
    const FRESH: i64 = 1_000;

    #[test]
    fn scope_parses_only_the_two_known_values() {
        assert_eq!("friends".parse::<QueryScope>().unwrap(), QueryScope::Friends);
        assert_eq!("everyone".parse::<QueryScope>().unwrap(), QueryScope::Everyone);
        assert!("Friends".parse::<QueryScope>().is_err());
        assert!("all".parse::<QueryScope>().is_err());
    }

    #[test]
    fn blocks_hide_both_directions_even_between_friends() {
        let db = setup_database();
        let ava = seed_user(&db, "ava", VisibilityMode::Friends);
        let ben = seed_user(&db, "ben", VisibilityMode::Friends);
        befriend(&db, ava.id, ben.id);
        place(&db, ava.id, FRESH);
        place(&db, ben.id, FRESH);
        db.with_repositories(|repos| repos.blocked_users().block(ava.id, ben.id, 0)).unwrap();

        let resolver = VisibilityResolver::new(db);
        assert!(resolver.resolve(&ava, QueryScope::Friends, NOW).unwrap().is_empty());
        assert!(resolver.resolve(&ben, QueryScope::Friends, NOW).unwrap().is_empty());
    }

    #[test]
    fn off_mode_friends_stay_invisible_but_everyone_mode_friends_show() {
        let db = setup_database();
        let ava = seed_user(&db, "ava", VisibilityMode::Friends);
        let ben = seed_user(&db, "ben", VisibilityMode::Off);
        let cleo = seed_user(&db, "cleo", VisibilityMode::Everyone);
        befriend(&db, ava.id, ben.id);
        befriend(&db, ava.id, cleo.id);
        place(&db, ben.id, FRESH);
        place(&db, cleo.id, FRESH);

        let resolver = VisibilityResolver::new(db);
        let candidates = resolver.resolve(&ava, QueryScope::Friends, NOW).unwrap();
        let ids: Vec<i64> = candidates.iter().map(|c| c.user_id).collect();
        assert_eq!(ids, vec![cleo.id]);
        assert!(candidates[0].is_friend);
        assert!(candidates[0].friend_code.is_some());
    }

    #[test]
    fn everyone_scope_requires_mutual_opt_in_for_strangers() {
        let db = setup_database();
        let ava = seed_user(&db, "ava", VisibilityMode::Friends);
        let stranger = seed_user(&db, "sam", VisibilityMode::Everyone);
        let friend = seed_user(&db, "ben", VisibilityMode::Friends);
        befriend(&db, ava.id, friend.id);
        place(&db, stranger.id, FRESH);
        place(&db, friend.id, FRESH);

        let resolver = VisibilityResolver::new(db);
        // Not opted in: only the friends fold-in comes back.
        let candidates = resolver.resolve(&ava, QueryScope::Everyone, NOW).unwrap();
        let ids: Vec<i64> = candidates.iter().map(|c| c.user_id).collect();
        assert_eq!(ids, vec![friend.id]);
    }

    #[test]
    fn everyone_scope_excludes_strangers_blocked_in_either_direction() {
        let db = setup_database();
        let ava = seed_user(&db, "ava", VisibilityMode::Everyone);
        let sam = seed_user(&db, "sam", VisibilityMode::Everyone);
        let tess = seed_user(&db, "tess", VisibilityMode::Everyone);
        place(&db, sam.id, FRESH);
        place(&db, tess.id, FRESH);
        db.with_repositories(|repos| repos.blocked_users().block(tess.id, ava.id, 0)).unwrap();

        let resolver = VisibilityResolver::new(db);
        let candidates = resolver.resolve(&ava, QueryScope::Everyone, NOW).unwrap();
        let ids: Vec<i64> = candidates.iter().map(|c| c.user_id).collect();
        assert_eq!(ids, vec![sam.id]);
    }

    #[test]
    fn strangers_never_carry_a_friend_code() {
        let db = setup_database();
        let ava = seed_user(&db, "ava", VisibilityMode::Everyone);
        let sam = seed_user(&db, "sam", VisibilityMode::Everyone);
        let ben = seed_user(&db, "ben", VisibilityMode::Friends);
        befriend(&db, ava.id, ben.id);
        place(&db, sam.id, FRESH);
        place(&db, ben.id, FRESH);

        let resolver = VisibilityResolver::new(db);
        let candidates = resolver.resolve(&ava, QueryScope::Everyone, NOW).unwrap();
        for candidate in &candidates {
            if candidate.is_friend {
                assert!(candidate.friend_code.is_some());
            } else {
                assert!(candidate.friend_code.is_none());
            }
        }
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn expired_locations_are_treated_as_absent() {
        let db = setup_database();
        let ava = seed_user(&db, "ava", VisibilityMode::Friends);
        let ben = seed_user(&db, "ben", VisibilityMode::Friends);
        befriend(&db, ava.id, ben.id);
        place(&db, ben.id, NOW); // expires_at == now counts as expired

        let resolver = VisibilityResolver::new(db);
        assert!(resolver.resolve(&ava, QueryScope::Friends, NOW).unwrap().is_empty());
    }
}
