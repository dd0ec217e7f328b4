mod blocked_users;
mod friend_requests;
mod friendships;
mod locations;
mod proximity_events;
mod users;

use super::models::{
    BlockedUserRecord, FriendRecord, FriendRequestRecord, IncomingRequestRecord,
    LocatedUserRecord, LocationRecord, NewUser, ProximityEventRecord, RequestStatus,
    SettingsUpdate, UserRecord, VisibilityMode,
};
use anyhow::Result;
use rusqlite::Connection;

pub trait UserRepository {
    fn create(&self, new_user: &NewUser) -> Result<UserRecord>;
    fn get(&self, id: i64) -> Result<Option<UserRecord>>;
    fn get_by_device_secret(&self, device_secret: &str) -> Result<Option<UserRecord>>;
    fn get_by_friend_code(&self, friend_code: &str) -> Result<Option<UserRecord>>;
    fn friend_code_exists(&self, friend_code: &str) -> Result<bool>;
    fn update_settings(&self, id: i64, update: &SettingsUpdate, now: i64) -> Result<()>;
}

pub trait LocationRepository {
    /// Singleton row per user; replaces any previous report and resets expiry.
    fn upsert(&self, record: &LocationRecord) -> Result<()>;
    fn get(&self, user_id: i64) -> Result<Option<LocationRecord>>;
    /// Users among `user_ids` holding an unexpired location, joined with
    /// their profile. `excluding` never appears in the result.
    fn list_located_in(
        &self,
        user_ids: &[i64],
        excluding: i64,
        now: i64,
    ) -> Result<Vec<LocatedUserRecord>>;
    /// All users in `mode` holding an unexpired location, except `excluding`.
    fn list_located_in_mode(
        &self,
        mode: VisibilityMode,
        excluding: i64,
        now: i64,
    ) -> Result<Vec<LocatedUserRecord>>;
}

pub trait FriendshipRepository {
    /// Writes both directed edges in one statement; a friendship never
    /// exists in only one direction.
    fn create_pair(&self, user_id: i64, friend_id: i64, now: i64) -> Result<()>;
    /// Removes both directed edges, returning how many rows went away.
    fn delete_pair(&self, user_id: i64, friend_id: i64) -> Result<usize>;
    fn exists(&self, user_id: i64, friend_id: i64) -> Result<bool>;
    fn list_friend_ids(&self, user_id: i64) -> Result<Vec<i64>>;
    fn list_friends(&self, user_id: i64) -> Result<Vec<FriendRecord>>;
}

pub trait FriendRequestRepository {
    fn create(&self, from_user_id: i64, to_user_id: i64, now: i64) -> Result<FriendRequestRecord>;
    fn get(&self, id: i64) -> Result<Option<FriendRequestRecord>>;
    /// True when a PENDING request exists in either direction between the pair.
    fn pending_between(&self, a: i64, b: i64) -> Result<bool>;
    fn list_incoming_pending(&self, user_id: i64) -> Result<Vec<IncomingRequestRecord>>;
    fn set_status(&self, id: i64, status: RequestStatus, now: i64) -> Result<()>;
}

pub trait BlockedUserRepository {
    fn block(&self, user_id: i64, blocked_user_id: i64, now: i64) -> Result<()>;
    fn unblock(&self, user_id: i64, blocked_user_id: i64) -> Result<usize>;
    fn list_blocked(&self, user_id: i64) -> Result<Vec<BlockedUserRecord>>;
    /// Ids blocked by the user plus ids that blocked the user. Storage is
    /// directional, visibility is not.
    fn list_blocked_ids_both_directions(&self, user_id: i64) -> Result<Vec<i64>>;
}

pub trait ProximityEventRepository {
    fn insert(&self, record: &ProximityEventRecord) -> Result<()>;
    /// Counterpart ids alerted to `user_id` since `since`, skipping rows
    /// already past their retention expiry.
    fn list_recent_counterpart_ids(&self, user_id: i64, since: i64, now: i64) -> Result<Vec<i64>>;
}

pub struct SqliteRepositories<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRepositories<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn users(&self) -> impl UserRepository + '_ {
        users::SqliteUserRepository { conn: self.conn }
    }

    pub fn locations(&self) -> impl LocationRepository + '_ {
        locations::SqliteLocationRepository { conn: self.conn }
    }

    pub fn friendships(&self) -> impl FriendshipRepository + '_ {
        friendships::SqliteFriendshipRepository { conn: self.conn }
    }

    pub fn friend_requests(&self) -> impl FriendRequestRepository + '_ {
        friend_requests::SqliteFriendRequestRepository { conn: self.conn }
    }

    pub fn blocked_users(&self) -> impl BlockedUserRepository + '_ {
        blocked_users::SqliteBlockedUserRepository { conn: self.conn }
    }

    pub fn proximity_events(&self) -> impl ProximityEventRepository + '_ {
        proximity_events::SqliteProximityEventRepository { conn: self.conn }
    }

    pub fn conn(&self) -> &'conn Connection {
        self.conn
    }
}
