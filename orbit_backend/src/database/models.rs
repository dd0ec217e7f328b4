use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Who may discover a user: nobody, mutual friends, or any opted-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisibilityMode {
    Off,
    Friends,
    Everyone,
}

impl VisibilityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisibilityMode::Off => "OFF",
            VisibilityMode::Friends => "FRIENDS",
            VisibilityMode::Everyone => "EVERYONE",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown visibility mode {0:?}, expected OFF, FRIENDS or EVERYONE")]
pub struct ParseVisibilityModeError(pub String);

impl FromStr for VisibilityMode {
    type Err = ParseVisibilityModeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "OFF" => Ok(VisibilityMode::Off),
            "FRIENDS" => Ok(VisibilityMode::Friends),
            "EVERYONE" => Ok(VisibilityMode::Everyone),
            other => Err(ParseVisibilityModeError(other.to_string())),
        }
    }
}

impl fmt::Display for VisibilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromSql for VisibilityMode {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}

impl ToSql for VisibilityMode {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

/// Lifecycle state of a friend request. Terminal states are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Accepted => "ACCEPTED",
            RequestStatus::Rejected => "REJECTED",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown request status {0:?}")]
pub struct ParseRequestStatusError(pub String);

impl FromStr for RequestStatus {
    type Err = ParseRequestStatusError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "PENDING" => Ok(RequestStatus::Pending),
            "ACCEPTED" => Ok(RequestStatus::Accepted),
            "REJECTED" => Ok(RequestStatus::Rejected),
            other => Err(ParseRequestStatusError(other.to_string())),
        }
    }
}

impl FromSql for RequestStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}

impl ToSql for RequestStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: i64,
    pub device_secret: String,
    pub friend_code: String,
    pub display_name: Option<String>,
    pub mode: VisibilityMode,
    pub radius_meters: i64,
    pub show_friends_on_map: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub device_secret: String,
    pub friend_code: String,
    pub mode: VisibilityMode,
    pub radius_meters: i64,
    pub created_at: i64,
}

/// At most one live row per user; every update replaces it and resets the
/// expiry. A row past `expires_at` is treated as absent by all queries.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRecord {
    pub user_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub is_simulated: bool,
    pub updated_at: i64,
    pub expires_at: i64,
}

/// Joined user + unexpired-location row fed to the visibility resolver.
#[derive(Debug, Clone)]
pub struct LocatedUserRecord {
    pub user_id: i64,
    pub display_name: Option<String>,
    pub friend_code: String,
    pub mode: VisibilityMode,
    pub latitude: f64,
    pub longitude: f64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct FriendRequestRecord {
    pub id: i64,
    pub from_user_id: i64,
    pub to_user_id: i64,
    pub status: RequestStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct IncomingRequestRecord {
    pub id: i64,
    pub from_user_id: i64,
    pub from_display_name: Option<String>,
    pub from_friend_code: String,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct FriendRecord {
    pub id: i64,
    pub display_name: Option<String>,
    pub friend_code: String,
    pub mode: VisibilityMode,
    pub radius_meters: i64,
}

#[derive(Debug, Clone)]
pub struct BlockedUserRecord {
    pub blocked_user_id: i64,
    pub display_name: Option<String>,
    pub friend_code: String,
    pub created_at: i64,
}

/// Append-only dedup memory: "requester was alerted to counterpart at this
/// distance at this time". Never read back as user-facing history.
#[derive(Debug, Clone)]
pub struct ProximityEventRecord {
    pub user_id: i64,
    pub friend_id: i64,
    pub distance: f64,
    pub created_at: i64,
    pub expires_at: i64,
}

/// Partial settings patch; `display_name: Some(None)` clears the name.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub display_name: Option<Option<String>>,
    pub mode: Option<VisibilityMode>,
    pub radius_meters: Option<i64>,
    pub show_friends_on_map: Option<bool>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.mode.is_none()
            && self.radius_meters.is_none()
            && self.show_friends_on_map.is_none()
    }
}
