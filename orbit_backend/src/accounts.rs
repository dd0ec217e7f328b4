//! Device registration, login, and settings. The device secret issued at
//! registration doubles as the bearer credential; it is returned once and
//! only ever looked up afterwards.

use crate::config::ProximityConfig;
use crate::database::models::{NewUser, SettingsUpdate, UserRecord, VisibilityMode};
use crate::database::repositories::UserRepository;
use crate::database::Database;
use crate::utils::now_ts;
use anyhow::{Context, Result};
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

/// Confusable glyphs (0/O, 1/I) are excluded so codes survive being read aloud.
const FRIEND_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const FRIEND_CODE_LEN: usize = 8;
const MAX_CODE_ATTEMPTS: usize = 10;

#[derive(Clone)]
pub struct AccountService {
    database: Database,
    config: ProximityConfig,
}

impl AccountService {
    pub fn new(database: Database, config: ProximityConfig) -> Self {
        Self { database, config }
    }

    /// Registers a new device: no input, fresh credentials, FRIENDS mode.
    pub fn register(&self) -> Result<RegisteredUser> {
        let device_secret = Uuid::new_v4().to_string();
        let now = now_ts();
        let default_radius = self.config.default_radius_meters;
        let record = self.database.with_repositories(|repos| {
            let users = repos.users();
            let mut friend_code = None;
            for _ in 0..MAX_CODE_ATTEMPTS {
                let code = random_friend_code();
                if !users.friend_code_exists(&code)? {
                    friend_code = Some(code);
                    break;
                }
            }
            let friend_code = friend_code.context("could not find an unused friend code")?;
            users.create(&NewUser {
                device_secret: device_secret.clone(),
                friend_code,
                mode: VisibilityMode::Friends,
                radius_meters: default_radius,
                created_at: now,
            })
        })?;
        Ok(RegisteredUser {
            user_id: record.id,
            device_secret: record.device_secret,
            friend_code: record.friend_code,
            mode: record.mode,
            radius_meters: record.radius_meters,
        })
    }

    /// Resolves a bearer device secret to its user, if any.
    pub fn authenticate(&self, device_secret: &str) -> Result<Option<UserRecord>> {
        self.database
            .with_repositories(|repos| repos.users().get_by_device_secret(device_secret))
    }

    /// Re-authentication for a device that already holds a secret.
    pub fn login(&self, device_secret: &str) -> Result<Option<LoginView>> {
        let user = self.authenticate(device_secret)?;
        Ok(user.map(|record| LoginView {
            user_id: record.id,
            device_secret: record.device_secret,
            friend_code: record.friend_code,
        }))
    }

    pub fn update_settings(&self, user_id: i64, update: SettingsUpdate) -> Result<SettingsView> {
        let now = now_ts();
        let record = self.database.with_repositories(|repos| {
            let users = repos.users();
            users.update_settings(user_id, &update, now)?;
            users
                .get(user_id)?
                .context("settings update lost the user row")
        })?;
        Ok(SettingsView::from_record(&record))
    }
}

fn random_friend_code() -> String {
    let mut rng = rand::rng();
    (0..FRIEND_CODE_LEN)
        .map(|_| FRIEND_CODE_ALPHABET[rng.random_range(0..FRIEND_CODE_ALPHABET.len())] as char)
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUser {
    pub user_id: i64,
    pub device_secret: String,
    pub friend_code: String,
    pub mode: VisibilityMode,
    pub radius_meters: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginView {
    pub user_id: i64,
    pub device_secret: String,
    pub friend_code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub id: i64,
    pub display_name: Option<String>,
    pub mode: VisibilityMode,
    pub radius_meters: i64,
    pub friend_code: String,
    pub show_friends_on_map: bool,
}

impl SettingsView {
    pub fn from_record(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            display_name: record.display_name.clone(),
            mode: record.mode,
            radius_meters: record.radius_meters,
            friend_code: record.friend_code.clone(),
            show_friends_on_map: record.show_friends_on_map,
        }
    }
}
