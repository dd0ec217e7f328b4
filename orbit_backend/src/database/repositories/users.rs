use crate::database::models::{NewUser, SettingsUpdate, UserRecord};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteUserRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const USER_COLUMNS: &str = "id, device_secret, friend_code, display_name, mode, radius_meters, \
                            show_friends_on_map, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        device_secret: row.get(1)?,
        friend_code: row.get(2)?,
        display_name: row.get(3)?,
        mode: row.get(4)?,
        radius_meters: row.get(5)?,
        show_friends_on_map: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

impl<'conn> super::UserRepository for SqliteUserRepository<'conn> {
    fn create(&self, new_user: &NewUser) -> Result<UserRecord> {
        self.conn.execute(
            r#"
            INSERT INTO users (device_secret, friend_code, display_name, mode, radius_meters, created_at, updated_at)
            VALUES (?1, ?2, NULL, ?3, ?4, ?5, ?5)
            "#,
            params![
                new_user.device_secret,
                new_user.friend_code,
                new_user.mode,
                new_user.radius_meters,
                new_user.created_at,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get(id)?
            .context("user insert lost the newly created row")
    }

    fn get(&self, id: i64) -> Result<Option<UserRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn get_by_device_secret(&self, device_secret: &str) -> Result<Option<UserRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE device_secret = ?1"),
                params![device_secret],
                user_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn get_by_friend_code(&self, friend_code: &str) -> Result<Option<UserRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE friend_code = ?1"),
                params![friend_code],
                user_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn friend_code_exists(&self, friend_code: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM users WHERE friend_code = ?1",
            params![friend_code],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn update_settings(&self, id: i64, update: &SettingsUpdate, now: i64) -> Result<()> {
        if let Some(display_name) = &update.display_name {
            self.conn.execute(
                "UPDATE users SET display_name = ?1 WHERE id = ?2",
                params![display_name, id],
            )?;
        }
        if let Some(mode) = update.mode {
            self.conn.execute(
                "UPDATE users SET mode = ?1 WHERE id = ?2",
                params![mode, id],
            )?;
        }
        if let Some(radius_meters) = update.radius_meters {
            self.conn.execute(
                "UPDATE users SET radius_meters = ?1 WHERE id = ?2",
                params![radius_meters, id],
            )?;
        }
        if let Some(show_friends_on_map) = update.show_friends_on_map {
            self.conn.execute(
                "UPDATE users SET show_friends_on_map = ?1 WHERE id = ?2",
                params![show_friends_on_map, id],
            )?;
        }
        self.conn.execute(
            "UPDATE users SET updated_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        Ok(())
    }
}
