use crate::database::models::{LocatedUserRecord, LocationRecord, VisibilityMode};
use anyhow::Result;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

pub(super) struct SqliteLocationRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn located_user_from_row(row: &Row<'_>) -> rusqlite::Result<LocatedUserRecord> {
    Ok(LocatedUserRecord {
        user_id: row.get(0)?,
        display_name: row.get(1)?,
        friend_code: row.get(2)?,
        mode: row.get(3)?,
        latitude: row.get(4)?,
        longitude: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl<'conn> super::LocationRepository for SqliteLocationRepository<'conn> {
    fn upsert(&self, record: &LocationRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO locations (user_id, latitude, longitude, accuracy, is_simulated, updated_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(user_id) DO UPDATE SET
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                accuracy = excluded.accuracy,
                is_simulated = excluded.is_simulated,
                updated_at = excluded.updated_at,
                expires_at = excluded.expires_at
            "#,
            params![
                record.user_id,
                record.latitude,
                record.longitude,
                record.accuracy,
                record.is_simulated,
                record.updated_at,
                record.expires_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, user_id: i64) -> Result<Option<LocationRecord>> {
        let record = self
            .conn
            .query_row(
                r#"
                SELECT user_id, latitude, longitude, accuracy, is_simulated, updated_at, expires_at
                FROM locations
                WHERE user_id = ?1
                "#,
                params![user_id],
                |row| {
                    Ok(LocationRecord {
                        user_id: row.get(0)?,
                        latitude: row.get(1)?,
                        longitude: row.get(2)?,
                        accuracy: row.get(3)?,
                        is_simulated: row.get(4)?,
                        updated_at: row.get(5)?,
                        expires_at: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn list_located_in(
        &self,
        user_ids: &[i64],
        excluding: i64,
        now: i64,
    ) -> Result<Vec<LocatedUserRecord>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; user_ids.len()].join(", ");
        let sql = format!(
            r#"
            SELECT u.id, u.display_name, u.friend_code, u.mode, l.latitude, l.longitude, l.updated_at
            FROM users u
            JOIN locations l ON l.user_id = u.id
            WHERE u.id IN ({placeholders}) AND u.id != ? AND l.expires_at > ?
            "#
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params_from_iter(user_ids.iter().copied().chain([excluding, now])),
            located_user_from_row,
        )?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn list_located_in_mode(
        &self,
        mode: VisibilityMode,
        excluding: i64,
        now: i64,
    ) -> Result<Vec<LocatedUserRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT u.id, u.display_name, u.friend_code, u.mode, l.latitude, l.longitude, l.updated_at
            FROM users u
            JOIN locations l ON l.user_id = u.id
            WHERE u.mode = ?1 AND u.id != ?2 AND l.expires_at > ?3
            "#,
        )?;
        let rows = stmt.query_map(params![mode, excluding, now], located_user_from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}
