use crate::database::models::ProximityEventRecord;
use anyhow::Result;
use rusqlite::{params, Connection};

pub(super) struct SqliteProximityEventRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::ProximityEventRepository for SqliteProximityEventRepository<'conn> {
    fn insert(&self, record: &ProximityEventRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO proximity_events (user_id, friend_id, distance, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                record.user_id,
                record.friend_id,
                record.distance,
                record.created_at,
                record.expires_at,
            ],
        )?;
        Ok(())
    }

    fn list_recent_counterpart_ids(&self, user_id: i64, since: i64, now: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT DISTINCT friend_id
            FROM proximity_events
            WHERE user_id = ?1 AND created_at >= ?2 AND expires_at > ?3
            "#,
        )?;
        let rows = stmt.query_map(params![user_id, since, now], |row| row.get(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }
}
