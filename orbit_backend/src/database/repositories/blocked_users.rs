use crate::database::models::BlockedUserRecord;
use anyhow::Result;
use rusqlite::{params, Connection};

pub(super) struct SqliteBlockedUserRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::BlockedUserRepository for SqliteBlockedUserRepository<'conn> {
    fn block(&self, user_id: i64, blocked_user_id: i64, now: i64) -> Result<()> {
        // Idempotent; re-blocking keeps the original timestamp.
        self.conn.execute(
            r#"
            INSERT OR IGNORE INTO blocked_users (user_id, blocked_user_id, created_at)
            VALUES (?1, ?2, ?3)
            "#,
            params![user_id, blocked_user_id, now],
        )?;
        Ok(())
    }

    fn unblock(&self, user_id: i64, blocked_user_id: i64) -> Result<usize> {
        let removed = self.conn.execute(
            r#"
            DELETE FROM blocked_users
            WHERE user_id = ?1 AND blocked_user_id = ?2
            "#,
            params![user_id, blocked_user_id],
        )?;
        Ok(removed)
    }

    fn list_blocked(&self, user_id: i64) -> Result<Vec<BlockedUserRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT b.blocked_user_id, u.display_name, u.friend_code, b.created_at
            FROM blocked_users b
            JOIN users u ON u.id = b.blocked_user_id
            WHERE b.user_id = ?1
            ORDER BY b.created_at DESC
            "#,
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(BlockedUserRecord {
                blocked_user_id: row.get(0)?,
                display_name: row.get(1)?,
                friend_code: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;

        let mut blocked = Vec::new();
        for row in rows {
            blocked.push(row?);
        }
        Ok(blocked)
    }

    fn list_blocked_ids_both_directions(&self, user_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT blocked_user_id FROM blocked_users WHERE user_id = ?1
            UNION
            SELECT user_id FROM blocked_users WHERE blocked_user_id = ?1
            "#,
        )?;
        let rows = stmt.query_map(params![user_id], |row| row.get(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }
}
