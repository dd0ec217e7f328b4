use crate::database::models::FriendRecord;
use anyhow::Result;
use rusqlite::{params, Connection};

pub(super) struct SqliteFriendshipRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::FriendshipRepository for SqliteFriendshipRepository<'conn> {
    fn create_pair(&self, user_id: i64, friend_id: i64, now: i64) -> Result<()> {
        // Both directed edges in a single statement keeps the pair atomic.
        self.conn.execute(
            r#"
            INSERT INTO friendships (user_id, friend_id, created_at)
            VALUES (?1, ?2, ?3), (?2, ?1, ?3)
            "#,
            params![user_id, friend_id, now],
        )?;
        Ok(())
    }

    fn delete_pair(&self, user_id: i64, friend_id: i64) -> Result<usize> {
        let removed = self.conn.execute(
            r#"
            DELETE FROM friendships
            WHERE (user_id = ?1 AND friend_id = ?2) OR (user_id = ?2 AND friend_id = ?1)
            "#,
            params![user_id, friend_id],
        )?;
        Ok(removed)
    }

    fn exists(&self, user_id: i64, friend_id: i64) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*)
            FROM friendships
            WHERE user_id = ?1 AND friend_id = ?2
            "#,
            params![user_id, friend_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn list_friend_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT friend_id
            FROM friendships
            WHERE user_id = ?1
            "#,
        )?;
        let rows = stmt.query_map(params![user_id], |row| row.get(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    fn list_friends(&self, user_id: i64) -> Result<Vec<FriendRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT u.id, u.display_name, u.friend_code, u.mode, u.radius_meters
            FROM friendships f
            JOIN users u ON u.id = f.friend_id
            WHERE f.user_id = ?1
            ORDER BY f.created_at DESC
            "#,
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(FriendRecord {
                id: row.get(0)?,
                display_name: row.get(1)?,
                friend_code: row.get(2)?,
                mode: row.get(3)?,
                radius_meters: row.get(4)?,
            })
        })?;

        let mut friends = Vec::new();
        for row in rows {
            friends.push(row?);
        }
        Ok(friends)
    }
}
