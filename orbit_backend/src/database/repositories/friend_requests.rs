use crate::database::models::{FriendRequestRecord, IncomingRequestRecord, RequestStatus};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteFriendRequestRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<FriendRequestRecord> {
    Ok(FriendRequestRecord {
        id: row.get(0)?,
        from_user_id: row.get(1)?,
        to_user_id: row.get(2)?,
        status: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

impl<'conn> super::FriendRequestRepository for SqliteFriendRequestRepository<'conn> {
    fn create(&self, from_user_id: i64, to_user_id: i64, now: i64) -> Result<FriendRequestRecord> {
        self.conn.execute(
            r#"
            INSERT INTO friend_requests (from_user_id, to_user_id, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            "#,
            params![from_user_id, to_user_id, RequestStatus::Pending, now],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get(id)?
            .context("friend request insert lost the newly created row")
    }

    fn get(&self, id: i64) -> Result<Option<FriendRequestRecord>> {
        let record = self
            .conn
            .query_row(
                r#"
                SELECT id, from_user_id, to_user_id, status, created_at, updated_at
                FROM friend_requests
                WHERE id = ?1
                "#,
                params![id],
                request_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn pending_between(&self, a: i64, b: i64) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*)
            FROM friend_requests
            WHERE status = ?3
              AND ((from_user_id = ?1 AND to_user_id = ?2)
                OR (from_user_id = ?2 AND to_user_id = ?1))
            "#,
            params![a, b, RequestStatus::Pending],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn list_incoming_pending(&self, user_id: i64) -> Result<Vec<IncomingRequestRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT r.id, r.from_user_id, u.display_name, u.friend_code, r.created_at
            FROM friend_requests r
            JOIN users u ON u.id = r.from_user_id
            WHERE r.to_user_id = ?1 AND r.status = ?2
            ORDER BY r.created_at DESC
            "#,
        )?;
        let rows = stmt.query_map(params![user_id, RequestStatus::Pending], |row| {
            Ok(IncomingRequestRecord {
                id: row.get(0)?,
                from_user_id: row.get(1)?,
                from_display_name: row.get(2)?,
                from_friend_code: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;

        let mut requests = Vec::new();
        for row in rows {
            requests.push(row?);
        }
        Ok(requests)
    }

    fn set_status(&self, id: i64, status: RequestStatus, now: i64) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE friend_requests
            SET status = ?1, updated_at = ?2
            WHERE id = ?3
            "#,
            params![status, now, id],
        )?;
        Ok(())
    }
}
