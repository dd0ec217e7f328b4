//! The friend workflow: requests by friend code, the two-way approval
//! lifecycle, unfriending, and the block list.

use crate::accounts::FRIEND_CODE_LEN;
use crate::database::models::{RequestStatus, UserRecord};
use crate::database::repositories::{
    BlockedUserRepository, FriendRequestRepository, FriendshipRepository, UserRepository,
};
use crate::database::Database;
use crate::utils::now_ts;
use anyhow::Result;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FriendError {
    #[error("friend code must be 8 characters")]
    MalformedCode,
    #[error("friend code not found")]
    CodeNotFound,
    #[error("cannot add yourself as a friend")]
    SelfFriend,
    #[error("already friends with this user")]
    AlreadyFriends,
    #[error("a friend request between you is already pending")]
    DuplicateRequest,
    #[error("friend request not found")]
    RequestNotFound,
    #[error("friend request is no longer pending")]
    RequestNotPending,
    #[error("no friendship with this user")]
    NotFriends,
    #[error("user not found")]
    UserNotFound,
    #[error("cannot block yourself")]
    SelfBlock,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct FriendService {
    database: Database,
}

impl FriendService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Sends a friend request addressed via the target's friend code. A
    /// pending request in either direction counts as the same negotiation
    /// and blocks a duplicate.
    pub fn send_request(
        &self,
        from: &UserRecord,
        friend_code: &str,
    ) -> Result<SentRequestView, FriendError> {
        let normalized = friend_code.trim().to_uppercase();
        if normalized.len() != FRIEND_CODE_LEN {
            return Err(FriendError::MalformedCode);
        }

        let target = self
            .database
            .with_repositories(|repos| repos.users().get_by_friend_code(&normalized))?
            .ok_or(FriendError::CodeNotFound)?;
        if target.id == from.id {
            return Err(FriendError::SelfFriend);
        }
        let already_friends = self
            .database
            .with_repositories(|repos| repos.friendships().exists(from.id, target.id))?;
        if already_friends {
            return Err(FriendError::AlreadyFriends);
        }
        let pending = self
            .database
            .with_repositories(|repos| repos.friend_requests().pending_between(from.id, target.id))?;
        if pending {
            return Err(FriendError::DuplicateRequest);
        }

        let record = self.database.with_repositories(|repos| {
            repos.friend_requests().create(from.id, target.id, now_ts())
        })?;
        Ok(SentRequestView {
            request_id: record.id,
            to_display_name: target.display_name,
            status: record.status,
            created_at: record.created_at,
        })
    }

    pub fn incoming_requests(&self, user_id: i64) -> Result<Vec<IncomingRequestView>> {
        let records = self
            .database
            .with_repositories(|repos| repos.friend_requests().list_incoming_pending(user_id))?;
        Ok(records
            .into_iter()
            .map(|record| IncomingRequestView {
                request_id: record.id,
                from_user_id: record.from_user_id,
                from_display_name: record.from_display_name,
                from_friend_code: record.from_friend_code,
                created_at: record.created_at,
            })
            .collect())
    }

    /// Accepting marks the request terminal and writes the symmetric
    /// friendship pair in one repository scope.
    pub fn accept(&self, user: &UserRecord, request_id: i64) -> Result<FriendView, FriendError> {
        let request = self.pending_request_for(user.id, request_id)?;
        self.database.with_repositories(|repos| {
            let now = now_ts();
            repos
                .friend_requests()
                .set_status(request_id, RequestStatus::Accepted, now)?;
            repos
                .friendships()
                .create_pair(request.to_user_id, request.from_user_id, now)?;
            Ok(())
        })?;
        let sender = self
            .database
            .with_repositories(|repos| repos.users().get(request.from_user_id))?
            .ok_or(FriendError::UserNotFound)?;
        Ok(FriendView {
            id: sender.id,
            display_name: sender.display_name,
            friend_code: sender.friend_code,
            mode: sender.mode,
            radius_meters: sender.radius_meters,
        })
    }

    pub fn reject(&self, user: &UserRecord, request_id: i64) -> Result<(), FriendError> {
        self.pending_request_for(user.id, request_id)?;
        self.database.with_repositories(|repos| {
            repos
                .friend_requests()
                .set_status(request_id, RequestStatus::Rejected, now_ts())
        })?;
        Ok(())
    }

    /// Removes both directed edges; partial friendships must never survive.
    pub fn unfriend(&self, user_id: i64, friend_id: i64) -> Result<(), FriendError> {
        let removed = self
            .database
            .with_repositories(|repos| repos.friendships().delete_pair(user_id, friend_id))?;
        if removed == 0 {
            return Err(FriendError::NotFriends);
        }
        Ok(())
    }

    pub fn list_friends(&self, user_id: i64) -> Result<Vec<FriendView>> {
        let records = self
            .database
            .with_repositories(|repos| repos.friendships().list_friends(user_id))?;
        Ok(records
            .into_iter()
            .map(|record| FriendView {
                id: record.id,
                display_name: record.display_name,
                friend_code: record.friend_code,
                mode: record.mode,
                radius_meters: record.radius_meters,
            })
            .collect())
    }

    /// Blocking leaves any friendship rows in place; the visibility layer
    /// hides the pair from each other either way.
    pub fn block(&self, user_id: i64, target_id: i64) -> Result<(), FriendError> {
        if target_id == user_id {
            return Err(FriendError::SelfBlock);
        }
        let target = self
            .database
            .with_repositories(|repos| repos.users().get(target_id))?;
        if target.is_none() {
            return Err(FriendError::UserNotFound);
        }
        self.database
            .with_repositories(|repos| repos.blocked_users().block(user_id, target_id, now_ts()))?;
        Ok(())
    }

    pub fn unblock(&self, user_id: i64, target_id: i64) -> Result<(), FriendError> {
        self.database
            .with_repositories(|repos| repos.blocked_users().unblock(user_id, target_id))?;
        Ok(())
    }

    pub fn list_blocked(&self, user_id: i64) -> Result<Vec<BlockedView>> {
        let records = self
            .database
            .with_repositories(|repos| repos.blocked_users().list_blocked(user_id))?;
        Ok(records
            .into_iter()
            .map(|record| BlockedView {
                user_id: record.blocked_user_id,
                display_name: record.display_name,
                friend_code: record.friend_code,
                blocked_at: record.created_at,
            })
            .collect())
    }

    fn pending_request_for(
        &self,
        user_id: i64,
        request_id: i64,
    ) -> Result<crate::database::models::FriendRequestRecord, FriendError> {
        let request = self
            .database
            .with_repositories(|repos| repos.friend_requests().get(request_id))?
            .ok_or(FriendError::RequestNotFound)?;
        // Requests addressed to someone else look like they don't exist.
        if request.to_user_id != user_id {
            return Err(FriendError::RequestNotFound);
        }
        if request.status != RequestStatus::Pending {
            return Err(FriendError::RequestNotPending);
        }
        Ok(request)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentRequestView {
    pub request_id: i64,
    pub to_display_name: Option<String>,
    pub status: RequestStatus,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingRequestView {
    pub request_id: i64,
    pub from_user_id: i64,
    pub from_display_name: Option<String>,
    pub from_friend_code: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendView {
    pub id: i64,
    pub display_name: Option<String>,
    pub friend_code: String,
    pub mode: crate::database::models::VisibilityMode,
    pub radius_meters: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedView {
    pub user_id: i64,
    pub display_name: Option<String>,
    pub friend_code: String,
    pub blocked_at: i64,
}
