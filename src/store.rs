//! Database store for listings, invitations and delegations
//!
//! Every status change is a conditional write keyed on the expected prior
//! status. Callers learn whether their write won from the returned flag.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::delegation::{
    CapabilitySet, Delegation, DelegationStatus, Invitation, InvitationStatus,
};
use crate::error::{is_unique_violation, AppError, Result};

const INVITATION_COLUMNS: &str = "id, listing_id, inviter_id, email, role, title, permissions, \
     message, token, status, sent_at, expires_at, responded_at, decline_reason, accepted_by, \
     delegation_id";

const DELEGATION_COLUMNS: &str = "id, listing_id, co_host_user_id, invitation_id, role, title, \
     permissions, status, accepted_at, last_active_at, suspended_at, removed_at";

/// Database store
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Apply the embedded migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Migration failed: {}", e)))
    }

    // Listing operations

    /// Insert a listing owned by `owner_id`. Returns false when the listing
    /// already exists; its owner is never overwritten.
    pub async fn register_listing(&self, listing_id: &str, owner_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO listings (id, owner_id) VALUES (?, ?) ON CONFLICT(id) DO NOTHING",
        )
        .bind(listing_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn listing_owner(&self, listing_id: &str) -> Result<String> {
        let row: Option<(String,)> = sqlx::query_as("SELECT owner_id FROM listings WHERE id = ?")
            .bind(listing_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(owner_id,)| owner_id)
            .ok_or_else(|| AppError::NotFound(format!("Listing {} not found", listing_id)))
    }

    // Invitation operations

    pub async fn insert_invitation(&self, invitation: &Invitation) -> Result<()> {
        let permissions = encode_permissions(&invitation.permissions)?;

        let result = sqlx::query(
            r#"
            INSERT INTO invitations (id, listing_id, inviter_id, email, role, title, permissions,
                                     message, token, status, sent_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(invitation.id.to_string())
        .bind(&invitation.listing_id)
        .bind(&invitation.inviter_id)
        .bind(&invitation.email)
        .bind(invitation.role.as_str())
        .bind(&invitation.title)
        .bind(permissions)
        .bind(&invitation.message)
        .bind(&invitation.token)
        .bind(invitation.status.as_str())
        .bind(invitation.sent_at)
        .bind(invitation.expires_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) && mentions(&e, "invitations.token") => Err(
                AppError::Internal("invitation token collision".to_string()),
            ),
            Err(e) if is_unique_violation(&e) => Err(AppError::DuplicateActiveInvitation {
                listing_id: invitation.listing_id.clone(),
                email: invitation.email.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_invitation(&self, id: Uuid) -> Result<Invitation> {
        let sql = format!("SELECT {} FROM invitations WHERE id = ?", INVITATION_COLUMNS);
        let row = sqlx::query_as::<_, InvitationRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Invitation {} not found", id)))?;

        row.try_into()
    }

    pub async fn find_invitation_by_token(&self, token: &str) -> Result<Option<Invitation>> {
        let sql = format!("SELECT {} FROM invitations WHERE token = ?", INVITATION_COLUMNS);
        let row = sqlx::query_as::<_, InvitationRow>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Invitation::try_from).transpose()
    }

    pub async fn list_invitations(
        &self,
        listing_id: &str,
        status: Option<InvitationStatus>,
    ) -> Result<Vec<Invitation>> {
        let rows = match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {} FROM invitations WHERE listing_id = ? AND status = ? \
                     ORDER BY sent_at DESC",
                    INVITATION_COLUMNS
                );
                sqlx::query_as::<_, InvitationRow>(&sql)
                    .bind(listing_id)
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM invitations WHERE listing_id = ? ORDER BY sent_at DESC",
                    INVITATION_COLUMNS
                );
                sqlx::query_as::<_, InvitationRow>(&sql)
                    .bind(listing_id)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Pending invitations for one invitee on one listing (at most one by index)
    pub async fn pending_invitations_for(
        &self,
        listing_id: &str,
        email: &str,
    ) -> Result<Vec<Invitation>> {
        let sql = format!(
            "SELECT {} FROM invitations WHERE listing_id = ? AND email = ? AND status = 'pending'",
            INVITATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, InvitationRow>(&sql)
            .bind(listing_id)
            .bind(email)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Move a pending invitation to a terminal status other than `accepted`.
    ///
    /// Returns false when the invitation had already left `pending`.
    pub async fn resolve_invitation(
        &self,
        id: Uuid,
        to: InvitationStatus,
        now: DateTime<Utc>,
        decline_reason: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE invitations SET status = ?, responded_at = ?, decline_reason = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(to.as_str())
        .bind(now)
        .bind(decline_reason)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Accept a pending invitation and materialize its delegation in one transaction.
    ///
    /// Returns false, writing nothing, when the invitation had already left `pending`.
    pub async fn accept_invitation(
        &self,
        invitation_id: Uuid,
        delegation: &Delegation,
    ) -> Result<bool> {
        let permissions = encode_permissions(&delegation.permissions)?;
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            r#"
            UPDATE invitations SET status = 'accepted', responded_at = ?, accepted_by = ?, delegation_id = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(delegation.accepted_at)
        .bind(&delegation.co_host_user_id)
        .bind(delegation.id.to_string())
        .bind(invitation_id.to_string())
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO delegations (id, listing_id, co_host_user_id, invitation_id, role, title,
                                     permissions, status, accepted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(delegation.id.to_string())
        .bind(&delegation.listing_id)
        .bind(&delegation.co_host_user_id)
        .bind(invitation_id.to_string())
        .bind(delegation.role.as_str())
        .bind(&delegation.title)
        .bind(permissions)
        .bind(delegation.status.as_str())
        .bind(delegation.accepted_at)
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            tx.rollback().await?;
            return Err(if is_unique_violation(&e) {
                AppError::DelegationExists {
                    listing_id: delegation.listing_id.clone(),
                    user_id: delegation.co_host_user_id.clone(),
                }
            } else {
                e.into()
            });
        }

        tx.commit().await?;
        Ok(true)
    }

    // Delegation operations

    pub async fn get_delegation(&self, id: Uuid) -> Result<Delegation> {
        let sql = format!("SELECT {} FROM delegations WHERE id = ?", DELEGATION_COLUMNS);
        let row = sqlx::query_as::<_, DelegationRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Delegation {} not found", id)))?;

        row.try_into()
    }

    /// The user's active delegation on a listing, if any
    pub async fn active_delegation(
        &self,
        listing_id: &str,
        user_id: &str,
    ) -> Result<Option<Delegation>> {
        let sql = format!(
            "SELECT {} FROM delegations \
             WHERE listing_id = ? AND co_host_user_id = ? AND status = 'active'",
            DELEGATION_COLUMNS
        );
        let row = sqlx::query_as::<_, DelegationRow>(&sql)
            .bind(listing_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Delegation::try_from).transpose()
    }

    pub async fn list_delegations(&self, listing_id: &str) -> Result<Vec<Delegation>> {
        let sql = format!(
            "SELECT {} FROM delegations WHERE listing_id = ? ORDER BY accepted_at DESC",
            DELEGATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, DelegationRow>(&sql)
            .bind(listing_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Conditionally move a delegation from `from` to `to`.
    ///
    /// Returns false when the stored status no longer matches `from`.
    pub async fn transition_delegation(
        &self,
        id: Uuid,
        from: DelegationStatus,
        to: DelegationStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let query = match to {
            DelegationStatus::Suspended => sqlx::query(
                "UPDATE delegations SET status = ?, suspended_at = ? WHERE id = ? AND status = ?",
            )
            .bind(to.as_str())
            .bind(now),
            DelegationStatus::Active => sqlx::query(
                "UPDATE delegations SET status = ?, suspended_at = NULL WHERE id = ? AND status = ?",
            )
            .bind(to.as_str()),
            DelegationStatus::Removed => sqlx::query(
                "UPDATE delegations SET status = ?, removed_at = ? WHERE id = ? AND status = ?",
            )
            .bind(to.as_str())
            .bind(now),
        };

        let result = query
            .bind(id.to_string())
            .bind(from.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Replace the permissions of a live (active or suspended) delegation
    pub async fn update_delegation_permissions(
        &self,
        id: Uuid,
        permissions: &CapabilitySet,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE delegations SET permissions = ?
            WHERE id = ? AND status IN ('active', 'suspended')
            "#,
        )
        .bind(encode_permissions(permissions)?)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn touch_delegation(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE delegations SET last_active_at = ? WHERE id = ? AND status = 'active'",
        )
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

fn mentions(err: &sqlx::Error, needle: &str) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.message().contains(needle))
}

fn encode_permissions(permissions: &CapabilitySet) -> Result<String> {
    serde_json::to_string(permissions)
        .map_err(|e| AppError::Internal(format!("Failed to encode permissions: {}", e)))
}

fn decode_permissions(raw: &str) -> Result<CapabilitySet> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::Internal(format!("Invalid stored permissions: {}", e)))
}

fn parse_uuid(raw: &str, field: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| AppError::Internal(format!("Invalid {} UUID: {}", field, e)))
}

// Internal row types for sqlx

#[derive(sqlx::FromRow)]
struct InvitationRow {
    id: String,
    listing_id: String,
    inviter_id: String,
    email: String,
    role: String,
    title: Option<String>,
    permissions: String,
    message: Option<String>,
    token: String,
    status: String,
    sent_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    responded_at: Option<DateTime<Utc>>,
    decline_reason: Option<String>,
    accepted_by: Option<String>,
    delegation_id: Option<String>,
}

impl TryFrom<InvitationRow> for Invitation {
    type Error = AppError;

    fn try_from(row: InvitationRow) -> Result<Self> {
        let delegation_id = row
            .delegation_id
            .as_deref()
            .map(|s| parse_uuid(s, "delegation_id"))
            .transpose()?;

        Ok(Invitation {
            id: parse_uuid(&row.id, "invitation")?,
            listing_id: row.listing_id,
            inviter_id: row.inviter_id,
            email: row.email,
            role: row
                .role
                .parse()
                .map_err(|e| AppError::Internal(format!("Invalid role: {}", e)))?,
            title: row.title,
            permissions: decode_permissions(&row.permissions)?,
            message: row.message,
            token: row.token,
            status: row
                .status
                .parse()
                .map_err(|e| AppError::Internal(format!("Invalid status: {}", e)))?,
            sent_at: row.sent_at,
            expires_at: row.expires_at,
            responded_at: row.responded_at,
            decline_reason: row.decline_reason,
            accepted_by: row.accepted_by,
            delegation_id,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DelegationRow {
    id: String,
    listing_id: String,
    co_host_user_id: String,
    invitation_id: String,
    role: String,
    title: Option<String>,
    permissions: String,
    status: String,
    accepted_at: DateTime<Utc>,
    last_active_at: Option<DateTime<Utc>>,
    suspended_at: Option<DateTime<Utc>>,
    removed_at: Option<DateTime<Utc>>,
}

impl TryFrom<DelegationRow> for Delegation {
    type Error = AppError;

    fn try_from(row: DelegationRow) -> Result<Self> {
        Ok(Delegation {
            id: parse_uuid(&row.id, "delegation")?,
            listing_id: row.listing_id,
            co_host_user_id: row.co_host_user_id,
            invitation_id: parse_uuid(&row.invitation_id, "invitation_id")?,
            role: row
                .role
                .parse()
                .map_err(|e| AppError::Internal(format!("Invalid role: {}", e)))?,
            title: row.title,
            permissions: decode_permissions(&row.permissions)?,
            status: row
                .status
                .parse()
                .map_err(|e| AppError::Internal(format!("Invalid status: {}", e)))?,
            accepted_at: row.accepted_at,
            last_active_at: row.last_active_at,
            suspended_at: row.suspended_at,
            removed_at: row.removed_at,
        })
    }
}
