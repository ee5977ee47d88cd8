//! HTTP API handlers

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::delegation::{
    Capability, Delegation, Invitation, InvitationPreview, InvitationStatus,
};
use crate::error::{AppError, Result};
use crate::models::{
    AuthorizeQuery, AuthorizeResponse, Catalog, CreateInvitationRequest, CreatedInvitation,
    DeclineRequest, DelegationChange, ListInvitationsQuery, ListingOwnership,
    UpdatePermissionsRequest,
};
use crate::AppState;

/// Header carrying the authenticated user id, set by the upstream session layer
pub const ACTOR_HEADER: &str = "x-actor-id";

/// The authenticated caller
#[derive(Debug, Clone)]
pub struct Actor(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| Actor(id.to_string()))
            .ok_or(AppError::MissingActor)
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/catalog", get(catalog))
        .route("/listings/:listing_id", put(register_listing))
        .route(
            "/listings/:listing_id/invitations",
            post(create_invitation).get(list_invitations),
        )
        .route("/invitations/:id/cancel", post(cancel_invitation))
        .route("/invitations/:id/resend", post(resend_invitation))
        .route("/co-host/accept/:token", get(preview).post(accept))
        .route("/co-host/decline/:token", post(decline))
        .route("/listings/:listing_id/delegations", get(list_delegations))
        .route("/delegations/:id/suspend", post(suspend))
        .route("/delegations/:id/reinstate", post(reinstate))
        .route("/delegations/:id/remove", post(remove))
        .route("/delegations/:id/permissions", put(update_permissions))
        .route("/listings/:listing_id/authorize", get(authorize))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn catalog() -> Json<Catalog> {
    Json(Catalog::current())
}

async fn register_listing(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    Path(listing_id): Path<String>,
) -> Result<(StatusCode, Json<ListingOwnership>)> {
    let created = state
        .manager
        .registry
        .register_listing(&listing_id, &actor)
        .await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(ListingOwnership {
            listing_id,
            owner_id: actor,
            created,
        }),
    ))
}

async fn create_invitation(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    Path(listing_id): Path<String>,
    Json(request): Json<CreateInvitationRequest>,
) -> Result<(StatusCode, Json<CreatedInvitation>)> {
    let ledger = &state.manager.ledger;
    let invitation = ledger.create(&listing_id, &actor, request).await?;
    let accept_url = ledger.accept_url(&invitation);

    Ok((
        StatusCode::CREATED,
        Json(CreatedInvitation {
            invitation,
            accept_url,
        }),
    ))
}

async fn list_invitations(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    Path(listing_id): Path<String>,
    Query(query): Query<ListInvitationsQuery>,
) -> Result<Json<Vec<Invitation>>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<InvitationStatus>)
        .transpose()
        .map_err(AppError::BadRequest)?;

    let invitations = state
        .manager
        .ledger
        .list_for_listing(&listing_id, &actor, status)
        .await?;
    Ok(Json(invitations))
}

async fn cancel_invitation(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Invitation>> {
    let invitation = state.manager.ledger.cancel(id, &actor).await?;
    Ok(Json(invitation))
}

async fn resend_invitation(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Invitation>> {
    let invitation = state.manager.ledger.resend(id, &actor).await?;
    Ok(Json(invitation))
}

async fn preview(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<InvitationPreview>> {
    let preview = state.manager.ledger.preview(&token).await?;
    Ok(Json(preview))
}

async fn accept(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    Path(token): Path<String>,
) -> Result<(StatusCode, Json<DelegationChange>)> {
    let outcome = state.manager.acceptance.accept(&token, &actor).await?;
    let status = if outcome.changed() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(outcome.into())))
}

async fn decline(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    body: Option<Json<DeclineRequest>>,
) -> Result<Json<Invitation>> {
    let reason = body.and_then(|Json(req)| req.reason);
    let invitation = state.manager.acceptance.decline(&token, reason).await?;
    Ok(Json(invitation))
}

async fn list_delegations(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    Path(listing_id): Path<String>,
) -> Result<Json<Vec<Delegation>>> {
    let delegations = state
        .manager
        .registry
        .list_for_listing(&listing_id, &actor)
        .await?;
    Ok(Json(delegations))
}

async fn suspend(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<DelegationChange>> {
    let outcome = state.manager.registry.suspend(id, &actor).await?;
    Ok(Json(outcome.into()))
}

async fn reinstate(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<DelegationChange>> {
    let outcome = state.manager.registry.reinstate(id, &actor).await?;
    Ok(Json(outcome.into()))
}

async fn remove(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<DelegationChange>> {
    let outcome = state.manager.registry.remove(id, &actor).await?;
    Ok(Json(outcome.into()))
}

async fn update_permissions(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdatePermissionsRequest>,
) -> Result<Json<Delegation>> {
    let delegation = state
        .manager
        .registry
        .update_permissions(id, &actor, &request.permissions)
        .await?;
    Ok(Json(delegation))
}

async fn authorize(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    Path(listing_id): Path<String>,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Json<AuthorizeResponse>> {
    let capability: Capability = query.capability.parse().map_err(AppError::BadRequest)?;
    let access = state
        .manager
        .guard
        .check(&actor, &listing_id, capability)
        .await?;

    Ok(Json(AuthorizeResponse {
        allowed: access.is_allowed(),
        via: access.as_str().to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> Result<Actor> {
        let (mut parts, _) = req.into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_actor_from_header() {
        let req = Request::builder()
            .header(ACTOR_HEADER, " bob ")
            .body(())
            .unwrap();
        assert_eq!(extract(req).await.unwrap().0, "bob");
    }

    #[tokio::test]
    async fn test_missing_actor() {
        let req = Request::builder().body(()).unwrap();
        assert!(matches!(extract(req).await, Err(AppError::MissingActor)));

        let req = Request::builder().header(ACTOR_HEADER, "  ").body(()).unwrap();
        assert!(matches!(extract(req).await, Err(AppError::MissingActor)));
    }
}
