//! HTTP client for the co-host server

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::messages::{
    ApiError, AuthorizeResponse, CreateInvitationRequest, CreatedInvitation, DeclineRequest,
    Delegation, DelegationChange, Invitation, InvitationPreview, ListingOwnership,
    UpdatePermissionsRequest,
};

/// Header the server reads the caller's identity from
const ACTOR_HEADER: &str = "x-actor-id";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid server URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{code} ({status}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, ClientError>;

pub struct CohostClient {
    http: reqwest::Client,
    base: Url,
    actor: Option<String>,
}

impl CohostClient {
    pub fn new(server: &str, actor: Option<String>) -> Result<Self> {
        // Paths are joined relative to the base, which needs a trailing slash
        let base = if server.ends_with('/') {
            Url::parse(server)?
        } else {
            Url::parse(&format!("{}/", server))?
        };

        Ok(Self {
            http: reqwest::Client::new(),
            base,
            actor,
        })
    }

    /// Register the actor as owner of a listing
    pub async fn register_listing(&self, listing_id: &str) -> Result<ListingOwnership> {
        let path = format!("listings/{}", listing_id);
        self.send(self.request(Method::PUT, &path)?).await
    }

    pub async fn invite(
        &self,
        listing_id: &str,
        request: &CreateInvitationRequest,
    ) -> Result<CreatedInvitation> {
        let path = format!("listings/{}/invitations", listing_id);
        self.send(self.request(Method::POST, &path)?.json(request)).await
    }

    pub async fn invitations(
        &self,
        listing_id: &str,
        status: Option<&str>,
    ) -> Result<Vec<Invitation>> {
        let path = format!("listings/{}/invitations", listing_id);
        let mut request = self.request(Method::GET, &path)?;
        if let Some(status) = status {
            request = request.query(&[("status", status)]);
        }
        self.send(request).await
    }

    pub async fn cancel(&self, invitation_id: Uuid) -> Result<Invitation> {
        let path = format!("invitations/{}/cancel", invitation_id);
        self.send(self.request(Method::POST, &path)?).await
    }

    pub async fn resend(&self, invitation_id: Uuid) -> Result<Invitation> {
        let path = format!("invitations/{}/resend", invitation_id);
        self.send(self.request(Method::POST, &path)?).await
    }

    pub async fn preview(&self, token: &str) -> Result<InvitationPreview> {
        let path = format!("co-host/accept/{}", token);
        self.send(self.request(Method::GET, &path)?).await
    }

    pub async fn accept(&self, token: &str) -> Result<DelegationChange> {
        let path = format!("co-host/accept/{}", token);
        self.send(self.request(Method::POST, &path)?).await
    }

    pub async fn decline(&self, token: &str, reason: Option<String>) -> Result<Invitation> {
        let path = format!("co-host/decline/{}", token);
        self.send(self.request(Method::POST, &path)?.json(&DeclineRequest { reason }))
            .await
    }

    pub async fn delegations(&self, listing_id: &str) -> Result<Vec<Delegation>> {
        let path = format!("listings/{}/delegations", listing_id);
        self.send(self.request(Method::GET, &path)?).await
    }

    /// Apply `suspend`, `reinstate` or `remove`
    pub async fn lifecycle(&self, delegation_id: Uuid, action: &str) -> Result<DelegationChange> {
        let path = format!("delegations/{}/{}", delegation_id, action);
        self.send(self.request(Method::POST, &path)?).await
    }

    pub async fn set_permissions(
        &self,
        delegation_id: Uuid,
        permissions: Vec<String>,
    ) -> Result<Delegation> {
        let path = format!("delegations/{}/permissions", delegation_id);
        let body = UpdatePermissionsRequest { permissions };
        self.send(self.request(Method::PUT, &path)?.json(&body)).await
    }

    pub async fn authorize(&self, listing_id: &str, capability: &str) -> Result<AuthorizeResponse> {
        let path = format!("listings/{}/authorize", listing_id);
        let request = self
            .request(Method::GET, &path)?
            .query(&[("capability", capability)]);
        self.send(request).await
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.base.join(path)?;
        tracing::debug!(%method, %url, "request");

        let mut request = self.http.request(method, url);
        if let Some(actor) = &self.actor {
            request = request.header(ACTOR_HEADER, actor);
        }
        Ok(request)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let text = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ApiError>(&text) {
        Ok(err) => (err.error, err.message),
        Err(_) => ("http_error".to_string(), text),
    };

    Err(ClientError::Api {
        status: status.as_u16(),
        code,
        message,
    })
}
