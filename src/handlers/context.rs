//! Request-scoped context for deposit endpoints.
//!
//! Every deposit request goes through the same gate, in this order:
//! resolve the pid (404), require a caller (401), require ownership (403),
//! and for mutations require a write-capable credential on a draft (403).
//! Handlers only see a [`RequestContext`] once the gate has passed.

use crate::{
    errors::AppError,
    models::{deposit::Deposit, user::Identity},
    state::AppState,
};
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;
use uuid::Uuid;

/// Name of the login session cookie.
pub const SESSION_COOKIE: &str = "session";

/// Extracts the bearer token from the Authorization header.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let jar = CookieJar::from_headers(&parts.headers);
        let session = jar.get(SESSION_COOKIE).map(|c| c.value());
        let bearer = extract_bearer_token(&parts.headers);
        Ok(state.auth.resolve_identity(session, bearer).await?)
    }
}

/// What the request intends to do with the deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Decide whether `identity` may perform `access` on `deposit`.
///
/// Returns the caller's user id when allowed.
pub fn authorize(identity: &Identity, deposit: &Deposit, access: Access) -> Result<Uuid, AppError> {
    let Some(user_id) = identity.user_id() else {
        return Err(AppError::unauthorized("authentication required"));
    };
    if !deposit.is_owner(user_id) {
        warn!(user = %user_id, deposit = %deposit.pid, "rejected non-owner");
        return Err(AppError::forbidden("you do not own this deposit"));
    }
    if access == Access::Write {
        if !identity.can_write() {
            warn!(user = %user_id, deposit = %deposit.pid, "rejected token without write scope");
            return Err(AppError::forbidden("token lacks the deposit:write scope"));
        }
        if !deposit.is_draft() {
            return Err(AppError::forbidden("deposit is not a draft"));
        }
    }
    Ok(user_id)
}

/// Caller identity together with the deposit it is allowed to act on.
pub struct RequestContext {
    pub user_id: Uuid,
    pub deposit: Deposit,
}

impl RequestContext {
    /// Resolve `pid` and run the authorization gate.
    pub async fn load(
        state: &AppState,
        pid: &str,
        identity: &Identity,
        access: Access,
    ) -> Result<Self, AppError> {
        let deposit = state.deposits.resolve(pid).await?;
        let user_id = authorize(identity, &deposit, access)?;
        Ok(Self { user_id, deposit })
    }
}
