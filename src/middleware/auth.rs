//! Caller authentication middleware.
//!
//! The ledger does not authenticate end users itself; an upstream gateway
//! does that and forwards the user id. This middleware intercepts every
//! protected request to:
//! 1. Verify the gateway's service key from the Authorization header
//! 2. Read the caller's user id from the `X-User-Id` header
//! 3. Inject the caller context into the request
//! 4. Reject unauthenticated requests with HTTP 401

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    Extension,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

use crate::{error::AppError, models::account::AccountId};

/// Header carrying the end-user id resolved by the upstream gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller context attached to authenticated requests.
///
/// Inserted into the request's extension map; route handlers extract it
/// with `Extension<AuthContext>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Account the request acts on behalf of
    pub account_id: AccountId,

    /// Whether the caller may deposit, refund and list all accounts
    pub is_admin: bool,
}

/// Accepted service key digests and administrator ids.
#[derive(Debug, Clone, Default)]
pub struct CallerAuth {
    key_hashes: Arc<HashSet<String>>,
    admins: Arc<HashSet<AccountId>>,
}

impl CallerAuth {
    pub fn new(
        key_hashes: impl IntoIterator<Item = String>,
        admins: impl IntoIterator<Item = AccountId>,
    ) -> Self {
        Self {
            key_hashes: Arc::new(
                key_hashes
                    .into_iter()
                    .map(|h| h.trim().to_ascii_lowercase())
                    .collect(),
            ),
            admins: Arc::new(admins.into_iter().collect()),
        }
    }

    /// SHA-256 hex digest of a raw service key, as stored in configuration.
    pub fn hash_key(api_key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(api_key.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn accepts(&self, api_key: &str) -> bool {
        self.key_hashes.contains(&Self::hash_key(api_key))
    }

    pub fn is_admin(&self, account_id: AccountId) -> bool {
        self.admins.contains(&account_id)
    }

    pub fn has_keys(&self) -> bool {
        !self.key_hashes.is_empty()
    }
}

/// Authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <key>` header from request
/// 2. Hash the `<key>` using SHA-256 and compare with configured digests
/// 3. Parse `X-User-Id: <integer>`
/// 4. If both pass: inject `AuthContext`, call next handler
/// 5. Otherwise: return 401 Unauthorized
pub async fn auth_middleware(
    State(auth): State<CallerAuth>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let api_key = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::InvalidApiKey)?;

    if !auth.accepts(api_key) {
        return Err(AppError::InvalidApiKey);
    }

    let account_id: AccountId = request
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.parse().ok())
        .ok_or(AppError::MissingCaller)?;

    let context = AuthContext {
        account_id,
        is_admin: auth.is_admin(account_id),
    };

    // Route handlers can now extract this using Extension<AuthContext>
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

/// Rejects callers that are not configured administrators with 403.
///
/// Must run inside `auth_middleware`.
pub async fn require_admin(
    Extension(caller): Extension<AuthContext>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !caller.is_admin {
        tracing::warn!(account_id = %caller.account_id, "admin route refused");
        return Err(AppError::Forbidden);
    }
    Ok(next.run(request).await)
}
