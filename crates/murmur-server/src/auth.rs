//! Access-key authentication.
//!
//! Every non-admin, non-public route requires an `X-Access-Key` header.
//! The middleware validates the key format (fail-fast: a malformed key is
//! rejected before any lookup and never creates an identity), resolves it
//! (lazily creating an identity on first sight when registration is open),
//! and attaches the resolved [`Identity`] as a request extension.
//!
//! Banned identities are resolved like anyone else; the handlers decide
//! how to degrade their responses.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use murmur_shared::AccessKey;

use crate::api::AppState;
use crate::error::ServerError;

pub const ACCESS_KEY_HEADER: &str = "x-access-key";

pub async fn require_access_key(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let raw = req
        .headers()
        .get(ACCESS_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServerError::BadRequest("Missing X-Access-Key header".to_string()))?;

    let key = AccessKey::parse(raw).map_err(|e| ServerError::BadRequest(e.to_string()))?;

    let identity = {
        let db = state.db.lock().await;

        if !state.config.registration_open && !db.identity_exists(&key)? {
            return Err(ServerError::Forbidden("Registration is closed".to_string()));
        }

        db.resolve(&key)?
    };

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
