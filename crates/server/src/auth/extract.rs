use std::sync::Arc;

use axum::extract::{FromRequestParts, Path};
use axum::http::HeaderMap;
use axum::http::request::Parts;

use pgvault_core::TenantConfig;

use super::AuthError;
use super::jwt::Caller;
use crate::api::AppState;
use crate::error::ApiError;

/// The tenant named by the `{tenant}` path segment together with an
/// authorized caller.
///
/// The tenant is resolved first because its audience is needed to validate
/// the token.
#[derive(Debug, Clone)]
pub struct TenantCaller {
    pub tenant: Arc<TenantConfig>,
    pub caller: Caller,
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
}

impl FromRequestParts<AppState> for TenantCaller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Path(tenant_id) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        let tenant = state
            .registry
            .get(&tenant_id)
            .ok_or(ApiError::UnknownTenant(tenant_id))?;

        let caller = match &state.auth {
            Some(verifier) => verifier.verify(bearer_token(&parts.headers)?, &tenant.audience)?,
            None => Caller::anonymous(),
        };
        Ok(Self { tenant, caller })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), Err(AuthError::MissingToken));

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), Err(AuthError::MissingToken));

        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), Err(AuthError::MissingToken));

        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Ok("abc.def.ghi"));
    }
}
