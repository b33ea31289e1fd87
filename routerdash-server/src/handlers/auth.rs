use crate::error::AppError;
use crate::services::auth::decode_basic;
use crate::AppState;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// The authenticated operator; recorded as the actor of every audit entry.
#[derive(Debug, Clone)]
pub struct Operator {
    pub username: String,
}

/// HTTP Basic gate in front of every route except `/health`.
pub async fn require_operator(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if req.uri().path() == "/health" {
        return Ok(next.run(req).await);
    }

    let credentials = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(decode_basic);

    let Some((username, password)) = credentials else {
        return Err(unauthorized(&state));
    };

    if !state.credentials.verify(&username, &password) {
        tracing::warn!(
            "Rejected credentials for {} on {}",
            username,
            req.uri().path()
        );
        return Err(unauthorized(&state));
    }

    req.extensions_mut().insert(Operator { username });
    Ok(next.run(req).await)
}

fn unauthorized(state: &AppState) -> AppError {
    AppError::Unauthorized {
        realm: state.settings.auth.realm.clone(),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Operator
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(operator) = parts.extensions.get::<Operator>() {
            return Ok(operator.clone());
        }
        let state = Arc::<AppState>::from_ref(state);
        Err(unauthorized(&state))
    }
}
