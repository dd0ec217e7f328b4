use super::{ApiError, AppState};
use crate::accounts::AccountService;
use crate::database::models::UserRecord;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

/// Authenticated user attached to the request by [`require_device_secret`].
#[derive(Clone)]
pub struct CurrentUser(pub UserRecord);

pub async fn require_device_secret(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let secret = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("missing bearer device secret".into()))?
        .to_string();

    let service = AccountService::new(state.database.clone(), state.config.proximity);
    let user = service
        .authenticate(&secret)?
        .ok_or_else(|| ApiError::Unauthorized("invalid device secret".into()))?;

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}
