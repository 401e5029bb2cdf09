use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::{contact::ContactRequest, ErrorResponse},
    middleware::rate_limit::too_many_requests,
    middleware::ClientIp,
    services::Tier,
    utils::ValidatedJson,
    AppState,
};

/// Accept a contact-form submission
///
/// The gateway only throttles and validates; delivery belongs to the
/// downstream sink.
#[utoipa::path(
    post,
    path = "/contact",
    request_body = ContactRequest,
    responses(
        (status = 202, description = "Submission accepted for delivery"),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many submissions", body = ErrorResponse)
    ),
    tag = "Contact"
)]
pub async fn submit_contact(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ValidatedJson(req): ValidatedJson<ContactRequest>,
) -> Result<impl IntoResponse, AppError> {
    let key = format!("{}:{}", ip, req.email.to_lowercase());
    if let Err(retry_after) = state.limiter.check(Tier::Contact, &key) {
        return Err(too_many_requests(Tier::Contact, retry_after));
    }

    state
        .contact
        .submit(&req.email, &req.subject, &req.message)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "message": "Submission accepted"
        })),
    ))
}
