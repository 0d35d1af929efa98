//! HTTP surface for the OTP service.
//!
//! Two endpoints: `POST /otp/request` dispatches a code, `POST /otp/verify`
//! exchanges it for a signed session token. Validation and precondition
//! failures map to specific 4xx responses; gateway failures map to a
//! generic retry-suggesting 502 that does not leak provider error text.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use huddle_core::Environment;
use serde::{Deserialize, Serialize};

use crate::otp::{OtpError, OtpService, SmsGateway};

/// Shared handler state.
pub struct AppState<G, E> {
    otp: Arc<OtpService<G, E>>,
}

impl<G, E> Clone for AppState<G, E> {
    fn clone(&self) -> Self {
        Self { otp: Arc::clone(&self.otp) }
    }
}

/// Body of `POST /otp/request`.
#[derive(Debug, Deserialize)]
pub struct RequestCodeBody {
    /// Phone number in E.164 form.
    pub phone: String,
}

/// Body of `POST /otp/verify`.
#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    /// Phone number the code was dispatched to.
    pub phone: String,
    /// The received one-time code.
    pub code: String,
}

/// Success body of `POST /otp/verify`.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    /// Signed session token.
    pub token: String,
    /// Token expiry, milliseconds since the Unix epoch.
    pub expires_at_ms: u64,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for OtpError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::InvalidPhone | Self::CodeExpired => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::NoPendingCode => (StatusCode::NOT_FOUND, self.to_string()),
            Self::CodeMismatch => (StatusCode::UNAUTHORIZED, self.to_string()),
            // Provider error text stays in the log, not the response.
            Self::Gateway(_) => (
                StatusCode::BAD_GATEWAY,
                "verification service unavailable; please try again".to_owned(),
            ),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

async fn request_code<G: SmsGateway, E: Environment>(
    State(state): State<AppState<G, E>>,
    Json(body): Json<RequestCodeBody>,
) -> Result<StatusCode, OtpError> {
    state.otp.request_code(&body.phone).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn verify<G: SmsGateway, E: Environment>(
    State(state): State<AppState<G, E>>,
    Json(body): Json<VerifyBody>,
) -> Result<Json<VerifyResponse>, OtpError> {
    let token = state.otp.verify(&body.phone, &body.code).await?;
    Ok(Json(VerifyResponse { token: token.token, expires_at_ms: token.expires_at_ms }))
}

/// Build the OTP router over a configured service.
pub fn router<G: SmsGateway, E: Environment>(otp: OtpService<G, E>) -> Router {
    Router::new()
        .route("/otp/request", post(request_code::<G, E>))
        .route("/otp/verify", post(verify::<G, E>))
        .with_state(AppState { otp: Arc::new(otp) })
}
