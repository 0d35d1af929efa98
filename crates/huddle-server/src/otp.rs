//! One-time-password verification.
//!
//! [`OtpService`] dispatches SMS codes through a third-party gateway and
//! exchanges a correct code for a signed session token. Phone numbers are
//! validated against the fixed national E.164 pattern before anything is
//! handed to the gateway; a malformed number never reaches the provider.

use std::{
    collections::HashMap,
    sync::{LazyLock, Mutex},
};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use huddle_core::Environment;
use regex::Regex;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Philippine mobile numbers in E.164 form: +639 followed by nine digits.
#[allow(clippy::expect_used)]
static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+639\d{9}$").expect("static pattern compiles"));

/// How long a dispatched code stays valid.
const CODE_TTL_MS: u64 = 5 * 60 * 1000;

/// How long an issued session token stays valid.
const SESSION_TTL_MS: u64 = 30 * 24 * 60 * 60 * 1000;

/// Errors from OTP operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OtpError {
    /// Phone number does not match the accepted E.164 pattern.
    #[error("phone number must match +639XXXXXXXXX")]
    InvalidPhone,

    /// `verify` was called for a number with no outstanding code.
    #[error("no verification code was requested for this number")]
    NoPendingCode,

    /// The outstanding code has expired; a new one must be requested.
    #[error("verification code has expired")]
    CodeExpired,

    /// The submitted code does not match the outstanding one.
    #[error("verification code does not match")]
    CodeMismatch,

    /// The SMS gateway rejected or failed the dispatch.
    #[error("sms gateway failure: {0}")]
    Gateway(String),
}

/// Failure reported by an SMS gateway.
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct SmsDispatchError(pub String);

/// Third-party SMS verification service boundary.
#[async_trait]
pub trait SmsGateway: Send + Sync + 'static {
    /// Dispatch `code` to `phone`. The phone has already been validated.
    async fn send_code(&self, phone: &str, code: &str) -> Result<(), SmsDispatchError>;
}

/// Development gateway that logs the code instead of dispatching it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSmsGateway;

#[async_trait]
impl SmsGateway for LogSmsGateway {
    async fn send_code(&self, phone: &str, code: &str) -> Result<(), SmsDispatchError> {
        tracing::info!(%phone, %code, "dev gateway: would dispatch SMS code");
        Ok(())
    }
}

/// Signed session token returned on successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    /// Opaque token the client presents on subsequent requests.
    pub token: String,
    /// Verified phone number.
    pub phone: String,
    /// Expiry, milliseconds since the Unix epoch.
    pub expires_at_ms: u64,
}

struct PendingCode {
    code: String,
    expires_at_ms: u64,
}

/// OTP verification service.
pub struct OtpService<G, E> {
    gateway: G,
    env: E,
    secret: Vec<u8>,
    pending: Mutex<HashMap<String, PendingCode>>,
}

impl<G: SmsGateway, E: Environment> OtpService<G, E> {
    /// Create a service signing tokens with `secret`.
    pub fn new(gateway: G, env: E, secret: Vec<u8>) -> Self {
        Self { gateway, env, secret, pending: Mutex::new(HashMap::new()) }
    }

    /// Validate `phone` and dispatch a fresh code to it.
    ///
    /// Validation happens before the gateway call; a malformed number is
    /// rejected without any SMS traffic. A repeated request replaces the
    /// outstanding code.
    pub async fn request_code(&self, phone: &str) -> Result<(), OtpError> {
        if !is_valid_phone(phone) {
            return Err(OtpError::InvalidPhone);
        }

        let code = format!("{:06}", self.env.random_u64() % 1_000_000);
        self.gateway.send_code(phone, &code).await.map_err(|err| {
            tracing::error!(%phone, error = %err, "sms dispatch failed");
            OtpError::Gateway(err.to_string())
        })?;

        let expires_at_ms = self.env.now_ms() + CODE_TTL_MS;
        self.lock_pending().insert(phone.to_owned(), PendingCode { code, expires_at_ms });
        Ok(())
    }

    /// Exchange a dispatched code for a signed session token.
    ///
    /// Verifying without a prior request, after expiry, or with the wrong
    /// code are ordinary rejected outcomes. A successful verification
    /// consumes the outstanding code.
    pub async fn verify(&self, phone: &str, code: &str) -> Result<SessionToken, OtpError> {
        if !is_valid_phone(phone) {
            return Err(OtpError::InvalidPhone);
        }

        let now_ms = self.env.now_ms();
        {
            let mut pending = self.lock_pending();
            let entry = pending.get(phone).ok_or(OtpError::NoPendingCode)?;
            let expired = now_ms > entry.expires_at_ms;
            let matches = entry.code == code;
            if expired {
                pending.remove(phone);
                return Err(OtpError::CodeExpired);
            }
            if !matches {
                return Err(OtpError::CodeMismatch);
            }
            pending.remove(phone);
        }

        Ok(self.issue_token(phone, now_ms))
    }

    /// Check a previously issued token; returns the phone number it was
    /// issued for when the signature matches and it has not expired.
    pub fn validate_token(&self, token: &str) -> Option<String> {
        let (payload, signature) = token.rsplit_once('|')?;
        let signature = hex::decode(signature).ok()?;

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).ok()?;

        let (phone, expires_at_ms) = payload.rsplit_once('|')?;
        let expires_at_ms: u64 = expires_at_ms.parse().ok()?;
        if self.env.now_ms() > expires_at_ms {
            return None;
        }
        Some(phone.to_owned())
    }

    fn issue_token(&self, phone: &str, now_ms: u64) -> SessionToken {
        let expires_at_ms = now_ms + SESSION_TTL_MS;
        let payload = format!("{phone}|{expires_at_ms}");

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        SessionToken { token: format!("{payload}|{signature}"), phone: phone.to_owned(), expires_at_ms }
    }

    /// HMAC accepts keys of any length, so construction cannot fail.
    #[allow(clippy::expect_used)]
    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length")
    }

    #[allow(clippy::expect_used)]
    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingCode>> {
        self.pending.lock().expect("Mutex poisoned")
    }
}

/// Whether `phone` matches the accepted national E.164 pattern.
pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_PATTERN.is_match(phone)
}
