//! Server-side collaborators for Huddle
//!
//! Two thin pieces run outside the clients: the SMS one-time-password
//! verification service (an HTTP endpoint pair backed by a third-party SMS
//! gateway) and the push notification trigger that fires when a message
//! record is created. Everything else - rooms, messages, read state - lives
//! in the managed document store and never passes through here.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// One-time-password verification.
pub mod otp;
/// Push notification trigger.
pub mod push;
/// HTTP surface for the OTP service.
pub mod routes;

pub use otp::{LogSmsGateway, OtpError, OtpService, SessionToken, SmsDispatchError, SmsGateway};
pub use push::{NotificationTrigger, PushNotification, PushSendError, PushSender};
pub use routes::router;
