//! Environment abstraction for deterministic testing.
//!
//! Decouples room-id generation and timestamp formatting from system
//! resources. Tests substitute fixed or stepping clocks and seeded
//! randomness; production code uses [`SystemEnv`].

use rand::RngCore;

/// Abstract environment providing wall-clock time and randomness.
///
/// Implementations MUST guarantee that `now_ms()` never decreases within a
/// single execution context, and that `random_bytes()` uses cryptographically
/// secure entropy in production.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    ///
    /// Convenience for identifier nonces and one-time codes.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}

/// Production environment backed by the system clock and thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        rand::thread_rng().fill_bytes(buffer);
    }
}
