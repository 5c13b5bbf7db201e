use std::time::Duration;

pub(crate) const AES_256_KEY_LEN: usize = 32;
pub(crate) const AES_BLOCK_SIZE: usize = 16;
pub(crate) const SHA1_HMAC_LEN: usize = 12;
pub(crate) const IV_ZERO: [u8; AES_BLOCK_SIZE] = [0u8; AES_BLOCK_SIZE];

/// RFC3962 default iteration count for the string-to-key function.
#[cfg(test)]
pub(crate) const RFC_PKBDF2_SHA1_ITER: u32 = 0x1000;

/// Largest single message accepted from a KDC over TCP.
pub(crate) const DEFAULT_IO_MAX_SIZE: usize = 32 * 1024;

/// The default window allowed between an authenticator timestamp and our clock.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Messages above this size are sent over TCP first. Matches the MIT default.
pub const DEFAULT_UDP_PREFERENCE_LIMIT: usize = 1465;

pub const DEFAULT_KDC_PORT: u16 = 88;

pub const DEFAULT_KDC_TIMEOUT: Duration = Duration::from_secs(3);

/// How far in the future delegated tickets are requested for.
pub(crate) const DEFAULT_TICKET_LIFETIME: Duration = Duration::from_secs(10 * 60 * 60);

// RFC4120 7.5.1 key usage numbers.
pub(crate) const KEY_USAGE_TICKET: i32 = 2;
pub(crate) const KEY_USAGE_TGS_REQ_AUTH_CKSUM: i32 = 6;
pub(crate) const KEY_USAGE_TGS_REQ_AUTH: i32 = 7;
pub(crate) const KEY_USAGE_TGS_REP_SESSION_KEY: i32 = 8;
pub(crate) const KEY_USAGE_AP_REQ_AUTH: i32 = 11;
// MS-SFU 2.2.1
pub(crate) const KEY_USAGE_PA_FOR_USER_CKSUM: i32 = 17;

pub(crate) const AUTH_PACKAGE_KERBEROS: &str = "Kerberos";
