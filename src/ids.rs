use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use rand::RngCore;

/// Process-wide monotonic counter mixed with a random nonce, so identifiers
/// stay unique across a process lifetime without needing a shared generator
/// instance threaded through every component (spec §9, "Identifier
/// generation").
static COUNTER: AtomicU64 = AtomicU64::new(0);
static NONCE: OnceLock<u64> = OnceLock::new();

fn nonce() -> u64 {
    *NONCE.get_or_init(|| rand::thread_rng().next_u64())
}

/// Identifier prefixes used throughout the data model (spec §3, §6).
pub const PREFIX_ACCOUNT: &str = "AC";
pub const PREFIX_CALL: &str = "CA";
pub const PREFIX_CONFERENCE: &str = "CF";
pub const PREFIX_QUEUE: &str = "QU";
pub const PREFIX_PHONE_NUMBER: &str = "PN";
pub const PREFIX_APPLICATION: &str = "AP";
pub const PREFIX_RECORDING: &str = "RE";

/// Generates a new opaque identifier carrying the given two-letter prefix,
/// formatted as `<prefix>` + 32 lowercase hex characters, matching the
/// provider's SID shape closely enough for byte-for-byte-looking output.
pub fn generate(prefix: &str) -> String {
    debug_assert_eq!(prefix.len(), 2, "identifier prefixes are always 2 letters");
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let mixed = seq ^ nonce().rotate_left((seq % 64) as u32);
    format!("{prefix}{mixed:016x}{seq:016x}")
}

/// Generates a 32-hex-character auth token for a newly created account.
pub fn generate_auth_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// A newtype per identifier kind so a `CallSid` can never be passed where an
/// `AccountSid` is expected, even though both are opaque strings at the wire
/// level (spec §3 "Ownership": components reference each other by identifier,
/// never by pointer).
macro_rules! sid_newtype {
    ($name:ident, $prefix:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(generate($prefix))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

sid_newtype!(AccountSid, PREFIX_ACCOUNT);
sid_newtype!(CallSid, PREFIX_CALL);
sid_newtype!(ConferenceSid, PREFIX_CONFERENCE);
sid_newtype!(QueueSid, PREFIX_QUEUE);
sid_newtype!(PhoneNumberSid, PREFIX_PHONE_NUMBER);
sid_newtype!(ApplicationSid, PREFIX_APPLICATION);
sid_newtype!(RecordingSid, PREFIX_RECORDING);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn identifiers_carry_prefix_and_are_unique() {
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let id = generate(PREFIX_CALL);
            assert!(id.starts_with("CA"));
            assert_eq!(id.len(), 2 + 32);
            assert!(seen.insert(id), "identifier collision");
        }
    }

    #[test]
    fn auth_token_is_32_hex_chars() {
        let token = generate_auth_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
