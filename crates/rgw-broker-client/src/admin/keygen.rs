//! Locally generated access key ids.

use rand::RngExt;

/// Symbols an access key is drawn from.
const ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Bytes at or above this value are discarded so every symbol is equally
/// likely (`252 = 36 * 7`).
const REJECTION_BOUND: u8 = 252;

/// Default access key length.
pub const DEFAULT_ACCESS_KEY_LENGTH: usize = 20;

/// Generate a random access key of `len` symbols from `[A-Z0-9]`.
///
/// # Examples
///
/// ```
/// use rgw_broker_client::admin::generate_access_key;
///
/// let key = generate_access_key(20);
/// assert_eq!(key.len(), 20);
/// assert!(key.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
/// ```
#[must_use]
pub fn generate_access_key(len: usize) -> String {
    let mut rng = rand::rng();
    let mut key = String::with_capacity(len);
    let mut buf = [0u8; 32];
    while key.len() < len {
        rng.fill(&mut buf);
        for byte in buf {
            if key.len() == len {
                break;
            }
            if byte < REJECTION_BOUND {
                key.push(char::from(ALPHABET[usize::from(byte % 36)]));
            }
        }
    }
    key
}
