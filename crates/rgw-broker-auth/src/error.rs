//! Error types for SigV4 request signing.

/// Errors that prevent a request from being signed.
///
/// A request that cannot be signed is never sent; callers surface these as
/// fatal to the current call.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    /// The access key or the secret key is empty.
    #[error("no signing credentials available (access key or secret is empty)")]
    MissingCredentials,

    /// The request carries no `host` header, which SigV4 always signs.
    #[error("request has no host header to sign")]
    MissingHost,
}
