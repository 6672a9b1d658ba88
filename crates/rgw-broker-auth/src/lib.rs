//! AWS Signature Version 4 request signing for the RGW service broker.
//!
//! The broker talks to two HTTP surfaces of the same storage backend: the
//! admin API (`/admin/...`) and the S3 data plane. Both accept requests signed
//! with the SigV4 scheme, so this crate provides the client side of that
//! scheme: canonical request construction, signing-key derivation, and a
//! [`sign_request`] entry point that produces the headers to attach.
//!
//! # Usage
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use rgw_broker_auth::{Credentials, RequestToSign, SigningParams, hash_payload, sign_request};
//!
//! let credentials = Credentials::new("AKIDEXAMPLE", "secret");
//! let params = SigningParams::new(&credentials, "us-east-1", "s3")
//!     .with_timestamp(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
//! let request = RequestToSign {
//!     method: "GET",
//!     path: "/admin/user",
//!     query: "uid=alice",
//!     headers: &[("host", "rgw.local:8000")],
//! };
//!
//! let signed = sign_request(&request, &hash_payload(b""), &params).unwrap();
//! assert!(signed.authorization.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240101/"));
//! ```
//!
//! # Modules
//!
//! - [`canonical`] - Canonical request construction and wire encoding helpers
//! - [`credentials`] - Access key / secret pair
//! - [`error`] - Signing error types
//! - [`signer`] - Signing-key derivation and request signing

pub mod canonical;
pub mod credentials;
pub mod error;
pub mod signer;

pub use credentials::Credentials;
pub use error::SigningError;
pub use signer::{RequestToSign, SignedHeaders, SigningParams, hash_payload, sign_request};
