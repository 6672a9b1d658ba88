//! Backend clients for the RGW service broker.
//!
//! Two HTTP surfaces of the same backend are covered:
//!
//! - [`AdminClient`] speaks the admin API (`/admin/user`, `/admin/bucket`,
//!   `/admin/metadata`) for user, key, and bucket-ownership management.
//! - [`S3Client`] speaks the path-style S3 data plane for buckets and the
//!   JSON records the broker persists.
//!
//! Both sign every request with SigV4 through a shared [`SignedTransport`].
//! The broker core depends only on the [`AdminApi`] and [`ObjectApi`] traits.
//!
//! ```no_run
//! # async fn example() -> Result<(), rgw_broker_client::ClientError> {
//! use std::time::Duration;
//!
//! use rgw_broker_auth::Credentials;
//! use rgw_broker_client::{AdminApi, AdminClient, Endpoint, SignedTransport};
//!
//! let transport = SignedTransport::new(
//!     Endpoint::parse("rgw.local:7480")?,
//!     "us-east-1",
//!     Duration::from_secs(30),
//! )?;
//! let admin = AdminClient::new(transport, Credentials::new("admin", "secret"));
//! let user = admin.get_user("kube-rgw.abc").await?;
//! println!("{} has {} keys", user.user_id, user.keys.len());
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod api;
pub mod endpoint;
pub mod error;
pub mod objects;
pub mod transport;
pub mod xml;

pub use admin::{AdminClient, BucketOwnership, KeyPolicy, UserInfo, UserKey};
pub use api::{AdminApi, ObjectApi};
pub use endpoint::Endpoint;
pub use error::ClientError;
pub use objects::S3Client;
pub use transport::{DEFAULT_TIMEOUT, SignedTransport};
