//! Bucket ownership handoff to the GC user.
//!
//! A removed instance's bucket is never deleted synchronously. It is
//! unlinked from the tenant user and relinked to a dedicated GC identity,
//! whose buckets are swept out of band. The bucket id must be read before
//! unlinking because the relink call needs it.

use std::fmt;
use std::sync::Arc;

use rgw_broker_client::AdminApi;
use tracing::{info, warn};

use crate::error::BrokerError;

/// Result of a handoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffOutcome {
    /// The bucket no longer exists; nothing to hand off.
    BucketAbsent,
    /// The GC user already owns the bucket.
    AlreadyCollected,
    /// Another user owns the bucket; it was left alone.
    NotOwned {
        /// Current owner.
        owner: String,
    },
    /// The bucket was relinked to the GC user.
    Transferred {
        /// Backend bucket id.
        bucket_id: String,
    },
}

/// Performs the unlink/link sequence.
#[derive(Clone)]
pub struct GcHandoff {
    admin: Arc<dyn AdminApi>,
    gc_user: String,
}

impl fmt::Debug for GcHandoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcHandoff")
            .field("gc_user", &self.gc_user)
            .finish_non_exhaustive()
    }
}

impl GcHandoff {
    /// Create a handoff targeting `gc_user`.
    pub fn new(admin: Arc<dyn AdminApi>, gc_user: impl Into<String>) -> Self {
        Self {
            admin,
            gc_user: gc_user.into(),
        }
    }

    /// The GC identity.
    #[must_use]
    pub fn gc_user(&self) -> &str {
        &self.gc_user
    }

    /// Move `bucket` from `user` to the GC user.
    ///
    /// Safe to repeat: a bucket already owned by the GC user is left alone,
    /// and an unlink that finds nothing to unlink is tolerated. A bucket
    /// owned by anyone other than `user` is never touched.
    pub async fn hand_off(&self, user: &str, bucket: &str) -> Result<HandoffOutcome, BrokerError> {
        let ownership = self
            .admin
            .get_bucket_owner_id(bucket)
            .await
            .map_err(BrokerError::admin(format!("look up owner of bucket {bucket}")))?;

        let Some(ownership) = ownership else {
            info!(bucket, "bucket already gone, skipping handoff");
            return Ok(HandoffOutcome::BucketAbsent);
        };
        if ownership.owner == self.gc_user {
            info!(bucket, gc_user = %self.gc_user, "bucket already owned by GC user");
            return Ok(HandoffOutcome::AlreadyCollected);
        }
        if ownership.owner != user {
            warn!(bucket, user, owner = %ownership.owner, "bucket owned by another user, leaving it");
            return Ok(HandoffOutcome::NotOwned {
                owner: ownership.owner,
            });
        }

        match self.admin.unlink_bucket(user, bucket).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!(bucket, user, "bucket was not linked to user, continuing");
            }
            Err(e) => {
                return Err(BrokerError::admin(format!(
                    "unlink bucket {bucket} from {user}"
                ))(e));
            }
        }

        self.admin
            .link_bucket(&self.gc_user, bucket, &ownership.bucket_id)
            .await
            .map_err(BrokerError::admin(format!(
                "link bucket {bucket} to {}",
                self.gc_user
            )))?;

        info!(
            bucket,
            user,
            gc_user = %self.gc_user,
            bucket_id = %ownership.bucket_id,
            "handed bucket off to GC user"
        );
        Ok(HandoffOutcome::Transferred {
            bucket_id: ownership.bucket_id,
        })
    }
}
