//! Admin API response types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A backend user as returned by `/admin/user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Backend user id.
    pub user_id: String,
    /// Display name.
    #[serde(default)]
    pub display_name: String,
    /// Whether the user is suspended (`0`/`1` on the wire).
    #[serde(default, with = "int_bool")]
    pub suspended: bool,
    /// Maximum buckets, `-1` meaning unlimited.
    #[serde(default)]
    pub max_buckets: i64,
    /// S3 keys of the user.
    #[serde(default)]
    pub keys: Vec<UserKey>,
}

/// One S3 key pair of a backend user.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserKey {
    /// Owning user id.
    pub user: String,
    /// Access key id.
    pub access_key: String,
    /// Secret key.
    pub secret_key: String,
}

impl fmt::Debug for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserKey")
            .field("user", &self.user)
            .field("access_key", &self.access_key)
            .field("secret_key", &"...")
            .finish()
    }
}

/// Current owner and immutable id of a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketOwnership {
    /// Backend bucket id, required to relink the bucket.
    pub bucket_id: String,
    /// Owning user id.
    pub owner: String,
}

/// Body of `GET /admin/metadata?key=bucket:<name>`.
#[derive(Debug, Deserialize)]
pub(crate) struct BucketMetadata {
    pub data: BucketMetadataData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BucketMetadataData {
    pub owner: String,
    pub bucket: BucketMetadataBucket,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BucketMetadataBucket {
    pub bucket_id: String,
}

impl From<BucketMetadata> for BucketOwnership {
    fn from(meta: BucketMetadata) -> Self {
        Self {
            bucket_id: meta.data.bucket.bucket_id,
            owner: meta.data.owner,
        }
    }
}

/// RGW JSON error body, e.g. `{"Code":"NoSuchUser","RequestId":"..."}`.
#[derive(Debug, Deserialize)]
pub(crate) struct AdminErrorBody {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Message", default)]
    pub message: Option<String>,
}

mod int_bool {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Flag::deserialize(deserializer)? {
            Flag::Bool(b) => b,
            Flag::Int(i) => i != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_decode_user_info() {
        let json = r#"{
            "user_id": "kube-rgw.abc",
            "display_name": "default/inst",
            "email": "",
            "suspended": 1,
            "max_buckets": -1,
            "subusers": [],
            "keys": [{"user": "kube-rgw.abc", "access_key": "AK", "secret_key": "SK"}],
            "caps": []
        }"#;
        let user: UserInfo = serde_json::from_str(json).unwrap();
        assert!(user.suspended);
        assert_eq!(user.max_buckets, -1);
        assert_eq!(user.keys[0].access_key, "AK");
    }

    #[test]
    fn test_should_decode_bucket_metadata() {
        let json = r#"{
            "key": "bucket:b1",
            "ver": {"tag": "_x", "ver": 1},
            "mtime": "2024-01-01 00:00:00.000000Z",
            "data": {
                "bucket": {"name": "b1", "marker": "m", "bucket_id": "abc.123.4"},
                "owner": "kube-rgw.abc",
                "creation_time": "2024-01-01 00:00:00.000000Z"
            }
        }"#;
        let meta: BucketMetadata = serde_json::from_str(json).unwrap();
        let ownership = BucketOwnership::from(meta);
        assert_eq!(ownership.bucket_id, "abc.123.4");
        assert_eq!(ownership.owner, "kube-rgw.abc");
    }

    #[test]
    fn test_should_not_print_secret_key() {
        let key = UserKey {
            user: "u".to_owned(),
            access_key: "AK".to_owned(),
            secret_key: "topsecret".to_owned(),
        };
        assert!(!format!("{key:?}").contains("topsecret"));
    }
}
