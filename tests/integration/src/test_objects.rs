//! Data-plane and record store integration tests.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use rgw_broker_client::ObjectApi;
    use rgw_broker_core::{CredentialStore, RecordKey, StoreError};

    use crate::{s3_client, unique_name};

    #[tokio::test]
    #[ignore = "requires running RGW"]
    async fn test_should_put_get_and_remove_object() {
        let s3 = s3_client();
        let bucket = unique_name("objects");
        s3.make_bucket(&bucket).await.unwrap();
        s3.make_bucket(&bucket).await.unwrap();

        let written = s3
            .put_object(&bucket, "dir/key one", Bytes::from_static(b"{\"a\":1}"))
            .await
            .unwrap();
        assert_eq!(written, 7);
        let body = s3.get_object(&bucket, "dir/key one").await.unwrap();
        assert_eq!(&body[..], b"{\"a\":1}");

        s3.remove_object(&bucket, "dir/key one").await.unwrap();
        let err = s3.get_object(&bucket, "dir/key one").await.unwrap_err();
        assert!(err.is_not_found());

        assert!(s3.list_buckets().await.unwrap().contains(&bucket));
    }

    #[tokio::test]
    #[ignore = "requires running RGW"]
    async fn test_should_round_trip_records() {
        let store = CredentialStore::new(Arc::new(s3_client()), unique_name("store"));
        store.ensure_bucket().await.unwrap();

        let key = RecordKey::binding("i1", "b1");
        let record = serde_json::json!({"accessKey": "AK", "secretKey": "SK"});
        store.put(&key, &record).await.unwrap();
        let loaded: serde_json::Value = store.get(&key).await.unwrap();
        assert_eq!(loaded, record);

        store.delete(&key).await.unwrap();
        let err = store.get::<serde_json::Value>(&key).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
