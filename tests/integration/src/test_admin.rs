//! Admin API integration tests.

#[cfg(test)]
mod tests {
    use rgw_broker_client::{AdminApi, ObjectApi};

    use crate::{admin_client, s3_client, unique_name};

    #[tokio::test]
    #[ignore = "requires running RGW"]
    async fn test_should_create_user_idempotently() {
        let admin = admin_client();
        let uid = unique_name("user");

        let created = admin.create_user(&uid, "integration", true, false).await.unwrap();
        assert_eq!(created.user_id, uid);
        assert!(!created.keys.is_empty());

        let again = admin.create_user(&uid, "integration", true, true).await.unwrap();
        assert_eq!(again.user_id, uid);

        let err = admin
            .create_user(&uid, "integration", true, false)
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        admin.suspend_user(&uid).await.unwrap();
        assert!(admin.get_user(&uid).await.unwrap().suspended);
    }

    #[tokio::test]
    #[ignore = "requires running RGW"]
    async fn test_should_mint_and_remove_keys() {
        let admin = admin_client();
        let uid = unique_name("keys");
        admin.create_user(&uid, "integration", false, false).await.unwrap();

        let key = admin.create_key(&uid).await.unwrap();
        assert_eq!(key.access_key.len(), 20);
        let user = admin.get_user(&uid).await.unwrap();
        assert!(user.keys.iter().any(|k| k.access_key == key.access_key));

        admin.remove_key(&uid, &key.access_key).await.unwrap();
        let user = admin.get_user(&uid).await.unwrap();
        assert!(user.keys.iter().all(|k| k.access_key != key.access_key));
    }

    #[tokio::test]
    #[ignore = "requires running RGW"]
    async fn test_should_relink_bucket() {
        let admin = admin_client();
        let s3 = s3_client();
        let target = unique_name("target");
        let bucket = unique_name("relink");
        admin.create_user(&target, "integration", false, true).await.unwrap();
        s3.make_bucket(&bucket).await.unwrap();

        let before = admin.get_bucket_owner_id(&bucket).await.unwrap().unwrap();
        admin.unlink_bucket(&before.owner, &bucket).await.unwrap();
        admin
            .link_bucket(&target, &bucket, &before.bucket_id)
            .await
            .unwrap();

        let after = admin.get_bucket_owner_id(&bucket).await.unwrap().unwrap();
        assert_eq!(after.owner, target);
        assert_eq!(after.bucket_id, before.bucket_id);
    }

    #[tokio::test]
    #[ignore = "requires running RGW"]
    async fn test_should_report_missing_bucket_metadata() {
        let admin = admin_client();
        let owner = admin
            .get_bucket_owner_id(&unique_name("missing"))
            .await
            .unwrap();
        assert!(owner.is_none());
    }
}
