//! End-to-end tenant lifecycle tests.

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use rgw_broker_auth::Credentials;
    use rgw_broker_client::{AdminApi, Endpoint, ObjectApi, S3Client, SignedTransport};
    use rgw_broker_core::{
        BindRequest, BrokerError, CreateInstanceRequest, InstanceParameters, OperationState,
        RemoveOutcome,
    };

    use crate::{admin_client, config, manager, unique_name};

    fn tenant_client(access_key: &str, secret_key: &str) -> S3Client {
        let config = config();
        let endpoint = Endpoint::parse(&config.endpoint).unwrap();
        let transport =
            SignedTransport::new(endpoint, config.region.clone(), config.request_timeout())
                .unwrap();
        S3Client::new(transport, Credentials::new(access_key, secret_key))
    }

    fn request(bucket: &str) -> CreateInstanceRequest {
        CreateInstanceRequest {
            namespace: "integration".to_owned(),
            parameters: InstanceParameters {
                bucket_name: Some(bucket.to_owned()),
            },
        }
    }

    #[tokio::test]
    #[ignore = "requires running RGW"]
    async fn test_should_run_full_tenant_lifecycle() {
        let manager = manager().await;
        let admin = admin_client();
        let instance_id = unique_name("i");
        let bucket = unique_name("b");

        let instance = manager
            .create_service_instance(&instance_id, request(&bucket))
            .await
            .unwrap();
        assert_eq!(
            manager.last_operation(&instance_id).await.unwrap(),
            OperationState::Succeeded
        );
        let owner = admin.get_bucket_owner_id(&bucket).await.unwrap().unwrap();
        assert_eq!(owner.owner, instance.user_name);

        let bound = manager
            .bind(&instance_id, "bind1", BindRequest::default())
            .await
            .unwrap();
        assert!(bound.created);
        let creds = &bound.binding.credentials;
        let tenant = tenant_client(&creds.access_key, &creds.secret_key);
        tenant
            .put_object(&bucket, "hello", Bytes::from_static(b"world"))
            .await
            .unwrap();

        let again = manager
            .bind(&instance_id, "bind1", BindRequest::default())
            .await
            .unwrap();
        assert!(!again.created);
        assert_eq!(again.binding, bound.binding);

        manager.unbind(&instance_id, "bind1").await.unwrap();
        manager.unbind(&instance_id, "bind1").await.unwrap();
        let user = admin.get_user(&instance.user_name).await.unwrap();
        assert!(user.keys.iter().all(|k| k.access_key != creds.access_key));

        let removed = manager.remove_service_instance(&instance_id).await.unwrap();
        assert!(matches!(removed, RemoveOutcome::Removed { .. }));
        let owner = admin.get_bucket_owner_id(&bucket).await.unwrap().unwrap();
        assert_eq!(owner.owner, manager.settings().gc_user);
        assert!(admin.get_user(&instance.user_name).await.unwrap().suspended);

        let again = manager.remove_service_instance(&instance_id).await.unwrap();
        assert_eq!(again, RemoveOutcome::Absent);
    }

    #[tokio::test]
    #[ignore = "requires running RGW"]
    async fn test_should_reject_duplicate_instance() {
        let manager = manager().await;
        let instance_id = unique_name("dup");
        manager
            .create_service_instance(&instance_id, request(&unique_name("b")))
            .await
            .unwrap();

        let err = manager
            .create_service_instance(&instance_id, request(&unique_name("b")))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::AlreadyExists { .. }));

        manager.remove_service_instance(&instance_id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running RGW"]
    async fn test_should_refuse_foreign_bucket() {
        let manager = manager().await;
        let admin = admin_client();
        let other = unique_name("other");
        let bucket = unique_name("taken");
        let user = admin.create_user(&other, "integration", true, true).await.unwrap();
        let key = &user.keys[0];
        tenant_client(&key.access_key, &key.secret_key)
            .make_bucket(&bucket)
            .await
            .unwrap();

        let err = manager
            .create_service_instance(&unique_name("i"), request(&bucket))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::BucketUnavailable { .. }));
    }
}
