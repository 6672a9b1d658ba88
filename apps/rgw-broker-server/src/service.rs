//! Broker HTTP service implementing the hyper `Service` trait.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::BodyExt;
use hyper::body::{Body, Incoming};
use rgw_broker_core::{
    BindRequest, BindingCredentials, CreateInstanceRequest, InstanceParameters, OperationState,
    TenantLifecycleManager,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::response::{
    ApiError, BrokerResponse, empty_response, error_to_response, json_response,
};
use crate::router::{Operation, resolve_operation};

/// Server version reported by the health endpoint.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Hyper `Service` routing broker API requests to a
/// [`TenantLifecycleManager`].
#[derive(Debug, Clone)]
pub struct BrokerHttpService {
    manager: Arc<TenantLifecycleManager>,
}

impl BrokerHttpService {
    /// Create a service over `manager`.
    pub fn new(manager: Arc<TenantLifecycleManager>) -> Self {
        Self { manager }
    }
}

impl hyper::service::Service<http::Request<Incoming>> for BrokerHttpService {
    type Response = BrokerResponse;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let manager = Arc::clone(&self.manager);
        let request_id = uuid::Uuid::new_v4().to_string();

        Box::pin(async move {
            let response = process_request(req, &manager).await;
            Ok(add_common_headers(response, &request_id))
        })
    }
}

/// Provision request body. Only the fields the broker uses are read.
#[derive(Debug, Default, Deserialize)]
struct ProvisionBody {
    #[serde(default, alias = "context_profile")]
    context: Option<ProvisionContext>,
    #[serde(default)]
    parameters: Option<InstanceParameters>,
}

#[derive(Debug, Default, Deserialize)]
struct ProvisionContext {
    #[serde(default)]
    namespace: Option<String>,
}

/// Bind request body.
#[derive(Debug, Default, Deserialize)]
struct BindBody {
    #[serde(default)]
    app_guid: Option<String>,
    #[serde(default)]
    bind_resource: Option<BindResource>,
}

#[derive(Debug, Default, Deserialize)]
struct BindResource {
    #[serde(default)]
    app_guid: Option<String>,
}

#[derive(Serialize)]
struct CredentialsBody<'a> {
    credentials: &'a BindingCredentials,
}

#[derive(Serialize)]
struct LastOperationBody {
    state: OperationState,
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    version: &'static str,
}

/// Route, execute, and render a single request.
pub async fn process_request<B>(
    req: http::Request<B>,
    manager: &TenantLifecycleManager,
) -> BrokerResponse
where
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
{
    let (parts, body) = req.into_parts();
    let op = match resolve_operation(&parts.method, parts.uri.path()) {
        Ok(op) => op,
        Err(err) => {
            debug!(method = %parts.method, path = parts.uri.path(), "no route");
            return error_to_response(&ApiError::Route(err));
        }
    };

    let name = op.name();
    match dispatch(op, body, manager).await {
        Ok(response) => {
            debug!(operation = name, status = %response.status(), "request handled");
            response
        }
        Err(err) => {
            let status = err.status();
            if status.is_server_error() {
                warn!(operation = name, status = %status, error = %err.description(), "request failed");
            } else {
                info!(operation = name, status = %status, error = %err.description(), "request rejected");
            }
            error_to_response(&err)
        }
    }
}

async fn dispatch<B>(
    op: Operation,
    body: B,
    manager: &TenantLifecycleManager,
) -> Result<BrokerResponse, ApiError>
where
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
{
    match op {
        Operation::Health => Ok(json_response(
            StatusCode::OK,
            &HealthBody {
                status: "ok",
                version: VERSION,
            },
        )),
        Operation::Catalog => Ok(json_response(StatusCode::OK, manager.catalog())),
        Operation::CreateInstance { instance_id } => {
            let body: ProvisionBody = parse_body(body).await?;
            let request = CreateInstanceRequest {
                namespace: body.context.and_then(|c| c.namespace).unwrap_or_default(),
                parameters: body.parameters.unwrap_or_default(),
            };
            manager
                .create_service_instance(&instance_id, request)
                .await?;
            Ok(empty_response(StatusCode::CREATED))
        }
        Operation::RemoveInstance { instance_id } => {
            manager.remove_service_instance(&instance_id).await?;
            Ok(empty_response(StatusCode::OK))
        }
        Operation::LastOperation { instance_id } => {
            let state = manager.last_operation(&instance_id).await?;
            Ok(json_response(StatusCode::OK, &LastOperationBody { state }))
        }
        Operation::Bind {
            instance_id,
            binding_id,
        } => {
            let body: BindBody = parse_body(body).await?;
            let request = BindRequest {
                app_guid: body
                    .bind_resource
                    .and_then(|r| r.app_guid)
                    .or(body.app_guid),
            };
            let outcome = manager.bind(&instance_id, &binding_id, request).await?;
            let status = if outcome.created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            Ok(json_response(
                status,
                &CredentialsBody {
                    credentials: &outcome.binding.credentials,
                },
            ))
        }
        Operation::FetchBinding {
            instance_id,
            binding_id,
        } => {
            let binding = manager.fetch_binding(&instance_id, &binding_id).await?;
            Ok(json_response(
                StatusCode::OK,
                &CredentialsBody {
                    credentials: &binding.credentials,
                },
            ))
        }
        Operation::Unbind {
            instance_id,
            binding_id,
        } => {
            manager.unbind(&instance_id, &binding_id).await?;
            Ok(empty_response(StatusCode::OK))
        }
    }
}

/// Read a JSON body. An empty body yields the default value.
async fn parse_body<T, B>(body: B) -> Result<T, ApiError>
where
    T: DeserializeOwned + Default,
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
{
    let bytes = body
        .collect()
        .await
        .map(http_body_util::Collected::to_bytes)
        .map_err(|e| ApiError::BadRequest(format!("failed to read request body: {e}")))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::BadRequest(format!("malformed request body: {e}")))
}

fn add_common_headers(mut response: BrokerResponse, request_id: &str) -> BrokerResponse {
    let headers = response.headers_mut();
    if let Ok(hv) = http::HeaderValue::from_str(request_id) {
        headers.entry("x-request-id").or_insert(hv);
    }
    headers.insert("server", http::HeaderValue::from_static("rgw-broker"));
    response
}
