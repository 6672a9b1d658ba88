//! Response construction and error formatting.

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use rgw_broker_core::BrokerError;
use serde::Serialize;

use crate::router::RouteError;

/// Content type of every response.
pub const CONTENT_TYPE: &str = "application/json";

/// Response type produced by the service.
pub type BrokerResponse = http::Response<Full<Bytes>>;

/// Errors reported to API callers.
#[derive(Debug)]
pub enum ApiError {
    /// A lifecycle operation failed.
    Broker(BrokerError),
    /// The request body could not be read or parsed.
    BadRequest(String),
    /// No route matched.
    Route(RouteError),
}

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        Self::Broker(err)
    }
}

impl ApiError {
    /// HTTP status of the error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Broker(err) => broker_status(err),
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Route(RouteError::NotFound) => StatusCode::NOT_FOUND,
            Self::Route(RouteError::MethodNotAllowed) => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// Machine-readable error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Broker(err) => err.kind(),
            Self::BadRequest(_) => "BadRequest",
            Self::Route(RouteError::NotFound) => "NotFound",
            Self::Route(RouteError::MethodNotAllowed) => "MethodNotAllowed",
        }
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::Broker(err) => err.to_string(),
            Self::BadRequest(message) => message.clone(),
            Self::Route(RouteError::NotFound) => "no such resource".to_owned(),
            Self::Route(RouteError::MethodNotAllowed) => {
                "method not allowed for this resource".to_owned()
            }
        }
    }
}

fn broker_status(err: &BrokerError) -> StatusCode {
    match err {
        BrokerError::AlreadyExists { .. } | BrokerError::BucketUnavailable { .. } => {
            StatusCode::CONFLICT
        }
        BrokerError::InstanceNotFound { .. } | BrokerError::BindingNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        BrokerError::InvalidParameters(_) => StatusCode::BAD_REQUEST,
        BrokerError::InstancePending { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    description: String,
}

/// Serialize `value` as a JSON response with `status`.
#[must_use]
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> BrokerResponse {
    match serde_json::to_vec(value) {
        Ok(json) => build(status, json),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize response");
            build(
                StatusCode::INTERNAL_SERVER_ERROR,
                br#"{"error":"InternalError","description":"failed to serialize response"}"#
                    .to_vec(),
            )
        }
    }
}

/// `{}` with `status`.
#[must_use]
pub fn empty_response(status: StatusCode) -> BrokerResponse {
    build(status, b"{}".to_vec())
}

/// Convert an error into a JSON error response.
#[must_use]
pub fn error_to_response(error: &ApiError) -> BrokerResponse {
    json_response(
        error.status(),
        &ErrorBody {
            error: error.kind(),
            description: error.description(),
        },
    )
}

fn build(status: StatusCode, json: Vec<u8>) -> BrokerResponse {
    http::Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, CONTENT_TYPE)
        .body(Full::new(Bytes::from(json)))
        .expect("valid JSON response")
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    async fn body_json(resp: BrokerResponse) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_should_map_broker_errors_to_status() {
        let cases = [
            (
                BrokerError::AlreadyExists {
                    instance_id: "i1".to_owned(),
                },
                StatusCode::CONFLICT,
            ),
            (
                BrokerError::BucketUnavailable {
                    bucket: "b1".to_owned(),
                },
                StatusCode::CONFLICT,
            ),
            (
                BrokerError::InstanceNotFound {
                    instance_id: "i1".to_owned(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                BrokerError::InstancePending {
                    instance_id: "i1".to_owned(),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                BrokerError::InvalidParameters("bad".to_owned()),
                StatusCode::BAD_REQUEST,
            ),
            (
                BrokerError::Config("broken".to_owned()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[tokio::test]
    async fn test_should_format_error_body() {
        let err = ApiError::from(BrokerError::InstanceNotFound {
            instance_id: "i1".to_owned(),
        });
        let resp = error_to_response(&err);
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            resp.headers().get(http::header::CONTENT_TYPE).unwrap(),
            CONTENT_TYPE
        );
        let json = body_json(resp).await;
        assert_eq!(json["error"], "InstanceNotFound");
        assert_eq!(json["description"], "service instance i1 not found");
    }

    #[tokio::test]
    async fn test_should_report_route_errors() {
        let resp = error_to_response(&ApiError::Route(RouteError::MethodNotAllowed));
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body_json(resp).await["error"], "MethodNotAllowed");
    }

    #[tokio::test]
    async fn test_should_build_empty_object() {
        let resp = empty_response(StatusCode::CREATED);
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(body_json(resp).await, serde_json::json!({}));
    }
}
