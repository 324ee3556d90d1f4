//! Remote API models for BSCP RPC communication
//!
//! Every RPC is carried inside a [`Payload`] whose `metadata.type` names the
//! JSON body. This module defines the base request/response envelopes, the
//! session setup frame and the server push frame.

use std::collections::HashMap;

use bscp_common::{BscpError, ErrorKind};
use prost_types::Any;
use serde::{Deserialize, Serialize};

use crate::{
    grpc::{Metadata, Payload},
    model::Signalling,
};

/// Header carrying the bearer token checked by the auth service.
pub const ACCESS_TOKEN_HEADER: &str = "accessToken";

/// Header carrying the operator recorded in audit columns.
pub const OPERATOR_HEADER: &str = "operator";

/// Base trait for all request models
pub trait RequestTrait {
    fn headers(&self) -> HashMap<String, String>;

    fn request_type(&self) -> &'static str {
        ""
    }

    fn body(&self) -> Vec<u8>
    where
        Self: Serialize,
    {
        serde_json::to_vec(self).unwrap_or_default()
    }

    fn insert_headers(&mut self, headers: HashMap<String, String>);

    fn request_id(&self) -> String {
        String::default()
    }

    /// Decode a request body, rejecting frames whose JSON does not fit `T`.
    fn from_payload<T>(value: &Payload) -> Result<T, BscpError>
    where
        T: for<'a> Deserialize<'a>,
    {
        let body = value
            .body
            .as_ref()
            .map(|b| b.value.as_slice())
            .filter(|b| !b.is_empty())
            .unwrap_or(b"{}".as_slice());
        serde_json::from_slice::<T>(body)
            .map_err(|e| BscpError::InvalidInput(format!("malformed request body: {}", e)))
    }

    fn to_payload(&self, client_ip: &str) -> Payload
    where
        Self: Serialize,
    {
        Payload {
            metadata: Some(Metadata {
                r#type: self.request_type().to_string(),
                client_ip: client_ip.to_string(),
                headers: self.headers(),
            }),
            body: Some(Any {
                type_url: String::default(),
                value: self.body(),
            }),
        }
    }
}

/// Base request structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(skip)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub request_id: String,
}

impl Request {
    pub fn new() -> Self {
        Self {
            headers: HashMap::new(),
            ..Default::default()
        }
    }

    pub fn operator(&self) -> &str {
        self.headers
            .get(OPERATOR_HEADER)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(bscp_common::SYSTEM_OPERATOR)
    }
}

impl RequestTrait for Request {
    fn headers(&self) -> HashMap<String, String> {
        self.headers.clone()
    }

    fn insert_headers(&mut self, headers: HashMap<String, String>) {
        if self.headers.is_empty() {
            self.headers = HashMap::with_capacity(headers.len());
        }
        for (k, v) in headers {
            self.headers.insert(k, v);
        }
    }

    fn request_id(&self) -> String {
        self.request_id.clone()
    }
}

/// Implements [`RequestTrait`] for a request that flattens a base
/// [`Request`] into a field named `request`.
#[macro_export]
macro_rules! impl_request {
    ($request:ty, $type_name:expr) => {
        impl $request {
            pub const REQUEST_TYPE: &'static str = $type_name;
        }

        impl $crate::remote::RequestTrait for $request {
            fn headers(&self) -> std::collections::HashMap<String, String> {
                self.request.headers.clone()
            }

            fn request_type(&self) -> &'static str {
                $type_name
            }

            fn insert_headers(&mut self, headers: std::collections::HashMap<String, String>) {
                $crate::remote::RequestTrait::insert_headers(&mut self.request, headers);
            }

            fn request_id(&self) -> String {
                self.request.request_id.clone()
            }
        }
    };
}

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Success = 200,
    Fail = 500,
}

impl ResponseCode {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn desc(&self) -> &'static str {
        match self {
            ResponseCode::Success => "Response ok",
            ResponseCode::Fail => "Response fail",
        }
    }
}

/// Base trait for all response models
pub trait ResponseTrait {
    fn response_type(&self) -> &'static str {
        ""
    }

    fn request_id(&mut self, request_id: String);

    fn body(&self) -> Vec<u8>
    where
        Self: Serialize,
    {
        serde_json::to_vec(self).unwrap_or_default()
    }

    fn error_code(&self) -> i32 {
        ResponseCode::Success.code()
    }

    fn result_code(&self) -> i32;

    fn message(&self) -> String {
        String::default()
    }

    fn response_mut(&mut self) -> &mut Response;

    /// Marks the response as failed with the error's kind, code and message.
    fn fail(&mut self, err: &BscpError) {
        let response = self.response_mut();
        response.result_code = ResponseCode::Fail.code();
        response.error_code = err.error_code().code;
        response.error_kind = Some(err.kind());
        response.success = false;
        response.message = err.to_string();
    }

    fn to_any(&self) -> Any
    where
        Self: Serialize,
    {
        Any {
            type_url: String::default(),
            value: self.body(),
        }
    }

    fn to_payload(&self, metadata: Option<Metadata>) -> Payload
    where
        Self: Serialize,
    {
        Payload {
            metadata,
            body: Some(self.to_any()),
        }
    }

    fn build_payload(&self) -> Payload
    where
        Self: Serialize,
    {
        self.to_payload(Some(Metadata {
            r#type: self.response_type().to_string(),
            ..Default::default()
        }))
    }
}

/// Base response structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub result_code: i32,
    pub error_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub success: bool,
    pub message: String,
    pub request_id: String,
}

impl Response {
    pub fn new() -> Self {
        Self {
            result_code: ResponseCode::Success.code(),
            success: true,
            ..Default::default()
        }
    }
}

impl ResponseTrait for Response {
    fn request_id(&mut self, request_id: String) {
        self.request_id = request_id
    }

    fn error_code(&self) -> i32 {
        self.error_code
    }

    fn result_code(&self) -> i32 {
        self.result_code
    }

    fn message(&self) -> String {
        self.message.clone()
    }

    fn response_mut(&mut self) -> &mut Response {
        self
    }
}

/// Implements [`ResponseTrait`] for a response that flattens a base
/// [`Response`] into a field named `response`, plus a `new()` constructor
/// and an `Any` conversion.
#[macro_export]
macro_rules! impl_response {
    ($response:ty, $type_name:expr) => {
        impl $response {
            pub const RESPONSE_TYPE: &'static str = $type_name;

            pub fn new() -> Self {
                Self {
                    response: $crate::remote::Response::new(),
                    ..Default::default()
                }
            }
        }

        impl $crate::remote::ResponseTrait for $response {
            fn response_type(&self) -> &'static str {
                $type_name
            }

            fn request_id(&mut self, request_id: String) {
                self.response.request_id = request_id;
            }

            fn error_code(&self) -> i32 {
                self.response.error_code
            }

            fn result_code(&self) -> i32 {
                self.response.result_code
            }

            fn message(&self) -> String {
                self.response.message.clone()
            }

            fn response_mut(&mut self) -> &mut $crate::remote::Response {
                &mut self.response
            }
        }

        impl From<$response> for $crate::prost_types::Any {
            fn from(val: $response) -> Self {
                $crate::remote::ResponseTrait::to_any(&val)
            }
        }
    };
}

/// Health check request
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckRequest {
    #[serde(flatten)]
    pub request: Request,
}

crate::impl_request!(HealthCheckRequest, "HealthCheckRequest");

/// Health check response
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResponse {
    #[serde(flatten)]
    pub response: Response,
}

crate::impl_response!(HealthCheckResponse, "HealthCheckResponse");

/// Server check request sent before the stream is opened
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCheckRequest {
    #[serde(flatten)]
    pub request: Request,
}

crate::impl_request!(ServerCheckRequest, "ServerCheckRequest");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCheckResponse {
    #[serde(flatten)]
    pub response: Response,
    pub connection_id: String,
}

crate::impl_response!(ServerCheckResponse, "ServerCheckResponse");

/// First frame on the signalling stream: carries the sidecar's identity and
/// moves its session from Connecting to Open.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignallingSetupRequest {
    #[serde(flatten)]
    pub request: Request,
    pub biz_id: i64,
    pub app_id: i64,
    #[serde(default)]
    pub cloud_id: i64,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub client_version: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

crate::impl_request!(SignallingSetupRequest, "SignallingSetupRequest");

/// Server push carrying one Publish, Reload or Rollback event.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignallingNotifyRequest {
    #[serde(flatten)]
    pub request: Request,
    pub signalling: Signalling,
}

crate::impl_request!(SignallingNotifyRequest, "SignallingNotifyRequest");

/// Sidecar acknowledgement of a push; accepted and ignored.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignallingNotifyResponse {
    #[serde(flatten)]
    pub response: Response,
}

crate::impl_response!(SignallingNotifyResponse, "SignallingNotifyResponse");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Publishing, SignallingType};

    #[test]
    fn test_health_check_request() {
        let req = HealthCheckRequest::default();
        assert_eq!(req.request_type(), "HealthCheckRequest");
        assert_eq!(HealthCheckRequest::REQUEST_TYPE, "HealthCheckRequest");
    }

    #[test]
    fn test_response_code() {
        assert_eq!(ResponseCode::Success.code(), 200);
        assert_eq!(ResponseCode::Fail.code(), 500);
    }

    #[test]
    fn test_fail_sets_kind_code_and_message() {
        let mut response = HealthCheckResponse::new();
        assert!(response.response.success);

        response.fail(&BscpError::not_found("release", 9));

        assert!(!response.response.success);
        assert_eq!(response.result_code(), ResponseCode::Fail.code());
        assert_eq!(
            response.error_code(),
            bscp_common::error::RESOURCE_NOT_FOUND.code
        );
        assert_eq!(response.response.error_kind, Some(ErrorKind::NotFound));
        assert_eq!(response.message(), "release 9 not found");
    }

    #[test]
    fn test_build_payload_carries_response_type() {
        let response = ServerCheckResponse {
            connection_id: "c1".to_string(),
            ..ServerCheckResponse::new()
        };
        let payload = response.build_payload();

        assert_eq!(
            payload.metadata.map(|m| m.r#type).unwrap_or_default(),
            "ServerCheckResponse"
        );
        let body: serde_json::Value =
            serde_json::from_slice(&payload.body.unwrap_or_default().value).unwrap();
        assert_eq!(body["connectionId"], "c1");
        assert_eq!(body["success"], true);
    }

    #[test]
    fn test_setup_request_from_payload() {
        let mut setup = SignallingSetupRequest {
            biz_id: 2,
            app_id: 5,
            ..Default::default()
        };
        setup.labels.insert("zone".to_string(), "gz".to_string());

        let payload = setup.to_payload("10.0.0.8");
        let decoded: SignallingSetupRequest =
            SignallingSetupRequest::from_payload(&payload).unwrap();

        assert_eq!(decoded.biz_id, 2);
        assert_eq!(decoded.app_id, 5);
        assert_eq!(decoded.labels.get("zone").map(String::as_str), Some("gz"));
        assert_eq!(
            payload.metadata.unwrap().client_ip,
            "10.0.0.8".to_string()
        );
    }

    #[test]
    fn test_malformed_body_is_invalid_input() {
        let payload = Payload {
            metadata: Some(Metadata {
                r#type: "SignallingSetupRequest".to_string(),
                ..Default::default()
            }),
            body: Some(Any {
                type_url: String::new(),
                value: b"{\"bizId\": \"two\"}".to_vec(),
            }),
        };

        let err = SignallingSetupRequest::from_payload::<SignallingSetupRequest>(&payload)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_notify_request_carries_type_discriminator() {
        let notify = SignallingNotifyRequest {
            signalling: Signalling {
                signalling_type: SignallingType::Rollback,
                publishing: Publishing {
                    biz_id: 1,
                    ..Default::default()
                },
            },
            ..Default::default()
        };

        let json: serde_json::Value = serde_json::from_slice(&notify.body()).unwrap();
        assert_eq!(json["signalling"]["type"], "Rollback");
    }

    #[test]
    fn test_operator_defaults_to_system() {
        let mut request = Request::new();
        assert_eq!(request.operator(), "system");

        request.insert_headers(HashMap::from([(
            OPERATOR_HEADER.to_string(),
            "alice".to_string(),
        )]));
        assert_eq!(request.operator(), "alice");
    }
}
