// gRPC handlers and their outbound clients
// Every handler answers with a response body; only malformed transport
// frames become a tonic Status.

use std::future::Future;

use serde::{Serialize, de::DeserializeOwned};

use bscp_api::{
    ValidateRequest,
    grpc::Payload,
    remote::{RequestTrait, ResponseTrait},
};
use bscp_common::BscpResult;

/// Implements `PayloadHandler` for a handler with an
/// `execute(&self, &Connection, Request) -> BscpResult<Response>` method.
///
/// # Usage
/// ```ignore
/// impl_payload_handler!(CreateCommitHandler, CreateCommitRequest, AuthRequirement::Write);
/// ```
macro_rules! impl_payload_handler {
    ($handler:ty, $request:ty, $auth:expr) => {
        #[tonic::async_trait]
        impl bscp_core::handler::rpc::PayloadHandler for $handler {
            async fn handle(
                &self,
                connection: &bscp_core::Connection,
                payload: &bscp_api::grpc::Payload,
            ) -> Result<bscp_api::grpc::Payload, tonic::Status> {
                Ok($crate::service::respond(payload, |request: $request| {
                    self.execute(connection, request)
                })
                .await)
            }

            fn can_handle(&self) -> &'static str {
                <$request>::REQUEST_TYPE
            }

            fn auth_requirement(&self) -> bscp_core::handler::rpc::AuthRequirement {
                $auth
            }
        }
    };
}

pub mod blob; // Blob store existence checks
pub mod commit_handler; // Commit and multi commit handlers
pub mod conn_handler; // Sidecar-facing handlers
pub mod release_handler; // Release, multi release, strategy and config item handlers
pub mod tunnel_handler; // Unary tunnel variants of publish, reload, rollback and pull

/// Decode and validate a request, attaching the frame's headers so the
/// operator recorded in audit columns is the authenticated one.
pub fn decode<T>(payload: &Payload) -> BscpResult<T>
where
    T: RequestTrait + ValidateRequest + DeserializeOwned,
{
    let mut request = T::from_payload::<T>(payload)?;
    if let Some(metadata) = payload.metadata.as_ref() {
        request.insert_headers(metadata.headers.clone());
    }
    request.validate()?;
    Ok(request)
}

/// Run `execute` on the decoded request and build the reply payload.
///
/// Failures, including undecodable bodies, are reported in the response's
/// result fields rather than as a transport error.
pub async fn respond<Req, Resp, Fut>(
    payload: &Payload,
    execute: impl FnOnce(Req) -> Fut,
) -> Payload
where
    Req: RequestTrait + ValidateRequest + DeserializeOwned,
    Resp: ResponseTrait + Serialize + Default,
    Fut: Future<Output = BscpResult<Resp>>,
{
    let (request_id, result) = match decode::<Req>(payload) {
        Ok(request) => (request.request_id(), execute(request).await),
        Err(e) => (String::new(), Err(e)),
    };

    let mut response = result.unwrap_or_else(|e| {
        let mut response = Resp::default();
        response.fail(&e);
        response
    });
    response.request_id(request_id);
    response.build_payload()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use bscp_api::{
        grpc::Metadata,
        prost_types::Any,
        release::{CancelCommitRequest, CancelCommitResponse},
        remote::OPERATOR_HEADER,
    };
    use bscp_common::BscpError;

    fn payload(body: &str, headers: &[(&str, &str)]) -> Payload {
        Payload {
            metadata: Some(Metadata {
                r#type: "CancelCommitRequest".to_string(),
                client_ip: "10.0.0.1".to_string(),
                headers: headers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<HashMap<_, _>>(),
            }),
            body: Some(Any {
                type_url: String::new(),
                value: body.as_bytes().to_vec(),
            }),
        }
    }

    fn reply_json(payload: &Payload) -> serde_json::Value {
        serde_json::from_slice(&payload.body.as_ref().unwrap().value).unwrap()
    }

    #[test]
    fn test_decode_attaches_operator() {
        let request: CancelCommitRequest = decode(&payload(
            r#"{"bizId":1,"commitId":2,"requestId":"r-1"}"#,
            &[(OPERATOR_HEADER, "alice")],
        ))
        .unwrap();

        assert_eq!(request.target.commit_id, 2);
        assert_eq!(request.request.operator(), "alice");
        assert_eq!(request.request_id(), "r-1");
    }

    #[test]
    fn test_decode_rejects_invalid_ids() {
        let err = decode::<CancelCommitRequest>(&payload(r#"{"bizId":0,"commitId":2}"#, &[]))
            .unwrap_err();
        assert!(matches!(err, BscpError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_respond_reports_failure_in_body() {
        let reply = respond(
            &payload(r#"{"bizId":1,"commitId":2,"requestId":"r-9"}"#, &[]),
            |request: CancelCommitRequest| async move {
                Err::<CancelCommitResponse, _>(BscpError::not_found(
                    "commit",
                    request.target.commit_id,
                ))
            },
        )
        .await;

        assert_eq!(reply.metadata.as_ref().unwrap().r#type, "CancelCommitResponse");
        let body = reply_json(&reply);
        assert_eq!(body["success"], false);
        assert_eq!(body["requestId"], "r-9");
        assert_eq!(body["errorKind"], "NotFound");
    }

    #[tokio::test]
    async fn test_respond_success() {
        let reply = respond(
            &payload(r#"{"bizId":1,"commitId":2}"#, &[]),
            |_: CancelCommitRequest| async { Ok(CancelCommitResponse::new()) },
        )
        .await;

        let body = reply_json(&reply);
        assert_eq!(body["success"], true);
        assert_eq!(body["resultCode"], 200);
    }

    #[tokio::test]
    async fn test_respond_malformed_body() {
        let reply = respond(
            &payload("not json", &[]),
            |_: CancelCommitRequest| async { Ok(CancelCommitResponse::new()) },
        )
        .await;

        let body = reply_json(&reply);
        assert_eq!(body["success"], false);
        assert_eq!(body["errorKind"], "InvalidInput");
    }
}
