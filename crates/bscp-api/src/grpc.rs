//! Generated gRPC types: the `Payload` envelope plus the unary `Request`
//! and bidirectional `BiRequestStream` services.

tonic::include_proto!("bscp");
