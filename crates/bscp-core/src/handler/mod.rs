//! gRPC handler infrastructure
//!
//! The PayloadHandler trait, the handler registry, the unary and bi-stream
//! services, and the health handlers every server registers.

pub mod generic;
pub mod rpc;
