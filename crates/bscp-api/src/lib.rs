//! BSCP API - gRPC wire types and request/response models
//!
//! This crate provides:
//! - The `Payload` envelope and the unary/bi-stream gRPC services (generated from proto)
//! - Request/response models for every RPC, keyed by their `metadata.type` name
//! - Signalling envelopes shared with the pub/sub bus
//! - Input validation utilities

pub mod conn;
pub mod grpc;
pub mod model;
pub mod release;
pub mod remote;
pub mod validation;

pub use prost_types;

// Re-export commonly used types
pub use model::*;
pub use validation::{ValidateRequest, check};
