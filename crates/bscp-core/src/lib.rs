//! BSCP Core - Sessions, signalling and gRPC plumbing
//!
//! This crate provides:
//! - The per-server session registry of open signalling streams
//! - The signalling bus (in-process, or Redis with the `redis` feature)
//! - Request authentication with an injected token cache
//! - The PayloadHandler registry behind the unary and bi-stream services
//! - Periodic load reporting

pub mod handler;
pub mod model;
pub mod service;

// Re-export commonly used types
pub use model::{Connection, ConnectionMeta, Session, SessionReport, SessionSnapshot, SessionState};
pub use service::{
    ChannelSignallingBus, GrpcAuthContext, GrpcAuthService, LoadReporter, SessionRegistry,
    SignallingBus, SignallingHandler, TokenCache, context_interceptor,
};
