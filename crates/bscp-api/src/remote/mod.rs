//! Request/response envelopes shared by every RPC carried over `Payload`.

pub mod model;

pub use model::*;
