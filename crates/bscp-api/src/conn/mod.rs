//! Sidecar-facing RPC models: access, report, pull and the tunnel variants.

pub mod model;

pub use model::*;
