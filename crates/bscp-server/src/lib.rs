// Main library module for the BSCP configuration release server
// Wires the release stores, the session registry and the signalling bus
// behind the gRPC and HTTP admin servers.

// Module declarations
pub mod metrics; // Prometheus recorder and metric descriptions
pub mod model; // Configuration and shared state
pub mod service; // gRPC handlers and outbound clients
pub mod startup; // Application startup utilities

pub use model::{AppState, Configuration};
