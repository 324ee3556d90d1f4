// Connection-side services: sessions, signalling, auth and load reporting

pub mod auth;
pub mod load_report;
pub mod remote;
pub mod signalling;

pub use auth::{GrpcAuthContext, GrpcAuthService, TokenCache};
pub use load_report::{LoadReport, LoadReporter};
pub use remote::{SessionRegistry, context_interceptor};
#[cfg(feature = "redis")]
pub use signalling::RedisSignallingBus;
pub use signalling::{ChannelSignallingBus, SignallingBus, SignallingHandler};
