//! Server startup: logging, gRPC transport and shutdown handling.

pub mod grpc;
pub mod logging;
pub mod shutdown;

pub use grpc::serve;
pub use logging::init_logging;
pub use shutdown::{ShutdownSignal, wait_for_shutdown_signal};
