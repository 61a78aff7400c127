// Relais Core - Invocation lifecycle & ports
// NO filesystem or process adapters here (hexagonal architecture)

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use application::{InvokerPorts, ProcessInvoker};
pub use error::{InvokeError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
