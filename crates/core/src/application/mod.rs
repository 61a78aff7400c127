// Application Layer - Invocation lifecycle

pub mod constants;
pub mod invoker;

// Re-exports
pub use invoker::{InvokerPorts, ProcessInvoker};
