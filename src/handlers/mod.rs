/// Web API Handlers
///
/// This module contains the handlers for the connector's HTTP endpoints:
/// the workflow notification hook and the health check.

mod notify_handlers;
mod health_handlers;

// Re-export all handlers
pub use notify_handlers::*;
pub use health_handlers::*;
