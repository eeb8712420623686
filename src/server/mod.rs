//! HTTP ingress: route handlers, shared state, identity extraction, and
//! the error-to-response mapping. This is glue around the routing
//! pipeline in `core`; the contracts are described at the boundary only.

pub mod builder;
pub mod errors;
pub mod identity;
pub mod routes;
pub mod state;

pub use builder::{run_server, run_server_with_config, StartupOverrides};
pub use state::AppState;
