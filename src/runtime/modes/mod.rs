//! Mode routing
//!
//! - Server mode (HTTP server, default)
//! - Sweep (one maintenance pass)
//! - Config generation

pub mod cli;
pub mod server;

pub use cli::{run_config_gen, run_sweep};
pub use server::run_server;
