//! Bitfinex streaming client - main library
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (CLI, runner, shutdown)
//! - **bitfinex**: Session core (re-exported from workspace)
//! - **hypersockets**: WebSocket transport (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust
//! use bitfinex_stream::bin_common::{load_config_from_env, ConfigType};
//! use bitfinex_stream::bitfinex::BitfinexSession;
//! ```

// Re-export workspace libraries for convenience
pub use bitfinex;
pub use hypersockets;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod runner;
    pub mod shutdown;

    pub use cli::{load_config_from_env, parse_args, ConfigType};
    pub use runner::{BinaryRunner, RunConfig};
    pub use shutdown::ShutdownManager;
}
