//! The `cali` command-line interface: argument parsing, configuration,
//! credential setup, and calendar commands run either in-process or through
//! the daemon socket.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod secret;
pub mod socket;

pub use cli::Cli;
pub use commands::{Context, execute};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use socket::SocketClient;
