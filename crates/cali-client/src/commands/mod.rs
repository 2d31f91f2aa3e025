//! Command implementations.

pub mod auth;
pub mod calendar;
pub mod config;
pub mod daemon;
pub mod server;

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use cali_core::OutputFormat;

use crate::cli::{AuthAction, Cli, Command, ConfigAction};
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::socket::SocketClient;

/// Settings every command runs with: the loaded config plus global flags.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: ClientConfig,
    pub config_path: PathBuf,
    pub format: OutputFormat,
    pub socket_path: PathBuf,
    pub timeout: Duration,
    pub use_daemon: bool,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> ClientResult<Self> {
        let config = ClientConfig::load(cli.config.as_deref())?;
        Ok(Self::new(cli, config))
    }

    pub fn new(cli: &Cli, config: ClientConfig) -> Self {
        Self {
            config_path: cli.config.clone().unwrap_or_else(ClientConfig::default_path),
            format: config.output_format(cli.format),
            socket_path: config.socket_path(cli.socket_path.as_deref()),
            timeout: Duration::from_secs(cli.timeout.max(1)),
            use_daemon: cli.daemon,
            config,
        }
    }

    pub fn socket_client(&self) -> SocketClient {
        SocketClient::new(&self.socket_path, self.timeout)
    }

    /// `calendar_id` from the config file, used when `--calendar` is absent.
    pub fn default_calendar(&self) -> Option<&str> {
        self.config.calendar_id.as_deref()
    }
}

/// Runs one parsed command line, writing results to `out`.
pub async fn execute(cli: Cli, out: &mut impl Write) -> ClientResult<()> {
    if let Command::Config {
        action: ConfigAction::Path,
    } = cli.command
    {
        let path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);
        return config::path(&path, out);
    }

    let ctx = Context::from_cli(&cli)?;
    match cli.command {
        Command::Add(_)
        | Command::Update(_)
        | Command::Get(_)
        | Command::Delete(_)
        | Command::List(_) => calendar::run(&ctx, cli.command, out).await,
        Command::Auth { action } => match action {
            AuthAction::Google {
                client_id,
                client_secret,
                credentials_file,
                force,
            } => {
                auth::google(&ctx, client_id, client_secret, credentials_file, force, out).await
            }
            AuthAction::ServiceAccount { key_file } => auth::service_account(&ctx, &key_file, out),
            AuthAction::Status => auth::status(&ctx, out),
        },
        Command::Config { action } => match action {
            ConfigAction::Dump => config::dump(&ctx, out),
            ConfigAction::Validate => config::validate(&ctx, out),
            ConfigAction::Path => config::path(&ctx.config_path, out),
        },
        Command::Server => server::run(&ctx).await,
        Command::Status => daemon::status(&ctx, out).await,
        Command::Ping => daemon::ping(&ctx, out).await,
    }
}
