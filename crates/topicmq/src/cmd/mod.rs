use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod keygen;
pub mod publish;
pub mod subscribe;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bind a port and publish messages.
    Publish(PublishArgs),
    /// Connect to a publisher and print received messages.
    Subscribe(SubscribeArgs),
    /// Generate a CURVE key pair.
    Keygen(KeygenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Publish(args) => publish::run(args, format),
        Command::Subscribe(args) => subscribe::run(args, format),
        Command::Keygen(args) => keygen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Content type of published payloads.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum PayloadKind {
    Structured,
    Raw,
}

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// TCP port to bind.
    #[arg(long, short = 'p', env = "TOPICMQ_PORT", default_value = "5562")]
    pub port: u16,
    /// Topics to publish to (comma-separated). Default: no topic.
    #[arg(long, short = 't', value_delimiter = ',')]
    pub topic: Vec<String>,
    /// Content type written in the header.
    #[arg(long, value_enum, default_value = "raw")]
    pub content_type: PayloadKind,
    /// JSON payload.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub json: Option<String>,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["json", "data"])]
    pub file: Option<PathBuf>,
    /// Number of times to publish.
    #[arg(long, default_value = "1")]
    pub count: usize,
    /// Delay between publishes (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s")]
    pub interval: String,
    /// Delay after binding, giving subscribers time to connect.
    #[arg(long, default_value = "500ms")]
    pub warmup: String,
    /// CURVE server secret key (Z85). Enables encryption.
    #[arg(long, env = "TOPICMQ_SERVER_SECRET_KEY", hide_env_values = true)]
    pub server_secret_key: Option<String>,
}

#[derive(Args, Debug)]
pub struct SubscribeArgs {
    /// Publisher address.
    #[arg(long, env = "TOPICMQ_IP", default_value = "127.0.0.1")]
    pub ip: String,
    /// Publisher port.
    #[arg(long, short = 'p', env = "TOPICMQ_PORT", default_value = "5562")]
    pub port: u16,
    /// Topic prefixes to subscribe to (comma-separated). Default: everything.
    #[arg(long, short = 't', value_delimiter = ',')]
    pub topic: Vec<String>,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Publisher's CURVE public key (Z85).
    #[arg(long, env = "TOPICMQ_SERVER_PUBLIC_KEY")]
    pub server_public_key: Option<String>,
    /// This subscriber's CURVE secret key (Z85).
    #[arg(
        long,
        env = "TOPICMQ_CLIENT_SECRET_KEY",
        hide_env_values = true,
        requires = "client_public_key"
    )]
    pub client_secret_key: Option<String>,
    /// This subscriber's CURVE public key (Z85).
    #[arg(long, env = "TOPICMQ_CLIENT_PUBLIC_KEY", requires = "client_secret_key")]
    pub client_public_key: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct KeygenArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `2s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<std::time::Duration> {
    use crate::exit::{CliError, USAGE};
    use std::time::Duration;

    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
