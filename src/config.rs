//! Startup configuration
//!
//! Sources, highest precedence first: command-line flags, process
//! environment, `.env` file, defaults. Malformed environment values fall
//! back to the defaults instead of failing startup.

use clap::Parser;
use tracing::debug;

use crate::server::DisconnectPolicy;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_CONNECTIONS: usize = 50;

/// Command-line overrides
#[derive(Parser, Debug, Default, Clone)]
#[command(version, about = "Real-time group chat over WebSocket", long_about = None)]
pub struct Args {
    /// Host address to bind or connect to [env: HOST]
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Port number [env: PORT]
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Maximum concurrent chat streams [env: MAX_CONNECTIONS]
    #[arg(short = 'm', long)]
    pub max_connections: Option<usize>,

    /// Do not announce streams that drop without leaving [env: ANNOUNCE_DISCONNECTS=false]
    #[arg(long)]
    pub silent_disconnects: bool,
}

/// Resolved configuration, immutable for the process lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_connections: usize,
    pub announce_disconnects: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            announce_disconnects: true,
        }
    }
}

impl Config {
    /// Load `.env`, read the environment, then apply `args`
    pub fn load(args: &Args) -> Self {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file loaded: {}", e);
        }
        Self::from_lookup(|key| std::env::var(key).ok()).with_args(args)
    }

    /// Build from a key lookup (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("HOST")
            .filter(|h| !h.trim().is_empty())
            .unwrap_or(defaults.host);

        let port = lookup("PORT")
            .and_then(|p| p.trim().parse::<u16>().ok())
            .filter(|&p| p > 0)
            .unwrap_or(defaults.port);

        let max_connections = lookup("MAX_CONNECTIONS")
            .and_then(|m| m.trim().parse::<usize>().ok())
            .filter(|&m| m > 0)
            .unwrap_or(defaults.max_connections);

        let announce_disconnects = lookup("ANNOUNCE_DISCONNECTS")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(defaults.announce_disconnects);

        Self {
            host,
            port,
            max_connections,
            announce_disconnects,
        }
    }

    /// Apply command-line overrides
    pub fn with_args(mut self, args: &Args) -> Self {
        if let Some(host) = args.host.as_ref().filter(|h| !h.trim().is_empty()) {
            self.host = host.clone();
        }
        if let Some(port) = args.port.filter(|&p| p > 0) {
            self.port = port;
        }
        if let Some(max) = args.max_connections.filter(|&m| m > 0) {
            self.max_connections = max;
        }
        if args.silent_disconnects {
            self.announce_disconnects = false;
        }
        self
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn disconnect_policy(&self) -> DisconnectPolicy {
        if self.announce_disconnects {
            DisconnectPolicy::Announce
        } else {
            DisconnectPolicy::Silent
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
