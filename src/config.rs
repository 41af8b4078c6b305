// Application configuration, loaded from environment variables and CLI flags.

use crate::api::DEFAULT_MAX_CANVAS_SESSIONS;
use crate::history::DEFAULT_HISTORY_CAP;
use crate::ledger::DEFAULT_WELCOME_BALANCE;

/// Application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Database URL (SQLite connection string).
    pub database_url: String,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Points granted when the ledger is created.
    pub welcome_balance: i64,
    /// Undo/redo depth per canvas session.
    pub history_cap: usize,
    /// Live canvas sessions kept in memory.
    pub max_canvas_sessions: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: "sqlite:arena-ledger.db?mode=rwc".to_string(),
            port: 3000,
            welcome_balance: DEFAULT_WELCOME_BALANCE,
            history_cap: DEFAULT_HISTORY_CAP,
            max_canvas_sessions: DEFAULT_MAX_CANVAS_SESSIONS,
        }
    }
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `DATABASE_URL` - SQLite connection string (default: `sqlite:arena-ledger.db?mode=rwc`)
    /// - `PORT` - HTTP server port (default: 3000)
    /// - `WELCOME_BALANCE` - First-run balance (default: 2500)
    /// - `HISTORY_CAP` - Undo steps kept per canvas (default: 20)
    /// - `MAX_CANVAS_SESSIONS` - Live canvas sessions before eviction (default: 8)
    ///
    /// CLI flags:
    /// - `--port <PORT>` - Override the port
    /// - `--database-url <URL>` - Override the database URL
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |name| std::env::var(name).ok())
    }

    /// Build a config from explicit arguments and an environment lookup.
    pub fn from_sources(args: &[String], env: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();

        // CLI flag takes precedence, then env var, then default
        let database_url = Self::parse_cli_value(args, "--database-url")
            .or_else(|| env("DATABASE_URL"))
            .unwrap_or(defaults.database_url);

        let port = Self::parse_cli_value(args, "--port")
            .and_then(|v| v.parse().ok())
            .or_else(|| env("PORT").and_then(|v| v.parse().ok()))
            .unwrap_or(defaults.port);

        let welcome_balance = env("WELCOME_BALANCE")
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v >= 0)
            .unwrap_or(defaults.welcome_balance);

        let history_cap = env("HISTORY_CAP")
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.history_cap);

        let max_canvas_sessions = env("MAX_CANVAS_SESSIONS")
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.max_canvas_sessions);

        Config {
            database_url,
            port,
            welcome_balance,
            history_cap,
            max_canvas_sessions,
        }
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}
