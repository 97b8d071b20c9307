//! Runtime configuration and logging setup.
//!
//! Variables:
//! - `PHOTOPROOF_KEYS_DIR` (default: `./photoproof-keys`)
//! - `PHOTOPROOF_LOG_JSON` (default: `false`)
//! - `PHOTOPROOF_WORKERS` (default: available parallelism)
//! - `RUST_LOG` (default: `photoproof=info`)

#![forbid(unsafe_code)]

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use crate::keys::{IDENTITY_FILE, PK_FILE, VK_FILE};

pub const DEFAULT_KEYS_DIR: &str = "./photoproof-keys";
pub const DEFAULT_LOG_FILTER: &str = "photoproof=info";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub keys_dir: PathBuf,
    pub log_json: bool,
    pub workers: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let workers = get("PHOTOPROOF_WORKERS")
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1));
        Self {
            keys_dir: get("PHOTOPROOF_KEYS_DIR").map(PathBuf::from).unwrap_or_else(|| DEFAULT_KEYS_DIR.into()),
            log_json: get("PHOTOPROOF_LOG_JSON").map(|s| parse_bool(&s)).unwrap_or(false),
            workers,
        }
    }

    pub fn proving_key_path(&self) -> PathBuf {
        self.keys_dir.join(PK_FILE)
    }

    pub fn verifying_key_path(&self) -> PathBuf {
        self.keys_dir.join(VK_FILE)
    }

    pub fn identity_path(&self) -> PathBuf {
        self.keys_dir.join(IDENTITY_FILE)
    }
}

pub fn parse_bool(s: &str) -> bool {
    matches!(s, "1" | "true" | "True" | "TRUE" | "yes" | "y")
}

/// Install the global tracing subscriber. A second call is a no-op.
pub fn init_tracing(cfg: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    let _ = if cfg.log_json { builder.json().try_init() } else { builder.compact().try_init() };
}
