//! Runtime configuration (spec.md §6), loadable from a TOML file and
//! otherwise defaulted.

use serde::{Deserialize, Serialize};

use dtx_template::StylingEmit;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub debug: bool,
    pub max_merge_iterations: u32,
    pub styling_emit: StylingEmit,
    /// Delay between chunks in `render_batch`, in milliseconds.
    pub batch_delay_ms: u64,
    /// Number of documents rendered per chunk in `render_batch`.
    pub batch_chunk_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            max_merge_iterations: 20,
            styling_emit: StylingEmit::Flatten,
            batch_delay_ms: 0,
            batch_chunk_size: 8,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn from_file(path: &std::path::Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Initializes the ambient logging stack, gated on `debug` the way a
    /// CLI that only wants noisy diagnostics in development does.
    pub fn init_tracing(&self) {
        if !self.debug {
            return;
        }
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert!(!cfg.debug);
        assert_eq!(cfg.max_merge_iterations, 20);
        assert_eq!(cfg.styling_emit, StylingEmit::Flatten);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg = Config::from_toml_str("debug = true\n").unwrap();
        assert!(cfg.debug);
        assert_eq!(cfg.max_merge_iterations, 20);
    }
}
