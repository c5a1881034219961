use crate::decompress::Decompressor;
use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;

/// Settings from `Scanner.toml` and `MC_SCANNER_*` environment variables.
/// Command-line options take precedence over both.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub root_paths: Vec<String>,
    pub ignore_patterns: Vec<String>,
    /// Worker threads; 0 sizes the pool to the machine.
    pub threads: usize,
    pub decompressor: Decompressor,
    pub output: Option<String>,
    pub block_registry: Option<String>,
    pub stats_weights: Option<String>,
    /// Block box `dimension,x1,y1,z1,x2,y2,z2` searches are limited to.
    pub within: Option<String>,
}

pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    load_configuration_from("Scanner")
}

pub fn load_configuration_from(name: &str) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name(name).required(false))
        .add_source(
            Environment::with_prefix("MC_SCANNER")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("root_paths")
                .with_list_parse_key("ignore_patterns"),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

/// How many times a scan is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    Once,
    /// This many runs after the first.
    Repeat(u64),
    Forever,
}

impl LoopMode {
    /// Maps the `--loop` flag: absent, given without a count, or given a count.
    pub fn from_flag(flag: Option<Option<u64>>) -> Self {
        match flag {
            None => LoopMode::Once,
            Some(None) => LoopMode::Forever,
            Some(Some(n)) => LoopMode::Repeat(n),
        }
    }

    /// Whether another run follows once `completed` runs have finished.
    pub fn should_continue(&self, completed: u64) -> bool {
        match self {
            LoopMode::Once => false,
            LoopMode::Repeat(n) => completed <= *n,
            LoopMode::Forever => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loop_mode_run_counts() {
        let runs = |mode: LoopMode| 1 + (1..).take_while(|done| mode.should_continue(*done)).count();
        assert_eq!(runs(LoopMode::from_flag(None)), 1);
        assert_eq!(runs(LoopMode::from_flag(Some(Some(0)))), 1);
        assert_eq!(runs(LoopMode::from_flag(Some(Some(3)))), 4);
        assert!(LoopMode::from_flag(Some(None)).should_continue(u64::MAX));
    }

    #[test]
    fn reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Scanner.toml");
        fs::write(
            &file,
            "root_paths = [\"/srv/world\"]\nthreads = 4\ndecompressor = \"platform\"\n",
        )
        .unwrap();
        let name = dir.path().join("Scanner");
        let config = load_configuration_from(name.to_str().unwrap()).unwrap();
        assert_eq!(config.root_paths, vec!["/srv/world".to_string()]);
        assert_eq!(config.threads, 4);
        assert_eq!(config.decompressor, Decompressor::Platform);
        assert!(config.ignore_patterns.is_empty());
    }
}
