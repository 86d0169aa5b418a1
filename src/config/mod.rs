//! Analysis configuration, read from `.valuetrace.toml`.

mod loader;

pub use loader::{directory_ancestors, load_config, load_config_from, parse_config, CONFIG_FILE};

use serde::{Deserialize, Serialize};

/// Root configuration structure for valuetrace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Members (`Namespace.Type.Member`) whose value is always a new
    /// instance the caller owns
    #[serde(default)]
    pub known_created: Vec<String>,

    /// Members whose value is always owned by someone else
    #[serde(default)]
    pub known_not_owned: Vec<String>,

    /// Capability interfaces whose implementers are tracked
    #[serde(default = "default_disposable_interfaces")]
    pub disposable_interfaces: Vec<String>,

    /// Recursion depth at which a branch gives up with `Unknown`
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Follow one level of same-type helper calls made from `Dispose`
    #[serde(default = "default_follow_dispose_helpers")]
    pub follow_dispose_helpers: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            known_created: Vec::new(),
            known_not_owned: Vec::new(),
            disposable_interfaces: default_disposable_interfaces(),
            max_depth: default_max_depth(),
            follow_dispose_helpers: default_follow_dispose_helpers(),
        }
    }
}

fn default_disposable_interfaces() -> Vec<String> {
    vec![
        "System.IDisposable".to_string(),
        "System.IAsyncDisposable".to_string(),
    ]
}

fn default_max_depth() -> usize {
    64
}

fn default_follow_dispose_helpers() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_gives_defaults() {
        let config: AnalysisConfig = toml::from_str("").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.max_depth, 64);
        assert!(config.follow_dispose_helpers);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let config: AnalysisConfig = toml::from_str(
            r#"
known_created = ["App.Factory.Open"]
max_depth = 8
"#,
        )
        .unwrap();
        assert_eq!(config.known_created, vec!["App.Factory.Open".to_string()]);
        assert_eq!(config.max_depth, 8);
        assert_eq!(config.disposable_interfaces.len(), 2);
    }
}
