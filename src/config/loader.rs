use std::fs;
use std::path::{Path, PathBuf};

use super::AnalysisConfig;
use crate::errors::{Error, Result};

pub const CONFIG_FILE: &str = ".valuetrace.toml";

const MAX_TRAVERSAL_DEPTH: usize = 10;

/// Parse and validate configuration from a TOML string
pub fn parse_config(contents: &str) -> Result<AnalysisConfig> {
    let config = toml::from_str::<AnalysisConfig>(contents)
        .map_err(|e| Error::Configuration(format!("Failed to parse {}: {}", CONFIG_FILE, e)))?;
    if config.max_depth == 0 {
        return Err(Error::Configuration("max_depth must be at least 1".into()));
    }
    if config.disposable_interfaces.is_empty() {
        return Err(Error::Configuration(
            "disposable_interfaces must name at least one interface".into(),
        ));
    }
    Ok(config)
}

/// Load an explicitly named config file; failures are errors.
pub fn load_config_from(path: &Path) -> Result<AnalysisConfig> {
    let contents = fs::read_to_string(path)
        .map_err(|e| Error::file_system("Failed to read config file", path, e))?;
    let config = parse_config(&contents)?;
    log::debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Directory and its ancestors, nearest first, up to a depth limit
pub fn directory_ancestors(start: PathBuf, max_depth: usize) -> impl Iterator<Item = PathBuf> {
    std::iter::successors(Some(start), |dir| {
        let mut parent = dir.clone();
        if parent.pop() {
            Some(parent)
        } else {
            None
        }
    })
    .take(max_depth)
}

fn try_load_config_from_path(path: &Path) -> Option<Result<AnalysisConfig>> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            log::debug!("Loaded config from {}", path.display());
            Some(parse_config(&contents))
        }
        Err(e) => {
            // only log actual errors, not "file not found"
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to read config file {}: {}", path.display(), e);
            }
            None
        }
    }
}

/// Search `start` and up to ten ancestors for `.valuetrace.toml`.
///
/// A missing file means defaults; a file that exists but does not parse is
/// an error.
pub fn load_config(start: &Path) -> Result<AnalysisConfig> {
    directory_ancestors(start.to_path_buf(), MAX_TRAVERSAL_DEPTH)
        .map(|dir| dir.join(CONFIG_FILE))
        .find_map(|path| try_load_config_from_path(&path))
        .unwrap_or_else(|| {
            log::debug!(
                "No config found after checking {} directories. Using default config.",
                MAX_TRAVERSAL_DEPTH
            );
            Ok(AnalysisConfig::default())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn ancestors_stop_at_depth_limit() {
        let dirs: Vec<_> = directory_ancestors(PathBuf::from("/a/b/c/d"), 2).collect();
        assert_eq!(dirs, vec![PathBuf::from("/a/b/c/d"), PathBuf::from("/a/b/c")]);
    }

    #[test]
    fn finds_config_in_parent_directory() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("src/app");
        fs::create_dir_all(&nested).unwrap();
        fs::write(root.path().join(CONFIG_FILE), "max_depth = 12\n").unwrap();

        let config = load_config(&nested).unwrap();
        assert_eq!(config.max_depth, 12);
    }

    #[test]
    fn missing_config_gives_defaults() {
        let root = TempDir::new().unwrap();
        let config = load_config(root.path()).unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn invalid_config_is_a_configuration_error() {
        let root = TempDir::new().unwrap();
        let path = root.path().join(CONFIG_FILE);
        fs::write(&path, "max_depth = \"deep\"\n").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        fs::write(&path, "max_depth = 0\n").unwrap();
        assert!(matches!(load_config_from(&path), Err(Error::Configuration(_))));
    }
}
