// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Land Annotation Developers. All Rights Reserved.

//! Layered runtime settings.
//!
//! Sources, lowest priority first:
//!
//! 1. Built-in defaults (platform data directory, index key `state`)
//! 2. A TOML file, `config.toml` in the platform config directory unless a
//!    path is given explicitly
//! 3. `LAND_ANNOTATION_*` environment variables, e.g.
//!    `LAND_ANNOTATION_DATA_DIR=/srv/annotations`

use crate::{Error, persistence::INDEX_KEY};
use config::{Config, Environment, File, FileFormat};
use directories::ProjectDirs;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "LAND_ANNOTATION";
const CONFIG_FILE: &str = "config.toml";
const FALLBACK_DATA_DIR: &str = "land-annotation";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "LandAnnotation", "land-annotation")
}

/// Platform data directory, e.g. `~/.local/share/land-annotation` on Linux.
pub fn default_data_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

/// Platform location of the optional settings file.
pub fn default_config_file() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory of the file blob store.
    pub data_dir: PathBuf,
    /// Key the record index is stored under.
    pub index_key: String,
}

impl Settings {
    /// Load settings from defaults, the settings file and the process
    /// environment.
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        Self::load_with_env(path, None)
    }

    fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, Error> {
        let data_dir = default_data_dir().unwrap_or_else(|| {
            debug!("No platform data directory, using ./{}", FALLBACK_DATA_DIR);
            PathBuf::from(FALLBACK_DATA_DIR)
        });

        let mut builder = Config::builder()
            .set_default("data_dir", data_dir.to_string_lossy().into_owned())?
            .set_default("index_key", INDEX_KEY)?;

        match path {
            Some(path) => {
                debug!("Loading settings from {:?}", path);
                builder = builder.add_source(File::from(path).format(FileFormat::Toml));
            }
            None => {
                if let Some(default) = default_config_file() {
                    debug!("Loading optional settings from {:?}", default);
                    builder = builder.add_source(
                        File::from(default.as_path())
                            .format(FileFormat::Toml)
                            .required(false),
                    );
                }
            }
        }

        let settings: Settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).source(env))
            .build()?
            .try_deserialize()?;

        if settings.index_key.is_empty() {
            return Err(Error::InvalidParameters(
                "index_key must not be empty".to_string(),
            ));
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_env() -> Option<config::Map<String, String>> {
        Some(config::Map::new())
    }

    #[test]
    fn test_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let empty = temp_dir.path().join("empty.toml");
        std::fs::write(&empty, "").unwrap();

        let settings = Settings::load_with_env(Some(&empty), no_env()).unwrap();
        assert_eq!(settings.index_key, "state");
        if let Some(dir) = default_data_dir() {
            assert_eq!(settings.data_dir, dir);
        }
    }

    #[test]
    fn test_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "data_dir = \"/srv/annotations\"\nindex_key = \"events\"\n").unwrap();

        let settings = Settings::load_with_env(Some(&path), no_env()).unwrap();
        assert_eq!(settings.data_dir, PathBuf::from("/srv/annotations"));
        assert_eq!(settings.index_key, "events");
    }

    #[test]
    fn test_environment_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "data_dir = \"/srv/annotations\"\n").unwrap();

        let mut env = config::Map::new();
        env.insert("LAND_ANNOTATION_DATA_DIR".to_string(), "/tmp/override".to_string());

        let settings = Settings::load_with_env(Some(&path), Some(env)).unwrap();
        assert_eq!(settings.data_dir, PathBuf::from("/tmp/override"));
        assert_eq!(settings.index_key, "state");
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = Settings::load_with_env(Some(&temp_dir.path().join("nope.toml")), no_env());
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_empty_index_key_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "index_key = \"\"\n").unwrap();

        let result = Settings::load_with_env(Some(&path), no_env());
        assert!(matches!(result, Err(Error::InvalidParameters(_))));
    }
}
