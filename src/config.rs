//! CLI configuration.
//!
//! Sources, highest priority first: command-line flags (and their
//! environment fallbacks), `./qail-ch.toml`, then
//! `~/.config/qail-ch/config.toml`.
//!
//! ```toml
//! url = "http://localhost:8123/analytics"
//! user = "reader"
//! password = "secret"
//!
//! [settings]
//! max_threads = "4"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use qail_clickhouse::ChConfig;
use serde::Deserialize;

use crate::error::{CliError, CliResult};

pub const LOCAL_CONFIG: &str = "qail-ch.toml";

/// One config file. Every field is optional so files can be layered.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub settings: BTreeMap<String, String>,
}

impl FileConfig {
    pub fn parse(content: &str, path: &Path) -> CliResult<Self> {
        toml::from_str(content).map_err(|e| CliError::Config {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Read `path` if it exists.
    pub fn load(path: &Path) -> CliResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path).map(Some)
    }

    /// Fill unset fields from `lower`. Settings merge key by key.
    pub fn or(mut self, lower: FileConfig) -> Self {
        self.url = self.url.or(lower.url);
        self.user = self.user.or(lower.user);
        self.password = self.password.or(lower.password);
        self.database = self.database.or(lower.database);
        for (key, value) in lower.settings {
            self.settings.entry(key).or_insert(value);
        }
        self
    }
}

/// `~/.config/qail-ch/config.toml`
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("qail-ch").join("config.toml"))
}

/// Merge the working-directory file over the user file.
pub fn load_files() -> CliResult<FileConfig> {
    let local = FileConfig::load(Path::new(LOCAL_CONFIG))?.unwrap_or_default();
    let user = match user_config_path() {
        Some(path) => FileConfig::load(&path)?.unwrap_or_default(),
        None => FileConfig::default(),
    };
    Ok(local.or(user))
}

/// Connection settings from the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub settings: Vec<(String, String)>,
}

/// Build the driver config: flags first, then files, then driver defaults.
pub fn resolve(flags: Overrides, files: FileConfig) -> CliResult<ChConfig> {
    let mut config = match flags.url.or(files.url) {
        Some(url) => ChConfig::from_url(&url)?,
        None => ChConfig::default(),
    };
    if let Some(user) = flags.user.or(files.user) {
        config.username = Some(user);
    }
    if let Some(password) = flags.password.or(files.password) {
        config.password = Some(password);
    }
    if let Some(database) = flags.database.or(files.database) {
        config.database = Some(database);
    }

    // A flag replaces the same key from a file.
    let mut settings: BTreeMap<String, String> = config.settings.drain(..).collect();
    settings.extend(files.settings);
    settings.extend(flags.settings);
    config.settings = settings.into_iter().collect();
    Ok(config)
}

/// Split `NAME=VALUE`.
pub fn parse_key_value(arg: &str) -> CliResult<(String, String)> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(CliError::argument(arg, "expected NAME=VALUE")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_file() {
        let file = FileConfig::parse(
            r#"
            url = "http://db:8123/logs"
            user = "reader"

            [settings]
            max_threads = "2"
            "#,
            Path::new("qail-ch.toml"),
        )
        .unwrap();
        assert_eq!(file.url.as_deref(), Some("http://db:8123/logs"));
        assert_eq!(file.user.as_deref(), Some("reader"));
        assert_eq!(file.settings.get("max_threads").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = FileConfig::parse("hots = \"x\"", Path::new("qail-ch.toml")).unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
    }

    #[test]
    fn test_layering() {
        let local = FileConfig {
            user: Some("local".into()),
            settings: [("a".to_string(), "1".to_string())].into(),
            ..FileConfig::default()
        };
        let user = FileConfig {
            user: Some("home".into()),
            password: Some("pw".into()),
            settings: [("a".to_string(), "9".to_string()), ("b".to_string(), "2".to_string())].into(),
            ..FileConfig::default()
        };
        let merged = local.or(user);
        assert_eq!(merged.user.as_deref(), Some("local"));
        assert_eq!(merged.password.as_deref(), Some("pw"));
        assert_eq!(merged.settings.get("a").map(String::as_str), Some("1"));
        assert_eq!(merged.settings.get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_resolve_flags_win() {
        let files = FileConfig {
            url: Some("http://file-host:8123/filedb?max_threads=8".into()),
            user: Some("file-user".into()),
            settings: [("max_threads".to_string(), "4".to_string())].into(),
            ..FileConfig::default()
        };
        let flags = Overrides {
            database: Some("flagdb".into()),
            settings: vec![("max_threads".into(), "1".into())],
            ..Overrides::default()
        };
        let config = resolve(flags, files).unwrap();
        assert_eq!(config.host, "file-host");
        assert_eq!(config.username.as_deref(), Some("file-user"));
        assert_eq!(config.database.as_deref(), Some("flagdb"));
        assert_eq!(config.settings, vec![("max_threads".to_string(), "1".to_string())]);
    }

    #[test]
    fn test_resolve_defaults() {
        let config = resolve(Overrides::default(), FileConfig::default()).unwrap();
        assert_eq!(config.base_url(), "http://localhost:8123/");
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("name=a=b").unwrap(),
            ("name".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("=x").is_err());
        assert!(parse_key_value("novalue").is_err());
    }
}
