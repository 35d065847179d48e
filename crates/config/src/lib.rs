//! Layered configuration for rasort.
//!
//! Sources, lowest priority first:
//!
//! 1. Built-in defaults.
//! 2. A configuration file: the one passed explicitly, otherwise
//!    `config.toml` in the platform configuration directory if it exists.
//!    TOML, YAML and JSON are recognized by file extension.
//! 3. An `APP_CONSTANTS` file in the working directory (`KEY=VALUE` lines).
//! 4. The `RA_USERNAME` and `RA_API_KEY` environment variables, then any
//!    `RASORT_`-prefixed variable, with `__` separating nested keys
//!    (`RASORT_CATALOG__ATTEMPTS=5`).

mod constants;
pub mod error;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use rasort_catalog::Credentials;
use rasort_rom::System;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use crate::constants::{APP_CONSTANTS_FILE, parse_app_constants};

pub const CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_CACHE_FILE: &str = "hashlibrary.json";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("org", "rasort", "rasort")
}

pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

pub fn data_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub credentials: CredentialSettings,
    pub system: System,
    /// Location of the hash library.
    pub cache: PathBuf,
    pub catalog: CatalogSettings,
    pub sort: SortSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: CredentialSettings::default(),
            system: System::default(),
            cache: data_dir().map_or_else(|| PathBuf::from(DEFAULT_CACHE_FILE), |dir| dir.join(DEFAULT_CACHE_FILE)),
            catalog: CatalogSettings::default(),
            sort: SortSettings::default(),
        }
    }
}

/// Credentials as configured, before checking that both halves are present.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl CredentialSettings {
    /// Fails with [`ErrorKind::MissingCredentials`] unless both values are set
    /// and non-blank.
    pub fn resolve(&self) -> Result<Credentials> {
        let present = |value: &Option<String>| value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(String::from);
        match (present(&self.username), present(&self.api_key)) {
            (Some(username), Some(api_key)) => Ok(Credentials::new(username, api_key)),
            _ => exn::bail!(ErrorKind::MissingCredentials),
        }
    }
}

impl Debug for CredentialSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CredentialSettings")
            .field("username", &self.username)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Attempts per request, including the first.
    pub attempts: u32,
    /// Fetch the bulk game list when a hash is missing from the library.
    pub refresh_on_miss: bool,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            base_url: rasort_catalog::DEFAULT_BASE_URL.to_string(),
            timeout_secs: rasort_catalog::DEFAULT_TIMEOUT.as_secs(),
            attempts: rasort_catalog::DEFAULT_ATTEMPTS,
            refresh_on_miss: true,
        }
    }
}

impl CatalogSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Whether classified files are copied or moved into the output tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Copy,
    Move,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortSettings {
    pub output: PathBuf,
    pub mode: SortMode,
    /// File name of the report, written inside `output`.
    pub report: String,
    /// Set aside ROMs whose content matches one already sorted this run.
    pub dedupe: bool,
}

impl Default for SortSettings {
    fn default() -> Self {
        Self {
            output: PathBuf::from("sorted_GBA"),
            mode: SortMode::Copy,
            report: "sorting_report.txt".to_string(),
            dedupe: false,
        }
    }
}

impl Config {
    /// Load from every source; see the crate documentation for the order.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(file)?)
    }

    /// The merged providers, without extracting.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match file {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::FileNotFound(path.to_path_buf())),
            Some(path) => figment = merge_file(figment, path)?,
            None => {
                if let Some(path) = config_dir().map(|dir| dir.join(CONFIG_FILE))
                    && path.is_file()
                {
                    figment = merge_file(figment, &path)?;
                }
            },
        }
        let constants = Path::new(APP_CONSTANTS_FILE);
        if constants.is_file() {
            let text = std::fs::read_to_string(constants).or_raise(|| ErrorKind::Read(constants.to_path_buf()))?;
            tracing::debug!(path = %constants.display(), "Loading credentials from constants file");
            figment = figment.merge(Serialized::default("credentials", parse_app_constants(&text)));
        }
        Ok(figment
            .merge(Env::raw().only(&["RA_USERNAME", "RA_API_KEY"]).map(|key| {
                if key.as_str().eq_ignore_ascii_case("RA_USERNAME") {
                    "credentials.username".into()
                } else {
                    "credentials.api_key".into()
                }
            }))
            .merge(Env::prefixed("RASORT_").split("__")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().map_err(|err| ErrorKind::Invalid(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.catalog.attempts == 0 {
            exn::bail!(ErrorKind::Invalid("catalog.attempts must be at least 1".to_string()));
        }
        if self.catalog.timeout_secs == 0 {
            exn::bail!(ErrorKind::Invalid("catalog.timeout_secs must be at least 1".to_string()));
        }
        if self.sort.report.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("sort.report must not be empty".to_string()));
        }
        Ok(())
    }

    /// Credentials for the catalog, required by any operation that talks to it.
    pub fn credentials(&self) -> Result<Credentials> {
        self.credentials.resolve()
    }

    /// Path of the report file.
    pub fn report_path(&self) -> PathBuf {
        self.sort.output.join(&self.sort.report)
    }
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
    tracing::debug!(path = %path.display(), "Loading configuration file");
    let figment = match extension.as_deref() {
        Some("toml") => figment.merge(Toml::file_exact(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
        Some("json") => figment.merge(Json::file_exact(path)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
    };
    Ok(figment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.system, System::GameBoyAdvance);
        assert_eq!(config.catalog.attempts, 3);
        assert_eq!(config.catalog.timeout(), Duration::from_secs(30));
        assert!(config.catalog.refresh_on_miss);
        assert_eq!(config.sort.mode, SortMode::Copy);
        assert!(!config.sort.dedupe);
        assert_eq!(config.report_path(), PathBuf::from("sorted_GBA/sorting_report.txt"));
        assert!(config.cache.ends_with(DEFAULT_CACHE_FILE));
        assert!(matches!(*config.credentials().unwrap_err(), ErrorKind::MissingCredentials));
    }

    #[test]
    fn test_defaults_survive_figment() {
        let config = Config::from_figment(Figment::from(Serialized::defaults(Config::default()))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[rstest]
    #[case(Some("player"), None)]
    #[case(None, Some("key"))]
    #[case(Some("player"), Some("  "))]
    fn test_incomplete_credentials(#[case] username: Option<&str>, #[case] api_key: Option<&str>) {
        let settings = CredentialSettings {
            username: username.map(String::from),
            api_key: api_key.map(String::from),
        };
        assert!(matches!(*settings.resolve().unwrap_err(), ErrorKind::MissingCredentials));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let settings = CredentialSettings {
            username: Some("player".into()),
            api_key: Some("s3cr3t".into()),
        };
        assert!(!format!("{settings:?}").contains("s3cr3t"));
    }

    #[test]
    fn test_toml_file() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "rasort.toml",
                r#"
                    system = "gba"
                    cache = "library.json"

                    [credentials]
                    username = "player"
                    api_key = "from-file"

                    [sort]
                    mode = "move"
                    dedupe = true
                "#,
            )?;
            let config = Config::load(Some(Path::new("rasort.toml"))).unwrap();
            assert_eq!(config.cache, PathBuf::from("library.json"));
            assert_eq!(config.sort.mode, SortMode::Move);
            assert!(config.sort.dedupe);
            assert_eq!(config.sort.output, PathBuf::from("sorted_GBA"));
            assert_eq!(config.credentials().unwrap().username(), "player");
            Ok(())
        });
    }

    #[test]
    fn test_yaml_and_json_files() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("rasort.yaml", "catalog:\n  attempts: 5\n")?;
            jail.create_file("rasort.json", r#"{"catalog": {"refresh_on_miss": false}}"#)?;
            assert_eq!(Config::load(Some(Path::new("rasort.yaml"))).unwrap().catalog.attempts, 5);
            assert!(!Config::load(Some(Path::new("rasort.json"))).unwrap().catalog.refresh_on_miss);
            Ok(())
        });
    }

    #[test]
    fn test_app_constants_file() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(APP_CONSTANTS_FILE, "RA_USERNAME=player\nRA_API_KEY=constant-key\n")?;
            let config = Config::load(None).unwrap();
            assert_eq!(config.credentials.api_key.as_deref(), Some("constant-key"));
            Ok(())
        });
    }

    #[test]
    fn test_environment_wins() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(APP_CONSTANTS_FILE, "RA_USERNAME=player\nRA_API_KEY=constant-key\n")?;
            jail.set_env("RA_API_KEY", "env-key");
            jail.set_env("RASORT_CATALOG__ATTEMPTS", "7");
            jail.set_env("RASORT_SORT__OUTPUT", "elsewhere");
            let config = Config::load(None).unwrap();
            assert_eq!(config.credentials.username.as_deref(), Some("player"));
            assert_eq!(config.credentials.api_key.as_deref(), Some("env-key"));
            assert_eq!(config.catalog.attempts, 7);
            assert_eq!(config.sort.output, PathBuf::from("elsewhere"));
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            let err = Config::load(Some(Path::new("nope.toml"))).unwrap_err();
            assert!(matches!(*err, ErrorKind::FileNotFound(_)));
            Ok(())
        });
    }

    #[test]
    fn test_unsupported_format() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("rasort.ini", "attempts=1")?;
            let err = Config::load(Some(Path::new("rasort.ini"))).unwrap_err();
            assert!(matches!(*err, ErrorKind::UnsupportedFormat(_)));
            Ok(())
        });
    }

    #[rstest]
    #[case("[catalog]\nattempts = 0\n")]
    #[case("[catalog]\ntimeout_secs = 0\n")]
    #[case("system = \"snes\"\n")]
    #[case("[sort]\nmode = \"link\"\n")]
    fn test_invalid(#[case] contents: &str) {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("rasort.toml", contents)?;
            let err = Config::load(Some(Path::new("rasort.toml"))).unwrap_err();
            assert!(matches!(*err, ErrorKind::Invalid(_)));
            Ok(())
        });
    }
}
