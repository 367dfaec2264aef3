//! Run configuration
//!
//! Loaded once at startup from a TOML file and passed by reference to every
//! component. Missing form keys are not load errors: the affected form kind
//! is skipped at run time and reported by `sheets-etl check`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::etl::FormKind;
use crate::store::validate_procedure_name;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "SHEETS_ETL_CONFIG";
/// Overrides `store.password`
pub const STORE_PASSWORD_ENV: &str = "SHEETS_ETL_STORE_PASSWORD";
/// Overrides `google.access_token`
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_ACCESS_TOKEN";

const LOCAL_CONFIG_FILE: &str = "sheets-etl.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub google: GoogleConfig,
    pub store: Option<StoreConfig>,
    pub forms: FormsConfig,
}

/// Google Sheets access
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    /// Google credentials JSON (`service_account` key or `authorized_user`)
    pub credentials_file: Option<PathBuf>,
    /// Pre-issued bearer token, used instead of the credentials file
    pub access_token: Option<String>,
    /// Sheets API root, for proxies and tests
    pub api_base: Option<String>,
}

/// Database connection parameters
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub database: String,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3306
}

/// Per form kind source and destination
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FormsConfig {
    pub travel: FormConfig,
    pub building: FormConfig,
    pub incident: FormConfig,
}

impl FormsConfig {
    pub fn get(&self, kind: FormKind) -> &FormConfig {
        match kind {
            FormKind::Travel => &self.travel,
            FormKind::Building => &self.building,
            FormKind::Incident => &self.incident,
        }
    }
}

/// Raw keys of one form kind; see [`FormConfig::target`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    pub source_sheet_id: Option<String>,
    pub source_range: Option<String>,
    /// Stored procedure receiving each record
    pub procedure: Option<String>,
    /// Destination document for the append variant
    pub dest_sheet_id: Option<String>,
    pub dest_range: Option<String>,
}

/// Where records of a form kind are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Procedure(String),
    Sheet { sheet_id: String, range: String },
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::Procedure(name) => write!(f, "procedure {}", name),
            Destination::Sheet { sheet_id, range } => write!(f, "sheet {} ({})", sheet_id, range),
        }
    }
}

/// A fully specified form kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormTarget {
    pub source_sheet_id: String,
    pub source_range: String,
    pub destination: Destination,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl FormConfig {
    /// Validate the keys into a target. Blank values count as missing.
    pub fn target(&self) -> Result<FormTarget> {
        let source_sheet_id = non_blank(&self.source_sheet_id);
        let source_range = non_blank(&self.source_range);
        let procedure = non_blank(&self.procedure);
        let dest_sheet_id = non_blank(&self.dest_sheet_id);
        let dest_range = non_blank(&self.dest_range);

        let mut missing = Vec::new();
        if source_sheet_id.is_none() {
            missing.push("source_sheet_id");
        }
        if source_range.is_none() {
            missing.push("source_range");
        }

        let destination = match (procedure, dest_sheet_id, dest_range) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                bail!("both procedure and dest_sheet_id/dest_range are set; choose one")
            }
            (Some(name), None, None) => {
                validate_procedure_name(&name)?;
                Some(Destination::Procedure(name))
            }
            (None, Some(sheet_id), Some(range)) => Some(Destination::Sheet { sheet_id, range }),
            (None, Some(_), None) => {
                missing.push("dest_range");
                None
            }
            (None, None, Some(_)) => {
                missing.push("dest_sheet_id");
                None
            }
            (None, None, None) => {
                missing.push("procedure or dest_sheet_id/dest_range");
                None
            }
        };

        match (source_sheet_id, source_range, destination) {
            (Some(source_sheet_id), Some(source_range), Some(destination)) => {
                Ok(FormTarget {
                    source_sheet_id,
                    source_range,
                    destination,
                })
            }
            _ => bail!("missing {}", missing.join(", ")),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.host.trim().is_empty() {
            missing.push("host");
        }
        if self.database.trim().is_empty() {
            missing.push("database");
        }
        if self.username.trim().is_empty() {
            missing.push("username");
        }
        if !missing.is_empty() {
            bail!("store is missing {}", missing.join(", "));
        }
        Ok(())
    }
}

impl Config {
    /// Load from `path`, or from the first default location that exists,
    /// then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(path)?;
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config = Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML")
    }

    /// Apply secret overrides from `lookup` (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(password) = lookup(STORE_PASSWORD_ENV) {
            if let Some(store) = self.store.as_mut() {
                store.password = Some(password);
            }
        }
        if let Some(token) = lookup(ACCESS_TOKEN_ENV).filter(|t| !t.trim().is_empty()) {
            self.google.access_token = Some(token);
        }
    }
}

/// Explicit path, then `$SHEETS_ETL_CONFIG`, then `./sheets-etl.toml`, then
/// the user config directory
fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Ok(local);
    }
    if let Some(user) = user_config_path() {
        if user.exists() {
            return Ok(user);
        }
    }

    bail!(
        "No configuration file found. Pass --config, set {}, or create {}",
        CONFIG_ENV,
        LOCAL_CONFIG_FILE
    )
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sheets-etl").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[google]
credentials_file = "credentials.json"

[store]
database = "forms"
username = "etl"

[forms.travel]
source_sheet_id = "src-travel"
source_range = "Form Responses 1!A1:G"
procedure = "sp_insert_travel_request"

[forms.building]
source_sheet_id = "src-building"
source_range = "Form Responses 1!A1:C"
dest_sheet_id = "dest-building"
dest_range = "Buildings!A1"
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::from_toml_str(SAMPLE).unwrap();

        assert_eq!(
            config.google.credentials_file.as_deref(),
            Some(Path::new("credentials.json"))
        );
        let store = config.store.as_ref().unwrap();
        assert_eq!(store.host, "localhost");
        assert_eq!(store.port, 3306);
        assert!(store.password.is_none());
        assert!(store.validate().is_ok());

        assert_eq!(
            config.forms.get(FormKind::Travel).target().unwrap().destination,
            Destination::Procedure("sp_insert_travel_request".to_string())
        );
        assert_eq!(
            config.forms.get(FormKind::Building).target().unwrap().destination,
            Destination::Sheet {
                sheet_id: "dest-building".to_string(),
                range: "Buildings!A1".to_string()
            }
        );
        // Incident section is absent entirely
        assert_eq!(config.forms.incident, FormConfig::default());
        assert!(config.forms.get(FormKind::Incident).target().is_err());
    }

    #[test]
    fn test_empty_file_is_valid() {
        let config = Config::from_toml_str("").unwrap();
        assert!(config.store.is_none());
        assert!(config.forms.travel.target().is_err());
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let form = FormConfig {
            source_sheet_id: Some("  ".to_string()),
            source_range: Some("A1:B".to_string()),
            procedure: Some("sp_x".to_string()),
            ..Default::default()
        };
        let err = form.target().unwrap_err().to_string();
        assert!(err.contains("source_sheet_id"), "{}", err);
    }

    #[test]
    fn test_partial_sheet_destination() {
        let form = FormConfig {
            source_sheet_id: Some("s".to_string()),
            source_range: Some("A1:B".to_string()),
            dest_sheet_id: Some("d".to_string()),
            ..Default::default()
        };
        let err = form.target().unwrap_err().to_string();
        assert!(err.contains("dest_range"), "{}", err);
    }

    #[test]
    fn test_conflicting_destinations() {
        let form = FormConfig {
            source_sheet_id: Some("s".to_string()),
            source_range: Some("A1:B".to_string()),
            procedure: Some("sp_x".to_string()),
            dest_sheet_id: Some("d".to_string()),
            dest_range: Some("A1".to_string()),
        };
        assert!(form.target().is_err());
    }

    #[test]
    fn test_invalid_procedure_name() {
        let form = FormConfig {
            source_sheet_id: Some("s".to_string()),
            source_range: Some("A1:B".to_string()),
            procedure: Some("sp_x(); DROP".to_string()),
            ..Default::default()
        };
        assert!(form.target().is_err());
    }

    #[test]
    fn test_store_validation() {
        let store = StoreConfig {
            host: "db".to_string(),
            port: 3306,
            database: String::new(),
            username: "etl".to_string(),
            password: None,
        };
        assert!(store.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::from_toml_str(SAMPLE).unwrap();
        config.apply_overrides(|key| match key {
            STORE_PASSWORD_ENV => Some("hunter2".to_string()),
            ACCESS_TOKEN_ENV => Some("ya29.token".to_string()),
            _ => None,
        });
        assert_eq!(config.store.unwrap().password.as_deref(), Some("hunter2"));
        assert_eq!(config.google.access_token.as_deref(), Some("ya29.token"));
    }

    #[test]
    fn test_load_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert!(config.forms.travel.target().is_ok());
    }

    #[test]
    fn test_load_reports_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[forms.travel\nsource_range = ").unwrap();

        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid config file"));
    }
}
