//! Application-level configuration loading, including the department registry.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/departments.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TOKEN_BOARD_CONFIG_PATH";

/// Static metadata describing a single department served by the board.
#[derive(Debug, Clone)]
pub struct Department {
    /// Full display name shown on the public board.
    pub name: String,
    /// Short code shown on tiles and the admin panel header.
    pub abbr: String,
    /// Color theme reference the frontends map to their own styling.
    pub theme: String,
    pin: String,
}

impl Department {
    /// Department PIN used by the registry-backed verifier. Never serialized.
    pub(crate) fn pin(&self) -> &str {
        &self.pin
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
///
/// The registry is fixed for the lifetime of the process; departments are
/// never created or removed at runtime. Iteration follows config order so
/// the public board renders departments in a stable order.
pub struct AppConfig {
    departments: IndexMap<String, Department>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the built-in registry.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => match AppConfig::try_from(raw) {
                    Ok(app_config) => {
                        info!(
                            path = %path.display(),
                            count = app_config.departments.len(),
                            "loaded department registry from config"
                        );
                        app_config
                    }
                    Err(err) => {
                        warn!(
                            path = %path.display(),
                            error = %err,
                            "invalid department registry; falling back to defaults"
                        );
                        Self::default()
                    }
                },
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Look up a department by its identifier.
    pub fn department(&self, id: &str) -> Option<&Department> {
        self.departments.get(id)
    }

    /// Whether the registry knows the given department identifier.
    pub fn contains(&self, id: &str) -> bool {
        self.departments.contains_key(id)
    }

    /// Iterate over `(id, department)` pairs in config order.
    pub fn departments(&self) -> impl Iterator<Item = (&str, &Department)> {
        self.departments
            .iter()
            .map(|(id, department)| (id.as_str(), department))
    }

    /// Department identifiers in config order.
    pub fn department_ids(&self) -> Vec<String> {
        self.departments.keys().cloned().collect()
    }

    /// Number of registered departments.
    pub fn len(&self) -> usize {
        self.departments.len()
    }

    /// Whether the registry is empty. Only possible with a broken config file.
    pub fn is_empty(&self) -> bool {
        self.departments.is_empty()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            departments: default_departments(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    departments: Vec<RawDepartment>,
}

#[derive(Debug, Deserialize)]
/// JSON representation of a single department entry inside the configuration file.
struct RawDepartment {
    id: String,
    name: String,
    abbr: String,
    theme: String,
    pin: String,
}

impl TryFrom<RawConfig> for AppConfig {
    type Error = String;

    fn try_from(value: RawConfig) -> Result<Self, Self::Error> {
        let mut departments = IndexMap::with_capacity(value.departments.len());
        for raw in value.departments {
            if !valid_department_id(&raw.id) {
                return Err(format!(
                    "department id `{}` must be 2-4 lowercase alphanumeric characters",
                    raw.id
                ));
            }
            let previous = departments.insert(
                raw.id.clone(),
                Department {
                    name: raw.name,
                    abbr: raw.abbr,
                    theme: raw.theme,
                    pin: raw.pin,
                },
            );
            if previous.is_some() {
                return Err(format!("duplicate department id `{}`", raw.id));
            }
        }
        Ok(Self { departments })
    }
}

/// Department identifiers are short lowercase codes (`cs`, `ee`, ...).
fn valid_department_id(id: &str) -> bool {
    (2..=4).contains(&id.len())
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in department registry shipped with the binary.
fn default_departments() -> IndexMap<String, Department> {
    let entries = [
        (
            "cs",
            "Computer & Information Sciences",
            "CS",
            "slate",
            "1234",
        ),
        ("ee", "Electrical Engineering", "EE", "blue", "5678"),
        ("ce", "Chemical Engineering", "CE", "teal", "9012"),
        ("me", "Mechanical Engineering", "ME", "gray", "3456"),
        ("cv", "Civil Engineering", "CV", "indigo", "7890"),
        ("ms", "Materials Science", "MS", "slate-dark", "2468"),
    ];

    entries
        .into_iter()
        .map(|(id, name, abbr, theme, pin)| {
            (
                id.to_string(),
                Department {
                    name: name.to_string(),
                    abbr: abbr.to_string(),
                    theme: theme.to_string(),
                    pin: pin.to_string(),
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_keeps_config_order() {
        let config = AppConfig::default();
        let ids: Vec<&str> = config.departments().map(|(id, _)| id).collect();
        assert_eq!(ids, ["cs", "ee", "ce", "me", "cv", "ms"]);
    }

    #[test]
    fn parses_registry_from_json() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "departments": [
                    {"id": "cs", "name": "Computer Science", "abbr": "CS", "theme": "slate", "pin": "0000"},
                    {"id": "ee", "name": "Electrical Engineering", "abbr": "EE", "theme": "blue", "pin": "1111"}
                ]
            }"#,
        )
        .unwrap();
        let config = AppConfig::try_from(raw).unwrap();
        assert_eq!(config.len(), 2);
        assert!(config.contains("cs"));
        assert_eq!(config.department("ee").unwrap().abbr, "EE");
    }

    #[test]
    fn rejects_malformed_department_ids() {
        for bad in ["C S", "CS", "c", "tooolong", "c-s", ""] {
            let raw = RawConfig {
                departments: vec![RawDepartment {
                    id: bad.to_string(),
                    name: "X".into(),
                    abbr: "X".into(),
                    theme: "slate".into(),
                    pin: "0000".into(),
                }],
            };
            assert!(AppConfig::try_from(raw).is_err(), "id `{bad}` was accepted");
        }
    }

    #[test]
    fn rejects_duplicate_department_ids() {
        let entry = RawDepartment {
            id: "cs".into(),
            name: "X".into(),
            abbr: "X".into(),
            theme: "slate".into(),
            pin: "0000".into(),
        };
        let dup = RawDepartment {
            id: "cs".into(),
            name: "Y".into(),
            abbr: "Y".into(),
            theme: "blue".into(),
            pin: "1111".into(),
        };
        let raw = RawConfig {
            departments: vec![entry, dup],
        };
        assert!(AppConfig::try_from(raw).is_err());
    }
}
