use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

fn default_enabled() -> bool {
    true
}

/// One listing website, as configured in `config/sources.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Stable identifier stored on every queue item and listing, e.g. `"khmer24"`.
    pub name: String,
    pub display_name: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Category/search pages to crawl during discovery. `{page}` is replaced
    /// by the 1-based page number; URLs without it are fetched once.
    #[serde(default)]
    pub index_urls: Vec<String>,
    /// Regex every discovered listing URL must match.
    pub listing_url_pattern: String,
    /// Regex with one capture group extracting the native listing ID from a URL.
    pub listing_id_pattern: Option<String>,
    /// City assumed when a listing page does not state one.
    pub default_city: Option<String>,
    /// Per-source override of `RENTDEX_MAX_PAGES`.
    pub max_pages: Option<usize>,
}

impl SourceConfig {
    /// Name of the env var that can force this source on or off.
    #[must_use]
    pub fn enabled_env_var(&self) -> String {
        let key: String = self
            .name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("RENTDEX_SOURCE_{key}_ENABLED")
    }

    /// Resolves the enable flag, letting `RENTDEX_SOURCE_<NAME>_ENABLED`
    /// override the YAML value.
    pub fn is_enabled_with<F>(&self, lookup: F) -> bool
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        match lookup(&self.enabled_env_var()) {
            Ok(v) => matches!(v.trim(), "1" | "true" | "TRUE" | "True" | "yes"),
            Err(_) => self.enabled,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.is_enabled_with(|key| std::env::var(key))
    }
}

#[derive(Debug, Deserialize)]
pub struct SourcesFile {
    pub sources: Vec<SourceConfig>,
}

impl SourcesFile {
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }
}

/// Load and validate the source configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_sources(path: &Path) -> Result<SourcesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SourcesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let sources_file: SourcesFile = serde_yaml::from_str(&content)?;

    validate_sources(&sources_file)?;

    Ok(sources_file)
}

fn validate_sources(sources_file: &SourcesFile) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for source in &sources_file.sources {
        let name = source.name.trim();
        if name.is_empty() {
            return Err(ConfigError::Validation(
                "source name must be non-empty".to_string(),
            ));
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(ConfigError::Validation(format!(
                "source name '{name}' must be lowercase ascii, digits, '-' or '_'"
            )));
        }

        if !seen.insert(name.to_string()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source name: '{name}'"
            )));
        }

        if let Some(bad) = source
            .index_urls
            .iter()
            .find(|u| !(u.starts_with("http://") || u.starts_with("https://")))
        {
            return Err(ConfigError::Validation(format!(
                "source '{name}' has non-http index url '{bad}'"
            )));
        }

        if source.listing_url_pattern.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{name}' must define listing_url_pattern"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::env::VarError;

    use super::*;

    fn source(name: &str) -> SourceConfig {
        SourceConfig {
            name: name.to_string(),
            display_name: None,
            enabled: true,
            index_urls: vec!["https://example.com/rent?page={page}".to_string()],
            listing_url_pattern: r"https://example\.com/listing/\d+".to_string(),
            listing_id_pattern: Some(r"/listing/(\d+)".to_string()),
            default_city: Some("Phnom Penh".to_string()),
            max_pages: None,
        }
    }

    #[test]
    fn validate_accepts_valid_sources() {
        let file = SourcesFile {
            sources: vec![source("khmer24"), source("realestate-kh")],
        };
        assert!(validate_sources(&file).is_ok());
    }

    #[test]
    fn validate_rejects_duplicate_name() {
        let file = SourcesFile {
            sources: vec![source("khmer24"), source("khmer24")],
        };
        let err = validate_sources(&file).unwrap_err();
        assert!(err.to_string().contains("duplicate source name"));
    }

    #[test]
    fn validate_rejects_uppercase_name() {
        let file = SourcesFile {
            sources: vec![source("Khmer24")],
        };
        let err = validate_sources(&file).unwrap_err();
        assert!(err.to_string().contains("lowercase"));
    }

    #[test]
    fn validate_rejects_non_http_index_url() {
        let mut s = source("khmer24");
        s.index_urls = vec!["ftp://example.com".to_string()];
        let file = SourcesFile { sources: vec![s] };
        let err = validate_sources(&file).unwrap_err();
        assert!(err.to_string().contains("non-http"));
    }

    #[test]
    fn env_flag_overrides_yaml_enabled() {
        let s = source("realestate-kh");
        assert_eq!(s.enabled_env_var(), "RENTDEX_SOURCE_REALESTATE_KH_ENABLED");

        let off = |key: &str| {
            if key == "RENTDEX_SOURCE_REALESTATE_KH_ENABLED" {
                Ok("false".to_string())
            } else {
                Err(VarError::NotPresent)
            }
        };
        assert!(!s.is_enabled_with(off));
        assert!(s.is_enabled_with(|_| Err(VarError::NotPresent)));
    }

    #[test]
    fn enabled_defaults_to_true_in_yaml() {
        let yaml = r#"
sources:
  - name: khmer24
    listing_url_pattern: "https://www\\.khmer24\\.com/en/.+-adid-\\d+\\.html"
"#;
        let file: SourcesFile = serde_yaml::from_str(yaml).unwrap();
        assert!(file.sources[0].enabled);
        assert!(file.find("khmer24").is_some());
        assert!(file.find("other").is_none());
    }

    #[test]
    fn load_sources_from_real_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("config")
            .join("sources.yaml");
        let result = load_sources(&path);
        assert!(result.is_ok(), "failed to load sources.yaml: {result:?}");
        assert!(!result.unwrap().sources.is_empty());
    }
}
