//! traitscale configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use traitscale_core::statistics::HighlightConfig;
use traitscale_core::{EvaluatorConfig, Stratum};

/// Top-level traitscale configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitscaleConfig {
    /// Directory of TOML instrument and norm files.
    #[serde(default = "default_reference_dir")]
    pub reference_dir: PathBuf,
    /// Directory where profile records are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Fallback stratum for instruments that declare none.
    #[serde(default)]
    pub default_stratum: Option<String>,
    /// Max concurrent evaluations in batch mode.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Strength and development-area thresholds.
    #[serde(default)]
    pub highlights: HighlightConfig,
}

fn default_reference_dir() -> PathBuf {
    PathBuf::from("./instruments")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./traitscale-profiles")
}
fn default_parallelism() -> usize {
    4
}

impl Default for TraitscaleConfig {
    fn default() -> Self {
        Self {
            reference_dir: default_reference_dir(),
            output_dir: default_output_dir(),
            default_stratum: None,
            parallelism: default_parallelism(),
            highlights: HighlightConfig::default(),
        }
    }
}

impl TraitscaleConfig {
    /// Engine settings derived from this configuration.
    pub fn evaluator_config(&self) -> EvaluatorConfig {
        EvaluatorConfig {
            highlights: self.highlights.clone(),
            fallback_stratum: self.default_stratum.clone().map(Stratum::new),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Unset variables resolve to the empty string.
pub fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 2..start + end];
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `traitscale.toml` in the current directory
/// 2. `~/.config/traitscale/config.toml`
///
/// Environment variable overrides: `TRAITSCALE_REFERENCE_DIR`, `TRAITSCALE_OUTPUT_DIR`.
pub fn load_config() -> Result<TraitscaleConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<TraitscaleConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("traitscale.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match &config_path {
        Some(path) => parse_config(path)?,
        None => TraitscaleConfig::default(),
    };

    if let Ok(dir) = std::env::var("TRAITSCALE_REFERENCE_DIR") {
        config.reference_dir = PathBuf::from(dir);
    }
    if let Ok(dir) = std::env::var("TRAITSCALE_OUTPUT_DIR") {
        config.output_dir = PathBuf::from(dir);
    }

    config.reference_dir = resolve_path(&config.reference_dir);
    config.output_dir = resolve_path(&config.output_dir);
    config.default_stratum = config
        .default_stratum
        .as_deref()
        .map(resolve_env_vars)
        .filter(|s| !s.is_empty());

    if config.parallelism == 0 {
        anyhow::bail!("parallelism must be at least 1");
    }

    tracing::debug!(
        source = ?config_path,
        reference_dir = %config.reference_dir.display(),
        output_dir = %config.output_dir.display(),
        "loaded configuration"
    );
    Ok(config)
}

fn parse_config(path: &Path) -> Result<TraitscaleConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    toml::from_str::<TraitscaleConfig>(&content)
        .with_context(|| format!("failed to parse config: {}", path.display()))
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("traitscale"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_TRAITSCALE_TEST_VAR", "norms");
        assert_eq!(resolve_env_vars("${_TRAITSCALE_TEST_VAR}"), "norms");
        assert_eq!(
            resolve_env_vars("/srv/${_TRAITSCALE_TEST_VAR}/current"),
            "/srv/norms/current"
        );
        assert_eq!(resolve_env_vars("${_TRAITSCALE_UNSET_VAR}"), "");
        assert_eq!(resolve_env_vars("no ${closing"), "no ${closing");
        std::env::remove_var("_TRAITSCALE_TEST_VAR");
    }

    #[test]
    fn resolve_env_vars_does_not_expand_substituted_values() {
        std::env::set_var("_TRAITSCALE_SELF_REF", "${_TRAITSCALE_SELF_REF}");
        std::env::set_var("_TRAITSCALE_INNER", "data");
        std::env::set_var("_TRAITSCALE_OUTER", "${_TRAITSCALE_INNER}");
        assert_eq!(
            resolve_env_vars("/a/${_TRAITSCALE_SELF_REF}/b"),
            "/a/${_TRAITSCALE_SELF_REF}/b"
        );
        assert_eq!(
            resolve_env_vars("${_TRAITSCALE_OUTER}-${_TRAITSCALE_INNER}"),
            "${_TRAITSCALE_INNER}-data"
        );
        std::env::remove_var("_TRAITSCALE_SELF_REF");
        std::env::remove_var("_TRAITSCALE_INNER");
        std::env::remove_var("_TRAITSCALE_OUTER");
    }

    #[test]
    fn default_config() {
        let config = TraitscaleConfig::default();
        assert_eq!(config.reference_dir, PathBuf::from("./instruments"));
        assert_eq!(config.parallelism, 4);
        assert_eq!(config.highlights.strength_percentile, 75.0);
        assert_eq!(config.evaluator_config().fallback_stratum, None);
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
reference_dir = "/srv/traitscale/instruments"
output_dir = "/srv/traitscale/profiles"
default_stratum = "general"
parallelism = 8

[highlights]
strength_percentile = 80
limit = 5
"#;
        let config: TraitscaleConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.parallelism, 8);
        assert_eq!(config.highlights.strength_percentile, 80.0);
        assert_eq!(config.highlights.development_percentile, 25.0);
        assert_eq!(config.highlights.limit, 5);
        assert_eq!(
            config.evaluator_config().fallback_stratum,
            Some(Stratum::new("general"))
        );
    }

    #[test]
    fn explicit_path_must_exist() {
        let err = load_config_from(Some(Path::new("/nonexistent/traitscale.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn loads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traitscale.toml");
        std::fs::write(&path, "parallelism = 2\ndefault_stratum = \"adult\"\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.parallelism, 2);
        assert_eq!(config.default_stratum.as_deref(), Some("adult"));
    }

    #[test]
    fn zero_parallelism_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traitscale.toml");
        std::fs::write(&path, "parallelism = 0\n").unwrap();
        assert!(load_config_from(Some(&path)).is_err());
    }
}
