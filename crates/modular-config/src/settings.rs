//! Layered build settings.
//!
//! Priority: overrides (CLI) > `MODULAR_*` environment > config file > defaults.

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format as _, Json, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::target::EsTarget;

pub const TOML_CONFIG: &str = "modular.config.toml";
pub const JSON_CONFIG: &str = "modular.config.json";

pub const DEFAULT_REGISTRY: &str = "https://esm.sh/[name]@[version]";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModularSettings {
    /// Syntax level of emitted JavaScript.
    #[serde(default)]
    pub target: EsTarget,

    /// URL template resolving a shared dependency at runtime.
    #[serde(default = "default_registry")]
    pub dependency_registry: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,

    /// Upper bound on concurrent style-sheet moves.
    #[serde(default = "default_relocation_concurrency")]
    pub relocation_concurrency: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

fn default_registry() -> String {
    DEFAULT_REGISTRY.to_string()
}

fn default_relocation_concurrency() -> usize {
    num_cpus::get().clamp(1, 8)
}

impl Default for ModularSettings {
    fn default() -> Self {
        Self {
            target: EsTarget::default(),
            dependency_registry: default_registry(),
            public_url: None,
            relocation_concurrency: default_relocation_concurrency(),
            log_level: None,
        }
    }
}

/// Values supplied on the command line; `None` leaves lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SettingsOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<EsTarget>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependency_registry: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

impl ModularSettings {
    /// Load settings for the monorepo rooted at `modular_root`.
    pub fn load(modular_root: &Path, overrides: &SettingsOverrides) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        if let Some(path) = Self::config_file(modular_root) {
            tracing::debug!("Loading settings from {}", path.display());
            figment = if path.extension().is_some_and(|ext| ext == "json") {
                figment.merge(Json::file(path))
            } else {
                figment.merge(Toml::file(path))
            };
        }

        // PUBLIC_URL keeps its conventional unprefixed name
        figment = figment
            .merge(Env::raw().only(&["PUBLIC_URL"]).map(|_| "public_url".into()))
            .merge(Env::prefixed("MODULAR_").ignore(&["ROOT"]))
            .merge(Serialized::defaults(overrides));

        let settings: Self = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// First existing config file at the root, TOML preferred.
    pub fn config_file(modular_root: &Path) -> Option<PathBuf> {
        [TOML_CONFIG, JSON_CONFIG]
            .iter()
            .map(|name| modular_root.join(name))
            .find(|path| path.is_file())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.dependency_registry.contains("[name]") {
            return Err(ConfigError::InvalidValue {
                field: "dependency_registry".to_string(),
                hint: format!(
                    "'{}' has no [name] placeholder, e.g. {}",
                    self.dependency_registry, DEFAULT_REGISTRY
                ),
            });
        }
        if self.relocation_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "relocation_concurrency".to_string(),
                hint: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_without_any_source() {
        Jail::expect_with(|jail| {
            let settings =
                ModularSettings::load(jail.directory(), &SettingsOverrides::default()).unwrap();
            assert_eq!(settings.target, EsTarget::Es2020);
            assert_eq!(settings.dependency_registry, DEFAULT_REGISTRY);
            assert!(settings.public_url.is_none());
            Ok(())
        });
    }

    #[test]
    fn file_then_env_then_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file(
                TOML_CONFIG,
                r#"
target = "es2017"
dependency_registry = "https://registry.example/[name]@[version]"
public_url = "/from-file"
"#,
            )?;
            jail.set_env("MODULAR_TARGET", "es2022");

            let settings =
                ModularSettings::load(jail.directory(), &SettingsOverrides::default()).unwrap();
            assert_eq!(settings.target, EsTarget::Es2022);
            assert_eq!(
                settings.dependency_registry,
                "https://registry.example/[name]@[version]"
            );
            assert_eq!(settings.public_url.as_deref(), Some("/from-file"));

            let overrides = SettingsOverrides {
                public_url: Some("/from-cli".to_string()),
                ..Default::default()
            };
            let settings = ModularSettings::load(jail.directory(), &overrides).unwrap();
            assert_eq!(settings.public_url.as_deref(), Some("/from-cli"));
            Ok(())
        });
    }

    #[test]
    fn public_url_env_is_honoured() {
        Jail::expect_with(|jail| {
            jail.set_env("PUBLIC_URL", "/cdn");
            let settings =
                ModularSettings::load(jail.directory(), &SettingsOverrides::default()).unwrap();
            assert_eq!(settings.public_url.as_deref(), Some("/cdn"));
            Ok(())
        });
    }

    #[test]
    fn registry_without_placeholder_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(JSON_CONFIG, r#"{ "dependency_registry": "https://cdn" }"#)?;
            let err = ModularSettings::load(jail.directory(), &SettingsOverrides::default())
                .unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { .. }));
            Ok(())
        });
    }
}
