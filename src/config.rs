use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::logging::{Level, Logger};
use crate::masks::EmptyTagPolicy;
use crate::resolver::ResolverOptions;
use crate::types::TypeRef;
use crate::universe::TypeUniverse;

pub const CONFIG_ENV: &str = "MASK_REGISTRY_CONFIG";
pub const EMPTY_TAGS_ENV: &str = "MASK_REGISTRY_EMPTY_TAGS";
pub const LOG_LEVEL_ENV: &str = "MASK_REGISTRY_LOG";
pub const LOCAL_CONFIG_FILE: &str = "mask-registry.toml";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySection {
    pub empty_tags: EmptyTagPolicy,
    pub log_level: Level,
    pub mask_field: String,
    pub manifests: Vec<PathBuf>,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            empty_tags: EmptyTagPolicy::Warn,
            log_level: Level::Info,
            mask_field: "mask".to_string(),
            manifests: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub registry: RegistrySection,
    /// Contract to preferred concrete type, both in `Name<Arg>` syntax.
    pub overrides: BTreeMap<String, String>,
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl RegistryConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RegistryConfig =
            toml::from_str(content).context("invalid registry configuration")?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file: {}", path.display()))?;
        let mut config = Self::from_toml_str(&content)
            .with_context(|| format!("invalid config file: {}", path.display()))?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Candidate files in lookup order: `$MASK_REGISTRY_CONFIG`, the working
    /// directory, then the user config directory.
    pub fn candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Ok(explicit) = env::var(CONFIG_ENV) {
            if !explicit.trim().is_empty() {
                candidates.push(PathBuf::from(explicit));
            }
        }
        candidates.push(PathBuf::from(LOCAL_CONFIG_FILE));
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("mask-registry").join("config.toml"));
        }
        candidates
    }

    pub fn discover() -> Result<Self> {
        let mut config = Self::candidates()
            .into_iter()
            .find(|candidate| candidate.is_file())
            .map(|path| Self::load(&path))
            .transpose()?
            .unwrap_or_default();
        config.apply_env_from(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(policy) = lookup(EMPTY_TAGS_ENV).filter(|v| !v.trim().is_empty()) {
            self.registry.empty_tags = policy
                .parse()
                .with_context(|| format!("invalid {EMPTY_TAGS_ENV}"))?;
        }
        if let Some(level) = lookup(LOG_LEVEL_ENV).filter(|v| !v.trim().is_empty()) {
            self.registry.log_level = level
                .parse()
                .with_context(|| format!("invalid {LOG_LEVEL_ENV}"))?;
        }
        Ok(())
    }

    pub fn manifest_paths(&self) -> Vec<PathBuf> {
        self.registry
            .manifests
            .iter()
            .map(|path| match &self.base_dir {
                Some(base) if path.is_relative() => base.join(path),
                _ => path.clone(),
            })
            .collect()
    }

    pub fn parsed_overrides(&self) -> Result<Vec<(TypeRef, TypeRef)>, RegistryError> {
        self.overrides
            .iter()
            .map(|(contract, concrete)| Ok((TypeRef::parse(contract)?, TypeRef::parse(concrete)?)))
            .collect()
    }

    pub fn universe(&self) -> TypeUniverse {
        TypeUniverse::new().with_manifests(self.manifest_paths())
    }

    pub fn resolver_options(&self, logger: Logger) -> Result<ResolverOptions, RegistryError> {
        Ok(ResolverOptions {
            empty_tags: self.registry.empty_tags,
            overrides: self.parsed_overrides()?,
            logger,
        })
    }
}
