use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};

use crate::types::{TypeDef, TypeRef};

pub const CORE_MODULE: &str = "core";
pub const ORDERED_LIST: &str = "OrderedList";
pub const KEY_VALUE_MAP: &str = "KeyValueMap";
pub const ARRAY_LIST: &str = "ArrayList";
pub const HASH_MAP: &str = "HashMap";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeModule {
    #[serde(default, alias = "module")]
    pub name: String,
    /// Generated at runtime; never scanned.
    #[serde(default)]
    pub dynamic: bool,
    #[serde(default)]
    pub types: Vec<TypeDef>,
}

impl TypeModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dynamic: false,
            types: Vec::new(),
        }
    }

    pub fn dynamic(name: impl Into<String>) -> Self {
        Self {
            dynamic: true,
            ..Self::new(name)
        }
    }

    pub fn with(mut self, def: TypeDef) -> Self {
        self.types.push(def);
        self
    }
}

pub trait ModuleSource: Send + Sync {
    fn name(&self) -> String;
    fn load(&self) -> Result<TypeModule>;
}

impl ModuleSource for TypeModule {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn load(&self) -> Result<TypeModule> {
        Ok(self.clone())
    }
}

/// Compile-time registration of a module. Submit one per crate or feature:
///
/// ```ignore
/// inventory::submit! {
///     StaticModule::new("widgets", widget_types)
/// }
/// ```
#[derive(Clone, Copy)]
pub struct StaticModule {
    name: &'static str,
    types: fn() -> Vec<TypeDef>,
}

impl StaticModule {
    pub const fn new(name: &'static str, types: fn() -> Vec<TypeDef>) -> Self {
        Self { name, types }
    }
}

inventory::collect!(StaticModule);

impl ModuleSource for StaticModule {
    fn name(&self) -> String {
        self.name.to_string()
    }

    fn load(&self) -> Result<TypeModule> {
        Ok(TypeModule {
            name: self.name.to_string(),
            dynamic: false,
            types: (self.types)(),
        })
    }
}

/// Every statically registered module, ordered by name so scans are
/// reproducible across runs regardless of link order.
pub fn static_modules() -> Vec<StaticModule> {
    let mut modules: Vec<StaticModule> =
        inventory::iter::<StaticModule>.into_iter().copied().collect();
    modules.sort_by(|a, b| a.name.cmp(b.name));
    modules
}

#[derive(Clone, Debug)]
pub struct ManifestSource {
    path: PathBuf,
}

impl ManifestSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_manifest(path: &Path, content: &str) -> Result<TypeModule> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let module: TypeModule = match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(content)
            .with_context(|| format!("invalid YAML manifest: {}", path.display()))?,
        "json" => serde_json::from_str(content)
            .with_context(|| format!("invalid JSON manifest: {}", path.display()))?,
        "toml" => toml::from_str(content)
            .with_context(|| format!("invalid TOML manifest: {}", path.display()))?,
        other => {
            return Err(anyhow!(
                "unsupported manifest extension '{other}' for {}",
                path.display()
            ))
        }
    };
    Ok(module)
}

impl ModuleSource for ManifestSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<TypeModule> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("unable to read manifest: {}", self.path.display()))?;
        let mut module = parse_manifest(&self.path, &content)?;
        if module.name.trim().is_empty() {
            module.name = self
                .path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("manifest")
                .to_string();
        }
        Ok(module)
    }
}

/// Container contracts every universe starts with.
pub fn core_module() -> TypeModule {
    let t = || TypeRef::named("T");
    TypeModule::new(CORE_MODULE)
        .with(TypeDef::contract(ORDERED_LIST).params(&["T"]))
        .with(TypeDef::contract(KEY_VALUE_MAP).params(&["K", "V"]))
        .with(
            TypeDef::concrete(ARRAY_LIST)
                .params(&["T"])
                .implements(TypeRef::generic(ORDERED_LIST, vec![t()])),
        )
        .with(
            TypeDef::concrete(HASH_MAP).params(&["K", "V"]).implements(TypeRef::generic(
                KEY_VALUE_MAP,
                vec![TypeRef::named("K"), TypeRef::named("V")],
            )),
        )
}

#[derive(Clone)]
pub struct TypeUniverse {
    sources: Vec<Arc<dyn ModuleSource>>,
}

impl Default for TypeUniverse {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeUniverse {
    pub fn new() -> Self {
        Self {
            sources: vec![Arc::new(core_module())],
        }
    }

    pub fn with_module(self, module: TypeModule) -> Self {
        self.with_source(module)
    }

    pub fn with_source(mut self, source: impl ModuleSource + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    pub fn with_manifests<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        for path in paths {
            self.sources.push(Arc::new(ManifestSource::new(path)));
        }
        self
    }

    pub fn with_static_modules(mut self) -> Self {
        for module in static_modules() {
            self.sources.push(Arc::new(module));
        }
        self
    }

    pub fn push_source(&mut self, source: Arc<dyn ModuleSource>) {
        self.sources.push(source);
    }

    pub fn sources(&self) -> &[Arc<dyn ModuleSource>] {
        &self.sources
    }
}
