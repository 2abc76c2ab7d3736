use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::OnceLock;

use serde::Serialize;

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::logging::Logger;
use crate::resolver::{Resolver, ResolverOptions};
use crate::types::TypeRef;
use crate::universe::TypeUniverse;

const UNINITIALIZED: u8 = 0;
const INITIALIZING: u8 = 1;
const READY: u8 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum InitState {
    Uninitialized,
    Initializing,
    Ready,
}

type InitFn = Box<dyn Fn() -> Result<Resolver, RegistryError> + Send + Sync>;

/// Builds its resolver on first use, exactly once, even under concurrent
/// first calls. A failed build is kept too; there is no reset.
pub struct LazyResolver {
    cell: OnceLock<Result<Resolver, RegistryError>>,
    state: AtomicU8,
    builds: AtomicUsize,
    init: InitFn,
}

impl LazyResolver {
    pub fn new<F>(init: F) -> Self
    where
        F: Fn() -> Result<Resolver, RegistryError> + Send + Sync + 'static,
    {
        Self {
            cell: OnceLock::new(),
            state: AtomicU8::new(UNINITIALIZED),
            builds: AtomicUsize::new(0),
            init: Box::new(init),
        }
    }

    pub fn from_universe(universe: TypeUniverse, options: ResolverOptions) -> Self {
        Self::new(move || Resolver::build(&universe, options.clone()))
    }

    pub fn get(&self) -> Result<&Resolver, RegistryError> {
        let built = self.cell.get_or_init(|| {
            self.state.store(INITIALIZING, Ordering::SeqCst);
            self.builds.fetch_add(1, Ordering::SeqCst);
            (self.init)()
        });
        // only after the cell is published
        if self.state.load(Ordering::SeqCst) != READY {
            self.state.store(READY, Ordering::SeqCst);
        }
        built.as_ref().map_err(Clone::clone)
    }

    pub fn state(&self) -> InitState {
        match self.state.load(Ordering::SeqCst) {
            UNINITIALIZED => InitState::Uninitialized,
            INITIALIZING => InitState::Initializing,
            _ => InitState::Ready,
        }
    }

    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn resolve_default_implementation(
        &self,
        contract: &TypeRef,
    ) -> Result<Option<TypeRef>, RegistryError> {
        self.get()?.resolve_default_implementation(contract)
    }

    pub fn resolve_deserializer_implementation(
        &self,
        contract: &TypeRef,
    ) -> Result<Option<TypeRef>, RegistryError> {
        self.get()?.resolve_deserializer_implementation(contract)
    }
}

fn build_global() -> Result<Resolver, RegistryError> {
    let config =
        RegistryConfig::discover().map_err(|err| RegistryError::Config(format!("{err:#}")))?;
    let logger = Logger::stderr(config.registry.log_level);
    let universe = TypeUniverse::new()
        .with_static_modules()
        .with_manifests(config.manifest_paths());
    let options = config.resolver_options(logger)?;
    Resolver::build(&universe, options)
}

static GLOBAL: OnceLock<LazyResolver> = OnceLock::new();

/// Process-wide facade over every statically registered module plus the
/// manifests and overrides named by the discovered configuration.
pub fn global() -> &'static LazyResolver {
    GLOBAL.get_or_init(|| LazyResolver::new(build_global))
}

pub fn resolve_default_implementation(
    contract: &TypeRef,
) -> Result<Option<TypeRef>, RegistryError> {
    global().resolve_default_implementation(contract)
}

pub fn resolve_deserializer_implementation(
    contract: &TypeRef,
) -> Result<Option<TypeRef>, RegistryError> {
    global().resolve_deserializer_implementation(contract)
}
