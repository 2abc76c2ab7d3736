pub mod config;
pub mod decode;
pub mod error;
pub mod facade;
pub mod implementations;
pub mod logging;
pub mod masks;
pub mod overrides;
pub mod resolver;
pub mod scanner;
pub mod types;
pub mod universe;

pub use config::RegistryConfig;
pub use decode::{DecodeError, Decoded, Decoder};
pub use error::RegistryError;
pub use facade::{
    global, resolve_default_implementation, resolve_deserializer_implementation, InitState,
    LazyResolver,
};
pub use logging::{Level, LogSink, Logger, MemorySink, StderrSink};
pub use masks::{EmptyTagPolicy, MaskInfo};
pub use overrides::{OverrideEntry, OverrideOrigin};
pub use resolver::{Resolver, ResolverOptions};
pub use types::{TypeDef, TypeKind, TypeRef};
pub use universe::{ManifestSource, ModuleSource, StaticModule, TypeModule, TypeUniverse};
