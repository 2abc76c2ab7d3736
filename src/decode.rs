use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::resolver::Resolver;
use crate::types::TypeRef;

pub type Factory =
    Arc<dyn Fn(Value) -> Result<Box<dyn Any + Send>, serde_json::Error> + Send + Sync>;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("payload has no string `{field}` field naming its mask")]
    MissingMask { field: String },

    #[error("unknown schema tag `{0}`")]
    UnknownTag(String),

    #[error("no implementation found for `{0}`")]
    NoImplementation(String),

    #[error("no decoder registered for `{0}`")]
    NoFactory(TypeRef),

    #[error("failed to decode `{concrete}`: {source}")]
    Payload {
        concrete: TypeRef,
        #[source]
        source: serde_json::Error,
    },
}

pub struct Decoded {
    concrete: TypeRef,
    value: Box<dyn Any + Send>,
}

impl fmt::Debug for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoded")
            .field("concrete", &self.concrete)
            .finish_non_exhaustive()
    }
}

impl Decoded {
    pub fn concrete(&self) -> &TypeRef {
        &self.concrete
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        match self.value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(value) => Err(Decoded {
                concrete: self.concrete,
                value,
            }),
        }
    }
}

/// Turns JSON payloads into instances of whatever concrete type the resolver
/// picks. Factories are keyed by concrete type; a factory registered on a
/// generic definition serves every instantiation without its own entry.
pub struct Decoder {
    factories: HashMap<TypeRef, Factory>,
    mask_field: String,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            mask_field: "mask".to_string(),
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new().with_mask_field(config.registry.mask_field.clone())
    }

    pub fn with_mask_field(mut self, field: impl Into<String>) -> Self {
        self.mask_field = field.into();
        self
    }

    pub fn mask_field(&self) -> &str {
        &self.mask_field
    }

    pub fn register<T>(&mut self, concrete: TypeRef) -> &mut Self
    where
        T: DeserializeOwned + Send + 'static,
    {
        let factory: Factory = Arc::new(
            |payload: Value| -> Result<Box<dyn Any + Send>, serde_json::Error> {
                let value: T = serde_json::from_value(payload)?;
                Ok(Box::new(value))
            },
        );
        self.register_factory(concrete, factory)
    }

    pub fn register_factory(&mut self, concrete: TypeRef, factory: Factory) -> &mut Self {
        self.factories.insert(concrete, factory);
        self
    }

    pub fn decode_as(
        &self,
        resolver: &Resolver,
        contract: &TypeRef,
        payload: Value,
    ) -> Result<Decoded, DecodeError> {
        let concrete = match resolver.resolve_deserializer_implementation(contract)? {
            Some(concrete) => concrete,
            None => resolver
                .resolve_default_implementation(contract)?
                .ok_or_else(|| DecodeError::NoImplementation(contract.to_string()))?,
        };
        self.construct(concrete, payload)
    }

    /// Reads the schema tag out of the payload and decodes it as the first
    /// implementation registered for that tag.
    pub fn decode_tagged(
        &self,
        resolver: &Resolver,
        payload: Value,
    ) -> Result<Decoded, DecodeError> {
        let tag = payload
            .get(&self.mask_field)
            .and_then(Value::as_str)
            .ok_or_else(|| DecodeError::MissingMask {
                field: self.mask_field.clone(),
            })?
            .to_string();
        let records = resolver
            .mask_schema_interface_info(&tag)
            .ok_or_else(|| DecodeError::UnknownTag(tag.clone()))?;
        let concrete = records
            .first()
            .and_then(|record| record.default_implementation())
            .cloned()
            .ok_or_else(|| DecodeError::NoImplementation(tag.clone()))?;
        self.construct(concrete, payload)
    }

    fn construct(&self, concrete: TypeRef, payload: Value) -> Result<Decoded, DecodeError> {
        let factory = self
            .factories
            .get(&concrete)
            .or_else(|| self.factories.get(&concrete.definition()))
            .ok_or_else(|| DecodeError::NoFactory(concrete.clone()))?;
        let value = (**factory)(payload).map_err(|source| DecodeError::Payload {
            concrete: concrete.clone(),
            source,
        })?;
        Ok(Decoded { concrete, value })
    }
}
