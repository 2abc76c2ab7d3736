use thiserror::Error;

use crate::types::TypeRef;

/// Errors raised by the registry itself. Lookups that simply find nothing are
/// reported as `Ok(None)`, never through this type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("`{0}` is a concrete type, a contract is required")]
    NotAContract(TypeRef),

    #[error("`{0}` is a contract, a concrete type is required")]
    NotConcrete(TypeRef),

    #[error("`{0}` is not a scanned type")]
    UnknownType(TypeRef),

    #[error("`{type_ref}` expects {expected} type argument(s), got {actual}")]
    ArityMismatch {
        type_ref: TypeRef,
        expected: usize,
        actual: usize,
    },

    #[error("schema tag `{tag}` on `{contract}` has no concrete implementation")]
    EmptyMask { tag: String, contract: TypeRef },

    #[error("invalid type reference `{input}`: {reason}")]
    InvalidTypeRef { input: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}
