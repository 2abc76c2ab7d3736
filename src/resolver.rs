use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::error::RegistryError;
use crate::implementations::ImplementationIndex;
use crate::logging::Logger;
use crate::masks::{EmptyTagPolicy, MaskIndex, MaskInfo};
use crate::overrides::{OverrideEntry, OverrideIndex, OverrideOrigin};
use crate::scanner::{scan, Catalog};
use crate::types::{TypeKind, TypeRef};
use crate::universe::TypeUniverse;

#[derive(Clone, Debug, Default)]
pub struct ResolverOptions {
    pub empty_tags: EmptyTagPolicy,
    pub overrides: Vec<(TypeRef, TypeRef)>,
    pub logger: Logger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolverStats {
    pub modules: Vec<String>,
    pub definitions: usize,
    pub contracts_with_implementers: usize,
    pub tags: usize,
    pub mask_records: usize,
    pub overrides: usize,
    pub property_hints: usize,
}

#[derive(Debug)]
pub struct Resolver {
    modules: Vec<String>,
    catalog: Catalog,
    implementations: ImplementationIndex,
    masks: MaskIndex,
    overrides: OverrideIndex,
    logger: Logger,
}

impl Resolver {
    pub fn build(universe: &TypeUniverse, options: ResolverOptions) -> Result<Self, RegistryError> {
        let ResolverOptions {
            empty_tags,
            overrides: explicit,
            logger,
        } = options;

        let scanned = scan(universe, &logger);
        let implementations = ImplementationIndex::build(&scanned);
        let masks = MaskIndex::build(&scanned, &implementations, empty_tags, &logger)?;

        let mut overrides = OverrideIndex::with_builtins(&scanned.catalog)?;
        for (contract, concrete) in explicit {
            if scanned.catalog.kind_of(contract.name()).is_none() {
                logger.warn(
                    "Ignoring override for a contract that was never scanned",
                    Some(json!({
                        "contract": contract.to_string(),
                        "concrete": concrete.to_string(),
                    })),
                );
                continue;
            }
            overrides.insert(&scanned.catalog, contract, concrete, OverrideOrigin::Config)?;
        }
        overrides.apply_annotations(&scanned.catalog, &logger);

        let resolver = Resolver {
            modules: scanned.modules,
            catalog: scanned.catalog,
            implementations,
            masks,
            overrides,
            logger,
        };
        resolver.logger.info(
            "Resolution index built",
            Some(json!({
                "stats": resolver.stats(),
                "fingerprint": resolver.fingerprint(),
            })),
        );
        Ok(resolver)
    }

    fn ensure_contract(&self, contract: &TypeRef) -> Result<bool, RegistryError> {
        let Some(def) = self.catalog.get(contract.name()) else {
            return Ok(false);
        };
        if def.kind != TypeKind::Contract {
            return Err(RegistryError::NotAContract(contract.clone()));
        }
        if contract.is_bound() && contract.args().len() != def.arity() {
            return Err(RegistryError::ArityMismatch {
                type_ref: contract.clone(),
                expected: def.arity(),
                actual: contract.args().len(),
            });
        }
        Ok(true)
    }

    fn mask_default(&self, contract: &TypeRef) -> Option<TypeRef> {
        let first = self.masks.cached_default_implementation_class(contract)?.first()?;
        match first.default_implementation() {
            Some(concrete) => Some(concrete.clone()),
            None => {
                self.logger.trace(
                    "Mask record has no implementation, falling through",
                    Some(json!({ "tag": first.tag, "contract": contract.to_string() })),
                );
                None
            }
        }
    }

    /// Override, then schema-tag default, then first direct implementer.
    pub fn resolve_default_implementation(
        &self,
        contract: &TypeRef,
    ) -> Result<Option<TypeRef>, RegistryError> {
        if !self.ensure_contract(contract)? {
            self.logger.trace(
                "Unknown contract",
                Some(json!({ "contract": contract.to_string() })),
            );
            return Ok(None);
        }
        let resolved = self
            .overrides
            .resolve(contract)
            .or_else(|| self.mask_default(contract))
            .or_else(|| self.implementations.default_implementation(contract).cloned());
        self.logger.trace(
            "Resolved default implementation",
            Some(json!({
                "contract": contract.to_string(),
                "concrete": resolved.as_ref().map(ToString::to_string),
            })),
        );
        Ok(resolved)
    }

    pub fn resolve_deserializer_implementation(
        &self,
        contract: &TypeRef,
    ) -> Result<Option<TypeRef>, RegistryError> {
        if !self.ensure_contract(contract)? {
            return Ok(None);
        }
        Ok(self.overrides.resolve(contract))
    }

    pub fn resolve_property_element(
        &self,
        owner: &TypeRef,
        property: &str,
    ) -> Result<Option<TypeRef>, RegistryError> {
        let Some(element) = self.overrides.property_element(owner.name(), property) else {
            return Ok(None);
        };
        let element = element.clone();
        self.resolve_default_implementation(&element)
    }

    pub fn mask_schema_interface_info(&self, tag: &str) -> Option<&[MaskInfo]> {
        self.masks.mask_schema_interface_info(tag)
    }

    pub fn cached_default_implementation_class(&self, contract: &TypeRef) -> Option<&[MaskInfo]> {
        self.masks.cached_default_implementation_class(contract)
    }

    pub fn direct_implementers(&self, contract: &TypeRef) -> Option<&[TypeRef]> {
        self.implementations.implementers(contract)
    }

    pub fn override_for(&self, contract: &TypeRef) -> Option<&OverrideEntry> {
        self.overrides.get(contract)
    }

    pub fn kind_of(&self, name: &str) -> Option<TypeKind> {
        self.catalog.kind_of(name)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.masks.tags()
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            modules: self.modules.clone(),
            definitions: self.catalog.len(),
            contracts_with_implementers: self.implementations.len(),
            tags: self.masks.tags().count(),
            mask_records: self.masks.record_count(),
            overrides: self.overrides.len(),
            property_hints: self.overrides.property_count(),
        }
    }

    fn canonical_dump(&self) -> Value {
        let masks: BTreeMap<&str, &[MaskInfo]> = self
            .masks
            .tags()
            .filter_map(|tag| {
                self.masks
                    .mask_schema_interface_info(tag)
                    .map(|infos| (tag, infos))
            })
            .collect();
        let implementations: BTreeMap<String, Vec<String>> = self
            .implementations
            .iter()
            .map(|(contract, concretes)| {
                (
                    contract.to_string(),
                    concretes.iter().map(ToString::to_string).collect(),
                )
            })
            .collect();
        let overrides: Vec<&OverrideEntry> = self.overrides.entries().collect();
        json!({
            "masks": masks,
            "implementations": implementations,
            "overrides": overrides,
        })
    }

    /// SHA-256 over a canonical dump of all three indices.
    pub fn fingerprint(&self) -> String {
        let dump = self.canonical_dump().to_string();
        let mut hasher = Sha256::new();
        hasher.update(dump.as_bytes());
        hex::encode(hasher.finalize())
    }
}
