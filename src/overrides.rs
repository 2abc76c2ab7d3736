use std::collections::HashMap;

use serde::Serialize;
use serde_json::json;

use crate::error::RegistryError;
use crate::logging::Logger;
use crate::scanner::Catalog;
use crate::types::{TypeKind, TypeRef};
use crate::universe::{ARRAY_LIST, HASH_MAP, KEY_VALUE_MAP, ORDERED_LIST};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideOrigin {
    Builtin,
    Config,
    Annotation,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OverrideEntry {
    pub contract: TypeRef,
    pub concrete: TypeRef,
    pub arity: usize,
    pub origin: OverrideOrigin,
}

#[derive(Clone, Debug, Default)]
pub struct OverrideIndex {
    entries: HashMap<TypeRef, OverrideEntry>,
    order: Vec<TypeRef>,
    properties: HashMap<(String, String), TypeRef>,
}

/// Arguments still open on `reference`: the definition's arity for an unbound
/// reference to a generic definition, zero otherwise.
fn open_arity(catalog: &Catalog, reference: &TypeRef) -> Result<usize, RegistryError> {
    let declared = catalog.arity_of(reference.name()).unwrap_or(0);
    if reference.is_bound() {
        if declared != 0 && declared != reference.args().len() {
            return Err(RegistryError::ArityMismatch {
                type_ref: reference.clone(),
                expected: declared,
                actual: reference.args().len(),
            });
        }
        return Ok(0);
    }
    Ok(declared)
}

impl OverrideIndex {
    pub fn with_builtins(catalog: &Catalog) -> Result<Self, RegistryError> {
        let mut index = OverrideIndex::default();
        index.insert(
            catalog,
            TypeRef::named(ORDERED_LIST),
            TypeRef::named(ARRAY_LIST),
            OverrideOrigin::Builtin,
        )?;
        index.insert(
            catalog,
            TypeRef::named(KEY_VALUE_MAP),
            TypeRef::named(HASH_MAP),
            OverrideOrigin::Builtin,
        )?;
        Ok(index)
    }

    /// First entry for a contract wins; `Ok(false)` when one already existed.
    pub fn insert(
        &mut self,
        catalog: &Catalog,
        contract: TypeRef,
        concrete: TypeRef,
        origin: OverrideOrigin,
    ) -> Result<bool, RegistryError> {
        if catalog.kind_of(contract.name()) == Some(TypeKind::Concrete) {
            return Err(RegistryError::NotAContract(contract));
        }
        match catalog.kind_of(concrete.name()) {
            Some(TypeKind::Concrete) => {}
            Some(TypeKind::Contract) => return Err(RegistryError::NotConcrete(concrete)),
            None => return Err(RegistryError::UnknownType(concrete)),
        }
        let contract_arity = open_arity(catalog, &contract)?;
        let concrete_arity = open_arity(catalog, &concrete)?;
        if contract_arity != concrete_arity {
            return Err(RegistryError::ArityMismatch {
                type_ref: concrete,
                expected: contract_arity,
                actual: concrete_arity,
            });
        }
        if self.entries.contains_key(&contract) {
            return Ok(false);
        }
        self.order.push(contract.clone());
        self.entries.insert(
            contract.clone(),
            OverrideEntry {
                contract,
                concrete,
                arity: concrete_arity,
                origin,
            },
        );
        Ok(true)
    }

    /// Picks up `deserialize_as`, `preferred_for` and property annotations
    /// from every catalogued definition. Bad annotations are logged and skipped.
    pub fn apply_annotations(&mut self, catalog: &Catalog, logger: &Logger) {
        for def in catalog.iter() {
            let mut pairs = Vec::new();
            match def.kind {
                TypeKind::Contract => {
                    if let Some(target) = &def.deserialize_as {
                        pairs.push((def.type_ref(), def.unbind(target)));
                    }
                }
                TypeKind::Concrete => {
                    for contract in &def.preferred_for {
                        pairs.push((def.unbind(contract), def.type_ref()));
                    }
                    for (wire_name, element) in &def.properties {
                        self.properties
                            .entry((def.name.clone(), wire_name.clone()))
                            .or_insert_with(|| element.clone());
                    }
                }
            }

            for (contract, concrete) in pairs {
                let inserted = self.insert(
                    catalog,
                    contract.clone(),
                    concrete.clone(),
                    OverrideOrigin::Annotation,
                );
                match inserted {
                    Ok(true) => {}
                    Ok(false) => logger.debug(
                        "Override already registered, annotation ignored",
                        Some(json!({
                            "declaredOn": def.name,
                            "contract": contract.to_string(),
                            "concrete": concrete.to_string(),
                        })),
                    ),
                    Err(err) => logger.warn(
                        "Rejected deserializer annotation",
                        Some(json!({
                            "declaredOn": def.name,
                            "contract": contract.to_string(),
                            "concrete": concrete.to_string(),
                            "error": err.to_string(),
                        })),
                    ),
                }
            }
        }
    }

    pub fn get(&self, contract: &TypeRef) -> Option<&OverrideEntry> {
        self.entries.get(contract)
    }

    /// Exact entry first; for a closed generic contract, falls back to the
    /// entry of its definition and binds the same arguments into the target.
    pub fn resolve(&self, contract: &TypeRef) -> Option<TypeRef> {
        if let Some(entry) = self.entries.get(contract) {
            return Some(entry.concrete.clone());
        }
        if !contract.is_bound() {
            return None;
        }
        let entry = self.entries.get(&contract.definition())?;
        if entry.arity == 0 {
            return Some(entry.concrete.clone());
        }
        if entry.arity != contract.args().len() {
            return None;
        }
        Some(entry.concrete.with_args(contract.args()))
    }

    pub fn property_element(&self, owner: &str, property: &str) -> Option<&TypeRef> {
        self.properties
            .get(&(owner.to_string(), property.to_string()))
    }

    pub fn entries(&self) -> impl Iterator<Item = &OverrideEntry> {
        self.order.iter().filter_map(|contract| self.entries.get(contract))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }
}
