use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use crate::logging::Logger;
use crate::types::{TypeDef, TypeKind};
use crate::universe::TypeUniverse;

/// Every definition seen in a non-dynamic module, generic definitions
/// included, in scan order. First definition of a name wins.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    by_name: HashMap<String, Arc<TypeDef>>,
    order: Vec<Arc<TypeDef>>,
}

impl Catalog {
    fn insert(&mut self, def: Arc<TypeDef>) -> bool {
        if self.by_name.contains_key(&def.name) {
            return false;
        }
        self.by_name.insert(def.name.clone(), def.clone());
        self.order.push(def);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TypeDef>> {
        self.by_name.get(name)
    }

    pub fn kind_of(&self, name: &str) -> Option<TypeKind> {
        self.get(name).map(|def| def.kind)
    }

    pub fn arity_of(&self, name: &str) -> Option<usize> {
        self.get(name).map(|def| def.arity())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TypeDef>> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct ScanResult {
    pub modules: Vec<String>,
    pub contracts: Vec<Arc<TypeDef>>,
    pub concretes: Vec<Arc<TypeDef>>,
    pub catalog: Catalog,
}

/// Walks every source of the universe once. Sources that fail to load and
/// dynamic modules are skipped; generic definitions only land in the catalog.
pub fn scan(universe: &TypeUniverse, logger: &Logger) -> ScanResult {
    let mut result = ScanResult::default();

    for source in universe.sources() {
        let module = match source.load() {
            Ok(module) => module,
            Err(err) => {
                logger.warn(
                    "Skipping type module that could not be loaded",
                    Some(json!({ "module": source.name(), "error": format!("{err:#}") })),
                );
                continue;
            }
        };
        if module.dynamic {
            logger.debug(
                "Skipping dynamic type module",
                Some(json!({ "module": module.name })),
            );
            continue;
        }

        for def in module.types {
            let def = Arc::new(def);
            if !result.catalog.insert(def.clone()) {
                logger.warn(
                    "Ignoring duplicate type definition",
                    Some(json!({ "module": module.name, "type": def.name })),
                );
                continue;
            }
            if def.is_generic_definition() {
                if !def.tags.is_empty() {
                    logger.warn(
                        "Ignoring schema tags on a generic definition",
                        Some(json!({ "module": module.name, "type": def.name, "tags": def.tags })),
                    );
                }
                continue;
            }
            match def.kind {
                TypeKind::Contract => result.contracts.push(def),
                TypeKind::Concrete => result.concretes.push(def),
            }
        }
        result.modules.push(module.name);
    }

    logger.debug(
        "Type universe scanned",
        Some(json!({
            "modules": result.modules.len(),
            "contracts": result.contracts.len(),
            "concretes": result.concretes.len(),
            "definitions": result.catalog.len(),
        })),
    );
    result
}
