use std::collections::{HashMap, HashSet};

use crate::scanner::{Catalog, ScanResult};
use crate::types::{TypeKind, TypeRef};

fn super_contracts(catalog: &Catalog, contract: &TypeRef) -> Vec<TypeRef> {
    let Some(def) = catalog.get(contract.name()) else {
        return Vec::new();
    };
    if !def.is_contract() {
        return Vec::new();
    }
    def.declares
        .iter()
        .map(|parent| parent.instantiate(&def.params, contract.args()))
        .collect()
}

/// Every contract `contract` extends, transitively, excluding itself.
pub fn contract_ancestors(catalog: &Catalog, contract: &TypeRef) -> Vec<TypeRef> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    seen.insert(contract.clone());

    let mut stack = super_contracts(catalog, contract);
    stack.reverse();
    while let Some(next) = stack.pop() {
        if !seen.insert(next.clone()) {
            continue;
        }
        let mut parents = super_contracts(catalog, &next);
        parents.reverse();
        stack.extend(parents);
        out.push(next);
    }
    out
}

/// Full capability set of a concrete type: declared contracts, everything they
/// extend, and whatever its base types bring along.
pub fn capabilities(catalog: &Catalog, concrete: &TypeRef) -> Vec<TypeRef> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut visited = HashSet::new();

    let mut current = Some(concrete.clone());
    while let Some(ty) = current.take() {
        if !visited.insert(ty.clone()) {
            break;
        }
        let Some(def) = catalog.get(ty.name()) else {
            break;
        };
        for declared in &def.declares {
            let declared = declared.instantiate(&def.params, ty.args());
            if catalog.kind_of(declared.name()) == Some(TypeKind::Concrete) {
                continue;
            }
            let ancestors = contract_ancestors(catalog, &declared);
            for contract in std::iter::once(declared).chain(ancestors) {
                if seen.insert(contract.clone()) {
                    out.push(contract);
                }
            }
        }
        current = def
            .base
            .as_ref()
            .map(|base| base.instantiate(&def.params, ty.args()));
    }
    out
}

/// Capabilities of `concrete` that are not merely inherited through a more
/// specific contract in the same set.
pub fn direct_capabilities(catalog: &Catalog, concrete: &TypeRef) -> Vec<TypeRef> {
    let all = capabilities(catalog, concrete);
    let inherited: HashSet<TypeRef> = all
        .iter()
        .flat_map(|contract| contract_ancestors(catalog, contract))
        .collect();
    all.into_iter()
        .filter(|contract| !inherited.contains(contract))
        .collect()
}

#[derive(Clone, Debug, Default)]
pub struct ImplementationIndex {
    buckets: HashMap<TypeRef, Vec<TypeRef>>,
}

impl ImplementationIndex {
    pub fn build(scan: &ScanResult) -> Self {
        let mut buckets: HashMap<TypeRef, Vec<TypeRef>> = HashMap::new();
        for concrete in &scan.concretes {
            let concrete_ref = concrete.type_ref();
            for contract in direct_capabilities(&scan.catalog, &concrete_ref) {
                buckets.entry(contract).or_default().push(concrete_ref.clone());
            }
        }
        Self { buckets }
    }

    pub fn implementers(&self, contract: &TypeRef) -> Option<&[TypeRef]> {
        self.buckets.get(contract).map(Vec::as_slice)
    }

    pub fn default_implementation(&self, contract: &TypeRef) -> Option<&TypeRef> {
        self.implementers(contract).and_then(<[TypeRef]>::first)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TypeRef, &[TypeRef])> {
        self.buckets
            .iter()
            .map(|(contract, concretes)| (contract, concretes.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
