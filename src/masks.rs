use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::RegistryError;
use crate::implementations::ImplementationIndex;
use crate::logging::Logger;
use crate::scanner::ScanResult;
use crate::types::TypeRef;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyTagPolicy {
    Ignore,
    #[default]
    Warn,
    Error,
}

impl FromStr for EmptyTagPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(EmptyTagPolicy::Ignore),
            "warn" => Ok(EmptyTagPolicy::Warn),
            "error" => Ok(EmptyTagPolicy::Error),
            other => Err(anyhow!("unsupported empty tag policy: {other}")),
        }
    }
}

impl fmt::Display for EmptyTagPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EmptyTagPolicy::Ignore => "ignore",
            EmptyTagPolicy::Warn => "warn",
            EmptyTagPolicy::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MaskInfo {
    pub tag: String,
    pub contract: TypeRef,
    pub implementations: Vec<TypeRef>,
}

impl MaskInfo {
    pub fn default_implementation(&self) -> Option<&TypeRef> {
        self.implementations.first()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MaskIndex {
    by_tag: HashMap<String, Vec<MaskInfo>>,
    tag_order: Vec<String>,
    by_contract: HashMap<TypeRef, Vec<MaskInfo>>,
}

impl MaskIndex {
    pub fn build(
        scan: &ScanResult,
        implementations: &ImplementationIndex,
        policy: EmptyTagPolicy,
        logger: &Logger,
    ) -> Result<Self, RegistryError> {
        let mut index = MaskIndex::default();

        // one record per (tag, contract), empty for now
        for contract in &scan.contracts {
            let mut seen_on_contract: Vec<&str> = Vec::new();
            for tag in &contract.tags {
                if seen_on_contract.contains(&tag.as_str()) {
                    continue;
                }
                seen_on_contract.push(tag);
                if !index.by_tag.contains_key(tag) {
                    index.tag_order.push(tag.clone());
                }
                index.by_tag.entry(tag.clone()).or_default().push(MaskInfo {
                    tag: tag.clone(),
                    contract: contract.type_ref(),
                    implementations: Vec::new(),
                });
            }
        }

        for tag in &index.tag_order {
            let Some(records) = index.by_tag.get_mut(tag) else {
                continue;
            };
            for record in records.iter_mut() {
                record.implementations = implementations
                    .implementers(&record.contract)
                    .map(<[TypeRef]>::to_vec)
                    .unwrap_or_default();
                if !record.implementations.is_empty() {
                    continue;
                }
                match policy {
                    EmptyTagPolicy::Ignore => {}
                    EmptyTagPolicy::Warn => logger.warn(
                        "Schema tag has no concrete implementation",
                        Some(json!({
                            "tag": record.tag,
                            "contract": record.contract.to_string(),
                        })),
                    ),
                    EmptyTagPolicy::Error => {
                        logger.error(
                            "Schema tag has no concrete implementation",
                            Some(json!({
                                "tag": record.tag,
                                "contract": record.contract.to_string(),
                            })),
                        );
                        return Err(RegistryError::EmptyMask {
                            tag: record.tag.clone(),
                            contract: record.contract.clone(),
                        });
                    }
                }
            }
        }

        for tag in &index.tag_order {
            for record in index.by_tag.get(tag).into_iter().flatten() {
                index
                    .by_contract
                    .entry(record.contract.clone())
                    .or_default()
                    .push(record.clone());
            }
        }

        Ok(index)
    }

    /// `None` means the tag was never registered. A registered tag always
    /// yields a non-empty slice, though its records may have no implementations.
    pub fn mask_schema_interface_info(&self, tag: &str) -> Option<&[MaskInfo]> {
        self.by_tag.get(tag).map(Vec::as_slice)
    }

    pub fn cached_default_implementation_class(&self, contract: &TypeRef) -> Option<&[MaskInfo]> {
        self.by_contract.get(contract).map(Vec::as_slice)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tag_order.iter().map(String::as_str)
    }

    pub fn record_count(&self) -> usize {
        self.by_tag.values().map(Vec::len).sum()
    }
}
