//! Compiler artifacts and library linking

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::abi::Abi;
use crate::convert::{strip_0x, Address};
use crate::AbiError;

/// Byte range of one library address placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkOffset {
    /// Byte offset into the bytecode
    pub start: usize,
    /// Placeholder length in bytes (always 20)
    pub length: usize,
}

/// `source file -> library name -> placeholder ranges`
pub type LinkReferenceMap = BTreeMap<String, BTreeMap<String, Vec<LinkOffset>>>;

/// Bytecode that may still contain library placeholders
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkableBytecode {
    object: String,
    link_references: LinkReferenceMap,
}

impl LinkableBytecode {
    /// Bytecode hex (prefix optional) with its link references
    pub fn new(object: &str, link_references: LinkReferenceMap) -> Self {
        Self {
            object: strip_0x(object.trim()).to_string(),
            link_references,
        }
    }

    /// Fully linked bytecode hex
    pub fn from_hex(object: &str) -> Self {
        Self::new(object, LinkReferenceMap::new())
    }

    /// Hex text without prefix; placeholders are left untouched
    pub fn object(&self) -> &str {
        &self.object
    }

    /// Placeholder ranges by file and library
    pub fn link_references(&self) -> &LinkReferenceMap {
        &self.link_references
    }

    /// Names of every referenced library
    pub fn libraries(&self) -> BTreeSet<String> {
        self.link_references
            .values()
            .flat_map(|libs| libs.keys().cloned())
            .collect()
    }

    /// Whether no library reference remains
    pub fn is_linked(&self) -> bool {
        self.link_references.values().all(BTreeMap::is_empty)
    }

    /// Whether there is no code at all
    pub fn is_empty(&self) -> bool {
        self.object.is_empty()
    }

    /// Overwrite every placeholder with its library's address and decode
    pub fn link(&self, libraries: &HashMap<String, Address>) -> Result<Vec<u8>, AbiError> {
        let mut code = self.object.as_bytes().to_vec();

        for (file, libs) in &self.link_references {
            for (name, offsets) in libs {
                let address = libraries
                    .get(name)
                    .ok_or_else(|| AbiError::UnlinkedLibrary(format!("{}:{}", file, name)))?;
                let address_hex = hex::encode(address.as_bytes());

                for offset in offsets {
                    if offset.length != 20 {
                        return Err(AbiError::InvalidBytecode(format!(
                            "link reference to {} has length {}, expected 20",
                            name, offset.length
                        )));
                    }
                    let range = offset
                        .start
                        .checked_mul(2)
                        .and_then(|start| Some(start..start.checked_add(address_hex.len())?))
                        .filter(|range| range.end <= code.len());
                    let Some(range) = range else {
                        return Err(AbiError::InvalidBytecode(format!(
                            "link reference to {} at byte {} is outside the bytecode",
                            name, offset.start
                        )));
                    };
                    let (start, end) = (range.start, range.end);
                    code[start..end].copy_from_slice(address_hex.as_bytes());
                }
            }
        }

        hex::decode(&code).map_err(|e| {
            AbiError::InvalidBytecode(format!("bytecode is not valid hex after linking: {}", e))
        })
    }

    /// Decode bytecode that references no library
    pub fn to_bytes(&self) -> Result<Vec<u8>, AbiError> {
        self.link(&HashMap::new())
    }
}

/// Compiled contract: ABI plus (linkable) bytecode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractArtifact {
    /// Contract name
    pub contract_name: String,
    /// JSON ABI
    pub abi: Abi,
    /// Creation bytecode
    pub bytecode: LinkableBytecode,
    /// Runtime bytecode, when present
    pub deployed_bytecode: Option<LinkableBytecode>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawArtifact {
    Nested(NestedArtifact),
    Flat(FlatArtifact),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NestedArtifact {
    #[serde(default)]
    contract_name: String,
    compiler_output: CompilerOutput,
}

#[derive(Deserialize)]
struct CompilerOutput {
    abi: Abi,
    evm: EvmOutput,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EvmOutput {
    bytecode: RawBytecode,
    #[serde(default)]
    deployed_bytecode: Option<RawBytecode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBytecode {
    #[serde(default)]
    object: String,
    #[serde(default)]
    link_references: Option<LinkReferenceMap>,
}

impl From<RawBytecode> for LinkableBytecode {
    fn from(raw: RawBytecode) -> Self {
        LinkableBytecode::new(&raw.object, raw.link_references.unwrap_or_default())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlatArtifact {
    #[serde(default)]
    contract_name: String,
    abi: Abi,
    bytecode: String,
    #[serde(default)]
    deployed_bytecode: Option<String>,
    #[serde(default)]
    link_references: Option<LinkReferenceMap>,
    #[serde(default)]
    deployed_link_references: Option<LinkReferenceMap>,
}

impl ContractArtifact {
    /// Parse either the nested compiler-output layout or the flat layout
    pub fn from_json(json: &str) -> Result<Self, AbiError> {
        let raw: RawArtifact = serde_json::from_str(json)?;
        Ok(match raw {
            RawArtifact::Nested(nested) => Self {
                contract_name: nested.contract_name,
                abi: nested.compiler_output.abi,
                bytecode: nested.compiler_output.evm.bytecode.into(),
                deployed_bytecode: nested.compiler_output.evm.deployed_bytecode.map(Into::into),
            },
            RawArtifact::Flat(flat) => Self {
                contract_name: flat.contract_name,
                abi: flat.abi,
                bytecode: LinkableBytecode::new(
                    &flat.bytecode,
                    flat.link_references.unwrap_or_default(),
                ),
                deployed_bytecode: flat.deployed_bytecode.map(|code| {
                    LinkableBytecode::new(&code, flat.deployed_link_references.unwrap_or_default())
                }),
            },
        })
    }

    /// Artifact built in code
    pub fn new(contract_name: impl Into<String>, abi: Abi, bytecode: LinkableBytecode) -> Self {
        Self {
            contract_name: contract_name.into(),
            abi,
            bytecode,
            deployed_bytecode: None,
        }
    }

    /// Libraries the creation bytecode must be linked against
    pub fn libraries(&self) -> BTreeSet<String> {
        self.bytecode.libraries()
    }
}
