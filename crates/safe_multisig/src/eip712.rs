//! EIP-712 type definitions used by the different Safe contract versions.

use alloy_primitives::{keccak256, B256};
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SafeError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EIP712Field {
    #[serde(rename = "type")]
    pub field_type: String,
    pub name: String,
}

impl EIP712Field {
    fn new(field_type: &str, name: &str) -> Self {
        Self { field_type: field_type.to_string(), name: name.to_string() }
    }
}

/// The `EIP712Domain` and `SafeTx` struct layouts of one Safe version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EIP712TxTypes {
    #[serde(rename = "EIP712Domain")]
    pub eip712_domain: Vec<EIP712Field>,
    #[serde(rename = "SafeTx")]
    pub safe_tx: Vec<EIP712Field>,
}

impl EIP712TxTypes {
    /// Layout used by the given Safe contract version.
    pub fn for_version(version: &Version) -> Self {
        let domain = if *version < Version::new(1, 3, 0) {
            eip712_domain_before_v130()
        } else {
            eip712_domain()
        };
        // 0.x Safes still called `baseGas` `dataGas`
        let gas_field = if *version < Version::new(1, 0, 0) { "dataGas" } else { "baseGas" };

        Self { eip712_domain: domain, safe_tx: safe_tx_fields(gas_field) }
    }

    /// Whether the domain separator commits to the chain id.
    pub fn domain_has_chain_id(&self) -> bool {
        self.eip712_domain.iter().any(|f| f.name == "chainId")
    }

    pub fn type_hashes(&self) -> Result<SafeTypeHashes> {
        let domain_names: Vec<&str> = self.eip712_domain.iter().map(|f| f.name.as_str()).collect();
        if !matches!(domain_names.as_slice(), ["verifyingContract"] | ["chainId", "verifyingContract"])
        {
            return Err(SafeError::configuration(format!(
                "unsupported EIP712Domain layout {domain_names:?}"
            )));
        }
        if self.safe_tx.len() != 10 {
            return Err(SafeError::configuration(format!(
                "SafeTx must have 10 fields, got {}",
                self.safe_tx.len()
            )));
        }

        Ok(self.hashes())
    }

    fn hashes(&self) -> SafeTypeHashes {
        SafeTypeHashes {
            domain: keccak256(encode_type("EIP712Domain", &self.eip712_domain)),
            safe_tx: keccak256(encode_type("SafeTx", &self.safe_tx)),
            domain_has_chain_id: self.domain_has_chain_id(),
        }
    }
}

/// Type hashes fed into the safeTxHash computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafeTypeHashes {
    pub domain: B256,
    pub safe_tx: B256,
    pub domain_has_chain_id: bool,
}

impl SafeTypeHashes {
    pub fn for_version(version: &Version) -> Self {
        EIP712TxTypes::for_version(version).hashes()
    }

    /// Parses a version string as reported by `VERSION()` or the transaction service,
    /// tolerating suffixes such as `1.3.0+L2`.
    pub fn for_version_str(version: &str) -> Result<Self> {
        let version = parse_safe_version(version)?;
        Ok(Self::for_version(&version))
    }
}

impl Default for SafeTypeHashes {
    fn default() -> Self {
        Self::for_version(&Version::new(1, 3, 0))
    }
}

pub fn parse_safe_version(version: &str) -> Result<Version> {
    let core = version.trim().trim_start_matches('v');
    let core = core.split(['+', '-', ' ']).next().unwrap_or(core);
    Version::parse(core)
        .map_err(|e| SafeError::configuration(format!("invalid safe version {version:?}: {e}")))
}

/// `Name(type1 name1,type2 name2,...)`
pub fn encode_type(name: &str, fields: &[EIP712Field]) -> String {
    let members = fields
        .iter()
        .map(|f| format!("{} {}", f.field_type, f.name))
        .collect::<Vec<_>>()
        .join(",");
    format!("{name}({members})")
}

fn safe_tx_fields(gas_field: &str) -> Vec<EIP712Field> {
    vec![
        EIP712Field::new("address", "to"),
        EIP712Field::new("uint256", "value"),
        EIP712Field::new("bytes", "data"),
        EIP712Field::new("uint8", "operation"),
        EIP712Field::new("uint256", "safeTxGas"),
        EIP712Field::new("uint256", gas_field),
        EIP712Field::new("uint256", "gasPrice"),
        EIP712Field::new("address", "gasToken"),
        EIP712Field::new("address", "refundReceiver"),
        EIP712Field::new("uint256", "nonce"),
    ]
}

fn eip712_domain_before_v130() -> Vec<EIP712Field> {
    vec![EIP712Field::new("address", "verifyingContract")]
}

// Domain for v1.3.0 and later.
fn eip712_domain() -> Vec<EIP712Field> {
    vec![EIP712Field::new("uint256", "chainId"), EIP712Field::new("address", "verifyingContract")]
}
