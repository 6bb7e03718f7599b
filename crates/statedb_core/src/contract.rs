//! Governing-contract loading boundary.

use crate::error::ContractError;
use crate::lifecycle::content::DEFAULT_CONTRACT;
use crate::types::PartitionId;

/// Loads the governing smart-contract definition for a new partition.
pub trait ContractLoader: Send + Sync {
    /// Returns the default contract source for a freshly created partition.
    ///
    /// # Errors
    ///
    /// Returns an error if no definition can be produced; the enclosing
    /// state creation is then rolled back.
    fn load_default_contract(&self, partition: PartitionId) -> Result<String, ContractError>;
}

/// Loader that serves the built-in bootstrap contract.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticContractLoader;

impl StaticContractLoader {
    /// Creates a new loader.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ContractLoader for StaticContractLoader {
    fn load_default_contract(&self, _partition: PartitionId) -> Result<String, ContractError> {
        Ok(DEFAULT_CONTRACT.to_owned())
    }
}
