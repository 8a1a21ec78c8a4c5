//! Block, fee and gas context snapshots consumed read-only by the execution
//! core. All of these are assembled by the node layer and handed in at
//! `simulate` time; none of them are mutated during execution.

use public_vm_common::{ContractAddress, Scalar};
use serde::{Deserialize, Serialize};

/// A two-dimensional gas amount: computation (L2) gas and data-availability
/// gas are budgeted and charged independently.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Gas {
    pub l2_gas: u64,
    pub da_gas: u64,
}

impl Gas {
    pub const ZERO: Gas = Gas {
        l2_gas: 0,
        da_gas: 0,
    };

    pub const fn new(l2_gas: u64, da_gas: u64) -> Self {
        Self { l2_gas, da_gas }
    }

    /// Subtracts `other` per dimension, or `None` if either dimension would
    /// underflow.
    pub fn checked_sub(self, other: Gas) -> Option<Gas> {
        Some(Gas {
            l2_gas: self.l2_gas.checked_sub(other.l2_gas)?,
            da_gas: self.da_gas.checked_sub(other.da_gas)?,
        })
    }

    pub fn saturating_add(self, other: Gas) -> Gas {
        Gas {
            l2_gas: self.l2_gas.saturating_add(other.l2_gas),
            da_gas: self.da_gas.saturating_add(other.da_gas),
        }
    }
}

/// Fee-policy parameters fixed for the duration of a transaction.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct GasSettings {
    /// Upper bound on the gas a single top-level call may consume.
    pub gas_limits: Gas,
    pub max_fee_per_l2_gas: Scalar,
    pub max_fee_per_da_gas: Scalar,
}

/// Transaction-scoped context forwarded from the node layer.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TxContext {
    pub chain_id: Scalar,
    pub version: Scalar,
    pub gas_settings: GasSettings,
}

/// Snapshot of the block being built, fixed across the whole call tree.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct GlobalVariables {
    pub chain_id: Scalar,
    pub version: Scalar,
    pub block_number: u64,
    pub timestamp: u64,
    pub coinbase: ContractAddress,
    pub fee_recipient: ContractAddress,
    /// Current base fee per unit of L2 gas.
    pub fee_per_l2_gas: Scalar,
    /// Current base fee per unit of data-availability gas.
    pub fee_per_da_gas: Scalar,
}

/// Historical state reference against which membership proofs are resolved.
/// Opaque to the execution core; threaded through to the interpreter and the
/// commitments database.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub archive_root: Scalar,
    pub note_hash_tree_root: Scalar,
    pub nullifier_tree_root: Scalar,
    pub public_data_tree_root: Scalar,
    pub block_number: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gas_checked_sub_underflows_per_dimension() {
        let budget = Gas::new(100, 5);
        assert_eq!(budget.checked_sub(Gas::new(40, 5)), Some(Gas::new(60, 0)));
        // Enough L2 gas but not enough DA gas.
        assert_eq!(budget.checked_sub(Gas::new(1, 6)), None);
        assert_eq!(budget.checked_sub(Gas::new(101, 0)), None);
    }

    #[test]
    fn gas_saturating_add_caps_at_max() {
        let near_max = Gas::new(u64::MAX - 1, 0);
        let sum = near_max.saturating_add(Gas::new(10, 3));
        assert_eq!(sum, Gas::new(u64::MAX, 3));
    }
}
