//! Collaborator contracts consumed by the execution core.
//!
//! Implementations live in the node layer (backed by the archiver, the world
//! state synchronizer, etc.) and may be shared across concurrently running
//! top-level calls; they provide their own consistency discipline. All
//! methods may block on I/O.

use anyhow::Result;
use public_vm_common::{ContractAddress, FunctionSelector, Scalar};

/// Persistent public key/value state.
pub trait PublicStateDb: Send + Sync {
    /// Reads the durable value of `slot` under `contract`, or `None` if the
    /// slot has never been written.
    fn storage_read(&self, contract: ContractAddress, slot: Scalar) -> Result<Option<Scalar>>;

    /// Flushes one final value per touched slot. Invoked exactly once per
    /// top-level call, by the journal's commit step.
    fn commit_writes(&self, writes: &[((ContractAddress, Scalar), Scalar)]) -> Result<()>;
}

/// Contract metadata: bytecode and debug information.
pub trait ContractsDb: Send + Sync {
    /// Resolves a human-readable name for a public function. `None` (and any
    /// error) is non-fatal; callers fall back to `address:selector`.
    fn get_debug_function_name(
        &self,
        address: ContractAddress,
        selector: FunctionSelector,
    ) -> Result<Option<String>>;

    /// Fetches the public bytecode registered for a function.
    fn get_bytecode(
        &self,
        address: ContractAddress,
        selector: FunctionSelector,
    ) -> Result<Option<Vec<u8>>>;
}

/// Historical commitment and nullifier membership data.
pub trait CommitmentsDb: Send + Sync {
    /// Whether a siloed nullifier exists in the nullifier tree as of the
    /// anchored block header.
    fn nullifier_exists(&self, siloed_nullifier: Scalar) -> Result<bool>;
}
