//! The caller-facing result tree of one top-level call.

use public_vm_common::{ContractAddress, FunctionSelector, Scalar};
use serde::{Deserialize, Serialize};

use crate::context::Gas;
use crate::db::ContractsDb;
use crate::interpreter::FrameOutput;
use crate::side_effects::{
    L2ToL1Message, NoteHash, Nullifier, StorageRead, StorageWrite, UnencryptedLog,
};

/// The result of executing one call frame, with the results of every nested
/// call it made in call order. Produced once per frame from the
/// interpreter's raw output.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub contract_address: ContractAddress,
    pub function_selector: FunctionSelector,
    /// Effective calldata of the frame (context-inputs prefix included).
    pub calldata: Vec<Scalar>,
    pub reverted: bool,
    pub revert_reason: Option<String>,
    pub note_hashes: Vec<NoteHash>,
    pub nullifiers: Vec<Nullifier>,
    pub storage_reads: Vec<StorageRead>,
    pub storage_writes: Vec<StorageWrite>,
    pub l2_to_l1_messages: Vec<L2ToL1Message>,
    pub unencrypted_logs: Vec<UnencryptedLog>,
    pub nested_executions: Vec<ExecutionResult>,
    pub gas_used: Gas,
    /// The bytecode the frame resolved and executed.
    pub bytecode: Vec<u8>,
    /// Human-readable function name, or `address:selector` when no debug
    /// metadata is available.
    pub function_name: String,
}

impl ExecutionResult {
    /// Converts a raw frame output into the caller-facing result, resolving
    /// debug names for nested frames along the way.
    pub(crate) fn from_frame(
        output: FrameOutput,
        function_name: String,
        contracts: &dyn ContractsDb,
    ) -> Self {
        let nested_executions = output
            .nested
            .into_iter()
            .map(|nested| {
                let name =
                    resolve_function_name(contracts, nested.address, nested.function_selector);
                Self::from_frame(nested, name, contracts)
            })
            .collect();
        Self {
            contract_address: output.address,
            function_selector: output.function_selector,
            calldata: output.calldata,
            reverted: output.reverted,
            revert_reason: output.revert_reason,
            note_hashes: output.note_hashes,
            nullifiers: output.nullifiers,
            storage_reads: output.storage_reads,
            storage_writes: output.storage_writes,
            l2_to_l1_messages: output.l2_to_l1_messages,
            unencrypted_logs: output.unencrypted_logs,
            nested_executions,
            gas_used: output.gas_used,
            bytecode: output.bytecode,
            function_name,
        }
    }
}

/// Resolves a debug name for a function, degrading to `address:selector` on
/// a missing entry or a database failure.
pub(crate) fn resolve_function_name(
    contracts: &dyn ContractsDb,
    address: ContractAddress,
    selector: FunctionSelector,
) -> String {
    contracts
        .get_debug_function_name(address, selector)
        .ok()
        .flatten()
        .unwrap_or_else(|| format!("{address}:{selector}"))
}
