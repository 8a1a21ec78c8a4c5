//! The seam between the execution core and the bytecode interpreter.
//!
//! Opcode-level stepping and per-instruction gas accounting live outside
//! this crate. The core hands the interpreter one frame's `(journal,
//! environment, machine state)` triple and receives back a raw
//! [`FrameOutput`] covering that frame and, recursively, every nested frame
//! it triggered. A contract-level revert is reported as data inside the
//! output; an `Err` from [`Interpreter::execute`] is a fault that aborts the
//! whole call without committing.

use public_vm_common::{ContractAddress, FunctionSelector, Scalar};
use thiserror::Error;

use crate::context::Gas;
use crate::environment::ExecutionEnvironment;
use crate::journal::{JournalError, StateJournal};
use crate::machine::MachineState;
use crate::side_effects::{
    L2ToL1Message, NoteHash, Nullifier, StorageRead, StorageWrite, UnencryptedLog,
};

/// Faults raised by the interpreter. Distinct from contract reverts, which
/// complete normally and are carried in [`FrameOutput::reverted`].
#[derive(Debug, Error)]
pub enum InterpreterError {
    /// No public bytecode is registered for the dispatched function.
    #[error("no public bytecode registered for {address}:{selector}")]
    BytecodeNotFound {
        address: ContractAddress,
        selector: FunctionSelector,
    },

    /// A journal operation failed.
    #[error(transparent)]
    Journal(#[from] JournalError),

    /// Any other interpreter-internal fault.
    #[error("interpreter fault: {0}")]
    Fault(String),
}

/// Raw per-frame execution report.
///
/// Side-effect lists contain only effects that survive this frame's own
/// revert handling; a reverted frame reports empty mutation lists. Nested
/// outputs appear in call order.
#[derive(Clone, Debug)]
pub struct FrameOutput {
    /// The contract and function this frame executed.
    pub address: ContractAddress,
    pub function_selector: FunctionSelector,
    /// The frame's effective calldata (context-inputs prefix included).
    pub calldata: Vec<Scalar>,
    pub reverted: bool,
    pub revert_reason: Option<String>,
    pub note_hashes: Vec<NoteHash>,
    pub nullifiers: Vec<Nullifier>,
    pub storage_reads: Vec<StorageRead>,
    pub storage_writes: Vec<StorageWrite>,
    pub l2_to_l1_messages: Vec<L2ToL1Message>,
    pub unencrypted_logs: Vec<UnencryptedLog>,
    pub nested: Vec<FrameOutput>,
    pub gas_used: Gas,
    /// The bytecode this frame resolved and executed.
    pub bytecode: Vec<u8>,
}

impl FrameOutput {
    /// An empty, successful output for the given frame identity. The
    /// interpreter fills in effects as it executes.
    pub fn new(environment: &ExecutionEnvironment, bytecode: Vec<u8>) -> Self {
        Self {
            address: environment.address,
            function_selector: environment.function_selector,
            calldata: environment.calldata.clone(),
            reverted: false,
            revert_reason: None,
            note_hashes: Vec::new(),
            nullifiers: Vec::new(),
            storage_reads: Vec::new(),
            storage_writes: Vec::new(),
            l2_to_l1_messages: Vec::new(),
            unencrypted_logs: Vec::new(),
            nested: Vec::new(),
            gas_used: Gas::ZERO,
            bytecode,
        }
    }
}

/// A public-function bytecode interpreter.
///
/// Implementations recurse into nested calls themselves, deriving child
/// environments from `environment` and sharing the same journal (and
/// therefore the same side-effect ordinal sequence) across all frames.
pub trait Interpreter {
    fn execute(
        &self,
        journal: &mut StateJournal,
        environment: &ExecutionEnvironment,
        machine: &mut MachineState,
    ) -> Result<FrameOutput, InterpreterError>;
}
