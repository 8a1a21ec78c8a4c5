//! Top-level orchestration of one public-function invocation.

use std::fmt::{self, Display};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};
use public_vm_common::{ContractAddress, FunctionSelector, Scalar};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::{BlockHeader, Gas, GlobalVariables, TxContext};
use crate::db::{CommitmentsDb, ContractsDb, PublicStateDb};
use crate::environment::{CallMode, EnvironmentError, ExecutionEnvironment};
use crate::interpreter::{Interpreter, InterpreterError};
use crate::journal::host_storage::HostStorage;
use crate::journal::{JournalError, StateJournal};
use crate::machine::MachineState;
use crate::result::{resolve_function_name, ExecutionResult};
use crate::side_effects::SideEffectCounter;

/// One top-level public-function invocation request, as assembled by the
/// node layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub contract_address: ContractAddress,
    pub function_selector: FunctionSelector,
    /// The transaction-level origin of the call.
    pub sender: ContractAddress,
    /// Raw argument scalars; the environment prepends the context-inputs
    /// prefix.
    pub args: Vec<Scalar>,
    pub call_mode: CallMode,
}

/// Aggregated side-effect counts over a whole result tree. Nonzero counts
/// under a static call are a protocol violation, not a revert.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SideEffectTotals {
    pub note_hashes: usize,
    pub nullifiers: usize,
    pub storage_writes: usize,
    pub l2_to_l1_messages: usize,
    pub unencrypted_logs: usize,
}

impl SideEffectTotals {
    /// Tallies the mutating side effects of `result` and every nested
    /// result.
    pub fn tally(result: &ExecutionResult) -> Self {
        let mut totals = Self {
            note_hashes: result.note_hashes.len(),
            nullifiers: result.nullifiers.len(),
            storage_writes: result.storage_writes.len(),
            l2_to_l1_messages: result.l2_to_l1_messages.len(),
            unencrypted_logs: result.unencrypted_logs.len(),
        };
        for nested in &result.nested_executions {
            let nested_totals = Self::tally(nested);
            totals.note_hashes += nested_totals.note_hashes;
            totals.nullifiers += nested_totals.nullifiers;
            totals.storage_writes += nested_totals.storage_writes;
            totals.l2_to_l1_messages += nested_totals.l2_to_l1_messages;
            totals.unencrypted_logs += nested_totals.unencrypted_logs;
        }
        totals
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Display for SideEffectTotals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} note hash(es), {} nullifier(s), {} storage write(s), {} L2-to-L1 message(s), {} log(s)",
            self.note_hashes,
            self.nullifiers,
            self.storage_writes,
            self.l2_to_l1_messages,
            self.unencrypted_logs
        )
    }
}

/// Failures of a top-level invocation. A contract revert is not among them:
/// reverts complete normally and surface inside [`ExecutionResult`].
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// A static call (including its nested calls) produced observable side
    /// effects. Signals a correctness bug in the interpreter or the caller.
    #[error("static call produced side effects: {0}")]
    StaticCallViolation(SideEffectTotals),

    /// An unsupported call-mode derivation was requested.
    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    /// The interpreter faulted (as opposed to a contract revert).
    #[error(transparent)]
    Interpreter(#[from] InterpreterError),

    /// The journal could not commit to durable storage.
    #[error(transparent)]
    Journal(#[from] JournalError),
}

/// Executes public-function requests against journaled world state.
///
/// Holds the injected database collaborators, the fixed block header the
/// call tree is anchored to, and the bytecode interpreter. One executor may
/// serve many `simulate` calls; each call gets its own journal, environment
/// and machine state.
pub struct PublicExecutor<I> {
    state_db: Arc<dyn PublicStateDb>,
    contracts_db: Arc<dyn ContractsDb>,
    commitments_db: Arc<dyn CommitmentsDb>,
    header: Arc<BlockHeader>,
    interpreter: I,
}

impl<I: Interpreter> PublicExecutor<I> {
    pub fn new(
        state_db: Arc<dyn PublicStateDb>,
        contracts_db: Arc<dyn ContractsDb>,
        commitments_db: Arc<dyn CommitmentsDb>,
        header: BlockHeader,
        interpreter: I,
    ) -> Self {
        Self {
            state_db,
            contracts_db,
            commitments_db,
            header: Arc::new(header),
            interpreter,
        }
    }

    /// Runs one top-level public-function invocation to completion and
    /// commits its world-state effects.
    ///
    /// `pending_nullifiers` carries siloed nullifiers from earlier phases of
    /// the transaction; `start_side_effect_counter` seeds the ordinal
    /// sequence so consecutive top-level calls don't overlap. Protocol
    /// invariants are validated before anything durable is written.
    #[allow(clippy::too_many_arguments)]
    pub fn simulate(
        &self,
        request: &ExecutionRequest,
        global_variables: GlobalVariables,
        available_gas: Gas,
        tx_context: TxContext,
        pending_nullifiers: &[Scalar],
        transaction_fee: Scalar,
        start_side_effect_counter: SideEffectCounter,
    ) -> Result<ExecutionResult, ExecutorError> {
        let function_name = resolve_function_name(
            self.contracts_db.as_ref(),
            request.contract_address,
            request.function_selector,
        );
        debug!("executing public function {function_name}");
        let started = Instant::now();

        let storage = HostStorage::new(
            Arc::clone(&self.state_db),
            Arc::clone(&self.contracts_db),
            Arc::clone(&self.commitments_db),
        );
        let mut journal = StateJournal::new(storage, start_side_effect_counter);
        for siloed in pending_nullifiers {
            journal.seed_nullifier(*siloed);
        }

        let environment = ExecutionEnvironment::new(
            request.contract_address,
            request.sender,
            request.call_mode,
            request.args.clone(),
            request.function_selector,
            Arc::clone(&self.header),
            Arc::new(global_variables),
            tx_context.gas_settings,
            transaction_fee,
        );
        let mut machine = MachineState::new(available_gas);

        // A fault aborts here, before anything durable happens. A revert is
        // data and flows through.
        let output = self
            .interpreter
            .execute(&mut journal, &environment, &mut machine)?;
        let bytecode_size = output.bytecode.len();

        let result = ExecutionResult::from_frame(output, function_name.clone(), self.contracts_db.as_ref());

        // Validate protocol invariants before the irreversible commit.
        if request.call_mode.is_static() {
            let totals = SideEffectTotals::tally(&result);
            if !totals.is_empty() {
                return Err(ExecutorError::StaticCallViolation(totals));
            }
        }

        journal.commit()?;

        match &result.revert_reason {
            Some(reason) => info!(
                "{function_name} returned, reverted: true, reason: {reason} \
                 (duration: {:?}, bytecode size: {bytecode_size})",
                started.elapsed()
            ),
            None => info!(
                "{function_name} returned, reverted: {} \
                 (duration: {:?}, bytecode size: {bytecode_size})",
                result.reverted,
                started.elapsed()
            ),
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_result() -> ExecutionResult {
        ExecutionResult {
            contract_address: ContractAddress::from(1),
            function_selector: FunctionSelector::new(1),
            calldata: vec![],
            reverted: false,
            revert_reason: None,
            note_hashes: vec![],
            nullifiers: vec![],
            storage_reads: vec![],
            storage_writes: vec![],
            l2_to_l1_messages: vec![],
            unencrypted_logs: vec![],
            nested_executions: vec![],
            gas_used: Gas::ZERO,
            bytecode: vec![],
            function_name: "test".to_string(),
        }
    }

    #[test]
    fn totals_aggregate_across_nesting() {
        use crate::side_effects::{NoteHash, StorageWrite};

        let mut grandchild = empty_result();
        grandchild.storage_writes.push(StorageWrite {
            slot: Scalar::ONE,
            new_value: Scalar::ONE,
            counter: 3,
        });
        let mut child = empty_result();
        child.note_hashes.push(NoteHash {
            value: Scalar::ONE,
            counter: 2,
        });
        child.nested_executions.push(grandchild);
        let mut top = empty_result();
        top.nested_executions.push(child);

        let totals = SideEffectTotals::tally(&top);
        assert_eq!(totals.note_hashes, 1);
        assert_eq!(totals.storage_writes, 1);
        assert!(!totals.is_empty());
        assert!(SideEffectTotals::tally(&empty_result()).is_empty());
    }

    #[test]
    fn storage_reads_do_not_count_as_violations() {
        use crate::side_effects::StorageRead;

        let mut result = empty_result();
        result.storage_reads.push(StorageRead {
            slot: Scalar::ONE,
            current_value: Scalar::ZERO,
            counter: 0,
        });
        assert!(SideEffectTotals::tally(&result).is_empty());
    }
}
