//! A set of utility types and functions to be used by `public_vm_simulator`
//! unit and scenario tests: in-memory database collaborators and a scripted
//! interpreter that drives the real journal, environment and machine-state
//! machinery without an opcode-level VM.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::Result;
use env_logger::{try_init_from_env, Env, DEFAULT_FILTER_ENV};
use public_vm_common::{ContractAddress, FunctionSelector, Scalar};

use crate::context::Gas;
use crate::db::{CommitmentsDb, ContractsDb, PublicStateDb};
use crate::environment::ExecutionEnvironment;
use crate::interpreter::{FrameOutput, Interpreter, InterpreterError};
use crate::journal::StateJournal;
use crate::machine::MachineState;

pub fn init_logger() {
    let _ = try_init_from_env(Env::default().filter_or(DEFAULT_FILTER_ENV, "info"));
}

/// Public state backed by a plain map.
#[derive(Debug, Default)]
pub struct InMemoryStateDb {
    storage: Mutex<HashMap<(ContractAddress, Scalar), Scalar>>,
}

impl InMemoryStateDb {
    /// Reads a committed value directly, bypassing any journal.
    pub fn get(&self, contract: ContractAddress, slot: Scalar) -> Option<Scalar> {
        self.storage.lock().unwrap().get(&(contract, slot)).copied()
    }

    /// Number of committed slots, across all contracts.
    pub fn committed_slot_count(&self) -> usize {
        self.storage.lock().unwrap().len()
    }

    /// Seeds a durable value, as if committed by an earlier block.
    pub fn seed(&self, contract: ContractAddress, slot: Scalar, value: Scalar) {
        self.storage.lock().unwrap().insert((contract, slot), value);
    }
}

impl PublicStateDb for InMemoryStateDb {
    fn storage_read(&self, contract: ContractAddress, slot: Scalar) -> Result<Option<Scalar>> {
        Ok(self.get(contract, slot))
    }

    fn commit_writes(&self, writes: &[((ContractAddress, Scalar), Scalar)]) -> Result<()> {
        let mut storage = self.storage.lock().unwrap();
        for ((contract, slot), value) in writes {
            storage.insert((*contract, *slot), *value);
        }
        Ok(())
    }
}

/// Contract metadata backed by plain maps.
#[derive(Debug, Default)]
pub struct InMemoryContractsDb {
    functions: Mutex<HashMap<(ContractAddress, FunctionSelector), (String, Vec<u8>)>>,
}

impl InMemoryContractsDb {
    pub fn register_function(
        &self,
        address: ContractAddress,
        selector: FunctionSelector,
        name: &str,
        bytecode: Vec<u8>,
    ) {
        self.functions
            .lock()
            .unwrap()
            .insert((address, selector), (name.to_string(), bytecode));
    }
}

impl ContractsDb for InMemoryContractsDb {
    fn get_debug_function_name(
        &self,
        address: ContractAddress,
        selector: FunctionSelector,
    ) -> Result<Option<String>> {
        Ok(self
            .functions
            .lock()
            .unwrap()
            .get(&(address, selector))
            .map(|(name, _)| name.clone()))
    }

    fn get_bytecode(
        &self,
        address: ContractAddress,
        selector: FunctionSelector,
    ) -> Result<Option<Vec<u8>>> {
        Ok(self
            .functions
            .lock()
            .unwrap()
            .get(&(address, selector))
            .map(|(_, bytecode)| bytecode.clone()))
    }
}

/// Historical nullifier membership backed by a set of siloed values.
#[derive(Debug, Default)]
pub struct InMemoryCommitmentsDb {
    nullifiers: Mutex<HashSet<Scalar>>,
}

impl InMemoryCommitmentsDb {
    pub fn insert_historical_nullifier(&self, siloed: Scalar) {
        self.nullifiers.lock().unwrap().insert(siloed);
    }
}

impl CommitmentsDb for InMemoryCommitmentsDb {
    fn nullifier_exists(&self, siloed_nullifier: Scalar) -> Result<bool> {
        Ok(self.nullifiers.lock().unwrap().contains(&siloed_nullifier))
    }
}

/// One step of a scripted test program.
#[derive(Clone, Debug)]
pub enum TestOp {
    ReadStorage {
        slot: Scalar,
    },
    WriteStorage {
        slot: Scalar,
        value: Scalar,
    },
    CheckNullifier {
        value: Scalar,
    },
    InsertNullifier {
        value: Scalar,
    },
    InsertNoteHash {
        value: Scalar,
    },
    SendL2ToL1Message {
        recipient: Scalar,
        content: Scalar,
    },
    EmitLog {
        data: Vec<u8>,
    },
    BurnGas {
        amount: Gas,
    },
    /// Nested call into `target`, running the embedded program.
    Call {
        target: ContractAddress,
        selector: FunctionSelector,
        calldata: Vec<Scalar>,
        program: Vec<TestOp>,
    },
    /// Nested static call into `target`, running the embedded program.
    StaticCall {
        target: ContractAddress,
        selector: FunctionSelector,
        calldata: Vec<Scalar>,
        program: Vec<TestOp>,
    },
    /// Contract-level revert of the current frame.
    Revert {
        reason: String,
    },
    /// Interpreter-internal fault, aborting the whole call tree.
    Fault {
        message: String,
    },
}

/// Interpreter that executes declarative [`TestOp`] programs through the
/// real journal/environment/machine objects, recursing into nested calls
/// the way a bytecode VM would.
#[derive(Clone, Debug)]
pub struct ScriptedInterpreter {
    program: Vec<TestOp>,
}

impl ScriptedInterpreter {
    pub fn new(program: Vec<TestOp>) -> Self {
        Self { program }
    }

    fn run_program(
        &self,
        program: &[TestOp],
        journal: &mut StateJournal,
        environment: &ExecutionEnvironment,
        machine: &mut MachineState,
    ) -> Result<FrameOutput, InterpreterError> {
        let bytecode = journal
            .host()
            .contracts
            .get_bytecode(environment.address, environment.function_selector)
            .map_err(|e| InterpreterError::Fault(e.to_string()))?
            .unwrap_or_default();
        let mut output = FrameOutput::new(environment, bytecode);
        let checkpoint = journal.checkpoint();
        let gas_before = machine.gas_left();

        for op in program {
            match op {
                TestOp::ReadStorage { slot } => {
                    let read = journal.read_storage(environment.storage_address, *slot)?;
                    output.storage_reads.push(read);
                }
                TestOp::WriteStorage { slot, value } => {
                    let write =
                        journal.write_storage(environment.storage_address, *slot, *value);
                    output.storage_writes.push(write);
                }
                TestOp::CheckNullifier { value } => {
                    journal.nullifier_exists(environment.storage_address, *value)?;
                }
                TestOp::InsertNullifier { value } => {
                    let nullifier =
                        journal.insert_nullifier(environment.storage_address, *value)?;
                    output.nullifiers.push(nullifier);
                }
                TestOp::InsertNoteHash { value } => {
                    output.note_hashes.push(journal.insert_note_hash(*value));
                }
                TestOp::SendL2ToL1Message { recipient, content } => {
                    output
                        .l2_to_l1_messages
                        .push(journal.emit_l2_to_l1_message(*recipient, *content));
                }
                TestOp::EmitLog { data } => {
                    output
                        .unencrypted_logs
                        .push(journal.emit_unencrypted_log(environment.address, data.clone()));
                }
                TestOp::BurnGas { amount } => {
                    if machine.consume(*amount).is_err() {
                        // Exceptional halt: the frame reverts and the budget
                        // is exhausted.
                        let _ = machine.consume(machine.gas_left());
                        output.reverted = true;
                        output.revert_reason = Some("out of gas".to_string());
                        break;
                    }
                }
                TestOp::Call {
                    target,
                    selector,
                    calldata,
                    program,
                } => {
                    let child_env = environment.derive_for_nested_call(
                        *target,
                        calldata.clone(),
                        *selector,
                    );
                    let nested = self.run_nested(program, journal, &child_env, machine)?;
                    output.nested.push(nested);
                }
                TestOp::StaticCall {
                    target,
                    selector,
                    calldata,
                    program,
                } => {
                    let child_env = environment.derive_for_nested_static_call(
                        *target,
                        calldata.clone(),
                        *selector,
                    );
                    let nested = self.run_nested(program, journal, &child_env, machine)?;
                    output.nested.push(nested);
                }
                TestOp::Revert { reason } => {
                    output.reverted = true;
                    output.revert_reason = Some(reason.clone());
                    break;
                }
                TestOp::Fault { message } => {
                    return Err(InterpreterError::Fault(message.clone()));
                }
            }
        }

        if output.reverted {
            // Discard this frame's world-state mutations (and its subtree's)
            // and report only the effects that survive.
            journal.revert_to(checkpoint);
            output.note_hashes.clear();
            output.nullifiers.clear();
            output.storage_writes.clear();
            output.l2_to_l1_messages.clear();
            output.unencrypted_logs.clear();
        }
        output.gas_used = gas_before
            .checked_sub(machine.gas_left())
            .unwrap_or(Gas::ZERO);
        Ok(output)
    }

    fn run_nested(
        &self,
        program: &[TestOp],
        journal: &mut StateJournal,
        child_env: &ExecutionEnvironment,
        machine: &mut MachineState,
    ) -> Result<FrameOutput, InterpreterError> {
        // Each frame owns its machine state; the parent is charged for
        // whatever the child consumed.
        let mut child_machine = MachineState::new(machine.gas_left());
        let nested = self.run_program(program, journal, child_env, &mut child_machine)?;
        let _ = machine.consume(nested.gas_used);
        Ok(nested)
    }
}

impl Interpreter for ScriptedInterpreter {
    fn execute(
        &self,
        journal: &mut StateJournal,
        environment: &ExecutionEnvironment,
        machine: &mut MachineState,
    ) -> Result<FrameOutput, InterpreterError> {
        self.run_program(&self.program, journal, environment, machine)
    }
}
