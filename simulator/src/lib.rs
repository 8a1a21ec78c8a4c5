//! Deterministic public-function execution engine for a layer-2 rollup
//! node.
//!
//! This crate runs smart-contract "public" function bytecode against a
//! journaled, commit-on-completion world state, producing a verifiable
//! trace of side effects (storage writes, nullifiers, note hashes,
//! cross-layer messages, logs) consumable by a downstream proving circuit.
//!
//! The pieces, leaves first:
//!
//! - [`environment::ExecutionEnvironment`]: the immutable per-call context
//!   and its rules for deriving child contexts for nested calls, including
//!   the fixed 3-scalar calldata prefix that binds selector, argument hash
//!   and call mode into the interpreter's flat input array.
//! - [`journal::StateJournal`]: the persistable state manager. Buffers all
//!   writes, caches nullifiers, and stamps every observable operation with
//!   a monotonic side-effect ordinal shared across the whole call tree.
//! - [`journal::host_storage::HostStorage`]: stateless façade over the
//!   three injected database collaborators ([`db`]).
//! - [`machine::MachineState`]: the per-frame gas tracker.
//! - [`executor::PublicExecutor`]: orchestrates one top-level invocation:
//!   builds environment, journal and machine state, invokes the
//!   interpreter, validates protocol invariants (static calls must not
//!   mutate state), and only then commits the journal.
//!
//! Opcode-level interpretation is out of scope: the engine drives any
//! [`interpreter::Interpreter`] implementation, which reports per frame
//! whether execution reverted and which side effects survived.
//!
//! ```ignore
//! let executor = PublicExecutor::new(state_db, contracts_db, commitments_db, header, vm);
//! let result = executor.simulate(
//!     &request,
//!     global_variables,
//!     available_gas,
//!     tx_context,
//!     &pending_nullifiers,
//!     transaction_fee,
//!     start_side_effect_counter,
//! )?;
//! assert!(!result.reverted);
//! ```

// Execution context
pub mod context;
pub mod environment;
pub mod machine;

// World state
pub mod db;
pub mod journal;

// Orchestration
pub mod executor;
pub mod interpreter;
pub mod result;
pub mod side_effects;

// Utility modules
pub mod testing_utils;

pub use crate::executor::{ExecutionRequest, ExecutorError, PublicExecutor};
pub use crate::result::ExecutionResult;
pub use crate::side_effects::SideEffectCounter;
