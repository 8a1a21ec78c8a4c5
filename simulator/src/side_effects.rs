//! Side-effect records produced during execution.
//!
//! Every observable effect is stamped with a [`SideEffectCounter`] ordinal
//! assigned by the state journal, producing a total order over the whole
//! call tree. The downstream proving circuit verifies a fixed-arity,
//! order-sensitive structure of side effects, so the ordinal is part of each
//! record rather than implied by vector position.

use public_vm_common::{ContractAddress, Scalar};
use serde::{Deserialize, Serialize};

/// Monotonic ordinal assigned to each side-effecting operation. One counter
/// is shared across all frames of a top-level call; it only ever increases.
pub type SideEffectCounter = u32;

/// A new note hash appended to the note hash tree.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct NoteHash {
    pub value: Scalar,
    pub counter: SideEffectCounter,
}

/// A newly emitted nullifier. `value` is siloed to the emitting contract.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Nullifier {
    pub value: Scalar,
    pub counter: SideEffectCounter,
}

/// An observed read of public storage, with the value current at read time.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct StorageRead {
    pub slot: Scalar,
    pub current_value: Scalar,
    pub counter: SideEffectCounter,
}

/// A requested write to public storage. Writes are buffered by the journal
/// and only the last value per slot reaches durable storage at commit.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct StorageWrite {
    pub slot: Scalar,
    pub new_value: Scalar,
    pub counter: SideEffectCounter,
}

/// A message sent to the L1 portal contract.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct L2ToL1Message {
    pub recipient: Scalar,
    pub content: Scalar,
    pub counter: SideEffectCounter,
}

/// An unencrypted log emitted for off-chain consumers.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct UnencryptedLog {
    pub contract: ContractAddress,
    pub data: Vec<u8>,
    pub counter: SideEffectCounter,
}
