//! The state journal: a persistable state manager buffering every side
//! effect of one top-level call tree until the outermost frame completes.
//!
//! One journal instance is shared (by `&mut`) across all frames of a call
//! tree. It owns the pending-write cache (last write per slot wins), the
//! nullifier cache, and the single monotonic access counter that stamps
//! every observable operation with its position in the canonical side-effect
//! order. Nothing reaches durable storage until [`StateJournal::commit`]
//! runs, once, after the whole tree has completed.

pub mod host_storage;

use std::collections::HashMap;

use log::trace;
use public_vm_common::{silo_nullifier, ContractAddress, Scalar};
use thiserror::Error;

use crate::side_effects::{
    L2ToL1Message, NoteHash, Nullifier, SideEffectCounter, StorageRead, StorageWrite,
    UnencryptedLog,
};
use self::host_storage::HostStorage;

/// Errors raised by journal operations.
#[derive(Debug, Error)]
pub enum JournalError {
    /// The siloed nullifier is already present, either from an earlier phase
    /// of the transaction or from an earlier insertion in this call tree.
    #[error("siloed nullifier {0} already exists")]
    NullifierCollision(Scalar),

    /// A backing database failed. Aborts the call tree; never retried here.
    #[error("state database failure")]
    Database(#[source] anyhow::Error),
}

/// How a cached nullifier came to be known to this call tree.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum NullifierOrigin {
    /// Seeded by the executor from an earlier transaction phase; treated as
    /// already existing, with no ordinal of its own.
    Seeded,
    /// Inserted by a frame of this call tree.
    Inserted {
        #[allow(dead_code)]
        counter: SideEffectCounter,
    },
}

/// Undo record for one cache mutation, enabling frame-granular rollback.
#[derive(Clone, Debug)]
enum UndoEntry {
    StorageWrite {
        key: (ContractAddress, Scalar),
        prev: Option<Scalar>,
    },
    NullifierInserted { siloed: Scalar },
}

/// Marks a frame boundary in the undo log. Obtained from
/// [`StateJournal::checkpoint`] and consumed by
/// [`StateJournal::revert_to`].
#[derive(Clone, Copy, Debug)]
pub struct Checkpoint(usize);

/// The journaled world state for one top-level call tree.
#[derive(Debug)]
pub struct StateJournal {
    storage: HostStorage,
    /// Latest buffered value per touched slot.
    pending_writes: HashMap<(ContractAddress, Scalar), Scalar>,
    /// Siloed nullifiers known to this call tree, with provenance.
    nullifiers: HashMap<Scalar, NullifierOrigin>,
    undo_log: Vec<UndoEntry>,
    access_counter: SideEffectCounter,
}

impl StateJournal {
    /// Creates a journal over `storage`. `start_side_effect_counter` seeds
    /// the ordinal sequence so that multiple top-level calls within one
    /// transaction produce non-overlapping ordinals.
    pub fn new(storage: HostStorage, start_side_effect_counter: SideEffectCounter) -> Self {
        Self {
            storage,
            pending_writes: HashMap::new(),
            nullifiers: HashMap::new(),
            undo_log: Vec::new(),
            access_counter: start_side_effect_counter,
        }
    }

    pub fn host(&self) -> &HostStorage {
        &self.storage
    }

    /// The ordinal the next side-effecting operation will receive.
    pub fn next_side_effect_counter(&self) -> SideEffectCounter {
        self.access_counter
    }

    /// Records an already-siloed nullifier from an earlier transaction phase
    /// as pre-existing. Consumes no ordinal.
    pub fn seed_nullifier(&mut self, siloed: Scalar) {
        self.nullifiers.entry(siloed).or_insert(NullifierOrigin::Seeded);
    }

    /// Reads `slot` under `contract`: the latest buffered write if one
    /// exists, the durable value otherwise. Unwritten slots read as zero.
    pub fn read_storage(
        &mut self,
        contract: ContractAddress,
        slot: Scalar,
    ) -> Result<StorageRead, JournalError> {
        let current_value = match self.pending_writes.get(&(contract, slot)) {
            Some(value) => *value,
            None => self
                .storage
                .state
                .storage_read(contract, slot)
                .map_err(JournalError::Database)?
                .unwrap_or(Scalar::ZERO),
        };
        let counter = self.bump();
        trace!("journal read {contract}[{slot}] = {current_value} (counter {counter})");
        Ok(StorageRead {
            slot,
            current_value,
            counter,
        })
    }

    /// Buffers a write of `new_value` to `slot` under `contract`. Repeated
    /// writes to the same slot overwrite the buffered value; no intermediate
    /// durable write is ever emitted.
    pub fn write_storage(
        &mut self,
        contract: ContractAddress,
        slot: Scalar,
        new_value: Scalar,
    ) -> StorageWrite {
        let counter = self.bump();
        let prev = self.pending_writes.insert((contract, slot), new_value);
        self.undo_log.push(UndoEntry::StorageWrite {
            key: (contract, slot),
            prev,
        });
        trace!("journal write {contract}[{slot}] = {new_value} (counter {counter})");
        StorageWrite {
            slot,
            new_value,
            counter,
        }
    }

    /// Checks whether `nullifier` (unsiloed, scoped to `contract`) exists,
    /// consulting the call tree's cache first and falling back to historical
    /// membership. Returns the verdict and the ordinal of the check.
    pub fn nullifier_exists(
        &mut self,
        contract: ContractAddress,
        nullifier: Scalar,
    ) -> Result<(bool, SideEffectCounter), JournalError> {
        let siloed = silo_nullifier(contract, nullifier);
        let exists = self.nullifiers.contains_key(&siloed)
            || self
                .storage
                .commitments
                .nullifier_exists(siloed)
                .map_err(JournalError::Database)?;
        Ok((exists, self.bump()))
    }

    /// Inserts a new nullifier (unsiloed, scoped to `contract`). Inserting a
    /// value whose siloed form already exists is a typed collision error.
    pub fn insert_nullifier(
        &mut self,
        contract: ContractAddress,
        nullifier: Scalar,
    ) -> Result<Nullifier, JournalError> {
        let siloed = silo_nullifier(contract, nullifier);
        if self.nullifiers.contains_key(&siloed)
            || self
                .storage
                .commitments
                .nullifier_exists(siloed)
                .map_err(JournalError::Database)?
        {
            return Err(JournalError::NullifierCollision(siloed));
        }
        let counter = self.bump();
        self.nullifiers
            .insert(siloed, NullifierOrigin::Inserted { counter });
        self.undo_log.push(UndoEntry::NullifierInserted { siloed });
        Ok(Nullifier {
            value: siloed,
            counter,
        })
    }

    /// Stamps a new note hash with the next ordinal.
    pub fn insert_note_hash(&mut self, value: Scalar) -> NoteHash {
        NoteHash {
            value,
            counter: self.bump(),
        }
    }

    /// Stamps a new L2-to-L1 message with the next ordinal.
    pub fn emit_l2_to_l1_message(&mut self, recipient: Scalar, content: Scalar) -> L2ToL1Message {
        L2ToL1Message {
            recipient,
            content,
            counter: self.bump(),
        }
    }

    /// Stamps a new unencrypted log with the next ordinal.
    pub fn emit_unencrypted_log(
        &mut self,
        contract: ContractAddress,
        data: Vec<u8>,
    ) -> UnencryptedLog {
        UnencryptedLog {
            contract,
            data,
            counter: self.bump(),
        }
    }

    /// Marks the current frame boundary for a later
    /// [`revert_to`](Self::revert_to).
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.undo_log.len())
    }

    /// Rolls the caches back to `checkpoint`, discarding every buffered
    /// write and inserted nullifier recorded since. The access counter is
    /// deliberately not rewound: ordinals consumed by a reverted frame are
    /// never reissued.
    pub fn revert_to(&mut self, checkpoint: Checkpoint) {
        while self.undo_log.len() > checkpoint.0 {
            let Some(entry) = self.undo_log.pop() else {
                break;
            };
            match entry {
                UndoEntry::StorageWrite { key, prev } => match prev {
                    Some(value) => {
                        self.pending_writes.insert(key, value);
                    }
                    None => {
                        self.pending_writes.remove(&key);
                    }
                },
                UndoEntry::NullifierInserted { siloed } => {
                    self.nullifiers.remove(&siloed);
                }
            }
        }
    }

    /// Flushes exactly one final value per touched slot to durable storage.
    /// Consuming `self` makes a second or mid-tree commit unrepresentable.
    pub fn commit(self) -> Result<(), JournalError> {
        let writes: Vec<_> = self.pending_writes.into_iter().collect();
        trace!("journal commit: {} slot(s)", writes.len());
        self.storage
            .state
            .commit_writes(&writes)
            .map_err(JournalError::Database)
    }

    fn bump(&mut self) -> SideEffectCounter {
        let counter = self.access_counter;
        self.access_counter += 1;
        counter
    }
}
