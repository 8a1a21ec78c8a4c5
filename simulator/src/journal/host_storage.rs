//! Read-through façade over the injected database collaborators.

use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::db::{CommitmentsDb, ContractsDb, PublicStateDb};

/// Stateless composition of the three data sources the journal and the
/// interpreter read from. Holds no mutable state of its own; any caching
/// lives inside the underlying databases.
#[derive(Clone)]
pub struct HostStorage {
    pub state: Arc<dyn PublicStateDb>,
    pub contracts: Arc<dyn ContractsDb>,
    pub commitments: Arc<dyn CommitmentsDb>,
}

impl HostStorage {
    pub fn new(
        state: Arc<dyn PublicStateDb>,
        contracts: Arc<dyn ContractsDb>,
        commitments: Arc<dyn CommitmentsDb>,
    ) -> Self {
        Self {
            state,
            contracts,
            commitments,
        }
    }
}

impl Debug for HostStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostStorage").finish_non_exhaustive()
    }
}
