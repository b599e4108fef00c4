//! Run context handed to every manager operation.
//!
//! The context names the run and the test class under execution and carries
//! handles to the external stores. It is cheap to clone; managers keep a copy
//! from [`crate::activation::InitContext::run`] if they need the stores later.

mod record;
mod stores;

pub use record::RunRecord;
pub use stores::{
    Credentials, CredentialsStore, MemoryArchive, MemoryCredentialsStore, MemoryPropertyStore,
    MemoryStatusStore, PropertyStore, ResultArchive, RunStores, StatusStore,
};

use crate::errors::StoreError;
use crate::manager::TestClass;

#[derive(Debug, Clone)]
pub struct RunContext {
    run_name: String,
    test_class: TestClass,
    stores: RunStores,
}

impl RunContext {
    pub fn new(run_name: impl Into<String>, test_class: TestClass, stores: RunStores) -> Self {
        Self {
            run_name: run_name.into(),
            test_class,
            stores,
        }
    }

    /// A local run with a generated name and in-memory stores.
    pub fn local(test_class: TestClass) -> Self {
        let run_name = format!("L{}", uuid::Uuid::new_v4().simple());
        Self::new(run_name, test_class, RunStores::in_memory())
    }

    /// Build the context for a run recorded in the status store.
    pub fn from_status_store(run_name: &str, stores: RunStores) -> Result<Self, StoreError> {
        let record = RunRecord::load(run_name, stores.status.as_ref())?;
        let test_class = record.test_class()?;
        Ok(Self::new(run_name, test_class, stores))
    }

    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    pub fn test_class(&self) -> &TestClass {
        &self.test_class
    }

    pub fn stores(&self) -> &RunStores {
        &self.stores
    }

    pub fn properties(&self) -> &dyn PropertyStore {
        self.stores.properties.as_ref()
    }

    pub fn status(&self) -> &dyn StatusStore {
        self.stores.status.as_ref()
    }

    pub fn archive(&self) -> &dyn ResultArchive {
        self.stores.archive.as_ref()
    }

    pub fn credentials(&self) -> &dyn CredentialsStore {
        self.stores.credentials.as_ref()
    }
}
