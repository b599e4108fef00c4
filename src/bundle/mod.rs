//! Extension registry and bundle loader contracts.
//!
//! The core never loads code itself. It talks to two collaborators:
//!
//! - [`ManagerRegistry`] enumerates the managers that are currently loaded
//!   and discoverable, without any dependency knowledge
//! - [`BundleLoader`] makes a named extension bundle available so that its
//!   managers show up in the next registry scan
//!
//! [`BundleRepository`] implements both over a static name→constructor table,
//! which is enough for statically linked extensions and for tests. Dynamic
//! library or sidecar loaders implement the same two traits.

mod repository;

pub use repository::{BundleDefinition, BundleRepository, BundleState};

use crate::errors::{FrameworkError, LoadError};
use crate::manager::{Manager, ManagerId};
use std::sync::Arc;

/// Constructor for a fresh manager instance.
pub type ManagerFactory = Arc<dyn Fn() -> Box<dyn Manager> + Send + Sync>;

/// A discoverable manager: its identity and how to instantiate it.
#[derive(Clone)]
pub struct ManagerRegistration {
    id: ManagerId,
    factory: ManagerFactory,
}

impl ManagerRegistration {
    pub fn new(
        id: impl Into<ManagerId>,
        factory: impl Fn() -> Box<dyn Manager> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            factory: Arc::new(factory),
        }
    }

    /// Registration for a manager type with a `Default` constructor.
    pub fn of<M: Manager + Default + 'static>() -> Self {
        Self::new(ManagerId::of::<M>(), || Box::new(M::default()))
    }

    pub fn id(&self) -> &ManagerId {
        &self.id
    }

    pub fn instantiate(&self) -> Box<dyn Manager> {
        (self.factory)()
    }
}

impl std::fmt::Debug for ManagerRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerRegistration")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Lookup of all currently registered managers.
pub trait ManagerRegistry: Send + Sync {
    /// Every manager currently loaded, in a stable discovery order.
    fn locate_managers(&self) -> Result<Vec<ManagerRegistration>, FrameworkError>;
}

/// Makes named extension bundles available.
pub trait BundleLoader: Send + Sync {
    fn is_bundle_active(&self, bundle: &str) -> bool;

    /// Load and activate `bundle`. Loading an active bundle is a no-op.
    fn load_bundle(&self, bundle: &str) -> Result<(), LoadError>;
}
