//! The manager (extension) contract.
//!
//! A manager is a unit of pluggable behaviour in a test run: it provisions
//! resources, fills annotated fields on the test class, may veto running a
//! class or method, and may reclassify the outcome.
//!
//! # Lifecycle
//!
//! 1. Discovered through a [`crate::bundle::ManagerRegistry`] and instantiated once per run
//! 2. Asked for extra bundles until discovery reaches closure
//! 3. Asked to [`Manager::initialise`] against the test class
//! 4. Sorted into provisioning order using [`Manager::dependent_on`]
//! 5. Driven through each [`LifecyclePhase`] by [`crate::lifecycle::TestRunManagers`]
//!
//! # Usage
//!
//! ```ignore
//! struct HttpManager;
//!
//! impl Manager for HttpManager {
//!     fn initialise(&mut self, ctx: &mut InitContext<'_>) -> Result<(), ManagerError> {
//!         if ctx.test_class().fields_annotated_with("@HttpClient").next().is_some() {
//!             ctx.activate();
//!         }
//!         Ok(())
//!     }
//! }
//! ```

mod contract;
mod types;

pub use contract::Manager;
pub use types::{
    LifecyclePhase, ManagerId, PhaseCategory, TestClass, TestField, TestInstance, TestMethod,
};
