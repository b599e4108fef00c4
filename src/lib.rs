//! Extension orchestration core for test runs.
//!
//! A test run is served by a set of pluggable [`Manager`]s. For every run
//! this crate:
//!
//! 1. discovers managers through a [`ManagerRegistry`], loading extra
//!    bundles through a [`BundleLoader`] until no manager asks for more
//! 2. lets each manager decide whether it is active for the test class
//! 3. sorts the active managers so every manager comes after the managers
//!    it depends on
//! 4. drives them through the run lifecycle with [`TestRunManagers`]
//!
//! ```no_run
//! use marshal::{BundleDefinition, BundleRepository, MarshalConfig, RunContext, TestClass, TestRunManagers};
//!
//! # fn main() -> anyhow::Result<()> {
//! let repo = BundleRepository::new();
//! repo.install_and_start(BundleDefinition::new("dev.example.core"))?;
//!
//! let run = RunContext::local(TestClass::new("dev.example.tests", "SmokeIT"));
//! let mut managers = TestRunManagers::activate_and_order(&repo, &repo, run, &MarshalConfig::default())?;
//!
//! if !managers.any_reason_test_class_should_be_ignored()? {
//!     managers.provision_generate()?;
//!     managers.provision_build()?;
//!     managers.provision_start()?;
//!     managers.start_of_test_class()?;
//!     let result = managers.end_of_test_class("passed", None)?;
//!     println!("result: {}", result.as_deref().unwrap_or("passed"));
//!     managers.provision_stop();
//!     managers.provision_discard();
//! }
//! managers.end_of_test_run();
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod bundle;
pub mod config;
pub mod errors;
pub mod lifecycle;
pub mod logging;
pub mod manager;
pub mod ordering;
pub mod run;

pub use activation::{ActivationCoordinator, ActiveManagers, DiscoveredManagers, InitContext};
pub use bundle::{
    BundleDefinition, BundleLoader, BundleRepository, BundleState, ManagerRegistration,
    ManagerRegistry,
};
pub use config::{MarshalConfig, OrderingStrategy};
pub use errors::{FrameworkError, LoadError, ManagerError, StoreError};
pub use lifecycle::{ManagerReport, TestRunManagers};
pub use manager::{
    LifecyclePhase, Manager, ManagerId, PhaseCategory, TestClass, TestField, TestInstance,
    TestMethod,
};
pub use run::{RunContext, RunRecord, RunStores};
