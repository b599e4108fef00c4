//! The capability contract every manager implements.

use super::types::{ManagerId, TestInstance, TestMethod};
use crate::activation::InitContext;
use crate::errors::ManagerError;
use crate::run::RunContext;

/// A pluggable component taking part in the lifecycle of a test run.
///
/// Every operation has a no-op default so a manager only implements the
/// phases it cares about. The one required method is [`Manager::initialise`],
/// where the manager decides whether it is active for the test class.
///
/// Managers are driven strictly sequentially in provisioning order; a
/// manager may rely on state set up by managers earlier in the order.
pub trait Manager: Send {
    /// Identity used for de-duplication and diagnostics.
    fn id(&self) -> ManagerId {
        ManagerId::of::<Self>()
    }

    /// Symbolic names of further bundles this manager needs loaded.
    fn extra_bundles(&self, _run: &RunContext) -> Result<Vec<String>, ManagerError> {
        Ok(Vec::new())
    }

    /// Decide whether to take part in this run.
    ///
    /// Call [`InitContext::activate`] to join the active set and
    /// [`InitContext::require`] to pull in other managers.
    fn initialise(&mut self, ctx: &mut InitContext<'_>) -> Result<(), ManagerError>;

    /// Another active manager needs this one. Joins the active set by default.
    fn you_are_required(&mut self, ctx: &mut InitContext<'_>) -> Result<(), ManagerError> {
        ctx.activate();
        Ok(())
    }

    /// True if `other` must be provisioned before this manager.
    fn dependent_on(&self, _other: &dyn Manager) -> bool {
        false
    }

    /// A reason to skip the whole test class, if any.
    fn any_reason_test_class_should_be_ignored(&mut self) -> Result<Option<String>, ManagerError> {
        Ok(None)
    }

    fn provision_generate(&mut self) -> Result<(), ManagerError> {
        Ok(())
    }

    fn provision_build(&mut self) -> Result<(), ManagerError> {
        Ok(())
    }

    fn provision_start(&mut self) -> Result<(), ManagerError> {
        Ok(())
    }

    /// Errors are logged by the dispatcher and never stop other managers.
    fn provision_stop(&mut self) -> Result<(), ManagerError> {
        Ok(())
    }

    /// Errors are logged by the dispatcher and never stop other managers.
    fn provision_discard(&mut self) -> Result<(), ManagerError> {
        Ok(())
    }

    fn start_of_test_class(&mut self) -> Result<(), ManagerError> {
        Ok(())
    }

    /// A reason to skip this test method, if any.
    fn any_reason_test_method_should_be_ignored(
        &mut self,
        _method: &TestMethod,
    ) -> Result<Option<String>, ManagerError> {
        Ok(None)
    }

    fn fill_annotated_fields(&mut self, _instance: &mut TestInstance) -> Result<(), ManagerError> {
        Ok(())
    }

    fn start_of_test_method(&mut self, _method: &TestMethod) -> Result<(), ManagerError> {
        Ok(())
    }

    /// Optionally propose a new result for the method.
    fn end_of_test_method(
        &mut self,
        _method: &TestMethod,
        _current_result: &str,
        _failure: Option<&anyhow::Error>,
    ) -> Result<Option<String>, ManagerError> {
        Ok(None)
    }

    /// Optionally propose a new result for the class.
    fn end_of_test_class(
        &mut self,
        _current_result: &str,
        _failure: Option<&anyhow::Error>,
    ) -> Result<Option<String>, ManagerError> {
        Ok(None)
    }

    /// Errors are logged by the dispatcher and never stop other managers.
    fn end_of_test_run(&mut self) -> Result<(), ManagerError> {
        Ok(())
    }
}

impl std::fmt::Debug for dyn Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Manager").field(&self.id()).finish()
    }
}
