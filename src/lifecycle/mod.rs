//! Lifecycle dispatch over the ordered active managers of one test run.
//!
//! [`TestRunManagers::activate_and_order`] is the one-shot setup call. The
//! resulting value exposes one method per [`LifecyclePhase`], each driving
//! every active manager in provisioning order. How a phase treats failures
//! and results depends on its
//! [`PhaseCategory`](crate::manager::PhaseCategory):
//!
//! | Category | On manager failure | Result |
//! |---|---|---|
//! | Gating | wrap and abort | `true` on the first reason given |
//! | Provisioning, test boundary | wrap and abort | none |
//! | Teardown, run boundary | log and continue | none |
//! | Outcome proposing | wrap and abort | first non-null proposal |

mod report;

pub use report::{ManagerReport, REPORT_ARTIFACT};

use crate::activation::ActivationCoordinator;
use crate::bundle::{BundleLoader, ManagerRegistry};
use crate::config::{MarshalConfig, OrderingStrategy};
use crate::errors::{FrameworkError, ManagerError};
use crate::manager::{LifecyclePhase, Manager, ManagerId, TestInstance, TestMethod};
use crate::ordering;
use crate::run::RunContext;
use tracing::{debug, info, info_span, warn};

/// The ordered active managers of a single test run.
pub struct TestRunManagers {
    run: RunContext,
    strategy: OrderingStrategy,
    managers: Vec<Box<dyn Manager>>,
}

impl std::fmt::Debug for TestRunManagers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestRunManagers")
            .field("run", &self.run.run_name())
            .field("strategy", &self.strategy)
            .field("managers", &self.manager_ids())
            .finish()
    }
}

impl TestRunManagers {
    /// Discover, activate and order the managers for the run's test class.
    pub fn activate_and_order(
        registry: &dyn ManagerRegistry,
        loader: &dyn BundleLoader,
        run: RunContext,
        config: &MarshalConfig,
    ) -> Result<Self, FrameworkError> {
        let _span = info_span!("activate", run = run.run_name(), test_class = %run.test_class()).entered();

        let active =
            ActivationCoordinator::new(registry, loader, &run, &config.activation).activate()?;
        Self::with_managers(run, active, config.ordering.strategy)
    }

    /// Order an already activated set of managers.
    pub fn with_managers(
        run: RunContext,
        managers: Vec<Box<dyn Manager>>,
        strategy: OrderingStrategy,
    ) -> Result<Self, FrameworkError> {
        let managers = ordering::order(managers, strategy)?;

        debug!("The following managers are sorted in provisioning order:");
        for manager in &managers {
            debug!("   {}", manager.id());
        }

        Ok(Self {
            run,
            strategy,
            managers,
        })
    }

    pub fn run(&self) -> &RunContext {
        &self.run
    }

    pub fn strategy(&self) -> OrderingStrategy {
        self.strategy
    }

    /// Active manager ids in provisioning order.
    pub fn manager_ids(&self) -> Vec<ManagerId> {
        self.managers.iter().map(|m| m.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }

    pub fn report(&self) -> ManagerReport {
        ManagerReport::new(
            self.run.run_name(),
            self.run.test_class().to_string(),
            self.manager_ids(),
            self.strategy,
        )
    }

    pub fn any_reason_test_class_should_be_ignored(&mut self) -> Result<bool, FrameworkError> {
        let class = self.run.test_class().to_string();
        let reason =
            self.first_reason(LifecyclePhase::TestClassIgnore, |m| m.any_reason_test_class_should_be_ignored())?;

        match reason {
            Some((manager, reason)) => {
                info!(manager = %manager, "Ignoring test class {} due to {}", class, reason);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn provision_generate(&mut self) -> Result<(), FrameworkError> {
        self.each(LifecyclePhase::ProvisionGenerate, |m| m.provision_generate())
    }

    pub fn provision_build(&mut self) -> Result<(), FrameworkError> {
        self.each(LifecyclePhase::ProvisionBuild, |m| m.provision_build())
    }

    pub fn provision_start(&mut self) -> Result<(), FrameworkError> {
        self.each(LifecyclePhase::ProvisionStart, |m| m.provision_start())
    }

    pub fn start_of_test_class(&mut self) -> Result<(), FrameworkError> {
        self.each(LifecyclePhase::StartOfTestClass, |m| m.start_of_test_class())
    }

    pub fn any_reason_test_method_should_be_ignored(
        &mut self,
        method: &TestMethod,
    ) -> Result<bool, FrameworkError> {
        let reason = self.first_reason(LifecyclePhase::TestMethodIgnore, |m| {
            m.any_reason_test_method_should_be_ignored(method)
        })?;

        match reason {
            Some((manager, reason)) => {
                info!(manager = %manager, "Ignoring test method {} due to {}", method.name, reason);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn fill_annotated_fields(&mut self, instance: &mut TestInstance) -> Result<(), FrameworkError> {
        self.each(LifecyclePhase::FillAnnotatedFields, |m| m.fill_annotated_fields(instance))
    }

    pub fn start_of_test_method(&mut self, method: &TestMethod) -> Result<(), FrameworkError> {
        self.each(LifecyclePhase::StartOfTestMethod, |m| m.start_of_test_method(method))
    }

    /// Every manager sees the result as it was before this phase; the first
    /// non-null proposal in provisioning order is returned.
    pub fn end_of_test_method(
        &mut self,
        method: &TestMethod,
        current_result: &str,
        failure: Option<&anyhow::Error>,
    ) -> Result<Option<String>, FrameworkError> {
        self.first_proposal(LifecyclePhase::EndOfTestMethod, |m| {
            m.end_of_test_method(method, current_result, failure)
        })
    }

    /// Same merging rule as [`Self::end_of_test_method`].
    pub fn end_of_test_class(
        &mut self,
        current_result: &str,
        failure: Option<&anyhow::Error>,
    ) -> Result<Option<String>, FrameworkError> {
        self.first_proposal(LifecyclePhase::EndOfTestClass, |m| {
            m.end_of_test_class(current_result, failure)
        })
    }

    /// Never fails; manager errors are logged and the remaining managers still run.
    pub fn provision_stop(&mut self) {
        self.each_best_effort(LifecyclePhase::ProvisionStop, |m| m.provision_stop());
    }

    /// Never fails; manager errors are logged and the remaining managers still run.
    pub fn provision_discard(&mut self) {
        self.each_best_effort(LifecyclePhase::ProvisionDiscard, |m| m.provision_discard());
    }

    /// Never fails; manager errors are logged and the remaining managers still run.
    pub fn end_of_test_run(&mut self) {
        self.each_best_effort(LifecyclePhase::EndOfTestRun, |m| m.end_of_test_run());
    }

    /// Run `f` on every manager, aborting on the first failure.
    fn each<F>(&mut self, phase: LifecyclePhase, mut f: F) -> Result<(), FrameworkError>
    where
        F: FnMut(&mut dyn Manager) -> Result<(), ManagerError>,
    {
        debug_assert!(phase.category().is_fail_fast());
        let _span = info_span!("phase", %phase, category = ?phase.category(), run = self.run.run_name()).entered();
        for manager in &mut self.managers {
            f(manager.as_mut()).map_err(|source| phase_error(phase, manager.as_ref(), source))?;
        }
        Ok(())
    }

    /// Run `f` on every manager regardless of failures.
    fn each_best_effort<F>(&mut self, phase: LifecyclePhase, mut f: F)
    where
        F: FnMut(&mut dyn Manager) -> Result<(), ManagerError>,
    {
        debug_assert!(!phase.category().is_fail_fast());
        let _span = info_span!("phase", %phase, category = ?phase.category(), run = self.run.run_name()).entered();
        for manager in &mut self.managers {
            if let Err(e) = f(manager.as_mut()) {
                warn!(manager = %manager.id(), error = %e, "Problem in {}, continuing", phase);
            }
        }
    }

    /// Stop at the first manager that gives a reason.
    fn first_reason<F>(
        &mut self,
        phase: LifecyclePhase,
        mut f: F,
    ) -> Result<Option<(ManagerId, String)>, FrameworkError>
    where
        F: FnMut(&mut dyn Manager) -> Result<Option<String>, ManagerError>,
    {
        debug_assert!(phase.category().is_fail_fast());
        let _span = info_span!("phase", %phase, category = ?phase.category(), run = self.run.run_name()).entered();
        for manager in &mut self.managers {
            let reason =
                f(manager.as_mut()).map_err(|source| phase_error(phase, manager.as_ref(), source))?;
            if let Some(reason) = reason {
                return Ok(Some((manager.id(), reason)));
            }
        }
        Ok(None)
    }

    /// Ask every manager; keep the first non-null proposal.
    fn first_proposal<F>(
        &mut self,
        phase: LifecyclePhase,
        mut f: F,
    ) -> Result<Option<String>, FrameworkError>
    where
        F: FnMut(&mut dyn Manager) -> Result<Option<String>, ManagerError>,
    {
        debug_assert!(phase.category().is_fail_fast());
        let _span = info_span!("phase", %phase, category = ?phase.category(), run = self.run.run_name()).entered();
        let mut result: Option<String> = None;
        for manager in &mut self.managers {
            let proposal =
                f(manager.as_mut()).map_err(|source| phase_error(phase, manager.as_ref(), source))?;
            let Some(proposal) = proposal else {
                continue;
            };
            if result.is_none() {
                debug!(manager = %manager.id(), result = %proposal, "Result proposed");
                result = Some(proposal);
            } else {
                debug!(manager = %manager.id(), result = %proposal, "Later proposal discarded");
            }
        }
        Ok(result)
    }
}

fn phase_error(phase: LifecyclePhase, manager: &dyn Manager, source: ManagerError) -> FrameworkError {
    FrameworkError::Phase {
        phase,
        manager: manager.id(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::InitContext;
    use crate::manager::TestClass;
    use std::sync::{Arc, Mutex};

    type Journal = Arc<Mutex<Vec<String>>>;

    #[derive(Default)]
    struct Scripted {
        id: &'static str,
        journal: Journal,
        fail_in: Option<LifecyclePhase>,
        ignore_class: Option<&'static str>,
        ignore_method: Option<&'static str>,
        proposal: Option<&'static str>,
    }

    impl Scripted {
        fn new(id: &'static str, journal: &Journal) -> Self {
            Self {
                id,
                journal: journal.clone(),
                ..Self::default()
            }
        }

        fn record(&self, phase: LifecyclePhase) -> Result<(), ManagerError> {
            self.journal
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.id, phase.as_str()));
            if self.fail_in == Some(phase) {
                return Err(ManagerError::msg(format!("{} exploded", self.id)));
            }
            Ok(())
        }
    }

    impl Manager for Scripted {
        fn id(&self) -> ManagerId {
            ManagerId::new(self.id)
        }

        fn initialise(&mut self, ctx: &mut InitContext<'_>) -> Result<(), ManagerError> {
            ctx.activate();
            Ok(())
        }

        fn any_reason_test_class_should_be_ignored(&mut self) -> Result<Option<String>, ManagerError> {
            self.record(LifecyclePhase::TestClassIgnore)?;
            Ok(self.ignore_class.map(String::from))
        }

        fn provision_start(&mut self) -> Result<(), ManagerError> {
            self.record(LifecyclePhase::ProvisionStart)
        }

        fn provision_stop(&mut self) -> Result<(), ManagerError> {
            self.record(LifecyclePhase::ProvisionStop)
        }

        fn provision_discard(&mut self) -> Result<(), ManagerError> {
            self.record(LifecyclePhase::ProvisionDiscard)
        }

        fn any_reason_test_method_should_be_ignored(
            &mut self,
            _method: &TestMethod,
        ) -> Result<Option<String>, ManagerError> {
            self.record(LifecyclePhase::TestMethodIgnore)?;
            Ok(self.ignore_method.map(String::from))
        }

        fn fill_annotated_fields(&mut self, instance: &mut TestInstance) -> Result<(), ManagerError> {
            self.record(LifecyclePhase::FillAnnotatedFields)?;
            if instance.class().fields.iter().any(|f| f.name == self.id) {
                instance.inject(self.id, format!("{} resource", self.id))?;
            }
            Ok(())
        }

        fn end_of_test_method(
            &mut self,
            _method: &TestMethod,
            _current_result: &str,
            _failure: Option<&anyhow::Error>,
        ) -> Result<Option<String>, ManagerError> {
            self.record(LifecyclePhase::EndOfTestMethod)?;
            Ok(self.proposal.map(String::from))
        }

        fn end_of_test_class(
            &mut self,
            _current_result: &str,
            _failure: Option<&anyhow::Error>,
        ) -> Result<Option<String>, ManagerError> {
            self.record(LifecyclePhase::EndOfTestClass)?;
            Ok(self.proposal.map(String::from))
        }

        fn end_of_test_run(&mut self) -> Result<(), ManagerError> {
            self.record(LifecyclePhase::EndOfTestRun)
        }
    }

    fn run() -> RunContext {
        RunContext::local(TestClass::new("dev.example.tests", "SmokeIT").with_field("b", "Http"))
    }

    fn build(managers: Vec<Scripted>) -> TestRunManagers {
        let managers = managers
            .into_iter()
            .map(|m| Box::new(m) as Box<dyn Manager>)
            .collect();
        TestRunManagers::with_managers(run(), managers, OrderingStrategy::Stable).unwrap()
    }

    fn entries(journal: &Journal) -> Vec<String> {
        journal.lock().unwrap().clone()
    }

    #[test]
    fn provisioning_aborts_on_first_failure() {
        let journal = Journal::default();
        let mut b = Scripted::new("b", &journal);
        b.fail_in = Some(LifecyclePhase::ProvisionStart);
        let mut managers = build(vec![Scripted::new("a", &journal), b, Scripted::new("c", &journal)]);

        let err = managers.provision_start().unwrap_err();
        match &err {
            FrameworkError::Phase { phase, manager, .. } => {
                assert_eq!(*phase, LifecyclePhase::ProvisionStart);
                assert_eq!(manager.as_str(), "b");
            }
            other => panic!("Expected Phase error, got {other:?}"),
        }
        assert!(err.to_string().contains("b exploded"));
        assert_eq!(entries(&journal), vec!["a:provision_start", "b:provision_start"]);
    }

    #[test]
    fn teardown_continues_past_failures() {
        let journal = Journal::default();
        let mut a = Scripted::new("a", &journal);
        a.fail_in = Some(LifecyclePhase::ProvisionStop);
        let mut managers = build(vec![a, Scripted::new("b", &journal), Scripted::new("c", &journal)]);

        managers.provision_stop();
        managers.end_of_test_run();

        assert_eq!(
            entries(&journal),
            vec![
                "a:provision_stop",
                "b:provision_stop",
                "c:provision_stop",
                "a:end_of_test_run",
                "b:end_of_test_run",
                "c:end_of_test_run",
            ]
        );
    }

    #[test]
    fn first_proposal_wins_but_all_are_asked() {
        let journal = Journal::default();
        let mut b = Scripted::new("b", &journal);
        b.proposal = Some("failed");
        let mut c = Scripted::new("c", &journal);
        c.proposal = Some("passed");
        let mut managers = build(vec![Scripted::new("a", &journal), b, c]);

        let method = TestMethod::new("testOne");
        let result = managers.end_of_test_method(&method, "passed", None).unwrap();
        assert_eq!(result.as_deref(), Some("failed"));

        let result = managers.end_of_test_class("passed", None).unwrap();
        assert_eq!(result.as_deref(), Some("failed"));

        assert_eq!(
            entries(&journal),
            vec![
                "a:end_of_test_method",
                "b:end_of_test_method",
                "c:end_of_test_method",
                "a:end_of_test_class",
                "b:end_of_test_class",
                "c:end_of_test_class",
            ]
        );
    }

    #[test]
    fn no_proposal_returns_none() {
        let journal = Journal::default();
        let mut managers = build(vec![Scripted::new("a", &journal)]);
        let failure = anyhow::anyhow!("assertion failed");
        assert_eq!(managers.end_of_test_class("failed", Some(&failure)).unwrap(), None);
    }

    #[test]
    fn ignore_short_circuits() {
        let journal = Journal::default();
        let mut a = Scripted::new("a", &journal);
        a.ignore_class = Some("no zOS image available");
        let mut managers = build(vec![a, Scripted::new("b", &journal)]);

        assert!(managers.any_reason_test_class_should_be_ignored().unwrap());
        assert_eq!(entries(&journal), vec!["a:test_class_ignore"]);
    }

    #[test]
    fn method_ignore_without_reason_visits_all() {
        let journal = Journal::default();
        let mut managers = build(vec![Scripted::new("a", &journal), Scripted::new("b", &journal)]);

        let method = TestMethod::new("testTwo");
        assert!(!managers.any_reason_test_method_should_be_ignored(&method).unwrap());
        assert_eq!(
            entries(&journal),
            vec!["a:test_method_ignore", "b:test_method_ignore"]
        );
    }

    #[test]
    fn fill_annotated_fields_injects() {
        let journal = Journal::default();
        let mut managers = build(vec![Scripted::new("a", &journal), Scripted::new("b", &journal)]);

        let mut instance = TestInstance::new(managers.run().test_class().clone());
        managers.fill_annotated_fields(&mut instance).unwrap();
        assert_eq!(instance.get::<String>("b").map(String::as_str), Some("b resource"));
        assert!(!instance.is_filled("a"));
    }

    #[test]
    fn report_lists_order() {
        let journal = Journal::default();
        let managers = build(vec![Scripted::new("a", &journal), Scripted::new("b", &journal)]);
        let report = managers.report();
        assert_eq!(report.managers, vec![ManagerId::new("a"), ManagerId::new("b")]);
        assert_eq!(report.test_class, "dev.example.tests/SmokeIT");
        assert_eq!(managers.len(), 2);
    }
}
