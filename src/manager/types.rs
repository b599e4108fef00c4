//! Identity, lifecycle phase and test model types shared by managers and the core.

use crate::errors::ManagerError;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeSet, HashMap};

/// Stable identity of a manager, used for set membership and logging.
///
/// By default this is the Rust type name of the manager implementation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManagerId(String);

impl ManagerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identity derived from a manager type.
    pub fn of<T: ?Sized>() -> Self {
        Self(std::any::type_name::<T>().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ManagerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ManagerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// How the dispatcher treats failures and results of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseCategory {
    /// Boolean skip checks; short-circuit on the first reason given
    Gating,
    /// generate / build / start
    Provisioning,
    /// stop / discard; every manager runs regardless of failures
    Teardown,
    /// start of class, start of method, field injection
    TestBoundary,
    /// end of method / class; first non-null proposal wins
    OutcomeProposing,
    /// end of run
    RunBoundary,
}

impl PhaseCategory {
    /// Whether a failure in this category aborts the phase.
    pub fn is_fail_fast(&self) -> bool {
        !matches!(self, PhaseCategory::Teardown | PhaseCategory::RunBoundary)
    }
}

/// The named steps of a test run that are dispatched to every active manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    TestClassIgnore,
    ProvisionGenerate,
    ProvisionBuild,
    ProvisionStart,
    StartOfTestClass,
    TestMethodIgnore,
    FillAnnotatedFields,
    StartOfTestMethod,
    EndOfTestMethod,
    EndOfTestClass,
    ProvisionStop,
    ProvisionDiscard,
    EndOfTestRun,
}

impl LifecyclePhase {
    /// Returns all phases in the order a typical run visits them.
    pub fn all() -> &'static [LifecyclePhase] {
        &[
            LifecyclePhase::TestClassIgnore,
            LifecyclePhase::ProvisionGenerate,
            LifecyclePhase::ProvisionBuild,
            LifecyclePhase::ProvisionStart,
            LifecyclePhase::StartOfTestClass,
            LifecyclePhase::TestMethodIgnore,
            LifecyclePhase::FillAnnotatedFields,
            LifecyclePhase::StartOfTestMethod,
            LifecyclePhase::EndOfTestMethod,
            LifecyclePhase::EndOfTestClass,
            LifecyclePhase::ProvisionStop,
            LifecyclePhase::ProvisionDiscard,
            LifecyclePhase::EndOfTestRun,
        ]
    }

    /// Returns the phase name as a machine friendly string.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecyclePhase::TestClassIgnore => "test_class_ignore",
            LifecyclePhase::ProvisionGenerate => "provision_generate",
            LifecyclePhase::ProvisionBuild => "provision_build",
            LifecyclePhase::ProvisionStart => "provision_start",
            LifecyclePhase::StartOfTestClass => "start_of_test_class",
            LifecyclePhase::TestMethodIgnore => "test_method_ignore",
            LifecyclePhase::FillAnnotatedFields => "fill_annotated_fields",
            LifecyclePhase::StartOfTestMethod => "start_of_test_method",
            LifecyclePhase::EndOfTestMethod => "end_of_test_method",
            LifecyclePhase::EndOfTestClass => "end_of_test_class",
            LifecyclePhase::ProvisionStop => "provision_stop",
            LifecyclePhase::ProvisionDiscard => "provision_discard",
            LifecyclePhase::EndOfTestRun => "end_of_test_run",
        }
    }

    pub fn category(&self) -> PhaseCategory {
        match self {
            LifecyclePhase::TestClassIgnore | LifecyclePhase::TestMethodIgnore => {
                PhaseCategory::Gating
            }
            LifecyclePhase::ProvisionGenerate
            | LifecyclePhase::ProvisionBuild
            | LifecyclePhase::ProvisionStart => PhaseCategory::Provisioning,
            LifecyclePhase::ProvisionStop | LifecyclePhase::ProvisionDiscard => {
                PhaseCategory::Teardown
            }
            LifecyclePhase::StartOfTestClass
            | LifecyclePhase::FillAnnotatedFields
            | LifecyclePhase::StartOfTestMethod => PhaseCategory::TestBoundary,
            LifecyclePhase::EndOfTestMethod | LifecyclePhase::EndOfTestClass => {
                PhaseCategory::OutcomeProposing
            }
            LifecyclePhase::EndOfTestRun => PhaseCategory::RunBoundary,
        }
    }
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_str().replace('_', " "))
    }
}

impl std::str::FromStr for LifecyclePhase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        LifecyclePhase::all()
            .iter()
            .copied()
            .find(|phase| phase.as_str() == normalized)
            .ok_or_else(|| anyhow::anyhow!("Invalid lifecycle phase '{}'", s))
    }
}

/// A field declared on the test class, with the annotation that marks it
/// for injection by a manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestField {
    pub name: String,
    pub annotation: String,
}

/// The test class under execution, as seen by managers deciding whether to
/// activate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TestClass {
    /// Bundle the test class was loaded from
    pub bundle: String,
    /// Fully qualified test class name
    pub name: String,
    /// Class level annotations
    #[serde(default)]
    pub annotations: BTreeSet<String>,
    /// Fields that managers may fill
    #[serde(default)]
    pub fields: Vec<TestField>,
}

impl TestClass {
    pub fn new(bundle: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bundle: bundle.into(),
            name: name.into(),
            annotations: BTreeSet::new(),
            fields: Vec::new(),
        }
    }

    /// Parse the `bundle/Class` form used by run records.
    pub fn parse(test: &str) -> Option<Self> {
        let (bundle, name) = test.split_once('/')?;
        if bundle.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(bundle, name))
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotations.insert(annotation.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, annotation: impl Into<String>) -> Self {
        self.fields.push(TestField {
            name: name.into(),
            annotation: annotation.into(),
        });
        self
    }

    pub fn has_annotation(&self, annotation: &str) -> bool {
        self.annotations.contains(annotation)
    }

    pub fn fields_annotated_with<'a>(
        &'a self,
        annotation: &'a str,
    ) -> impl Iterator<Item = &'a TestField> + 'a {
        self.fields.iter().filter(move |f| f.annotation == annotation)
    }

    fn declares_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }
}

impl std::fmt::Display for TestClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bundle, self.name)
    }
}

/// A test method about to run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TestMethod {
    pub name: String,
    #[serde(default)]
    pub annotations: BTreeSet<String>,
}

impl TestMethod {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotations: BTreeSet::new(),
        }
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotations.insert(annotation.into());
        self
    }

    pub fn has_annotation(&self, annotation: &str) -> bool {
        self.annotations.contains(annotation)
    }
}

/// A live test class instance whose annotated fields are filled by managers.
pub struct TestInstance {
    class: TestClass,
    values: HashMap<String, Box<dyn Any + Send>>,
}

impl TestInstance {
    pub fn new(class: TestClass) -> Self {
        Self {
            class,
            values: HashMap::new(),
        }
    }

    pub fn class(&self) -> &TestClass {
        &self.class
    }

    /// Inject a value into a declared field, replacing any previous value.
    pub fn inject<T: Any + Send>(&mut self, field: &str, value: T) -> Result<(), ManagerError> {
        if !self.class.declares_field(field) {
            return Err(ManagerError::msg(format!(
                "Test class {} has no field named '{}'",
                self.class, field
            )));
        }
        self.values.insert(field.to_string(), Box::new(value));
        Ok(())
    }

    /// Typed access to an injected field value.
    pub fn get<T: Any>(&self, field: &str) -> Option<&T> {
        self.values.get(field).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn is_filled(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }
}

impl std::fmt::Debug for TestInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut filled: Vec<&String> = self.values.keys().collect();
        filled.sort();
        f.debug_struct("TestInstance")
            .field("class", &self.class)
            .field("filled", &filled)
            .finish()
    }
}
