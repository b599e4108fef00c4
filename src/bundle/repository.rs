//! Static bundle repository.
//!
//! Bundles are installed up front with their managers and their requirements
//! on other bundles. Loading a bundle resolves its requirements transitively,
//! runs the optional activator of each newly started bundle and then exposes
//! their managers to registry scans.

use super::{BundleLoader, ManagerRegistration, ManagerRegistry};
use crate::errors::{FrameworkError, LoadError};
use crate::manager::Manager;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};

type Activator = Arc<dyn Fn() -> Result<(), String> + Send + Sync>;

/// Lifecycle state of an installed bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleState {
    Installed,
    Resolved,
    Active,
}

impl BundleState {
    pub fn label(&self) -> &'static str {
        match self {
            BundleState::Installed => "Installed",
            BundleState::Resolved => "Resolved",
            BundleState::Active => "Active",
        }
    }
}

impl std::fmt::Display for BundleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A bundle as installed into the repository.
#[derive(Clone)]
pub struct BundleDefinition {
    symbolic_name: String,
    requires: Vec<String>,
    managers: Vec<ManagerRegistration>,
    activator: Option<Activator>,
}

impl BundleDefinition {
    pub fn new(symbolic_name: impl Into<String>) -> Self {
        Self {
            symbolic_name: symbolic_name.into(),
            requires: Vec::new(),
            managers: Vec::new(),
            activator: None,
        }
    }

    /// Another bundle that must be active before this one.
    pub fn requires(mut self, bundle: impl Into<String>) -> Self {
        self.requires.push(bundle.into());
        self
    }

    pub fn with_manager(mut self, registration: ManagerRegistration) -> Self {
        self.managers.push(registration);
        self
    }

    /// Register a `Default`-constructible manager type.
    pub fn with<M: Manager + Default + 'static>(self) -> Self {
        self.with_manager(ManagerRegistration::of::<M>())
    }

    /// Code run when the bundle starts; an `Err` leaves it unstarted.
    pub fn with_activator(
        mut self,
        activator: impl Fn() -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.activator = Some(Arc::new(activator));
        self
    }

    pub fn symbolic_name(&self) -> &str {
        &self.symbolic_name
    }
}

impl std::fmt::Debug for BundleDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleDefinition")
            .field("symbolic_name", &self.symbolic_name)
            .field("requires", &self.requires)
            .field("managers", &self.managers)
            .finish_non_exhaustive()
    }
}

struct InstalledBundle {
    id: u64,
    definition: BundleDefinition,
    state: BundleState,
}

#[derive(Default)]
struct RepositoryState {
    bundles: Vec<InstalledBundle>,
    /// Indices into `bundles`, in the order they became active
    activation_order: Vec<usize>,
    next_id: u64,
}

impl RepositoryState {
    fn index_of(&self, name: &str) -> Option<usize> {
        self.bundles
            .iter()
            .position(|b| b.definition.symbolic_name == name)
    }

    /// Depth-first resolution; `plan` receives bundles to start, requirements first.
    fn resolve(
        &self,
        index: usize,
        resolving: &mut Vec<usize>,
        plan: &mut Vec<usize>,
    ) -> Result<(), LoadError> {
        let bundle = &self.bundles[index];
        if bundle.state == BundleState::Active || plan.contains(&index) || resolving.contains(&index)
        {
            return Ok(());
        }

        resolving.push(index);
        for requirement in &bundle.definition.requires {
            let required = self
                .index_of(requirement)
                .ok_or_else(|| LoadError::Unresolved {
                    bundle: bundle.definition.symbolic_name.clone(),
                    requirement: requirement.clone(),
                })?;
            self.resolve(required, resolving, plan)?;
        }
        resolving.pop();
        plan.push(index);
        Ok(())
    }

    fn status_report(&self) -> String {
        let mut report = String::from("Bundle status:");
        for bundle in &self.bundles {
            report.push_str(&format!(
                "\n{:>5}|{:<11}|     |{}",
                bundle.id,
                bundle.state.label(),
                bundle.definition.symbolic_name
            ));
        }
        report
    }
}

/// In-process bundle repository acting as both registry and loader.
///
/// The repository is shareable between concurrent runs; each run
/// instantiates its own manager objects from the registrations.
#[derive(Default)]
pub struct BundleRepository {
    state: Mutex<RepositoryState>,
}

impl BundleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, RepositoryState>, LoadError> {
        self.state.lock().map_err(|_| LoadError::LockPoisoned)
    }

    /// Install a bundle without starting it.
    pub fn install(&self, definition: BundleDefinition) -> Result<(), LoadError> {
        let mut state = self.lock()?;
        if state.index_of(&definition.symbolic_name).is_some() {
            return Err(LoadError::AlreadyInstalled {
                bundle: definition.symbolic_name,
            });
        }
        let id = state.next_id;
        state.next_id += 1;
        trace!(bundle = %definition.symbolic_name, id, "Installed bundle");
        state.bundles.push(InstalledBundle {
            id,
            definition,
            state: BundleState::Installed,
        });
        Ok(())
    }

    /// Install and immediately start a bundle.
    pub fn install_and_start(&self, definition: BundleDefinition) -> Result<(), LoadError> {
        let name = definition.symbolic_name.clone();
        self.install(definition)?;
        self.load_bundle(&name)
    }

    pub fn bundle_state(&self, bundle: &str) -> Option<BundleState> {
        let state = self.lock().ok()?;
        state.index_of(bundle).map(|i| state.bundles[i].state)
    }

    /// Table of installed bundles with their ids and states.
    pub fn status_report(&self) -> Result<String, LoadError> {
        Ok(self.lock()?.status_report())
    }
}

impl BundleLoader for BundleRepository {
    fn is_bundle_active(&self, bundle: &str) -> bool {
        self.bundle_state(bundle) == Some(BundleState::Active)
    }

    fn load_bundle(&self, bundle: &str) -> Result<(), LoadError> {
        trace!(bundle, "Installing bundle");
        let plan = {
            let state = self.lock()?;
            let index = state.index_of(bundle).ok_or_else(|| LoadError::NotFound {
                bundle: bundle.to_string(),
            })?;
            let mut plan = Vec::new();
            state.resolve(index, &mut Vec::new(), &mut plan)?;
            plan
        };

        // Activators run unlocked so they may query the repository
        for index in plan {
            let (name, activator) = {
                let mut state = self.lock()?;
                let installed = &mut state.bundles[index];
                if installed.state == BundleState::Active {
                    continue;
                }
                installed.state = BundleState::Resolved;
                (
                    installed.definition.symbolic_name.clone(),
                    installed.definition.activator.clone(),
                )
            };

            if let Some(activator) = activator {
                activator().map_err(|reason| LoadError::NotActivated {
                    bundle: name.clone(),
                    reason,
                })?;
            }

            let mut state = self.lock()?;
            if state.bundles[index].state != BundleState::Active {
                debug!(bundle = %name, "Bundle active");
                state.bundles[index].state = BundleState::Active;
                state.activation_order.push(index);
            }
        }

        trace!("{}", self.lock()?.status_report());
        Ok(())
    }
}

impl ManagerRegistry for BundleRepository {
    fn locate_managers(&self) -> Result<Vec<ManagerRegistration>, FrameworkError> {
        let state = self
            .lock()
            .map_err(|e| FrameworkError::Registry(e.to_string()))?;
        Ok(state
            .activation_order
            .iter()
            .flat_map(|&i| state.bundles[i].definition.managers.iter().cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::InitContext;
    use crate::errors::ManagerError;
    use crate::manager::ManagerId;

    #[derive(Default)]
    struct CoreManager;

    impl Manager for CoreManager {
        fn initialise(&mut self, ctx: &mut InitContext<'_>) -> Result<(), ManagerError> {
            ctx.activate();
            Ok(())
        }
    }

    #[derive(Default)]
    struct HttpManager;

    impl Manager for HttpManager {
        fn initialise(&mut self, _ctx: &mut InitContext<'_>) -> Result<(), ManagerError> {
            Ok(())
        }
    }

    fn located_ids(repo: &BundleRepository) -> Vec<ManagerId> {
        repo.locate_managers()
            .unwrap()
            .iter()
            .map(|r| r.id().clone())
            .collect()
    }

    #[test]
    fn installed_bundles_are_not_discoverable_until_started() {
        let repo = BundleRepository::new();
        repo.install(BundleDefinition::new("core").with::<CoreManager>())
            .unwrap();

        assert_eq!(repo.bundle_state("core"), Some(BundleState::Installed));
        assert!(located_ids(&repo).is_empty());

        repo.load_bundle("core").unwrap();
        assert!(repo.is_bundle_active("core"));
        assert_eq!(located_ids(&repo), vec![ManagerId::of::<CoreManager>()]);
    }

    #[test]
    fn requirements_start_first() {
        let repo = BundleRepository::new();
        repo.install(
            BundleDefinition::new("http")
                .requires("core")
                .with::<HttpManager>(),
        )
        .unwrap();
        repo.install(BundleDefinition::new("core").with::<CoreManager>())
            .unwrap();

        repo.load_bundle("http").unwrap();

        assert!(repo.is_bundle_active("core"));
        assert_eq!(
            located_ids(&repo),
            vec![ManagerId::of::<CoreManager>(), ManagerId::of::<HttpManager>()]
        );
    }

    #[test]
    fn loading_is_idempotent() {
        let repo = BundleRepository::new();
        repo.install_and_start(BundleDefinition::new("core").with::<CoreManager>())
            .unwrap();
        repo.load_bundle("core").unwrap();
        assert_eq!(located_ids(&repo).len(), 1);
    }

    #[test]
    fn mutual_requirements_resolve() {
        let repo = BundleRepository::new();
        repo.install(BundleDefinition::new("a").requires("b")).unwrap();
        repo.install(BundleDefinition::new("b").requires("a")).unwrap();
        repo.load_bundle("a").unwrap();
        assert!(repo.is_bundle_active("a"));
        assert!(repo.is_bundle_active("b"));
    }

    #[test]
    fn unknown_bundle_is_not_found() {
        let repo = BundleRepository::new();
        assert!(matches!(
            repo.load_bundle("nope"),
            Err(LoadError::NotFound { .. })
        ));
    }

    #[test]
    fn missing_requirement_is_unresolved_and_nothing_starts() {
        let repo = BundleRepository::new();
        repo.install(BundleDefinition::new("zos").requires("zosmf"))
            .unwrap();

        let err = repo.load_bundle("zos").unwrap_err();
        match err {
            LoadError::Unresolved {
                bundle,
                requirement,
            } => {
                assert_eq!(bundle, "zos");
                assert_eq!(requirement, "zosmf");
            }
            other => panic!("Expected Unresolved, got {other:?}"),
        }
        assert_eq!(repo.bundle_state("zos"), Some(BundleState::Installed));
    }

    #[test]
    fn failing_activator_leaves_bundle_resolved() {
        let repo = BundleRepository::new();
        repo.install(
            BundleDefinition::new("docker")
                .with::<HttpManager>()
                .with_activator(|| Err("no docker engine".to_string())),
        )
        .unwrap();

        let err = repo.load_bundle("docker").unwrap_err();
        assert!(err.to_string().contains("no docker engine"));
        assert_eq!(repo.bundle_state("docker"), Some(BundleState::Resolved));
        assert!(located_ids(&repo).is_empty());
    }

    #[test]
    fn activator_can_query_the_repository() {
        let repo = Arc::new(BundleRepository::new());
        repo.install_and_start(BundleDefinition::new("core")).unwrap();

        let seen = Arc::new(Mutex::new(None));
        let (inner, probe) = (Arc::downgrade(&repo), seen.clone());
        repo.install(BundleDefinition::new("db").requires("core").with_activator(
            move || {
                let repo = inner.upgrade().ok_or("repository dropped")?;
                *probe.lock().unwrap() = Some(repo.is_bundle_active("core"));
                Ok(())
            },
        ))
        .unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        let worker = repo.clone();
        std::thread::spawn(move || {
            let _ = tx.send(worker.load_bundle("db").map_err(|e| e.to_string()));
        });

        let result = rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("load_bundle did not return");
        assert!(result.is_ok());
        assert_eq!(*seen.lock().unwrap(), Some(true));
        assert!(repo.is_bundle_active("db"));
        assert_eq!(repo.status_report().unwrap().matches("Active").count(), 2);
    }

    #[test]
    fn duplicate_install_is_rejected() {
        let repo = BundleRepository::new();
        repo.install(BundleDefinition::new("core")).unwrap();
        assert!(matches!(
            repo.install(BundleDefinition::new("core")),
            Err(LoadError::AlreadyInstalled { .. })
        ));
    }

    #[test]
    fn status_report_lists_states() {
        let repo = BundleRepository::new();
        repo.install(BundleDefinition::new("core")).unwrap();
        repo.install_and_start(BundleDefinition::new("http")).unwrap();

        let report = repo.status_report().unwrap();
        assert!(report.starts_with("Bundle status:"));
        assert!(report.contains("Installed  |     |core"));
        assert!(report.contains("Active     |     |http"));
    }
}
