//! Manager discovery and activation.
//!
//! Activation runs in two steps:
//!
//! 1. **Closure** - managers are asked which extra bundles they need. The
//!    bundles are loaded, the registry is scanned again, and only the newly
//!    discovered managers are asked in the next round. Discovery is complete
//!    when a round requests nothing new or surfaces no new managers.
//! 2. **Self-initialisation** - every discovered manager, in discovery
//!    order, decides whether it is active for the test class. A manager may
//!    also require other managers, whose `you_are_required` hook then runs.
//!
//! Any bundle that fails to load, and any error from a manager, aborts the
//! whole activation.

mod context;

pub use context::{ActiveManagers, InitContext};

use crate::bundle::{BundleLoader, ManagerRegistry};
use crate::config::ActivationSettings;
use crate::errors::FrameworkError;
use crate::manager::{Manager, ManagerId};
use crate::run::RunContext;
use std::collections::{HashSet, VecDeque};
use std::ops::Range;
use tracing::{debug, info, trace, warn};

/// Every manager seen so far in a run, in discovery order.
///
/// The set only grows. Managers are instantiated once, when first seen.
#[derive(Default)]
pub struct DiscoveredManagers {
    /// Registration ids already considered, including disabled ones
    seen: HashSet<ManagerId>,
    ids: Vec<ManagerId>,
    managers: Vec<Box<dyn Manager>>,
}

impl DiscoveredManagers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &[ManagerId] {
        &self.ids
    }

    pub fn contains(&self, id: &ManagerId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}

impl std::fmt::Debug for DiscoveredManagers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveredManagers")
            .field("ids", &self.ids)
            .finish_non_exhaustive()
    }
}

/// Drives discovery to closure and asks managers to initialise.
pub struct ActivationCoordinator<'a> {
    registry: &'a dyn ManagerRegistry,
    loader: &'a dyn BundleLoader,
    run: &'a RunContext,
    settings: &'a ActivationSettings,
}

impl<'a> ActivationCoordinator<'a> {
    pub fn new(
        registry: &'a dyn ManagerRegistry,
        loader: &'a dyn BundleLoader,
        run: &'a RunContext,
        settings: &'a ActivationSettings,
    ) -> Self {
        Self {
            registry,
            loader,
            run,
            settings,
        }
    }

    /// Full activation: configured bundles, closure, then self-initialisation.
    ///
    /// Returns the active managers in activation order.
    pub fn activate(&self) -> Result<Vec<Box<dyn Manager>>, FrameworkError> {
        self.load_configured_bundles()?;

        let mut discovered = DiscoveredManagers::new();
        self.discover(&mut discovered)?;
        self.initialise(discovered)
    }

    /// Load the bundles named in the activation settings.
    pub fn load_configured_bundles(&self) -> Result<(), FrameworkError> {
        for bundle in &self.settings.extra_bundles {
            if !self.loader.is_bundle_active(bundle) {
                self.load(bundle)?;
            }
        }
        Ok(())
    }

    /// Extend `discovered` until no manager requests a bundle that is not
    /// yet active. Returns the number of managers added by this call.
    ///
    /// Managers already in `discovered` are never asked again, so calling
    /// this a second time without new registrations is a no-op.
    pub fn discover(&self, discovered: &mut DiscoveredManagers) -> Result<usize, FrameworkError> {
        let mut batch = self.scan(discovered)?;
        let mut added = batch.len();
        let mut rounds = 0;

        while !batch.is_empty() {
            let requested = self.requested_bundles(discovered, batch)?;
            if requested.is_empty() {
                break;
            }

            rounds += 1;
            if rounds > self.settings.max_closure_rounds {
                return Err(FrameworkError::ClosureDidNotConverge {
                    rounds: self.settings.max_closure_rounds,
                });
            }

            for bundle in &requested {
                self.load(bundle)?;
            }

            batch = self.scan(discovered)?;
            added += batch.len();
        }

        debug!(
            run = self.run.run_name(),
            managers = discovered.len(),
            rounds,
            "Manager discovery complete"
        );
        Ok(added)
    }

    /// Ask every discovered manager to initialise and collect the active ones.
    pub fn initialise(
        &self,
        discovered: DiscoveredManagers,
    ) -> Result<Vec<Box<dyn Manager>>, FrameworkError> {
        let DiscoveredManagers {
            ids, mut managers, ..
        } = discovered;
        let mut active = ActiveManagers::new();
        let mut asked = HashSet::new();

        for index in 0..managers.len() {
            let mut ctx = InitContext::new(self.run, ids[index].clone(), &ids, &mut active);
            managers[index]
                .initialise(&mut ctx)
                .map_err(|source| FrameworkError::Initialise {
                    manager: ids[index].clone(),
                    source,
                })?;
            let requests = ctx.into_requests();

            self.honour_requests(&ids[index], requests, &ids, &mut managers, &mut active, &mut asked)?;
        }

        debug!("The following managers are active:");
        for id in active.ids() {
            debug!("   {}", id);
        }

        let mut slots: Vec<Option<Box<dyn Manager>>> = managers.into_iter().map(Some).collect();
        let mut result = Vec::with_capacity(active.len());
        for id in active.ids() {
            if let Some(manager) = ids
                .iter()
                .position(|known| known == id)
                .and_then(|i| slots[i].take())
            {
                result.push(manager);
            }
        }
        Ok(result)
    }

    /// Run `you_are_required` for each requested manager, transitively.
    fn honour_requests(
        &self,
        requester: &ManagerId,
        requests: Vec<ManagerId>,
        ids: &[ManagerId],
        managers: &mut [Box<dyn Manager>],
        active: &mut ActiveManagers,
        asked: &mut HashSet<ManagerId>,
    ) -> Result<(), FrameworkError> {
        let mut queue: VecDeque<(ManagerId, ManagerId)> = requests
            .into_iter()
            .map(|requested| (requester.clone(), requested))
            .collect();

        while let Some((requester, requested)) = queue.pop_front() {
            let Some(index) = ids.iter().position(|id| *id == requested) else {
                if self.settings.is_disabled(requested.as_str()) {
                    return Err(FrameworkError::DisabledManagerRequested {
                        requester,
                        requested,
                    });
                }
                return Err(FrameworkError::UnknownManagerRequested {
                    requester,
                    requested,
                });
            };

            if active.contains(&requested) || !asked.insert(requested.clone()) {
                continue;
            }

            trace!(manager = %requested, requester = %requester, "Manager required");
            let mut ctx = InitContext::new(self.run, requested.clone(), ids, active);
            managers[index]
                .you_are_required(&mut ctx)
                .map_err(|source| FrameworkError::Initialise {
                    manager: requested.clone(),
                    source,
                })?;
            queue.extend(
                ctx.into_requests()
                    .into_iter()
                    .map(|next| (requested.clone(), next)),
            );
        }
        Ok(())
    }

    /// Bundles requested by the managers in `batch` that are not yet active.
    fn requested_bundles(
        &self,
        discovered: &DiscoveredManagers,
        batch: Range<usize>,
    ) -> Result<Vec<String>, FrameworkError> {
        let mut requested: Vec<String> = Vec::new();

        for index in batch {
            let bundles = discovered.managers[index]
                .extra_bundles(self.run)
                .map_err(|source| FrameworkError::ExtraBundles {
                    manager: discovered.ids[index].clone(),
                    source,
                })?;

            for bundle in bundles {
                if !requested.contains(&bundle) && !self.loader.is_bundle_active(&bundle) {
                    trace!(manager = %discovered.ids[index], bundle = %bundle, "Extra bundle requested");
                    requested.push(bundle);
                }
            }
        }
        Ok(requested)
    }

    /// Scan the registry and instantiate managers not seen before.
    /// Returns the index range of the new managers in `discovered`.
    fn scan(&self, discovered: &mut DiscoveredManagers) -> Result<Range<usize>, FrameworkError> {
        let start = discovered.managers.len();

        for registration in self.registry.locate_managers()? {
            if !discovered.seen.insert(registration.id().clone()) {
                continue;
            }
            if self.settings.is_disabled(registration.id().as_str()) {
                info!(manager = %registration.id(), "Manager disabled by configuration");
                continue;
            }

            let manager = registration.instantiate();
            let id = manager.id();
            if id != *registration.id() {
                warn!(
                    registered = %registration.id(),
                    reported = %id,
                    "Manager reports a different id than it was registered with"
                );
            }
            if discovered.ids.contains(&id) {
                warn!(manager = %id, "Duplicate manager id, ignoring later registration");
                continue;
            }

            trace!(manager = %id, "Discovered manager");
            discovered.ids.push(id);
            discovered.managers.push(manager);
        }

        Ok(start..discovered.managers.len())
    }

    fn load(&self, bundle: &str) -> Result<(), FrameworkError> {
        debug!(bundle, "Loading bundle");
        self.loader
            .load_bundle(bundle)
            .map_err(|source| FrameworkError::BundleLoad {
                bundle: bundle.to_string(),
                source,
            })
    }
}
