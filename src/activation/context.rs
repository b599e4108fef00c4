//! Per-run accumulators handed to managers during self-initialisation.

use crate::manager::{ManagerId, TestClass};
use crate::run::RunContext;

/// Ordered, duplicate-free set of active manager ids.
///
/// Each run builds its own accumulator; the insertion order is the
/// discovery order that dependency ordering starts from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveManagers {
    ids: Vec<ManagerId>,
}

impl ActiveManagers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` if absent. Returns true if it was newly added.
    pub fn insert(&mut self, id: ManagerId) -> bool {
        if self.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    pub fn contains(&self, id: &ManagerId) -> bool {
        self.ids.contains(id)
    }

    pub fn ids(&self) -> &[ManagerId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// What a manager sees while deciding whether to take part in a run.
pub struct InitContext<'a> {
    run: &'a RunContext,
    current: ManagerId,
    all: &'a [ManagerId],
    active: &'a mut ActiveManagers,
    requested: Vec<ManagerId>,
}

impl<'a> InitContext<'a> {
    pub fn new(
        run: &'a RunContext,
        current: ManagerId,
        all: &'a [ManagerId],
        active: &'a mut ActiveManagers,
    ) -> Self {
        Self {
            run,
            current,
            all,
            active,
            requested: Vec::new(),
        }
    }

    pub fn run(&self) -> &RunContext {
        self.run
    }

    pub fn test_class(&self) -> &TestClass {
        self.run.test_class()
    }

    /// The manager being initialised.
    pub fn manager(&self) -> &ManagerId {
        &self.current
    }

    /// Every manager discovered for this run, in discovery order.
    pub fn all_managers(&self) -> &[ManagerId] {
        self.all
    }

    pub fn is_present(&self, id: &ManagerId) -> bool {
        self.all.contains(id)
    }

    pub fn is_active(&self, id: &ManagerId) -> bool {
        self.active.contains(id)
    }

    pub fn active_managers(&self) -> &[ManagerId] {
        self.active.ids()
    }

    /// Add the current manager to the active set.
    pub fn activate(&mut self) -> bool {
        self.active.insert(self.current.clone())
    }

    /// Ask for another manager to be activated once this call returns.
    pub fn require(&mut self, id: impl Into<ManagerId>) {
        let id = id.into();
        if !self.requested.contains(&id) {
            self.requested.push(id);
        }
    }

    pub(crate) fn into_requests(self) -> Vec<ManagerId> {
        self.requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_set_is_unique_and_ordered() {
        let mut active = ActiveManagers::new();
        assert!(active.insert(ManagerId::new("b")));
        assert!(active.insert(ManagerId::new("a")));
        assert!(!active.insert(ManagerId::new("b")));
        assert_eq!(active.ids(), &[ManagerId::new("b"), ManagerId::new("a")]);
    }

    #[test]
    fn context_activates_current_and_collects_requests() {
        let run = RunContext::local(TestClass::new("b", "C"));
        let all = vec![ManagerId::new("zos"), ManagerId::new("zosmf")];
        let mut active = ActiveManagers::new();

        let mut ctx = InitContext::new(&run, ManagerId::new("zos"), &all, &mut active);
        assert!(ctx.is_present(&ManagerId::new("zosmf")));
        assert!(ctx.activate());
        assert!(!ctx.activate());
        ctx.require("zosmf");
        ctx.require("zosmf");
        assert!(ctx.is_active(&ManagerId::new("zos")));

        assert_eq!(ctx.into_requests(), vec![ManagerId::new("zosmf")]);
        assert_eq!(active.ids(), &[ManagerId::new("zos")]);
    }
}
