//! Dependency ordering of active managers.
//!
//! Managers only expose a pairwise predicate, [`Manager::dependent_on`].
//! The relation is queried once per ordered pair into a matrix and both
//! strategies work on indices into the input list:
//!
//! - **stable**: repeatedly place the earliest input-order manager whose
//!   dependencies have all been placed. Unrelated managers keep their
//!   discovery order.
//! - **legacy**: the bounded pairwise swap sort in [`legacy`], kept for
//!   runs that must reproduce older provisioning orders exactly.
//!
//! Whatever the strategy, the result is verified before it is accepted. A
//! cycle, direct or indirect, fails verification and is reported as
//! [`FrameworkError::UnableToSort`].

mod legacy;

use crate::config::OrderingStrategy;
use crate::errors::FrameworkError;
use crate::manager::{Manager, ManagerId};
use tracing::{debug, error};

/// `matrix[a][b]` is true when manager `a` must come after manager `b`.
/// The diagonal is always false.
pub(crate) struct DependencyMatrix {
    matrix: Vec<Vec<bool>>,
}

impl DependencyMatrix {
    pub(crate) fn from_managers(managers: &[Box<dyn Manager>]) -> Self {
        Self::from_fn(managers.len(), |a, b| {
            managers[a].dependent_on(managers[b].as_ref())
        })
    }

    pub(crate) fn from_fn(len: usize, depends: impl Fn(usize, usize) -> bool) -> Self {
        let matrix = (0..len)
            .map(|a| (0..len).map(|b| a != b && depends(a, b)).collect())
            .collect();
        Self { matrix }
    }

    pub(crate) fn len(&self) -> usize {
        self.matrix.len()
    }

    pub(crate) fn depends(&self, a: usize, b: usize) -> bool {
        self.matrix[a][b]
    }
}

/// Sort `managers` into provisioning order.
///
/// Every manager that is `dependent_on` another is placed after it. Fails
/// with [`FrameworkError::UnableToSort`] when no such order exists.
pub fn order(
    managers: Vec<Box<dyn Manager>>,
    strategy: OrderingStrategy,
) -> Result<Vec<Box<dyn Manager>>, FrameworkError> {
    let deps = DependencyMatrix::from_managers(&managers);
    let sorted = match strategy {
        OrderingStrategy::Stable => stable_order(&deps),
        OrderingStrategy::Legacy => legacy::bounded_swap_sort(&deps),
    };

    if let Some((earlier, later)) = first_violation(&deps, &sorted) {
        let attempted: Vec<ManagerId> = sorted.iter().map(|&i| managers[i].id()).collect();
        error!(
            strategy = %strategy,
            "The managers were unable to be sorted into provisioning order"
        );
        error!(
            "{} must be provisioned before {}",
            attempted[later], attempted[earlier]
        );
        error!("The resulting order was:");
        for id in &attempted {
            error!("   {}", id);
        }
        return Err(FrameworkError::UnableToSort { order: attempted });
    }

    debug!(strategy = %strategy, managers = sorted.len(), "Managers sorted");
    Ok(permute(managers, &sorted))
}

/// Earliest-ready selection. Managers left over by a cycle are appended in
/// input order so verification can report them.
pub(crate) fn stable_order(deps: &DependencyMatrix) -> Vec<usize> {
    let len = deps.len();
    let mut placed = vec![false; len];
    let mut sorted = Vec::with_capacity(len);

    while sorted.len() < len {
        let ready = (0..len).find(|&candidate| {
            !placed[candidate] && (0..len).all(|dep| placed[dep] || !deps.depends(candidate, dep))
        });

        match ready {
            Some(next) => {
                placed[next] = true;
                sorted.push(next);
            }
            None => {
                sorted.extend((0..len).filter(|&i| !placed[i]));
                break;
            }
        }
    }
    sorted
}

/// First pair of positions `(earlier, later)` where the manager at
/// `earlier` depends on the manager at `later`.
pub(crate) fn first_violation(deps: &DependencyMatrix, sorted: &[usize]) -> Option<(usize, usize)> {
    for (position, &current) in sorted.iter().enumerate() {
        // Nothing before this manager may depend on it
        if let Some(earlier) = (0..position).find(|&j| deps.depends(sorted[j], current)) {
            return Some((earlier, position));
        }
        // It may not depend on anything after it
        if let Some(later) = (position + 1..sorted.len())
            .rev()
            .find(|&j| deps.depends(current, sorted[j]))
        {
            return Some((position, later));
        }
    }
    None
}

fn permute(managers: Vec<Box<dyn Manager>>, sorted: &[usize]) -> Vec<Box<dyn Manager>> {
    let mut slots: Vec<Option<Box<dyn Manager>>> = managers.into_iter().map(Some).collect();
    sorted.iter().filter_map(|&i| slots[i].take()).collect()
}
