//! Typed error hierarchy for the manager orchestration core.
//!
//! Four enums cover the kinds of failure source:
//! - `ManagerError`: raised by extension (manager) code
//! - `LoadError`: raised by a bundle loader
//! - `StoreError`: raised by the run's backing stores
//! - `FrameworkError`: raised by the core itself, carrying the phase and
//!   manager identity alongside the nested cause

use crate::manager::{LifecyclePhase, ManagerId};
use thiserror::Error;

/// Errors raised by a manager implementation.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("{0}")]
    Message(String),

    #[error("{message}: {source}")]
    Failed {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ManagerError {
    /// Shorthand for a plain message error.
    pub fn msg(message: impl Into<String>) -> Self {
        ManagerError::Message(message.into())
    }

    /// Wrap a lower level error with a message.
    pub fn failed(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ManagerError::Failed {
            message: message.into(),
            source: Box::new(source),
        }
    }
}

/// Errors raised while loading an extension bundle.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Unable to locate bundle \"{bundle}\" in repository")]
    NotFound { bundle: String },

    #[error("Unable to resolve bundle \"{bundle}\": missing requirement \"{requirement}\"")]
    Unresolved { bundle: String, requirement: String },

    #[error("Bundle \"{bundle}\" is already installed")]
    AlreadyInstalled { bundle: String },

    #[error("Bundle \"{bundle}\" failed to install and activate: {reason}")]
    NotActivated { bundle: String, reason: String },

    #[error("Bundle repository lock poisoned")]
    LockPoisoned,
}

/// Errors raised by the property, status, archive and credentials stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Required key '{key}' is missing")]
    Missing { key: String },

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Errors from activation, ordering and phase dispatch.
#[derive(Debug, Error)]
pub enum FrameworkError {
    #[error("Unable to install bundle \"{bundle}\": {source}")]
    BundleLoad {
        bundle: String,
        #[source]
        source: LoadError,
    },

    #[error("Problem requesting extra bundles from manager {manager}: {source}")]
    ExtraBundles {
        manager: ManagerId,
        #[source]
        source: ManagerError,
    },

    #[error("Unable to initialise manager {manager}: {source}")]
    Initialise {
        manager: ManagerId,
        #[source]
        source: ManagerError,
    },

    #[error("Manager {requester} requested unknown manager {requested}")]
    UnknownManagerRequested {
        requester: ManagerId,
        requested: ManagerId,
    },

    #[error("Manager {requester} requested manager {requested}, which is disabled by configuration")]
    DisabledManagerRequested {
        requester: ManagerId,
        requested: ManagerId,
    },

    #[error("Manager discovery did not reach closure after {rounds} rounds")]
    ClosureDidNotConverge { rounds: usize },

    #[error("Unable to sort managers into order for provisioning (attempted order: {})", format_order(.order))]
    UnableToSort { order: Vec<ManagerId> },

    #[error("Problem in {phase} for manager {manager}: {source}")]
    Phase {
        phase: LifecyclePhase,
        manager: ManagerId,
        #[source]
        source: ManagerError,
    },

    #[error("Unable to locate managers: {0}")]
    Registry(String),
}

fn format_order(order: &[ManagerId]) -> String {
    order
        .iter()
        .map(ManagerId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn phase_error_names_phase_and_manager() {
        let err = FrameworkError::Phase {
            phase: LifecyclePhase::ProvisionStart,
            manager: ManagerId::new("dev.example.DockerManager"),
            source: ManagerError::msg("engine unreachable"),
        };
        let text = err.to_string();
        assert!(text.contains("provision start"));
        assert!(text.contains("dev.example.DockerManager"));
        assert!(text.contains("engine unreachable"));
        assert!(err.source().is_some());
    }

    #[test]
    fn unable_to_sort_lists_attempted_order() {
        let err = FrameworkError::UnableToSort {
            order: vec![ManagerId::new("a"), ManagerId::new("b")],
        };
        assert!(err.to_string().contains("a, b"));
    }

    #[test]
    fn bundle_load_is_matchable() {
        let err = FrameworkError::BundleLoad {
            bundle: "dev.example.zos".to_string(),
            source: LoadError::NotFound {
                bundle: "dev.example.zos".to_string(),
            },
        };
        match &err {
            FrameworkError::BundleLoad {
                source: LoadError::NotFound { bundle },
                ..
            } => assert_eq!(bundle, "dev.example.zos"),
            _ => panic!("Expected BundleLoad(NotFound)"),
        }
    }

    #[test]
    fn manager_error_converts_from_anyhow() {
        let err: ManagerError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, ManagerError::Other(_)));
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn manager_error_failed_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no kubeconfig");
        let err = ManagerError::failed("cannot reach cluster", io);
        assert!(err.to_string().contains("no kubeconfig"));
        assert!(err.source().is_some());
    }
}
