//! Configuration for manager activation and ordering.
//!
//! Settings are read from `marshal.toml` and may be overridden from the
//! environment.
//!
//! # Configuration File Format
//!
//! ```toml
//! [activation]
//! # Bundles loaded before the first discovery scan
//! extra_bundles = ["dev.example.core.manager"]
//! # Glob patterns (`*`, `?`) on manager ids that are never instantiated
//! disabled_managers = ["*docker*"]
//! max_closure_rounds = 64
//!
//! [ordering]
//! strategy = "stable"   # or "legacy"
//! ```
//!
//! # Environment
//!
//! - `MARSHAL_ORDERING_STRATEGY` replaces `ordering.strategy`
//! - `MARSHAL_EXTRA_BUNDLES` (comma separated) is appended to `activation.extra_bundles`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "marshal.toml";
pub const ENV_ORDERING_STRATEGY: &str = "MARSHAL_ORDERING_STRATEGY";
pub const ENV_EXTRA_BUNDLES: &str = "MARSHAL_EXTRA_BUNDLES";

/// How active managers are sorted into provisioning order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderingStrategy {
    /// Topological order that keeps discovery order between unrelated managers
    #[default]
    Stable,
    /// Bounded pairwise swap sort, order-for-order compatible with older runs
    Legacy,
}

impl std::fmt::Display for OrderingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderingStrategy::Stable => write!(f, "stable"),
            OrderingStrategy::Legacy => write!(f, "legacy"),
        }
    }
}

impl std::str::FromStr for OrderingStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stable" => Ok(OrderingStrategy::Stable),
            "legacy" => Ok(OrderingStrategy::Legacy),
            _ => anyhow::bail!(
                "Invalid ordering strategy '{}'. Valid values: stable, legacy",
                s
            ),
        }
    }
}

/// Settings for discovery and activation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationSettings {
    #[serde(default)]
    pub extra_bundles: Vec<String>,
    #[serde(default)]
    pub disabled_managers: Vec<String>,
    /// Upper bound on bundle-loading rounds during discovery
    #[serde(default = "default_max_closure_rounds")]
    pub max_closure_rounds: usize,
}

fn default_max_closure_rounds() -> usize {
    64
}

impl Default for ActivationSettings {
    fn default() -> Self {
        Self {
            extra_bundles: Vec::new(),
            disabled_managers: Vec::new(),
            max_closure_rounds: default_max_closure_rounds(),
        }
    }
}

impl ActivationSettings {
    /// Whether a manager id matches one of the disabled patterns.
    pub fn is_disabled(&self, manager_id: &str) -> bool {
        self.disabled_managers
            .iter()
            .any(|pattern| pattern_matches(pattern, manager_id))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderingSettings {
    #[serde(default)]
    pub strategy: OrderingStrategy,
}

/// The complete marshal.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarshalConfig {
    #[serde(default)]
    pub activation: ActivationSettings,
    #[serde(default)]
    pub ordering: OrderingSettings,
}

impl MarshalConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse marshal.toml")
    }

    /// Load `marshal.toml` from `dir`, or defaults if it does not exist.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize marshal.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(
            std::env::var(ENV_ORDERING_STRATEGY).ok().as_deref(),
            std::env::var(ENV_EXTRA_BUNDLES).ok().as_deref(),
        )
    }

    /// Apply explicit override values, as read from the environment.
    pub fn with_overrides(
        mut self,
        ordering_strategy: Option<&str>,
        extra_bundles: Option<&str>,
    ) -> Result<Self> {
        if let Some(strategy) = ordering_strategy {
            self.ordering.strategy = strategy
                .parse()
                .with_context(|| format!("Invalid {}", ENV_ORDERING_STRATEGY))?;
        }
        if let Some(bundles) = extra_bundles {
            for bundle in bundles.split(',').map(str::trim).filter(|b| !b.is_empty()) {
                if !self.activation.extra_bundles.iter().any(|b| b == bundle) {
                    self.activation.extra_bundles.push(bundle.to_string());
                }
            }
        }
        Ok(self)
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.activation.max_closure_rounds == 0 {
            warnings.push(
                "max_closure_rounds is 0: any manager requesting extra bundles will fail activation"
                    .to_string(),
            );
        }

        let mut seen = Vec::new();
        for bundle in &self.activation.extra_bundles {
            if bundle.trim().is_empty() {
                warnings.push("Blank bundle name in activation.extra_bundles".to_string());
            } else if seen.contains(&bundle) {
                warnings.push(format!(
                    "Bundle '{}' listed more than once in activation.extra_bundles",
                    bundle
                ));
            } else {
                seen.push(bundle);
            }
        }

        for pattern in &self.activation.disabled_managers {
            if pattern.trim().is_empty() {
                warnings.push("Empty pattern in activation.disabled_managers".to_string());
            }
        }

        warnings
    }
}

/// Check if a pattern matches a manager id.
/// Supports simple glob patterns:
/// - `*` matches any sequence of characters
/// - `?` matches any single character
pub fn pattern_matches(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let name: Vec<char> = name.to_lowercase().chars().collect();

    glob_match(&pattern, &name)
}

fn glob_match(pattern: &[char], text: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((&'*', rest)) => {
            // Consecutive stars behave as one
            let rest = match rest.iter().position(|&c| c != '*') {
                Some(i) => &rest[i..],
                None => return true,
            };
            (0..=text.len()).any(|i| glob_match(rest, &text[i..]))
        }
        Some((&'?', rest)) => !text.is_empty() && glob_match(rest, &text[1..]),
        Some((c, rest)) => text.first() == Some(c) && glob_match(rest, &text[1..]),
    }
}
