//! Serialisable snapshot of a run's ordered managers.

use crate::config::OrderingStrategy;
use crate::manager::ManagerId;
use crate::run::ResultArchive;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Archive path the report is stored under.
pub const REPORT_ARTIFACT: &str = "framework/managers.json";

/// Snapshot of the managers taking part in a run, in provisioning order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerReport {
    pub run_name: String,
    /// `bundle/Class`
    pub test_class: String,
    pub managers: Vec<ManagerId>,
    pub strategy: OrderingStrategy,
    pub generated_at: DateTime<Utc>,
}

impl ManagerReport {
    pub fn new(
        run_name: impl Into<String>,
        test_class: impl Into<String>,
        managers: Vec<ManagerId>,
        strategy: OrderingStrategy,
    ) -> Self {
        Self {
            run_name: run_name.into(),
            test_class: test_class.into(),
            managers,
            strategy,
            generated_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize manager report")
    }

    /// Write the report into the run's result archive.
    pub fn archive(&self, archive: &dyn ResultArchive) -> Result<()> {
        let json = self.to_json()?;
        archive
            .store_artifact(REPORT_ARTIFACT, json.as_bytes())
            .with_context(|| format!("Failed to archive {}", REPORT_ARTIFACT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::MemoryArchive;

    #[test]
    fn json_names_managers_in_order() {
        let report = ManagerReport::new(
            "L1",
            "dev.example/SmokeIT",
            vec![ManagerId::new("core"), ManagerId::new("http")],
            OrderingStrategy::Legacy,
        );
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(json["run_name"], "L1");
        assert_eq!(json["managers"], serde_json::json!(["core", "http"]));
        assert_eq!(json["strategy"], "legacy");
        assert!(json["generated_at"].is_string());
    }

    #[test]
    fn archived_report_round_trips() {
        let archive = MemoryArchive::new();
        let report = ManagerReport::new("L2", "b/C", vec![ManagerId::new("core")], OrderingStrategy::Stable);
        report.archive(&archive).unwrap();

        let stored = archive.artifact(REPORT_ARTIFACT).unwrap().unwrap();
        let loaded: ManagerReport = serde_json::from_slice(&stored).unwrap();
        assert_eq!(loaded, report);
    }
}
