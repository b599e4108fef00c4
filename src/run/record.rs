//! Run records held in the dynamic status store.
//!
//! A run is described by the keys under `run.<name>.`:
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `heartbeat` | last heartbeat, RFC 3339 |
//! | `request.type` | how the run was requested |
//! | `test` | `bundle/Class` of the test |
//! | `status` | current run status |
//! | `requestor` | who submitted the run |
//! | `stream` | test stream |
//! | `local` | `true` for a local run |

use super::stores::StatusStore;
use crate::errors::StoreError;
use crate::manager::TestClass;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub name: String,
    pub heartbeat: Option<DateTime<Utc>>,
    pub request_type: Option<String>,
    pub test: String,
    pub status: Option<String>,
    pub requestor: Option<String>,
    pub stream: Option<String>,
    pub local: bool,
}

impl RunRecord {
    /// Read the record for `name` from the status store.
    pub fn load(name: &str, store: &dyn StatusStore) -> Result<Self, StoreError> {
        let prefix = format!("run.{}.", name);
        let mut properties = store.get_prefix(&prefix)?;
        let mut take = |suffix: &str| properties.remove(&format!("{}{}", prefix, suffix));

        let heartbeat = match take("heartbeat") {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| StoreError::InvalidValue {
                        key: format!("{}heartbeat", prefix),
                        message: e.to_string(),
                    })?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        let test = take("test").ok_or_else(|| StoreError::Missing {
            key: format!("{}test", prefix),
        })?;

        let record = Self {
            name: name.to_string(),
            heartbeat,
            request_type: take("request.type"),
            status: take("status"),
            requestor: take("requestor"),
            stream: take("stream"),
            local: take("local").is_some_and(|v| v.eq_ignore_ascii_case("true")),
            test,
        };

        // Validate eagerly so a bad record fails at load time.
        record.test_class()?;
        Ok(record)
    }

    /// The test class named by the `test` key.
    pub fn test_class(&self) -> Result<TestClass, StoreError> {
        TestClass::parse(&self.test).ok_or_else(|| StoreError::InvalidValue {
            key: format!("run.{}.test", self.name),
            message: format!("expected 'bundle/Class', found '{}'", self.test),
        })
    }

    pub fn test_bundle_name(&self) -> &str {
        self.test.split_once('/').map_or("", |(bundle, _)| bundle)
    }

    pub fn test_class_name(&self) -> &str {
        self.test.split_once('/').map_or("", |(_, class)| class)
    }
}
