//! Chart metadata (`Chart.yaml`)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CoreError, Result};

/// Chart metadata file name
pub const CHART_FILE: &str = "Chart.yaml";

/// The subset of `Chart.yaml` the release manager cares about
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    /// Chart name
    #[serde(default)]
    pub name: String,

    /// Chart version, kept verbatim (not every chart in the wild is strict SemVer)
    #[serde(default, deserialize_with = "scalar_string")]
    pub version: String,

    /// Application version
    #[serde(default, deserialize_with = "optional_scalar_string")]
    pub app_version: Option<String>,

    /// Description
    #[serde(default)]
    pub description: Option<String>,
}

impl ChartMetadata {
    /// Parse metadata from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| CoreError::InvalidChart {
            message: e.to_string(),
        })
    }

    /// Load `Chart.yaml` from a chart directory
    ///
    /// Returns `Ok(None)` when the directory has no `Chart.yaml`.
    pub fn load<P: AsRef<Path>>(chart_dir: P) -> Result<Option<Self>> {
        let root = chart_dir.as_ref();
        if !root.exists() {
            return Err(CoreError::ChartNotFound {
                path: root.display().to_string(),
            });
        }

        let file = root.join(CHART_FILE);
        if !file.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&file)?;
        Self::from_yaml(&content).map(Some)
    }

    /// Name, or `None` when the chart left it blank
    pub fn name(&self) -> Option<&str> {
        Some(self.name.as_str()).filter(|n| !n.is_empty())
    }

    /// Version, or `None` when the chart left it blank
    pub fn version(&self) -> Option<&str> {
        Some(self.version.as_str()).filter(|v| !v.is_empty())
    }
}

/// Accept `version: 1.0` as well as `version: "1.0"`
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(optional_scalar_string(deserializer)?.unwrap_or_default())
}

fn optional_scalar_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_yaml::Value::Null) => None,
        Some(serde_yaml::Value::String(s)) => Some(s),
        Some(serde_yaml::Value::Number(n)) => Some(n.to_string()),
        Some(serde_yaml::Value::Bool(b)) => Some(b.to_string()),
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "expected a scalar, found {:?}",
                other
            )));
        }
    })
}
