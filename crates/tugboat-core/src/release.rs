//! Release identity types

use serde::{Deserialize, Serialize};

use crate::chart::ChartMetadata;

/// Which lifecycle operation is being performed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    /// First deployment of a release
    #[default]
    Install,
    /// Replace an existing release with a new render
    Upgrade,
}

impl Operation {
    pub fn is_upgrade(&self) -> bool {
        matches!(self, Operation::Upgrade)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Install => write!(f, "install"),
            Operation::Upgrade => write!(f, "upgrade"),
        }
    }
}

/// Everything stamped onto resources to tie them to a release version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseIdentity {
    /// Release name
    pub release_name: String,

    /// Target namespace
    pub namespace: String,

    /// Chart name (metadata name, else the reference used to resolve it)
    pub chart_name: String,

    /// Resolved chart version; empty when nothing provides one
    pub chart_version: String,

    /// Application version from chart metadata
    #[serde(default)]
    pub app_version: Option<String>,
}

impl ReleaseIdentity {
    /// Resolve the identity of a release
    ///
    /// The chart version comes from the explicit argument, else from chart
    /// metadata, else it is the empty string.
    pub fn resolve(
        release_name: &str,
        namespace: &str,
        chart_ref: &str,
        explicit_version: Option<&str>,
        metadata: Option<&ChartMetadata>,
    ) -> Self {
        let chart_version = explicit_version
            .filter(|v| !v.is_empty())
            .or_else(|| metadata.and_then(ChartMetadata::version))
            .unwrap_or_default()
            .to_string();

        let chart_name = metadata
            .and_then(ChartMetadata::name)
            .unwrap_or(chart_ref)
            .to_string();

        Self {
            release_name: release_name.to_string(),
            namespace: namespace.to_string(),
            chart_name,
            chart_version,
            app_version: metadata
                .and_then(|m| m.app_version.clone())
                .filter(|v| !v.is_empty()),
        }
    }
}

impl std::fmt::Display for ReleaseIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} ({}",
            self.namespace, self.release_name, self.chart_name
        )?;
        if !self.chart_version.is_empty() {
            write!(f, "-{}", self.chart_version)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(version: &str) -> ChartMetadata {
        ChartMetadata {
            name: "nginx".to_string(),
            version: version.to_string(),
            app_version: Some("1.25".to_string()),
            description: None,
        }
    }

    #[test]
    fn test_explicit_version_wins() {
        let meta = metadata("1.0.0");
        let id = ReleaseIdentity::resolve("web", "prod", "repo/nginx", Some("2.0.0"), Some(&meta));
        assert_eq!(id.chart_version, "2.0.0");
        assert_eq!(id.chart_name, "nginx");
        assert_eq!(id.app_version.as_deref(), Some("1.25"));
    }

    #[test]
    fn test_metadata_version_used_when_no_argument() {
        let meta = metadata("1.0.0");
        let id = ReleaseIdentity::resolve("web", "prod", "repo/nginx", None, Some(&meta));
        assert_eq!(id.chart_version, "1.0.0");

        let id = ReleaseIdentity::resolve("web", "prod", "repo/nginx", Some(""), Some(&meta));
        assert_eq!(id.chart_version, "1.0.0");
    }

    #[test]
    fn test_version_defaults_to_empty() {
        let id = ReleaseIdentity::resolve("web", "prod", "./charts/nginx", None, None);
        assert_eq!(id.chart_version, "");
        assert_eq!(id.chart_name, "./charts/nginx");
        assert!(id.app_version.is_none());
    }

    #[test]
    fn test_blank_metadata_name_falls_back_to_reference() {
        let meta = ChartMetadata::default();
        let id = ReleaseIdentity::resolve("web", "prod", "repo/nginx", None, Some(&meta));
        assert_eq!(id.chart_name, "repo/nginx");
        assert_eq!(id.chart_version, "");
    }

    #[test]
    fn test_display() {
        let meta = metadata("1.0.0");
        let id = ReleaseIdentity::resolve("web", "prod", "nginx", None, Some(&meta));
        assert_eq!(id.to_string(), "prod/web (nginx-1.0.0)");
        assert_eq!(Operation::Upgrade.to_string(), "upgrade");
        assert!(Operation::Upgrade.is_upgrade());
        assert!(!Operation::Install.is_upgrade());
    }
}
