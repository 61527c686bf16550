//! Label and annotation keys with Helm compatibility
//!
//! Tugboat reads both `tugboat.io/*` and `helm.sh/*` hook annotations so
//! existing Helm charts keep working unchanged.

use tugboat_core::ManifestObject;

/// Release-name label stamped on every steady-state resource
pub const RELEASE_NAME_LABEL: &str = "tugboat.io/release-name";
/// Chart-version label stamped on every steady-state resource
pub const CHART_VERSION_LABEL: &str = "tugboat.io/chart-version";
/// Namespace label for cluster-scoped resources
pub const NAMESPACE_LABEL: &str = "tugboat.io/namespace";
/// Chart name annotation
pub const CHART_NAME_ANNOTATION: &str = "tugboat.io/chart-name";
/// Application version annotation
pub const APP_VERSION_ANNOTATION: &str = "tugboat.io/app-version";

/// Tugboat-native hook annotations
pub mod tugboat {
    /// Hook phase annotation
    pub const HOOK: &str = "tugboat.io/hook";
    /// Hook delete policy
    pub const HOOK_DELETE_POLICY: &str = "tugboat.io/hook-delete-policy";
}

/// Helm-compatible hook annotations
pub mod helm {
    /// Hook phase annotation
    pub const HOOK: &str = "helm.sh/hook";
    /// Hook delete policy
    pub const HOOK_DELETE_POLICY: &str = "helm.sh/hook-delete-policy";
}

/// Get annotation value, preferring Tugboat over Helm
///
/// Blank values count as absent.
pub fn get_annotation<'a>(
    object: &'a ManifestObject,
    tugboat_key: &str,
    helm_key: &str,
) -> Option<&'a str> {
    [tugboat_key, helm_key]
        .into_iter()
        .filter_map(|key| object.annotation(key))
        .map(str::trim)
        .find(|v| !v.is_empty())
}

/// Hook phase annotation of an object, if it is a hook
pub fn hook_annotation(object: &ManifestObject) -> Option<&str> {
    get_annotation(object, tugboat::HOOK, helm::HOOK)
}

/// Hook delete policy annotation of an object
pub fn delete_policy_annotation(object: &ManifestObject) -> Option<&str> {
    get_annotation(object, tugboat::HOOK_DELETE_POLICY, helm::HOOK_DELETE_POLICY)
}

/// Split a comma-separated annotation value
pub fn parse_list(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Whether an object lives outside any namespace
///
/// Heuristic: kind or name starting with `cluster`, or kind `Namespace`.
pub fn is_cluster_scoped(kind: &str, name: &str) -> bool {
    let starts_with_cluster = |s: &str| s.to_ascii_lowercase().starts_with("cluster");
    starts_with_cluster(kind) || starts_with_cluster(name) || kind.eq_ignore_ascii_case("namespace")
}

/// Make a version usable as a label value (`+` is not allowed)
pub fn label_value(value: &str) -> String {
    value.replace('+', "_")
}

/// Selector matching every resource of a release
pub fn release_selector(release: &str) -> String {
    format!("{}={}", RELEASE_NAME_LABEL, release)
}

/// Selector matching resources of a release from any other chart version
pub fn stale_selector(release: &str, chart_version: &str) -> String {
    format!(
        "{},{}!={}",
        release_selector(release),
        CHART_VERSION_LABEL,
        label_value(chart_version)
    )
}

/// Narrow a selector to cluster-scoped resources owned by one namespace
pub fn with_namespace(selector: &str, namespace: &str) -> String {
    format!("{},{}={}", selector, NAMESPACE_LABEL, namespace)
}
