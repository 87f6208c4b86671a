//! Plugin and version selection helpers.
//!
//! Plugins advertise availability through labels: `hidden` removes a plugin
//! from selection lists, `enabled` switches a plugin or a single version off,
//! and `deprecated` marks a version that still works but should not be picked
//! for new templates.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::identifiers::{PluginName, PluginVersion};
use crate::types::{Labels, Plugin, PluginVersionDetails};
use crate::workflow::{Choice, FormData};

pub const LABEL_HIDDEN: &str = "hidden";
pub const LABEL_ENABLED: &str = "enabled";
pub const LABEL_DEPRECATED: &str = "deprecated";

/// Label access shared by plugin summaries and version details.
pub trait PluginLabels {
    fn plugin_labels(&self) -> &Labels;
    fn version_labels(&self) -> &BTreeMap<String, Labels>;
    fn versions(&self) -> &[PluginVersion];
}

impl PluginLabels for Plugin {
    fn plugin_labels(&self) -> &Labels {
        &self.plugin_labels
    }
    fn version_labels(&self) -> &BTreeMap<String, Labels> {
        &self.version_labels
    }
    fn versions(&self) -> &[PluginVersion] {
        &self.versions
    }
}

impl PluginLabels for PluginVersionDetails {
    fn plugin_labels(&self) -> &Labels {
        &self.plugin_labels
    }
    fn version_labels(&self) -> &BTreeMap<String, Labels> {
        &self.version_labels
    }
    fn versions(&self) -> &[PluginVersion] {
        &self.versions
    }
}

fn label_status(labels: &Labels, name: &str) -> Option<bool> {
    labels.get(name).map(|label| label.status)
}

/// Versions that can be selected, sorted newest first.
///
/// A plugin that reports no version labels at all keeps every advertised
/// version selectable rather than being hidden as having none enabled.
pub fn enabled_versions<P: PluginLabels>(plugin: &P) -> Vec<PluginVersion> {
    if label_status(plugin.plugin_labels(), LABEL_ENABLED) == Some(false) {
        return Vec::new();
    }
    let versions: Vec<PluginVersion> = if plugin.version_labels().is_empty() {
        plugin.versions().to_vec()
    } else {
        plugin
            .version_labels()
            .iter()
            .filter(|(_, labels)| label_status(labels, LABEL_ENABLED) != Some(false))
            .map(|(version, _)| PluginVersion::new(version.as_str()))
            .collect()
    };
    sort_versions_desc(versions)
}

pub fn is_plugin_visible<P: PluginLabels>(plugin: &P) -> bool {
    if label_status(plugin.plugin_labels(), LABEL_HIDDEN) == Some(true) {
        return false;
    }
    !enabled_versions(plugin).is_empty()
}

pub fn is_version_deprecated<P: PluginLabels>(plugin: &P, version: &PluginVersion) -> bool {
    plugin
        .version_labels()
        .get(version.as_str())
        .and_then(|labels| label_status(labels, LABEL_DEPRECATED))
        .unwrap_or(false)
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum VersionPart<'a> {
    Number(u64),
    Text(&'a str),
}

fn version_parts(raw: &str) -> Vec<VersionPart<'_>> {
    raw.split(['.', '-', '_'])
        .map(|part| match part.parse::<u64>() {
            Ok(n) => VersionPart::Number(n),
            Err(_) => VersionPart::Text(part),
        })
        .collect()
}

/// Numeric-aware version ordering: `2.10` sorts after `2.9`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    version_parts(a).cmp(&version_parts(b))
}

pub fn sort_versions_desc(mut versions: Vec<PluginVersion>) -> Vec<PluginVersion> {
    versions.sort_by(|a, b| compare_versions(b.as_str(), a.as_str()));
    versions.dedup();
    versions
}

/// Choices for a plugin select: visible plugins only, labelled by title.
pub fn plugin_choices(plugins: &[Plugin]) -> Vec<Choice> {
    plugins
        .iter()
        .filter(|plugin| is_plugin_visible(*plugin))
        .map(|plugin| {
            let label = if plugin.title.trim().is_empty() {
                plugin.name.to_string()
            } else {
                plugin.title.clone()
            };
            Choice::new(plugin.name.as_str(), label)
        })
        .collect()
}

/// Version choices for one plugin, deprecated versions marked as such.
pub fn version_choices(plugin: &Plugin) -> Vec<Choice> {
    enabled_versions(plugin)
        .into_iter()
        .map(|version| {
            let label = if is_version_deprecated(plugin, &version) {
                format!("{version} (deprecated)")
            } else {
                version.to_string()
            };
            Choice::new(version.as_str(), label)
        })
        .collect()
}

/// `service:process` choices for every process the version offers.
pub fn node_process_choices(details: &PluginVersionDetails) -> Vec<Choice> {
    details
        .node_processes
        .iter()
        .flat_map(|(service, processes)| {
            processes.iter().map(move |process| {
                Choice::new(format!("{service}:{process}"), process.as_str())
            })
        })
        .collect()
}

/// The plugin/version pair a wizard was started for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSelection {
    pub plugin: PluginName,
    pub version: PluginVersion,
}

impl PluginSelection {
    pub fn new(plugin: impl Into<PluginName>, version: impl Into<PluginVersion>) -> Self {
        Self {
            plugin: plugin.into(),
            version: version.into(),
        }
    }

    /// Reads `plugin_name` and then `plugin_version`, `hadoop_version` or
    /// `<plugin>_version`, whichever is present first.
    pub fn from_form(form: &FormData) -> Option<Self> {
        let plugin = form.get("plugin_name")?;
        let plugin_specific = format!("{plugin}_version");
        let version = ["plugin_version", "hadoop_version", plugin_specific.as_str()]
            .into_iter()
            .find_map(|key| form.get(key))?;
        Some(Self::new(plugin, version))
    }
}
