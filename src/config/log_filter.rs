use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// One include/exclude pair of the log filter.
///
/// `exclude` distinguishes three states: absent (`None`) leaves the exclude
/// decision to the next source, explicit null (`Some(None)`) decides "exclude
/// nothing", and a pattern (`Some(Some(_))`) drops matching paths.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct FilterBlock {
    /// Regex searched in each inventory path; absent means no narrowing
    #[serde(default)]
    pub include: Option<String>,

    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub exclude: Option<Option<String>>,
}

impl FilterBlock {
    pub fn new(include: Option<&str>, exclude: Option<Option<&str>>) -> Self {
        Self {
            include: include.map(str::to_string),
            exclude: exclude.map(|e| e.map(str::to_string)),
        }
    }
}

/// Log filter shared by the whole fleet
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LogFilterSpec {
    #[serde(default)]
    pub by_role: BTreeMap<String, FilterBlock>,

    #[serde(default)]
    pub default: Option<FilterBlock>,

    /// Parsed for compatibility; never evaluated
    #[serde(default)]
    pub by_node_id: BTreeMap<String, FilterBlock>,
}

impl Default for LogFilterSpec {
    fn default() -> Self {
        Self {
            by_role: BTreeMap::new(),
            default: Some(FilterBlock::new(Some(".*"), Some(None))),
            by_node_id: BTreeMap::new(),
        }
    }
}

/// Where to look for logs on each node and how to narrow them
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LogFilesConf {
    #[serde(default = "default_log_path")]
    pub path: String,

    #[serde(default)]
    pub filter: LogFilterSpec,
}

impl Default for LogFilesConf {
    fn default() -> Self {
        Self {
            path: default_log_path(),
            filter: LogFilterSpec::default(),
        }
    }
}

fn default_log_path() -> String {
    crate::constants::DEFAULT_LOG_PATH.to_string()
}

/// Wraps whatever is present (including null) in `Some`
fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
