//! Extension-based eligibility filter

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Extension lists, stored without the leading dot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    /// Extensions to include; when non-empty only these are eligible
    #[serde(default)]
    pub include_extensions: BTreeSet<String>,
    /// Extensions to exclude; ignored while `include_extensions` is non-empty
    #[serde(default)]
    pub exclude_extensions: BTreeSet<String>,
}

impl FilterOptions {
    /// Build from comma separated lists such as `"txt,.md"`.
    pub fn from_comma_lists(include: &str, exclude: &str) -> Self {
        Self {
            include_extensions: parse_extension_list(include),
            exclude_extensions: parse_extension_list(exclude),
        }
    }
}

/// Split a comma separated extension list, dropping empty items and any leading dot
pub fn parse_extension_list(list: &str) -> BTreeSet<String> {
    list.split(',')
        .map(|item| item.trim().trim_start_matches('.'))
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Decides whether a path takes part in sync
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    options: FilterOptions,
}

impl FileFilter {
    pub fn new(options: FilterOptions) -> Self {
        let normalize = |set: BTreeSet<String>| -> BTreeSet<String> {
            set.into_iter()
                .map(|ext| ext.trim_start_matches('.').to_string())
                .filter(|ext| !ext.is_empty())
                .collect()
        };

        Self {
            options: FilterOptions {
                include_extensions: normalize(options.include_extensions),
                exclude_extensions: normalize(options.exclude_extensions),
            },
        }
    }

    pub fn options(&self) -> &FilterOptions {
        &self.options
    }

    /// Case sensitive match on the final extension. A non-empty include set
    /// is authoritative.
    pub fn is_eligible(&self, path: &Path) -> bool {
        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        if !self.options.include_extensions.is_empty() {
            return self.options.include_extensions.contains(extension);
        }

        !self.options.exclude_extensions.contains(extension)
    }
}
