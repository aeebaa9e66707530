// Netdash is open-source under the Apache License 2.0; see LICENSE for usage and contributions.
// Instance models a registered monitoring agent reachable over HTTP.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: Uuid,
    pub name: String,
    pub url: String,
}

impl Instance {
    pub fn new(name: impl Into<String>, url: impl AsRef<str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            url: normalize_url(url.as_ref()),
        }
    }

    /// Applies the present fields of `patch`, normalising the url the same way `new` does.
    pub fn apply(&mut self, patch: InstancePatch) {
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(url) = patch.url {
            self.url = normalize_url(&url);
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct InstancePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Trims whitespace and a single trailing slash so endpoint paths can be appended directly.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    trimmed.strip_suffix('/').unwrap_or(trimmed).to_string()
}
