// Netdash is open-source under the Apache License 2.0; see LICENSE for usage and contributions.
// Metric is one chart exposed by an instance, plus whether the dashboard tracks it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub id: Uuid,
    pub name: String,
    pub instance_id: Uuid,
    pub selected: bool,
}

impl Metric {
    pub fn new(instance_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            instance_id,
            selected: false,
        }
    }

    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let keyword = keyword.trim();
        keyword.is_empty() || self.name.to_lowercase().contains(&keyword.to_lowercase())
    }
}

/// Rebuilds one instance's metric list from freshly fetched chart names.
///
/// Names already known for `instance_id` keep their id and selection; new names start
/// unselected; names the agent no longer serves are dropped. Metrics of other instances
/// in `existing` are ignored.
pub fn merge_fetched<I, S>(existing: &[Metric], instance_id: Uuid, names: I) -> Vec<Metric>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names
        .into_iter()
        .map(Into::into)
        .map(|name: String| {
            existing
                .iter()
                .find(|metric| metric.instance_id == instance_id && metric.name == name)
                .cloned()
                .unwrap_or_else(|| Metric::new(instance_id, name))
        })
        .collect()
}
