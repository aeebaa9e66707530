// Netdash is open-source under the Apache License 2.0; see LICENSE for usage and contributions.
// Domain records shared by the registry, catalog, poller and HTTP layers.

pub mod instance;
pub mod metric;
pub mod sample;
