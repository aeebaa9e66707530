// Netdash is open-source under the Apache License 2.0; see LICENSE for usage and contributions.
// Library entry point exposing core modules for the binary and integration tests.

pub mod agent;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod poller;
pub mod registry;
pub mod repository;
pub mod server;
pub mod state;
pub mod telemetry;
