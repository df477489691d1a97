//! Loading of compiled job-shop instance bundles from RON, JSON, or TOML.
//!
//! A bundle is an [`InstanceConfig`](jobshop_core::InstanceConfig), plus an
//! optional initial [`State`](jobshop_core::State) and optional
//! [`SimulationOptions`](jobshop_core::SimulationOptions). It can live in a
//! single file ([`load_bundle`]) or be split across `instance.*`, `state.*`,
//! and `options.*` in one directory ([`load_bundle_dir`]).

pub mod bundle;
pub mod loader;

pub use bundle::{InstanceBundle, load_bundle, load_bundle_dir};
pub use loader::{DataLoadError, Format};
