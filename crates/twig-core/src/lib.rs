//! twig-core — a small local version-control engine.
//!
//! Twig stores file contents as content-addressed blobs, records snapshots
//! of a flat working tree as commits in a DAG, and supports branches,
//! checkout, and three-way merge with conflict markers.

pub mod commit;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod graph;
pub mod hash;
pub mod ignore;
pub mod index;
pub mod merge;
pub mod object;
pub mod reconcile;
pub mod refs;
pub mod repo;

pub use error::{TwigError, TwigResult};
pub use merge::MergeOutcome;
pub use repo::{Repository, StatusReport};
