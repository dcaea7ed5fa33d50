//! Library half of the `dtx` binary: the facade that composes the
//! archive codec, markup normalizer, directive parser, and executor,
//! plus the config and JSON-to-`Record` conversion it depends on.
//! Split out from `main.rs` so the facade can be exercised directly by
//! integration tests without shelling out to the binary.

pub mod config;
pub mod data;
pub mod facade;
