// The binary in main.rs is a thin CLI over this library; benchmarks and
// integration tests import the same modules via `snipdrill::*`.

pub mod coach;
pub mod config;
pub mod content;
pub mod engine;
pub mod session;
pub mod store;
