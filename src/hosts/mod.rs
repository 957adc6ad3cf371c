// ABOUTME: Host registry mapping logical VM names to SSH connection parameters
// Entries are built once from configuration and never mutated afterwards

pub mod registry;

pub use registry::{HostEntry, HostRegistry, Role};
