//! Common test utilities for end-to-end runs against a mock wiki

#[allow(dead_code)]
pub mod fixtures;
#[allow(dead_code)]
pub mod renderer;

#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use renderer::*;
