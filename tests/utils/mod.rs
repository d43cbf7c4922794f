pub mod mocks;
pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use mocks::FlakyMessageStore;
#[allow(unused_imports)]
pub use setup::{spawn_consumer, wait_for_count, TestSetup, TestSetupBuilder};
