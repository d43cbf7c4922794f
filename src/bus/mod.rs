// Message bus boundary
//
// The only place the external bus dependency is visible. Everything above
// this module talks to the `BusClient` trait so it can run against the
// in-memory implementation in tests.

// Public API
pub use client::{BusClient, BusStream};
pub use memory::InMemoryBusClient;
pub use nats::NatsBusClient;

// Internal modules
mod client;
pub mod memory;
mod nats;
pub mod subjects;
