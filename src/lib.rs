//! Core library surface for the topic-based publish/subscribe broker.

pub mod admission;
pub mod config;
pub mod error;
pub mod ingress;
pub mod messagelog;
pub mod subscriber;
pub mod topic;
pub mod wire;

mod cleaner;

pub use cleaner::spawn as spawn_cleaner;
