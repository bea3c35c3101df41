//! Cairn Core
//!
//! Core library for declarative management of cloud resources: the resource
//! model and schemas, the Provider abstraction, and the lifecycle helpers
//! (waiter, retry, finders) resource adapters are built from.

pub mod differ;
pub mod effect;
pub mod finder;
pub mod interpreter;
pub mod plan;
pub mod provider;
pub mod resource;
pub mod retry;
pub mod schema;
pub mod tags;
pub mod timeouts;
pub mod waiter;
