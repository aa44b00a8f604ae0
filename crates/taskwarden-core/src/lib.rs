//! taskwarden-core
//!
//! Queue-backed task execution: workers that keep long tasks leased while
//! they make progress, and an autoscaler that sizes services from queue depth.
//!
//! # Modules
//! - **domain**: envelopes, scaling rules, queue attributes, errors
//! - **ports**: queue, orchestrator, notifier and service-state abstractions
//! - **app**: supervisor, task stream, worker, builder, autoscaler
//! - **typed**: `Task` trait, `TaskHandler` trait, `TaskRouter`
//! - **impls**: in-memory queue and orchestrator, deployment-aware state probe, handlers
//! - **config**: settings file shape and validation
//! - **observability**: logger setup

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod typed;

#[cfg(test)]
mod testing;
