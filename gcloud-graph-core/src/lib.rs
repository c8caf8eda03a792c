#![doc = "gcloud-graph-core: collects Google Cloud resources into a typed entity/relationship graph."]

//! The library behind the `gcloud-graph` CLI: API clients, the step registry,
//! the dependency-ordered executor and the in-memory job state.
//!
//! # Usage
//! Build a [`config::CollectorConfig`], wrap a [`client::GoogleHttpClient`] in
//! [`steps::ApiClients::from_http`] and call [`executor::collect_in_memory`].
//! For custom stores or sinks, build a [`steps::StepContext`] yourself and call
//! [`executor::collect`].

pub mod client;
pub mod config;
pub mod contract;
pub mod error;
pub mod events;
pub mod executor;
pub mod graph;
pub mod job_state;
pub mod paginate;
pub mod records;
pub mod resource_name;
pub mod slots;
pub mod steps;
