#![allow(clippy::result_large_err)]
//! Manage a traefik reverse proxy serving a Docker Swarm.
//!
//! The proxy is configured through the arguments of its service and the labels of the services it
//! routes to. Each run reads those services, edits them through a set of idempotent operations and
//! only sends the collections that actually changed.

#[macro_use]
mod macros;

pub mod cli;
pub mod cluster;
pub mod commands;
pub mod config;
pub mod errors;
pub(crate) mod fs;
pub mod image;
pub mod routing;
pub mod service;
pub mod session;

pub use config::*;
pub use errors::*;
