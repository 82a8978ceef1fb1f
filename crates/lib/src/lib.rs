//! vigil-lib: Core types and logic for vigil
//!
//! This crate provides the building blocks of the job runner:
//! - `workflow`: the declarative workflow file (what to provision and build)
//! - `provision`: environment provisioning from a dependency spec
//! - `runner`: the build command executor with bounded retries
//! - `group`: concurrency groups (one run per workflow/ref, newest wins)
//! - `schedule`: weekly fire times for the scheduled trigger
//! - `history`: run records for `vigil status`

pub mod consts;
pub mod envspec;
pub mod group;
pub mod history;
pub mod job;
pub mod platform;
pub mod provision;
pub mod runner;
pub mod schedule;
pub mod util;
pub mod workflow;
