//! The Hadron config node.
//!
//! The config node maintains the cluster's metadata as a replicated state machine: a registry of
//! data nodes, a registry of storage groups, and the placement of each storage group's regions on
//! data nodes. All changes to this state are expressed as physical plans, applied in the total
//! order established by the consensus layer.

mod app;
pub mod config;
pub mod consensus;
pub mod database;
pub mod error;
pub mod executor;
pub mod models;
pub mod partition;
pub mod plan;
mod server;
mod utils;

// Public exports for binaries.
pub use crate::{
    app::App,
    config::Config,
    consensus::ConsensusHandle,
    error::{AppError, AppResult},
    executor::{ApplyResponse, DataSet, PlanExecutor},
    plan::{PhysicalPlan, PhysicalPlanType},
};
