//! The plan executor.
//!
//! The executor is the apply function of the cluster metadata state machine. It dispatches each
//! plan to a query handler or a mutation handler, operating only on the partition table it owns.
//!
//! Plans handed to the wrong entry point fail with `AppError::UnknownPhysicalPlanType` naming the
//! plan's type and leave the table untouched. Validation failures of mutations are reported as a
//! failure `Status`, never as an error.

mod dataset;
#[cfg(test)]
mod mod_test;

use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::Status;
use crate::partition::{PartitionEvent, PartitionTable, PartitionTableReader, TableState};
use crate::plan::{PhysicalPlan, PlanFamily};

pub use dataset::{ApplyResponse, DataNodesInfoDataSet, DataSet, RegionInfoDataSet, StorageGroupSchemaDataSet};

pub const METRIC_PLANS_APPLIED: &str = "hadron_confignode_plans_applied";
pub const METRIC_PLANS_FAILED: &str = "hadron_confignode_plans_failed";
pub const METRIC_DATA_NODES: &str = "hadron_confignode_data_nodes";
pub const METRIC_STORAGE_GROUPS: &str = "hadron_confignode_storage_groups";

/// Register the metrics of the plan executor.
pub fn register_metrics() {
    metrics::register_counter!(METRIC_PLANS_APPLIED, metrics::Unit::Count, "the number of plans applied to the partition table");
    metrics::register_counter!(METRIC_PLANS_FAILED, metrics::Unit::Count, "the number of plans which failed or returned a failure status");
    metrics::register_gauge!(METRIC_DATA_NODES, metrics::Unit::Count, "the number of registered data nodes");
    metrics::register_gauge!(METRIC_STORAGE_GROUPS, metrics::Unit::Count, "the number of registered storage groups");
}

/// The apply function of the cluster metadata state machine.
pub struct PlanExecutor {
    /// The partition table, exclusively owned by this executor.
    table: PartitionTable,
    /// Events produced by applied mutations which have not yet been taken.
    events: Vec<PartitionEvent>,
}

impl Default for PlanExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanExecutor {
    /// Create a new instance over an empty partition table.
    pub fn new() -> Self {
        Self {
            table: PartitionTable::new(),
            events: vec![],
        }
    }

    /// Get a handle for executing query plans concurrently with this executor.
    pub fn reader(&self) -> PlanReader {
        PlanReader { table: self.table.reader() }
    }

    /// Get the current snapshot of the partition table.
    pub fn snapshot(&self) -> Arc<TableState> {
        self.table.snapshot()
    }

    /// Execute a query plan.
    pub fn execute_query(&self, plan: &PhysicalPlan) -> AppResult<Option<DataSet>> {
        self.reader().execute_query(plan)
    }

    /// Execute a mutation plan.
    #[tracing::instrument(level = "trace", skip(self, plan), fields(plan = plan.plan_type().as_str()))]
    pub fn execute_mutation(&mut self, plan: &PhysicalPlan) -> AppResult<Status> {
        let plan_type = plan.plan_type();
        let status = match plan {
            PhysicalPlan::RegisterDataNode(inner) => self.table.register_data_node(inner, &mut self.events),
            PhysicalPlan::SetStorageGroup(inner) => self.table.set_storage_group(inner, &mut self.events),
            PhysicalPlan::DeleteStorageGroup(inner) => self.table.delete_storage_group(inner, &mut self.events),
            PhysicalPlan::QueryDataNodeInfo(_) | PhysicalPlan::QueryStorageGroupSchema | PhysicalPlan::QueryRegionInfo(_) => {
                tracing::warn!(plan = plan_type.as_str(), "query plan given to the mutation path");
                metrics::increment_counter!(METRIC_PLANS_FAILED, "plan" => plan_type.as_str());
                return Err(AppError::mismatched(plan_type));
            }
        };

        metrics::increment_counter!(METRIC_PLANS_APPLIED, "plan" => plan_type.as_str());
        if !status.is_success() {
            tracing::debug!(code = ?status.code, message = ?status.message, "mutation rejected");
            metrics::increment_counter!(METRIC_PLANS_FAILED, "plan" => plan_type.as_str());
        }
        let snapshot = self.table.snapshot();
        metrics::gauge!(METRIC_DATA_NODES, snapshot.data_node_count() as f64);
        metrics::gauge!(METRIC_STORAGE_GROUPS, snapshot.storage_group_count() as f64);
        Ok(status)
    }

    /// Apply a plan of either family, dispatching on the plan's family.
    ///
    /// This is the function which the consensus layer calls for every committed plan, both for
    /// live traffic and for replay.
    pub fn apply(&mut self, plan: &PhysicalPlan) -> AppResult<ApplyResponse> {
        match plan.family() {
            PlanFamily::Query => self.execute_query(plan).map(ApplyResponse::Query),
            PlanFamily::Mutation => self.execute_mutation(plan).map(ApplyResponse::Mutation),
        }
    }

    /// Take all events produced by mutations applied since the last call.
    pub fn take_events(&mut self) -> Vec<PartitionEvent> {
        std::mem::take(&mut self.events)
    }
}

/// A handle for executing query plans against the latest snapshot of a partition table.
#[derive(Clone)]
pub struct PlanReader {
    table: PartitionTableReader,
}

impl PlanReader {
    /// Get the current snapshot of the partition table.
    pub fn snapshot(&self) -> Arc<TableState> {
        self.table.snapshot()
    }

    /// Execute a query plan.
    ///
    /// Returns `None` when no data matches the query.
    #[tracing::instrument(level = "trace", skip(self, plan), fields(plan = plan.plan_type().as_str()))]
    pub fn execute_query(&self, plan: &PhysicalPlan) -> AppResult<Option<DataSet>> {
        let snapshot = self.table.snapshot();
        match plan {
            PhysicalPlan::QueryDataNodeInfo(inner) => Ok(snapshot
                .get_data_node_info(inner)
                .map(|infos| DataSet::DataNodesInfo(DataNodesInfoDataSet::from(infos)))),
            PhysicalPlan::QueryStorageGroupSchema => Ok(Some(DataSet::StorageGroupSchema(StorageGroupSchemaDataSet::new(
                snapshot.get_storage_group_schemas(),
            )))),
            PhysicalPlan::QueryRegionInfo(inner) => Ok(snapshot.get_region_info(inner).map(|regions| DataSet::RegionInfo(RegionInfoDataSet::new(regions)))),
            PhysicalPlan::RegisterDataNode(_) | PhysicalPlan::SetStorageGroup(_) | PhysicalPlan::DeleteStorageGroup(_) => {
                tracing::warn!(plan = plan.plan_type().as_str(), "mutation plan given to the query path");
                Err(AppError::mismatched(plan.plan_type()))
            }
        }
    }
}
