//! The partition table.
//!
//! The partition table is the state owned by the cluster metadata state machine: the registry of
//! data nodes, the registry of storage groups, and the assignment of each storage group's regions
//! to data nodes.
//!
//! ## Snapshots
//! The table's state is held behind an atomically swappable pointer. Readers load the current
//! snapshot without blocking and keep a consistent view for as long as they hold it. Mutations are
//! applied in two phases: first the plan is validated against the current snapshot and translated
//! into a `TableWriteBatch`, then the batch is applied to a copy of the snapshot which is published
//! with a single pointer swap. A failed validation produces an empty batch, so the table is never
//! partially updated.
//!
//! ## Determinism
//! Every choice made here is a function of the current state and the plan alone. All collections
//! are ordered maps so that iteration order, and therefore every result, depends only on content.
//!
//! Data node IDs are assigned from a counter starting at `0` which grows by one for every newly
//! registered endpoint. Region IDs are assigned from a second counter, two per storage group (the
//! schema region first, then the data region).

mod batch;
mod events;

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::models::{DataNodeId, DataNodeInfo, Endpoint, RegionId, RegionKind, RegionReplicaSet, Status, StatusCode, StorageGroupSchema};
use crate::plan::{
    DeleteStorageGroupPlan, QueryDataNodeInfoPlan, QueryRegionInfoPlan, RegisterDataNodePlan, SetStorageGroupPlan, DEFAULT_REPLICATION_FACTOR,
    DEFAULT_TIME_PARTITION_INTERVAL_MS, DEFAULT_TTL_MS,
};
use batch::{TableWriteBatch, TableWriteOp};

pub use events::{PartitionEvent, RecoveredEvent, StorageGroupCreated, StorageGroupDeleted};

/// A point-in-time state of the partition table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableState {
    /// All registered data nodes by ID.
    data_nodes: BTreeMap<DataNodeId, DataNodeInfo>,
    /// An index of registered data node IDs by endpoint.
    endpoints: BTreeMap<Endpoint, DataNodeId>,
    /// All registered storage groups by name.
    storage_groups: BTreeMap<String, StorageGroupSchema>,
    /// All allocated regions by ID.
    regions: BTreeMap<RegionId, RegionReplicaSet>,
    /// The ID to assign to the next newly registered data node.
    next_data_node_id: DataNodeId,
    /// The ID to assign to the next allocated region.
    next_region_id: u32,
}

impl TableState {
    pub fn data_node_count(&self) -> usize {
        self.data_nodes.len()
    }

    pub fn storage_group_count(&self) -> usize {
        self.storage_groups.len()
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Get the ID registered for the given endpoint, if any.
    pub fn data_node_id(&self, endpoint: &Endpoint) -> Option<DataNodeId> {
        self.endpoints.get(endpoint).copied()
    }

    /// Get the info of the data nodes selected by the given plan.
    ///
    /// Returns `None` when no node matches, including when no nodes are registered.
    pub fn get_data_node_info(&self, plan: &QueryDataNodeInfoPlan) -> Option<BTreeMap<DataNodeId, DataNodeInfo>> {
        let selected: BTreeMap<_, _> = match plan.data_node_id {
            Some(id) => self.data_nodes.get(&id).map(|info| (id, info.clone())).into_iter().collect(),
            None => self.data_nodes.clone(),
        };
        if selected.is_empty() {
            None
        } else {
            Some(selected)
        }
    }

    /// Get the schemas of all storage groups, ordered by name.
    pub fn get_storage_group_schemas(&self) -> Vec<StorageGroupSchema> {
        self.storage_groups.values().cloned().collect()
    }

    /// Get the regions selected by the given plan, ordered by region ID.
    ///
    /// Returns `None` when no region matches.
    pub fn get_region_info(&self, plan: &QueryRegionInfoPlan) -> Option<Vec<RegionReplicaSet>> {
        let selected: Vec<_> = self
            .regions
            .values()
            .filter(|region| plan.storage_group.as_deref().map(|name| region.storage_group == name).unwrap_or(true))
            .cloned()
            .collect();
        if selected.is_empty() {
            None
        } else {
            Some(selected)
        }
    }

    /// Select the data nodes which are to hold the replicas of the given region.
    ///
    /// Nodes are taken in ascending ID order, starting at `region_id % node_count` and wrapping
    /// around, up to the replication factor or the number of registered nodes.
    fn allocate_replicas(&self, region_id: u32, replication_factor: u32) -> Vec<DataNodeId> {
        let node_ids: Vec<_> = self.data_nodes.keys().copied().collect();
        if node_ids.is_empty() {
            return vec![];
        }
        let start = region_id as usize % node_ids.len();
        let count = (replication_factor as usize).min(node_ids.len());
        node_ids.iter().cycle().skip(start).take(count).copied().collect()
    }
}

/// The partition table.
///
/// Only the holder of the table may mutate it, which requires `&mut self`; any number of
/// `PartitionTableReader`s may query it concurrently.
pub struct PartitionTable {
    state: Arc<ArcSwap<TableState>>,
}

impl Default for PartitionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PartitionTable {
    /// Create a new empty table.
    pub fn new() -> Self {
        Self {
            state: Arc::new(ArcSwap::from_pointee(TableState::default())),
        }
    }

    /// Get a read-only handle to this table.
    pub fn reader(&self) -> PartitionTableReader {
        PartitionTableReader { state: self.state.clone() }
    }

    /// Get the current snapshot of this table.
    pub fn snapshot(&self) -> Arc<TableState> {
        self.state.load_full()
    }

    /// Register a data node.
    ///
    /// Registering an endpoint which is already known succeeds without changing the table and
    /// references the existing ID.
    #[tracing::instrument(level = "trace", skip(self, plan, events))]
    pub fn register_data_node(&mut self, plan: &RegisterDataNodePlan, events: &mut Vec<PartitionEvent>) -> Status {
        let current = self.snapshot();
        if let Some(id) = current.data_node_id(&plan.endpoint) {
            tracing::debug!(id, endpoint = %plan.endpoint, "data node is already registered");
            return Status::success()
                .with_message(format!("data node {} is already registered", plan.endpoint))
                .with_data_node_id(id);
        }
        let id = current.next_data_node_id;
        if id.checked_add(1).is_none() {
            return Status::error(StatusCode::IllegalParameter, "data node ID space is exhausted");
        }

        let info = DataNodeInfo {
            data_node_id: id,
            endpoint: plan.endpoint.clone(),
            cpu_core_num: plan.cpu_core_num,
            max_memory_bytes: plan.max_memory_bytes,
        };
        let mut batch = TableWriteBatch::default();
        batch.push(TableWriteOp::InsertDataNode { info: info.clone() });
        self.commit(&current, batch);

        tracing::debug!(id, endpoint = %info.endpoint, "registered new data node");
        events.push(PartitionEvent::DataNodeRegistered(info));
        Status::success().with_message(format!("data node registered with id {}", id)).with_data_node_id(id)
    }

    /// Create a storage group, allocating its schema and data regions.
    ///
    /// Attributes left unset by the plan take the built-in defaults, never configured ones.
    #[tracing::instrument(level = "trace", skip(self, plan, events))]
    pub fn set_storage_group(&mut self, plan: &SetStorageGroupPlan, events: &mut Vec<PartitionEvent>) -> Status {
        let current = self.snapshot();
        let schema = StorageGroupSchema {
            name: plan.name.clone(),
            ttl_ms: plan.ttl_ms.unwrap_or(DEFAULT_TTL_MS),
            schema_replication_factor: plan.schema_replication_factor.unwrap_or(DEFAULT_REPLICATION_FACTOR),
            data_replication_factor: plan.data_replication_factor.unwrap_or(DEFAULT_REPLICATION_FACTOR),
            time_partition_interval_ms: plan.time_partition_interval_ms.unwrap_or(DEFAULT_TIME_PARTITION_INTERVAL_MS),
        };

        // Validate everything up front, nothing below this point may fail.
        if let Some(reason) = StorageGroupSchema::check_name(&schema.name) {
            return Status::error(StatusCode::IllegalPath, reason);
        }
        if schema.schema_replication_factor == 0 || schema.data_replication_factor == 0 {
            return Status::error(StatusCode::IllegalParameter, "replication factors must be at least 1");
        }
        if schema.time_partition_interval_ms <= 0 {
            return Status::error(StatusCode::IllegalParameter, "time partition interval must be positive");
        }
        if current.storage_groups.contains_key(&schema.name) {
            return Status::error(StatusCode::StorageGroupAlreadyExists, format!("storage group {} already exists", schema.name));
        }
        let schema_region_id = current.next_region_id;
        let data_region_id = match schema_region_id.checked_add(1).filter(|id| id.checked_add(1).is_some()) {
            Some(id) => id,
            None => return Status::error(StatusCode::IllegalParameter, "region ID space is exhausted"),
        };

        let regions = vec![
            RegionReplicaSet {
                region_id: RegionId {
                    id: schema_region_id,
                    kind: RegionKind::Schema,
                },
                storage_group: schema.name.clone(),
                data_node_ids: current.allocate_replicas(schema_region_id, schema.schema_replication_factor),
            },
            RegionReplicaSet {
                region_id: RegionId {
                    id: data_region_id,
                    kind: RegionKind::Data,
                },
                storage_group: schema.name.clone(),
                data_node_ids: current.allocate_replicas(data_region_id, schema.data_replication_factor),
            },
        ];
        let mut batch = TableWriteBatch::default();
        batch.push(TableWriteOp::InsertStorageGroup { schema: schema.clone() });
        for replica_set in regions.iter().cloned() {
            batch.push(TableWriteOp::InsertRegion { replica_set });
        }
        self.commit(&current, batch);

        tracing::debug!(name = %schema.name, "created storage group");
        events.push(PartitionEvent::StorageGroupCreated(StorageGroupCreated { schema, regions }));
        Status::success()
    }

    /// Delete a storage group along with all of its regions.
    #[tracing::instrument(level = "trace", skip(self, plan, events))]
    pub fn delete_storage_group(&mut self, plan: &DeleteStorageGroupPlan, events: &mut Vec<PartitionEvent>) -> Status {
        let current = self.snapshot();
        if !current.storage_groups.contains_key(&plan.name) {
            return Status::error(StatusCode::StorageGroupNotExist, format!("storage group {} does not exist", plan.name));
        }

        let regions: Vec<_> = current.regions.values().filter(|region| region.storage_group == plan.name).cloned().collect();
        let mut batch = TableWriteBatch::default();
        batch.push(TableWriteOp::RemoveStorageGroup { name: plan.name.clone() });
        for region in regions.iter() {
            batch.push(TableWriteOp::RemoveRegion { region_id: region.region_id });
        }
        self.commit(&current, batch);

        tracing::debug!(name = %plan.name, "deleted storage group");
        events.push(PartitionEvent::StorageGroupDeleted(StorageGroupDeleted {
            name: plan.name.clone(),
            regions,
        }));
        Status::success()
    }

    /// Publish a new snapshot built from the given base state and batch.
    fn commit(&self, base: &TableState, batch: TableWriteBatch) {
        if batch.is_empty() {
            return;
        }
        let mut next = base.clone();
        batch.apply_to(&mut next);
        self.state.store(Arc::new(next));
    }
}

/// A read-only handle to a partition table.
///
/// Every read observes a fully applied snapshot.
#[derive(Clone)]
pub struct PartitionTableReader {
    state: Arc<ArcSwap<TableState>>,
}

impl PartitionTableReader {
    /// Get the current snapshot of the table.
    pub fn snapshot(&self) -> Arc<TableState> {
        self.state.load_full()
    }
}
