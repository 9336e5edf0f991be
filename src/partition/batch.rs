//! Partition table write batches.

use crate::models::{DataNodeInfo, RegionId, RegionReplicaSet, StorageGroupSchema};
use crate::partition::TableState;

/// A batch of operations to apply to the table atomically.
///
/// Building a batch never touches the table. Every operation is infallible once validation has
/// produced it, so applying a batch either happens in full or not at all.
#[derive(Default)]
pub(super) struct TableWriteBatch {
    ops: Vec<TableWriteOp>,
}

impl TableWriteBatch {
    /// Push a new operation into this write batch.
    pub(super) fn push(&mut self, op: TableWriteOp) {
        self.ops.push(op);
    }

    pub(super) fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply all operations of this batch to the given state.
    pub(super) fn apply_to(self, state: &mut TableState) {
        for op in self.ops {
            match op {
                TableWriteOp::InsertDataNode { info } => {
                    state.next_data_node_id = state.next_data_node_id.max(info.data_node_id.saturating_add(1));
                    state.endpoints.insert(info.endpoint.clone(), info.data_node_id);
                    state.data_nodes.insert(info.data_node_id, info);
                }
                TableWriteOp::InsertStorageGroup { schema } => {
                    state.storage_groups.insert(schema.name.clone(), schema);
                }
                TableWriteOp::InsertRegion { replica_set } => {
                    state.next_region_id = state.next_region_id.max(replica_set.region_id.id.saturating_add(1));
                    state.regions.insert(replica_set.region_id, replica_set);
                }
                TableWriteOp::RemoveStorageGroup { name } => {
                    state.storage_groups.remove(&name);
                }
                TableWriteOp::RemoveRegion { region_id } => {
                    state.regions.remove(&region_id);
                }
            }
        }
    }
}

pub(super) enum TableWriteOp {
    /// Insert a new data node into the registry, indexing it by endpoint.
    InsertDataNode { info: DataNodeInfo },
    /// Insert a new storage group schema.
    InsertStorageGroup { schema: StorageGroupSchema },
    /// Insert a newly allocated region.
    InsertRegion { replica_set: RegionReplicaSet },
    /// Remove a storage group schema.
    RemoveStorageGroup { name: String },
    /// Remove a region.
    RemoveRegion { region_id: RegionId },
}
