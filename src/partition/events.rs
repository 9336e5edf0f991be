//! Partition table events.
//!
//! Events are produced while a mutation is applied and published only after the apply call has
//! returned, so subscribers never observe a table mid-mutation.

use crate::models::{DataNodeInfo, RegionReplicaSet, StorageGroupSchema};

/// An event describing a change to the partition table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PartitionEvent {
    /// The table was rebuilt from the plan log.
    Recovered(RecoveredEvent),
    /// A new data node was registered.
    DataNodeRegistered(DataNodeInfo),
    /// A new storage group was created along with its regions.
    StorageGroupCreated(StorageGroupCreated),
    /// A storage group and all of its regions were deleted.
    StorageGroupDeleted(StorageGroupDeleted),
}

/// A summary of the table after recovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecoveredEvent {
    /// The index of the last plan applied from the log.
    pub last_applied_index: u64,
    /// The number of registered data nodes.
    pub data_nodes: usize,
    /// The number of registered storage groups.
    pub storage_groups: usize,
}

/// An event indicating that a new storage group was created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageGroupCreated {
    /// The storage group's schema.
    pub schema: StorageGroupSchema,
    /// The regions allocated for the storage group.
    pub regions: Vec<RegionReplicaSet>,
}

/// An event indicating that a storage group was deleted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageGroupDeleted {
    /// The name of the deleted storage group.
    pub name: String,
    /// The regions which were removed along with it.
    pub regions: Vec<RegionReplicaSet>,
}
