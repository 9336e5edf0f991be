use super::DataNodeId;

/// The kind of a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegionKind {
    /// A region holding a storage group's schema.
    Schema,
    /// A region holding a storage group's data.
    Data,
}

/// The ID of a region.
///
/// IDs are allocated from a single counter shared by all kinds, so `id` alone is unique.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionId {
    pub id: u32,
    pub kind: RegionKind,
}

/// A region along with the data nodes holding its replicas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionReplicaSet {
    pub region_id: RegionId,
    /// The storage group to which this region belongs.
    pub storage_group: String,
    /// The data nodes holding a replica of this region.
    ///
    /// This may hold fewer entries than the group's replication factor when not enough nodes
    /// were registered at the time the region was allocated.
    pub data_node_ids: Vec<DataNodeId>,
}
