//! Typed containers of query results.

use std::collections::BTreeMap;

use crate::models::{DataNodeId, DataNodeInfo, RegionReplicaSet, Status, StorageGroupSchema};

/// The result of a query plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataSet {
    DataNodesInfo(DataNodesInfoDataSet),
    StorageGroupSchema(StorageGroupSchemaDataSet),
    RegionInfo(RegionInfoDataSet),
}

/// The result of applying a plan of either family.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApplyResponse {
    /// The result of a query plan, `None` when no data matched.
    Query(Option<DataSet>),
    /// The status of a mutation plan.
    Mutation(Status),
}

/// A set of data node info keyed by node ID.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DataNodesInfoDataSet {
    infos: BTreeMap<DataNodeId, DataNodeInfo>,
}

impl DataNodesInfoDataSet {
    pub fn infos(&self) -> &BTreeMap<DataNodeId, DataNodeInfo> {
        &self.infos
    }
}

impl From<BTreeMap<DataNodeId, DataNodeInfo>> for DataNodesInfoDataSet {
    fn from(infos: BTreeMap<DataNodeId, DataNodeInfo>) -> Self {
        Self { infos }
    }
}

/// A list of storage group schemas ordered by name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageGroupSchemaDataSet {
    schemas: Vec<StorageGroupSchema>,
}

impl StorageGroupSchemaDataSet {
    pub fn new(schemas: Vec<StorageGroupSchema>) -> Self {
        Self { schemas }
    }

    pub fn schemas(&self) -> &[StorageGroupSchema] {
        &self.schemas
    }
}

/// A list of region replica sets ordered by region ID.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionInfoDataSet {
    regions: Vec<RegionReplicaSet>,
}

impl RegionInfoDataSet {
    pub fn new(regions: Vec<RegionReplicaSet>) -> Self {
        Self { regions }
    }

    pub fn regions(&self) -> &[RegionReplicaSet] {
        &self.regions
    }
}
