//! Physical plans.
//!
//! A physical plan is an immutable command or query submitted to the cluster metadata state
//! machine. The set of plans is closed: every consumer of plans matches exhaustively over
//! `PhysicalPlan`, so adding a plan means adding a variant here and a handling branch wherever
//! plans are consumed.
//!
//! Every plan is identified by a `PhysicalPlanType` tag which is stable on the wire, and belongs
//! to exactly one `PlanFamily`.

mod codec;

use std::convert::TryFrom;

use crate::config::Config;
use crate::error::AppError;
use crate::models::{DataNodeId, Endpoint};

pub use codec::{decode_plan, encode_plan};

/// The default TTL of a storage group, which is to retain data forever.
pub const DEFAULT_TTL_MS: i64 = i64::MAX;
/// The default replication factor of storage group regions.
pub const DEFAULT_REPLICATION_FACTOR: u32 = 1;
/// The default width of a time partition, one week.
pub const DEFAULT_TIME_PARTITION_INTERVAL_MS: i64 = 604_800_000;

/// Attributes given to storage groups whose creation plan leaves them unset.
///
/// These are resolved into a plan before it is committed, so applying a committed plan never
/// depends on the configuration of the node applying it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StorageGroupDefaults {
    pub ttl_ms: i64,
    pub schema_replication_factor: u32,
    pub data_replication_factor: u32,
    pub time_partition_interval_ms: i64,
}

impl Default for StorageGroupDefaults {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_TTL_MS,
            schema_replication_factor: DEFAULT_REPLICATION_FACTOR,
            data_replication_factor: DEFAULT_REPLICATION_FACTOR,
            time_partition_interval_ms: DEFAULT_TIME_PARTITION_INTERVAL_MS,
        }
    }
}

impl From<&Config> for StorageGroupDefaults {
    fn from(config: &Config) -> Self {
        Self {
            ttl_ms: config.default_ttl_ms,
            schema_replication_factor: config.default_schema_replication_factor,
            data_replication_factor: config.default_data_replication_factor,
            time_partition_interval_ms: config.default_time_partition_interval_ms,
        }
    }
}

/// The type tag of a physical plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhysicalPlanType {
    RegisterDataNode = 0,
    QueryDataNodeInfo = 1,
    SetStorageGroup = 2,
    QueryStorageGroupSchema = 3,
    DeleteStorageGroup = 4,
    QueryRegionInfo = 5,
}

impl PhysicalPlanType {
    /// The wire value of this tag.
    pub fn tag(self) -> i32 {
        self as i32
    }

    /// The family to which plans of this type belong.
    pub fn family(self) -> PlanFamily {
        match self {
            Self::RegisterDataNode | Self::SetStorageGroup | Self::DeleteStorageGroup => PlanFamily::Mutation,
            Self::QueryDataNodeInfo | Self::QueryStorageGroupSchema | Self::QueryRegionInfo => PlanFamily::Query,
        }
    }

    /// A static name for this type, used for logging and metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RegisterDataNode => "register_data_node",
            Self::QueryDataNodeInfo => "query_data_node_info",
            Self::SetStorageGroup => "set_storage_group",
            Self::QueryStorageGroupSchema => "query_storage_group_schema",
            Self::DeleteStorageGroup => "delete_storage_group",
            Self::QueryRegionInfo => "query_region_info",
        }
    }
}

impl TryFrom<i32> for PhysicalPlanType {
    type Error = AppError;

    fn try_from(tag: i32) -> Result<Self, Self::Error> {
        Ok(match tag {
            0 => Self::RegisterDataNode,
            1 => Self::QueryDataNodeInfo,
            2 => Self::SetStorageGroup,
            3 => Self::QueryStorageGroupSchema,
            4 => Self::DeleteStorageGroup,
            5 => Self::QueryRegionInfo,
            _ => return Err(AppError::unknown_tag(tag)),
        })
    }
}

/// The family of a plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlanFamily {
    /// Read-only plans, which never mutate the partition table.
    Query,
    /// State-changing plans.
    Mutation,
}

/// A physical plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhysicalPlan {
    RegisterDataNode(RegisterDataNodePlan),
    QueryDataNodeInfo(QueryDataNodeInfoPlan),
    SetStorageGroup(SetStorageGroupPlan),
    QueryStorageGroupSchema,
    DeleteStorageGroup(DeleteStorageGroupPlan),
    QueryRegionInfo(QueryRegionInfoPlan),
}

impl PhysicalPlan {
    /// The type tag of this plan.
    pub fn plan_type(&self) -> PhysicalPlanType {
        match self {
            Self::RegisterDataNode(_) => PhysicalPlanType::RegisterDataNode,
            Self::QueryDataNodeInfo(_) => PhysicalPlanType::QueryDataNodeInfo,
            Self::SetStorageGroup(_) => PhysicalPlanType::SetStorageGroup,
            Self::QueryStorageGroupSchema => PhysicalPlanType::QueryStorageGroupSchema,
            Self::DeleteStorageGroup(_) => PhysicalPlanType::DeleteStorageGroup,
            Self::QueryRegionInfo(_) => PhysicalPlanType::QueryRegionInfo,
        }
    }

    /// The family of this plan.
    pub fn family(&self) -> PlanFamily {
        self.plan_type().family()
    }
}

/// A plan to register a data node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterDataNodePlan {
    /// The network address of the node being registered.
    pub endpoint: Endpoint,
    /// The number of CPU cores of the node.
    pub cpu_core_num: u32,
    /// The maximum memory in bytes of the node.
    pub max_memory_bytes: u64,
}

impl RegisterDataNodePlan {
    /// Create a new instance with no declared capacity.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            cpu_core_num: 0,
            max_memory_bytes: 0,
        }
    }

    /// Declare the capacity of the node.
    pub fn with_capacity(mut self, cpu_core_num: u32, max_memory_bytes: u64) -> Self {
        self.cpu_core_num = cpu_core_num;
        self.max_memory_bytes = max_memory_bytes;
        self
    }
}

/// A query for registered data nodes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryDataNodeInfoPlan {
    /// The node to select, or `None` for all nodes.
    pub data_node_id: Option<DataNodeId>,
}

impl QueryDataNodeInfoPlan {
    pub fn all() -> Self {
        Self { data_node_id: None }
    }

    pub fn by_id(data_node_id: DataNodeId) -> Self {
        Self {
            data_node_id: Some(data_node_id),
        }
    }
}

/// A plan to create a storage group.
///
/// Unset attributes are meant to be filled by `resolve` before the plan is committed. Any which
/// remain unset when the plan is applied take the built-in `DEFAULT_*` values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetStorageGroupPlan {
    pub name: String,
    pub ttl_ms: Option<i64>,
    pub schema_replication_factor: Option<u32>,
    pub data_replication_factor: Option<u32>,
    pub time_partition_interval_ms: Option<i64>,
}

impl SetStorageGroupPlan {
    /// Create a new instance using default attributes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ttl_ms: None,
            schema_replication_factor: None,
            data_replication_factor: None,
            time_partition_interval_ms: None,
        }
    }

    /// Fill every unset attribute from the given defaults, keeping explicit values.
    pub fn resolve(mut self, defaults: &StorageGroupDefaults) -> Self {
        self.ttl_ms.get_or_insert(defaults.ttl_ms);
        self.schema_replication_factor.get_or_insert(defaults.schema_replication_factor);
        self.data_replication_factor.get_or_insert(defaults.data_replication_factor);
        self.time_partition_interval_ms.get_or_insert(defaults.time_partition_interval_ms);
        self
    }
}

/// A plan to delete a storage group along with its regions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteStorageGroupPlan {
    pub name: String,
}

impl DeleteStorageGroupPlan {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A query for region replica sets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryRegionInfoPlan {
    /// The storage group to select, or `None` for all regions.
    pub storage_group: Option<String>,
}

impl QueryRegionInfoPlan {
    pub fn all() -> Self {
        Self { storage_group: None }
    }

    pub fn by_storage_group(name: impl Into<String>) -> Self {
        Self {
            storage_group: Some(name.into()),
        }
    }
}

impl From<RegisterDataNodePlan> for PhysicalPlan {
    fn from(src: RegisterDataNodePlan) -> Self {
        PhysicalPlan::RegisterDataNode(src)
    }
}

impl From<QueryDataNodeInfoPlan> for PhysicalPlan {
    fn from(src: QueryDataNodeInfoPlan) -> Self {
        PhysicalPlan::QueryDataNodeInfo(src)
    }
}

impl From<SetStorageGroupPlan> for PhysicalPlan {
    fn from(src: SetStorageGroupPlan) -> Self {
        PhysicalPlan::SetStorageGroup(src)
    }
}

impl From<DeleteStorageGroupPlan> for PhysicalPlan {
    fn from(src: DeleteStorageGroupPlan) -> Self {
        PhysicalPlan::DeleteStorageGroup(src)
    }
}

impl From<QueryRegionInfoPlan> for PhysicalPlan {
    fn from(src: QueryRegionInfoPlan) -> Self {
        PhysicalPlan::QueryRegionInfo(src)
    }
}
