//! Data models of the partition table.

mod node;
pub mod proto;
mod region;
mod schema;
mod status;

pub use node::{DataNodeId, DataNodeInfo, Endpoint};
pub use region::{RegionId, RegionKind, RegionReplicaSet};
pub use schema::{StorageGroupSchema, ROOT};
pub use status::{Status, StatusCode};
