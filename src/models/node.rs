use std::fmt;

/// The cluster-wide identifier of a data node.
pub type DataNodeId = i32;

/// The network address of a data node.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Endpoint {
    pub ip: String,
    pub port: u16,
}

impl Endpoint {
    /// Create a new instance.
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self { ip: ip.into(), port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// A registered data node.
///
/// Once registered, a node's info is never changed. Registering the same endpoint again resolves
/// to the existing record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataNodeInfo {
    /// The node's cluster-wide ID.
    pub data_node_id: DataNodeId,
    /// The node's network address.
    pub endpoint: Endpoint,
    /// The number of CPU cores reported by the node at registration.
    pub cpu_core_num: u32,
    /// The maximum memory in bytes reported by the node at registration.
    pub max_memory_bytes: u64,
}
