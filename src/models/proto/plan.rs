/// The envelope of an encoded physical plan.
///
/// The `type` tag identifies the payload; the payload is the encoded plan record of that type.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PhysicalPlanEnvelope {
    /// The plan's type tag.
    #[prost(int32, tag = "1")]
    pub r#type: i32,
    /// The encoded plan record.
    #[prost(bytes = "vec", tag = "2")]
    pub payload: ::prost::alloc::vec::Vec<u8>,
}
/// A request to register a data node.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterDataNodeProto {
    #[prost(string, tag = "1")]
    pub ip: ::prost::alloc::string::String,
    #[prost(uint32, tag = "2")]
    pub port: u32,
    #[prost(uint32, tag = "3")]
    pub cpu_core_num: u32,
    #[prost(uint64, tag = "4")]
    pub max_memory_bytes: u64,
}
/// A query for data node info.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryDataNodeInfoProto {
    /// The ID of the node to query, or `-1` for all nodes.
    #[prost(int32, tag = "1")]
    pub data_node_id: i32,
}
/// A request to create a storage group.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetStorageGroupProto {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(int64, optional, tag = "2")]
    pub ttl_ms: ::core::option::Option<i64>,
    #[prost(uint32, optional, tag = "3")]
    pub schema_replication_factor: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "4")]
    pub data_replication_factor: ::core::option::Option<u32>,
    #[prost(int64, optional, tag = "5")]
    pub time_partition_interval_ms: ::core::option::Option<i64>,
}
/// A query for all storage group schemas.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryStorageGroupSchemaProto {}
/// A request to delete a storage group.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteStorageGroupProto {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
}
/// A query for region replica sets.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryRegionInfoProto {
    /// The storage group to filter by, or all regions when unset.
    #[prost(string, optional, tag = "1")]
    pub storage_group: ::core::option::Option<::prost::alloc::string::String>,
}
