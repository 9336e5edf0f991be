//! Self-describing binary encoding of physical plans.
//!
//! An encoded plan is a `PhysicalPlanEnvelope` carrying the plan's type tag and the encoded plan
//! record. Decoding is a pure function of the bytes, so an unknown tag fails identically on every
//! replica.

use std::convert::TryFrom;

use anyhow::{bail, Result};

use super::*;
use crate::error::{AppError, AppResult};
use crate::models::proto;
use crate::utils;

/// The wire value selecting all data nodes.
const ALL_DATA_NODES: i32 = -1;

/// Encode the given plan as bytes.
pub fn encode_plan(plan: &PhysicalPlan) -> Result<Vec<u8>> {
    let payload = match plan {
        PhysicalPlan::RegisterDataNode(inner) => utils::encode_model(&proto::RegisterDataNodeProto {
            ip: inner.endpoint.ip.clone(),
            port: inner.endpoint.port as u32,
            cpu_core_num: inner.cpu_core_num,
            max_memory_bytes: inner.max_memory_bytes,
        })?,
        PhysicalPlan::QueryDataNodeInfo(inner) => {
            let data_node_id = match inner.data_node_id {
                None => ALL_DATA_NODES,
                Some(id) if id < 0 => bail!("invalid data node id {} in query, ids are never negative", id),
                Some(id) => id,
            };
            utils::encode_model(&proto::QueryDataNodeInfoProto { data_node_id })?
        }
        PhysicalPlan::SetStorageGroup(inner) => utils::encode_model(&proto::SetStorageGroupProto {
            name: inner.name.clone(),
            ttl_ms: inner.ttl_ms,
            schema_replication_factor: inner.schema_replication_factor,
            data_replication_factor: inner.data_replication_factor,
            time_partition_interval_ms: inner.time_partition_interval_ms,
        })?,
        PhysicalPlan::QueryStorageGroupSchema => utils::encode_model(&proto::QueryStorageGroupSchemaProto {})?,
        PhysicalPlan::DeleteStorageGroup(inner) => utils::encode_model(&proto::DeleteStorageGroupProto { name: inner.name.clone() })?,
        PhysicalPlan::QueryRegionInfo(inner) => utils::encode_model(&proto::QueryRegionInfoProto {
            storage_group: inner.storage_group.clone(),
        })?,
    };
    utils::encode_model(&proto::PhysicalPlanEnvelope {
        r#type: plan.plan_type().tag(),
        payload,
    })
}

/// Decode a plan from the given bytes.
pub fn decode_plan(buf: &[u8]) -> AppResult<PhysicalPlan> {
    let envelope: proto::PhysicalPlanEnvelope = decode_record(buf)?;
    let plan_type = PhysicalPlanType::try_from(envelope.r#type)?;
    let payload = envelope.payload.as_slice();
    Ok(match plan_type {
        PhysicalPlanType::RegisterDataNode => {
            let record: proto::RegisterDataNodeProto = decode_record(payload)?;
            let port = u16::try_from(record.port).map_err(|_| AppError::MalformedPlan(format!("invalid port {}", record.port)))?;
            PhysicalPlan::RegisterDataNode(RegisterDataNodePlan {
                endpoint: Endpoint::new(record.ip, port),
                cpu_core_num: record.cpu_core_num,
                max_memory_bytes: record.max_memory_bytes,
            })
        }
        PhysicalPlanType::QueryDataNodeInfo => {
            let record: proto::QueryDataNodeInfoProto = decode_record(payload)?;
            PhysicalPlan::QueryDataNodeInfo(QueryDataNodeInfoPlan {
                data_node_id: match record.data_node_id {
                    ALL_DATA_NODES => None,
                    id => Some(id),
                },
            })
        }
        PhysicalPlanType::SetStorageGroup => {
            let record: proto::SetStorageGroupProto = decode_record(payload)?;
            PhysicalPlan::SetStorageGroup(SetStorageGroupPlan {
                name: record.name,
                ttl_ms: record.ttl_ms,
                schema_replication_factor: record.schema_replication_factor,
                data_replication_factor: record.data_replication_factor,
                time_partition_interval_ms: record.time_partition_interval_ms,
            })
        }
        PhysicalPlanType::QueryStorageGroupSchema => {
            let _: proto::QueryStorageGroupSchemaProto = decode_record(payload)?;
            PhysicalPlan::QueryStorageGroupSchema
        }
        PhysicalPlanType::DeleteStorageGroup => {
            let record: proto::DeleteStorageGroupProto = decode_record(payload)?;
            PhysicalPlan::DeleteStorageGroup(DeleteStorageGroupPlan { name: record.name })
        }
        PhysicalPlanType::QueryRegionInfo => {
            let record: proto::QueryRegionInfoProto = decode_record(payload)?;
            PhysicalPlan::QueryRegionInfo(QueryRegionInfoPlan {
                storage_group: record.storage_group,
            })
        }
    })
}

fn decode_record<M: prost::Message + Default>(buf: &[u8]) -> AppResult<M> {
    utils::decode_model(buf).map_err(|err| AppError::MalformedPlan(format!("{:#}", err)))
}
