use std::sync::Arc;

use anyhow::Result;
use rand::prelude::*;
use rand::rngs::StdRng;

use super::*;
use crate::error::UnknownPlanType;
use crate::models::{Endpoint, StatusCode};
use crate::plan::{self, DeleteStorageGroupPlan, QueryDataNodeInfoPlan, QueryRegionInfoPlan, RegisterDataNodePlan, SetStorageGroupPlan, StorageGroupDefaults};

fn new_executor() -> PlanExecutor {
    PlanExecutor::new()
}

fn register(port: u16) -> PhysicalPlan {
    RegisterDataNodePlan::new(Endpoint::new("10.0.0.1", port)).into()
}

/// Build a random sequence of plans drawn from a small pool so that duplicates, re-registrations
/// and deletes of missing groups all occur.
fn random_plans(seed: u64, len: usize) -> Vec<PhysicalPlan> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| match rng.gen_range(0..6) {
            0 => RegisterDataNodePlan::new(Endpoint::new("10.0.0.1", rng.gen_range(6667..6672))).into(),
            1 => QueryDataNodeInfoPlan {
                data_node_id: if rng.gen_bool(0.5) { None } else { Some(rng.gen_range(0..6)) },
            }
            .into(),
            2 => {
                let mut plan = SetStorageGroupPlan::new(format!("root.sg{}", rng.gen_range(0..4)));
                plan.data_replication_factor = Some(rng.gen_range(0..4));
                plan.into()
            }
            3 => PhysicalPlan::QueryStorageGroupSchema,
            4 => DeleteStorageGroupPlan::new(format!("root.sg{}", rng.gen_range(0..4))).into(),
            _ => QueryRegionInfoPlan::all().into(),
        })
        .collect()
}

fn apply_all(executor: &mut PlanExecutor, plans: &[PhysicalPlan]) -> Vec<Result<ApplyResponse, String>> {
    plans.iter().map(|plan| executor.apply(plan).map_err(|err| err.to_string())).collect()
}

#[test]
fn independent_executors_converge() {
    for seed in 0..20 {
        let plans = random_plans(seed, 200);
        let (mut a, mut b) = (new_executor(), new_executor());

        let results_a = apply_all(&mut a, &plans);
        let results_b = apply_all(&mut b, &plans);

        assert_eq!(results_a, results_b, "result sequences diverged for seed {}", seed);
        assert_eq!(*a.snapshot(), *b.snapshot(), "final states diverged for seed {}", seed);
        assert_eq!(a.take_events(), b.take_events(), "event sequences diverged for seed {}", seed);
    }
}

#[test]
fn replaying_decoded_plans_matches_live_application() -> Result<()> {
    let plans = random_plans(7, 100);
    let mut live = new_executor();
    let live_results = apply_all(&mut live, &plans);

    let mut replayed = new_executor();
    let mut replay_results = vec![];
    for plan in plans.iter() {
        let decoded = plan::decode_plan(&plan::encode_plan(plan)?)?;
        replay_results.push(replayed.apply(&decoded).map_err(|err| err.to_string()));
    }

    assert_eq!(live_results, replay_results, "replayed results diverged from live results");
    assert_eq!(*live.snapshot(), *replayed.snapshot(), "replayed state diverged from live state");
    Ok(())
}

#[test]
fn register_twice_yields_same_id() -> Result<()> {
    let mut executor = new_executor();
    let plan: PhysicalPlan = RegisterDataNodePlan::new(Endpoint::new("10.0.0.1", 6667)).into();

    let first = executor.execute_mutation(&plan)?;
    let second = executor.execute_mutation(&plan)?;

    assert_eq!(first.data_node_id, Some(0));
    assert_eq!(second.data_node_id, first.data_node_id, "re-registration yielded a different id");
    assert_eq!(executor.snapshot().data_node_count(), 1);
    Ok(())
}

#[test]
fn duplicate_storage_group_returns_failure_status() -> Result<()> {
    let mut executor = new_executor();
    let plan: PhysicalPlan = SetStorageGroupPlan::new("root.sg1").into();

    let first = executor.execute_mutation(&plan)?;
    let second = executor.execute_mutation(&plan)?;

    assert_eq!(first.code, StatusCode::Success);
    assert_eq!(second.code, StatusCode::StorageGroupAlreadyExists);
    match executor.execute_query(&PhysicalPlan::QueryStorageGroupSchema)? {
        Some(DataSet::StorageGroupSchema(data)) => assert_eq!(data.schemas().len(), 1),
        other => panic!("unexpected query result {:?}", other),
    }
    Ok(())
}

#[test]
fn mutation_plans_are_rejected_by_the_query_path() -> Result<()> {
    let mut executor = new_executor();
    executor.execute_mutation(&SetStorageGroupPlan::new("root.sg1").into())?;
    let before = executor.snapshot();

    let plans: Vec<PhysicalPlan> = vec![
        RegisterDataNodePlan::new(Endpoint::new("10.0.0.1", 6667)).into(),
        SetStorageGroupPlan::new("root.sg2").into(),
        DeleteStorageGroupPlan::new("root.sg1").into(),
    ];
    for plan in plans {
        match executor.execute_query(&plan) {
            Err(AppError::UnknownPhysicalPlanType(UnknownPlanType::Mismatched(plan_type))) => {
                assert_eq!(plan_type, plan.plan_type(), "error named the wrong plan type")
            }
            other => panic!("expected mismatched plan type error, got {:?}", other),
        }
    }
    assert!(Arc::ptr_eq(&before, &executor.snapshot()), "query path mutated the table");
    Ok(())
}

#[test]
fn query_plans_are_rejected_by_the_mutation_path() -> Result<()> {
    let mut executor = new_executor();
    let before = executor.snapshot();

    let plans: Vec<PhysicalPlan> = vec![
        QueryDataNodeInfoPlan::all().into(),
        PhysicalPlan::QueryStorageGroupSchema,
        QueryRegionInfoPlan::all().into(),
    ];
    for plan in plans {
        let res = executor.execute_mutation(&plan);
        assert!(
            matches!(res, Err(AppError::UnknownPhysicalPlanType(UnknownPlanType::Mismatched(plan_type))) if plan_type == plan.plan_type()),
            "expected mismatched plan type error for {:?}, got {:?}",
            plan.plan_type(),
            res
        );
    }
    assert!(Arc::ptr_eq(&before, &executor.snapshot()), "rejected plans mutated the table");
    assert!(executor.take_events().is_empty(), "rejected plans produced events");
    Ok(())
}

#[test]
fn mismatched_plan_errors_are_deterministic() {
    let (mut a, mut b) = (new_executor(), new_executor());
    let plan: PhysicalPlan = QueryRegionInfoPlan::all().into();
    let err_a = a.execute_mutation(&plan).map_err(|err| err.to_string());
    let err_b = b.execute_mutation(&plan).map_err(|err| err.to_string());
    assert_eq!(err_a, err_b);
    assert!(format!("{:?}", err_a).contains("QueryRegionInfo"), "expected error to name the tag, got {:?}", err_a);
}

#[test]
fn empty_registry_query_is_absent_not_error() -> Result<()> {
    let executor = new_executor();
    let res = executor.execute_query(&QueryDataNodeInfoPlan::all().into())?;
    assert!(res.is_none(), "expected absent result, got {:?}", res);
    let res = executor.execute_query(&QueryRegionInfoPlan::all().into())?;
    assert!(res.is_none(), "expected absent result, got {:?}", res);
    match executor.execute_query(&PhysicalPlan::QueryStorageGroupSchema)? {
        Some(DataSet::StorageGroupSchema(data)) => assert!(data.schemas().is_empty()),
        other => panic!("unexpected query result {:?}", other),
    }
    Ok(())
}

#[test]
fn read_after_write() -> Result<()> {
    let mut executor = new_executor();
    let endpoint = Endpoint::new("10.0.0.9", 6667);
    executor.execute_mutation(&RegisterDataNodePlan::new(Endpoint::new("10.0.0.8", 6667)).into())?;
    let status = executor.execute_mutation(&RegisterDataNodePlan::new(endpoint.clone()).into())?;
    let id = status.data_node_id.expect("expected registration to reference an id");

    match executor.execute_query(&QueryDataNodeInfoPlan::by_id(id).into())? {
        Some(DataSet::DataNodesInfo(data)) => {
            assert_eq!(data.infos().len(), 1, "expected exactly one entry, got {:?}", data);
            assert_eq!(data.infos()[&id].endpoint, endpoint, "registered endpoint mismatch");
        }
        other => panic!("unexpected query result {:?}", other),
    }
    Ok(())
}

#[test]
fn apply_dispatches_by_family() -> Result<()> {
    let mut executor = new_executor();
    let res = executor.apply(&SetStorageGroupPlan::new("root.sg1").into())?;
    assert!(matches!(res, ApplyResponse::Mutation(ref status) if status.is_success()), "unexpected response {:?}", res);
    let res = executor.apply(&QueryRegionInfoPlan::by_storage_group("root.sg1").into())?;
    match res {
        ApplyResponse::Query(Some(DataSet::RegionInfo(data))) => assert_eq!(data.regions().len(), 2),
        other => panic!("unexpected response {:?}", other),
    }
    Ok(())
}

#[test]
fn failed_delete_leaves_all_structures_untouched() -> Result<()> {
    let mut executor = new_executor();
    executor.execute_mutation(&RegisterDataNodePlan::new(Endpoint::new("10.0.0.1", 6667)).into())?;
    executor.execute_mutation(&SetStorageGroupPlan::new("root.sg1").into())?;
    let before = (*executor.snapshot()).clone();

    let status = executor.execute_mutation(&DeleteStorageGroupPlan::new("root.sg2").into())?;
    assert_eq!(status.code, StatusCode::StorageGroupNotExist);
    assert_eq!(*executor.snapshot(), before, "failed delete modified the table");

    let status = executor.execute_mutation(&DeleteStorageGroupPlan::new("root.sg1").into())?;
    assert!(status.is_success());
    let after = executor.snapshot();
    assert_eq!((after.storage_group_count(), after.region_count()), (0, 0), "delete left part of the storage group behind");
    Ok(())
}

#[test]
fn events_are_taken_once() -> Result<()> {
    let mut executor = new_executor();
    executor.execute_mutation(&RegisterDataNodePlan::new(Endpoint::new("10.0.0.1", 6667)).into())?;
    executor.execute_mutation(&SetStorageGroupPlan::new("root.sg1").into())?;

    let events = executor.take_events();
    assert_eq!(events.len(), 2, "unexpected events {:?}", events);
    assert!(matches!(events[0], PartitionEvent::DataNodeRegistered(ref info) if info.data_node_id == 0));
    assert!(matches!(events[1], PartitionEvent::StorageGroupCreated(ref created) if created.regions.len() == 2));
    assert!(executor.take_events().is_empty(), "events were not drained");
    Ok(())
}

#[test]
fn resolved_storage_group_plans_apply_identically_everywhere() -> Result<()> {
    let defaults = StorageGroupDefaults {
        ttl_ms: 1_000,
        schema_replication_factor: 1,
        data_replication_factor: 3,
        time_partition_interval_ms: 60_000,
    };
    let mut log = vec![];
    for port in 6667..6670 {
        log.push(plan::encode_plan(&register(port))?);
    }
    log.push(plan::encode_plan(&SetStorageGroupPlan::new("root.sg1").resolve(&defaults).into())?);
    log.push(plan::encode_plan(&SetStorageGroupPlan::new("root.sg2").into())?);

    let (mut a, mut b) = (new_executor(), new_executor());
    for entry in log.iter() {
        a.apply(&plan::decode_plan(entry)?)?;
        b.apply(&plan::decode_plan(entry)?)?;
    }

    assert_eq!(*a.snapshot(), *b.snapshot(), "the same log rebuilt different tables");
    let schemas = a.snapshot().get_storage_group_schemas();
    assert_eq!((schemas[0].ttl_ms, schemas[0].data_replication_factor), (1_000, 3), "resolved attributes were lost in the log");
    assert_eq!(schemas[1].data_replication_factor, 1, "unset attributes must take the built-in defaults");
    let regions = a.snapshot().get_region_info(&QueryRegionInfoPlan::by_storage_group("root.sg1")).expect("expected regions");
    assert_eq!(regions[1].data_node_ids.len(), 3, "data region was not replicated per the resolved factor");
    Ok(())
}
