use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};

use super::*;
use crate::error::UnknownPlanType;
use crate::executor::DataSet;
use crate::models::{proto, Endpoint, StatusCode};
use crate::plan::{DeleteStorageGroupPlan, QueryDataNodeInfoPlan, QueryRegionInfoPlan, RegisterDataNodePlan, SetStorageGroupPlan};

async fn new_ctl(config: Arc<Config>, db: Database, shutdown_tx: broadcast::Sender<()>) -> Result<(ConsensusCtl, ConsensusHandle)> {
    let (requests_tx, requests_rx) = mpsc::channel(100);
    ConsensusCtl::new(config, db, shutdown_tx, requests_tx, requests_rx).await
}

fn register(port: u16) -> PhysicalPlan {
    RegisterDataNodePlan::new(Endpoint::new("10.0.0.1", port)).into()
}

#[tokio::test]
async fn replaying_the_plan_log_rebuilds_the_table() -> Result<()> {
    let (config, _tmpdir) = Config::new_test()?;
    let db = Database::new(config.clone()).await?;
    let (shutdown_tx, _) = broadcast::channel(1);

    let (ctl, handle) = new_ctl(config.clone(), db.clone(), shutdown_tx.clone()).await?;
    let ctl_handle = ctl.spawn();
    for port in 6667..6670 {
        handle.submit(register(port)).await?;
    }
    handle.submit(SetStorageGroupPlan::new("root.sg1").into()).await?;
    let res = handle.submit(SetStorageGroupPlan::new("root.sg1").into()).await?;
    assert!(
        matches!(res, ApplyResponse::Mutation(ref status) if status.code == StatusCode::StorageGroupAlreadyExists),
        "unexpected response to duplicate storage group {:?}",
        res
    );
    handle.submit(DeleteStorageGroupPlan::new("root.sg2").into()).await?;
    let expected = handle.reader().snapshot();
    let _res = shutdown_tx.send(());
    ctl_handle.await??;

    let (ctl, handle) = new_ctl(config, db, shutdown_tx).await?;
    assert_eq!(ctl.last_applied_index, 6, "expected every submitted mutation to be in the log");
    assert_eq!(*handle.reader().snapshot(), *expected, "recovered table differs from the table before restart");

    let _ctl_handle = ctl.spawn();
    let res = handle.submit(register(6670)).await?;
    match res {
        ApplyResponse::Mutation(status) => assert_eq!(status.data_node_id, Some(3), "ID assignment did not continue after recovery"),
        other => panic!("unexpected response {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn unknown_plan_tags_are_committed_and_fail_on_replay() -> Result<()> {
    let (config, _tmpdir) = Config::new_test()?;
    let db = Database::new(config.clone()).await?;
    let tree = db.get_plan_log_tree().await?;
    let (shutdown_tx, _) = broadcast::channel(1);

    let (ctl, handle) = new_ctl(config.clone(), db.clone(), shutdown_tx.clone()).await?;
    let ctl_handle = ctl.spawn();
    let bytes = utils::encode_model(&proto::PhysicalPlanEnvelope { r#type: 99, payload: vec![] })?;
    let res = handle.submit_encoded(bytes).await;
    assert!(
        matches!(res, Err(AppError::UnknownPhysicalPlanType(UnknownPlanType::Raw(99)))),
        "expected unknown plan type error, got {:?}",
        res
    );
    assert_eq!(tree.len(), 1, "expected unknown plan to be committed to the log");
    handle.submit(register(6667)).await?;
    let _res = shutdown_tx.send(());
    ctl_handle.await??;

    let (ctl, handle) = new_ctl(config, db, shutdown_tx).await?;
    assert_eq!(ctl.last_applied_index, 2);
    assert_eq!(handle.reader().snapshot().data_node_count(), 1);
    Ok(())
}

#[tokio::test]
async fn recovery_and_mutations_are_published_as_events() -> Result<()> {
    let (config, _tmpdir) = Config::new_test()?;
    let db = Database::new(config.clone()).await?;
    let (shutdown_tx, _) = broadcast::channel(1);

    let (ctl, handle) = new_ctl(config, db, shutdown_tx).await?;
    let mut events = handle.subscribe_events();
    let _ctl_handle = ctl.spawn();

    match events.recv().await? {
        PartitionEvent::Recovered(recovered) => assert_eq!(
            recovered,
            RecoveredEvent {
                last_applied_index: 0,
                data_nodes: 0,
                storage_groups: 0
            }
        ),
        other => panic!("expected recovery event first, got {:?}", other),
    }

    handle.submit(register(6667)).await?;
    handle.submit(register(6667)).await?;
    handle.submit(SetStorageGroupPlan::new("root.sg1").into()).await?;
    match events.recv().await? {
        PartitionEvent::DataNodeRegistered(info) => assert_eq!(info.data_node_id, 0),
        other => panic!("expected data node registration event, got {:?}", other),
    }
    match events.recv().await? {
        PartitionEvent::StorageGroupCreated(created) => {
            assert_eq!(created.schema.name, "root.sg1");
            assert_eq!(created.regions.len(), 2);
        }
        other => panic!("expected storage group creation event, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn handle_queries_bypass_the_log() -> Result<()> {
    let (config, _tmpdir) = Config::new_test()?;
    let db = Database::new(config.clone()).await?;
    let tree = db.get_plan_log_tree().await?;
    let (shutdown_tx, _) = broadcast::channel(1);

    let (ctl, handle) = new_ctl(config, db, shutdown_tx).await?;
    let _ctl_handle = ctl.spawn();
    handle.submit(register(6667)).await?;

    let query: PhysicalPlan = QueryDataNodeInfoPlan::by_id(0).into();
    let res = handle.submit(query.clone()).await?;
    assert!(matches!(res, ApplyResponse::Query(Some(DataSet::DataNodesInfo(_)))), "unexpected response {:?}", res);
    assert_eq!(tree.len(), 1, "expected query through the handle to bypass the log");

    let logged = handle.submit_encoded(plan::encode_plan(&query)?).await?;
    assert_eq!(logged, res, "expected logged query to observe the same table");
    assert_eq!(tree.len(), 2, "expected encoded query to be committed to the log");
    Ok(())
}

#[tokio::test]
async fn submissions_fail_once_the_controller_stops() -> Result<()> {
    let (config, _tmpdir) = Config::new_test()?;
    let db = Database::new(config.clone()).await?;
    let (shutdown_tx, _) = broadcast::channel(1);

    let (ctl, handle) = new_ctl(config, db, shutdown_tx.clone()).await?;
    let ctl_handle = ctl.spawn();
    let _res = shutdown_tx.send(());
    ctl_handle.await??;

    let res = handle.submit(register(6667)).await;
    assert!(matches!(res, Err(AppError::Ise(_))), "expected internal error, got {:?}", res);
    let res = handle.submit(PhysicalPlan::QueryStorageGroupSchema).await;
    assert!(res.is_ok(), "expected queries to keep working from the last snapshot, got {:?}", res);
    Ok(())
}

#[tokio::test]
async fn replay_ignores_configured_defaults_of_the_restarted_node() -> Result<()> {
    let (config, _tmpdir) = Config::new_test()?;
    let mut first_config = (*config).clone();
    first_config.default_ttl_ms = 1_000;
    first_config.default_data_replication_factor = 3;
    let db = Database::new(config.clone()).await?;
    let (shutdown_tx, _) = broadcast::channel(1);

    let (ctl, handle) = new_ctl(Arc::new(first_config), db.clone(), shutdown_tx.clone()).await?;
    let ctl_handle = ctl.spawn();
    for port in 6667..6670 {
        handle.submit(register(port)).await?;
    }
    handle.submit(SetStorageGroupPlan::new("root.sg1").into()).await?;
    let expected = handle.reader().snapshot();
    let _res = shutdown_tx.send(());
    ctl_handle.await??;

    let mut second_config = (*config).clone();
    second_config.default_ttl_ms = 5;
    second_config.default_schema_replication_factor = 2;
    let (_ctl, handle) = new_ctl(Arc::new(second_config), db, shutdown_tx).await?;
    let recovered = handle.reader().snapshot();
    assert_eq!(*recovered, *expected, "restart with different defaults rebuilt a different table");

    let schemas = recovered.get_storage_group_schemas();
    assert_eq!((schemas[0].ttl_ms, schemas[0].schema_replication_factor, schemas[0].data_replication_factor), (1_000, 1, 3));
    let regions = recovered
        .get_region_info(&QueryRegionInfoPlan::by_storage_group("root.sg1"))
        .expect("expected regions to be recovered");
    assert_eq!(regions[1].data_node_ids.len(), 3, "unexpected data region replica set {:?}", regions[1]);
    Ok(())
}

#[tokio::test]
async fn fatal_log_errors_stop_the_controller() -> Result<()> {
    let (config, _tmpdir) = Config::new_test()?;
    let db = Database::new(config.clone()).await?;
    let tree = db.get_plan_log_tree().await?;
    let (shutdown_tx, _) = broadcast::channel(1);
    let mut shutdown_rx = shutdown_tx.subscribe();

    let (mut ctl, handle) = new_ctl(config, db, shutdown_tx).await?;
    ctl.last_applied_index = u64::MAX;
    let ctl_handle = ctl.spawn();

    let res = handle.submit(register(6667)).await;
    assert!(matches!(res, Err(AppError::Ise(_))), "expected internal error, got {:?}", res);
    let res = ctl_handle.await?;
    assert!(res.is_err(), "expected controller to stop with an error");
    shutdown_rx.recv().await?;

    let res = handle.submit(register(6668)).await;
    assert!(matches!(res, Err(AppError::Ise(_))), "expected stopped controller to reject submissions, got {:?}", res);
    assert_eq!(tree.len(), 0, "expected nothing to be committed");
    assert_eq!(handle.reader().snapshot().data_node_count(), 0, "expected nothing to be applied");
    Ok(())
}
