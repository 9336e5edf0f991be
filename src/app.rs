use std::sync::Arc;

use anyhow::{Context, Result};
use futures::stream::StreamExt;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{BroadcastStream, SignalStream};
use tokio_stream::StreamMap;

use crate::config::Config;
use crate::consensus::{ConsensusCtl, ConsensusHandle};
use crate::database::Database;
use crate::partition::PartitionEvent;
use crate::server::spawn_prom_server;

/// The capacity of the consensus controller's request channel.
const REQUESTS_CHANNEL_CAPACITY: usize = 1000;

/// The application object for when the config node is running as a server.
pub struct App {
    /// The application's runtime config.
    _config: Arc<Config>,
    /// The application's database system.
    _db: Database,
    /// A handle to the consensus controller.
    handle: ConsensusHandle,

    /// A channel used for triggering graceful shutdown.
    shutdown_tx: broadcast::Sender<()>,
    /// A channel used for triggering graceful shutdown.
    shutdown_rx: BroadcastStream<()>,
    /// A stream of partition events.
    events: BroadcastStream<PartitionEvent>,

    /// The join handle of the consensus controller.
    consensus_handle: JoinHandle<Result<()>>,
    /// The join handle of the metrics server, if enabled.
    metrics_server: Option<JoinHandle<Result<()>>>,
}

impl App {
    /// Create a new instance.
    pub async fn new(config: Arc<Config>, shutdown_tx: broadcast::Sender<()>, metrics: Option<PrometheusHandle>) -> Result<Self> {
        // Initialize this node's storage.
        let db = Database::new(config.clone()).await.context("error opening database")?;

        let (requests_tx, requests_rx) = mpsc::channel(REQUESTS_CHANNEL_CAPACITY);
        let (consensus_ctl, handle) = ConsensusCtl::new(config.clone(), db.clone(), shutdown_tx.clone(), requests_tx, requests_rx)
            .await
            .context("error spawning consensus controller")?;
        let events = BroadcastStream::new(handle.subscribe_events());
        let consensus_handle = consensus_ctl.spawn();

        let metrics_server = metrics.map(|metrics| spawn_prom_server(&config, metrics, shutdown_tx.subscribe()));

        Ok(Self {
            _config: config,
            _db: db,
            handle,
            shutdown_rx: BroadcastStream::new(shutdown_tx.subscribe()),
            shutdown_tx,
            events,
            consensus_handle,
            metrics_server,
        })
    }

    /// Get a handle for submitting plans to this node's state machine.
    pub fn handle(&self) -> ConsensusHandle {
        self.handle.clone()
    }

    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) -> Result<()> {
        let mut signals = StreamMap::new();
        signals.insert("sigterm", SignalStream::new(signal(SignalKind::terminate()).context("error building signal stream")?));
        signals.insert("sigint", SignalStream::new(signal(SignalKind::interrupt()).context("error building signal stream")?));

        loop {
            tokio::select! {
                Some((_, sig)) = signals.next() => {
                    tracing::debug!(signal = ?sig, "signal received, beginning graceful shutdown");
                    let _ = self.shutdown_tx.send(());
                    break;
                }
                Some(event_res) = self.events.next() => match event_res {
                    Ok(event) => log_partition_event(&event),
                    Err(err) => tracing::warn!(error = ?err, "partition event stream lagged"),
                },
                _ = self.shutdown_rx.next() => break,
            }
        }

        // Begin shutdown routine.
        tracing::debug!("config node is shutting down");
        if let Err(err) = self.consensus_handle.await.context("error joining consensus controller handle").and_then(|res| res) {
            tracing::error!(error = ?err, "error shutting down consensus controller");
        }
        if let Some(metrics_server) = self.metrics_server {
            if let Err(err) = metrics_server.await.context("error joining metrics server handle").and_then(|res| res) {
                tracing::error!(error = ?err, "error shutting down metrics server");
            }
        }

        tracing::debug!("config node shutdown complete");
        Ok(())
    }
}

/// Log a partition event.
fn log_partition_event(event: &PartitionEvent) {
    match event {
        PartitionEvent::Recovered(recovered) => tracing::info!(
            last_applied_index = recovered.last_applied_index,
            data_nodes = recovered.data_nodes,
            storage_groups = recovered.storage_groups,
            "partition table recovered"
        ),
        PartitionEvent::DataNodeRegistered(info) => tracing::info!(id = info.data_node_id, endpoint = %info.endpoint, "data node registered"),
        PartitionEvent::StorageGroupCreated(created) => {
            tracing::info!(name = %created.schema.name, regions = created.regions.len(), "storage group created")
        }
        PartitionEvent::StorageGroupDeleted(deleted) => {
            tracing::info!(name = %deleted.name, regions = deleted.regions.len(), "storage group deleted")
        }
    }
}
