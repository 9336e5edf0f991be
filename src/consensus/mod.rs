//! Consensus controller.
//!
//! A single-replica consensus engine for the cluster metadata state machine. Every plan submitted
//! to the controller is appended to a durable plan log before it is applied, and the whole log is
//! replayed through the same apply path when the controller starts, so the partition table is
//! always a pure function of the log.
//!
//! ## Ordering
//! Submissions are processed strictly one at a time in channel order; the index of an entry in
//! the log is its position in the total order. Log keys are big-endian `u64`s so that sled's
//! lexicographical ordering matches index ordering.
//!
//! ## Self-describing entries
//! Configured storage group defaults are resolved into plans by the `ConsensusHandle` before they
//! are committed. A log entry therefore rebuilds the same table on every node regardless of the
//! configuration the node was started with.
//!
//! ## Failure
//! Plans which fail to decode or apply are still committed to the log and fail identically on
//! replay. Failures of the log itself are fatal: the controller stops and triggers a system
//! shutdown.

#[cfg(test)]
mod mod_test;

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use futures::stream::StreamExt;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{BroadcastStream, ReceiverStream};

use crate::config::Config;
use crate::database::{Database, Tree};
use crate::error::{AppError, AppResult, ShutdownError, ShutdownResult, ERR_DB_FLUSH, ERR_ITER_FAILURE};
use crate::executor::{ApplyResponse, PlanExecutor, PlanReader};
use crate::partition::{PartitionEvent, RecoveredEvent};
use crate::plan::{self, PhysicalPlan, PlanFamily, StorageGroupDefaults};
use crate::utils;

const METRIC_LAST_APPLIED_INDEX: &str = "hadron_confignode_last_applied_index";
/// The capacity of the partition event broadcast channel.
const EVENTS_CHANNEL_CAPACITY: usize = 1000;
const ERR_CTL_CLOSED: &str = "consensus controller is no longer running";

/// A controller encapsulating the plan log and the state machine it drives.
pub struct ConsensusCtl {
    /// The application's database system.
    _db: Database,
    /// The plan log's database tree.
    tree: Tree,
    /// The state machine's apply function.
    executor: PlanExecutor,

    /// A channel of inbound submissions.
    requests_rx: ReceiverStream<ConsensusMsg>,
    /// A channel of partition events produced by applied plans.
    events_tx: broadcast::Sender<PartitionEvent>,
    /// A channel used for triggering graceful shutdown.
    shutdown_tx: broadcast::Sender<()>,
    /// A channel used for triggering graceful shutdown.
    shutdown_rx: BroadcastStream<()>,

    /// The index of the last entry applied from the plan log, `0` when the log is empty.
    last_applied_index: u64,
    /// The summary of the recovery performed on construction, published once the controller runs.
    recovered: Option<RecoveredEvent>,
}

impl ConsensusCtl {
    /// Create a new instance, recovering the partition table from the plan log.
    pub async fn new(
        config: Arc<Config>, db: Database, shutdown_tx: broadcast::Sender<()>, requests_tx: mpsc::Sender<ConsensusMsg>, requests_rx: mpsc::Receiver<ConsensusMsg>,
    ) -> Result<(Self, ConsensusHandle)> {
        let tree = db.get_plan_log_tree().await?;
        let executor = PlanExecutor::new();
        let (executor, last_applied_index) = recover_plan_log(tree.clone(), executor).await.context("error recovering plan log")?;
        metrics::register_gauge!(METRIC_LAST_APPLIED_INDEX, metrics::Unit::Count, "the index of the last plan applied from the plan log");
        metrics::gauge!(METRIC_LAST_APPLIED_INDEX, last_applied_index as f64);

        let snapshot = executor.snapshot();
        let recovered = RecoveredEvent {
            last_applied_index,
            data_nodes: snapshot.data_node_count(),
            storage_groups: snapshot.storage_group_count(),
        };
        tracing::info!(
            last_applied_index,
            data_nodes = recovered.data_nodes,
            storage_groups = recovered.storage_groups,
            "recovered partition table from plan log"
        );

        let (events_tx, _) = broadcast::channel(EVENTS_CHANNEL_CAPACITY);
        let handle = ConsensusHandle {
            requests_tx,
            reader: executor.reader(),
            events_tx: events_tx.clone(),
            defaults: StorageGroupDefaults::from(config.as_ref()),
        };
        Ok((
            Self {
                _db: db,
                tree,
                executor,
                requests_rx: ReceiverStream::new(requests_rx),
                events_tx,
                shutdown_rx: BroadcastStream::new(shutdown_tx.subscribe()),
                shutdown_tx,
                last_applied_index,
                recovered: Some(recovered),
            },
            handle,
        ))
    }

    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) -> Result<()> {
        tracing::debug!("consensus controller has started");
        if let Some(recovered) = self.recovered.take() {
            let _res = self.events_tx.send(PartitionEvent::Recovered(recovered));
        }

        let res = loop {
            tokio::select! {
                msg_opt = self.requests_rx.next() => match msg_opt {
                    Some(msg) => {
                        if let Err(err) = self.handle_ctl_msg(msg).await {
                            tracing::error!(error = ?err, "fatal error in consensus controller, shutting down");
                            let _res = self.shutdown_tx.send(());
                            break Err(anyhow::Error::from(err));
                        }
                    }
                    None => break Ok(()),
                },
                _ = self.shutdown_rx.next() => break Ok(()),
            }
        };

        tracing::debug!(last_applied_index = self.last_applied_index, "consensus controller has shutdown");
        res
    }

    /// Handle a consensus controller message.
    #[tracing::instrument(level = "trace", skip(self, msg))]
    async fn handle_ctl_msg(&mut self, msg: ConsensusMsg) -> ShutdownResult<()> {
        match msg {
            ConsensusMsg::Submit { bytes, tx } => self.handle_submit(bytes, tx).await,
        }
    }

    /// Commit the given encoded plan to the log and apply it.
    #[tracing::instrument(level = "trace", skip(self, bytes, tx))]
    async fn handle_submit(&mut self, bytes: Vec<u8>, tx: oneshot::Sender<AppResult<ApplyResponse>>) -> ShutdownResult<()> {
        let decoded = plan::decode_plan(&bytes);
        if let Err(err) = &decoded {
            tracing::warn!(error = %err, "committing plan which could not be decoded");
        }

        let appended = match self.last_applied_index.checked_add(1) {
            Some(index) => append_plan(self.tree.clone(), index, bytes).await.map(|_| index),
            None => Err(ShutdownError(anyhow!("plan log index space is exhausted"))),
        };
        let index = match appended {
            Ok(index) => index,
            Err(err) => {
                let _res = tx.send(Err(AppError::Ise(anyhow!("error committing plan to log"))));
                return Err(err);
            }
        };
        self.last_applied_index = index;
        metrics::gauge!(METRIC_LAST_APPLIED_INDEX, index as f64);

        let res = decoded.and_then(|plan| self.executor.apply(&plan));
        for event in self.executor.take_events() {
            let _res = self.events_tx.send(event);
        }
        let _res = tx.send(res);
        Ok(())
    }
}

/// Append an encoded plan to the log under the given index, flushing before returning.
async fn append_plan(tree: Tree, index: u64, bytes: Vec<u8>) -> ShutdownResult<()> {
    Database::spawn_blocking(move || -> Result<()> {
        tree.insert(&utils::encode_u64(index), bytes).context("error writing plan to log")?;
        tree.flush().context(ERR_DB_FLUSH)?;
        Ok(())
    })
    .await
    .and_then(|res| res.map_err(ShutdownError::from))
}

/// Replay the plan log into the given executor, returning it along with the last applied index.
///
/// Entries are applied in index order exactly as they were when first committed. Events produced
/// during replay are discarded.
async fn recover_plan_log(tree: Tree, executor: PlanExecutor) -> Result<(PlanExecutor, u64)> {
    let val = Database::spawn_blocking(move || -> Result<(PlanExecutor, u64)> {
        let mut executor = executor;
        let mut last_applied_index = 0;
        for entry_res in tree.iter() {
            let (key, val) = entry_res.context(ERR_ITER_FAILURE)?;
            let index = utils::decode_u64(&key).context("error decoding plan log index, data corrupted")?;
            if let Err(err) = plan::decode_plan(&val).and_then(|plan| executor.apply(&plan)) {
                tracing::debug!(index, error = %err, "replayed plan failed as when first committed");
            }
            last_applied_index = index;
        }
        let _events = executor.take_events();
        Ok((executor, last_applied_index))
    })
    .await??;
    Ok(val)
}

/// A message bound for a consensus controller.
pub enum ConsensusMsg {
    /// A request to commit and apply an encoded plan.
    Submit {
        /// The encoded plan.
        bytes: Vec<u8>,
        /// The response channel.
        tx: oneshot::Sender<AppResult<ApplyResponse>>,
    },
}

/// A handle for submitting plans to a consensus controller.
#[derive(Clone)]
pub struct ConsensusHandle {
    requests_tx: mpsc::Sender<ConsensusMsg>,
    reader: PlanReader,
    events_tx: broadcast::Sender<PartitionEvent>,
    /// The configured storage group defaults, resolved into plans before they are committed.
    defaults: StorageGroupDefaults,
}

impl ConsensusHandle {
    /// Submit a plan.
    ///
    /// Query plans are executed against the latest snapshot of the partition table without
    /// touching the log. Mutation plans have the configured defaults resolved into them, then
    /// are committed to the log and applied in order.
    pub async fn submit(&self, plan: PhysicalPlan) -> AppResult<ApplyResponse> {
        match plan.family() {
            PlanFamily::Query => self.reader.execute_query(&plan).map(ApplyResponse::Query),
            PlanFamily::Mutation => {
                let plan = match plan {
                    PhysicalPlan::SetStorageGroup(inner) => PhysicalPlan::SetStorageGroup(inner.resolve(&self.defaults)),
                    other => other,
                };
                let bytes = plan::encode_plan(&plan)?;
                self.submit_encoded(bytes).await
            }
        }
    }

    /// Submit an encoded plan, which is committed to the log regardless of its content.
    ///
    /// The bytes are committed as given. Unset storage group attributes in them take the
    /// built-in defaults rather than the configured ones.
    pub async fn submit_encoded(&self, bytes: Vec<u8>) -> AppResult<ApplyResponse> {
        let (tx, rx) = oneshot::channel();
        self.requests_tx
            .send(ConsensusMsg::Submit { bytes, tx })
            .await
            .map_err(|_| AppError::Ise(anyhow!(ERR_CTL_CLOSED)))?;
        rx.await.map_err(|_| AppError::Ise(anyhow!(ERR_CTL_CLOSED)))?
    }

    /// Get a handle for executing queries against the partition table.
    pub fn reader(&self) -> PlanReader {
        self.reader.clone()
    }

    /// Subscribe to the partition events produced by applied plans.
    pub fn subscribe_events(&self) -> broadcast::Receiver<PartitionEvent> {
        self.events_tx.subscribe()
    }
}
