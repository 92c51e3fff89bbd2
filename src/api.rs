//! Context Facade
//!
//! [`ContextKeeper`] owns the active context for one process. Mutations go to
//! memory; the checkpoint scheduler (or an explicit call) mirrors the context into
//! the snapshot store. Decisions and agent messages are written durably before the
//! call returns. Persistence failures never reach mutation callers; they surface in
//! logs and in [`ContextStatus`].
//!
//! Shutdown contract: stop the scheduler, final save, flush, remove the crash
//! marker, release the store. Dropping a keeper without [`ContextKeeper::shutdown`]
//! leaves the marker behind, so the next open runs crash recovery.

use crate::checkpoint::{
    CheckpointScheduler, CheckpointTarget, DedupPersister, SaveOutcome, SaveRequest,
};
use crate::config::KeeperConfig;
use crate::context::{
    ActiveContext, AgentUpdate, ConversationEntry, CurrentTask, DecisionEntry, TaskProgress,
    TaskUpdate, WorkflowPhase,
};
use crate::emergency::EmergencyWriter;
use crate::error::ApiError;
use crate::recovery::{
    CrashMarker, RecoveryCoordinator, RecoveryReport, RecoverySource, RecoveryState,
    RecoveryTarget,
};
use crate::status::ContextStatus;
use crate::store::{NewAgentMessage, NewDecision, SledSnapshotStore, SnapshotStore, UnavailableStore};
use crate::types::{new_session_id, RowId};
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// State shared with the scheduler thread.
struct KeeperCore {
    context: RwLock<ActiveContext>,
    persister: DedupPersister,
}

impl KeeperCore {
    /// Point-in-time copy; the lock is not held while hashing or writing.
    fn snapshot(&self) -> ActiveContext {
        self.context.read().clone()
    }

    /// The copy is taken under the persister's lock, stamped while the read lock is
    /// held, so a tick can never commit a context older than the newest checkpoint.
    fn save(&self, request: SaveRequest) -> SaveOutcome {
        self.persister.save_captured(request, || {
            let context = self.context.read();
            (context.clone(), Utc::now())
        })
    }
}

impl CheckpointTarget for KeeperCore {
    fn checkpoint(&self) -> SaveOutcome {
        self.save(SaveRequest::checkpoint())
    }
}

/// What [`ContextKeeper::shutdown`] managed to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShutdownSummary {
    pub session_id: String,
    pub scheduler_was_running: bool,
    /// `persisted`, `skipped`, `fallback` or `failed`.
    pub final_save: String,
    pub marker_cleared: bool,
    /// Set when the marker could not be removed; the next start will run recovery.
    pub marker_error: Option<String>,
}

/// Crash-recoverable owner of the active context.
pub struct ContextKeeper {
    core: Arc<KeeperCore>,
    coordinator: RecoveryCoordinator,
    scheduler: CheckpointScheduler,
    marker: CrashMarker,
    config: KeeperConfig,
    previous_state: RecoveryState,
    startup_report: Option<RecoveryReport>,
    marker_armed: bool,
}

impl ContextKeeper {
    /// Open the sled store named by `config` and start the keeper.
    ///
    /// A store that cannot be opened is replaced by an always-failing stand-in so
    /// the keeper still runs; saves then go to emergency files.
    pub fn open(config: KeeperConfig) -> Result<Self, ApiError> {
        config.validate()?;
        let store: Arc<dyn SnapshotStore> = match SledSnapshotStore::open(&config.storage.store_path)
        {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!(
                    store = %config.storage.store_path.display(),
                    error = %e,
                    "Failed to open snapshot store; running degraded"
                );
                Arc::new(UnavailableStore::new(e.to_string()))
            }
        };
        Self::with_store(config, store)
    }

    /// Start the keeper over an injected store.
    ///
    /// Runs crash detection (and recovery when the marker is present) before any
    /// mutation is accepted, then arms the marker and starts the scheduler when
    /// `checkpoint.auto_start` is set.
    pub fn with_store(config: KeeperConfig, store: Arc<dyn SnapshotStore>) -> Result<Self, ApiError> {
        config.validate()?;
        if let Err(e) = store.initialize() {
            warn!(error = %e, "Snapshot store initialization failed");
        }

        let session_id = new_session_id();
        let emergency = EmergencyWriter::new(&config.storage.emergency_dir);
        let coordinator = RecoveryCoordinator::new(
            Arc::clone(&store),
            emergency.clone(),
            config.recovery.staleness(),
        );
        let marker = CrashMarker::new(&config.storage.marker_path);
        let startup = coordinator.startup(&marker, config.recovery.startup_target());

        let (context, startup_report) = match startup.recovery {
            Some(recovery) => (recovery.context, Some(recovery.report)),
            None => (ActiveContext::new(), None),
        };

        let persister = DedupPersister::new(store, emergency, session_id.clone());
        let core = Arc::new(KeeperCore {
            context: RwLock::new(context),
            persister,
        });

        let keeper = Self {
            core,
            coordinator,
            scheduler: CheckpointScheduler::new(config.checkpoint.interval()),
            marker,
            config,
            previous_state: startup.previous,
            startup_report,
            marker_armed: startup.marker_armed,
        };

        if keeper.config.checkpoint.auto_start {
            keeper.start_scheduler()?;
        }

        info!(
            session_id = %session_id,
            previous = ?keeper.previous_state,
            recovered = keeper.startup_report.as_ref().map(|r| r.recovered).unwrap_or(false),
            "Context keeper opened"
        );
        Ok(keeper)
    }

    pub fn session_id(&self) -> &str {
        self.core.persister.session_id()
    }

    pub fn config(&self) -> &KeeperConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        self.core.persister.store()
    }

    pub fn emergency(&self) -> &EmergencyWriter {
        self.core.persister.fallback()
    }

    /// Marker state found when this keeper opened.
    pub fn previous_state(&self) -> RecoveryState {
        self.previous_state
    }

    /// Report of the crash recovery run at open, if one ran.
    pub fn startup_report(&self) -> Option<&RecoveryReport> {
        self.startup_report.as_ref()
    }

    /// Consistent copy of the active context.
    pub fn context(&self) -> ActiveContext {
        self.core.snapshot()
    }

    pub fn update_task_progress(&self, task_id: &str, update: TaskUpdate) {
        self.core
            .context
            .write()
            .update_task_progress(task_id, update, Utc::now());
    }

    /// Explicit cleanup; tasks are never removed implicitly.
    pub fn remove_task(&self, task_id: &str) -> Option<TaskProgress> {
        self.core.context.write().remove_task(task_id)
    }

    pub fn update_agent_state(&self, agent_id: &str, update: AgentUpdate) {
        self.core
            .context
            .write()
            .update_agent_state(agent_id, update, Utc::now());
    }

    pub fn add_conversation_entry(&self, speaker: impl Into<String>, summary: impl Into<String>) {
        let entry = ConversationEntry {
            speaker: speaker.into(),
            summary: summary.into(),
            timestamp: Utc::now(),
        };
        self.core.context.write().add_conversation_entry(entry);
    }

    pub fn set_workflow_state(&self, phase: WorkflowPhase) {
        self.core.context.write().set_workflow_state(phase);
    }

    pub fn record_error(&self, error_type: &str, message: &str) {
        self.core
            .context
            .write()
            .record_error(error_type, message, Utc::now());
    }

    /// Bump the attempt counter of the current error. `None` if there is no error.
    pub fn record_recovery_attempt(&self) -> Option<u32> {
        self.core.context.write().record_recovery_attempt()
    }

    pub fn assign_current_task(&self, task: CurrentTask) {
        self.core.context.write().assign_current_task(task);
    }

    /// Append a decision in memory and write it durably before returning.
    ///
    /// Returns the row id, or `None` when the store rejected the write; the context
    /// is then emergency-saved so the decision survives on disk.
    pub fn log_decision(
        &self,
        decision_type: &str,
        context: serde_json::Value,
        decision: &str,
        reasoning: &str,
        outcome: Option<&str>,
    ) -> Option<RowId> {
        // Stamped under the write lock so the entry is ordered against snapshot captures.
        let entry = {
            let mut active = self.core.context.write();
            let entry = DecisionEntry {
                decision_type: decision_type.to_string(),
                context,
                decision: decision.to_string(),
                reasoning: reasoning.to_string(),
                outcome: outcome.map(str::to_string),
                timestamp: Utc::now(),
            };
            active.push_decision(entry.clone());
            entry
        };

        let row = NewDecision {
            session_id: self.session_id().to_string(),
            decision_type: entry.decision_type,
            context: entry.context,
            decision: entry.decision,
            reasoning: entry.reasoning,
            outcome: entry.outcome,
            timestamp: entry.timestamp,
        };
        let store = self.store();
        match store.append_decision(row).and_then(|id| store.flush().map(|_| id)) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, decision_type, "Decision log write failed");
                self.emergency_save(&format!("decision log write failed: {}", e));
                None
            }
        }
    }

    /// Write one inter-agent message durably. `None` when the store rejected it.
    pub fn log_agent_message(
        &self,
        from_agent: &str,
        to_agent: &str,
        message_type: &str,
        content: serde_json::Value,
        response: Option<&str>,
    ) -> Option<RowId> {
        let row = NewAgentMessage {
            session_id: self.session_id().to_string(),
            from_agent: from_agent.to_string(),
            to_agent: to_agent.to_string(),
            message_type: message_type.to_string(),
            content,
            response: response.map(str::to_string),
            timestamp: Utc::now(),
        };
        let store = self.store();
        match store.append_message(row).and_then(|id| store.flush().map(|_| id)) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, from_agent, to_agent, "Agent message write failed");
                None
            }
        }
    }

    fn emergency_save(&self, reason: &str) {
        let context = self.core.snapshot();
        if let Err(e) = self.emergency().emergency_save(&context, reason) {
            error!(error = %e, "Emergency fallback write failed");
        }
    }

    /// Save immediately as a recovery point, regardless of deduplication.
    pub fn mark_recovery_point(&self, reason: &str) -> SaveOutcome {
        self.core.save(SaveRequest::recovery_point(reason))
    }

    /// Manual checkpoint; the same path as a scheduler tick.
    pub fn save_context(&self) -> SaveOutcome {
        self.core.save(SaveRequest::checkpoint())
    }

    /// Operator-triggered recovery.
    ///
    /// The active context is replaced when a snapshot or an emergency file was
    /// restored. When nothing was found the current context is kept.
    pub fn restore_context(&self, target: RecoveryTarget) -> RecoveryReport {
        let recovery = self.coordinator.recover(target);
        match recovery.report.source {
            RecoverySource::Empty => {
                warn!(
                    reason = recovery.report.reason.as_deref().unwrap_or(""),
                    "Nothing to restore; keeping current context"
                );
            }
            _ => {
                *self.core.context.write() = recovery.context;
                info!(summary = %recovery.report.summary(), "Context restored");
            }
        }
        recovery.report
    }

    pub fn get_context_status(&self) -> ContextStatus {
        let context = self.core.snapshot();
        let mut status =
            ContextStatus::from_context(&context, Utc::now(), self.config.recovery.staleness());
        let last_checkpoint = self.core.persister.last_checkpoint();
        status.session_id = self.session_id().to_string();
        status.last_checkpoint_at = last_checkpoint.as_ref().map(|c| c.timestamp);
        status.last_checkpoint = last_checkpoint;
        status.scheduler_running = self.scheduler.is_running();
        status.checkpoint_interval_secs = self.config.checkpoint.interval_secs;
        status.marker_armed = self.marker_armed;
        status.persistence = self.core.persister.stats();
        status
    }

    /// Start periodic checkpoints. Errors if already running.
    pub fn start_scheduler(&self) -> Result<(), ApiError> {
        let target: Arc<dyn CheckpointTarget> = self.core.clone();
        self.scheduler.start(target)
    }

    pub fn stop_scheduler(&self) -> bool {
        self.scheduler.stop()
    }

    /// Clean shutdown; consumes the keeper and releases the store.
    pub fn shutdown(self) -> ShutdownSummary {
        let scheduler_was_running = self.scheduler.stop();
        let final_save = self.save_context();
        if let Err(e) = self.store().flush() {
            warn!(error = %e, "Final flush failed");
        }

        let (marker_cleared, marker_error) = match self.marker.clear() {
            Ok(()) => (true, None),
            Err(e) => {
                error!(error = %e, "Crash marker not removed; next start will run recovery");
                (false, Some(e.to_string()))
            }
        };

        let summary = ShutdownSummary {
            session_id: self.session_id().to_string(),
            scheduler_was_running,
            final_save: final_save.label().to_string(),
            marker_cleared,
            marker_error,
        };
        info!(
            session_id = %summary.session_id,
            final_save = %summary.final_save,
            marker_cleared,
            "Context keeper shut down"
        );
        summary
    }
}
