//! Shard-level routing of commands to local histories
//!
//! One `LocalHistoryActor` per `HistoryId`, created on the first command
//! addressed to it. Distinct histories are processed concurrently; commands
//! to the same history serialize on that actor's mutex.
//!
//! # Retirement
//!
//! A history whose actor finished is retired for good: its id can never be
//! reused, so later commands are answered here without an actor.
//! A failed actor is restarted in place before its lock is released, the
//! way a supervisor would restart it. The restarted actor keeps the
//! history's watermark, records and pending commits, so retries after the
//! failure are still recognized.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use strata_core::{DataTree, HistoryId, StrataResult};
use tracing::debug;

use crate::actor::LocalHistoryActor;
use crate::behavior::Behavior;
use crate::config::HistoryConfig;
use crate::message::{Command, Effect, RequestFailure, Response};

/// Routes commands of one shard to per-history actors
pub struct HistoryRegistry {
    tree: Arc<dyn DataTree>,
    config: HistoryConfig,
    histories: DashMap<HistoryId, Arc<Mutex<LocalHistoryActor>>>,
    retired: DashSet<HistoryId>,
}

impl HistoryRegistry {
    /// Create a registry over `tree`
    pub fn new(tree: Arc<dyn DataTree>, config: HistoryConfig) -> Self {
        Self {
            tree,
            config,
            histories: DashMap::new(),
            retired: DashSet::new(),
        }
    }

    /// Configuration handed to every new history
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Deliver `command` to its history
    ///
    /// # Returns
    /// The effects the command produced.
    ///
    /// # Errors
    /// Returns the error that failed the history's actor. The actor has been
    /// restarted by the time this returns.
    pub fn dispatch(&self, command: Command) -> StrataResult<Vec<Effect>> {
        let history = command.history();
        if self.retired.contains(&history) {
            return Ok(answer_retired(history, command));
        }

        let actor = Arc::clone(
            self.histories
                .entry(history)
                .or_insert_with(|| {
                    debug!(target: "strata::history", history = %history, "History created");
                    Arc::new(Mutex::new(LocalHistoryActor::new(
                        history,
                        Arc::clone(&self.tree),
                        self.config.clone(),
                    )))
                })
                .value(),
        );

        let mut guard = actor.lock();
        if guard.is_finished() {
            // Lost a race with the command that finished this actor
            drop(guard);
            self.histories.remove_if(&history, |_, current| Arc::ptr_eq(current, &actor));
            return self.dispatch(command);
        }

        let result = guard.on_command(command);
        if guard.is_failed() {
            guard.restart();
        } else if guard.is_finished() {
            self.retired.insert(history);
            self.histories.remove_if(&history, |_, current| Arc::ptr_eq(current, &actor));
        }
        result
    }

    /// Current behavior of a live history
    pub fn behavior(&self, history: &HistoryId) -> Option<Behavior> {
        let actor = self.histories.get(history).map(|entry| Arc::clone(entry.value()))?;
        let guard = actor.lock();
        guard.behavior().cloned()
    }

    /// Commit watermark of a live history
    pub fn last_committed(&self, history: &HistoryId) -> Option<u64> {
        let actor = self.histories.get(history).map(|entry| Arc::clone(entry.value()))?;
        let guard = actor.lock();
        guard.context().last_committed()
    }

    /// True if `history` has a live actor
    pub fn contains(&self, history: &HistoryId) -> bool {
        self.histories.contains_key(history)
    }

    /// True if `history` was destroyed
    pub fn is_retired(&self, history: &HistoryId) -> bool {
        self.retired.contains(history)
    }

    /// Number of live histories
    pub fn len(&self) -> usize {
        self.histories.len()
    }

    /// Check if no history is live
    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }
}

impl std::fmt::Debug for HistoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryRegistry")
            .field("live", &self.histories.len())
            .field("retired", &self.retired.len())
            .field("config", &self.config)
            .finish()
    }
}

fn answer_retired(history: HistoryId, command: Command) -> Vec<Effect> {
    match command {
        Command::Transaction(request) => vec![Effect::reply(
            request.reply_to,
            Response::failure(request.id, RequestFailure::DeadHistory { history }),
        )],
        Command::Destroy(request) => vec![Effect::reply(
            request.reply_to,
            Response::DestroyLocalHistoryResponse { history },
        )],
        Command::CommitSuccess(notification) => {
            debug!(
                target: "strata::history",
                transaction = %notification.transaction,
                "Commit notification for retired history ignored"
            );
            Vec::new()
        }
    }
}
