//! LocalHistoryActor: single-threaded command pump of one history
//!
//! The actor owns the history's `LocalHistoryContext` and exactly one live
//! `Behavior`. Each command is handled to completion before the next; the
//! actor itself carries no business logic beyond swapping behaviors and
//! noticing termination.
//!
//! # Termination
//!
//! - finished: the behavior returned no successor (history destroyed)
//! - failed: handling returned an error (protocol violation)
//!
//! Either way the actor rejects every further command with
//! `StrataError::HistoryFinished`. A finished actor is dropped by its
//! driver; a failed one may be brought back with `restart()`.
//!
//! # Restart
//!
//! Failure loses only what was never promised to a client. The watermark,
//! sealed records, pending commits and the chain tip stay in the context,
//! so a retried request is answered exactly as before the failure. Open
//! transactions are abandoned and answered `DeadTransaction` from then on.
//! A history that was closing stays closed.

use std::collections::BTreeSet;
use std::sync::Arc;

use strata_core::{DataTree, HistoryId, StrataError, StrataResult};
use tracing::{debug, error, info};

use crate::behavior::Behavior;
use crate::config::HistoryConfig;
use crate::history::LocalHistoryContext;
use crate::message::{Command, Effect, ReplyTo};

/// Dispatch loop of one local history
#[derive(Debug)]
pub struct LocalHistoryActor {
    context: LocalHistoryContext,
    behavior: Option<Behavior>,
    failed: bool,
    closed_waiters: Option<BTreeSet<ReplyTo>>,
}

impl LocalHistoryActor {
    /// Create the actor of a fresh history, starting idle
    pub fn new(history_id: HistoryId, tree: Arc<dyn DataTree>, config: HistoryConfig) -> Self {
        Self {
            context: LocalHistoryContext::new(history_id, tree, config),
            behavior: Some(Behavior::Idle),
            failed: false,
            closed_waiters: None,
        }
    }

    /// History identifier
    pub fn history_id(&self) -> HistoryId {
        self.context.history_id()
    }

    /// Shared history state
    pub fn context(&self) -> &LocalHistoryContext {
        &self.context
    }

    /// Current behavior, None once finished or failed
    pub fn behavior(&self) -> Option<&Behavior> {
        self.behavior.as_ref()
    }

    /// True once the history was destroyed or the actor failed
    pub fn is_finished(&self) -> bool {
        self.behavior.is_none()
    }

    /// True if the actor stopped on an error
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Handle one command
    ///
    /// # Returns
    /// The replies and submissions the command produced, in order.
    ///
    /// # Errors
    /// - `HistoryFinished` if the actor already stopped
    /// - a protocol violation for a command addressed elsewhere or not
    ///   allowed in the current state; the actor is failed afterwards
    pub fn on_command(&mut self, command: Command) -> StrataResult<Vec<Effect>> {
        let history = self.context.history_id();
        let behavior = self
            .behavior
            .take()
            .ok_or(StrataError::HistoryFinished { history })?;
        let closed_waiters = match &behavior {
            Behavior::Closed { pending_notify } => Some(pending_notify.clone()),
            _ => None,
        };

        if command.history() != history {
            let err = StrataError::protocol_violation(format!(
                "{} command for history {} delivered to history {}",
                command.name(),
                command.history(),
                history
            ));
            return Err(self.fail(err, closed_waiters));
        }

        let previous = behavior.name();
        let command_name = command.name();
        let mut effects = Vec::new();
        match behavior.handle(&mut self.context, command, &mut effects) {
            Ok(Some(next)) => {
                if next.name() != previous {
                    debug!(
                        target: "strata::history",
                        history = %history,
                        command = command_name,
                        from = previous,
                        to = next.name(),
                        "Behavior transition"
                    );
                }
                self.behavior = Some(next);
            }
            Ok(None) => {
                info!(target: "strata::history", history = %history, "History finished");
            }
            Err(err) => return Err(self.fail(err, closed_waiters)),
        }
        Ok(effects)
    }

    /// Bring a failed actor back over the state it kept
    ///
    /// Does nothing unless the actor failed.
    pub fn restart(&mut self) {
        if !self.failed {
            return;
        }
        let abandoned = self.context.abandon_open();
        let deferred = self.context.take_deferred_destroy();
        let behavior = match self.closed_waiters.take() {
            Some(mut pending_notify) => {
                pending_notify.extend(deferred);
                Behavior::Closed { pending_notify }
            }
            None if !deferred.is_empty() => Behavior::Closed {
                pending_notify: deferred,
            },
            None => Behavior::Idle,
        };
        info!(
            target: "strata::history",
            history = %self.context.history_id(),
            abandoned = abandoned.len(),
            behavior = behavior.name(),
            "History actor restarted"
        );
        self.behavior = Some(behavior);
        self.failed = false;
    }

    fn fail(&mut self, err: StrataError, closed_waiters: Option<BTreeSet<ReplyTo>>) -> StrataError {
        error!(
            target: "strata::history",
            history = %self.context.history_id(),
            error = %err,
            "History actor failed"
        );
        self.behavior = None;
        self.failed = true;
        self.closed_waiters = closed_waiters;
        err
    }
}
