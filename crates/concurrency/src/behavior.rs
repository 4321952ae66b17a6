//! Behavior state machine of a local history
//!
//! A history is always in exactly one behavior:
//!
//! ```text
//!            new txn                 new txn
//!   Idle ───────────▶ OpenTransaction ───────▶ QueuedTransactions
//!    ▲  ◀─────────────        ▲  ◀──────────────────   │
//!    │      sealed            │      sealed (one left)  │
//!    │ destroy                                          │
//!    ▼                                                  │
//!  Closed ──(empty)──▶ finished                         │
//! ```
//!
//! Open transactions live in the `LocalHistoryContext`; a behavior only
//! names them by sequence. `Idle` has none, `OpenTransaction` has exactly
//! one, `QueuedTransactions` has two or more, `Closed` has none and only
//! waits for pending commits to be confirmed.
//!
//! A destroy that arrives while transactions are open is answered with
//! `BusyLocalHistory` and remembered; the history closes as soon as the
//! last open transaction seals.
//!
//! # Request Screening
//!
//! A transaction request is resolved in this order:
//! 1. transaction is open: route the request to it
//! 2. purge: release the record
//! 3. transaction is at or before the watermark: `CompletedTransaction`
//! 4. transaction was purged or abandoned: `DeadTransaction`
//! 5. transaction is sealed: replay the retained response, or `PendingTransaction`
//! 6. queued behavior and an older sequence than the newest seen: `AbortedTransaction`
//! 7. closed behavior: `DeadHistory`
//! 8. otherwise: allocate the transaction and route the request to it
//!
//! Every rejection is a reply; only protocol violations are errors.

use std::collections::BTreeSet;

use strata_core::{StrataError, StrataResult, TreeOperation};
use tracing::{debug, info, warn};

use crate::history::{LocalHistoryContext, PurgeOutcome};
use crate::message::{
    Command, DestroyLocalHistoryRequest, Effect, ReplyTo, RequestFailure, RequestKind,
    Response, TransactionCommitSuccess, TransactionRequest,
};
use crate::record::Fate;
use crate::transaction::TransactionContext;

/// State of the history state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Behavior {
    /// Nothing open
    Idle,
    /// Exactly one open transaction
    OpenTransaction {
        /// Sequence of the open transaction
        transaction: u64,
    },
    /// Several open transactions awaiting ordering resolution
    QueuedTransactions {
        /// Sequences of the open transactions
        queue: BTreeSet<u64>,
    },
    /// Destroy requested; no new transactions accepted
    Closed {
        /// Destroy requesters to answer once the history is empty
        pending_notify: BTreeSet<ReplyTo>,
    },
}

/// What happened to the transaction a request was routed to
enum Step {
    Open,
    Sealed,
}

/// How a request against a non-open transaction is answered
enum Screen {
    Reject(RequestFailure),
    Replay(Response),
    Allocate,
}

impl Behavior {
    /// Behavior name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Behavior::Idle => "idle",
            Behavior::OpenTransaction { .. } => "open-transaction",
            Behavior::QueuedTransactions { .. } => "queued-transactions",
            Behavior::Closed { .. } => "closed",
        }
    }

    /// True if this is the closed behavior
    pub fn is_closed(&self) -> bool {
        matches!(self, Behavior::Closed { .. })
    }

    /// Handle one command
    ///
    /// Replies and submissions are pushed to `effects`.
    ///
    /// # Returns
    /// - Ok(Some(next)) with the behavior for the next command
    /// - Ok(None) once the history is finished
    ///
    /// # Errors
    /// Returns an error on a protocol violation; the history must not
    /// process further commands.
    pub fn handle(
        self,
        ctx: &mut LocalHistoryContext,
        command: Command,
        effects: &mut Vec<Effect>,
    ) -> StrataResult<Option<Behavior>> {
        let next = match command {
            Command::Transaction(request) => self.handle_request(ctx, request, effects)?,
            Command::Destroy(request) => self.handle_destroy(ctx, request, effects),
            Command::CommitSuccess(notification) => {
                self.handle_commit_success(ctx, notification, effects)?
            }
        };
        Ok(next.settle(ctx, effects))
    }

    fn handle_request(
        self,
        ctx: &mut LocalHistoryContext,
        request: TransactionRequest,
        effects: &mut Vec<Effect>,
    ) -> StrataResult<Behavior> {
        let seq = request.transaction().seq;

        if ctx.is_open(seq) {
            return Ok(match process(ctx, seq, request, effects)? {
                Step::Open => self,
                Step::Sealed => self.without_open(seq),
            });
        }

        if let RequestKind::Purge = request.kind {
            let response = match ctx.purge(seq)? {
                PurgeOutcome::Purged => Response::TransactionPurgeSuccess { request: request.id },
                PurgeOutcome::Pending { last_request } => Response::failure(
                    request.id,
                    RequestFailure::PendingTransaction { last_request },
                ),
            };
            effects.push(Effect::reply(request.reply_to, response));
            return Ok(self);
        }

        match self.screen(ctx, &request) {
            Screen::Reject(failure) => {
                reject(request, failure, effects);
                return Ok(self);
            }
            Screen::Replay(response) => {
                effects.push(Effect::reply(request.reply_to, response));
                return Ok(self);
            }
            Screen::Allocate => {}
        }

        if let Behavior::Closed { .. } = self {
            let history = ctx.history_id();
            reject(request, RequestFailure::DeadHistory { history }, effects);
            return Ok(self);
        }

        if request.id.sequence != 0 {
            reject(request, RequestFailure::OutOfOrderRequest { expected: 0 }, effects);
            return Ok(self);
        }

        ctx.open_transaction(seq)?;
        Ok(match process(ctx, seq, request, effects)? {
            Step::Open => self.with_open(seq),
            Step::Sealed => self,
        })
    }

    /// Resolve a request against a transaction that is not open
    fn screen(&self, ctx: &LocalHistoryContext, request: &TransactionRequest) -> Screen {
        let seq = request.transaction().seq;

        if let Some(last_committed) = ctx.last_committed().filter(|_| ctx.is_completed(seq)) {
            return Screen::Reject(RequestFailure::CompletedTransaction { last_committed });
        }

        if ctx.is_dead(seq) {
            return Screen::Reject(RequestFailure::DeadTransaction {
                transaction: request.transaction(),
            });
        }

        if let Some(record) = ctx.recorded(seq) {
            return match record.replay(request.id.sequence) {
                Some(response) => Screen::Replay(response.clone()),
                None => Screen::Reject(RequestFailure::PendingTransaction {
                    last_request: record.last_request(),
                }),
            };
        }

        if let Behavior::QueuedTransactions { .. } = self {
            if let Some(highest) = ctx.highest_seen().filter(|highest| seq < *highest) {
                return Screen::Reject(RequestFailure::AbortedTransaction { last_known: highest });
            }
        }

        Screen::Allocate
    }

    fn handle_destroy(
        self,
        ctx: &mut LocalHistoryContext,
        request: DestroyLocalHistoryRequest,
        effects: &mut Vec<Effect>,
    ) -> Behavior {
        let busy = match &self {
            Behavior::Idle => None,
            Behavior::OpenTransaction { transaction } => Some(*transaction),
            Behavior::QueuedTransactions { queue } => queue.iter().next().copied(),
            Behavior::Closed { .. } => None,
        };

        if let Some(seq) = busy {
            let transaction = ctx.transaction_id(seq);
            debug!(
                target: "strata::history",
                history = %ctx.history_id(),
                transaction = %transaction,
                "Destroy deferred, transaction open"
            );
            effects.push(Effect::reply(
                request.reply_to.clone(),
                Response::HistoryFailure {
                    history: ctx.history_id(),
                    failure: RequestFailure::BusyLocalHistory { transaction },
                },
            ));
            ctx.defer_destroy(request.reply_to);
            return self;
        }

        let mut pending_notify = match self {
            Behavior::Closed { pending_notify } => pending_notify,
            _ => BTreeSet::new(),
        };
        pending_notify.extend(ctx.take_deferred_destroy());
        pending_notify.insert(request.reply_to);
        Behavior::Closed { pending_notify }
    }

    fn handle_commit_success(
        self,
        ctx: &mut LocalHistoryContext,
        notification: TransactionCommitSuccess,
        effects: &mut Vec<Effect>,
    ) -> StrataResult<Behavior> {
        let seq = notification.transaction.seq;
        if ctx.is_open(seq) {
            return Err(StrataError::protocol_violation(format!(
                "commit notification for open transaction {}",
                notification.transaction
            )));
        }

        if let Some((reply_to, request)) = ctx.commit_success(seq) {
            effects.push(Effect::reply(
                reply_to,
                Response::TransactionCommitted {
                    request,
                    version: notification.version,
                },
            ));
        }

        Ok(self)
    }

    /// Close the history once it is due, finishing it when it is empty
    fn settle(self, ctx: &mut LocalHistoryContext, effects: &mut Vec<Effect>) -> Option<Behavior> {
        match self {
            Behavior::Closed { pending_notify } => check_shutdown(ctx, pending_notify, effects),
            Behavior::Idle if ctx.has_deferred_destroy() => {
                let pending_notify = ctx.take_deferred_destroy();
                check_shutdown(ctx, pending_notify, effects)
            }
            other => Some(other),
        }
    }

    fn with_open(self, seq: u64) -> Behavior {
        match self {
            Behavior::Idle => Behavior::OpenTransaction { transaction: seq },
            Behavior::OpenTransaction { transaction } => Behavior::QueuedTransactions {
                queue: [transaction, seq].into_iter().collect(),
            },
            Behavior::QueuedTransactions { mut queue } => {
                queue.insert(seq);
                Behavior::QueuedTransactions { queue }
            }
            closed @ Behavior::Closed { .. } => closed,
        }
    }

    fn without_open(self, seq: u64) -> Behavior {
        match self {
            Behavior::OpenTransaction { transaction } if transaction == seq => Behavior::Idle,
            Behavior::QueuedTransactions { mut queue } => {
                queue.remove(&seq);
                Behavior::from_queue(queue)
            }
            other => other,
        }
    }

    fn from_queue(queue: BTreeSet<u64>) -> Behavior {
        let mut open = queue.iter();
        match (open.next(), open.next()) {
            (None, _) => Behavior::Idle,
            (Some(&transaction), None) => Behavior::OpenTransaction { transaction },
            _ => Behavior::QueuedTransactions { queue },
        }
    }
}

fn reject(request: TransactionRequest, failure: RequestFailure, effects: &mut Vec<Effect>) {
    debug!(
        target: "strata::history",
        request = %request.id,
        failure = %failure,
        "Request rejected"
    );
    effects.push(Effect::reply(
        request.reply_to,
        Response::failure(request.id, failure),
    ));
}

/// Run `request` against open transaction `seq`
fn process(
    ctx: &mut LocalHistoryContext,
    seq: u64,
    request: TransactionRequest,
    effects: &mut Vec<Effect>,
) -> StrataResult<Step> {
    let TransactionRequest { id, reply_to, kind } = request;
    let transaction = ctx.transaction_mut(seq).ok_or_else(|| {
        StrataError::protocol_violation(format!("transaction {} is not open", id.transaction))
    })?;

    let expected = transaction.expected_request();
    if id.sequence != expected {
        let response = match transaction.replay(id.sequence) {
            Some(previous) if id.sequence < expected => previous.clone(),
            _ => Response::failure(id, RequestFailure::OutOfOrderRequest { expected }),
        };
        effects.push(Effect::reply(reply_to, response));
        return Ok(Step::Open);
    }

    let (modifications, finish) = match kind {
        RequestKind::Read { path } => {
            let data = transaction.read(&path)?;
            let response = Response::ReadTransactionSuccess { request: id, data };
            transaction.accept(id.sequence, Some(response.clone()));
            effects.push(Effect::reply(reply_to, response));
            return Ok(Step::Open);
        }
        RequestKind::Exists { path } => {
            let exists = transaction.exists(&path)?;
            let response = Response::ExistsTransactionSuccess { request: id, exists };
            transaction.accept(id.sequence, Some(response.clone()));
            effects.push(Effect::reply(reply_to, response));
            return Ok(Step::Open);
        }
        RequestKind::Purge => {
            return Err(StrataError::protocol_violation(format!(
                "purge of open transaction {}",
                id.transaction
            )))
        }
        RequestKind::Modify {
            modifications,
            finish,
        } => (modifications, finish),
    };

    if let Err(failure) = apply_all(transaction, &modifications) {
        let response = Response::failure(id, failure);
        transaction.accept(id.sequence, Some(response.clone()));
        ctx.seal(seq, Fate::Aborted, None)?;
        effects.push(Effect::reply(reply_to, response));
        return Ok(Step::Sealed);
    }

    match finish.fate() {
        None => {
            let response = Response::ModifyTransactionSuccess { request: id };
            transaction.accept(id.sequence, Some(response.clone()));
            effects.push(Effect::reply(reply_to, response));
            Ok(Step::Open)
        }
        Some(Fate::Aborted) => {
            let response = Response::ModifyTransactionSuccess { request: id };
            transaction.accept(id.sequence, Some(response.clone()));
            ctx.seal(seq, Fate::Aborted, None)?;
            effects.push(Effect::reply(reply_to, response));
            Ok(Step::Sealed)
        }
        Some(fate) => {
            transaction.accept(id.sequence, None);
            if let Some(sealed) = ctx.seal(seq, fate, Some((reply_to, id)))? {
                effects.push(Effect::Submit(sealed));
            }
            Ok(Step::Sealed)
        }
    }
}

/// Apply `modifications` in order, stopping at the first rejection
fn apply_all(
    transaction: &mut TransactionContext,
    modifications: &[TreeOperation],
) -> Result<(), RequestFailure> {
    for operation in modifications {
        if let Err(e) = transaction.apply_operation(operation) {
            warn!(
                target: "strata::history",
                transaction = %transaction.id(),
                operation = operation.name(),
                path = %operation.path(),
                error = %e,
                "Modification failed, aborting transaction"
            );
            return Err(RequestFailure::ModificationFailed {
                reason: e.to_string(),
            });
        }
    }
    Ok(())
}

/// Finish the history once it is empty, answering every destroy requester
fn check_shutdown(
    ctx: &LocalHistoryContext,
    pending_notify: BTreeSet<ReplyTo>,
    effects: &mut Vec<Effect>,
) -> Option<Behavior> {
    if !ctx.is_empty() {
        debug!(
            target: "strata::history",
            history = %ctx.history_id(),
            waiting = pending_notify.len(),
            "History closed, waiting for pending commits"
        );
        return Some(Behavior::Closed { pending_notify });
    }

    info!(
        target: "strata::history",
        history = %ctx.history_id(),
        notified = pending_notify.len(),
        "History destroyed"
    );
    for reply_to in pending_notify {
        effects.push(Effect::reply(
            reply_to,
            Response::DestroyLocalHistoryResponse {
                history: ctx.history_id(),
            },
        ));
    }
    None
}
