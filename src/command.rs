//! Command layer
//!
//! Lifecycle verbs expressed as graph traversals over a compiled
//! descriptor. Independent applications fan out concurrently; anything
//! connected by a dependency edge is serialized in the contractual
//! direction. The descriptor itself is never mutated here: per-application
//! results land in the outcome owned by the command.

use crate::channel::{AppState, SharedChannel};
use crate::descriptor::model::{Application, Descriptor};
use crate::error::{Result, StaveError};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Lifecycle verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Create,
    Up,
    Status,
    Stop,
    Restart,
    Scale,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Create => "create",
            Verb::Up => "up",
            Verb::Status => "status",
            Verb::Stop => "stop",
            Verb::Restart => "restart",
            Verb::Scale => "scale",
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Target of a scale command.
#[derive(Debug, Clone)]
pub struct ScaleOptions {
    pub application: String,
    pub instances: i32,
}

/// Per-invocation options.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Required by the scale verb, ignored otherwise.
    pub scale: Option<ScaleOptions>,
    /// Cancellation stops new dispatches; in-flight calls finish on their
    /// own timeouts.
    pub cancel: CancellationToken,
}

/// One status-map entry: the channel's reported state plus when the
/// coordinator folded it in.
#[derive(Debug, Clone)]
pub struct StatusEntry {
    pub state: String,
    pub meets_criteria: bool,
    pub observed_at: DateTime<Utc>,
}

/// Aggregated result of one command run.
#[derive(Debug, Default)]
pub struct CommandOutcome {
    /// Status verb only: observed state per application.
    pub statuses: BTreeMap<String, StatusEntry>,
    /// Per-application failures in completion order.
    pub failures: Vec<(String, StaveError)>,
    /// Channel calls that succeeded.
    pub completed: usize,
    /// Channel calls the verb planned.
    pub total: usize,
    /// True when the caller cancelled before every call was issued.
    pub cancelled: bool,
}

impl CommandOutcome {
    pub fn succeeded(&self) -> bool {
        !self.cancelled && self.failures.is_empty()
    }

    /// Fold the outcome into a single error for exit-code reporting.
    /// Cancellation wins over individual failures.
    pub fn into_error(self) -> Option<StaveError> {
        if self.cancelled {
            return Some(StaveError::Cancelled {
                completed: self.completed,
                total: self.total,
            });
        }
        self.failures.into_iter().next().map(|(_, e)| e)
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Create,
    Stop,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Stop => "stop",
        }
    }

    async fn invoke(self, channel: &SharedChannel, app: &Application) -> Result<()> {
        match self {
            Operation::Create => channel.create(app).await,
            Operation::Stop => channel.stop(app).await,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Forward,
    Reverse,
}

/// Run one verb against a compiled descriptor.
pub async fn execute(
    channel: &SharedChannel,
    descriptor: &Descriptor,
    verb: Verb,
    options: &ExecuteOptions,
) -> Result<CommandOutcome> {
    tracing::info!(verb = %verb, channel = channel.name(), "executing command");
    match verb {
        Verb::Create | Verb::Up => {
            run_graph(
                channel,
                descriptor,
                Operation::Create,
                Direction::Forward,
                true,
                &options.cancel,
            )
            .await
        }
        Verb::Stop => {
            run_graph(
                channel,
                descriptor,
                Operation::Stop,
                Direction::Reverse,
                false,
                &options.cancel,
            )
            .await
        }
        Verb::Restart => {
            // make-it-running semantics: a failed stop does not abort the
            // following up phase
            let stopped = run_graph(
                channel,
                descriptor,
                Operation::Stop,
                Direction::Reverse,
                false,
                &options.cancel,
            )
            .await?;
            if stopped.cancelled {
                return Ok(stopped);
            }
            for (name, err) in &stopped.failures {
                tracing::warn!(application = %name, error = %err, "stop failed during restart, continuing");
            }
            run_graph(
                channel,
                descriptor,
                Operation::Create,
                Direction::Forward,
                true,
                &options.cancel,
            )
            .await
        }
        Verb::Status => status_all(channel, descriptor, &options.cancel).await,
        Verb::Scale => scale_one(channel, descriptor, options).await,
    }
}

/// Wave scheduler: dispatch every unblocked application, then unblock its
/// neighbors as calls complete. `fail_fast` stops dispatching after the
/// first failure; in-flight calls always drain.
async fn run_graph(
    channel: &SharedChannel,
    descriptor: &Descriptor,
    operation: Operation,
    direction: Direction,
    fail_fast: bool,
    cancel: &CancellationToken,
) -> Result<CommandOutcome> {
    let graph = &descriptor.graph;
    if graph.is_empty() && !descriptor.applications.is_empty() {
        return Err(StaveError::Internal(
            "descriptor graph not built; compile the descriptor first".to_string(),
        ));
    }

    let mut outcome = CommandOutcome {
        total: descriptor.applications.len(),
        ..CommandOutcome::default()
    };

    let mut blockers: HashMap<String, usize> = HashMap::new();
    for app in &descriptor.applications {
        let count = match direction {
            Direction::Forward => graph.dependencies_of(&app.name).len(),
            Direction::Reverse => graph.dependents_of(&app.name).len(),
        };
        blockers.insert(app.name.clone(), count);
    }

    let mut ready: VecDeque<String> = descriptor
        .applications
        .iter()
        .filter(|app| blockers.get(&app.name) == Some(&0))
        .map(|app| app.name.clone())
        .collect();

    let mut tasks: JoinSet<(String, Result<()>)> = JoinSet::new();
    let mut halted = false;

    loop {
        if cancel.is_cancelled() && !outcome.cancelled {
            outcome.cancelled = true;
            tracing::warn!(operation = operation.name(), "cancelled, draining in-flight calls");
        }

        if !halted && !outcome.cancelled {
            while let Some(name) = ready.pop_front() {
                let Some(app) = descriptor.application(&name).cloned() else {
                    continue;
                };
                let channel = Arc::clone(channel);
                tracing::info!(application = %name, operation = operation.name(), "dispatching");
                tasks.spawn(async move {
                    let result = operation.invoke(&channel, &app).await;
                    (app.name, result)
                });
            }
        }

        match tasks.join_next().await {
            None => break,
            Some(Ok((name, result))) => {
                match result {
                    Ok(()) => outcome.completed += 1,
                    Err(e) => {
                        tracing::error!(application = %name, operation = operation.name(), error = %e, "channel call failed");
                        outcome.failures.push((name.clone(), e));
                        if fail_fast {
                            halted = true;
                        }
                    }
                }
                // best-effort verbs keep walking past failures
                if !halted {
                    let unblocked = match direction {
                        Direction::Forward => graph.dependents_of(&name),
                        Direction::Reverse => graph.dependencies_of(&name),
                    };
                    for next in unblocked {
                        if let Some(count) = blockers.get_mut(next) {
                            *count = count.saturating_sub(1);
                            if *count == 0 {
                                ready.push_back(next.clone());
                            }
                        }
                    }
                }
            }
            Some(Err(join_err)) => {
                return Err(StaveError::Internal(format!(
                    "command task panicked: {}",
                    join_err
                )));
            }
        }
    }

    Ok(outcome)
}

/// Status is per-application with no ordering contract; query everything
/// concurrently and aggregate.
async fn status_all(
    channel: &SharedChannel,
    descriptor: &Descriptor,
    cancel: &CancellationToken,
) -> Result<CommandOutcome> {
    let mut outcome = CommandOutcome {
        total: descriptor.applications.len(),
        ..CommandOutcome::default()
    };

    let mut tasks: JoinSet<(String, Result<AppState>)> = JoinSet::new();
    for app in &descriptor.applications {
        if cancel.is_cancelled() {
            outcome.cancelled = true;
            break;
        }
        let channel = Arc::clone(channel);
        let app = app.clone();
        tasks.spawn(async move {
            let state = channel.status(&app).await;
            (app.name, state)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((name, Ok(state))) => {
                outcome.completed += 1;
                outcome.statuses.insert(
                    name,
                    StatusEntry {
                        state: state.state,
                        meets_criteria: state.meets_criteria,
                        observed_at: Utc::now(),
                    },
                );
            }
            Ok((name, Err(e))) => outcome.failures.push((name, e)),
            Err(join_err) => {
                return Err(StaveError::Internal(format!(
                    "status task panicked: {}",
                    join_err
                )));
            }
        }
    }

    Ok(outcome)
}

async fn scale_one(
    channel: &SharedChannel,
    descriptor: &Descriptor,
    options: &ExecuteOptions,
) -> Result<CommandOutcome> {
    let scale = options.scale.as_ref().ok_or_else(|| {
        StaveError::Config("scale requires an application name and instance count".to_string())
    })?;
    let app = descriptor.application(&scale.application).ok_or_else(|| {
        StaveError::Config(format!(
            "no application named '{}' in descriptor",
            scale.application
        ))
    })?;

    let mut outcome = CommandOutcome {
        total: 1,
        ..CommandOutcome::default()
    };
    if options.cancel.is_cancelled() {
        outcome.cancelled = true;
        return Ok(outcome);
    }

    match channel.scale(app, scale.instances).await {
        Ok(()) => outcome.completed = 1,
        Err(e) => outcome.failures.push((app.name.clone(), e)),
    }
    Ok(outcome)
}
