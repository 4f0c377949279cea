//! Run registry: submission, query and cancellation of runs.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::{RwLock, watch};
use tokio_util::sync::CancellationToken;
use tracing::info;
use trellis_workflow::{GraphError, Workflow, validate};

use crate::context::ExecutionContext;
use crate::scheduler::Scheduler;

/// Identifier of a submitted run; equal to its execution id.
pub type RunId = String;

struct RunHandle {
  snapshots: watch::Receiver<ExecutionContext>,
  cancel: CancellationToken,
}

/// Owns every run started through it until the caller discards them.
///
/// Each run executes on its own tokio task. Readers get snapshots published
/// by that task and never touch the live context.
pub struct RunRegistry {
  scheduler: Arc<Scheduler>,
  runs: RwLock<HashMap<RunId, RunHandle>>,
}

impl RunRegistry {
  pub fn new(scheduler: Scheduler) -> Self {
    Self {
      scheduler: Arc::new(scheduler),
      runs: RwLock::new(HashMap::new()),
    }
  }

  /// Validate `workflow` and start running it. Returns as soon as the run is
  /// spawned.
  pub async fn submit(
    &self,
    workflow: Workflow,
    variables: Map<String, Value>,
  ) -> Result<RunId, GraphError> {
    validate(&workflow)?;

    let workflow = Arc::new(workflow);
    let run_id = uuid::Uuid::new_v4().to_string();
    let ctx = ExecutionContext::new(run_id.clone(), &workflow, variables);
    let (sender, receiver) = watch::channel(ctx.clone());
    let cancel = CancellationToken::new();

    let scheduler = self.scheduler.clone();
    let token = cancel.clone();
    tokio::spawn(async move {
      scheduler.run(workflow, ctx, token, &sender).await;
    });

    info!(run_id = %run_id, "run submitted");
    self.runs.write().await.insert(
      run_id.clone(),
      RunHandle {
        snapshots: receiver,
        cancel,
      },
    );
    Ok(run_id)
  }

  /// Latest snapshot of a run.
  pub async fn query(&self, run_id: &str) -> Option<ExecutionContext> {
    let runs = self.runs.read().await;
    runs.get(run_id).map(|h| h.snapshots.borrow().clone())
  }

  /// Request cancellation. Returns false for unknown or already finished runs.
  pub async fn cancel(&self, run_id: &str) -> bool {
    let runs = self.runs.read().await;
    let Some(handle) = runs.get(run_id) else {
      return false;
    };
    if handle.snapshots.borrow().is_terminal() {
      return false;
    }
    info!(run_id = %run_id, "run cancellation requested");
    handle.cancel.cancel();
    true
  }

  /// Wait for a run to finish and return its terminal snapshot.
  pub async fn wait(&self, run_id: &str) -> Option<ExecutionContext> {
    let receiver = {
      let runs = self.runs.read().await;
      runs.get(run_id)?.snapshots.clone()
    };
    Some(wait_terminal(receiver).await)
  }

  /// Forget a run, cancelling it first if it is still active. Returns its
  /// final snapshot.
  pub async fn discard(&self, run_id: &str) -> Option<ExecutionContext> {
    let handle = self.runs.write().await.remove(run_id)?;
    if !handle.snapshots.borrow().is_terminal() {
      handle.cancel.cancel();
    }
    Some(wait_terminal(handle.snapshots).await)
  }

  /// Ids of all retained runs, sorted.
  pub async fn list(&self) -> Vec<RunId> {
    let mut ids: Vec<RunId> = self.runs.read().await.keys().cloned().collect();
    ids.sort();
    ids
  }
}

async fn wait_terminal(mut receiver: watch::Receiver<ExecutionContext>) -> ExecutionContext {
  if let Ok(ctx) = receiver.wait_for(|ctx| ctx.is_terminal()).await {
    return ctx.clone();
  }
  // Sender gone: the run task ended and its last publish is final.
  receiver.borrow().clone()
}
