//! Graph scheduler.
//!
//! The [`Scheduler`] drives one run at a time per call: it walks the graph in
//! wavefronts, dispatches every ready node concurrently, folds results back
//! into the [`ExecutionContext`] and resolves edges until nothing is left to
//! do.
//!
//! Every edge is unresolved, taken or pruned. A node becomes ready once all of
//! its incoming edges are resolved and at least one was taken; a node whose
//! incoming edges were all pruned is skipped, and its own outgoing edges are
//! pruned in turn.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::{Map, Value};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use trellis_config::EngineConfig;
use trellis_effects::{EffectDispatcher, EffectError, EffectOutput, NodeContext};
use trellis_workflow::{Graph, Node, NodeKind, Workflow};

use crate::context::{ExecutionContext, NodeStatus};
use crate::error::SchedulerError;
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::input::TemplateResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeState {
  Unresolved,
  Taken,
  Pruned,
}

/// What came back from a dispatched node task.
enum Outcome {
  Finished(Result<EffectOutput, EffectError>),
  TimedOut(u64),
  Crashed(String),
}

/// Runs validated workflows against an [`EffectDispatcher`].
pub struct Scheduler {
  dispatcher: Arc<dyn EffectDispatcher>,
  notifier: Arc<dyn ExecutionNotifier>,
  templates: TemplateResolver,
  run_timeout_ms: Option<u64>,
  node_timeout_ms: Option<u64>,
}

impl Scheduler {
  pub fn new(dispatcher: Arc<dyn EffectDispatcher>) -> Self {
    let defaults = EngineConfig::default();
    Self {
      dispatcher,
      notifier: Arc::new(NoopNotifier),
      templates: TemplateResolver::new(),
      run_timeout_ms: defaults.run_timeout_ms,
      node_timeout_ms: defaults.node_timeout_ms,
    }
  }

  /// Apply the run and node budgets from an engine config.
  pub fn with_config(mut self, config: &EngineConfig) -> Self {
    self.run_timeout_ms = config.run_timeout_ms;
    self.node_timeout_ms = config.node_timeout_ms;
    self
  }

  pub fn with_notifier(mut self, notifier: Arc<dyn ExecutionNotifier>) -> Self {
    self.notifier = notifier;
    self
  }

  pub fn with_run_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
    self.run_timeout_ms = timeout_ms;
    self
  }

  pub fn with_node_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
    self.node_timeout_ms = timeout_ms;
    self
  }

  /// Run a workflow to completion under a fresh execution id.
  pub async fn execute(
    &self,
    workflow: Arc<Workflow>,
    variables: Map<String, Value>,
    cancel: CancellationToken,
  ) -> ExecutionContext {
    let execution_id = uuid::Uuid::new_v4().to_string();
    let ctx = ExecutionContext::new(execution_id, &workflow, variables);
    let (snapshots, _) = watch::channel(ctx.clone());
    self.run(workflow, ctx, cancel, &snapshots).await
  }

  /// Drive `ctx` to a terminal state, publishing a snapshot after every
  /// change. Returns the terminal context.
  #[instrument(
    name = "run",
    skip_all,
    fields(execution_id = %ctx.execution_id, workflow_id = %workflow.workflow_id)
  )]
  pub async fn run(
    &self,
    workflow: Arc<Workflow>,
    ctx: ExecutionContext,
    cancel: CancellationToken,
    snapshots: &watch::Sender<ExecutionContext>,
  ) -> ExecutionContext {
    let mut run = Run {
      scheduler: self,
      workflow: workflow.as_ref(),
      graph: workflow.graph(),
      edges: vec![EdgeState::Unresolved; workflow.edges.len()],
      ctx,
      snapshots,
    };
    let result = run.drive(&cancel).await;
    run.finish(result)
  }
}

struct Run<'a> {
  scheduler: &'a Scheduler,
  workflow: &'a Workflow,
  graph: Graph,
  edges: Vec<EdgeState>,
  ctx: ExecutionContext,
  snapshots: &'a watch::Sender<ExecutionContext>,
}

impl Run<'_> {
  async fn drive(&mut self, cancel: &CancellationToken) -> Result<(), SchedulerError> {
    let timeout_ms = self.workflow.timeout_ms.or(self.scheduler.run_timeout_ms);
    let deadline = timeout_ms.map(|ms| Instant::now() + Duration::from_millis(ms));

    self.ctx.start();
    self.notify(ExecutionEvent::RunStarted {
      execution_id: self.ctx.execution_id.clone(),
      workflow_id: self.ctx.workflow_id.clone(),
    });
    self.publish();

    loop {
      if cancel.is_cancelled() {
        return Err(SchedulerError::Cancelled);
      }
      if deadline.is_some_and(|d| Instant::now() >= d) {
        return Err(SchedulerError::Timeout { node_id: None });
      }

      self.propagate_skips();

      let ready = self.ready_nodes();
      if ready.is_empty() {
        let pending = self.ctx.nodes_with_status(NodeStatus::Pending);
        if pending.is_empty() {
          return Ok(());
        }
        return Err(SchedulerError::GraphStalled { pending });
      }

      info!(ready_nodes = ?ready, "dispatching wavefront");

      let workflow = self.workflow;
      let variables = Arc::new(self.ctx.variables.clone());
      let mut wave = FuturesUnordered::new();
      let mut in_flight: HashMap<String, (AbortHandle, CancellationToken)> = HashMap::new();
      let mut fatal = None;

      for node_id in ready {
        let Some(node) = workflow.get_node(&node_id) else {
          continue;
        };
        if !self.ctx.node_started(&node_id) {
          continue;
        }
        self.notify(ExecutionEvent::NodeStarted {
          execution_id: self.ctx.execution_id.clone(),
          node_id: node_id.clone(),
        });

        let kind = match self.scheduler.templates.resolve_kind(&node.kind, &variables) {
          Ok(kind) => kind,
          Err(e) => {
            let err = EffectError::InvalidConfig {
              message: format!("template resolution failed: {}", e),
            };
            if let Err(e) = self.fold(&node_id, Outcome::Finished(Err(err))) {
              fatal = Some(e);
              break;
            }
            continue;
          }
        };

        let token = cancel.child_token();
        let node_ctx = NodeContext {
          execution_id: self.ctx.execution_id.clone(),
          node_id: node_id.clone(),
          variables: variables.clone(),
          cancel: token.clone(),
        };
        let resolved = Node {
          kind,
          ..node.clone()
        };
        let limit = node.timeout_ms.or(self.scheduler.node_timeout_ms);
        let dispatcher = self.scheduler.dispatcher.clone();

        let handle = tokio::spawn(async move {
          let effect = dispatcher.execute(&resolved, &node_ctx);
          match limit {
            Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), effect).await {
              Ok(result) => Outcome::Finished(result),
              Err(_) => Outcome::TimedOut(ms),
            },
            None => Outcome::Finished(effect.await),
          }
        });

        in_flight.insert(node_id.clone(), (handle.abort_handle(), token));
        wave.push(async move { (node_id, handle.await) });
      }
      self.publish();

      while fatal.is_none() && !wave.is_empty() {
        tokio::select! {
          biased;
          _ = cancel.cancelled() => fatal = Some(SchedulerError::Cancelled),
          _ = deadline_elapsed(deadline) => fatal = Some(SchedulerError::Timeout { node_id: None }),
          Some((node_id, joined)) = wave.next() => {
            in_flight.remove(&node_id);
            let outcome = joined.unwrap_or_else(|e| Outcome::Crashed(format!("node task failed: {}", e)));
            if let Err(e) = self.fold(&node_id, outcome) {
              fatal = Some(e);
            }
            self.publish();
          }
        }
      }

      if let Some(err) = fatal {
        self.interrupt(in_flight, &err);
        return Err(err);
      }
    }
  }

  fn finish(mut self, result: Result<(), SchedulerError>) -> ExecutionContext {
    let execution_id = self.ctx.execution_id.clone();
    match result {
      Ok(()) => {
        self.ctx.complete();
        self.notify(ExecutionEvent::RunCompleted { execution_id });
      }
      Err(err) => {
        self.ctx.fail(&err);
        self.notify(ExecutionEvent::RunFailed {
          execution_id,
          error: err.to_string(),
        });
      }
    }
    self.publish();
    self.ctx
  }

  /// Fold one node's outcome into the context. Returns an error when the
  /// failure is fatal to the run.
  fn fold(&mut self, node_id: &str, outcome: Outcome) -> Result<(), SchedulerError> {
    let workflow = self.workflow;
    let Some(node) = workflow.get_node(node_id) else {
      return Ok(());
    };

    let (message, timed_out) = match outcome {
      Outcome::Finished(Ok(output)) => {
        if self
          .ctx
          .node_completed(node_id, &output, node.output_key.as_deref())
        {
          self.resolve_outgoing(node, &output.result);
          self.notify(ExecutionEvent::NodeCompleted {
            execution_id: self.ctx.execution_id.clone(),
            node_id: node_id.to_string(),
            data: output.data,
          });
        }
        return Ok(());
      }
      Outcome::Finished(Err(e)) => (e.to_string(), false),
      Outcome::TimedOut(ms) => (format!("timed out after {}ms", ms), true),
      Outcome::Crashed(message) => (message, false),
    };

    if !self.ctx.node_failed(node_id, &message, node.fail_workflow) {
      return Ok(());
    }
    self.notify(ExecutionEvent::NodeFailed {
      execution_id: self.ctx.execution_id.clone(),
      node_id: node_id.to_string(),
      error: message.clone(),
    });

    if !node.fail_workflow {
      warn!(node_id, error = %message, "non-fatal node failure; pruning downstream");
      self.prune_outgoing(node_id);
      return Ok(());
    }

    if timed_out {
      Err(SchedulerError::Timeout {
        node_id: Some(node_id.to_string()),
      })
    } else {
      Err(SchedulerError::NodeFailed {
        node_id: node_id.to_string(),
        message,
      })
    }
  }

  /// Mark a completed node's outgoing edges. Labelled edges out of a condition
  /// are taken only when the label matches the result.
  fn resolve_outgoing(&mut self, node: &Node, result: &Value) {
    let outcome = match (&node.kind, result) {
      (NodeKind::Condition(_), Value::Bool(b)) => Some(if *b { "true" } else { "false" }),
      _ => None,
    };

    for &idx in self.graph.outgoing(&node.node_id) {
      let edge = &self.workflow.edges[idx];
      self.edges[idx] = match (outcome, edge.branch.as_deref()) {
        (Some(result), Some(label)) if label != result => EdgeState::Pruned,
        _ => EdgeState::Taken,
      };
    }
  }

  fn prune_outgoing(&mut self, node_id: &str) {
    for &idx in self.graph.outgoing(node_id) {
      self.edges[idx] = EdgeState::Pruned;
    }
  }

  /// Skip pending nodes whose every incoming edge is pruned, until nothing
  /// changes.
  fn propagate_skips(&mut self) {
    loop {
      let mut changed = false;
      for node_id in self.ctx.nodes_with_status(NodeStatus::Pending) {
        if self.graph.is_entry_point(&node_id) {
          continue;
        }
        let incoming = self.graph.incoming(&node_id);
        let all_pruned =
          !incoming.is_empty() && incoming.iter().all(|&i| self.edges[i] == EdgeState::Pruned);
        if !all_pruned {
          continue;
        }

        if self.ctx.node_skipped(&node_id) {
          self.prune_outgoing(&node_id);
          self.notify(ExecutionEvent::NodeSkipped {
            execution_id: self.ctx.execution_id.clone(),
            node_id,
          });
          changed = true;
        }
      }
      if !changed {
        break;
      }
    }
  }

  /// Pending nodes that can be admitted now, in id order.
  fn ready_nodes(&self) -> Vec<String> {
    self
      .ctx
      .nodes_with_status(NodeStatus::Pending)
      .into_iter()
      .filter(|node_id| {
        if self.graph.is_entry_point(node_id) {
          return true;
        }
        let incoming = self.graph.incoming(node_id);
        incoming
          .iter()
          .all(|&i| self.edges[i] != EdgeState::Unresolved)
          && incoming.iter().any(|&i| self.edges[i] == EdgeState::Taken)
      })
      .collect()
  }

  /// Stop every node still in flight and record it as failed.
  fn interrupt(
    &mut self,
    in_flight: HashMap<String, (AbortHandle, CancellationToken)>,
    reason: &SchedulerError,
  ) {
    let message = match reason {
      SchedulerError::Cancelled => "cancelled".to_string(),
      other => format!("interrupted: {}", other),
    };

    let mut in_flight: Vec<_> = in_flight.into_iter().collect();
    in_flight.sort_by(|a, b| a.0.cmp(&b.0));

    for (node_id, (abort, token)) in in_flight {
      token.cancel();
      abort.abort();
      if self.ctx.node_failed(&node_id, &message, true) {
        self.notify(ExecutionEvent::NodeFailed {
          execution_id: self.ctx.execution_id.clone(),
          node_id,
          error: message.clone(),
        });
      }
    }
  }

  fn notify(&self, event: ExecutionEvent) {
    self.scheduler.notifier.notify(event);
  }

  fn publish(&self) {
    self.snapshots.send_replace(self.ctx.clone());
  }
}

async fn deadline_elapsed(deadline: Option<Instant>) {
  match deadline {
    Some(deadline) => tokio::time::sleep_until(deadline).await,
    None => std::future::pending().await,
  }
}
