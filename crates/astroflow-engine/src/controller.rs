use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use astroflow_core::config::{ExecutionSettings, SimulationSettings};
use astroflow_core::error::{AstroflowError, Result};
use astroflow_core::event::EventBus;
use astroflow_core::types::{RunEvent, RunId};

use crate::actions::{NodeAction, SimulatedActions};
use crate::engine::ExecutionEngine;
use crate::environment::VariableEnvironment;
use crate::graph::Graph;
use crate::state::ExecutionState;

/// Paced, interruptible driver around an [`ExecutionEngine`].
///
/// `start()` spawns a run loop that visits one node per step and sleeps
/// `step_delay_ms` between steps. The loop can be paused, resumed, stopped or
/// replaced by a new `start()`; `step()` advances by hand. Cloning the
/// controller yields another handle to the same run.
#[derive(Clone)]
pub struct ExecutionController {
    shared: Arc<Shared>,
}

struct Shared {
    graph: Arc<Graph>,
    event_bus: Arc<EventBus>,
    inner: Mutex<Inner>,
    wake: Notify,
}

struct Inner {
    engine: ExecutionEngine,
    state: ExecutionState,
    run: Option<ActiveRun>,
    generation: u64,
}

struct ActiveRun {
    id: RunId,
    generation: u64,
    cancel: CancellationToken,
}

impl Inner {
    fn owns(&self, generation: u64) -> bool {
        self.run.as_ref().is_some_and(|r| r.generation == generation)
    }

    fn run_id(&self) -> Option<RunId> {
        self.run.as_ref().map(|r| r.id.clone())
    }

    fn sync_variables(&mut self) {
        self.state.variables = self.engine.variables().clone();
    }

    /// End the active run, if any, and return its id.
    fn end_run(&mut self) -> Option<RunId> {
        self.state.finish();
        self.run.take().map(|run| {
            run.cancel.cancel();
            run.id
        })
    }
}

/// Outcome of one run-loop iteration.
enum Tick {
    Paused,
    Visited {
        node_id: String,
        step: usize,
        center_view: bool,
        delay: Duration,
    },
    Completed {
        steps: usize,
    },
    Failed {
        error: String,
    },
    /// The run was stopped or superseded.
    Detached,
}

/// Builder for [`ExecutionController`].
pub struct ControllerBuilder {
    graph: Arc<Graph>,
    actions: Option<Arc<dyn NodeAction>>,
    event_bus: Option<Arc<EventBus>>,
    variables: VariableEnvironment,
    step_delay_ms: u64,
    center_on_step: bool,
}

impl ControllerBuilder {
    pub fn with_actions(mut self, actions: Arc<dyn NodeAction>) -> Self {
        self.actions = Some(actions);
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Variables every run starts from.
    pub fn with_initial_variables(mut self, variables: VariableEnvironment) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_settings(mut self, settings: &ExecutionSettings) -> Self {
        self.step_delay_ms = settings.step_delay_ms;
        self.center_on_step = settings.center_on_step;
        self
    }

    /// Use simulated device actions, seeded when the settings carry a seed.
    pub fn with_simulation(self, settings: &SimulationSettings) -> Self {
        let actions = match settings.seed {
            Some(seed) => SimulatedActions::seeded(seed),
            None => SimulatedActions::new(),
        };
        self.with_actions(Arc::new(actions))
    }

    pub fn build(self) -> ExecutionController {
        let actions = self
            .actions
            .unwrap_or_else(|| Arc::new(SimulatedActions::new()));
        let engine = ExecutionEngine::with_actions(Arc::clone(&self.graph), actions)
            .with_variables(self.variables);

        let mut state = ExecutionState::new(self.step_delay_ms, self.center_on_step);
        state.variables = engine.variables().clone();

        ExecutionController {
            shared: Arc::new(Shared {
                graph: self.graph,
                event_bus: self.event_bus.unwrap_or_default(),
                inner: Mutex::new(Inner {
                    engine,
                    state,
                    run: None,
                    generation: 0,
                }),
                wake: Notify::new(),
            }),
        }
    }
}

impl ExecutionController {
    /// Controller with simulated actions, default pacing and a private event bus.
    pub fn new(graph: impl Into<Arc<Graph>>) -> Self {
        Self::builder(graph).build()
    }

    pub fn builder(graph: impl Into<Arc<Graph>>) -> ControllerBuilder {
        let defaults = ExecutionSettings::default();
        ControllerBuilder {
            graph: graph.into(),
            actions: None,
            event_bus: None,
            variables: VariableEnvironment::new(),
            step_delay_ms: defaults.step_delay_ms,
            center_on_step: defaults.center_on_step,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.shared.graph
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RunEvent> {
        self.shared.event_bus.subscribe()
    }

    /// Copy of the current observable state.
    pub fn snapshot(&self) -> ExecutionState {
        self.lock().state.clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock().state.is_running
    }

    pub fn is_paused(&self) -> bool {
        self.lock().state.is_paused
    }

    /// Start a run from the Start node and return the run loop's task.
    ///
    /// Clears the execution path and the last error, resets variables and
    /// loop counters, and replaces any run already in progress. A graph that
    /// fails validation is reported through `error` and the returned `Err`.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<JoinHandle<()>> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let superseded = inner.run.take().map(|previous| {
            info!(run_id = %previous.id, "Restarting workflow, cancelling previous run");
            previous.cancel.cancel();
            RunEvent::RunStopped {
                run_id: previous.id,
                steps: inner.state.steps(),
            }
        });
        inner.state.finish();
        inner.state.execution_path.clear();
        inner.state.error = None;

        if let Err(e) = self.shared.graph.validate() {
            inner.state.error = Some(e.to_string());
            drop(guard);
            if let Some(event) = superseded {
                self.shared.event_bus.publish(event);
            }
            error!(error = %e, "Workflow rejected");
            self.shared.event_bus.publish(RunEvent::RunFailed {
                run_id: None,
                error: e.to_string(),
            });
            return Err(e);
        }

        inner.engine.reset();
        inner.sync_variables();
        inner.state.is_running = true;
        inner.generation += 1;

        let run = ActiveRun {
            id: RunId::new(),
            generation: inner.generation,
            cancel: CancellationToken::new(),
        };
        let run_id = run.id.clone();
        let generation = run.generation;
        let cancel = run.cancel.clone();
        inner.run = Some(run);
        let step_delay_ms = inner.state.step_delay_ms;
        drop(guard);

        if let Some(event) = superseded {
            self.shared.event_bus.publish(event);
        }

        info!(run_id = %run_id, step_delay_ms, "Workflow run started");
        self.shared.event_bus.publish(RunEvent::RunStarted {
            run_id: run_id.clone(),
            started_at: Utc::now(),
        });

        let controller = self.clone();
        Ok(tokio::spawn(async move {
            controller.run_loop(run_id, generation, cancel).await;
        }))
    }

    /// Toggle the paused flag and return its new value.
    ///
    /// A paused run loop stops before its next step and resumes on the
    /// second call. Steps requested through `step()` are unaffected.
    pub fn pause(&self) -> bool {
        let (paused, run_id) = {
            let mut inner = self.lock();
            inner.state.is_paused = !inner.state.is_paused;
            (inner.state.is_paused, inner.run_id())
        };

        if !paused {
            self.shared.wake.notify_one();
        }

        if let Some(run_id) = run_id {
            if paused {
                info!(run_id = %run_id, "Workflow run paused");
                self.shared.event_bus.publish(RunEvent::RunPaused { run_id });
            } else {
                info!(run_id = %run_id, "Workflow run resumed");
                self.shared.event_bus.publish(RunEvent::RunResumed { run_id });
            }
        }
        paused
    }

    /// Stop the run. The loop exits at its next suspension point, including
    /// mid-delay. The execution path is kept.
    pub fn stop(&self) {
        let (run_id, steps) = {
            let mut inner = self.lock();
            let steps = inner.state.steps();
            (inner.end_run(), steps)
        };

        if let Some(run_id) = run_id {
            info!(run_id = %run_id, steps, "Workflow run stopped");
            self.shared
                .event_bus
                .publish(RunEvent::RunStopped { run_id, steps });
        }
    }

    /// Advance by exactly one node and return it.
    ///
    /// From the not-started state this visits the Start node, resetting
    /// variables and loop counters unless a run is active. `Ok(None)` means
    /// the traversal has nowhere to go; an active run then completes.
    pub fn step(&self) -> Result<Option<String>> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        if inner.state.current_node_id.is_none() {
            if let Err(e) = self.shared.graph.validate() {
                inner.state.error = Some(e.to_string());
                return Err(e);
            }
            if inner.run.is_none() {
                inner.engine.reset();
            }
        }

        let current = inner.state.current_node_id.clone();
        let result = inner.engine.advance(current.as_deref());
        inner.sync_variables();

        match result {
            Ok(Some(node_id)) => {
                inner.state.visit(node_id.clone());
                let event = RunEvent::NodeVisited {
                    run_id: inner.run_id(),
                    node_id: node_id.clone(),
                    step: inner.state.steps(),
                    center_view: inner.state.center_on_step,
                };
                drop(guard);
                debug!(node_id = %node_id, "Manual step");
                self.shared.event_bus.publish(event);
                Ok(Some(node_id))
            }
            Ok(None) => {
                let steps = inner.state.steps();
                let completed = if inner.run.is_some() {
                    inner.end_run()
                } else {
                    None
                };
                drop(guard);
                match completed {
                    Some(run_id) => {
                        info!(run_id = %run_id, steps, "Workflow run completed");
                        self.shared
                            .event_bus
                            .publish(RunEvent::RunCompleted { run_id, steps });
                    }
                    None => debug!("Manual step reached the end of the workflow"),
                }
                Ok(None)
            }
            Err(e) => {
                inner.state.error = Some(e.to_string());
                let run_id = if inner.run.is_some() {
                    inner.end_run()
                } else {
                    None
                };
                drop(guard);
                error!(error = %e, "Manual step failed");
                self.shared.event_bus.publish(RunEvent::RunFailed {
                    run_id,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Change the pacing. Takes effect from the next delay.
    pub fn set_step_delay(&self, step_delay_ms: u64) {
        self.lock().state.step_delay_ms = step_delay_ms;
    }

    pub fn set_center_on_step(&self, center_on_step: bool) {
        self.lock().state.center_on_step = center_on_step;
    }

    /// Start a run and wait for it to end, by completion, failure or `stop()`.
    ///
    /// A run loop that dies without finishing (a panicking action) ends the
    /// run with `error` set and is reported as [`AstroflowError::RunAborted`].
    pub async fn run_to_completion(&self) -> Result<ExecutionState> {
        let handle = self.start()?;
        if let Err(e) = handle.await {
            let message = e.to_string();
            error!(error = %message, "Run loop task failed");
            let run_id = {
                let mut inner = self.lock();
                inner.state.error = Some(message.clone());
                inner.end_run()
            };
            self.shared.event_bus.publish(RunEvent::RunFailed {
                run_id,
                error: message.clone(),
            });
            return Err(AstroflowError::RunAborted(message));
        }
        Ok(self.snapshot())
    }

    async fn run_loop(self, run_id: RunId, generation: u64, cancel: CancellationToken) {
        loop {
            match self.tick(generation) {
                Tick::Detached => {
                    debug!(run_id = %run_id, "Run loop detached");
                    break;
                }
                Tick::Paused => {
                    tokio::select! {
                        _ = self.shared.wake.notified() => {}
                        _ = cancel.cancelled() => break,
                    }
                }
                Tick::Visited {
                    node_id,
                    step,
                    center_view,
                    delay,
                } => {
                    debug!(run_id = %run_id, node_id = %node_id, step, "Visited node");
                    self.shared.event_bus.publish(RunEvent::NodeVisited {
                        run_id: Some(run_id.clone()),
                        node_id,
                        step,
                        center_view,
                    });
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => break,
                    }
                }
                Tick::Completed { steps } => {
                    info!(run_id = %run_id, steps, "Workflow run completed");
                    self.shared.event_bus.publish(RunEvent::RunCompleted {
                        run_id: run_id.clone(),
                        steps,
                    });
                    break;
                }
                Tick::Failed { error } => {
                    error!(run_id = %run_id, error = %error, "Workflow run failed");
                    self.shared.event_bus.publish(RunEvent::RunFailed {
                        run_id: Some(run_id.clone()),
                        error,
                    });
                    break;
                }
            }
        }
    }

    fn tick(&self, generation: u64) -> Tick {
        let mut guard = self.lock();
        let inner = &mut *guard;

        if !inner.owns(generation) || !inner.state.is_running {
            return Tick::Detached;
        }
        if inner.state.is_paused {
            return Tick::Paused;
        }

        let current = inner.state.current_node_id.clone();
        let result = inner.engine.advance(current.as_deref());
        inner.sync_variables();

        match result {
            Ok(Some(node_id)) => {
                inner.state.visit(node_id.clone());
                Tick::Visited {
                    node_id,
                    step: inner.state.steps(),
                    center_view: inner.state.center_on_step,
                    delay: Duration::from_millis(inner.state.step_delay_ms),
                }
            }
            Ok(None) => {
                let steps = inner.state.steps();
                inner.end_run();
                Tick::Completed { steps }
            }
            Err(e) => {
                inner.state.error = Some(e.to_string());
                inner.end_run();
                Tick::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
