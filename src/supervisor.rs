//! # Dispatcher Supervisor
//!
//! Runs one dispatcher loop per initialized instance on the tokio runtime
//! and stops them together. Loops share nothing but the stores, so a loop
//! that fails or panics never affects the others.
//!
//! `sync_instances` reconciles the running loops with the registry: loops of
//! deprovisioned instances are stopped, finished or panicked loops are
//! reaped, and initialized instances without a loop get one.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::component_provider::TaskReactorInstanceComponentProvider;
use crate::error::Result;
use crate::identifier::Identifier;

struct DispatcherLoop {
    stop_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl DispatcherLoop {
    fn stop(self) -> JoinHandle<()> {
        // no receiver means the loop already ended
        let _ = self.stop_tx.send(());
        self.handle
    }
}

#[derive(Default)]
struct SupervisorState {
    loops: HashMap<Identifier, DispatcherLoop>,
    shutting_down: bool,
}

pub struct DispatcherSupervisor {
    component_provider: TaskReactorInstanceComponentProvider,
    state: Mutex<SupervisorState>,
}

impl std::fmt::Debug for DispatcherSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherSupervisor")
            .field("running", &self.running_instances())
            .finish()
    }
}

impl DispatcherSupervisor {
    pub fn new(component_provider: TaskReactorInstanceComponentProvider) -> Self {
        Self {
            component_provider,
            state: Mutex::new(SupervisorState::default()),
        }
    }

    /// Start a dispatcher for every initialized instance of the registry
    pub async fn start(&self) -> Result<usize> {
        let started = self.sync_instances().await?;
        info!(dispatchers = started, "Dispatcher supervisor started");
        Ok(started)
    }

    /// Reconcile running loops with the registry.
    ///
    /// Returns how many loops were started. Nothing is started once
    /// [`shutdown`](Self::shutdown) has begun.
    pub async fn sync_instances(&self) -> Result<usize> {
        let instances = self.component_provider.instance_registry().fetch_all().await?;

        let mut finished = Vec::new();
        let mut stopped = Vec::new();
        let mut started = 0;
        {
            let mut state = self.state.lock();
            if state.shutting_down {
                debug!("Supervisor shutting down, not starting dispatchers");
                return Ok(0);
            }

            let registered: HashSet<&Identifier> =
                instances.iter().map(|i| &i.instance_name).collect();

            let names: Vec<Identifier> = state.loops.keys().cloned().collect();
            for name in names {
                let Some(dispatcher_loop) = state.loops.remove(&name) else {
                    continue;
                };

                if dispatcher_loop.handle.is_finished() {
                    finished.push((name, dispatcher_loop.handle));
                } else if !registered.contains(&name) {
                    info!(instance = %name, "Instance deprovisioned, stopping dispatcher loop");
                    stopped.push(dispatcher_loop.stop());
                } else {
                    state.loops.insert(name, dispatcher_loop);
                }
            }

            for instance in instances.iter().filter(|i| i.is_initialized) {
                if state.loops.contains_key(&instance.instance_name) {
                    continue;
                }

                let (stop_tx, stop_rx) = broadcast::channel(1);
                let dispatcher = self.component_provider.dispatcher(&instance.instance_name);
                let handle = tokio::spawn(dispatcher.run(stop_rx));
                info!(instance = %instance.instance_name, "Dispatcher loop spawned");

                state
                    .loops
                    .insert(instance.instance_name.clone(), DispatcherLoop { stop_tx, handle });
                started += 1;
            }
        }

        for (name, handle) in finished {
            if let Err(e) = handle.await {
                warn!(instance = %name, error = %e, "Dispatcher loop terminated abnormally");
            }
        }
        join_loops(stopped).await;

        Ok(started)
    }

    pub fn running_instances(&self) -> Vec<Identifier> {
        let mut instances: Vec<Identifier> = self.state.lock().loops.keys().cloned().collect();
        instances.sort();
        instances
    }

    /// Signal every loop to stop and wait for them to finish their current command
    pub async fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut state = self.state.lock();
            state.shutting_down = true;
            state.loops.drain().map(|(_, l)| l.stop()).collect()
        };

        join_loops(handles).await;
        info!("Dispatcher supervisor stopped");
    }
}

async fn join_loops(handles: Vec<JoinHandle<()>>) {
    for result in futures::future::join_all(handles).await {
        if let Err(e) = result {
            error!(error = %e, "Dispatcher loop terminated abnormally");
        }
    }
}
