//! Worker pool: one worker per registry, one shared queue of calls.
//!
//! [`WorkerPool`] is plain data. It is owned by a single actor task spawned
//! with [`spawn_pool`]; everything else talks to it through a [`PoolHandle`],
//! so all mutation happens on one logical thread.

use std::collections::{HashMap, VecDeque};

use eppd_protocol::{WorkerReply, WorkerRequest};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{ServerError, ServerResult};
use crate::transport::BoxFuture;

/// A queued call, invoked with the worker it was dispatched to.
pub type PoolCall<W> = Box<dyn FnOnce(W) + Send>;

/// Sends one request to a registry worker and waits for its reply.
pub trait WorkerChannel: Clone + Send + Sync + 'static {
    fn call(&self, request: WorkerRequest) -> BoxFuture<'static, ServerResult<WorkerReply>>;
}

#[derive(Debug, Clone)]
enum Slot<W> {
    Available(W),
    Busy(W),
}

/// Available/busy slots plus the FIFO of pending calls.
pub struct WorkerPool<W> {
    slots: HashMap<String, Slot<W>>,
    queue: VecDeque<(String, PoolCall<W>)>,
}

impl<W: Clone> Default for WorkerPool<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Clone> WorkerPool<W> {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
            queue: VecDeque::new(),
        }
    }

    /// Adds an available worker for a registry, replacing any previous one.
    pub fn register(&mut self, registry: impl Into<String>, worker: W) {
        self.slots.insert(registry.into(), Slot::Available(worker));
    }

    pub fn contains(&self, registry: &str) -> bool {
        self.slots.contains_key(registry)
    }

    pub fn is_busy(&self, registry: &str) -> bool {
        matches!(self.slots.get(registry), Some(Slot::Busy(_)))
    }

    /// Number of calls waiting, across all registries.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn enqueue(&mut self, registry: impl Into<String>, call: PoolCall<W>) {
        self.queue.push_back((registry.into(), call));
    }

    /// Runs the oldest queued call for `registry` if its worker is free.
    ///
    /// Returns whether a call was dispatched.
    pub fn request_dispatch(&mut self, registry: &str) -> bool {
        let worker = match self.slots.get(registry) {
            Some(Slot::Available(worker)) => worker.clone(),
            _ => return false,
        };
        let Some(position) = self.queue.iter().position(|(r, _)| r == registry) else {
            return false;
        };
        let Some((_, call)) = self.queue.remove(position) else {
            return false;
        };

        self.slots
            .insert(registry.to_string(), Slot::Busy(worker.clone()));
        debug!(registry, queued = self.queue.len(), "Dispatching call");
        call(worker);
        true
    }

    /// Marks the registry's worker available and dispatches the next call.
    pub fn release(&mut self, registry: &str) -> bool {
        if let Some(slot) = self.slots.get_mut(registry)
            && let Slot::Busy(worker) = slot
        {
            *slot = Slot::Available(worker.clone());
        }
        self.request_dispatch(registry)
    }
}

/// Events handled by the pool actor.
enum PoolEvent<W> {
    Register { registry: String, worker: W },
    Enqueue { registry: String, call: PoolCall<W> },
    Release { registry: String },
}

/// Handle to a running pool actor.
pub struct PoolHandle<W> {
    tx: mpsc::Sender<PoolEvent<W>>,
}

impl<W> Clone for PoolHandle<W> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

/// Spawns the pool actor and returns its handle.
///
/// The actor stops when every handle is dropped.
pub fn spawn_pool<W: WorkerChannel>() -> PoolHandle<W> {
    let (tx, mut rx) = mpsc::channel::<PoolEvent<W>>(64);
    tokio::spawn(async move {
        let mut pool = WorkerPool::new();
        while let Some(event) = rx.recv().await {
            match event {
                PoolEvent::Register { registry, worker } => {
                    debug!(registry = %registry, "Registered worker");
                    pool.register(registry.clone(), worker);
                    pool.request_dispatch(&registry);
                }
                PoolEvent::Enqueue { registry, call } => {
                    pool.enqueue(registry.clone(), call);
                    pool.request_dispatch(&registry);
                }
                PoolEvent::Release { registry } => {
                    pool.release(&registry);
                }
            }
        }
        debug!("Pool actor stopped");
    });
    PoolHandle { tx }
}

impl<W: WorkerChannel> PoolHandle<W> {
    async fn send(&self, event: PoolEvent<W>) -> ServerResult<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| ServerError::worker_protocol("worker pool is not running"))
    }

    pub async fn register(&self, registry: impl Into<String>, worker: W) -> ServerResult<()> {
        self.send(PoolEvent::Register {
            registry: registry.into(),
            worker,
        })
        .await
    }

    pub async fn release(&self, registry: impl Into<String>) -> ServerResult<()> {
        self.send(PoolEvent::Release {
            registry: registry.into(),
        })
        .await
    }

    /// Queues a request for the registry's worker and waits for the reply.
    ///
    /// The worker is released once it has answered, whatever the answer.
    pub async fn dispatch(&self, registry: &str, request: WorkerRequest) -> ServerResult<WorkerReply> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let handle = self.clone();
        let name = registry.to_string();

        let call: PoolCall<W> = Box::new(move |worker: W| {
            tokio::spawn(async move {
                let reply = worker.call(request).await;
                let _ = reply_tx.send(reply);
                if let Err(e) = handle.release(name.clone()).await {
                    warn!(registry = %name, error = %e, "Failed to release worker");
                }
            });
        });

        self.send(PoolEvent::Enqueue {
            registry: registry.to_string(),
            call,
        })
        .await?;

        reply_rx
            .await
            .map_err(|_| ServerError::worker_unavailable(registry))?
    }
}
