//! Runs a finalized graph once per chunk.

use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use arc_swap::{ArcSwapOption, Guard};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

use super::collection::Graph;
use super::node::NodeId;
use crate::{EngineProcessTimeInfo, Error, NFrames, Result, SchedulerConfig};

/// Jobs queued per worker pool. Graphs with more nodes are rejected by
/// [`GraphScheduler::rechain`] in pool mode.
pub const MAX_QUEUED_JOBS: usize = 4096;

enum Job {
    Node {
        graph: Arc<Graph>,
        node: NodeId,
        time_nfo: EngineProcessTimeInfo,
        remaining_preroll_frames: NFrames,
    },
    Shutdown,
}

struct WorkerPool {
    job_tx: Sender<Job>,
    done_rx: Receiver<()>,
    pending: Arc<AtomicUsize>,
    threads: Vec<JoinHandle<()>>,
}

/// Executes graph chunks either on the calling thread or on a worker pool.
///
/// The active graph can be replaced between cycles with
/// [`rechain`](Self::rechain). Replaced graphs are kept until
/// [`collect_garbage`](Self::collect_garbage) finds them unused, so the audio
/// thread never drops a graph.
pub struct GraphScheduler {
    graph: ArcSwapOption<Graph>,
    retired: Mutex<Vec<Arc<Graph>>>,
    pool: Option<WorkerPool>,
}

impl GraphScheduler {
    /// Spawns `config.worker_threads` workers. With 0 workers every chunk
    /// runs on the thread calling [`run_chunk`](Self::run_chunk).
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        let pool = if config.worker_threads == 0 {
            None
        } else {
            Some(WorkerPool::spawn(config.worker_threads)?)
        };
        Ok(Self {
            graph: ArcSwapOption::empty(),
            retired: Mutex::new(Vec::new()),
            pool,
        })
    }

    pub fn worker_threads(&self) -> usize {
        self.pool.as_ref().map_or(0, |p| p.threads.len())
    }

    /// Makes `graph` the active graph from the next chunk on.
    pub fn rechain(&self, graph: Graph) -> Result<()> {
        if !graph.is_finalized() {
            return Err(Error::GraphNotFinalized);
        }
        if self.pool.is_some() && graph.len() > MAX_QUEUED_JOBS {
            return Err(Error::InvalidConfig(format!(
                "graph has {} nodes, worker pool queues at most {}",
                graph.len(),
                MAX_QUEUED_JOBS
            )));
        }

        tracing::debug!("Rechaining graph with {} nodes", graph.len());
        if let Some(old) = self.graph.swap(Some(Arc::new(graph))) {
            self.retired.lock().push(old);
        }
        Ok(())
    }

    pub fn graph(&self) -> Option<Arc<Graph>> {
        self.graph.load_full()
    }

    /// Drops replaced graphs no chunk is using any more. Returns how many were dropped.
    pub fn collect_garbage(&self) -> usize {
        let mut retired = self.retired.lock();
        let before = retired.len();
        retired.retain(|graph| Arc::strong_count(graph) > 1);
        before - retired.len()
    }

    /// Borrows the active graph without touching its reference count.
    /// Hold it for one cycle at most.
    pub fn current(&self) -> Guard<Option<Arc<Graph>>> {
        self.graph.load()
    }

    /// Runs every node of the active graph once, in dependency order.
    /// Returns when all nodes have finished.
    pub fn run_chunk(&self, time_nfo: EngineProcessTimeInfo, remaining_preroll_frames: NFrames) {
        let guard = self.current();
        if let Some(graph) = (*guard).as_ref() {
            self.run_graph_chunk(graph, time_nfo, remaining_preroll_frames);
        }
    }

    /// Like [`run_chunk`](Self::run_chunk) for a graph obtained from
    /// [`current`](Self::current).
    pub fn run_graph_chunk(
        &self,
        graph: &Arc<Graph>,
        time_nfo: EngineProcessTimeInfo,
        remaining_preroll_frames: NFrames,
    ) {
        if graph.is_empty() {
            return;
        }
        match &self.pool {
            None => graph.process_inline(time_nfo, remaining_preroll_frames),
            Some(pool) => pool.run(graph, time_nfo, remaining_preroll_frames),
        }
    }
}

impl Drop for GraphScheduler {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.shutdown();
        }
    }
}

impl WorkerPool {
    fn spawn(workers: usize) -> Result<Self> {
        let (job_tx, job_rx) = bounded::<Job>(MAX_QUEUED_JOBS);
        let (done_tx, done_rx) = bounded::<()>(1);
        let pending = Arc::new(AtomicUsize::new(0));

        let mut threads = Vec::with_capacity(workers);
        for index in 0..workers {
            let job_tx = job_tx.clone();
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            let pending = Arc::clone(&pending);
            let handle = std::thread::Builder::new()
                .name(format!("graph-worker-{index}"))
                .spawn(move || worker_loop(job_tx, job_rx, done_tx, pending))
                .map_err(|e| Error::WorkerSpawn(e.to_string()))?;
            threads.push(handle);
        }
        tracing::info!("Started {} graph workers", workers);

        Ok(Self {
            job_tx,
            done_rx,
            pending,
            threads,
        })
    }

    fn run(
        &self,
        graph: &Arc<Graph>,
        time_nfo: EngineProcessTimeInfo,
        remaining_preroll_frames: NFrames,
    ) {
        self.pending.store(graph.len(), Ordering::Release);
        for &node in graph.initial_nodes() {
            let sent = self.job_tx.send(Job::Node {
                graph: Arc::clone(graph),
                node,
                time_nfo,
                remaining_preroll_frames,
            });
            debug_assert!(sent.is_ok(), "graph workers exited");
        }
        let finished = self.done_rx.recv();
        debug_assert!(finished.is_ok(), "graph workers exited mid-chunk");
    }

    fn shutdown(self) {
        for _ in &self.threads {
            let _ = self.job_tx.send(Job::Shutdown);
        }
        for handle in self.threads {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    job_tx: Sender<Job>,
    job_rx: Receiver<Job>,
    done_tx: Sender<()>,
    pending: Arc<AtomicUsize>,
) {
    while let Ok(job) = job_rx.recv() {
        let Job::Node {
            graph,
            node,
            time_nfo,
            remaining_preroll_frames,
        } = job
        else {
            break;
        };

        graph.trigger_node(node, time_nfo, remaining_preroll_frames, |child| {
            let sent = job_tx.send(Job::Node {
                graph: Arc::clone(&graph),
                node: child,
                time_nfo,
                remaining_preroll_frames,
            });
            debug_assert!(sent.is_ok(), "job queue closed");
        });

        if pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            let sent = done_tx.send(());
            debug_assert!(sent.is_ok(), "chunk completion not delivered");
        }
    }
}
