use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info_span, Instrument};

use crate::error::WorkerError;
use crate::pipeline::PipelineContext;
use crate::sanitize;
use crate::worker::job::{FileTask, Summary};
use crate::worker::summarise::summarise_task;

/// Fixed set of worker tasks fed from one job channel.
///
/// Workers share nothing mutable; every result travels back over the result
/// channel, which only the owner of the pool drains.
pub struct WorkerPool {
    job_sender: mpsc::UnboundedSender<FileTask>,
    result_receiver: mpsc::UnboundedReceiver<Summary>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawns `worker_count` workers (at least one) on the current runtime.
    pub fn new(ctx: PipelineContext, worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (job_sender, job_receiver) = mpsc::unbounded_channel::<FileTask>();
        let (result_sender, result_receiver) = mpsc::unbounded_channel::<Summary>();
        let job_receiver = Arc::new(Mutex::new(job_receiver));
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = Arc::clone(&job_receiver);
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_ctx = ctx.clone();

            workers.push(tokio::spawn(run_worker(
                worker_id,
                job_rx,
                result_tx,
                shutdown_flag,
                worker_ctx,
            )));
        }

        info!("Started {} workers", worker_count);

        Self {
            job_sender,
            result_receiver,
            workers,
            shutdown,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn submit(&self, task: FileTask) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        self.job_sender
            .send(task)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Next completed summary, in completion order. `None` once every worker
    /// has stopped.
    pub async fn recv_result(&mut self) -> Option<Summary> {
        self.result_receiver.recv().await
    }

    /// Stops workers from picking up further jobs. In-flight jobs finish.
    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Closes the job channel and waits for every worker to exit.
    pub async fn wait(self) -> Result<(), WorkerError> {
        drop(self.job_sender);

        let mut first_failure = None;
        for (i, worker) in self.workers.into_iter().enumerate() {
            match worker.await {
                Ok(()) => debug!("Worker {} finished", i),
                Err(e) => {
                    error!("Worker {} panicked: {}", i, e);
                    first_failure.get_or_insert(WorkerError::JoinFailed {
                        worker_id: i,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!("All workers have stopped");
        first_failure.map_or(Ok(()), Err)
    }
}

async fn run_worker(
    worker_id: usize,
    job_receiver: Arc<Mutex<mpsc::UnboundedReceiver<FileTask>>>,
    result_sender: mpsc::UnboundedSender<Summary>,
    shutdown: Arc<AtomicBool>,
    ctx: PipelineContext,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        let next = job_receiver.lock().await.recv().await;
        let Some(task) = next else {
            debug!("Worker {} job channel closed", worker_id);
            break;
        };

        let span = info_span!(
            "summarise_file",
            worker_id,
            task_id = %task.id,
            file = %sanitize::redact_path(&task.path),
            path_hash = %sanitize::hash_path(&task.path),
        );
        let summary = summarise_isolated(&ctx, task).instrument(span).await;

        if result_sender.send(summary).is_err() {
            error!("Worker {} failed to send result: receiver dropped", worker_id);
            break;
        }
    }

    debug!("Worker {} stopped", worker_id);
}

/// Runs one task on its own tokio task so a panic inside it becomes a failed
/// summary. Every submitted task must produce exactly one result, otherwise
/// the harvesting side waits forever.
async fn summarise_isolated(ctx: &PipelineContext, task: FileTask) -> Summary {
    let path = task.path.clone();
    let ctx = ctx.clone();
    let handle = tokio::spawn(
        async move { summarise_task(&ctx, &task).await }.in_current_span(),
    );

    match handle.await {
        Ok(summary) => summary,
        Err(e) if e.is_panic() => {
            error!("Summarising {} panicked", sanitize::redact_path(&path));
            Summary::failure(path, "summariser panicked")
        }
        Err(e) => Summary::failure(path, format!("summariser task failed: {}", e)),
    }
}
