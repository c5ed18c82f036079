//! Asynchronous mesh building: quad geometry goes to a worker pool and
//! finished meshes come back over a channel, tagged with the ticket they
//! were issued under.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use quadsphere_cubesphere::QuadPath;

use crate::MeshBuildError;
use crate::builder::{MeshBuilder, QuadGeometry};
use crate::mesh_data::MeshData;

/// Identifies one mesh job. The LOD manager compares all three fields on
/// completion and drops results that no longer match the quad.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshJobTicket {
    /// Arena slot of the quad.
    pub slot: u32,
    /// Generation of that slot when the job was issued.
    pub generation: u32,
    /// Monotonic job counter.
    pub job: u64,
}

/// A self-contained build job.
pub struct MeshBuildRequest {
    pub ticket: MeshJobTicket,
    pub geometry: QuadGeometry,
}

pub struct MeshBuildResult {
    pub ticket: MeshJobTicket,
    pub path: QuadPath,
    pub mesh: Result<MeshData, MeshBuildError>,
}

fn run(builder: &MeshBuilder, request: MeshBuildRequest) -> MeshBuildResult {
    let mesh = builder.build(&request.geometry);
    MeshBuildResult {
        ticket: request.ticket,
        path: request.geometry.path,
        mesh,
    }
}

/// Mesh build pipeline backed by a thread pool.
///
/// With zero workers every submitted job is built inline during
/// [`submit`](Self::submit); results are still collected through
/// [`drain_results`](Self::drain_results).
pub struct MeshBuildPipeline {
    builder: Arc<MeshBuilder>,
    task_sender: Option<crossbeam_channel::Sender<MeshBuildRequest>>,
    result_sender: crossbeam_channel::Sender<MeshBuildResult>,
    result_receiver: crossbeam_channel::Receiver<MeshBuildResult>,
    worker_handles: Vec<JoinHandle<()>>,
    inline: bool,
    budget: usize,
    in_flight: Arc<AtomicUsize>,
}

impl MeshBuildPipeline {
    /// Spawn `worker_count` named worker threads sharing `builder`.
    /// At most `budget` jobs are queued or running at once.
    pub fn new(worker_count: usize, budget: usize, builder: Arc<MeshBuilder>) -> Self {
        let (task_tx, task_rx) = crossbeam_channel::bounded(budget.max(1));
        let (result_tx, result_rx) = crossbeam_channel::unbounded();
        let in_flight = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            let rx: crossbeam_channel::Receiver<MeshBuildRequest> = task_rx.clone();
            let tx = result_tx.clone();
            let builder = Arc::clone(&builder);
            let flight = Arc::clone(&in_flight);

            let spawned = std::thread::Builder::new()
                .name(format!("mesh-worker-{i}"))
                .spawn(move || {
                    while let Ok(request) = rx.recv() {
                        let result = run(&builder, request);
                        flight.fetch_sub(1, Ordering::Relaxed);
                        let _ = tx.send(result);
                    }
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => tracing::warn!("Failed to spawn mesh worker {i}: {e}"),
            }
        }

        if handles.is_empty() && worker_count > 0 {
            tracing::warn!("No mesh workers running, building meshes inline");
        }
        tracing::info!(
            "Mesh pipeline started with {} workers, budget {}",
            handles.len(),
            budget
        );

        Self {
            builder,
            task_sender: (!handles.is_empty()).then_some(task_tx),
            result_sender: result_tx,
            result_receiver: result_rx,
            inline: handles.is_empty(),
            worker_handles: handles,
            budget,
            in_flight,
        }
    }

    /// Whether jobs are built on the calling thread.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.inline
    }

    /// Queue a job. The request is handed back when the budget is exhausted
    /// or the workers are gone.
    pub fn submit(&self, request: MeshBuildRequest) -> Result<(), MeshBuildRequest> {
        let Some(sender) = &self.task_sender else {
            if !self.inline {
                return Err(request);
            }
            let _ = self.result_sender.send(run(&self.builder, request));
            return Ok(());
        };
        if self.in_flight.load(Ordering::Relaxed) >= self.budget {
            return Err(request);
        }
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = sender.send(request) {
            self.in_flight.fetch_sub(1, Ordering::Relaxed);
            return Err(e.into_inner());
        }
        Ok(())
    }

    /// Build on the calling thread, bypassing the queue.
    pub fn build_now(&self, geometry: &QuadGeometry) -> Result<MeshData, MeshBuildError> {
        self.builder.build(geometry)
    }

    /// All results completed since the last call.
    pub fn drain_results(&self) -> Vec<MeshBuildResult> {
        self.result_receiver.try_iter().collect()
    }

    /// Jobs queued or running on workers.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Stop accepting jobs and join the workers.
    pub fn shutdown(&mut self) {
        self.task_sender.take();
        let count = self.worker_handles.len();
        for handle in self.worker_handles.drain(..) {
            let _ = handle.join();
        }
        if count > 0 {
            tracing::debug!("Mesh pipeline shut down ({count} workers joined)");
        }
    }
}

impl Drop for MeshBuildPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge_fan::EdgeConfiguration;
    use quadsphere_config::Config;
    use quadsphere_terrain::TerrainHeight;
    use std::time::{Duration, Instant};

    fn builder(height: f32) -> Arc<MeshBuilder> {
        Arc::new(MeshBuilder::new(&Config::default(), Arc::new(TerrainHeight::Const(height))).unwrap())
    }

    fn request(path: &str, job: u64) -> MeshBuildRequest {
        MeshBuildRequest {
            ticket: MeshJobTicket {
                slot: job as u32,
                generation: 0,
                job,
            },
            geometry: QuadGeometry::new(QuadPath::parse(path).unwrap(), EdgeConfiguration::NONE),
        }
    }

    fn wait_for(pipeline: &MeshBuildPipeline, count: usize) -> Vec<MeshBuildResult> {
        let mut received = Vec::new();
        let start = Instant::now();
        while received.len() < count {
            received.extend(pipeline.drain_results());
            assert!(start.elapsed().as_secs() < 10, "Timed out waiting for mesh results");
            std::thread::sleep(Duration::from_millis(1));
        }
        received
    }

    #[test]
    fn test_submitted_job_produces_mesh() {
        let pipeline = MeshBuildPipeline::new(2, 8, builder(0.0));
        assert!(pipeline.submit(request("0312", 7)).is_ok());

        let results = wait_for(&pipeline, 1);
        assert_eq!(results[0].ticket.job, 7);
        assert_eq!(results[0].path.as_str(), "0312");
        let mesh = results[0].mesh.as_ref().unwrap();
        assert_eq!(mesh.vertex_count(), 1089);
    }

    #[test]
    fn test_concurrent_jobs_keep_their_tickets() {
        let pipeline = MeshBuildPipeline::new(4, 16, builder(0.0));
        let paths = ["01", "21", "03", "13", "02", "12", "0100", "1333"];
        for (job, path) in paths.iter().enumerate() {
            assert!(pipeline.submit(request(path, job as u64)).is_ok());
        }

        let mut received: Vec<(u64, String)> = wait_for(&pipeline, paths.len())
            .into_iter()
            .map(|r| (r.ticket.job, r.path.as_str().to_string()))
            .collect();
        received.sort();
        let expected: Vec<(u64, String)> = paths
            .iter()
            .enumerate()
            .map(|(job, path)| (job as u64, path.to_string()))
            .collect();
        assert_eq!(received, expected);
        assert_eq!(pipeline.in_flight_count(), 0);
    }

    #[test]
    fn test_build_errors_are_returned_not_dropped() {
        let pipeline = MeshBuildPipeline::new(1, 4, builder(f32::INFINITY));
        assert!(pipeline.submit(request("01", 1)).is_ok());
        let results = wait_for(&pipeline, 1);
        assert!(matches!(results[0].mesh, Err(MeshBuildError::NonFinite { .. })));
    }

    #[test]
    fn test_zero_workers_build_inline() {
        let pipeline = MeshBuildPipeline::new(0, 4, builder(0.0));
        assert!(pipeline.is_inline());
        for job in 0..10 {
            assert!(pipeline.submit(request("13", job)).is_ok(), "inline mode has no budget");
        }
        assert_eq!(pipeline.drain_results().len(), 10);
        assert!(pipeline.drain_results().is_empty());
    }

    #[test]
    fn test_budget_limits_active_jobs() {
        let pipeline = MeshBuildPipeline::new(1, 2, builder(0.0));
        let mut submitted = 0;
        let mut rejected = None;
        for job in 0..10 {
            match pipeline.submit(request("0213", job)) {
                Ok(()) => submitted += 1,
                Err(request) => rejected = Some(request.ticket.job),
            }
        }
        assert!(submitted <= 4, "Budget should limit submissions, got {submitted}");
        assert!(rejected.is_some(), "rejected requests are handed back");
    }

    #[test]
    fn test_shutdown_rejects_new_jobs() {
        let mut pipeline = MeshBuildPipeline::new(1, 2, builder(0.0));
        pipeline.shutdown();
        assert!(pipeline.submit(request("01", 0)).is_err());
    }
}
