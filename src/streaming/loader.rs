//! Async mesh loading with priority-based concurrent fetches

use std::collections::HashSet;
use std::path::PathBuf;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

use crate::assets::mesh_blob::fetch_mesh;
use crate::assets::MeshData;

/// Identifies one (part, detail) level
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LevelKey {
    pub part: String,
    pub detail: u32,
}

impl LevelKey {
    pub fn new(part: impl Into<String>, detail: u32) -> Self {
        Self { part: part.into(), detail }
    }
}

/// Request to load one level's mesh
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub key: LevelKey,
    pub path: PathBuf,
    pub priority: f32,
}

/// Result of a mesh load operation
#[derive(Debug)]
pub enum MeshLoadResult {
    /// Successfully fetched and decoded
    Loaded { key: LevelKey, mesh: MeshData },
    /// No file for this level (normal for probed buckets)
    NotFound { key: LevelKey },
    /// Timeout or decode failure for this one resource
    Failed { key: LevelKey, error: String },
}

impl MeshLoadResult {
    pub fn key(&self) -> &LevelKey {
        match self {
            MeshLoadResult::Loaded { key, .. } => key,
            MeshLoadResult::NotFound { key } => key,
            MeshLoadResult::Failed { key, .. } => key,
        }
    }
}

/// Concurrent mesh loader with async I/O
pub struct MeshLoader {
    /// Channel for sending load requests to the worker task
    request_tx: mpsc::UnboundedSender<LoadRequest>,
    /// Channel for receiving load results
    result_rx: mpsc::UnboundedReceiver<MeshLoadResult>,
    /// Levels currently being loaded
    pending: HashSet<LevelKey>,
    /// Dedicated runtime (None when using the caller's runtime)
    #[allow(dead_code)]
    runtime: Option<Runtime>,
}

impl MeshLoader {
    /// Create a new loader with its own tokio runtime
    ///
    /// # Arguments
    /// * `max_concurrent` - Maximum number of concurrent fetches
    pub fn new(max_concurrent: usize) -> Self {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<LoadRequest>();
        let (result_tx, result_rx) = mpsc::unbounded_channel::<MeshLoadResult>();

        let runtime = Runtime::new().expect("Failed to create tokio runtime");

        runtime.spawn(async move {
            Self::worker_loop(max_concurrent, &mut request_rx, result_tx).await;
        });

        Self {
            request_tx,
            result_rx,
            pending: HashSet::new(),
            runtime: Some(runtime),
        }
    }

    /// Create a loader on the current tokio runtime.
    ///
    /// Panics if called outside a tokio runtime context.
    pub fn new_with_current_runtime(max_concurrent: usize) -> Self {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<LoadRequest>();
        let (result_tx, result_rx) = mpsc::unbounded_channel::<MeshLoadResult>();

        tokio::spawn(async move {
            Self::worker_loop(max_concurrent, &mut request_rx, result_tx).await;
        });

        Self {
            request_tx,
            result_rx,
            pending: HashSet::new(),
            runtime: None,
        }
    }

    /// Worker loop that processes load requests with concurrency control
    async fn worker_loop(
        max_concurrent: usize,
        request_rx: &mut mpsc::UnboundedReceiver<LoadRequest>,
        result_tx: mpsc::UnboundedSender<MeshLoadResult>,
    ) {
        use tokio::task::JoinSet;

        let mut active_tasks = JoinSet::new();
        let mut pending_requests: Vec<LoadRequest> = Vec::new();

        loop {
            tokio::select! {
                Some(request) = request_rx.recv() => {
                    pending_requests.push(request);
                }

                Some(result) = active_tasks.join_next(), if !active_tasks.is_empty() => {
                    match result {
                        Ok(load_result) => {
                            let _ = result_tx.send(load_result);
                        }
                        Err(e) => {
                            log::error!("mesh loader task panicked: {}", e);
                        }
                    }
                }

                else => {
                    if pending_requests.is_empty() && active_tasks.is_empty() {
                        break;
                    }
                }
            }

            // Start new tasks if we have capacity and pending requests
            while active_tasks.len() < max_concurrent && !pending_requests.is_empty() {
                pending_requests.sort_by(|a, b| {
                    b.priority.partial_cmp(&a.priority).unwrap_or(std::cmp::Ordering::Equal)
                });
                let request = pending_requests.remove(0);

                active_tasks.spawn(async move {
                    Self::load_task(request.key, request.path).await
                });
            }
        }
    }

    /// Task that fetches a single level's mesh
    async fn load_task(key: LevelKey, path: PathBuf) -> MeshLoadResult {
        match fetch_mesh(&path).await {
            Ok(Some(mesh)) => MeshLoadResult::Loaded { key, mesh },
            Ok(None) => MeshLoadResult::NotFound { key },
            Err(e) => MeshLoadResult::Failed { key, error: e.to_string() },
        }
    }

    /// Request a level to be loaded.
    ///
    /// Returns `false` if the level is already pending, `true` if queued.
    /// Lower detail percentages should be given higher priority so coarse
    /// levels land first and every part gets something on screen quickly.
    pub fn request(&mut self, key: LevelKey, path: PathBuf, priority: f32) -> bool {
        if self.pending.contains(&key) {
            return false;
        }

        self.pending.insert(key.clone());

        let request = LoadRequest { key, path, priority };
        self.request_tx.send(request).expect("Loader worker died");

        true
    }

    /// Poll for completed load results (non-blocking)
    ///
    /// Returns all currently available results.
    pub fn poll_results(&mut self) -> Vec<MeshLoadResult> {
        let mut results = Vec::new();

        while let Ok(result) = self.result_rx.try_recv() {
            self.pending.remove(result.key());
            results.push(result);
        }

        results
    }

    /// Number of pending load requests
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Check if a specific level is currently pending
    pub fn is_pending(&self, key: &LevelKey) -> bool {
        self.pending.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::mesh_blob::save_mesh;
    use std::time::Duration;

    #[test]
    fn test_pending_tracking() {
        let mut loader = MeshLoader::new(4);

        let key = LevelKey::new("rotor", 100);

        assert!(loader.request(key.clone(), PathBuf::from("/nonexistent/rotor_100.msh"), 1.0));
        assert_eq!(loader.pending_count(), 1);
        assert!(loader.is_pending(&key));

        // Second request for the same level is dropped
        assert!(!loader.request(key.clone(), PathBuf::from("/nonexistent/rotor_100.msh"), 2.0));
        assert_eq!(loader.pending_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_load_missing_level_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = MeshLoader::new_with_current_runtime(4);

        let key = LevelKey::new("rotor", 50);
        loader.request(key.clone(), dir.path().join("rotor_50.msh"), 1.0);

        let results = wait_for_results(&mut loader, 1).await;
        assert!(matches!(&results[0], MeshLoadResult::NotFound { key: k } if *k == key));
        assert_eq!(loader.pending_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_load_existing_level() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rotor_100.msh");

        let mesh = MeshData {
            positions: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            normals: vec![[0.0, 0.0, 1.0]; 3],
            indices: vec![0, 1, 2],
        };
        save_mesh(&path, &mesh).await.unwrap();

        let mut loader = MeshLoader::new_with_current_runtime(4);
        let key = LevelKey::new("rotor", 100);
        loader.request(key.clone(), path, 1.0);

        let results = wait_for_results(&mut loader, 1).await;
        match &results[0] {
            MeshLoadResult::Loaded { key: k, mesh } => {
                assert_eq!(*k, key);
                assert_eq!(mesh.triangle_count(), 1);
            }
            other => panic!("expected Loaded, got {:?}", other),
        }
    }

    async fn wait_for_results(loader: &mut MeshLoader, count: usize) -> Vec<MeshLoadResult> {
        let mut results = Vec::new();
        for _ in 0..200 {
            results.extend(loader.poll_results());
            if results.len() >= count {
                return results;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("loader produced {} of {} expected results", results.len(), count);
    }
}
