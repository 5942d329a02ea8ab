//! Asynchronous model loading.
//!
//! [`AssetLoader::start`] spawns a fetch-and-parse task and returns a
//! [`LoadHandle`] straight away. The task reports [`LoadProgress`] on an
//! unbounded channel and its single [`LoadOutcome`] on a oneshot. The progress
//! sender is dropped before the outcome is sent, so draining the handle always
//! yields every progress event before the terminal one and nothing after it.

use std::{io, sync::Arc};

use cgmath::Vector3;
use futures::{
    StreamExt,
    channel::{
        mpsc::{self, TryRecvError},
        oneshot,
    },
    future::{AbortHandle, Abortable},
};
use instant::{Duration, Instant};

use crate::{
    config::Placement,
    data_structures::scene_graph::{NodeId, Scene, SceneNode},
    readiness::{Feature, ReadinessTracker},
    resources::{AssetFetcher, LoadProgress, ProgressSender, gltf_scene::load_model_gltf},
};

#[derive(Debug, thiserror::Error)]
pub enum AssetLoadError {
    #[error("could not fetch {path}: {source}")]
    Fetch { path: String, source: io::Error },
    #[error("could not parse {path}: {source}")]
    Parse { path: String, source: gltf::Error },
    #[error("{path} references {uri}, only relative URIs and the binary chunk are supported")]
    UnsupportedUri { path: String, uri: String },
    #[error("could not decode image {path}: {source}")]
    Image {
        path: String,
        source: image::ImageError,
    },
    #[error("{path} is malformed: {reason}")]
    Malformed { path: String, reason: String },
    #[error("loading {path} stopped without a result")]
    Aborted { path: String },
}

impl AssetLoadError {
    /// The resource that failed, which is not necessarily the requested model.
    pub fn path(&self) -> &str {
        match self {
            AssetLoadError::Fetch { path, .. }
            | AssetLoadError::Parse { path, .. }
            | AssetLoadError::UnsupportedUri { path, .. }
            | AssetLoadError::Image { path, .. }
            | AssetLoadError::Malformed { path, .. }
            | AssetLoadError::Aborted { path } => path,
        }
    }
}

#[derive(Debug)]
pub struct LoadedAsset {
    pub path: String,
    pub root: SceneNode,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(LoadedAsset),
    Failed { path: String, error: AssetLoadError },
}

#[derive(Debug)]
pub enum LoaderEvent {
    Progress(LoadProgress),
    Finished(LoadOutcome),
}

#[cfg(not(target_arch = "wasm32"))]
type Notify = Arc<dyn Fn() + Send + Sync>;
#[cfg(target_arch = "wasm32")]
type Notify = Arc<dyn Fn()>;

pub struct AssetLoader {
    fetcher: Arc<dyn AssetFetcher>,
    #[cfg(not(target_arch = "wasm32"))]
    runtime: tokio::runtime::Handle,
    notify: Option<Notify>,
}

impl AssetLoader {
    #[cfg(not(target_arch = "wasm32"))]
    pub fn new(fetcher: Arc<dyn AssetFetcher>, runtime: tokio::runtime::Handle) -> Self {
        Self {
            fetcher,
            runtime,
            notify: None,
        }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn new(fetcher: Arc<dyn AssetFetcher>) -> Self {
        Self {
            fetcher,
            notify: None,
        }
    }

    /// Called from the loading task right after the outcome was sent, e.g. to
    /// wake the event loop.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn on_settled(mut self, notify: impl Fn() + Send + Sync + 'static) -> Self {
        self.notify = Some(Arc::new(notify));
        self
    }

    #[cfg(target_arch = "wasm32")]
    pub fn on_settled(mut self, notify: impl Fn() + 'static) -> Self {
        self.notify = Some(Arc::new(notify));
        self
    }

    pub fn start(&self, path: &str) -> LoadHandle {
        let (progress_tx, progress_rx) = mpsc::unbounded();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (abort, registration) = AbortHandle::new_pair();

        let fetcher = self.fetcher.clone();
        let notify = self.notify.clone();
        let requested = path.to_string();
        let task = async move {
            let started = Instant::now();
            let outcome = match fetch_and_parse(&requested, fetcher.as_ref(), progress_tx).await {
                Ok(root) => LoadOutcome::Loaded(LoadedAsset {
                    path: requested,
                    root,
                    elapsed: started.elapsed(),
                }),
                Err(error) => LoadOutcome::Failed {
                    path: requested,
                    error,
                },
            };
            if outcome_tx.send(outcome).is_ok() {
                if let Some(notify) = notify {
                    notify();
                }
            }
        };
        let task = Abortable::new(task, registration);

        log::debug!("loading {}", path);
        #[cfg(not(target_arch = "wasm32"))]
        self.runtime.spawn(task);
        #[cfg(target_arch = "wasm32")]
        wasm_bindgen_futures::spawn_local(async move {
            let _ = task.await;
        });

        LoadHandle {
            path: path.to_string(),
            progress: progress_rx,
            outcome: outcome_rx,
            abort,
            finished: false,
            cancelled: false,
        }
    }
}

async fn fetch_and_parse(
    path: &str,
    fetcher: &dyn AssetFetcher,
    progress: ProgressSender,
) -> Result<SceneNode, AssetLoadError> {
    let bytes = fetcher
        .fetch(path, Some(progress))
        .await
        .map_err(|source| AssetLoadError::Fetch {
            path: path.to_string(),
            source,
        })?;
    load_model_gltf(path, &bytes, fetcher).await
}

/// The caller's end of one load. Dropping it cancels the load.
#[derive(Debug)]
pub struct LoadHandle {
    path: String,
    progress: mpsc::UnboundedReceiver<LoadProgress>,
    outcome: oneshot::Receiver<LoadOutcome>,
    abort: AbortHandle,
    finished: bool,
    cancelled: bool,
}

impl LoadHandle {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// True once the outcome was handed out or the load was cancelled.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn drain_progress(&mut self, events: &mut Vec<LoaderEvent>) {
        loop {
            match self.progress.try_recv() {
                Ok(progress) => events.push(LoaderEvent::Progress(progress)),
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }

    /// The outcome for a task that ended without sending one, e.g. a panic.
    fn aborted(&self) -> LoadOutcome {
        log::warn!("load task for {} ended without an outcome", self.path);
        LoadOutcome::Failed {
            path: self.path.clone(),
            error: AssetLoadError::Aborted {
                path: self.path.clone(),
            },
        }
    }

    /// Everything that happened since the last poll, without blocking.
    pub fn poll(&mut self) -> Vec<LoaderEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }
        self.drain_progress(&mut events);
        match self.outcome.try_recv() {
            Ok(Some(outcome)) => {
                self.drain_progress(&mut events);
                events.push(LoaderEvent::Finished(outcome));
                self.finished = true;
            }
            Ok(None) => {}
            Err(oneshot::Canceled) => {
                self.drain_progress(&mut events);
                events.push(LoaderEvent::Finished(self.aborted()));
                self.finished = true;
            }
        }
        events
    }

    /// Wait for the load to settle and return the remaining events.
    pub async fn wait(&mut self) -> Vec<LoaderEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }
        while let Some(progress) = self.progress.next().await {
            events.push(LoaderEvent::Progress(progress));
        }
        let outcome = match (&mut self.outcome).await {
            Ok(outcome) => outcome,
            Err(oneshot::Canceled) => self.aborted(),
        };
        events.push(LoaderEvent::Finished(outcome));
        self.finished = true;
        events
    }

    /// Abort the task. No outcome is produced afterwards.
    pub fn cancel(&mut self) {
        if !self.finished {
            log::debug!("cancelling load of {}", self.path);
        }
        self.abort.abort();
        self.cancelled = true;
        self.finished = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl Drop for LoadHandle {
    fn drop(&mut self) {
        self.abort.abort();
    }
}

/// The message shown in the feature list when `path` failed to load.
pub fn load_error_message(path: &str) -> String {
    format!(
        "Model Loading Error: Could not load {}. Make sure it's in the assets folder and the path is correct.",
        path
    )
}

/// Apply a terminal outcome to the scene and the tracker. Returns the node the
/// asset was attached as.
pub fn apply_outcome(
    outcome: LoadOutcome,
    scene: &mut Scene,
    readiness: &mut ReadinessTracker,
    placement: &Placement,
) -> Option<NodeId> {
    match outcome {
        LoadOutcome::Loaded(asset) => {
            let mut root = asset.root;
            root.transform.position = placement.position;
            root.transform.scale = Vector3::new(placement.scale, placement.scale, placement.scale);
            root.enable_shadows();
            let id = scene.add(root);
            readiness.set(Feature::Loader, true);
            log::info!("model loaded: {} in {:?}", asset.path, asset.elapsed);
            Some(id)
        }
        LoadOutcome::Failed { path, error } => {
            log::error!("error loading model {}: {}", path, error);
            readiness.push_error(load_error_message(&path));
            readiness.set(Feature::Loader, false);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> (
        LoadHandle,
        mpsc::UnboundedSender<LoadProgress>,
        oneshot::Sender<LoadOutcome>,
    ) {
        let (progress_tx, progress) = mpsc::unbounded();
        let (outcome_tx, outcome) = oneshot::channel();
        let (abort, _registration) = AbortHandle::new_pair();
        let handle = LoadHandle {
            path: "/myModel.glb".to_string(),
            progress,
            outcome,
            abort,
            finished: false,
            cancelled: false,
        };
        (handle, progress_tx, outcome_tx)
    }

    fn failed() -> LoadOutcome {
        LoadOutcome::Failed {
            path: "/myModel.glb".to_string(),
            error: AssetLoadError::Malformed {
                path: "/myModel.glb".to_string(),
                reason: "test".to_string(),
            },
        }
    }

    fn progress(loaded: u64) -> LoadProgress {
        LoadProgress {
            loaded,
            total: Some(10),
        }
    }

    #[test]
    fn pending_load_yields_only_progress() {
        let (mut handle, progress_tx, _outcome_tx) = handle();
        progress_tx.unbounded_send(progress(3)).unwrap();

        let events = handle.poll();

        assert!(matches!(events[..], [LoaderEvent::Progress(p)] if p.loaded == 3));
        assert!(!handle.is_finished());
        assert!(handle.poll().is_empty());
    }

    #[test]
    fn progress_is_drained_before_the_outcome() {
        let (mut handle, progress_tx, outcome_tx) = handle();
        progress_tx.unbounded_send(progress(5)).unwrap();
        progress_tx.unbounded_send(progress(10)).unwrap();
        drop(progress_tx);
        outcome_tx.send(failed()).unwrap();

        let events = handle.poll();

        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], LoaderEvent::Progress(_)));
        assert!(matches!(events[1], LoaderEvent::Progress(_)));
        assert!(matches!(events[2], LoaderEvent::Finished(_)));
        assert!(handle.is_finished());
    }

    #[test]
    fn nothing_is_reported_after_the_outcome() {
        let (mut handle, progress_tx, outcome_tx) = handle();
        outcome_tx.send(failed()).unwrap();
        assert_eq!(handle.poll().len(), 1);

        // A straggler sent after the terminal event is never surfaced.
        let _ = progress_tx.unbounded_send(progress(10));

        assert!(handle.poll().is_empty());
    }

    #[test]
    fn cancelled_load_reports_nothing() {
        let (mut handle, progress_tx, outcome_tx) = handle();
        handle.cancel();
        let _ = progress_tx.unbounded_send(progress(1));
        let _ = outcome_tx.send(failed());

        assert!(handle.poll().is_empty());
        assert!(handle.is_finished());
        assert!(handle.is_cancelled());
    }

    #[test]
    fn vanished_task_is_reported_as_aborted() {
        let (mut handle, progress_tx, outcome_tx) = handle();
        progress_tx.unbounded_send(progress(4)).unwrap();
        drop(progress_tx);
        drop(outcome_tx);

        let events = handle.poll();

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], LoaderEvent::Progress(_)));
        match &events[1] {
            LoaderEvent::Finished(LoadOutcome::Failed { path, error }) => {
                assert_eq!(path, "/myModel.glb");
                assert!(matches!(error, AssetLoadError::Aborted { .. }));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(handle.is_finished());
        assert!(!handle.is_cancelled());
        assert!(handle.poll().is_empty());
    }

    #[test]
    fn vanished_task_is_reported_when_waiting() {
        let (mut handle, progress_tx, outcome_tx) = handle();
        drop(progress_tx);
        drop(outcome_tx);

        let events = futures::executor::block_on(handle.wait());

        assert!(matches!(
            events[..],
            [LoaderEvent::Finished(LoadOutcome::Failed {
                error: AssetLoadError::Aborted { .. },
                ..
            })]
        ));
    }

    #[test]
    fn error_message_names_the_path() {
        let message = load_error_message("/missing.glb");
        assert!(message.starts_with("Model Loading Error"));
        assert!(message.contains("/missing.glb"));
    }

    #[test]
    fn errors_expose_the_failing_resource() {
        let error = AssetLoadError::Fetch {
            path: "/missing.glb".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(error.path(), "/missing.glb");
        assert!(error.to_string().contains("gone"));
        assert!(std::error::Error::source(&error).is_some());
    }
}
