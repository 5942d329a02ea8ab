#![allow(dead_code)]

use std::{
    io,
    sync::{Arc, Mutex},
};

use scene_showcase::{
    camera::Camera,
    data_structures::scene_graph::Scene,
    frame::SceneRenderer,
    readiness::Feature,
    resources::{AssetFetcher, FetchFuture, ProgressSender},
    ui::ChecklistView,
};

/// Everything a [`RecordingView`] was told, shared with the test.
#[derive(Debug, Default)]
pub struct ViewLog {
    pub entries: Vec<(Feature, Option<bool>)>,
    pub errors: Vec<String>,
    pub spin_labels: Vec<String>,
}

pub struct RecordingView(pub Arc<Mutex<ViewLog>>);

impl RecordingView {
    pub fn new() -> (Box<Self>, Arc<Mutex<ViewLog>>) {
        let log = Arc::new(Mutex::new(ViewLog::default()));
        (Box::new(Self(log.clone())), log)
    }
}

impl ChecklistView for RecordingView {
    fn on_entry(&mut self, feature: Feature, ready: Option<bool>) {
        self.0.lock().unwrap().entries.push((feature, ready));
    }

    fn on_error(&mut self, message: &str) {
        self.0.lock().unwrap().errors.push(message.to_string());
    }

    fn on_spin_label(&mut self, label: &str) {
        self.0.lock().unwrap().spin_labels.push(label.to_string());
    }
}

/// Counts draws and remembers the last size, like a surface would.
pub struct CountingRenderer {
    pub draws: usize,
    pub size: (u32, u32),
}

impl CountingRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            draws: 0,
            size: (width, height),
        }
    }
}

impl SceneRenderer for CountingRenderer {
    type Error = std::convert::Infallible;

    fn draw(&mut self, _scene: &Scene, _camera: &Camera) -> Result<(), Self::Error> {
        self.draws += 1;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> bool {
        let changed = self.size != (width, height);
        self.size = (width, height);
        changed
    }
}

/// A fetcher whose reads never finish.
pub struct PendingFetcher;

impl AssetFetcher for PendingFetcher {
    fn fetch(&self, _path: &str, _progress: Option<ProgressSender>) -> FetchFuture {
        Box::pin(futures::future::pending::<io::Result<Vec<u8>>>())
    }
}

/// A fetcher that panics inside the loading task.
pub struct PanickingFetcher;

impl AssetFetcher for PanickingFetcher {
    fn fetch(&self, path: &str, _progress: Option<ProgressSender>) -> FetchFuture {
        let path = path.to_string();
        Box::pin(async move { panic!("fetcher blew up on {}", path) })
    }
}

/// A single triangle, one unit in size, as raw little endian floats.
pub fn triangle_positions() -> Vec<u8> {
    [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
        .iter()
        .flatten()
        .flat_map(|f| f.to_le_bytes())
        .collect()
}

/// glTF JSON for one node holding the triangle. `uri` points the buffer at an
/// external file; without it the buffer is the binary chunk.
pub fn triangle_json(uri: Option<&str>) -> String {
    let buffer = match uri {
        Some(uri) => format!(r#"{{ "uri": "{}", "byteLength": 36 }}"#, uri),
        None => r#"{ "byteLength": 36 }"#.to_string(),
    };
    format!(
        r#"{{
            "asset": {{ "version": "2.0" }},
            "scene": 0,
            "scenes": [{{ "nodes": [0] }}],
            "nodes": [{{ "name": "triangle", "mesh": 0 }}],
            "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0 }} }}] }}],
            "buffers": [{}],
            "bufferViews": [{{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }}],
            "accessors": [{{
                "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
            }}]
        }}"#,
        buffer
    )
}

/// Pack `json` and an optional binary chunk into a GLB container.
pub fn glb(json: &str, bin: Option<&[u8]>) -> Vec<u8> {
    let mut json = json.as_bytes().to_vec();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin = bin.map(<[u8]>::to_vec);
    if let Some(bin) = bin.as_mut() {
        while bin.len() % 4 != 0 {
            bin.push(0);
        }
    }
    let total = 12 + 8 + json.len() + bin.as_ref().map_or(0, |bin| 8 + bin.len());

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(b"JSON");
    out.extend_from_slice(&json);
    if let Some(bin) = bin {
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(b"BIN\0");
        out.extend_from_slice(&bin);
    }
    out
}

pub fn assets_dir() -> std::path::PathBuf {
    std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets")
}
