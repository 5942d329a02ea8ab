//! Fetching raw asset bytes and turning glTF files into scene nodes.
//!
//! [`AssetFetcher`] abstracts where bytes come from: [`FsFetcher`] reads the
//! local asset directory with tokio, [`HttpFetcher`] requests them from the
//! page's origin on the web and [`MemoryFetcher`] serves preloaded blobs.
//! Fetchers may report [`LoadProgress`] while they read.

use std::{
    collections::HashMap,
    io,
    sync::{Arc, RwLock},
};

use futures::channel::mpsc::UnboundedSender;

pub mod gltf_scene;

/// Bytes read so far, out of `total` when the size is known up front.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LoadProgress {
    pub loaded: u64,
    pub total: Option<u64>,
}

impl LoadProgress {
    pub fn percent(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(100.0),
            Some(total) => Some(self.loaded as f64 / total as f64 * 100.0),
            None => None,
        }
    }
}

pub type ProgressSender = UnboundedSender<LoadProgress>;

#[cfg(not(target_arch = "wasm32"))]
pub type FetchFuture = futures::future::BoxFuture<'static, io::Result<Vec<u8>>>;
#[cfg(target_arch = "wasm32")]
pub type FetchFuture = futures::future::LocalBoxFuture<'static, io::Result<Vec<u8>>>;

pub trait AssetFetcher: Send + Sync + 'static {
    /// Start reading `path`. `path` is relative to the fetcher's root; a
    /// leading `/` is allowed and ignored.
    fn fetch(&self, path: &str, progress: Option<ProgressSender>) -> FetchFuture;
}

fn report(progress: &Option<ProgressSender>, loaded: u64, total: Option<u64>) {
    if let Some(tx) = progress {
        // The receiver is gone once the load was cancelled or settled.
        let _ = tx.unbounded_send(LoadProgress { loaded, total });
    }
}

/// Resolve `uri`, as found inside the file at `base`, to a fetcher path.
pub fn resolve_relative(base: &str, uri: &str) -> String {
    match base.rfind('/') {
        Some(idx) => format!("{}{}", &base[..=idx], uri),
        None => uri.to_string(),
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use fs::FsFetcher;

#[cfg(not(target_arch = "wasm32"))]
mod fs {
    use std::{io, path::PathBuf};

    use tokio::io::AsyncReadExt;

    use super::{AssetFetcher, FetchFuture, ProgressSender, report};

    const CHUNK_SIZE: usize = 64 * 1024;

    /// Reads assets below a directory on disk.
    #[derive(Clone, Debug)]
    pub struct FsFetcher {
        root: PathBuf,
    }

    impl FsFetcher {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self { root: root.into() }
        }

        pub fn root(&self) -> &std::path::Path {
            &self.root
        }

        pub fn resolve(&self, path: &str) -> PathBuf {
            self.root.join(path.trim_start_matches('/'))
        }
    }

    impl AssetFetcher for FsFetcher {
        fn fetch(&self, path: &str, progress: Option<ProgressSender>) -> FetchFuture {
            let full = self.resolve(path);
            Box::pin(async move {
                log::debug!("reading {}", full.display());
                let mut file = tokio::fs::File::open(&full).await?;
                let total = file.metadata().await?.len();
                let mut bytes = Vec::with_capacity(total as usize);
                let mut chunk = vec![0u8; CHUNK_SIZE];
                loop {
                    let read = file.read(&mut chunk).await?;
                    if read == 0 {
                        break;
                    }
                    bytes.extend_from_slice(&chunk[..read]);
                    report(&progress, bytes.len() as u64, Some(total));
                }
                if bytes.is_empty() {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("{} is empty", full.display()),
                    ));
                }
                Ok(bytes)
            })
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use http::HttpFetcher;

#[cfg(target_arch = "wasm32")]
mod http {
    use std::io;

    use super::{AssetFetcher, FetchFuture, ProgressSender, report};

    /// Requests assets from `<origin>/assets/` of the hosting page.
    #[derive(Clone, Debug)]
    pub struct HttpFetcher {
        base: String,
    }

    impl HttpFetcher {
        pub fn new(base: impl Into<String>) -> Self {
            let mut base = base.into();
            if !base.ends_with('/') {
                base.push('/');
            }
            Self { base }
        }

        /// `<origin>/assets/` of the current page.
        pub fn from_location() -> io::Result<Self> {
            let origin = web_sys::window()
                .ok_or_else(|| io::Error::other("no window"))?
                .location()
                .origin()
                .map_err(|e| io::Error::other(format!("{:?}", e)))?;
            Ok(Self::new(format!("{}/assets", origin)))
        }

        fn url(&self, path: &str) -> io::Result<reqwest::Url> {
            let base = reqwest::Url::parse(&self.base).map_err(io::Error::other)?;
            base.join(path.trim_start_matches('/'))
                .map_err(io::Error::other)
        }
    }

    impl AssetFetcher for HttpFetcher {
        fn fetch(&self, path: &str, progress: Option<ProgressSender>) -> FetchFuture {
            let url = self.url(path);
            Box::pin(async move {
                let url = url?;
                let response = reqwest::get(url)
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| match e.status() {
                        Some(status) if status.as_u16() == 404 => {
                            io::Error::new(io::ErrorKind::NotFound, e)
                        }
                        _ => io::Error::other(e),
                    })?;
                let total = response.content_length();
                let bytes = response.bytes().await.map_err(io::Error::other)?;
                report(&progress, bytes.len() as u64, total);
                Ok(bytes.to_vec())
            })
        }
    }
}

/// Serves blobs registered up front, keyed by path without the leading `/`.
#[derive(Clone, Debug, Default)]
pub struct MemoryFetcher {
    files: Arc<RwLock<HashMap<String, Arc<Vec<u8>>>>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: &str, bytes: Vec<u8>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(path.trim_start_matches('/').to_string(), Arc::new(bytes));
        }
    }

    pub fn with(self, path: &str, bytes: Vec<u8>) -> Self {
        self.insert(path, bytes);
        self
    }
}

impl AssetFetcher for MemoryFetcher {
    fn fetch(&self, path: &str, progress: Option<ProgressSender>) -> FetchFuture {
        let key = path.trim_start_matches('/');
        let found = self
            .files
            .read()
            .ok()
            .and_then(|files| files.get(key).cloned());
        let path = path.to_string();
        Box::pin(async move {
            let bytes = found.ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path))
            })?;
            let total = bytes.len() as u64;
            let half = total / 2;
            if half > 0 {
                report(&progress, half, Some(total));
            }
            report(&progress, total, Some(total));
            Ok(bytes.as_ref().clone())
        })
    }
}
