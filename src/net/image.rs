//! Asynchronous image fetcher.
//!
//! Spawns background threads to download images and decode them into RGBA
//! pixel buffers ready for texture upload. Results come back over a
//! channel that the render thread drains once per frame with [`ImageLoader::poll`].

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ImageError;
use crate::item::ResolutionTier;
use crate::render::animator::NodeId;

/// Decoded image data (RGBA).
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    /// URL the pixels were loaded from.
    pub key: String,
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl ImageData {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Fetch + decode one URL. Runs on a loader thread.
pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, url: &str, max_edge: u32) -> Result<ImageData, ImageError>;
}

/// `reqwest` blocking fetcher.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    gateway_retries: u32,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ImageError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("pivot-canvas/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| ImageError::Http(format!("client error: {e}")))?;
        Ok(Self {
            client,
            gateway_retries: 2,
        })
    }

    /// Extra attempts after a 502/503/504 from the image proxy.
    pub fn with_gateway_retries(mut self, retries: u32) -> Self {
        self.gateway_retries = retries;
        self
    }

    fn fetch_once(&self, url: &str, max_edge: u32) -> Result<ImageData, ImageError> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| ImageError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ImageError::Status(status.as_u16()));
        }

        let bytes = resp.bytes().map_err(|e| ImageError::Http(e.to_string()))?;
        decode(url, &bytes, max_edge)
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, url: &str, max_edge: u32) -> Result<ImageData, ImageError> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(url, max_edge) {
                Err(err) if err.is_transient() && attempt < self.gateway_retries => {
                    attempt += 1;
                    log::debug!("{err} for {url}, retry {attempt}");
                }
                other => return other,
            }
        }
    }
}

/// Decode bytes to RGBA, downscaling so neither edge exceeds `max_edge`.
pub fn decode(key: &str, bytes: &[u8], max_edge: u32) -> Result<ImageData, ImageError> {
    let img = image::load_from_memory(bytes).map_err(|e| ImageError::Decode(e.to_string()))?;
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    if w == 0 || h == 0 {
        return Err(ImageError::Corrupt);
    }

    let longest = w.max(h);
    let (w, h, pixels) = if max_edge > 0 && longest > max_edge {
        let ratio = max_edge as f32 / longest as f32;
        let new_w = ((w as f32 * ratio).round() as u32).max(1);
        let new_h = ((h as f32 * ratio).round() as u32).max(1);
        let resized = image::imageops::resize(&rgba, new_w, new_h, image::imageops::FilterType::Triangle);
        let (rw, rh) = resized.dimensions();
        (rw, rh, resized.into_raw())
    } else {
        (w, h, rgba.into_raw())
    };

    Ok(ImageData {
        key: key.to_string(),
        width: w,
        height: h,
        rgba: pixels,
    })
}

/// What a node asked the loader for.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    /// URL actually fetched (may carry a cache-busting parameter).
    pub url: String,
    /// Logical URL used for caching and failure bookkeeping.
    pub key: String,
    pub node: NodeId,
    pub tier: ResolutionTier,
    pub max_edge: u32,
    /// 0 for the first try, 1 for the cache-busted retry.
    pub attempt: u32,
}

/// A finished download, delivered on the render thread. Every request
/// that shared the download is listed in `waiters`.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub url: String,
    pub result: Result<Arc<ImageData>, ImageError>,
    pub waiters: Vec<LoadRequest>,
}

struct Pending {
    rx: mpsc::Receiver<Result<ImageData, ImageError>>,
    waiters: Vec<LoadRequest>,
}

/// Manages background image fetching and decoding.
///
/// Requests for a URL already in flight share the one download.
pub struct ImageLoader {
    fetcher: Arc<dyn ImageFetcher>,
    pending: HashMap<String, Pending>,
}

impl ImageLoader {
    pub fn new(fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            fetcher,
            pending: HashMap::new(),
        }
    }

    /// Request an image to be fetched in the background.
    ///
    /// Returns true when a new download was started.
    pub fn request(&mut self, request: LoadRequest) -> bool {
        if let Some(pending) = self.pending.get_mut(&request.url) {
            pending.waiters.push(request);
            return false;
        }

        let (tx, rx) = mpsc::channel();
        let fetcher = Arc::clone(&self.fetcher);
        let url = request.url.clone();
        let max_edge = request.max_edge;

        std::thread::spawn(move || {
            let result = fetcher.fetch(&url, max_edge);
            let _ = tx.send(result);
        });

        self.pending.insert(
            request.url.clone(),
            Pending {
                rx,
                waiters: vec![request],
            },
        );
        true
    }

    /// Poll for completed downloads. Call every frame.
    pub fn poll(&mut self) -> Vec<LoadOutcome> {
        let mut completed = Vec::new();
        for (url, pending) in &self.pending {
            match pending.rx.try_recv() {
                Ok(result) => completed.push((url.clone(), result.map(Arc::new))),
                Err(mpsc::TryRecvError::Empty) => {}
                Err(mpsc::TryRecvError::Disconnected) => {
                    completed.push((url.clone(), Err(ImageError::Http("loader thread exited".into()))));
                }
            }
        }

        completed
            .into_iter()
            .filter_map(|(url, result)| {
                let pending = self.pending.remove(&url)?;
                Some(LoadOutcome {
                    url,
                    result,
                    waiters: pending.waiters,
                })
            })
            .collect()
    }

    pub fn is_pending(&self, url: &str) -> bool {
        self.pending.contains_key(url)
    }

    /// Number of downloads still running.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
