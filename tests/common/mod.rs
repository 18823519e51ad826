//! Shared helpers: an in-memory media source whose picture is a pure
//! function of the decode position, plus matching loader and publisher.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use image::{Rgba, RgbaImage};
use loopclip::{
    CancellationToken, DestinationKey, MediaInfo, MediaSource, PreviewError, PublishError,
    Publisher, ResourceLoader,
};

/// Maps a timestamp to a scene id. Equal ids render identical pictures.
pub type Content = Arc<dyn Fn(f64) -> u32 + Send + Sync>;

/// A different picture every millisecond.
pub fn moving() -> Content {
    Arc::new(|timestamp| (timestamp * 1000.0).round() as u32)
}

/// The same picture everywhere.
pub fn still() -> Content {
    Arc::new(|_| 7)
}

/// `count` equal-length held shots over `duration`.
pub fn shots(count: u32, duration: f64) -> Content {
    Arc::new(move |timestamp| ((timestamp / duration * count as f64) as u32).min(count - 1))
}

/// Render a scene id. The id's bytes are spread across the red channel so
/// any sampled window sees all of them.
pub fn render(scene: u32, width: u32, height: u32) -> RgbaImage {
    let bytes = scene.to_le_bytes();
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([bytes[((x + y) % 4) as usize], 40, 80, 255])
    })
}

/// Observations shared between a source and the test.
#[derive(Clone, Default)]
pub struct Probe {
    seeks: Arc<Mutex<Vec<f64>>>,
    captures: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
    opens: Arc<AtomicUsize>,
}

impl Probe {
    pub fn seeks(&self) -> Vec<f64> {
        self.seeks.lock().unwrap().clone()
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

pub struct SyntheticSource {
    info: MediaInfo,
    content: Content,
    position: Option<f64>,
    stall_from: Option<f64>,
    unsettled_from: Option<f64>,
    cancel_after: Option<(usize, CancellationToken)>,
    probe: Probe,
}

impl SyntheticSource {
    pub fn new(duration: f64, content: Content) -> Self {
        Self {
            info: MediaInfo {
                duration,
                width: 1280,
                height: 720,
            },
            content,
            position: None,
            stall_from: None,
            unsettled_from: None,
            cancel_after: None,
            probe: Probe::default(),
        }
    }

    /// Seeks at or past `timestamp` never settle.
    pub fn with_stall_from(mut self, timestamp: f64) -> Self {
        self.stall_from = Some(timestamp);
        self
    }

    /// Seeks at or past `timestamp` return without a decodable picture.
    pub fn with_unsettled_from(mut self, timestamp: f64) -> Self {
        self.unsettled_from = Some(timestamp);
        self
    }

    /// Cancel `token` once `seeks` seeks have completed.
    pub fn with_cancel_after(mut self, seeks: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((seeks, token));
        self
    }

    pub fn with_probe(mut self, probe: Probe) -> Self {
        self.probe = probe;
        self
    }

    pub fn probe(&self) -> Probe {
        self.probe.clone()
    }
}

impl MediaSource for SyntheticSource {
    fn info(&self) -> &MediaInfo {
        &self.info
    }

    fn seek_to(&mut self, timestamp: f64, timeout: Duration) -> Result<(), PreviewError> {
        let seeks = {
            let mut seeks = self.probe.seeks.lock().unwrap();
            seeks.push(timestamp);
            seeks.len()
        };
        self.position = None;
        if self.stall_from.is_some_and(|from| timestamp >= from) {
            return Err(PreviewError::SeekTimeout { timestamp, timeout });
        }
        if self.unsettled_from.is_some_and(|from| timestamp >= from) {
            return Ok(());
        }
        self.position = Some(timestamp);
        if let Some((after, token)) = &self.cancel_after {
            if seeks >= *after {
                token.cancel();
            }
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.position.is_some()
    }

    fn capture(&mut self, width: u32, height: u32) -> Result<RgbaImage, PreviewError> {
        let position = self
            .position
            .ok_or_else(|| PreviewError::VideoDecode("not settled".to_string()))?;
        self.probe.captures.fetch_add(1, Ordering::SeqCst);
        Ok(render((self.content)(position), width, height))
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.probe.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Opens [`SyntheticSource`]s, or fails every open when `missing`.
#[derive(Clone)]
pub struct SyntheticLoader {
    duration: f64,
    content: Content,
    missing: bool,
    stall_from: Option<f64>,
    probe: Probe,
}

impl SyntheticLoader {
    pub fn new(duration: f64, content: Content) -> Self {
        Self {
            duration,
            content,
            missing: false,
            stall_from: None,
            probe: Probe::default(),
        }
    }

    pub fn missing() -> Self {
        Self {
            missing: true,
            ..Self::new(1.0, still())
        }
    }

    pub fn with_stall_from(mut self, timestamp: f64) -> Self {
        self.stall_from = Some(timestamp);
        self
    }

    pub fn probe(&self) -> Probe {
        self.probe.clone()
    }
}

impl ResourceLoader for SyntheticLoader {
    type Source = SyntheticSource;

    fn open(&self, locator: &str, _timeout: Duration) -> Result<SyntheticSource, PreviewError> {
        self.probe.opens.fetch_add(1, Ordering::SeqCst);
        if self.missing {
            return Err(PreviewError::VideoLoad {
                locator: locator.to_string(),
                reason: "no such resource".to_string(),
            });
        }
        let mut source = SyntheticSource::new(self.duration, Arc::clone(&self.content))
            .with_probe(self.probe.clone());
        if let Some(from) = self.stall_from {
            source = source.with_stall_from(from);
        }
        Ok(source)
    }
}

/// Keeps published payloads in memory and returns `mem://{key}` URLs.
#[derive(Default)]
pub struct MemoryPublisher {
    stored: Mutex<HashMap<String, Vec<u8>>>,
    reject: bool,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.stored.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.stored.lock().unwrap().len()
    }
}

impl Publisher for MemoryPublisher {
    fn publish(&self, payload: &[u8], key: &DestinationKey) -> Result<String, PublishError> {
        if self.reject {
            return Err(PublishError::Rejected {
                key: key.to_string(),
                reason: "quota exceeded".to_string(),
            });
        }
        self.stored
            .lock()
            .unwrap()
            .insert(key.to_string(), payload.to_vec());
        Ok(format!("mem://{key}"))
    }
}
