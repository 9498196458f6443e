//! Background page decoding for comic archives.
//!
//! Every [`ImageLoader::request_page`] bumps a shared generation counter and
//! starts a detached worker thread for that request. Workers check the
//! generation before reading, between read and decode, and after decoding;
//! the control thread commits a result only if its generation is still
//! current. A slow or hung worker for an old page never delays a newer one.

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use folio::{CbzArchive, FolioError};
use folio_render::Viewport;
use image::GrayImage;

use crate::config::LoaderConfig;

/// Random access to encoded page images, shared by decode workers.
pub trait PageImageSource: Send + Sync + 'static {
    fn page_count(&self) -> usize;

    /// Encoded bytes of page `index`.
    fn read_page(&self, index: usize) -> Result<Vec<u8>, FolioError>;
}

impl PageImageSource for CbzArchive {
    fn page_count(&self) -> usize {
        self.len()
    }

    fn read_page(&self, index: usize) -> Result<Vec<u8>, FolioError> {
        CbzArchive::read_page(self, index)
    }
}

impl<S: PageImageSource> PageImageSource for Arc<S> {
    fn page_count(&self) -> usize {
        (**self).page_count()
    }

    fn read_page(&self, index: usize) -> Result<Vec<u8>, FolioError> {
        (**self).read_page(index)
    }
}

/// A decoded, fitted and quantized page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedPage {
    pub index: usize,
    pub image: GrayImage,
}

/// What the loader produced for one page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    Image(DecodedPage),
    /// The page could not be read or decoded.
    NoImage { index: usize, reason: String },
}

impl LoadOutcome {
    pub fn index(&self) -> usize {
        match self {
            Self::Image(page) => page.index,
            Self::NoImage { index, .. } => *index,
        }
    }

    pub fn image(&self) -> Option<&GrayImage> {
        match self {
            Self::Image(page) => Some(&page.image),
            Self::NoImage { .. } => None,
        }
    }
}

/// A worker result tagged with the generation that requested it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadResult {
    pub generation: u64,
    pub outcome: LoadOutcome,
}

#[derive(Clone, Copy, Debug)]
struct LoadRequest {
    generation: u64,
    index: usize,
    canvas: Viewport,
}

/// Sent by every worker when it ends. `outcome` is `None` when the request
/// went stale before a result was ready.
struct Finished {
    generation: u64,
    outcome: Option<LoadOutcome>,
}

/// Generation-counted page decoder driven from the control thread.
///
/// At most [`LoaderConfig::worker_limit`] workers run at once. A request
/// made while all of them are busy waits in a single pending slot, where a
/// newer request replaces it, and starts as soon as any worker reports back.
///
/// Workers are detached. One blocked inside [`PageImageSource::read_page`]
/// keeps its thread and its handle on the source until the read returns,
/// even after the loader is dropped; it then exits without decoding.
pub struct ImageLoader {
    source: Arc<dyn PageImageSource>,
    config: LoaderConfig,
    generation: Arc<AtomicU64>,
    finished_tx: Sender<Finished>,
    finished: Receiver<Finished>,
    running: usize,
    pending: Option<LoadRequest>,
    committed: Option<LoadResult>,
    page_count: usize,
}

impl fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageLoader")
            .field("page_count", &self.page_count)
            .field("generation", &self.current_generation())
            .field("committed", &self.committed_generation())
            .field("running", &self.running)
            .field("pending", &self.pending)
            .finish()
    }
}

impl ImageLoader {
    pub fn new<S: PageImageSource>(source: S, config: LoaderConfig) -> Self {
        let (finished_tx, finished) = mpsc::channel();
        let page_count = source.page_count();
        Self {
            source: Arc::new(source),
            config,
            generation: Arc::new(AtomicU64::new(0)),
            finished_tx,
            finished,
            running: 0,
            pending: None,
            committed: None,
            page_count,
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Supersede any earlier request with page `index` fitted to `canvas`.
    ///
    /// Returns the new generation. Never blocks on a worker.
    pub fn request_page(&mut self, index: usize, canvas: Viewport) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let request = LoadRequest {
            generation,
            index,
            canvas,
        };
        if self.running >= self.config.worker_limit() {
            log::debug!(
                "{} decodes running; page {} waits for a free worker",
                self.running,
                index
            );
            self.pending = Some(request);
        } else {
            self.pending = None;
            self.spawn(request);
        }
        generation
    }

    /// Generation of the newest request.
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Generation of the displayed result, 0 before the first commit.
    pub fn committed_generation(&self) -> u64 {
        self.committed.as_ref().map_or(0, |result| result.generation)
    }

    /// Whether the newest request has not committed yet.
    pub fn is_loading(&self) -> bool {
        self.committed_generation() < self.current_generation()
    }

    /// Workers started and not yet reported back, superseded ones included.
    pub fn in_flight(&self) -> usize {
        self.running
    }

    /// The committed result.
    pub fn current(&self) -> Option<&LoadOutcome> {
        self.committed.as_ref().map(|result| &result.outcome)
    }

    /// Drain finished work without blocking. Returns whether the displayed
    /// result changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(finished) = self.finished.try_recv() {
            changed |= self.finish(finished);
        }
        changed
    }

    /// Block until the newest request commits or `timeout` elapses.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        self.poll();
        while self.is_loading() {
            if self.running == 0 {
                return false;
            }
            let received = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    self.finished.recv_timeout(remaining).ok()
                }
                None => self.finished.recv().ok(),
            };
            let Some(finished) = received else {
                return false;
            };
            self.finish(finished);
        }
        true
    }

    fn spawn(&mut self, request: LoadRequest) {
        let worker = Worker {
            source: Arc::clone(&self.source),
            config: self.config,
            generation: Arc::clone(&self.generation),
            finished: self.finished_tx.clone(),
        };
        let spawned = thread::Builder::new()
            .name(format!("folio-page-{}", request.index))
            .spawn(move || worker.run(request));
        match spawned {
            Ok(_) => self.running += 1,
            Err(err) => {
                log::warn!(
                    "could not start decode worker for page {}: {}",
                    request.index,
                    err
                );
                self.commit(LoadResult {
                    generation: request.generation,
                    outcome: LoadOutcome::NoImage {
                        index: request.index,
                        reason: err.to_string(),
                    },
                });
            }
        }
    }

    fn finish(&mut self, finished: Finished) -> bool {
        self.running = self.running.saturating_sub(1);
        let before = self.committed_generation();
        match finished.outcome {
            Some(outcome) => {
                self.commit(LoadResult {
                    generation: finished.generation,
                    outcome,
                });
            }
            None => log::debug!(
                "worker for superseded generation {} gave up",
                finished.generation
            ),
        }
        if let Some(request) = self.pending.take() {
            self.spawn(request);
        }
        self.committed_generation() != before
    }

    fn commit(&mut self, result: LoadResult) -> bool {
        let current = self.current_generation();
        if result.generation != current || result.generation <= self.committed_generation() {
            log::debug!(
                "discarding page {} from stale generation {} (current {})",
                result.outcome.index(),
                result.generation,
                current
            );
            return false;
        }
        self.committed = Some(result);
        true
    }
}

struct Worker {
    source: Arc<dyn PageImageSource>,
    config: LoaderConfig,
    generation: Arc<AtomicU64>,
    finished: Sender<Finished>,
}

impl Worker {
    fn run(self, request: LoadRequest) {
        let outcome = if self.is_stale(&request) {
            None
        } else {
            self.load(&request)
        };
        let finished = Finished {
            generation: request.generation,
            outcome,
        };
        if self.finished.send(finished).is_err() {
            log::debug!("loader gone before page {} finished", request.index);
        }
    }

    fn is_stale(&self, request: &LoadRequest) -> bool {
        self.generation.load(Ordering::Acquire) != request.generation
    }

    /// `None` when the request went stale before decoding finished.
    fn load(&self, request: &LoadRequest) -> Option<LoadOutcome> {
        let index = request.index;
        let bytes = match self.source.read_page(index) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::warn!("page {} unreadable: {}", index, err);
                return Some(LoadOutcome::NoImage {
                    index,
                    reason: err.to_string(),
                });
            }
        };
        if self.is_stale(request) {
            return None;
        }
        let outcome = match decode_page(&bytes, request.canvas, &self.config) {
            Ok(image) => LoadOutcome::Image(DecodedPage { index, image }),
            Err(err) => {
                log::warn!("page {} failed to decode: {}", index, err);
                LoadOutcome::NoImage {
                    index,
                    reason: err.to_string(),
                }
            }
        };
        if self.is_stale(request) {
            return None;
        }
        Some(outcome)
    }
}

/// Decode `bytes`, shrink to fit `canvas` minus padding, convert to gray
/// and quantize.
///
/// Images already inside the box keep their size.
pub fn decode_page(
    bytes: &[u8],
    canvas: Viewport,
    config: &LoaderConfig,
) -> Result<GrayImage, image::ImageError> {
    let decoded = image::load_from_memory(bytes)?;
    let (max_width, max_height) = config.fit_box(canvas);
    let fitted = if decoded.width() > max_width || decoded.height() > max_height {
        decoded.thumbnail(max_width, max_height)
    } else {
        decoded
    };
    let mut gray = fitted.to_luma8();
    quantize_gray(&mut gray, config.gray_levels);
    Ok(gray)
}

/// Snap every pixel to the nearest of `levels` evenly spaced gray values.
/// Fewer than two levels leaves the image untouched.
pub fn quantize_gray(image: &mut GrayImage, levels: u8) {
    if levels < 2 {
        return;
    }
    let steps = u32::from(levels - 1);
    for pixel in image.pixels_mut() {
        let value = u32::from(pixel.0[0]);
        let level = (value * steps + 127) / 255;
        pixel.0[0] = (level * 255 / steps) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Luma};
    use std::io::Cursor;
    use std::sync::{Condvar, Mutex};

    fn png(width: u32, height: u32, value: u8) -> Vec<u8> {
        let img = GrayImage::from_pixel(width, height, Luma([value]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn config(levels: u8) -> LoaderConfig {
        LoaderConfig {
            gray_levels: levels,
            ..LoaderConfig::default()
        }
    }

    #[test]
    fn quantizes_to_requested_levels() {
        let mut img = GrayImage::from_fn(256, 1, |x, _| Luma([x as u8]));
        quantize_gray(&mut img, 4);
        let mut seen: Vec<u8> = img.pixels().map(|p| p.0[0]).collect();
        seen.dedup();
        assert_eq!(seen, vec![0, 85, 170, 255]);

        let mut untouched = GrayImage::from_pixel(2, 2, Luma([77]));
        quantize_gray(&mut untouched, 0);
        assert_eq!(untouched.get_pixel(0, 0).0[0], 77);
    }

    #[test]
    fn large_pages_shrink_small_pages_keep_size() {
        let canvas = Viewport::new(132, 264);
        let big = decode_page(&png(400, 800, 200), canvas, &config(0)).unwrap();
        assert_eq!(big.dimensions(), (100, 200));

        let small = decode_page(&png(40, 60, 200), canvas, &config(0)).unwrap();
        assert_eq!(small.dimensions(), (40, 60));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(decode_page(b"not an image", Viewport::default(), &config(4)).is_err());
    }

    struct Pages(Vec<Vec<u8>>);

    impl PageImageSource for Pages {
        fn page_count(&self) -> usize {
            self.0.len()
        }

        fn read_page(&self, index: usize) -> Result<Vec<u8>, FolioError> {
            self.0
                .get(index)
                .cloned()
                .ok_or(FolioError::PageOutOfRange {
                    index,
                    count: self.0.len(),
                })
        }
    }

    #[test]
    fn undecodable_page_commits_no_image() {
        let pages = Pages(vec![png(10, 10, 0), b"broken".to_vec()]);
        let mut loader = ImageLoader::new(pages, LoaderConfig::default());

        loader.request_page(1, Viewport::default());
        assert!(loader.wait(Duration::from_secs(5)));
        assert!(matches!(
            loader.current(),
            Some(LoadOutcome::NoImage { index: 1, .. })
        ));

        loader.request_page(7, Viewport::default());
        assert!(loader.wait(Duration::from_secs(5)));
        assert!(loader.current().unwrap().image().is_none());

        loader.request_page(0, Viewport::default());
        assert!(loader.wait(Duration::from_secs(5)));
        assert_eq!(loader.current().unwrap().image().unwrap().dimensions(), (10, 10));
        assert!(!loader.is_loading());
    }

    #[test]
    fn older_generation_never_overwrites_newer() {
        let pages = Pages(vec![png(4, 4, 0); 3]);
        let mut loader = ImageLoader::new(pages, LoaderConfig::default());
        let first = loader.request_page(0, Viewport::default());
        let second = loader.request_page(1, Viewport::default());
        assert!(loader.wait(Duration::from_secs(5)));
        assert_eq!(loader.committed_generation(), second);

        let late = LoadResult {
            generation: first,
            outcome: LoadOutcome::NoImage {
                index: 0,
                reason: String::from("late"),
            },
        };
        assert!(!loader.commit(late));
        assert_eq!(loader.current().unwrap().index(), 1);
    }

    #[test]
    fn unbounded_wait_still_returns_on_commit() {
        let pages = Pages(vec![png(6, 6, 255)]);
        let mut loader = ImageLoader::new(pages, LoaderConfig::default());
        assert!(loader.wait(Duration::MAX));
        assert!(loader.current().is_none());

        loader.request_page(0, Viewport::default());
        assert!(loader.wait(Duration::MAX));
        assert_eq!(loader.current().unwrap().index(), 0);
    }

    /// Pages whose reads block until released.
    struct GatedPages {
        bytes: Vec<u8>,
        count: usize,
        state: Mutex<(Vec<bool>, Vec<usize>)>,
        changed: Condvar,
    }

    impl GatedPages {
        fn release(&self, index: usize) {
            self.state.lock().unwrap().0[index] = true;
            self.changed.notify_all();
        }

        fn wait_for_read(&self, index: usize) {
            let guard = self.state.lock().unwrap();
            let _guard = self
                .changed
                .wait_timeout_while(guard, Duration::from_secs(5), |(_, reads)| {
                    !reads.contains(&index)
                })
                .unwrap();
        }

        fn reads(&self) -> Vec<usize> {
            self.state.lock().unwrap().1.clone()
        }
    }

    impl PageImageSource for GatedPages {
        fn page_count(&self) -> usize {
            self.count
        }

        fn read_page(&self, index: usize) -> Result<Vec<u8>, FolioError> {
            let mut state = self.state.lock().unwrap();
            state.1.push(index);
            self.changed.notify_all();
            let _state = self
                .changed
                .wait_while(state, |(released, _)| !released[index])
                .unwrap();
            Ok(self.bytes.clone())
        }
    }

    fn gated(count: usize) -> Arc<GatedPages> {
        Arc::new(GatedPages {
            bytes: png(8, 8, 128),
            count,
            state: Mutex::new((vec![false; count], Vec::new())),
            changed: Condvar::new(),
        })
    }

    fn drain(loader: &mut ImageLoader) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while loader.in_flight() > 0 && Instant::now() < deadline {
            loader.poll();
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(loader.in_flight(), 0);
    }

    #[test]
    fn newest_page_commits_while_older_reads_hang() {
        let source = gated(3);
        let mut loader = ImageLoader::new(Arc::clone(&source), LoaderConfig::default());

        loader.request_page(0, Viewport::default());
        source.wait_for_read(0);
        loader.request_page(1, Viewport::default());
        let newest = loader.request_page(2, Viewport::default());

        source.release(2);
        assert!(loader.wait(Duration::from_secs(5)));
        assert_eq!(loader.committed_generation(), newest);
        assert_eq!(loader.current().unwrap().index(), 2);

        source.release(0);
        source.release(1);
        drain(&mut loader);
        assert_eq!(loader.committed_generation(), newest);
        assert_eq!(loader.current().unwrap().index(), 2);
        assert!(!loader.is_loading());
    }

    #[test]
    fn busy_workers_hold_only_the_newest_request() {
        let source = gated(3);
        let config = LoaderConfig {
            max_workers: 1,
            ..LoaderConfig::default()
        };
        let mut loader = ImageLoader::new(Arc::clone(&source), config);

        loader.request_page(0, Viewport::default());
        source.wait_for_read(0);
        loader.request_page(1, Viewport::default());
        let newest = loader.request_page(2, Viewport::default());
        assert_eq!(loader.in_flight(), 1);

        source.release(2);
        source.release(0);
        assert!(loader.wait(Duration::from_secs(5)));
        assert_eq!(loader.committed_generation(), newest);
        assert_eq!(loader.current().unwrap().index(), 2);
        drain(&mut loader);
        assert_eq!(source.reads(), vec![0, 2]);
    }
}
