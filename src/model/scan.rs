//! Scan results and the shared handle the presenter reads them through.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Local};

/// Outcome of one scan cycle.
///
/// `images` is never empty: when no digest attachment was found the
/// placeholder image is stored instead, and `total` stays 0. The cursor is
/// the only mutable part; it belongs to this result and is discarded with it
/// when the next scan replaces the result.
#[derive(Debug)]
pub struct ScanResult {
    letter_count: u32,
    package_count: u32,
    images: Vec<Vec<u8>>,
    total: usize,
    cursor: AtomicUsize,
    scanned_at: Option<DateTime<Local>>,
}

impl ScanResult {
    /// Build a result from a finished scan.
    ///
    /// `fallback` is stored as the only image when `images` is empty.
    pub fn new(
        letter_count: u32,
        package_count: u32,
        mut images: Vec<Vec<u8>>,
        fallback: &[u8],
    ) -> Self {
        let total = images.len();
        if images.is_empty() {
            images.push(fallback.to_vec());
        }
        Self {
            letter_count,
            package_count,
            images,
            total,
            cursor: AtomicUsize::new(0),
            scanned_at: Some(Local::now()),
        }
    }

    /// The state before any scan has completed: zero counts, placeholder image.
    pub fn placeholder(fallback: &[u8]) -> Self {
        Self {
            scanned_at: None,
            ..Self::new(0, 0, Vec::new(), fallback)
        }
    }

    pub fn letter_count(&self) -> u32 {
        self.letter_count
    }

    pub fn package_count(&self) -> u32 {
        self.package_count
    }

    /// Images in presentation order (never empty).
    pub fn images(&self) -> &[Vec<u8>] {
        &self.images
    }

    /// Number of images extracted from mail (0 when only the placeholder is held).
    pub fn total(&self) -> usize {
        self.total
    }

    /// `true` when the placeholder is the only image.
    pub fn is_placeholder(&self) -> bool {
        self.total == 0
    }

    /// Index of the image the next [`ScanResult::advance`] call will return.
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// When the scan finished; `None` for the initial placeholder.
    pub fn scanned_at(&self) -> Option<DateTime<Local>> {
        self.scanned_at
    }

    /// Return the index to serve now and move the cursor to the next image,
    /// wrapping to 0 after the last one.
    pub fn advance(&self) -> usize {
        let len = self.images.len();
        let served = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(if current + 1 >= len { 0 } else { current + 1 })
            })
            .unwrap_or_else(|current| current);
        served.min(len.saturating_sub(1))
    }

    /// Serve the current image and advance the cursor.
    pub fn next_image(&self) -> &[u8] {
        let idx = self.advance();
        &self.images[idx]
    }

    /// Total size of the stored images in bytes.
    pub fn image_bytes(&self) -> u64 {
        self.images.iter().map(|img| img.len() as u64).sum()
    }
}

/// Shared owner of the current [`ScanResult`].
///
/// The scanner swaps in a whole new result; readers work on the snapshot they
/// loaded, so a scan finishing mid-read can never shrink the list under them.
#[derive(Clone)]
pub struct ScanHandle {
    inner: Arc<ArcSwap<ScanResult>>,
}

impl ScanHandle {
    pub fn new(initial: ScanResult) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    /// Current result.
    pub fn snapshot(&self) -> Arc<ScanResult> {
        self.inner.load_full()
    }

    /// Install a new result and return the one it replaced.
    pub fn replace(&self, result: ScanResult) -> Arc<ScanResult> {
        self.inner.swap(Arc::new(result))
    }
}

impl std::fmt::Debug for ScanHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let current = self.snapshot();
        f.debug_struct("ScanHandle")
            .field("letter_count", &current.letter_count())
            .field("package_count", &current.package_count())
            .field("images", &current.images().len())
            .field("cursor", &current.cursor())
            .finish()
    }
}

/// Compact report of a scan cycle, printed by the CLI and logged.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScanSummary {
    pub letters: u32,
    pub packages: u32,
    /// Images extracted from mail (placeholder excluded).
    pub images: usize,
    pub image_bytes: u64,
    pub used_placeholder: bool,
    pub elapsed_ms: u128,
    pub scanned_at: DateTime<Local>,
}

impl ScanSummary {
    pub fn from_result(result: &ScanResult, elapsed: Duration) -> Self {
        Self {
            letters: result.letter_count(),
            packages: result.package_count(),
            images: result.total(),
            image_bytes: if result.is_placeholder() {
                0
            } else {
                result.image_bytes()
            },
            used_placeholder: result.is_placeholder(),
            elapsed_ms: elapsed.as_millis(),
            scanned_at: result.scanned_at().unwrap_or_else(Local::now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FALLBACK: &[u8] = b"fallback";

    fn images(n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| format!("img{i}").into_bytes()).collect()
    }

    #[test]
    fn test_empty_scan_holds_fallback() {
        let result = ScanResult::new(0, 0, Vec::new(), FALLBACK);
        assert_eq!(result.total(), 0);
        assert_eq!(result.images().len(), 1);
        assert!(result.is_placeholder());
        assert_eq!(result.next_image(), FALLBACK);
        assert_eq!(result.next_image(), FALLBACK);
        assert_eq!(result.cursor(), 0);
    }

    #[test]
    fn test_round_robin_order() {
        let result = ScanResult::new(3, 0, images(3), FALLBACK);
        let served: Vec<usize> = (0..7).map(|_| result.advance()).collect();
        assert_eq!(served, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_cursor_stays_in_bounds() {
        let result = ScanResult::new(4, 0, images(4), FALLBACK);
        for _ in 0..50 {
            result.advance();
            assert!(result.cursor() < result.images().len());
        }
    }

    #[test]
    fn test_single_image_repeats() {
        let result = ScanResult::new(1, 0, images(1), FALLBACK);
        assert_eq!(result.next_image(), b"img0");
        assert_eq!(result.next_image(), b"img0");
    }

    #[test]
    fn test_replace_resets_cursor() {
        let handle = ScanHandle::new(ScanResult::new(2, 0, images(2), FALLBACK));
        let first = handle.snapshot();
        first.advance();
        assert_eq!(first.cursor(), 1);

        let previous = handle.replace(ScanResult::new(3, 1, images(3), FALLBACK));
        assert_eq!(previous.letter_count(), 2);
        assert_eq!(handle.snapshot().cursor(), 0);
        assert_eq!(handle.snapshot().package_count(), 1);
        // The old snapshot is still fully readable.
        assert_eq!(first.next_image(), b"img1");
    }

    #[test]
    fn test_placeholder_has_no_timestamp() {
        let result = ScanResult::placeholder(FALLBACK);
        assert!(result.scanned_at().is_none());
        assert_eq!(result.letter_count(), 0);
    }

    #[test]
    fn test_summary_excludes_placeholder_bytes() {
        let result = ScanResult::new(0, 2, Vec::new(), FALLBACK);
        let summary = ScanSummary::from_result(&result, Duration::from_millis(5));
        assert_eq!(summary.image_bytes, 0);
        assert!(summary.used_placeholder);
        assert_eq!(summary.packages, 2);
    }
}
