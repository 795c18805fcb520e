use std::fmt;
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::download::error::DownloadError;
use crate::download::transport::ResourceMetadata;

/// A contiguous byte interval of the remote file. Empty ranges are valid and
/// occur when there are more workers than bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    len: u64,
}

impl ByteRange {
    pub fn from_len(start: u64, len: u64) -> Self {
        Self { start, len }
    }

    /// Inclusive `[start, end]`, as used by the `Range` header.
    pub fn inclusive(start: u64, end: u64) -> Self {
        debug_assert!(end >= start);
        Self { start, len: end - start + 1 }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 最后一个字节的位置，空 range 返回 None
    pub fn end(&self) -> Option<u64> {
        if self.is_empty() {
            None
        } else {
            Some(self.start + self.len - 1)
        }
    }

    /// One past the last byte.
    pub fn end_exclusive(&self) -> u64 {
        self.start + self.len
    }

    pub fn to_range_header(&self) -> Option<headers::Range> {
        let end = self.end()?;
        headers::Range::bytes(self.start..=end).ok()
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end() {
            Some(end) => write!(f, "[{}, {}]", self.start, end),
            None => write!(f, "[{}, empty]", self.start),
        }
    }
}

/// Split `total_size` bytes into `worker_count` contiguous ranges.
///
/// Every range but the last gets `total_size / worker_count` bytes; the last one
/// is pinned to end at `total_size - 1` and absorbs the remainder.
pub fn plan_ranges(total_size: u64, worker_count: NonZeroUsize) -> Vec<ByteRange> {
    let count = worker_count.get() as u64;
    let base = total_size / count;

    (0..count)
        .map(|i| {
            let start = i * base;
            if i == count - 1 {
                ByteRange::from_len(start, total_size - start)
            } else {
                ByteRange::from_len(start, base)
            }
        })
        .collect()
}

/// What one run is going to fetch. Immutable once built.
#[derive(Debug, Clone)]
pub struct DownloadPlan {
    pub url: Url,
    pub total_size: u64,
    pub worker_count: NonZeroUsize,
}

impl DownloadPlan {
    /// Validate the probe result. Nothing is created on disk and no range is
    /// requested when this fails.
    pub fn from_metadata(
        url: Url,
        metadata: &ResourceMetadata,
        worker_count: NonZeroUsize,
    ) -> Result<Self, DownloadError> {
        if !metadata.status.is_success() {
            return Err(DownloadError::MetadataStatus(metadata.status));
        }

        if !metadata.supports_range_requests {
            return Err(DownloadError::RangeUnsupported);
        }

        let raw = metadata.content_length.as_deref().unwrap_or_default();
        let total_size = raw
            .trim()
            .parse::<u64>()
            .map_err(|_| DownloadError::InvalidSize(raw.to_string()))?;

        Ok(Self { url, total_size, worker_count })
    }

    pub fn ranges(&self) -> Vec<ByteRange> {
        plan_ranges(self.total_size, self.worker_count)
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::*;

    fn workers(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn metadata(status: StatusCode, ranges: bool, len: Option<&str>) -> ResourceMetadata {
        ResourceMetadata {
            status,
            supports_range_requests: ranges,
            content_length: len.map(str::to_string),
        }
    }

    #[test]
    fn should_split_evenly() {
        let ranges = plan_ranges(1_000_000, workers(4));
        let bounds: Vec<_> = ranges.iter().map(|r| (r.start, r.end().unwrap())).collect();

        assert_eq!(
            bounds,
            vec![(0, 249_999), (250_000, 499_999), (500_000, 749_999), (750_000, 999_999)]
        );
    }

    #[test]
    fn last_range_takes_remainder() {
        let ranges = plan_ranges(10, workers(3));

        assert_eq!(ranges[0], ByteRange::inclusive(0, 2));
        assert_eq!(ranges[1], ByteRange::inclusive(3, 5));
        assert_eq!(ranges[2], ByteRange::inclusive(6, 9));
    }

    #[test]
    fn more_workers_than_bytes() {
        let ranges = plan_ranges(3, workers(5));

        assert_eq!(ranges.len(), 5);
        assert!(ranges[..4].iter().all(ByteRange::is_empty));
        assert_eq!(ranges[4], ByteRange::inclusive(0, 2));
    }

    #[test]
    fn zero_size_gives_empty_ranges() {
        let ranges = plan_ranges(0, workers(3));

        assert_eq!(ranges.len(), 3);
        assert!(ranges.iter().all(|r| r.is_empty() && r.end().is_none()));
    }

    #[test]
    fn ranges_partition_the_file() {
        for total in 0..64u64 {
            for count in 1..12 {
                let ranges = plan_ranges(total, workers(count));
                assert_eq!(ranges.len(), count);

                let mut next = 0;
                for range in ranges.iter().filter(|r| !r.is_empty()) {
                    assert_eq!(range.start, next, "gap or overlap for {total}/{count}");
                    next = range.end_exclusive();
                }
                assert_eq!(next, total, "coverage for {total}/{count}");
            }
        }
    }

    #[test]
    fn should_build_range_header() {
        let header = ByteRange::inclusive(100, 199).to_range_header().unwrap();
        let mut map = reqwest::header::HeaderMap::new();
        headers::HeaderMapExt::typed_insert(&mut map, header);

        assert_eq!(map.get(reqwest::header::RANGE).unwrap(), "bytes=100-199");
        assert!(ByteRange::from_len(5, 0).to_range_header().is_none());
    }

    #[test]
    fn plan_rejects_bad_metadata() {
        let url = Url::parse("http://localhost/file.bin").unwrap();

        let err = DownloadPlan::from_metadata(url.clone(), &metadata(StatusCode::OK, false, Some("10")), workers(2));
        assert!(matches!(err, Err(DownloadError::RangeUnsupported)));

        let err = DownloadPlan::from_metadata(url.clone(), &metadata(StatusCode::NOT_FOUND, true, Some("10")), workers(2));
        assert!(matches!(err, Err(DownloadError::MetadataStatus(s)) if s == StatusCode::NOT_FOUND));

        let err = DownloadPlan::from_metadata(url.clone(), &metadata(StatusCode::OK, true, Some("-1")), workers(2));
        assert!(matches!(err, Err(DownloadError::InvalidSize(_))));

        let err = DownloadPlan::from_metadata(url.clone(), &metadata(StatusCode::OK, true, None), workers(2));
        assert!(matches!(err, Err(DownloadError::InvalidSize(_))));

        let plan = DownloadPlan::from_metadata(url, &metadata(StatusCode::OK, true, Some("1024")), workers(2)).unwrap();
        assert_eq!(plan.total_size, 1024);
        assert_eq!(plan.ranges().len(), 2);
    }
}
