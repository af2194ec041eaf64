//! Stream size resolution from `Content-Length` and `Content-Range` headers.
//!
//! A malformed numeric header makes the size unknown (`None`) instead of
//! failing the read, and the answer does not depend on which header was seen
//! first.

use tracing::warn;

/// A parsed `Content-Range: bytes first-last/total` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    /// Inclusive first and last byte offsets; `None` for `bytes */total`.
    pub range: Option<(u64, u64)>,
    /// Total document size; `None` for `/*`.
    pub total: Option<u64>,
}

impl ContentRange {
    /// Number of bytes the range covers.
    pub fn len(&self) -> Option<u64> {
        self.range.and_then(|(first, last)| span_len(first, last))
    }

    /// Whether the header covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.range.is_none()
    }
}

/// A header value that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed {header} header: {value:?}")]
pub struct MalformedHeader {
    /// Header name.
    pub header: &'static str,
    /// Offending value.
    pub value: String,
}

fn span_len(first: u64, last: u64) -> Option<u64> {
    last.checked_sub(first)?.checked_add(1)
}

fn malformed(header: &'static str, value: &str) -> MalformedHeader {
    MalformedHeader {
        header,
        value: value.to_owned(),
    }
}

/// Parse a `Content-Length` value.
pub fn parse_content_length(value: &str) -> Result<u64, MalformedHeader> {
    value
        .trim()
        .parse()
        .map_err(|_| malformed("Content-Length", value))
}

/// Parse a `Content-Range` value such as `bytes 0-499/1234` or `bytes */1234`.
pub fn parse_content_range(value: &str) -> Result<ContentRange, MalformedHeader> {
    let bad = || malformed("Content-Range", value);
    let rest = value.trim().strip_prefix("bytes ").ok_or_else(bad)?;
    let (range, total) = rest.split_once('/').ok_or_else(bad)?;

    let total = match total.trim() {
        "*" => None,
        digits => Some(digits.parse::<u64>().map_err(|_| bad())?),
    };
    let range = match range.trim() {
        "*" => None,
        span => {
            let (first, last) = span.split_once('-').ok_or_else(bad)?;
            let first: u64 = first.trim().parse().map_err(|_| bad())?;
            let last: u64 = last.trim().parse().map_err(|_| bad())?;
            if span_len(first, last).is_none() || total.is_some_and(|t| last >= t) {
                return Err(bad());
            }
            Some((first, last))
        }
    };
    if range.is_none() && total.is_none() {
        return Err(bad());
    }
    Ok(ContentRange { range, total })
}

/// Total document size from a `Content-Range` header, `None` if absent,
/// unknown, or malformed.
pub fn document_size(content_range: Option<&str>) -> Option<u64> {
    let header = content_range?;
    match parse_content_range(header) {
        Ok(range) => range.total,
        Err(err) => {
            warn!(%err, "ignoring document size");
            None
        }
    }
}

/// Accumulates the size headers of one response in any order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSize {
    from_length: Option<u64>,
    from_range: Option<u64>,
    poisoned: bool,
}

impl StreamSize {
    /// Nothing observed yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a `Content-Length` value.
    pub fn with_content_length(mut self, value: &str) -> Self {
        match parse_content_length(value) {
            Ok(length) => self.from_length = Some(length),
            Err(err) => self.poison(&err),
        }
        self
    }

    /// Record a `Content-Range` value.
    pub fn with_content_range(mut self, value: &str) -> Self {
        match parse_content_range(value) {
            Ok(range) => self.from_range = range.len(),
            Err(err) => self.poison(&err),
        }
        self
    }

    fn poison(&mut self, err: &MalformedHeader) {
        warn!(%err, "stream size is unset");
        self.poisoned = true;
    }

    /// Number of bytes the response body carries, `None` if unknown.
    ///
    /// When both headers are valid but disagree, the larger value wins.
    pub fn resolve(&self) -> Option<u64> {
        if self.poisoned {
            return None;
        }
        match (self.from_length, self.from_range) {
            (Some(length), Some(range)) if length != range => {
                warn!(length, range, "inconsistent headers, using the larger size");
                Some(length.max(range))
            }
            (length, range) => length.or(range),
        }
    }
}

/// Body length from the optional headers of one response.
pub fn content_length(content_length: Option<&str>, content_range: Option<&str>) -> Option<u64> {
    let mut size = StreamSize::new();
    if let Some(value) = content_length {
        size = size.with_content_length(value);
    }
    if let Some(value) = content_range {
        size = size.with_content_range(value);
    }
    size.resolve()
}
