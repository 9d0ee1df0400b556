//! Resolution of `Range` request headers against a known resource length.

use thiserror::Error;

/// An inclusive byte interval `[start, end]` with `start <= end < total size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RangeError {
    #[error("malformed range header '{0}'")]
    Malformed(String),
    #[error("range not satisfiable for length {0}")]
    Unsatisfiable(u64),
}

/// Resolves an optional `Range` header value against `total_size`.
///
/// `Ok(None)` means no range was requested and the full body should be sent.
/// Only the first range of a multi-range request is honoured. An `end` past the
/// last byte is clamped; a `start` at or past the end of the resource, or after
/// `end`, is unsatisfiable.
pub fn resolve(header: Option<&str>, total_size: u64) -> Result<Option<ByteRange>, RangeError> {
    let Some(header) = header else {
        return Ok(None);
    };
    let malformed = || RangeError::Malformed(header.to_string());

    let spec = header
        .trim()
        .strip_prefix("bytes=")
        .ok_or_else(malformed)?;
    let first = spec.split(',').next().unwrap_or_default().trim();
    let (start, end) = first.split_once('-').ok_or_else(malformed)?;
    let (start, end) = (start.trim(), end.trim());

    let parse = |token: &str| token.parse::<u64>().map_err(|_| malformed());

    let range = match (start.is_empty(), end.is_empty()) {
        (true, true) => return Err(malformed()),
        (true, false) => {
            let suffix = parse(end)?;
            if suffix == 0 || total_size == 0 {
                return Err(RangeError::Unsatisfiable(total_size));
            }
            ByteRange {
                start: total_size.saturating_sub(suffix),
                end: total_size - 1,
            }
        }
        (false, open_ended) => {
            let start = parse(start)?;
            let end = if open_ended {
                total_size.saturating_sub(1)
            } else {
                parse(end)?.min(total_size.saturating_sub(1))
            };
            if start >= total_size || start > end {
                return Err(RangeError::Unsatisfiable(total_size));
            }
            ByteRange { start, end }
        }
    };
    Ok(Some(range))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u64, end: u64) -> Option<ByteRange> {
        Some(ByteRange { start, end })
    }

    #[test]
    fn no_header_is_full_body() {
        assert_eq!(resolve(None, 1000), Ok(None));
        assert_eq!(resolve(None, 0), Ok(None));
    }

    #[test]
    fn closed_range() {
        let resolved = resolve(Some("bytes=500-599"), 1000).unwrap();
        assert_eq!(resolved, range(500, 599));
        assert_eq!(resolved.unwrap().len(), 100);
    }

    #[test]
    fn open_range_defaults_to_last_byte() {
        let resolved = resolve(Some("bytes=900-"), 1000).unwrap();
        assert_eq!(resolved, range(900, 999));
        assert_eq!(resolved.unwrap().len(), 100);
        assert_eq!(resolve(Some("bytes=0-"), 1).unwrap(), range(0, 0));
    }

    #[test]
    fn single_byte_ranges() {
        assert_eq!(resolve(Some("bytes=0-0"), 1000).unwrap(), range(0, 0));
        assert_eq!(resolve(Some("bytes=999-999"), 1000).unwrap(), range(999, 999));
    }

    #[test]
    fn end_past_size_is_clamped() {
        assert_eq!(resolve(Some("bytes=100-5000"), 1000).unwrap(), range(100, 999));
    }

    #[test]
    fn suffix_range() {
        assert_eq!(resolve(Some("bytes=-100"), 1000).unwrap(), range(900, 999));
        assert_eq!(resolve(Some("bytes=-5000"), 1000).unwrap(), range(0, 999));
        assert_eq!(resolve(Some("bytes=-0"), 1000), Err(RangeError::Unsatisfiable(1000)));
    }

    #[test]
    fn first_of_multiple_ranges() {
        assert_eq!(resolve(Some("bytes=0-9, 20-29"), 1000).unwrap(), range(0, 9));
    }

    #[test]
    fn start_at_or_past_size_is_unsatisfiable() {
        assert_eq!(resolve(Some("bytes=1000-"), 1000), Err(RangeError::Unsatisfiable(1000)));
        assert_eq!(resolve(Some("bytes=1500-1600"), 1000), Err(RangeError::Unsatisfiable(1000)));
    }

    #[test]
    fn inverted_range_is_unsatisfiable() {
        assert_eq!(resolve(Some("bytes=600-500"), 1000), Err(RangeError::Unsatisfiable(1000)));
    }

    #[test]
    fn empty_resource_has_no_satisfiable_range() {
        assert_eq!(resolve(Some("bytes=0-"), 0), Err(RangeError::Unsatisfiable(0)));
        assert_eq!(resolve(Some("bytes=-10"), 0), Err(RangeError::Unsatisfiable(0)));
    }

    #[test]
    fn malformed_headers() {
        for header in ["items=0-10", "bytes=", "bytes=-", "bytes=abc-10", "bytes=10-x", "bytes=10", "bytes=-1-2"] {
            assert_eq!(
                resolve(Some(header), 1000),
                Err(RangeError::Malformed(header.to_string())),
                "{header}"
            );
        }
    }
}
