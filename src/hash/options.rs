//! Scan Options
//!
//! [`ScanOptions`] is what a caller hands to `hscan`; [`ScanParams`] is the
//! protocol-level parameter object a store client appends to each HSCAN
//! request. The conversion between the two is a pure mapping.

use crate::error::{HashError, HashResult};
use bytes::Bytes;

/// Options for a hash scan: an optional server-side MATCH pattern and an
/// optional COUNT page-size hint.
///
/// ```
/// use flashhash::ScanOptions;
///
/// let options = ScanOptions::new().pattern("user:*").count(100);
/// assert_eq!(options.count_hint(), Some(100));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOptions {
    pattern: Option<Bytes>,
    count: Option<u64>,
}

impl ScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options with neither pattern nor count; the store picks its defaults.
    pub fn none() -> Self {
        Self::default()
    }

    /// Only fields matching this glob pattern are returned.
    pub fn pattern(mut self, pattern: impl Into<Bytes>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Page-size hint. The store may return more or fewer entries per page.
    pub fn count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn match_pattern(&self) -> Option<&Bytes> {
        self.pattern.as_ref()
    }

    pub fn count_hint(&self) -> Option<u64> {
        self.count
    }

    /// Checks the options before a scan issues its first request.
    pub(crate) fn validate(&self) -> HashResult<()> {
        if self.count == Some(0) {
            return Err(HashError::InvalidArgument("Count hint must be positive"));
        }
        Ok(())
    }

    /// Converts the options to wire parameters.
    pub fn to_params(&self) -> ScanParams {
        ScanParams::from(self)
    }
}

/// Protocol-level HSCAN parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanParams {
    pub pattern: Option<Bytes>,
    pub count: Option<u64>,
}

impl ScanParams {
    /// Renders the trailing HSCAN arguments: `[MATCH pattern] [COUNT n]`.
    pub fn to_args(&self) -> Vec<Bytes> {
        let mut args = Vec::with_capacity(4);
        if let Some(pattern) = &self.pattern {
            args.push(Bytes::from_static(b"MATCH"));
            args.push(pattern.clone());
        }
        if let Some(count) = self.count {
            args.push(Bytes::from_static(b"COUNT"));
            args.push(Bytes::from(count.to_string()));
        }
        args
    }
}

impl From<&ScanOptions> for ScanParams {
    fn from(options: &ScanOptions) -> Self {
        ScanParams {
            pattern: options.pattern.clone(),
            count: options.count,
        }
    }
}
