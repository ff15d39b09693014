//! `Range` and `Content-Range` header values.
//!
//! Requests carry `bytes=<start>-<end>` (inclusive, decimal) or the open-ended
//! `bytes=<start>-`. Responses are parsed from `bytes <start>-<end>/<total>`;
//! a total of `*` is treated as unknown.

use crate::error::{DownloadError, Result};

/// A byte range as sent in a `Range` request header. `end` is inclusive;
/// `None` reads to the end of the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

/// The parts of a `Content-Range` response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    pub end: u64,
    pub total: Option<u64>,
}

pub fn range_header(start: u64, end: u64) -> String {
    format!("bytes={}-{}", start, end)
}

pub fn open_range_header(start: u64) -> String {
    format!("bytes={}-", start)
}

impl ByteRange {
    pub fn to_header(&self) -> String {
        match self.end {
            Some(end) => range_header(self.start, end),
            None => open_range_header(self.start),
        }
    }
}

fn parse_u64(name: &'static str, raw: &str, token: &str) -> Result<u64> {
    let token = token.trim();
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(name, raw));
    }
    token.parse().map_err(|_| malformed(name, raw))
}

fn malformed(name: &'static str, raw: &str) -> DownloadError {
    DownloadError::MalformedHeader {
        name,
        value: raw.to_string(),
    }
}

pub fn parse_range(value: &str) -> Result<ByteRange> {
    let spec = value
        .trim()
        .strip_prefix("bytes=")
        .ok_or_else(|| malformed("Range", value))?;
    let (start, end) = spec.split_once('-').ok_or_else(|| malformed("Range", value))?;
    let start = parse_u64("Range", value, start)?;
    let end = if end.trim().is_empty() {
        None
    } else {
        Some(parse_u64("Range", value, end)?)
    };
    if matches!(end, Some(end) if end < start) {
        return Err(malformed("Range", value));
    }
    Ok(ByteRange { start, end })
}

pub fn parse_content_range(value: &str) -> Result<ContentRange> {
    let spec = value
        .trim()
        .strip_prefix("bytes ")
        .ok_or_else(|| malformed("Content-Range", value))?;
    let (range, total) = spec
        .split_once('/')
        .ok_or_else(|| malformed("Content-Range", value))?;
    let (start, end) = range
        .split_once('-')
        .ok_or_else(|| malformed("Content-Range", value))?;
    let start = parse_u64("Content-Range", value, start)?;
    let end = parse_u64("Content-Range", value, end)?;
    let total = match total.trim() {
        "*" => None,
        t => Some(parse_u64("Content-Range", value, t)?),
    };
    if end < start || matches!(total, Some(total) if end >= total) {
        return Err(malformed("Content-Range", value));
    }
    Ok(ContentRange { start, end, total })
}

/// Splits a user header of the form `Name:Value`. The value keeps everything
/// after the first colon, trimmed.
pub fn parse_header_arg(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| DownloadError::BadHeaderFormat(raw.to_string()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(DownloadError::BadHeaderFormat(raw.to_string()));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
