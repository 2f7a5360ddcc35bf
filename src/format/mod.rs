//! Image format negotiation from the Accept header.
//!
//! Redirect mode selects the output format locally: the first entry of
//! the configured priority list whose MIME token appears in the Accept
//! header wins. Proxy mode never calls into this module - it forwards
//! the Accept header and lets the optimizer decide.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Image formats the optimizer backend can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Avif,
    Webp,
}

impl ImageFormat {
    /// Format token as used in the optimizer's `format` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Avif => "avif",
            ImageFormat::Webp => "webp",
        }
    }

    /// The MIME token matched against the Accept header.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Avif => "image/avif",
            ImageFormat::Webp => "image/webp",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Select the best supported format for the client's Accept header.
///
/// Returns the first entry of `supported` (priority order) whose MIME
/// token appears as a substring of the header value. Substring
/// containment is deliberate: the header is client-controlled free text
/// of bounded variants, and full media-type parsing buys nothing here.
///
/// Returns `None` when the header is absent, empty, or contains none of
/// the supported tokens - the caller falls back to the origin.
pub fn negotiate(accept: Option<&str>, supported: &[ImageFormat]) -> Option<ImageFormat> {
    let accept = accept?;
    if accept.is_empty() {
        return None;
    }
    supported
        .iter()
        .copied()
        .find(|format| accept.contains(format.mime_type()))
}
