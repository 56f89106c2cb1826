//! Module-level format errors (§4.G, §7).

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("bad PNGB header: {0}")]
    InvalidFormat(&'static str),
    #[error("unsupported PNGB version {0}")]
    UnsupportedVersion(u16),
}
