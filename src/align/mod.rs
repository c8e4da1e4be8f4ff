//! Standalone sequence alignment utilities
//!
//! Unrelated to the distributed machinery: a single-threaded dynamic
//! time warping scorer over two real-valued series.

mod dtw;

pub use dtw::{dtw_alignment, DtwAlignment, Step};

use std::fs;
use std::path::Path;

use crate::{GnpError, Result};

/// Read a time series from the first non-empty line of `path`.
///
/// Values may be separated by commas, whitespace, or both. Lines starting
/// with `#` are skipped.
pub fn load_series<P: AsRef<Path>>(path: P) -> Result<Vec<f64>> {
    let text = fs::read_to_string(path.as_ref())?;
    parse_series(&text)
}

/// Parse a series from text; see [`load_series`].
pub fn parse_series(text: &str) -> Result<Vec<f64>> {
    let Some(line) = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
    else {
        return Ok(Vec::new());
    };

    line.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|field| !field.is_empty())
        .map(|field| {
            field.parse::<f64>().map_err(|err| {
                GnpError::MalformedInput(format!("bad series value {:?}: {}", field, err))
            })
        })
        .collect()
}
