//! Color similarity scoring for image searches.
//!
//! A color filter does not exclude anything. It ranks images by how close
//! their stored palette embedding is to the requested color, nearest first.

use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;

/// Stored per-image palette vector the scoring script reads.
pub const PALETTE_FIELD: &str = "vectorValues.paletteEmbedding";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a valid value. Please supply a single hex string.")]
pub struct InvalidColor(String);

impl FromStr for Rgb {
    type Err = InvalidColor;

    /// Six hex digits with an optional leading `#`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidColor(s.to_string());
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |at: usize| u8::from_str_radix(&hex[at..at + 2], 16).map_err(|_| invalid());
        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// A way of comparing a requested color against stored palette embeddings.
///
/// `embed` must produce vectors in the same space as the stored embeddings,
/// and `script` must score documents so that a smaller `distance` always
/// yields a larger score.
pub trait ColorMetric: fmt::Debug + Send + Sync {
    fn embed(&self, color: Rgb) -> Vec<f64>;

    fn distance(&self, a: &[f64], b: &[f64]) -> f64;

    /// Painless source reading `params.query_vector`.
    fn script(&self) -> &'static str;
}

/// Euclidean distance between RGB channels scaled to `0.0..=1.0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedRgb;

impl ColorMetric for NormalizedRgb {
    fn embed(&self, color: Rgb) -> Vec<f64> {
        [color.r, color.g, color.b]
            .into_iter()
            .map(|channel| f64::from(channel) / 255.0)
            .collect()
    }

    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    fn script(&self) -> &'static str {
        "1 / (1 + l2norm(params.query_vector, 'vectorValues.paletteEmbedding'))"
    }
}

/// Wrap `inner` so its matches are ranked by closeness to `color`.
pub fn scoring_clause(metric: &dyn ColorMetric, color: Rgb, inner: Value) -> Value {
    json!({
        "script_score": {
            "query": inner,
            "script": {
                "source": metric.script(),
                "params": { "query_vector": metric.embed(color) }
            }
        }
    })
}
