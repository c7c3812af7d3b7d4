//! Distance metrics for vector similarity
//!
//! Every metric is expressed as a distance: smaller means closer.

use crate::error::{Result, VectorDbError};
use crate::vector::Vector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Metric a vector index ranks results by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricType {
    /// Squared Euclidean distance
    #[serde(rename = "L2")]
    L2,
    /// Inner product (negated for minimum distance)
    #[serde(rename = "IP")]
    Ip,
    /// Cosine similarity (converted to distance: 1 - similarity)
    #[serde(rename = "COSINE")]
    Cosine,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::L2 => "L2",
            MetricType::Ip => "IP",
            MetricType::Cosine => "COSINE",
        }
    }

    /// Compute the distance between two vectors using this metric
    pub fn distance(&self, v1: &Vector, v2: &Vector) -> Result<f32> {
        if !v1.has_same_dimension(v2) {
            return Err(VectorDbError::DimensionMismatch {
                expected: v1.dimension(),
                actual: v2.dimension(),
            });
        }

        match self {
            MetricType::L2 => Ok(squared_euclidean(v1, v2)),
            MetricType::Ip => Ok(-dot_product(v1, v2)),
            MetricType::Cosine => Ok(cosine_distance(v1, v2)),
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = VectorDbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "L2" => Ok(MetricType::L2),
            "IP" => Ok(MetricType::Ip),
            "COSINE" => Ok(MetricType::Cosine),
            other => Err(VectorDbError::Config(format!("unknown metric type: {}", other))),
        }
    }
}

/// Sum of squared component differences
pub fn squared_euclidean(v1: &Vector, v2: &Vector) -> f32 {
    v1.as_slice()
        .iter()
        .zip(v2.as_slice().iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f32>()
}

/// Compute cosine distance between two vectors (1 - cosine similarity).
/// A zero vector has similarity 0 with everything.
pub fn cosine_distance(v1: &Vector, v2: &Vector) -> f32 {
    let norm1 = v1.norm();
    let norm2 = v2.norm();

    if norm1 == 0.0 || norm2 == 0.0 {
        return 1.0;
    }

    let similarity = (dot_product(v1, v2) / (norm1 * norm2)).clamp(-1.0, 1.0);
    1.0 - similarity
}

/// Compute dot product of two vectors
pub fn dot_product(v1: &Vector, v2: &Vector) -> f32 {
    v1.as_slice()
        .iter()
        .zip(v2.as_slice().iter())
        .map(|(a, b)| a * b)
        .sum()
}
