//! Vector type and operations

use crate::error::{Result, VectorDbError};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A fixed-length float vector, serialized as a plain JSON array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vector {
    data: Vec<f32>,
}

impl Vector {
    /// Create a new vector from a Vec<f32>
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// A vector of `dim` components drawn uniformly from [0, 1)
    pub fn random<R: Rng + ?Sized>(dim: usize, rng: &mut R) -> Self {
        Self::new((0..dim).map(|_| rng.gen::<f32>()).collect())
    }

    /// Get the dimension of the vector
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    /// Get the underlying data as a slice
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Check if this vector has the same dimension as another
    pub fn has_same_dimension(&self, other: &Vector) -> bool {
        self.dimension() == other.dimension()
    }

    /// Compute the L2 norm (magnitude) of the vector
    pub fn norm(&self) -> f32 {
        self.data.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Reject NaN and infinite components.
    pub fn check_finite(&self) -> Result<()> {
        match self.data.iter().position(|x| !x.is_finite()) {
            Some(pos) => Err(VectorDbError::InvalidVector {
                reason: format!("component {} is not finite", pos),
            }),
            None => Ok(()),
        }
    }
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_vector_creation() {
        let v = Vector::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(v.dimension(), 3);
        assert_eq!(v.as_slice(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_vector_norm() {
        let v = Vector::new(vec![3.0, 4.0]);
        assert_relative_eq!(v.norm(), 5.0, epsilon = 1e-6);
    }

    #[test]
    fn test_random_is_unit_interval_and_seeded() {
        let mut rng = StdRng::seed_from_u64(7);
        let v = Vector::random(128, &mut rng);
        assert_eq!(v.dimension(), 128);
        assert!(v.as_slice().iter().all(|x| (0.0..1.0).contains(x)));

        let mut again = StdRng::seed_from_u64(7);
        assert_eq!(Vector::random(128, &mut again), v);
    }

    #[test]
    fn test_check_finite() {
        assert!(Vector::new(vec![0.0, 1.0]).check_finite().is_ok());
        assert!(matches!(
            Vector::new(vec![0.0, f32::NAN]).check_finite(),
            Err(VectorDbError::InvalidVector { .. })
        ));
    }

    #[test]
    fn test_serializes_as_array() {
        let v = Vector::new(vec![0.5, 1.5]);
        assert_eq!(serde_json::to_string(&v).unwrap(), "[0.5,1.5]");
    }
}
