//! Brute-force row storage with O(n) k-NN search over entities

use crate::distance::MetricType;
use crate::error::Result;
use crate::filter::Filter;
use crate::schema::Entity;
use crate::search::Hit;
use crate::vector::Vector;

/// Entities of one collection in insertion order, scanned in full on every search.
#[derive(Debug, Default)]
pub struct FlatIndex {
    primary_field: String,
    rows: Vec<Entity>,
}

impl FlatIndex {
    pub fn new(primary_field: impl Into<String>) -> Self {
        Self {
            primary_field: primary_field.into(),
            rows: Vec::new(),
        }
    }

    /// Append already-validated rows. Returns their primary keys.
    pub fn extend(&mut self, entities: &[Entity]) -> Vec<i64> {
        let ids = entities
            .iter()
            .filter_map(|e| e.int64(&self.primary_field))
            .collect();
        self.rows.extend_from_slice(entities);
        ids
    }

    /// Distances from `query` to every row matching `filter`, nearest first.
    /// Equal distances keep insertion order.
    pub fn search(
        &self,
        field: &str,
        query: &Vector,
        metric: MetricType,
        k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<Hit>> {
        let mut results: Vec<Hit> = self
            .rows
            .iter()
            .filter(|row| filter.map_or(true, |f| f.matches(row)))
            .filter_map(|row| {
                let id = row.int64(&self.primary_field)?;
                let vector = row.vector(field)?;
                Some((id, vector))
            })
            .map(|(id, vector)| {
                let distance = metric.distance(query, vector)?;
                Ok(Hit { id, distance })
            })
            .collect::<Result<Vec<_>>>()?;

        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        results.truncate(k);
        Ok(results)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
