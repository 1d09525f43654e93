use crate::error::{Result, SearchError};

// DEFAULT_MAX_NEIGHBORS bounds radius queries, and knn `k`, when no other cap is given
pub const DEFAULT_MAX_NEIGHBORS: usize = 100;

// MAX_RESULT_SLOTS bounds queries x width for a single search, so every table length and
// every row offset fits an i32 index
pub const MAX_RESULT_SLOTS: usize = i32::MAX as usize;

// KD_LEAF_SIZE controls the max size of leaf nodes. 32 keeps leaf scans short for small k
pub const KD_LEAF_SIZE: usize = 32;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum QueryParam {
    Knn { k: usize },
    Radius { radius: f32 },
    Hybrid { radius: f32, max_k: usize },
}

impl QueryParam {
    pub fn name(&self) -> &'static str {
        match self {
            QueryParam::Knn { .. } => "knn",
            QueryParam::Radius { .. } => "radius",
            QueryParam::Hybrid { .. } => "hybrid",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct IndexParameters {
    // result width of radius queries and the largest k a knn query may ask for
    pub max_neighbors: usize,

    // leaves hold at most this many points
    pub leaf_size: usize,
}

impl IndexParameters {
    pub fn validate(&self) -> Result<()> {
        if self.max_neighbors == 0 {
            return Err(SearchError::InvalidParameters("max_neighbors must be at least 1"));
        }

        if self.max_neighbors > MAX_RESULT_SLOTS {
            return Err(SearchError::InvalidParameters(
                "max_neighbors must fit in a single result table",
            ));
        }

        if self.leaf_size == 0 {
            return Err(SearchError::InvalidParameters("leaf_size must be at least 1"));
        }

        Ok(())
    }
}

impl Default for IndexParameters {
    fn default() -> Self {
        IndexParameters {
            max_neighbors: DEFAULT_MAX_NEIGHBORS,
            leaf_size: KD_LEAF_SIZE,
        }
    }
}
