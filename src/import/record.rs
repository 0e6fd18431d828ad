use serde::{Deserialize, Serialize};

/// One row of the movie id export.
///
/// Missing fields decode to zero values so that an absent `id` or
/// `original_title` is reported by [`CatalogRecord::validate`] instead of as a
/// JSON error.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogRecord {
    pub id: i32,
    pub original_title: String,
    pub adult: bool,
    pub video: bool,
    pub popularity: f64,
}

impl CatalogRecord {
    /// Returns the reason this record may not enter the catalog, if any.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.id <= 0 {
            return Err("id must be greater than zero");
        }
        if self.original_title.trim().is_empty() {
            return Err("original_title is required");
        }
        if !self.popularity.is_finite() || self.popularity < 0.0 {
            return Err("popularity must be a non-negative number");
        }
        Ok(())
    }

    /// Popularity as stored in a NUMERIC(10, 4) column.
    pub fn popularity_text(&self) -> String {
        format!("{:.4}", self.popularity)
    }
}
