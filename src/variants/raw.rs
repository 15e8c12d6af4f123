//! Typed view on the `_source` documents of the gnomAD variant indices.

use indexmap::IndexMap;

use crate::err::PipelineError;

use super::schema::{Subset, TranscriptConsequence};

/// Counts stored per subset, e.g., below the `gnomad` or `controls` key.
///
/// Fields are signed so that corrupt negative values can be reported
/// instead of failing deserialization of the whole page.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct RawSubsetCounts {
    #[serde(rename = "AC_raw")]
    pub ac_raw: Option<i64>,
    #[serde(rename = "AC_adj")]
    pub ac_adj: Option<i64>,
    #[serde(rename = "AN_adj")]
    pub an_adj: Option<i64>,
    pub nhomalt_adj: Option<i64>,
}

/// One hit from the variant indices.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct RawVariantHit {
    pub variant_id: String,
    pub chrom: String,
    pub pos: u32,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(rename = "alt")]
    pub alternative: String,
    #[serde(default)]
    pub rsid: Option<String>,
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default)]
    pub flags: Vec<String>,
    /// Whether the variant lies outside the pseudo-autosomal regions.
    #[serde(default)]
    pub nonpar: Option<bool>,
    #[serde(default, rename = "sortedTranscriptConsequences")]
    pub sorted_transcript_consequences: Vec<TranscriptConsequence>,
    /// All remaining top-level objects are subset counts keyed by subset name.
    #[serde(flatten)]
    pub subsets: IndexMap<String, RawSubsetCounts>,
}

impl RawVariantHit {
    /// Decode one `_source` document returned by the backend for `index`.
    pub fn from_source(index: &str, source: serde_json::Value) -> Result<Self, PipelineError> {
        serde_json::from_value(source).map_err(|e| PipelineError::BackendQueryFailure {
            index: index.to_string(),
            message: format!("malformed variant document: {}", e),
        })
    }

    /// The counts stored for the given subset, if any.
    pub fn subset_counts(&self, subset: Subset) -> Option<&RawSubsetCounts> {
        self.subsets.get(subset.to_string().as_str())
    }
}

/// Fields to request from the index for the given subset.
pub fn source_fields(subset: Subset) -> Vec<String> {
    let mut result = ["AC_adj", "AN_adj", "nhomalt_adj"]
        .iter()
        .map(|name| format!("{}.{}", subset, name))
        .collect::<Vec<_>>();
    result.extend(
        [
            "alt",
            "chrom",
            "filters",
            "flags",
            "nonpar",
            "pos",
            "ref",
            "rsid",
            "sortedTranscriptConsequences",
            "variant_id",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    result
}
