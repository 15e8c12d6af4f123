//! Multi-nucleotide variant (MNV) data and annotation of merged variants.

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use futures::future::try_join_all;

use crate::err::PipelineError;

use super::{
    schema::{CombinedVariantSummary, GenomicInterval, MnvGroup, VariantKey},
    search::{fetch_all_search_results, FilterCriterion, SearchBackend, SearchRequest},
};

/// Source of MNV groups overlapping a set of intervals.
#[async_trait]
pub trait MnvSource: Send + Sync {
    async fn fetch_mnv_groups(
        &self,
        intervals: &[GenomicInterval],
    ) -> Result<Vec<MnvGroup>, PipelineError>;
}

/// MNV document as stored in the MNV index.
#[derive(Debug, serde::Deserialize)]
struct RawMnv {
    variant_id: String,
    constituent_snv_ids: Vec<String>,
}

impl TryFrom<RawMnv> for MnvGroup {
    type Error = PipelineError;

    fn try_from(value: RawMnv) -> Result<Self, Self::Error> {
        let constituents = value
            .constituent_snv_ids
            .iter()
            .map(|id| id.parse::<VariantKey>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                PipelineError::MnvFetchFailure(format!(
                    "invalid constituent of MNV {}: {}",
                    &value.variant_id, e
                ))
            })?;
        Ok(MnvGroup {
            variant_id: value.variant_id,
            constituents,
        })
    }
}

/// `MnvSource` reading from an MNV index through a `SearchBackend`.
pub struct SearchMnvSource {
    backend: Arc<dyn SearchBackend>,
    index: String,
    page_size: usize,
}

impl SearchMnvSource {
    pub fn new(backend: Arc<dyn SearchBackend>, index: &str, page_size: usize) -> Self {
        Self {
            backend,
            index: index.to_string(),
            page_size,
        }
    }

    fn build_request(&self, interval: &GenomicInterval) -> SearchRequest {
        SearchRequest {
            index: self.index.clone(),
            filters: vec![
                FilterCriterion::Term {
                    field: "chrom".into(),
                    value: interval.chrom.clone(),
                },
                FilterCriterion::Range {
                    field: "pos".into(),
                    gte: interval.start as i64,
                    lte: interval.stop as i64,
                },
            ],
            source_fields: vec!["variant_id".into(), "constituent_snv_ids".into()],
            sort: vec!["pos".into(), "variant_id".into()],
            page_size: self.page_size,
        }
    }

    async fn fetch_interval(
        &self,
        interval: &GenomicInterval,
    ) -> Result<Vec<MnvGroup>, PipelineError> {
        let hits = fetch_all_search_results(self.backend.as_ref(), &self.build_request(interval))
            .await
            .map_err(|e| PipelineError::MnvFetchFailure(e.to_string()))?;
        hits.into_iter()
            .map(|source| {
                let raw: RawMnv = serde_json::from_value(source).map_err(|e| {
                    PipelineError::MnvFetchFailure(format!("malformed MNV document: {}", e))
                })?;
                MnvGroup::try_from(raw)
            })
            .collect()
    }
}

#[async_trait]
impl MnvSource for SearchMnvSource {
    async fn fetch_mnv_groups(
        &self,
        intervals: &[GenomicInterval],
    ) -> Result<Vec<MnvGroup>, PipelineError> {
        let per_interval =
            try_join_all(intervals.iter().map(|interval| self.fetch_interval(interval))).await?;

        // MNVs near interval borders may be reported for several intervals
        let mut seen = HashSet::new();
        let result = per_interval
            .into_iter()
            .flatten()
            .filter(|group| seen.insert(group.variant_id.clone()))
            .collect::<Vec<_>>();
        tracing::debug!("fetched {} MNVs for {} interval(s)", result.len(), intervals.len());
        Ok(result)
    }
}

/// Set `mnv_flag` on all variants that are part of one of `groups`.
///
/// Never reorders, removes, or otherwise changes records; idempotent.
pub fn annotate_variants_with_mnv_flag(
    variants: &mut [CombinedVariantSummary],
    groups: &[MnvGroup],
) {
    let members = groups
        .iter()
        .flat_map(|group| group.constituents.iter())
        .collect::<HashSet<_>>();
    for variant in variants.iter_mut() {
        if members.contains(&variant.key()) {
            variant.mnv_flag = true;
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::variants::search::test_util::InMemoryBackend;

    fn combined(variant_id: &str) -> CombinedVariantSummary {
        let key: VariantKey = variant_id.parse().unwrap();
        CombinedVariantSummary {
            variant_id: variant_id.to_string(),
            rsid: None,
            chrom: key.chrom,
            pos: key.pos,
            reference: key.reference,
            alternative: key.alternative,
            consequences: vec![],
            flags: BTreeSet::new(),
            exome: Some(Default::default()),
            genome: None,
            allele_count: 1,
            allele_number: 10,
            homozygote_count: 0,
            filters: BTreeSet::new(),
            mnv_flag: false,
        }
    }

    fn group(variant_id: &str, constituents: &[&str]) -> MnvGroup {
        MnvGroup {
            variant_id: variant_id.into(),
            constituents: constituents.iter().map(|c| c.parse().unwrap()).collect(),
        }
    }

    fn mnv_doc(variant_id: &str, pos: i64, constituents: &[&str]) -> serde_json::Value {
        serde_json::json!({
            "variant_id": variant_id,
            "chrom": "1",
            "pos": pos,
            "constituent_snv_ids": constituents,
        })
    }

    #[test]
    fn annotate_flags_members_only() {
        let mut variants = vec![
            combined("1-100-A-G"),
            combined("1-101-C-T"),
            combined("1-200-G-A"),
        ];
        let before = variants.clone();
        let groups = vec![group("1-100-AC-GT", &["1-100-A-G", "1-101-C-T"])];

        annotate_variants_with_mnv_flag(&mut variants, &groups);

        assert_eq!(
            variants.iter().map(|v| v.mnv_flag).collect::<Vec<_>>(),
            vec![true, true, false]
        );
        // nothing but the flag changes
        for (after, before) in variants.iter().zip(before.iter()) {
            assert_eq!(
                CombinedVariantSummary {
                    mnv_flag: false,
                    ..after.clone()
                },
                before.clone()
            );
        }
    }

    #[test]
    fn annotate_is_idempotent() {
        let mut variants = vec![combined("1-100-A-G"), combined("1-150-A-G")];
        let groups = vec![group("1-100-AC-GT", &["1-100-A-G", "1-101-C-T"])];

        annotate_variants_with_mnv_flag(&mut variants, &groups);
        let once = variants.clone();
        annotate_variants_with_mnv_flag(&mut variants, &groups);

        assert_eq!(variants, once);
    }

    #[test]
    fn annotate_without_groups() {
        let mut variants = vec![combined("1-100-A-G")];
        annotate_variants_with_mnv_flag(&mut variants, &[]);
        assert!(!variants[0].mnv_flag);
    }

    #[tokio::test]
    async fn search_source_fetches_and_dedups() -> Result<(), anyhow::Error> {
        let backend = InMemoryBackend::default().with_index(
            "mnvs",
            vec![
                mnv_doc("1-100-AC-GT", 100, &["1-100-A-G", "1-101-C-T"]),
                mnv_doc("1-300-AC-GT", 300, &["1-300-A-G", "1-301-C-T"]),
                mnv_doc("1-900-AC-GT", 900, &["1-900-A-G", "1-901-C-T"]),
            ],
        );
        let source = SearchMnvSource::new(Arc::new(backend), "mnvs", 10);

        let groups = source
            .fetch_mnv_groups(&["1:50-150".parse()?, "1:100-400".parse()?])
            .await?;

        assert_eq!(
            groups.iter().map(|g| g.variant_id.as_str()).collect::<Vec<_>>(),
            vec!["1-100-AC-GT", "1-300-AC-GT"]
        );
        assert_eq!(groups[0], group("1-100-AC-GT", &["1-100-A-G", "1-101-C-T"]));

        Ok(())
    }

    #[tokio::test]
    async fn search_source_failure() -> Result<(), anyhow::Error> {
        let backend = InMemoryBackend::default().with_failing("mnvs");
        let source = SearchMnvSource::new(Arc::new(backend), "mnvs", 10);

        let res = source.fetch_mnv_groups(&["1:50-150".parse()?]).await;

        assert!(matches!(res, Err(PipelineError::MnvFetchFailure(_))));
        Ok(())
    }

    #[tokio::test]
    async fn search_source_malformed_constituent() -> Result<(), anyhow::Error> {
        let backend = InMemoryBackend::default()
            .with_index("mnvs", vec![mnv_doc("1-100-AC-GT", 100, &["garbage"])]);
        let source = SearchMnvSource::new(Arc::new(backend), "mnvs", 10);

        let res = source.fetch_mnv_groups(&["1:50-150".parse()?]).await;

        assert!(matches!(res, Err(PipelineError::MnvFetchFailure(_))));
        Ok(())
    }
}
