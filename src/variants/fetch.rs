//! Fetch the exome and genome variants of an interval concurrently.

use std::time::Instant;

use crate::{conf::Top, err::PipelineError};

use super::{
    raw::{source_fields, RawVariantHit},
    schema::{Cohort, CohortQuerySpec, GenomicInterval, Subset, VariantSummary},
    search::{fetch_all_search_results, FilterCriterion, SearchBackend, SearchRequest},
    shape::{shape, ShapeContext},
};

/// Build the search request for one cohort and interval.
pub fn build_request(
    spec: &CohortQuerySpec,
    interval: &GenomicInterval,
    page_size: usize,
) -> SearchRequest {
    SearchRequest {
        index: spec.index.clone(),
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
            FilterCriterion::GreaterThan {
                field: spec.field("AC_raw"),
                value: 0,
            },
        ],
        source_fields: source_fields(spec.subset),
        sort: vec!["pos".into(), "variant_id".into()],
        page_size,
    }
}

/// Fetch and shape all variants of one cohort in the interval.
async fn fetch_cohort<B>(
    backend: &B,
    spec: &CohortQuerySpec,
    interval: &GenomicInterval,
    page_size: usize,
    context: &ShapeContext,
) -> Result<Vec<VariantSummary>, PipelineError>
where
    B: SearchBackend + ?Sized,
{
    let before = Instant::now();
    let request = build_request(spec, interval, page_size);
    let hits = fetch_all_search_results(backend, &request).await?;
    let result = hits
        .into_iter()
        .map(|source| {
            let hit = RawVariantHit::from_source(&spec.index, source)?;
            shape(&hit, spec.subset, spec.cohort, context)
        })
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(
        "fetched {} {} variants ({} subset) in {} in {:?}",
        result.len(),
        spec.cohort,
        spec.subset,
        interval,
        before.elapsed()
    );
    Ok(result)
}

/// Fetch the exome and genome variants of `interval` for `subset`.
///
/// Both queries run concurrently.  If one fails, the other is dropped and
/// the error is returned; no partial result is produced.
pub async fn fetch_exome_and_genome<B>(
    backend: &B,
    conf: &Top,
    interval: &GenomicInterval,
    subset: Subset,
    context: &ShapeContext,
) -> Result<(Vec<VariantSummary>, Vec<VariantSummary>), PipelineError>
where
    B: SearchBackend + ?Sized,
{
    let exome_spec = CohortQuerySpec::new(Cohort::Exome, conf.index(Cohort::Exome), subset);
    let genome_spec = CohortQuerySpec::new(Cohort::Genome, conf.index(Cohort::Genome), subset);

    tokio::try_join!(
        fetch_cohort(backend, &exome_spec, interval, conf.page_size, context),
        fetch_cohort(backend, &genome_spec, interval, conf.page_size, context),
    )
}
