//! Entry point combining fetching, merging, and MNV annotation.

use std::{sync::Arc, time::Instant};

use crate::{
    conf::{MnvFailurePolicy, Top},
    err::PipelineError,
};

use super::{
    fetch::fetch_exome_and_genome,
    merge::merge_exome_and_genome_variants,
    mnv::{annotate_variants_with_mnv_flag, MnvSource, SearchMnvSource},
    schema::{CombinedVariantSummary, GenomicInterval, Subset},
    search::{ElasticsearchBackend, SearchBackend},
    shape::ShapeContext,
};

/// The external services the pipeline reads from.
#[derive(Clone)]
pub struct Collaborators {
    /// Search backend holding the exome and genome indices.
    pub search: Arc<dyn SearchBackend>,
    /// Source of MNV groups.
    pub mnvs: Arc<dyn MnvSource>,
}

impl Collaborators {
    /// Connect to the Elasticsearch cluster described in `conf`.
    pub fn with_conf(conf: &Top) -> Result<Self, anyhow::Error> {
        let search: Arc<dyn SearchBackend> = Arc::new(ElasticsearchBackend::new(
            &conf.search_url,
            std::time::Duration::from_secs(conf.timeout_secs),
        )?);
        let mnvs = Arc::new(SearchMnvSource::new(
            search.clone(),
            &conf.mnv_index,
            conf.page_size,
        ));
        Ok(Self { search, mnvs })
    }
}

/// Result of a region query.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RegionVariants {
    /// Combined variant summaries, sorted by position.
    pub variants: Vec<CombinedVariantSummary>,
    /// Problems that were tolerated, e.g., missing MNV annotation.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Fetch, merge, and MNV-annotate the variants of `interval`.
///
/// The two cohort queries and the MNV query run concurrently.  Any cohort
/// failure fails the whole call.  MNV failures are handled according to
/// `mnv_failure`.
pub async fn fetch_variants_by_region(
    collaborators: &Collaborators,
    conf: &Top,
    interval: &GenomicInterval,
    subset: Subset,
    mnv_failure: MnvFailurePolicy,
) -> Result<RegionVariants, PipelineError> {
    let before = Instant::now();
    let intervals = [interval.clone()];

    let merged = async {
        let (exomes, genomes) = fetch_exome_and_genome(
            collaborators.search.as_ref(),
            conf,
            interval,
            subset,
            &ShapeContext::Region,
        )
        .await?;
        merge_exome_and_genome_variants(exomes, genomes)
    };
    let mnvs = async {
        match collaborators.mnvs.fetch_mnv_groups(&intervals).await {
            Ok(groups) => Ok(Ok(groups)),
            Err(err) => match mnv_failure {
                MnvFailurePolicy::Fail => Err(err),
                MnvFailurePolicy::Degrade => Ok(Err(err)),
            },
        }
    };
    let (mut variants, mnvs) = tokio::try_join!(merged, mnvs)?;

    let mut warnings = Vec::new();
    match mnvs {
        Ok(groups) => annotate_variants_with_mnv_flag(&mut variants, &groups),
        Err(err) => {
            tracing::warn!("returning {} without MNV flags: {}", interval, &err);
            warnings.push(format!("MNV flags unavailable: {}", err));
        }
    }

    tracing::info!(
        "fetched {} variants in {} ({} subset) in {:?}",
        variants.len(),
        interval,
        subset,
        before.elapsed()
    );
    Ok(RegionVariants { variants, warnings })
}
