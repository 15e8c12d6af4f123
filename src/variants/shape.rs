//! Turn raw index hits into cohort-scoped `VariantSummary` records.

use std::collections::BTreeSet;

use crate::{
    common::{canonicalize_chrom, is_gonosome},
    err::PipelineError,
};

use super::{
    raw::RawVariantHit,
    schema::{Cohort, Subset, TranscriptConsequence, VariantKey, VariantSummary},
};

/// What the variants were queried for; selects the surfaced consequences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ShapeContext {
    /// Region query, all consequences are kept.
    #[default]
    Region,
    /// Gene query, only consequences in the gene are kept.
    Gene { gene_id: String },
    /// Transcript query, only consequences in the transcript are kept.
    Transcript { transcript_id: String },
}

impl ShapeContext {
    fn keeps(&self, csq: &TranscriptConsequence) -> bool {
        match self {
            ShapeContext::Region => true,
            ShapeContext::Gene { gene_id } => csq.gene_id.as_deref() == Some(gene_id.as_str()),
            ShapeContext::Transcript { transcript_id } => {
                csq.transcript_id.as_deref() == Some(transcript_id.as_str())
            }
        }
    }
}

/// Convert a count field into `u32`, failing on missing or negative values.
fn count(hit: &RawVariantHit, name: &str, value: Option<i64>) -> Result<u32, PipelineError> {
    let value = value.ok_or_else(|| PipelineError::ShapingInvariantViolation {
        variant_id: hit.variant_id.clone(),
        reason: format!("missing {}", name),
    })?;
    u32::try_from(value).map_err(|_| PipelineError::ShapingInvariantViolation {
        variant_id: hit.variant_id.clone(),
        reason: format!("{} out of range: {}", name, value),
    })
}

/// Shape one raw hit read with the given (already resolved) subset.
pub fn shape(
    hit: &RawVariantHit,
    subset: Subset,
    cohort: Cohort,
    context: &ShapeContext,
) -> Result<VariantSummary, PipelineError> {
    let violation = |reason: String| PipelineError::ShapingInvariantViolation {
        variant_id: hit.variant_id.clone(),
        reason,
    };

    let chrom = canonicalize_chrom(&hit.chrom)
        .ok_or_else(|| violation(format!("unknown chromosome {:?}", &hit.chrom)))?;
    if hit.reference.is_empty() || hit.alternative.is_empty() {
        return Err(violation("empty reference or alternate allele".into()));
    }
    let key = VariantKey {
        chrom: chrom.to_string(),
        pos: hit.pos,
        reference: hit.reference.clone(),
        alternative: hit.alternative.clone(),
    };
    match hit.variant_id.parse::<VariantKey>() {
        Ok(id_key) if id_key == key => (),
        _ => {
            return Err(violation(format!(
                "variant ID does not match record identity {}",
                &key
            )))
        }
    }

    let counts = hit
        .subset_counts(subset)
        .ok_or_else(|| violation(format!("no counts for subset {}", subset)))?;
    let allele_count = count(hit, "AC_adj", counts.ac_adj)?;
    let allele_number = count(hit, "AN_adj", counts.an_adj)?;
    let homozygote_count = count(hit, "nhomalt_adj", counts.nhomalt_adj)?;
    if allele_number < allele_count {
        return Err(violation(format!(
            "AN_adj={} smaller than AC_adj={}",
            allele_number, allele_count
        )));
    }

    let consequences = hit
        .sorted_transcript_consequences
        .iter()
        .filter(|csq| context.keeps(csq))
        .cloned()
        .collect::<Vec<_>>();

    let mut flags = hit.flags.iter().cloned().collect::<BTreeSet<_>>();
    if let Some(major) = consequences.first() {
        if major.lof.as_deref() == Some("LC") {
            flags.insert("lc_lof".into());
        }
        if major.lof_flags.as_deref().map_or(false, |f| !f.is_empty()) {
            flags.insert("lof_flag".into());
        }
    }
    if is_gonosome(chrom) && hit.nonpar == Some(false) {
        flags.insert("par".into());
    }

    // IDs are normalized so that both cohorts pair on the same string
    Ok(VariantSummary {
        variant_id: key.to_string(),
        rsid: hit.rsid.clone().filter(|rsid| !rsid.is_empty()),
        chrom: key.chrom,
        pos: key.pos,
        reference: key.reference,
        alternative: key.alternative,
        filters: hit.filters.iter().cloned().collect(),
        flags,
        allele_count,
        allele_number,
        homozygote_count,
        consequences,
        cohort,
    })
}
