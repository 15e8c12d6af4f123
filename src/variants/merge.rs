//! Reconcile exome and genome summaries into one record per variant.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::err::PipelineError;

use super::schema::{Cohort, CohortCounts, CombinedVariantSummary, VariantSummary};

/// Exome and genome summary sharing one variant ID.
#[derive(Debug, Default)]
struct Pair {
    exome: Option<VariantSummary>,
    genome: Option<VariantSummary>,
}

impl Pair {
    fn slot(&mut self, cohort: Cohort) -> &mut Option<VariantSummary> {
        match cohort {
            Cohort::Exome => &mut self.exome,
            Cohort::Genome => &mut self.genome,
        }
    }
}

/// Put `summaries` into their slots in `pairs`, failing on duplicates.
fn insert_all(
    pairs: &mut IndexMap<String, Pair>,
    summaries: Vec<VariantSummary>,
    cohort: Cohort,
) -> Result<(), PipelineError> {
    for summary in summaries {
        let slot = pairs.entry(summary.variant_id.clone()).or_default().slot(cohort);
        if slot.is_some() {
            return Err(PipelineError::ShapingInvariantViolation {
                variant_id: summary.variant_id,
                reason: format!("duplicate record in {} cohort", cohort),
            });
        }
        *slot = Some(summary);
    }
    Ok(())
}

/// Combine the two summaries of one variant.
fn combine(key: &str, pair: Pair) -> Result<CombinedVariantSummary, PipelineError> {
    let Pair { exome, genome } = pair;
    if let (Some(exome), Some(genome)) = (&exome, &genome) {
        if exome.key() != genome.key() {
            tracing::error!(
                "exome and genome records for {} disagree on identity\n  exome: {:?}\n  genome: {:?}",
                key,
                exome,
                genome
            );
            return Err(PipelineError::IdentityMismatch {
                key: key.to_string(),
                exome: exome.key().to_string(),
                genome: genome.key().to_string(),
            });
        }
    }

    let exome_counts = exome.as_ref().map(CohortCounts::from);
    let genome_counts = genome.as_ref().map(CohortCounts::from);
    let sum = |f: fn(&CohortCounts) -> u32| {
        exome_counts.as_ref().map(f).unwrap_or_default()
            + genome_counts.as_ref().map(f).unwrap_or_default()
    };
    let allele_count = sum(|c| c.allele_count);
    let allele_number = sum(|c| c.allele_number);
    let homozygote_count = sum(|c| c.homozygote_count);
    let filters: BTreeSet<String> = exome_counts
        .iter()
        .chain(genome_counts.iter())
        .flat_map(|c| c.filters.iter().cloned())
        .collect();

    // exome is authoritative for identity and annotation when present
    let (base, other) = match (exome, genome) {
        (Some(exome), genome) => (exome, genome),
        (None, Some(genome)) => (genome, None),
        (None, None) => unreachable!("pairs are only created from a summary"),
    };
    let mut flags = base.flags;
    if let Some(other) = &other {
        flags.extend(other.flags.iter().cloned());
    }

    Ok(CombinedVariantSummary {
        variant_id: base.variant_id,
        rsid: base.rsid.or_else(|| other.and_then(|o| o.rsid)),
        chrom: base.chrom,
        pos: base.pos,
        reference: base.reference,
        alternative: base.alternative,
        consequences: base.consequences,
        flags,
        exome: exome_counts,
        genome: genome_counts,
        allele_count,
        allele_number,
        homozygote_count,
        filters,
        mnv_flag: false,
    })
}

/// Merge exome and genome summaries into combined records.
///
/// The result has one record per variant ID seen in either input, sorted
/// by position, then reference and alternate allele.
pub fn merge_exome_and_genome_variants(
    exomes: Vec<VariantSummary>,
    genomes: Vec<VariantSummary>,
) -> Result<Vec<CombinedVariantSummary>, PipelineError> {
    let mut pairs: IndexMap<String, Pair> = IndexMap::with_capacity(exomes.len() + genomes.len());
    insert_all(&mut pairs, exomes, Cohort::Exome)?;
    insert_all(&mut pairs, genomes, Cohort::Genome)?;

    let mut result = pairs
        .into_iter()
        .map(|(key, pair)| combine(&key, pair))
        .collect::<Result<Vec<_>, _>>()?;
    result.sort_by_cached_key(|v| (v.key(), v.variant_id.clone()));

    Ok(result)
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::variants::{
        fetch::test_util::variant_doc,
        raw::RawVariantHit,
        schema::{Af, Subset},
        shape::{shape, ShapeContext},
    };

    fn summary(variant_id: &str, cohort: Cohort, ac: u32, an: u32, filters: &[&str]) -> VariantSummary {
        let key: crate::variants::schema::VariantKey = variant_id.parse().unwrap();
        VariantSummary {
            variant_id: variant_id.to_string(),
            rsid: None,
            chrom: key.chrom,
            pos: key.pos,
            reference: key.reference,
            alternative: key.alternative,
            filters: filters.iter().map(|f| f.to_string()).collect(),
            flags: BTreeSet::new(),
            allele_count: ac,
            allele_number: an,
            homozygote_count: ac / 2,
            consequences: Vec::new(),
            cohort,
        }
    }

    fn ids(merged: &[CombinedVariantSummary]) -> Vec<&str> {
        merged.iter().map(|v| v.variant_id.as_str()).collect()
    }

    #[test]
    fn exome_only() -> Result<(), anyhow::Error> {
        let merged = merge_exome_and_genome_variants(
            vec![summary("1-55516888-G-GA", Cohort::Exome, 5, 10000, &[])],
            vec![],
        )?;

        assert_eq!(merged.len(), 1);
        let v = &merged[0];
        assert_eq!(v.allele_count, 5);
        assert_eq!(v.allele_number, 10000);
        assert!(v.has_exome());
        assert!(!v.has_genome());
        assert_eq!(v.genome, None);
        assert!(v.filters.is_empty());
        assert!(!v.mnv_flag);

        Ok(())
    }

    #[test]
    fn genome_only() -> Result<(), anyhow::Error> {
        let merged = merge_exome_and_genome_variants(
            vec![],
            vec![summary("1-55516888-G-GA", Cohort::Genome, 2, 4000, &["AC0"])],
        )?;

        assert_eq!(merged.len(), 1);
        let v = &merged[0];
        assert_eq!((v.allele_count, v.allele_number, v.homozygote_count), (2, 4000, 1));
        assert!(!v.has_exome());
        assert!(v.has_genome());
        assert_eq!(v.filters, ["AC0".to_string()].into_iter().collect::<BTreeSet<_>>());

        Ok(())
    }

    #[test]
    fn both_cohorts() -> Result<(), anyhow::Error> {
        let merged = merge_exome_and_genome_variants(
            vec![summary("1-55516888-G-GA", Cohort::Exome, 5, 10000, &[])],
            vec![summary("1-55516888-G-GA", Cohort::Genome, 2, 4000, &["AC0"])],
        )?;

        assert_eq!(merged.len(), 1);
        let v = &merged[0];
        assert_eq!(v.allele_count, 7);
        assert_eq!(v.allele_number, 14000);
        assert_eq!(v.homozygote_count, 3);
        assert_eq!(v.filters, ["AC0".to_string()].into_iter().collect::<BTreeSet<_>>());
        assert!(v.has_exome() && v.has_genome());
        assert_eq!(v.exome.as_ref().map(|c| c.allele_count), Some(5));
        assert_eq!(v.genome.as_ref().map(|c| c.allele_count), Some(2));
        assert_eq!(v.af(), 7.0 / 14000.0);

        Ok(())
    }

    #[test]
    fn exome_annotation_is_authoritative() -> Result<(), anyhow::Error> {
        let mut exome = summary("1-100-A-G", Cohort::Exome, 1, 10, &[]);
        exome.consequences = vec![Default::default()];
        exome.flags.insert("lcr".into());
        let mut genome = summary("1-100-A-G", Cohort::Genome, 1, 10, &[]);
        genome.consequences = vec![Default::default(), Default::default()];
        genome.flags.insert("segdup".into());
        genome.rsid = Some("rs1".into());

        let merged = merge_exome_and_genome_variants(vec![exome], vec![genome])?;

        assert_eq!(merged[0].consequences.len(), 1);
        assert_eq!(
            merged[0].flags.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["lcr", "segdup"]
        );
        assert_eq!(merged[0].rsid.as_deref(), Some("rs1"));

        Ok(())
    }

    #[test]
    fn zero_allele_number_gives_nan_frequency() -> Result<(), anyhow::Error> {
        let merged = merge_exome_and_genome_variants(
            vec![summary("1-100-A-G", Cohort::Exome, 0, 0, &["AC0"])],
            vec![],
        )?;
        assert!(merged[0].af().is_nan());
        Ok(())
    }

    #[test]
    fn identity_mismatch() {
        let exome = summary("1-100-A-G", Cohort::Exome, 1, 10, &[]);
        let mut genome = summary("1-100-A-G", Cohort::Genome, 1, 10, &[]);
        genome.alternative = "T".into();

        let res = merge_exome_and_genome_variants(vec![exome], vec![genome]);

        assert_eq!(
            res,
            Err(PipelineError::IdentityMismatch {
                key: "1-100-A-G".into(),
                exome: "1-100-A-G".into(),
                genome: "1-100-A-T".into(),
            })
        );
    }

    #[test]
    fn duplicate_within_cohort() {
        let res = merge_exome_and_genome_variants(
            vec![
                summary("1-100-A-G", Cohort::Exome, 1, 10, &[]),
                summary("1-100-A-G", Cohort::Exome, 1, 10, &[]),
            ],
            vec![],
        );
        assert!(matches!(
            res,
            Err(PipelineError::ShapingInvariantViolation { .. })
        ));
    }

    #[test]
    fn output_is_union_without_duplicates() -> Result<(), anyhow::Error> {
        let exomes = vec![
            summary("1-100-A-G", Cohort::Exome, 1, 10, &[]),
            summary("1-102-C-T", Cohort::Exome, 1, 10, &[]),
        ];
        let genomes = vec![
            summary("1-101-G-A", Cohort::Genome, 1, 10, &[]),
            summary("1-102-C-T", Cohort::Genome, 1, 10, &[]),
        ];
        let expected = exomes
            .iter()
            .chain(genomes.iter())
            .map(|s| s.variant_id.clone())
            .collect::<HashSet<_>>();

        let merged = merge_exome_and_genome_variants(exomes, genomes)?;

        assert_eq!(merged.len(), expected.len());
        assert_eq!(
            merged.iter().map(|v| v.variant_id.clone()).collect::<HashSet<_>>(),
            expected
        );
        Ok(())
    }

    #[rstest]
    #[case::exome_order(false)]
    #[case::reversed(true)]
    fn output_order_is_deterministic(#[case] reverse: bool) -> Result<(), anyhow::Error> {
        let mut exomes = vec![
            summary("1-101-A-G", Cohort::Exome, 1, 10, &[]),
            summary("1-100-C-T", Cohort::Exome, 1, 10, &[]),
            summary("1-100-A-T", Cohort::Exome, 1, 10, &[]),
        ];
        let mut genomes = vec![
            summary("1-100-A-C", Cohort::Genome, 1, 10, &[]),
            summary("1-99-G-GA", Cohort::Genome, 1, 10, &[]),
            summary("1-100-C-T", Cohort::Genome, 1, 10, &[]),
        ];
        if reverse {
            exomes.reverse();
            genomes.reverse();
        }

        let merged = merge_exome_and_genome_variants(exomes, genomes)?;

        assert_eq!(
            ids(&merged),
            vec!["1-99-G-GA", "1-100-A-C", "1-100-A-T", "1-100-C-T", "1-101-A-G"]
        );
        Ok(())
    }

    #[test]
    fn differently_spelled_ids_are_paired() -> Result<(), anyhow::Error> {
        let raw = |variant_id: &str| {
            let mut source = variant_doc("1-100-A-G", 1, 10, &[]);
            source["variant_id"] = serde_json::json!(variant_id);
            RawVariantHit::from_source("test", source)
        };
        let exome = shape(
            &raw("1-100-A-G")?,
            Subset::Gnomad,
            Cohort::Exome,
            &ShapeContext::Region,
        )?;
        let genome = shape(
            &raw("chr1-100-A-G")?,
            Subset::Gnomad,
            Cohort::Genome,
            &ShapeContext::Region,
        )?;

        let merged = merge_exome_and_genome_variants(vec![exome], vec![genome])?;

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].variant_id, "1-100-A-G");
        assert_eq!((merged[0].allele_count, merged[0].allele_number), (2, 20));
        assert!(merged[0].has_exome() && merged[0].has_genome());
        Ok(())
    }

    #[test]
    fn empty_inputs() -> Result<(), anyhow::Error> {
        assert!(merge_exome_and_genome_variants(vec![], vec![])?.is_empty());
        Ok(())
    }
}
