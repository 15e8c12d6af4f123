//! Data structures shared by the fetch, merge, and annotation steps.

use std::{collections::BTreeSet, fmt::Display, str::FromStr};

use crate::{common::canonicalize_chrom, err::ArgError};

/// A genomic interval with 1-based, inclusive coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct GenomicInterval {
    /// Canonical chromosome name, e.g., `"1"` or `"X"`.
    pub chrom: String,
    /// 1-based start position.
    pub start: u32,
    /// 1-based, inclusive stop position.
    pub stop: u32,
}

impl GenomicInterval {
    /// Construct after validating the chromosome and `start <= stop`.
    pub fn new(chrom: &str, start: u32, stop: u32) -> Result<Self, ArgError> {
        let chrom = canonicalize_chrom(chrom)
            .ok_or_else(|| ArgError::UnknownChromosome(chrom.to_string()))?;
        if start > stop {
            return Err(ArgError::IntervalInverted { start, stop });
        }
        Ok(Self {
            chrom: chrom.to_string(),
            start,
            stop,
        })
    }

    /// Whether the given position on `chrom` falls into the interval.
    pub fn contains(&self, chrom: &str, pos: u32) -> bool {
        self.chrom == chrom && self.start <= pos && pos <= self.stop
    }
}

impl Display for GenomicInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start, self.stop)
    }
}

/// Parse `1:100-200`, `chr1:1,000-2,000`, or `1-100-200`.
impl FromStr for GenomicInterval {
    type Err = ArgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ArgError::IntervalInvalidFormat(s.to_string());
        let (chrom, range) = match s.split_once(':') {
            Some((chrom, range)) => (chrom, range),
            None => s.split_once('-').ok_or_else(invalid)?,
        };
        let (start, stop) = range.split_once('-').ok_or_else(invalid)?;
        let start: u32 = start.trim().replace(',', "").parse()?;
        let stop: u32 = stop.trim().replace(',', "").parse()?;
        Self::new(chrom.trim(), start, stop)
    }
}

/// The two gnomAD cohorts.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    serde::Serialize,
    serde::Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Cohort {
    /// Exome-sequenced samples.
    Exome,
    /// Genome-sequenced samples.
    Genome,
}

/// Named subset of samples within a cohort's allele count schema.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    clap::ValueEnum,
    strum::Display,
    strum::EnumString,
    serde::Serialize,
    serde::Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum Subset {
    /// All samples.
    #[default]
    Gnomad,
    /// Controls only.
    Controls,
    /// Samples without neurological phenotypes.
    NonNeuro,
    /// Samples without cancer.
    NonCancer,
    /// Samples not part of TOPMed.
    NonTopmed,
}

impl Subset {
    /// Parse from the field prefix used in the indices.
    pub fn parse(s: &str) -> Result<Self, ArgError> {
        s.parse::<Self>()
            .map_err(|_| ArgError::UnknownSubset(s.to_string()))
    }

    /// Subset whose counts are stored in the given cohort's index.
    ///
    /// All genome samples are non-cancer, so the genome index stores no
    /// separate `non_cancer` counts and the full cohort is used instead.
    pub fn resolve_for(self, cohort: Cohort) -> Self {
        match (cohort, self) {
            (Cohort::Genome, Subset::NonCancer) => Subset::Gnomad,
            (_, subset) => subset,
        }
    }
}

/// Which index and which subset fields to read for one cohort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CohortQuerySpec {
    /// The cohort this query reads.
    pub cohort: Cohort,
    /// Name of the search index.
    pub index: String,
    /// Subset after cohort-specific resolution.
    pub subset: Subset,
}

impl CohortQuerySpec {
    /// Build the query parameters for `cohort`, resolving the requested subset.
    pub fn new(cohort: Cohort, index: &str, requested: Subset) -> Self {
        Self {
            cohort,
            index: index.to_string(),
            subset: requested.resolve_for(cohort),
        }
    }

    /// Name of the count field for this subset, e.g., `gnomad.AC_raw`.
    pub fn field(&self, name: &str) -> String {
        format!("{}.{}", self.subset, name)
    }
}

/// Variant identity: chromosome, position, reference and alternate allele.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct VariantKey {
    pub chrom: String,
    pub pos: u32,
    pub reference: String,
    pub alternative: String,
}

impl VariantKey {
    /// Key for output ordering: position first, then alleles.
    fn sort_key(&self) -> (u32, &str, &str, &str) {
        (
            self.pos,
            self.reference.as_str(),
            self.alternative.as_str(),
            self.chrom.as_str(),
        )
    }
}

impl PartialOrd for VariantKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VariantKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl Display for VariantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.chrom, self.pos, self.reference, self.alternative
        )
    }
}

/// Parse gnomAD style variant IDs, e.g., `1-55516888-G-GA`.
impl FromStr for VariantKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s.split('-').collect::<Vec<_>>();
        if parts.len() != 4 || parts.iter().any(|p| p.is_empty()) {
            anyhow::bail!("invalid variant id: {:?}", s);
        }
        let chrom = canonicalize_chrom(parts[0])
            .ok_or_else(|| anyhow::anyhow!("unknown chromosome in variant id: {:?}", s))?;
        Ok(Self {
            chrom: chrom.to_string(),
            pos: parts[1]
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid position in variant id {:?}: {}", s, e))?,
            reference: parts[2].to_string(),
            alternative: parts[3].to_string(),
        })
    }
}

/// One transcript consequence as stored in the indices.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TranscriptConsequence {
    pub gene_id: Option<String>,
    pub gene_symbol: Option<String>,
    pub transcript_id: Option<String>,
    pub major_consequence: Option<String>,
    pub hgvsc: Option<String>,
    pub hgvsp: Option<String>,
    /// LoF confidence, `"HC"` or `"LC"`.
    pub lof: Option<String>,
    pub lof_filter: Option<String>,
    pub lof_flags: Option<String>,
    #[serde(default)]
    pub canonical: bool,
}

/// Trait for total allele counts.
pub trait An {
    /// Number of genotyped alleles.
    fn an(&self) -> u32;
}

/// Trait for alternate allele counts.
pub trait Ac {
    /// Number of observed alternate alleles.
    fn ac(&self) -> u32;
    /// Number of homozygous carriers.
    fn hom(&self) -> u32;
}

/// Trait for allele frequency.
pub trait Af {
    /// Allele frequency, `NaN` when no alleles were genotyped.
    fn af(&self) -> f64;
}

impl<T: Ac + An> Af for T {
    fn af(&self) -> f64 {
        if self.an() == 0 {
            f64::NAN
        } else {
            self.ac() as f64 / self.an() as f64
        }
    }
}

/// Shaped, cohort-scoped variant summary.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VariantSummary {
    pub variant_id: String,
    pub rsid: Option<String>,
    pub chrom: String,
    pub pos: u32,
    pub reference: String,
    pub alternative: String,
    pub filters: BTreeSet<String>,
    pub flags: BTreeSet<String>,
    pub allele_count: u32,
    pub allele_number: u32,
    pub homozygote_count: u32,
    /// Transcript consequences, most severe first.
    pub consequences: Vec<TranscriptConsequence>,
    pub cohort: Cohort,
}

impl VariantSummary {
    /// The identity of this variant.
    pub fn key(&self) -> VariantKey {
        VariantKey {
            chrom: self.chrom.clone(),
            pos: self.pos,
            reference: self.reference.clone(),
            alternative: self.alternative.clone(),
        }
    }
}

impl An for VariantSummary {
    fn an(&self) -> u32 {
        self.allele_number
    }
}

impl Ac for VariantSummary {
    fn ac(&self) -> u32 {
        self.allele_count
    }
    fn hom(&self) -> u32 {
        self.homozygote_count
    }
}

/// Per-cohort statistics kept in the combined record for provenance.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CohortCounts {
    pub allele_count: u32,
    pub allele_number: u32,
    pub homozygote_count: u32,
    pub filters: BTreeSet<String>,
}

impl From<&VariantSummary> for CohortCounts {
    fn from(val: &VariantSummary) -> Self {
        Self {
            allele_count: val.allele_count,
            allele_number: val.allele_number,
            homozygote_count: val.homozygote_count,
            filters: val.filters.clone(),
        }
    }
}

impl An for CohortCounts {
    fn an(&self) -> u32 {
        self.allele_number
    }
}

impl Ac for CohortCounts {
    fn ac(&self) -> u32 {
        self.allele_count
    }
    fn hom(&self) -> u32 {
        self.homozygote_count
    }
}

/// Exome and genome summaries of one variant, reconciled.
///
/// At least one of `exome` and `genome` is set.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CombinedVariantSummary {
    pub variant_id: String,
    pub rsid: Option<String>,
    pub chrom: String,
    pub pos: u32,
    pub reference: String,
    pub alternative: String,
    pub consequences: Vec<TranscriptConsequence>,
    pub flags: BTreeSet<String>,
    pub exome: Option<CohortCounts>,
    pub genome: Option<CohortCounts>,
    pub allele_count: u32,
    pub allele_number: u32,
    pub homozygote_count: u32,
    /// Union of the present cohorts' filters, empty if QC passed everywhere.
    pub filters: BTreeSet<String>,
    /// Whether the variant is part of a known MNV.
    pub mnv_flag: bool,
}

impl CombinedVariantSummary {
    pub fn has_exome(&self) -> bool {
        self.exome.is_some()
    }

    pub fn has_genome(&self) -> bool {
        self.genome.is_some()
    }

    pub fn key(&self) -> VariantKey {
        VariantKey {
            chrom: self.chrom.clone(),
            pos: self.pos,
            reference: self.reference.clone(),
            alternative: self.alternative.clone(),
        }
    }
}

impl An for CombinedVariantSummary {
    fn an(&self) -> u32 {
        self.allele_number
    }
}

impl Ac for CombinedVariantSummary {
    fn ac(&self) -> u32 {
        self.allele_count
    }
    fn hom(&self) -> u32 {
        self.homozygote_count
    }
}

/// Variants known to co-occur as one multi-nucleotide event.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MnvGroup {
    /// ID of the MNV itself.
    pub variant_id: String,
    /// The constituent single-nucleotide variants.
    pub constituents: Vec<VariantKey>,
}
