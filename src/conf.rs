//! Code for supporting the backend configuration file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::variants::schema::Cohort;

/// How to react when the MNV annotation data cannot be fetched.
#[derive(
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Clone,
    Copy,
    Debug,
    Default,
    clap::ValueEnum,
    strum::EnumString,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MnvFailurePolicy {
    /// Fail the whole request.
    #[default]
    Fail,
    /// Return the merged variants without MNV flags and a warning.
    Degrade,
}

/// Top-level configuration, read from TOML.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct Top {
    /// Base URL of the Elasticsearch cluster.
    pub search_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Number of hits to fetch per page.
    pub page_size: usize,
    /// Index with the exome variants.
    pub exomes_index: String,
    /// Index with the genome variants.
    pub genomes_index: String,
    /// Index with the multi-nucleotide variants.
    pub mnv_index: String,
    /// What to do when the MNV query fails.
    pub mnv_failure: MnvFailurePolicy,
}

impl Default for Top {
    fn default() -> Self {
        Self {
            search_url: "http://localhost:9200".into(),
            timeout_secs: 60,
            page_size: 10_000,
            exomes_index: "gnomad_exomes_2_1_1".into(),
            genomes_index: "gnomad_genomes_2_1_1".into(),
            mnv_index: "gnomad_2_1_1_mnvs".into(),
            mnv_failure: MnvFailurePolicy::Fail,
        }
    }
}

impl Top {
    /// Load from the TOML file at `path`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let toml_str = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            anyhow::anyhow!(
                "could not read configuration from {}: {}",
                path.as_ref().display(),
                e
            )
        })?;
        let result: Self = toml::from_str(&toml_str)?;
        if result.page_size == 0 {
            anyhow::bail!("page_size must be positive");
        }
        Ok(result)
    }

    /// Load from `path_conf` if given, defaults otherwise, then apply the
    /// search URL override.
    pub fn load(path_conf: Option<&str>, search_url: Option<&str>) -> Result<Self, anyhow::Error> {
        let mut result = match path_conf {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };
        if let Some(search_url) = search_url {
            result.search_url = search_url.to_string();
        }
        Ok(result)
    }

    /// The name of the index holding the given cohort.
    pub fn index(&self, cohort: Cohort) -> &str {
        match cohort {
            Cohort::Exome => &self.exomes_index,
            Cohort::Genome => &self.genomes_index,
        }
    }
}
