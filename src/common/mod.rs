//! Common functionality.

use std::sync::OnceLock;

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use indexmap::IndexMap;

/// Commonly used command line arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Verbosity of the program
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            verbose: Verbosity::new(0, 0),
        }
    }
}

/// Map the verbosity flags to a `tracing` level.
pub fn tracing_level(args: &Args) -> tracing::Level {
    match args.verbose.log_level() {
        Some(level) => match level {
            log::Level::Error => tracing::Level::ERROR,
            log::Level::Warn => tracing::Level::WARN,
            log::Level::Info => tracing::Level::INFO,
            log::Level::Debug => tracing::Level::DEBUG,
            log::Level::Trace => tracing::Level::TRACE,
        },
        None => tracing::Level::INFO,
    }
}

/// Definition of canonical chromosome names, as stored in the search indices.
pub const CHROMS: &[&str] = &[
    "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15", "16", "17",
    "18", "19", "20", "21", "22", "X", "Y", "MT",
];

/// Build mapping of chromosome name spellings to the index in `CHROMS`.
pub fn build_chrom_map() -> IndexMap<String, usize> {
    let mut result = IndexMap::new();
    for (i, &chrom_name) in CHROMS.iter().enumerate() {
        result.insert(chrom_name.to_owned(), i);
        result.insert(format!("chr{chrom_name}"), i);
    }
    result.insert("x".to_owned(), 22);
    result.insert("y".to_owned(), 23);
    result.insert("chrx".to_owned(), 22);
    result.insert("chry".to_owned(), 23);
    result.insert("mt".to_owned(), 24);
    result.insert("m".to_owned(), 24);
    result.insert("M".to_owned(), 24);
    result.insert("chrmt".to_owned(), 24);
    result.insert("chrm".to_owned(), 24);
    result.insert("chrM".to_owned(), 24);
    result
}

/// Canonicalize a chromosome name, `None` if it is not in the reference set.
pub fn canonicalize_chrom(name: &str) -> Option<&'static str> {
    static CHROM_MAP: OnceLock<IndexMap<String, usize>> = OnceLock::new();
    CHROM_MAP
        .get_or_init(build_chrom_map)
        .get(name)
        .map(|&idx| CHROMS[idx])
}

/// Whether the canonical chromosome is one of the gonosomes.
pub fn is_gonosome(chrom: &str) -> bool {
    matches!(chrom, "X" | "Y")
}

/// Return the version of the `gnomad-variants-worker` crate and `x.y.z` in tests.
pub fn worker_version() -> &'static str {
    if cfg!(test) {
        "x.y.z"
    } else {
        env!("CARGO_PKG_VERSION")
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    #[rstest::rstest]
    #[case("1", Some("1"))]
    #[case("chr1", Some("1"))]
    #[case("chrX", Some("X"))]
    #[case("x", Some("X"))]
    #[case("chrM", Some("MT"))]
    #[case("MT", Some("MT"))]
    #[case("23", None)]
    #[case("", None)]
    fn canonicalize_chrom(#[case] name: &str, #[case] expected: Option<&str>) {
        assert_eq!(super::canonicalize_chrom(name), expected);
    }

    #[test]
    fn build_chrom_map_covers_all() {
        let map = super::build_chrom_map();
        for (i, name) in super::CHROMS.iter().enumerate() {
            assert_eq!(map.get(*name), Some(&i));
        }
    }

    #[test]
    fn worker_version_in_tests() {
        assert_eq!(super::worker_version(), "x.y.z");
    }
}
