//! Code implementing the "region query" sub command.

use std::{io::Write, time::Instant};

use clap::Parser;

use crate::{
    conf::{MnvFailurePolicy, Top},
    variants::{
        pipeline::{fetch_variants_by_region, Collaborators, RegionVariants},
        schema::{GenomicInterval, Subset},
    },
};

/// Command line arguments for `region query` sub command.
#[derive(Parser, Debug)]
#[command(author, version, about = "Query merged gnomAD variants in a region", long_about = None)]
pub struct Args {
    /// Path to configuration TOML file, defaults are used if not given.
    #[arg(long)]
    pub path_conf: Option<String>,
    /// Override the search backend URL from the configuration.
    #[arg(long)]
    pub search_url: Option<String>,
    /// Region to query, e.g., `1:55505221-55530525`.
    #[arg(long, required = true)]
    pub interval: GenomicInterval,
    /// Population subset to report counts for.
    #[arg(long, value_enum, default_value_t = Subset::Gnomad)]
    pub subset: Subset,
    /// Override the MNV failure policy from the configuration.
    #[arg(long, value_enum)]
    pub mnv_failure: Option<MnvFailurePolicy>,
    /// Path to the output JSON file, stdout if not given.
    #[arg(long)]
    pub path_output: Option<String>,
}

/// Write the result as pretty-printed JSON.
fn write_result<W: Write>(mut writer: W, result: &RegionVariants) -> Result<(), anyhow::Error> {
    serde_json::to_writer_pretty(&mut writer, result)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Main entry point for `region query` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = Instant::now();
    tracing::info!("args_common = {:?}", &args_common);
    tracing::info!("args = {:?}", &args);

    let conf = Top::load(args.path_conf.as_deref(), args.search_url.as_deref())?;
    tracing::info!("conf = {:?}", &conf);
    let mnv_failure = args.mnv_failure.unwrap_or(conf.mnv_failure);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(async {
        let collaborators = Collaborators::with_conf(&conf)?;
        fetch_variants_by_region(
            &collaborators,
            &conf,
            &args.interval,
            args.subset,
            mnv_failure,
        )
        .await
        .map_err(|e| anyhow::anyhow!("could not query {}: {}", &args.interval, e))
    })?;
    for warning in &result.warnings {
        tracing::warn!("{}", warning);
    }

    if let Some(path_output) = &args.path_output {
        let file = std::fs::File::create(path_output)
            .map_err(|e| anyhow::anyhow!("could not create {}: {}", path_output, e))?;
        write_result(std::io::BufWriter::new(file), &result)?;
    } else {
        write_result(std::io::stdout().lock(), &result)?;
    }

    tracing::info!(
        "All of `region query` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}
