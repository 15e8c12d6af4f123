//! Code supporting the `server rest` sub command.

use actix_web::web::Data;
use clap::Parser;
use tracing::info;

use crate::{conf::Top, variants::pipeline::Collaborators};

/// Data shared by all request handlers.
pub struct WebServerData {
    /// Backend configuration.
    pub conf: Top,
    /// Connections to the search backend and MNV source.
    pub collaborators: Collaborators,
}

/// Implementation of the actix server.
pub mod actix_server {
    use actix_web::{
        get,
        http::StatusCode,
        middleware::Logger,
        web::{self, Data, Json, Path},
        App, HttpServer, Responder, ResponseError,
    };
    use serde::{Deserialize, Serialize};

    use crate::{
        common::worker_version,
        conf::MnvFailurePolicy,
        err::{ArgError, PipelineError},
        variants::{
            pipeline::{fetch_variants_by_region, RegionVariants},
            schema::{GenomicInterval, Subset},
        },
    };

    use super::{Args, WebServerData};

    #[derive(Debug)]
    pub(crate) enum CustomError {
        /// Invalid request parameters.
        Arg(ArgError),
        /// Failure while running the pipeline.
        Pipeline(PipelineError),
    }

    impl std::fmt::Display for CustomError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                CustomError::Arg(err) => write!(f, "{}", err),
                CustomError::Pipeline(err) => write!(f, "{}", err),
            }
        }
    }

    impl From<ArgError> for CustomError {
        fn from(err: ArgError) -> Self {
            CustomError::Arg(err)
        }
    }

    impl From<PipelineError> for CustomError {
        fn from(err: PipelineError) -> Self {
            CustomError::Pipeline(err)
        }
    }

    impl ResponseError for CustomError {
        fn status_code(&self) -> StatusCode {
            match self {
                CustomError::Arg(_) => StatusCode::BAD_REQUEST,
                CustomError::Pipeline(PipelineError::BackendQueryFailure { .. })
                | CustomError::Pipeline(PipelineError::MnvFetchFailure(_)) => {
                    StatusCode::BAD_GATEWAY
                }
                CustomError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    }

    /// Query parameters for the region endpoint.
    #[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
    pub(crate) struct RegionRequest {
        /// Population subset, defaults to `gnomad`.
        pub subset: Option<String>,
        /// Overrides the configured MNV failure policy.
        pub mnv_failure: Option<MnvFailurePolicy>,
    }

    /// Response of the region endpoint.
    #[derive(Serialize, Debug)]
    struct Container {
        /// Version of the server code.
        pub server_version: String,
        /// The queried interval.
        pub interval: GenomicInterval,
        /// The subset counts are reported for.
        pub subset: Subset,
        /// The combined variants and warnings.
        #[serde(flatten)]
        pub result: RegionVariants,
    }

    /// Merged exome and genome variants in a region.
    #[get("/variants/region/{chrom}/{start}/{stop}")]
    async fn fetch_region_variants(
        data: Data<WebServerData>,
        path: Path<(String, u32, u32)>,
        query: web::Query<RegionRequest>,
    ) -> actix_web::Result<impl Responder, CustomError> {
        let (chrom, start, stop) = path.into_inner();
        let interval = GenomicInterval::new(&chrom, start, stop)?;
        let subset = match &query.subset {
            Some(subset) => Subset::parse(subset)?,
            None => Subset::default(),
        };
        let mnv_failure = query.mnv_failure.unwrap_or(data.conf.mnv_failure);

        let result = fetch_variants_by_region(
            &data.collaborators,
            &data.conf,
            &interval,
            subset,
            mnv_failure,
        )
        .await?;

        Ok(Json(Container {
            server_version: worker_version().to_string(),
            interval,
            subset,
            result,
        }))
    }

    /// Register the endpoints with an actix `App`.
    pub(crate) fn configure(cfg: &mut web::ServiceConfig) {
        cfg.service(fetch_region_variants);
    }

    #[actix_web::main]
    pub async fn main(args: &Args, data: Data<WebServerData>) -> std::io::Result<()> {
        HttpServer::new(move || {
            App::new()
                .app_data(data.clone())
                .configure(configure)
                .wrap(Logger::default())
        })
        .bind((args.listen_host.as_str(), args.listen_port))?
        .run()
        .await
    }
}

/// Command line arguments for `server rest` sub command.
#[derive(Parser, Debug)]
#[command(author, version, about = "Run REST API server", long_about = None)]
pub struct Args {
    /// Path to configuration TOML file, defaults are used if not given.
    #[arg(long)]
    pub path_conf: Option<String>,
    /// Override the search backend URL from the configuration.
    #[arg(long)]
    pub search_url: Option<String>,
    /// IP to listen on.
    #[arg(long, default_value = "127.0.0.1")]
    pub listen_host: String,
    /// Port to listen on.
    #[arg(long, default_value_t = 8081)]
    pub listen_port: u16,
}

/// Main entry point for `server rest` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    info!("args_common = {:?}", &args_common);
    info!("args = {:?}", &args);

    info!("Loading configuration...");
    let conf = Top::load(args.path_conf.as_deref(), args.search_url.as_deref())?;
    info!("conf = {:?}", &conf);
    let collaborators = Collaborators::with_conf(&conf)?;
    let data = Data::new(WebServerData {
        conf,
        collaborators,
    });

    info!(
        "Launching server on http://{}:{} ...",
        &args.listen_host, args.listen_port
    );
    actix_server::main(args, data)?;

    info!("All done. Have a nice day!");
    Ok(())
}
