//! GeoClass CLI - reclassify rasters and vector tables, locally or remotely

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geoclass_cloud::auth;
use geoclass_cloud::{JobReference, JobStatus, RestSession, SessionOptions, SessionProvider};
use geoclass_core::io::Compression;
use geoclass_core::{ClassTable, Matrix, SourceDescriptor};
use geoclass_engine::{
    cancel_job, default_destination, describe, detect, enumerate, list_bands, wait_for_job, EngineConfig,
    ExecResult, Output, ReclassifyExecutor, WaitOptions,
};
use geoclass_parallel::ProcessingMode;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geoclass")]
#[command(author, version, about = "Reclassify geospatial datasets through a class matrix", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    remote: RemoteArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RemoteArgs {
    /// Base URL of the remote compute service
    #[arg(long, global = true, env = "GEOCLASS_ENDPOINT")]
    endpoint: Option<String>,
    /// Bearer token for the remote compute service
    #[arg(long, global = true, env = "GEOCLASS_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// Timeout in seconds for remote value enumeration
    #[arg(long, global = true, default_value = "30")]
    enumerate_timeout: u64,
    /// Timeout in seconds for remote job submission
    #[arg(long, global = true, default_value = "120")]
    submit_timeout: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which backend a source resolves to
    Detect {
        /// File path or remote asset id
        location: String,
    },
    /// List the bands or attribute columns of a source
    Bands {
        /// File path or remote asset id
        location: String,
    },
    /// List the distinct values of a band or column
    Enumerate {
        /// File path or remote asset id
        location: String,
        /// Band number (local rasters) or band / column name
        band: String,
        /// Print values as a JSON array
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Reclassify a source through a matrix
    Run {
        /// File path or remote asset id
        location: String,
        /// Band number (local rasters) or band / column name
        band: String,
        /// Class table: `code,name[,#rrggbb]` per line
        #[arg(short, long)]
        classes: PathBuf,
        /// Matrix: `destination,source,source,...` per line
        #[arg(short, long)]
        matrix: PathBuf,
        /// Output path or asset id (default: `<source>_reclass`)
        #[arg(short, long)]
        output: Option<String>,
        /// Value for source values no bucket lists
        #[arg(short, long, default_value = "0")]
        default_value: i64,
        /// Block until a remote export finishes
        #[arg(long)]
        wait: bool,
        /// Seconds between job status polls with --wait
        #[arg(long, default_value = "5")]
        poll_interval: u64,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Show the status of a remote export job
    Status {
        /// Job id returned by `run`
        job: String,
    },
    /// Wait for a remote export job to finish
    Wait {
        /// Job id returned by `run`
        job: String,
        /// Seconds between status polls
        #[arg(long, default_value = "5")]
        poll_interval: u64,
        /// Give up after this many seconds (0 waits indefinitely)
        #[arg(long, default_value = "3600")]
        timeout: u64,
    },
    /// Request cancellation of a remote export job
    Cancel {
        /// Job id returned by `run`
        job: String,
    },
}

/// Engine settings; flags override `--config`.
#[derive(Args)]
struct EngineArgs {
    /// JSON file with engine settings
    #[arg(long)]
    config: Option<PathBuf>,
    /// Rows per processing block (default: from the raster's layout)
    #[arg(long)]
    block_rows: Option<usize>,
    /// Worker threads for raster blocks (1 = sequential)
    #[arg(short, long)]
    threads: Option<usize>,
    /// Output compression: lzw, none
    #[arg(long)]
    compression: Option<String>,
    /// Column added to vector outputs
    #[arg(long)]
    output_column: Option<String>,
    /// Re-enumerate the source and reject stale matrices
    #[arg(long)]
    strict: bool,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn block_bar() -> Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} blocks ({eta})")?
            .progress_chars("=> "),
    );
    Ok(pb)
}

fn parse_compression(s: &str) -> Result<Compression> {
    match s.to_lowercase().as_str() {
        "lzw" => Ok(Compression::Lzw),
        "none" | "off" => Ok(Compression::None),
        _ => bail!("Unknown compression: {}. Use: lzw, none", s),
    }
}

impl EngineArgs {
    fn load(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => EngineConfig::default(),
        };
        if self.block_rows.is_some() {
            config.block_rows = self.block_rows;
        }
        if let Some(threads) = self.threads {
            config.processing = match threads {
                0 => ProcessingMode::Parallel,
                1 => ProcessingMode::Sequential,
                n => ProcessingMode::ParallelWith(n),
            };
        }
        if let Some(compression) = &self.compression {
            config.compression = parse_compression(compression)?;
        }
        if let Some(column) = &self.output_column {
            config.output_column = column.clone();
        }
        config.strict |= self.strict;
        config.validate().context("Invalid engine settings")?;
        Ok(config)
    }
}

impl RemoteArgs {
    /// A session when an endpoint is configured.
    fn session(&self) -> Result<Option<RestSession>> {
        let Some(endpoint) = &self.endpoint else {
            return Ok(None);
        };
        let auth = auth::from_token(self.token.as_deref());
        let options = SessionOptions {
            enumerate_timeout: Duration::from_secs(self.enumerate_timeout),
            submit_timeout: Duration::from_secs(self.submit_timeout),
            ..SessionOptions::default()
        };
        let session = RestSession::new(endpoint.clone(), auth, options)
            .with_context(|| format!("Failed to connect to {}", endpoint))?;
        Ok(Some(session))
    }

    fn require_session(&self) -> Result<RestSession> {
        match self.session()? {
            Some(session) => Ok(session),
            None => bail!("This command needs a remote endpoint (--endpoint or GEOCLASS_ENDPOINT)"),
        }
    }
}

fn job_ref(id: &str) -> JobReference {
    JobReference {
        id: id.to_string(),
        description: String::new(),
        destination: String::new(),
    }
}

fn wait_with_spinner(session: &dyn SessionProvider, job: &JobReference, options: WaitOptions) -> Result<()> {
    let pb = spinner(&format!("Waiting for {}...", job.id))?;
    let result = wait_for_job(session, job, options, |status| pb.set_message(format!("{}: {}", job.id, status)));
    pb.finish_and_clear();
    result.with_context(|| format!("Job {} did not complete", job.id))
}

fn report(result: &ExecResult, elapsed: Duration) {
    match &result.output {
        Output::File(path) => println!("Reclassified {} saved to: {}", result.kind, path.display()),
        Output::Job(job) => {
            println!("Export submitted: {}", job.id);
            println!("  Destination: {}", job.destination);
        }
    }
    if let Some(column) = &result.output_column {
        println!("  Output column: {}", column);
    }
    let summary = &result.summary;
    println!("  Mapped source values: {}", summary.mapped_values);
    println!("  Destination codes: {}", summary.destination_codes);
    println!("  Unmapped source values: {}", summary.unmapped_values);
    if let Some(count) = summary.default_count {
        println!("  Records set to default: {}", count);
    }
    if let Some(raster) = &result.raster {
        println!(
            "  Raster: {} x {}, {} blocks of {} rows",
            raster.width, raster.height, raster.blocks, raster.block_rows
        );
    }
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Detect { location } => {
            let session = cli.remote.session()?;
            let kind = detect(&location, session.as_ref().map(|s| s as &dyn SessionProvider))
                .with_context(|| format!("Failed to detect {}", location))?;
            println!("{}: {}", location, kind);
        }

        Commands::Bands { location } => {
            let session = cli.remote.session()?;
            let session = session.as_ref().map(|s| s as &dyn SessionProvider);
            let kind = detect(&location, session).with_context(|| format!("Failed to detect {}", location))?;
            let names = list_bands(kind, &location, session).context("Failed to list bands")?;
            for name in names {
                println!("{}", name);
            }
        }

        Commands::Enumerate {
            location,
            band,
            json,
            engine,
        } => {
            let config = engine.load()?;
            let session = cli.remote.session()?;
            let session = session.as_ref().map(|s| s as &dyn SessionProvider);
            let source = describe(&location, &band, session)?;

            let pb = spinner(&format!("Enumerating {}...", source.band_or_column))?;
            let values = enumerate(&source, session, &config);
            pb.finish_and_clear();
            let values = values?;

            if json {
                let raw: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                println!("{}", serde_json::to_string(&raw)?);
            } else {
                info!("{} distinct values", values.len());
                for value in values {
                    println!("{}", value);
                }
            }
        }

        Commands::Run {
            location,
            band,
            classes,
            matrix,
            output,
            default_value,
            wait,
            poll_interval,
            engine,
        } => {
            let config = engine.load()?;
            let session = cli.remote.session()?;
            let session = session.as_ref().map(|s| s as &dyn SessionProvider);

            let classes = ClassTable::load(&classes)
                .with_context(|| format!("Failed to read class table {}", classes.display()))?;
            let matrix = Matrix::load(&matrix, default_value)
                .with_context(|| format!("Failed to read matrix {}", matrix.display()))?;
            let source: SourceDescriptor = describe(&location, &band, session)?;
            let destination = match output {
                Some(dest) => dest,
                None => default_destination(&source, session).context("Failed to name the output")?,
            };
            info!("Reclassifying {} ({}) into {}", source.location, source.kind, destination);

            let bar = block_bar()?;
            let start = Instant::now();
            let mut executor = ReclassifyExecutor::new(config).with_progress(|done, total| {
                bar.set_length(total as u64);
                bar.set_position(done as u64);
            });
            if let Some(session) = session {
                executor = executor.with_session(session);
            }
            let result = executor.run(&source, &matrix, &classes, &destination);
            drop(executor);
            bar.finish_and_clear();
            let result = result?;
            report(&result, start.elapsed());

            if let (true, Output::Job(job), Some(session)) = (wait, &result.output, session) {
                let options = WaitOptions {
                    poll_interval: Duration::from_secs(poll_interval.max(1)),
                    timeout: None,
                };
                wait_with_spinner(session, job, options)?;
                println!("Export completed: {}", job.destination);
            }
        }

        Commands::Status { job } => {
            let session = cli.remote.require_session()?;
            let status = session
                .job_status(&job_ref(&job))
                .with_context(|| format!("Failed to query job {}", job))?;
            println!("{}: {}", job, status);
            if let JobStatus::Failed { .. } = status {
                std::process::exit(1);
            }
        }

        Commands::Wait {
            job,
            poll_interval,
            timeout,
        } => {
            let session = cli.remote.require_session()?;
            let options = WaitOptions {
                poll_interval: Duration::from_secs(poll_interval.max(1)),
                timeout: (timeout > 0).then(|| Duration::from_secs(timeout)),
            };
            let start = Instant::now();
            wait_with_spinner(&session, &job_ref(&job), options)?;
            println!("{}: COMPLETED after {:.2?}", job, start.elapsed());
        }

        Commands::Cancel { job } => {
            let session = cli.remote.require_session()?;
            cancel_job(&session, &job_ref(&job)).with_context(|| format!("Failed to cancel job {}", job))?;
            println!("Cancellation requested for {}", job);
        }
    }

    Ok(())
}
