use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use reqmorph::{
    Body, Catalogue, CompositionEngine, CompositionLevel, EngineConfig, Method, OutcomeStore,
    Profile, ProfileConfig, ProfileKind, Request, Scheduler, TargetKey, builtin_profile,
};
use slog::{Drain, Level, LevelFilter, Logger, info, o};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log schedule decisions and skipped strategies
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the variants of a request as JSON lines
    Generate {
        /// Built-in profile: general, reinforcement or deep
        #[arg(long, short, default_value = "general")]
        profile: String,

        /// TOML profile file; replaces the built-in profile
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Outcome journal used to order strategies
        #[arg(long, short, default_value = "outcomes.jsonl")]
        memory: PathBuf,

        /// Absolute URL of the base request
        url: String,

        #[arg(long, short = 'X', default_value = "GET")]
        method: Method,

        /// `Name: value` header, may be repeated
        #[arg(long, short = 'H')]
        header: Vec<String>,

        /// Raw request body
        #[arg(long, short)]
        body: Option<String>,

        #[arg(long, short, value_enum, default_value_t = LevelArg::Both)]
        level: LevelArg,

        /// Stop after this many variants
        #[arg(long, short = 'n')]
        limit: Option<usize>,

        /// Seed for reproducible output
        #[arg(long, short)]
        seed: Option<u64>,
    },

    /// Append a successful strategy chain to the outcome journal
    Record {
        #[arg(long, short, default_value = "outcomes.jsonl")]
        memory: PathBuf,

        /// URL the chain got through on
        url: String,

        /// Strategy names, in application order
        #[arg(required = true)]
        chain: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LevelArg {
    Single,
    Pairwise,
    Both,
}

impl From<LevelArg> for CompositionLevel {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Single => CompositionLevel::Single,
            LevelArg::Pairwise => CompositionLevel::Pairwise,
            LevelArg::Both => CompositionLevel::Both,
        }
    }
}

fn logger(verbose: bool) -> Logger {
    let decorator = slog_term::PlainSyncDecorator::new(std::io::stderr());
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let level = if verbose { Level::Debug } else { Level::Info };
    Logger::root(LevelFilter::new(drain, level).fuse(), o!())
}

fn load_profile(name: &str, config: Option<&PathBuf>) -> Result<Profile> {
    match config {
        Some(path) => {
            let config = ProfileConfig::from_file(path)?;
            Ok(config.build(&Catalogue::builtin())?)
        }
        None => Ok(builtin_profile(name.parse::<ProfileKind>()?)?),
    }
}

fn base_request(
    url: String,
    method: Method,
    headers: &[String],
    body: Option<String>,
) -> Result<Request> {
    let mut request = Request::new(method, url);
    for header in headers {
        let (name, value) = header
            .split_once(':')
            .with_context(|| format!("header `{header}` is not of the form `Name: value`"))?;
        request = request.with_header(name.trim(), value.trim());
    }
    if let Some(body) = body {
        request = request.with_body(Body::Text(body));
    }
    Ok(request)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log = logger(cli.verbose);

    match cli.command {
        Commands::Generate {
            profile,
            config,
            memory,
            url,
            method,
            header,
            body,
            level,
            limit,
            seed,
        } => {
            let profile = load_profile(&profile, config.as_ref())?;
            let base = base_request(url, method, &header, body)?;
            let memory = OutcomeStore::new(memory).with_logger(log.clone()).load();
            let schedule = Scheduler::new(log.clone()).schedule_for(&profile, &memory, &base);

            let engine = CompositionEngine::new(EngineConfig {
                level: level.into(),
                limit,
                seed,
            })
            .with_logger(log.clone());
            let mut rng = engine.rng();
            let mut out = BufWriter::new(std::io::stdout().lock());
            let mut produced = 0usize;
            for variant in engine.variants(&base, &schedule, &mut rng) {
                serde_json::to_writer(&mut out, &variant)?;
                out.write_all(b"\n")?;
                produced += 1;
            }
            out.flush()?;
            info!(log, "done"; "profile" => profile.name(), "variants" => produced);
        }
        Commands::Record { memory, url, chain } => {
            let target = TargetKey::from_url(&url)?;
            OutcomeStore::new(memory)
                .with_logger(log.clone())
                .record_success(&target, &chain)?;
            info!(log, "recorded"; "target" => %target, "strategies" => chain.len());
        }
    }
    Ok(())
}
