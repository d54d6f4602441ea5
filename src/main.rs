use anyhow::{bail, Context, Result};
use arkdata_to_sqlite::{
    cli::{Cli, Commands},
    config::{PipelineConfig, SourceConfig},
    filter::resolve_loaders,
    loaders::Loader,
    pipeline,
    report::RunSummary,
    source::{HttpSource, RetryPolicy, SourceCache, SourceDoc, SourceProvider},
    ui::ProgressUi,
    validate::validate,
    writer::Store,
};
use std::path::Path;
use std::process;
use std::time::Instant;
use tracing::info;

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("arkdata_to_sqlite=debug,info")
        } else {
            EnvFilter::new("arkdata_to_sqlite=info,warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    setup_tracing(cli.verbose);

    match cli.command {
        Commands::Sync {
            db,
            include,
            exclude,
            force,
            cache_dir,
            base_url,
            input_dir,
            retries,
            retry_delay_ms,
            json,
            no_validate,
        } => {
            let start = Instant::now();

            let mut config = PipelineConfig::with_loaders(resolve_loaders(include, exclude)?);
            config.validate = !no_validate;

            let sources = SourceConfig {
                base_url,
                cache_dir,
                input_dir,
                force,
                ..SourceConfig::default()
            }
            .with_retry(retries, retry_delay_ms);
            let provider = sources
                .provider()
                .context("Failed to set up the source provider")?;

            let mut store = open_store(&db)?;
            let mut ui = ProgressUi::new();
            let summary = pipeline::sync(&mut store, &*provider, &config, &mut ui);
            ui.finish("");

            finish_run(store, &db, summary, json, start)
        }

        Commands::Download {
            output,
            force,
            base_url,
        } => {
            let cache = SourceCache::new(output).context("Failed to open the cache directory")?;
            let dir = cache.cache_dir().to_path_buf();
            let http = HttpSource::new(base_url, RetryPolicy::default())?
                .with_cache(cache)
                .force(force);

            for doc in SourceDoc::ALL {
                http.fetch(doc)
                    .with_context(|| format!("Failed to download {}", doc))?;
            }
            println!("{} documents available in {:?}", SourceDoc::ALL.len(), dir);
            Ok(())
        }

        Commands::Load {
            input_dir,
            db,
            include,
            exclude,
            json,
        } => {
            let start = Instant::now();

            if !input_dir.is_dir() {
                bail!("Input directory {:?} does not exist", input_dir);
            }
            let config = PipelineConfig::with_loaders(resolve_loaders(include, exclude)?);
            let provider = SourceConfig {
                input_dir: Some(input_dir),
                ..SourceConfig::default()
            }
            .provider()?;

            let mut store = open_store(&db)?;
            let mut ui = ProgressUi::new();
            let summary = pipeline::sync(&mut store, &*provider, &config, &mut ui);
            ui.finish("");

            finish_run(store, &db, summary, json, start)
        }

        Commands::Validate { db, json } => {
            if !db.is_file() {
                bail!("Database {:?} does not exist", db);
            }
            let store = Store::open_read_only(&db)
                .with_context(|| format!("Failed to open database {:?}", db))?;
            let report = validate(store.connection()).context("Validation could not run")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report);
            }
            if !report.passed() {
                process::exit(2);
            }
            Ok(())
        }

        Commands::ListStages => {
            println!("Loaders in run order:\n");
            for loader in Loader::ALL {
                println!(
                    "  {:<12} wave {}  {:<18} {}",
                    loader.name(),
                    loader.wave(),
                    loader.source().file_name(),
                    loader
                        .tables()
                        .iter()
                        .map(|t| t.name)
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
            Ok(())
        }
    }
}

fn open_store(db: &Path) -> Result<Store> {
    if let Some(parent) = db.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    Store::open(db).with_context(|| format!("Failed to open database {:?}", db))
}

fn finish_run(
    store: Store,
    db: &Path,
    summary: RunSummary,
    json: bool,
    start: Instant,
) -> Result<()> {
    if json {
        println!("{}", summary.to_json()?);
    } else {
        println!("{}", summary);
    }

    store.finalize().context("Failed to finalize database")?;

    info!(
        db = %db.display(),
        rows = summary.rows_written(),
        elapsed_secs = start.elapsed().as_secs_f64(),
        "run finished"
    );

    let code = summary.status.exit_code();
    if code != 0 {
        process::exit(code);
    }
    Ok(())
}
