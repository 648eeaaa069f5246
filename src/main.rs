use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mixbuddy::catalog::{Catalog, SongFingerprint};
use mixbuddy::export::format_tempo;
use mixbuddy::recommend::{Recommendation, RecommendOptions};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mixbuddy", version, about = "DJ mixing assistant: keys, Camelot codes, moods and next-track picks")]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build fingerprints from a JSON file of extracted audio features
    Analyze {
        /// Feature file (JSON array of per-track records)
        features: PathBuf,

        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,

        /// Replace the whole catalog instead of updating it
        #[arg(long)]
        replace: bool,
    },

    /// Recommend what to play after a track
    Recommend {
        /// Filename of the track currently playing
        filename: String,

        /// Number of results (defaults to config, normally 10)
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Tempo window in BPM (defaults to config, normally 12)
        #[arg(long)]
        tempo_window: Option<f64>,
    },

    /// Estimate the key of a 12-bin chroma vector (C through B)
    Key {
        /// Twelve pitch-class energies
        #[arg(num_args = 12, required = true)]
        chroma: Vec<f64>,
    },

    /// Export the catalog as CSV
    Export {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import fingerprints from a CSV export
    Import {
        /// CSV file to read
        input: PathBuf,

        /// Replace the whole catalog instead of updating it
        #[arg(long)]
        replace: bool,
    },

    /// List every track in the catalog
    List,

    /// Show library statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = mixbuddy::config::AppConfig::load();

    // Resolve database path: CLI > config > XDG default
    let db_path = cli
        .db_path
        .or(config.db_path.clone())
        .unwrap_or_else(mixbuddy::config::default_db_path);
    log::info!("Database: {}", db_path.display());

    let db = mixbuddy::db::Database::open(&db_path).context("Failed to open database")?;

    match cli.command {
        Commands::Analyze {
            features,
            jobs,
            replace,
        } => {
            let records = mixbuddy::analyzer::features::load_features(&features)
                .with_context(|| format!("Failed to load {}", features.display()))?;
            let workers = if jobs > 0 { jobs } else { config.resolve_workers() };
            let result = mixbuddy::analyzer::analyze_tracks(&db, &records, workers, replace)
                .context("Analysis failed")?;
            println!(
                "Analysis complete: {} analyzed, {} failed",
                result.analyzed, result.failed
            );
        }

        Commands::Recommend {
            filename,
            limit,
            tempo_window,
        } => {
            let options = RecommendOptions {
                tempo_window_bpm: tempo_window.unwrap_or(config.recommend.tempo_window_bpm),
                max_results: limit.unwrap_or(config.recommend.max_results),
            };
            options.validate().context("Invalid recommend options")?;

            let catalog = db
                .load_catalog(config.max_catalog_size)
                .context("Failed to load catalog")?;

            let Some(query) = catalog.get(&filename) else {
                println!("\"{}\" is not in the catalog.", filename);
                return Ok(());
            };
            if query.mix_point().is_none() {
                println!(
                    "\"{}\" has no usable tempo/key, can't recommend from it.",
                    filename
                );
                return Ok(());
            }

            let results = mixbuddy::recommend::recommend_with(&filename, &catalog, &options);

            if results.is_empty() {
                println!("No compatible tracks within {} BPM.", options.tempo_window_bpm);
                return Ok(());
            }

            println!(
                "After \"{}\" ({} BPM, {}):",
                filename,
                query.tempo_bpm().map(format_tempo).unwrap_or_default(),
                query.camelot().map(|c| c.to_string()).unwrap_or_default(),
            );
            println!();
            print_recommendation_table(&results);
        }

        Commands::Key { chroma } => {
            let Some(key) = mixbuddy::key::estimate_key(&chroma) else {
                anyhow::bail!("Expected 12 chroma values, got {}", chroma.len());
            };
            let camelot = mixbuddy::camelot::to_camelot(Some(&key));
            println!(
                "Key: {} ({})",
                key,
                camelot.map(|c| c.to_string()).unwrap_or_default()
            );

            let mut scores = mixbuddy::key::key_scores(&chroma);
            scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            println!();
            for (candidate, score) in scores.iter().take(5) {
                println!(
                    "  {:<10} {:>4}  {:.4}",
                    candidate.to_string(),
                    mixbuddy::camelot::CamelotCode::from_key(*candidate).to_string(),
                    score
                );
            }
        }

        Commands::Export { output } => {
            let catalog = db
                .load_catalog(config.max_catalog_size)
                .context("Failed to load catalog")?;
            match output {
                Some(path) => {
                    let file = std::fs::File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    mixbuddy::export::write_csv(std::io::BufWriter::new(file), &catalog)
                        .context("Export failed")?;
                    println!("Wrote {} rows to {}", catalog.len(), path.display());
                }
                None => {
                    mixbuddy::export::write_csv(std::io::stdout().lock(), &catalog)
                        .context("Export failed")?;
                }
            }
        }

        Commands::Import { input, replace } => {
            let file = std::fs::File::open(&input)
                .with_context(|| format!("Failed to open {}", input.display()))?;
            let catalog = mixbuddy::export::read_csv(file, config.max_catalog_size)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let fingerprints: Vec<SongFingerprint> = catalog.iter().cloned().collect();

            if replace {
                db.replace_catalog(&fingerprints)
            } else {
                db.store_fingerprints(&fingerprints)
            }
            .context("Failed to store fingerprints")?;
            println!("Imported {} tracks from {}", fingerprints.len(), input.display());
        }

        Commands::List => {
            let catalog = db
                .load_catalog(config.max_catalog_size)
                .context("Failed to load catalog")?;
            if catalog.is_empty() {
                println!("Catalog is empty. Run `mixbuddy analyze` first.");
                return Ok(());
            }
            print_catalog_table(&catalog);
        }

        Commands::Stats => {
            let stats = db.stats().context("Failed to get stats")?;
            println!("Library Statistics");
            println!("==================");
            println!("Total tracks:     {}", stats.total_tracks);
            println!("Analyzed tracks:  {}", stats.analyzed_tracks);
            println!("Failed tracks:    {}", stats.failed_tracks);
            println!("Unknown key:      {}", stats.unknown_key_tracks);
            println!();

            if !stats.moods.is_empty() {
                println!("Moods:");
                for (mood, count) in &stats.moods {
                    println!("  {:<12} {}", mood, count);
                }
                println!();
            }

            if !stats.camelot_keys.is_empty() {
                println!("Camelot keys:");
                for (code, count) in &stats.camelot_keys {
                    println!("  {:<4} {}", code, count);
                }
            }
        }
    }

    Ok(())
}

fn truncate_title(title: &str, width: usize) -> String {
    if title.chars().count() > width {
        let cut: String = title.chars().take(width - 3).collect();
        format!("{}...", cut)
    } else {
        title.to_string()
    }
}

/// Print ranked recommendations.
fn print_recommendation_table(results: &[Recommendation]) {
    println!(
        "{:<3} {:<40} {:>4} {:>4} {:<10} {:<12} {:>6} {:>5} {:>4}",
        "#", "Track", "BPM", "Cam", "Key", "Mood", "Score", "dBPM", "dKey"
    );
    println!("{}", "-".repeat(98));

    for (rank, r) in results.iter().enumerate() {
        println!(
            "{:<3} {:<40} {:>4} {:>4} {:<10} {:<12} {:>6.2} {:>5.1} {:>4}",
            rank + 1,
            truncate_title(&r.filename, 40),
            format_tempo(r.tempo_bpm),
            r.camelot.to_string(),
            r.key.map(|k| k.to_string()).unwrap_or_default(),
            r.mood.map(|m| m.to_string()).unwrap_or_default(),
            r.score,
            r.tempo_distance,
            r.key_distance,
        );
    }

    println!();
    println!("Score = 3 x key distance + 0.2 x BPM distance (lower is better)");
}

/// Print every fingerprint in catalog order.
fn print_catalog_table(catalog: &Catalog) {
    println!(
        "{:<40} {:>4} {:>4} {:<10} {:<12}",
        "Track", "BPM", "Cam", "Key", "Mood"
    );
    println!("{}", "-".repeat(74));

    for fp in catalog {
        let fields = mixbuddy::export::csv_fields(fp);
        match fp.error() {
            Some(error) => println!("{:<40} error: {}", truncate_title(&fp.filename, 40), error),
            None => println!(
                "{:<40} {:>4} {:>4} {:<10} {:<12}",
                truncate_title(&fields[0], 40),
                fields[1],
                fields[2],
                fields[3],
                fields[4],
            ),
        }
    }
}
