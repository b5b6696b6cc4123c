mod annotate;
mod catalog;
mod config;
mod crawler;
mod extract;
mod fetch;
mod paginate;
mod period;
mod rules;
mod store;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use crate::catalog::Catalog;
use crate::fetch::PageFetcher;
use crate::store::CatalogStore;

#[derive(Parser)]
#[command(name = "dvx_scraper", about = "DVX Performance tuning catalog scraper via spider.cloud")]
struct Cli {
    /// JSON config file overriding the built-in defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the full brand/model/type/engine/stage tree
    Crawl,
    /// Probe the stage sequence behind one engine URL
    Probe {
        /// Engine detail URL (stage number as trailing path segment)
        url: String,
        /// How many stage pages to probe
        #[arg(short = 'n', long, default_value = "3")]
        stages: u32,
    },
    /// Recompute ECU unlock / CPC upgrade payloads over the stored catalog
    Annotate,
    /// Show catalog record counts and data-quality tallies
    Stats,
    /// Per-engine overview table
    Overview {
        /// Filter by brand name (substring match)
        #[arg(short, long)]
        brand: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Crawl => {
            let cfg = config::load(cli.config.as_deref())?;
            let fetcher = fetch::SpiderFetcher::new(&cfg)?;
            let store = CatalogStore::new(cfg.output_path.clone());
            println!("Crawling {} ...", cfg.base_url);
            let (_, stats) = crawler::Crawler::new(&cfg, &fetcher, &store).crawl().await?;
            println!(
                "Done: {} brands, {} models, {} types, {} engines, {} stages ({} failed branches).",
                stats.brands, stats.models, stats.types, stats.engines, stats.stages,
                stats.failed_branches
            );
            println!("Catalog written to {}", store.path().display());
            Ok(())
        }
        Commands::Probe { url, stages } => {
            let cfg = config::load(cli.config.as_deref())?;
            let fetcher = fetch::SpiderFetcher::new(&cfg)?;
            for number in 1..=stages {
                let page_url = paginate::stage_url(&url, number);
                match fetcher.fetch(&page_url).await {
                    Ok(html) => match extract::parse_stage_page(&html, &cfg.selectors.stage) {
                        Ok(m) if m.is_empty() => println!("Stage {number}: empty"),
                        Ok(m) => {
                            let hp = m
                                .hp
                                .map(|p| format!("{} -> {} PK", p.stock, p.tuned))
                                .unwrap_or_else(|| "-".into());
                            let nm = m
                                .nm
                                .map(|p| format!("{} -> {} Nm", p.stock, p.tuned))
                                .unwrap_or_else(|| "-".into());
                            let price = m
                                .price
                                .map(|p| {
                                    format!(
                                        "EUR {} -> {}",
                                        p.old.map_or("-".into(), |v: i64| v.to_string()),
                                        p.new.map_or("-".into(), |v: i64| v.to_string())
                                    )
                                })
                                .unwrap_or_else(|| "-".into());
                            let label = m.engine_label.as_deref().unwrap_or("-");
                            println!("Stage {number}: {hp} | {nm} | {price} | {label}");
                        }
                        Err(e) => println!("Stage {number}: extraction failed: {e}"),
                    },
                    Err(e) => println!("Stage {number}: {e}"),
                }
            }
            Ok(())
        }
        Commands::Annotate => {
            use indicatif::{ProgressBar, ProgressStyle};

            let cfg = config::load(cli.config.as_deref())?;
            let store = CatalogStore::new(cfg.output_path.clone());
            let mut catalog = store.load()?;
            if catalog.engines.is_empty() {
                println!("No engines in catalog. Run 'crawl' first.");
                return Ok(());
            }

            println!("Re-annotating {} engines...", catalog.engines.len());
            let pb = ProgressBar::new(catalog.engines.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            let counts = annotate::annotate_catalog(&mut catalog, |n| pb.inc(n));
            pb.finish_and_clear();

            store.save(&catalog)?;
            println!(
                "Annotated {} stages: {} ECU unlock, {} CPC upgrade.",
                counts.stages, counts.ecu_unlock, counts.cpc_upgrade
            );
            Ok(())
        }
        Commands::Stats => {
            let cfg = config::load(cli.config.as_deref())?;
            let store = CatalogStore::new(cfg.output_path.clone());
            let catalog = store.load()?;
            let s = catalog.stats();
            println!("Brands:  {}", s.brands);
            println!("Models:  {}", s.models);
            println!("Types:   {}", s.types);
            println!("Engines: {}", s.engines);
            println!("Stages:  {}", s.stages);
            println!("Unknown engine codes: {}", s.unknown_codes);
            println!("Copied stages:        {}", s.copied_stages);
            println!("Stages w/o metrics:   {}", s.stages_without_metrics);
            println!("ECU unlock flags:     {}", s.ecu_unlock_flags);
            println!("CPC upgrade flags:    {}", s.cpc_upgrade_flags);
            Ok(())
        }
        Commands::Overview { brand, limit } => {
            let cfg = config::load(cli.config.as_deref())?;
            let store = CatalogStore::new(cfg.output_path.clone());
            let catalog = store.load()?;

            let filter = brand.map(|b| b.to_lowercase());
            let mut rows = Vec::new();
            for engine in &catalog.engines {
                let Some(ctx) = catalog.engine_context(engine.id) else { continue };
                if let Some(f) = &filter {
                    if !ctx.brand_name.to_lowercase().contains(f) {
                        continue;
                    }
                }
                rows.push(ctx);
                if rows.len() == limit {
                    break;
                }
            }
            if rows.is_empty() {
                println!("No engines found.");
                return Ok(());
            }

            // Compact, readable table
            println!(
                "{:>4} | {:<12} | {:<16} | {:<26} | {:<7} | {:<12} | {:>3} | {:<7}",
                "#", "Brand", "Model", "Engine", "Code", "Years", "St", "Flags"
            );
            println!("{}", "-".repeat(105));

            for (i, ctx) in rows.iter().enumerate() {
                let e = ctx.engine;
                let years = match &e.start_year {
                    Some(s) => format!("{} -> {}", s, e.end_year),
                    None => format!("-> {}", e.end_year),
                };
                println!(
                    "{:>4} | {:<12} | {:<16} | {:<26} | {:<7} | {:<12} | {:>3} | {:<7}",
                    i + 1,
                    truncate(ctx.brand_name, 12),
                    truncate(ctx.model_name, 16),
                    truncate(&e.name, 26),
                    e.code,
                    years,
                    catalog.stage_count(e.id),
                    engine_flags(&catalog, e.id)
                );
            }

            println!("\n{} engines | catalog: {}", rows.len(), store.path().display());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn engine_flags(catalog: &Catalog, engine_id: u32) -> String {
    let ecu = catalog
        .stages
        .iter()
        .any(|s| s.engine_id == engine_id && s.ecu_unlock.is_some());
    let cpc = catalog
        .stages
        .iter()
        .any(|s| s.engine_id == engine_id && s.cpc_upgrade.is_some());
    match (ecu, cpc) {
        (true, true) => "ECU+CPC".to_string(),
        (true, false) => "ECU".to_string(),
        (false, true) => "CPC".to_string(),
        (false, false) => "-".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
