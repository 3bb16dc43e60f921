//! Interactive terminal facade for the multi-source vacancy aggregator.

use anyhow::Context;
use clap::Parser;
use config::AppConfig;
use models::{SearchParams, Vacancy};
use sources::SearchResult;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// Interactive multi-source vacancy search.
#[derive(Debug, Parser)]
#[command(name = "vacctl", version)]
struct Args {
    /// Path to an optional YAML configuration file.
    #[arg(long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(flatten)]
    log: cli_common::LogArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    cli_common::init_logging(&args.log);

    let config = AppConfig::load(args.config.as_deref())?;
    let manager = Arc::new(wire_manager(&config)?);
    tracing::info!(sources = ?manager.source_names(), "aggregator ready");

    let outcome = run_menu(&manager).await;
    manager.shutdown().await;
    outcome
}

fn wire_manager(config: &AppConfig) -> anyhow::Result<manager::Manager> {
    let registry = config.registry();
    let enabled = config.enabled_sources();
    anyhow::ensure!(!enabled.is_empty(), "no sources are enabled");

    let sources = registry
        .create_enabled(&enabled)
        .context("creating enabled sources")?;

    let shards = config.cache.num_of_shards;
    let results = cache::Cache::new(shards, config.cache.search.sweep);
    let index = cache::Cache::new(shards, config.cache.vacancy.sweep);
    let details = cache::Cache::new(shards, config.cache.vacancy.sweep);

    let endpoints = sources
        .iter()
        .map(|source| (source.name().to_string(), source.health_endpoint()))
        .collect();
    let health = Arc::new(
        health::HealthManager::new(config.health.clone(), endpoints)
            .context("starting health manager")?,
    );

    Ok(manager::Manager::new(
        config.manager_config(),
        sources,
        results,
        index,
        details,
        health,
    ))
}

async fn run_menu(manager: &Arc<manager::Manager>) -> anyhow::Result<()> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    println!("Multi-source vacancy search");
    println!("===========================");

    loop {
        println!();
        println!("Menu:");
        println!("1. Search vacancies across sources");
        println!("2. Short vacancy details by id");
        println!("3. Full vacancy details by id");
        println!("4. Exit");

        let Some(choice) = prompt(&mut input, "Choose an action: ").await? else {
            return Ok(());
        };

        let outcome = match choice.as_str() {
            "1" => multi_search(manager, &mut input).await,
            "2" => vacancy_details(manager, &mut input, false).await,
            "3" => vacancy_details(manager, &mut input, true).await,
            "4" => {
                println!("Bye!");
                return Ok(());
            }
            _ => {
                println!("Unknown choice, try again.");
                Ok(())
            }
        };

        if let Err(err) = outcome {
            println!("Error: {err:#}");
        }
    }
}

async fn multi_search(
    manager: &Arc<manager::Manager>,
    input: &mut Lines<BufReader<Stdin>>,
) -> anyhow::Result<()> {
    let Some(text) = prompt(input, "Search query: ").await? else {
        return Ok(());
    };

    let per_page = match prompt(input, "Vacancies per source (max 50): ").await? {
        Some(raw) => raw.parse::<u32>().ok().filter(|n| *n > 0).unwrap_or(20),
        None => 20,
    };

    let params = SearchParams {
        text,
        per_page: per_page.min(50),
        ..SearchParams::default()
    };

    let results = manager.multi_search(params.clone()).await?;
    print_search_results(&results, params.per_page as usize);
    Ok(())
}

async fn vacancy_details(
    manager: &Arc<manager::Manager>,
    input: &mut Lines<BufReader<Stdin>>,
    full: bool,
) -> anyhow::Result<()> {
    let Some(id) = prompt(input, "Vacancy id: ").await? else {
        return Ok(());
    };
    anyhow::ensure!(!id.is_empty(), "vacancy id cannot be empty");

    let Some(source) = prompt(input, "Source (hh/superjob): ").await? else {
        return Ok(());
    };

    println!("Loading...");
    let vacancy = manager.vacancy_details(&source, &id).await?;
    print_vacancy(&vacancy, full);
    Ok(())
}

fn print_search_results(results: &[SearchResult], shown_per_source: usize) {
    let mut total = 0;

    for result in results {
        println!();
        println!("{}:", result.source);
        println!("  took {}", humanize(result.elapsed));

        if let Some(error) = &result.error {
            println!("  failed: {error}");
            continue;
        }

        println!("  found {} vacancies", result.vacancies.len());
        total += result.vacancies.len();

        for (i, vacancy) in result.vacancies.iter().take(shown_per_source).enumerate() {
            println!(
                "    {}. {} - {}, company: {}, url: {}, id: {}",
                i + 1,
                vacancy.job,
                vacancy.salary_text,
                vacancy.company,
                vacancy.url,
                vacancy.id
            );
        }
        if result.vacancies.len() > shown_per_source {
            println!("    ... and {} more", result.vacancies.len() - shown_per_source);
        }
    }

    println!();
    println!("Total found: {total} vacancies");
}

fn print_vacancy(vacancy: &Vacancy, full: bool) {
    let rule = "=".repeat(50);
    println!("{rule}");
    println!("{}", vacancy.job);
    println!("{rule}");
    println!("Employer:  {}", vacancy.company);
    println!("Salary:    {}", vacancy.salary_text);
    println!("Location:  {}", vacancy.area);
    if let Some(published_at) = vacancy.published_at {
        println!("Published: {}", published_at.format("%d.%m.%Y %H:%M"));
    }
    println!("Link:      {}", vacancy.url);
    println!("Id:        {}", vacancy.id);

    if full {
        let mut description = vacancy.description.clone();
        if description.len() > 1000 {
            let cut = description
                .char_indices()
                .nth(1000)
                .map(|(i, _)| i)
                .unwrap_or(description.len());
            description.truncate(cut);
            description.push_str("...");
        }
        if !description.is_empty() {
            println!("Description:");
            println!("{description}");
        }
    }
    println!("{rule}");
}

fn humanize(elapsed: std::time::Duration) -> String {
    if elapsed.as_secs() >= 1 {
        format!("{:.2}s", elapsed.as_secs_f64())
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}

async fn prompt(
    input: &mut Lines<BufReader<Stdin>>,
    message: &str,
) -> anyhow::Result<Option<String>> {
    use std::io::Write;

    print!("{message}");
    std::io::stdout().flush().context("flushing stdout")?;

    let line = input.next_line().await.context("reading stdin")?;
    Ok(line.map(|line| line.trim().to_string()))
}
