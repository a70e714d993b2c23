mod cli;
mod source;

use crate::cli::{Command, ListArgs, RenderTarget, CLI};
use crate::source::CountingSource;
use anyhow::Context;
use clap::Parser;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use terra_cache::{
    CacheConfig, ClientEnvironment, KeyedAsyncCache, ResolveOptions, ServerEnvironment,
};
use terra_client::{ClientConfig, RestCountriesClient};
use terra_core::{format_population, Country, CountrySource, Environment};
use terra_orchestrator::FetchOrchestrator;
use terra_repository::{CountryRepository, SortState, ViewQuery};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = CLI::parse();

    info!(
        api_base_url = %config.api_base_url,
        cache_ttl_ms = config.cache_ttl_ms,
        cache_disabled = config.cache_disabled,
        "starting terra"
    );

    let client = RestCountriesClient::new(
        ClientConfig::builder()
            .base_url(config.api_base_url.clone())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build(),
    )?;
    let settings = Settings::from(&config);

    match config.command {
        Command::List(args) => {
            let orchestrator = settings.orchestrator(client, Arc::new(ClientEnvironment::empty()));
            list(&orchestrator, args).await?;
        }
        Command::Detail { code, json } => {
            let orchestrator = settings.orchestrator(client, Arc::new(ClientEnvironment::empty()));
            let country = orchestrator.fetch_detail(&code).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&country)?);
            } else {
                print_detail(&orchestrator, &country);
            }
        }
        Command::Render { out, target } => {
            let environment = Arc::new(ServerEnvironment::new());
            let orchestrator = settings.orchestrator(client, environment.clone());
            load(&orchestrator, &target).await?;

            let payload = environment.payload();
            tokio::fs::write(&out, payload.to_json()?)
                .await
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!(out = %out.display(), entries = payload.len(), "wrote transfer payload");
        }
        Command::Hydrate { snapshot, target } => {
            let json = tokio::fs::read_to_string(&snapshot)
                .await
                .with_context(|| format!("failed to read {}", snapshot.display()))?;
            let environment = ClientEnvironment::from_json(&json).context("invalid snapshot")?;

            let (source, requests) = CountingSource::new(client);
            let orchestrator = settings.orchestrator(source, Arc::new(environment));
            load(&orchestrator, &target).await?;

            println!(
                "hydrated {} countries with {} network request(s)",
                orchestrator.repository().len(),
                requests.load(Ordering::Relaxed)
            );
        }
    }

    Ok(())
}

/// Cache settings shared by every command.
struct Settings {
    cache: CacheConfig,
    options: ResolveOptions,
}

impl From<&CLI> for Settings {
    fn from(config: &CLI) -> Self {
        Self {
            cache: CacheConfig::builder()
                .enabled(!config.cache_disabled)
                .build(),
            options: ResolveOptions::builder()
                .ttl(Duration::from_millis(config.cache_ttl_ms))
                .build(),
        }
    }
}

impl Settings {
    fn orchestrator<S: CountrySource>(
        &self,
        source: S,
        environment: Arc<dyn Environment>,
    ) -> FetchOrchestrator<S> {
        let cache = KeyedAsyncCache::with_config(environment, self.cache.clone());
        FetchOrchestrator::new(source, cache, Arc::new(CountryRepository::new()))
            .with_options(self.options.clone())
    }
}

async fn load<S: CountrySource>(
    orchestrator: &FetchOrchestrator<S>,
    target: &RenderTarget,
) -> anyhow::Result<()> {
    orchestrator.fetch_list(target.region.map(Into::into)).await?;
    if let Some(code) = &target.detail {
        orchestrator.fetch_detail(code).await?;
    }
    Ok(())
}

async fn list<S: CountrySource>(
    orchestrator: &FetchOrchestrator<S>,
    args: ListArgs,
) -> anyhow::Result<()> {
    let region = args.region.map(Into::into);
    orchestrator.fetch_list(region).await?;

    let query = ViewQuery {
        region,
        search: args.search,
        search_all: args.search_all,
        sort: SortState::new(args.sort.into(), args.order.into()),
    };
    let rows = orchestrator.view(&query);
    for country in rows.iter() {
        println!(
            "{:<4} {:<44} {:>15}  {:<10} {}",
            country.code.as_str(),
            country.name,
            format_population(country.population),
            country.region,
            country.capital
        );
    }
    info!(rows = rows.len(), sort = %args.sort, order = %args.order, "listed countries");
    Ok(())
}

fn print_detail<S: CountrySource>(orchestrator: &FetchOrchestrator<S>, country: &Country) {
    let join = |values: Vec<String>| {
        if values.is_empty() {
            "N/A".to_string()
        } else {
            values.join(", ")
        }
    };

    println!("{} ({})", country.name, country.code);
    if let Some(native_name) = &country.native_name {
        println!("  Native name:      {native_name}");
    }
    println!("  Population:       {}", format_population(country.population));
    println!("  Region:           {}", country.region);
    println!(
        "  Sub region:       {}",
        country.subregion.as_deref().unwrap_or("N/A")
    );
    println!("  Capital:          {}", country.capital);
    println!(
        "  Top level domain: {}",
        join(country.top_level_domains.clone().unwrap_or_default())
    );
    println!(
        "  Currencies:       {}",
        join(
            country
                .currencies
                .iter()
                .flatten()
                .filter_map(|c| c.name.clone())
                .collect()
        )
    );
    println!(
        "  Languages:        {}",
        join(
            country
                .languages
                .iter()
                .flatten()
                .filter_map(|l| l.name.clone())
                .collect()
        )
    );

    // neighbours missing from the repository are shown by code
    let borders = country
        .borders
        .iter()
        .flatten()
        .map(|code| {
            orchestrator
                .lookup(code)
                .map(|border| border.name)
                .unwrap_or_else(|| code.clone())
        })
        .collect();
    println!("  Border countries: {}", join(borders));
}
