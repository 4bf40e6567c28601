use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;
use relgraph::config::{self, ClickHouseSettings, PipelineConfig};
use relgraph::domain_model::DomainModelConfig;
use relgraph::executor::{ClickHouseStore, QueryParameters};
use relgraph::QueryEngine;

/// Relgraph - run object-graph queries against ClickHouse
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Domain model YAML file
    #[arg(long)]
    model: String,

    /// Pipeline configuration YAML file (defaults to RELGRAPH_* variables)
    #[arg(long)]
    config: Option<String>,

    /// Query parameter as name=value (repeatable)
    #[arg(long = "param", value_name = "NAME=VALUE")]
    params: Vec<String>,

    /// Print the generated SQL and bind list without executing
    #[arg(long)]
    explain: bool,

    /// Deepest association path eager fetching may join
    #[arg(long)]
    max_fetch_depth: Option<usize>,

    /// Disable the statement cache
    #[arg(long)]
    no_statement_cache: bool,

    /// Query text
    query: String,
}

impl From<&Cli> for config::CliConfig {
    fn from(cli: &Cli) -> Self {
        config::CliConfig {
            max_fetch_depth: cli.max_fetch_depth,
            no_statement_cache: cli.no_statement_cache,
        }
    }
}

fn parameters(raw: &[String]) -> anyhow::Result<QueryParameters> {
    let mut params = QueryParameters::new();
    for assignment in raw {
        let (name, value) = QueryParameters::parse_assignment(assignment)
            .ok_or_else(|| anyhow!("invalid parameter `{}`, expected name=value", assignment))?;
        params.set_named(name, value);
    }
    Ok(params)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env first so a RUST_LOG set there reaches the logger
    dotenvy::dotenv().ok();
    // Initialize logger - defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let base = match &cli.config {
        Some(path) => PipelineConfig::from_yaml_file(path)?,
        None => PipelineConfig::from_env()?,
    };
    let config = PipelineConfig::from_cli(base, (&cli).into())?;

    let model = DomainModelConfig::from_yaml_file(&cli.model)
        .and_then(|definition| definition.build())
        .with_context(|| format!("loading domain model {}", cli.model))?;
    let engine = QueryEngine::new(Arc::new(model), config);
    let params = parameters(&cli.params)?;

    let prepared = engine.prepare(&cli.query)?;
    if cli.explain {
        println!("{}", prepared.explain());
        return Ok(());
    }

    let settings = ClickHouseSettings::from_env()?;
    let store = ClickHouseStore::from_settings(&settings);
    let mut session = engine.session(&store);
    if prepared.is_select() {
        let results = session.list_prepared(&prepared, &params).await?;
        println!(
            "{}",
            serde_json::to_string_pretty(&results.to_json(session.registry()))?
        );
    } else {
        let affected = session.execute_update(&cli.query, &params).await?;
        println!("{}", serde_json::json!({ "affected_rows": affected }));
    }
    session.close();
    Ok(())
}
