use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use azdevops::azure::{HttpTransport, ReqwestTransport};
use azdevops::models::{ListRepositoriesByProjectOrOrgArgs, RepositoryValue};
use azdevops::{AzureDevOpsClient, Config, Context, RateLimitConfig, RateLimiterRegistry};

#[derive(Parser, Debug)]
#[command(name = "azdevops")]
#[command(version)]
#[command(about = "List Azure DevOps repositories for an organization or project")]
struct Args {
    /// Organization (`org`) or project (`org/project`) to list. Defaults to
    /// every org and project in AZURE_DEVOPS_ORGS / AZURE_DEVOPS_PROJECTS
    #[arg(short, long)]
    scope: Option<String>,

    /// Output format (json, text)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<String>,

    /// Include disabled repositories
    #[arg(long)]
    include_disabled: bool,

    /// Give up on a scope after this many seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Serialize)]
struct ScopeListing {
    scope: String,
    repositories: Vec<RepositoryValue>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("azdevops=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = Config::from_env()?;

    let registry = RateLimiterRegistry::new(RateLimitConfig::from(&config));
    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::with_timeout(
        Duration::from_secs(config.timeout_secs),
    )?);
    let urn = format!("azuredevops:{}", config.connection.url);
    let client = AzureDevOpsClient::new(
        &urn,
        Arc::new(config.connection),
        Some(transport),
        &registry,
    )?;

    let scopes: Vec<String> = match &args.scope {
        Some(scope) => vec![scope.clone()],
        None => client.config().scopes().map(str::to_string).collect(),
    };
    if scopes.is_empty() {
        anyhow::bail!(
            "No scope given: pass --scope or set AZURE_DEVOPS_ORGS / AZURE_DEVOPS_PROJECTS"
        );
    }
    tracing::info!("Listing {} scope(s) on {}", scopes.len(), client.base_url());

    let listings = list_scopes(&client, &scopes, &args).await?;
    output_listings(&listings, &args)?;

    Ok(())
}

async fn list_scopes(
    client: &AzureDevOpsClient,
    scopes: &[String],
    args: &Args,
) -> anyhow::Result<Vec<ScopeListing>> {
    let pb = if scopes.len() > 1 {
        let pb = ProgressBar::new(scopes.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} scopes")?
                .progress_chars("#>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let root = Context::background();
    let mut listings = Vec::with_capacity(scopes.len());

    for scope in scopes {
        let ctx = match args.timeout {
            Some(secs) => root.with_timeout(Duration::from_secs(secs)),
            None => root.clone(),
        };

        let request = ListRepositoriesByProjectOrOrgArgs::new(scope.as_str());
        let repos = client
            .list_repositories_by_project_or_org(&ctx, &request)
            .await?;

        let repositories: Vec<_> = repos
            .into_iter()
            .filter(|r| args.include_disabled || !r.is_disabled)
            .collect();
        tracing::info!("Found {} repositories in {}", repositories.len(), scope);

        listings.push(ScopeListing {
            scope: scope.clone(),
            repositories,
        });
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(listings)
}

fn output_listings(listings: &[ScopeListing], args: &Args) -> anyhow::Result<()> {
    let output = match args.format.as_str() {
        "json" => serde_json::to_string_pretty(listings)?,
        _ => format_text(listings),
    };

    if let Some(ref path) = args.output {
        std::fs::write(path, &output)?;
        tracing::info!("Output written to: {}", path);
    } else {
        println!("{}", output);
    }

    Ok(())
}

fn format_text(listings: &[ScopeListing]) -> String {
    let mut output = String::new();

    for listing in listings {
        output.push_str(&format!(
            "\n=== {} ({} repositories) ===\n",
            listing.scope,
            listing.repositories.len()
        ));
        for repo in &listing.repositories {
            let disabled = if repo.is_disabled { " [disabled]" } else { "" };
            output.push_str(&format!("  - {}{}\n", repo.name, disabled));
            output.push_str(&format!("      web: {}\n", repo.web_url));
            output.push_str(&format!("      ssh: {}\n", repo.ssh_url));
        }
    }

    output
}
