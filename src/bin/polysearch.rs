//! CLI binary for polysearch.

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use polysearch::engine::catalog;
use polysearch::engine::{
    FilterDomain, FilterValue, Provider, ProviderType, SearchRequest, Secret, SortKey, TimeRange,
};
use polysearch::{App, SecretRef};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// polysearch: one query across many search providers.
#[derive(Parser)]
#[command(name = "polysearch", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, env = "POLYSEARCH_CONFIG")]
    config: Option<PathBuf>,

    /// Print JSON instead of a table.
    #[arg(long, global = true)]
    json: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// List built-in and user-added providers.
    Providers,

    /// List provider templates.
    Templates,

    /// Show the filters a provider exposes.
    Filters {
        /// Provider id.
        provider: String,
    },

    /// Suggest a provider type and configuration for a URL.
    Detect {
        /// URL to examine.
        url: String,
    },

    /// Check a credential against a provider endpoint.
    Validate {
        /// Provider type.
        #[arg(long = "type")]
        provider_type: ProviderType,

        /// Provider base URL.
        #[arg(long)]
        base_url: Option<String>,

        /// Environment variable holding the credential.
        #[arg(long)]
        credential_env: String,
    },

    /// Add a provider from a template, a detected URL, or explicit fields.
    Add(AddArgs),

    /// Search the selected providers.
    Search(SearchArgs),
}

#[derive(Args)]
struct AddArgs {
    /// Start from a provider template.
    #[arg(long, conflicts_with = "detect")]
    template: Option<String>,

    /// Start from the detection result for a URL.
    #[arg(long)]
    detect: Option<String>,

    /// Provider id (required without --template or --detect).
    #[arg(long)]
    id: Option<String>,

    /// Display name.
    #[arg(long)]
    name: Option<String>,

    /// Provider type (required without --template or --detect).
    #[arg(long = "type")]
    provider_type: Option<ProviderType>,

    /// Endpoint URL.
    #[arg(long)]
    base_url: Option<String>,

    /// Type-specific setting, `key=value`. Repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    settings: Vec<String>,

    /// Custom header, `name=value`. Repeatable.
    #[arg(long = "header", value_name = "NAME=VALUE")]
    headers: Vec<String>,

    /// Exposed filter key. Repeatable.
    #[arg(long = "filter", value_name = "KEY")]
    filters: Vec<String>,

    /// Environment variable holding the credential; remembered in the config.
    #[arg(long)]
    credential_env: Option<String>,

    /// Require a validated credential.
    #[arg(long)]
    requires_credential: bool,
}

#[derive(Args)]
struct SearchArgs {
    /// Query text.
    query: String,

    /// Provider id to search. Repeatable.
    #[arg(short, long = "provider", required = true)]
    providers: Vec<String>,

    /// Sort order.
    #[arg(long, default_value = "relevance")]
    sort: SortKey,

    /// Time range.
    #[arg(long, default_value = "anytime")]
    time: TimeRange,

    /// Result language.
    #[arg(long, default_value = "en")]
    language: String,

    /// Filter override, `provider.key=value`. Repeatable.
    #[arg(short, long = "filter", value_name = "PROVIDER.KEY=VALUE")]
    filters: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("polysearch=info,polysearch_engine=info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(polysearch::paths::config_file);
    let mut app = App::from_config_file(&config_path)
        .with_context(|| format!("failed to start from '{}'", config_path.display()))?;
    for warning in app.warnings() {
        eprintln!("warning: {warning}");
    }

    match cli.command {
        Command::Providers => list_providers(&app, cli.json),
        Command::Templates => list_templates(cli.json),
        Command::Filters { provider } => list_filters(&app, &provider, cli.json),
        Command::Detect { url } => {
            let detection = app.detect(&url).await;
            if cli.json {
                return print_json(&detection);
            }
            println!("type:      {}", detection.provider_type);
            println!("id:        {}", detection.suggested_id);
            println!("name:      {}", detection.suggested_name);
            println!("key:       {}", if detection.api_key_required { "required" } else { "not required" });
            for (key, value) in &detection.config {
                println!("config:    {key} = {value}");
            }
            if let Some(reason) = detection.fallback {
                println!("fallback:  {reason}");
            }
            Ok(())
        }
        Command::Validate {
            provider_type,
            base_url,
            credential_env,
        } => {
            let credential = read_credential(&credential_env)?;
            let validation = app
                .validate(provider_type, base_url.as_deref(), Some(&credential))
                .await;
            if cli.json {
                print_json(&validation)?;
            } else {
                println!("{validation}");
            }
            if !validation.valid {
                std::process::exit(2);
            }
            Ok(())
        }
        Command::Add(args) => add_provider(&mut app, args, cli.json).await,
        Command::Search(args) => search(&app, args, cli.json).await,
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_credential(var: &str) -> anyhow::Result<Secret> {
    let value = std::env::var(var).with_context(|| format!("environment variable '{var}' not set"))?;
    Ok(Secret::new(value))
}

fn split_pair(raw: &str, what: &str) -> anyhow::Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => bail!("invalid {what} '{raw}', expected NAME=VALUE"),
    }
}

/// A copy of `provider` that is safe to print.
fn without_credential(provider: &Provider) -> Provider {
    let mut provider = provider.clone();
    provider.credential = None;
    provider
}

fn list_providers(app: &App, json: bool) -> anyhow::Result<()> {
    let providers = app.providers();
    if json {
        let redacted: Vec<Provider> = providers.iter().map(|p| without_credential(p)).collect();
        return print_json(&redacted);
    }
    println!("{:<14} {:<20} {:<11} {:<8} FILTERS", "ID", "NAME", "TYPE", "ORIGIN");
    for provider in &providers {
        let origin = if app.registry().is_builtin(&provider.id) { "built-in" } else { "custom" };
        println!(
            "{:<14} {:<20} {:<11} {:<8} {}",
            provider.id,
            provider.name,
            provider.provider_type.as_str(),
            origin,
            provider.filters.join(", ")
        );
    }
    Ok(())
}

fn list_templates(json: bool) -> anyhow::Result<()> {
    let templates = catalog::templates();
    if json {
        return print_json(&templates);
    }
    println!("{:<14} {:<11} {:<5} DESCRIPTION", "ID", "TYPE", "KEY");
    for template in &templates {
        println!(
            "{:<14} {:<11} {:<5} {}",
            template.id,
            template.provider_type.as_str(),
            if template.requires_api_key { "yes" } else { "no" },
            template.description
        );
    }
    Ok(())
}

fn list_filters(app: &App, provider: &str, json: bool) -> anyhow::Result<()> {
    let descriptors = app.filters_for(provider)?;
    if json {
        return print_json(&descriptors);
    }
    println!("{:<16} {:<14} VALUES", "KEY", "DEFAULT");
    for descriptor in &descriptors {
        let values = match &descriptor.domain {
            FilterDomain::Choice { options } | FilterDomain::MultiChoice { options } => {
                options.join("|")
            }
            FilterDomain::Range { min, max: Some(max) } => format!("{min}..={max}"),
            FilterDomain::Range { min, max: None } => format!("{min}.."),
            FilterDomain::Boolean => "true|false".to_string(),
            FilterDomain::Text => "text".to_string(),
        };
        println!("{:<16} {:<14} {values}", descriptor.key, descriptor.default.to_string());
    }
    Ok(())
}

async fn add_provider(app: &mut App, args: AddArgs, json: bool) -> anyhow::Result<()> {
    let credential = args
        .credential_env
        .as_deref()
        .map(read_credential)
        .transpose()?;

    let mut provider = if let Some(id) = &args.template {
        catalog::template(id)
            .with_context(|| format!("unknown template '{id}'"))?
            .instantiate(credential.clone())
    } else if let Some(url) = &args.detect {
        let detection = app.detect(url).await;
        if let Some(reason) = detection.fallback {
            eprintln!("warning: {reason}; using the {} type", detection.provider_type);
        }
        detection.into_provider(credential.clone())
    } else {
        let (Some(id), Some(provider_type)) = (&args.id, args.provider_type) else {
            bail!("--id and --type are required without --template or --detect");
        };
        let mut provider = Provider::new(id.clone(), id.clone(), provider_type);
        provider.credential = credential.clone();
        provider
    };

    if let Some(id) = args.id {
        provider.id = id;
    }
    if let Some(name) = args.name {
        provider.name = name;
    }
    if let Some(provider_type) = args.provider_type {
        provider.provider_type = provider_type;
    }
    if let Some(base_url) = args.base_url {
        provider.base_url = Some(base_url);
    }
    for raw in &args.settings {
        let (key, value) = split_pair(raw, "setting")?;
        provider.config.insert(key, serde_json::Value::String(value));
    }
    for raw in &args.headers {
        let (name, value) = split_pair(raw, "header")?;
        provider.custom_headers.insert(name, value);
    }
    if !args.filters.is_empty() {
        provider.filters = args.filters;
    }
    if args.requires_credential {
        provider.requires_credential = true;
    }

    let registration = app.add_provider(provider).await?;
    if let Some(var) = args.credential_env {
        app.remember_credential(&registration.provider.id, SecretRef::Env { var })?;
    }

    if json {
        #[derive(Serialize)]
        struct Added<'a> {
            provider: &'a Provider,
            stored_id: Option<&'a str>,
            warnings: &'a [String],
        }
        return print_json(&Added {
            provider: &without_credential(&registration.provider),
            stored_id: registration.stored_id.as_deref(),
            warnings: &registration.warnings,
        });
    }
    println!(
        "added {} ({})",
        registration.provider.id, registration.provider.provider_type
    );
    for warning in &registration.warnings {
        eprintln!("warning: {warning}");
    }
    Ok(())
}

async fn search(app: &App, args: SearchArgs, json: bool) -> anyhow::Result<()> {
    let mut request = SearchRequest::new(args.query, args.providers)
        .with_sort(args.sort)
        .with_time_range(args.time)
        .with_language(args.language);
    for raw in &args.filters {
        let (target, value) = split_pair(raw, "filter")?;
        let Some((provider, key)) = target.split_once('.') else {
            bail!("invalid filter '{raw}', expected PROVIDER.KEY=VALUE");
        };
        request = request.with_filter(provider, key, FilterValue::parse_loose(&value));
    }

    let response = app.search(&request).await?;
    if json {
        return print_json(&response);
    }

    for (rank, result) in response.results.iter().enumerate() {
        println!("{:>3}. [{}] {}", rank + 1, result.provider_id, result.title);
        if let Some(url) = &result.url {
            println!("     {url}");
        }
        if !result.snippet.is_empty() {
            println!("     {}", result.snippet);
        }
    }
    if response.results.is_empty() {
        println!("no results");
    }
    for warning in &response.warnings {
        eprintln!("warning: {warning}");
    }
    Ok(())
}
