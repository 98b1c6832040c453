//! `repcheck`: reproducibility checklist compliance from the command line.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use repcheck_core::{AnalysisSummary, Checklist, ComplianceTally, ComplianceVerdict, Manuscript};
use repcheck_runtime::{
    AnalysisReport, ComplianceAnalyzer, ComplianceStore, FileStore, MetadataExtractor, ModelClient,
    PlainTextExtractor, ProviderRegistry, RuntimeConfig, SummarizeService, TextExtractor,
};

#[derive(Parser, Debug)]
#[command(name = "repcheck")]
#[command(about = "Check manuscripts against a reproducibility reporting checklist")]
#[command(version)]
struct Cli {
    /// Runtime configuration (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a checklist file and list its items
    Checklist {
        file: PathBuf,
    },

    /// Extract title, authors and DOI from manuscript text
    Metadata {
        text: PathBuf,
    },

    /// Judge every checklist item and store the verdicts
    Analyze(AnalyzeArgs),

    /// Summarize stored verdicts by category
    Summarize(StoreArgs),

    /// Analyze, then summarize
    Run(AnalyzeArgs),
}

#[derive(Args, Debug)]
struct StoreArgs {
    #[arg(long)]
    doi: String,

    #[arg(long)]
    checklist: PathBuf,

    /// Directory holding one results document per DOI
    #[arg(long, default_value = "repcheck-results")]
    store: PathBuf,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Extracted manuscript text (UTF-8)
    #[arg(long)]
    text: PathBuf,

    /// Also extract and store title and authors
    #[arg(long)]
    with_metadata: bool,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("repcheck error: {error:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Checklist { file } => {
            let checklist = load_checklist(&file)?;
            print_json(&json!({
                "items": checklist.len(),
                "categories": checklist.categories(),
                "checklist": checklist.items(),
            }))
        }
        Command::Metadata { text } => {
            let text = read_text(&text)?;
            let client = model_client(&config)?;
            let metadata = MetadataExtractor::new(client, &config)?
                .extract(&text)
                .await
                .context("metadata extraction failed")?;
            print_json(&metadata)
        }
        Command::Analyze(args) => {
            let pipeline = Pipeline::open(&config, &args.store).await?;
            let manuscript = pipeline.manuscript(&args).await?;
            let report = pipeline.analyze(&manuscript, &args.text).await?;
            print_json(&json!({
                "analysis": report_json(&report),
                "usage": pipeline.client.usage().snapshot(),
            }))
        }
        Command::Summarize(args) => {
            let pipeline = Pipeline::open(&config, &args).await?;
            let manuscript = pipeline
                .store
                .get_manuscript(&args.doi)
                .await?
                .unwrap_or_else(|| Manuscript::new(&args.doi));
            let verdicts = pipeline.store.get_verdicts(&args.doi).await?;
            if verdicts.is_empty() {
                anyhow::bail!("no stored verdicts for {}; run `repcheck analyze` first", args.doi);
            }
            let summary = pipeline.summarize(&manuscript, &verdicts).await?;
            print_json(&json!({
                "summary": summary,
                "usage": pipeline.client.usage().snapshot(),
            }))
        }
        Command::Run(args) => {
            let pipeline = Pipeline::open(&config, &args.store).await?;
            let manuscript = pipeline.manuscript(&args).await?;
            let report = pipeline.analyze(&manuscript, &args.text).await?;
            let summary = pipeline.summarize(&manuscript, &report.verdicts).await?;
            print_json(&json!({
                "analysis": report_json(&report),
                "summary": summary,
                "usage": pipeline.client.usage().snapshot(),
            }))
        }
    }
}

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("REPCHECK_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(RuntimeConfig::default()),
    }
}

fn load_checklist(path: &Path) -> Result<Checklist> {
    Checklist::from_file(path).with_context(|| format!("invalid checklist {}", path.display()))
}

fn read_text(path: &Path) -> Result<String> {
    PlainTextExtractor::new()
        .extract(path)
        .with_context(|| format!("could not read manuscript text from {}", path.display()))
}

fn model_client(config: &RuntimeConfig) -> Result<ModelClient> {
    let provider = ProviderRegistry::with_defaults()
        .create(&config.provider)
        .with_context(|| format!("could not create {} provider", config.provider.kind))?;
    Ok(ModelClient::new(provider, config))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report_json(report: &AnalysisReport) -> serde_json::Value {
    let tally = ComplianceTally::from_verdicts(&report.verdicts);
    json!({
        "doi": report.doi,
        "analyzed": report.verdicts.len(),
        "failed": report.failure_count(),
        "failed_items": report.failed_items,
        "tally": {
            "yes": tally.yes,
            "no": tally.no,
            "partial": tally.partial,
            "not_applicable": tally.not_applicable,
        },
        "score": tally.score(),
        "verdicts": report.verdicts,
    })
}

/// Everything a command needs once the checklist and store are open.
struct Pipeline {
    checklist: Checklist,
    store: Arc<FileStore>,
    client: ModelClient,
    config: RuntimeConfig,
}

impl Pipeline {
    async fn open(config: &RuntimeConfig, args: &StoreArgs) -> Result<Self> {
        let checklist = load_checklist(&args.checklist)?;
        let store = FileStore::open(&args.store, checklist.clone())
            .await
            .with_context(|| format!("could not open store {}", args.store.display()))?;
        Ok(Self {
            checklist,
            store: Arc::new(store),
            client: model_client(config)?,
            config: config.clone(),
        })
    }

    /// The stored manuscript record, refreshed from the text when asked.
    async fn manuscript(&self, args: &AnalyzeArgs) -> Result<Manuscript> {
        let doi = args.store.doi.as_str();
        let mut manuscript = self
            .store
            .get_manuscript(doi)
            .await?
            .unwrap_or_else(|| Manuscript::new(doi));

        if args.with_metadata {
            let text = read_text(&args.text)?;
            let metadata = MetadataExtractor::new(self.client.clone(), &self.config)?
                .extract(&text)
                .await
                .context("metadata extraction failed")?;
            manuscript = metadata.into_manuscript(Some(doi));
            // Results are keyed by the DOI given on the command line.
            manuscript.doi = doi.to_string();
        }

        self.store.upsert_manuscript(&manuscript).await?;
        Ok(manuscript)
    }

    async fn analyze(&self, manuscript: &Manuscript, text_path: &Path) -> Result<AnalysisReport> {
        let text = read_text(text_path)?;
        let store: Arc<dyn ComplianceStore> = self.store.clone();
        let analyzer = ComplianceAnalyzer::new(self.client.clone(), store, &self.config);
        let report = analyzer
            .analyze_manuscript(manuscript, &text, self.checklist.items())
            .await
            .with_context(|| format!("analysis of {} failed", manuscript.doi))?;

        if report.failure_count() > 0 {
            eprintln!(
                "warning: {} of {} items fell back to n/a: {}",
                report.failure_count(),
                report.verdicts.len(),
                report.failed_items.join(", ")
            );
        }
        Ok(report)
    }

    async fn summarize(
        &self,
        manuscript: &Manuscript,
        verdicts: &[ComplianceVerdict],
    ) -> Result<AnalysisSummary> {
        let store: Arc<dyn ComplianceStore> = self.store.clone();
        SummarizeService::new(self.client.clone(), store, &self.config)
            .summarize(manuscript, verdicts, self.checklist.items())
            .await
            .with_context(|| format!("could not store summary for {}", manuscript.doi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_command() {
        let cli = Cli::try_parse_from([
            "repcheck",
            "--verbose",
            "run",
            "--doi",
            "10.1/x",
            "--checklist",
            "checklist.yaml",
            "--text",
            "paper.txt",
        ])
        .unwrap();

        assert!(cli.verbose);
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.store.doi, "10.1/x");
        assert_eq!(args.store.store, PathBuf::from("repcheck-results"));
        assert!(!args.with_metadata);
    }

    #[test]
    fn test_summarize_requires_doi() {
        assert!(Cli::try_parse_from(["repcheck", "summarize", "--checklist", "c.json"]).is_err());
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/repcheck.yaml"))).is_err());
        assert_eq!(load_config(None).unwrap().model, "gpt-4o");
    }
}
