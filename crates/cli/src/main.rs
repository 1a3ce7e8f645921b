mod artifacts;
mod config;
mod metrics;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use extract::{FormPipeline, PageOutcome};
use forms::PageFieldSet;
use llm::{GeminiClient, PdfDocument, RetryingClient};
use metrics::{RunSummary, StageTimer};

#[derive(Debug, Parser)]
#[command(name = "pa-autofill", about = "Fill Prior Authorization forms from referral packages")]
struct Cli {
    /// JSON config file; flags below override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for fields.json, enrichment.json and answers.json.
    #[arg(long, global = true)]
    work_dir: Option<PathBuf>,

    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, global = true, env = "GEMINI_MODEL")]
    model: Option<String>,

    /// Enrichment requests allowed in flight at once.
    #[arg(long, global = true)]
    max_concurrency: Option<usize>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the form's fields per page.
    Fields { form: PathBuf },
    /// Describe every page's fields with the model.
    Enrich { form: PathBuf },
    /// Answer the enriched fields from a referral package.
    Answer {
        referral: PathBuf,
        #[arg(long)]
        enrichment: Option<PathBuf>,
    },
    /// Write answers into a copy of the form.
    Fill {
        form: PathBuf,
        #[arg(long)]
        answers: Option<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// All stages end to end.
    Run {
        form: PathBuf,
        referral: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}

impl Cli {
    fn load_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)?,
            None => AppConfig::default(),
        };
        if let Some(dir) = &self.work_dir {
            config.output.work_dir = dir.clone();
        }
        if let Some(model) = &self.model {
            config.provider.model = model.clone();
        }
        if let Some(n) = self.max_concurrency {
            config.concurrency.max_concurrent_llm_calls = n;
        }
        config.provider.api_key = self.api_key.clone();
        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_pipeline(config: &AppConfig) -> Result<FormPipeline<GeminiClient>> {
    let api_key = config
        .provider
        .api_key
        .clone()
        .context("GEMINI_API_KEY is not set (use --api-key or the environment)")?;
    let client = GeminiClient::new(
        config.provider.base_url.clone(),
        config.provider.model.clone(),
        api_key,
    );
    let policy = config.retry_policy();
    info!(
        model = client.model(),
        max_retries = policy.max_retries(),
        attempt_timeout_secs = policy.attempt_timeout().as_secs(),
        "Using Gemini model"
    );
    Ok(FormPipeline::new(
        RetryingClient::new(client, policy),
        config.pipeline_settings(),
    ))
}

fn print_fields(fields: &PageFieldSet) {
    println!("\n=== FORM FIELDS ===");
    for (page, records) in fields.iter() {
        println!("  Page {page}: {} fields", records.len());
        for record in records {
            println!("    {:<24} {:<10} {}", record.name, record.provider_type_name, record.label);
        }
    }
    println!("  Total: {} fields on {} pages", fields.field_count(), fields.page_count());
}

async fn read_form(form: &Path) -> Result<(PdfDocument, PageFieldSet)> {
    let fields = forms::extract_fields(form)
        .with_context(|| format!("Failed to read form fields from {}", form.display()))?;
    let document = PdfDocument::load(form).await?;
    Ok((document, fields))
}

async fn cmd_fields(config: &AppConfig, form: &Path) -> Result<()> {
    let fields = forms::extract_fields(form)
        .with_context(|| format!("Failed to read form fields from {}", form.display()))?;
    artifacts::write_json(&config.fields_path(), &fields).await?;
    print_fields(&fields);
    Ok(())
}

async fn cmd_enrich(config: &AppConfig, form: &Path) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let (document, fields) = read_form(form).await?;
    artifacts::write_json(&config.fields_path(), &fields).await?;

    let enriched = pipeline
        .enrich(&document, &fields)
        .await
        .context("Context enrichment failed")?;
    artifacts::write_json(&config.enrichment_path(), &enriched).await?;
    println!("Enriched {} pages", enriched.len());
    Ok(())
}

async fn cmd_answer(config: &AppConfig, referral: &Path, enrichment: Option<&Path>) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let enrichment_path = enrichment.map(Path::to_path_buf).unwrap_or_else(|| config.enrichment_path());
    let enriched = artifacts::read_enrichment(&enrichment_path).await?;
    let document = PdfDocument::load(referral).await?;

    let extraction = pipeline.extract_answers(&document, &enriched).await;
    artifacts::write_json(&config.answers_path(), &extraction.records).await?;
    report_outcomes(&extraction);
    println!("Extracted {} answers", extraction.records.len());
    Ok(())
}

async fn cmd_fill(config: &AppConfig, form: &Path, answers: Option<&Path>, output: &Path) -> Result<()> {
    let answers_path = answers.map(Path::to_path_buf).unwrap_or_else(|| config.answers_path());
    let records = artifacts::read_answers(&answers_path).await?;
    if !extract::fill(form, &records, output) {
        anyhow::bail!("No fields were written to {}", output.display());
    }
    println!("Filled form written to {}", output.display());
    Ok(())
}

async fn cmd_run(config: &AppConfig, form: &Path, referral: &Path, output: &Path) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let mut summary = RunSummary::default();

    let timer = StageTimer::start();
    let (form_doc, fields) = read_form(form).await?;
    artifacts::write_json(&config.fields_path(), &fields).await?;
    summary.pages = fields.page_count();
    summary.fields = fields.field_count();
    summary.record_stage("extract", timer);

    let timer = StageTimer::start();
    let enriched = pipeline
        .enrich(&form_doc, &fields)
        .await
        .context("Context enrichment failed")?;
    artifacts::write_json(&config.enrichment_path(), &enriched).await?;
    summary.enriched_pages = enriched.len();
    summary.record_stage("enrich", timer);

    let timer = StageTimer::start();
    let referral_doc = PdfDocument::load(referral).await?;
    let extraction = pipeline.extract_answers(&referral_doc, &enriched).await;
    artifacts::write_json(&config.answers_path(), &extraction.records).await?;
    report_outcomes(&extraction);
    summary.answers = extraction.records.len();
    summary.usable_answers = extract::build_answer_map(&extraction.records).len();
    summary.parse_failures = extraction.parse_failures();
    summary.failed_pages = extraction.failed_pages();
    summary.record_stage("answer", timer);

    let timer = StageTimer::start();
    summary.filled = extract::fill(form, &extraction.records, output);
    summary.record_stage("fill", timer);

    info!(
        pages = summary.pages,
        fields = summary.fields,
        answers = summary.answers,
        parse_failures = summary.parse_failures,
        filled = summary.filled,
        total_ms = summary.total_ms(),
        "Run complete"
    );
    summary.print();

    if !summary.filled {
        anyhow::bail!("No fields were written to {}", output.display());
    }
    Ok(())
}

fn report_outcomes(extraction: &extract::AnswerExtraction) {
    for (page, outcome) in &extraction.outcomes {
        match outcome {
            PageOutcome::Answered { .. } => {}
            PageOutcome::ParseFailure => warn!(page, "Page answer was not valid JSON"),
            PageOutcome::Exhausted => warn!(page, "Page ran out of attempts"),
            PageOutcome::Empty => warn!(page, "Page got no response text"),
            PageOutcome::Failed { error } => warn!(page, error = %error, "Page failed"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = cli.load_config()?;

    match &cli.command {
        Command::Fields { form } => cmd_fields(&config, form).await,
        Command::Enrich { form } => cmd_enrich(&config, form).await,
        Command::Answer {
            referral,
            enrichment,
        } => cmd_answer(&config, referral, enrichment.as_deref()).await,
        Command::Fill {
            form,
            answers,
            output,
        } => cmd_fill(&config, form, answers.as_deref(), output).await,
        Command::Run {
            form,
            referral,
            output,
        } => cmd_run(&config, form, referral, output).await,
    }
}
