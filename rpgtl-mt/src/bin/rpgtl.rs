use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use rpgtl::TranslationConfig;
use rpgtl_mt::io::collect_inputs;
use rpgtl_mt::{
    BatchTranslator, LanguageModel, MockMode, MockModel, OpenAiProvider, ProviderConfig,
    RunSummary, Runner, TerminalProgress, file_line,
};
use tracing::info;

/// Translate RPG Maker MV/MZ data files with a chat-completions model
#[derive(Debug, Parser)]
#[command(name = "rpgtl", version, about)]
struct Cli {
    /// Data files or directories of `*.json` files
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Where translated files are written
    #[arg(short, long, default_value = "translated")]
    output: PathBuf,

    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Count tokens and cost without calling the model or writing files
    #[arg(long)]
    estimate: bool,

    /// Use the offline mock model (echoes its input)
    #[arg(long)]
    mock: bool,

    /// Model name, overrides OPENAI_MODEL
    #[arg(long)]
    model: Option<String>,

    /// Pages translated concurrently, overrides the settings file
    #[arg(long)]
    threads: Option<usize>,
}

fn load_config(cli: &Cli) -> Result<TranslationConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => TranslationConfig::load(path)?,
        None => TranslationConfig::default(),
    };
    if cli.estimate {
        config.estimate = true;
    }
    if let Some(threads) = cli.threads {
        config.threads = threads;
    }
    config.validate()?;
    Ok(config)
}

fn build_model(
    cli: &Cli,
    config: &TranslationConfig,
) -> Result<Arc<dyn LanguageModel>, Box<dyn std::error::Error>> {
    // estimate mode never sends a request, so no key is needed
    if cli.mock || (config.estimate && std::env::var("OPENAI_API_KEY").is_err()) {
        return Ok(Arc::new(MockModel::new(MockMode::Echo)));
    }
    let mut provider = ProviderConfig::from_env()?;
    if let Some(model) = &cli.model {
        provider.model = model.clone();
    }
    info!(model = %provider.model, base_url = %provider.base_url, "using provider");
    Ok(Arc::new(OpenAiProvider::new(provider)?))
}

async fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let config = load_config(&cli)?;
    let model = build_model(&cli, &config)?;
    let pricing = config.pricing;
    let translator = Arc::new(BatchTranslator::new(model, Arc::new(config))?);

    let inputs = collect_inputs(&cli.inputs)?;
    info!(files = inputs.len(), output = %cli.output.display(), "starting run");

    let runner = Runner::new(translator).with_progress(Arc::new(TerminalProgress::new()));
    let mut outcomes = Vec::with_capacity(inputs.len());
    for input in &inputs {
        let outcome = runner.translate_file(input, &cli.output).await;
        println!("{}", file_line(&outcome, &pricing));
        outcomes.push(outcome);
    }

    let summary = RunSummary::from_outcomes(&outcomes);
    println!("{}", summary.render(&pricing));
    Ok(summary.succeeded())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().expect("valid directive")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
