mod logging;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use gv_core::Prediction;
use gv_inference::{Pipeline, PipelineConfig};
use gv_model::{ModelConfig, ModelProvider, DEFAULT_BACKEND, DEFAULT_MODEL_PATH, DEFAULT_MODEL_URL};
use gv_web::state::DEFAULT_BODY_LIMIT;
use gv_web::{AppState, WebConfig};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        // a bare number means seconds
        if let Ok(secs) = s.parse::<u64>() {
            return Ok(HumanDuration(Duration::from_secs(secs)));
        }
        humantime::parse_duration(s)
            .map(HumanDuration)
            .map_err(|e| format!("Invalid duration {:?}: {}", s, e))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Classify grapevine leaf diseases from a photo", long_about = None)]
struct Cli {
    /// Where to download the model artifact from
    #[arg(long, global = true, default_value = DEFAULT_MODEL_URL)]
    model_url: String,
    /// Local path of the model artifact, overwritten on download
    #[arg(long, global = true, default_value = DEFAULT_MODEL_PATH)]
    model_path: PathBuf,
    #[arg(long, global = true, default_value = DEFAULT_BACKEND, help = "Model backend. Available backends: tflite (default), dummy")]
    backend: String,
    /// Give up on a download attempt after this long (e.g. 30s, 2m)
    #[arg(long, global = true)]
    fetch_timeout: Option<HumanDuration>,
    #[arg(long, global = true, default_value_t = 0)]
    fetch_retries: u32,
    /// Skip the download when the model file already exists
    #[arg(long, global = true)]
    reuse_model: bool,
    /// Number of classified uploads remembered by content hash (0 disables)
    #[arg(long, global = true, default_value_t = 32)]
    cache_size: usize,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the web app
    Serve {
        #[arg(long, default_value = "127.0.0.1:8501")]
        addr: SocketAddr,
        /// Largest accepted upload, in bytes
        #[arg(long, default_value_t = DEFAULT_BODY_LIMIT)]
        body_limit: usize,
    },
    /// Classify one image and print the class probabilities
    Predict {
        image: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Download the model artifact and exit
    Fetch,
}

impl Cli {
    fn model_config(&self) -> ModelConfig {
        ModelConfig {
            url: self.model_url.clone(),
            path: self.model_path.clone(),
            backend: self.backend.clone(),
            fetch_timeout: self.fetch_timeout.map(|d| d.0),
            fetch_retries: self.fetch_retries,
            reuse_existing: self.reuse_model,
            ..ModelConfig::default()
        }
    }

    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            cache_size: self.cache_size,
        }
    }
}

fn format_table(prediction: &Prediction) -> String {
    let mut table = format!("{:<15} {:>15}\n", "Class", "Probability (%)");
    for row in prediction.rows() {
        table.push_str(&format!("{:<15} {:>15.2}\n", row.label.as_str(), row.percentage));
    }
    table
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let model_config = cli.model_config();
    let pipeline_config = cli.pipeline_config();
    let provider = Arc::new(ModelProvider::new(model_config)?);

    match cli.command {
        Commands::Fetch => {
            provider.ensure_artifact().await?;
        }
        Commands::Predict { image, json } => {
            let bytes = tokio::fs::read(&image)
                .await
                .with_context(|| format!("Failed to read {}", image.display()))?;
            let pipeline = Pipeline::new(provider, pipeline_config);
            let classification = pipeline.classify(bytes).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&classification.prediction)?);
            } else {
                print!("{}", format_table(&classification.prediction));
            }
        }
        Commands::Serve { addr, body_limit } => {
            info!("🍇 Starting grapevine leaf classifier");
            // load before accepting uploads so a bad model fails at startup
            provider.handle().await.context("Failed to initialize model")?;

            let pipeline = Arc::new(Pipeline::new(provider, pipeline_config));
            let state = AppState::new(pipeline, WebConfig { body_limit });
            gv_web::serve(addr, state).await?;
        }
    }

    Ok(())
}
