use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use lumi_recorder::quality::{QualityAnalyzer, RuleSource};
use lumi_recorder::recorder::StepMapper;
use lumi_recorder::utils::Config;
use lumi_recorder::RecorderServer;

#[derive(Parser)]
#[command(name = "lumi-recorder")]
#[command(author = "NL Team")]
#[command(version = "0.1.3")]
#[command(about = "Browser recorder that turns interactions into Gherkin steps", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the recorder API server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Configuration file (defaults to ./lumi-recorder.yaml or ~/.lumi/recorder.yaml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Run the browser without a window
        #[arg(long, default_value = "false")]
        headless: bool,
    },

    /// List the step templates the recorder produces
    Steps,

    /// Score a scenario file against the quality rules
    Quality {
        /// Path to the scenario text
        file: PathBuf,

        /// Rules file (defaults to the built-in rules)
        #[arg(short, long)]
        rules: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            config,
            headless,
        } => {
            let mut config = Config::load(config.as_deref())?;
            if let Some(port) = port {
                config.port = port;
            }
            if headless {
                config.browser.headless = true;
            }
            RecorderServer::new(config).start().await?;
        }

        Commands::Steps => {
            println!("{} Step catalog:", "📋".to_string().bold());
            for template in StepMapper::catalog() {
                let kind = format!("{:?}", template.kind).to_uppercase();
                println!("  {:<6} {}", kind.cyan(), template.template);
            }
        }

        Commands::Quality { file, rules } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let source = match rules {
                Some(path) => RuleSource::File(path),
                None => RuleSource::Builtin,
            };
            let result = QualityAnalyzer::new(source).analyze(&content).await?;

            println!(
                "{} Quality score for {}: {}",
                "▶".green().bold(),
                file.display(),
                format!("{:.2}", result.score).bold()
            );
            for outcome in &result.passed_rules {
                println!("  {} {}", "✓".green(), outcome.message);
            }
            for outcome in &result.failed_rules {
                println!("  {} {}", "✗".red(), outcome.message);
            }
            for suggestion in &result.suggestions {
                println!("  {} {}", "💡".yellow(), suggestion);
            }
        }
    }

    Ok(())
}
