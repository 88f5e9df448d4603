//! Command-line interface for AgentFlow.

use std::path::PathBuf;

use agentflow_cli::{load_config, App};
use agentflow_core::config::env_vars;
use anyhow::Result;
use clap::{Parser, Subcommand};

/// AgentFlow - function calling and message pipeline demo.
#[derive(Parser, Debug)]
#[command(name = "agentflow")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// List available functions.
    Functions,
    /// Execute one function call and print the result as JSON.
    Call {
        /// Function name.
        name: String,
        /// JSON arguments.
        #[arg(default_value = "{}")]
        arguments: String,
    },
    /// Run a message through the pipeline.
    Chat {
        /// The message to process.
        message: String,
        /// Synthesize speech for the answer.
        #[arg(long)]
        speech: bool,
    },
    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(args.config.as_deref())?;
    if let Command::Config = args.command {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let app = App::new(config).await?;
    let outcome = run(&app, args.command).await;
    app.shutdown();
    outcome
}

fn init_logging(verbose: bool) {
    // JSON output for production/container environments
    let json_logging = std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let default_filter = if verbose { "agentflow=debug" } else { "agentflow=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}

async fn run(app: &App, command: Command) -> Result<()> {
    match command {
        Command::Functions => {
            for def in app.functions().await {
                println!("{:<14} [{}] {}", def.name, def.extension, def.description);
                for param in &def.parameters {
                    let required = if param.required { "required" } else { "optional" };
                    println!(
                        "    {:<10} {:<8} {}",
                        param.name,
                        param.param_type.as_str(),
                        required
                    );
                }
            }
        }
        Command::Call { name, arguments } => {
            let result = app.call(&name, &arguments).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                anyhow::bail!("{} failed", name);
            }
        }
        Command::Chat { message, speech } => {
            let response = app.chat(&message, speech).await?;
            println!("{}", response.text);
            for result in &response.function_results {
                eprintln!("  {}({}) -> {}", result.function_name, result.extension_name, result.content());
            }
            if let Some(audio) = &response.audio {
                eprintln!("  audio: {} bytes ({})", audio.data.len(), audio.format);
            }
            eprintln!("\nProcessing time: {}ms", response.duration_ms);
        }
        Command::Config => {}
    }
    Ok(())
}
