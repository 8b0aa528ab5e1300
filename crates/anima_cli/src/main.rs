use anima_core::AnimaConfig;
use anima_reasoning::{Session, SpontaneousUtterance, TurnOutcome};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "ANIMA_CONFIG", default_value = "anima.toml")]
    config: PathBuf,

    /// State graph JSON (overrides config)
    #[arg(short, long)]
    graph: Option<PathBuf>,

    /// Knowledge store JSON (overrides config)
    #[arg(long)]
    knowledge: Option<PathBuf>,

    /// Analysis journal (overrides config)
    #[arg(long)]
    journal: Option<PathBuf>,

    /// LLM provider: "openai" or "mock"
    #[arg(long)]
    provider: Option<String>,

    /// Model name
    #[arg(short, long)]
    model: Option<String>,

    /// Also write daily-rotated logs into this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,
}

/// Console logs go to stderr so replies on stdout stay clean.
fn init_tracing(args: &Args) -> Option<WorkerGuard> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console = if args.log_json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter())
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(filter())
            .boxed()
    };

    let (file, guard) = match &args.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "anima.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter())
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(console).with(file).init();
    guard
}

fn apply_overrides(config: &mut AnimaConfig, args: &Args) {
    if let Some(path) = &args.graph {
        config.graph.path = path.clone();
    }
    if let Some(path) = &args.knowledge {
        config.memory.knowledge_path = Some(path.clone());
    }
    if let Some(path) = &args.journal {
        config.memory.journal_path = Some(path.clone());
    }
    if let Some(provider) = &args.provider {
        config.llm.provider = provider.clone();
    }
    if let Some(model) = &args.model {
        config.llm.model = model.clone();
    }
}

fn prompt() -> std::io::Result<()> {
    print!("> ");
    std::io::stdout().flush()
}

fn print_turn(outcome: &TurnOutcome) {
    if let Some(text) = &outcome.response {
        println!("\nБот: {}\n", text);
    }
    if let Some(text) = &outcome.spontaneous {
        println!("\nБот (спонтанно): {}\n", text);
    }
    if outcome.response.is_none() && outcome.spontaneous.is_none() {
        println!("\n(молчит)\n");
    }
}

fn print_spontaneous(utterance: &SpontaneousUtterance) {
    println!("\n\nБот (спонтанно): {}\n", utterance.text);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let _guard = init_tracing(&args);

    let mut config = AnimaConfig::load_or_default(&args.config);
    apply_overrides(&mut config, &args);

    tracing::info!("Initializing Anima with provider '{}'...", config.llm.provider);
    let (mut session, mut spontaneous) = Session::from_config(config)?;

    println!("Anima online. Type 'quit' to exit, 'status' to inspect the mind.");
    prompt()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let input = line.trim();
                match input {
                    "" => {}
                    "0" | "quit" | "exit" => break,
                    "status" | "статус" => {
                        let status = session.status().await;
                        println!("{}", serde_json::to_string_pretty(&status)?);
                    }
                    _ => {
                        let outcome = session.process_turn(input).await;
                        print_turn(&outcome);
                    }
                }
                prompt()?;
            }
            Some(utterance) = spontaneous.recv() => {
                print_spontaneous(&utterance);
                prompt()?;
            }
        }
    }

    session.shutdown();
    tracing::info!("Session {} closed", session.id());
    Ok(())
}
