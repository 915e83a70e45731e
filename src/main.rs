use std::io::Write as _;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use screenpilot::agent::{
    AgentEvent, ControlHandle, EventBus, HistorySink, JsonlHistorySink, LiveSettings, NullSink,
    StepEngine,
};
use screenpilot::config;
use screenpilot::errors::AgentResult;
use screenpilot::executor::input::EnigoExecutor;
use screenpilot::llm::{CallConfig, ProviderRegistry};
use screenpilot::perception::XcapCapture;

/// Drives the desktop with a vision model until the goal is done.
#[derive(Parser)]
#[command(name = "screenpilot", version, about)]
struct Cli {
    /// What to accomplish, in plain language.
    goal: String,

    /// Provider id from config.toml (defaults to the active provider).
    #[arg(long)]
    provider: Option<String>,

    /// Override the configured model name.
    #[arg(long)]
    model: Option<String>,

    /// Override the step budget.
    #[arg(long)]
    max_steps: Option<u32>,

    /// Override the delay between steps, in seconds.
    #[arg(long)]
    step_delay: Option<f64>,

    /// Explicit path to config.toml.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Do not write a session log.
    #[arg(long)]
    no_history: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(success) => {
            if success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> AgentResult<bool> {
    let config = match &cli.config {
        Some(path) => config::load_from(path)?,
        None => config::load_or_default()?,
    };
    let registry = ProviderRegistry::from_config(&config.llm)?;

    let provider_id = cli
        .provider
        .unwrap_or_else(|| config.llm.active_provider.clone());
    let provider = registry.get(&provider_id)?;
    let entry = config.provider(&provider_id)?;

    let call_config = CallConfig {
        model: cli.model.unwrap_or_else(|| entry.model.clone()),
        temperature: entry.temperature,
        max_tokens: config.agent.max_tokens,
        stream: entry.stream,
    };

    let control = ControlHandle::new(LiveSettings {
        max_steps: cli.max_steps.unwrap_or(config.agent.max_steps),
        step_delay: Duration::from_secs_f64(
            cli.step_delay.unwrap_or(config.agent.step_delay_secs).max(0.0),
        ),
    });

    let bus = EventBus::new();
    tokio::spawn(print_events(bus.subscribe()));

    // First Ctrl-C finishes the current step gracefully.
    let ctrl = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nstop requested, finishing current step");
            ctrl.stop();
        }
    });

    let sink: Box<dyn HistorySink> = if cli.no_history {
        Box::new(NullSink)
    } else {
        Box::new(JsonlHistorySink::new(&cli.goal))
    };

    let engine = StepEngine::new(
        provider,
        Box::new(XcapCapture),
        Box::new(EnigoExecutor),
        sink,
        bus,
        control,
        call_config,
    );

    let outcome = engine.run(&cli.goal).await;

    println!();
    println!(
        "finished: {} ({} steps, {} model calls, {} tokens)",
        outcome.reason.reason_str(),
        outcome.records.len(),
        outcome.llm_calls,
        outcome.usage.total,
    );
    Ok(!outcome.reason.is_error())
}

async fn print_events(mut rx: tokio::sync::mpsc::UnboundedReceiver<AgentEvent>) {
    let mut reasoning_open = false;
    while let Some(event) = rx.recv().await {
        match event {
            AgentEvent::RunStarted {
                goal,
                provider,
                max_steps,
            } => {
                println!("goal: {goal}");
                println!("provider: {provider}, up to {max_steps} steps");
            }
            AgentEvent::StepStarted { step, max_steps } => {
                println!("--- step {step}/{max_steps} ---");
            }
            AgentEvent::ReasoningDelta { delta, accumulated, .. } => {
                if delta.is_empty() && accumulated.is_empty() {
                    if reasoning_open {
                        println!();
                        reasoning_open = false;
                    }
                    continue;
                }
                print!("{delta}");
                let _ = std::io::stdout().flush();
                reasoning_open = true;
            }
            AgentEvent::ModelCallFinished { .. } => {
                if reasoning_open {
                    println!();
                    reasoning_open = false;
                }
            }
            AgentEvent::ActionExecuted { result, .. } => {
                println!("  {result}");
            }
            AgentEvent::RunError { message } => {
                eprintln!("run error: {message}");
            }
            _ => {}
        }
    }
}
