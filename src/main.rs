use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use autoapply::action::{ApplyAction, Simulated, SimulatedAction};
use autoapply::backend::BackendClient;
use autoapply::cli::{Cli, Command};
use autoapply::config::AutoApplyConfig;
use autoapply::coordinator::{Coordinator, CoordinatorState, Item};
use autoapply::events::{EventSink, FanoutSink, TracingSink};
use autoapply::runner::{Runner, RunnerSettings};
use autoapply::source::StaticSource;
use autoapply::store::StateStore;
use autoapply::ui::{self, ConsoleSink, LogWriter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let console = ConsoleSink::new();
    init_tracing(cli.log_filter(), console.log_writer());

    let mut config = AutoApplyConfig::load()?;
    if let Some(secs) = cli.timeout_secs {
        config.application_timeout_secs = secs;
    }
    if let Some(limit) = cli.limit {
        config.application_limit = Some(limit);
    }
    let store = StateStore::new(&config.state_file);

    match cli.command {
        Command::Run { file, dry_run } => {
            let source = StaticSource::from_file(&file, config.page_size)
                .with_context(|| format!("failed to load jobs from {}", file.display()))?;
            let saved = store
                .load()
                .with_context(|| format!("failed to read {}", store.path().display()))?
                .unwrap_or_default();
            let coordinator =
                Coordinator::with_state(saved, config.application_timeout(), sinks(console));

            if dry_run {
                let action = SimulatedAction::succeeding(Duration::from_millis(500));
                execute(coordinator, source, action, &config, Some(store)).await?;
            } else {
                let client = BackendClient::new(&config.backend_url, config.api_key.clone())?;
                execute(coordinator, source, client, &config, Some(store)).await?;
            }
        }
        Command::Status => match store.load()? {
            Some(state) => ui::print_state(&state),
            None => println!("No saved state at {}", store.path().display()),
        },
        Command::Reset => {
            if store.clear()? {
                println!("Removed {}", store.path().display());
            } else {
                println!("Nothing to remove at {}", store.path().display());
            }
        }
        Command::Demo => run_demo(&config, console).await?,
    }

    Ok(())
}

fn init_tracing(default_filter: &str, writer: LogWriter) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(writer))
        .init();
}

fn sinks(console: ConsoleSink) -> Box<dyn EventSink> {
    Box::new(FanoutSink::new().with(console).with(TracingSink))
}

async fn execute<A: ApplyAction>(
    coordinator: Coordinator,
    source: StaticSource,
    action: A,
    config: &AutoApplyConfig,
    store: Option<StateStore>,
) -> Result<()> {
    let mut runner = Runner::new(coordinator, source, action, RunnerSettings::from(config));
    if let Some(store) = store {
        runner = runner.with_store(store);
    }

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let summary = runner.run_until(shutdown).await;
    ui::print_summary(&summary);
    Ok(())
}

/// Six fake postings with short timers: one fails, one hangs until the
/// health check recovers it.
async fn run_demo(config: &AutoApplyConfig, console: ConsoleSink) -> Result<()> {
    let titles = [
        "Rust Engineer",
        "Platform Engineer",
        "Site Reliability Engineer",
        "Backend Developer",
        "Data Engineer",
        "Infrastructure Engineer",
    ];
    let items: Vec<Item> = titles
        .iter()
        .enumerate()
        .map(|(i, title)| Item {
            id: format!("demo-{}", i + 1),
            url: Some(format!("https://jobs.example/demo-{}", i + 1)),
            title: Some((*title).to_string()),
            company: None,
        })
        .collect();

    let demo_config = AutoApplyConfig {
        application_timeout_secs: 3,
        health_check_interval_secs: 1,
        busy_retry_delay_ms: 200,
        next_application_delay_ms: 300,
        page_size: 2,
        application_limit: config.application_limit,
        ..config.clone()
    };
    let action = SimulatedAction::succeeding(Duration::from_millis(400))
        .with("demo-3", Simulated::Fail)
        .with("demo-4", Simulated::Hang);
    let coordinator = Coordinator::with_state(
        CoordinatorState::default(),
        demo_config.application_timeout(),
        sinks(console),
    );
    let source = StaticSource::new(items, demo_config.page_size);

    execute(coordinator, source, action, &demo_config, None).await
}
