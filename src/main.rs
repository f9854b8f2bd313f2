// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use channel_steward::app::config::{ConfirmationMode, GlobalSettings};
use channel_steward::app::logging::setup_logging;
use channel_steward::domain::error::AppError;
use channel_steward::infrastructure::network::{
    ChatPlanner, LndRestClient, LoopRestClient, MempoolDirectory,
};
use channel_steward::services::agent::confirm::confirmer_for;
use channel_steward::services::agent::control::spawn_stdin_reader;
use channel_steward::services::agent::prompt::FIRST_INSTRUCTION;
use channel_steward::services::agent::safety::SafetyGuard;
use channel_steward::services::agent::session::Session;
use channel_steward::services::agent::{
    ActionDispatcher, Collaborators, DispatchSettings, LoopSettings, Orchestrator,
};
use channel_steward::services::metrics::{AgentStats, spawn_metrics_server};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about = "channel steward")]
struct Cli {
    /// Path to config file (default: config.{toml,...})
    #[arg(long)]
    config: Option<String>,

    /// Debug logging (overrides config/env)
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    /// Execute sensitive actions without asking
    #[arg(long, default_value_t = false)]
    auto_approve: bool,

    /// Run a single tick and exit
    #[arg(long, default_value_t = false)]
    once: bool,

    /// First instruction sent to the planner
    #[arg(long)]
    instruction: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let mut settings = GlobalSettings::load_with_path(cli.config.as_deref())?;
    let debug = cli.debug || settings.debug;
    setup_logging(if debug { "debug" } else { "info" }, cli.json_logs);
    if cli.auto_approve {
        settings.confirmation_mode = ConfirmationMode::AutoApprove;
    }
    tracing::info!(
        target: "config",
        network = %settings.network,
        lnd = %settings.lnd_rest_url,
        planner_model = %settings.planner_model,
        confirmation = ?settings.confirmation_mode,
        tick_secs = settings.tick_interval_secs,
        "channel steward starting"
    );

    let collaborator_timeout = settings.collaborator_timeout();
    let lnd = LndRestClient::new(
        &settings.lnd_rest_url,
        settings.lnd_macaroon()?,
        settings.lnd_tls_cert_path.as_deref(),
        collaborator_timeout,
    )?;
    let swap = LoopRestClient::new(
        &settings.loop_rest_url,
        settings.loop_macaroon()?,
        settings.loop_tls_cert_path.as_deref(),
        collaborator_timeout,
    )?;
    let directory = MempoolDirectory::new(&settings.mempool_api_url, collaborator_timeout)?;
    let planner = ChatPlanner::new(
        &settings.planner_url,
        &settings.planner_model,
        settings.planner_api_key_value().unwrap_or_default(),
        settings.planner_timeout(),
    )?;

    let shutdown = CancellationToken::new();
    let stats = Arc::new(AgentStats::default());

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!(target: "agent", "{}", AppError::Fatal("operator interrupt".into()));
            ctrl_c.cancel();
        }
    });

    if settings.metrics_port != 0 {
        spawn_metrics_server(
            &settings.metrics_bind_value(),
            settings.metrics_port,
            stats.clone(),
            shutdown.clone(),
        )
        .await;
    }

    let lines = spawn_stdin_reader(shutdown.clone());
    let dispatcher = ActionDispatcher::new(
        Collaborators {
            lnd: Arc::new(lnd),
            swap: Arc::new(swap),
            directory: Arc::new(directory),
        },
        confirmer_for(settings.confirmation_mode, lines.clone()),
        DispatchSettings::from_settings(&settings),
        stats.clone(),
    );
    let mut orchestrator = Orchestrator::new(
        Arc::new(planner),
        dispatcher,
        Session::new(settings.max_history_length, stats.clone()),
        SafetyGuard::new(
            settings.safety_max_failures,
            Duration::from_secs(settings.safety_reset_secs),
        ),
        lines,
        shutdown.clone(),
        stats.clone(),
        LoopSettings::from_settings(&settings, cli.once),
    );

    let first = cli.instruction.as_deref().unwrap_or(FIRST_INSTRUCTION);
    let outcome = orchestrator.run(first).await;
    shutdown.cancel();

    println!("Final total tokens used: {}", stats.total_tokens());
    outcome.map(|_| ())
}
