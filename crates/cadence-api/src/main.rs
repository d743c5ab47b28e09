//! Cadence CLI and REST API entry point.
//!
//! Binary name: `cadence`
//!
//! Parses CLI arguments, sets up tracing, wires the workflow manager to the
//! on-disk store, then dispatches to the matching command handler or starts
//! the REST API server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;

use cadence_observe::tracing_setup::{init_tracing, shutdown_tracing, TracingOptions};
use cli::{Cli, Commands};
use state::{AppState, HostMode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut options = TracingOptions::from_verbosity(cli.verbose);
    if cli.quiet && cli.verbose == 0 {
        options.default_directive = "error".to_string();
    }
    options.json = cli.log_json;
    options.otel = cli.otel;
    init_tracing(&options).map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "cadence", &mut std::io::stdout());
        return Ok(());
    }

    let mode = match &cli.command {
        Commands::Serve { .. } => HostMode::Server,
        Commands::Run { no_input, .. } => HostMode::OneShot {
            interactive: !no_input && !cli.json && console::Term::stdout().is_term(),
        },
        _ => HostMode::OneShot {
            interactive: !cli.json && console::Term::stdout().is_term(),
        },
    };
    let state = AppState::init(mode).await?;

    let result = dispatch(&cli, &state).await;
    state.manager.shutdown().await;
    shutdown_tracing();
    result
}

async fn dispatch(cli: &Cli, state: &AppState) -> anyhow::Result<()> {
    let json = cli.json;
    match &cli.command {
        Commands::List => cli::workflow::list(state, json).await,
        Commands::Show { workflow } => cli::workflow::show(state, workflow, json).await,
        Commands::Create {
            name,
            description,
            tags,
        } => {
            cli::workflow::create(state, name.clone(), description.clone(), tags.clone(), json)
                .await
        }
        Commands::Import { file } => cli::workflow::import(state, file, json).await,
        Commands::Export {
            workflow,
            format,
            output,
        } => cli::workflow::export(state, workflow, *format, output.as_deref()).await,
        Commands::Delete { workflow, force } => {
            cli::workflow::delete(state, workflow, *force, json).await
        }
        Commands::Duplicate { workflow, name } => {
            cli::workflow::duplicate(state, workflow, name.clone(), json).await
        }
        Commands::Enable { workflow } => cli::workflow::set_enabled(state, workflow, true, json).await,
        Commands::Disable { workflow } => {
            cli::workflow::set_enabled(state, workflow, false, json).await
        }
        Commands::Run {
            workflow,
            inputs,
            inputs_json,
            ..
        } => {
            cli::workflow::run(
                state,
                workflow,
                inputs_json.as_deref(),
                inputs,
                !cli.quiet,
                json,
            )
            .await
        }
        Commands::Event { name, data } => {
            cli::workflow::event(state, name, data.as_deref(), json).await
        }
        Commands::History {
            workflow,
            execution,
            limit,
            server,
        } => {
            cli::workflow::history(
                state,
                workflow.as_deref(),
                execution.as_deref(),
                *limit,
                server.as_deref(),
                json,
            )
            .await
        }
        Commands::Serve { port, host } => serve(state, host.clone(), *port).await,
        Commands::Completions { .. } => Ok(()),
    }
}

async fn serve(state: &AppState, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| state.config.server.host.clone());
    let port = port.unwrap_or(state.config.server.port);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!(
        "  {} Cadence API listening on {}",
        console::style("⚡").bold(),
        console::style(format!("http://{addr}")).cyan()
    );
    println!(
        "  {} workflows loaded from {}",
        state.manager.list_workflows().await.len(),
        console::style(state.data_dir.display()).dim()
    );
    println!("  {}", console::style("Press Ctrl+C to stop").dim());

    let router = http::router::build_router(state.clone());
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
