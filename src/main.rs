use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;

use submission_flow::client::WorkflowApi;
use submission_flow::platform::server;
use submission_flow::session::Authenticator;
use submission_flow::workflows::TRANSITIONS;
use submission_flow::{
    init_telemetry, HarnessConfig, HttpPlatform, LocalPlatform, Scenario, ScenarioRunner,
    SessionBroker, WorkflowService,
};

#[derive(Parser)]
#[command(name = "submission-flow")]
#[command(about = "Editorial submission workflow engine and multi-actor e2e harness")]
#[command(long_about = "Runs the reference publishing platform, drives end-to-end editorial \
                       scenarios through one isolated session per role, and prints the \
                       transition table the engine enforces.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the reference platform seeded with the configured accounts
    Serve {
        /// Address to bind, overriding platform.bind_addr
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Drive one scenario end to end and print its report as JSON
    Scenario {
        #[arg(value_enum)]
        name: Scenario,
        /// Target a running platform instead of an in-process one
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Print the transition table
    Transitions,
    /// Print the effective configuration as TOML
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    HarnessConfig::load_env_file()?;
    let config = HarnessConfig::load().context("failed to load configuration")?;

    match cli.command {
        Commands::Serve { bind } => {
            init_telemetry(&config.observability)?;
            let addr = match bind {
                Some(addr) => addr,
                None => config
                    .platform
                    .bind_addr
                    .parse()
                    .with_context(|| format!("invalid bind address '{}'", config.platform.bind_addr))?,
            };
            let service = Arc::new(WorkflowService::from_config(&config));
            server::serve(addr, service).await
        }
        Commands::Scenario { name, base_url } => {
            init_telemetry(&config.observability)?;
            let report = run_scenario(&config, name, base_url).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Transitions => {
            for rule in TRANSITIONS {
                let roles: Vec<&str> = rule.roles.iter().map(|role| role.as_str()).collect();
                println!(
                    "{:<15} --{:<22}--> {:<15} [{}] {:?}",
                    rule.from.as_str(),
                    rule.action.as_str(),
                    rule.to.as_str(),
                    roles.join(", "),
                    rule.actor
                );
            }
            Ok(())
        }
        Commands::ShowConfig => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn run_scenario(
    config: &HarnessConfig,
    scenario: Scenario,
    base_url: Option<String>,
) -> Result<submission_flow::ScenarioReport> {
    let (api, authenticator): (Arc<dyn WorkflowApi>, Arc<dyn Authenticator>) = match base_url {
        Some(base_url) => {
            let mut config = config.clone();
            config.platform.base_url = base_url;
            let platform = Arc::new(HttpPlatform::from_config(&config)?);
            let api: Arc<dyn WorkflowApi> = platform.clone();
            let authenticator: Arc<dyn Authenticator> = platform;
            (api, authenticator)
        }
        None => {
            let service = Arc::new(WorkflowService::from_config(config));
            let platform = Arc::new(LocalPlatform::new(service));
            let api: Arc<dyn WorkflowApi> = platform.clone();
            let authenticator: Arc<dyn Authenticator> = platform;
            (api, authenticator)
        }
    };

    let broker = Arc::new(SessionBroker::from_config(authenticator, config));
    let runner = ScenarioRunner::new(api, broker, config.poll_interval(), config.request_timeout());
    Ok(runner.run(scenario).await?)
}
