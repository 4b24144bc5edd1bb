use clap::{Parser, Subcommand};
use lead_locator::config::{load_app_config, AppConfig};
use lead_locator::crm::CrmSnapshot;
use lead_locator::geocode::{GeocodeReport, GeocodeService};
use lead_locator::matrix::{DistanceRanker, GoogleDistanceMatrix};
use lead_locator::server::{self, AppState};
use lead_locator::telemetry;
use std::path::PathBuf;
use std::sync::Arc;

/// Lead Locator: find the agents nearest to a CRM lead
///
/// Examples:
///   leadloc serve --port 8080
///   leadloc lookup 805a0dff-b76f-eb11-b0b0-000d3a5319cc --closest
///   leadloc --crm ./crm.json lookup 805a0dff-b76f-eb11-b0b0-000d3a5319cc
#[derive(Parser)]
#[command(name = "leadloc", version, about, long_about = None)]
struct Cli {
    /// CRM snapshot file (overrides LEADLOC_CRM_FIXTURE).
    #[arg(long, global = true)]
    crm: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP service.
    Serve {
        /// Host to bind (overrides LEADLOC_BIND_ADDR).
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (overrides LEADLOC_BIND_ADDR).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Geocode one lead and print the report as JSON.
    Lookup {
        /// Lead GUID.
        leadid: String,
        /// Print only ranked agents, nearest first.
        #[arg(long)]
        closest: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = load_app_config()?;
    telemetry::init(&config.log_level)?;

    if let Some(path) = cli.crm {
        config.crm_path = path;
    }

    let service = build_service(&config)?;

    match cli.command {
        Command::Serve { host, port } => {
            let mut addr = config.bind_addr;
            if let Some(host) = host {
                addr.set_ip(host.parse()?);
            }
            if let Some(port) = port {
                addr.set_port(port);
            }
            let state = AppState {
                service,
                request_deadline: config.request_deadline,
                debug: config.debug,
            };
            server::start(addr, state).await?;
        }
        Command::Lookup { leadid, closest } => {
            let deadline = std::time::Instant::now() + config.request_deadline;
            let report = tokio::task::spawn_blocking(move || {
                service.locate_with_deadline(Some(&leadid), deadline)
            })
            .await??;
            print_report(&report, closest)?;
        }
    }
    Ok(())
}

fn build_service(config: &AppConfig) -> Result<GeocodeService, Box<dyn std::error::Error>> {
    let crm = Arc::new(CrmSnapshot::load_from(&config.crm_path)?);
    let provider = Arc::new(GoogleDistanceMatrix::new(config.maps.clone()));
    Ok(GeocodeService::new(crm.clone(), crm, provider)
        .with_ranker(DistanceRanker::new(config.max_destinations))
        .with_retry(config.retry))
}

fn print_report(report: &GeocodeReport, closest: bool) -> serde_json::Result<()> {
    eprintln!("  Lead {} -> {} ({})", report.lead_id, report.lead, report.lead.preferred());
    let json = if closest {
        serde_json::to_string_pretty(&report.closest())?
    } else {
        serde_json::to_string_pretty(report)?
    };
    println!("{}", json);
    Ok(())
}
