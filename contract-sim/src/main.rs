use anyhow::Context;
use contract_sim::infrastructure::{Report, ScenarioConfig, run_diagnostics};
use contract_sim::{MechanismDesigner, MechanismKind, MonteCarloRunner};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn print_help() {
    eprintln!(
        r#"Contract Simulator - screening contracts for satellite spectrum sharing

USAGE:
    contract-sim [OPTIONS]

OPTIONS:
    --config <PATH>     Load scenario from JSON file
    --output <DIR>      Directory for simulation_results.json (default: results)
    --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG            Log level filter

EXAMPLES:
    # Reference scenario
    contract-sim

    # Custom scenario, verbose solver output
    RUST_LOG=contract_sim=debug contract-sim --config scenario.json
"#
    );
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "contract_sim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;
    let mut output_dir = String::from("results");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            "--output" | "-o" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --output requires a directory argument");
                    std::process::exit(1);
                }
                output_dir = args[i].clone();
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let config = match config_path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path);
            ScenarioConfig::from_file(&path)?
        }
        None => {
            tracing::info!("Using reference scenario");
            ScenarioConfig::default()
        }
    };
    config.validate().context("invalid scenario")?;

    let types = config.type_distribution()?;
    let model = config.utility_model();
    tracing::info!("Scenario: {}", config.name);
    for agent_type in types.iter() {
        tracing::info!("  {}", agent_type);
    }

    if config.diagnostics.enabled {
        let channels = run_diagnostics(&config.diagnostics)?;
        tracing::info!(
            operators = channels.links.len(),
            users = channels.total_users,
            "Channel diagnostics done"
        );
    }

    let designer = MechanismDesigner::new(config.designer.optimizer.clone());
    let runner = MonteCarloRunner::with_mechanisms(
        config.monte_carlo(),
        &types,
        model,
        &designer,
        config.selection.clone(),
    );
    let results = runner.run()?;

    for record in &results.records {
        println!(
            "{:>16} N={:<4} principal={:>10.4} agents={:>10.4} welfare={:>10.4}",
            record.scenario.label(),
            record.population_size,
            record.principal_utility,
            record.agents_utility,
            record.social_welfare
        );
    }
    if !results.skipped.is_empty() {
        let skipped: Vec<&str> = results.skipped.iter().map(MechanismKind::label).collect();
        tracing::warn!("Skipped mechanisms: {}", skipped.join(", "));
    }

    let mut report = Report::new(&config.name, &results);
    if let Some(menu) = runner.contract_menu() {
        report = report.with_menu(menu.clone());
    }
    let path = report.write_json(&output_dir)?;
    tracing::info!("Results saved to {}", path.display());

    Ok(())
}
