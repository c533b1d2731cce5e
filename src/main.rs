//! CWLRunner CLI Entry Point
//!
//! Inspects a CWL application package the way a runner sees it before
//! execution.
//!
//! # Usage
//!
//! ```bash
//! # Describe a workflow
//! cwlrunner app-package.cwl water-bodies
//!
//! # Only the inputs a caller must provide
//! cwlrunner app-package.cwl water-bodies --mandatory-only
//!
//! # Assume scattered steps fan out 8 ways
//! cwlrunner app-package.cwl water-bodies --scatter-multiplier 8
//!
//! # Marshal a host input file into a job order
//! cwlrunner app-package.cwl water-bodies --inputs inputs.json
//! ```

use std::env;
use std::process::ExitCode;

use colored::Colorize;
use log::{error, info, warn};

use cwlrunner::execution::RunnerSettings;
use cwlrunner::monitoring::HostCapacity;
use cwlrunner::parameters::ServiceInputs;
use cwlrunner::workflow::{CwlWorkflow, ResourceBags, ResourceField};
use cwlrunner::{APP_NAME, VERSION};

/// Command-line configuration parsed from arguments.
#[derive(Debug, Default)]
struct Config {
    cwl_path: String,
    workflow_id: String,
    mandatory_only: bool,
    scatter_multiplier: Option<u64>,
    inputs_path: Option<String>,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME.bold(), VERSION);
    println!("CWL Workflow Runner Foundation");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: cwlrunner [OPTIONS] <CWL_FILE> <WORKFLOW_ID>");
    println!();
    println!("Arguments:");
    println!("  <CWL_FILE>              Path to the CWL document");
    println!("  <WORKFLOW_ID>           Identifier of the workflow inside the document");
    println!();
    println!("Options:");
    println!("  --mandatory-only        List only inputs without a default");
    println!("  --scatter-multiplier N  Assumed fan-out of scattered steps");
    println!("                          (default: SCATTER_MULTIPLIER or 2)");
    println!("  --inputs FILE           Marshal a JSON/YAML host input file");
    println!("  --verbose               Enable debug logging");
    println!("  --help                  Show this help message");
    println!("  --version               Show version information");
    println!();
    println!("Examples:");
    println!("  cwlrunner app-package.cwl water-bodies");
    println!("  cwlrunner app-package.cwl water-bodies --scatter-multiplier 4");
    println!("  cwlrunner app-package.cwl water-bodies --inputs inputs.json");
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut positional_index = 0;
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--mandatory-only" => {
                config.mandatory_only = true;
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--scatter-multiplier" => {
                i += 1;
                if i >= args.len() {
                    return Err("--scatter-multiplier requires a number argument".to_string());
                }
                config.scatter_multiplier = Some(
                    args[i]
                        .parse()
                        .map_err(|_| format!("Invalid scatter multiplier: {}", args[i]))?,
                );
            }
            "--inputs" => {
                i += 1;
                if i >= args.len() {
                    return Err("--inputs requires a path argument".to_string());
                }
                config.inputs_path = Some(args[i].clone());
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                match positional_index {
                    0 => config.cwl_path = arg.clone(),
                    1 => config.workflow_id = arg.clone(),
                    _ => return Err(format!("Unexpected argument: {}", arg)),
                }
                positional_index += 1;
            }
        }
        i += 1;
    }

    if positional_index < 2 {
        return Err("Both <CWL_FILE> and <WORKFLOW_ID> are required".to_string());
    }

    Ok(config)
}

fn print_heading(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

fn print_metadata(workflow: &CwlWorkflow) {
    let metadata = workflow.metadata();
    let or_dash = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());

    print_heading("Workflow");
    println!("  Id:          {}", workflow.id());
    println!("  CWL version: {}", workflow.cwl_version().unwrap_or("-"));
    println!("  Version:     {}", or_dash(metadata.version));
    println!("  Label:       {}", or_dash(metadata.label));
    println!("  Doc:         {}", or_dash(metadata.doc));
}

fn print_parameters(workflow: &CwlWorkflow, mandatory_only: bool) {
    let title = if mandatory_only {
        "Mandatory inputs"
    } else {
        "Inputs"
    };
    print_heading(title);
    for name in workflow.list_inputs(mandatory_only) {
        match workflow.input(&name) {
            Some(input) => println!("  {:<24} {}", name, input.cwl_type),
            None => println!("  {}", name),
        }
    }

    print_heading("Outputs");
    for name in workflow.list_outputs() {
        println!("  {}", name);
    }
}

fn print_resources(bags: &ResourceBags, multiplier: u64) {
    print_heading(&format!("Resources (scatter multiplier {})", multiplier));

    if bags.is_empty() {
        println!("  No ResourceRequirement declared");
        return;
    }

    for field in ResourceField::ALL {
        let bag = bags.get(field);
        if bag.is_empty() {
            continue;
        }
        println!(
            "  {:<11} {:?} sum={} max={}",
            field.as_str(),
            bag,
            bags.total(field).unwrap_or_default(),
            bags.ceiling(field).unwrap_or_default()
        );
    }
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(config.verbose);
    print_banner();

    let mut settings = RunnerSettings::from_env();
    if let Some(multiplier) = config.scatter_multiplier {
        settings = settings.with_scatter_multiplier(multiplier);
    }

    info!("Loading CWL document: {}", config.cwl_path);
    let workflow = CwlWorkflow::load(&config.cwl_path, &config.workflow_id).map_err(|e| {
        error!("Failed to load workflow: {}", e);
        e
    })?;

    print_metadata(&workflow);
    print_parameters(&workflow, config.mandatory_only);

    let bags = workflow.evaluate_resources(settings.scatter_multiplier);
    print_resources(&bags, settings.scatter_multiplier);
    println!(
        "  Pod limits: {} cores, {} MiB",
        bags.max_cores(settings.default_max_cores),
        bags.max_ram(settings.default_max_ram_mib)
    );

    let capacity = HostCapacity::detect();
    print_heading("Host");
    println!("  {}", capacity.summary());
    for warning in capacity.check(&bags) {
        warn!("{}", warning);
        println!("  {}", warning.yellow());
    }

    if let Some(path) = &config.inputs_path {
        let inputs = ServiceInputs::load(path)?;
        info!("Loaded {}", inputs);

        for name in workflow.list_inputs(true) {
            if !inputs.contains(&name) {
                println!("  {}", format!("Missing mandatory input: {}", name).red());
            }
        }

        let job_order = inputs.get_processing_parameters()?;

        print_heading("Processing parameters");
        println!("{}", serde_json::to_string_pretty(&job_order)?);
    }

    println!();
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
