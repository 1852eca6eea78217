use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

mod config;
mod dosing;
mod form;
mod output;
mod error;

use crate::config::{Config, DisplayConfig};
use crate::error::CalcResult;
use crate::form::{DoseForm, Session, SessionCommand};

#[derive(Parser)]
#[command(name = "iron_dose")]
#[command(about = "Intravenous iron total dose and two-session split calculator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Calculate the dose for one patient
    Calc {
        /// Body weight in kg (defaults to the configured default weight)
        #[arg(short, long)]
        weight: Option<f64>,

        /// Hemoglobin: low, high, a form label such as "Hb < 10 g/dL", or a value in g/dL
        #[arg(long)]
        hb: String,

        /// Print the input and result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Calculate doses for every row of a CSV file (PATIENT_ID,WEIGHT,HB)
    Batch {
        /// Input CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Read "<weight> <hb>" lines from stdin and recalculate on each one
    Session,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    let config = match &cli.config {
        Some(path) => {
            let config = Config::from_file(path)
                .with_context(|| format!("Failed to load configuration from {:?}", path))?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::default(),
    };

    let form = DoseForm::new(config.limits());
    info!(
        "Accepting body weights {}-{} kg",
        form.limits().min_weight_kg, form.limits().max_weight_kg
    );

    match cli.command {
        Commands::Calc { weight, hb, json } => cmd_calc(&form, &config, weight, &hb, json),
        Commands::Batch { input, output } => cmd_batch(&form, &config, input, output),
        Commands::Session => cmd_session(form, &config),
    }
}

fn cmd_calc(
    form: &DoseForm,
    config: &Config,
    weight: Option<f64>,
    hb: &str,
    json: bool,
) -> anyhow::Result<()> {
    let weight = weight.unwrap_or(config.form.default_weight_kg);
    let input = form.build_input(weight, hb)?;
    let result = dosing::calculate_dose(&input);

    if json {
        println!("{}", output::render_json(&input, &result)?);
    } else {
        print!("{}", output::render_text(&result, &config.display));
    }

    Ok(())
}

fn cmd_batch(form: &DoseForm, config: &Config, input: PathBuf, output_dir: PathBuf) -> anyhow::Result<()> {
    let records = output::read_batch(&input)
        .with_context(|| format!("Failed to read batch input {:?}", input))?;
    info!("Loaded {} patients from {:?}", records.len(), input);

    let rows = output::evaluate_batch(form, &records);

    // Create output directory if it doesn't exist
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;

    output::save_batch(&rows, output_dir.join("doses.csv"), config.display.decimals)?;
    output::generate_report(&rows, &output_dir)?;
    info!("Results saved to {:?}", output_dir);

    Ok(())
}

fn cmd_session(form: DoseForm, config: &Config) -> anyhow::Result<()> {
    let mut session = Session::new(form);
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    writeln!(stdout, "Enter '<weight kg> <hb>', 'last', 'clear' or 'quit'.")?;
    run_session(&mut session, &config.display, stdin.lock(), &mut stdout)?;
    Ok(())
}

/// Drives one interactive session until `quit` or end of input.
fn run_session<R: BufRead, W: Write>(
    session: &mut Session,
    display: &DisplayConfig,
    input: R,
    out: &mut W,
) -> CalcResult<()> {
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match SessionCommand::parse(&line) {
            Ok(SessionCommand::Quit) => break,
            Ok(SessionCommand::Clear) => session.clear(),
            Ok(SessionCommand::Last) => match session.last_result() {
                Some(result) => write!(out, "{}", output::render_text(result, display))?,
                None => writeln!(out, "No dose calculated yet.")?,
            },
            Ok(SessionCommand::Calculate { weight_kg, hemoglobin }) => {
                match session.recalculate(weight_kg, &hemoglobin) {
                    Ok(result) => write!(out, "{}", output::render_text(&result, display))?,
                    Err(e) => {
                        warn!("{}", e);
                        writeln!(out, "{}", e)?;
                    }
                }
            }
            Err(e) => writeln!(out, "{}", e)?,
        }
        out.flush()?;
    }

    Ok(())
}
