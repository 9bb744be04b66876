// Entry point and high-level CLI flow.
//
// - With a subcommand, the selected report (or `all`) is generated from the
//   inputs given on the command line and the binary exits.
// - Without one, the interactive menu runs: option [1] loads the workbooks,
//   option [2] picks a report to generate, after which the user can go back
//   to the selection menu or exit.
mod app;
mod columns;
mod config;
mod error;
mod fiscal;
mod loader;
mod output;
mod reports;
mod types;
mod util;

use app::{InputPaths, ReportKind, Session};
use clap::{Args, Parser, Subcommand};
use config::ReportConfig;
use error::Result;
use once_cell::sync::Lazy;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Mutex;

#[derive(Debug, Parser)]
#[command(name = "salesreport", version, about = "Fiscal-year sales, budget and collection reports")]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Args)]
struct GlobalOpts {
    /// JSON configuration file (default: ./salesreport.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for generated workbooks and summary.json
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Start year of the fiscal year, e.g. 2025 for FY 25-26
    #[arg(long, global = true)]
    fiscal_year: Option<i32>,

    /// Report month, e.g. Apr-25, 2025-04 or April
    #[arg(long, global = true)]
    month: Option<String>,

    /// Also write a CSV copy of every sheet
    #[arg(long, global = true)]
    csv: bool,

    /// Current-year sales register (xlsx/xls/ods/csv)
    #[arg(long, global = true)]
    sales: Option<PathBuf>,

    /// Last-year sales register
    #[arg(long, global = true)]
    ly_sales: Option<PathBuf>,

    /// Budget workbook
    #[arg(long, global = true)]
    budget: Option<PathBuf>,

    /// Outstanding ledger at the start of the month
    #[arg(long, global = true)]
    opening_os: Option<PathBuf>,

    /// Outstanding ledger at the end of the month
    #[arg(long, global = true)]
    closing_os: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Budget vs billed per branch and executive for one month
    BudgetVsBilled,
    /// OD target vs collection from opening and closing outstanding
    OdCollection,
    /// Month and YTD product growth per company group
    ProductGrowth,
    /// Region-wise fiscal-year analysis
    RegionAnalysis,
    /// Product-wise fiscal-year analysis
    ProductAnalysis,
    /// Product-wise analysis for the configured territory regions
    TerritoryAnalysis,
    /// Number of billed customers per month
    Nbc,
    /// Every report the given inputs allow
    All,
}

impl Command {
    fn report(self) -> Option<ReportKind> {
        match self {
            Command::BudgetVsBilled => Some(ReportKind::BudgetVsBilled),
            Command::OdCollection => Some(ReportKind::OdCollection),
            Command::ProductGrowth => Some(ReportKind::ProductGrowth),
            Command::RegionAnalysis => Some(ReportKind::RegionAnalysis),
            Command::ProductAnalysis => Some(ReportKind::ProductAnalysis),
            Command::TerritoryAnalysis => Some(ReportKind::TerritoryAnalysis),
            Command::Nbc => Some(ReportKind::Nbc),
            Command::All => None,
        }
    }
}

// The interactive session is kept across menu rounds so the workbooks are
// only read once.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| Mutex::new(AppState { session: None }));

struct AppState {
    session: Option<Session>,
}

/// Read a single line of input after printing the common "Enter choice:" prompt.
/// `None` once stdin is closed.
fn read_choice() -> Option<String> {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Ask whether to go back to the report selection menu after generating a
/// report. Returns `true` for `Y`, `false` for `N` or end of input.
fn prompt_back_to_menu() -> bool {
    loop {
        print!("Back to Report Selection (Y/N): ");
        let _ = io::stdout().flush();
        let mut buf = String::new();
        match io::stdin().read_line(&mut buf) {
            Ok(0) | Err(_) => return false,
            Ok(_) => {}
        }
        match buf.trim().to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// Option [1]: load every input given on the command line.
fn handle_load(make_session: &dyn Fn() -> Result<Session>) {
    let mut session = match make_session() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to load configuration: {}\n", e);
            return;
        }
    };
    match session.load_all() {
        Ok(()) => {
            let summary = session.summary();
            for input in &summary.inputs {
                println!(
                    "Loaded {}: {} rows ({} skipped)",
                    input.file,
                    util::format_int(input.loaded_rows as i64),
                    util::format_int(input.skipped_rows as i64)
                );
            }
            println!();
            let mut state = APP_STATE.lock().unwrap_or_else(|e| e.into_inner());
            state.session = Some(session);
        }
        Err(e) => eprintln!("Failed to load file: {}\n", e),
    }
}

/// Option [2]: pick a report and generate it.
fn handle_generate_reports() {
    let mut state = APP_STATE.lock().unwrap_or_else(|e| e.into_inner());
    let Some(session) = state.session.as_mut() else {
        println!("Error: No data loaded. Please load the workbooks first (option 1).\n");
        return;
    };

    println!("Select Report:");
    for (i, kind) in ReportKind::ALL.iter().enumerate() {
        println!("[{}] {}", i + 1, kind.title());
    }
    println!("[{}] All reports\n", ReportKind::ALL.len() + 1);

    let choice: usize = match read_choice().unwrap_or_default().parse() {
        Ok(n) if (1..=ReportKind::ALL.len() + 1).contains(&n) => n,
        _ => {
            println!("Invalid choice.\n");
            return;
        }
    };
    println!("\nGenerating reports...\n");
    let result = match ReportKind::ALL.get(choice - 1) {
        Some(&kind) => session.run(kind).map(|_| ()),
        None => session.run_all().map(|_| ()),
    };
    if let Err(e) = result {
        eprintln!("Report error: {}\n", e);
        return;
    }
    match session.write_summary() {
        Ok(path) => println!("Run summary saved to {}\n", path.display()),
        Err(e) => eprintln!("Write error: {}", e),
    }
}

fn interactive(make_session: &dyn Fn() -> Result<Session>) {
    loop {
        println!("Sales Reports");
        println!("[1] Load the workbooks");
        println!("[2] Generate Reports\n");
        let Some(choice) = read_choice() else {
            break;
        };
        match choice.as_str() {
            "1" => handle_load(make_session),
            "2" => {
                println!();
                handle_generate_reports();
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            _ => println!("Invalid choice. Please enter 1 or 2.\n"),
        }
    }
}

fn build_session(opts: &GlobalOpts) -> Result<Session> {
    let mut cfg = ReportConfig::load(opts.config.as_deref())?;
    if let Some(dir) = &opts.output_dir {
        cfg.output_dir = dir.clone();
    }
    let inputs = InputPaths {
        sales: opts.sales.clone(),
        ly_sales: opts.ly_sales.clone(),
        budget: opts.budget.clone(),
        opening_os: opts.opening_os.clone(),
        closing_os: opts.closing_os.clone(),
    };
    if inputs.is_empty() {
        log::warn!("no input files given; pass --sales, --budget, --opening-os ...");
    }
    Ok(Session::new(
        cfg,
        inputs,
        opts.month.clone(),
        opts.fiscal_year,
        opts.csv,
    ))
}

fn run_command(opts: &GlobalOpts, command: Command) -> Result<()> {
    let mut session = build_session(opts)?;
    match command.report() {
        Some(kind) => {
            session.run(kind)?;
        }
        None => {
            session.run_all()?;
        }
    }
    let path = session.write_summary()?;
    println!("Run summary saved to {}", path.display());
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Some(command) => {
            if let Err(e) = run_command(&cli.opts, command) {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
        None => interactive(&|| build_session(&cli.opts)),
    }
}
