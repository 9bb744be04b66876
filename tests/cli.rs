use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

const BIN_NAME: &str = "salesreport";

const SALES: &str = "\
Sales Register FY 25-26
Date,Branch,Region,Customer,Executive,Product,Company Group,Qty,Value
2025-04-10,CHN,SOUTH,ACME,RAVI,TMT,JSW,10,200000
2025-04-18,CHN,SOUTH,BETA,RAVI,COIL,JSW,4,90000
2025-05-03,PUN,WEST,GAMMA,ANIL,TMT,TATA,6,120000
";

const LY_SALES: &str = "\
Date,Branch,Region,Customer,Executive,Product,Company Group,Qty,Value
2024-04-12,CHN,SOUTH,ACME,RAVI,TMT,JSW,8,150000
";

const BUDGET: &str = "\
Branch,Customer,Executive,Product,Company Group,Qty,Value
CHN,ACME,RAVI,TMT,JSW,12,250000
PUN,GAMMA,ANIL,TMT,TATA,5,100000
";

const OPENING_OS: &str = "\
Branch,Customer,Executive,Due Date,Balance
CHN,ACME,RAVI,2025-03-20,500000
PUN,GAMMA,ANIL,2025-05-15,300000
";

const CLOSING_OS: &str = "\
Branch,Customer,Executive,Due Date,Balance
CHN,ACME,RAVI,2025-03-20,100000
";

fn workspace() -> TempDir {
    let dir = tempdir().expect("tempdir");
    for (name, body) in [
        ("sales.csv", SALES),
        ("ly_sales.csv", LY_SALES),
        ("budget.csv", BUDGET),
        ("opening_os.csv", OPENING_OS),
        ("closing_os.csv", CLOSING_OS),
    ] {
        fs::write(dir.path().join(name), body).expect("write input");
    }
    dir
}

fn command(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin(BIN_NAME).expect("binary exists");
    cmd.current_dir(dir).env("RUST_LOG", "warn");
    cmd
}

#[test]
fn help_lists_report_commands() {
    command(Path::new("."))
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("budget-vs-billed").and(contains("od-collection")).and(contains("nbc")));
}

#[test]
fn nbc_writes_workbook_and_summary() {
    let dir = workspace();
    command(dir.path())
        .args(["nbc", "--sales", "sales.csv", "--output-dir", "out"])
        .assert()
        .success()
        .stdout(contains("Number of Billed Customers"));
    assert!(dir.path().join("out/nbc_25-26.xlsx").exists());
    let summary = fs::read_to_string(dir.path().join("out/summary.json")).expect("summary");
    assert!(summary.contains("\"fiscal_year\": \"25-26\""));
}

#[test]
fn budget_vs_billed_uses_month_flag() {
    let dir = workspace();
    command(dir.path())
        .args([
            "budget-vs-billed",
            "--sales",
            "sales.csv",
            "--budget",
            "budget.csv",
            "--month",
            "Apr-25",
            "--csv",
        ])
        .assert()
        .success();
    assert!(dir.path().join("budget_vs_billed_Apr-25.xlsx").exists());
    assert!(dir.path().join("budget_vs_billed_Apr-25_Branch_Apr-25.csv").exists());
}

#[test]
fn od_collection_from_opening_and_closing_ledgers() {
    let dir = workspace();
    command(dir.path())
        .args([
            "od-collection",
            "--opening-os",
            "opening_os.csv",
            "--closing-os",
            "closing_os.csv",
            "--month",
            "May-25",
        ])
        .assert()
        .success()
        .stdout(contains("OD Target vs Collection"));
    assert!(dir.path().join("od_target_vs_collection_May-25.xlsx").exists());
}

#[test]
fn all_generates_every_report_with_inputs() {
    let dir = workspace();
    command(dir.path())
        .args([
            "all",
            "--sales",
            "sales.csv",
            "--ly-sales",
            "ly_sales.csv",
            "--budget",
            "budget.csv",
            "--opening-os",
            "opening_os.csv",
            "--closing-os",
            "closing_os.csv",
            "--month",
            "May-25",
            "--output-dir",
            "out",
        ])
        .assert()
        .success();
    let out = dir.path().join("out");
    for file in [
        "budget_vs_billed_May-25.xlsx",
        "od_target_vs_collection_May-25.xlsx",
        "product_growth_May-25.xlsx",
        "region_wise_analysis_25-26.xlsx",
        "product_wise_analysis_25-26.xlsx",
        "nbc_25-26.xlsx",
        "summary.json",
    ] {
        assert!(out.join(file).exists(), "missing {}", file);
    }
    assert!(!out.join("ts_product_wise_analysis_25-26.xlsx").exists());
}

#[test]
fn missing_budget_fails_with_message() {
    let dir = workspace();
    command(dir.path())
        .args(["budget-vs-billed", "--sales", "sales.csv", "--month", "Apr-25"])
        .assert()
        .failure()
        .stderr(contains("budget"));
}

#[test]
fn territory_analysis_reads_regions_from_config() {
    let dir = workspace();
    fs::write(
        dir.path().join("salesreport.json"),
        r#"{ "territory_regions": ["south"], "product_order": ["TMT"] }"#,
    )
    .expect("write config");
    command(dir.path())
        .args(["territory-analysis", "--sales", "sales.csv"])
        .assert()
        .success();
    assert!(dir.path().join("ts_product_wise_analysis_25-26.xlsx").exists());
}

#[test]
fn interactive_menu_requires_loading_first() {
    let dir = workspace();
    command(dir.path())
        .args(["--sales", "sales.csv"])
        .write_stdin("2\nY\n1\n2\n7\nN\n")
        .assert()
        .success()
        .stdout(
            contains("No data loaded")
                .and(contains("Loaded"))
                .and(contains("Exiting the program.")),
        );
    assert!(dir.path().join("nbc_25-26.xlsx").exists());
}
