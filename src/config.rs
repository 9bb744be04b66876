use crate::error::{ReportError, Result};
use crate::util::normalize_key;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "salesreport.json";

/// Header aliases per logical field, tried in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnAliases {
    pub date: Vec<String>,
    pub branch: Vec<String>,
    pub region: Vec<String>,
    pub customer: Vec<String>,
    pub executive: Vec<String>,
    pub product: Vec<String>,
    pub company_group: Vec<String>,
    pub quantity: Vec<String>,
    pub value: Vec<String>,
    pub due_date: Vec<String>,
    pub overdue_days: Vec<String>,
    pub amount: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ColumnAliases {
    fn default() -> Self {
        Self {
            date: strings(&["date", "bill date", "invoice date", "inv date", "doc date"]),
            branch: strings(&["branch", "branch name", "sales branch", "location"]),
            region: strings(&["region", "region name", "zone"]),
            customer: strings(&[
                "customer name",
                "customer",
                "party name",
                "party",
                "buyer",
                "sold to party",
            ]),
            executive: strings(&[
                "executive",
                "executive name",
                "sales executive",
                "salesman",
                "sales person",
            ]),
            product: strings(&[
                "product group",
                "product",
                "type make",
                "item group",
                "material group",
                "product name",
            ]),
            company_group: strings(&["company group", "company", "make", "brand"]),
            quantity: strings(&[
                "actual quantity",
                "quantity",
                "qty",
                "qty in mt",
                "qty mt",
                "billed qty",
                "tonnage",
                "mt",
            ]),
            value: strings(&[
                "value",
                "amount",
                "sales value",
                "invoice value",
                "net value",
                "billed value",
            ]),
            due_date: strings(&["due date", "due on", "due dt"]),
            overdue_days: strings(&["overdue days", "due days", "days", "ageing", "age days"]),
            amount: strings(&[
                "net balance",
                "balance",
                "outstanding",
                "os amount",
                "pending amount",
                "amount",
            ]),
        }
    }
}

/// Start years outside this range are rejected from config and command line.
pub fn check_fiscal_year(year: i32) -> Result<()> {
    if (1900..=2999).contains(&year) {
        Ok(())
    } else {
        Err(ReportError::Config(format!("fiscal_year {} out of range", year)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Start year of the fiscal year (2025 = FY 25-26).
    pub fiscal_year: Option<i32>,
    pub columns: ColumnAliases,
    pub branch_regions: BTreeMap<String, String>,
    pub customer_executives: BTreeMap<String, String>,
    pub region_order: Vec<String>,
    pub product_order: Vec<String>,
    pub territory_regions: Vec<String>,
    pub value_divisor: f64,
    pub value_unit: String,
    pub output_dir: PathBuf,
    pub header_scan_rows: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            fiscal_year: None,
            columns: ColumnAliases::default(),
            branch_regions: BTreeMap::new(),
            customer_executives: BTreeMap::new(),
            region_order: Vec::new(),
            product_order: Vec::new(),
            territory_regions: Vec::new(),
            value_divisor: 100_000.0,
            value_unit: "Lakhs".to_string(),
            output_dir: PathBuf::from("."),
            header_scan_rows: 15,
        }
    }
}

impl ReportConfig {
    /// Explicit path, else `salesreport.json` in the working directory, else
    /// defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.exists() {
                    log::debug!("no {} found, using defaults", DEFAULT_CONFIG_FILE);
                    return Ok(Self::default());
                }
                fallback
            }
        };
        let data = fs::read_to_string(&path)?;
        let mut cfg: ReportConfig = serde_json::from_str(&data)?;
        cfg.normalize();
        cfg.validate()?;
        log::info!("loaded configuration from {}", path.display());
        Ok(cfg)
    }

    /// Mapping keys and order lists are compared against normalized data keys.
    fn normalize(&mut self) {
        self.branch_regions = std::mem::take(&mut self.branch_regions)
            .into_iter()
            .map(|(k, v)| (normalize_key(&k), normalize_key(&v)))
            .collect();
        self.customer_executives = std::mem::take(&mut self.customer_executives)
            .into_iter()
            .map(|(k, v)| (normalize_key(&k), normalize_key(&v)))
            .collect();
        for list in [
            &mut self.region_order,
            &mut self.product_order,
            &mut self.territory_regions,
        ] {
            for item in list.iter_mut() {
                *item = normalize_key(item);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.value_divisor.is_finite() && self.value_divisor > 0.0) {
            return Err(ReportError::Config(format!(
                "value_divisor must be a positive number, got {}",
                self.value_divisor
            )));
        }
        if self.header_scan_rows == 0 {
            return Err(ReportError::Config(
                "header_scan_rows must be at least 1".to_string(),
            ));
        }
        if let Some(y) = self.fiscal_year {
            check_fiscal_year(y)?;
        }
        Ok(())
    }

    pub fn region_for_branch(&self, branch: &str) -> Option<&str> {
        self.branch_regions.get(branch).map(String::as_str)
    }

    pub fn executive_for_customer(&self, customer: &str) -> Option<&str> {
        self.customer_executives.get(customer).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_are_valid() {
        let cfg = ReportConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.value_divisor, 100_000.0);
        assert!(!cfg.columns.date.is_empty());
    }

    #[test]
    fn partial_file_keeps_defaults_and_normalizes_keys() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("cfg.json");
        fs::write(
            &path,
            r#"{
                "fiscal_year": 2025,
                "branch_regions": { " chennai ": "south" },
                "territory_regions": ["South", " west "]
            }"#,
        )
        .expect("write config");

        let cfg = ReportConfig::load(Some(&path)).expect("load config");
        assert_eq!(cfg.fiscal_year, Some(2025));
        assert_eq!(cfg.region_for_branch("CHENNAI"), Some("SOUTH"));
        assert_eq!(cfg.territory_regions, vec!["SOUTH", "WEST"]);
        assert_eq!(cfg.header_scan_rows, 15);
        assert!(!cfg.columns.quantity.is_empty());
    }

    #[test]
    fn rejects_bad_divisor() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("cfg.json");
        fs::write(&path, r#"{ "value_divisor": 0 }"#).expect("write config");
        let err = ReportConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ReportError::Config(_)));
    }
}
