//! CLI smoke tests for the failure paths that need no network.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

const VALID_CONFIG: &str = r#"
[engine]
symbol = "BTC-USDC"
quote_balance = "40000"
min_profit_quote = "10"
min_profit_pct = "0.01"
max_base_per_trade = "1"
max_slippage_bps = "500"

[mexc]

[bingx]
"#;

#[test]
fn test_missing_config_file_exits_nonzero() {
    Command::cargo_bin("skimmer")
        .unwrap()
        .arg("--config")
        .arg("/nonexistent/skimmer.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("loading configuration"));
}

#[test]
fn test_invalid_config_refuses_startup() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{}", VALID_CONFIG.replace("max_base_per_trade = \"1\"", "max_base_per_trade = \"0\"")).unwrap();
    Command::cargo_bin("skimmer")
        .unwrap()
        .arg("--config")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_base_per_trade"));
}

#[test]
fn test_missing_credentials_refuse_startup() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{VALID_CONFIG}").unwrap();
    Command::cargo_bin("skimmer")
        .unwrap()
        .env_remove("MEXC_API_KEY")
        .env_remove("MEXC_API_SECRET")
        .arg("--config")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("MEXC_API_KEY"));
}
