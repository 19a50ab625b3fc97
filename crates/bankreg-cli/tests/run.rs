use std::fs;
use std::path::{Path, PathBuf};

use bankreg_cli::pipeline::{RunOptions, load_rules, run_batches, validate_file};
use bankreg_model::BatchStatus;
use bankreg_standards::StandardsRegistry;
use tempfile::TempDir;

const BANK: &str = "\
bank_id,bank_name,report_date,reporting_period_start,reporting_period_end,currency,report_type,contact_name,contact_email
US-ACME-00001,Acme Bank,2024-03-31,2024-01-01,2024-03-31,usd,q,Jane Doe,Risk@Acme.example
GB-BETA-00002,Beta Bank plc,31/03/2024,01/01/2024,31/03/2024,GBP,ANNUAL,,
";

const CAPITAL: &str = "\
bank_id,tier1_capital,tier2_capital,risk_weighted_assets,minimum_requirement
US-ACME-00001,\"1,200,000.00\",300000,10000000,10.5
GB-BETA-00002,lots,100000,5000000,
";

const LIQUIDITY: &str = "\
bank_id,lcr_ratio,nsfr_ratio,hqla_amount,net_cash_outflows
US-ACME-00001,125.5,110,2510000,2000000
GB-BETA-00002,130,120,1300000,1000000
";

const CREDIT: &str = "\
bank_id,corporate_exposure,corporate_rw,corporate_impaired,retail_exposure,retail_rw,sovereign_exposure,sovereign_rw
US-ACME-00001,5000000,100,250000,3000000,75,2000000,0
GB-BETA-00002,1000000,100,,500000,75,0,0
";

fn standards() -> StandardsRegistry {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../standards");
    let (registry, _) = StandardsRegistry::verify_and_load(&dir).expect("standards");
    registry
}

fn input_dir() -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    for (name, contents) in [
        ("bank.csv", BANK),
        ("capital.csv", CAPITAL),
        ("liquidity.csv", LIQUIDITY),
        ("credit.csv", CREDIT),
    ] {
        fs::write(dir.path().join(name), contents).expect("write input");
    }
    dir
}

fn output_dir(input: &TempDir) -> PathBuf {
    input.path().join("output")
}

#[test]
fn compliant_batches_get_a_report_and_others_only_a_validation_result() {
    let standards = standards();
    let rules = load_rules(&standards).expect("rules");
    let input = input_dir();
    let options = RunOptions::new(input.path(), output_dir(&input));

    let result = run_batches(&standards, &rules, &options).expect("run");

    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(result.batches.len(), 2);
    let acme = &result.batches[0];
    assert_eq!(acme.batch_id, "US-ACME-00001");
    assert_eq!(acme.source_records, 4);
    assert_eq!(
        acme.outcome.status,
        BatchStatus::Compliant,
        "{:?} {:?} {:?}",
        acme.outcome.data_quality_errors,
        acme.outcome.validation_errors,
        acme.outcome.structural_gap
    );
    let report = acme.report.as_ref().expect("report written");
    assert!(report.ends_with("US-ACME-00001_report.xml"));
    let xml = fs::read_to_string(report).expect("read report");
    assert!(xml.contains("<CAR>15.00</CAR>"));
    assert!(xml.contains("<ComplianceStatus>COMPLIANT</ComplianceStatus>"));
    assert!(xml.contains("<ReportType>QUARTERLY</ReportType>"));
    assert!(xml.contains("<LCR_Minimum>100.00</LCR_Minimum>"));

    let beta = &result.batches[1];
    assert_eq!(beta.outcome.status, BatchStatus::RejectedDataQuality);
    assert!(beta.report.is_none());
    assert!(!output_dir(&input).join("GB-BETA-00002_report.xml").exists());
    assert!(result.has_errors());

    let json = fs::read_to_string(beta.validation.as_ref().expect("validation written"))
        .expect("read validation");
    let value: serde_json::Value = serde_json::from_str(&json).expect("json");
    assert_eq!(value["batch_id"], "GB-BETA-00002");
    assert_eq!(value["is_valid"], false);
    assert_eq!(value["status"], "REJECTED_DATA_QUALITY");
    assert_eq!(value["schema_file"], "bank_reporting.xsd");
    assert_eq!(value["xml_file"], serde_json::Value::Null);
    assert_eq!(value["data_quality_errors"][0]["rule"], "capital.tier1_capital");
    assert_eq!(value["data_quality_errors"][0]["field"], "tier1_capital");
}

#[test]
fn written_reports_validate_on_their_own() {
    let standards = standards();
    let rules = load_rules(&standards).expect("rules");
    let input = input_dir();
    let options = RunOptions::new(input.path(), output_dir(&input))
        .with_batches(vec!["US-ACME-00001".to_string()]);

    let result = run_batches(&standards, &rules, &options).expect("run");
    let report = result.batches[0].report.as_ref().expect("report");

    let checked = validate_file(&standards, report).expect("validate");
    assert!(checked.is_valid(), "{:?}", checked.errors);
    assert_eq!(checked.root_element, "BankRegulatoryReport");
}

#[test]
fn dry_run_writes_nothing() {
    let standards = standards();
    let rules = load_rules(&standards).expect("rules");
    let input = input_dir();
    let options = RunOptions::new(input.path(), output_dir(&input)).with_dry_run(true);

    let result = run_batches(&standards, &rules, &options).expect("run");

    assert_eq!(result.batches.len(), 2);
    assert!(result.batches.iter().all(|b| b.report.is_none() && b.validation.is_none()));
    assert!(!output_dir(&input).exists());
}

#[test]
fn unknown_batch_ids_are_errors() {
    let standards = standards();
    let rules = load_rules(&standards).expect("rules");
    let input = input_dir();
    let options = RunOptions::new(input.path(), output_dir(&input))
        .with_batches(vec!["XX-NONE-00000".to_string()])
        .with_dry_run(true);

    let result = run_batches(&standards, &rules, &options).expect("run");

    assert!(result.batches.is_empty());
    assert_eq!(result.errors, vec!["batch XX-NONE-00000 not found in input".to_string()]);
    assert!(result.has_errors());
}

#[test]
fn abort_on_error_skips_generation() {
    let standards = standards();
    let rules = load_rules(&standards).expect("rules");
    let input = input_dir();
    let options = RunOptions::new(input.path(), output_dir(&input))
        .with_batches(vec!["GB-BETA-00002".to_string()])
        .with_abort_on_error(true)
        .with_dry_run(true);

    let result = run_batches(&standards, &rules, &options).expect("run");

    let outcome = &result.batches[0].outcome;
    assert_eq!(outcome.status, BatchStatus::RejectedDataQuality);
    assert!(outcome.document.is_none());
}

#[test]
fn zero_impaired_amounts_are_omitted_and_zero_exposure_rates_are_zero() {
    let standards = standards();
    let rules = load_rules(&standards).expect("rules");
    let input = input_dir();
    fs::write(
        input.path().join("credit.csv"),
        "\
bank_id,corporate_exposure,corporate_rw,corporate_impaired,retail_exposure,retail_rw,retail_impaired,sovereign_exposure,sovereign_rw,sovereign_impaired
US-ACME-00001,0,100,1000,3000000,75,0.00,0,0,0.00
",
    )
    .expect("write credit");
    let options = RunOptions::new(input.path(), output_dir(&input))
        .with_batches(vec!["US-ACME-00001".to_string()])
        .with_dry_run(true);

    let result = run_batches(&standards, &rules, &options).expect("run");

    let acme = &result.batches[0];
    assert_eq!(
        acme.outcome.status,
        BatchStatus::Compliant,
        "{:?}",
        acme.outcome.data_quality_errors
    );
    let document = acme.outcome.document.as_ref().expect("document");
    let xml = bankreg_report::to_xml_string(document).expect("serialize");
    assert_eq!(xml.matches("<ImpairedLoans>").count(), 1);
    assert_eq!(xml.matches("<ImpairmentRate>").count(), 1);
    assert!(xml.contains("<ImpairedLoans>1000.00</ImpairedLoans>"));
    assert!(xml.contains("<ImpairmentRate>0.00</ImpairmentRate>"));
}
