// End-to-end: sixteen CSV partitions on disk → master table → benchmarks

use std::fs;
use std::path::Path;

use survey_merge::validator::{YOUTH_SHARE_OF_UNEMPLOYED, YOUTH_UNEMPLOYMENT_RATE};
use survey_merge::{
    load_csv_table, write_csv, KeyPadding, MergeError, ModuleInputs, Pipeline, PipelineConfig,
    Validator, Value,
};

const ROSTER_HEADER: &str =
    "YEAR,QUARTER,PSU,EA,HH_NO,HR_LN,HR_AGE,LF_STATUS,REGION,WGT_Q1,WGT_Q2,WGT_Q3,WGT_Q4";
const EMPLOYMENT_HEADER: &str = "YEAR,QUARTER,PSU,EA,HH_NO,EMP_HRLN,EMP_HOURS,REGION";
const MIGRATION_HEADER: &str = "YEAR,QUARTER,PSU,EA,HH_NO,MGT_LN,MGT_REASON";
const HOUSEHOLD_HEADER: &str = "YEAR,QUARTER,PSU,EA,HH_NO,HH_SIZE,REGION,WGT_Q1,WGT_Q2,WGT_Q3,WGT_Q4";

fn write(dir: &Path, name: &str, header: &str, rows: &[&str]) {
    let mut content = String::from(header);
    for row in rows {
        content.push('\n');
        content.push_str(row);
    }
    content.push('\n');
    fs::write(dir.join(name), content).unwrap();
}

/// Youth unemployed weight 78.9, youth employed 1017, older unemployed 21.1:
///   A = 78.9 / 1095.9 × 100 ≈ 7.1996
///   B = 78.9 / 100    × 100 = 78.9
fn write_survey(dir: &Path) {
    write(
        dir,
        "roster_q1.csv",
        ROSTER_HEADER,
        &[
            "2023,1,001,01,0001,01,22,2,North,78.9,,,",
            "2023,1,001,01,0001,02,10,,North,50.0,,,",
        ],
    );
    write(dir, "roster_q2.csv", ROSTER_HEADER, &["2023,2,001,01,0001,01,22,1,North,,1017,,"]);
    write(dir, "roster_q3.csv", ROSTER_HEADER, &["2023,3,001,02,0002,01,40,2,South,,,21.1,"]);
    write(dir, "roster_q4.csv", ROSTER_HEADER, &["2023,4,001,02,0002,01,50,1,South,,,,300"]);

    write(dir, "employment_q1.csv", EMPLOYMENT_HEADER, &[]);
    write(dir, "employment_q2.csv", EMPLOYMENT_HEADER, &["2023,2,001,01,0001,01,40,North"]);
    write(dir, "employment_q3.csv", EMPLOYMENT_HEADER, &[]);
    write(dir, "employment_q4.csv", EMPLOYMENT_HEADER, &["2023,4,001,02,0002,01,35,South"]);

    write(dir, "migration_q1.csv", MIGRATION_HEADER, &["2023,1,001,01,0001,02,birth"]);
    write(dir, "migration_q2.csv", MIGRATION_HEADER, &[]);
    write(dir, "migration_q3.csv", MIGRATION_HEADER, &[]);
    write(dir, "migration_q4.csv", MIGRATION_HEADER, &[]);

    write(dir, "household_q1.csv", HOUSEHOLD_HEADER, &["2023,1,001,01,0001,2,North,120,,,"]);
    write(dir, "household_q2.csv", HOUSEHOLD_HEADER, &["2023,2,001,01,0001,2,North,,120,,"]);
    write(dir, "household_q3.csv", HOUSEHOLD_HEADER, &["2023,3,001,02,0002,1,South,,,80,"]);
    write(dir, "household_q4.csv", HOUSEHOLD_HEADER, &["2023,4,001,02,0002,1,South,,,,80"]);
}

/// Default configuration plus the survey's fixed key widths
fn survey_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.keys.padding = KeyPadding {
        psu: Some(3),
        ea: Some(2),
        household: Some(4),
        person_line: Some(2),
        ..KeyPadding::default()
    };
    config
}

fn run(dir: &Path) -> survey_merge::PipelineOutput {
    let config = survey_config();
    let inputs = ModuleInputs::from_dir(dir, &config).unwrap();
    Pipeline::new(config).unwrap().run(inputs).unwrap()
}

#[test]
fn test_full_merge_preserves_every_roster_row() {
    let dir = tempfile::tempdir().unwrap();
    write_survey(dir.path());

    let output = run(dir.path());
    let master = &output.master;

    assert_eq!(master.len(), 5);
    let keys: Vec<String> = (0..master.len())
        .map(|i| master.get(i, "PERSON_KEY").unwrap().canonical().unwrap())
        .collect();
    assert_eq!(
        keys,
        vec![
            "2023_1_001_01_0001_01",
            "2023_1_001_01_0001_02",
            "2023_2_001_01_0001_01",
            "2023_3_001_02_0002_01",
            "2023_4_001_02_0002_01",
        ]
    );

    // Module contributions land on the right people
    assert_eq!(master.get(2, "EMP_HOURS"), Some(&Value::Int(40)));
    assert_eq!(master.get(0, "EMP_HOURS"), Some(&Value::Missing));
    assert_eq!(master.get(1, "MGT_REASON"), Some(&Value::from("birth")));
    assert_eq!(master.get(3, "HH_SIZE"), Some(&Value::Int(1)));

    // Duplicates re-contributed by the joined modules were reconciled away
    for column in ["YEAR_emp", "HH_NO_mig", "REGION_hh", "WGT_Q1_hh", "REGION_emp"] {
        assert!(!master.has_column(column), "{column} should be dropped");
    }
    assert!(master.has_column("REGION"));

    let summary = &output.summary;
    assert!(summary.quality.all_passed());
    assert!(summary.warnings.is_empty(), "{:?}", summary.warnings);
    for join in &summary.joins {
        assert_eq!(join.rows_in, join.rows_out);
    }
}

#[test]
fn test_benchmarks_pass_on_constructed_survey() {
    let dir = tempfile::tempdir().unwrap();
    write_survey(dir.path());

    let output = run(dir.path());
    let validation = &output.summary.validation;
    println!("{}", output.summary.summary());

    let rate = validation.statistic(YOUTH_UNEMPLOYMENT_RATE).unwrap();
    let share = validation.statistic(YOUTH_SHARE_OF_UNEMPLOYED).unwrap();
    assert!((rate.calculated_value.unwrap() - 78.9 / 1095.9 * 100.0).abs() < 1e-9);
    assert!((share.calculated_value.unwrap() - 78.9).abs() < 1e-9);
    assert!(validation.overall_pass);
    assert!(output.summary.overall_pass);
}

#[test]
fn test_repeated_runs_are_bit_identical() {
    let dir = tempfile::tempdir().unwrap();
    write_survey(dir.path());

    let first = run(dir.path());
    let second = run(dir.path());

    assert_eq!(first.summary.master_fingerprint, second.summary.master_fingerprint);
    for (a, b) in first
        .summary
        .validation
        .statistics
        .iter()
        .zip(&second.summary.validation.statistics)
    {
        assert_eq!(
            a.calculated_value.map(f64::to_bits),
            b.calculated_value.map(f64::to_bits)
        );
    }
}

#[test]
fn test_written_master_validates_the_same() {
    let dir = tempfile::tempdir().unwrap();
    write_survey(dir.path());
    let output = run(dir.path());

    let path = dir.path().join("master.csv");
    write_csv(&output.master, &path).unwrap();
    let reloaded = load_csv_table(&path, "master").unwrap();
    assert_eq!(reloaded.len(), output.master.len());

    let config = PipelineConfig::default();
    let report = Validator::new(&config.validation).unwrap().validate(&reloaded);
    assert_eq!(report.overall_pass, output.summary.validation.overall_pass);
    assert_eq!(
        report.statistics[0].calculated_value,
        output.summary.validation.statistics[0].calculated_value
    );
}

#[test]
fn test_schema_conflict_aborts_before_joining() {
    let dir = tempfile::tempdir().unwrap();
    write_survey(dir.path());
    write(
        dir.path(),
        "roster_q3.csv",
        ROSTER_HEADER,
        &["2023,3,001,02,0002,01,forty,2,South,,,21.1,"],
    );

    let config = survey_config();
    let inputs = ModuleInputs::from_dir(dir.path(), &config).unwrap();
    let err = Pipeline::new(config).unwrap().run(inputs).unwrap_err();

    match err {
        MergeError::SchemaConflict {
            module,
            column,
            conflicting_quarter,
            ..
        } => {
            assert_eq!(module, "roster");
            assert_eq!(column, "HR_AGE");
            assert_eq!(conflicting_quarter, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_key_field_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    write_survey(dir.path());
    write(
        dir.path(),
        "employment_q2.csv",
        EMPLOYMENT_HEADER,
        &["2023,2,001,01,0001,01,40,North", "2023,2,001,01,,02,12,North"],
    );

    let config = survey_config();
    let inputs = ModuleInputs::from_dir(dir.path(), &config).unwrap();
    let err = Pipeline::new(config).unwrap().run(inputs).unwrap_err();

    match err {
        MergeError::KeyConstruction {
            ref module,
            quarter,
            row,
            ref field,
            ..
        } => {
            assert_eq!(module, "employment");
            assert_eq!(quarter, Some(2));
            assert_eq!(row, 2);
            assert_eq!(field, "HH_NO");
        }
        ref other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("quarter 2, row 2"));
}

#[test]
fn test_codes_of_different_widths_across_quarters_still_merge() {
    let dir = tempfile::tempdir().unwrap();
    write_survey(dir.path());
    write(
        dir.path(),
        "roster_q4.csv",
        ROSTER_HEADER,
        &["2023,4,001,10,0002,01,50,1,South,,,,300"],
    );
    write(dir.path(), "employment_q4.csv", EMPLOYMENT_HEADER, &["2023,4,001,10,0002,01,35,South"]);
    write(dir.path(), "household_q4.csv", HOUSEHOLD_HEADER, &["2023,4,001,10,0002,1,South,,,,80"]);

    let output = run(dir.path());
    let master = &output.master;

    assert_eq!(master.len(), 5);
    assert_eq!(
        master.get(4, "PERSON_KEY").unwrap().canonical().unwrap(),
        "2023_4_001_10_0002_01"
    );
    assert_eq!(master.get(4, "EMP_HOURS"), Some(&Value::Int(35)));
    assert_eq!(master.get(4, "HH_SIZE"), Some(&Value::Int(1)));
}
