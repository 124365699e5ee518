use std::path::{Path, PathBuf};

use wdc65c02_emulator::vectors::{self, TestCase};

fn data_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("data")
}

#[test]
fn test_bundled_vectors_pass() {
    let files = vectors::collect_files(data_dir()).unwrap();
    assert_eq!(files.len(), 5);

    for file in files {
        let report = vectors::run_file(&file).unwrap();
        assert!(report.total > 0, "{} is empty", file.display());
        assert!(
            report.is_success(),
            "{}\n{:#?}",
            report,
            report.failures
        );
        assert_eq!(report.cycle_mismatches, 0, "{}", report);
    }
}

#[test]
fn test_tampered_vector_fails() {
    let mut cases = vectors::load_file(data_dir().join("69.json")).unwrap();
    let case: &mut TestCase = &mut cases[0];
    case.final_state.a = Some(0x62);

    let outcome = vectors::run_case(case).unwrap();
    assert!(!outcome.passed());
    assert_eq!(outcome.mismatches, vec!["A: expected 62, got 04".to_string()]);
}

/// Runs the external `wdc65c02/v1` SingleStepTests suite when
/// `W65C02_SINGLESTEP_DIR` points at it.
#[test]
#[ignore]
fn test_external_suite() {
    let Some(dir) = std::env::var_os("W65C02_SINGLESTEP_DIR") else {
        eprintln!("W65C02_SINGLESTEP_DIR not set, skipping");
        return;
    };

    let mut failed = Vec::new();
    for file in vectors::collect_files(&dir).unwrap() {
        if vectors::is_skipped(&file) {
            continue;
        }
        let report = vectors::run_file(&file).unwrap();
        println!("{}", report);
        if !report.is_success() {
            failed.push(report.to_string());
        }
    }
    assert!(failed.is_empty(), "failing files:\n{}", failed.join("\n"));
}
