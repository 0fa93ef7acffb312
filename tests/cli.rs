use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const PLAN: &str = "\
Expense,Cost Type,Unit Price,Amount,Project,Supplier,PIC,Notes,Currency
Laptop,Hardware,\"1,200.00\",2,Apollo,FPT Shop,hoa.pt,For new hires,USD
Monitor,Hardware,300,4,Apollo,FPT Shop,hoa.pt,,USD
";

const BAD_PLAN: &str = "\
Expense,Cost Type,Unit Price,Amount,Project,Supplier,PIC,Notes,Currency
Laptop,Hardware,1200,2,Apollo,FPT Shop,hoa.pt,,USD
Flight,Travel,abc,1,Apollo,FPT Shop,hoa.pt,,USD
";

fn finplan(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("finplan").unwrap();
    cmd.env("HOME", home).env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Initialized data dir with reference data and one term.
fn setup(user: &str) -> TempDir {
    let home = TempDir::new().unwrap();
    let data = home.path().join("data");
    finplan(home.path())
        .args(["init", "--data-dir", data.to_str().unwrap(), "--user", user])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized finplan"));

    let steps: &[&[&str]] = &[
        &["lookups", "add", "project", "Apollo"],
        &["lookups", "add", "supplier", "FPT Shop"],
        &["users", "add", "hoa.pt", "--role", "financial_staff", "--department", "Engineering"],
        &["users", "add", "minh.lv", "--role", "accountant"],
        &["terms", "add", "Q1 2025", "--start", "2025-01-01", "--end", "2025-03-31"],
    ];
    for args in steps {
        finplan(home.path()).args(*args).assert().success();
    }
    home
}

#[test]
fn status_without_database() {
    let home = TempDir::new().unwrap();
    finplan(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Database not found"));
}

#[test]
fn commands_need_init() {
    let home = TempDir::new().unwrap();
    finplan(home.path())
        .args(["terms", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("finplan init"));
}

#[test]
fn upload_plan_and_refuse_duplicate() {
    let home = setup("minh.lv");
    let plan = write(home.path(), "plan.csv", PLAN);
    let plan = plan.to_str().unwrap();

    finplan(home.path())
        .args(["plans", "upload", plan, "--term", "Q1 2025", "--plan-name", "IT"])
        .assert()
        .success()
        .stdout(predicate::str::contains("plan IT v1 with 2 expenses"));

    finplan(home.path())
        .args(["plans", "upload", plan, "--term", "Q1 2025", "--plan-name", "IT"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already been uploaded"));

    finplan(home.path())
        .args(["plans", "upload", plan, "--term", "Q1 2025", "--plan-name", "IT", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("plan IT v2"));

    finplan(home.path())
        .args(["plans", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("IT"));

    finplan(home.path())
        .args(["terms", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("In progress"));
}

#[test]
fn invalid_rows_block_upload() {
    let home = setup("minh.lv");
    let plan = write(home.path(), "bad.csv", BAD_PLAN);

    finplan(home.path())
        .args(["plans", "upload", plan.to_str().unwrap(), "--term", "Q1 2025"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Row 2"))
        .stdout(predicate::str::contains("Unit Price"))
        .stderr(predicate::str::contains("Submission blocked: 1 invalid row(s)"));

    finplan(home.path())
        .args(["expenses", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Laptop").not());
}

#[test]
fn dry_run_prints_payload_without_storing() {
    let home = setup("minh.lv");
    let plan = write(home.path(), "plan.csv", PLAN);

    finplan(home.path())
        .args(["plans", "upload", plan.to_str().unwrap(), "--term", "Q1 2025", "--dry-run", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"termId\": 1"))
        .stdout(predicate::str::contains("\"unitPrice\": 1200.0"))
        .stdout(predicate::str::contains("dry run"));

    finplan(home.path())
        .args(["expenses", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Laptop").not());
}

#[test]
fn report_review_by_accountant() {
    let home = setup("minh.lv");
    let plan = write(home.path(), "plan.csv", PLAN);
    finplan(home.path())
        .args(["plans", "upload", plan.to_str().unwrap(), "--term", "Q1 2025"])
        .assert()
        .success();

    finplan(home.path())
        .args(["reports", "create", "--term", "Q1 2025", "Q1 spend"])
        .assert()
        .success()
        .stdout(predicate::str::contains("with 2 expenses awaiting approval"));

    let review = write(home.path(), "review.csv", "Expense ID,Status\n1,approved\n2,denied\n");
    finplan(home.path())
        .args(["reports", "review", review.to_str().unwrap(), "--report", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reviewed 2 expenses"));

    finplan(home.path())
        .args(["expenses", "list", "--report", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Approved"))
        .stdout(predicate::str::contains("Denied"));
}

#[test]
fn review_outside_report_is_invalid() {
    let home = setup("minh.lv");
    let plan = write(home.path(), "plan.csv", PLAN);
    finplan(home.path())
        .args(["plans", "upload", plan.to_str().unwrap(), "--term", "Q1 2025"])
        .assert()
        .success();
    finplan(home.path())
        .args(["reports", "create", "--term", "Q1 2025", "Q1"])
        .assert()
        .success();

    let review = write(home.path(), "review.csv", "Expense ID,Status\n1,approved\n9,approved\n");
    finplan(home.path())
        .args(["reports", "review", review.to_str().unwrap(), "--report", "1"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Row 2"));
}

#[test]
fn staff_cannot_review() {
    let home = setup("hoa.pt");
    let review = write(home.path(), "review.csv", "Expense ID,Status\n1,approved\n");
    finplan(home.path())
        .args(["reports", "review", review.to_str().unwrap(), "--report", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot review reports"));
}

#[test]
fn template_and_export_share_headers() {
    let home = setup("minh.lv");
    let template = home.path().join("template.csv");
    finplan(home.path())
        .args(["template", template.to_str().unwrap()])
        .assert()
        .success();
    let header = std::fs::read_to_string(&template).unwrap();
    assert!(header.starts_with("Expense,Cost Type,Unit Price,Amount,Project,Supplier,PIC,Notes,Currency"));

    let plan = write(home.path(), "plan.csv", PLAN);
    finplan(home.path())
        .args(["plans", "upload", plan.to_str().unwrap(), "--term", "Q1 2025"])
        .assert()
        .success();

    // An exported plan can be uploaded again as a new version.
    let exported = home.path().join("export.csv");
    finplan(home.path())
        .args(["expenses", "export", exported.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 2 expenses"));
    let content = std::fs::read_to_string(&exported).unwrap();
    assert!(content.starts_with(header.trim_end()));
    assert!(content.contains("Monitor"));

    finplan(home.path())
        .args(["plans", "upload", exported.to_str().unwrap(), "--term", "Q1 2025"])
        .assert()
        .success()
        .stdout(predicate::str::contains("v2"));
}

#[test]
fn unknown_lookup_kind_fails() {
    let home = setup("minh.lv");
    finplan(home.path())
        .args(["lookups", "add", "vendor", "Acme"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown lookup kind"));
}
