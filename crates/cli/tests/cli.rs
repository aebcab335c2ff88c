use assert_cmd::Command;

fn libris(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("libris").unwrap();
    cmd.env("LIBRIS_CONFIG_DIR", dir.path())
        .env(
            "LIBRIS__DATABASE__URL",
            format!("sqlite://{}", dir.path().join("libris.db").display()),
        )
        .env("RUST_LOG", "error");
    cmd
}

#[test]
fn migrate_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();

    let first = libris(&dir).arg("migrate").assert().success();
    let out = String::from_utf8(first.get_output().stdout.clone()).unwrap();
    assert!(!out.starts_with("applied 0 "));

    libris(&dir)
        .arg("migrate")
        .assert()
        .success()
        .stdout("applied 0 migration(s)\n");
}

#[test]
fn sweep_on_an_empty_library_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    libris(&dir)
        .args(["sweep", "--date", "2024-03-01"])
        .assert()
        .success()
        .stdout("fines created: 0, due-soon notices: 0, overdue notices: 0\n");
}

#[test]
fn sweep_rejects_a_malformed_date() {
    let dir = tempfile::tempdir().unwrap();
    libris(&dir)
        .args(["sweep", "--date", "March"])
        .assert()
        .failure();
}
