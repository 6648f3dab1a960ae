use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn promptkeep(home: &Path) -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("promptkeep")?;
    cmd.env("PROMPTKEEP_HOME", home).env_remove("RUST_LOG");
    Ok(cmd)
}

fn add(home: &Path, title: &str, content: &str, tag: &str) -> Result<String, Box<dyn std::error::Error>> {
    let out = promptkeep(home)?
        .args(["add", "--title", title, "--tag", tag, content])
        .output()?;
    assert!(out.status.success());
    Ok(String::from_utf8(out.stdout)?.trim().to_string())
}

#[test]
fn add_then_list_and_show() -> Result<(), Box<dyn std::error::Error>> {
    let home = tempdir()?;
    let id = add(home.path(), "Review", "review this diff", "Coding & Development")?;

    promptkeep(home.path())?
        .arg("list")
        .assert()
        .success()
        .stdout(contains(format!("{id}\tReview\tCoding & Development")));

    promptkeep(home.path())?
        .args(["show", &id])
        .assert()
        .success()
        .stdout(contains(r#""content": "review this diff""#));

    assert!(home.path().join("data").join("sync.json").exists());
    Ok(())
}

#[test]
fn oversized_prompt_round_trips_through_cli() -> Result<(), Box<dyn std::error::Error>> {
    let home = tempdir()?;
    let content = "q".repeat(10_000);
    let id = add(home.path(), "Big", &content, "Personal")?;

    let out = promptkeep(home.path())?.args(["show", &id]).output()?;
    assert!(out.status.success());
    let shown: serde_json::Value = serde_json::from_slice(&out.stdout)?;
    assert_eq!(shown["content"].as_str(), Some(content.as_str()));
    Ok(())
}

#[test]
fn search_filters_by_tag_and_text() -> Result<(), Box<dyn std::error::Error>> {
    let home = tempdir()?;
    add(home.path(), "Foo refactor", "x", "Coding & Development")?;
    add(home.path(), "Notes", "about foo", "Writing & Content")?;

    promptkeep(home.path())?
        .args(["search", "--tag", "Coding & Development", "foo"])
        .assert()
        .success()
        .stdout(contains("Foo refactor"))
        .stdout(contains("Notes").not());
    Ok(())
}

#[test]
fn export_then_import_into_fresh_store() -> Result<(), Box<dyn std::error::Error>> {
    let home = tempdir()?;
    add(home.path(), "One", "first", "Personal")?;
    add(home.path(), "Two", "second", "Productivity")?;

    let out_dir = tempdir()?;
    promptkeep(home.path())?
        .args(["export", "--out"])
        .arg(out_dir.path())
        .assert()
        .success()
        .stdout(contains("Exported 2 prompts"));
    let export = fs::read_dir(out_dir.path())?
        .next()
        .ok_or("no export file written")??
        .path();

    let other = tempdir()?;
    promptkeep(other.path())?
        .arg("import")
        .arg(&export)
        .assert()
        .success()
        .stdout(contains("Imported 2 prompts (2 total)"));
    promptkeep(other.path())?
        .arg("import")
        .arg(&export)
        .assert()
        .success()
        .stdout(contains("Imported 2 prompts (2 total)"));

    promptkeep(other.path())?
        .arg("tags")
        .assert()
        .success()
        .stdout("Personal\nProductivity\n");
    Ok(())
}

#[test]
fn invalid_import_fails_without_changes() -> Result<(), Box<dyn std::error::Error>> {
    let home = tempdir()?;
    add(home.path(), "Keep", "me", "Personal")?;

    promptkeep(home.path())?
        .args(["import", "-"])
        .write_stdin(r#"{"not":"an array"}"#)
        .assert()
        .failure()
        .stderr(contains("invalid import"));

    promptkeep(home.path())?
        .arg("list")
        .assert()
        .success()
        .stdout(contains("Keep"));
    Ok(())
}

#[test]
fn migrate_to_local_uses_bulk_backend() -> Result<(), Box<dyn std::error::Error>> {
    let home = tempdir()?;
    let data = home.path().join("elsewhere");
    promptkeep(home.path())?
        .arg("--data-dir")
        .arg(&data)
        .args(["add", "--title", "T", "body"])
        .assert()
        .success();

    promptkeep(home.path())?
        .arg("--data-dir")
        .arg(&data)
        .args(["migrate", "local"])
        .assert()
        .success()
        .stdout(contains("Migrated 1 prompts to local (bulk backend)"));

    assert!(data.join("local.sqlite").exists());
    promptkeep(home.path())?
        .arg("--data-dir")
        .arg(&data)
        .arg("stats")
        .assert()
        .success()
        .stdout(contains(r#""storage_type": "local""#));
    Ok(())
}

#[test]
fn sync_status_defaults_to_never_synced() -> Result<(), Box<dyn std::error::Error>> {
    let home = tempdir()?;
    promptkeep(home.path())?
        .args(["notion-config", "--api-key", "secret", "--page-id", "p1"])
        .assert()
        .success()
        .stdout(contains("Saved Notion configuration"));

    promptkeep(home.path())?
        .arg("sync-status")
        .assert()
        .success()
        .stdout(contains(r#""lastSynced": null"#));
    Ok(())
}

#[test]
fn removing_unknown_id_fails() -> Result<(), Box<dyn std::error::Error>> {
    let home = tempdir()?;
    promptkeep(home.path())?
        .args(["rm", "missing"])
        .assert()
        .failure()
        .stderr(contains("prompt not found: missing"));
    Ok(())
}

#[test]
fn adding_untitled_prompt_fails() -> Result<(), Box<dyn std::error::Error>> {
    let home = tempdir()?;
    promptkeep(home.path())?
        .args(["add", "--title", "", "body"])
        .assert()
        .failure()
        .stderr(contains("has an empty `title`"));

    promptkeep(home.path())?
        .arg("list")
        .assert()
        .success()
        .stdout("");
    Ok(())
}
