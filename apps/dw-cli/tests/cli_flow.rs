// cli_flow.rs — End-to-end integration test for the dw binary.
//
// Flow:
//   1. Write a schema with a parent/child pair
//   2. dw item new → create drafts for both
//   3. dw draft publish on the child → parent published first
//   4. dw item set → update draft, inspected and reverted
//   5. dw item trash → destroy drafts cascade to the child
//   6. dw draft publish on the parent's destroy draft → both gone

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const SCHEMA: &str = r#"
[[types]]
name = "Parent"
columns = ["name", "title", "published_at", "trashed_at"]

[types.draftable]

[[types.relationships]]
name = "children"
kind = "has_many"
target = "Child"
dependent = "destroy"

[[types]]
name = "Child"
columns = ["name", "parent_id", "published_at", "trashed_at"]

[types.draftable]

[[types.relationships]]
name = "parent"
kind = "belongs_to"
target = "Parent"
"#;

fn dw(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dw"))
        .arg("--config")
        .arg(dir.join("draftwork.toml"))
        .arg("--data")
        .arg(dir.join("store.json"))
        .args(["--whodunnit", "alice"])
        .args(args)
        .output()
        .unwrap()
}

/// Run `dw` and return its stdout, failing the test on a non-zero exit.
fn dw_ok(dir: &Path, args: &[&str]) -> String {
    let output = dw(dir, args);
    assert!(
        output.status.success(),
        "dw {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn draft_publish_revert_through_the_cli() {
    let project = TempDir::new().unwrap();
    let dir = project.path();
    std::fs::write(dir.join("draftwork.toml"), SCHEMA).unwrap();

    // =========================================================
    // 1. Create a parent and a child through drafting
    // =========================================================
    let out = dw_ok(dir, &["item", "new", "Parent", "--set", "name=Mum"]);
    assert!(out.contains("Created Parent #1"), "{}", out);
    assert!(out.contains("Draft: #1 (create)"), "{}", out);

    let out = dw_ok(dir, &["item", "new", "Child", "--set", "name=Kid", "--set", "parent_id=1"]);
    assert!(out.contains("Created Child #1"), "{}", out);
    assert!(out.contains("Draft: #2 (create)"), "{}", out);

    let out = dw_ok(dir, &["draft", "list"]);
    assert!(out.contains("2 draft(s) total."), "{}", out);
    assert!(out.contains("alice"), "{}", out);

    // =========================================================
    // 2. Publishing the child publishes the parent first
    // =========================================================
    let out = dw_ok(dir, &["draft", "deps", "2"]);
    assert!(out.contains("Parent#1"), "{}", out);

    let out = dw_ok(dir, &["draft", "publish", "2"]);
    assert!(out.contains("Publishing 1 dependency draft(s) first"), "{}", out);
    assert!(out.contains("Published draft #2"), "{}", out);

    let out = dw_ok(dir, &["draft", "list"]);
    assert!(out.contains("No drafts found."), "{}", out);
    let out = dw_ok(dir, &["item", "list", "Parent", "--scope", "published"]);
    assert!(out.contains("1 item(s) total."), "{}", out);

    // =========================================================
    // 3. Update draft: stashed, inspected, reverted
    // =========================================================
    let out = dw_ok(dir, &["item", "set", "Parent", "1", "--set", "name=Mother"]);
    assert!(out.contains("Draft: #3 (update)"), "{}", out);

    let out = dw_ok(dir, &["item", "show", "Parent", "1"]);
    assert!(out.contains("Drafted values:"), "{}", out);
    assert!(out.contains("Mum -> Mother"), "{}", out);

    let out = dw_ok(dir, &["draft", "show", "3"]);
    assert!(out.contains("Event:     update"), "{}", out);
    assert!(out.contains("Mum -> Mother"), "{}", out);

    let out = dw_ok(dir, &["draft", "revert", "3"]);
    assert!(out.contains("Reverted draft #3"), "{}", out);
    let out = dw_ok(dir, &["item", "show", "Parent", "1"]);
    assert!(out.contains("Draft:     none"), "{}", out);
    assert!(out.contains("Mum"), "{}", out);

    // =========================================================
    // 4. Trash cascades to the child
    // =========================================================
    let out = dw_ok(dir, &["item", "trash", "Parent", "1"]);
    assert!(out.contains("Trashed Parent #1"), "{}", out);
    let out = dw_ok(dir, &["item", "list", "Child", "--scope", "trashed"]);
    assert!(out.contains("1 item(s) total."), "{}", out);
    let out = dw_ok(dir, &["draft", "list", "--event", "destroy"]);
    assert!(out.contains("2 draft(s) total."), "{}", out);

    // =========================================================
    // 5. Publishing the parent's destroy removes both items
    // =========================================================
    let out = dw_ok(dir, &["draft", "publish", "4"]);
    assert!(out.contains("Publishing 1 dependency draft(s) first"), "{}", out);
    let out = dw_ok(dir, &["item", "list", "Parent"]);
    assert!(out.contains("No Parent items found."), "{}", out);
    let out = dw_ok(dir, &["item", "list", "Child"]);
    assert!(out.contains("No Child items found."), "{}", out);
}

#[test]
fn setting_one_attribute_keeps_the_other_columns() {
    let project = TempDir::new().unwrap();
    let dir = project.path();
    std::fs::write(dir.join("draftwork.toml"), SCHEMA).unwrap();

    dw_ok(dir, &["item", "new", "Parent", "--set", "name=Mum", "--set", "title=Dr"]);
    dw_ok(dir, &["draft", "publish", "1"]);

    let out = dw_ok(dir, &["item", "set", "Parent", "1", "--set", "name=Mother"]);
    assert!(out.contains("Draft: #2 (update)"), "{}", out);

    // Only the assigned attribute is drafted.
    let out = dw_ok(dir, &["draft", "show", "2"]);
    assert!(out.contains("Mum -> Mother"), "{}", out);
    assert!(!out.contains("-> null"), "{}", out);

    dw_ok(dir, &["draft", "publish", "2"]);
    let out = dw_ok(dir, &["item", "show", "Parent", "1"]);
    assert!(out.contains("Mother"), "{}", out);
    assert!(out.contains("Dr"), "{}", out);
    assert!(!out.contains("id                   null"), "{}", out);

    let store = std::fs::read_to_string(dir.join("store.json")).unwrap();
    let store: serde_json::Value = serde_json::from_str(&store).unwrap();
    let row = &store["items"]["Parent"]["rows"]["1"];
    assert_eq!(row["id"], serde_json::json!(1));
    assert_eq!(row["name"], serde_json::json!("Mother"));
    assert_eq!(row["title"], serde_json::json!("Dr"));
    assert!(!row["published_at"].is_null(), "{}", row);
}

#[test]
fn unknown_draft_is_an_error() {
    let project = TempDir::new().unwrap();
    let dir = project.path();
    std::fs::write(dir.join("draftwork.toml"), SCHEMA).unwrap();

    let output = dw(dir, &["draft", "publish", "99"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not found"), "{}", stderr);
}

#[test]
fn no_drafts_flag_saves_directly() {
    let project = TempDir::new().unwrap();
    let dir = project.path();
    std::fs::write(dir.join("draftwork.toml"), SCHEMA).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_dw"))
        .arg("--config")
        .arg(dir.join("draftwork.toml"))
        .arg("--data")
        .arg(dir.join("store.json"))
        .args(["--no-drafts", "item", "new", "Parent", "--set", "name=Mum"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let out = String::from_utf8(output.stdout).unwrap();
    assert!(out.contains("Draft: none"), "{}", out);

    let out = dw_ok(dir, &["draft", "list"]);
    assert!(out.contains("No drafts found."), "{}", out);
}
