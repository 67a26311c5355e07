use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const MANUAL: &str = "# Install\n\nDownload the archive and unpack it somewhere on your path. \
Make sure the binary is executable.\n\n# Configure\n\nWrite a small TOML file next to the \
binary. Every option has a sensible default.\n\n# Run\n\nPoint the tool at an extracted text \
file and read the chunks from stdout.\n";

#[allow(deprecated)]
fn docsplit(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("docsplit").expect("binary");
    cmd.current_dir(workdir);
    cmd
}

fn write_manual(dir: &Path) {
    fs::write(dir.join("manual.md"), MANUAL).unwrap();
}

#[test]
fn chunk_json_reconstructs_document() {
    let temp = tempdir().unwrap();
    write_manual(temp.path());

    let output = docsplit(temp.path())
        .args([
            "chunk",
            "manual.md",
            "--estimate",
            "--chunk-size",
            "24",
            "--overlap",
            "4",
            "--page-count",
            "3",
            "--has-tables",
            "--json",
        ])
        .output()
        .expect("command run");
    assert!(output.status.success(), "{output:?}");

    let body: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(body["document_id"], "manual");
    assert_eq!(body["complete_text"], MANUAL);
    assert_eq!(body["token_count_estimated"], true);

    let chunks = body["chunks"].as_array().unwrap();
    assert!(chunks.len() > 1);
    let mut rebuilt = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk["chunk_index"], i);
        assert_eq!(chunk["metadata"]["page_count"], 3);
        assert_eq!(chunk["metadata"]["has_tables"], true);
        assert_eq!(chunk["metadata"]["document_type"], "md");
        let content = chunk["content"].as_str().unwrap();
        let overlap = chunk["overlap_len"].as_u64().unwrap() as usize;
        rebuilt.push_str(&content[overlap..]);
    }
    assert_eq!(rebuilt, MANUAL);
}

#[test]
fn chunk_jsonl_uses_config_file_and_flag_overrides() {
    let temp = tempdir().unwrap();
    write_manual(temp.path());
    fs::write(
        temp.path().join("chunking.toml"),
        "chunk_size = 40\nchunk_overlap = 0\nstrategy = \"hierarchical\"\n",
    )
    .unwrap();

    let output = docsplit(temp.path())
        .args([
            "chunk",
            "manual.md",
            "--estimate",
            "--config",
            "chunking.toml",
            "--heading-level",
            "1",
            "--jsonl",
        ])
        .output()
        .expect("command run");
    assert!(output.status.success(), "{output:?}");

    let stdout = String::from_utf8(output.stdout).unwrap();
    let records: Vec<Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert!(records.len() >= 3);
    assert!(records
        .iter()
        .all(|record| record["metadata"]["processing_method"] == "hierarchical"));
    assert!(records
        .iter()
        .skip(1)
        .all(|record| record["content"].as_str().unwrap().starts_with('#')
            || record["overlap_len"] == 0));
}

#[test]
fn invalid_overlap_fails_before_chunking() {
    let temp = tempdir().unwrap();
    write_manual(temp.path());

    docsplit(temp.path())
        .args([
            "chunk",
            "manual.md",
            "--estimate",
            "--chunk-size",
            "10",
            "--overlap",
            "10",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn counter_choice_is_required() {
    let temp = tempdir().unwrap();
    write_manual(temp.path());

    docsplit(temp.path())
        .args(["chunk", "manual.md"])
        .assert()
        .failure();
}

#[test]
fn human_summary_and_stats() {
    let temp = tempdir().unwrap();
    write_manual(temp.path());

    docsplit(temp.path())
        .args([
            "chunk",
            "manual.md",
            "--estimate",
            "--chunk-size",
            "30",
            "--overlap",
            "5",
            "--stats",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("manual:"))
        .stdout(predicate::str::contains("Chunks: "))
        .stdout(predicate::str::contains("(estimated)"));
}

#[test]
fn count_reports_estimated_tokens() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("note.txt"), "abcdefgh").unwrap();

    let output = docsplit(temp.path())
        .args(["count", "note.txt", "--estimate", "--json"])
        .output()
        .expect("command run");
    assert!(output.status.success(), "{output:?}");

    let body: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(body["tokens"], 2);
    assert_eq!(body["chars"], 8);
    assert_eq!(body["estimated"], true);
}
