//! End-to-end tests of the CLI commands against a temporary data directory.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use cairn::cli::{
    Context, ExportFormat, cmd_export, cmd_hash, cmd_ids, cmd_init, cmd_promote, cmd_reason,
    cmd_reindex, cmd_show, cmd_status, cmd_verify,
};
use cairn::config::{CairnConfig, DataDir};
use cairn_core::{CairnError, Relation, RunMetadata, canonical_digest};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =============================================================================
// HELPERS
// =============================================================================

fn context(dir: &TempDir) -> Context {
    let data = DataDir::new(dir.path().join("data"));
    let config_path = data.config_file();
    Context {
        data,
        config: CairnConfig::default(),
        config_path,
        json_mode: false,
    }
}

fn hit_line(text: &str, path: &str, score: f64) -> String {
    serde_json::json!({
        "chunkText": text,
        "sourceMetadata": { "author": "Author", "title": path, "pathRelative": path, "chunkId": "c1" },
        "rankScore": score,
    })
    .to_string()
}

/// Five hits across three documents: one conflicting pair, one supporting pair.
fn write_hits(dir: &TempDir) -> PathBuf {
    let lines = [
        hit_line("Memory is the retention of past impressions. Filler follows here.", "james.pdf", 0.9),
        hit_line("Memory is not the retention of past impressions.", "skeptic.pdf", 0.8),
        hit_line("Memory is the retention of impressions over time.", "james.pdf", 0.7),
        hit_line("Habit is the flywheel of society.", "james.pdf", 0.6),
        hit_line("Habit is the enormous flywheel of society.", "other.pdf", 0.4),
    ];
    let path = dir.path().join("hits.jsonl");
    std::fs::write(&path, lines.join("\n")).unwrap();
    path
}

fn populated(dir: &TempDir) -> Context {
    let ctx = context(dir);
    cmd_init(&ctx, false).unwrap();
    cmd_promote(&ctx, &write_hits(dir), "memory retention habit", false).unwrap();
    cmd_reason(&ctx, Some(5), None, false).unwrap();
    ctx
}

fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).unwrap().len()
}

// =============================================================================
// INIT
// =============================================================================

#[test]
fn test_init_creates_layout() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    cmd_init(&ctx, false).unwrap();

    assert!(ctx.data.knowledge_log().is_file());
    assert!(ctx.data.reasoning_log().is_file());
    assert!(ctx.data.config_file().is_file());
    let config = CairnConfig::load(&ctx.data.config_file()).unwrap();
    assert_eq!(config, CairnConfig::default());
}

#[test]
fn test_init_does_not_truncate_logs() {
    let dir = TempDir::new().unwrap();
    let ctx = populated(&dir);
    let before = file_len(&ctx.data.knowledge_log());

    cmd_init(&ctx, true).unwrap();
    assert_eq!(file_len(&ctx.data.knowledge_log()), before);
}

#[test]
fn test_commands_require_init() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    let err = cmd_status(&ctx).unwrap_err();
    assert!(matches!(err, CairnError::NotFound(_)));
    assert!(err.to_string().contains("cairn init"));
}

// =============================================================================
// PROMOTE & REASON
// =============================================================================

#[test]
fn test_promote_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    cmd_init(&ctx, false).unwrap();
    let hits = write_hits(&dir);

    cmd_promote(&ctx, &hits, "memory retention", false).unwrap();
    let len = file_len(&ctx.data.knowledge_log());
    assert_eq!(ctx.data.open_knowledge().unwrap().len(), 5);

    cmd_promote(&ctx, &hits, "memory retention", false).unwrap();
    assert_eq!(file_len(&ctx.data.knowledge_log()), len);

    let meta = RunMetadata::load(&ctx.data.run_meta()).unwrap();
    let run = meta.promotion.unwrap();
    assert_eq!(run.report.promoted, 0);
    assert_eq!(run.report.already_present, 5);
    assert_eq!(run.knowledge_total, 5);
}

#[test]
fn test_promote_dry_run_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    cmd_init(&ctx, false).unwrap();

    cmd_promote(&ctx, &write_hits(&dir), "memory", true).unwrap();
    assert_eq!(file_len(&ctx.data.knowledge_log()), 0);
    assert!(!ctx.data.run_meta().exists());
}

#[test]
fn test_promote_accepts_json_array() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    cmd_init(&ctx, false).unwrap();
    let path = dir.path().join("hits.json");
    std::fs::write(
        &path,
        format!("[{}]", hit_line("Attention is selective.", "a.pdf", 0.9)),
    )
    .unwrap();

    cmd_promote(&ctx, &path, "attention", false).unwrap();
    let units = ctx.data.open_knowledge().unwrap().load_all().unwrap();
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].claim, "Attention is selective.");
}

#[test]
fn test_promote_rejects_malformed_hits() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    cmd_init(&ctx, false).unwrap();
    let path = dir.path().join("bad.jsonl");
    std::fs::write(&path, "{\"chunkText\": 7}\n").unwrap();

    let err = cmd_promote(&ctx, &path, "q", false).unwrap_err();
    assert!(matches!(err, CairnError::InvalidHit(_)));
}

#[test]
fn test_reason_is_idempotent_and_bounded() {
    let dir = TempDir::new().unwrap();
    let ctx = populated(&dir);
    let len = file_len(&ctx.data.reasoning_log());
    let units = ctx.data.open_reasoning().unwrap().load_all().unwrap();
    assert!(!units.is_empty());
    assert!(units.iter().any(|ru| ru.relation == Relation::Conflict));

    cmd_reason(&ctx, Some(5), None, false).unwrap();
    assert_eq!(file_len(&ctx.data.reasoning_log()), len);

    let run = RunMetadata::load(&ctx.data.run_meta()).unwrap().reasoning.unwrap();
    assert_eq!(run.appended, 0);
    assert_eq!(run.already_present, units.len());
}

#[test]
fn test_reason_with_k_one_limits_degree() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    cmd_init(&ctx, false).unwrap();
    cmd_promote(&ctx, &write_hits(&dir), "memory habit", false).unwrap();
    cmd_reason(&ctx, Some(1), Some("memory".to_string()), false).unwrap();

    let kus = ctx.data.open_knowledge().unwrap().len();
    let rus = ctx.data.open_reasoning().unwrap().load_all().unwrap();
    assert!(rus.len() <= kus);
    assert!(rus.iter().all(|ru| ru.topic == "memory"));
}

#[test]
fn test_reason_rejects_zero_k() {
    let dir = TempDir::new().unwrap();
    let ctx = populated(&dir);
    let err = cmd_reason(&ctx, Some(0), None, false).unwrap_err();
    assert!(matches!(err, CairnError::ConfigError(_)));
}

// =============================================================================
// VERIFY
// =============================================================================

#[test]
fn test_verify_clean_corpus() {
    let dir = TempDir::new().unwrap();
    let ctx = populated(&dir);
    cmd_verify(&ctx, None, None).unwrap();
}

#[test]
fn test_verify_against_expected_ids() {
    let dir = TempDir::new().unwrap();
    let ctx = populated(&dir);
    let ids: Vec<String> = ctx
        .data
        .open_knowledge()
        .unwrap()
        .ids()
        .into_iter()
        .map(|id| id.0)
        .collect();

    let expected = dir.path().join("expected.txt");
    std::fs::write(&expected, ids.join("\n")).unwrap();
    cmd_verify(&ctx, Some(&expected), None).unwrap();

    let mut swapped = ids.clone();
    swapped.swap(0, 1);
    std::fs::write(&expected, swapped.join("\n")).unwrap();
    let err = cmd_verify(&ctx, Some(&expected), None).unwrap_err();
    assert!(matches!(err, CairnError::OrderViolation { position: 0, .. }));
    assert!(err.is_integrity());
}

#[test]
fn test_corrupt_log_is_integrity_error() {
    let dir = TempDir::new().unwrap();
    let ctx = populated(&dir);
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(ctx.data.knowledge_log())
        .unwrap();
    file.write_all(b"{not json}\n").unwrap();
    drop(file);

    let err = cmd_verify(&ctx, None, None).unwrap_err();
    assert!(err.is_integrity(), "unexpected error: {err}");
}

#[test]
fn test_tampered_evidence_is_integrity_error() {
    let dir = TempDir::new().unwrap();
    let ctx = populated(&dir);
    let path = ctx.data.reasoning_log();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("past impressions"));

    // Same length, so the offset index still describes the file.
    std::fs::write(&path, text.replace("past impressions", "past expressions")).unwrap();
    let err = cmd_verify(&ctx, None, None).unwrap_err();
    assert!(matches!(err, CairnError::EvidenceMismatch { .. }), "unexpected error: {err}");
    assert!(err.is_integrity());
}

#[test]
fn test_second_writer_is_refused() {
    let dir = TempDir::new().unwrap();
    let ctx = populated(&dir);
    let before = file_len(&ctx.data.knowledge_log());
    let held = ctx.data.open_knowledge().unwrap();

    let err = cmd_promote(&ctx, &write_hits(&dir), "memory habit", false).unwrap_err();
    assert!(matches!(err, CairnError::StoreLocked(_)), "unexpected error: {err}");
    assert!(!err.is_integrity());
    assert!(ctx.data.knowledge_index().is_file());

    drop(held);
    assert_eq!(file_len(&ctx.data.knowledge_log()), before);
    cmd_promote(&ctx, &write_hits(&dir), "memory habit", false).unwrap();
    cmd_verify(&ctx, None, None).unwrap();
}

// =============================================================================
// INSPECTION & EXPORT
// =============================================================================

#[test]
fn test_show_and_ids() {
    let dir = TempDir::new().unwrap();
    let ctx = populated(&dir);
    let ku = ctx.data.open_knowledge().unwrap().ids()[0].clone();
    let ru = ctx.data.open_reasoning().unwrap().ids()[0].clone();

    cmd_show(&ctx, ku.as_str()).unwrap();
    cmd_show(&ctx, ru.as_str()).unwrap();
    cmd_ids(&ctx, false).unwrap();
    cmd_ids(&ctx, true).unwrap();

    let err = cmd_show(&ctx, "ku_00000000000000000000000000000000").unwrap_err();
    assert!(matches!(err, CairnError::NotFound(_)));
    assert!(matches!(cmd_show(&ctx, "nope").unwrap_err(), CairnError::NotFound(_)));
}

#[test]
fn test_export_json_and_dot() {
    let dir = TempDir::new().unwrap();
    let ctx = populated(&dir);

    let json_path = dir.path().join("graph.json");
    cmd_export(&ctx, &json_path, ExportFormat::Json).unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    let kus = ctx.data.open_knowledge().unwrap().load_all().unwrap();
    let rus = ctx.data.open_reasoning().unwrap().load_all().unwrap();
    assert_eq!(
        value["header"]["digest"].as_str().unwrap(),
        canonical_digest(&kus, &rus).unwrap()
    );

    let dot_path = dir.path().join("graph.dot");
    cmd_export(&ctx, &dot_path, ExportFormat::Dot).unwrap();
    assert!(std::fs::read_to_string(&dot_path).unwrap().starts_with("graph"));
}

#[test]
fn test_export_rejects_missing_directory() {
    let dir = TempDir::new().unwrap();
    let ctx = populated(&dir);
    let target = dir.path().join("missing").join("graph.json");
    assert!(matches!(
        cmd_export(&ctx, &target, ExportFormat::Json).unwrap_err(),
        CairnError::IoError(_)
    ));
}

#[test]
fn test_reindex_and_hash() {
    let dir = TempDir::new().unwrap();
    let ctx = populated(&dir);
    std::fs::remove_file(ctx.data.knowledge_index()).unwrap();

    cmd_reindex(&ctx).unwrap();
    assert!(ctx.data.knowledge_index().is_file());
    cmd_hash(&ctx).unwrap();
    cmd_status(&ctx).unwrap();
}
