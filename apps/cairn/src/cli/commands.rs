//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::{Context, ExportFormat};
use crate::config::DEFAULT_CONFIG_TOML;
use cairn_core::{
    CairnError, CorpusMetrics, GraphExport, KnowledgeId, Promoter, PromotionRun, ReasonId,
    ReasoningGraphBuilder, ReasoningRun, RecordLog, RetrievalHit, RunMetadata, canonical_digest,
    content_addresses, hash_file, referential_integrity, strict_order,
};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a hits file (256 MB).
const MAX_HITS_FILE_SIZE: u64 = 256 * 1024 * 1024;

/// Maximum size of an expected-id list (64 MB).
const MAX_ID_LIST_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), CairnError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| CairnError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(CairnError::InvalidHit(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path, requiring an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, CairnError> {
    let canonical = path.canonicalize().map_err(|e| {
        CairnError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(CairnError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path, requiring an existing parent directory.
fn validate_output_path(path: &Path) -> Result<PathBuf, CairnError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        CairnError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(CairnError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| CairnError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn read_checked(path: &Path, max_size: u64) -> Result<Vec<u8>, CairnError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, max_size)?;
    std::fs::read(&validated)
        .map_err(|e| CairnError::IoError(format!("Read {}: {}", validated.display(), e)))
}

fn print_json(value: &impl Serialize) -> Result<(), CairnError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CairnError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// INPUT PARSING
// =============================================================================

/// Parse retrieval hits from a JSON array or from JSON lines.
pub fn parse_hits(bytes: &[u8]) -> Result<Vec<RetrievalHit>, CairnError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| CairnError::InvalidHit(format!("hits file is not UTF-8: {}", e)))?;

    if text.trim_start().starts_with('[') {
        return serde_json::from_str(text)
            .map_err(|e| CairnError::InvalidHit(format!("hits array: {}", e)));
    }

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .map_err(|e| CairnError::InvalidHit(format!("hits line {}: {}", i + 1, e)))
        })
        .collect()
}

/// Read an id list: one id per line, blank lines ignored.
pub fn read_id_list(path: &Path) -> Result<Vec<String>, CairnError> {
    let bytes = read_checked(path, MAX_ID_LIST_FILE_SIZE)?;
    let text = String::from_utf8(bytes)
        .map_err(|e| CairnError::SerializationError(format!("{}: {}", path.display(), e)))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create the data directory, its empty logs and indexes, and a default config.
///
/// Safe to run twice: existing logs are opened, never truncated.
pub fn cmd_init(ctx: &Context, force: bool) -> Result<(), CairnError> {
    let data = &ctx.data;
    let already = data.is_initialized();
    data.create()?;

    let config_path = data.config_file();
    if force || !config_path.exists() {
        std::fs::write(&config_path, DEFAULT_CONFIG_TOML)
            .map_err(|e| CairnError::IoError(format!("{}: {}", config_path.display(), e)))?;
    }

    let knowledge = data.open_knowledge()?;
    let reasoning = data.open_reasoning()?;

    if ctx.json_mode {
        return print_json(&serde_json::json!({
            "data_dir": data.root().to_string_lossy(),
            "already_initialized": already,
            "knowledge_units": knowledge.len(),
            "reasoning_units": reasoning.len(),
        }));
    }

    if already {
        println!("Cairn data directory already initialized at {:?}", data.root());
    } else {
        println!("Initialized Cairn data directory at {:?}", data.root());
    }
    println!("Config: {:?}", config_path);
    Ok(())
}

// =============================================================================
// PROMOTE COMMAND
// =============================================================================

/// Promote a hits file into Knowledge Units.
pub fn cmd_promote(ctx: &Context, hits_path: &Path, query: &str, dry_run: bool) -> Result<(), CairnError> {
    ctx.data.require_initialized()?;
    tracing::info!("Promoting hits from {:?} for query {:?}", hits_path, query);

    let hits = parse_hits(&read_checked(hits_path, MAX_HITS_FILE_SIZE)?)?;
    let promoter = Promoter::new(&ctx.config.extraction, ctx.config.confidence);
    let mut store = ctx.data.open_knowledge()?;

    if dry_run {
        let (units, mut report) = promoter.prepare(&hits, query)?;
        for ku in &units {
            if store.contains(&ku.id) {
                report.already_present += 1;
            } else {
                report.promoted += 1;
            }
        }
        if ctx.json_mode {
            return print_json(&serde_json::json!({ "dry_run": true, "report": report, "units": units }));
        }
        println!("Dry run: {} hit(s)", report.hits_seen);
        println!("  Would promote:   {}", report.promoted);
        println!("  Already present: {}", report.already_present);
        println!("  Skipped:         {}", report.skipped());
        return Ok(());
    }

    let started_at = Utc::now();
    let report = promoter.promote(&mut store, &hits, query)?;
    let finished_at = Utc::now();

    tracing::info!(
        promoted = report.promoted,
        already_present = report.already_present,
        skipped = report.skipped(),
        "promotion finished"
    );

    RunMetadata::record_promotion(
        &ctx.data.run_meta(),
        PromotionRun {
            started_at,
            finished_at,
            report: report.clone(),
            knowledge_total: store.len(),
        },
    )?;

    if ctx.json_mode {
        return print_json(&serde_json::json!({
            "report": report,
            "knowledge_ids": report.knowledge_ids,
            "knowledge_total": store.len(),
        }));
    }

    println!("Promoted {} new Knowledge Unit(s)", report.promoted);
    println!("  Already present:     {}", report.already_present);
    println!("  Merged sources:      {}", report.merged_sources);
    println!("  Skipped (no claim):  {}", report.skipped_no_sentence);
    println!("  Skipped (oversized): {}", report.skipped_oversized);
    println!("  Skipped (no source): {}", report.skipped_unsourced);
    println!("Knowledge log now holds {} unit(s)", store.len());
    Ok(())
}

// =============================================================================
// REASON COMMAND
// =============================================================================

/// Build and append Reasoning Units over the whole Knowledge Unit log.
pub fn cmd_reason(
    ctx: &Context,
    top_k: Option<usize>,
    topic: Option<String>,
    dry_run: bool,
) -> Result<(), CairnError> {
    ctx.data.require_initialized()?;

    let mut config = ctx.config.reasoning.clone();
    if let Some(k) = top_k {
        config.top_k_per_unit = k;
    }
    if let Some(t) = topic {
        config.topic = t;
    }

    let knowledge = ctx.data.open_knowledge()?;
    let mut reasoning = ctx.data.open_reasoning()?;
    let units = knowledge.load_all()?;
    tracing::info!(
        "Reasoning over {} Knowledge Unit(s), top_k_per_unit={}, topic={:?}",
        units.len(),
        config.top_k_per_unit,
        config.topic
    );

    let started_at = Utc::now();
    let builder = ReasoningGraphBuilder::new(config.clone());
    let graph = builder.build(&units)?;

    if dry_run {
        let new = graph
            .units
            .iter()
            .filter(|ru| !reasoning.contains(&ru.reason_id))
            .count();
        if ctx.json_mode {
            return print_json(&serde_json::json!({
                "dry_run": true,
                "report": graph.report,
                "would_append": new,
            }));
        }
        println!("Dry run: {} edge(s) selected, {} new", graph.units.len(), new);
        println!("  Max anchor degree: {}", graph.report.max_anchor_degree);
        return Ok(());
    }

    let summary = reasoning.append_all(&graph.units, &knowledge)?;
    let finished_at = Utc::now();

    tracing::info!(
        appended = summary.appended,
        already_present = summary.already_present,
        max_anchor_degree = graph.report.max_anchor_degree,
        "reasoning finished"
    );

    let run = ReasoningRun {
        started_at,
        finished_at,
        topic: config.topic.clone(),
        top_k_per_unit: config.top_k_per_unit,
        report: graph.report.clone(),
        appended: 0,
        already_present: 0,
        reasoning_total: reasoning.len(),
    }
    .with_summary(summary);
    RunMetadata::record_reasoning(&ctx.data.run_meta(), run.clone())?;

    if ctx.json_mode {
        return print_json(&run);
    }

    println!("Appended {} new Reasoning Unit(s)", summary.appended);
    println!("  Already present:      {}", summary.already_present);
    println!("  Comparisons:          {}", graph.report.comparisons);
    println!("  Admitted pairs:       {}", graph.report.admitted);
    println!("  Collapsed duplicates: {}", graph.report.duplicates_collapsed);
    println!("  Max anchor degree:    {}", graph.report.max_anchor_degree);
    for (relation, count) in &graph.report.by_relation {
        println!("  {:<12} {}", relation.as_str(), count);
    }
    println!("Reasoning log now holds {} unit(s)", reasoning.len());
    Ok(())
}

// =============================================================================
// VERIFY COMMAND
// =============================================================================

#[derive(Debug, Serialize)]
struct VerifyReport {
    knowledge_units: usize,
    reasoning_units: usize,
    references_checked: usize,
    evidence_checked: usize,
    addresses_checked: usize,
    knowledge_order_checked_against: &'static str,
    reasoning_order_checked_against: &'static str,
}

/// Replay both logs and check order, references, evidence and content
/// addresses.
///
/// Any failure is an integrity error.
pub fn cmd_verify(
    ctx: &Context,
    expect_knowledge: Option<&Path>,
    expect_reasoning: Option<&Path>,
) -> Result<(), CairnError> {
    ctx.data.require_initialized()?;
    let knowledge = ctx.data.open_knowledge()?;
    let reasoning = ctx.data.open_reasoning()?;

    let knowledge_replay = knowledge.log().replay_logged()?;
    let reasoning_replay = reasoning.log().replay_logged()?;

    let replayed_ku: Vec<&str> = knowledge_replay.iter().map(|r| r.record.id.as_str()).collect();
    let replayed_ru: Vec<&str> = reasoning_replay
        .iter()
        .map(|r| r.record.reason_id.as_str())
        .collect();

    strict_order(&replayed_ku, &knowledge.log().ids())?;
    strict_order(&replayed_ru, &reasoning.log().ids())?;

    let mut report = VerifyReport {
        knowledge_units: replayed_ku.len(),
        reasoning_units: replayed_ru.len(),
        references_checked: 0,
        evidence_checked: 0,
        addresses_checked: 0,
        knowledge_order_checked_against: "index",
        reasoning_order_checked_against: "index",
    };
    if let Some(path) = expect_knowledge {
        strict_order(&replayed_ku, &read_id_list(path)?)?;
        report.knowledge_order_checked_against = "index and expected list";
    }
    if let Some(path) = expect_reasoning {
        strict_order(&replayed_ru, &read_id_list(path)?)?;
        report.reasoning_order_checked_against = "index and expected list";
    }

    let kus: Vec<_> = knowledge_replay.into_iter().map(|r| r.record).collect();
    let rus: Vec<_> = reasoning_replay.into_iter().map(|r| r.record).collect();

    let integrity = referential_integrity(&kus, &rus).into_result()?;
    report.references_checked = integrity.references_checked;
    report.evidence_checked = integrity.evidence_checked;
    report.addresses_checked = content_addresses(&kus, &rus)?;

    tracing::info!(
        knowledge_units = report.knowledge_units,
        reasoning_units = report.reasoning_units,
        "verification passed"
    );

    if ctx.json_mode {
        return print_json(&serde_json::json!({ "ok": true, "report": report }));
    }

    println!("Verification passed");
    println!("  Knowledge Units:    {} (order vs {})", report.knowledge_units, report.knowledge_order_checked_against);
    println!("  Reasoning Units:    {} (order vs {})", report.reasoning_units, report.reasoning_order_checked_against);
    println!("  References checked: {}", report.references_checked);
    println!("  Evidence checked:   {}", report.evidence_checked);
    println!("  Addresses checked:  {}", report.addresses_checked);
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show corpus metrics and the latest run metadata.
pub fn cmd_status(ctx: &Context) -> Result<(), CairnError> {
    ctx.data.require_initialized()?;
    let kus = ctx.data.open_knowledge()?.load_all()?;
    let rus = ctx.data.open_reasoning()?.load_all()?;
    let metrics = CorpusMetrics::compute(&kus, &rus);
    let meta = RunMetadata::load(&ctx.data.run_meta())?;

    if ctx.json_mode {
        return print_json(&serde_json::json!({
            "data_dir": ctx.data.root().to_string_lossy(),
            "config": ctx.config_path.to_string_lossy(),
            "metrics": metrics,
            "last_runs": meta,
        }));
    }

    println!("Cairn Status");
    println!("============");
    println!("Data dir: {:?}", ctx.data.root());
    println!("Config:   {:?}", ctx.config_path);
    println!();
    println!("Knowledge Units:  {}", metrics.knowledge_units);
    println!("  Documents:      {}", metrics.documents);
    println!("  Multi-source:   {}", metrics.multi_source_units);
    for (confidence, count) in &metrics.by_confidence {
        println!("  {:<14} {}", confidence.as_str(), count);
    }
    println!("Reasoning Units:  {}", metrics.reasoning_units);
    for (relation, count) in &metrics.by_relation {
        println!("  {:<14} {}", relation.as_str(), count);
    }
    println!("  Max degree:     {}", metrics.max_degree);
    println!("  Isolated units: {}", metrics.isolated_units);

    if let Some(run) = &meta.promotion {
        println!();
        println!("Last promotion:  {} ({} new)", run.finished_at.to_rfc3339(), run.report.promoted);
    }
    if let Some(run) = &meta.reasoning {
        println!("Last reasoning:  {} ({} new)", run.finished_at.to_rfc3339(), run.appended);
    }
    Ok(())
}

// =============================================================================
// SHOW / IDS COMMANDS
// =============================================================================

/// Print one record as JSON.
pub fn cmd_show(ctx: &Context, id: &str) -> Result<(), CairnError> {
    ctx.data.require_initialized()?;
    if id.starts_with(cairn_core::primitives::KNOWLEDGE_ID_PREFIX) {
        let ku = ctx
            .data
            .open_knowledge()?
            .get(&KnowledgeId::new(id))?
            .ok_or_else(|| CairnError::NotFound(id.to_string()))?;
        return print_json(&ku);
    }
    if id.starts_with(cairn_core::primitives::REASONING_ID_PREFIX) {
        let ru = ctx
            .data
            .open_reasoning()?
            .get(&ReasonId::new(id))?
            .ok_or_else(|| CairnError::NotFound(id.to_string()))?;
        return print_json(&ru);
    }
    Err(CairnError::NotFound(format!(
        "{} (ids start with ku_ or ru_)",
        id
    )))
}

/// List ids in log order.
pub fn cmd_ids(ctx: &Context, reasoning: bool) -> Result<(), CairnError> {
    ctx.data.require_initialized()?;
    let ids: Vec<String> = if reasoning {
        ctx.data.open_reasoning()?.log().ids()
    } else {
        ctx.data.open_knowledge()?.log().ids()
    };

    if ctx.json_mode {
        return print_json(&ids);
    }
    for id in ids {
        println!("{}", id);
    }
    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Export the graph.
pub fn cmd_export(ctx: &Context, output: &Path, format: ExportFormat) -> Result<(), CairnError> {
    ctx.data.require_initialized()?;
    let validated_output = validate_output_path(output)?;

    let kus = ctx.data.open_knowledge()?.load_all()?;
    let rus = ctx.data.open_reasoning()?.load_all()?;
    let export = GraphExport::from_logs(&kus, &rus)?;

    let data = match format {
        ExportFormat::Json => export.to_json()?,
        ExportFormat::Dot => export.to_dot(),
    };
    std::fs::write(&validated_output, data.as_bytes())
        .map_err(|e| CairnError::IoError(format!("Write file: {}", e)))?;

    if ctx.json_mode {
        return print_json(&serde_json::json!({
            "output": validated_output.to_string_lossy(),
            "bytes": data.len(),
            "header": export.header,
        }));
    }
    println!("Digest: {}", export.header.digest);
    println!("Exported {} bytes to {:?}", data.len(), validated_output);
    Ok(())
}

// =============================================================================
// REINDEX / HASH COMMANDS
// =============================================================================

/// Rebuild both offset indexes from the logs.
pub fn cmd_reindex(ctx: &Context) -> Result<(), CairnError> {
    ctx.data.require_initialized()?;
    let knowledge = ctx.data.open_knowledge()?.rebuild_index()?;
    let reasoning = ctx.data.open_reasoning()?.rebuild_index()?;
    tracing::info!(knowledge, reasoning, "indexes rebuilt");

    if ctx.json_mode {
        return print_json(&serde_json::json!({
            "knowledge_units": knowledge,
            "reasoning_units": reasoning,
        }));
    }
    println!("Rebuilt indexes: {} Knowledge Unit(s), {} Reasoning Unit(s)", knowledge, reasoning);
    Ok(())
}

/// Hash each log file and the canonical graph.
pub fn cmd_hash(ctx: &Context) -> Result<(), CairnError> {
    ctx.data.require_initialized()?;
    let knowledge_log = hash_file(&ctx.data.knowledge_log())?;
    let reasoning_log = hash_file(&ctx.data.reasoning_log())?;
    let kus = ctx.data.open_knowledge()?.load_all()?;
    let rus = ctx.data.open_reasoning()?.load_all()?;
    let graph = canonical_digest(&kus, &rus)?;

    if ctx.json_mode {
        return print_json(&serde_json::json!({
            "algorithm": "BLAKE3",
            "knowledge_log": knowledge_log,
            "reasoning_log": reasoning_log,
            "graph": graph,
        }));
    }
    println!("BLAKE3 hashes");
    println!("  knowledge.jsonl: {}", knowledge_log.as_deref().unwrap_or("-"));
    println!("  reasoning.jsonl: {}", reasoning_log.as_deref().unwrap_or("-"));
    println!("  graph:           {}", graph);
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
