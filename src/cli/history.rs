// src/cli/history.rs — Print the iteration history log

use std::path::Path;

use crate::core::types::IterationRecord;
use crate::history::{HistoryLog, JsonlHistory};
use crate::infra::paths;
use crate::util::{one_line, truncate_str};

pub fn show_history(all: bool, limit: Option<usize>) -> anyhow::Result<()> {
    let path = paths::history_path();
    if !path.exists() {
        println!("No history yet ({}).", path.display());
        return Ok(());
    }

    let records = load_records(&path, all)?;
    if records.is_empty() {
        println!("No history yet.");
        return Ok(());
    }

    let skip = limit.map_or(0, |n| records.len().saturating_sub(n));
    if let Some(first) = records.first() {
        println!("prompt: {}", truncate_str(&first.prompt, 100));
    }
    for record in records.iter().skip(skip) {
        println!("{}", format_record(record));
    }
    Ok(())
}

/// Records from the log at `path`; significant ones only unless `all`.
/// A missing file reads as empty.
pub fn load_records(path: &Path, all: bool) -> anyhow::Result<Vec<IterationRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let log = JsonlHistory::open(path)?;
    Ok(if all {
        log.list_all()
    } else {
        log.list_significant()
    })
}

/// `#idx  kind        outcome  model  fps  similarity  reflection`
pub fn format_record(record: &IterationRecord) -> String {
    let outcome = match record.failure {
        Some(f) => f.to_string(),
        None => "passed".to_string(),
    };
    let metrics = &record.verdict.metrics;
    let mut line = format!(
        "#{:<3} {:<11} {:<18} {:<20} {:>6.1} fps  sim {:.3}",
        record.index,
        record.kind.to_string(),
        outcome,
        truncate_str(&record.model, 20),
        metrics.frames_per_second,
        metrics.similarity,
    );
    let reflection = one_line(&record.reflection, 60);
    if !reflection.is_empty() {
        line.push_str("  ");
        line.push_str(reflection);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{FailureKind, RecordKind};
    use crate::history::test_support::record;

    #[test]
    fn test_format_passed_record() {
        let mut r = record(0, RecordKind::Initial);
        r.model = "ft-shader".into();
        r.reflection = "Blue gradient.\nMore detail".into();
        let line = format_record(&r);
        assert!(line.starts_with("#0   initial"));
        assert!(line.contains("passed"));
        assert!(line.contains("ft-shader"));
        assert!(line.ends_with("Blue gradient."));
    }

    #[test]
    fn test_format_failed_record() {
        let mut r = record(3, RecordKind::AutoIterationFinal);
        r.failure = Some(FailureKind::CompileError);
        let line = format_record(&r);
        assert!(line.contains("auto-final"));
        assert!(line.contains("compile error"));
    }

    #[test]
    fn test_load_records_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let records = load_records(&dir.path().join("history.jsonl"), true).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_load_records_filters_intermediate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let log = JsonlHistory::open(&path).unwrap();
        log.append(record(0, RecordKind::Initial)).unwrap();
        log.append(record(1, RecordKind::AutoIterationIntermediate)).unwrap();
        log.append(record(2, RecordKind::AutoIterationFinal)).unwrap();

        assert_eq!(load_records(&path, true).unwrap().len(), 3);
        let significant: Vec<u32> = load_records(&path, false)
            .unwrap()
            .iter()
            .map(|r| r.index)
            .collect();
        assert_eq!(significant, vec![0, 2]);
    }
}
