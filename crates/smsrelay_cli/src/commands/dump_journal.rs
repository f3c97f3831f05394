//! Dump-journal command implementation.

use serde::Serialize;
use smsrelay_docstore::{JournalRecord, RecordEntry, RecordOp};
use std::path::Path;

/// One dumped journal frame.
#[derive(Debug, Serialize)]
pub struct DumpedRecord {
    /// Frame offset.
    pub offset: u64,
    /// Decoded payload.
    pub record: JournalRecord,
}

impl From<RecordEntry> for DumpedRecord {
    fn from(entry: RecordEntry) -> Self {
        Self {
            offset: entry.offset,
            record: entry.record,
        }
    }
}

/// Runs the dump-journal command.
pub fn run(path: &Path, limit: Option<usize>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let records = collect(path, limit)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            for record in &records {
                println!("{}", describe(record));
            }
            println!();
            println!("{} record(s)", records.len());
        }
    }
    Ok(())
}

fn collect(path: &Path, limit: Option<usize>) -> Result<Vec<DumpedRecord>, Box<dyn std::error::Error>> {
    let store = super::open_store(path)?;
    let entries = store.records()?;
    let limit = limit.unwrap_or(entries.len());
    Ok(entries.into_iter().take(limit).map(DumpedRecord::from).collect())
}

fn describe(dumped: &DumpedRecord) -> String {
    match &dumped.record {
        JournalRecord::Commit { sequence, ops } => {
            let ops: Vec<String> = ops
                .iter()
                .map(|op| match op {
                    RecordOp::Put { collection, id, .. } => format!("put {collection}/{id}"),
                    RecordOp::Delete { collection, id } => format!("delete {collection}/{id}"),
                })
                .collect();
            format!("@{:<8} commit #{sequence}: {}", dumped.offset, ops.join(", "))
        }
        JournalRecord::Snapshot { sequence, documents } => format!(
            "@{:<8} snapshot #{sequence}: {} document(s)",
            dumped.offset,
            documents.len()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lists_commits_in_order() {
        let dir = tempdir().unwrap();
        super::super::testing::seed(dir.path(), "phone", 3, 10);

        let records = collect(dir.path(), None).unwrap();
        let sequences: Vec<u64> = records.iter().map(|r| r.record.sequence()).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert_eq!(records[0].offset, 0);

        let first = describe(&records[0]);
        assert!(first.contains("commit #1"));
        assert!(first.contains("put notifications/"));
        assert!(first.contains("put queues/"));

        assert_eq!(collect(dir.path(), Some(2)).unwrap().len(), 2);
    }
}
