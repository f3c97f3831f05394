//! Compact command implementation.

use smsrelay_docstore::CompactionReport;
use std::path::Path;

/// Runs the compact command.
pub fn run(path: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("Compacting journal at {:?}", path);
    if dry_run {
        println!("(dry run - no changes will be made)");
    }
    println!();

    let store = super::open_store(path)?;
    let stats = store.stats()?;
    let records = store.records()?.len();

    println!("Compaction Analysis:");
    println!("  Journal records: {}", records);
    println!("  Live documents:  {}", stats.documents);
    println!("  Size before:     {} bytes", stats.journal_bytes);

    if dry_run {
        return Ok(());
    }
    if records <= 1 {
        println!();
        println!("No compaction needed - journal is already a single record");
        return Ok(());
    }

    println!();
    println!("Performing compaction...");
    let report = store.compact()?;
    print_report(&report);
    println!("✓ Compaction complete");
    Ok(())
}

fn print_report(report: &CompactionReport) {
    let saved = report.bytes_before.saturating_sub(report.bytes_after);
    println!("  Size after:  {} bytes", report.bytes_after);
    println!(
        "  Space saved: {} bytes ({:.1}%)",
        saved,
        if report.bytes_before > 0 {
            (saved as f64 / report.bytes_before as f64) * 100.0
        } else {
            0.0
        }
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use smsrelay_core::NotificationLog;
    use tempfile::tempdir;

    #[test]
    fn compaction_keeps_notifications() {
        let dir = tempdir().unwrap();
        super::super::testing::seed(dir.path(), "phone", 6, 3);

        let before = {
            let (_store, log) = super::super::open_log(dir.path()).unwrap();
            log.forward_from("phone", None, 10).unwrap()
        };

        run(dir.path(), true).unwrap();
        assert_eq!(super::super::open_store(dir.path()).unwrap().records().unwrap().len(), 6);

        run(dir.path(), false).unwrap();
        let (store, log) = super::super::open_log(dir.path()).unwrap();
        assert_eq!(store.records().unwrap().len(), 1);
        assert_eq!(log.forward_from("phone", None, 10).unwrap(), before);
    }
}
