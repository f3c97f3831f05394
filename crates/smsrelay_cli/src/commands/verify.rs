//! Verify command implementation.

use smsrelay_core::{ChainReport, NotificationLog};
use std::path::Path;

/// Runs the verify command.
pub fn run(path: &Path, device: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying queues at {:?}", path);
    println!();

    let reports = check(path, device)?;
    for report in &reports {
        print_report(report);
    }

    println!();
    if reports.iter().all(ChainReport::is_ok) {
        println!("✓ {} queue(s) verified", reports.len());
        Ok(())
    } else {
        println!("✗ Queue verification failed");
        Err("Verification failed".into())
    }
}

fn check(path: &Path, device: Option<&str>) -> Result<Vec<ChainReport>, Box<dyn std::error::Error>> {
    let (_store, log) = super::open_log(path)?;
    let devices = match device {
        Some(device) => vec![device.to_string()],
        None => log.devices()?,
    };

    let mut reports = Vec::with_capacity(devices.len());
    for device in devices {
        reports.push(log.verify_chain(&device)?);
    }
    Ok(reports)
}

fn print_report(report: &ChainReport) {
    let mark = if report.is_ok() { "✓" } else { "✗" };
    println!(
        "{} {} ({}/{} reachable={})",
        mark,
        report.device_id,
        report.length,
        report.max_length,
        report.order.len()
    );
    for violation in &report.violations {
        println!("    {violation}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smsrelay_core::documents::NODES;
    use smsrelay_docstore::{DirDocumentStore, DocumentStore, StoreConfig, WriteBatch};
    use tempfile::tempdir;

    #[test]
    fn healthy_queues_pass() {
        let dir = tempdir().unwrap();
        super::super::testing::seed(dir.path(), "phone", 4, 2);
        super::super::testing::seed(dir.path(), "tablet", 1, 10);

        let reports = check(dir.path(), None).unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(ChainReport::is_ok));
        assert!(run(dir.path(), Some("phone")).is_ok());
    }

    #[test]
    fn missing_node_fails() {
        let dir = tempdir().unwrap();
        super::super::testing::seed(dir.path(), "phone", 3, 10);

        {
            let store = DirDocumentStore::open_dir(dir.path(), StoreConfig::default()).unwrap();
            let victim = store.list(NODES).unwrap().remove(0);
            let mut batch = WriteBatch::new();
            batch.delete(NODES, &victim.id);
            store.commit(batch).unwrap();
        }

        let reports = check(dir.path(), Some("phone")).unwrap();
        assert!(!reports[0].is_ok());
        assert!(run(dir.path(), None).is_err());
    }
}
