//! Inspect command implementation.

use serde::Serialize;
use smsrelay_core::documents::all_queues;
use std::collections::BTreeMap;
use std::path::Path;

/// Data directory inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Data directory path.
    pub path: String,
    /// Journal size in bytes.
    pub journal_bytes: u64,
    /// Sequence number of the last commit.
    pub sequence: u64,
    /// Live documents.
    pub documents: usize,
    /// Live documents per collection.
    pub collections: BTreeMap<String, usize>,
    /// One entry per device queue.
    pub devices: Vec<DeviceSummary>,
}

/// Queue state of one device.
#[derive(Debug, Serialize)]
pub struct DeviceSummary {
    /// Device id.
    pub device_id: String,
    /// Current length.
    pub length: u64,
    /// Retention limit.
    pub max_length: u64,
    /// Newest notification id.
    pub first: Option<String>,
    /// Oldest notification id.
    pub last: Option<String>,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = collect(path)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn collect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let store = super::open_store(path)?;
    let stats = store.stats()?;

    let devices = all_queues(&*store)?
        .into_iter()
        .map(|queue| {
            let info = queue.info();
            DeviceSummary {
                device_id: info.device_id,
                length: info.length,
                max_length: info.max_length,
                first: info.first_id.map(|id| id.to_string()),
                last: info.last_id.map(|id| id.to_string()),
            }
        })
        .collect();

    Ok(InspectResult {
        path: path.display().to_string(),
        journal_bytes: stats.journal_bytes,
        sequence: stats.sequence,
        documents: stats.documents,
        collections: stats.collections,
        devices,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("smsrelay Data Inspection");
    println!("========================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Journal:");
    println!("  Size:     {}", format_size(result.journal_bytes));
    println!("  Sequence: {}", result.sequence);
    println!();
    println!("Documents: {}", result.documents);
    for (name, count) in &result.collections {
        println!("  {name}: {count}");
    }

    println!();
    println!("Devices: {}", result.devices.len());
    for device in &result.devices {
        println!(
            "  {} {}/{} first={} last={}",
            device.device_id,
            device.length,
            device.max_length,
            device.first.as_deref().unwrap_or("-"),
            device.last.as_deref().unwrap_or("-"),
        );
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn summarizes_queues() {
        let dir = tempdir().unwrap();
        super::super::testing::seed(dir.path(), "phone", 5, 3);

        let result = collect(dir.path()).unwrap();
        assert_eq!(result.sequence, 5);
        assert_eq!(result.devices.len(), 1);
        let phone = &result.devices[0];
        assert_eq!(phone.device_id, "phone");
        assert_eq!(phone.length, 3);
        assert_eq!(phone.max_length, 3);
        assert!(phone.first.is_some());
        assert_eq!(result.collections.get("notifications"), Some(&3));
        assert_eq!(result.collections.get("queues"), Some(&1));
    }

    #[test]
    fn sizes() {
        assert_eq!(format_size(10), "10 bytes");
        assert_eq!(format_size(2048), "2.0 KB");
    }
}
