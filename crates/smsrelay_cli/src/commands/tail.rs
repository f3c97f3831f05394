//! Tail command implementation.

use smsrelay_core::{Notification, NotificationLog};
use std::path::Path;

/// Runs the tail command.
pub fn run(path: &Path, device: &str, count: usize, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let newest = collect(path, device, count)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&newest)?);
        }
        _ => {
            if newest.is_empty() {
                println!("No notifications for {device}");
            }
            for notification in &newest {
                println!(
                    "[{}] {} {}: {}",
                    notification.timestamp, notification.id, notification.contact_info, notification.data
                );
            }
        }
    }
    Ok(())
}

/// Newest first.
fn collect(path: &Path, device: &str, count: usize) -> Result<Vec<Notification>, Box<dyn std::error::Error>> {
    let (_store, log) = super::open_log(path)?;
    Ok(log.backward_from(device, None, count)?)
}
