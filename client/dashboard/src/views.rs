//! Plain-text rendering for the terminal front end.

use std::fmt::Write;

use crate::models::{Device, Metric, Paginated, User};
use crate::pager::{MetricsPager, PAGE_SIZES};

pub fn render_user(user: &User) -> String {
    match &user.email {
        Some(email) => format!("{} <{}> (id {})", user.username, email, user.id),
        None => format!("{} (id {})", user.username, user.id),
    }
}

pub fn render_device(device: &Device) -> String {
    let mut line = format!("#{}", device.id);
    if let Some(name) = &device.name {
        let _ = write!(line, "  {name}");
    }
    if let Some(key) = &device.device_key {
        let _ = write!(line, "  key={key}");
    }
    if let Some(status) = device.status {
        let _ = write!(line, "  status={status}");
    }
    if let Some(last_seen) = &device.last_seen {
        let _ = write!(line, "  last_seen={last_seen}");
    }
    line
}

pub fn render_devices(devices: &[Device]) -> String {
    if devices.is_empty() {
        return "No devices registered".to_string();
    }
    devices
        .iter()
        .map(render_device)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_metrics(device_id: i64, data: &Paginated<Metric>, pager: &MetricsPager) -> String {
    let mut out = format!("Device Data (ID: {device_id})\n");
    if data.items.is_empty() {
        out.push_str("No data available\n");
    } else {
        let _ = writeln!(out, "{:<28} {:>12}", "Timestamp", "Value");
        for metric in &data.items {
            let _ = writeln!(out, "{:<28} {:>12}", metric.timestamp, metric.value);
        }
    }

    let previous = if pager.has_previous() { "[p]rev" } else { " --- " };
    let next = if pager.has_next() { "[n]ext" } else { " --- " };
    let sizes = PAGE_SIZES
        .iter()
        .map(|size| {
            if *size == pager.per_page() {
                format!("*{size}")
            } else {
                size.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/");
    let _ = write!(
        out,
        "{previous}  Page {} of {}  {next}   per page: {sizes} ({} total)",
        pager.page(),
        pager.pages().max(1),
        data.total
    );
    out
}

pub fn render_error(message: &str) -> String {
    format!("Error: {message}")
}
