use colored::Colorize;

use crate::device::DeviceRecord;
use crate::reconciler::{ControlStatus, SyncReport};
use crate::registry::{DeviceStats, FirewallExport, ImportReport};

/// Render the device list for terminal output.
pub fn render_devices(devices: &[DeviceRecord]) -> String {
    if devices.is_empty() {
        return "no devices registered".dimmed().to_string();
    }

    let mut out = Vec::new();
    for device in devices {
        let state = if device.enabled {
            "enabled".green()
        } else {
            "disabled".red()
        };
        out.push(format!(
            "{:>4}  {}  {}  [{}]",
            device.id,
            device.mac.cyan(),
            device.name,
            state
        ));
    }
    out.join("\n")
}

/// Render one device in full.
pub fn render_device(device: &DeviceRecord) -> String {
    let mut out = vec![
        format!("id:       {}", device.id),
        format!("name:     {}", device.name),
        format!("mac:      {}", device.mac.cyan()),
        format!("entered:  {}", device.original_mac),
        format!("enabled:  {}", device.enabled),
        format!("added:    {}", device.added_date.format("%Y-%m-%d %H:%M:%S")),
    ];
    if let Some(updated) = device.updated_date {
        out.push(format!("updated:  {}", updated.format("%Y-%m-%d %H:%M:%S")));
    }
    out.join("\n")
}

/// Render the firewall alias snapshot.
pub fn render_export(export: &FirewallExport) -> String {
    let mut out = vec![
        format!("alias:       {}", export.alias_name.cyan()),
        format!("type:        {}", export.alias_type),
        format!("description: {}", export.description),
        "content:".to_string(),
    ];
    for mac in export.content.lines() {
        out.push(format!("  {mac}"));
    }
    out.join("\n")
}

/// Render device counts.
pub fn render_stats(stats: &DeviceStats) -> String {
    format!(
        "devices total={} enabled={} disabled={}",
        stats.total, stats.enabled, stats.disabled
    )
}

/// Render an import outcome: added count plus one line per rejected line.
pub fn render_import(report: &ImportReport) -> String {
    let mut out = vec![format!("imported {} device(s)", report.added)];
    for error in &report.errors {
        out.push(format!("{} {error}", "error:".red()));
    }
    out.join("\n")
}

/// Render enforcement status as checked on the appliance.
pub fn render_status(status: &ControlStatus) -> String {
    let flag = |on: bool| {
        if on {
            "yes".green().to_string()
        } else {
            "no".red().to_string()
        }
    };

    let mut out = vec![
        format!("alias_exists:    {}", flag(status.alias_exists)),
        format!("rule_exists:     {}", flag(status.rule_exists)),
        format!("rule_enabled:    {}", flag(status.rule_enabled)),
        format!("device_count:    {}", status.device_count),
    ];
    out.push(if status.controls_active {
        format!("controls_active: {}", "yes".green().bold())
    } else {
        format!("controls_active: {}", "no".red().bold())
    });
    out.push(format!(
        "last_checked:    {}",
        status.last_checked.format("%Y-%m-%d %H:%M:%S")
    ));
    out.join("\n")
}

/// Render the outcome of a reconciliation pass.
pub fn render_sync(report: &SyncReport, what: &str) -> String {
    let mut out = vec![format!("{} {what}", "ok:".green())];
    for warning in &report.warnings {
        out.push(format!("{} {warning}", "warning:".yellow()));
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use crate::device::DeviceRecord;

    use super::{render_devices, render_stats};
    use crate::registry::DeviceStats;

    #[test]
    fn empty_list_renders_placeholder() {
        colored::control::set_override(false);
        assert_eq!(render_devices(&[]), "no devices registered");
    }

    #[test]
    fn device_lines_carry_id_mac_and_name() {
        colored::control::set_override(false);
        let device = DeviceRecord::new(
            7,
            "Kids Tablet".to_string(),
            "AA:BB:CC:DD:EE:01".to_string(),
            "aabbccddee01".to_string(),
        );
        let text = render_devices(&[device]);
        assert!(text.contains("7"));
        assert!(text.contains("AA:BB:CC:DD:EE:01"));
        assert!(text.contains("Kids Tablet"));
        assert!(text.contains("[enabled]"));
    }

    #[test]
    fn stats_line_is_machine_scannable() {
        let stats = DeviceStats {
            total: 3,
            enabled: 2,
            disabled: 1,
        };
        assert_eq!(render_stats(&stats), "devices total=3 enabled=2 disabled=1");
    }
}
