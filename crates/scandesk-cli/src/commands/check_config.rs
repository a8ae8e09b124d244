use std::path::Path;

use anyhow::Context;

use crate::console::OutputFormat;

pub fn execute(config_path: Option<&Path>, format: OutputFormat) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&config).context("failed to encode config")?;
            println!("{json}");
        }
        OutputFormat::Text => {
            println!("✓ configuration is valid");
            println!("  {:<24} {}", "assignment:", config.assignment.mode);
            println!("  {:<24} {}", "round-robin reset:", config.assignment.reset);
            println!(
                "  {:<24} {}s",
                "manual timeout:", config.assignment.manual_timeout_secs
            );
            if config.dedup.enabled {
                println!(
                    "  {:<24} global {}s, session {}s, cross-user {}",
                    "dedup:",
                    config.dedup.global_cooldown_secs,
                    config.dedup.session_cooldown_secs,
                    config.dedup.cross_user_check
                );
            } else {
                println!("  {:<24} disabled", "dedup:");
            }
            for (index, source) in config.scanners.sources.iter().enumerate() {
                println!(
                    "  {:<24} {} ({})",
                    format!("scanner {index}:"),
                    source.name,
                    source.device.display()
                );
            }
            match &config.rfid.device {
                Some(device) => println!("  {:<24} {}", "rfid reader:", device.display()),
                None => println!("  {:<24} none (tags from stdin with `run --stdin-tags`)", "rfid reader:"),
            }
            println!("  {:<24} {}", "database:", config.persistence.database_path);
        }
    }
    Ok(())
}
