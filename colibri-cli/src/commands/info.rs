//! Port listing, parameter table and version command implementations.

use {
    anyhow::Result,
    colibri::{INDICES, detect_ports, device::select_colibri, format_port_list},
    console::style,
    serde_json::json,
};

/// List ports command implementation.
pub(crate) fn cmd_list_ports(json: bool) -> Result<()> {
    let detected = detect_ports();

    if json {
        let ports: Vec<serde_json::Value> = detected
            .iter()
            .map(|p| {
                json!({
                    "name": p.name,
                    "device": p.device.name(),
                    "colibri": p.device.is_colibri(),
                    "vid": p.vid,
                    "pid": p.pid,
                    "manufacturer": p.manufacturer,
                    "product": p.product,
                    "serial": p.serial,
                })
            })
            .collect();
        let output = json!({
            "ok": true,
            "data": {
                "ports": ports,
            }
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    eprintln!("{}", style("Available serial ports:").bold().underlined());

    if detected.is_empty() {
        eprintln!("  {}", style("No serial ports found").dim());
        return Ok(());
    }

    for line in format_port_list(&detected) {
        eprintln!("  {} {line}", style("•").green());
    }

    if let Ok(port) = select_colibri(&detected) {
        eprintln!(
            "\n{} Colibri module: {}",
            style("→").green().bold(),
            style(&port.name).cyan().bold()
        );
    }

    Ok(())
}

/// Parameter table command implementation.
pub(crate) fn cmd_params(json: bool) -> Result<()> {
    if json {
        let output = json!({
            "ok": true,
            "data": {
                "indices": INDICES,
            }
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for index in INDICES {
        let access = if index.writable { "rw" } else { "ro" };
        println!("{:>4}  {access}  {}", index.id, index.description);
    }
    Ok(())
}

/// Version line of this tool and the library.
fn version_line() -> String {
    format!(
        "command-line interface:{} library:{}",
        env!("CARGO_PKG_VERSION"),
        colibri::VERSION
    )
}

/// Version command implementation.
pub(crate) fn cmd_version() {
    println!("{}", version_line());
}
