//! Commands that talk to the module.
//!
//! Plain output mirrors the wire: space separated integers on stdout.
//! `--json` wraps the same values in an `{"ok": true, "data": ...}` envelope.

use anyhow::{Context, Result};
use colibri::{Colibri, Index, Levelling, Measurement, NativeConnector, SelftestFlags};
use console::style;
use log::{debug, warn};
use serde_json::{Value, json};

use crate::config::Config;
use crate::{Cli, CliError, session_config};

/// Number of measurements the module keeps.
pub(crate) const STORED_MEASUREMENTS: u32 = 10;

/// Open a session with flags, environment and config applied.
pub(crate) fn connect(cli: &Cli, config: &Config) -> Colibri<NativeConnector> {
    let session = session_config(cli, config);
    debug!(
        "Session: port {}, checksum {}, response timeout {:?}",
        session.port.as_deref().unwrap_or("auto"),
        session.use_checksum,
        session.response_timeout
    );
    let colibri = Colibri::native(session);
    match config.settle_delay() {
        Some(delay) => colibri.with_settle_delay(delay),
        None => colibri,
    }
}

/// Parse a decimal command line number.
pub(crate) fn parse_number(text: &str) -> Result<u32, CliError> {
    text.trim()
        .parse()
        .map_err(|_| CliError::InvalidNumber(text.to_string()))
}

/// Validate the `measure LAST` argument.
fn parse_stored_index(text: &str) -> Result<u32, CliError> {
    let n = parse_number(text)?;
    if n >= STORED_MEASUREMENTS {
        return Err(CliError::NumberOfMeasurements(format!(
            "{n} (the module stores up to {STORED_MEASUREMENTS}, the last one is 0)"
        )));
    }
    Ok(n)
}

fn print_json(data: Value) -> Result<()> {
    let output = json!({
        "ok": true,
        "data": data,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn measurement_json(measurement: &Measurement) -> Value {
    let readings: Vec<Value> = measurement
        .iter()
        .map(|(wavelength, reading)| {
            json!({
                "wavelength": wavelength.nanometres(),
                "sample": reading.sample,
                "reference": reading.reference,
            })
        })
        .collect();
    json!({ "readings": readings })
}

fn levelling_json(levelling: &Levelling) -> Value {
    let channels: Vec<Value> = colibri::Wavelength::ALL
        .iter()
        .map(|&wavelength| {
            let channel = levelling.channel(wavelength);
            json!({
                "wavelength": wavelength.nanometres(),
                "result": channel.result.code(),
                "result_description": channel.result.description(),
                "current": channel.current,
                "amplification_sample": channel.amplification_sample,
                "amplification_reference": channel.amplification_reference,
            })
        })
        .collect();
    json!({
        "ok": levelling.is_ok(),
        "channels": channels,
    })
}

fn selftest_json(flags: SelftestFlags) -> Value {
    json!({
        "flags": flags.bits(),
        "passed": flags.passed(),
        "failures": flags.failures(),
    })
}

fn print_measurement(measurement: &Measurement, json: bool) -> Result<()> {
    if json {
        print_json(measurement_json(measurement))
    } else {
        println!("{measurement}");
        Ok(())
    }
}

/// `get INDEX`.
pub(crate) fn cmd_get(cli: &Cli, config: &Config, index: &str) -> Result<()> {
    let index = parse_number(index)?;
    let value = connect(cli, config)
        .get(index)
        .with_context(|| format!("Failed to read index {index}"))?;
    println!("{value}");
    Ok(())
}

/// `set INDEX VALUE`.
pub(crate) fn cmd_set(cli: &Cli, config: &Config, index: &str, value: &str) -> Result<()> {
    let index = parse_number(index)?;
    match Index::lookup(index) {
        Some(entry) if !entry.writable => {
            warn!("Index {index} ({}) is read-only on the module", entry.description);
        },
        Some(_) => {},
        None => debug!("Index {index} is not a documented parameter"),
    }

    connect(cli, config)
        .set(index, value)
        .with_context(|| format!("Failed to write index {index}"))?;

    if !cli.quiet {
        eprintln!("{} Index {index} set to {value}", style("✓").green());
    }
    Ok(())
}

/// `measure [LAST]`.
pub(crate) fn cmd_measure(cli: &Cli, config: &Config, last: Option<&str>, json: bool) -> Result<()> {
    let mut colibri = connect(cli, config);
    let measurement = match last {
        Some(text) => {
            let n = parse_stored_index(text)?;
            colibri.last_measurement(n)?
        },
        None => colibri.measure()?,
    };
    print_measurement(&measurement, json)
}

/// `baseline`.
pub(crate) fn cmd_baseline(cli: &Cli, config: &Config, json: bool) -> Result<()> {
    let measurement = connect(cli, config).baseline()?;
    print_measurement(&measurement, json)
}

/// `levelling [0]`.
///
/// The record is printed even when levelling failed; the failure is then
/// reported as an error.
pub(crate) fn cmd_levelling(
    cli: &Cli,
    config: &Config,
    last: Option<&str>,
    json: bool,
) -> Result<()> {
    let mut colibri = connect(cli, config);
    let levelling = match last {
        Some(text) => {
            if parse_number(text)? != 0 {
                return Err(CliError::Usage(format!(
                    "levelling accepts only 0 to print the last result, got '{text}'"
                ))
                .into());
            }
            colibri.last_levelling()?
        },
        None => colibri.levelling()?,
    };

    if json {
        print_json(levelling_json(&levelling))?;
    } else {
        println!("{levelling}");
    }

    if !levelling.is_ok() {
        return Err(colibri::Error::LevellingFailed.into());
    }
    Ok(())
}

/// `selftest`.
pub(crate) fn cmd_selftest(cli: &Cli, config: &Config, json: bool) -> Result<()> {
    let flags = connect(cli, config).selftest()?;

    if json {
        return print_json(selftest_json(flags));
    }

    println!("{}", flags.bits());
    if cli.quiet {
        return Ok(());
    }
    if flags.passed() {
        eprintln!("{} Selftest passed", style("✓").green());
    } else {
        eprintln!("{} Selftest failed:", style("✗").red());
        for name in flags.failures() {
            eprintln!("  - {name}");
        }
        eprintln!(
            "  {}",
            style("Check that no cuvette blocks the optical path.").dim()
        );
    }
    Ok(())
}

/// `command COMMAND`.
///
/// The response is printed as received, error frames included.
pub(crate) fn cmd_command(cli: &Cli, config: &Config, command: &str) -> Result<()> {
    let response = connect(cli, config).command(command)?;
    println!("{response}");
    Ok(())
}
