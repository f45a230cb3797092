//! Firmware update command.

use anyhow::{Context, Result};
use colibri::FirmwareImage;
use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::Path;

use super::device::connect;
use crate::config::Config;
use crate::{Cli, use_fancy_output};

fn progress_bar(quiet: bool, total: usize) -> ProgressBar {
    if quiet || !use_fancy_output() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
    #[allow(clippy::unwrap_used)]
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}

/// `fwupdate FILE`.
pub(crate) fn cmd_fwupdate(cli: &Cli, config: &Config, file: &Path) -> Result<()> {
    let image = FirmwareImage::from_file(file)?;
    if !cli.quiet {
        eprintln!(
            "{} Loaded {} records from {}",
            style("📦").cyan(),
            image.len(),
            file.display()
        );
    }

    let mut colibri = connect(cli, config);
    let pb = progress_bar(cli.quiet, image.len());
    pb.set_message("Sending records");

    let result = colibri.firmware_update(&image, &mut |sent, _total| {
        pb.set_position(sent as u64);
    });

    match result {
        Ok(()) => {
            pb.finish_with_message("Done");
        },
        Err(e) => {
            pb.abandon_with_message("Aborted");
            return Err(e).with_context(|| format!("Firmware update from {} failed", file.display()));
        },
    }

    if !cli.quiet {
        let port = colibri.config().port.as_deref().unwrap_or("?");
        eprintln!("{} Firmware updated on {port}", style("✓").green());
    }
    Ok(())
}
