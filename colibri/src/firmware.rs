//! Firmware update over the line protocol.
//!
//! The image is an SREC text file. After `F` switches the module into its
//! boot loader, every record is sent verbatim as `S <record>` on one open
//! port. `R` then restarts the module, which needs a few seconds before it
//! answers again.
//!
//! ```text
//! Init --F--> Sending --S <line>...--> Resetting --R--> Done
//! ```
//!
//! The first rejected or unanswered frame aborts the update; later records
//! and the reset are not sent.

use crate::error::{Error, Result};
use crate::port::Port;
use crate::protocol::exchange::transact;
use crate::protocol::{Family, interpret};
use crate::session::SessionConfig;
use log::{debug, info};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Time the module needs to boot the new firmware after `R`.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Command entering the boot loader.
pub const CMD_ENTER_UPDATE: &str = "F";

/// Command restarting into the application.
pub const CMD_RESET: &str = "R";

/// Firmware image as a list of SREC records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirmwareImage {
    path: Option<PathBuf>,
    lines: Vec<String>,
}

impl FirmwareImage {
    /// Load an image file.
    ///
    /// A missing file yields [`Error::FileNotFound`]; any other read failure,
    /// including text that is not UTF-8, yields [`Error::FileRead`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
            _ => Error::FileRead {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        let mut image = Self::parse(&text);
        image.path = Some(path.to_path_buf());
        debug!("Loaded {} records from {}", image.len(), path.display());
        Ok(image)
    }

    /// Split image text into records.
    ///
    /// Line terminators are removed and blank lines skipped.
    pub fn parse(text: &str) -> Self {
        Self {
            path: None,
            lines: text
                .lines()
                .map(|l| l.trim_end_matches(['\r', '\n']))
                .filter(|l| !l.trim().is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }

    /// Source file, if loaded from disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Records in file order.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the image has no records.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Updater progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    /// Nothing sent yet.
    Init,
    /// Boot loader active; `sent` records accepted so far.
    Sending {
        /// Accepted records.
        sent: usize,
    },
    /// All records accepted, reset pending.
    Resetting,
    /// Reset acknowledged and settle delay elapsed.
    Done,
}

/// Drives one firmware upload over an already-open port.
pub struct FirmwareUpdater<'a, P: Port + ?Sized> {
    port: &'a mut P,
    config: &'a SessionConfig,
    settle_delay: Duration,
    state: UpdateState,
}

impl<'a, P: Port + ?Sized> FirmwareUpdater<'a, P> {
    /// Create an updater on `port`.
    pub fn new(port: &'a mut P, config: &'a SessionConfig) -> Self {
        Self {
            port,
            config,
            settle_delay: DEFAULT_SETTLE_DELAY,
            state: UpdateState::Init,
        }
    }

    /// Override the post-reset settle delay.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Current state.
    pub fn state(&self) -> UpdateState {
        self.state
    }

    /// Upload `image`.
    ///
    /// `progress` is called with `(sent, total)` after each accepted record.
    pub fn run(
        &mut self,
        image: &FirmwareImage,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<()> {
        let total = image.len();
        info!("Updating firmware on {} ({total} records)", self.port.name());

        self.acknowledged(CMD_ENTER_UPDATE)?;
        self.state = UpdateState::Sending { sent: 0 };

        for (i, line) in image.lines().iter().enumerate() {
            let command = format!("S {line}");
            self.acknowledged(&command)
                .inspect_err(|e| debug!("Record {} of {total} rejected: {e}", i + 1))?;
            self.state = UpdateState::Sending { sent: i + 1 };
            progress(i + 1, total);
        }

        self.state = UpdateState::Resetting;
        self.acknowledged(CMD_RESET)?;

        debug!("Waiting {:?} for the module to restart", self.settle_delay);
        thread::sleep(self.settle_delay);

        self.state = UpdateState::Done;
        info!("Firmware update complete");
        Ok(())
    }

    fn acknowledged(&mut self, command: &str) -> Result<()> {
        let response = transact(&mut *self.port, command, self.config)?;
        interpret(command, &response, Family::Ack)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::port::mock::MockPort;
    use std::io::Write;

    const IMAGE: &str = "S00600004844521B\r\nS1130000285F245F2212226A000424290008237C2A\n\nS1130010000000000000000000000000000000000C\nS5030003F9\nS9030000FC\n";

    fn config() -> SessionConfig {
        SessionConfig::new().with_response_timeout(Some(Duration::from_millis(50)))
    }

    #[test]
    fn test_parse_strips_terminators_and_blank_lines() {
        let image = FirmwareImage::parse(IMAGE);
        assert_eq!(image.len(), 5);
        assert_eq!(image.lines()[0], "S00600004844521B");
        assert!(image.lines().iter().all(|l| !l.ends_with('\r')));
        assert!(image.path().is_none());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(IMAGE.as_bytes()).unwrap();

        let image = FirmwareImage::from_file(file.path()).unwrap();
        assert_eq!(image.len(), 5);
        assert_eq!(image.path(), Some(file.path()));
    }

    #[test]
    fn test_missing_file() {
        let err = FirmwareImage::from_file("/nonexistent/colibri.srec").unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
        assert_eq!(err.code(), ErrorCode::FileNotFound);
    }

    #[test]
    fn test_unreadable_file_is_a_file_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"S0\xff\xfe\n").unwrap();

        let err = FirmwareImage::from_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::FileRead { ref path, .. } if path == file.path()));
        assert_eq!(err.code(), ErrorCode::FileNotFound);
        assert!(err.to_string().starts_with("Cannot read file"));
    }

    #[test]
    fn test_update_success() {
        let image = FirmwareImage::parse(IMAGE);
        let mut port = MockPort::new(&[":F\n", ":S\n", ":S\n", ":S\n", ":S\n", ":S\n", ":R\n"]);
        let config = config();
        let mut seen = Vec::new();

        let mut updater = FirmwareUpdater::new(&mut port, &config).with_settle_delay(Duration::ZERO);
        updater
            .run(&image, &mut |sent, total| seen.push((sent, total)))
            .unwrap();
        assert_eq!(updater.state(), UpdateState::Done);

        assert_eq!(seen, [(1, 5), (2, 5), (3, 5), (4, 5), (5, 5)]);
        let written = port.written_text();
        assert_eq!(written.len(), 7);
        assert_eq!(written[0], ":F\n");
        assert_eq!(written[1], ":S S00600004844521B\n");
        assert_eq!(written[6], ":R\n");
    }

    #[test]
    fn test_update_aborts_on_rejected_record() {
        let image = FirmwareImage::parse(IMAGE);
        let mut port = MockPort::new(&[":F\n", ":S\n", ":S\n", ":E 6\n", ":S\n", ":S\n", ":R\n"]);
        let config = config();

        let mut updater = FirmwareUpdater::new(&mut port, &config).with_settle_delay(Duration::ZERO);
        let err = updater.run(&image, &mut |_, _| {}).unwrap_err();
        assert!(matches!(err, Error::Device(ErrorCode::SrecInvalidCrc)));
        assert_eq!(updater.state(), UpdateState::Sending { sent: 2 });

        let written = port.written_text();
        assert_eq!(written.len(), 4, "F plus records 1..=3");
        assert!(written[3].starts_with(":S S1130010"));
        assert!(!written.iter().any(|w| w == ":R\n"));
    }

    #[test]
    fn test_update_aborts_on_silent_module() {
        let image = FirmwareImage::parse(IMAGE);
        let mut port = MockPort::new(&[":F\n", ":S\n"]);
        let config = config();

        let err = FirmwareUpdater::new(&mut port, &config)
            .run(&image, &mut |_, _| {})
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(port.written_text().len(), 3);
    }

    #[test]
    fn test_update_rejected_entry() {
        let image = FirmwareImage::parse(IMAGE);
        let mut port = MockPort::new(&[":E 1\n"]);
        let config = config();

        let mut updater = FirmwareUpdater::new(&mut port, &config);
        let err = updater.run(&image, &mut |_, _| {}).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownCommand);
        assert_eq!(updater.state(), UpdateState::Init);
        assert_eq!(port.written_text(), [":F\n"]);
    }

    #[test]
    fn test_reset_must_be_acknowledged() {
        let image = FirmwareImage::parse("S9030000FC\n");
        let mut port = MockPort::new(&[":F\n", ":S\n"]);
        let config = config();

        let mut updater = FirmwareUpdater::new(&mut port, &config).with_settle_delay(Duration::ZERO);
        assert!(updater.run(&image, &mut |_, _| {}).is_err());
        assert_eq!(updater.state(), UpdateState::Resetting);
    }
}
