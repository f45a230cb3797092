//! Command dispatcher.
//!
//! [`Colibri`] resolves the port, opens it, runs one exchange, closes it and
//! interprets the response. Every command pays for a fresh open; only the
//! firmware update keeps the port open across frames.
//!
//! ## Example
//!
//! ```rust,no_run
//! use colibri::{Colibri, SessionConfig};
//!
//! fn main() -> colibri::Result<()> {
//!     let mut colibri = Colibri::native(SessionConfig::new().with_checksum(true));
//!
//!     println!("firmware {}", colibri.get(0)?);
//!     let measurement = colibri.measure()?;
//!     for (wavelength, reading) in measurement.iter() {
//!         println!("{wavelength}: {} {}", reading.sample, reading.reference);
//!     }
//!     Ok(())
//! }
//! ```

use crate::error::Result;
use crate::firmware::{DEFAULT_SETTLE_DELAY, FirmwareImage, FirmwareUpdater};
use crate::port::Port;
use crate::protocol::exchange::transact;
use crate::protocol::{Family, Response, interpret};
use crate::records::{Levelling, Measurement, SelftestFlags};
use crate::session::SessionConfig;
use log::{debug, warn};
use std::time::Duration;

/// Port discovery and opening, injected into [`Colibri`].
pub trait Connector {
    /// Port type produced by [`Connector::open`].
    type Port: Port;

    /// Find the module and return its port name.
    fn discover(&mut self) -> Result<String>;

    /// Open the named port ready for the line protocol.
    fn open(&mut self, name: &str) -> Result<Self::Port>;
}

/// Connector backed by USB enumeration and the `serialport` crate.
#[cfg(feature = "native")]
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeConnector;

#[cfg(feature = "native")]
impl Connector for NativeConnector {
    type Port = crate::port::NativePort;

    fn discover(&mut self) -> Result<String> {
        crate::device::auto_detect_port().map(|p| p.name)
    }

    fn open(&mut self, name: &str) -> Result<Self::Port> {
        crate::port::NativePort::open(&crate::port::SerialConfig::new(name))
    }
}

/// Client for one Colibri module.
pub struct Colibri<C: Connector> {
    connector: C,
    config: SessionConfig,
    settle_delay: Duration,
}

#[cfg(feature = "native")]
impl Colibri<NativeConnector> {
    /// Client using the native serial backend.
    pub fn native(config: SessionConfig) -> Self {
        Self::new(NativeConnector, config)
    }
}

impl<C: Connector> Colibri<C> {
    /// Create a client.
    pub fn new(connector: C, config: SessionConfig) -> Self {
        Self {
            connector,
            config,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    /// Override the delay after the firmware update reset.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Session options.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The connector.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Configured port, or the result of discovery.
    pub fn resolve_port(&mut self) -> Result<String> {
        match &self.config.port {
            Some(port) => Ok(port.clone()),
            None => self.connector.discover(),
        }
    }

    /// Open the port, run `f`, close the port.
    ///
    /// The port is closed whether or not `f` succeeds; an error from `f`
    /// takes precedence over one from closing.
    fn with_port<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut C::Port, &SessionConfig) -> Result<T>,
    ) -> Result<T> {
        let mut port = self.connector.open(name)?;
        let result = f(&mut port, &self.config);
        let closed = port.close();
        match (result, closed) {
            (Err(e), Err(close_err)) => {
                warn!("Closing {name} failed: {close_err}");
                Err(e)
            },
            (result, Ok(())) => result,
            (Ok(_), Err(close_err)) => Err(close_err),
        }
    }

    /// Send a raw command and return the tokenized response.
    ///
    /// No interpretation is applied; device error frames are returned as
    /// ordinary responses.
    pub fn command(&mut self, command: &str) -> Result<Response> {
        let name = self.resolve_port()?;
        self.with_port(&name, |port, config| transact(port, command, config))
    }

    /// Send a command, interpret the response and decode it.
    fn execute<T>(
        &mut self,
        command: &str,
        family: Family,
        decode: impl FnOnce(&Response) -> Result<T>,
    ) -> Result<T> {
        let response = self.command(command)?;
        let response = interpret(command, &response, family)?;
        decode(response)
    }

    /// Read parameter `index` (`V i`).
    pub fn get(&mut self, index: u32) -> Result<String> {
        self.execute(&format!("V {index}"), Family::Get, |r| {
            Ok(r.arg(1).unwrap_or_default().to_owned())
        })
    }

    /// Write parameter `index` (`V i v`).
    pub fn set(&mut self, index: u32, value: &str) -> Result<()> {
        self.execute(&format!("V {index} {value}"), Family::Set, |_| Ok(()))
    }

    /// Trigger a measurement (`M`).
    pub fn measure(&mut self) -> Result<Measurement> {
        self.execute("M", Family::Measurement, Measurement::from_response)
    }

    /// Read the `n`-th last stored measurement (`M n`).
    pub fn last_measurement(&mut self, n: u32) -> Result<Measurement> {
        self.execute(&format!("M {n}"), Family::Measurement, Measurement::from_response)
    }

    /// Take a baseline with an empty holder (`G`).
    pub fn baseline(&mut self) -> Result<Measurement> {
        self.execute("G", Family::Measurement, Measurement::from_response)
    }

    /// Run levelling (`C`).
    pub fn levelling(&mut self) -> Result<Levelling> {
        self.execute("C", Family::Levelling, Levelling::from_response)
    }

    /// Read the result of the last levelling (`C 0`).
    pub fn last_levelling(&mut self) -> Result<Levelling> {
        self.execute("C 0", Family::Levelling, Levelling::from_response)
    }

    /// Run the selftest (`Y`).
    pub fn selftest(&mut self) -> Result<SelftestFlags> {
        self.execute("Y", Family::Selftest, SelftestFlags::from_response)
    }

    /// Upload a firmware image on one open port.
    ///
    /// A discovered port is remembered for the rest of the session.
    pub fn firmware_update(
        &mut self,
        image: &FirmwareImage,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<()> {
        if self.config.port.is_none() {
            let discovered = self.connector.discover()?;
            debug!("Using discovered port {discovered} for firmware update");
            self.config.port = Some(discovered);
        }
        let name = self.resolve_port()?;
        let settle_delay = self.settle_delay;
        self.with_port(&name, |port, config| {
            FirmwareUpdater::new(port, config)
                .with_settle_delay(settle_delay)
                .run(image, progress)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorCode};
    use crate::port::mock::{MockPort, MockState};
    use crate::records::{SetupResult, Wavelength};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Hands out scripted ports and records what happened to them.
    #[derive(Default)]
    struct ScriptedConnector {
        discovered: Option<String>,
        ports: VecDeque<MockPort>,
        opened: Vec<String>,
        states: Vec<Arc<Mutex<MockState>>>,
        discover_calls: usize,
    }

    impl ScriptedConnector {
        fn with_replies(replies: &[&[&str]]) -> Self {
            Self {
                discovered: Some("/dev/ttyACM0".to_string()),
                ports: replies.iter().map(|r| MockPort::new(r)).collect(),
                ..Default::default()
            }
        }
    }

    impl Connector for ScriptedConnector {
        type Port = MockPort;

        fn discover(&mut self) -> Result<String> {
            self.discover_calls += 1;
            self.discovered.clone().ok_or(Error::NotFound)
        }

        fn open(&mut self, name: &str) -> Result<MockPort> {
            self.opened.push(name.to_string());
            let port = self.ports.pop_front().unwrap_or_else(|| MockPort::new(&[]));
            self.states.push(Arc::clone(&port.state));
            Ok(port)
        }
    }

    fn session() -> SessionConfig {
        SessionConfig::new().with_response_timeout(Some(Duration::from_millis(50)))
    }

    fn client(replies: &[&[&str]]) -> Colibri<ScriptedConnector> {
        Colibri::new(ScriptedConnector::with_replies(replies), session())
            .with_settle_delay(Duration::ZERO)
    }

    fn written(colibri: &Colibri<ScriptedConnector>, port: usize) -> Vec<String> {
        colibri.connector().states[port]
            .lock()
            .unwrap()
            .written
            .iter()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect()
    }

    #[test]
    fn test_get_value() {
        let mut colibri = client(&[&[":V 1.0.2\n"]]);
        assert_eq!(colibri.get(0).unwrap(), "1.0.2");
        assert_eq!(written(&colibri, 0), [":V 0\n"]);
    }

    #[test]
    fn test_set_value_with_checksum() {
        let mut colibri = Colibri::new(
            ScriptedConnector::with_replies(&[&[";V@56259\n"]]),
            session().with_checksum(true),
        );
        colibri.set(80, "1000").unwrap();
        let sent = written(&colibri, 0);
        assert!(sent[0].starts_with(";V 80 1000@"));
    }

    #[test]
    fn test_set_blank_value_expects_bare_echo() {
        let mut colibri = client(&[&[":V\n"], &[":V\n"]]);
        colibri.set(1, "").unwrap();
        colibri.set(1, "  ").unwrap();
        assert_eq!(written(&colibri, 0), [":V 1 \n"]);
    }

    #[test]
    fn test_each_command_opens_and_closes() {
        let mut colibri = client(&[&[":V 1\n"], &[":V 2\n"]]);
        colibri.get(1).unwrap();
        colibri.get(1).unwrap();

        let connector = colibri.connector();
        assert_eq!(connector.opened.len(), 2);
        assert_eq!(connector.discover_calls, 2);
        assert!(connector.states.iter().all(|s| s.lock().unwrap().closed));
    }

    #[test]
    fn test_explicit_port_skips_discovery() {
        let mut colibri = Colibri::new(
            ScriptedConnector::with_replies(&[&[":V 1\n"]]),
            session().with_port("COM7"),
        );
        colibri.get(1).unwrap();
        assert_eq!(colibri.connector().discover_calls, 0);
        assert_eq!(colibri.connector().opened, ["COM7"]);
    }

    #[test]
    fn test_not_found() {
        let mut colibri = Colibri::new(ScriptedConnector::default(), session());
        let err = colibri.measure().unwrap_err();
        assert!(matches!(err, Error::NotFound));
        assert_eq!(err.code().code(), 202);
        assert!(colibri.connector().opened.is_empty());
    }

    #[test]
    fn test_port_closed_on_error() {
        let mut colibri = client(&[&[":M 1 2 3\n"], &[]]);
        assert!(matches!(colibri.measure(), Err(Error::Protocol(_))));
        assert!(matches!(colibri.baseline(), Err(Error::Timeout(_))));
        let connector = colibri.connector();
        assert!(connector.states.iter().all(|s| s.lock().unwrap().closed));
    }

    #[test]
    fn test_measure_and_last_measurement() {
        let mut colibri = client(&[&[":M 1 2 3 4 5 6 7 8\n"], &[":M 9 9 9 9 9 9 9 9\n"]]);
        let m = colibri.measure().unwrap();
        assert_eq!(m.reading(Wavelength::Nm260).reference, 4);

        let last = colibri.last_measurement(3).unwrap();
        assert_eq!(last.readings[3].sample, 9);
        assert_eq!(written(&colibri, 1), [":M 3\n"]);
    }

    #[test]
    fn test_measurement_one_token_short() {
        let mut colibri = client(&[&[":M 1 2 3 4 5 6 7\n"]]);
        let err = colibri.measure().unwrap_err();
        assert_eq!(err.code(), ErrorCode::ProtocolError);
    }

    #[test]
    fn test_baseline() {
        let mut colibri = client(&[&[":G 10 20 30 40 50 60 70 80\n"]]);
        assert_eq!(colibri.baseline().unwrap().readings[0].sample, 10);
        assert_eq!(written(&colibri, 0), [":G\n"]);
    }

    #[test]
    fn test_levelling_and_last_levelling() {
        let mut colibri = client(&[
            &[":C 0 1 1 1 0 2 2 2 0 3 3 3 0 4 4 4\n"],
            &[":C 0 1 1 1 0 2 2 2 3 3 3 3 0 4 4 4\n"],
        ]);
        assert!(colibri.levelling().unwrap().is_ok());
        let last = colibri.last_levelling().unwrap();
        assert_eq!(last.channel(Wavelength::Nm280).result, SetupResult::SampleTooHigh);
        assert_eq!(written(&colibri, 1), [":C 0\n"]);
    }

    #[test]
    fn test_device_error_passthrough() {
        let mut colibri = client(&[&[":E 8\n"]]);
        let err = colibri.levelling().unwrap_err();
        assert!(matches!(err, Error::Device(ErrorCode::LevellingFailed)));
    }

    #[test]
    fn test_unexpected_response() {
        let mut colibri = client(&[&[":X\n"]]);
        assert_eq!(colibri.selftest().unwrap_err().code(), ErrorCode::ResponseError);
    }

    #[test]
    fn test_selftest() {
        let mut colibri = client(&[&[":Y 8192\n"]]);
        assert_eq!(colibri.selftest().unwrap(), SelftestFlags::SAMPLE);
    }

    #[test]
    fn test_raw_command_returns_error_frames() {
        let mut colibri = client(&[&[":E 1\n"]]);
        let response = colibri.command("Q").unwrap();
        assert_eq!(response.argv(), ["E", "1"]);
    }

    #[test]
    fn test_firmware_update_uses_one_port_and_caches_discovery() {
        let mut colibri = client(&[&[":F\n", ":S\n", ":S\n", ":R\n"]]);
        let image = FirmwareImage::parse("S00600004844521B\nS9030000FC\n");
        let mut calls = 0;
        colibri
            .firmware_update(&image, &mut |_, _| calls += 1)
            .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(colibri.config().port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(colibri.connector().opened.len(), 1);
        assert_eq!(colibri.connector().discover_calls, 1);
        assert_eq!(written(&colibri, 0).len(), 4);
        assert!(colibri.connector().states[0].lock().unwrap().closed);
    }
}
