//! Settings for the message dispatcher and the flashing utility.
//!
//! Use the [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
//! pattern to set the configurable values.

use std::path::PathBuf;
use std::time::Duration;

pub use serialport::{DataBits, FlowControl, Parity, StopBits};

pub use crate::transport::TransportMode;

// =============================================================================
// Public Interface
// =============================================================================

/// Groups all settings related to the message dispatcher and acts as a
/// [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
/// for the settings.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Settings {
    /// The target address: a serial device path, a local address to bind the
    /// UDP socket to, or the base path of the `.in`/`.out` pipe pair.
    pub address: String,
    /// How the target is reached.
    pub mode: TransportMode,
    /// The baud rate for serial mode, the UDP port for UDP mode. Ignored in
    /// pipe mode.
    pub speed_or_port: u32,
    /// Number of bits used to represent a character sent on the line.
    pub data_bits: DataBits,
    /// The type of signalling to use for controlling data transfer.
    pub flow_control: FlowControl,
    /// The type of parity to use for error checking.
    pub parity: Parity,
    /// Number of bits to use to signal the end of a character.
    pub stop_bits: StopBits,
    /// How long a serial read blocks before giving the channel a chance to
    /// read again.
    pub read_timeout: Duration,

    /// Root of the directory served to the target.
    pub sysdir: PathBuf,

    /// Pipe reconnect budget. The counter is decremented on every receive
    /// failure in pipe mode and never reset.
    pub retries: u32,
    /// Pause before each pipe reconnect attempt.
    pub backoff: Duration,

    /// Restrict creation of `Settings` instances unless through the
    /// `SettingsBuilder`.
    #[doc(hidden)]
    _private_use_builder: (),
}

/// The builder for the `Settings` values.
///
/// All values except the address are optional and have default values that
/// will be used if not explicitly set.
///
/// **Example**
///
/// ```
/// use bootlink::{SettingsBuilder, TransportMode};
///
/// let settings = SettingsBuilder::new("/tmp/qemu")
///     .mode(TransportMode::Pipe)
///     .sysdir("../sys")
///     .finalize();
/// assert_eq!(settings.retries, 128);
/// ```
#[derive(Debug)]
pub struct SettingsBuilder {
    settings: Settings,
}
impl SettingsBuilder {
    /// Start building the settings for the given target address using default
    /// values.
    pub fn new<'a>(address: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        SettingsBuilder {
            settings: Settings {
                address: address.into().into_owned(),
                mode: TransportMode::Serial,
                speed_or_port: 460_800,
                data_bits: DataBits::Eight,
                flow_control: FlowControl::None,
                parity: Parity::None,
                stop_bits: StopBits::One,
                read_timeout: Duration::from_secs(1),
                sysdir: PathBuf::from("../sys"),
                retries: 128,
                backoff: Duration::from_millis(10),
                _private_use_builder: (),
            },
        }
    }

    /// Set the transport mode
    pub fn mode(mut self, mode: TransportMode) -> Self {
        self.settings.mode = mode;
        self
    }

    /// Set the baud rate (serial) or port (UDP)
    pub fn speed_or_port(mut self, speed_or_port: u32) -> Self {
        self.settings.speed_or_port = speed_or_port;
        self
    }

    /// Set the number of bits used to represent a character sent on the line
    pub fn data_bits(mut self, data_bits: DataBits) -> Self {
        self.settings.data_bits = data_bits;
        self
    }

    /// Set the type of signalling to use for controlling data transfer
    pub fn flow_control(mut self, flow_control: FlowControl) -> Self {
        self.settings.flow_control = flow_control;
        self
    }

    /// Set the type of parity to use for error checking
    pub fn parity(mut self, parity: Parity) -> Self {
        self.settings.parity = parity;
        self
    }

    /// Set the number of bits to use to signal the end of a character
    pub fn stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.settings.stop_bits = stop_bits;
        self
    }

    /// Set the serial read timeout
    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.settings.read_timeout = read_timeout;
        self
    }

    /// Set the served directory root
    pub fn sysdir(mut self, sysdir: impl Into<PathBuf>) -> Self {
        self.settings.sysdir = sysdir.into();
        self
    }

    /// Set the pipe reconnect budget
    pub fn retries(mut self, retries: u32) -> Self {
        self.settings.retries = retries;
        self
    }

    /// Set the pause before each pipe reconnect attempt
    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.settings.backoff = backoff;
        self
    }

    pub fn finalize(self) -> Settings {
        self.settings
    }
}

/// Settings of the flashing utility.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FlashSettings {
    /// Path to the flashing script.
    pub script: PathBuf,
    /// USB vendor id of the boot ROM device. The product id is wildcarded.
    pub vendor_id: u16,
    /// How many times device enumeration is retried after the first attempt.
    pub wait_retries: usize,
    /// Pause between two enumeration attempts.
    pub wait_period: Duration,
    /// Draw progress bars and spinners on the terminal.
    pub show_progress: bool,

    #[doc(hidden)]
    _private_use_builder: (),
}

/// The builder for the `FlashSettings` values.
#[derive(Debug)]
pub struct FlashSettingsBuilder {
    settings: FlashSettings,
}
impl FlashSettingsBuilder {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        FlashSettingsBuilder {
            settings: FlashSettings {
                script: script.into(),
                vendor_id: 0x15a2,
                wait_retries: 10,
                wait_period: Duration::from_secs(1),
                show_progress: true,
                _private_use_builder: (),
            },
        }
    }

    /// Set the USB vendor id to look for
    pub fn vendor_id(mut self, vendor_id: u16) -> Self {
        self.settings.vendor_id = vendor_id;
        self
    }

    /// Set the number of enumeration retries
    pub fn wait_retries(mut self, wait_retries: usize) -> Self {
        self.settings.wait_retries = wait_retries;
        self
    }

    /// Set the pause between enumeration attempts
    pub fn wait_period(mut self, wait_period: Duration) -> Self {
        self.settings.wait_period = wait_period;
        self
    }

    /// Enable or disable progress reporting
    pub fn show_progress(mut self, show_progress: bool) -> Self {
        self.settings.show_progress = show_progress;
        self
    }

    pub fn finalize(self) -> FlashSettings {
        self.settings
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn all_default() {
    let settings = SettingsBuilder::new("/dev/ttyUSB0").finalize();
    assert_eq!(
        settings,
        Settings {
            address: "/dev/ttyUSB0".into(),
            mode: TransportMode::Serial,
            speed_or_port: 460_800,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
            read_timeout: Duration::from_secs(1),
            sysdir: PathBuf::from("../sys"),
            retries: 128,
            backoff: Duration::from_millis(10),
            _private_use_builder: (),
        }
    )
}

#[test]
fn mode_and_port() {
    let settings = SettingsBuilder::new("0.0.0.0")
        .mode(TransportMode::Udp)
        .speed_or_port(11_000)
        .finalize();
    assert_eq!(settings.mode, TransportMode::Udp);
    assert_eq!(settings.speed_or_port, 11_000);
}

#[test]
fn sysdir() {
    let settings = SettingsBuilder::new("/tmp/qemu").sysdir("/srv/sys").finalize();
    assert_eq!(settings.sysdir, PathBuf::from("/srv/sys"));
}

#[test]
fn retries_and_backoff() {
    let settings = SettingsBuilder::new("/tmp/qemu")
        .retries(3)
        .backoff(Duration::from_millis(1))
        .finalize();
    assert_eq!(settings.retries, 3);
    assert_eq!(settings.backoff, Duration::from_millis(1));
}

#[test]
fn parity() {
    let parity = Parity::Even;
    let settings = SettingsBuilder::new("/dev/ttyUSB0").parity(parity).finalize();
    assert_eq!(settings.parity, parity);
}

#[test]
fn flash_defaults() {
    let settings = FlashSettingsBuilder::new("flash.sdp").finalize();
    assert_eq!(settings.script, PathBuf::from("flash.sdp"));
    assert_eq!(settings.vendor_id, 0x15a2);
    assert_eq!(settings.wait_retries, 10);
    assert_eq!(settings.wait_period, Duration::from_secs(1));
    assert!(settings.show_progress);
}

#[test]
fn flash_overrides() {
    let settings = FlashSettingsBuilder::new("flash.sdp")
        .vendor_id(0x1fc9)
        .wait_retries(2)
        .wait_period(Duration::from_millis(5))
        .show_progress(false)
        .finalize();
    assert_eq!(settings.vendor_id, 0x1fc9);
    assert_eq!(settings.wait_retries, 2);
    assert_eq!(settings.wait_period, Duration::from_millis(5));
    assert!(!settings.show_progress);
}
