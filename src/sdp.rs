//! i.MX serial download protocol (SDP) over USB HID.
//!
//! **Example** - Loading and starting an image:
//! ```no_run
//! use std::time::Duration;
//! use bootlink::sdp::{wait_for_device, HidApiEnumerator, SdpDriver};
//!
//! # fn main() -> Result<(), bootlink::error::SdpError> {
//! let mut devices = HidApiEnumerator::new()?;
//! let link = wait_for_device(&mut devices, 0x15a2, 10, Duration::from_secs(1))?;
//! let mut sdp = SdpDriver::new(link).show_progress(true);
//! let image = std::fs::read("u-boot.imx")?;
//! sdp.write_file(0x8780_0000, &image)?;
//! sdp.jump(0x8780_0000)?;
//! # Ok(())
//! # }
//! ```

mod command;
mod device;
mod driver;

pub use command::{
    CommandType, SdpCommand, BUF_SIZE, CMD_SIZE, FORMAT_32BIT, REPORT_COMMAND, REPORT_DATA,
    REPORT_HAB_MODE, REPORT_STATUS, WRITE_COMPLETE, WRITE_FILE_COMPLETE,
};
pub use device::{wait_for_device, DeviceEnumerator, HidApiEnumerator};
pub use driver::{HidLink, SdpDriver};

#[cfg(test)]
pub(crate) use driver::testing;
