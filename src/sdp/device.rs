//! Finding the boot ROM on the USB bus.

use std::time::Duration;

use hidapi::{HidApi, HidDevice};
use log::{debug, info, warn};
use retry::{delay, retry_with_index};

use super::driver::HidLink;
use crate::error::SdpError;

/// Something able to look for a HID device by vendor id.
pub trait DeviceEnumerator {
    type Link: HidLink;

    /// Open the first device found with `vendor_id`, if any.
    fn open_first(&mut self, vendor_id: u16) -> Option<Self::Link>;
}

/// The system HID devices, through `hidapi`.
pub struct HidApiEnumerator {
    api: HidApi,
}
impl HidApiEnumerator {
    pub fn new() -> Result<Self, SdpError> {
        Ok(HidApiEnumerator { api: HidApi::new()? })
    }
}
impl DeviceEnumerator for HidApiEnumerator {
    type Link = HidDevice;

    fn open_first(&mut self, vendor_id: u16) -> Option<HidDevice> {
        if let Err(ref e) = self.api.refresh_devices() {
            warn!("HID enumeration failed: {}", e);
            return None;
        }
        for info in self
            .api
            .device_list()
            .filter(|info| info.vendor_id() == vendor_id)
        {
            debug!(
                "found {:04x}:{:04x} at {:?}",
                info.vendor_id(),
                info.product_id(),
                info.path()
            );
            match info.open_device(&self.api) {
                Ok(device) => return Some(device),
                Err(ref e) => warn!("could not open {:?}: {}", info.path(), e),
            }
        }
        None
    }
}

/// Look for the device, then retry `retries` more times, `period` apart.
pub fn wait_for_device<E: DeviceEnumerator>(
    enumerator: &mut E,
    vendor_id: u16,
    retries: usize,
    period: Duration,
) -> Result<E::Link, SdpError> {
    let result = retry_with_index(
        delay::Fixed::from_millis(period.as_millis() as u64).take(retries),
        |index| -> Result<E::Link, ()> {
            debug!("Looking for device 0x{:04x} ({})", vendor_id, index);
            enumerator.open_first(vendor_id).ok_or(())
        },
    );
    match result {
        Ok(link) => {
            info!("Device 0x{:04x} opened", vendor_id);
            Ok(link)
        }
        Err(err) => match err {
            retry::Error::Operation {
                total_delay, tries, ..
            } => {
                info!(
                    "No device 0x{:04x} after {:?} and {} tries",
                    vendor_id, total_delay, tries
                );
                Err(SdpError::DeviceTimeout { vendor_id, tries })
            }
            retry::Error::Internal(ref msg) => {
                warn!("Internal retry error while waiting for the device: {}", msg);
                Err(SdpError::DeviceTimeout {
                    vendor_id,
                    tries: 0,
                })
            }
        },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
