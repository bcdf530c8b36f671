//! Serial download protocol driver.
//!
//! Every operation follows the same exchange with the boot ROM:
//!
//! 1. one command report,
//! 2. the payload, if any, split in data reports of at most 1024 bytes,
//! 3. the HAB mode report, which the ROM sends after every command,
//! 4. the completion status report, for the commands that have one.

use std::convert::TryFrom;

use hexplay::HexViewBuilder;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, log_enabled, trace, Level::Trace};

use super::command::{
    be_u32, SdpCommand, BUF_SIZE, REPORT_DATA, REPORT_HAB_MODE, REPORT_STATUS,
};
use crate::error::SdpError;

// =============================================================================
// Public Interface
// =============================================================================

/// The two HID primitives the protocol needs.
pub trait HidLink {
    /// Send one output report; `report[0]` is the report id. Returns the
    /// number of bytes written.
    fn write(&mut self, report: &[u8]) -> Result<usize, SdpError>;

    /// Read a feature report into `buf`. The caller sets the report id in
    /// `buf[0]`. Returns the number of bytes read, report id included.
    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize, SdpError>;
}

impl<L: HidLink + ?Sized> HidLink for Box<L> {
    fn write(&mut self, report: &[u8]) -> Result<usize, SdpError> {
        (**self).write(report)
    }

    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize, SdpError> {
        (**self).get_feature_report(buf)
    }
}

impl HidLink for hidapi::HidDevice {
    fn write(&mut self, report: &[u8]) -> Result<usize, SdpError> {
        Ok(hidapi::HidDevice::write(self, report)?)
    }

    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize, SdpError> {
        Ok(hidapi::HidDevice::get_feature_report(self, buf)?)
    }
}

/// Drives one boot ROM over a [`HidLink`].
pub struct SdpDriver<L: HidLink> {
    link: L,
    show_progress: bool,
}
impl<L: HidLink> SdpDriver<L> {
    pub fn new(link: L) -> Self {
        SdpDriver {
            link,
            show_progress: false,
        }
    }

    /// Draw a progress bar while pushing payloads.
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn into_inner(self) -> L {
        self.link
    }

    /// Load `data` at `address`. Returns the HAB mode reported by the device.
    pub fn write_file(&mut self, address: u32, data: &[u8]) -> Result<u32, SdpError> {
        let cmd = SdpCommand::write_file(address, payload_size(data)?);
        self.exchange(&cmd, data)
    }

    /// Load and execute a device configuration data (DCD) block at `address`.
    pub fn write_config_block(&mut self, address: u32, data: &[u8]) -> Result<u32, SdpError> {
        let cmd = SdpCommand::dcd_write(address, payload_size(data)?);
        self.exchange(&cmd, data)
    }

    /// Write one 32-bit register.
    pub fn write_register(&mut self, address: u32, value: u32) -> Result<u32, SdpError> {
        self.exchange(&SdpCommand::write_register(address, value), &[])
    }

    /// Hand control over to the image at `address`. Only the HAB mode is read
    /// back: a successful jump produces no completion status.
    pub fn jump(&mut self, address: u32) -> Result<u32, SdpError> {
        self.exchange(&SdpCommand::jump(address), &[])
    }

    /// Query the boot ROM status. Returns the HAB mode word.
    pub fn get_status(&mut self) -> Result<u32, SdpError> {
        self.exchange(&SdpCommand::status(), &[])
    }

    fn exchange(&mut self, cmd: &SdpCommand, payload: &[u8]) -> Result<u32, SdpError> {
        debug!(
            "=> {} address=0x{:08x} count={}",
            cmd.kind, cmd.address, cmd.count
        );
        self.send_command(cmd)?;
        if !payload.is_empty() {
            self.send_payload(payload)?;
        }
        let hab = self.read_hab_mode()?;
        if let Some(expected) = cmd.kind.completion() {
            self.read_status(expected)?;
        }
        Ok(hab)
    }

    fn send_command(&mut self, cmd: &SdpCommand) -> Result<(), SdpError> {
        let report = cmd.encode();
        if log_enabled!(Trace) {
            let view = HexViewBuilder::new(&report)
                .address_offset(0)
                .row_width(16)
                .finish();
            trace!("command report\n{}", view);
        }
        self.write_report(&report)
    }

    fn send_payload(&mut self, data: &[u8]) -> Result<(), SdpError> {
        let pb = if self.show_progress {
            let pb = ProgressBar::new(data.len() as u64);
            pb.set_style(ProgressStyle::default_bar()
                .template("[BL] ⏩ Pushing [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                .progress_chars("=>-"));
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut report = [0u8; BUF_SIZE];
        report[0] = REPORT_DATA;
        let mut written = 0usize;
        for chunk in data.chunks(BUF_SIZE - 1) {
            report[1..=chunk.len()].copy_from_slice(chunk);
            if let Err(e) = self.write_report(&report[..=chunk.len()]) {
                pb.abandon();
                return Err(e);
            }
            written += chunk.len();
            trace!("{} of {} bytes sent", written, data.len());
            pb.set_position(written as u64);
        }
        pb.finish_with_message("[BL] Payload sent");
        Ok(())
    }

    fn write_report(&mut self, report: &[u8]) -> Result<(), SdpError> {
        let n = self.link.write(report)?;
        if n < report.len() {
            error!("short write: {} of {} bytes", n, report.len());
            return Err(SdpError::Transfer(format!(
                "short write: {} of {} bytes",
                n,
                report.len()
            )));
        }
        Ok(())
    }

    fn read_word(&mut self, report_id: u8, what: &str) -> Result<u32, SdpError> {
        let mut buf = [0u8; 65];
        buf[0] = report_id;
        let n = self.link.get_feature_report(&mut buf)?;
        if n < 5 {
            error!("failed to receive {} (n={})", what, n);
            return Err(SdpError::Transfer(format!(
                "failed to receive {} (n={})",
                what, n
            )));
        }
        Ok(be_u32(&buf[1..5]))
    }

    fn read_hab_mode(&mut self) -> Result<u32, SdpError> {
        let hab = self.read_word(REPORT_HAB_MODE, "HAB mode")?;
        debug!("HAB mode 0x{:08x}", hab);
        Ok(hab)
    }

    fn read_status(&mut self, expected: u32) -> Result<u32, SdpError> {
        let status = self.read_word(REPORT_STATUS, "complete status")?;
        if status != expected {
            error!(
                "failed to receive complete status (status=0x{:08x})",
                status
            );
            return Err(SdpError::StatusMismatch {
                expected,
                actual: status,
            });
        }
        Ok(status)
    }
}

fn payload_size(data: &[u8]) -> Result<u32, SdpError> {
    u32::try_from(data.len()).map_err(|_| SdpError::PayloadTooLarge(data.len()))
}

// =============================================================================
// Unit Tests
// =============================================================================


#[cfg(test)]
mod tests {
    use super::testing::MockLink;
    use super::*;
    use crate::sdp::command::{CommandType, WRITE_COMPLETE, WRITE_FILE_COMPLETE};

    const HAB_OPEN: u32 = 0x5678_9abc;

    fn driver(words: &[u32]) -> SdpDriver<MockLink> {
        SdpDriver::new(MockLink::answering(words))
    }

    #[test]
    fn write_file_chunks_payload() {
        let data: Vec<u8> = (0..2500u32).map(|i| i as u8).collect();
        let mut sdp = driver(&[HAB_OPEN, WRITE_FILE_COMPLETE]);
        assert_eq!(sdp.write_file(0x8780_0000, &data).unwrap(), HAB_OPEN);

        let link = sdp.into_inner();
        assert_eq!(link.writes.len(), 4);
        let cmd = SdpCommand::decode(&link.writes[0]).unwrap();
        assert_eq!(cmd.kind, CommandType::WriteFile);
        assert_eq!(cmd.count, 2500);
        let sizes: Vec<usize> = link.writes[1..].iter().map(|w| w.len()).collect();
        assert_eq!(sizes, vec![1025, 1025, 453]);
        assert!(link.writes[1..].iter().all(|w| w[0] == REPORT_DATA));
        let sent: Vec<u8> = link.writes[1..]
            .iter()
            .flat_map(|w| w[1..].to_vec())
            .collect();
        assert_eq!(sent, data);
        assert_eq!(link.feature_requests, vec![REPORT_HAB_MODE, REPORT_STATUS]);
    }

    #[test]
    fn write_file_exact_multiple() {
        let data = vec![0xa5u8; 2048];
        let mut sdp = driver(&[HAB_OPEN, WRITE_FILE_COMPLETE]);
        sdp.write_file(0x1000, &data).unwrap();
        let link = sdp.into_inner();
        assert_eq!(link.writes.len(), 3);
        assert!(link.writes[1..].iter().all(|w| w.len() == BUF_SIZE));
    }

    #[test]
    fn write_file_status_mismatch() {
        let mut sdp = driver(&[HAB_OPEN, WRITE_COMPLETE]);
        match sdp.write_file(0x1000, &[1, 2, 3]) {
            Err(SdpError::StatusMismatch { expected, actual }) => {
                assert_eq!(expected, WRITE_FILE_COMPLETE);
                assert_eq!(actual, WRITE_COMPLETE);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn config_block_expects_write_complete() {
        let mut sdp = driver(&[HAB_OPEN, WRITE_COMPLETE]);
        sdp.write_config_block(0x0091_0000, &[0xd2, 0x00, 0x04, 0x40]).unwrap();
        let link = sdp.into_inner();
        let cmd = SdpCommand::decode(&link.writes[0]).unwrap();
        assert_eq!(cmd.kind, CommandType::DcdWrite);
        assert_eq!(cmd.count, 4);
        assert_eq!(link.writes[1], vec![REPORT_DATA, 0xd2, 0x00, 0x04, 0x40]);
    }

    #[test]
    fn jump_reads_hab_mode_only() {
        let mut sdp = driver(&[HAB_OPEN]);
        assert_eq!(sdp.jump(0x8780_0000).unwrap(), HAB_OPEN);
        let link = sdp.into_inner();
        assert_eq!(link.writes.len(), 1);
        assert_eq!(link.feature_requests, vec![REPORT_HAB_MODE]);
    }

    #[test]
    fn get_status_returns_hab_mode() {
        let mut sdp = driver(&[0x1234_5678]);
        assert_eq!(sdp.get_status().unwrap(), 0x1234_5678);
        let cmd = SdpCommand::decode(&sdp.link().writes[0]).unwrap();
        assert_eq!(cmd.kind, CommandType::GetStatus);
    }

    #[test]
    fn write_register_without_payload() {
        let mut sdp = driver(&[HAB_OPEN, WRITE_COMPLETE]);
        sdp.write_register(0x020c_4068, 0xffff_ffff).unwrap();
        let link = sdp.into_inner();
        assert_eq!(link.writes.len(), 1);
        assert_eq!(link.feature_requests.len(), 2);
    }

    #[test]
    fn short_hab_report_is_an_error() {
        let mut link = MockLink::default();
        link.features.push_back(Ok(vec![REPORT_HAB_MODE, 0, 0]));
        let mut sdp = SdpDriver::new(link);
        match sdp.jump(0) {
            Err(SdpError::Transfer(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn feature_read_error_propagates() {
        let mut link = MockLink::answering(&[HAB_OPEN]);
        link.features
            .push_back(Err(SdpError::Transfer("unplugged".into())));
        let mut sdp = SdpDriver::new(link);
        assert!(sdp.write_file(0, &[0; 16]).is_err());
    }

    #[test]
    fn short_write_stops_transfer() {
        let mut link = MockLink::answering(&[HAB_OPEN, WRITE_FILE_COMPLETE]);
        link.max_write = Some(10);
        let mut sdp = SdpDriver::new(link);
        match sdp.write_file(0, &[0; 16]) {
            Err(SdpError::Transfer(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
        // Nothing after the failed command report.
        assert_eq!(sdp.link().writes.len(), 1);
        assert!(sdp.link().feature_requests.is_empty());
    }

    #[test]
    fn boxed_link_drives_the_same() {
        let link: Box<dyn HidLink> = Box::new(MockLink::answering(&[HAB_OPEN]));
        let mut sdp = SdpDriver::new(link);
        assert_eq!(sdp.jump(0x10).unwrap(), HAB_OPEN);
    }
}
