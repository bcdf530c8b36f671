//! Running a flashing script against a boot ROM.

use std::{
    fs,
    path::{Path, PathBuf},
};

use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};

use crate::{
    error::{SdpError, SessionError},
    script::{parse_script, ScriptCommand, ScriptLine},
    sdp::{wait_for_device, DeviceEnumerator, SdpDriver},
    settings::FlashSettings,
};

/// Whoever answers `PROMPT` commands.
pub trait Operator {
    /// `true` to go on with the script.
    fn confirm(&mut self, prompt: &str) -> bool;
}

/// Asks on the terminal.
#[derive(Debug, Default)]
pub struct ConsoleOperator;
impl Operator for ConsoleOperator {
    fn confirm(&mut self, prompt: &str) -> bool {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(true)
            .interact()
            .unwrap_or(false)
    }
}

/// Load and parse a script file.
pub fn load_script(path: &Path) -> Result<Vec<ScriptLine>, SessionError> {
    let text = fs::read_to_string(path).map_err(|source| SessionError::Script {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_script(&text)?)
}

/// One flashing session: the settings, the way to find the device and, once
/// a `WAIT` succeeded, the driver talking to it.
pub struct FlashSession<E: DeviceEnumerator, O: Operator> {
    settings: FlashSettings,
    enumerator: E,
    operator: O,
    driver: Option<SdpDriver<E::Link>>,
}
impl<E: DeviceEnumerator, O: Operator> FlashSession<E, O> {
    pub fn new(settings: FlashSettings, enumerator: E, operator: O) -> Self {
        FlashSession {
            settings,
            enumerator,
            operator,
            driver: None,
        }
    }

    /// The driver of the device opened by the last `WAIT`.
    pub fn driver(&self) -> Option<&SdpDriver<E::Link>> {
        self.driver.as_ref()
    }

    /// Load the script named in the settings and run it.
    pub fn run(&mut self) -> Result<(), SessionError> {
        let script = load_script(&self.settings.script)?;
        self.run_script(&script)
    }

    /// Run commands in order, stopping at the first failure.
    pub fn run_script(&mut self, script: &[ScriptLine]) -> Result<(), SessionError> {
        for line in script {
            self.execute(line)?;
        }
        println!("{}", style("[BL] ✅ Script completed").green());
        Ok(())
    }

    pub fn execute(&mut self, line: &ScriptLine) -> Result<(), SessionError> {
        debug!("line {}: {:?}", line.line, line.command);
        match &line.command {
            ScriptCommand::Wait { vendor_id } => {
                let vendor_id = vendor_id.unwrap_or(self.settings.vendor_id);
                let link = self
                    .wait(vendor_id)
                    .map_err(|source| SessionError::Sdp {
                        line: line.line,
                        source,
                    })?;
                self.driver = Some(SdpDriver::new(link).show_progress(self.settings.show_progress));
            }
            ScriptCommand::WriteFile { path, address } => {
                let image = self.read_image(path)?;
                println!(
                    "[BL] Loading {} ({} bytes) at 0x{:08x}",
                    style(path.display()).cyan(),
                    image.len(),
                    address
                );
                let driver = self.device(line.line)?;
                let hab = driver
                    .write_file(*address, &image)
                    .map_err(|source| SessionError::Sdp {
                        line: line.line,
                        source,
                    })?;
                info!("write_file done, HAB mode 0x{:08x}", hab);
            }
            ScriptCommand::DcdWrite { path, address } => {
                let dcd = self.read_image(path)?;
                println!(
                    "[BL] Writing DCD {} ({} bytes) at 0x{:08x}",
                    style(path.display()).cyan(),
                    dcd.len(),
                    address
                );
                let driver = self.device(line.line)?;
                driver
                    .write_config_block(*address, &dcd)
                    .map_err(|source| SessionError::Sdp {
                        line: line.line,
                        source,
                    })?;
            }
            ScriptCommand::JumpAddress { address } => {
                println!("[BL] 🚀 Jumping to 0x{:08x}", address);
                let driver = self.device(line.line)?;
                let hab = driver.jump(*address).map_err(|source| SessionError::Sdp {
                    line: line.line,
                    source,
                })?;
                info!("jump done, HAB mode 0x{:08x}", hab);
            }
            ScriptCommand::Prompt(text) => {
                let prompt = text.as_deref().unwrap_or("Continue?");
                if !self.operator.confirm(prompt) {
                    return Err(SessionError::Aborted(line.line));
                }
            }
            ScriptCommand::Args(args) => {
                warn!("line {}: ARGS `{}` ignored", line.line, args);
            }
            ScriptCommand::Reboot => {
                warn!("line {}: REBOOT ignored", line.line);
            }
        }
        Ok(())
    }

    fn device(&mut self, line: usize) -> Result<&mut SdpDriver<E::Link>, SessionError> {
        self.driver.as_mut().ok_or(SessionError::NoDevice(line))
    }

    /// Image paths are relative to the script directory.
    fn image_path(&self, path: &Path) -> PathBuf {
        match self.settings.script.parent() {
            Some(dir) => dir.join(path),
            None => path.to_path_buf(),
        }
    }

    fn read_image(&self, path: &Path) -> Result<Vec<u8>, SessionError> {
        let full = self.image_path(path);
        fs::read(&full).map_err(|source| SessionError::Image {
            path: full.display().to_string(),
            source,
        })
    }

    fn wait(&mut self, vendor_id: u16) -> Result<E::Link, SdpError> {
        let pb = if self.settings.show_progress {
            let pb = ProgressBar::new_spinner();
            pb.enable_steady_tick(120);
            pb.set_style(
                ProgressStyle::default_spinner()
                    .tick_strings(&["⠋", "⠙", "⠚", "⠞", "⠖", "⠦", "⠴", "⠲", "⠳", "⠓"])
                    .template("[BL] {spinner:.blue} {msg}"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };
        pb.set_message(format!(
            "⏳ Waiting for USB device {}...",
            style(format!("{:04x}", vendor_id)).cyan()
        ));

        let result = wait_for_device(
            &mut self.enumerator,
            vendor_id,
            self.settings.wait_retries,
            self.settings.wait_period,
        );
        match &result {
            Ok(_) => pb.finish_with_message(format!(
                "👍 Device {} is ready",
                style(format!("{:04x}", vendor_id)).green()
            )),
            Err(_) => pb.finish_with_message("❌ No device"),
        }
        result
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
