use std::{collections::VecDeque, fs, time::Duration};

use bootlink::{
    error::{ScriptError, SdpError, SessionError},
    script::parse_script,
    sdp::{
        wait_for_device, DeviceEnumerator, HidLink, SdpCommand, SdpDriver, BUF_SIZE,
        REPORT_HAB_MODE, REPORT_STATUS, WRITE_FILE_COMPLETE,
    },
    FlashSession, FlashSettingsBuilder, Operator,
};

/// A boot ROM answering every status request with the next scripted word.
#[derive(Default)]
struct Rom {
    reports: Vec<Vec<u8>>,
    words: VecDeque<u32>,
    requested: Vec<u8>,
}
impl HidLink for Rom {
    fn write(&mut self, report: &[u8]) -> Result<usize, SdpError> {
        self.reports.push(report.to_vec());
        Ok(report.len())
    }

    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize, SdpError> {
        self.requested.push(buf[0]);
        match self.words.pop_front() {
            Some(word) => {
                buf[1..5].copy_from_slice(&word.to_be_bytes());
                Ok(5)
            }
            None => Ok(1),
        }
    }
}

fn rom(words: &[u32]) -> Rom {
    Rom {
        words: words.iter().copied().collect(),
        ..Rom::default()
    }
}

#[test]
fn image_is_sent_in_full_reports() {
    let image: Vec<u8> = (0..5000u32).map(|i| (i * 7) as u8).collect();
    let mut sdp = SdpDriver::new(rom(&[0x1234_5678, WRITE_FILE_COMPLETE]));
    assert_eq!(sdp.write_file(0x8000_0000, &image).unwrap(), 0x1234_5678);

    let rom = sdp.into_inner();
    // ceil(5000 / 1024) data reports after the command.
    assert_eq!(rom.reports.len(), 1 + 5);
    let command = SdpCommand::decode(&rom.reports[0]).unwrap();
    assert_eq!(command.address, 0x8000_0000);
    assert_eq!(command.count, 5000);
    assert!(rom.reports[1..5].iter().all(|r| r.len() == BUF_SIZE));
    assert_eq!(rom.reports[5].len(), 1 + 5000 - 4 * 1024);
    let received: Vec<u8> = rom.reports[1..]
        .iter()
        .flat_map(|r| r[1..].to_vec())
        .collect();
    assert_eq!(received, image);
    assert_eq!(rom.requested, vec![REPORT_HAB_MODE, REPORT_STATUS]);
}

#[test]
fn wrong_completion_word_fails_the_write() {
    let mut sdp = SdpDriver::new(rom(&[0, 0xdead_beef]));
    assert!(matches!(
        sdp.write_file(0, &[1; 10]),
        Err(SdpError::StatusMismatch {
            expected: WRITE_FILE_COMPLETE,
            actual: 0xdead_beef
        })
    ));
}

#[test]
fn missing_status_report_fails() {
    let mut sdp = SdpDriver::new(rom(&[]));
    assert!(matches!(sdp.get_status(), Err(SdpError::Transfer(_))));
}

struct Bus {
    rom_after: usize,
    lookups: usize,
}
impl DeviceEnumerator for Bus {
    type Link = Rom;

    fn open_first(&mut self, _vendor_id: u16) -> Option<Rom> {
        self.lookups += 1;
        if self.lookups > self.rom_after {
            Some(rom(&[0x5678_9abc, 0x12a8_a812, 0x5678_9abc, WRITE_FILE_COMPLETE, 0]))
        } else {
            None
        }
    }
}

#[test]
fn device_wait_gives_up() {
    let mut bus = Bus {
        rom_after: usize::MAX,
        lookups: 0,
    };
    let outcome = wait_for_device(&mut bus, 0x15a2, 10, Duration::from_millis(0));
    assert!(matches!(
        outcome,
        Err(SdpError::DeviceTimeout {
            vendor_id: 0x15a2,
            tries: 11
        })
    ));
    assert_eq!(bus.lookups, 11);
}

struct Yes;
impl Operator for Yes {
    fn confirm(&mut self, _prompt: &str) -> bool {
        true
    }
}

#[test]
fn script_runs_against_late_device() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("dcd.bin"), [0xd2u8, 0, 0x0c, 0x40]).unwrap();
    fs::write(dir.path().join("app.img"), vec![0x11u8; 1500]).unwrap();
    let script = dir.path().join("board.sdp");
    fs::write(
        &script,
        "# board\nWAIT\nDCD_WRITE dcd.bin 0x910000\nWRITE_FILE app.img 0x877ff400\nPROMPT\nJUMP_ADDRESS 0x877ff400\nREBOOT\n",
    )
    .unwrap();

    let settings = FlashSettingsBuilder::new(&script)
        .wait_period(Duration::from_millis(1))
        .show_progress(false)
        .finalize();
    let bus = Bus {
        rom_after: 2,
        lookups: 0,
    };
    let mut session = FlashSession::new(settings, bus, Yes);
    session.run().unwrap();

    let rom = session.driver().unwrap().link();
    // dcd command + 1 chunk, image command + 2 chunks, jump command.
    assert_eq!(rom.reports.len(), 6);
    assert_eq!(
        rom.requested,
        vec![
            REPORT_HAB_MODE,
            REPORT_STATUS,
            REPORT_HAB_MODE,
            REPORT_STATUS,
            REPORT_HAB_MODE
        ]
    );
}

#[test]
fn unknown_keyword_is_reported_with_its_line() {
    let err = parse_script("WAIT\nWRITE_FILE a.img 0x1000\nFOO bar\n").unwrap_err();
    assert_eq!(err.line(), 3);
    assert_eq!(
        err,
        ScriptError::UnknownKeyword {
            line: 3,
            token: "FOO".into()
        }
    );
    assert!(err.to_string().contains("line 3"));
}

#[test]
fn script_file_with_syntax_error_is_rejected_before_running() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("bad.sdp");
    fs::write(&script, "WAIT\n\nFOO bar\n").unwrap();
    let settings = FlashSettingsBuilder::new(&script)
        .show_progress(false)
        .finalize();
    let bus = Bus {
        rom_after: 0,
        lookups: 0,
    };
    let mut session = FlashSession::new(settings, bus, Yes);
    assert!(matches!(
        session.run(),
        Err(SessionError::Syntax(ScriptError::UnknownKeyword { line: 3, .. }))
    ));
    assert!(session.driver().is_none());
}
