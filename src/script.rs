//! Flashing scripts.
//!
//! One command per line, whitespace separated. Blank lines and lines starting
//! with `#` are skipped. Numbers are decimal or `0x` prefixed hexadecimal.
//!
//! ```text
//! # i.MX6ULL bring-up
//! WAIT 0x15a2
//! DCD_WRITE  dcd.bin    0x00910000
//! WRITE_FILE loader.img 0x00907000
//! PROMPT check the console before jumping
//! JUMP_ADDRESS 0x00907400
//! ```
//!
//! A script is parsed as a whole before anything runs: a syntax error on the
//! last line leaves the device untouched.

use std::{convert::TryFrom, path::PathBuf};

use crate::error::ScriptError;

/// One script command.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ScriptCommand {
    /// Wait for the boot ROM, optionally on another vendor id.
    Wait { vendor_id: Option<u16> },
    WriteFile { path: PathBuf, address: u32 },
    DcdWrite { path: PathBuf, address: u32 },
    JumpAddress { address: u32 },
    /// Arguments for the loaded image. Kept verbatim.
    Args(String),
    /// Ask the operator before going on.
    Prompt(Option<String>),
    Reboot,
}

/// A command and the 1-based line it comes from.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ScriptLine {
    pub line: usize,
    pub command: ScriptCommand,
}

/// Parse a whole script. Stops at the first error.
pub fn parse_script(text: &str) -> Result<Vec<ScriptLine>, ScriptError> {
    let mut commands = Vec::new();
    for (index, text) in text.lines().enumerate() {
        let line = index + 1;
        if let Some(command) = parse_line(line, text)? {
            commands.push(ScriptLine { line, command });
        }
    }
    Ok(commands)
}

/// Parse one line. Returns `None` for blank and comment lines.
pub fn parse_line(line: usize, text: &str) -> Result<Option<ScriptCommand>, ScriptError> {
    let text = text.trim();
    if text.is_empty() || text.starts_with('#') {
        return Ok(None);
    }

    let (keyword, rest) = match text.find(char::is_whitespace) {
        Some(at) => (&text[..at], text[at..].trim_start()),
        None => (text, ""),
    };
    let mut args = rest.split_whitespace();

    let command = match keyword {
        "WAIT" => ScriptCommand::Wait {
            vendor_id: match args.next() {
                Some(value) => Some(parse_vendor_id(line, value)?),
                None => None,
            },
        },
        "WRITE_FILE" => {
            let path = required(line, "WRITE_FILE", "path", args.next())?;
            let address = required(line, "WRITE_FILE", "address", args.next())?;
            ScriptCommand::WriteFile {
                path: PathBuf::from(path),
                address: parse_number(line, address)?,
            }
        }
        "DCD_WRITE" => {
            let path = required(line, "DCD_WRITE", "path", args.next())?;
            let address = required(line, "DCD_WRITE", "address", args.next())?;
            ScriptCommand::DcdWrite {
                path: PathBuf::from(path),
                address: parse_number(line, address)?,
            }
        }
        "JUMP_ADDRESS" => {
            let address = required(line, "JUMP_ADDRESS", "address", args.next())?;
            ScriptCommand::JumpAddress {
                address: parse_number(line, address)?,
            }
        }
        "ARGS" => ScriptCommand::Args(rest.to_string()),
        "PROMPT" => ScriptCommand::Prompt(if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        }),
        "REBOOT" => ScriptCommand::Reboot,
        _ => {
            return Err(ScriptError::UnknownKeyword {
                line,
                token: keyword.to_string(),
            })
        }
    };
    Ok(Some(command))
}

fn required<'a>(
    line: usize,
    keyword: &'static str,
    argument: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, ScriptError> {
    value.ok_or(ScriptError::MissingArgument {
        line,
        keyword,
        argument,
    })
}

/// `0x` hexadecimal or decimal.
fn parse_number(line: usize, value: &str) -> Result<u32, ScriptError> {
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse::<u32>(),
    };
    parsed.map_err(|_| ScriptError::InvalidNumber {
        line,
        value: value.to_string(),
    })
}

fn parse_vendor_id(line: usize, value: &str) -> Result<u16, ScriptError> {
    u16::try_from(parse_number(line, value)?).map_err(|_| ScriptError::InvalidNumber {
        line,
        value: value.to_string(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn full_script() {
    let text = "\
# bring-up
WAIT

DCD_WRITE dcd.bin 0x00910000
WRITE_FILE  loader.img   0x907000
ARGS console=ttymxc0  quiet
PROMPT press enter
JUMP_ADDRESS 9466880
REBOOT
";
    let script = parse_script(text).unwrap();
    let lines: Vec<usize> = script.iter().map(|l| l.line).collect();
    assert_eq!(lines, vec![2, 4, 5, 6, 7, 8, 9]);
    assert_eq!(script[0].command, ScriptCommand::Wait { vendor_id: None });
    assert_eq!(
        script[1].command,
        ScriptCommand::DcdWrite {
            path: "dcd.bin".into(),
            address: 0x0091_0000
        }
    );
    assert_eq!(
        script[2].command,
        ScriptCommand::WriteFile {
            path: "loader.img".into(),
            address: 0x0090_7000
        }
    );
    assert_eq!(
        script[3].command,
        ScriptCommand::Args("console=ttymxc0  quiet".into())
    );
    assert_eq!(
        script[4].command,
        ScriptCommand::Prompt(Some("press enter".into()))
    );
    assert_eq!(
        script[5].command,
        ScriptCommand::JumpAddress { address: 0x0090_7400 }
    );
    assert_eq!(script[6].command, ScriptCommand::Reboot);
}

#[test]
fn unknown_keyword_reports_line() {
    let err = parse_script("WAIT\n# comment\nFOO bar\nREBOOT\n").unwrap_err();
    assert_eq!(
        err,
        ScriptError::UnknownKeyword {
            line: 3,
            token: "FOO".into()
        }
    );
    assert_eq!(err.line(), 3);
}

#[test]
fn keywords_are_case_sensitive() {
    assert!(parse_line(1, "wait").is_err());
}

#[test]
fn wait_with_vendor() {
    assert_eq!(
        parse_line(1, "WAIT 0x1fc9").unwrap(),
        Some(ScriptCommand::Wait {
            vendor_id: Some(0x1fc9)
        })
    );
    assert_eq!(
        parse_line(4, "WAIT 0x10000"),
        Err(ScriptError::InvalidNumber {
            line: 4,
            value: "0x10000".into()
        })
    );
}

#[test]
fn missing_and_bad_arguments() {
    assert_eq!(
        parse_line(2, "WRITE_FILE image.img"),
        Err(ScriptError::MissingArgument {
            line: 2,
            keyword: "WRITE_FILE",
            argument: "address"
        })
    );
    assert_eq!(
        parse_line(5, "JUMP_ADDRESS"),
        Err(ScriptError::MissingArgument {
            line: 5,
            keyword: "JUMP_ADDRESS",
            argument: "address"
        })
    );
    assert_eq!(
        parse_line(7, "JUMP_ADDRESS 0xzz"),
        Err(ScriptError::InvalidNumber {
            line: 7,
            value: "0xzz".into()
        })
    );
}

#[test]
fn blank_and_comment_lines() {
    assert_eq!(parse_line(1, "   ").unwrap(), None);
    assert_eq!(parse_line(1, "  # WAIT").unwrap(), None);
    assert_eq!(parse_line(1, "PROMPT").unwrap(), Some(ScriptCommand::Prompt(None)));
}
