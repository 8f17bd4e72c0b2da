//! Per-protocol textual annotation (spec §4.8 step 6): turns one frame's
//! raw bytes into the leftmost "explanation" column. Ground truth:
//! `client/src/cmdtrace.c`'s big per-protocol `if` ladder inside
//! `PrintTraceLine` — this module gives each protocol its own small
//! `Annotator` instead of one monolithic function.

use crate::util::crc::{check, Crc16Kind};

/// Three-way CRC verdict: some frames (short REQA/ACK) carry no CRC at
/// all (spec §4.8 step 3: "pass/fail/N/A").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrcStatus {
    Pass,
    Fail,
    NotApplicable,
}

pub fn crc_status(kind: Option<Crc16Kind>, data: &[u8]) -> CrcStatus {
    match kind {
        None => CrcStatus::NotApplicable,
        Some(kind) if data.len() < 3 => CrcStatus::NotApplicable,
        Some(kind) => {
            if check(kind, data) {
                CrcStatus::Pass
            } else {
                CrcStatus::Fail
            }
        }
    }
}

pub trait Annotator {
    /// Short human-readable description of `data`, e.g. `"REQA"` or
    /// `"AUTH(A) blk 4"`.
    fn describe(&self, data: &[u8], is_response: bool) -> String;
}

pub struct Iso14aAnnotator;

impl Annotator for Iso14aAnnotator {
    fn describe(&self, data: &[u8], is_response: bool) -> String {
        use crate::frame::iso14a::*;
        if data.len() >= 2 && data[..2] == HALT[..] {
            return "HALT".to_string();
        }
        if data.len() >= 2 && data[..2] == ANTICOLL_CL1[..] {
            return "ANTICOLL".to_string();
        }
        match data.first() {
            Some(&REQA) => "REQA".to_string(),
            Some(&WUPA) => "WUPA".to_string(),
            Some(&SELECT_CL1) => "SELECT".to_string(),
            Some(&0x60) | Some(&0x61) if data.len() >= 2 => {
                format!("AUTH({}) blk {}", if data[0] == 0x60 { "A" } else { "B" }, data[1])
            }
            Some(&0x30) if data.len() >= 2 => format!("READ blk {}", data[1]),
            Some(&0xA0) if data.len() >= 2 => format!("WRITE blk {}", data[1]),
            _ if is_response => format!("{} byte(s)", data.len()),
            _ => format!("raw({} B)", data.len()),
        }
    }
}

pub struct Iso15693Annotator;

impl Annotator for Iso15693Annotator {
    fn describe(&self, data: &[u8], _is_response: bool) -> String {
        use crate::frame::iso15693::*;
        if data.len() < 2 {
            return format!("raw({} B)", data.len());
        }
        match data[1] {
            CMD_INVENTORY => "INVENTORY".to_string(),
            CMD_READ_SINGLE_BLOCK => "READ SINGLE BLOCK".to_string(),
            CMD_WRITE_SINGLE_BLOCK => "WRITE SINGLE BLOCK".to_string(),
            CMD_GET_SYSTEM_INFO => "GET SYSTEM INFO".to_string(),
            other => format!("CMD {:#04x}", other),
        }
    }
}

pub struct IClassAnnotator;

impl Annotator for IClassAnnotator {
    fn describe(&self, data: &[u8], _is_response: bool) -> String {
        use crate::frame::iclass::*;
        match data.first() {
            Some(&ACTALL) => "ACTALL".to_string(),
            Some(&IDENTIFY) => "IDENTIFY".to_string(),
            Some(&SELECT) => "SELECT".to_string(),
            Some(&READCHECK_KD) => "READCHECK(Kd)".to_string(),
            Some(&READCHECK_KC) => "READCHECK(Kc)".to_string(),
            Some(&CHECK) => "CHECK".to_string(),
            Some(&READ4) => "READ4".to_string(),
            Some(&UPDATE) => "UPDATE".to_string(),
            Some(&PAGESEL) => "PAGESEL".to_string(),
            _ => format!("raw({} B)", data.len()),
        }
    }
}

pub struct TopazAnnotator;

impl Annotator for TopazAnnotator {
    fn describe(&self, data: &[u8], _is_response: bool) -> String {
        use crate::frame::topaz::*;
        match data.first() {
            Some(&WUPA) => "WUPA".to_string(),
            Some(&REQA) => "REQA".to_string(),
            Some(&RID) => "RID".to_string(),
            Some(&RALL) => "RALL".to_string(),
            Some(&READ8) => "READ8".to_string(),
            Some(&WRITE_E) => "WRITE-E".to_string(),
            Some(&WRITE_NE) => "WRITE-NE".to_string(),
            _ => format!("raw({} B)", data.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso14a_annotator_names_common_commands() {
        let a = Iso14aAnnotator;
        assert_eq!(a.describe(&[0x26], false), "REQA");
        assert_eq!(a.describe(&[0x60, 0x04], false), "AUTH(A) blk 4");
    }

    #[test]
    fn crc_status_reports_not_applicable_for_short_frames() {
        assert_eq!(crc_status(Some(Crc16Kind::Iso14443A), &[0x26]), CrcStatus::NotApplicable);
    }

    #[test]
    fn crc_status_passes_valid_crc() {
        let mut data = vec![0x60u8, 0x00];
        crate::util::crc::append(Crc16Kind::Iso14443A, &mut data);
        assert_eq!(crc_status(Some(Crc16Kind::Iso14443A), &data), CrcStatus::Pass);
    }
}
