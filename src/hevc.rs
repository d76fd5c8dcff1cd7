//! HEVC (H.265) decoder configuration.
use crate::io::BitReader;
use crate::{ErrorKind, Result};

/// The profile, tier and level part of an HEVC decoder configuration record (ISO/IEC 14496-15).
///
/// Only the first 13 bytes of the record are interpreted.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HevcDecoderConfigurationRecord {
    pub general_profile_space: u8,
    pub general_tier_flag: bool,
    pub general_profile_idc: u8,
    pub general_profile_compatibility_flags: u32,
    pub general_constraint_indicator_flags: [u8; 6],
    pub general_level_idc: u8,
}
impl HevcDecoderConfigurationRecord {
    /// Parses the head of a record.
    pub fn read_from(bytes: &[u8]) -> Result<Self> {
        track_assert!(
            bytes.len() >= 13,
            ErrorKind::InvalidInput,
            "Too short HEVC configuration: {} bytes",
            bytes.len()
        );
        track_assert_eq!(bytes[0], 1, ErrorKind::InvalidInput);

        let mut reader = BitReader::new(&bytes[1..13]);
        let general_profile_space = track!(reader.read_bits(2))? as u8;
        let general_tier_flag = track!(reader.read_bit())? == 1;
        let general_profile_idc = track!(reader.read_bits(5))? as u8;
        let general_profile_compatibility_flags = track!(reader.read_bits(32))? as u32;
        let mut general_constraint_indicator_flags = [0; 6];
        for b in &mut general_constraint_indicator_flags {
            *b = track!(reader.read_bits(8))? as u8;
        }
        let general_level_idc = track!(reader.read_bits(8))? as u8;
        Ok(HevcDecoderConfigurationRecord {
            general_profile_space,
            general_tier_flag,
            general_profile_idc,
            general_profile_compatibility_flags,
            general_constraint_indicator_flags,
            general_level_idc,
        })
    }

    /// Returns the codec string for MIME types (e.g., `hvc1.1.6.L93.B0`).
    ///
    /// `format` is the sample entry type (`hvc1` or `hev1`).
    pub fn codec_string(&self, format: &str) -> String {
        let mut s = format!("{}.", format);
        if self.general_profile_space > 0 {
            s.push((b'A' + self.general_profile_space - 1) as char);
        }
        s.push_str(&format!(
            "{}.{:X}.{}{}",
            self.general_profile_idc,
            self.general_profile_compatibility_flags.reverse_bits(),
            if self.general_tier_flag { 'H' } else { 'L' },
            self.general_level_idc
        ));

        let flags = &self.general_constraint_indicator_flags;
        let used = flags.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        for b in &flags[..used] {
            s.push_str(&format!(".{:X}", b));
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_profile_codec_string() {
        let bytes = [
            0x01, 0x01, 0x60, 0x00, 0x00, 0x00, 0xB0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x5D, 0xF0,
        ];
        let record = track_try_unwrap!(HevcDecoderConfigurationRecord::read_from(&bytes));
        assert_eq!(record.general_profile_idc, 1);
        assert_eq!(record.general_level_idc, 93);
        assert_eq!(record.codec_string("hvc1"), "hvc1.1.6.L93.B0");
    }

    #[test]
    fn high_tier_with_profile_space() {
        let bytes = [
            0x01, 0x62, 0x40, 0x00, 0x00, 0x00, 0x90, 0x00, 0x00, 0x00, 0x00, 0x08, 0x99,
        ];
        let record = track_try_unwrap!(HevcDecoderConfigurationRecord::read_from(&bytes));
        assert_eq!(record.codec_string("hev1"), "hev1.A2.2.H153.90.0.0.0.0.8");
    }

    #[test]
    fn short_record_fails() {
        assert!(HevcDecoderConfigurationRecord::read_from(&[0x01, 0x01]).is_err());
    }
}
