//! AVC (H.264) decoder configuration.
use std::io::Read;
use byteorder::{BigEndian, ReadBytesExt};

use crate::{ErrorKind, Result};

/// AVC decoder configuration record (ISO/IEC 14496-15), as carried in CodecPrivate of `V_MPEG4/ISO/AVC` tracks.
///
/// The record is copied verbatim into the `avcC` box; the parsed fields are used for the codec string.
#[allow(missing_docs)]
#[derive(Debug, Clone)]
pub struct AvcDecoderConfigurationRecord {
    pub profile_idc: u8,
    pub constraint_set_flag: u8,
    pub level_idc: u8,
    pub nal_unit_length_size: u8,
    pub sequence_parameter_sets: Vec<Vec<u8>>,
    pub picture_parameter_sets: Vec<Vec<u8>>,
}
impl AvcDecoderConfigurationRecord {
    /// Parses a record.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let configuration_version = track_io!(reader.read_u8())?;
        track_assert_eq!(configuration_version, 1, ErrorKind::InvalidInput);

        let profile_idc = track_io!(reader.read_u8())?;
        let constraint_set_flag = track_io!(reader.read_u8())?;
        let level_idc = track_io!(reader.read_u8())?;
        let nal_unit_length_size = (track_io!(reader.read_u8())? & 0b11) + 1;

        let sps_count = track_io!(reader.read_u8())? & 0b1_1111;
        let sequence_parameter_sets = track!(read_parameter_sets(&mut reader, sps_count))?;
        let pps_count = track_io!(reader.read_u8())?;
        let picture_parameter_sets = track!(read_parameter_sets(&mut reader, pps_count))?;
        Ok(AvcDecoderConfigurationRecord {
            profile_idc,
            constraint_set_flag,
            level_idc,
            nal_unit_length_size,
            sequence_parameter_sets,
            picture_parameter_sets,
        })
    }

    /// Returns the codec string for MIME types (e.g., `avc1.64001F`).
    pub fn codec_string(&self) -> String {
        format!(
            "avc1.{:02X}{:02X}{:02X}",
            self.profile_idc, self.constraint_set_flag, self.level_idc
        )
    }
}

fn read_parameter_sets<R: Read>(mut reader: R, count: u8) -> Result<Vec<Vec<u8>>> {
    let mut sets = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let len = track_io!(reader.read_u16::<BigEndian>())?;
        let mut set = vec![0; len as usize];
        track_io!(reader.read_exact(&mut set))?;
        sets.push(set);
    }
    Ok(sets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_record() {
        let bytes = [
            0x01, 0x64, 0x00, 0x1F, 0xFF, 0xE1, 0x00, 0x03, 0x67, 0x64, 0x00, 0x01, 0x00, 0x02,
            0x68, 0xEE,
        ];
        let record = track_try_unwrap!(AvcDecoderConfigurationRecord::read_from(&bytes[..]));
        assert_eq!(record.codec_string(), "avc1.64001F");
        assert_eq!(record.nal_unit_length_size, 4);
        assert_eq!(record.sequence_parameter_sets, vec![vec![0x67, 0x64, 0x00]]);
        assert_eq!(record.picture_parameter_sets, vec![vec![0x68, 0xEE]]);
    }

    #[test]
    fn truncated_record_fails() {
        let bytes = [0x01, 0x42, 0xC0, 0x1E, 0xFF, 0xE1, 0x00, 0x10, 0x67];
        assert!(AvcDecoderConfigurationRecord::read_from(&bytes[..]).is_err());
        assert!(AvcDecoderConfigurationRecord::read_from(&[0x02, 0x42][..]).is_err());
    }
}
