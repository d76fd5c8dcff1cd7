//! AAC (MPEG-4 Audio) configuration.
use crate::io::BitReader;
use crate::{ErrorKind, Result};

const SAMPLING_FREQUENCIES: [u32; 13] = [
    96_000, 88_200, 64_000, 48_000, 44_100, 32_000, 24_000, 22_050, 16_000, 12_000, 11_025, 8_000,
    7_350,
];

/// `AudioSpecificConfig` (ISO/IEC 14496-3), as carried in CodecPrivate of `A_AAC` tracks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AudioSpecificConfig {
    /// Audio object type (e.g., `2` for AAC-LC).
    pub object_type: u8,

    /// Sampling frequency in Hz.
    pub sampling_frequency: u32,

    /// Channel configuration (`0` means "defined in the bitstream").
    pub channel_configuration: u8,
}
impl AudioSpecificConfig {
    /// Parses the head of an `AudioSpecificConfig`.
    ///
    /// Fields after the channel configuration are ignored.
    pub fn read_from(bytes: &[u8]) -> Result<Self> {
        let mut reader = BitReader::new(bytes);
        let mut object_type = track!(reader.read_bits(5))? as u8;
        if object_type == 31 {
            object_type = 32 + track!(reader.read_bits(6))? as u8;
        }
        let frequency_index = track!(reader.read_bits(4))? as usize;
        let sampling_frequency = match frequency_index {
            15 => track!(reader.read_bits(24))? as u32,
            i => *track_assert_some!(
                SAMPLING_FREQUENCIES.get(i),
                ErrorKind::InvalidInput,
                "Reserved sampling frequency index: {}",
                i
            ),
        };
        let channel_configuration = track!(reader.read_bits(4))? as u8;
        track_assert_ne!(object_type, 0, ErrorKind::InvalidInput);
        Ok(AudioSpecificConfig {
            object_type,
            sampling_frequency,
            channel_configuration,
        })
    }

    /// Derives a configuration from a legacy codec id such as `A_AAC/MPEG4/LC`.
    ///
    /// Channel counts without a channel configuration (e.g., 7) are left to the bitstream.
    /// Returns `None` if the codec id does not name a profile.
    pub fn from_codec_id(codec_id: &str, sampling_frequency: u32, channels: u8) -> Option<Self> {
        let profile = codec_id
            .strip_prefix("A_AAC/MPEG4/")
            .or_else(|| codec_id.strip_prefix("A_AAC/MPEG2/"))?;
        let object_type = match profile.split('/').next()? {
            "MAIN" => 1,
            "LC" => 2,
            "SSR" => 3,
            "LTP" => 4,
            _ => return None,
        };
        Some(AudioSpecificConfig {
            object_type,
            sampling_frequency,
            channel_configuration: channel_configuration(channels),
        })
    }

    /// Serializes the configuration (without any extension).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bits: Vec<(u64, usize)> = Vec::new();
        if self.object_type >= 31 {
            bits.push((31, 5));
            bits.push((u64::from(self.object_type - 32), 6));
        } else {
            bits.push((u64::from(self.object_type), 5));
        }
        match SAMPLING_FREQUENCIES
            .iter()
            .position(|&f| f == self.sampling_frequency)
        {
            Some(i) => bits.push((i as u64, 4)),
            None => {
                bits.push((15, 4));
                bits.push((u64::from(self.sampling_frequency), 24));
            }
        }
        bits.push((u64::from(self.channel_configuration), 4));
        bits.push((0, 3)); // frame_length_flag, depends_on_core_coder, extension_flag

        let mut acc = 0u64;
        let mut len = 0;
        for (value, width) in bits {
            acc = (acc << width) | (value & ((1 << width) - 1));
            len += width;
        }
        let padding = (8 - len % 8) % 8;
        acc <<= padding;
        len += padding;
        (0..len / 8)
            .rev()
            .map(|i| (acc >> (i * 8)) as u8)
            .collect()
    }

    /// Returns the codec string for MIME types (e.g., `mp4a.40.2`).
    pub fn codec_string(&self) -> String {
        format!("mp4a.40.{}", self.object_type)
    }
}

fn channel_configuration(channels: u8) -> u8 {
    match channels {
        1..=6 => channels,
        8 => 7,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aac_lc() {
        let asc = track_try_unwrap!(AudioSpecificConfig::read_from(&[0x12, 0x10]));
        assert_eq!(asc.object_type, 2);
        assert_eq!(asc.sampling_frequency, 44_100);
        assert_eq!(asc.channel_configuration, 2);
        assert_eq!(asc.codec_string(), "mp4a.40.2");
        assert_eq!(asc.to_bytes(), vec![0x12, 0x10]);
    }

    #[test]
    fn explicit_frequency() {
        let asc = AudioSpecificConfig {
            object_type: 2,
            sampling_frequency: 50_000,
            channel_configuration: 1,
        };
        let bytes = asc.to_bytes();
        assert_eq!(bytes.len(), 5);
        assert_eq!(track_try_unwrap!(AudioSpecificConfig::read_from(&bytes)), asc);
    }

    #[test]
    fn legacy_codec_ids() {
        let asc = AudioSpecificConfig::from_codec_id("A_AAC/MPEG4/LC/SBR", 48_000, 2);
        assert_eq!(asc.map(|a| a.to_bytes()), Some(vec![0x11, 0x90]));
        assert!(AudioSpecificConfig::from_codec_id("A_AAC", 48_000, 2).is_none());
    }

    #[test]
    fn channel_counts_map_to_configurations() {
        let config = |channels| {
            AudioSpecificConfig::from_codec_id("A_AAC/MPEG4/LC", 48_000, channels)
                .map(|a| a.channel_configuration)
        };
        assert_eq!(config(1), Some(1));
        assert_eq!(config(6), Some(6));
        assert_eq!(config(7), Some(0));
        assert_eq!(config(8), Some(7));
        assert_eq!(config(0), Some(0));
        assert_eq!(config(12), Some(0));
    }

    #[test]
    fn reserved_index_is_rejected() {
        assert!(AudioSpecificConfig::read_from(&[0x16, 0x90]).is_err());
        assert!(AudioSpecificConfig::read_from(&[0x12]).is_err());
    }
}
