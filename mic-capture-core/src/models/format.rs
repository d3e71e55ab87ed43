use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// Linear PCM format flags.
///
/// Bit positions follow the platform audio format flag layout, so values can
/// be handed to a hardware layer unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FormatFlags(u32);

impl FormatFlags {
    pub const FLOAT: Self = Self(1 << 0);
    pub const BIG_ENDIAN: Self = Self(1 << 1);
    pub const SIGNED_INTEGER: Self = Self(1 << 2);
    pub const PACKED: Self = Self(1 << 3);
    pub const NON_INTERLEAVED: Self = Self(1 << 5);

    #[cfg(target_endian = "big")]
    pub const NATIVE_ENDIAN: Self = Self::BIG_ENDIAN;
    #[cfg(target_endian = "little")]
    pub const NATIVE_ENDIAN: Self = Self(0);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for FormatFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Immutable description of a capture stream.
///
/// Only the primary fields are stored. Byte layout (`bytes_per_frame`,
/// `bytes_per_packet`) is always computed from them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamFormatDescriptor {
    sample_rate: f64,
    format_flags: FormatFlags,
    bits_per_channel: u32,
    channel_count: u32,
    frames_per_packet: u32,
}

impl StreamFormatDescriptor {
    /// Bit depth of the microphone capture format.
    pub const CAPTURE_BITS_PER_CHANNEL: u32 = 16;

    /// Channel count of the microphone capture format.
    pub const CAPTURE_CHANNEL_COUNT: u32 = 1;

    pub fn new(
        sample_rate: f64,
        format_flags: FormatFlags,
        bits_per_channel: u32,
        channel_count: u32,
        frames_per_packet: u32,
    ) -> Self {
        Self {
            sample_rate,
            format_flags,
            bits_per_channel,
            channel_count,
            frames_per_packet,
        }
    }

    /// The format the session requests from the input unit:
    /// 16-bit signed integer, packed, native endian, mono, one frame per packet.
    pub fn linear_pcm(sample_rate: f64) -> Self {
        Self::new(
            sample_rate,
            FormatFlags::SIGNED_INTEGER | FormatFlags::NATIVE_ENDIAN | FormatFlags::PACKED,
            Self::CAPTURE_BITS_PER_CHANNEL,
            Self::CAPTURE_CHANNEL_COUNT,
            1,
        )
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn format_flags(&self) -> FormatFlags {
        self.format_flags
    }

    pub fn bits_per_channel(&self) -> u32 {
        self.bits_per_channel
    }

    pub fn channel_count(&self) -> u32 {
        self.channel_count
    }

    pub fn frames_per_packet(&self) -> u32 {
        self.frames_per_packet
    }

    pub fn bytes_per_frame(&self) -> u32 {
        self.bits_per_channel / 8 * self.channel_count
    }

    pub fn bytes_per_packet(&self) -> u32 {
        self.bytes_per_frame() * self.frames_per_packet
    }

    pub fn is_interleaved(&self) -> bool {
        !self.format_flags.contains(FormatFlags::NON_INTERLEAVED)
    }

    pub fn is_big_endian(&self) -> bool {
        self.format_flags.contains(FormatFlags::BIG_ENDIAN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_format_mono_16bit() {
        let format = StreamFormatDescriptor::linear_pcm(48000.0);

        assert_eq!(format.bits_per_channel(), 16);
        assert_eq!(format.channel_count(), 1);
        assert_eq!(format.frames_per_packet(), 1);
        assert_eq!(format.bytes_per_frame(), 2);
        assert_eq!(format.bytes_per_packet(), 2);
        assert!(format.format_flags().contains(FormatFlags::SIGNED_INTEGER));
        assert!(format.format_flags().contains(FormatFlags::PACKED));
        assert!(!format.format_flags().contains(FormatFlags::FLOAT));
    }

    #[test]
    fn derived_layout_follows_primary_fields() {
        for bits in [8u32, 16, 24, 32] {
            for channels in 1u32..=8 {
                for frames in [1u32, 2, 4, 1024] {
                    let format = StreamFormatDescriptor::new(
                        44100.0,
                        FormatFlags::SIGNED_INTEGER,
                        bits,
                        channels,
                        frames,
                    );
                    let per_frame = bits / 8 * channels;
                    assert_eq!(format.bytes_per_frame(), per_frame);
                    assert_eq!(format.bytes_per_packet(), per_frame * frames);
                }
            }
        }
    }

    #[test]
    fn interleaving_and_endianness_come_from_flags() {
        let planar = StreamFormatDescriptor::new(
            48000.0,
            FormatFlags::FLOAT | FormatFlags::NON_INTERLEAVED | FormatFlags::BIG_ENDIAN,
            32,
            2,
            1,
        );
        assert!(!planar.is_interleaved());
        assert!(planar.is_big_endian());

        let packed = StreamFormatDescriptor::new(48000.0, FormatFlags::PACKED, 16, 2, 1);
        assert!(packed.is_interleaved());
        assert!(!packed.is_big_endian());
    }

    #[test]
    fn flags_bit_layout() {
        let flags = FormatFlags::SIGNED_INTEGER | FormatFlags::PACKED;
        assert_eq!(flags.bits(), 0b1100);
        assert_eq!(FormatFlags::from_bits(0b1100), flags);
        assert!(FormatFlags::empty().contains(FormatFlags::empty()));
    }
}
