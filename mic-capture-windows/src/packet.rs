//! Splitting WASAPI packets into render quanta.
//!
//! The shared-mode engine hands out packets of whatever size its period
//! produces; the session accepts at most [`MAX_FRAMES_PER_SLICE`] frames per
//! callback, so larger packets are delivered as consecutive slices.

use mic_capture_core::{FormatFlags, StreamFormatDescriptor, MAX_FRAMES_PER_SLICE};

/// One slice of a captured packet, in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub offset: u32,
    pub frames: u32,
}

/// Slices covering `frames` frames, none larger than `MAX_FRAMES_PER_SLICE`.
pub fn slices(frames: u32) -> impl Iterator<Item = Slice> {
    (0..frames)
        .step_by(MAX_FRAMES_PER_SLICE as usize)
        .map(move |offset| Slice {
            offset,
            frames: (frames - offset).min(MAX_FRAMES_PER_SLICE),
        })
}

/// Copy captured bytes into the callback's buffer. `None` marks a packet the
/// engine flagged silent; the buffer is zeroed instead.
pub fn copy_packet(source: Option<&[u8]>, dest: &mut [u8]) -> usize {
    match source {
        Some(bytes) => {
            let n = bytes.len().min(dest.len());
            dest[..n].copy_from_slice(&bytes[..n]);
            n
        }
        None => {
            dest.fill(0);
            dest.len()
        }
    }
}

/// Whether the shared-mode engine can convert to `format`: little-endian
/// 16-bit signed PCM, interleaved.
pub fn is_capture_format(format: &StreamFormatDescriptor) -> bool {
    let flags = format.format_flags();
    format.bits_per_channel() == 16
        && flags.contains(FormatFlags::SIGNED_INTEGER)
        && !flags.contains(FormatFlags::FLOAT)
        && !format.is_big_endian()
        && (format.channel_count() == 1 || format.is_interleaved())
        && (1..=2).contains(&format.channel_count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_packet_is_one_slice() {
        let all: Vec<_> = slices(480).collect();
        assert_eq!(all, vec![Slice { offset: 0, frames: 480 }]);
    }

    #[test]
    fn large_packet_is_split() {
        let all: Vec<_> = slices(MAX_FRAMES_PER_SLICE * 2 + 10).collect();
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].offset, MAX_FRAMES_PER_SLICE);
        assert_eq!(all[2].frames, 10);
        assert_eq!(all.iter().map(|s| s.frames).sum::<u32>(), MAX_FRAMES_PER_SLICE * 2 + 10);
    }

    #[test]
    fn empty_packet_has_no_slices() {
        assert_eq!(slices(0).count(), 0);
    }

    #[test]
    fn copy_truncates_to_destination() {
        let mut dest = [0u8; 4];
        assert_eq!(copy_packet(Some(&[1, 2, 3, 4, 5, 6]), &mut dest), 4);
        assert_eq!(dest, [1, 2, 3, 4]);

        let mut dest = [9u8; 4];
        assert_eq!(copy_packet(Some(&[7, 8]), &mut dest), 2);
        assert_eq!(dest, [7, 8, 9, 9]);
    }

    #[test]
    fn silent_packet_zeroes() {
        let mut dest = [0xffu8; 6];
        assert_eq!(copy_packet(None, &mut dest), 6);
        assert_eq!(dest, [0; 6]);
    }

    #[test]
    fn capture_format_acceptance() {
        assert!(is_capture_format(&StreamFormatDescriptor::linear_pcm(48000.0)));

        let float = StreamFormatDescriptor::new(48000.0, FormatFlags::FLOAT | FormatFlags::PACKED, 32, 1, 1);
        assert!(!is_capture_format(&float));

        let wide = StreamFormatDescriptor::new(48000.0, FormatFlags::SIGNED_INTEGER | FormatFlags::PACKED, 24, 1, 1);
        assert!(!is_capture_format(&wide));

        let planar = StreamFormatDescriptor::new(
            48000.0,
            FormatFlags::SIGNED_INTEGER | FormatFlags::NON_INTERLEAVED,
            16,
            2,
            1,
        );
        assert!(!is_capture_format(&planar));
    }
}
