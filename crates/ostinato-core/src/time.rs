//! Frame counts and per-chunk timing.

/// Frame count inside a cycle.
pub type NFrames = u32;
/// Absolute timeline position in frames.
pub type UnsignedFrame = u64;
/// Signed frame offset.
pub type SignedFrame = i64;

/// Timing of one processed chunk.
///
/// A cycle may be split into several chunks (preroll boundaries, loop
/// points). Every chunk covers `[local_offset, local_offset + nframes)` of
/// the cycle's buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineProcessTimeInfo {
    /// Timeline frame at the start of the cycle.
    pub g_start_frame: UnsignedFrame,
    /// Timeline frame of the first frame of this chunk.
    pub g_start_frame_w_offset: UnsignedFrame,
    /// Offset of this chunk inside the cycle buffers.
    pub local_offset: NFrames,
    /// Frames in this chunk.
    pub nframes: NFrames,
}

impl EngineProcessTimeInfo {
    pub fn new(g_start_frame: UnsignedFrame, local_offset: NFrames, nframes: NFrames) -> Self {
        Self {
            g_start_frame,
            g_start_frame_w_offset: g_start_frame + local_offset as UnsignedFrame,
            local_offset,
            nframes,
        }
    }

    /// Chunk end inside the cycle buffers.
    #[inline]
    pub fn end_offset(&self) -> NFrames {
        self.local_offset + self.nframes
    }

    /// Buffer index range of the chunk.
    #[inline]
    pub fn range(&self) -> core::ops::Range<usize> {
        self.local_offset as usize..self.end_offset() as usize
    }
}
