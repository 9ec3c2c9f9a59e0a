//! The reusable frame buffer and its plane views.
//!
//! A [`FrameBuffer`] is allocated once per run and refilled in place for
//! every frame. [`FrameBuffer::planes`] borrows the buffer, so the views it
//! returns cannot outlive the frame they describe: the next refill needs a
//! mutable borrow and therefore ends every outstanding view.
//!
//! [`BitstreamBuffer`] is the scratch area the encoder writes its (discarded)
//! compressed output into; it is allocated once as well.

use crate::{error::ScxvidError, geometry::VideoGeometry};

/// Default scratch capacity for the compressed bitstream (4 MiB).
pub const DEFAULT_BITSTREAM_CAPACITY: usize = 4 * 1024 * 1024;

/// Allocate a zeroed byte vector, reporting failure instead of aborting.
fn allocate_bytes(bytes: usize, purpose: &'static str) -> Result<Vec<u8>, ScxvidError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(bytes)
        .map_err(|_| ScxvidError::AllocationFailed { purpose, bytes })?;
    buffer.resize(bytes, 0);
    Ok(buffer)
}

/// One plane of a frame: its bytes, row stride and offset into the frame.
#[derive(Debug, Clone, Copy)]
pub struct PlaneView<'a> {
    /// Plane bytes, `stride * rows` long.
    pub data: &'a [u8],
    /// Bytes per row.
    pub stride: usize,
    /// Byte offset of the plane's first row within the frame buffer.
    pub offset: usize,
}

impl<'a> PlaneView<'a> {
    /// Number of rows in the plane.
    pub fn rows(&self) -> usize {
        if self.stride == 0 {
            0
        } else {
            self.data.len() / self.stride
        }
    }

    /// Iterate over the plane row by row.
    pub fn row_iter(&self) -> impl Iterator<Item = &'a [u8]> + 'a {
        let stride = self.stride.max(1);
        self.data.chunks_exact(stride)
    }
}

/// The three plane views of one 4:2:0 frame.
#[derive(Debug, Clone, Copy)]
pub struct FramePlanes<'a> {
    /// Luma plane at offset 0, stride `width`.
    pub luma: PlaneView<'a>,
    /// First chroma plane (Cb), stride `width / 2`.
    pub cb: PlaneView<'a>,
    /// Second chroma plane (Cr), stride `width / 2`.
    pub cr: PlaneView<'a>,
}

/// Single reusable buffer holding exactly one frame.
#[derive(Debug)]
pub struct FrameBuffer {
    geometry: VideoGeometry,
    bytes: Vec<u8>,
}

impl FrameBuffer {
    /// Allocate a buffer of exactly `geometry.frame_size()` bytes.
    ///
    /// # Errors
    ///
    /// [`ScxvidError::AllocationFailed`] if the memory cannot be reserved.
    pub fn allocate(geometry: VideoGeometry) -> Result<Self, ScxvidError> {
        let bytes = allocate_bytes(geometry.frame_size(), "frame buffer")?;
        log::debug!(
            "Allocated {} byte frame buffer for {}x{}",
            bytes.len(),
            geometry.width(),
            geometry.height()
        );
        Ok(Self { geometry, bytes })
    }

    /// Geometry this buffer was sized for.
    pub fn geometry(&self) -> VideoGeometry {
        self.geometry
    }

    /// Buffer length; always equal to the frame size.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always `false`: geometry guarantees a non-empty frame.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whole frame, read-only.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whole frame, for refilling in place.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Compute the plane views from fixed offsets. No I/O, no allocation.
    pub fn planes(&self) -> FramePlanes<'_> {
        let geometry = &self.geometry;
        let (luma, chroma) = self.bytes.split_at(geometry.luma_plane_size());
        let (cb, cr) = chroma.split_at(geometry.chroma_plane_size());

        FramePlanes {
            luma: PlaneView {
                data: luma,
                stride: geometry.luma_stride(),
                offset: 0,
            },
            cb: PlaneView {
                data: cb,
                stride: geometry.chroma_stride(),
                offset: geometry.cb_offset(),
            },
            cr: PlaneView {
                data: cr,
                stride: geometry.chroma_stride(),
                offset: geometry.cr_offset(),
            },
        }
    }
}

/// Scratch output area for the encoder's compressed bitstream.
#[derive(Debug)]
pub struct BitstreamBuffer {
    bytes: Vec<u8>,
}

impl BitstreamBuffer {
    /// Allocate `capacity` bytes of scratch space.
    ///
    /// # Errors
    ///
    /// [`ScxvidError::AllocationFailed`] if the memory cannot be reserved.
    pub fn allocate(capacity: usize) -> Result<Self, ScxvidError> {
        Ok(Self {
            bytes: allocate_bytes(capacity, "bitstream buffer")?,
        })
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Writable scratch area handed to the encoder.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}
