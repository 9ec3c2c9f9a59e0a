//! Frame geometry derived from the stream header.

use crate::error::ScxvidError;

/// Dimensions and plane sizes of a planar 4:2:0 stream.
///
/// Built once from the header by [`VideoGeometry::new`] and shared by value
/// afterwards. `frame_size == luma_plane_size + 2 * chroma_plane_size` holds
/// for every value this type can represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoGeometry {
    width: u32,
    height: u32,
    luma_plane_size: usize,
    chroma_plane_size: usize,
    frame_size: usize,
}

impl VideoGeometry {
    /// Derive the geometry for a `width` x `height` 4:2:0 frame.
    ///
    /// # Errors
    ///
    /// [`ScxvidError::InvalidHeader`] if either dimension is zero or odd, or
    /// if the frame size does not fit in `usize`.
    pub fn new(width: u32, height: u32) -> Result<Self, ScxvidError> {
        if width == 0 || height == 0 {
            return Err(ScxvidError::InvalidHeader(format!(
                "dimensions must be positive, got {width}x{height}"
            )));
        }
        if width % 2 != 0 || height % 2 != 0 {
            return Err(ScxvidError::InvalidHeader(format!(
                "4:2:0 input needs even dimensions, got {width}x{height}"
            )));
        }

        let luma_plane_size = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| {
                ScxvidError::InvalidHeader(format!("frame {width}x{height} is too large"))
            })?;
        let chroma_plane_size = luma_plane_size / 4;
        let frame_size = chroma_plane_size
            .checked_mul(2)
            .and_then(|chroma| chroma.checked_add(luma_plane_size))
            .ok_or_else(|| {
                ScxvidError::InvalidHeader(format!("frame {width}x{height} is too large"))
            })?;

        Ok(Self {
            width,
            height,
            luma_plane_size,
            chroma_plane_size,
            frame_size,
        })
    }

    /// Luma width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Luma height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes in one complete frame (`width * height * 3 / 2`).
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Bytes in the luma plane (`width * height`).
    pub fn luma_plane_size(&self) -> usize {
        self.luma_plane_size
    }

    /// Bytes in each chroma plane (`width * height / 4`).
    pub fn chroma_plane_size(&self) -> usize {
        self.chroma_plane_size
    }

    /// Row stride of the luma plane.
    pub fn luma_stride(&self) -> usize {
        self.width as usize
    }

    /// Row stride of each chroma plane.
    pub fn chroma_stride(&self) -> usize {
        self.width as usize / 2
    }

    /// Offset of the first chroma plane within a frame.
    pub fn cb_offset(&self) -> usize {
        self.luma_plane_size
    }

    /// Offset of the second chroma plane within a frame.
    pub fn cr_offset(&self) -> usize {
        self.luma_plane_size + self.chroma_plane_size
    }
}
