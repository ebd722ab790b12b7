use std::fmt;
use std::sync::{Arc, RwLock};

use image::Rgba32FImage;
use serde::{Deserialize, Serialize};

use crate::error::GpuError;
use crate::gpu::device::Allocation;

/// Storage format of a device image buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Four 32-bit float channels
    #[default]
    Rgba32Float,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> u64 {
        match self {
            PixelFormat::Rgba32Float => 16,
        }
    }
}

/// Size and format of an image buffer
///
/// Buffers, pools and per-stage scratch are (re)allocated whenever the
/// requested geometry differs from the one they were built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl Geometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Rgba32Float,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Size of one buffer of this geometry in bytes
    pub fn byte_size(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.format.bytes_per_pixel()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Handle to a device-resident image buffer
///
/// Cloning the handle does not copy pixels; two handles compare equal when
/// they refer to the same buffer.
#[derive(Clone)]
pub struct Texture {
    inner: Arc<TextureInner>,
}

struct TextureInner {
    id: u64,
    label: String,
    geometry: Geometry,
    storage: RwLock<Arc<Rgba32FImage>>,
    _allocation: Allocation,
}

impl Texture {
    pub(crate) fn new(id: u64, label: &str, geometry: Geometry, allocation: Allocation) -> Self {
        let image = Rgba32FImage::new(geometry.width, geometry.height);
        Self {
            inner: Arc::new(TextureInner {
                id,
                label: label.to_string(),
                geometry,
                storage: RwLock::new(Arc::new(image)),
                _allocation: allocation,
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn geometry(&self) -> Geometry {
        self.inner.geometry
    }

    pub fn width(&self) -> u32 {
        self.inner.geometry.width
    }

    pub fn height(&self) -> u32 {
        self.inner.geometry.height
    }

    /// Read back one pixel
    pub fn pixel(&self, x: u32, y: u32) -> Result<[f32; 4], GpuError> {
        let (width, height) = self.geometry().dimensions();
        if x >= width || y >= height {
            return Err(GpuError::GeometryMismatch {
                expected: (width, height),
                actual: (x, y),
            });
        }
        Ok(self.snapshot()?.get_pixel(x, y).0)
    }

    /// Immutable view of the current contents
    ///
    /// Later writes to the texture do not affect the returned snapshot.
    pub(crate) fn snapshot(&self) -> Result<Arc<Rgba32FImage>, GpuError> {
        self.inner
            .storage
            .read()
            .map(|guard| Arc::clone(&guard))
            .map_err(|_| GpuError::LockPoisoned)
    }

    /// Mutate the contents in place, copying first if a snapshot is still alive
    pub(crate) fn write_with<F>(&self, f: F) -> Result<(), GpuError>
    where
        F: FnOnce(&mut Rgba32FImage) -> Result<(), GpuError>,
    {
        let mut guard = self
            .inner
            .storage
            .write()
            .map_err(|_| GpuError::LockPoisoned)?;
        f(Arc::make_mut(&mut guard))
    }
}

impl PartialEq for Texture {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Texture {}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("width", &self.inner.geometry.width)
            .field("height", &self.inner.geometry.height)
            .finish()
    }
}
