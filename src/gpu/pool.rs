use tracing::debug;

use crate::error::GpuError;
use crate::gpu::device::Device;
use crate::gpu::texture::{Geometry, Texture};

/// Fixed-size ring of equally-sized image buffers
///
/// Stages are chained by handing the buffer returned from [`next`](Self::next)
/// to the following stage as its input. The ring must hold at least as many
/// buffers as are simultaneously live in the chain it serves.
#[derive(Debug)]
pub struct ImageBufferPool {
    label: String,
    size: usize,
    buffers: Vec<Texture>,
    cursor: usize,
    geometry: Option<Geometry>,
    handed_out: bool,
}

impl ImageBufferPool {
    pub fn new(label: &str, size: usize) -> Self {
        Self {
            label: label.to_string(),
            size,
            buffers: Vec::new(),
            cursor: 0,
            geometry: None,
            handed_out: false,
        }
    }

    /// Make sure the pool holds `size` buffers of `geometry`.
    ///
    /// Returns `true` when the buffers were (re)allocated, which also resets
    /// the cursor. On failure the pool is left empty.
    pub fn ensure(&mut self, device: &dyn Device, geometry: Geometry) -> Result<bool, GpuError> {
        if self.geometry == Some(geometry) && self.buffers.len() == self.size {
            return Ok(false);
        }

        // Free the old set first so it does not count against device memory
        self.release();

        let buffers = (0..self.size)
            .map(|i| device.make_texture(geometry, &format!("{}[{}]", self.label, i)))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            pool = %self.label,
            size = self.size,
            width = geometry.width,
            height = geometry.height,
            "Allocated image buffer pool"
        );
        self.buffers = buffers;
        self.geometry = Some(geometry);
        Ok(true)
    }

    /// Buffer at the cursor; advances the cursor
    pub fn next(&mut self) -> Option<Texture> {
        let buffer = self.buffers.get(self.cursor)?.clone();
        self.cursor = (self.cursor + 1) % self.buffers.len();
        self.handed_out = true;
        Some(buffer)
    }

    /// Buffer most recently returned by [`next`](Self::next)
    pub fn last(&self) -> Option<&Texture> {
        if !self.handed_out || self.buffers.is_empty() {
            return None;
        }
        let index = if self.cursor == 0 {
            self.buffers.len() - 1
        } else {
            self.cursor - 1
        };
        self.buffers.get(index)
    }

    /// Drop all buffers and forget the geometry
    pub fn release(&mut self) {
        self.buffers.clear();
        self.geometry = None;
        self.cursor = 0;
        self.handed_out = false;
    }

    pub fn geometry(&self) -> Option<Geometry> {
        self.geometry
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Configured number of buffers
    pub fn capacity(&self) -> usize {
        self.size
    }

    pub fn buffers(&self) -> &[Texture] {
        &self.buffers
    }

    pub fn is_allocated(&self) -> bool {
        !self.buffers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::CpuDevice;

    #[test]
    fn test_pool_cycles_and_wraps() {
        let device = CpuDevice::new().unwrap();
        let mut pool = ImageBufferPool::new("test", 4);
        assert!(pool.next().is_none());

        assert!(pool.ensure(&device, Geometry::new(4, 4)).unwrap());
        assert!(pool.last().is_none());

        let handed: Vec<Texture> = (0..4).map(|_| pool.next().unwrap()).collect();
        assert_eq!(handed, pool.buffers().to_vec());
        assert_eq!(pool.last(), Some(&pool.buffers()[3]));

        let wrapped = pool.next().unwrap();
        assert_eq!(wrapped, pool.buffers()[0]);
        assert_eq!(pool.last(), Some(&pool.buffers()[0]));
    }

    #[test]
    fn test_pool_reallocates_on_geometry_change() {
        let device = CpuDevice::new().unwrap();
        let mut pool = ImageBufferPool::new("test", 3);

        assert!(pool.ensure(&device, Geometry::new(8, 8)).unwrap());
        let first = pool.next().unwrap();
        pool.next();
        assert_eq!(pool.cursor(), 2);

        assert!(!pool.ensure(&device, Geometry::new(8, 8)).unwrap());
        assert_eq!(pool.cursor(), 2);

        assert!(pool.ensure(&device, Geometry::new(16, 8)).unwrap());
        assert_eq!(pool.cursor(), 0);
        assert_eq!(pool.geometry(), Some(Geometry::new(16, 8)));
        assert_ne!(pool.next().unwrap(), first);
        assert_eq!(device.allocated_bytes(), Geometry::new(16, 8).byte_size() * 3);
    }

    #[test]
    fn test_pool_left_empty_when_allocation_fails() {
        let device = CpuDevice::new()
            .unwrap()
            .with_memory_budget(Geometry::new(4, 4).byte_size() * 2);
        let mut pool = ImageBufferPool::new("test", 3);

        assert!(pool.ensure(&device, Geometry::new(4, 4)).is_err());
        assert!(!pool.is_allocated());
        assert!(pool.geometry().is_none());
        assert_eq!(device.allocated_bytes(), 0);
    }
}
