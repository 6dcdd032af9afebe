//! Lazily materialized host/device arrays.
//!
//! Every per-element array a structure or quantity renders from (positions,
//! normals, areas, scalar values, colors, ...) is a [`ManagedBuffer`]. It is in
//! exactly one of three states:
//!
//! - **Unmaterialized**: no host array. A render buffer may still be allocated
//!   from an earlier materialization and is refilled on the next one.
//! - **Host**: the host array is authoritative; a render buffer is optional and
//!   kept in sync with it.
//! - **Device**: the render buffer was written out of band and is the only
//!   source of truth. The host array is gone and reads go through the buffer.

use std::borrow::Cow;
use std::rc::Rc;

use geoscope_render::{AttributeBuffer, BufferElement, Engine, RedrawRequest, RenderError};

use crate::error::{GeoscopeError, Result};

/// Observable state of a [`ManagedBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Residency {
    Unmaterialized,
    Host,
    Device,
}

enum Storage<T> {
    Unmaterialized {
        buffer: Option<Rc<dyn AttributeBuffer>>,
    },
    Host {
        data: Vec<T>,
        buffer: Option<Rc<dyn AttributeBuffer>>,
    },
    Device {
        buffer: Rc<dyn AttributeBuffer>,
    },
}

impl<T> Storage<T> {
    fn buffer(&self) -> Option<&Rc<dyn AttributeBuffer>> {
        match self {
            Self::Unmaterialized { buffer } | Self::Host { buffer, .. } => buffer.as_ref(),
            Self::Device { buffer } => Some(buffer),
        }
    }
}

/// A named array with a lazily allocated, shared render buffer.
pub struct ManagedBuffer<T: BufferElement> {
    name: String,
    storage: Storage<T>,
    redraw: Option<RedrawRequest>,
}

impl<T: BufferElement> ManagedBuffer<T> {
    /// An unmaterialized buffer, filled on demand by [`Self::ensure_host_data`].
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            storage: Storage::Unmaterialized { buffer: None },
            redraw: None,
        }
    }

    /// A buffer that starts out host-resident.
    pub fn with_data(name: impl Into<String>, data: Vec<T>) -> Self {
        Self {
            name: name.into(),
            storage: Storage::Host { data, buffer: None },
            redraw: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn residency(&self) -> Residency {
        match self.storage {
            Storage::Unmaterialized { .. } => Residency::Unmaterialized,
            Storage::Host { .. } => Residency::Host,
            Storage::Device { .. } => Residency::Device,
        }
    }

    pub fn has_render_buffer(&self) -> bool {
        self.storage.buffer().is_some()
    }

    /// The render buffer if one has been allocated, without materializing anything.
    pub fn allocated_render_buffer(&self) -> Option<Rc<dyn AttributeBuffer>> {
        self.storage.buffer().cloned()
    }

    /// Makes sure the value is available, computing it if unmaterialized.
    ///
    /// Host and device resident buffers are left alone. When a render buffer
    /// survives from an earlier materialization the new data is pushed into it.
    pub fn ensure_host_data(&mut self, compute: impl FnOnce() -> Result<Vec<T>>) -> Result<()> {
        let Storage::Unmaterialized { buffer } = &self.storage else {
            return Ok(());
        };
        let data = compute()?;
        let buffer = buffer.clone();
        if let Some(buffer) = &buffer {
            log::debug!("refilling render buffer '{}' ({} elements)", self.name, data.len());
            buffer.set_data(&data)?;
            self.request_redraw();
        }
        self.storage = Storage::Host { data, buffer };
        Ok(())
    }

    /// The host array; empty unless host-resident.
    pub fn host_data(&self) -> &[T] {
        match &self.storage {
            Storage::Host { data, .. } => data,
            _ => &[],
        }
    }

    /// The host array, or an error naming this buffer if it is not host-resident.
    pub fn require_host_data(&self) -> Result<&[T]> {
        match &self.storage {
            Storage::Host { data, .. } => Ok(data),
            Storage::Device { .. } => Err(GeoscopeError::HostDataUnavailable(self.name.clone())),
            Storage::Unmaterialized { .. } => Err(GeoscopeError::internal(format!(
                "'{}' read before it was materialized",
                self.name
            ))),
        }
    }

    /// The whole array, read back from the render buffer when device-resident.
    pub fn data(&self) -> Result<Cow<'_, [T]>> {
        match &self.storage {
            Storage::Host { data, .. } => Ok(Cow::Borrowed(data)),
            Storage::Device { buffer } => Ok(Cow::Owned(buffer.get_data::<T>()?)),
            Storage::Unmaterialized { .. } => Err(GeoscopeError::internal(format!(
                "'{}' read before it was materialized",
                self.name
            ))),
        }
    }

    /// Returns the shared render buffer, allocating and filling it on first use.
    ///
    /// Repeated calls return the same handle without uploading again.
    pub fn render_buffer(&mut self, engine: &dyn Engine) -> Result<Rc<dyn AttributeBuffer>> {
        if self.redraw.is_none() {
            self.redraw = Some(engine.redraw_request().clone());
        }
        match &mut self.storage {
            Storage::Host {
                buffer: Some(buffer),
                ..
            }
            | Storage::Device { buffer } => Ok(buffer.clone()),
            Storage::Host { data, buffer } => {
                let created = engine.generate_attribute_buffer(T::DATA_TYPE, T::ARRAY_COUNT);
                created.set_data(data)?;
                log::debug!(
                    "allocated render buffer '{}' ({} elements)",
                    self.name,
                    data.len()
                );
                *buffer = Some(created.clone());
                Ok(created)
            }
            Storage::Unmaterialized { .. } => Err(GeoscopeError::internal(format!(
                "render buffer for '{}' requested before its data was materialized",
                self.name
            ))),
        }
    }

    /// Replaces the contents after checking the element count.
    ///
    /// On error nothing changes. An allocated render buffer receives the new
    /// data and a redraw is requested.
    pub fn update_data(&mut self, data: Vec<T>, expected: usize) -> Result<()> {
        if data.len() != expected {
            return Err(GeoscopeError::SizeMismatch {
                name: self.name.clone(),
                expected,
                actual: data.len(),
            });
        }
        let buffer = self.storage.buffer().cloned();
        if let Some(buffer) = &buffer {
            buffer.set_data(&data)?;
            self.request_redraw();
        }
        self.storage = Storage::Host { data, buffer };
        Ok(())
    }

    /// Records that the render buffer was written directly on the device.
    ///
    /// The host copy is dropped rather than read back; the buffer becomes the
    /// only source of truth.
    pub fn mark_externally_updated(&mut self) -> Result<()> {
        let buffer = self
            .storage
            .buffer()
            .cloned()
            .ok_or_else(|| GeoscopeError::RenderBufferNotAllocated(self.name.clone()))?;
        self.storage = Storage::Device { buffer };
        self.request_redraw();
        Ok(())
    }

    /// Drops the host value so the next [`Self::ensure_host_data`] recomputes it.
    pub fn invalidate(&mut self) {
        let buffer = self.storage.buffer().cloned();
        self.storage = Storage::Unmaterialized { buffer };
    }

    /// Number of elements, read from the render buffer when device-resident.
    pub fn size(&self) -> Result<usize> {
        match &self.storage {
            Storage::Host { data, .. } => Ok(data.len()),
            Storage::Device { buffer } => Ok(buffer.data_size()),
            Storage::Unmaterialized { .. } => Err(GeoscopeError::internal(format!(
                "size of '{}' queried with neither host data nor a render buffer",
                self.name
            ))),
        }
    }

    /// Reads one element, issuing a device readback when device-resident.
    pub fn get_value(&self, index: usize) -> Result<T> {
        match &self.storage {
            Storage::Host { data, .. } => data.get(index).copied().ok_or_else(|| {
                RenderError::IndexOutOfRange {
                    name: self.name.clone(),
                    index,
                    len: data.len(),
                }
                .into()
            }),
            Storage::Device { buffer } => Ok(buffer.get_value(index)?),
            Storage::Unmaterialized { .. } => Err(GeoscopeError::internal(format!(
                "value of '{}' read before it was materialized",
                self.name
            ))),
        }
    }

    fn request_redraw(&self) {
        if let Some(redraw) = &self.redraw {
            redraw.request();
        }
    }
}

impl<T: BufferElement> std::fmt::Debug for ManagedBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedBuffer")
            .field("name", &self.name)
            .field("residency", &self.residency())
            .field("has_render_buffer", &self.has_render_buffer())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoscope_render::HeadlessEngine;
    use glam::Vec3;
    use proptest::prelude::*;

    /// Test that the render buffer is allocated once and reused.
    #[test]
    fn test_render_buffer_is_cached() {
        let engine = HeadlessEngine::new();
        let mut values = ManagedBuffer::with_data("values", vec![1.0_f32, 2.0, 3.0]);

        let first = values.render_buffer(&engine).unwrap();
        let second = values.render_buffer(&engine).unwrap();

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.upload_count(), 1);
    }

    /// Test that updates flow into an existing render buffer.
    #[test]
    fn test_update_pushes_to_render_buffer() {
        let engine = HeadlessEngine::new();
        let mut values = ManagedBuffer::with_data("values", vec![1.0_f32, 2.0]);
        let buffer = values.render_buffer(&engine).unwrap();
        engine.redraw_request().take();

        values.update_data(vec![5.0, 6.0], 2).unwrap();

        assert_eq!(buffer.get_data::<f32>().unwrap(), vec![5.0, 6.0]);
        assert_eq!(values.get_value(1).unwrap(), 6.0);
        assert!(engine.redraw_request().is_requested());
    }

    /// Test that a wrong-sized update leaves everything untouched.
    #[test]
    fn test_update_size_mismatch_is_atomic() {
        let engine = HeadlessEngine::new();
        let mut values = ManagedBuffer::with_data("values", vec![1.0_f32, 2.0]);
        let buffer = values.render_buffer(&engine).unwrap();

        let err = values.update_data(vec![9.0; 3], 2).unwrap_err();

        assert!(matches!(
            err,
            GeoscopeError::SizeMismatch {
                expected: 2,
                actual: 3,
                ..
            }
        ));
        assert_eq!(values.host_data(), &[1.0, 2.0]);
        assert_eq!(buffer.upload_count(), 1);
    }

    /// Test the device-resident transition.
    #[test]
    fn test_externally_updated_routes_through_buffer() {
        let engine = HeadlessEngine::new();
        let mut positions = ManagedBuffer::with_data("positions", vec![Vec3::ZERO; 4]);
        let buffer = positions.render_buffer(&engine).unwrap();
        buffer.set_data(&[Vec3::X, Vec3::Y, Vec3::Z, Vec3::ONE]).unwrap();

        positions.mark_externally_updated().unwrap();

        assert_eq!(positions.residency(), Residency::Device);
        assert!(positions.host_data().is_empty());
        assert_eq!(positions.size().unwrap(), 4);
        assert_eq!(positions.get_value(2).unwrap(), Vec3::Z);
        assert!(matches!(
            positions.require_host_data(),
            Err(GeoscopeError::HostDataUnavailable(_))
        ));
    }

    /// Test that whole-array reads follow the buffer once device-resident.
    #[test]
    fn test_data_reads_back_device_buffer() {
        let engine = HeadlessEngine::new();
        let mut values = ManagedBuffer::with_data("values", vec![1.0_f32, 2.0]);
        assert!(matches!(values.data().unwrap(), Cow::Borrowed(_)));

        let buffer = values.render_buffer(&engine).unwrap();
        buffer.set_data(&[7.0_f32, 8.0]).unwrap();
        values.mark_externally_updated().unwrap();

        assert_eq!(values.data().unwrap().as_ref(), &[7.0, 8.0]);
        let unmaterialized: ManagedBuffer<f32> = ManagedBuffer::new("empty");
        assert!(unmaterialized.data().unwrap_err().is_fatal());
    }

    /// Test that marking without a render buffer is rejected.
    #[test]
    fn test_externally_updated_requires_buffer() {
        let mut values = ManagedBuffer::with_data("values", vec![1.0_f32]);
        assert!(matches!(
            values.mark_externally_updated(),
            Err(GeoscopeError::RenderBufferNotAllocated(_))
        ));
        assert_eq!(values.residency(), Residency::Host);
    }

    /// Test that querying an unmaterialized buffer is an internal error.
    #[test]
    fn test_unmaterialized_queries_are_fatal() {
        let engine = HeadlessEngine::new();
        let mut values: ManagedBuffer<f32> = ManagedBuffer::new("values");
        assert!(values.size().unwrap_err().is_fatal());
        assert!(values.get_value(0).unwrap_err().is_fatal());
        assert!(values.render_buffer(&engine).err().unwrap().is_fatal());
    }

    /// Test lazy computation and refill after invalidation.
    #[test]
    fn test_ensure_host_data_refills_after_invalidate() {
        let engine = HeadlessEngine::new();
        let mut values: ManagedBuffer<f32> = ManagedBuffer::new("areas");
        values.ensure_host_data(|| Ok(vec![1.0, 2.0])).unwrap();
        // Already materialized: the closure must not run.
        values
            .ensure_host_data(|| panic!("recomputed a materialized value"))
            .unwrap();
        let buffer = values.render_buffer(&engine).unwrap();

        values.invalidate();
        assert_eq!(values.residency(), Residency::Unmaterialized);
        assert!(values.has_render_buffer());
        values.ensure_host_data(|| Ok(vec![3.0, 4.0])).unwrap();

        assert_eq!(buffer.get_data::<f32>().unwrap(), vec![3.0, 4.0]);
        assert!(Rc::ptr_eq(&buffer, &values.render_buffer(&engine).unwrap()));
    }

    proptest! {
        /// Test that the last of a sequence of same-sized updates wins.
        #[test]
        fn test_last_update_wins(
            updates in prop::collection::vec(prop::collection::vec(-1e3f32..1e3, 5), 1..6)
        ) {
            let engine = HeadlessEngine::new();
            let mut values = ManagedBuffer::with_data("values", vec![0.0_f32; 5]);
            let buffer = values.render_buffer(&engine).unwrap();
            for update in &updates {
                values.update_data(update.clone(), 5).unwrap();
            }
            let last = updates.last().unwrap();
            prop_assert_eq!(&buffer.get_data::<f32>().unwrap(), last);
            prop_assert_eq!(values.host_data(), last.as_slice());
            prop_assert!(Rc::ptr_eq(&buffer, &values.render_buffer(&engine).unwrap()));
        }
    }
}
