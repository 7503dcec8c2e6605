//! Device buffer arena: staging, allocation, and blocking copy-out.

use wgpu::util::DeviceExt;

use crate::context::{Context, Pending};
use crate::error::{DispatchError, Result};
use crate::Scalar;

/// Declared host/device access mode of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Staged input; immutable from the host after the initial copy-in.
    ReadOnly,
    /// Kernel output; contents are undefined until a kernel writes them.
    WriteOnly,
    /// Intermediate written and read by kernels.
    ReadWrite,
}

/// Index into a [`BufferArena`]. Cheap to copy, never outlives the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferHandle(pub(crate) usize);

struct Slot {
    buffer: wgpu::Buffer,
    len: usize,
    access: Access,
}

/// Arena of device buffers scoped to one execution context.
///
/// Buffers are addressed by handle and are never resized or individually
/// freed; the whole arena is torn down at once when the owning scope ends.
#[derive(Default)]
pub struct BufferArena {
    slots: Vec<Slot>,
}

impl BufferArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy a host array into a new read-only device buffer.
    pub fn stage_input(&mut self, context: &Context, data: &[Scalar]) -> Result<BufferHandle> {
        check_capacity(context, data.len())?;
        let buffer = context.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("StagedInput"),
            contents: bytemuck::cast_slice(data),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        });
        Ok(self.push(buffer, data.len(), Access::ReadOnly))
    }

    /// Allocate an uninitialized device buffer for kernel output or
    /// intermediate use.
    ///
    /// Retrieving it before a kernel has fully written it yields undefined
    /// values.
    pub fn allocate(
        &mut self,
        context: &Context,
        len: usize,
        access: Access,
    ) -> Result<BufferHandle> {
        if access == Access::ReadOnly {
            return Err(DispatchError::DeviceRuntime {
                reason: "read-only buffers are created by staging, not allocation".into(),
            });
        }
        check_capacity(context, len)?;
        let buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ArenaBuffer"),
            size: byte_len(len),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Ok(self.push(buffer, len, access))
    }

    /// Explicit host-to-device copy into an existing writable buffer.
    ///
    /// Used to reset outputs to a sentinel between iterations. Rejected for
    /// read-only buffers.
    pub fn write(&self, context: &Context, handle: BufferHandle, data: &[Scalar]) -> Result<()> {
        let slot = self.slot(handle)?;
        if slot.access == Access::ReadOnly {
            return Err(DispatchError::DeviceRuntime {
                reason: format!("buffer {handle:?} is read-only from the host"),
            });
        }
        if data.len() != slot.len {
            return Err(DispatchError::DeviceRuntime {
                reason: format!(
                    "write of {} elements into buffer of {} (buffers are never resized)",
                    data.len(),
                    slot.len
                ),
            });
        }
        context.queue.write_buffer(&slot.buffer, 0, bytemuck::cast_slice(data));
        Ok(())
    }

    /// Reset every element of a writable buffer to `value`.
    pub fn fill(&self, context: &Context, handle: BufferHandle, value: Scalar) -> Result<()> {
        let len = self.slot(handle)?.len;
        self.write(context, handle, &vec![value; len])
    }

    /// Blocking copy-out that consumes the producing launch's token.
    ///
    /// Waits for the submission behind `pending`, then copies `count`
    /// elements back to the host.
    pub fn retrieve(
        &self,
        context: &Context,
        handle: BufferHandle,
        count: usize,
        pending: Pending,
    ) -> Result<Vec<Scalar>> {
        pending.wait(context)?;
        self.retrieve_settled(context, handle, count)
    }

    /// Blocking copy-out with no synchronization of its own.
    ///
    /// The caller must guarantee that no device-side write to this buffer is
    /// outstanding — by having called [`Context::finish`], or because nothing
    /// was launched against it. Otherwise the copy races the kernel.
    pub fn retrieve_settled(
        &self,
        context: &Context,
        handle: BufferHandle,
        count: usize,
    ) -> Result<Vec<Scalar>> {
        let slot = self.slot(handle)?;
        if count > slot.len {
            return Err(DispatchError::DeviceRuntime {
                reason: format!("retrieve of {count} elements from buffer of {}", slot.len),
            });
        }

        let bytes = byte_len(count);
        let staging = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("RetrieveStaging"),
            size: bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Retrieve") });
        encoder.copy_buffer_to_buffer(&slot.buffer, 0, &staging, 0, bytes);
        context.queue.submit(Some(encoder.finish()));

        let buffer_slice = staging.slice(..);
        buffer_slice.map_async(wgpu::MapMode::Read, |_| {});
        let _ = context.device.poll(wgpu::MaintainBase::Wait);

        let data = buffer_slice.get_mapped_range();
        let out: Vec<Scalar> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging.unmap();

        Ok(out)
    }

    /// Element count of a buffer.
    pub fn len(&self, handle: BufferHandle) -> Result<usize> {
        Ok(self.slot(handle)?.len)
    }

    /// Declared access mode of a buffer.
    pub fn access(&self, handle: BufferHandle) -> Result<Access> {
        Ok(self.slot(handle)?.access)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn raw(&self, handle: BufferHandle) -> Result<&wgpu::Buffer> {
        Ok(&self.slot(handle)?.buffer)
    }

    fn push(&mut self, buffer: wgpu::Buffer, len: usize, access: Access) -> BufferHandle {
        self.slots.push(Slot { buffer, len, access });
        BufferHandle(self.slots.len() - 1)
    }

    fn slot(&self, handle: BufferHandle) -> Result<&Slot> {
        self.slots.get(handle.0).ok_or_else(|| DispatchError::DeviceRuntime {
            reason: format!("buffer {handle:?} does not belong to this arena"),
        })
    }
}

fn byte_len(count: usize) -> u64 {
    (count * std::mem::size_of::<Scalar>()) as u64
}

fn check_capacity(context: &Context, len: usize) -> Result<()> {
    if len == 0 {
        return Err(DispatchError::DeviceRuntime {
            reason: "device buffers must hold at least one element".into(),
        });
    }
    let bytes = byte_len(len);
    let max = context.caps().max_buffer_bytes;
    if bytes > max {
        return Err(DispatchError::DeviceRuntime {
            reason: format!("buffer of {bytes} bytes exceeds device maximum of {max}"),
        });
    }
    Ok(())
}
