//! Execution context: one device, one in-order queue.

use pollster::block_on;
use tracing::info;

use crate::error::{DispatchError, Result};
use crate::registry::{DeviceCaps, DeviceDescriptor, DeviceRegistry};

/// The unit against which all buffers and kernel launches execute.
///
/// A context binds exactly one device and one command queue for the lifetime
/// of the run. Buffers and program modules created against one context are
/// never shared with another.
pub struct Context {
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    descriptor: DeviceDescriptor,
}

impl Context {
    /// Select `index` from the registry and bring up the logical device.
    ///
    /// Construction failure is fatal for the run; there is no retry and no
    /// fallback device.
    pub fn create(registry: DeviceRegistry, index: usize) -> Result<Self> {
        let (adapter, descriptor) = registry.take(index)?;

        // Request the adapter's own limits so capability validation matches
        // what the logical device will actually enforce.
        let (device, queue) = block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("dispatch_context"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            ..Default::default()
        }, None))
        .map_err(|e| DispatchError::DeviceRuntime {
            reason: format!("failed to create device `{}`: {e}", descriptor.name),
        })?;

        info!(
            "using device #{}: {} ({}, {})",
            descriptor.index, descriptor.name, descriptor.class, descriptor.backend
        );

        Ok(Self { device, queue, descriptor })
    }

    /// Descriptor of the bound device.
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    /// Capability block of the bound device.
    pub fn caps(&self) -> &DeviceCaps {
        &self.descriptor.caps
    }

    /// Block until every previously enqueued operation on the queue has
    /// completed.
    ///
    /// This is the sole full-queue synchronization primitive; absent a
    /// `finish` (or a consumed [`Pending`] token), submitted work remains
    /// asynchronous relative to host code.
    pub fn finish(&self) -> Result<()> {
        let _ = self.device.poll(wgpu::MaintainBase::Wait);
        Ok(())
    }
}

/// Proof token for one asynchronous kernel submission.
///
/// Returned by every launch; the launch is not observably complete until the
/// token is consumed, either by a retrieving copy-out or by [`Pending::wait`].
/// Dropping it unsynchronized is flagged by the compiler instead of racing
/// the copy-back silently.
#[must_use = "a launch is asynchronous; pass the token to BufferArena::retrieve or wait on it"]
#[derive(Debug)]
pub struct Pending {
    pub(crate) submission: wgpu::SubmissionIndex,
}

impl Pending {
    /// Block until exactly this submission has completed on the device.
    pub fn wait(self, context: &Context) -> Result<()> {
        let _ = context
            .device
            .poll(wgpu::MaintainBase::WaitForSubmissionIndex(self.submission));
        Ok(())
    }
}
