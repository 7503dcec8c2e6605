//! Device enumeration and index-based selection.

use std::fmt;

use tracing::debug;

use crate::error::{DispatchError, Result};

/// Broad device classification reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    /// Dedicated graphics card.
    DiscreteGpu,
    /// GPU sharing memory with the CPU.
    IntegratedGpu,
    /// Software rasterizer or other CPU-backed implementation.
    Cpu,
    /// GPU exposed through a virtual machine.
    VirtualGpu,
    /// Anything the backend could not classify.
    Other,
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DiscreteGpu => write!(f, "discrete GPU"),
            Self::IntegratedGpu => write!(f, "integrated GPU"),
            Self::Cpu => write!(f, "CPU"),
            Self::VirtualGpu => write!(f, "virtual GPU"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Compute-relevant capability block extracted from an adapter's limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCaps {
    /// Maximum work-group size per dimension.
    pub max_workgroup_size: [u32; 3],
    /// Maximum total invocations in a single work group.
    pub max_invocations_per_workgroup: u32,
    /// Bytes of fast per-group shared storage available to one work group.
    pub workgroup_storage_bytes: u32,
    /// Maximum size of a single device buffer in bytes.
    pub max_buffer_bytes: u64,
    /// Maximum number of storage buffers bindable by one kernel.
    pub max_storage_buffers: u32,
}

impl DeviceCaps {
    fn from_limits(limits: &wgpu::Limits) -> Self {
        Self {
            max_workgroup_size: [
                limits.max_compute_workgroup_size_x,
                limits.max_compute_workgroup_size_y,
                limits.max_compute_workgroup_size_z,
            ],
            max_invocations_per_workgroup: limits.max_compute_invocations_per_workgroup,
            workgroup_storage_bytes: limits.max_compute_workgroup_storage_size,
            max_buffer_bytes: limits.max_buffer_size,
            max_storage_buffers: limits.max_storage_buffers_per_shader_stage,
        }
    }
}

/// One enumerated device: ordinal position, printable identity, capabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDescriptor {
    /// Position in the enumeration order for this process invocation.
    ///
    /// Enumeration order is stable within a single run but not across driver
    /// or platform versions; indices must not be hardcoded across machines.
    pub index: usize,
    /// Human-readable adapter name.
    pub name: String,
    /// Backend API the adapter is reached through.
    pub backend: String,
    /// Device classification.
    pub class: DeviceClass,
    /// Capability block for work-group and buffer validation.
    pub caps: DeviceCaps,
}

/// Ordered snapshot of every compute device visible to the process.
pub struct DeviceRegistry {
    adapters: Vec<wgpu::Adapter>,
    descriptors: Vec<DeviceDescriptor>,
}

impl DeviceRegistry {
    /// Enumerate all adapters across all available backends.
    ///
    /// The result may be empty; that is not an error until a selection is
    /// attempted. Enumeration queries capability metadata only.
    pub fn enumerate() -> Self {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapters = instance.enumerate_adapters(wgpu::Backends::all());
        let descriptors = adapters
            .iter()
            .enumerate()
            .map(|(index, adapter)| {
                let info = adapter.get_info();
                debug!(
                    "found adapter #{index}: {} ({:?} on {:?})",
                    info.name, info.device_type, info.backend
                );
                DeviceDescriptor {
                    index,
                    name: info.name.clone(),
                    backend: format!("{:?}", info.backend),
                    class: classify(info.device_type),
                    caps: DeviceCaps::from_limits(&adapter.limits()),
                }
            })
            .collect();

        Self { adapters, descriptors }
    }

    /// Number of enumerated devices.
    pub fn count(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// All enumerated descriptors, in enumeration order.
    pub fn descriptors(&self) -> &[DeviceDescriptor] {
        &self.descriptors
    }

    /// Validate an externally supplied index and return its descriptor.
    pub fn select(&self, index: usize) -> Result<&DeviceDescriptor> {
        self.descriptors.get(index).ok_or(DispatchError::IndexOutOfRange {
            index,
            count: self.descriptors.len(),
        })
    }

    /// Take ownership of the selected adapter and its descriptor.
    pub(crate) fn take(mut self, index: usize) -> Result<(wgpu::Adapter, DeviceDescriptor)> {
        let count = self.adapters.len();
        if index >= count {
            return Err(DispatchError::IndexOutOfRange { index, count });
        }
        Ok((self.adapters.swap_remove(index), self.descriptors.swap_remove(index)))
    }
}

fn classify(device_type: wgpu::DeviceType) -> DeviceClass {
    match device_type {
        wgpu::DeviceType::DiscreteGpu => DeviceClass::DiscreteGpu,
        wgpu::DeviceType::IntegratedGpu => DeviceClass::IntegratedGpu,
        wgpu::DeviceType::Cpu => DeviceClass::Cpu,
        wgpu::DeviceType::VirtualGpu => DeviceClass::VirtualGpu,
        wgpu::DeviceType::Other => DeviceClass::Other,
    }
}
