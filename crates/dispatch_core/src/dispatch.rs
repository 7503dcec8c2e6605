//! Program building, entry-point binding, and index-space launches.

use std::fmt;

use pollster::block_on;
use tracing::debug;
use wgpu::util::DeviceExt;

use crate::arena::{BufferArena, BufferHandle};
use crate::context::{Context, Pending};
use crate::error::{DispatchError, Result};
use crate::registry::DeviceCaps;

/// A 1–3 dimensional index-space shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    dims: [u32; 3],
    rank: usize,
}

impl Extent {
    pub fn d1(x: u32) -> Self {
        Self { dims: [x, 1, 1], rank: 1 }
    }

    pub fn d2(x: u32, y: u32) -> Self {
        Self { dims: [x, y, 1], rank: 2 }
    }

    pub fn d3(x: u32, y: u32, z: u32) -> Self {
        Self { dims: [x, y, z], rank: 3 }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Shape with unused trailing dimensions pinned to 1.
    pub fn dims(&self) -> [u32; 3] {
        self.dims
    }

    /// Total number of work items described by this extent.
    pub fn invocations(&self) -> u64 {
        self.dims.iter().map(|&d| d as u64).product()
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rank {
            1 => write!(f, "({})", self.dims[0]),
            2 => write!(f, "({}, {})", self.dims[0], self.dims[1]),
            _ => write!(f, "({}, {}, {})", self.dims[0], self.dims[1], self.dims[2]),
        }
    }
}

/// One kernel argument, bound strictly in declaration order.
///
/// Scalars are bound as small uniform payloads; buffers must belong to the
/// arena passed to the launch.
#[derive(Debug, Clone, Copy)]
pub enum Arg {
    Buffer(BufferHandle),
    Int(i32),
    Uint(u32),
    Float(f32),
}

/// A compiled program, immutable after build and shared by every launch in
/// the owning context.
pub struct ProgramModule {
    module: wgpu::ShaderModule,
}

impl ProgramModule {
    /// Compile kernel source text for the context's device.
    ///
    /// Compilation failure is fatal; the diagnostics are carried verbatim in
    /// the error.
    pub fn build(context: &Context, source: &str) -> Result<Self> {
        context.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = context.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("dispatch_program"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if let Some(err) = block_on(context.device.pop_error_scope()) {
            return Err(DispatchError::Build { diagnostics: err.to_string() });
        }
        Ok(Self { module })
    }

    /// Bind a named entry point of this module.
    pub fn entry(&self, context: &Context, name: &str) -> Result<KernelEntry> {
        context.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = context.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(name),
            layout: None,
            module: &self.module,
            entry_point: Some(name),
            compilation_options: Default::default(),
            cache: None,
        });
        if let Some(err) = block_on(context.device.pop_error_scope()) {
            return Err(DispatchError::EntryNotFound {
                name: name.to_owned(),
                diagnostics: err.to_string(),
            });
        }
        Ok(KernelEntry { pipeline, name: name.to_owned() })
    }
}

/// A bound kernel entry point, ready to launch over an index space.
pub struct KernelEntry {
    pipeline: wgpu::ComputePipeline,
    name: String,
}

impl KernelEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue one launch over `global`, tiled by `local`.
    ///
    /// A supplied local extent must evenly divide the global extent per
    /// dimension and respect the device capability block, or the launch fails
    /// before anything is enqueued. When omitted, an implementation-chosen
    /// tiling applies (64 for 1-D, 16×16 for 2-D, 4×4×4 for 3-D — the group
    /// sizes declared by the bundled kernels) and the group count is rounded
    /// up, relying on the kernels' own bounds guard for the padding items.
    /// A kernel's `@workgroup_size` is fixed in its source; a supplied local
    /// extent names that tiling so group counts can be derived from it, and
    /// one that disagrees with the kernel's declaration is a caller error.
    ///
    /// Arguments are bound in order as bindings `0..n` of group 0; a mismatch
    /// against the kernel's declared interface fails the launch. The call
    /// returns as soon as the work is submitted — completion is observed only
    /// through the returned [`Pending`] token or [`Context::finish`].
    pub fn launch(
        &self,
        context: &Context,
        arena: &BufferArena,
        global: Extent,
        local: Option<Extent>,
        args: &[Arg],
    ) -> Result<Pending> {
        let local = match local {
            Some(local) => {
                validate_workgroup(global, local, context.caps())?;
                local
            }
            None => {
                let local = default_local(global.rank());
                check_local_caps(local, context.caps())?;
                local
            }
        };

        // Bind in declared order; scalars become 16-byte uniform payloads,
        // created up front so the bind entries below can borrow them.
        enum Bound<'a> {
            Arena(&'a wgpu::Buffer),
            Scalar(wgpu::Buffer),
        }

        let mut bound = Vec::with_capacity(args.len());
        for arg in args {
            bound.push(match arg {
                Arg::Buffer(handle) => Bound::Arena(arena.raw(*handle)?),
                Arg::Int(v) => Bound::Scalar(scalar_uniform(context, *v as u32)),
                Arg::Uint(v) => Bound::Scalar(scalar_uniform(context, *v)),
                Arg::Float(v) => Bound::Scalar(scalar_uniform(context, v.to_bits())),
            });
        }

        let entries: Vec<wgpu::BindGroupEntry> = bound
            .iter()
            .enumerate()
            .map(|(i, slot)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: match slot {
                    Bound::Arena(buffer) => buffer.as_entire_binding(),
                    Bound::Scalar(buffer) => buffer.as_entire_binding(),
                },
            })
            .collect();

        context.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let bind_group = if entries.is_empty() {
            None
        } else {
            let layout = self.pipeline.get_bind_group_layout(0);
            Some(context.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("LaunchArgs"),
                layout: &layout,
                entries: &entries,
            }))
        };

        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Launch") });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor::default());
            pass.set_pipeline(&self.pipeline);
            if let Some(ref bind_group) = bind_group {
                pass.set_bind_group(0, bind_group, &[]);
            }
            let g = global.dims();
            let l = local.dims();
            pass.dispatch_workgroups(
                g[0].div_ceil(l[0]),
                g[1].div_ceil(l[1]),
                g[2].div_ceil(l[2]),
            );
        }
        let submission = context.queue.submit(Some(encoder.finish()));

        if let Some(err) = block_on(context.device.pop_error_scope()) {
            return Err(DispatchError::DeviceRuntime {
                reason: format!("launch of `{}` failed: {err}", self.name),
            });
        }

        debug!("launched `{}` over global {global}, local {local}", self.name);
        Ok(Pending { submission })
    }
}

/// Default tiling used when the caller supplies no local extent.
pub fn default_local(rank: usize) -> Extent {
    match rank {
        1 => Extent::d1(64),
        2 => Extent::d2(16, 16),
        _ => Extent::d3(4, 4, 4),
    }
}

/// Check a caller-supplied work-group tiling against a global extent and the
/// device capability block.
///
/// Runs entirely on the host; a failed launch never reaches the queue.
pub fn validate_workgroup(global: Extent, local: Extent, caps: &DeviceCaps) -> Result<()> {
    if local.rank() != global.rank() {
        return Err(DispatchError::InvalidWorkGroupSize {
            reason: format!("local extent {local} has different rank than global extent {global}"),
        });
    }

    check_local_caps(local, caps)?;

    let g = global.dims();
    let l = local.dims();
    for dim in 0..global.rank() {
        if g[dim] % l[dim] != 0 {
            return Err(DispatchError::InvalidWorkGroupSize {
                reason: format!(
                    "local extent {local} does not evenly divide global extent {global}"
                ),
            });
        }
    }

    Ok(())
}

fn check_local_caps(local: Extent, caps: &DeviceCaps) -> Result<()> {
    let l = local.dims();
    for dim in 0..local.rank() {
        if l[dim] == 0 {
            return Err(DispatchError::InvalidWorkGroupSize {
                reason: format!("local extent {local} has a zero dimension"),
            });
        }
        if l[dim] > caps.max_workgroup_size[dim] {
            return Err(DispatchError::InvalidWorkGroupSize {
                reason: format!(
                    "local extent {local} exceeds device maximum {} in dimension {dim}",
                    caps.max_workgroup_size[dim]
                ),
            });
        }
    }

    let invocations = local.invocations();
    if invocations > caps.max_invocations_per_workgroup as u64 {
        return Err(DispatchError::InvalidWorkGroupSize {
            reason: format!(
                "{invocations} invocations per group exceed the device limit of {}",
                caps.max_invocations_per_workgroup
            ),
        });
    }

    Ok(())
}

/// 16-byte uniform payload carrying one scalar argument in its first word.
fn scalar_uniform(context: &Context, word: u32) -> wgpu::Buffer {
    let words = [word, 0, 0, 0];
    context.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("ScalarArg"),
        contents: bytemuck::cast_slice(&words),
        usage: wgpu::BufferUsages::UNIFORM,
    })
}
