//! Harness for dispatching data-parallel numeric kernels onto a selectable
//! compute device.
//!
//! The pipeline: enumerate devices and validate an externally supplied
//! selection index, bind one device plus one in-order queue, stage host
//! arrays into device buffers, launch kernels over a 1–3 dimensional index
//! space with optional work-group tiling, copy results back, and verify them
//! against a host-computed reference within a floating-point tolerance.
//!
//! The crate does no file I/O and no report formatting; it consumes kernel
//! source text and exposes per-iteration timings and correct/total counts to
//! its caller.

#[path = "../cpu/mod.rs"]
pub mod cpu;

pub mod arena;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod timing;
pub mod verify;

/// Element type moved between host and device.
pub type Scalar = f32;

pub use arena::{Access, BufferArena, BufferHandle};
pub use context::{Context, Pending};
pub use dispatch::{default_local, validate_workgroup, Arg, Extent, KernelEntry, ProgramModule};
pub use error::{DispatchError, Result};
pub use registry::{DeviceCaps, DeviceClass, DeviceDescriptor, DeviceRegistry};
pub use timing::{run_iterations, IterationRecord, RunConfig, POISON};
pub use verify::{verify, Mismatch, VerifyReport};
