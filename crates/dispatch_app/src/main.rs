//! Command-line driver: device selection, kernel source loading, scenario
//! runs, and report printing. Everything the core library treats as an
//! external collaborator lives here.

use std::{env, fs, path::PathBuf};

use anyhow::{bail, Context as _, Result};
use dispatch_core::{
    cpu, run_iterations, verify, Access, Arg, BufferArena, Context, DeviceRegistry, Extent,
    IterationRecord, ProgramModule, RunConfig, Scalar,
};
use dispatch_shaders::compute;
use tracing::info;

struct CliOptions {
    device_index: usize,
    list: bool,
    length: usize,
    order: usize,
    seed: u64,
    kernel_dir: Option<PathBuf>,
    config: RunConfig,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let options = parse_options()?;
    let registry = DeviceRegistry::enumerate();

    if options.list {
        println!("{} devices:", registry.count());
        for descriptor in registry.descriptors() {
            println!(
                "  #{} {} ({}, {})",
                descriptor.index, descriptor.name, descriptor.class, descriptor.backend
            );
        }
        return Ok(());
    }

    let name = registry.select(options.device_index)?.name.clone();
    println!("\nUsing device: {name}");

    let context = Context::create(registry, options.device_index)?;
    let caps = context.caps();
    println!(
        "Work-group capability: {} invocations max, {} bytes shared storage per group",
        caps.max_invocations_per_workgroup, caps.workgroup_storage_bytes
    );

    run_vadd(&context, &options)?;
    run_vadd3(&context, &options)?;
    run_mmul(&context, &options)?;

    Ok(())
}

fn parse_options() -> Result<CliOptions> {
    let mut opts = CliOptions {
        device_index: 0,
        list: false,
        length: 1024,
        order: 256,
        seed: 0xA11CE,
        kernel_dir: None,
        config: RunConfig::default(),
    };

    for arg in env::args().skip(1) {
        if let Some(value) = arg.strip_prefix("--device=") {
            opts.device_index = value.parse().context("invalid --device value")?;
        } else if arg == "--list" {
            opts.list = true;
        } else if let Some(value) = arg.strip_prefix("--length=") {
            opts.length = value.parse().context("invalid --length value")?;
        } else if let Some(value) = arg.strip_prefix("--order=") {
            opts.order = value.parse().context("invalid --order value")?;
        } else if let Some(value) = arg.strip_prefix("--iterations=") {
            opts.config.iterations = value.parse().context("invalid --iterations value")?;
        } else if let Some(value) = arg.strip_prefix("--tolerance=") {
            opts.config.tolerance = value.parse().context("invalid --tolerance value")?;
        } else if let Some(value) = arg.strip_prefix("--seed=") {
            opts.seed = parse_seed(value).context("invalid --seed value")?;
        } else if let Some(value) = arg.strip_prefix("--kernel-dir=") {
            opts.kernel_dir = Some(PathBuf::from(value));
        } else {
            bail!("unrecognized argument: {arg} (try '--list')");
        }
    }

    Ok(opts)
}

/// Elementwise addition of two vectors, c = a + b.
fn run_vadd(context: &Context, options: &CliOptions) -> Result<()> {
    let length = options.length;
    println!("\n===== vadd: c = a + b, {length} elements =====");

    let h_a = cpu::random_vector(length, options.seed);
    let h_b = cpu::random_vector(length, options.seed ^ 0xDEAD_BEEF);
    let reference = cpu::vector_add(&h_a, &h_b);

    let mut arena = BufferArena::new();
    let d_a = arena.stage_input(context, &h_a)?;
    let d_b = arena.stage_input(context, &h_b)?;
    let d_c = arena.allocate(context, length, Access::WriteOnly)?;

    let source = load_kernel(options, "vadd.wgsl", compute::VADD)?;
    let module = ProgramModule::build(context, &source)?;
    let kernel = module.entry(context, "vadd")?;

    let count = length as u32;
    let records = run_iterations(options.config.iterations, |_| {
        arena.fill(context, d_c, options.config.sentinel)?;
        let pending = kernel.launch(
            context,
            &arena,
            Extent::d1(count),
            None,
            &[Arg::Buffer(d_a), Arg::Buffer(d_b), Arg::Buffer(d_c), Arg::Uint(count)],
        )?;
        let computed = arena.retrieve(context, d_c, length, pending)?;
        Ok(verify(&computed, &reference, options.config.tolerance))
    })?;

    report("vadd", &records)
}

/// The fused three-input sum and its chained two-launch equivalent.
fn run_vadd3(context: &Context, options: &CliOptions) -> Result<()> {
    let length = options.length;
    let count = length as u32;

    let h_a = cpu::random_vector(length, options.seed.wrapping_mul(3));
    let h_b = cpu::random_vector(length, options.seed.wrapping_mul(5));
    let h_c = cpu::random_vector(length, options.seed.wrapping_mul(7));
    let reference = cpu::vector_add3(&h_a, &h_b, &h_c);

    let mut arena = BufferArena::new();
    let d_a = arena.stage_input(context, &h_a)?;
    let d_b = arena.stage_input(context, &h_b)?;
    let d_c = arena.stage_input(context, &h_c)?;
    let d_tmp = arena.allocate(context, length, Access::ReadWrite)?;
    let d_r = arena.allocate(context, length, Access::WriteOnly)?;

    println!("\n===== vadd3 (fused): r = a + b + c, {length} elements =====");
    let fused_source = load_kernel(options, "vadd3.wgsl", compute::VADD3)?;
    let fused = ProgramModule::build(context, &fused_source)?.entry(context, "vadd3")?;

    let records = run_iterations(options.config.iterations, |_| {
        arena.fill(context, d_r, options.config.sentinel)?;
        let pending = fused.launch(
            context,
            &arena,
            Extent::d1(count),
            None,
            &[
                Arg::Buffer(d_a),
                Arg::Buffer(d_b),
                Arg::Buffer(d_c),
                Arg::Buffer(d_r),
                Arg::Uint(count),
            ],
        )?;
        let computed = arena.retrieve(context, d_r, length, pending)?;
        Ok(verify(&computed, &reference, options.config.tolerance))
    })?;
    report("vadd3 (fused)", &records)?;

    println!("\n===== vadd3 (chained): tmp = a + b, r = tmp + c =====");
    let vadd_source = load_kernel(options, "vadd.wgsl", compute::VADD)?;
    let vadd = ProgramModule::build(context, &vadd_source)?.entry(context, "vadd")?;

    let records = run_iterations(options.config.iterations, |_| {
        arena.fill(context, d_r, options.config.sentinel)?;
        let first = vadd.launch(
            context,
            &arena,
            Extent::d1(count),
            None,
            &[Arg::Buffer(d_a), Arg::Buffer(d_b), Arg::Buffer(d_tmp), Arg::Uint(count)],
        )?;
        first.wait(context)?;
        let second = vadd.launch(
            context,
            &arena,
            Extent::d1(count),
            None,
            &[Arg::Buffer(d_tmp), Arg::Buffer(d_c), Arg::Buffer(d_r), Arg::Uint(count)],
        )?;
        let computed = arena.retrieve(context, d_r, length, second)?;
        Ok(verify(&computed, &reference, options.config.tolerance))
    })?;
    report("vadd3 (chained)", &records)
}

/// Square matrix multiply: the sequential host pass first, then the device
/// pass over a 2-D index space.
fn run_mmul(context: &Context, options: &CliOptions) -> Result<()> {
    let order = options.order;
    let elements = order * order;

    let h_a = cpu::constant_matrix(order, cpu::AVAL);
    let h_b = cpu::constant_matrix(order, cpu::BVAL);
    // With constant operands every product element has the same closed form.
    let expected = vec![order as Scalar * cpu::AVAL * cpu::BVAL; elements];

    println!("\n===== sequential matrix mult on host CPU, order {order} =====");
    let records = run_iterations(options.config.iterations, |_| {
        let mut h_c = vec![0.0; elements];
        cpu::mat_mul_seq(order, &h_a, &h_b, &mut h_c);
        Ok(verify(&h_c, &expected, options.config.tolerance))
    })?;
    report("sequential mmul", &records)?;

    println!("\n===== device matrix mult, one dot product per work item, order {order} =====");
    let mut arena = BufferArena::new();
    let d_a = arena.stage_input(context, &h_a)?;
    let d_b = arena.stage_input(context, &h_b)?;
    let d_c = arena.allocate(context, elements, Access::WriteOnly)?;

    let source = load_kernel(options, "mmul.wgsl", compute::MMUL)?;
    let kernel = ProgramModule::build(context, &source)?.entry(context, "mmul")?;

    // Fixed 16x16 tile whenever the order allows an exact tiling; otherwise
    // the implementation-chosen default applies.
    let n = order as u32;
    let local = (order % 16 == 0).then(|| Extent::d2(16, 16));
    info!("mmul tiling: global ({n}, {n}), local {local:?}");

    let records = run_iterations(options.config.iterations, |_| {
        arena.fill(context, d_c, 0.0)?;
        let pending = kernel.launch(
            context,
            &arena,
            Extent::d2(n, n),
            local,
            &[Arg::Uint(n), Arg::Buffer(d_a), Arg::Buffer(d_b), Arg::Buffer(d_c)],
        )?;
        let computed = arena.retrieve(context, d_c, elements, pending)?;
        Ok(verify(&computed, &expected, options.config.tolerance))
    })?;
    report("device mmul", &records)
}

fn report(label: &str, records: &[IterationRecord]) -> Result<()> {
    let mut diverged = false;
    for (iteration, record) in records.iter().enumerate() {
        println!(
            "  pass {iteration}: ran in {:.6} seconds; {} out of {} results were correct",
            record.elapsed.as_secs_f64(),
            record.verify.correct,
            record.verify.total
        );
        for miss in record.verify.mismatches.iter().take(8) {
            println!(
                "    [{}] expected {}, got {} (error {:+.3e})",
                miss.index, miss.expected, miss.actual, miss.error
            );
        }
        if record.verify.mismatches.len() > 8 {
            println!("    ... and {} more", record.verify.mismatches.len() - 8);
        }
        diverged |= !record.verify.all_correct();
    }

    if diverged {
        bail!("{label} results diverged beyond tolerance");
    }
    Ok(())
}

/// Kernel sources come from disk when `--kernel-dir` is given, falling back
/// to the bundled copies.
fn load_kernel(options: &CliOptions, file_name: &str, bundled: &str) -> Result<String> {
    match &options.kernel_dir {
        Some(dir) => {
            let path = dir.join(file_name);
            fs::read_to_string(&path)
                .with_context(|| format!("failed to read kernel source {}", path.display()))
        }
        None => Ok(bundled.to_owned()),
    }
}

fn parse_seed(value: &str) -> Result<u64> {
    if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).context("expected hex literal")
    } else {
        value.parse().context("expected integer seed")
    }
}
