//! Centralized storage for the bundled WGSL kernel sources.
//!
//! The harness consumes kernel text as opaque strings; these constants are
//! the fallback used when no on-disk kernel directory is supplied.

pub mod compute {
    /// Elementwise `c = a + b`; entry point `vadd`, 64-wide 1-D groups.
    pub const VADD: &str = include_str!("kernels/vadd.wgsl");
    /// Fused `r = a + b + c`; entry point `vadd3`, 64-wide 1-D groups.
    pub const VADD3: &str = include_str!("kernels/vadd3.wgsl");
    /// Naive `C = A * B`; entry point `mmul`, 16x16 2-D groups.
    pub const MMUL: &str = include_str!("kernels/mmul.wgsl");
}

#[cfg(test)]
mod tests {
    use super::*;
    use naga::valid::{Capabilities, ValidationFlags, Validator};

    fn validate_wgsl(label: &str, source: &str) {
        let module =
            naga::front::wgsl::parse_str(source).unwrap_or_else(|err| panic!("{label}: {err:?}"));
        let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
        validator
            .validate(&module)
            .unwrap_or_else(|err| panic!("{label}: {err:?}"));
    }

    #[test]
    fn compute_shaders_validate() {
        validate_wgsl("vadd", compute::VADD);
        validate_wgsl("vadd3", compute::VADD3);
        validate_wgsl("mmul", compute::MMUL);
    }

    #[test]
    fn entry_points_match_the_dispatch_contract() {
        for (source, entry) in [
            (compute::VADD, "fn vadd("),
            (compute::VADD3, "fn vadd3("),
            (compute::MMUL, "fn mmul("),
        ] {
            assert!(source.contains(entry), "missing entry point `{entry}`");
        }
    }
}
