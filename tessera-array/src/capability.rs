use std::sync::OnceLock;

/// Which storage-engine kernels this process is allowed to use.
///
/// Resolved once at first use. Constrained targets can force the portable
/// generic code paths with `TESSERA_COMPAT_KERNELS=generic`; those paths
/// produce the same results through logical scalars and are slower, so each
/// degraded call site emits one performance warning through [`log`].
#[derive(Debug, Clone, Copy)]
pub struct KernelCapabilities {
    /// Masked/indexed replacement via the engine's interleave kernel.
    pub masked_replace: bool,
    /// Null filtering via the engine's filter kernel.
    pub drop_nulls: bool,
    /// Distinct/codes via the engine's dictionary cast.
    pub dictionary_encode: bool,
}

impl KernelCapabilities {
    const ENGINE: Self = Self {
        masked_replace: true,
        drop_nulls: true,
        dictionary_encode: true,
    };

    const GENERIC: Self = Self {
        masked_replace: false,
        drop_nulls: false,
        dictionary_encode: false,
    };
}

pub fn kernel_capabilities() -> &'static KernelCapabilities {
    static CAPS: OnceLock<KernelCapabilities> = OnceLock::new();
    CAPS.get_or_init(|| {
        match std::env::var("TESSERA_COMPAT_KERNELS").as_deref() {
            Ok("generic") => KernelCapabilities::GENERIC,
            _ => KernelCapabilities::ENGINE,
        }
    })
}

/// One warning per degraded call, mirroring the engine-version fallback
/// policy: substitute capability, never fail.
pub(crate) fn fallback_warning(op: &str) {
    log::warn!("{op}: engine kernel unavailable, falling back to a generic implementation");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_capabilities_are_the_default() {
        let caps = kernel_capabilities();
        assert!(caps.masked_replace);
        assert!(caps.drop_nulls);
        assert!(caps.dictionary_encode);
    }
}
