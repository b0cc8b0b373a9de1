//! Kernel registry for resolving benchmarks at runtime.
//!
//! The registry maps `(benchmark id, backend id)` to the [`KernelSpec`]
//! describing how that benchmark is built and run on that backend. It is
//! populated once at startup, usually from an [`ExperimentManifest`].

use crate::manifest::{ExperimentManifest, KernelSpec};
use crate::{Error, Result};
use std::collections::BTreeMap;

/// Registration key: benchmark id and backend id.
pub type KernelKey = (String, String);

#[derive(Debug, Clone, Default)]
pub struct KernelRegistry {
    kernels: BTreeMap<KernelKey, KernelSpec>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from every kernel listed in a manifest.
    pub fn from_manifest(manifest: &ExperimentManifest) -> Result<Self> {
        let mut registry = Self::new();
        for kernel in &manifest.kernels {
            registry.register(kernel.clone())?;
        }
        Ok(registry)
    }

    /// Register a kernel. Registering the same key twice is an error.
    pub fn register(&mut self, kernel: KernelSpec) -> Result<()> {
        let key = (kernel.benchmark.clone(), kernel.backend.clone());
        if self.kernels.contains_key(&key) {
            return Err(Error::Other(format!(
                "Kernel '{}' is already registered for backend '{}'",
                key.0, key.1
            )));
        }
        self.kernels.insert(key, kernel);
        Ok(())
    }

    /// Find the kernel registered for a benchmark on a backend.
    pub fn find(&self, benchmark: &str, backend: &str) -> Result<&KernelSpec> {
        self.kernels
            .get(&(benchmark.to_string(), backend.to_string()))
            .ok_or_else(|| Error::UnknownKernel {
                benchmark: benchmark.to_string(),
                backend: backend.to_string(),
            })
    }

    /// Iterate over all registered kernels, ordered by key.
    pub fn iter(&self) -> impl Iterator<Item = &KernelSpec> {
        self.kernels.values()
    }

    /// Benchmark ids registered for a backend, in sorted order.
    pub fn benchmarks(&self, backend: &str) -> Vec<String> {
        self.kernels
            .keys()
            .filter(|(_, b)| b == backend)
            .map(|(benchmark, _)| benchmark.clone())
            .collect()
    }

    pub fn kernel_count(&self) -> usize {
        self.kernels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kernel(benchmark: &str, backend: &str) -> KernelSpec {
        KernelSpec::new(benchmark, vec![format!("./{}", benchmark)]).with_backend(backend)
    }

    #[test]
    fn test_find_by_benchmark_and_backend() {
        let manifest = ExperimentManifest::new("demo")
            .with_kernel(kernel("gemm", "command"))
            .with_kernel(kernel("gemm", "likwid"))
            .with_kernel(kernel("atax", "command"));
        let registry = KernelRegistry::from_manifest(&manifest).unwrap();

        assert_eq!(registry.kernel_count(), 3);
        assert_eq!(registry.find("gemm", "likwid").unwrap().backend, "likwid");
        assert_eq!(registry.benchmarks("command"), vec!["atax", "gemm"]);
    }

    #[test]
    fn test_unknown_kernel_is_reported() {
        let registry = KernelRegistry::new();
        match registry.find("lu", "command") {
            Err(Error::UnknownKernel { benchmark, backend }) => {
                assert_eq!(benchmark, "lu");
                assert_eq!(backend, "command");
            }
            other => panic!("Expected UnknownKernel, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = KernelRegistry::new();
        registry.register(kernel("lu", "command")).unwrap();
        assert!(registry.register(kernel("lu", "command")).is_err());
    }
}
