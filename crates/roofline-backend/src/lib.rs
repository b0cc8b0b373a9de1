//! Collaborator abstraction layer for the roofline toolchain.
//!
//! This crate defines the traits behind which the external collaborators
//! live (the compiler/optimizer, the instrumented kernel, the static cost
//! model and the counter compatibility checker) and provides the
//! subprocess-driven implementations used in production.

pub mod backend;
pub mod command;
pub mod papi;

pub use backend::{
    Backend, CompatibilityOracle, Compilation, CompiledKernel, CostModel, InputBindings,
    Invocation,
};
pub use command::{CommandBackend, CommandCostModel};
pub use papi::{PapiEventChooser, PapiTools};
