//! Model container management for Stoic
//!
//! This crate provides functionality for working with the containers
//! installed under the models root: enumerating them, scaffolding new ones
//! from the template archive, and preparing their scripts for execution.

pub mod inventory;
pub mod scaffold;
pub mod executables;

// Re-export commonly used types
pub use inventory::ContainerInventory;
pub use scaffold::ContainerScaffolder;
pub use executables::mark_executable;
