//! Built-in command system for marsh.
//!
//! Built-ins are the handful of actions that must (or should) run inside
//! the shell's own process — `cd` has to change the shell's directory,
//! `exit` has to end the shell itself. They all implement the same
//! [`Builtin`] trait and are looked up by name in a [`BuiltinRegistry`].
//!
//! Dispatch policy lives in the pipeline runner: a built-in name only
//! runs in-process when its pipeline has exactly one stage; inside a
//! longer pipeline the same name goes through the external lookup.

mod builtin;
mod registry;
mod traits;

pub use builtin::register_builtins;
pub use registry::BuiltinRegistry;
pub use traits::{Builtin, BuiltinError};
