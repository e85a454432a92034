//! Name → built-in lookup table.

use std::collections::HashMap;

use super::traits::Builtin;

/// Registry of built-in commands, consulted once per single-stage
/// pipeline stage.
#[derive(Default)]
pub struct BuiltinRegistry {
    builtins: HashMap<String, Box<dyn Builtin>>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a built-in under its own name. A later registration with
    /// the same name replaces the earlier one.
    pub fn register(&mut self, builtin: Box<dyn Builtin>) {
        self.builtins.insert(builtin.name().to_string(), builtin);
    }

    /// Look up a built-in by command name.
    pub fn get(&self, name: &str) -> Option<&dyn Builtin> {
        self.builtins.get(name).map(|builtin| &**builtin)
    }

    /// Registered names, for diagnostics.
    pub fn names(&self) -> Vec<&str> {
        self.builtins.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::traits::BuiltinError;

    struct Probe;

    impl Builtin for Probe {
        fn name(&self) -> &str {
            "probe"
        }

        fn run(&self, _argv: &[String]) -> Result<(), BuiltinError> {
            Ok(())
        }
    }

    #[test]
    fn lookup_by_name() {
        let mut registry = BuiltinRegistry::new();
        registry.register(Box::new(Probe));
        assert!(registry.get("probe").is_some());
        assert!(registry.get("missing").is_none());
    }
}
