//! The built-in commands themselves, one per file.

mod cd;
mod exit;
mod lcd;
mod lecho;
mod lkill;
mod lls;

use super::registry::BuiltinRegistry;

pub use cd::Cd;
pub use exit::Exit;
pub use lcd::Lcd;
pub use lecho::Lecho;
pub use lkill::Lkill;
pub use lls::Lls;

/// Register every built-in into the given registry.
pub fn register_builtins(registry: &mut BuiltinRegistry) {
    registry.register(Box::new(Exit));
    registry.register(Box::new(Lecho));
    registry.register(Box::new(Cd));
    registry.register(Box::new(Lcd));
    registry.register(Box::new(Lkill));
    registry.register(Box::new(Lls));
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Mutex, MutexGuard};

    use super::super::registry::BuiltinRegistry;
    use super::register_builtins;

    /// The working directory is process-global; tests that change or read
    /// it serialize here.
    static CWD_LOCK: Mutex<()> = Mutex::new(());

    pub(crate) fn cwd_lock() -> MutexGuard<'static, ()> {
        CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn all_builtins_are_registered() {
        let mut registry = BuiltinRegistry::new();
        register_builtins(&mut registry);
        for name in ["exit", "lecho", "cd", "lcd", "lkill", "lls"] {
            assert!(registry.get(name).is_some(), "missing builtin {name}");
        }
    }
}
