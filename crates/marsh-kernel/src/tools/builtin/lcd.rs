//! lcd — change directory, silently.

use std::env;

use super::cd::target_dir;
use crate::tools::{Builtin, BuiltinError};

/// Quiet variant of `cd`: same behavior, no diagnostics of its own. The
/// caller's generic "Builtin lcd error." is all the user sees.
pub struct Lcd;

impl Builtin for Lcd {
    fn name(&self) -> &str {
        "lcd"
    }

    fn run(&self, argv: &[String]) -> Result<(), BuiltinError> {
        let path = target_dir(argv)?;
        env::set_current_dir(&path).map_err(|err| BuiltinError::Failed(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::tests::cwd_lock;

    #[test]
    fn lcd_changes_directory_quietly() {
        let _l = cwd_lock();
        let original = env::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();

        let argv = vec!["lcd".to_string(), dir.path().display().to_string()];
        Lcd.run(&argv).unwrap();

        env::set_current_dir(original).unwrap();
    }
}
