//! lls — list the current directory.

use std::io::Write;

use crate::tools::{Builtin, BuiltinError};

/// Listing builtin: prints the names in the current directory, one per
/// line, skipping dotfiles. Takes no arguments.
pub struct Lls;

impl Builtin for Lls {
    fn name(&self) -> &str {
        "lls"
    }

    fn run(&self, argv: &[String]) -> Result<(), BuiltinError> {
        if argv.len() != 1 {
            return Err(BuiltinError::Usage);
        }

        let entries =
            std::fs::read_dir(".").map_err(|err| BuiltinError::Failed(err.to_string()))?;
        let mut out = std::io::stdout().lock();
        for entry in entries {
            let entry = entry.map_err(|err| BuiltinError::Failed(err.to_string()))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with('.') {
                writeln!(out, "{name}").map_err(|err| BuiltinError::Failed(err.to_string()))?;
            }
        }
        out.flush().map_err(|err| BuiltinError::Failed(err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::tests::cwd_lock;

    #[test]
    fn lls_rejects_arguments() {
        assert!(matches!(
            Lls.run(&["lls".into(), "dir".into()]),
            Err(BuiltinError::Usage)
        ));
    }

    #[test]
    fn lls_runs_in_a_scratch_directory() {
        let _l = cwd_lock();
        let original = std::env::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("visible.txt"), b"x").unwrap();
        std::fs::write(dir.path().join(".hidden"), b"x").unwrap();

        std::env::set_current_dir(dir.path()).unwrap();
        let result = Lls.run(&["lls".to_string()]);
        std::env::set_current_dir(original).unwrap();
        result.unwrap();
    }
}
