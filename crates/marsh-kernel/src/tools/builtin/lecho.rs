//! lecho — print arguments to stdout.

use std::io::Write;

use crate::tools::{Builtin, BuiltinError};

/// Echo builtin: prints its arguments joined by single spaces, followed
/// by a newline, and flushes so the output cannot trail a later child's.
pub struct Lecho;

impl Builtin for Lecho {
    fn name(&self) -> &str {
        "lecho"
    }

    fn run(&self, argv: &[String]) -> Result<(), BuiltinError> {
        let mut out = std::io::stdout().lock();
        let line = argv[1..].join(" ");
        writeln!(out, "{line}").map_err(|e| BuiltinError::Failed(e.to_string()))?;
        out.flush().map_err(|e| BuiltinError::Failed(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_accepts_any_arity() {
        assert!(Lecho.run(&["lecho".into()]).is_ok());
        assert!(Lecho
            .run(&["lecho".into(), "a".into(), "b".into()])
            .is_ok());
    }
}
