//! exit — end the shell.

use crate::tools::{Builtin, BuiltinError};

/// Exit builtin: terminates the shell process with status 0. Takes no
/// arguments; anything else is a usage error.
pub struct Exit;

impl Builtin for Exit {
    fn name(&self) -> &str {
        "exit"
    }

    fn run(&self, argv: &[String]) -> Result<(), BuiltinError> {
        if argv.len() != 1 {
            return Err(BuiltinError::Usage);
        }
        std::process::exit(0);
    }
}
