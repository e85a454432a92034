//! cd — change the shell's working directory.

use std::env;

use crate::tools::{Builtin, BuiltinError};

/// Resolve the target directory: the single argument, or `$HOME` when
/// none was given.
pub(crate) fn target_dir(argv: &[String]) -> Result<String, BuiltinError> {
    match argv.len() {
        1 => env::var("HOME").map_err(|_| BuiltinError::Failed("no home directory".to_string())),
        2 => Ok(argv[1].clone()),
        _ => Err(BuiltinError::Usage),
    }
}

/// Change-directory builtin, with diagnostics on stderr.
pub struct Cd;

impl Builtin for Cd {
    fn name(&self) -> &str {
        "cd"
    }

    fn run(&self, argv: &[String]) -> Result<(), BuiltinError> {
        let path = match target_dir(argv) {
            Ok(path) => path,
            Err(BuiltinError::Usage) => {
                eprintln!("Wrong number of arguments ({}) to cd", argv.len());
                return Err(BuiltinError::Usage);
            }
            Err(err) => {
                eprintln!("Couldn't find path to go to");
                return Err(err);
            }
        };
        env::set_current_dir(&path).map_err(|err| {
            eprintln!("cd to '{path}' failed: {err}");
            BuiltinError::Failed(err.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::tests::cwd_lock;

    #[test]
    fn cd_changes_and_restores_directory() {
        let _l = cwd_lock();
        let original = env::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();

        let argv = vec!["cd".to_string(), dir.path().display().to_string()];
        Cd.run(&argv).unwrap();
        assert_eq!(
            env::current_dir().unwrap().canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );

        env::set_current_dir(original).unwrap();
    }

    #[test]
    fn cd_to_missing_directory_fails() {
        let _l = cwd_lock();
        let argv = vec!["cd".to_string(), "/definitely/not/here".to_string()];
        assert!(Cd.run(&argv).is_err());
    }

    #[test]
    fn cd_rejects_extra_arguments() {
        let argv = vec!["cd".to_string(), "a".to_string(), "b".to_string()];
        assert!(matches!(Cd.run(&argv), Err(BuiltinError::Usage)));
    }
}
