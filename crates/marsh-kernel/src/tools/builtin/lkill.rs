//! lkill — send a signal to a process or process group.

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::tools::{Builtin, BuiltinError};

/// Largest pid/signal number `lkill` accepts.
const MAX_NUMBER: i32 = 1 << 30;

/// Parse a non-negative decimal number with a sanity bound.
fn parse_number(text: &str) -> Option<i32> {
    let value = text.parse::<i32>().ok()?;
    if (0..=MAX_NUMBER).contains(&value) {
        Some(value)
    } else {
        None
    }
}

/// Kill builtin: `lkill [-SIG] pid`, numeric signal, SIGTERM by default.
/// A negative pid targets a whole process group, as kill(2) does.
pub struct Lkill;

impl Builtin for Lkill {
    fn name(&self) -> &str {
        "lkill"
    }

    fn run(&self, argv: &[String]) -> Result<(), BuiltinError> {
        let (signal_num, pid_text) = match argv.len() {
            2 => (Signal::SIGTERM as i32, argv[1].as_str()),
            3 => {
                let sig_text = argv[1]
                    .strip_prefix('-')
                    .ok_or(BuiltinError::Usage)?;
                let sig = parse_number(sig_text).ok_or(BuiltinError::Usage)?;
                (sig, argv[2].as_str())
            }
            _ => return Err(BuiltinError::Usage),
        };

        // A leading '-' on the pid selects the process group.
        let (group_target, pid_digits) = match pid_text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, pid_text),
        };
        let pid = parse_number(pid_digits).ok_or(BuiltinError::Usage)?;
        let pid = if group_target { -pid } else { pid };

        // Signal 0 is the kill(2) existence probe, not a Signal variant.
        let signal = if signal_num == 0 {
            None
        } else {
            Some(Signal::try_from(signal_num).map_err(|_| BuiltinError::Usage)?)
        };
        signal::kill(Pid::from_raw(pid), signal)
            .map_err(|err| BuiltinError::Failed(err.desc().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_parsing_bounds() {
        assert_eq!(parse_number("15"), Some(15));
        assert_eq!(parse_number("0"), Some(0));
        assert_eq!(parse_number("-4"), None);
        assert_eq!(parse_number("nope"), None);
        assert_eq!(parse_number("2147483647"), None);
    }

    #[test]
    fn usage_errors() {
        assert!(matches!(
            Lkill.run(&["lkill".into()]),
            Err(BuiltinError::Usage)
        ));
        assert!(matches!(
            Lkill.run(&["lkill".into(), "9".into(), "123".into()]),
            Err(BuiltinError::Usage)
        ));
        assert!(matches!(
            Lkill.run(&["lkill".into(), "-bad".into(), "123".into()]),
            Err(BuiltinError::Usage)
        ));
    }

    #[test]
    fn signal_zero_probes_own_process() {
        let pid = std::process::id().to_string();
        Lkill.run(&["lkill".into(), "-0".into(), pid]).unwrap();
    }
}
