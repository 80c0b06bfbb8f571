/// `run_success` is a macro that wraps `std::process::Command`, and
/// obtains the status code. The macro returns `true` if the called
/// program returned success (0) and wasn't killed, and `false` if
/// anything went wrong - including the program not existing at all.
///
/// # Examples
///
/// ```rust
/// use vqos_utils::run_success;
/// assert_eq!(run_success!("/bin/true"), true);
/// ```
///
/// ```rust
/// use vqos_utils::run_success;
/// assert!(run_success!("/bin/echo", "Hello World"));
/// assert!(run_success!("/bin/echo", "Hello", "World"));
/// ```
#[macro_export]
macro_rules! run_success {
    ($command:expr, $($arg:expr),*) => {
        {
            std::process::Command::new($command)
                $(
                    .arg($arg)
                )*
                .status()
                .map(|status| status.success())
                .unwrap_or(false)
        }
    };

    ($command: expr) => {
        {
            std::process::Command::new($command)
                .status()
                .map(|status| status.success())
                .unwrap_or(false)
        }
    };
}

/// Runs an external command and captures its standard output as a
/// string. Returns `None` if the command could not be started, exited
/// with a non-zero status, or produced output that isn't UTF-8.
pub fn run_output(command: &str, args: &[&str]) -> Option<String> {
    let output = std::process::Command::new(command).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok()
}

#[cfg(test)]
mod test {
    use super::run_output;
    use crate::run_success;

    #[test]
    fn test_true() {
        assert!(run_success!("/bin/true"));
    }

    #[test]
    fn test_echo() {
        assert!(run_success!("/bin/echo", "Hello World"));
        assert!(run_success!("/bin/echo", "Hello", "World"));
    }

    #[test]
    fn test_missing_binary_is_failure() {
        assert!(!run_success!("/no/such/binary"));
    }

    #[test]
    fn test_output_capture() {
        let out = run_output("/bin/echo", &["hello"]).unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[test]
    fn test_output_of_failing_command() {
        assert!(run_output("/bin/false", &[]).is_none());
    }
}
