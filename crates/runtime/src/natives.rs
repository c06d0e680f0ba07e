//! The fixed set of native ("builtin") top-level functions: `clock`,
//! `exit`, `sleep`. Each reports argument-count and type errors back as a
//! plain `String`, which the VM turns into a runtime error attributed to
//! the call site.

use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use lox_core::Value;

/// Seconds since the Unix epoch, monotonic within a run.
pub fn clock_native(args: &[Value]) -> Result<Value, String> {
    if !args.is_empty() {
        return Err("Did not expect any arguments.".to_string());
    }
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    Ok(Value::number(now.as_secs_f64()))
}

/// Terminate the process immediately with the given exit code.
pub fn exit_native(args: &[Value]) -> Result<Value, String> {
    if args.len() > 1 {
        return Err("exit expected one integer argument.".to_string());
    }
    if args.is_empty() {
        std::process::exit(0);
    }
    let value = args[0];
    if !value.is_number() {
        return Err("Expected an integer exit code.".to_string());
    }
    let code = value.as_number();
    if code.fract() != 0.0 {
        return Err("Exit code must be a positive integer.".to_string());
    }
    std::process::exit(code as i32);
}

/// Block the calling thread for `n` seconds.
pub fn sleep_native(args: &[Value]) -> Result<Value, String> {
    if args.len() != 1 {
        return Err("Expected one integer argument".to_string());
    }
    let value = args[0];
    if !value.is_number() {
        return Err("Expected an integer seconds argument.".to_string());
    }
    let seconds = value.as_number();
    if seconds < 0.0 {
        return Err("Seconds must be positive integer.".to_string());
    }
    if seconds.fract() != 0.0 {
        return Err("Expected seconds to be an integer".to_string());
    }
    thread::sleep(Duration::from_secs(seconds as u64));
    Ok(Value::nil())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_rejects_arguments() {
        assert!(clock_native(&[Value::number(1.0)]).is_err());
    }

    #[test]
    fn clock_returns_a_nonnegative_number() {
        let v = clock_native(&[]).unwrap();
        assert!(v.is_number());
        assert!(v.as_number() >= 0.0);
    }

    #[test]
    fn sleep_rejects_non_integer_seconds() {
        assert!(sleep_native(&[Value::number(1.5)]).is_err());
    }

    #[test]
    fn sleep_rejects_negative_seconds() {
        assert!(sleep_native(&[Value::number(-1.0)]).is_err());
    }

    #[test]
    fn sleep_zero_seconds_returns_nil_immediately() {
        let v = sleep_native(&[Value::number(0.0)]).unwrap();
        assert!(v.is_nil());
    }
}
