//! Argument validation
//!
//! Every bridged operation checks its call shape here before anything else
//! happens: argument count first, then the kind of each argument in order.
//! The first mismatch short-circuits; later arguments are never inspected.
//!
//! Enum-valued arguments are checked against their accepted sets in
//! [`formats`].

pub mod formats;

pub use formats::{
    read_format, valid_audio_format, valid_bandwidth, valid_color_format, valid_frame_format,
    AudioFormat, Bandwidth, ColorFormat, FormatAxis, FrameFormat,
};

use crate::embedding::{Embedding, ValueKind};
use crate::error::{BridgeError, Result};

/// Check `args` against the expected kinds of `method`
///
/// The expected argument count is `expected.len()`. On success the
/// arguments are handed back unchanged.
pub fn check_args<'a, E: Embedding>(
    env: &E,
    method: &str,
    args: &'a [E::Value],
    expected: &[ValueKind],
) -> Result<&'a [E::Value]> {
    if args.len() != expected.len() {
        return Err(BridgeError::ArgumentCount {
            method: method.to_string(),
            expected: expected.len(),
            actual: args.len(),
        });
    }

    for (index, (&value, &want)) in args.iter().zip(expected).enumerate() {
        let got = env.type_of(value)?;
        if got != want {
            return Err(BridgeError::ArgumentType {
                method: method.to_string(),
                position: index + 1,
                expected: want,
                actual: got,
            });
        }
    }

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::{LocalRuntime, Primitive};

    #[test]
    fn test_accepts_matching_call() {
        let rt = LocalRuntime::new();
        let args = [rt.string("Cam1"), rt.number(3.0)];
        let checked = check_args(
            &rt,
            "connect",
            &args,
            &[ValueKind::String, ValueKind::Number],
        )
        .unwrap();
        assert_eq!(checked, &args);
    }

    #[test]
    fn test_count_mismatch_names_both_counts() {
        let rt = LocalRuntime::new();
        let args = [rt.string("Cam1")];
        let err = check_args(
            &rt,
            "connect",
            &args,
            &[ValueKind::String, ValueKind::Number],
        )
        .unwrap_err();
        assert_eq!(
            err,
            BridgeError::ArgumentCount {
                method: "connect".to_string(),
                expected: 2,
                actual: 1,
            }
        );
        // Count failures never look at the values
        assert_eq!(rt.stats().type_queries, 0);
    }

    #[test]
    fn test_type_mismatch_short_circuits() {
        let rt = LocalRuntime::new();
        let args = [rt.number(1.0), rt.boolean(true), rt.null_value(), rt.undefined_value()];
        let err = check_args(
            &rt,
            "send",
            &args,
            &[
                ValueKind::Number,
                ValueKind::Object,
                ValueKind::String,
                ValueKind::String,
            ],
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "For method send argument 2, expected type object and got boolean."
        );
        // Arguments after the first mismatch are never evaluated
        assert_eq!(rt.stats().type_queries, 2);
    }

    #[test]
    fn test_host_failure_propagates() {
        let rt = LocalRuntime::new();
        let args = [rt.number(1.0)];
        rt.fail_next(Primitive::TypeOf, 9);
        let err = check_args(&rt, "send", &args, &[ValueKind::Number]).unwrap_err();
        assert_eq!(err.status().map(|s| s.code()), Some(9));
    }
}
