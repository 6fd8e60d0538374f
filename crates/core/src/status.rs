//! Status codes shared by native work, carriers and the host runtime
//!
//! A status is a plain `i32` partitioned into three ranges:
//!
//! ```text
//! 0            SUCCESS
//! 1 ..= 3999   host range   (one-to-one with the host runtime's own codes)
//! 4000 ..      bridge range (failures detected by the bridge or the SDK)
//! ```
//!
//! The range alone decides where a human readable message comes from when
//! the failing site did not record one: the host's last-error facility for
//! host codes, the static table below for bridge codes.

use std::fmt;

/// Which part of the status space a code belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusRange {
    /// `SUCCESS`
    Success,
    /// Mirrors a host runtime status (N-API `napi_status` values)
    Host,
    /// Bridge-defined failure code
    Bridge,
}

/// Outcome code of a bridged operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Status(i32);

impl Status {
    /// First code of the bridge range
    pub const ERROR_START: i32 = 4000;

    pub const SUCCESS: Status = Status(0);

    // Host codes the bridge needs to name explicitly
    pub const HOST_INVALID_ARG: Status = Status(1);
    pub const HOST_GENERIC_FAILURE: Status = Status(9);
    pub const HOST_PENDING_EXCEPTION: Status = Status(10);
    pub const HOST_CANCELLED: Status = Status(11);

    pub const INVALID_ARGS: Status = Status(4001);
    pub const NOT_FOUND: Status = Status(4040);
    pub const OUT_OF_RANGE: Status = Status(4097);
    pub const ASYNC_FAILURE: Status = Status(4098);
    pub const BUILD_ERROR: Status = Status(4099);
    pub const ALLOCATION_FAILURE: Status = Status(4100);
    pub const RECEIVE_CREATE_FAIL: Status = Status(4101);
    pub const SEND_CREATE_FAIL: Status = Status(4102);
    pub const INVALID_HANDLE: Status = Status(4103);
    pub const NOT_VIDEO: Status = Status(4140);
    pub const NOT_AUDIO: Status = Status(4141);
    pub const NOT_METADATA: Status = Status(4142);
    pub const CONNECTION_LOST: Status = Status(4143);
    pub const TIMEOUT: Status = Status(4144);

    /// Wrap a raw code. Any `i32` is accepted; unknown bridge codes simply
    /// have no static message.
    pub const fn from_code(code: i32) -> Self {
        Status(code)
    }

    /// Raw numeric code
    pub const fn code(self) -> i32 {
        self.0
    }

    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    pub const fn range(self) -> StatusRange {
        if self.0 == 0 {
            StatusRange::Success
        } else if self.0 < Self::ERROR_START {
            StatusRange::Host
        } else {
            StatusRange::Bridge
        }
    }

    /// Static description of a named bridge code
    pub fn static_message(self) -> Option<&'static str> {
        let msg = match self {
            Status::INVALID_ARGS => "invalid arguments",
            Status::NOT_FOUND => "not found",
            Status::OUT_OF_RANGE => "value out of range",
            Status::ASYNC_FAILURE => "asynchronous work failed",
            Status::BUILD_ERROR => "failed to build native value",
            Status::ALLOCATION_FAILURE => "allocation failed",
            Status::RECEIVE_CREATE_FAIL => "failed to create receiver",
            Status::SEND_CREATE_FAIL => "failed to create sender",
            Status::INVALID_HANDLE => "invalid or closed native handle",
            Status::NOT_VIDEO => "expected a video frame",
            Status::NOT_AUDIO => "expected an audio frame",
            Status::NOT_METADATA => "expected a metadata frame",
            Status::CONNECTION_LOST => "connection lost",
            Status::TIMEOUT => "timed out",
            _ => return None,
        };
        Some(msg)
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::SUCCESS
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Status(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges() {
        assert_eq!(Status::SUCCESS.range(), StatusRange::Success);
        assert_eq!(Status::HOST_INVALID_ARG.range(), StatusRange::Host);
        assert_eq!(Status::from_code(3999).range(), StatusRange::Host);
        assert_eq!(Status::from_code(4000).range(), StatusRange::Bridge);
        assert_eq!(Status::TIMEOUT.range(), StatusRange::Bridge);
    }

    #[test]
    fn test_static_messages_cover_named_bridge_codes() {
        for status in [
            Status::INVALID_ARGS,
            Status::NOT_FOUND,
            Status::OUT_OF_RANGE,
            Status::ASYNC_FAILURE,
            Status::BUILD_ERROR,
            Status::ALLOCATION_FAILURE,
            Status::RECEIVE_CREATE_FAIL,
            Status::SEND_CREATE_FAIL,
            Status::INVALID_HANDLE,
            Status::NOT_VIDEO,
            Status::NOT_AUDIO,
            Status::NOT_METADATA,
            Status::CONNECTION_LOST,
            Status::TIMEOUT,
        ] {
            assert!(status.static_message().is_some(), "{status} has no message");
        }
        assert!(Status::HOST_GENERIC_FAILURE.static_message().is_none());
    }

    #[test]
    fn test_display_is_decimal_code() {
        assert_eq!(Status::NOT_FOUND.to_string(), "4040");
        assert_eq!(Status::from_code(-3).to_string(), "-3");
    }
}
