//! Kernel errors.
//!
//! Every fallible host call reports a negative `errno`, exactly like the C
//! side does. The named values live in [`linux_err`].

use core::{ffi::c_int, fmt, num::TryFromIntError};

use crate::pr_warn;

/// The largest errno a kernel call may return.
const MAX_ERRNO: c_int = 4095;

pub type KernelResult<T = ()> = Result<T, Error>;

/// Generic integer kernel error.
///
/// # Invariants
///
/// The value is a valid `errno` (i.e. `>= -MAX_ERRNO && < 0`).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Error(c_int);

impl Error {
    /// Creates an [`Error`] from a kernel error code.
    ///
    /// Out-of-range values are reported and collapsed into [`linux_err::EINVAL`].
    pub fn from_errno(errno: c_int) -> Error {
        if errno < -MAX_ERRNO || errno >= 0 {
            pr_warn!(
                "attempted to create `Error` with out of range `errno`: {}",
                errno
            );
            return linux_err::EINVAL;
        }
        // INVARIANT: The check above ensures the type invariant
        // will hold.
        Error(errno)
    }

    pub fn to_errno(&self) -> c_int {
        self.0
    }

    /// Returns a string representing the error, if one exists.
    pub fn name(&self) -> Option<&'static str> {
        linux_err::name(self.0)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            // Print out number if no name can be found.
            None => f.debug_tuple("Error").field(&-self.0).finish(),
            Some(name) => f.debug_tuple(name).finish(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            None => write!(f, "errno {}", self.0),
            Some(name) => write!(f, "{} ({})", name, self.0),
        }
    }
}

/// Contains the C-compatible error codes.
#[rustfmt::skip]
pub mod linux_err {
    macro_rules! declare_err {
        ($($err:ident = $num:literal, $doc:expr;)+) => {
            $(
            #[doc = $doc]
            pub const $err: super::Error = super::Error(-$num);
            )+

            pub(crate) fn name(errno: core::ffi::c_int) -> Option<&'static str> {
                match -errno {
                    $($num => Some(stringify!($err)),)+
                    _ => None,
                }
            }
        };
    }

    declare_err! {
        EPERM = 1, "Operation not permitted.";
        ENOENT = 2, "No such file or directory.";
        EINTR = 4, "Interrupted system call.";
        EIO = 5, "I/O error.";
        ENXIO = 6, "No such device or address.";
        EBADF = 9, "Bad file number.";
        EAGAIN = 11, "Try again.";
        ENOMEM = 12, "Out of memory.";
        EACCES = 13, "Permission denied.";
        EFAULT = 14, "Bad address.";
        EBUSY = 16, "Device or resource busy.";
        EEXIST = 17, "File exists.";
        ENODEV = 19, "No such device.";
        EINVAL = 22, "Invalid argument.";
        ENOTTY = 25, "Not a typewriter.";
        ENOSPC = 28, "No space left on device.";
        ESPIPE = 29, "Illegal seek.";
        ERANGE = 34, "Math result not representable.";
    }
}

impl From<TryFromIntError> for Error {
    fn from(_: TryFromIntError) -> Error {
        linux_err::EINVAL
    }
}

impl From<fmt::Error> for Error {
    fn from(_: fmt::Error) -> Error {
        linux_err::EINVAL
    }
}

impl From<core::convert::Infallible> for Error {
    fn from(e: core::convert::Infallible) -> Error {
        match e {}
    }
}

#[cfg(test)]
mod tests {
    use super::{linux_err::*, Error};

    #[test]
    fn named_errors_round_trip_through_errno() {
        assert_eq!(EFAULT.to_errno(), -14);
        assert_eq!(Error::from_errno(-14), EFAULT);
        assert_eq!(EBUSY.name(), Some("EBUSY"));
        assert_eq!(format!("{:?}", ENXIO), "ENXIO");
    }

    #[test]
    fn out_of_range_errno_becomes_einval() {
        assert_eq!(Error::from_errno(0), EINVAL);
        assert_eq!(Error::from_errno(5), EINVAL);
        assert_eq!(Error::from_errno(-5000), EINVAL);
    }

    #[test]
    fn unnamed_errno_is_still_printable() {
        let err = Error::from_errno(-200);
        assert_eq!(err.name(), None);
        assert_eq!(format!("{:?}", err), "Error(200)");
    }
}
