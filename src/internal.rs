use std::io;
use std::panic::{
    AssertUnwindSafe,
    catch_unwind,
};
use std::process::abort;

#[cfg(feature = "clipboard")]
use windows::Win32::Foundation::HWND;
use windows::Win32::Foundation::{
    GetLastError,
    NO_ERROR,
    SetLastError,
};

pub(crate) trait ReturnValue: Sized + Copy + PartialEq {
    const NULL_VALUE: Self;

    fn if_null_to_error(self, error_gen: impl FnOnce() -> io::Error) -> io::Result<Self> {
        if self == Self::NULL_VALUE {
            Err(error_gen())
        } else {
            Ok(self)
        }
    }

    #[inline]
    fn if_null_get_last_error(self) -> io::Result<Self> {
        self.if_null_to_error(io::Error::last_os_error)
    }

    fn if_eq_to_error(self, error_value: Self, error_gen: impl FnOnce() -> io::Error) -> io::Result<Self> {
        if self == error_value {
            Err(error_gen())
        } else {
            Ok(self)
        }
    }
}

impl ReturnValue for u16 {
    const NULL_VALUE: Self = 0;
}

impl ReturnValue for isize {
    const NULL_VALUE: Self = 0;
}

impl ReturnValue for windows::core::BOOL {
    const NULL_VALUE: Self = windows::core::BOOL(0);
}

/// Calls a Win32 function whose null return value is ambiguous.
///
/// The last error is reset before the call so that a null result only counts as a failure
/// if the function actually set an error code.
pub(crate) fn call_with_last_error_check<T, F>(call: F) -> io::Result<T>
where
    T: ReturnValue,
    F: FnOnce() -> T,
{
    unsafe { SetLastError(NO_ERROR) };
    let result = call();
    if result == T::NULL_VALUE {
        let last_error = unsafe { GetLastError() };
        if last_error != NO_ERROR {
            return Err(io::Error::from_raw_os_error(last_error.0 as i32));
        }
    }
    Ok(result)
}

/// Converts a pointer-sized message parameter to a window handle.
#[cfg(feature = "clipboard")]
pub(crate) fn hwnd_from_param(value: usize) -> Option<HWND> {
    let handle = HWND(std::ptr::with_exposed_provenance_mut(value));
    (!handle.is_invalid()).then_some(handle)
}

#[cfg(all(test, feature = "clipboard"))]
pub(crate) fn hwnd_to_param(handle: Option<HWND>) -> usize {
    handle.map_or(0, |handle| handle.0.expose_provenance())
}

/// Runs the closure, aborting the process if it panics.
///
/// Used in callbacks invoked by Windows, since unwinding across the FFI boundary is undefined behavior.
pub(crate) fn catch_unwind_and_abort<F: FnOnce() -> R, R>(f: F) -> R {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| abort())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "clipboard")]
    #[test]
    fn hwnd_param_conversion() {
        assert_eq!(hwnd_from_param(0), None);
        let handle = hwnd_from_param(0x1230).expect("Non-zero param should give a handle");
        assert_eq!(hwnd_to_param(Some(handle)), 0x1230);
        assert_eq!(hwnd_to_param(None), 0);
    }

    #[test]
    fn last_error_check_accepts_null_without_error() -> io::Result<()> {
        let result = call_with_last_error_check(|| 0_isize)?;
        assert_eq!(result, 0);
        Ok(())
    }
}
