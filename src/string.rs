use std::ffi::OsStr;
use std::iter::once;
use std::os::windows::ffi::OsStrExt;

use windows::core::PCWSTR;

/// An owned, zero terminated UTF-16 string for passing to the Windows API.
#[derive(Clone, Eq, PartialEq, Debug)]
pub(crate) struct ZeroTerminatedWideString(Vec<u16>);

impl ZeroTerminatedWideString {
    pub(crate) fn from_os_str(str: impl AsRef<OsStr>) -> Self {
        Self(str.as_ref().encode_wide().chain(once(0)).collect())
    }

    /// Returns a raw pointer usable as long as `self` is alive and unchanged.
    pub(crate) fn as_raw_pcwstr(&self) -> PCWSTR {
        PCWSTR::from_raw(self.0.as_ptr())
    }

    /// Number of UTF-16 units excluding the terminating zero.
    pub(crate) fn len(&self) -> usize {
        self.0.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminates_with_zero() {
        let wide = ZeroTerminatedWideString::from_os_str("abc");
        assert_eq!(wide.len(), 3);
        assert_eq!(wide.0, [u16::from(b'a'), u16::from(b'b'), u16::from(b'c'), 0]);
    }
}
