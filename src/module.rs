use std::io;

use windows::Win32::Foundation::{
    HINSTANCE,
    HMODULE,
};
use windows::Win32::System::LibraryLoader::{
    GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS,
    GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT,
    GetModuleHandleExW,
};
use windows::core::PCWSTR;

/// A handle to the module (EXE or DLL) that contains this crate's code.
///
/// Window classes are registered per module, so a crate linked into a DLL registers its class
/// for the DLL rather than for the host executable.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(crate) struct Module {
    raw_handle: HMODULE,
}

impl Module {
    pub(crate) fn containing_crate() -> io::Result<Self> {
        static ANCHOR: u8 = 0;
        let mut raw_handle: HMODULE = Default::default();
        unsafe {
            GetModuleHandleExW(
                GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS | GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT,
                PCWSTR((&raw const ANCHOR).cast::<u16>()),
                &raw mut raw_handle,
            )
        }?;
        Ok(Module { raw_handle })
    }

    pub(crate) fn as_hinstance(&self) -> HINSTANCE {
        self.raw_handle.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_crate_module() -> io::Result<()> {
        let module = Module::containing_crate()?;
        assert!(!module.as_hinstance().is_invalid());
        Ok(())
    }
}
