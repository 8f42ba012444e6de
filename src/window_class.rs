//! The window class shared by all message windows.

use std::{
    io,
    mem,
};

use windows::Win32::Foundation::{
    ERROR_CLASS_ALREADY_EXISTS,
    HWND,
    LPARAM,
    LRESULT,
    WPARAM,
};
use windows::Win32::UI::WindowsAndMessaging::{
    DefWindowProcW,
    GetClassInfoExW,
    RegisterClassExW,
    UnregisterClassW,
    WNDCLASSEXW,
};

use crate::error::{
    Error,
    Result,
};
use crate::internal::ReturnValue;
use crate::module::Module;
use crate::string::ZeroTerminatedWideString;

/// A named window class for invisible message windows.
///
/// The class uses a plain pass-through window procedure and no class styles. The actual message
/// handling is done per window by substituting the window procedure after creation, see
/// [`crate::MessageWindow`].
///
/// Registration is per module and lasts for the process lifetime unless [`Self::unregister`] is called.
/// An existing registration with the same name, for example from an earlier load of the same DLL,
/// is detected and reused.
#[derive(Clone, Debug)]
pub struct WindowClass {
    name: String,
    wide_name: ZeroTerminatedWideString,
}

impl WindowClass {
    /// Class name used by [`Self::default`].
    pub const DEFAULT_NAME: &'static str = "HiddenMessageWindow";

    const MAX_WINDOW_CLASS_NAME_CHARS: usize = 256;

    /// Creates a class descriptor with a custom name.
    ///
    /// Nothing is registered until [`Self::ensure_registered`] is called.
    ///
    /// # Panics
    ///
    /// Will panic if the name is empty or longer than 256 UTF-16 units.
    pub fn new(name: &str) -> Self {
        let wide_name = ZeroTerminatedWideString::from_os_str(name);
        assert!(
            (1..=Self::MAX_WINDOW_CLASS_NAME_CHARS).contains(&wide_name.len()),
            "Window class name must have between 1 and {} characters",
            Self::MAX_WINDOW_CLASS_NAME_CHARS
        );
        Self {
            name: name.to_owned(),
            wide_name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Checks whether the class is currently registered for the crate's module.
    pub fn is_registered(&self) -> bool {
        let Ok(module) = Module::containing_crate() else {
            return false;
        };
        self.lookup(module).is_ok()
    }

    /// Registers the class unless it is already registered.
    ///
    /// Can be called any number of times.
    pub fn ensure_registered(&self) -> Result<()> {
        let module = Module::containing_crate().map_err(|source| self.registration_error(source))?;
        if self.lookup(module).is_ok() {
            log::trace!("Window class `{}` already registered", self.name);
            return Ok(());
        }
        let class_def = WNDCLASSEXW {
            cbSize: mem::size_of::<WNDCLASSEXW>().try_into().unwrap(),
            lpfnWndProc: Some(pass_through_window_proc),
            hInstance: module.as_hinstance(),
            lpszClassName: self.wide_name.as_raw_pcwstr(),
            ..Default::default()
        };
        match unsafe { RegisterClassExW(&class_def) }.if_null_get_last_error() {
            Ok(_atom) => {
                log::debug!("Registered window class `{}`", self.name);
                Ok(())
            }
            Err(err) if err.raw_os_error() == Some(ERROR_CLASS_ALREADY_EXISTS.0 as i32) => {
                log::debug!("Window class `{}` was registered concurrently", self.name);
                Ok(())
            }
            Err(err) => Err(self.registration_error(err)),
        }
    }

    /// Unregisters the class, ignoring failures.
    ///
    /// Not needed during normal operation since Windows releases the class at process exit.
    /// Fails silently if windows of this class still exist.
    pub fn unregister(&self) {
        let result = Module::containing_crate().and_then(|module| {
            unsafe { UnregisterClassW(self.wide_name.as_raw_pcwstr(), Some(module.as_hinstance())) }?;
            Ok(())
        });
        match result {
            Ok(()) => log::debug!("Unregistered window class `{}`", self.name),
            Err(err) => log::debug!("Cannot unregister window class `{}`: {err}", self.name),
        }
    }

    pub(crate) fn as_wide_name(&self) -> &ZeroTerminatedWideString {
        &self.wide_name
    }

    fn lookup(&self, module: Module) -> io::Result<WNDCLASSEXW> {
        let mut class_info = WNDCLASSEXW {
            cbSize: mem::size_of::<WNDCLASSEXW>().try_into().unwrap(),
            ..Default::default()
        };
        unsafe {
            GetClassInfoExW(
                Some(module.as_hinstance()),
                self.wide_name.as_raw_pcwstr(),
                &mut class_info,
            )
        }?;
        Ok(class_info)
    }

    fn registration_error(&self, source: io::Error) -> Error {
        Error::Registration {
            class_name: self.name.clone(),
            source,
        }
    }
}

impl Default for WindowClass {
    fn default() -> Self {
        Self::new(Self::DEFAULT_NAME)
    }
}

unsafe extern "system" fn pass_through_window_proc(
    h_wnd: HWND,
    message: u32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    unsafe { DefWindowProcW(h_wnd, message, w_param, l_param) }
}
