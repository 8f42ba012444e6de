//! The message record handed to window callbacks.

use windows::Win32::Foundation::{
    HWND,
    LPARAM,
    LRESULT,
    WPARAM,
};

/// A window message as seen by a [`crate::MessageWindow`] callback.
///
/// The callback gets the record by mutable reference. Whatever `message`, `w_param` and `l_param` contain
/// after the callback returns is what gets passed on to the original window procedure. The `result` field
/// starts out as zero and is not used by the dispatcher: the value returned to Windows is always the one
/// returned by the original window procedure.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct WindowMessage {
    pub window: HWND,
    pub message: u32,
    pub w_param: WPARAM,
    pub l_param: LPARAM,
    pub result: LRESULT,
}

impl WindowMessage {
    pub fn new(window: HWND, message: u32, w_param: WPARAM, l_param: LPARAM) -> Self {
        Self {
            window,
            message,
            w_param,
            l_param,
            result: LRESULT(0),
        }
    }
}
