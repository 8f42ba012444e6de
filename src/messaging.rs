//! Thread message loop.
//!
//! Message windows only receive messages sent from other threads or processes (such as
//! clipboard chain notifications) while their thread is pumping messages.

use std::cell::Cell;
use std::io;

use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW,
    GetMessageW,
    MSG,
    PostQuitMessage,
    TranslateMessage,
};
use windows::core::BOOL;

use crate::internal::ReturnValue;

/// Windows thread message loop functions.
///
/// This type is not meant to be instantiated.
pub enum ThreadMessageLoop {}

impl ThreadMessageLoop {
    thread_local! {
        static RUNNING: Cell<bool> = const { Cell::new(false) };
    }

    /// Runs the Windows thread message loop until [`Self::post_quit_message`] is called.
    ///
    /// Only a single message loop may be running per thread.
    ///
    /// # Panics
    ///
    /// Will panic if the message loop is already running.
    pub fn run() -> io::Result<()> {
        Self::RUNNING.with(|running| {
            if running.replace(true) {
                panic!("Cannot run two thread message loops on the same thread");
            }
        });
        let result = Self::pump();
        Self::RUNNING.with(|running| running.set(false));
        result
    }

    /// Posts a 'quit' message in the thread message loop.
    ///
    /// This will cause [`Self::run`] to return.
    ///
    /// # Panics
    ///
    /// Will panic if the message loop is not running.
    pub fn post_quit_message() {
        if !Self::is_loop_running() {
            panic!("Cannot post quit message because thread message loop is not running");
        }
        unsafe {
            PostQuitMessage(0);
        }
    }

    #[inline(always)]
    pub fn is_loop_running() -> bool {
        Self::RUNNING.with(|running| running.get())
    }

    fn pump() -> io::Result<()> {
        let mut msg: MSG = Default::default();
        loop {
            // Returns 0 on `WM_QUIT`
            let ret_val = unsafe { GetMessageW(&mut msg, None, 0, 0) }
                .if_eq_to_error(BOOL(-1), io::Error::last_os_error)?;
            if ret_val == BOOL(0) {
                break;
            }
            unsafe {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
        Ok(())
    }
}
