//! Hidden message windows with an intercepted window procedure.

use std::cell::Cell;
use std::fmt::{
    Debug,
    Formatter,
};
use std::mem;
use std::rc::{
    Rc,
    Weak,
};

use windows::Win32::Foundation::{
    HWND,
    LPARAM,
    LRESULT,
    WPARAM,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CallWindowProcW,
    CreateWindowExW,
    DefWindowProcW,
    DestroyWindow,
    GWLP_USERDATA,
    GWLP_WNDPROC,
    GetWindowLongPtrW,
    IsWindow,
    SetWindowLongPtrW,
    WM_NCDESTROY,
    WNDPROC,
    WS_EX_TOOLWINDOW,
    WS_POPUP,
};
use windows::core::PCWSTR;

use crate::error::{
    Error,
    Result,
};
use crate::internal::{
    call_with_last_error_check,
    catch_unwind_and_abort,
};
use crate::manager::LiveWindows;
use crate::message::WindowMessage;
use crate::module::Module;
use crate::window_class::WindowClass;

pub(crate) type WindowCallback = Box<dyn Fn(&mut WindowMessage)>;

/// An invisible window whose messages are all passed through a user callback.
///
/// Created by [`crate::MessageWindowManager::create`]. Every message Windows delivers to the window
/// is first handed to the callback and then, unconditionally, to the window's original window procedure.
/// The callback can observe messages but cannot swallow them.
///
/// The native window is destroyed by [`Self::dispose`], when this value is dropped, or when
/// [`crate::MessageWindowManager::teardown_all`] runs, whichever comes first.
///
/// # Multithreading
///
/// Not [`Send`] or [`Sync`]. Windows delivers messages on the thread that created the window and
/// only that thread may destroy it.
///
/// # Callback restrictions
///
/// The callback should not dispose its own window. Doing so is memory safe, but the window will be
/// gone while the current message is still being forwarded.
///
/// The callback is called again for messages arriving while it is already running for the same
/// window, for example when it sends a message to its own window or waits in a blocking send to
/// another thread. State it keeps has to tolerate that nesting, such as a [`Cell`] or a
/// [`std::cell::RefCell`] that is not borrowed across calls into Windows.
pub struct MessageWindow {
    core: Rc<WindowCore>,
}

impl MessageWindow {
    pub(crate) fn create(
        class: &WindowClass,
        live_windows: &Rc<LiveWindows>,
        callback: WindowCallback,
    ) -> Result<Self> {
        let module = Module::containing_crate().map_err(|source| Error::WindowCreation {
            context: "cannot determine module",
            source,
        })?;
        let h_wnd: HWND = unsafe {
            CreateWindowExW(
                WS_EX_TOOLWINDOW,
                class.as_wide_name().as_raw_pcwstr(),
                PCWSTR::null(),
                WS_POPUP,
                0,
                0,
                0,
                0,
                None,
                None,
                Some(module.as_hinstance()),
                None,
            )
        }
        .map_err(|err| Error::WindowCreation {
            context: "CreateWindowExW failed",
            source: err.into(),
        })?;
        let core = Rc::new(WindowCore {
            handle: Cell::new(Some(h_wnd)),
            disposed: Cell::new(false),
            live_windows: Rc::downgrade(live_windows),
        });
        if let Err(source) = unsafe { DispatchState::install(h_wnd, &core, callback) } {
            if let Err(err) = unsafe { DestroyWindow(h_wnd) } {
                log::warn!("Cannot destroy half-created message window {h_wnd:?}: {err}");
            }
            return Err(Error::WindowCreation {
                context: "cannot substitute window procedure",
                source,
            });
        }
        log::debug!("Created message window {h_wnd:?}");
        Ok(Self { core })
    }

    /// Returns the native window handle, or `None` once the window has been destroyed.
    pub fn handle(&self) -> Option<HWND> {
        self.core.handle.get()
    }

    pub fn is_disposed(&self) -> bool {
        self.core.disposed.get()
    }

    /// Destroys the native window.
    ///
    /// Calling this more than once has no further effect.
    pub fn dispose(&self) {
        self.core.dispose();
    }

    pub(crate) fn core(&self) -> &Rc<WindowCore> {
        &self.core
    }
}

impl Drop for MessageWindow {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Debug for MessageWindow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageWindow")
            .field("handle", &self.core.handle.get())
            .field("disposed", &self.core.disposed.get())
            .finish()
    }
}

pub(crate) struct WindowCore {
    handle: Cell<Option<HWND>>,
    disposed: Cell<bool>,
    live_windows: Weak<LiveWindows>,
}

impl WindowCore {
    pub(crate) fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        if let Some(h_wnd) = self.handle.take() {
            if unsafe { IsWindow(Some(h_wnd)) }.as_bool() {
                match unsafe { DestroyWindow(h_wnd) } {
                    Ok(()) => log::debug!("Destroyed message window {h_wnd:?}"),
                    Err(err) => log::warn!("Cannot destroy message window {h_wnd:?}: {err}"),
                }
            }
        }
        if let Some(live_windows) = self.live_windows.upgrade() {
            live_windows.remove(self);
        }
    }
}

/// Per-window state reachable from the window procedure.
///
/// The window holds one strong reference in `GWLP_USERDATA` from substitution until `WM_NCDESTROY`.
/// Each dispatch call holds another one while it runs.
struct DispatchState {
    original_proc: WNDPROC,
    callback: WindowCallback,
    core: Weak<WindowCore>,
}

impl DispatchState {
    unsafe fn install(
        h_wnd: HWND,
        core: &Rc<WindowCore>,
        callback: WindowCallback,
    ) -> std::io::Result<()> {
        let original_proc = unsafe {
            let raw_proc = call_with_last_error_check(|| GetWindowLongPtrW(h_wnd, GWLP_WNDPROC))?;
            mem::transmute::<isize, WNDPROC>(raw_proc)
        };
        let state = Rc::new(DispatchState {
            original_proc,
            callback,
            core: Rc::downgrade(core),
        });
        let state_ptr = Rc::into_raw(state);
        let result = call_with_last_error_check(|| unsafe {
            SetWindowLongPtrW(h_wnd, GWLP_USERDATA, state_ptr as isize)
        })
        .and_then(|_| {
            call_with_last_error_check(|| unsafe {
                SetWindowLongPtrW(h_wnd, GWLP_WNDPROC, dispatching_window_proc as usize as isize)
            })
        });
        if result.is_err() {
            unsafe {
                SetWindowLongPtrW(h_wnd, GWLP_USERDATA, 0);
                drop(Rc::from_raw(state_ptr));
            }
        }
        result.map(|_| ())
    }

    unsafe fn acquire(h_wnd: HWND) -> Option<Rc<Self>> {
        let ptr = unsafe { GetWindowLongPtrW(h_wnd, GWLP_USERDATA) } as *const Self;
        if ptr.is_null() {
            return None;
        }
        unsafe {
            Rc::increment_strong_count(ptr);
            Some(Rc::from_raw(ptr))
        }
    }

    /// Puts the original window procedure back and drops the window's reference to the state.
    unsafe fn release(&self, h_wnd: HWND) {
        let original_proc = self.original_proc.map_or(0, |window_proc| window_proc as usize as isize);
        unsafe {
            SetWindowLongPtrW(h_wnd, GWLP_WNDPROC, original_proc);
            let ptr = SetWindowLongPtrW(h_wnd, GWLP_USERDATA, 0) as *const Self;
            if !ptr.is_null() {
                drop(Rc::from_raw(ptr));
            }
        }
        if let Some(core) = self.core.upgrade() {
            core.handle.set(None);
        }
    }
}

unsafe extern "system" fn dispatching_window_proc(
    h_wnd: HWND,
    message: u32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    let call = move || {
        let Some(state) = (unsafe { DispatchState::acquire(h_wnd) }) else {
            return unsafe { DefWindowProcW(h_wnd, message, w_param, l_param) };
        };
        let mut record = WindowMessage::new(h_wnd, message, w_param, l_param);
        (state.callback)(&mut record);
        let result = unsafe {
            CallWindowProcW(
                state.original_proc,
                h_wnd,
                record.message,
                record.w_param,
                record.l_param,
            )
        };
        if message == WM_NCDESTROY {
            unsafe { state.release(h_wnd) };
        }
        result
    };
    catch_unwind_and_abort(call)
}

#[cfg(test)]
mod tests {
    use windows::Win32::UI::WindowsAndMessaging::{
        SendMessageW,
        SetWindowTextW,
        WM_APP,
        WM_CLOSE,
        WM_DESTROY,
        WM_GETTEXTLENGTH,
    };

    use std::cell::RefCell;

    use super::*;
    use crate::MessageWindowManager;

    static_assertions::assert_not_impl_any!(MessageWindow: Send, Sync);

    fn recording_window(
        manager: &MessageWindowManager,
    ) -> Result<(MessageWindow, Rc<RefCell<Vec<u32>>>)> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_in_callback = Rc::clone(&seen);
        let window = manager.create(move |message: &mut WindowMessage| {
            seen_in_callback.borrow_mut().push(message.message);
        })?;
        Ok((window, seen))
    }

    #[test]
    fn unknown_message_is_observed_and_forwarded() -> Result<()> {
        let manager = MessageWindowManager::new();
        let (window, seen) = recording_window(&manager)?;
        let h_wnd = window.handle().expect("Live window should have a handle");
        let custom_message = WM_APP + 7;

        let result = unsafe { SendMessageW(h_wnd, custom_message, Some(WPARAM(1)), Some(LPARAM(2))) };

        assert_eq!(result, LRESULT(0));
        assert_eq!(seen.borrow().iter().filter(|&&m| m == custom_message).count(), 1);
        assert_eq!(window.handle(), Some(h_wnd));
        assert!(unsafe { IsWindow(Some(h_wnd)) }.as_bool());
        Ok(())
    }

    #[test]
    fn original_procedure_result_is_returned() -> Result<()> {
        let manager = MessageWindowManager::new();
        let window = manager.create(|message: &mut WindowMessage| {
            message.result = LRESULT(12345);
        })?;
        let h_wnd = window.handle().expect("Live window should have a handle");
        let text = crate::string::ZeroTerminatedWideString::from_os_str("abc");
        unsafe { SetWindowTextW(h_wnd, text.as_raw_pcwstr()) }.expect("Cannot set window text");

        let length = unsafe { SendMessageW(h_wnd, WM_GETTEXTLENGTH, None, None) };

        assert_eq!(length, LRESULT(3));
        Ok(())
    }

    #[test]
    fn callback_changes_are_forwarded() -> Result<()> {
        let manager = MessageWindowManager::new();
        let window = manager.create(|message: &mut WindowMessage| {
            if message.message == WM_APP + 1 {
                message.message = WM_GETTEXTLENGTH;
            }
        })?;
        let h_wnd = window.handle().expect("Live window should have a handle");
        let text = crate::string::ZeroTerminatedWideString::from_os_str("abcde");
        unsafe { SetWindowTextW(h_wnd, text.as_raw_pcwstr()) }.expect("Cannot set window text");

        let result = unsafe { SendMessageW(h_wnd, WM_APP + 1, None, None) };

        assert_eq!(result, LRESULT(5));
        Ok(())
    }

    #[test]
    fn nested_message_reaches_callback() -> Result<()> {
        let manager = MessageWindowManager::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_in_callback = Rc::clone(&seen);
        let window = manager.create(move |message: &mut WindowMessage| {
            if message.message == WM_APP + 2 {
                seen_in_callback.borrow_mut().push(message.w_param.0);
                if message.w_param.0 == 0 {
                    unsafe { SendMessageW(message.window, WM_APP + 2, Some(WPARAM(1)), None) };
                    seen_in_callback.borrow_mut().push(2);
                }
            }
        })?;
        let h_wnd = window.handle().expect("Live window should have a handle");

        unsafe { SendMessageW(h_wnd, WM_APP + 2, Some(WPARAM(0)), None) };

        assert_eq!(*seen.borrow(), [0, 1, 2]);
        Ok(())
    }

    #[test]
    fn dispose_is_idempotent() -> Result<()> {
        let manager = MessageWindowManager::new();
        let (window, seen) = recording_window(&manager)?;
        let h_wnd = window.handle().expect("Live window should have a handle");

        window.dispose();
        assert!(window.is_disposed());
        assert_eq!(window.handle(), None);
        assert!(!unsafe { IsWindow(Some(h_wnd)) }.as_bool());
        assert!(seen.borrow().contains(&WM_DESTROY));
        assert!(seen.borrow().contains(&WM_NCDESTROY));

        window.dispose();
        assert!(window.is_disposed());
        assert_eq!(window.handle(), None);
        assert!(!manager.is_tracked(&window));
        Ok(())
    }

    #[test]
    fn drop_destroys_window() -> Result<()> {
        let manager = MessageWindowManager::new();
        let window = manager.create(|_: &mut WindowMessage| {})?;
        let h_wnd = window.handle().expect("Live window should have a handle");
        drop(window);
        assert!(!unsafe { IsWindow(Some(h_wnd)) }.as_bool());
        assert_eq!(manager.live_count(), 0);
        Ok(())
    }

    #[test]
    fn externally_destroyed_window_clears_handle() -> Result<()> {
        let manager = MessageWindowManager::new();
        let window = manager.create(|_: &mut WindowMessage| {})?;
        let h_wnd = window.handle().expect("Live window should have a handle");

        // Default handling of `WM_CLOSE` destroys the window
        unsafe { SendMessageW(h_wnd, WM_CLOSE, None, None) };

        assert!(!unsafe { IsWindow(Some(h_wnd)) }.as_bool());
        assert_eq!(window.handle(), None);
        assert!(!window.is_disposed());
        window.dispose();
        assert!(window.is_disposed());
        Ok(())
    }

    #[test]
    fn callback_may_dispose_own_window() -> Result<()> {
        let manager = MessageWindowManager::new();
        let slot: Rc<RefCell<Option<MessageWindow>>> = Rc::new(RefCell::new(None));
        let slot_in_callback = Rc::clone(&slot);
        let window = manager.create(move |message: &mut WindowMessage| {
            if message.message == WM_APP + 3 {
                if let Some(window) = slot_in_callback.borrow().as_ref() {
                    window.dispose();
                }
            }
        })?;
        let h_wnd = window.handle().expect("Live window should have a handle");
        *slot.borrow_mut() = Some(window);

        unsafe { SendMessageW(h_wnd, WM_APP + 3, None, None) };

        let slot_ref = slot.borrow();
        let window = slot_ref.as_ref().expect("Window should still be stored");
        assert!(window.is_disposed());
        assert!(!unsafe { IsWindow(Some(h_wnd)) }.as_bool());
        Ok(())
    }
}
