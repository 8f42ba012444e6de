//! Creation and bulk teardown of message windows.

use std::cell::RefCell;
use std::rc::{
    Rc,
    Weak,
};

use crate::error::Result;
use crate::message::WindowMessage;
use crate::window::{
    MessageWindow,
    WindowCore,
};
use crate::window_class::WindowClass;

/// Creates [`MessageWindow`]s and keeps track of the ones still alive.
///
/// The manager does not own the windows it creates, the caller does. It only keeps weak references
/// so that [`Self::teardown_all`] can destroy every window that is still around at shutdown.
/// Dropping the manager also runs [`Self::teardown_all`].
///
/// The window class is registered lazily by the first [`Self::create`] call.
///
/// # Examples
///
/// ```no_run
/// use message_window::{MessageWindowManager, WindowMessage};
///
/// let manager = MessageWindowManager::new();
/// let window = manager.create(|message: &mut WindowMessage| {
///     println!("Got message {:#x}", message.message);
/// })?;
/// assert!(window.handle().is_some());
///
/// // At shutdown:
/// manager.teardown_all();
/// assert!(window.handle().is_none());
///
/// # Result::<(), message_window::Error>::Ok(())
/// ```
#[derive(Debug)]
pub struct MessageWindowManager {
    class: WindowClass,
    live_windows: Rc<LiveWindows>,
}

#[cfg(test)]
static_assertions::assert_not_impl_any!(MessageWindowManager: Send, Sync);

impl MessageWindowManager {
    /// Creates a manager using [`WindowClass::default`].
    pub fn new() -> Self {
        Self::with_class(WindowClass::default())
    }

    /// Creates a manager creating its windows with the given class.
    pub fn with_class(class: WindowClass) -> Self {
        Self {
            class,
            live_windows: Default::default(),
        }
    }

    pub fn window_class(&self) -> &WindowClass {
        &self.class
    }

    /// Creates a new hidden window passing all of its messages through `callback` first.
    ///
    /// Registers the window class if necessary, returning [`crate::Error::Registration`] if that fails.
    ///
    /// The callback can be called again while it is still running, see [`MessageWindow`].
    pub fn create<F>(&self, callback: F) -> Result<MessageWindow>
    where
        F: Fn(&mut WindowMessage) + 'static,
    {
        self.class.ensure_registered()?;
        let window = MessageWindow::create(&self.class, &self.live_windows, Box::new(callback))?;
        self.live_windows.insert(window.core());
        Ok(window)
    }

    /// Disposes the window if it is tracked by this manager, does nothing otherwise.
    pub fn destroy(&self, window: &MessageWindow) {
        if self.is_tracked(window) {
            window.dispose();
        }
    }

    /// Disposes all windows still alive.
    ///
    /// Meant to be called once at shutdown, but calling it again or after windows were already
    /// destroyed individually is harmless.
    pub fn teardown_all(&self) {
        let mut count = 0_usize;
        while let Some(entry) = self.live_windows.take_first() {
            if let Some(core) = entry.upgrade() {
                core.dispose();
                count += 1;
            }
        }
        if count > 0 {
            log::debug!("Tore down {count} message window(s)");
        }
    }

    /// Number of windows created by this manager that have not been disposed yet.
    pub fn live_count(&self) -> usize {
        self.live_windows.entries.borrow().len()
    }

    pub fn is_tracked(&self, window: &MessageWindow) -> bool {
        self.live_windows.contains(window.core())
    }
}

impl Default for MessageWindowManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MessageWindowManager {
    fn drop(&mut self) {
        self.teardown_all();
    }
}

/// Insertion ordered set of windows not yet disposed.
#[derive(Default, Debug)]
pub(crate) struct LiveWindows {
    entries: RefCell<Vec<Weak<WindowCore>>>,
}

impl LiveWindows {
    fn insert(&self, core: &Rc<WindowCore>) {
        if !self.contains(core) {
            self.entries.borrow_mut().push(Rc::downgrade(core));
        }
    }

    fn contains(&self, core: &Rc<WindowCore>) -> bool {
        self.entries
            .borrow()
            .iter()
            .any(|entry| std::ptr::eq(entry.as_ptr(), Rc::as_ptr(core)))
    }

    pub(crate) fn remove(&self, core: &WindowCore) {
        self.entries
            .borrow_mut()
            .retain(|entry| !std::ptr::eq(entry.as_ptr(), core));
    }

    fn take_first(&self) -> Option<Weak<WindowCore>> {
        let mut entries = self.entries.borrow_mut();
        if entries.is_empty() {
            None
        } else {
            Some(entries.remove(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use more_asserts::*;
    use windows::Win32::UI::WindowsAndMessaging::{
        SendMessageW,
        WM_APP,
    };

    use super::*;

    #[test]
    fn live_count_follows_create_and_destroy() -> Result<()> {
        let manager = MessageWindowManager::new();
        let mut windows = Vec::new();
        for expected_count in 1..=4 {
            windows.push(manager.create(|_: &mut WindowMessage| {})?);
            assert_eq!(manager.live_count(), expected_count);
        }

        manager.destroy(&windows[1]);
        assert_eq!(manager.live_count(), 3);
        assert!(!manager.is_tracked(&windows[1]));

        windows[3].dispose();
        assert_eq!(manager.live_count(), 2);

        drop(windows.remove(0));
        assert_eq!(manager.live_count(), 1);
        assert!(manager.is_tracked(&windows[1]));

        windows.push(manager.create(|_: &mut WindowMessage| {})?);
        assert_eq!(manager.live_count(), 2);
        Ok(())
    }

    #[test]
    fn destroy_untracked_window_is_noop() -> Result<()> {
        let manager = MessageWindowManager::new();
        let other_manager = MessageWindowManager::new();
        let window = other_manager.create(|_: &mut WindowMessage| {})?;

        manager.destroy(&window);

        assert!(!window.is_disposed());
        assert!(other_manager.is_tracked(&window));
        Ok(())
    }

    #[test]
    fn teardown_disposes_everything() -> Result<()> {
        let manager = MessageWindowManager::new();
        let first = manager.create(|_: &mut WindowMessage| {})?;
        let second = manager.create(|_: &mut WindowMessage| {})?;
        let third = manager.create(|_: &mut WindowMessage| {})?;
        manager.destroy(&second);

        manager.teardown_all();

        assert_eq!(manager.live_count(), 0);
        for window in [&first, &second, &third] {
            assert!(window.is_disposed());
            assert_eq!(window.handle(), None);
        }

        manager.destroy(&first);
        manager.destroy(&third);
        manager.teardown_all();
        first.dispose();
        assert_eq!(manager.live_count(), 0);
        Ok(())
    }

    #[test]
    fn teardown_without_windows() {
        let manager = MessageWindowManager::new();
        manager.teardown_all();
        manager.teardown_all();
        assert_eq!(manager.live_count(), 0);
    }

    #[test]
    fn dropping_manager_tears_down() -> Result<()> {
        let manager = MessageWindowManager::new();
        let window = manager.create(|_: &mut WindowMessage| {})?;
        drop(manager);
        assert!(window.is_disposed());
        window.dispose();
        Ok(())
    }

    #[test]
    fn callback_can_create_windows() -> Result<()> {
        let manager = Rc::new(MessageWindowManager::new());
        let created = Rc::new(RefCell::new(Vec::new()));
        let manager_in_callback = Rc::downgrade(&manager);
        let created_in_callback = Rc::clone(&created);
        let window = manager.create(move |message: &mut WindowMessage| {
            if message.message == WM_APP + 4 {
                if let Some(manager) = manager_in_callback.upgrade() {
                    let child = manager
                        .create(|_: &mut WindowMessage| {})
                        .expect("Cannot create window from callback");
                    created_in_callback.borrow_mut().push(child);
                }
            }
        })?;
        let h_wnd = window.handle().expect("Live window should have a handle");
        unsafe { SendMessageW(h_wnd, WM_APP + 4, None, None) };
        assert_eq!(created.borrow().len(), 1);
        assert_ge!(manager.live_count(), 2);
        manager.teardown_all();
        Ok(())
    }

    #[test]
    fn custom_class_is_registered_on_first_create() -> Result<()> {
        let class = WindowClass::new("message_window_test_manager_class");
        let manager = MessageWindowManager::with_class(class);
        assert!(!manager.window_class().is_registered());
        let window = manager.create(|_: &mut WindowMessage| {})?;
        assert!(manager.window_class().is_registered());
        manager.destroy(&window);
        manager.window_class().unregister();
        Ok(())
    }
}
