/*!
Clipboard viewer chain participation.

The legacy clipboard viewer chain is a singly linked list of windows maintained by Windows.
Each member only knows its successor and has to pass chain messages on to it. [`ClipboardViewer`]
joins the chain with a hidden [`MessageWindow`] and takes care of relinking and forwarding.

# Examples

```no_run
use message_window::MessageWindowManager;
use message_window::clipboard::ClipboardViewer;
use message_window::messaging::ThreadMessageLoop;

let manager = MessageWindowManager::new();
let viewer = ClipboardViewer::start(&manager, || println!("Clipboard changed"))?;
assert!(viewer.is_joined());
ThreadMessageLoop::run()?;
# Result::<(), Box<dyn std::error::Error>>::Ok(())
```
*/

use std::cell::Cell;
use std::fmt::{
    Debug,
    Formatter,
};
use std::io;
use std::rc::Rc;

use num_enum::{
    IntoPrimitive,
    TryFromPrimitive,
};
use windows::Win32::Foundation::{
    HWND,
    NO_ERROR,
    SetLastError,
};
use windows::Win32::System::DataExchange::{
    ChangeClipboardChain,
    SetClipboardViewer,
};
use windows::Win32::UI::WindowsAndMessaging::{
    IsWindow,
    SendMessageW,
    WM_CHANGECBCHAIN,
    WM_DESTROY,
    WM_DRAWCLIPBOARD,
};

use crate::error::{
    Error,
    Result,
};
use crate::internal::hwnd_from_param;
use crate::manager::MessageWindowManager;
use crate::message::WindowMessage;
use crate::window::MessageWindow;

/// Message kinds relevant to clipboard chain members.
#[derive(IntoPrimitive, TryFromPrimitive, Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u32)]
pub enum ChainMessageKind {
    /// A member is leaving the chain.
    ///
    /// `w_param` is the window being removed, `l_param` the window following it.
    ChainRelink = WM_CHANGECBCHAIN,
    /// The clipboard content changed.
    ContentChanged = WM_DRAWCLIPBOARD,
    /// The viewer window is being destroyed.
    ViewerDestroyed = WM_DESTROY,
}

/// A decoded chain message.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ChainMessage {
    ChainRelink {
        outgoing: Option<HWND>,
        replacement: Option<HWND>,
    },
    ContentChanged,
    ViewerDestroyed,
}

impl ChainMessage {
    /// Decodes the message, returning `None` for messages unrelated to the clipboard chain.
    pub fn from_window_message(message: &WindowMessage) -> Option<Self> {
        let kind = ChainMessageKind::try_from(message.message).ok()?;
        let decoded = match kind {
            ChainMessageKind::ChainRelink => ChainMessage::ChainRelink {
                outgoing: hwnd_from_param(message.w_param.0),
                replacement: hwnd_from_param(message.l_param.0.cast_unsigned()),
            },
            ChainMessageKind::ContentChanged => ChainMessage::ContentChanged,
            ChainMessageKind::ViewerDestroyed => ChainMessage::ViewerDestroyed,
        };
        Some(decoded)
    }
}

/// Access to the clipboard viewer chain.
///
/// [`SystemClipboardChain`] is the implementation talking to Windows.
pub trait ChainSurface {
    /// Adds the window to the chain, returning the window that is now its successor, if any.
    fn join(&self, viewer: HWND) -> io::Result<Option<HWND>>;

    /// Removes the window from the chain, splicing in `next` as the successor of its predecessor.
    fn leave(&self, viewer: HWND, next: Option<HWND>);

    /// Passes a chain message on unchanged to the next chain member.
    fn forward(&self, next: HWND, message: &WindowMessage);
}

/// The clipboard viewer chain maintained by Windows.
#[derive(Copy, Clone, Default, Debug)]
pub struct SystemClipboardChain;

impl ChainSurface for SystemClipboardChain {
    fn join(&self, viewer: HWND) -> io::Result<Option<HWND>> {
        // A null result is not an error if this is the only viewer. The error code is captured
        // right after the call. Our own window procedure runs for `WM_DRAWCLIPBOARD` during the
        // call, so a last error it leaves behind would still be mistaken for a failure.
        unsafe { SetLastError(NO_ERROR) };
        match unsafe { SetClipboardViewer(viewer) } {
            Ok(next) => Ok(Some(next)),
            Err(err) if err.code() == NO_ERROR.to_hresult() => {
                log::trace!("Joined clipboard chain as only viewer ({err})");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn leave(&self, viewer: HWND, next: Option<HWND>) {
        // The return value only reflects how the chain handled `WM_CHANGECBCHAIN`
        let _ = unsafe { ChangeClipboardChain(viewer, next.unwrap_or_default()) };
    }

    fn forward(&self, next: HWND, message: &WindowMessage) {
        if !unsafe { IsWindow(Some(next)) }.as_bool() {
            log::debug!(
                "Next clipboard viewer {next:?} is gone, dropping message {:#x}",
                message.message
            );
            return;
        }
        unsafe {
            SendMessageW(
                next,
                message.message,
                Some(message.w_param),
                Some(message.l_param),
            )
        };
    }
}

/// State of a [`ClipboardChainParticipant`].
#[derive(Copy, Clone, Eq, PartialEq, Default, Debug)]
pub enum ChainState {
    #[default]
    Unjoined,
    Joined {
        viewer: HWND,
        next: Option<HWND>,
    },
}

/// Clipboard chain protocol logic for one chain member.
///
/// Feed every message of the viewer window to [`Self::handle_message`]. Messages are ignored
/// unless the participant has joined the chain.
///
/// All methods take `&self`. Windows calls back into the viewer window while joining, leaving
/// and forwarding, so the participant must be usable from within those calls. A relink message
/// arriving while a change notification is being forwarded takes effect immediately.
pub struct ClipboardChainParticipant<C = SystemClipboardChain> {
    chain: C,
    state: Cell<ChainState>,
    on_change: Box<dyn Fn()>,
}

impl<C: ChainSurface> ClipboardChainParticipant<C> {
    /// Creates an unjoined participant calling `on_change` whenever the clipboard content changes.
    ///
    /// `on_change` may run nested if it causes another change notification.
    pub fn new<F>(chain: C, on_change: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self {
            chain,
            state: Cell::new(ChainState::Unjoined),
            on_change: Box::new(on_change),
        }
    }

    pub fn state(&self) -> ChainState {
        self.state.get()
    }

    pub fn is_joined(&self) -> bool {
        matches!(self.state.get(), ChainState::Joined { .. })
    }

    /// The next chain member, if joined and not the last member.
    pub fn next(&self) -> Option<HWND> {
        match self.state.get() {
            ChainState::Joined { next, .. } => next,
            ChainState::Unjoined => None,
        }
    }

    /// Joins the chain with the given viewer window.
    ///
    /// Joining again while already joined does nothing. On failure the participant stays unjoined.
    pub fn join(&self, viewer: HWND) -> Result<()> {
        if self.is_joined() {
            return Ok(());
        }
        // Windows sends `WM_DRAWCLIPBOARD` to the new viewer before returning; it is ignored
        // since the successor is not known yet
        let next = self.chain.join(viewer).map_err(Error::ChainJoin)?;
        self.state.set(ChainState::Joined { viewer, next });
        log::debug!("Joined clipboard chain with {viewer:?}, next viewer: {next:?}");
        Ok(())
    }

    /// Leaves the chain, linking the predecessor directly to the current successor.
    ///
    /// Has to happen before the viewer window is destroyed. Does nothing if not joined.
    pub fn leave(&self) {
        if let ChainState::Joined { viewer, next } = self.state.replace(ChainState::Unjoined) {
            self.chain.leave(viewer, next);
            log::debug!("Left clipboard chain with {viewer:?}");
        }
    }

    /// Applies the chain protocol to a message received by the viewer window.
    pub fn handle_message(&self, message: &WindowMessage) {
        let ChainState::Joined { viewer, next } = self.state.get() else {
            return;
        };
        let Some(chain_message) = ChainMessage::from_window_message(message) else {
            return;
        };
        match chain_message {
            ChainMessage::ChainRelink {
                outgoing,
                replacement,
            } => {
                if outgoing == next {
                    log::debug!("Next clipboard viewer changed from {next:?} to {replacement:?}");
                    self.state.set(ChainState::Joined {
                        viewer,
                        next: replacement,
                    });
                } else {
                    self.forward(next, message);
                }
            }
            ChainMessage::ContentChanged => {
                (self.on_change)();
                // Reread, the observer may have caused a relink
                self.forward(self.next(), message);
            }
            ChainMessage::ViewerDestroyed if message.window == viewer => {
                log::debug!("Viewer window {viewer:?} destroyed while joined, leaving chain");
                self.leave();
            }
            ChainMessage::ViewerDestroyed => {}
        }
    }

    fn forward(&self, next: Option<HWND>, message: &WindowMessage) {
        if let Some(next) = next {
            log::trace!("Forwarding message {:#x} to {next:?}", message.message);
            self.chain.forward(next, message);
        }
    }
}

impl<C: Debug> Debug for ClipboardChainParticipant<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipboardChainParticipant")
            .field("chain", &self.chain)
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

/// A hidden window registered as a clipboard viewer.
///
/// Dropping the viewer leaves the chain and then destroys the window, in that order.
pub struct ClipboardViewer {
    participant: Rc<ClipboardChainParticipant>,
    window: MessageWindow,
}

impl ClipboardViewer {
    /// Creates a message window and joins the clipboard viewer chain with it.
    ///
    /// `on_change` is called on every clipboard change while the viewer is joined.
    ///
    /// If joining fails, the window is destroyed again and the error returned. To keep a passive
    /// unjoined window instead, use [`Self::create`] followed by [`Self::join`].
    pub fn start<F>(manager: &MessageWindowManager, on_change: F) -> Result<Self>
    where
        F: Fn() + 'static,
    {
        let viewer = Self::create(manager, on_change)?;
        viewer.join()?;
        Ok(viewer)
    }

    /// Creates the message window without joining the chain.
    pub fn create<F>(manager: &MessageWindowManager, on_change: F) -> Result<Self>
    where
        F: Fn() + 'static,
    {
        let participant = Rc::new(ClipboardChainParticipant::new(
            SystemClipboardChain,
            on_change,
        ));
        let participant_in_window = Rc::clone(&participant);
        let window = manager.create(move |message: &mut WindowMessage| {
            participant_in_window.handle_message(message);
        })?;
        Ok(Self {
            participant,
            window,
        })
    }

    /// Joins the chain. Does nothing if already joined.
    pub fn join(&self) -> Result<()> {
        let viewer = self.window.handle().ok_or_else(|| {
            Error::ChainJoin(io::Error::new(
                io::ErrorKind::NotFound,
                "Viewer window has been destroyed",
            ))
        })?;
        self.participant.join(viewer)
    }

    /// Leaves the chain while keeping the window alive.
    pub fn leave(&self) {
        self.participant.leave();
    }

    pub fn is_joined(&self) -> bool {
        self.participant.is_joined()
    }

    pub fn next(&self) -> Option<HWND> {
        self.participant.next()
    }

    pub fn window(&self) -> &MessageWindow {
        &self.window
    }
}

impl Drop for ClipboardViewer {
    fn drop(&mut self) {
        self.participant.leave();
        self.window.dispose();
    }
}

impl Debug for ClipboardViewer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipboardViewer")
            .field("participant", &self.participant)
            .field("window", &self.window)
            .finish()
    }
}
