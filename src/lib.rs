/*!
Hidden Windows message windows with an intercepted window procedure.

A [`MessageWindow`] is an invisible native window whose messages are all passed to a user callback
before they reach the window's original window procedure. Windows are created and tracked by a
[`MessageWindowManager`], which can destroy all remaining windows in one go at shutdown.

With the `clipboard` feature, [`clipboard::ClipboardViewer`] uses such a window to take part in
the legacy clipboard viewer chain.

# Examples

```no_run
# #[cfg(not(windows))] fn main() {}
# #[cfg(windows)] fn main() -> Result<(), message_window::Error> {
use message_window::{MessageWindowManager, WindowMessage};

let manager = MessageWindowManager::new();
let window = manager.create(|message: &mut WindowMessage| {
    println!("Message {:#x} for {:?}", message.message, message.window);
})?;
println!("Hidden window: {:?}", window.handle());
manager.teardown_all();
# Result::<(), message_window::Error>::Ok(())
# }
```
*/

#![cfg(windows)]
#![cfg_attr(all(nightly, doc), feature(doc_auto_cfg))]

pub use error::{
    Error,
    Result,
};
pub use manager::MessageWindowManager;
pub use message::WindowMessage;
pub use window::MessageWindow;
pub use window_class::WindowClass;

#[cfg(feature = "clipboard")]
pub mod clipboard;
mod error;
mod internal;
mod manager;
mod message;
pub mod messaging;
mod module;
mod string;
mod window;
mod window_class;
