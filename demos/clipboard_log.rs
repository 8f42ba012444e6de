//! Logs clipboard changes using a hidden clipboard viewer window.
//!
//! Quits after a few changes. Set `RUST_LOG=debug` to also see chain relinking.

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    use std::cell::Cell;
    use std::rc::Rc;

    use message_window::MessageWindowManager;
    use message_window::clipboard::ClipboardViewer;
    use message_window::messaging::ThreadMessageLoop;
    use tracing_subscriber::EnvFilter;

    const MAX_CHANGES: u32 = 5;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let manager = MessageWindowManager::new();
    let changes = Rc::new(Cell::new(0_u32));
    let changes_in_viewer = Rc::clone(&changes);
    let viewer = ClipboardViewer::start(&manager, move || {
        let count = changes_in_viewer.get() + 1;
        changes_in_viewer.set(count);
        log::info!("Clipboard changed ({count}/{MAX_CHANGES})");
        if count >= MAX_CHANGES {
            ThreadMessageLoop::post_quit_message();
        }
    })?;
    log::info!(
        "Watching the clipboard with window {:?}, copy something",
        viewer.window().handle()
    );

    ThreadMessageLoop::run()?;

    drop(viewer);
    manager.teardown_all();
    manager.window_class().unregister();
    log::info!("Saw {} clipboard changes", changes.get());
    Ok(())
}

#[cfg(not(windows))]
fn main() {
    eprintln!("This demo only runs on Windows");
}
