//! Crate error type.

use std::io;

/// Errors returned when setting up message windows or joining the clipboard viewer chain.
///
/// Teardown never returns errors; failures there are logged and ignored.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The window class could not be registered. No message window can be created without it.
    #[error("cannot register window class `{class_name}`")]
    Registration {
        class_name: String,
        #[source]
        source: io::Error,
    },
    /// The native window could not be created or its window procedure could not be substituted.
    ///
    /// Only affects the single creation attempt, other live windows are unaffected.
    #[error("cannot create message window: {context}")]
    WindowCreation {
        context: &'static str,
        #[source]
        source: io::Error,
    },
    /// The window could not be registered as a clipboard viewer.
    #[cfg(feature = "clipboard")]
    #[error("cannot join clipboard viewer chain")]
    ChainJoin(#[source] io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
