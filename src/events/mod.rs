#[cfg(feature = "desktop")]
pub mod emitter;
pub mod types;

pub use types::*;

use serde::Serialize;

/// Push a change to the frontend. Writes are already committed when this runs, so a
/// missing or failing emitter is logged and otherwise ignored.
pub fn publish<T: Serialize + Clone>(event: &str, payload: T) {
    #[cfg(feature = "desktop")]
    {
        if let Err(e) = emitter::emit(event, payload) {
            log::debug!("[events] '{}' not delivered: {}", event, e);
        }
    }

    #[cfg(not(feature = "desktop"))]
    {
        let _ = payload;
        log::debug!("[events] '{}' published without an emitter", event);
    }
}
