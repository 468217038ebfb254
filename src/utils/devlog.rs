//! Developer trace lines ("level 6") with an optional thread-local capture sink.
//!
//! Tests enable the sink on their own thread and assert on what was emitted, which avoids
//! racing on the global logger.

use std::cell::RefCell;

thread_local! {
    static TL_SINK: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Disables the thread-local sink on drop.
pub struct DevSinkGuard;
impl Drop for DevSinkGuard {
    fn drop(&mut self) {
        TL_SINK.with(|s| *s.borrow_mut() = None);
    }
}

/// Starts capturing traces emitted on the current thread.
#[must_use]
pub fn enable_thread_sink() -> DevSinkGuard {
    TL_SINK.with(|s| *s.borrow_mut() = Some(Vec::new()));
    DevSinkGuard
}

pub fn write_str(msg: &str) {
    TL_SINK.with(|s| {
        if let Some(buf) = s.borrow_mut().as_mut() {
            buf.push(msg.to_owned());
        }
    });
}

/// Captures `msg` if a sink is enabled and forwards it to the `docrepo::dev6` log target.
pub fn emit(msg: &str) {
    write_str(msg);
    log::log!(target: crate::logger::DEV6_TARGET, log::Level::Trace, "{msg}");
}

/// Returns and clears the captured lines. Empty when no sink is enabled.
pub fn drain() -> Vec<String> {
    TL_SINK.with(|s| s.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
}

pub fn snapshot() -> Vec<String> {
    TL_SINK.with(|s| s.borrow().as_ref().cloned().unwrap_or_default())
}

/// Emits a developer trace line.
#[macro_export]
macro_rules! dev6 {
    ($($arg:tt)*) => {
        $crate::utils::devlog::emit(&format!($($arg)*))
    };
}
