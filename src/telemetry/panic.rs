//! Panic payloads and the backtrace of the panicking thread.
//!
//! By the time `catch_unwind` hands us the payload the stack is gone, so a
//! process hook records the backtrace at the panic site. The handler future
//! is polled on the thread that panics and unwinds to the catch on that same
//! thread, which makes a thread-local enough to carry it across.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic;
use std::sync::Once;

thread_local! {
    static LAST_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Chains a backtrace recorder in front of the current panic hook. Idempotent.
pub fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            LAST_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

/// Takes the backtrace recorded by the last panic on this thread.
pub(crate) fn take_backtrace() -> Option<String> {
    LAST_BACKTRACE.with(|slot| slot.borrow_mut().take())
}

/// A recovered handler panic.
#[derive(Debug, thiserror::Error)]
#[error("panic: {0}")]
pub struct PanicError(pub String);

impl PanicError {
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = payload.downcast_ref::<&str>().map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        Self(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_payloads_keep_their_text() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(PanicError::from_payload(&*payload).to_string(), "panic: boom");

        let payload: Box<dyn Any + Send> = Box::new(format!("index {} out of range", 3));
        assert_eq!(PanicError::from_payload(&*payload).to_string(), "panic: index 3 out of range");
    }

    #[test]
    fn opaque_payloads_are_described() {
        let payload: Box<dyn Any + Send> = Box::new(17_u32);
        assert_eq!(PanicError::from_payload(&*payload).to_string(), "panic: non-string panic payload");
    }

    #[test]
    fn hook_records_backtrace_for_this_thread() {
        install_hook();
        let _ = panic::catch_unwind(|| panic!("recorded"));
        assert!(take_backtrace().is_some());
        assert!(take_backtrace().is_none());
    }
}
