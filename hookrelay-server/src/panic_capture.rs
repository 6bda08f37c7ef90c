//! Panic-to-error conversion for the Handler Runner (§4.4 step 4, §9 "panic
//! isolation"): wraps a handler invocation so an unwound panic never crosses
//! the task boundary, converting it into a [`hookrelay_core::HandlerError`]
//! with the captured stack trace.
//!
//! The default Rust panic hook only prints to stderr; to recover the stack
//! trace alongside the payload we install a custom hook once at startup that
//! stashes the formatted backtrace in a thread-local, then read it back
//! immediately after `catch_unwind` reports an `Err`.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};

use futures::FutureExt;

use hookrelay_core::HandlerError;

thread_local! {
    static LAST_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Install the capturing panic hook. Call exactly once, from `main.rs`,
/// before the server starts accepting dispatch work.
pub fn install() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let backtrace = std::backtrace::Backtrace::force_capture().to_string();
        LAST_BACKTRACE.with(|cell| *cell.borrow_mut() = Some(backtrace));
        previous(info);
    }));
}

/// Run `fut` under panic isolation, converting any unwound panic into a
/// [`HandlerError`] with message `panic caught: <value>. stack is: <trace>`
/// (§4.4 step 4). A handler's own `Err` return passes through unchanged.
pub async fn run_isolated<F>(fut: F) -> Result<(), HandlerError>
where
    F: std::future::Future<Output = Result<(), HandlerError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(panic_payload) => {
            let value = panic_message(&panic_payload);
            let stack = LAST_BACKTRACE.with(|cell| cell.borrow_mut().take()).unwrap_or_default();
            Err(HandlerError::from_panic(&value, &stack))
        }
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
