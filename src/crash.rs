//! Worker-thread crash isolation (§9 "Panics inside worker threads").
//!
//! A panic in a `std::thread::spawn` body already only unwinds that thread,
//! not the process — but left unguarded it is silent. [`guard`] wraps a
//! worker closure so a panic is caught, logged as a structured record (the
//! panic message plus the names of set environment variables, never their
//! values), and turned into a clean return instead of an unobserved thread
//! death.

use std::panic::{self, AssertUnwindSafe};

/// Run `body` under `catch_unwind`, logging a crash record on panic instead
/// of letting the thread die silently. `worker` names the thread in logs.
pub fn guard(worker: &str, body: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(body)) {
        log::error!(
            "worker '{worker}' panicked: {}",
            describe_panic(&payload)
        );
        log::error!("redacted environment snapshot: {}", redacted_env_keys());
    }
}

fn describe_panic(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

/// Names only, never values — a value could carry a token or path fragment
/// a crash log shouldn't retain.
fn redacted_env_keys() -> String {
    let mut keys: Vec<String> = std::env::vars_os()
        .map(|(k, _)| k.to_string_lossy().into_owned())
        .collect();
    keys.sort();
    keys.join(",")
}
