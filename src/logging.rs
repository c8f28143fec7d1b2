//! Host-callback log forwarding (spec.md §6 "Logging").
//!
//! This is distinct from the `log` crate diagnostics used elsewhere in the
//! crate (SPEC_FULL.md §4): those are for developers running with
//! `RUST_LOG` set, while this module re-exports the ABI-mandated channel a
//! host tool actually reads — the `fmi2CallbackFunctions::logger` the host
//! supplied at `Instantiate`.
use crate::error::Status;
use fmi_container_sys::{fmi2CallbackFunctions, fmi2ComponentEnvironment, fmi2Status, fmi2String};
use std::ffi::{CStr, CString};
use std::os::raw::c_void;
use std::sync::atomic::{AtomicBool, Ordering};

/// Forwards log messages to the host's callback, tagged with the
/// container's instance name. Suppresses OK-status messages unless
/// `debug` logging is enabled (spec.md §6).
pub struct HostLogger {
    callbacks: fmi2CallbackFunctions,
    instance_name: CString,
    debug: AtomicBool,
}

// Safety: `callbacks` is a set of C function pointers plus an opaque
// environment pointer the host promises is safe to call from any thread
// that respects the ABI's single-call-at-a-time contract; the container
// only ever calls through it while holding the relevant slave or container
// lock.
unsafe impl Send for HostLogger {}
unsafe impl Sync for HostLogger {}

impl HostLogger {
    pub fn new(callbacks: fmi2CallbackFunctions, instance_name: &str, debug: bool) -> Self {
        HostLogger {
            callbacks,
            instance_name: CString::new(instance_name).unwrap_or_else(|_| CString::new("container").expect("static string")),
            debug: AtomicBool::new(debug),
        }
    }

    pub fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::Relaxed);
    }

    pub fn log(&self, status: Status, category: &str, message: &str) {
        if status == Status::Ok && !self.debug.load(Ordering::Relaxed) {
            return;
        }
        let Some(logger) = self.callbacks.logger else {
            return;
        };
        let Ok(category) = CString::new(category) else {
            return;
        };
        let Ok(message) = CString::new(message) else {
            return;
        };
        unsafe {
            logger(
                self.callbacks.componentEnvironment,
                self.instance_name.as_ptr(),
                status.into(),
                category.as_ptr(),
                message.as_ptr(),
            );
        }
    }
}

/// Per-slave context handed to the slave as its `componentEnvironment`, so
/// that slave's own log callback re-tags messages with its identifier
/// before forwarding through the container's [`HostLogger`] (spec.md §3, "a
/// per-slave callback struct... so the slave's log lines are re-tagged").
pub struct SlaveLoggerContext {
    pub host: std::sync::Arc<HostLogger>,
    pub slave_identifier: String,
}

/// # Safety
/// Must only be installed as the `logger` of a [`fmi2CallbackFunctions`]
/// whose `componentEnvironment` is a live `*mut SlaveLoggerContext`
/// produced by [`callbacks_for_slave`].
pub unsafe extern "C" fn slave_log_trampoline(
    component_environment: fmi2ComponentEnvironment,
    _instance_name: fmi2String,
    status: fmi2Status,
    category: fmi2String,
    message: fmi2String,
) {
    if component_environment.is_null() {
        return;
    }
    let ctx = &*(component_environment as *const SlaveLoggerContext);
    let category = c_str_or_empty(category);
    let message = c_str_or_empty(message);
    let tagged = format!("[{}] {message}", ctx.slave_identifier);
    ctx.host.log(status.into(), category, &tagged);
}

unsafe fn c_str_or_empty<'a>(s: fmi2String) -> &'a str {
    if s.is_null() {
        ""
    } else {
        CStr::from_ptr(s).to_str().unwrap_or("")
    }
}

/// Owns a boxed [`SlaveLoggerContext`] and frees it on drop. Must outlive
/// the slave's resolved `Binding`/component — see `slave::Slave`'s field
/// order, which places this after the backend so the component is freed
/// (and can no longer call back into the logger) before the context goes
/// away.
pub struct SlaveLoggerOwner(*mut SlaveLoggerContext);

// Safety: the pointer is exclusively owned; no aliasing beyond the raw
// pointer handed to the loaded slave, which never outlives the owner.
unsafe impl Send for SlaveLoggerOwner {}

impl SlaveLoggerOwner {
    pub fn new(host: std::sync::Arc<HostLogger>, slave_identifier: String) -> Self {
        let boxed = Box::new(SlaveLoggerContext { host, slave_identifier });
        SlaveLoggerOwner(Box::into_raw(boxed))
    }

    /// Build the `fmi2CallbackFunctions` to hand to the slave at
    /// instantiation, wrapping this context as its opaque environment.
    pub fn callbacks(&self) -> fmi2CallbackFunctions {
        fmi2CallbackFunctions {
            logger: Some(slave_log_trampoline),
            allocateMemory: None,
            freeMemory: None,
            stepFinished: None,
            componentEnvironment: self.0 as *mut c_void,
        }
    }
}

impl Drop for SlaveLoggerOwner {
    fn drop(&mut self) {
        unsafe {
            drop(Box::from_raw(self.0));
        }
    }
}
