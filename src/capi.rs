//! C entry points for embedding the runtime.
//!
//! Greenlets are passed around as opaque `GreenletHandle` pointers obtained
//! from `greenlet_new` or `greenlet_current` and given back with
//! `greenlet_release`. Payloads are plain `void *`. Functions returning
//! `int` use 0 for success and -1 for failure; the failure is described by
//! `greenlet_last_error`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use crate::error::{Error, Result};
use crate::greenlet::{current, Builder, Greenlet};
use crate::value::Value;

/// Opaque handle to a greenlet.
pub struct GreenletHandle(Greenlet);

/// Body of a greenlet: receives the first switch's payload and `user`, and
/// returns the payload handed to whoever receives control when it finishes.
pub type GreenletRun = extern "C" fn(arg: *mut c_void, user: *mut c_void) -> *mut c_void;

#[derive(Copy, Clone)]
struct Pointer(*mut c_void);

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = RefCell::new(None);
}

fn set_last_error(message: String) {
    let message = CString::new(message.replace('\0', " ")).ok();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = message);
}

fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

/// Message describing the last failure on this thread, or null. Valid until
/// the next call into this API on the same thread.
#[no_mangle]
pub extern "C" fn greenlet_last_error() -> *const c_char {
    LAST_ERROR.with(|slot| slot.borrow().as_ref().map_or(ptr::null(), |m| m.as_ptr()))
}

fn to_pointer(value: Value) -> *mut c_void {
    value.downcast::<Pointer>().map_or(ptr::null_mut(), |p| p.0)
}

unsafe fn handle<'a>(g: *const GreenletHandle) -> Result<&'a Greenlet> {
    match g.as_ref() {
        Some(handle) => Ok(&handle.0),
        None => Err(Error::usage("null greenlet handle")),
    }
}

fn into_raw(greenlet: Greenlet) -> *mut GreenletHandle {
    Box::into_raw(Box::new(GreenletHandle(greenlet)))
}

/// Runs `f`, turning errors and panics into -1 plus a last-error message.
fn guarded<F>(f: F) -> c_int
where
    F: FnOnce() -> Result<()>,
{
    clear_last_error();
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => 0,
        Ok(Err(err)) => {
            set_last_error(err.to_string());
            -1
        }
        Err(_) => {
            set_last_error("greenlet panicked".to_string());
            -1
        }
    }
}

/// A new handle to the running greenlet.
#[no_mangle]
pub extern "C" fn greenlet_current() -> *mut GreenletHandle {
    into_raw(current())
}

/// Creates a fresh greenlet running `run`. `parent` may be null for the
/// current greenlet. Returns null on failure.
///
/// # Safety
///
/// `parent` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn greenlet_new(
    run: Option<GreenletRun>,
    user: *mut c_void,
    parent: *const GreenletHandle,
) -> *mut GreenletHandle {
    let mut created = ptr::null_mut();
    guarded(|| {
        let run = run.ok_or_else(|| Error::usage("greenlet_new needs a run function"))?;
        let user = Pointer(user);
        let mut builder = Builder::new();
        if !parent.is_null() {
            builder = builder.parent(handle(parent)?);
        }
        let greenlet = builder.spawn(move |arg| {
            let arg = to_pointer(arg);
            Ok(Value::new(Pointer(run(arg, user.0))))
        })?;
        created = into_raw(greenlet);
        Ok(())
    });
    created
}

/// Switches into `g` with `arg`. On success the payload handed back is
/// stored in `*out` (if `out` is not null).
///
/// # Safety
///
/// `g` must be a live handle, `out` null or writable.
#[no_mangle]
pub unsafe extern "C" fn greenlet_switch(
    g: *const GreenletHandle,
    arg: *mut c_void,
    out: *mut *mut c_void,
) -> c_int {
    guarded(|| {
        let back = handle(g)?.switch(Value::new(Pointer(arg)))?;
        if !out.is_null() {
            *out = to_pointer(back);
        }
        Ok(())
    })
}

/// Raises an error carrying `message` inside `g`. A null `message` throws
/// `GreenletExit`.
///
/// # Safety
///
/// `g` must be a live handle, `message` null or a NUL-terminated string,
/// `out` null or writable.
#[no_mangle]
pub unsafe extern "C" fn greenlet_throw(
    g: *const GreenletHandle,
    message: *const c_char,
    out: *mut *mut c_void,
) -> c_int {
    guarded(|| {
        let err = if message.is_null() {
            Error::GreenletExit
        } else {
            Error::msg(CStr::from_ptr(message).to_string_lossy())
        };
        let back = handle(g)?.throw(err)?;
        if !out.is_null() {
            *out = to_pointer(back);
        }
        Ok(())
    })
}

/// Kills `g` and its descendants.
///
/// # Safety
///
/// `g` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn greenlet_kill(g: *const GreenletHandle) -> c_int {
    guarded(|| handle(g)?.kill())
}

/// # Safety
///
/// Both handles must be live.
#[no_mangle]
pub unsafe extern "C" fn greenlet_set_parent(g: *const GreenletHandle, parent: *const GreenletHandle) -> c_int {
    guarded(|| handle(g)?.set_parent(handle(parent)?))
}

/// A new handle to the parent of `g`, or null for a root greenlet.
///
/// # Safety
///
/// `g` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn greenlet_parent(g: *const GreenletHandle) -> *mut GreenletHandle {
    let mut parent = ptr::null_mut();
    guarded(|| {
        if let Some(p) = handle(g)?.parent()? {
            parent = into_raw(p);
        }
        Ok(())
    });
    parent
}

/// # Safety
///
/// `g` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn greenlet_is_dead(g: *const GreenletHandle) -> c_int {
    g.as_ref().map_or(-1, |h| h.0.is_dead() as c_int)
}

/// # Safety
///
/// `g` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn greenlet_is_active(g: *const GreenletHandle) -> c_int {
    g.as_ref().map_or(-1, |h| h.0.is_active() as c_int)
}

/// # Safety
///
/// `g` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn greenlet_is_suspended(g: *const GreenletHandle) -> c_int {
    g.as_ref().map_or(-1, |h| h.0.is_suspended() as c_int)
}

/// Whether two handles name the same greenlet.
///
/// # Safety
///
/// Both must be null or live handles.
#[no_mangle]
pub unsafe extern "C" fn greenlet_same(a: *const GreenletHandle, b: *const GreenletHandle) -> c_int {
    match (a.as_ref(), b.as_ref()) {
        (Some(a), Some(b)) => (a.0 == b.0) as c_int,
        _ => 0,
    }
}

/// Gives a handle back. Dropping the last handle to a suspended greenlet
/// unwinds it.
///
/// # Safety
///
/// `g` must be null or a handle not released before.
#[no_mangle]
pub unsafe extern "C" fn greenlet_release(g: *mut GreenletHandle) {
    if !g.is_null() {
        drop(Box::from_raw(g));
    }
}
