use std::cell::UnsafeCell;
use std::io;
use std::mem;
use std::os::raw::c_void;
use std::process;
use std::ptr;

use log::error;

// Pull in only the bits of <ucontext.h> we need
mod sys;
pub use self::sys::ucontext_t;
use self::sys::{getcontext, makecontext, setcontext, swapcontext};

use crate::stack::Stack;

/// Saved machine state of a greenlet that is not running.
///
/// glibc's `ucontext_t` holds pointers into itself once it has been filled
/// in, so it is boxed and never moves afterwards.
pub struct Context {
    ctx: Box<UnsafeCell<ucontext_t>>,
}

impl Context {
    /// A blank context. It is filled in the first time its owner switches away.
    pub fn empty() -> Context {
        Context {
            ctx: Box::new(UnsafeCell::new(unsafe { mem::zeroed() })),
        }
    }

    /// A context which starts running `entry` on `stack` when switched into.
    ///
    /// `entry` must never return: the context has no successor, so returning
    /// would end the thread.
    pub fn prepare(stack: &Stack, entry: extern "C" fn()) -> io::Result<Context> {
        let context = Context::empty();
        let ctx = context.as_ptr();

        unsafe {
            if getcontext(ctx) != 0 {
                return Err(io::Error::last_os_error());
            }

            (*ctx).uc_stack.ss_sp = stack.bottom() as *mut c_void;
            (*ctx).uc_stack.ss_size = stack.size();
            (*ctx).uc_stack.ss_flags = 0;
            (*ctx).uc_link = ptr::null_mut();

            makecontext(ctx, entry, 0);
        }

        Ok(context)
    }

    pub fn as_ptr(&self) -> *mut ucontext_t {
        self.ctx.get()
    }
}

/// Saves the running context into `from` and resumes `to`. Returns once
/// something resumes `from` again.
///
/// # Safety
///
/// `from` and `to` must stay valid until this returns, and `to` must hold a
/// context saved by `switch` or built by `Context::prepare`.
pub unsafe fn switch(from: *mut ucontext_t, to: *const ucontext_t) {
    if swapcontext(from, to) != 0 {
        // nothing sensible can run with half a context switch behind it
        error!("swapcontext() failed: {}", io::Error::last_os_error());
        process::abort();
    }
}

/// Resumes `to`, abandoning the running context for good.
///
/// # Safety
///
/// Same requirements on `to` as `switch`. Nothing on the abandoned stack
/// is dropped.
pub unsafe fn resume(to: *const ucontext_t) -> ! {
    setcontext(to);
    error!("setcontext() failed: {}", io::Error::last_os_error());
    process::abort()
}
