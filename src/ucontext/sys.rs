// glibc's <ucontext.h>, as exposed by the libc crate.

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
compile_error!("greenlet switches stacks with glibc ucontext and only supports linux-gnu targets");

pub use libc::{getcontext, makecontext, setcontext, swapcontext, ucontext_t};
