//! Greenlets: cooperatively scheduled execution contexts, each on its own
//! stack, switched between explicitly.
//!
//! Every thread has an implicit root greenlet. New greenlets are bound to a
//! callable and hang off a parent (the creator's current greenlet unless
//! chosen otherwise). `switch` moves the thread of control into a greenlet
//! together with a payload; whatever is switched back becomes the return
//! value. `throw` resumes a suspended greenlet with an error instead, and
//! `kill` unwinds a whole subtree with `GreenletExit`.
//!
//! When a greenlet's callable finishes, its result goes back to the greenlet
//! that last switched into it.
//!
//! ```
//! use greenlet::{Greenlet, Value};
//!
//! let g = Greenlet::new(|value| {
//!     let x = value.downcast::<u32>().unwrap_or(0);
//!     Ok(Value::new(x + 1))
//! });
//! let back = g.switch(Value::new(41u32)).unwrap();
//! assert_eq!(back.downcast::<u32>().unwrap(), 42);
//! assert!(g.is_dead());
//! ```
//!
//! Stacks are switched with glibc's ucontext functions, so only linux-gnu
//! targets are supported.

pub mod capi;
pub mod config;
mod error;
mod greenlet;
mod registry;
pub mod stack;
mod trace;
mod ucontext;
mod value;

pub use config::Config;
pub use error::{Error, Message, Result};
pub use greenlet::{configure, current, thread_config, Builder, Greenlet};
pub use registry::{GreenletId, Status};
pub use trace::{settrace, TraceEvent, TraceHook, TraceKind};
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example() {
        let main = current();
        let mut log = Vec::new();

        let g = Greenlet::new(move |_| {
            // 2: in greenlet
            main.switch(Value::new(2))?;
            // 4: in greenlet
            Ok(Value::new(4))
        });

        log.push(1); // in caller
        log.push(g.switch(Value::none()).unwrap().downcast::<i32>().unwrap());
        log.push(3); // in caller
        log.push(g.switch(Value::none()).unwrap().downcast::<i32>().unwrap());
        assert_eq!(log, vec![1, 2, 3, 4]);
        assert!(g.is_dead()); // 5: terminated!
    }
}
