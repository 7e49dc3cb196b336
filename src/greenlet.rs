use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::process;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use log::{debug, error, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::registry::{self, GreenletId, Released, Status, StatusCell, Step, Transfer};
use crate::trace::{self, TraceEvent, TraceKind};
use crate::ucontext;
use crate::value::Value;

/// A handle to a greenlet.
///
/// Handles are cheap to clone and can be sent to other threads, but only
/// the thread that created a greenlet can switch into it. When the last
/// handle to a suspended greenlet is dropped, `GreenletExit` is thrown into
/// it so its frames unwind before the stack goes away.
#[derive(Clone)]
pub struct Greenlet {
    inner: Arc<HandleInner>,
}

pub(crate) struct HandleInner {
    id: GreenletId,
    thread: ThreadId,
    status: Arc<StatusCell>,
}

impl HandleInner {
    pub(crate) fn new(id: GreenletId, thread: ThreadId, status: Arc<StatusCell>) -> HandleInner {
        HandleInner { id, thread, status }
    }

    pub(crate) fn id(&self) -> GreenletId {
        self.id
    }
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        if registry::thread_id() == self.thread {
            release(self.id)
        } else {
            registry::defer_release(self.thread, self.id)
        }
    }
}

/// Spawns greenlets with a chosen parent or stack size.
#[derive(Default)]
pub struct Builder {
    parent: Option<Greenlet>,
    stack_size: Option<usize>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Parent of the new greenlet. Defaults to the current greenlet.
    pub fn parent(mut self, parent: &Greenlet) -> Builder {
        self.parent = Some(parent.clone());
        self
    }

    /// Usable stack size. Defaults to the thread's `Config::stack_size`.
    pub fn stack_size(mut self, size: usize) -> Builder {
        self.stack_size = Some(size);
        self
    }

    /// Creates a fresh greenlet bound to `f`. Nothing runs until it is
    /// first switched into; the payload of that switch becomes `f`'s argument.
    pub fn spawn<F>(self, f: F) -> Result<Greenlet>
    where
        F: FnOnce(Value) -> Result<Value> + 'static,
    {
        run_deferred_releases();

        let parent = match &self.parent {
            Some(parent) => {
                parent.check_thread()?;
                if parent.is_dead() {
                    return Err(Error::DeadGreenlet(parent.id()));
                }
                Some(parent.id())
            }
            None => None,
        };

        let inner = registry::with(|r| r.spawn(parent, self.stack_size, Box::new(f)));
        Ok(Greenlet { inner })
    }
}

impl Greenlet {
    /// Creates a fresh greenlet bound to `f`, parented to the current greenlet.
    pub fn new<F>(f: F) -> Greenlet
    where
        F: FnOnce(Value) -> Result<Value> + 'static,
    {
        run_deferred_releases();
        let inner = registry::with(|r| r.spawn(None, None, Box::new(f)));
        Greenlet { inner }
    }

    pub fn builder() -> Builder {
        Builder::new()
    }

    pub fn id(&self) -> GreenletId {
        self.inner.id()
    }

    pub fn status(&self) -> Status {
        self.inner.status.get()
    }

    pub fn is_fresh(&self) -> bool {
        self.status() == Status::Fresh
    }

    /// Whether this is the greenlet running right now on its thread.
    pub fn is_active(&self) -> bool {
        self.status() == Status::Active
    }

    pub fn is_suspended(&self) -> bool {
        self.status() == Status::Suspended
    }

    pub fn is_dead(&self) -> bool {
        self.status() == Status::Dead
    }

    /// Started and not yet dead.
    pub fn is_started(&self) -> bool {
        matches!(self.status(), Status::Active | Status::Suspended)
    }

    /// Transfers control into this greenlet, handing it `value`.
    ///
    /// Returns whatever is handed back when something next switches into
    /// the caller, or the error raised there. A panic that escaped a
    /// greenlet is resumed here.
    ///
    /// A fresh greenlet starts with `value` as its argument. A dead one
    /// passes control on to its nearest live ancestor, unless the thread is
    /// configured to fail with `Error::DeadGreenlet` instead. Switching to
    /// the current greenlet returns `value` at once.
    pub fn switch(&self, value: Value) -> Result<Value> {
        self.check_thread()?;
        deliver(switch_into(self.id(), Transfer::Value(value), TraceKind::Switch)?)
    }

    /// Resumes this greenlet by raising `err` at the point where it is
    /// suspended, instead of returning a value there.
    ///
    /// Throwing into a dead greenlet does nothing. A fresh greenlet dies
    /// without running: `GreenletExit` is swallowed, any other error comes
    /// straight back. Throwing into the current greenlet returns `err`
    /// without switching, so an installed trace hook is not called for it.
    pub fn throw(&self, err: Error) -> Result<Value> {
        self.check_thread()?;
        deliver(switch_into(self.id(), Transfer::Throw(err), TraceKind::Throw)?)
    }

    /// Tears down this greenlet and everything below it.
    ///
    /// `GreenletExit` is thrown into each suspended member of the tree
    /// exactly once, children before parents; fresh ones are marked dead.
    /// Stops at the first error other than `GreenletExit` that comes back.
    /// Refuses to run if the current greenlet is part of the tree.
    pub fn kill(&self) -> Result<()> {
        self.check_thread()?;
        run_deferred_releases();

        let order = registry::with(|r| r.teardown_order(self.id()))?;
        debug!("killing greenlet {}: {} live members", self.id(), order.len());
        for id in order {
            match registry::with(|r| r.status(id)) {
                Some(Status::Fresh) => drop(registry::with(|r| r.mark_dead(id))),
                Some(Status::Suspended) => {
                    let back = switch_into(id, Transfer::Throw(Error::GreenletExit), TraceKind::Throw)?;
                    match deliver(back) {
                        Ok(_) | Err(Error::GreenletExit) => {}
                        Err(err) => return Err(err),
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn parent(&self) -> Result<Option<Greenlet>> {
        self.check_thread()?;
        registry::with(|r| {
            let parent = match r.parent(self.id())? {
                Some(parent) => parent,
                None => return Ok(None),
            };
            Ok(Some(Greenlet { inner: r.handle(parent)? }))
        })
    }

    /// Reattaches this greenlet under `parent`.
    ///
    /// Fails with `Error::Cycle` if `parent` is this greenlet or one of its
    /// descendants, and with `Error::ForeignThread` if either lives on
    /// another thread. The tree is unchanged on failure.
    pub fn set_parent(&self, parent: &Greenlet) -> Result<()> {
        self.check_thread()?;
        parent.check_thread()?;
        registry::with(|r| r.set_parent(self.id(), parent.id()))
    }

    /// Children in the order they were attached.
    pub fn children(&self) -> Result<Vec<Greenlet>> {
        self.check_thread()?;
        registry::with(|r| {
            r.children(self.id())?
                .into_iter()
                .map(|id| r.handle(id).map(|inner| Greenlet { inner }))
                .collect()
        })
    }

    fn check_thread(&self) -> Result<()> {
        if registry::thread_id() == self.inner.thread {
            Ok(())
        } else {
            Err(Error::ForeignThread(self.id()))
        }
    }
}

impl PartialEq for Greenlet {
    fn eq(&self, other: &Greenlet) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Greenlet {}

impl Hash for Greenlet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state)
    }
}

impl fmt::Debug for Greenlet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Greenlet")
            .field("id", &self.id())
            .field("status", &self.status())
            .finish()
    }
}

/// The greenlet running right now on this thread.
pub fn current() -> Greenlet {
    registry::with(|r| {
        let current = r.current();
        match r.handle(current) {
            Ok(inner) => Greenlet { inner },
            Err(err) => unreachable!("current greenlet {} has no record: {}", current, err),
        }
    })
}

/// Replaces this thread's configuration. Affects stacks allocated from now on.
pub fn configure(config: Config) {
    registry::with(|r| r.set_config(config));
}

/// This thread's configuration.
pub fn thread_config() -> Config {
    registry::with(|r| r.config().clone())
}

fn deliver(transfer: Transfer) -> Result<Value> {
    match transfer {
        Transfer::Value(value) => Ok(value),
        Transfer::Throw(err) => Err(err),
        Transfer::Panic(payload) => panic::resume_unwind(payload),
    }
}

/// The switch protocol. `Err` means the switch never happened; `Ok` carries
/// whatever was handed back, which may itself be an exception.
fn switch_into(target: GreenletId, payload: Transfer, kind: TraceKind) -> Result<Transfer> {
    run_deferred_releases();

    let throwing = matches!(payload, Transfer::Throw(_));
    let peeked = registry::with(|r| r.peek_target(target, throwing).map(|to| (r.current(), to)));
    if let Ok((origin, Some(to))) = peeked {
        trace::emit(TraceEvent { kind, origin, target: to });
    }

    let mut payload = Some(payload);
    let step = registry::with(|r| r.prepare_switch(target, &mut payload));
    // anything left over is dropped here, outside the registry borrow
    let (from, to) = match step {
        Err(err) => {
            drop(payload);
            return Err(err);
        }
        Ok(Step::Immediate(back, garbage)) => {
            drop(garbage);
            return Ok(back);
        }
        Ok(Step::Switch { from, to }) => (from, to),
    };

    unsafe { ucontext::switch(from, to) };

    // something switched back into us
    let (back, garbage) = registry::with(|r| {
        let garbage = r.reap();
        (r.take_transfer(), garbage)
    });
    drop(garbage);
    Ok(back)
}

/// First frame of every greenlet's stack.
pub(crate) extern "C" fn trampoline() {
    let outcome = {
        let (entry, payload, garbage) = registry::with(|r| {
            let garbage = r.reap();
            let (entry, payload) = r.begin_run();
            (entry, payload, garbage)
        });
        drop(garbage);

        match (entry, payload) {
            (Some(entry), Transfer::Value(value)) => run(entry, value),
            (_, Transfer::Value(_)) => Transfer::Throw(Error::usage("greenlet started without a callable")),
            (_, Transfer::Throw(Error::GreenletExit)) => Transfer::Value(Value::none()),
            (_, other) => other,
        }
    };

    // nothing with a destructor may be left in this frame past this point:
    // the stack is abandoned, not unwound
    let next = registry::with(|r| r.finish_current(outcome));
    match next {
        Some(to) => unsafe { ucontext::resume(to) },
        None => {
            error!("finished greenlet has nowhere to return to");
            process::abort()
        }
    }
}

fn run(entry: registry::Entry, value: Value) -> Transfer {
    match panic::catch_unwind(AssertUnwindSafe(move || entry(value))) {
        Ok(Ok(value)) => Transfer::Value(value),
        // a clean exit, not an error
        Ok(Err(Error::GreenletExit)) => Transfer::Value(Value::none()),
        Ok(Err(err)) => Transfer::Throw(err),
        Err(payload) => Transfer::Panic(payload),
    }
}

/// Called when the last handle to `id` is dropped on its own thread.
fn release(id: GreenletId) {
    let action = match registry::try_with(|r| r.on_handle_released(id)) {
        Some(action) => action,
        None => return,
    };

    match action {
        Released::Keep => {}
        Released::Reclaimed(record) => drop(record),
        Released::Kill => {
            if thread::panicking() {
                warn!("not tearing down suspended greenlet {} while panicking", id);
                return;
            }
            debug!("last handle to suspended greenlet {} dropped, throwing GreenletExit", id);
            match switch_into(id, Transfer::Throw(Error::GreenletExit), TraceKind::Throw) {
                Ok(Transfer::Value(_)) | Ok(Transfer::Throw(Error::GreenletExit)) => {}
                Ok(Transfer::Throw(err)) => warn!("greenlet {} raised during teardown: {}", id, err),
                Ok(Transfer::Panic(_)) => warn!("greenlet {} panicked during teardown", id),
                Err(err) => warn!("could not tear down greenlet {}: {}", id, err),
            }
            if registry::try_with(|r| r.status(id)) == Some(Some(Status::Suspended)) {
                debug!("greenlet {} survived GreenletExit", id);
            }
        }
    }
}

fn run_deferred_releases() {
    for id in registry::take_deferred() {
        release(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn current_is_root_outside_greenlets() {
        init();
        let main = current();
        assert!(main.is_active());
        assert_eq!(main.parent().unwrap(), None);
        assert_eq!(current(), main);
    }

    #[test]
    fn switch_returns_what_the_callable_returns() {
        init();
        let g = Greenlet::new(|value| {
            let x = value.downcast::<u32>().map_err(|_| Error::msg("expected a u32"))?;
            Ok(Value::new(x + 1))
        });
        assert!(g.is_fresh());

        let back = g.switch(Value::new(41u32)).unwrap();
        assert_eq!(back.downcast::<u32>().unwrap(), 42);
        assert!(g.is_dead());
        assert!(current().is_active());
    }

    #[test]
    fn status_inside_and_outside() {
        init();
        let main = current();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let g = {
            let seen = seen.clone();
            let main = main.clone();
            Greenlet::new(move |_| {
                let me = current();
                seen.borrow_mut().push((me.is_active(), main.is_suspended()));
                main.switch(Value::none())?;
                Ok(Value::none())
            })
        };

        g.switch(Value::none()).unwrap();
        assert_eq!(*seen.borrow(), vec![(true, true)]);
        assert!(g.is_suspended());
        assert!(g.is_started());
        assert!(main.is_active());

        g.switch(Value::none()).unwrap();
        assert!(g.is_dead());
        assert!(!g.is_started());
    }

    #[test]
    fn switching_to_self_hands_the_value_back() {
        init();
        let back = current().switch(Value::new("same")).unwrap();
        assert_eq!(back.downcast::<&str>().unwrap(), "same");
    }

    #[test]
    fn foreign_thread_handles_are_rejected() {
        init();
        let g = Greenlet::new(Ok);
        let main = current();
        let (g2, main2) = (g.clone(), main.clone());

        let (switched, reparented) = thread::spawn(move || {
            let switched = g2.switch(Value::none());
            let reparented = current().set_parent(&main2);
            (
                matches!(switched, Err(Error::ForeignThread(_))),
                matches!(reparented, Err(Error::ForeignThread(_))),
            )
        })
        .join()
        .unwrap();

        assert!(switched);
        assert!(reparented);
        assert!(g.is_fresh());
    }

    #[test]
    fn configure_is_per_thread() {
        init();
        configure(Config::default().stack_size(64 * 1024));
        assert_eq!(thread_config().stack_size, 64 * 1024);

        let other = thread::spawn(|| thread_config().stack_size).join().unwrap();
        assert_eq!(other, Config::from_env().stack_size);
    }
}
