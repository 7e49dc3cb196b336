use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use log::{debug, trace, warn};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::greenlet::{trampoline, HandleInner};
use crate::stack::{Stack, StackPool};
use crate::ucontext::{ucontext_t, Context};
use crate::value::Value;

/// Process-unique identity of a greenlet.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GreenletId(u64);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl GreenletId {
    fn next() -> GreenletId {
        GreenletId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for GreenletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    /// Created, never switched into.
    Fresh,
    /// Running: the current greenlet of its thread.
    Active,
    /// Started and switched away from.
    Suspended,
    /// Finished, failed, or killed. Holds no stack.
    Dead,
}

/// Status shared between a record and its handles, so it can be read from any thread.
pub(crate) struct StatusCell(AtomicU8);

impl StatusCell {
    fn new(status: Status) -> StatusCell {
        StatusCell(AtomicU8::new(status as u8))
    }

    pub(crate) fn get(&self) -> Status {
        match self.0.load(Ordering::Acquire) {
            0 => Status::Fresh,
            1 => Status::Active,
            2 => Status::Suspended,
            _ => Status::Dead,
        }
    }

    fn set(&self, status: Status) {
        self.0.store(status as u8, Ordering::Release);
    }
}

/// What travels through a switch.
pub(crate) enum Transfer {
    Value(Value),
    /// Raised at the receiving end.
    Throw(Error),
    /// A panic that escaped a greenlet, resumed at the receiving end.
    Panic(Box<dyn Any + Send>),
}

impl Transfer {
    fn is_throw(&self) -> bool {
        matches!(self, Transfer::Throw(_))
    }
}

pub(crate) type Entry = Box<dyn FnOnce(Value) -> Result<Value>>;

pub(crate) struct Record {
    status: Arc<StatusCell>,
    parent: Option<GreenletId>,
    children: Vec<GreenletId>,
    /// Whoever last transferred control into this greenlet.
    invoker: Option<GreenletId>,
    transfer: Option<Transfer>,
    entry: Option<Entry>,
    context: Context,
    stack: Option<Stack>,
    stack_size: usize,
    handle: Weak<HandleInner>,
}

/// Things taken out of the registry that must be dropped after the borrow
/// ends, since their destructors may call back into the runtime.
#[derive(Default)]
#[allow(dead_code)] // never read, only dropped
pub(crate) struct Garbage {
    records: Vec<Record>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
}

/// Result of preparing a switch.
pub(crate) enum Step {
    /// Nothing to switch to; hand this straight back to the caller.
    Immediate(Transfer, Garbage),
    Switch {
        from: *mut ucontext_t,
        to: *const ucontext_t,
    },
}

/// What to do after the last handle of a greenlet went away.
pub(crate) enum Released {
    Keep,
    Reclaimed(Record),
    Kill,
}

/// Every greenlet of one thread, plus that thread's "current" slot.
pub(crate) struct Registry {
    thread: ThreadId,
    config: Config,
    records: FxHashMap<GreenletId, Record>,
    root: GreenletId,
    current: GreenletId,
    pool: StackPool,
    /// Dead greenlets whose stacks are released by whoever runs next.
    dying: Vec<GreenletId>,
    /// Left behind by an implicit return; dropped at the next reap.
    orphans: Garbage,
}

impl Registry {
    pub(crate) fn new(config: Config) -> Registry {
        let root = GreenletId::next();
        let mut records = FxHashMap::default();
        records.insert(
            root,
            Record {
                status: Arc::new(StatusCell::new(Status::Active)),
                parent: None,
                children: Vec::new(),
                invoker: None,
                transfer: None,
                entry: None,
                context: Context::empty(),
                stack: None,
                stack_size: 0,
                handle: Weak::new(),
            },
        );
        let thread = thread_id();
        debug!("root greenlet {} for {:?}", root, thread);

        Registry {
            thread,
            pool: StackPool::new(config.pool_capacity),
            config,
            records,
            root,
            current: root,
            dying: Vec::new(),
            orphans: Garbage::default(),
        }
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn set_config(&mut self, config: Config) {
        self.pool.set_capacity(config.pool_capacity);
        self.config = config;
    }

    pub(crate) fn current(&self) -> GreenletId {
        self.current
    }

    pub(crate) fn root(&self) -> GreenletId {
        self.root
    }

    fn get(&self, id: GreenletId) -> Result<&Record> {
        self.records
            .get(&id)
            .ok_or_else(|| Error::usage(format!("greenlet {} no longer exists", id)))
    }

    fn get_mut(&mut self, id: GreenletId) -> Result<&mut Record> {
        self.records
            .get_mut(&id)
            .ok_or_else(|| Error::usage(format!("greenlet {} no longer exists", id)))
    }

    pub(crate) fn status(&self, id: GreenletId) -> Option<Status> {
        self.records.get(&id).map(|r| r.status.get())
    }

    pub(crate) fn parent(&self, id: GreenletId) -> Result<Option<GreenletId>> {
        Ok(self.get(id)?.parent)
    }

    pub(crate) fn children(&self, id: GreenletId) -> Result<Vec<GreenletId>> {
        Ok(self.get(id)?.children.clone())
    }

    /// Hands out a handle for `id`, sharing the existing one if any is alive.
    pub(crate) fn handle(&mut self, id: GreenletId) -> Result<Arc<HandleInner>> {
        let thread = self.thread;
        let record = self.get_mut(id)?;
        if let Some(inner) = record.handle.upgrade() {
            return Ok(inner);
        }
        let inner = Arc::new(HandleInner::new(id, thread, record.status.clone()));
        record.handle = Arc::downgrade(&inner);
        Ok(inner)
    }

    pub(crate) fn spawn(
        &mut self,
        parent: Option<GreenletId>,
        stack_size: Option<usize>,
        entry: Entry,
    ) -> Arc<HandleInner> {
        let id = GreenletId::next();
        let parent = parent.unwrap_or(self.current);
        let status = Arc::new(StatusCell::new(Status::Fresh));
        let inner = Arc::new(HandleInner::new(id, self.thread, status.clone()));

        if let Some(record) = self.records.get_mut(&parent) {
            record.children.push(id);
        }
        self.records.insert(
            id,
            Record {
                status,
                parent: Some(parent),
                children: Vec::new(),
                invoker: None,
                transfer: None,
                entry: Some(entry),
                context: Context::empty(),
                stack: None,
                stack_size: stack_size.unwrap_or(self.config.stack_size),
                handle: Arc::downgrade(&inner),
            },
        );
        debug!("spawned greenlet {} under {}", id, parent);
        inner
    }

    /// First live greenlet on the way from `id` up to the root.
    fn nearest_live(&self, mut id: GreenletId) -> Option<GreenletId> {
        loop {
            let record = self.records.get(&id)?;
            if record.status.get() != Status::Dead {
                return Some(id);
            }
            id = record.parent?;
        }
    }

    fn resolve_switch_target(&self, target: GreenletId) -> Result<GreenletId> {
        let record = self.get(target)?;
        if record.status.get() != Status::Dead {
            return Ok(target);
        }
        if !self.config.fall_up_on_dead {
            return Err(Error::DeadGreenlet(target));
        }
        record
            .parent
            .and_then(|parent| self.nearest_live(parent))
            .ok_or(Error::DeadGreenlet(target))
    }

    /// Where a switch into `target` would land, or `None` when it completes
    /// without leaving the running greenlet.
    pub(crate) fn peek_target(&self, target: GreenletId, throwing: bool) -> Result<Option<GreenletId>> {
        if throwing && self.get(target)?.status.get() == Status::Dead {
            return Ok(None);
        }
        let resolved = self.resolve_switch_target(target)?;
        if resolved == self.current {
            return Ok(None);
        }
        if throwing && self.status(resolved) == Some(Status::Fresh) {
            return Ok(None);
        }
        Ok(Some(resolved))
    }

    /// Validates and books a switch into `target`.
    ///
    /// On success `payload` has been consumed and, for `Step::Switch`, the
    /// current slot already names the target: the caller must perform the
    /// hardware switch before running anything else. On error nothing has
    /// changed and `payload` is left in place.
    pub(crate) fn prepare_switch(&mut self, target: GreenletId, payload: &mut Option<Transfer>) -> Result<Step> {
        let throwing = payload.as_ref().map_or(false, Transfer::is_throw);
        let origin = self.current;

        let resolved = match self.peek_target(target, throwing)? {
            Some(resolved) => resolved,
            None => return Ok(self.complete_in_place(target, throwing, payload)),
        };

        if self.status(resolved) == Some(Status::Fresh) {
            self.start(resolved)?;
        }

        let payload = take_payload(payload);
        let record = self.get_mut(resolved)?;
        record.transfer = Some(payload);
        record.invoker = Some(origin);
        record.status.set(Status::Active);
        let to = record.context.as_ptr() as *const ucontext_t;

        let record = self.get_mut(origin)?;
        record.status.set(Status::Suspended);
        let from = record.context.as_ptr();

        self.current = resolved;
        trace!("switch {} -> {}", origin, resolved);
        Ok(Step::Switch { from, to })
    }

    fn complete_in_place(&mut self, target: GreenletId, throwing: bool, payload: &mut Option<Transfer>) -> Step {
        let payload = take_payload(payload);
        let mut garbage = Garbage::default();

        if !throwing {
            // switching to ourselves hands the payload straight back
            return Step::Immediate(payload, garbage);
        }

        match self.status(target) {
            Some(Status::Dead) => {
                trace!("throw into dead greenlet {} ignored", target);
                garbage.transfers.push(payload);
                Step::Immediate(Transfer::Value(Value::none()), garbage)
            }
            Some(Status::Fresh) => {
                // never ran, so there is nothing to unwind
                garbage.entries.extend(self.mark_dead(target));
                let back = match payload {
                    Transfer::Throw(Error::GreenletExit) => Transfer::Value(Value::none()),
                    other => other,
                };
                Step::Immediate(back, garbage)
            }
            _ => Step::Immediate(payload, garbage),
        }
    }

    fn start(&mut self, id: GreenletId) -> Result<()> {
        let size = self.get(id)?.stack_size;
        let stack = self.pool.allocate(size)?;
        let context = match Context::prepare(&stack, trampoline) {
            Ok(context) => context,
            Err(source) => {
                self.pool.release(stack);
                return Err(Error::ResourceExhausted { size, source });
            }
        };

        let record = self.get_mut(id)?;
        record.context = context;
        record.stack = Some(stack);
        debug!("starting greenlet {} on a {}-byte stack", id, size);
        Ok(())
    }

    /// Fresh → dead without running. Returns the callable so it is dropped outside the borrow.
    pub(crate) fn mark_dead(&mut self, id: GreenletId) -> Option<Entry> {
        let record = self.records.get_mut(&id)?;
        if record.status.get() != Status::Fresh {
            return None;
        }
        record.status.set(Status::Dead);
        debug!("greenlet {} killed before it ever ran", id);
        record.entry.take()
    }

    /// Picks up what the greenlet now running was handed.
    pub(crate) fn take_transfer(&mut self) -> Transfer {
        match self.records.get_mut(&self.current) {
            Some(record) => take_payload(&mut record.transfer),
            None => Transfer::Value(Value::none()),
        }
    }

    /// Called on a fresh stack: hands over the callable and its first payload.
    pub(crate) fn begin_run(&mut self) -> (Option<Entry>, Transfer) {
        let current = self.current;
        trace!("greenlet {} running", current);
        match self.records.get_mut(&current) {
            Some(record) => (record.entry.take(), take_payload(&mut record.transfer)),
            None => (None, Transfer::Value(Value::none())),
        }
    }

    /// Marks the running greenlet dead and books the implicit switch back to
    /// its invoker. Returns the context to resume.
    pub(crate) fn finish_current(&mut self, outcome: Transfer) -> Option<*const ucontext_t> {
        let me = self.current;
        let (invoker, parent) = {
            let record = self.records.get_mut(&me)?;
            record.status.set(Status::Dead);
            (record.invoker, record.parent)
        };
        self.dying.push(me);

        let mut outcome = outcome;
        let mut next = invoker
            .and_then(|id| self.nearest_live(id))
            .or_else(|| parent.and_then(|id| self.nearest_live(id)))
            .unwrap_or(self.root());

        // a fresh ancestor starts with the outcome as its argument, or dies
        // without running if the outcome is an exception
        while self.status(next) == Some(Status::Fresh) {
            if let Transfer::Value(_) = outcome {
                match self.start(next) {
                    Ok(()) => break,
                    Err(err) => {
                        let value = mem::replace(&mut outcome, Transfer::Throw(err));
                        self.orphans.transfers.push(value);
                    }
                }
            }
            let entry = self.mark_dead(next);
            self.orphans.entries.extend(entry);
            next = self
                .records
                .get(&next)
                .and_then(|r| r.parent)
                .and_then(|id| self.nearest_live(id))
                .unwrap_or(self.root());
        }

        let record = self.records.get_mut(&next)?;
        record.transfer = Some(outcome);
        record.invoker = Some(me);
        record.status.set(Status::Active);
        self.current = next;
        debug!("greenlet {} finished, returning to {}", me, next);
        Some(record.context.as_ptr() as *const ucontext_t)
    }

    /// Releases the stacks of greenlets that died since the last reap.
    pub(crate) fn reap(&mut self) -> Garbage {
        let mut garbage = mem::take(&mut self.orphans);
        for id in mem::take(&mut self.dying) {
            if let Some(stack) = self.records.get_mut(&id).and_then(|r| r.stack.take()) {
                self.pool.release(stack);
            }
            garbage.records.extend(self.collect(id));
        }
        garbage
    }

    pub(crate) fn on_handle_released(&mut self, id: GreenletId) -> Released {
        let record = match self.records.get(&id) {
            Some(record) => record,
            None => return Released::Keep,
        };
        if id == self.root || record.handle.strong_count() > 0 {
            return Released::Keep;
        }
        match record.status.get() {
            Status::Fresh | Status::Dead => match self.collect(id) {
                Some(record) => Released::Reclaimed(record),
                None => Released::Keep,
            },
            Status::Suspended => Released::Kill,
            // reclaimed once it dies
            Status::Active => Released::Keep,
        }
    }

    /// Removes a fresh or dead record nobody holds a handle to. Its children
    /// move up to its parent.
    fn collect(&mut self, id: GreenletId) -> Option<Record> {
        if id == self.root || self.dying.contains(&id) {
            return None;
        }
        let record = self.records.get(&id)?;
        let reclaimable = matches!(record.status.get(), Status::Fresh | Status::Dead);
        if !reclaimable || record.handle.strong_count() > 0 {
            return None;
        }

        self.detach(id);
        let mut record = self.records.remove(&id)?;
        let heir = record
            .parent
            .filter(|p| self.records.contains_key(p))
            .unwrap_or(self.root());
        for child in mem::take(&mut record.children) {
            if let Some(child_record) = self.records.get_mut(&child) {
                child_record.parent = Some(heir);
            }
            if let Some(heir_record) = self.records.get_mut(&heir) {
                heir_record.children.push(child);
            }
            debug!("greenlet {} reparented to {}", child, heir);
        }
        debug!("reclaimed greenlet {}", id);
        Some(record)
    }

    fn detach(&mut self, id: GreenletId) {
        let parent = self.records.get(&id).and_then(|r| r.parent);
        if let Some(parent) = parent.and_then(|p| self.records.get_mut(&p)) {
            parent.children.retain(|&child| child != id);
        }
    }

    pub(crate) fn set_parent(&mut self, child: GreenletId, parent: GreenletId) -> Result<()> {
        self.get(child)?;
        self.get(parent)?;

        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(Error::Cycle { child, parent });
            }
            cursor = self.records.get(&id).and_then(|r| r.parent);
        }

        self.detach(child);
        self.get_mut(child)?.parent = Some(parent);
        self.get_mut(parent)?.children.push(child);
        debug!("greenlet {} reparented to {}", child, parent);
        Ok(())
    }

    /// Live members of the tree under `id`, children before parents.
    pub(crate) fn teardown_order(&self, id: GreenletId) -> Result<Vec<GreenletId>> {
        let mut order = Vec::new();
        self.post_order(id, &mut order)?;
        if order.contains(&self.current) {
            return Err(Error::usage(format!(
                "cannot kill greenlet {}: the running greenlet {} is part of its tree",
                id, self.current
            )));
        }
        order.retain(|&g| self.status(g) != Some(Status::Dead));
        Ok(order)
    }

    fn post_order(&self, id: GreenletId, out: &mut Vec<GreenletId>) -> Result<()> {
        for &child in &self.get(id)?.children {
            self.post_order(child, out)?;
        }
        out.push(id);
        Ok(())
    }

}

impl Drop for Registry {
    fn drop(&mut self) {
        for (id, record) in self.records.iter_mut() {
            if record.status.get() == Status::Suspended {
                if let Some(stack) = record.stack.take() {
                    // frames still live on it; leaking beats freeing them under their feet
                    warn!("thread exiting with greenlet {} suspended; leaking its stack", id);
                    mem::forget(stack);
                }
            }
        }
        discard_deferred(self.thread);
    }
}

fn take_payload(slot: &mut Option<Transfer>) -> Transfer {
    slot.take().unwrap_or_else(|| Transfer::Value(Value::none()))
}

thread_local! {
    static REGISTRY: RefCell<Registry> = RefCell::new(Registry::new(Config::from_env()));
    // no destructor, so it stays readable while the thread is exiting
    static THREAD_ID: Cell<Option<ThreadId>> = const { Cell::new(None) };
}

/// Id of the calling thread, without touching the registry.
pub(crate) fn thread_id() -> ThreadId {
    THREAD_ID.with(|slot| match slot.get() {
        Some(id) => id,
        None => {
            let id = thread::current().id();
            slot.set(Some(id));
            id
        }
    })
}

/// Runs `f` against this thread's registry. `f` must not switch or drop
/// anything that might call back into the runtime.
pub(crate) fn with<R, F>(f: F) -> R
where
    F: FnOnce(&mut Registry) -> R,
{
    REGISTRY.with(|registry| f(&mut registry.borrow_mut()))
}

/// Like `with`, but gives up instead of panicking when the registry is gone
/// (thread exit) or busy.
pub(crate) fn try_with<R, F>(f: F) -> Option<R>
where
    F: FnOnce(&mut Registry) -> R,
{
    REGISTRY
        .try_with(|registry| registry.try_borrow_mut().ok().map(|mut r| f(&mut r)))
        .ok()
        .flatten()
}

// Handles dropped away from their owning thread, waiting for it to pick them up.
static DEFERRED: Lazy<Mutex<FxHashMap<ThreadId, Vec<GreenletId>>>> = Lazy::new(Default::default);
static DEFERRED_COUNT: AtomicUsize = AtomicUsize::new(0);

pub(crate) fn defer_release(thread: ThreadId, id: GreenletId) {
    DEFERRED.lock().entry(thread).or_default().push(id);
    DEFERRED_COUNT.fetch_add(1, Ordering::Release);
    trace!("greenlet {} released off-thread, deferred to {:?}", id, thread);
}

pub(crate) fn take_deferred() -> Vec<GreenletId> {
    if DEFERRED_COUNT.load(Ordering::Acquire) == 0 {
        return Vec::new();
    }
    let ids = DEFERRED.lock().remove(&thread_id()).unwrap_or_default();
    DEFERRED_COUNT.fetch_sub(ids.len(), Ordering::Release);
    ids
}

fn discard_deferred(thread: ThreadId) {
    if DEFERRED_COUNT.load(Ordering::Acquire) == 0 {
        return;
    }
    if let Some(ids) = DEFERRED.lock().remove(&thread) {
        DEFERRED_COUNT.fetch_sub(ids.len(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Entry {
        Box::new(|value: Value| -> Result<Value> { Ok(value) })
    }

    #[test]
    fn spawn_links_children_in_order() {
        let mut r = Registry::new(Config::default());
        let root = r.root();
        let a = r.spawn(None, None, noop());
        let b = r.spawn(None, None, noop());
        let c = r.spawn(Some(a.id()), None, noop());

        assert_eq!(r.children(root).unwrap(), vec![a.id(), b.id()]);
        assert_eq!(r.children(a.id()).unwrap(), vec![c.id()]);
        assert_eq!(r.parent(c.id()).unwrap(), Some(a.id()));
        assert_eq!(r.parent(root).unwrap(), None);
    }

    #[test]
    fn set_parent_rejects_cycles() {
        let mut r = Registry::new(Config::default());
        let root = r.root();
        let a = r.spawn(None, None, noop());
        let b = r.spawn(Some(a.id()), None, noop());
        let c = r.spawn(Some(b.id()), None, noop());

        assert!(matches!(r.set_parent(a.id(), c.id()), Err(Error::Cycle { .. })));
        assert!(matches!(r.set_parent(a.id(), a.id()), Err(Error::Cycle { .. })));
        assert!(matches!(r.set_parent(root, a.id()), Err(Error::Cycle { .. })));
        assert_eq!(r.parent(a.id()).unwrap(), Some(root));
        assert_eq!(r.children(c.id()).unwrap(), vec![]);

        r.set_parent(c.id(), root).unwrap();
        assert_eq!(r.children(b.id()).unwrap(), vec![]);
        assert_eq!(r.children(root).unwrap(), vec![a.id(), c.id()]);
    }

    #[test]
    fn teardown_is_post_order() {
        let mut r = Registry::new(Config::default());
        let p = r.spawn(None, None, noop());
        let c1 = r.spawn(Some(p.id()), None, noop());
        let g = r.spawn(Some(c1.id()), None, noop());
        let c2 = r.spawn(Some(p.id()), None, noop());

        assert_eq!(
            r.teardown_order(p.id()).unwrap(),
            vec![g.id(), c1.id(), c2.id(), p.id()]
        );

        drop(r.mark_dead(c1.id()));
        assert_eq!(r.teardown_order(p.id()).unwrap(), vec![g.id(), c2.id(), p.id()]);

        let root = r.root();
        assert!(matches!(r.teardown_order(root), Err(Error::Usage(_))));
    }

    #[test]
    fn dead_targets_fall_up() {
        let mut r = Registry::new(Config::default());
        let p = r.spawn(None, None, noop());
        let c = r.spawn(Some(p.id()), None, noop());
        drop(r.mark_dead(c.id()));

        assert_eq!(r.resolve_switch_target(c.id()).unwrap(), p.id());
        drop(r.mark_dead(p.id()));
        assert_eq!(r.resolve_switch_target(c.id()).unwrap(), r.root());

        r.set_config(Config::default().fall_up_on_dead(false));
        assert!(matches!(r.resolve_switch_target(c.id()), Err(Error::DeadGreenlet(_))));
    }

    #[test]
    fn collect_reparents_children() {
        let mut r = Registry::new(Config::default());
        let root = r.root();
        let p = r.spawn(None, None, noop());
        let c = r.spawn(Some(p.id()), None, noop());
        let p_id = p.id();

        // still referenced
        assert!(r.collect(p_id).is_none());

        drop(p);
        assert!(r.collect(p_id).is_some());
        assert!(r.status(p_id).is_none());
        assert_eq!(r.parent(c.id()).unwrap(), Some(root));
        assert_eq!(r.children(root).unwrap(), vec![c.id()]);
    }

    #[test]
    fn handles_are_shared() {
        let mut r = Registry::new(Config::default());
        let a = r.spawn(None, None, noop());
        let again = r.handle(a.id()).unwrap();
        assert!(Arc::ptr_eq(&a, &again));

        let root = r.root();
        let first = r.handle(root).unwrap();
        let second = r.handle(root).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
