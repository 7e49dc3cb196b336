use std::cell::{Cell, RefCell};

use crate::registry::GreenletId;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TraceKind {
    Switch,
    Throw,
}

/// An explicit transfer of control, reported before it happens.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TraceEvent {
    pub kind: TraceKind,
    pub origin: GreenletId,
    pub target: GreenletId,
}

pub type TraceHook = Box<dyn FnMut(&TraceEvent)>;

thread_local! {
    static HOOK: RefCell<Option<TraceHook>> = RefCell::new(None);
    static REPLACED: Cell<bool> = Cell::new(false);
}

/// Installs `hook` for this thread and returns the one it replaces.
///
/// The hook sees every `switch` and `throw` that leaves the running
/// greenlet, in the origin greenlet, before anything about the switch has
/// been recorded. Implicit returns from finished greenlets are not reported.
pub fn settrace(hook: Option<TraceHook>) -> Option<TraceHook> {
    REPLACED.with(|replaced| replaced.set(true));
    HOOK.with(|slot| std::mem::replace(&mut *slot.borrow_mut(), hook))
}

pub(crate) fn emit(event: TraceEvent) {
    // the hook is taken out while it runs so it may call settrace itself
    let hook = HOOK.with(|slot| slot.borrow_mut().take());
    if let Some(mut hook) = hook {
        REPLACED.with(|replaced| replaced.set(false));
        hook(&event);
        if !REPLACED.with(Cell::get) {
            HOOK.with(|slot| *slot.borrow_mut() = Some(hook));
        }
    }
}
