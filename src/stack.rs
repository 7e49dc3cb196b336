use std::io;
use std::ptr::{self, NonNull};

use log::{debug, trace};
use once_cell::sync::Lazy;

use crate::config::MIN_STACK_SIZE;
use crate::error::{Error, Result};

static PAGE_SIZE: Lazy<usize> = Lazy::new(|| {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 {
        4096
    } else {
        size as usize
    }
});

pub fn page_size() -> usize {
    *PAGE_SIZE
}

fn round_to_pages(size: usize) -> usize {
    let page = page_size();
    size.max(MIN_STACK_SIZE).div_ceil(page).saturating_mul(page)
}

/// `Stack` is a page-aligned region of memory suitable for use as a greenlet's stack.
///
/// It's mapped with `mmap()` and unmapped on drop. The lowest page of the
/// mapping is a `PROT_NONE` guard, so running off the end of the stack
/// faults instead of scribbling over whatever lies below it.
pub struct Stack {
    base: NonNull<u8>,
    len: usize,
}

impl Stack {
    /// Maps a stack with at least `size` usable bytes.
    pub fn new(size: usize) -> Result<Stack> {
        let usable = round_to_pages(size);
        let guard = page_size();
        let len = usable.checked_add(guard).ok_or_else(|| Error::ResourceExhausted {
            size: usable,
            source: io::Error::from(io::ErrorKind::OutOfMemory),
        })?;

        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE | libc::MAP_STACK,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(Error::ResourceExhausted {
                size: usable,
                source: io::Error::last_os_error(),
            });
        }

        // the Stack takes ownership of the mapping now, so an mprotect failure unmaps it
        let stack = Stack {
            base: NonNull::new(base as *mut u8).ok_or_else(|| Error::ResourceExhausted {
                size: usable,
                source: io::Error::new(io::ErrorKind::Other, "mmap returned null"),
            })?,
            len,
        };

        if unsafe { libc::mprotect(base, guard, libc::PROT_NONE) } != 0 {
            return Err(Error::ResourceExhausted {
                size: usable,
                source: io::Error::last_os_error(),
            });
        }

        trace!("mapped {}-byte stack at {:p}", usable, stack.bottom());
        Ok(stack)
    }

    /// Lowest usable address, just above the guard page.
    pub fn bottom(&self) -> *mut u8 {
        unsafe { self.base.as_ptr().add(page_size()) }
    }

    /// One past the highest usable address; stacks grow down from here.
    pub fn top(&self) -> *mut u8 {
        unsafe { self.base.as_ptr().add(self.len) }
    }

    /// Usable bytes, not counting the guard page.
    pub fn size(&self) -> usize {
        self.len - page_size()
    }

    /// Whether `addr` falls inside the usable part of this stack.
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.bottom() as usize && addr < self.top() as usize
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base.as_ptr() as *mut libc::c_void, self.len);
        }
    }
}

/// Approximates the stack pointer of the calling frame.
#[inline(never)]
pub(crate) fn approximate_sp() -> usize {
    let marker = 0u8;
    std::hint::black_box(&marker) as *const u8 as usize
}

/// Released stacks waiting to be handed out again.
pub struct StackPool {
    free: Vec<Stack>,
    capacity: usize,
}

impl StackPool {
    pub fn new(capacity: usize) -> StackPool {
        StackPool {
            free: Vec::new(),
            capacity,
        }
    }

    /// Hands out a pooled stack of at least `size_hint` bytes, or maps a new one.
    pub fn allocate(&mut self, size_hint: usize) -> Result<Stack> {
        let wanted = round_to_pages(size_hint);
        if let Some(idx) = self.free.iter().position(|s| s.size() >= wanted) {
            let stack = self.free.swap_remove(idx);
            trace!("reusing {}-byte stack at {:p}", stack.size(), stack.bottom());
            return Ok(stack);
        }
        Stack::new(wanted)
    }

    /// Takes back a stack whose greenlet has fully unwound.
    ///
    /// Must not be called while executing on `stack`.
    pub fn release(&mut self, stack: Stack) {
        debug_assert!(
            !stack.contains(approximate_sp()),
            "releasing the stack we are running on"
        );
        if self.free.len() < self.capacity {
            self.free.push(stack);
        } else {
            debug!("unmapping {}-byte stack at {:p}", stack.size(), stack.bottom());
        }
    }

    /// Drops pooled stacks beyond `capacity`.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.free.truncate(capacity);
    }

    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_round_up_to_pages() {
        let stack = Stack::new(1).unwrap();
        assert_eq!(stack.size(), round_to_pages(MIN_STACK_SIZE));
        assert_eq!(stack.size() % page_size(), 0);
        assert_eq!(stack.top() as usize - stack.bottom() as usize, stack.size());
    }

    #[test]
    fn usable_region_is_writable() {
        let stack = Stack::new(64 * 1024).unwrap();
        unsafe {
            ptr::write_bytes(stack.bottom(), 0xAB, stack.size());
            assert_eq!(*stack.top().sub(1), 0xAB);
        }
    }

    #[test]
    fn contains_checks_bounds() {
        let stack = Stack::new(64 * 1024).unwrap();
        let bottom = stack.bottom() as usize;
        let top = stack.top() as usize;

        assert!(stack.contains(bottom));
        assert!(stack.contains(top - 1));
        assert!(!stack.contains(top));
        // the guard page is not part of the usable stack
        assert!(!stack.contains(bottom - 1));
        assert!(!stack.contains(approximate_sp()));
    }

    #[test]
    fn pool_reuses_and_bounds() {
        let mut pool = StackPool::new(1);
        let a = pool.allocate(64 * 1024).unwrap();
        let b = pool.allocate(64 * 1024).unwrap();
        let a_bottom = a.bottom();

        pool.release(a);
        pool.release(b);
        assert_eq!(pool.len(), 1);

        let again = pool.allocate(32 * 1024).unwrap();
        assert_eq!(again.bottom(), a_bottom);
        assert!(pool.is_empty());

        // too small to satisfy the request, so a fresh mapping is made
        pool.release(again);
        let big = pool.allocate(256 * 1024).unwrap();
        assert!(big.size() >= 256 * 1024);
        assert_eq!(pool.len(), 1);

        pool.set_capacity(0);
        assert!(pool.is_empty());
    }
}
