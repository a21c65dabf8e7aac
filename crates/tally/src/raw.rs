//! Low-level primitives for payload reclamation.
//!
//! Every ledger entry carries a [`Reclaim`] routine monomorphised for the
//! payload type that created it, which lets one address-keyed table serve
//! handles of every payload type.

use std::mem;
use std::ptr::NonNull;

/// Type-erased payload destructor stored in a ledger entry.
pub(crate) type Reclaim = unsafe fn(NonNull<u8>);

/// Drop and deallocate the `Box<T>` living at `base`.
///
/// # Safety
///
/// `base` must have come from `Box::<T>::into_raw` and must not be used
/// again after this call.
pub(crate) unsafe fn reclaim_box<T>(base: NonNull<u8>) {
    // SAFETY: guaranteed by the caller.
    drop(unsafe { Box::from_raw(base.cast::<T>().as_ptr()) });
}

/// Heap slot for a zero-sized payload. The trailing byte gives every
/// payload its own address; `value` sits at offset 0.
#[repr(C)]
struct Padded<T> {
    value: T,
    _pad: u8,
}

/// Drop the payload of a `Padded<T>` slot and free the slot.
///
/// # Safety
///
/// `base` must have come from [`allocate`] for a zero-sized `T` and
/// must not be used again after this call.
unsafe fn reclaim_padded<T>(base: NonNull<u8>) {
    // SAFETY: guaranteed by the caller; `base` is the `Padded<T>` box.
    drop(unsafe { Box::from_raw(base.cast::<Padded<T>>().as_ptr()) });
}

/// Move `value` to the heap and return its address with the matching
/// [`Reclaim`] routine.
///
/// Sized payloads are plain boxes. `Box::new` hands every zero-sized value
/// the same dangling address, so those get a padded slot instead and
/// distinct payloads never share a ledger entry.
pub(crate) fn allocate<T>(value: T) -> (*mut T, Reclaim) {
    if mem::size_of::<T>() == 0 {
        let slot = Box::into_raw(Box::new(Padded { value, _pad: 0 }));
        (slot.cast::<T>(), reclaim_padded::<T>)
    } else {
        (Box::into_raw(Box::new(value)), reclaim_box::<T>)
    }
}

/// Address a pointer lands on after moving `count` elements of `T`.
///
/// Wrapping: the result is never dereferenced here and may leave the
/// original allocation.
pub(crate) fn shifted<T>(ptr: *mut T, count: isize) -> *mut T {
    ptr.wrapping_offset(count)
}

/// [`shifted`] forward by an unsigned element count.
pub(crate) fn shifted_up<T>(ptr: *mut T, count: usize) -> *mut T {
    ptr.wrapping_add(count)
}

/// [`shifted`] backward by an unsigned element count.
pub(crate) fn shifted_down<T>(ptr: *mut T, count: usize) -> *mut T {
    ptr.wrapping_sub(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Flag(Rc<Cell<bool>>);

    impl Drop for Flag {
        fn drop(&mut self) {
            self.0.set(true);
        }
    }

    #[test]
    fn reclaim_box_runs_destructor() {
        let dropped = Rc::new(Cell::new(false));
        let raw = Box::into_raw(Box::new(Flag(dropped.clone())));
        let base = NonNull::new(raw.cast::<u8>()).unwrap();
        // SAFETY: `raw` came from `Box::into_raw` and is not reused.
        unsafe { reclaim_box::<Flag>(base) };
        assert!(dropped.get());
    }

    struct Marker(Rc<Cell<usize>>);

    impl Drop for Marker {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn allocate_gives_zero_sized_payloads_distinct_slots() {
        let (first, reclaim_first) = allocate(());
        let (second, reclaim_second) = allocate(());
        assert_ne!(first, second);
        // SAFETY: both came from `allocate::<()>` and are not reused.
        unsafe {
            reclaim_first(NonNull::new(first.cast::<u8>()).unwrap());
            reclaim_second(NonNull::new(second.cast::<u8>()).unwrap());
        }
    }

    #[test]
    fn allocate_reclaim_drops_sized_payload() {
        let drops = Rc::new(Cell::new(0));
        let (ptr, reclaim) = allocate(Marker(drops.clone()));
        // SAFETY: `ptr` came from `allocate` and is not reused.
        unsafe { reclaim(NonNull::new(ptr.cast::<u8>()).unwrap()) };
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn shifted_moves_by_element_size() {
        let mut words = [0u64; 4];
        let base = words.as_mut_ptr();
        let third = shifted(base, 2);
        assert_eq!(third.addr() - base.addr(), 2 * std::mem::size_of::<u64>());
        assert_eq!(shifted(third, -2), base);
        assert_eq!(shifted_up(base, 2), third);
        assert_eq!(shifted_down(third, 2), base);
    }

    #[test]
    fn unsigned_shifts_wrap_past_isize_range() {
        let mut byte = 0u8;
        let base: *mut u8 = &mut byte;
        let far = shifted_down(base, isize::MAX as usize + 1);
        assert_eq!(far.addr(), base.addr().wrapping_sub(isize::MAX as usize + 1));
        assert_eq!(shifted_up(far, isize::MAX as usize + 1), base);
    }
}
