//! Fail-soft parallel batch execution.
//!
//! Work items are partitioned into contiguous stride-sized groups; groups
//! run concurrently with no ordering guarantee between them, while items
//! within a group run in order on one worker. Every item runs regardless of
//! other items' failures, and the only cross-task state is the shared
//! success flag.

use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

/// Run `op` over every item, `ceil(len / stride)` groups at a time.
///
/// A stride of 0, or a stride covering all items, degenerates to a single
/// sequential pass. Returns false when any item failed.
pub fn run_batches<T, F>(items: &[T], stride: usize, op: F) -> bool
where
    T: Sync,
    F: Fn(&T) -> bool + Sync,
{
    if items.is_empty() {
        return true;
    }

    if stride == 0 || stride >= items.len() {
        let mut success = true;
        for item in items {
            success &= op(item);
        }
        return success;
    }

    let success = AtomicBool::new(true);
    items.par_chunks(stride).for_each(|group| {
        for item in group {
            if !op(item) {
                success.store(false, Ordering::Relaxed);
            }
        }
    });
    success.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_all_items_run() {
        let items: Vec<usize> = (0..5).collect();
        let ran = AtomicUsize::new(0);
        assert!(run_batches(&items, 2, |_| {
            ran.fetch_add(1, Ordering::Relaxed);
            true
        }));
        assert_eq!(ran.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn test_one_failure_does_not_cancel_others() {
        let items: Vec<usize> = (0..5).collect();
        let ran = AtomicUsize::new(0);
        let success = run_batches(&items, 2, |&i| {
            ran.fetch_add(1, Ordering::Relaxed);
            i != 2
        });
        assert!(!success);
        assert_eq!(ran.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn test_stride_zero_is_sequential() {
        let items: Vec<usize> = (0..10).collect();
        let order = std::sync::Mutex::new(Vec::new());
        assert!(run_batches(&items, 0, |&i| {
            order.lock().unwrap().push(i);
            true
        }));
        assert_eq!(*order.lock().unwrap(), items);
    }

    #[test]
    fn test_empty_input_succeeds() {
        let items: Vec<usize> = Vec::new();
        assert!(run_batches(&items, 4, |_| false));
    }

    #[test]
    fn test_large_stride_single_group() {
        let items: Vec<usize> = (0..3).collect();
        let order = std::sync::Mutex::new(Vec::new());
        assert!(run_batches(&items, 32, |&i| {
            order.lock().unwrap().push(i);
            true
        }));
        assert_eq!(*order.lock().unwrap(), items);
    }
}
