use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::PeerError;

/// The caller's handle to a connection that has not finished its handshake.
///
/// Settles at most once, with either the connection or the handshake error.
/// Dropping it abandons the handshake without cancelling anything in flight.
pub struct Pending<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

enum Slot<T> {
    Waiting,
    Settled(Result<T, PeerError>),
    Taken,
}

impl<T> Pending<T> {
    pub(crate) fn new() -> (Pending<T>, Completer<T>) {
        let slot = Rc::new(RefCell::new(Slot::Waiting));
        (
            Pending {
                slot: Rc::clone(&slot),
            },
            Completer { slot },
        )
    }

    /// True once the handshake has resolved or rejected (even if the result
    /// was already taken).
    pub fn is_settled(&self) -> bool {
        !matches!(*self.slot.borrow(), Slot::Waiting)
    }

    /// Take the settled result. Returns `None` while the handshake is still
    /// in flight, and `None` again after the result has been taken once.
    pub fn try_take(&self) -> Option<Result<T, PeerError>> {
        let mut slot = self.slot.borrow_mut();
        if !matches!(*slot, Slot::Settled(_)) {
            return None;
        }
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Settled(result) => Some(result),
            _ => None,
        }
    }
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match *self.slot.borrow() {
            Slot::Waiting => "waiting",
            Slot::Settled(_) => "settled",
            Slot::Taken => "taken",
        };
        f.debug_tuple("Pending").field(&state).finish()
    }
}

/// The engine's side of a [`Pending`]. First settle wins.
pub(crate) struct Completer<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

impl<T> Completer<T> {
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    pub fn reject(&self, error: PeerError) -> bool {
        self.settle(Err(error))
    }

    pub fn is_settled(&self) -> bool {
        !matches!(*self.slot.borrow(), Slot::Waiting)
    }

    fn settle(&self, result: Result<T, PeerError>) -> bool {
        let mut slot = self.slot.borrow_mut();
        if matches!(*slot, Slot::Waiting) {
            *slot = Slot::Settled(result);
            true
        } else {
            false
        }
    }
}

impl<T> Clone for Completer<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unsettled() {
        let (pending, _completer) = Pending::<u32>::new();
        assert!(!pending.is_settled());
        assert!(pending.try_take().is_none());
    }

    #[test]
    fn first_settle_wins() {
        let (pending, completer) = Pending::new();
        assert!(completer.resolve(7));
        assert!(!completer.reject(PeerError::NoParentWindow));

        let result = pending.try_take().expect("should be settled");
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn result_can_only_be_taken_once() {
        let (pending, completer) = Pending::<u32>::new();
        completer.reject(PeerError::NoParentWindow);

        assert!(pending.try_take().expect("settled").is_err());
        assert!(pending.try_take().is_none());
        assert!(pending.is_settled());
    }
}
