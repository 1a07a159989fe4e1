use std::{cell::RefCell, rc::Rc};

use ahash::{HashMap, HashMapExt};

/// Token identifying a single registration on a [`Subject`].
///
/// There is no unregister operation; the handle exists so one can be added
/// later without changing the `register` signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

type Callback<V> = Rc<dyn Fn(&V) -> anyhow::Result<()>>;

struct Registry<V> {
    observers: HashMap<ObserverHandle, Callback<V>>,
    next_handle: u64,
}

/// A one-to-many synchronous notification channel.
///
/// Cloning a `Subject` yields another handle to the same registry. The
/// subject owns no value state; it only fans a value out to whoever
/// registered.
///
/// Identity is per registration: closures have no value identity in Rust, so
/// every [`register`](Self::register) call adds a distinct observer, and each
/// registered observer is invoked at most once per [`notify`](Self::notify)
/// call. Registering the same closure through two `register` calls is two
/// observers.
pub struct Subject<V> {
    registry: Rc<RefCell<Registry<V>>>,
}

impl<V> Clone for Subject<V> {
    fn clone(&self) -> Self {
        Self {
            registry: Rc::clone(&self.registry),
        }
    }
}

impl<V> Subject<V> {
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                observers: HashMap::new(),
                next_handle: 0,
            })),
        }
    }

    /// Listen to events on this subject.
    pub fn register(
        &self,
        observer: impl Fn(&V) -> anyhow::Result<()> + 'static,
    ) -> ObserverHandle {
        let mut registry = self.registry.borrow_mut();
        let handle = ObserverHandle(registry.next_handle);
        registry.next_handle += 1;
        registry.observers.insert(handle, Rc::new(observer));
        handle
    }

    /// Invoke every currently registered observer with `value`, in no
    /// particular order.
    ///
    /// An observer that fails aborts delivery to the observers not yet
    /// invoked; the error surfaces to the caller of `notify`. Observers
    /// registered while a delivery is in progress are not seen by that
    /// delivery.
    pub fn notify(&self, value: &V) -> anyhow::Result<()> {
        // Snapshot the registry so observers are free to register on (or
        // re-notify through) this subject without hitting the borrow.
        let observers: Vec<Callback<V>> =
            self.registry.borrow().observers.values().cloned().collect();
        for observer in observers {
            observer(value)?;
        }
        Ok(())
    }

    pub fn observer_count(&self) -> usize {
        self.registry.borrow().observers.len()
    }
}

impl<V> Default for Subject<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        rc::Rc,
    };

    use super::Subject;

    #[test]
    fn notify_reaches_every_observer_exactly_once() {
        let subject = Subject::new();
        let counts = [
            Rc::new(Cell::new(0u32)),
            Rc::new(Cell::new(0u32)),
            Rc::new(Cell::new(0u32)),
        ];
        for count in &counts {
            let count = Rc::clone(count);
            subject.register(move |_: &i32| {
                count.set(count.get() + 1);
                Ok(())
            });
        }

        subject.notify(&7).unwrap();
        for count in &counts {
            assert_eq!(count.get(), 1);
        }

        subject.notify(&8).unwrap();
        for count in &counts {
            assert_eq!(count.get(), 2);
        }
    }

    #[test]
    fn observers_receive_the_notified_value() {
        let subject = Subject::new();
        let seen = Rc::new(Cell::new(0));
        let seen_by_observer = Rc::clone(&seen);
        subject.register(move |value: &i32| {
            seen_by_observer.set(*value);
            Ok(())
        });

        subject.notify(&42).unwrap();
        assert_eq!(seen.get(), 42);
    }

    #[test]
    fn every_registration_is_a_distinct_observer() {
        let subject = Subject::new();
        let count = Rc::new(Cell::new(0u32));

        let observer = {
            let count = Rc::clone(&count);
            move |_: &()| {
                count.set(count.get() + 1);
                Ok(())
            }
        };
        let first = subject.register(observer.clone());
        let second = subject.register(observer);
        assert_ne!(first, second);

        subject.notify(&()).unwrap();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn failing_observer_aborts_delivery() {
        let subject: Subject<()> = Subject::new();
        subject.register(|_| anyhow::bail!("observer broke"));

        let err = subject.notify(&()).unwrap_err();
        assert_eq!(err.to_string(), "observer broke");
    }

    #[test]
    fn registration_during_notify_misses_the_current_delivery() {
        let subject: Subject<()> = Subject::new();
        let late_calls = Rc::new(Cell::new(0u32));

        let inner_subject = subject.clone();
        let late_calls_for_inner = Rc::clone(&late_calls);
        subject.register(move |_| {
            let late_calls = Rc::clone(&late_calls_for_inner);
            inner_subject.register(move |_| {
                late_calls.set(late_calls.get() + 1);
                Ok(())
            });
            Ok(())
        });

        subject.notify(&()).unwrap();
        assert_eq!(late_calls.get(), 0);
        assert_eq!(subject.observer_count(), 2);

        // The late observer takes part in the next delivery. So does the
        // registering one, adding a third.
        subject.notify(&()).unwrap();
        assert_eq!(late_calls.get(), 1);
    }

    #[test]
    fn notify_is_reentrant() {
        let outer: Subject<u32> = Subject::new();
        let inner: Subject<u32> = Subject::new();

        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let log = Rc::clone(&log);
            inner.register(move |value| {
                log.borrow_mut().push(*value);
                Ok(())
            });
        }
        {
            let inner = inner.clone();
            outer.register(move |value| inner.notify(&(value * 10)));
        }

        outer.notify(&4).unwrap();
        assert_eq!(*log.borrow(), vec![40]);
    }

    #[test]
    fn clone_shares_the_registry() {
        let subject = Subject::new();
        let count = Rc::new(Cell::new(0u32));
        {
            let count = Rc::clone(&count);
            subject.register(move |_: &()| {
                count.set(count.get() + 1);
                Ok(())
            });
        }

        let other_handle = subject.clone();
        other_handle.notify(&()).unwrap();
        assert_eq!(count.get(), 1);
        assert_eq!(other_handle.observer_count(), 1);
    }
}
