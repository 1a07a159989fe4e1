use std::{cell::RefCell, rc::Rc};

use crossflow_lib::{ObserverHandle, Subject};

/// A single observable value.
///
/// Cloning yields another handle to the same cell. Unlike the selection
/// states, `set` does not deduplicate: storing a value equal to the current
/// one still notifies every observer.
pub struct BindableProperty<V> {
    value: Rc<RefCell<Option<V>>>,
    observers: Subject<Option<V>>,
}

impl<V> Clone for BindableProperty<V> {
    fn clone(&self) -> Self {
        Self {
            value: Rc::clone(&self.value),
            observers: self.observers.clone(),
        }
    }
}

impl<V: Clone> BindableProperty<V> {
    pub fn new() -> Self {
        Self {
            value: Rc::new(RefCell::new(None)),
            observers: Subject::new(),
        }
    }

    /// Listen to every `set` on this cell.
    pub fn register(
        &self,
        observer: impl Fn(&Option<V>) -> anyhow::Result<()> + 'static,
    ) -> ObserverHandle {
        self.observers.register(observer)
    }

    /// Store `value`, then notify all observers with it. The storage borrow
    /// is released before observers run, so they may read the cell.
    pub fn set(&self, value: Option<V>) -> anyhow::Result<()> {
        *self.value.borrow_mut() = value.clone();
        self.observers.notify(&value)
    }

    /// The last value passed to [`set`](Self::set), or `None` if never set.
    pub fn get(&self) -> Option<V> {
        self.value.borrow().clone()
    }
}

impl<V: Clone> Default for BindableProperty<V> {
    fn default() -> Self {
        Self::new()
    }
}
