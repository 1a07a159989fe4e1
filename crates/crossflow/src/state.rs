use std::{cell::RefCell, fmt, rc::Rc};

use crossflow_lib::{ObserverHandle, SectionId, Subject, TrackId};

use crate::BindableProperty;

/// Error raised when a list-mutation notification carries an empty list
/// where a first-element selection is required.
///
/// This signals a contract violation by the upstream list owner, not a state
/// the managers recover from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmptySelectionInputError {
    pub message: &'static str,
}

impl fmt::Display for EmptySelectionInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message)
    }
}

impl std::error::Error for EmptySelectionInputError {}

/// The currently selected track.
///
/// Starts with no selection; lives for the process lifetime. Cloning yields
/// another handle to the same state.
pub struct TrackState {
    selected_track: Rc<RefCell<Option<TrackId>>>,
    observers: Subject<Option<TrackId>>,
}

impl Clone for TrackState {
    fn clone(&self) -> Self {
        Self {
            selected_track: Rc::clone(&self.selected_track),
            observers: self.observers.clone(),
        }
    }
}

impl TrackState {
    pub fn new() -> Self {
        Self {
            selected_track: Rc::new(RefCell::new(None)),
            observers: Subject::new(),
        }
    }

    /// Listen to changes of the currently selected track.
    pub fn register(
        &self,
        observer: impl Fn(&Option<TrackId>) -> anyhow::Result<()> + 'static,
    ) -> ObserverHandle {
        self.observers.register(observer)
    }

    pub fn selected_track(&self) -> Option<TrackId> {
        *self.selected_track.borrow()
    }

    /// Select the given track. Re-selecting the current track is a no-op and
    /// does not notify.
    pub fn select(&self, track_id: TrackId) -> anyhow::Result<()> {
        {
            let mut selected = self.selected_track.borrow_mut();
            if *selected == Some(track_id) {
                return Ok(());
            }
            *selected = Some(track_id);
        }
        tracing::debug!(track = track_id.raw(), "track selected");
        self.observers.notify(&Some(track_id))
    }

    /// Reaction to a change of the track list: selects the first element.
    /// Callers control selection priority via list order.
    pub fn notify_tracks(&self, tracks: &[TrackId]) -> anyhow::Result<()> {
        let Some(&first) = tracks.first() else {
            return Err(EmptySelectionInputError {
                message: "no tracks to select",
            }
            .into());
        };
        self.select(first)
    }
}

impl Default for TrackState {
    fn default() -> Self {
        Self::new()
    }
}

/// The currently selected section.
///
/// Same state machine as [`TrackState`], over section ids.
pub struct SectionState {
    selected_section: Rc<RefCell<Option<SectionId>>>,
    observers: Subject<Option<SectionId>>,
}

impl Clone for SectionState {
    fn clone(&self) -> Self {
        Self {
            selected_section: Rc::clone(&self.selected_section),
            observers: self.observers.clone(),
        }
    }
}

impl SectionState {
    pub fn new() -> Self {
        Self {
            selected_section: Rc::new(RefCell::new(None)),
            observers: Subject::new(),
        }
    }

    /// Listen to changes of the currently selected section.
    pub fn register(
        &self,
        observer: impl Fn(&Option<SectionId>) -> anyhow::Result<()> + 'static,
    ) -> ObserverHandle {
        self.observers.register(observer)
    }

    pub fn selected_section(&self) -> Option<SectionId> {
        self.selected_section.borrow().clone()
    }

    /// Select the given section. Re-selecting the current section is a no-op
    /// and does not notify.
    pub fn select(&self, section_id: SectionId) -> anyhow::Result<()> {
        {
            let mut selected = self.selected_section.borrow_mut();
            if selected.as_ref() == Some(&section_id) {
                return Ok(());
            }
            *selected = Some(section_id.clone());
        }
        tracing::debug!(section = %section_id, "section selected");
        self.observers.notify(&Some(section_id))
    }

    /// Reaction to a change of the section list: selects the first element.
    pub fn notify_sections(&self, sections: &[SectionId]) -> anyhow::Result<()> {
        let Some(first) = sections.first() else {
            return Err(EmptySelectionInputError {
                message: "no sections to select",
            }
            .into());
        };
        self.select(first.clone())
    }
}

impl Default for SectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// The information shown on the UI: the composed background image the canvas
/// draws, and whether track overlays are visible.
///
/// The background cell is written by the image pipeline; the show-tracks cell
/// by user toggles.
pub struct TrackViewState<I> {
    pub background_image: BindableProperty<I>,
    pub show_tracks: BindableProperty<bool>,
}

impl<I> Clone for TrackViewState<I> {
    fn clone(&self) -> Self {
        Self {
            background_image: self.background_image.clone(),
            show_tracks: self.show_tracks.clone(),
        }
    }
}

impl<I: Clone> TrackViewState<I> {
    pub fn new() -> Self {
        Self {
            background_image: BindableProperty::new(),
            show_tracks: BindableProperty::new(),
        }
    }
}

impl<I: Clone> Default for TrackViewState<I> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use crossflow_lib::{SectionId, TrackId};

    use super::{EmptySelectionInputError, SectionState, TrackState};

    fn observed(state: &TrackState) -> Rc<RefCell<Vec<Option<TrackId>>>> {
        let notifications = Rc::new(RefCell::new(Vec::new()));
        let inner = Rc::clone(&notifications);
        state.register(move |selected| {
            inner.borrow_mut().push(*selected);
            Ok(())
        });
        notifications
    }

    #[test]
    fn starts_without_a_selection() {
        assert_eq!(TrackState::new().selected_track(), None);
        assert_eq!(SectionState::new().selected_section(), None);
    }

    #[test]
    fn reselecting_the_current_track_does_not_notify() {
        let state = TrackState::new();
        let notifications = observed(&state);

        state.select(TrackId::new(1)).unwrap();
        state.select(TrackId::new(1)).unwrap();
        assert_eq!(*notifications.borrow(), vec![Some(TrackId::new(1))]);
        assert_eq!(state.selected_track(), Some(TrackId::new(1)));
    }

    #[test]
    fn selecting_two_different_tracks_notifies_twice() {
        let state = TrackState::new();
        let notifications = observed(&state);

        state.select(TrackId::new(1)).unwrap();
        state.select(TrackId::new(2)).unwrap();
        assert_eq!(
            *notifications.borrow(),
            vec![Some(TrackId::new(1)), Some(TrackId::new(2))]
        );
        assert_eq!(state.selected_track(), Some(TrackId::new(2)));
    }

    #[test]
    fn notify_tracks_selects_the_first_element() {
        let state = TrackState::new();
        state
            .notify_tracks(&[TrackId::new(7), TrackId::new(8)])
            .unwrap();
        assert_eq!(state.selected_track(), Some(TrackId::new(7)));
    }

    #[test]
    fn notify_tracks_rejects_an_empty_list() {
        let state = TrackState::new();
        let err = state.notify_tracks(&[]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<EmptySelectionInputError>(),
            Some(&EmptySelectionInputError {
                message: "no tracks to select"
            })
        );
        assert_eq!(state.selected_track(), None);
    }

    #[test]
    fn section_state_mirrors_track_state() {
        let state = SectionState::new();
        let notifications = Rc::new(RefCell::new(Vec::new()));
        {
            let inner = Rc::clone(&notifications);
            state.register(move |selected: &Option<SectionId>| {
                inner.borrow_mut().push(selected.clone());
                Ok(())
            });
        }

        state
            .notify_sections(&[SectionId::new("north"), SectionId::new("south")])
            .unwrap();
        state.select(SectionId::new("north")).unwrap();
        assert_eq!(
            *notifications.borrow(),
            vec![Some(SectionId::new("north"))]
        );

        assert!(state.notify_sections(&[]).is_err());
    }

    #[test]
    fn observer_failure_propagates_out_of_select() {
        let state = TrackState::new();
        state.register(|_| anyhow::bail!("observer broke"));

        assert!(state.select(TrackId::new(1)).is_err());
        // The transition itself already happened.
        assert_eq!(state.selected_track(), Some(TrackId::new(1)));
    }
}
