use std::rc::Rc;

use crossflow_lib::{TrackId, TrackImage};

use crate::{
    Datastore, EmptySelectionInputError, PlotOptions, TrackPlotter, TrackViewState, VideoReader,
};

/// Keeps [`TrackViewState::background_image`] consistent with the currently
/// available track data and the show-tracks toggle.
///
/// The updater is wired into two event sources: construction registers it on
/// the show-tracks cell, and the bootstrap registers [`notify_tracks`]
/// (wrapped in a clone) as a track-list observer on the datastore. Each
/// triggering event that obtains a base frame publishes exactly one image;
/// events without a base frame leave the previous image in place.
///
/// [`notify_tracks`]: Self::notify_tracks
pub struct TrackImageUpdater<R: VideoReader> {
    datastore: Datastore<R>,
    view_state: TrackViewState<R::Image>,
    plotter: Rc<dyn TrackPlotter<R::Image>>,
    options: Rc<PlotOptions>,
}

impl<R: VideoReader> Clone for TrackImageUpdater<R> {
    fn clone(&self) -> Self {
        Self {
            datastore: self.datastore.clone(),
            view_state: self.view_state.clone(),
            plotter: Rc::clone(&self.plotter),
            options: Rc::clone(&self.options),
        }
    }
}

impl<R: VideoReader + 'static> TrackImageUpdater<R> {
    pub fn new(
        datastore: Datastore<R>,
        view_state: TrackViewState<R::Image>,
        plotter: Rc<dyn TrackPlotter<R::Image>>,
        options: PlotOptions,
    ) -> Self {
        let updater = Self {
            datastore,
            view_state,
            plotter,
            options: Rc::new(options),
        };
        let on_toggle = updater.clone();
        updater
            .view_state
            .show_tracks
            .register(move |_| on_toggle.notify_show_tracks());
        updater
    }

    /// Reaction to a change of the track list: recompute for the first
    /// element. An empty list is a contract violation by the list owner.
    pub fn notify_tracks(&self, tracks: &[TrackId]) -> anyhow::Result<()> {
        let Some(&first) = tracks.first() else {
            return Err(EmptySelectionInputError {
                message: "no tracks changed",
            }
            .into());
        };
        self.update_image(first)
    }

    /// Reaction to the show-tracks toggle. Which track ends up shown is
    /// implementation-defined: the first element of an unordered iteration
    /// over the full track collection. With no tracks this is a no-op.
    fn notify_show_tracks(&self) -> anyhow::Result<()> {
        match self.datastore.get_all_tracks().first() {
            Some(track) => self.update_image(track.id()),
            None => Ok(()),
        }
    }

    fn update_image(&self, track_id: TrackId) -> anyhow::Result<()> {
        let Some(image) = self.datastore.get_image_of_track(&track_id) else {
            tracing::debug!(
                track = track_id.raw(),
                "no base frame available, keeping previous background image"
            );
            return Ok(());
        };
        if self.view_state.show_tracks.get().unwrap_or(false) {
            tracing::trace!(track = track_id.raw(), "recomputing composed background image");
            let overlay = self.plotter.plot(
                &self.datastore.get_all_tracks(),
                &self.datastore.get_all_sections(),
                image.width(),
                image.height(),
                &self.options,
            );
            self.view_state
                .background_image
                .set(Some(image.combine_with(&overlay)))
        } else {
            self.view_state.background_image.set(Some(image))
        }
    }
}
