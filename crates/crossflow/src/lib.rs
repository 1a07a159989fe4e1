//! Application layer of crossflow: the reactive state the UI is driven by.
//!
//! The domain model lives in `crossflow-lib`; this crate holds the state that
//! sits between it and the widgets. Selection managers track the current
//! track/section, reactive cells hold what the canvas shows, and the image
//! pipeline recomputes the composed background image whenever either changes.

mod datastore;
pub use datastore::{Datastore, FrameDoesNotExistError, SectionParser, TrackParser, VideoReader};
mod image;
pub use image::TrackImageUpdater;
mod plot;
pub use plot::{PlotOptions, TrackPlotter};
mod property;
pub use property::BindableProperty;
mod state;
pub use state::{EmptySelectionInputError, SectionState, TrackState, TrackViewState};
