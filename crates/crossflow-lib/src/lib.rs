mod geometry;
pub use geometry::{Coordinate, GeometryError, RelativeOffsetCoordinate};
mod event;
pub use event::EventType;
mod observer;
pub use observer::{ObserverHandle, Subject};
mod section;
pub use section::{NotFoundError, Section, SectionGeometry, SectionId, SectionRepository};
mod track;
pub use track::{
    CalculateTrackClassificationByMaxConfidence, Detection, Track, TrackClassificationCalculator,
    TrackError, TrackId, TrackImage, TrackRepository,
};
