use std::{
    cell::RefCell,
    fmt,
    path::{Path, PathBuf},
    rc::Rc,
};

use ahash::{HashMap, HashMapExt};
use crossflow_lib::{
    NotFoundError, ObserverHandle, Section, SectionId, SectionRepository, Subject, Track, TrackId,
    TrackImage, TrackRepository,
};

/// Parses track files into domain tracks plus the video they were detected
/// on. Implemented outside this core, next to the file formats.
pub trait TrackParser {
    fn parse(&self, file: &Path) -> anyhow::Result<(Vec<Track>, PathBuf)>;
}

/// Parses and serializes section files. The serialized form is the mapping
/// produced by [`Section::serialize`]; durability is the implementor's
/// concern.
pub trait SectionParser {
    fn parse(&self, file: &Path) -> anyhow::Result<Vec<Section>>;
    fn serialize(&self, sections: &[Section], file: &Path) -> anyhow::Result<()>;
}

/// Decodes single frames out of a video file.
///
/// This is a synchronous call into an external collaborator; it blocks the
/// event loop for its duration.
pub trait VideoReader {
    type Image: TrackImage;

    /// Get the frame of `video` at `index`.
    fn get_frame(&self, video: &Path, index: u32) -> anyhow::Result<Self::Image>;
}

/// Error for a frame index past the end of the video, for [`VideoReader`]
/// implementations to return.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameDoesNotExistError {
    pub index: u32,
}

impl fmt::Display for FrameDoesNotExistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame number '{}' does not exist", self.index)
    }
}

impl std::error::Error for FrameDoesNotExistError {}

/// Central access point to the loaded domain data.
///
/// Owns the repositories and the parser/reader collaborators. Cloning yields
/// another handle to the same data. Load operations fire the list-mutation
/// notifications downstream state reacts to; notifications run after all
/// interior borrows are released, so observers are free to read back.
pub struct Datastore<R: VideoReader> {
    track_repository: TrackRepository,
    section_repository: Rc<RefCell<SectionRepository>>,
    section_observers: Subject<Vec<SectionId>>,
    track_parser: Rc<dyn TrackParser>,
    section_parser: Rc<dyn SectionParser>,
    video_reader: Rc<R>,
    track_videos: Rc<RefCell<HashMap<TrackId, PathBuf>>>,
}

impl<R: VideoReader> Clone for Datastore<R> {
    fn clone(&self) -> Self {
        Self {
            track_repository: self.track_repository.clone(),
            section_repository: Rc::clone(&self.section_repository),
            section_observers: self.section_observers.clone(),
            track_parser: Rc::clone(&self.track_parser),
            section_parser: Rc::clone(&self.section_parser),
            video_reader: Rc::clone(&self.video_reader),
            track_videos: Rc::clone(&self.track_videos),
        }
    }
}

impl<R: VideoReader> Datastore<R> {
    pub fn new(
        track_parser: Rc<dyn TrackParser>,
        section_parser: Rc<dyn SectionParser>,
        video_reader: Rc<R>,
    ) -> Self {
        Self {
            track_repository: TrackRepository::new(),
            section_repository: Rc::new(RefCell::new(SectionRepository::new())),
            section_observers: Subject::new(),
            track_parser,
            section_parser,
            video_reader,
            track_videos: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Listen to changes of the track list.
    pub fn register_tracks_observer(
        &self,
        observer: impl Fn(&Vec<TrackId>) -> anyhow::Result<()> + 'static,
    ) -> ObserverHandle {
        self.track_repository.register_tracks_observer(observer)
    }

    /// Listen to changes of the section list.
    pub fn register_sections_observer(
        &self,
        observer: impl Fn(&Vec<SectionId>) -> anyhow::Result<()> + 'static,
    ) -> ObserverHandle {
        self.section_observers.register(observer)
    }

    /// Parse `file` and add the contained tracks to the repository. Fires
    /// the track-list notification.
    pub fn load_track_file(&self, file: &Path) -> anyhow::Result<()> {
        let (tracks, video) = self.track_parser.parse(file)?;
        {
            let mut videos = self.track_videos.borrow_mut();
            for track in &tracks {
                videos.insert(track.id(), video.clone());
            }
        }
        tracing::debug!(file = %file.display(), count = tracks.len(), "loaded track file");
        self.track_repository.add_all(tracks)
    }

    /// Parse `file` and add the contained sections to the repository. Fires
    /// the section-list notification.
    pub fn load_section_file(&self, file: &Path) -> anyhow::Result<()> {
        let sections = self.section_parser.parse(file)?;
        let ids: Vec<SectionId> = sections
            .iter()
            .map(|section| section.id().clone())
            .collect();
        self.section_repository.borrow_mut().add_all(sections);
        tracing::debug!(file = %file.display(), count = ids.len(), "loaded section file");
        self.section_observers.notify(&ids)
    }

    /// Write all current sections through the section parser.
    pub fn save_section_file(&self, file: &Path) -> anyhow::Result<()> {
        let sections = self.section_repository.borrow().get_all();
        self.section_parser.serialize(&sections, file)
    }

    pub fn add_section(&self, section: Section) {
        self.section_repository.borrow_mut().add(section);
    }

    pub fn remove_section(&self, id: &SectionId) -> Result<Section, NotFoundError> {
        self.section_repository.borrow_mut().remove(id)
    }

    pub fn get_all_tracks(&self) -> Vec<Track> {
        self.track_repository.get_all()
    }

    pub fn get_all_sections(&self) -> Vec<Section> {
        self.section_repository.borrow().get_all()
    }

    /// The base frame for `track_id`, or `None` if no video is known for the
    /// track or the frame cannot be fetched.
    pub fn get_image_of_track(&self, track_id: &TrackId) -> Option<R::Image> {
        let video = self.track_videos.borrow().get(track_id).cloned()?;
        let frame = self.track_repository.get(track_id)?.first_frame();
        match self.video_reader.get_frame(&video, frame) {
            Ok(image) => Some(image),
            Err(err) => {
                tracing::warn!(track = track_id.raw(), "failed to read frame: {err:#}");
                None
            }
        }
    }
}
