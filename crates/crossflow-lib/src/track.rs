use std::{cell::RefCell, fmt, rc::Rc};

use ahash::{HashMap, HashMapExt};

use crate::{ObserverHandle, Subject};

/// Identifier of a [`Track`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(u64);

impl TrackId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Error raised when a track invariant is violated at construction time.
#[derive(Clone, Debug, PartialEq)]
pub enum TrackError {
    /// Detection confidence is a probability.
    InvalidConfidence { confidence: f64 },
    /// Frame numbers start at 1.
    InvalidFrame { frame: u32 },
    /// A track is at least one detection.
    NoDetections,
    /// Detections must be ordered by frame.
    UnorderedDetections { frame: u32, previous: u32 },
}

impl fmt::Display for TrackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::InvalidConfidence { confidence } => {
                write!(f, "confidence must be within [0, 1], but is {confidence}")
            }
            Self::InvalidFrame { frame } => {
                write!(f, "frame numbers start at 1, but got {frame}")
            }
            Self::NoDetections => f.write_str("a track must contain at least one detection"),
            Self::UnorderedDetections { frame, previous } => write!(
                f,
                "detections must be ordered by frame, but frame {frame} follows frame {previous}"
            ),
        }
    }
}

impl std::error::Error for TrackError {}

/// A single observation of a vehicle in one video frame: its bounding box,
/// the detected class, and the detector's confidence.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    classification: String,
    confidence: f64,
    x: f64,
    y: f64,
    w: f64,
    h: f64,
    frame: u32,
}

impl Detection {
    pub fn new(
        classification: impl Into<String>,
        confidence: f64,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        frame: u32,
    ) -> Result<Self, TrackError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(TrackError::InvalidConfidence { confidence });
        }
        if frame < 1 {
            return Err(TrackError::InvalidFrame { frame });
        }
        Ok(Self {
            classification: classification.into(),
            confidence,
            x,
            y,
            w,
            h,
            frame,
        })
    }

    pub fn classification(&self) -> &str {
        &self.classification
    }
    pub fn confidence(&self) -> f64 {
        self.confidence
    }
    pub fn x(&self) -> f64 {
        self.x
    }
    pub fn y(&self) -> f64 {
        self.y
    }
    pub fn w(&self) -> f64 {
        self.w
    }
    pub fn h(&self) -> f64 {
        self.h
    }
    pub fn frame(&self) -> u32 {
        self.frame
    }
}

/// The detections of one vehicle over consecutive video frames.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    id: TrackId,
    classification: String,
    detections: Vec<Detection>,
}

impl Track {
    /// A track must contain at least one detection, ordered by frame.
    pub fn new(
        id: TrackId,
        classification: impl Into<String>,
        detections: Vec<Detection>,
    ) -> Result<Self, TrackError> {
        if detections.is_empty() {
            return Err(TrackError::NoDetections);
        }
        for pair in detections.windows(2) {
            if pair[1].frame() < pair[0].frame() {
                return Err(TrackError::UnorderedDetections {
                    frame: pair[1].frame(),
                    previous: pair[0].frame(),
                });
            }
        }
        Ok(Self {
            id,
            classification: classification.into(),
            detections,
        })
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn classification(&self) -> &str {
        &self.classification
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn first_frame(&self) -> u32 {
        self.detections[0].frame()
    }
}

/// Strategy deriving a track's classification from its detections.
pub trait TrackClassificationCalculator {
    fn calculate(&self, detections: &[Detection]) -> Option<String>;
}

/// Picks the detection class with the highest summed confidence.
#[derive(Clone, Copy, Debug, Default)]
pub struct CalculateTrackClassificationByMaxConfidence;

impl TrackClassificationCalculator for CalculateTrackClassificationByMaxConfidence {
    fn calculate(&self, detections: &[Detection]) -> Option<String> {
        let mut totals: HashMap<&str, f64> = HashMap::new();
        for detection in detections {
            *totals.entry(detection.classification()).or_insert(0.0) += detection.confidence();
        }
        totals
            .into_iter()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(classification, _)| classification.to_owned())
    }
}

/// An image of the road scene a video frame was taken from.
///
/// Cloning must be cheap: the view state clones images when publishing them.
pub trait TrackImage: Clone {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Overlay `other` on this image, yielding the combined image.
    fn combine_with(&self, other: &Self) -> Self;
}

/// Store of all known tracks, keyed by id.
///
/// Cloning yields another handle to the same store. Bulk insertion notifies
/// registered track-list observers; the notification fires after the store
/// mutation completes, so observers are free to read the repository.
pub struct TrackRepository {
    tracks: Rc<RefCell<HashMap<TrackId, Track>>>,
    observers: Subject<Vec<TrackId>>,
}

impl Clone for TrackRepository {
    fn clone(&self) -> Self {
        Self {
            tracks: Rc::clone(&self.tracks),
            observers: self.observers.clone(),
        }
    }
}

impl TrackRepository {
    pub fn new() -> Self {
        Self {
            tracks: Rc::new(RefCell::new(HashMap::new())),
            observers: Subject::new(),
        }
    }

    /// Listen to changes of the track list.
    pub fn register_tracks_observer(
        &self,
        observer: impl Fn(&Vec<TrackId>) -> anyhow::Result<()> + 'static,
    ) -> ObserverHandle {
        self.observers.register(observer)
    }

    /// Upsert a single track. Does not notify.
    pub fn add(&self, track: Track) {
        self.tracks.borrow_mut().insert(track.id(), track);
    }

    /// Add several tracks at once, then notify list observers with the ids
    /// just added, in input order.
    pub fn add_all(&self, tracks: Vec<Track>) -> anyhow::Result<()> {
        let ids: Vec<TrackId> = tracks.iter().map(Track::id).collect();
        {
            let mut map = self.tracks.borrow_mut();
            for track in tracks {
                map.insert(track.id(), track);
            }
        }
        self.observers.notify(&ids)
    }

    /// All current tracks, in no particular order.
    pub fn get_all(&self) -> Vec<Track> {
        self.tracks.borrow().values().cloned().collect()
    }

    pub fn get(&self, id: &TrackId) -> Option<Track> {
        self.tracks.borrow().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.tracks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.borrow().is_empty()
    }
}

impl Default for TrackRepository {
    fn default() -> Self {
        Self::new()
    }
}
