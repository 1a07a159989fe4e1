use std::{collections::BTreeMap, fmt};

use ahash::{HashMap, HashMapExt};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::{Coordinate, EventType, GeometryError, RelativeOffsetCoordinate};

/// Identifier of a [`Section`]. A lookup token, not an ownership handle.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionId(String);

impl SectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The geometry variants a section can have.
#[derive(Clone, Debug, PartialEq)]
pub enum SectionGeometry {
    /// A directed line between two distinct points.
    Line { start: Coordinate, end: Coordinate },
    /// A closed polygon: at least four coordinates, first equal to last.
    Area { coordinates: Vec<Coordinate> },
}

/// A named geometry in the coordinate space of a video frame, used by traffic
/// detectors to create vehicle events.
///
/// Sections are validated at construction and immutable afterwards; an
/// invalid section is never observable anywhere. Equality is structural: two
/// sections with identical fields compare equal even as distinct values. Only
/// the id determines the repository slot.
#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    id: SectionId,
    geometry: SectionGeometry,
    relative_offset_coordinates: HashMap<EventType, RelativeOffsetCoordinate>,
    plugin_data: serde_json::Map<String, serde_json::Value>,
}

impl Section {
    /// Create a line section. Fails if `start == end`: the line would
    /// collapse to a point. Exact equality, no epsilon.
    pub fn line(id: SectionId, start: Coordinate, end: Coordinate) -> Result<Self, GeometryError> {
        if start == end {
            return Err(GeometryError::DegenerateLine { point: start });
        }
        Ok(Self::with_geometry(id, SectionGeometry::Line { start, end }))
    }

    /// Create an area section. The coordinates must form a closed polygon:
    /// at least four points with the first equal to the last. No auto-closing
    /// is performed.
    pub fn area(id: SectionId, coordinates: Vec<Coordinate>) -> Result<Self, GeometryError> {
        if coordinates.len() < 4 {
            return Err(GeometryError::TooFewCoordinates {
                count: coordinates.len(),
            });
        }
        let first = coordinates[0];
        let last = coordinates[coordinates.len() - 1];
        if first != last {
            return Err(GeometryError::OpenArea { first, last });
        }
        Ok(Self::with_geometry(
            id,
            SectionGeometry::Area { coordinates },
        ))
    }

    fn with_geometry(id: SectionId, geometry: SectionGeometry) -> Self {
        Self {
            id,
            geometry,
            relative_offset_coordinates: HashMap::new(),
            plugin_data: serde_json::Map::new(),
        }
    }

    /// Attach the offset used to build this section's intersection geometry
    /// for `event_type`.
    pub fn with_relative_offset(
        mut self,
        event_type: EventType,
        offset: RelativeOffsetCoordinate,
    ) -> Self {
        self.relative_offset_coordinates.insert(event_type, offset);
        self
    }

    /// Attach data for plugins and prototypes not modelled in the domain
    /// layer. Passed through serialization untouched.
    pub fn with_plugin_data(
        mut self,
        plugin_data: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        self.plugin_data = plugin_data;
        self
    }

    pub fn id(&self) -> &SectionId {
        &self.id
    }

    pub fn geometry(&self) -> &SectionGeometry {
        &self.geometry
    }

    pub fn relative_offset(&self, event_type: EventType) -> Option<RelativeOffsetCoordinate> {
        self.relative_offset_coordinates.get(&event_type).copied()
    }

    pub fn plugin_data(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.plugin_data
    }

    /// Serialized mapping of this section for the rest of the system
    /// (persistence, transport). A pure function of the current state.
    pub fn serialize(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("section serialization cannot fail")
    }

    fn offsets_by_wire_name(&self) -> BTreeMap<&'static str, RelativeOffsetCoordinate> {
        self.relative_offset_coordinates
            .iter()
            .map(|(event_type, offset)| (event_type.serialize(), *offset))
            .collect()
    }
}

impl Serialize for Section {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match &self.geometry {
            SectionGeometry::Line { start, end } => {
                map.serialize_entry("type", "line")?;
                map.serialize_entry("id", self.id.as_str())?;
                map.serialize_entry(
                    "relative_offset_coordinates",
                    &self.offsets_by_wire_name(),
                )?;
                map.serialize_entry("start", start)?;
                map.serialize_entry("end", end)?;
            }
            SectionGeometry::Area { coordinates } => {
                map.serialize_entry("type", "area")?;
                map.serialize_entry("id", self.id.as_str())?;
                map.serialize_entry(
                    "relative_offset_coordinates",
                    &self.offsets_by_wire_name(),
                )?;
                map.serialize_entry("coordinates", coordinates)?;
            }
        }
        map.serialize_entry("plugin_data", &self.plugin_data)?;
        map.end()
    }
}

/// Error returned when removing a section id the repository does not contain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotFoundError {
    pub id: SectionId,
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no section with id {:?} in repository", self.id.as_str())
    }
}

impl std::error::Error for NotFoundError {}

/// In-memory store of all live sections, keyed by id.
#[derive(Debug, Default)]
pub struct SectionRepository {
    sections: HashMap<SectionId, Section>,
}

impl SectionRepository {
    pub fn new() -> Self {
        Self {
            sections: HashMap::new(),
        }
    }

    /// Upsert: an existing section with the same id is overwritten.
    pub fn add(&mut self, section: Section) {
        self.sections.insert(section.id().clone(), section);
    }

    pub fn add_all(&mut self, sections: impl IntoIterator<Item = Section>) {
        for section in sections {
            self.add(section);
        }
    }

    /// All current sections, in no particular order.
    pub fn get_all(&self) -> Vec<Section> {
        self.sections.values().cloned().collect()
    }

    pub fn get(&self, id: &SectionId) -> Option<&Section> {
        self.sections.get(id)
    }

    /// Remove the section with the given id. Unlike [`add`](Self::add), this
    /// requires the id to exist.
    pub fn remove(&mut self, id: &SectionId) -> Result<Section, NotFoundError> {
        self.sections
            .remove(id)
            .ok_or_else(|| NotFoundError { id: id.clone() })
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}
