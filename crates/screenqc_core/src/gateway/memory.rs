//! In-memory server backend.
//!
//! # Responsibility
//! - Provide a seedable `Transport`/`Session` pair backed by in-process
//!   state, the way a local fixture stands in for the real deployment.
//! - Evaluate composed queries structurally, with the same LIKE semantics
//!   the rendered clause text declares.
//!
//! # Invariants
//! - All sessions share one store; annotations written through one session
//!   are visible to every other.
//! - `drop_sessions` invalidates every open session; their next call fails
//!   with a lost connection.

use crate::config::ConnectionConfig;
use crate::gateway::{GatewayError, GatewayResult, Session, Transport};
use crate::model::{
    Annotation, AnnotationId, AnnotationTarget, AnnotationValue, ImageId, ImageSnapshot,
    NewAnnotation, Plane, PlateId,
};
use crate::query::{like_match, ComposedQuery, Filter};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

const NOQC_TAG: &str = "#noqc";

/// One plane of a seeded image.
#[derive(Debug, Clone)]
pub struct PlaneSpec {
    pub z: usize,
    pub c: usize,
    pub t: usize,
    pub plane: Plane,
}

/// Seed description for one image.
#[derive(Debug, Clone)]
pub struct ImageSpec {
    pub name: String,
    pub file_path: String,
    pub plate: Option<PlateId>,
    pub acquisition: Option<String>,
    /// Creation-event time, epoch milliseconds.
    pub created_at: i64,
    pub channel_labels: Vec<String>,
    pub pixel_max: f64,
    pub planes: Vec<PlaneSpec>,
}

impl ImageSpec {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let file_path = format!("/data/{name}");
        Self {
            name,
            file_path,
            plate: None,
            acquisition: None,
            created_at: 0,
            channel_labels: Vec::new(),
            pixel_max: 65535.0,
            planes: Vec::new(),
        }
    }

    pub fn file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = path.into();
        self
    }

    pub fn plate(mut self, plate: PlateId) -> Self {
        self.plate = Some(plate);
        self
    }

    pub fn acquisition(mut self, name: impl Into<String>) -> Self {
        self.acquisition = Some(name.into());
        self
    }

    pub fn created_at(mut self, epoch_ms: i64) -> Self {
        self.created_at = epoch_ms;
        self
    }

    pub fn channel_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channel_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn pixel_max(mut self, value: f64) -> Self {
        self.pixel_max = value;
        self
    }

    pub fn plane(mut self, z: usize, c: usize, t: usize, plane: Plane) -> Self {
        self.planes.push(PlaneSpec { z, c, t, plane });
        self
    }
}

#[derive(Debug, Clone)]
struct PlateRecord {
    name: String,
}

#[derive(Debug, Clone)]
struct ImageRecord {
    snapshot: ImageSnapshot,
    file_path: String,
    plate: Option<PlateId>,
    acquisition: Option<String>,
    planes: BTreeMap<(usize, usize, usize), Plane>,
}

#[derive(Debug, Clone)]
struct StoredAnnotation {
    target: AnnotationTarget,
    annotation: Annotation,
}

#[derive(Debug, Default)]
struct ServerState {
    next_id: i64,
    epoch: u64,
    connects: usize,
    failing_connects: usize,
    plates: BTreeMap<PlateId, PlateRecord>,
    images: BTreeMap<ImageId, ImageRecord>,
    annotations: BTreeMap<AnnotationId, StoredAnnotation>,
}

impl ServerState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn has_tag_like(&self, target: AnnotationTarget, pattern: &str) -> bool {
        self.annotations.values().any(|stored| {
            stored.target == target
                && stored
                    .annotation
                    .value
                    .tag_text()
                    .is_some_and(|text| like_match(pattern, text))
        })
    }

    fn image_matches(&self, id: ImageId, record: &ImageRecord, filter: &Filter) -> bool {
        match filter {
            Filter::Filename(pattern) => like_match(pattern, &record.file_path),
            Filter::PlateName(pattern) => record.plate.is_some_and(|plate_id| {
                self.plates
                    .get(&plate_id)
                    .is_some_and(|plate| like_match(pattern, &plate.name))
            }),
            Filter::AcquisitionName(pattern) => record
                .acquisition
                .as_deref()
                .is_some_and(|name| like_match(pattern, name)),
            Filter::WithTag(pattern) => self.has_tag_like(AnnotationTarget::Image(id), pattern),
            Filter::WithoutTag(pattern) => !self.has_tag_like(AnnotationTarget::Image(id), pattern),
            Filter::DateRange { start, end } => {
                (*start..=*end).contains(&record.snapshot.created_at)
            }
            Filter::ExcludeNoQc => {
                !self.has_tag_like(AnnotationTarget::Image(id), NOQC_TAG)
                    && !record.plate.is_some_and(|plate_id| {
                        self.has_tag_like(AnnotationTarget::Plate(plate_id), NOQC_TAG)
                    })
            }
        }
    }
}

/// Shared in-memory server; clone handles freely, they share one store.
#[derive(Clone, Default)]
pub struct MemoryServer {
    state: Arc<Mutex<ServerState>>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds one plate.
    pub fn add_plate(&self, name: impl Into<String>) -> PlateId {
        let mut state = self.lock();
        let id = PlateId(state.next_id());
        state.plates.insert(id, PlateRecord { name: name.into() });
        id
    }

    /// Seeds one image with its planes.
    pub fn add_image(&self, spec: ImageSpec) -> ImageId {
        let mut state = self.lock();
        let id = ImageId(state.next_id());

        let size_z = spec.planes.iter().map(|p| p.z + 1).max().unwrap_or(1);
        let size_t = spec.planes.iter().map(|p| p.t + 1).max().unwrap_or(1);
        let size_c = spec
            .planes
            .iter()
            .map(|p| p.c + 1)
            .max()
            .unwrap_or(1)
            .max(spec.channel_labels.len());
        let (size_x, size_y) = spec
            .planes
            .first()
            .map(|p| (p.plane.width, p.plane.height))
            .unwrap_or((0, 0));

        let snapshot = ImageSnapshot {
            id,
            name: spec.name,
            size_z,
            size_c,
            size_t,
            size_x,
            size_y,
            channel_labels: spec.channel_labels,
            created_at: spec.created_at,
            pixel_max: spec.pixel_max,
        };
        let planes = spec
            .planes
            .into_iter()
            .map(|p| ((p.z, p.c, p.t), p.plane))
            .collect();

        state.images.insert(
            id,
            ImageRecord {
                snapshot,
                file_path: spec.file_path,
                plate: spec.plate,
                acquisition: spec.acquisition,
                planes,
            },
        );
        id
    }

    /// Seeds a tag annotation server-side, e.g. a curator's `#noqc`.
    pub fn tag(&self, target: AnnotationTarget, text: impl Into<String>) -> AnnotationId {
        let mut state = self.lock();
        let id = AnnotationId(state.next_id());
        state.annotations.insert(
            id,
            StoredAnnotation {
                target,
                annotation: Annotation {
                    id,
                    namespace: None,
                    name: None,
                    value: AnnotationValue::Tag(text.into()),
                },
            },
        );
        id
    }

    /// Invalidates every open session; their next call reports a lost
    /// connection.
    pub fn drop_sessions(&self) {
        self.lock().epoch += 1;
    }

    /// Makes the next `count` connect attempts fail.
    pub fn fail_connects(&self, count: usize) {
        self.lock().failing_connects = count;
    }

    /// How many sessions have been established so far.
    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Transport for MemoryServer {
    fn connect(&self, config: &ConnectionConfig) -> GatewayResult<Box<dyn Session>> {
        let mut state = self.lock();
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(GatewayError::Connect {
                endpoint: config.endpoint(),
                message: "server refused the session".to_string(),
            });
        }
        state.connects += 1;
        Ok(Box::new(MemorySession {
            state: Arc::clone(&self.state),
            epoch: state.epoch,
        }))
    }
}

struct MemorySession {
    state: Arc<Mutex<ServerState>>,
    epoch: u64,
}

impl MemorySession {
    fn lock(&self) -> GatewayResult<MutexGuard<'_, ServerState>> {
        let guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.epoch != self.epoch {
            return Err(GatewayError::ConnectionLost);
        }
        Ok(guard)
    }
}

impl Session for MemorySession {
    fn find_images(&self, query: &ComposedQuery) -> GatewayResult<Vec<ImageId>> {
        let state = self.lock()?;
        let ids = state
            .images
            .iter()
            .filter(|(id, record)| {
                query
                    .filters()
                    .iter()
                    .all(|filter| state.image_matches(**id, record, filter))
            })
            .map(|(id, _)| *id)
            .collect();
        Ok(ids)
    }

    fn image(&self, id: ImageId) -> GatewayResult<ImageSnapshot> {
        let state = self.lock()?;
        state
            .images
            .get(&id)
            .map(|record| record.snapshot.clone())
            .ok_or(GatewayError::ImageNotFound(id))
    }

    fn plane(&self, id: ImageId, z: usize, c: usize, t: usize) -> GatewayResult<Plane> {
        let state = self.lock()?;
        let record = state
            .images
            .get(&id)
            .ok_or(GatewayError::ImageNotFound(id))?;
        record
            .planes
            .get(&(z, c, t))
            .cloned()
            .ok_or(GatewayError::PlaneOutOfRange { image: id, z, c, t })
    }

    fn annotations(
        &self,
        target: AnnotationTarget,
        namespace: Option<&str>,
    ) -> GatewayResult<Vec<Annotation>> {
        let state = self.lock()?;
        let annotations = state
            .annotations
            .values()
            .filter(|stored| stored.target == target)
            .filter(|stored| {
                namespace.is_none() || stored.annotation.namespace.as_deref() == namespace
            })
            .map(|stored| stored.annotation.clone())
            .collect();
        Ok(annotations)
    }

    fn save_annotation(
        &self,
        target: AnnotationTarget,
        annotation: &NewAnnotation,
    ) -> GatewayResult<AnnotationId> {
        let mut state = self.lock()?;
        match target {
            AnnotationTarget::Image(id) if !state.images.contains_key(&id) => {
                return Err(GatewayError::ImageNotFound(id));
            }
            AnnotationTarget::Plate(id) if !state.plates.contains_key(&id) => {
                return Err(GatewayError::Remote(format!("plate not found: {id}")));
            }
            _ => {}
        }
        let id = AnnotationId(state.next_id());
        state.annotations.insert(
            id,
            StoredAnnotation {
                target,
                annotation: Annotation {
                    id,
                    namespace: annotation.namespace.clone(),
                    name: annotation.name.clone(),
                    value: annotation.value.clone(),
                },
            },
        );
        Ok(id)
    }

    fn delete_annotations(&self, ids: &[AnnotationId]) -> GatewayResult<usize> {
        let mut state = self.lock()?;
        let mut removed = 0;
        for id in ids {
            if state.annotations.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::{ImageSpec, MemoryServer};
    use crate::config::ConnectionConfig;
    use crate::gateway::{GatewayError, Transport};
    use crate::model::{AnnotationTarget, ImageId, Plane};
    use crate::query::Criteria;

    fn session(server: &MemoryServer) -> Box<dyn crate::gateway::Session> {
        server
            .connect(&ConnectionConfig::new("importer", "secret"))
            .unwrap()
    }

    #[test]
    fn seeded_image_round_trips_metadata_and_planes() {
        let server = MemoryServer::new();
        let id = server.add_image(
            ImageSpec::new("a1")
                .channel_labels(["DAPI", "GFP"])
                .plane(0, 0, 0, Plane::filled(4, 4, 1.0))
                .plane(0, 1, 0, Plane::filled(4, 4, 2.0)),
        );

        let session = session(&server);
        let snapshot = session.image(id).unwrap();
        assert_eq!(snapshot.size_c, 2);
        assert_eq!(snapshot.size_x, 4);
        assert_eq!(snapshot.plane_coordinates().len(), 2);
        assert_eq!(session.plane(id, 0, 1, 0).unwrap().sample(0, 0), 2.0);
        assert!(matches!(
            session.plane(id, 1, 0, 0).unwrap_err(),
            GatewayError::PlaneOutOfRange { .. }
        ));
    }

    #[test]
    fn unknown_image_is_reported() {
        let server = MemoryServer::new();
        let session = session(&server);
        assert!(matches!(
            session.image(ImageId(99)).unwrap_err(),
            GatewayError::ImageNotFound(ImageId(99))
        ));
    }

    #[test]
    fn dropped_sessions_report_lost_connection() {
        let server = MemoryServer::new();
        server.add_image(ImageSpec::new("a1"));
        let session = session(&server);
        server.drop_sessions();

        let query = Criteria::new().set("filename", "%").build().unwrap();
        assert!(matches!(
            session.find_images(&query).unwrap_err(),
            GatewayError::ConnectionLost
        ));
    }

    #[test]
    fn tag_queries_match_like_patterns() {
        let server = MemoryServer::new();
        let tagged = server.add_image(ImageSpec::new("tagged"));
        server.add_image(ImageSpec::new("plain"));
        server.tag(AnnotationTarget::Image(tagged), "#contrast_v0.1");

        let session = session(&server);
        let with = Criteria::new().set("with_tag", "#contrast%").build().unwrap();
        assert_eq!(session.find_images(&with).unwrap(), vec![tagged]);

        let without = Criteria::new()
            .set("without_tag", "#contrast_v0.1")
            .build()
            .unwrap();
        let ids = session.find_images(&without).unwrap();
        assert!(!ids.contains(&tagged));
        assert_eq!(ids.len(), 1);
    }
}
