//! Connection manager.
//!
//! # Responsibility
//! - Validate settings, establish the session eagerly, and route every
//!   remote operation through one retry wrapper.
//!
//! # Invariants
//! - A [`GatewayError::ConnectionLost`] triggers one reconnect and one
//!   retry of the failed operation; the second failure propagates.
//! - No other error class is ever retried.

use crate::config::ConnectionConfig;
use crate::gateway::{GatewayError, GatewayResult, Session, Transport};
use crate::model::{
    Annotation, AnnotationId, AnnotationTarget, ImageId, ImageSnapshot, NewAnnotation, Plane,
};
use crate::query::ComposedQuery;
use log::{info, warn};

/// Owning handle for one server connection.
///
/// Single-threaded by design: every operation takes `&mut self` so the
/// session can be replaced mid-call after a transport loss.
pub struct Connection {
    config: ConnectionConfig,
    transport: Box<dyn Transport>,
    session: Option<Box<dyn Session>>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("config", &self.config)
            .field("session", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Validates `config` and connects eagerly.
    ///
    /// # Errors
    /// - [`GatewayError::Config`] for blank credentials.
    /// - [`GatewayError::Connect`] when the transport refuses the session.
    pub fn connect(
        config: ConnectionConfig,
        transport: Box<dyn Transport>,
    ) -> GatewayResult<Self> {
        config.validate()?;
        info!(
            "event=gateway_connect module=gateway status=start endpoint={}",
            config.endpoint()
        );
        let session = match transport.connect(&config) {
            Ok(session) => session,
            Err(err) => {
                warn!(
                    "event=gateway_connect module=gateway status=error endpoint={} error={err}",
                    config.endpoint()
                );
                return Err(err);
            }
        };
        info!(
            "event=gateway_connect module=gateway status=ok endpoint={}",
            config.endpoint()
        );
        Ok(Self {
            config,
            transport,
            session: Some(session),
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Runs a composed image query.
    pub fn find_images(&mut self, query: &ComposedQuery) -> GatewayResult<Vec<ImageId>> {
        self.call(|session| session.find_images(query))
    }

    /// Fetches one image snapshot.
    pub fn image(&mut self, id: ImageId) -> GatewayResult<ImageSnapshot> {
        self.call(|session| session.image(id))
    }

    /// Fetches one pixel plane.
    pub fn plane(&mut self, id: ImageId, z: usize, c: usize, t: usize) -> GatewayResult<Plane> {
        self.call(|session| session.plane(id, z, c, t))
    }

    /// Lists annotations on a target.
    pub fn annotations(
        &mut self,
        target: AnnotationTarget,
        namespace: Option<&str>,
    ) -> GatewayResult<Vec<Annotation>> {
        self.call(|session| session.annotations(target, namespace))
    }

    /// Creates and links one annotation.
    pub fn save_annotation(
        &mut self,
        target: AnnotationTarget,
        annotation: &NewAnnotation,
    ) -> GatewayResult<AnnotationId> {
        self.call(|session| session.save_annotation(target, annotation))
    }

    /// Deletes annotations by id.
    pub fn delete_annotations(&mut self, ids: &[AnnotationId]) -> GatewayResult<usize> {
        self.call(|session| session.delete_annotations(ids))
    }

    /// Retry wrapper: lazily (re)establish the session, run `op`, and on a
    /// lost connection reconnect and retry exactly once.
    fn call<R>(
        &mut self,
        op: impl Fn(&dyn Session) -> GatewayResult<R>,
    ) -> GatewayResult<R> {
        if self.session.is_none() {
            self.reconnect()?;
        }
        let first = match &self.session {
            Some(session) => op(session.as_ref()),
            None => Err(GatewayError::ConnectionLost),
        };
        match first {
            Err(GatewayError::ConnectionLost) => {
                self.reconnect()?;
                match &self.session {
                    Some(session) => op(session.as_ref()),
                    None => Err(GatewayError::ConnectionLost),
                }
            }
            other => other,
        }
    }

    fn reconnect(&mut self) -> GatewayResult<()> {
        warn!(
            "event=gateway_reconnect module=gateway status=start endpoint={}",
            self.config.endpoint()
        );
        self.session = None;
        let session = self.transport.connect(&self.config)?;
        self.session = Some(session);
        info!(
            "event=gateway_reconnect module=gateway status=ok endpoint={}",
            self.config.endpoint()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Connection;
    use crate::config::ConnectionConfig;
    use crate::gateway::{GatewayError, GatewayResult, Session, Transport};
    use crate::model::{
        Annotation, AnnotationId, AnnotationTarget, ImageId, ImageSnapshot, NewAnnotation, Plane,
    };
    use crate::query::ComposedQuery;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Session whose query fails `failures_left` times with a lost
    /// connection, then succeeds.
    struct FlakySession {
        failures_left: Rc<Cell<usize>>,
    }

    impl Session for FlakySession {
        fn find_images(&self, _query: &ComposedQuery) -> GatewayResult<Vec<ImageId>> {
            if self.failures_left.get() > 0 {
                self.failures_left.set(self.failures_left.get() - 1);
                return Err(GatewayError::ConnectionLost);
            }
            Ok(vec![ImageId(1)])
        }

        fn image(&self, id: ImageId) -> GatewayResult<ImageSnapshot> {
            Err(GatewayError::ImageNotFound(id))
        }

        fn plane(&self, id: ImageId, z: usize, c: usize, t: usize) -> GatewayResult<Plane> {
            Err(GatewayError::PlaneOutOfRange { image: id, z, c, t })
        }

        fn annotations(
            &self,
            _target: AnnotationTarget,
            _namespace: Option<&str>,
        ) -> GatewayResult<Vec<Annotation>> {
            Ok(Vec::new())
        }

        fn save_annotation(
            &self,
            _target: AnnotationTarget,
            _annotation: &NewAnnotation,
        ) -> GatewayResult<AnnotationId> {
            Ok(AnnotationId(1))
        }

        fn delete_annotations(&self, _ids: &[AnnotationId]) -> GatewayResult<usize> {
            Ok(0)
        }
    }

    struct FlakyTransport {
        failures_left: Rc<Cell<usize>>,
        connects: Rc<Cell<usize>>,
    }

    impl Transport for FlakyTransport {
        fn connect(&self, _config: &ConnectionConfig) -> GatewayResult<Box<dyn Session>> {
            self.connects.set(self.connects.get() + 1);
            Ok(Box::new(FlakySession {
                failures_left: Rc::clone(&self.failures_left),
            }))
        }
    }

    fn flaky_connection(failures: usize) -> (Connection, Rc<Cell<usize>>) {
        let failures_left = Rc::new(Cell::new(failures));
        let connects = Rc::new(Cell::new(0));
        let transport = FlakyTransport {
            failures_left,
            connects: Rc::clone(&connects),
        };
        let conn =
            Connection::connect(ConnectionConfig::new("importer", "secret"), Box::new(transport))
                .unwrap();
        (conn, connects)
    }

    fn any_query() -> ComposedQuery {
        crate::query::Criteria::new()
            .set("plate", "p")
            .build()
            .unwrap()
    }

    #[test]
    fn connect_rejects_blank_credentials_before_dialing() {
        let connects = Rc::new(Cell::new(0));
        let transport = FlakyTransport {
            failures_left: Rc::new(Cell::new(0)),
            connects: Rc::clone(&connects),
        };
        let err = Connection::connect(ConnectionConfig::new("", "secret"), Box::new(transport))
            .unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
        assert_eq!(connects.get(), 0);
    }

    #[test]
    fn one_lost_connection_is_retried() {
        let (mut conn, connects) = flaky_connection(1);
        let ids = conn.find_images(&any_query()).unwrap();
        assert_eq!(ids, vec![ImageId(1)]);
        assert_eq!(connects.get(), 2);
    }

    #[test]
    fn a_second_loss_propagates() {
        let (mut conn, connects) = flaky_connection(2);
        let err = conn.find_images(&any_query()).unwrap_err();
        assert!(matches!(err, GatewayError::ConnectionLost));
        assert_eq!(connects.get(), 2);
    }

    #[test]
    fn non_transport_errors_are_not_retried() {
        let (mut conn, connects) = flaky_connection(0);
        let err = conn.image(ImageId(9)).unwrap_err();
        assert!(matches!(err, GatewayError::ImageNotFound(ImageId(9))));
        assert_eq!(connects.get(), 1);
    }
}
