//! Pin a single [Reporter] for the lifetime of a registry.

use crate::{ConfigBag, ConstructionError, Error, Reporter, ReporterKind};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::{debug, info, warn};

/// Registry returned by [ReporterRegistry::global].
static GLOBAL: ReporterRegistry = ReporterRegistry::new();

/// Owns at most one [Reporter] and hands the same instance to every caller.
///
/// The first successful [ReporterRegistry::resolve] constructs the reporter. Every later
/// call returns that reporter and ignores its arguments. There is no way to replace or
/// drop the pinned reporter.
///
/// A registry can be created explicitly (and passed to whoever needs it) or the
/// process-wide instance can be obtained with [ReporterRegistry::global].
#[derive(Debug)]
pub struct ReporterRegistry {
    /// The pinned reporter (empty until the first successful resolve).
    reporter: OnceLock<Arc<dyn Reporter>>,

    /// Serializes construction so that at most one reporter is ever built.
    init: Mutex<()>,
}

impl ReporterRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            reporter: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Return the pinned reporter, constructing it from `identifier` and `config` if no
    /// reporter has been pinned yet.
    ///
    /// `identifier` may be `None` or empty to select [crate::DEFAULT_REPORTER]. Once a
    /// reporter is pinned, both arguments are ignored (even if the identifier is not
    /// supported) and this call cannot fail.
    ///
    /// If construction fails, nothing is pinned and a later call may try again.
    pub fn resolve(
        &self,
        identifier: Option<&str>,
        config: &ConfigBag,
    ) -> Result<Arc<dyn Reporter>, Error> {
        self.resolve_with(identifier, config, ReporterKind::build)
    }

    /// Return the pinned reporter without constructing one.
    pub fn get(&self) -> Option<Arc<dyn Reporter>> {
        self.reporter.get().cloned()
    }

    /// Whether a reporter has been pinned.
    pub fn is_populated(&self) -> bool {
        self.reporter.get().is_some()
    }

    /// Like [ReporterRegistry::resolve] but constructs the reporter with `build`.
    pub(crate) fn resolve_with<F>(
        &self,
        identifier: Option<&str>,
        config: &ConfigBag,
        build: F,
    ) -> Result<Arc<dyn Reporter>, Error>
    where
        F: FnOnce(ReporterKind, &ConfigBag) -> Result<Arc<dyn Reporter>, ConstructionError>,
    {
        // Fast path: already pinned
        if let Some(reporter) = self.reporter.get() {
            info!(
                reporter = reporter.type_name(),
                "reporter already created, returning same instance"
            );
            return Ok(reporter.clone());
        }

        // Slow path: the guarded value is `()`, so a poisoned lock (a constructor that
        // panicked) leaves nothing to repair
        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(reporter) = self.reporter.get() {
            return Ok(reporter.clone());
        }
        let kind = ReporterKind::from_identifier(identifier).inspect_err(|_| {
            warn!(?identifier, "rejected unsupported reporter identifier");
        })?;
        debug!(%kind, keys = config.len(), "constructing reporter");
        let reporter = build(kind, config).map_err(|source| {
            warn!(%kind, error = %source, "failed to construct reporter");
            Error::Construction { kind, source }
        })?;

        // Publish only after construction fully succeeded
        let reporter = self.reporter.get_or_init(|| reporter);
        info!(%kind, reporter = reporter.type_name(), "reporter created");
        Ok(reporter.clone())
    }
}

impl Default for ReporterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
