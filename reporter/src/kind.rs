use crate::{prometheus::PrometheusReporter, ConfigBag, ConstructionError, Error, Reporter};
use std::{fmt, str::FromStr, sync::Arc};

/// Identifier of the reporter selected when none (or an empty one) is provided.
pub const DEFAULT_REPORTER: &str = "prometheus";

/// The closed set of reporters that can be resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ReporterKind {
    /// Records events into a `prometheus-client` registry.
    #[default]
    Prometheus,
}

impl ReporterKind {
    /// All supported kinds.
    pub const ALL: [Self; 1] = [Self::Prometheus];

    /// The identifier that selects this kind.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Prometheus => DEFAULT_REPORTER,
        }
    }

    /// Map an optional identifier to a kind.
    ///
    /// `None` and `""` select the default kind. Matching is exact (case-sensitive, no
    /// trimming).
    pub fn from_identifier(identifier: Option<&str>) -> Result<Self, Error> {
        match identifier {
            None | Some("") => Ok(Self::default()),
            Some(identifier) => identifier.parse(),
        }
    }

    /// Construct a reporter of this kind from `config`.
    pub fn build(self, config: &ConfigBag) -> Result<Arc<dyn Reporter>, ConstructionError> {
        match self {
            Self::Prometheus => Ok(Arc::new(PrometheusReporter::new(config)?)),
        }
    }
}

impl FromStr for ReporterKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| Error::UnsupportedIdentifier(s.to_string()))
    }
}

impl fmt::Display for ReporterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
