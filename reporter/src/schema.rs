//! Schemas that analytics events are validated against before being recorded.

use crate::ReportError;
use std::{collections::BTreeMap, fmt};

/// The shape of an analytics event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetricSchema {
    /// A request that was answered by the backend.
    Response,
    /// A request that was rejected by the gateway (auth, throttling, ...).
    Error,
    /// A request that failed while reaching the backend.
    Fault,
}

/// Attributes whose values must parse as an HTTP-style status code.
const NUMERIC_ATTRIBUTES: [&str; 2] = ["response_code", "error_code"];

impl MetricSchema {
    /// Attributes every event of this schema must carry.
    ///
    /// The order is the order of the labels an event is recorded under.
    pub const fn required_attributes(self) -> &'static [&'static str] {
        match self {
            Self::Response => &["api_name", "api_version", "api_method", "response_code"],
            Self::Error => &["api_name", "api_version", "error_type", "error_code"],
            Self::Fault => &["api_name", "api_version", "fault_type"],
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Response => "response",
            Self::Error => "error",
            Self::Fault => "fault",
        }
    }
}

impl fmt::Display for MetricSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Collects the attributes of a single event.
///
/// Attributes beyond those required by the schema are kept but are not used as labels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventBuilder {
    schema: MetricSchema,
    attributes: BTreeMap<String, String>,
}

impl EventBuilder {
    pub fn new(schema: MetricSchema) -> Self {
        Self {
            schema,
            attributes: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> MetricSchema {
        self.schema
    }

    /// Set `key` to `value`, replacing any previous value.
    pub fn add_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Check that every required attribute is present and well-formed.
    pub fn validate(&self) -> Result<(), ReportError> {
        for &attribute in self.schema.required_attributes() {
            let value = match self.attributes.get(attribute) {
                Some(value) if !value.is_empty() => value,
                _ => {
                    return Err(ReportError::MissingAttribute {
                        schema: self.schema,
                        attribute,
                    })
                }
            };
            if NUMERIC_ATTRIBUTES.contains(&attribute) && value.parse::<u16>().is_err() {
                return Err(ReportError::InvalidAttribute {
                    attribute,
                    value: value.clone(),
                    reason: "must be a status code",
                });
            }
        }
        Ok(())
    }

    /// Validate the collected attributes and produce the event.
    pub fn build(self) -> Result<MetricEvent, ReportError> {
        self.validate()?;
        Ok(MetricEvent {
            schema: self.schema,
            attributes: self.attributes,
        })
    }
}

/// A validated event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricEvent {
    schema: MetricSchema,
    attributes: BTreeMap<String, String>,
}

impl MetricEvent {
    pub fn schema(&self) -> MetricSchema {
        self.schema
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// The required attributes as `(key, value)` pairs, in schema order.
    pub fn labels(&self) -> Vec<(String, String)> {
        self.schema
            .required_attributes()
            .iter()
            .map(|&key| {
                // Presence checked by `EventBuilder::validate`
                let value = self.attributes.get(key).cloned().unwrap_or_default();
                (key.to_string(), value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response() -> EventBuilder {
        EventBuilder::new(MetricSchema::Response)
            .add_attribute("api_name", "pizzashack")
            .add_attribute("api_version", "1.0.0")
            .add_attribute("api_method", "GET")
            .add_attribute("response_code", "200")
    }

    #[test]
    fn test_build_valid_event() {
        let event = response()
            .add_attribute("user_agent", "curl/8.0")
            .build()
            .unwrap();
        assert_eq!(event.schema(), MetricSchema::Response);
        assert_eq!(event.attributes().len(), 5);
        assert_eq!(
            event.labels(),
            vec![
                ("api_name".to_string(), "pizzashack".to_string()),
                ("api_version".to_string(), "1.0.0".to_string()),
                ("api_method".to_string(), "GET".to_string()),
                ("response_code".to_string(), "200".to_string()),
            ]
        );
    }

    #[test]
    fn test_missing_attribute() {
        let builder = EventBuilder::new(MetricSchema::Fault)
            .add_attribute("api_name", "pizzashack")
            .add_attribute("api_version", "1.0.0");
        assert_eq!(
            builder.validate(),
            Err(ReportError::MissingAttribute {
                schema: MetricSchema::Fault,
                attribute: "fault_type",
            })
        );
    }

    #[test]
    fn test_empty_attribute_is_missing() {
        let builder = response().add_attribute("api_method", "");
        assert_eq!(
            builder.build(),
            Err(ReportError::MissingAttribute {
                schema: MetricSchema::Response,
                attribute: "api_method",
            })
        );
    }

    #[test]
    fn test_non_numeric_status_code() {
        let builder = EventBuilder::new(MetricSchema::Error)
            .add_attribute("api_name", "pizzashack")
            .add_attribute("api_version", "1.0.0")
            .add_attribute("error_type", "THROTTLED")
            .add_attribute("error_code", "too-many");
        assert_eq!(
            builder.validate(),
            Err(ReportError::InvalidAttribute {
                attribute: "error_code",
                value: "too-many".to_string(),
                reason: "must be a status code",
            })
        );
    }

    #[test]
    fn test_add_attribute_replaces() {
        let builder = response().add_attribute("response_code", "503");
        assert_eq!(builder.attribute("response_code"), Some("503"));
        assert_eq!(builder.attribute("missing"), None);
    }
}
