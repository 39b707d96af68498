//! Normalise a validated document into the features it carries.

use serde_json::{Map, Value};

use crate::GeometryDocument;

/// Feature type recorded when a feature object does not name one.
pub const DEFAULT_FEATURE_TYPE: &str = "Feature";

/// One feature awaiting persistence.
///
/// # Examples
///
/// ```
/// use geoingest_core::FeatureRecord;
/// use serde_json::json;
///
/// let record = FeatureRecord::from_value(&json!({"type": "Feature"}));
/// assert_eq!(record.feature_type, "Feature");
/// assert!(record.properties.is_empty());
/// assert_eq!(record.geometry, json!({}));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    /// Value of the feature's `type` member, `"Feature"` when absent.
    pub feature_type: String,
    /// Feature properties; empty when absent or not an object.
    pub properties: Map<String, Value>,
    /// Geometry sub-document handed to the store for parsing.
    ///
    /// An empty object stands for "geometry unknown". A JSON `null` is passed
    /// through unchanged.
    pub geometry: Value,
}

impl FeatureRecord {
    /// Build a record from one feature object, applying the defaults.
    ///
    /// Values that are not objects produce a record with every default in
    /// place, so the store decides whether the row is acceptable.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        value
            .as_object()
            .map_or_else(|| Self::from_object(&Map::new()), Self::from_object)
    }

    fn from_object(object: &Map<String, Value>) -> Self {
        let feature_type = object
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_FEATURE_TYPE)
            .to_owned();
        let properties = object
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let geometry = object
            .get("geometry")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        Self {
            feature_type,
            properties,
            geometry,
        }
    }
}

/// Produce the ordered feature sequence carried by `document`.
///
/// - A `FeatureCollection` yields one record per entry of `features`, or
///   nothing when `features` is absent, empty or not an array.
/// - A `Feature` yields itself.
/// - A bare geometry (`Point`, `Polygon`, ...) yields nothing even though it
///   validated. Geometry documents are accepted for compatibility with
///   upstream producers but are not stored.
///
/// # Examples
///
/// ```
/// use geoingest_core::{GeometryDocument, extract};
/// use serde_json::json;
///
/// let point = GeometryDocument::parse(json!({"type": "Point", "coordinates": [0, 0]}))?;
/// assert!(extract(&point).is_empty());
/// # Ok::<(), geoingest_core::ValidationError>(())
/// ```
#[must_use]
pub fn extract(document: &GeometryDocument) -> Vec<FeatureRecord> {
    match document {
        GeometryDocument::FeatureCollection(body) => body
            .get("features")
            .and_then(Value::as_array)
            .map(|features| features.iter().map(FeatureRecord::from_value).collect())
            .unwrap_or_default(),
        GeometryDocument::Feature(body) => vec![FeatureRecord::from_object(body)],
        GeometryDocument::Geometry { .. } => Vec::new(),
    }
}

impl GeometryDocument {
    /// Shorthand for [`extract`].
    #[must_use]
    pub fn features(&self) -> Vec<FeatureRecord> {
        extract(self)
    }
}
