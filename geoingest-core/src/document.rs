//! Structural model of a GeoJSON document.
//!
//! A [`GeometryDocument`] is only ever built from a JSON value that passed
//! [`validate`]. The check is shallow: it inspects the top-level `type`
//! discriminant and nothing else. Coordinate validity, ring closure and CRS
//! are left to the store, which parses geometry at insert time.

use std::{fmt, str::FromStr};

use serde_json::{Map, Value};
use thiserror::Error;

/// Discriminant carried in the `type` member of a GeoJSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    /// A single feature wrapping a geometry and properties.
    Feature,
    /// A collection of features under `features`.
    FeatureCollection,
    /// Bare `Point` geometry.
    Point,
    /// Bare `LineString` geometry.
    LineString,
    /// Bare `Polygon` geometry.
    Polygon,
    /// Bare `MultiPoint` geometry.
    MultiPoint,
    /// Bare `MultiLineString` geometry.
    MultiLineString,
    /// Bare `MultiPolygon` geometry.
    MultiPolygon,
    /// Bare `GeometryCollection`.
    GeometryCollection,
}

impl GeometryKind {
    /// Every accepted discriminant, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Feature,
        Self::FeatureCollection,
        Self::Point,
        Self::LineString,
        Self::Polygon,
        Self::MultiPoint,
        Self::MultiLineString,
        Self::MultiPolygon,
        Self::GeometryCollection,
    ];

    /// The exact `type` string used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Feature => "Feature",
            Self::FeatureCollection => "FeatureCollection",
            Self::Point => "Point",
            Self::LineString => "LineString",
            Self::Polygon => "Polygon",
            Self::MultiPoint => "MultiPoint",
            Self::MultiLineString => "MultiLineString",
            Self::MultiPolygon => "MultiPolygon",
            Self::GeometryCollection => "GeometryCollection",
        }
    }

    /// Whether the kind names a geometry rather than a feature container.
    #[must_use]
    pub const fn is_bare_geometry(self) -> bool {
        !matches!(self, Self::Feature | Self::FeatureCollection)
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the accepted discriminants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognised GeoJSON type {0:?}")]
pub struct UnknownGeometryKind(pub String);

impl FromStr for GeometryKind {
    type Err = UnknownGeometryKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        // Matching is case-sensitive, per RFC 7946.
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| UnknownGeometryKind(value.to_owned()))
    }
}

/// Reasons a JSON value is not accepted as a GeoJSON document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The top-level value is not a JSON object.
    #[error("document is not a JSON object")]
    NotAnObject,
    /// The object has no `type` member.
    #[error("document has no `type` member")]
    MissingType,
    /// The `type` member is not one of the accepted discriminants.
    ///
    /// Non-string values are carried as their JSON rendering.
    #[error("document type {0} is not a recognised GeoJSON type")]
    UnknownType(String),
}

/// Check that `value` satisfies the minimal structural contract of a GeoJSON
/// document and return its discriminant.
///
/// # Examples
///
/// ```
/// use geoingest_core::{GeometryKind, ValidationError, validate};
/// use serde_json::json;
///
/// assert_eq!(validate(&json!({"type": "Point"})), Ok(GeometryKind::Point));
/// assert_eq!(validate(&json!([1, 2])), Err(ValidationError::NotAnObject));
/// ```
pub fn validate(value: &Value) -> Result<GeometryKind, ValidationError> {
    let object = value.as_object().ok_or(ValidationError::NotAnObject)?;
    let discriminant = object.get("type").ok_or(ValidationError::MissingType)?;
    match discriminant {
        Value::String(name) => name.parse().map_err(|UnknownGeometryKind(found)| {
            ValidationError::UnknownType(format!("{found:?}"))
        }),
        other => Err(ValidationError::UnknownType(other.to_string())),
    }
}

/// A GeoJSON document that passed [`validate`].
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryDocument {
    /// A single `Feature` object.
    Feature(Map<String, Value>),
    /// A `FeatureCollection` object.
    FeatureCollection(Map<String, Value>),
    /// A top-level geometry object such as `Point`.
    ///
    /// These validate but carry no features; see [`crate::extract`].
    Geometry {
        /// The geometry discriminant.
        kind: GeometryKind,
        /// The full geometry object.
        body: Map<String, Value>,
    },
}

impl GeometryDocument {
    /// Validate `value` and wrap it in the matching variant.
    ///
    /// The whole document is rejected when validation fails; there is no
    /// partial acceptance.
    ///
    /// # Examples
    ///
    /// ```
    /// use geoingest_core::{GeometryDocument, GeometryKind};
    /// use serde_json::json;
    ///
    /// let document = GeometryDocument::parse(json!({
    ///     "type": "FeatureCollection",
    ///     "features": []
    /// }))?;
    /// assert_eq!(document.kind(), GeometryKind::FeatureCollection);
    /// # Ok::<(), geoingest_core::ValidationError>(())
    /// ```
    pub fn parse(value: Value) -> Result<Self, ValidationError> {
        let kind = validate(&value)?;
        let Value::Object(body) = value else {
            return Err(ValidationError::NotAnObject);
        };
        Ok(match kind {
            GeometryKind::Feature => Self::Feature(body),
            GeometryKind::FeatureCollection => Self::FeatureCollection(body),
            geometry => Self::Geometry {
                kind: geometry,
                body,
            },
        })
    }

    /// The discriminant this document was accepted with.
    #[must_use]
    pub const fn kind(&self) -> GeometryKind {
        match self {
            Self::Feature(_) => GeometryKind::Feature,
            Self::FeatureCollection(_) => GeometryKind::FeatureCollection,
            Self::Geometry { kind, .. } => *kind,
        }
    }
}
