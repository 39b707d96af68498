//! Store-side parsing of GeoJSON geometry.
//!
//! SQLite has no spatial type, so the store registers a scalar
//! `ST_GeomFromGeoJSON(text)` function on every connection. It parses the
//! geometry member of a feature into a [`geo::Geometry`] and stores it as a
//! bincode blob. Malformed geometry raises an SQL error, which aborts the
//! surrounding insert batch.

use geo::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};
use rusqlite::{Connection, Error as SqliteError, functions::FunctionFlags};
use serde_json::Value;
use thiserror::Error;

/// Name of the SQL function parsing GeoJSON geometry text.
pub const GEOMETRY_FUNCTION: &str = "ST_GeomFromGeoJSON";
/// Identifier of the blob encoding, recorded in `geometry_columns`.
pub const GEOMETRY_ENCODING: &str = "geo-bincode-v1";
/// Spatial reference of stored geometry (WGS 84).
pub const GEOMETRY_SRID: i64 = 4326;

/// Reasons a GeoJSON geometry is refused by the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryParseError {
    /// The text is not JSON.
    #[error("geometry is not valid JSON: {0}")]
    Json(String),
    /// The geometry is not an object.
    #[error("geometry must be a JSON object")]
    NotAnObject,
    /// The geometry object has no `type` member.
    #[error("geometry has no type")]
    MissingType,
    /// The `type` member names no geometry type.
    #[error("unsupported geometry type {0}")]
    UnsupportedType(String),
    /// A required member is absent or not an array.
    #[error("{kind} geometry requires an array `{member}` member")]
    MissingMember {
        /// Geometry type being parsed.
        kind: &'static str,
        /// Missing member name.
        member: &'static str,
    },
    /// A position is not an array of at least two finite numbers.
    #[error("invalid position {0}")]
    InvalidPosition(String),
    /// A line or ring has too few positions.
    #[error("{kind} requires at least {min} positions, found {found}")]
    TooFewPositions {
        /// Geometry part being parsed.
        kind: &'static str,
        /// Minimum accepted count.
        min: usize,
        /// Count found.
        found: usize,
    },
    /// A polygon ring does not end where it starts.
    #[error("polygon ring is not closed")]
    UnclosedRing,
}

/// Parse a GeoJSON geometry object.
///
/// JSON `null` yields `Ok(None)`, matching a feature with unlocated geometry.
///
/// # Examples
///
/// ```
/// use geo::{Geometry, Point};
/// use geoingest_data::store::parse_geometry;
/// use serde_json::json;
///
/// let parsed = parse_geometry(&json!({"type": "Point", "coordinates": [1.0, 2.0]}))?;
/// assert_eq!(parsed, Some(Geometry::Point(Point::new(1.0, 2.0))));
/// # Ok::<(), geoingest_data::store::GeometryParseError>(())
/// ```
pub fn parse_geometry(value: &Value) -> Result<Option<Geometry<f64>>, GeometryParseError> {
    if value.is_null() {
        return Ok(None);
    }
    let object = value.as_object().ok_or(GeometryParseError::NotAnObject)?;
    let kind = object.get("type").ok_or(GeometryParseError::MissingType)?;
    let geometry = match kind.as_str() {
        Some("Point") => Geometry::Point(Point::from(position(coordinates(value, "Point")?)?)),
        Some("MultiPoint") => Geometry::MultiPoint(MultiPoint::new(
            array(coordinates(value, "MultiPoint")?, "MultiPoint")?
                .iter()
                .map(|item| position(item).map(Point::from))
                .collect::<Result<_, _>>()?,
        )),
        Some("LineString") => {
            Geometry::LineString(line_string(coordinates(value, "LineString")?)?)
        }
        Some("MultiLineString") => Geometry::MultiLineString(MultiLineString::new(
            array(coordinates(value, "MultiLineString")?, "MultiLineString")?
                .iter()
                .map(line_string)
                .collect::<Result<_, _>>()?,
        )),
        Some("Polygon") => Geometry::Polygon(polygon(coordinates(value, "Polygon")?)?),
        Some("MultiPolygon") => Geometry::MultiPolygon(MultiPolygon::new(
            array(coordinates(value, "MultiPolygon")?, "MultiPolygon")?
                .iter()
                .map(polygon)
                .collect::<Result<_, _>>()?,
        )),
        Some("GeometryCollection") => {
            let members = object
                .get("geometries")
                .and_then(Value::as_array)
                .ok_or(GeometryParseError::MissingMember {
                    kind: "GeometryCollection",
                    member: "geometries",
                })?;
            let mut geometries = Vec::with_capacity(members.len());
            for member in members {
                // A null member carries no shape; skip it rather than fail.
                if let Some(geometry) = parse_geometry(member)? {
                    geometries.push(geometry);
                }
            }
            Geometry::GeometryCollection(GeometryCollection(geometries))
        }
        _ => return Err(GeometryParseError::UnsupportedType(kind.to_string())),
    };
    Ok(Some(geometry))
}

fn coordinates<'a>(value: &'a Value, kind: &'static str) -> Result<&'a Value, GeometryParseError> {
    value
        .get("coordinates")
        .filter(|coordinates| coordinates.is_array())
        .ok_or(GeometryParseError::MissingMember {
            kind,
            member: "coordinates",
        })
}

fn array<'a>(value: &'a Value, kind: &'static str) -> Result<&'a [Value], GeometryParseError> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or(GeometryParseError::MissingMember {
            kind,
            member: "coordinates",
        })
}

fn position(value: &Value) -> Result<Coord<f64>, GeometryParseError> {
    let invalid = || GeometryParseError::InvalidPosition(value.to_string());
    let parts = value.as_array().ok_or_else(invalid)?;
    // Altitude and further elements are accepted and dropped.
    match parts.as_slice() {
        [raw_x, raw_y, ..] => {
            let x = raw_x.as_f64().filter(|n| n.is_finite()).ok_or_else(invalid)?;
            let y = raw_y.as_f64().filter(|n| n.is_finite()).ok_or_else(invalid)?;
            Ok(Coord { x, y })
        }
        _ => Err(invalid()),
    }
}

fn positions(
    value: &Value,
    kind: &'static str,
    min: usize,
) -> Result<Vec<Coord<f64>>, GeometryParseError> {
    let coords = array(value, kind)?
        .iter()
        .map(position)
        .collect::<Result<Vec<_>, _>>()?;
    if coords.len() < min {
        return Err(GeometryParseError::TooFewPositions {
            kind,
            min,
            found: coords.len(),
        });
    }
    Ok(coords)
}

fn line_string(value: &Value) -> Result<LineString<f64>, GeometryParseError> {
    positions(value, "LineString", 2).map(LineString::new)
}

fn ring(value: &Value) -> Result<LineString<f64>, GeometryParseError> {
    let coords = positions(value, "LinearRing", 4)?;
    if coords.first() != coords.last() {
        return Err(GeometryParseError::UnclosedRing);
    }
    Ok(LineString::new(coords))
}

fn polygon(value: &Value) -> Result<Polygon<f64>, GeometryParseError> {
    let rings = array(value, "Polygon")?;
    let (exterior, interiors) = rings.split_first().ok_or(GeometryParseError::TooFewPositions {
        kind: "Polygon",
        min: 1,
        found: 0,
    })?;
    let interiors = interiors.iter().map(ring).collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(ring(exterior)?, interiors))
}

/// Parse GeoJSON geometry text and encode it as the stored blob.
///
/// Returns `Ok(None)` for JSON `null`.
pub fn encode_geometry_text(text: &str) -> Result<Option<Vec<u8>>, EncodeGeometryError> {
    let value: Value =
        serde_json::from_str(text).map_err(|err| GeometryParseError::Json(err.to_string()))?;
    parse_geometry(&value)?
        .map(|geometry| bincode::serialize(&geometry))
        .transpose()
        .map_err(EncodeGeometryError::Encode)
}

/// Decode a stored geometry blob.
pub fn decode_geometry(blob: &[u8]) -> Result<Geometry<f64>, bincode::Error> {
    bincode::deserialize(blob)
}

/// Errors raised by [`encode_geometry_text`].
#[derive(Debug, Error)]
pub enum EncodeGeometryError {
    /// The geometry was refused.
    #[error(transparent)]
    Parse(#[from] GeometryParseError),
    /// Bincode failed to encode the parsed geometry.
    #[error("failed to encode geometry")]
    Encode(#[source] bincode::Error),
}

/// Register [`GEOMETRY_FUNCTION`] on `connection`.
pub(crate) fn register_functions(connection: &Connection) -> Result<(), SqliteError> {
    connection.create_scalar_function(
        GEOMETRY_FUNCTION,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            let Some(text) = text else {
                return Ok(None);
            };
            encode_geometry_text(&text)
                .map_err(|err| SqliteError::UserFunctionError(Box::new(err)))
        },
    )
}
