//! ESRI Shapefile polygon reader and writer.
//!
//! Only the geometry (`.shp`), its index (`.shx`) and a one-column attribute
//! table (`.dbf`) are handled. The main file uses mixed endianness: the file
//! and record headers are big-endian, the record contents little-endian.

use super::IoError;
use crate::aabb::Aabb;
use crate::float_types::Real;
use crate::polygon::{PolygonCollection, validate};
use crate::traits::PolygonOps;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::prelude::*;
use geo::{BooleanOps as GeoBool, Coord, LineString, Polygon, Winding};
use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const FILE_CODE: i32 = 9994;
const VERSION: i32 = 1000;
/// Size of the main file and index file headers, in bytes.
const HEADER_LEN: usize = 100;
/// Width of the `FID` attribute column.
const FID_WIDTH: u8 = 11;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeType {
    Null,
    Point,
    PolyLine,
    Polygon,
    MultiPoint,
    PointZ,
    PolyLineZ,
    PolygonZ,
    MultiPointZ,
    PointM,
    PolyLineM,
    PolygonM,
    MultiPointM,
    MultiPatch,
    Unknown(i32),
}

impl ShapeType {
    pub fn from_int(value: i32) -> ShapeType {
        match value {
            0 => ShapeType::Null,
            1 => ShapeType::Point,
            3 => ShapeType::PolyLine,
            5 => ShapeType::Polygon,
            8 => ShapeType::MultiPoint,
            11 => ShapeType::PointZ,
            13 => ShapeType::PolyLineZ,
            15 => ShapeType::PolygonZ,
            18 => ShapeType::MultiPointZ,
            21 => ShapeType::PointM,
            23 => ShapeType::PolyLineM,
            25 => ShapeType::PolygonM,
            28 => ShapeType::MultiPointM,
            31 => ShapeType::MultiPatch,
            other => ShapeType::Unknown(other),
        }
    }

    pub fn to_int(self) -> i32 {
        match self {
            ShapeType::Null => 0,
            ShapeType::Point => 1,
            ShapeType::PolyLine => 3,
            ShapeType::Polygon => 5,
            ShapeType::MultiPoint => 8,
            ShapeType::PointZ => 11,
            ShapeType::PolyLineZ => 13,
            ShapeType::PolygonZ => 15,
            ShapeType::MultiPointZ => 18,
            ShapeType::PointM => 21,
            ShapeType::PolyLineM => 23,
            ShapeType::PolygonM => 25,
            ShapeType::MultiPointM => 28,
            ShapeType::MultiPatch => 31,
            ShapeType::Unknown(other) => other,
        }
    }

    /// Polygon records whose leading x/y layout we can read; Z and M values are ignored.
    pub fn is_polygon(self) -> bool {
        matches!(self, ShapeType::Polygon | ShapeType::PolygonZ | ShapeType::PolygonM)
    }
}

/// The 100 byte header shared by `.shp` and `.shx` files.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapefileHeader {
    /// File length in 16-bit words, header included.
    pub file_length: i32,
    pub shape_type: ShapeType,
    pub bbox: Aabb,
}

impl ShapefileHeader {
    fn read(cursor: &mut Cursor<&[u8]>) -> Result<Self, IoError> {
        let file_code = cursor.read_i32::<BigEndian>()?;
        if file_code != FILE_CODE {
            return Err(IoError::MalformedInput(format!("bad file code {file_code}, expected {FILE_CODE}")));
        }
        cursor.set_position(24);
        let file_length = cursor.read_i32::<BigEndian>()?;

        let _version = cursor.read_i32::<LittleEndian>()?;
        let shape_type = ShapeType::from_int(cursor.read_i32::<LittleEndian>()?);
        let x_min = cursor.read_f64::<LittleEndian>()?;
        let y_min = cursor.read_f64::<LittleEndian>()?;
        let x_max = cursor.read_f64::<LittleEndian>()?;
        let y_max = cursor.read_f64::<LittleEndian>()?;
        cursor.set_position(HEADER_LEN as u64);

        Ok(Self { file_length, shape_type, bbox: Aabb::from_bounds(x_min, y_min, x_max, y_max) })
    }

    fn write<W: Write>(&self, writer: &mut W) -> Result<(), IoError> {
        writer.write_i32::<BigEndian>(FILE_CODE)?;
        for _ in 0..5 {
            writer.write_i32::<BigEndian>(0)?;
        }
        writer.write_i32::<BigEndian>(self.file_length)?;
        writer.write_i32::<LittleEndian>(VERSION)?;
        writer.write_i32::<LittleEndian>(self.shape_type.to_int())?;
        writer.write_f64::<LittleEndian>(self.bbox.mins.x)?;
        writer.write_f64::<LittleEndian>(self.bbox.mins.y)?;
        writer.write_f64::<LittleEndian>(self.bbox.maxs.x)?;
        writer.write_f64::<LittleEndian>(self.bbox.maxs.y)?;
        // z and m ranges
        for _ in 0..4 {
            writer.write_f64::<LittleEndian>(0.0)?;
        }
        Ok(())
    }
}

/// Resolves `path` to the `.shp` main file of a shapefile.
fn shp_path(path: &Path) -> Result<PathBuf, IoError> {
    match path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase) {
        None => Ok(path.with_extension("shp")),
        Some(ext) if ext == "shp" => Ok(path.to_path_buf()),
        Some(ext) if ext == "shx" || ext == "dbf" => Ok(path.with_extension("shp")),
        Some(ext) => Err(IoError::MalformedPath(format!(
            "{}: unexpected extension '.{ext}'",
            path.display()
        ))),
    }
}

fn to_count(value: i32, what: &str, record: i32) -> Result<usize, IoError> {
    usize::try_from(value).map_err(|_| IoError::MalformedInput(format!("record {record}: negative {what} ({value})")))
}

fn to_i32(value: usize) -> Result<i32, IoError> {
    i32::try_from(value).map_err(|_| IoError::MalformedInput(format!("{value} does not fit a shapefile field")))
}

/// Byte length as a count of 16-bit words.
fn to_words(bytes: usize) -> Result<i32, IoError> {
    to_i32(bytes / 2)
}

/// Loads every polygon of the shapefile at `path`.
///
/// With a clip box, polygons entirely outside it are dropped and the others are
/// intersected with it; a polygon split by the box yields one entry per piece.
/// Records whose rings cannot form a valid polygon are skipped with a warning.
pub fn load<P: AsRef<Path>>(path: P, clip: Option<&Aabb>) -> Result<PolygonCollection, IoError> {
    let path = shp_path(path.as_ref())?;
    let bytes = fs::read(&path)?;
    let polygons = read_polygons(&bytes)?;

    let mut collection = PolygonCollection::new();
    let mut skipped = 0usize;
    for polygon in polygons {
        if let Err(error) = validate(&polygon) {
            skipped += 1;
            warn!(%error, "skipping invalid polygon");
            continue;
        }
        match clip {
            None => {
                collection.push(polygon)?;
            },
            Some(bbox) => {
                for piece in clip_polygon(polygon, bbox) {
                    if validate(&piece).is_ok() {
                        collection.push(piece)?;
                    }
                }
            },
        }
    }

    debug!(path = %path.display(), polygons = collection.len(), skipped, "shapefile loaded");
    Ok(collection)
}

fn clip_polygon(polygon: Polygon<Real>, bbox: &Aabb) -> Vec<Polygon<Real>> {
    let Some(envelope) = polygon.envelope() else {
        return Vec::new();
    };
    if !bbox.intersects(&envelope) {
        return Vec::new();
    }
    if bbox.contains(&envelope) {
        return vec![polygon];
    }
    GeoBool::intersection(&polygon, &bbox.to_rect().to_polygon()).into_parts()
}

/// Decodes the polygons stored in the bytes of a `.shp` file.
pub fn read_polygons(bytes: &[u8]) -> Result<Vec<Polygon<Real>>, IoError> {
    let mut cursor = Cursor::new(bytes);
    let header = ShapefileHeader::read(&mut cursor)?;
    if !header.shape_type.is_polygon() && header.shape_type != ShapeType::Null {
        warn!(shape_type = ?header.shape_type, "shapefile does not declare polygons");
    }

    let mut polygons = Vec::new();
    while cursor.position() as usize + 8 <= bytes.len() {
        let record = cursor.read_i32::<BigEndian>()?;
        let content_words = cursor.read_i32::<BigEndian>()?;
        let start = cursor.position() as usize;
        let end = start + to_count(content_words, "content length", record)? * 2;
        if end > bytes.len() {
            return Err(IoError::MalformedInput(format!("record {record} extends past the end of the file")));
        }
        polygons.extend(read_record(record, &bytes[start..end])?);
        cursor.set_position(end as u64);
    }
    Ok(polygons)
}

fn read_record(record: i32, content: &[u8]) -> Result<Vec<Polygon<Real>>, IoError> {
    let mut cursor = Cursor::new(content);
    let shape_type = ShapeType::from_int(cursor.read_i32::<LittleEndian>()?);
    if shape_type == ShapeType::Null {
        return Ok(Vec::new());
    }
    if !shape_type.is_polygon() {
        warn!(record, ?shape_type, "skipping non-polygon record");
        return Ok(Vec::new());
    }

    // record bounding box
    cursor.set_position(4 + 32);
    let num_parts = to_count(cursor.read_i32::<LittleEndian>()?, "part count", record)?;
    let num_points = to_count(cursor.read_i32::<LittleEndian>()?, "point count", record)?;
    if num_parts == 0 || num_points == 0 {
        return Ok(Vec::new());
    }
    // header, part offsets, then x/y pairs
    let needed = num_parts
        .checked_mul(4)
        .zip(num_points.checked_mul(16))
        .and_then(|(parts, points)| parts.checked_add(points))
        .and_then(|body| body.checked_add(44));
    if !matches!(needed, Some(needed) if needed <= content.len()) {
        return Err(IoError::MalformedInput(format!(
            "unable to read shape {record}: {num_parts} parts and {num_points} points do not fit {} bytes",
            content.len()
        )));
    }

    let mut parts = Vec::with_capacity(num_parts);
    for _ in 0..num_parts {
        parts.push(to_count(cursor.read_i32::<LittleEndian>()?, "part offset", record)?);
    }
    if parts[0] != 0 {
        return Err(IoError::MalformedInput(format!("unable to read shape {record}: first part starts at {}", parts[0])));
    }
    if parts.windows(2).any(|pair| pair[0] > pair[1]) || parts[num_parts - 1] >= num_points {
        return Err(IoError::MalformedInput(format!("unable to read shape {record}: part offsets out of order")));
    }

    let mut points = Vec::with_capacity(num_points);
    for _ in 0..num_points {
        let x = cursor.read_f64::<LittleEndian>()?;
        let y = cursor.read_f64::<LittleEndian>()?;
        points.push(Coord { x, y });
    }

    let rings = parts
        .iter()
        .enumerate()
        .map(|(ix, &start)| {
            let end = parts.get(ix + 1).copied().unwrap_or(num_points);
            LineString::new(points[start..end].to_vec())
        })
        .collect();
    Ok(assemble_rings(rings))
}

/// Groups rings into polygons. A clockwise ring opens a new polygon and the
/// counter-clockwise rings after it are its holes. The first ring is always
/// treated as an outer ring.
fn assemble_rings(rings: Vec<LineString<Real>>) -> Vec<Polygon<Real>> {
    let mut polygons = Vec::new();
    let mut current: Option<(LineString<Real>, Vec<LineString<Real>>)> = None;

    for ring in rings {
        match current.as_mut() {
            Some((_, holes)) if !ring.is_cw() => holes.push(ring),
            _ => {
                if let Some((exterior, holes)) = current.take() {
                    polygons.push(Polygon::new(exterior, holes));
                }
                current = Some((ring, Vec::new()));
            },
        }
    }
    if let Some((exterior, holes)) = current {
        polygons.push(Polygon::new(exterior, holes));
    }
    polygons
}

/// Encodes one polygon as the content of a Polygon record. Outer rings are
/// written clockwise and holes counter-clockwise.
fn encode_polygon(polygon: &Polygon<Real>) -> Result<Vec<u8>, IoError> {
    let mut rings = Vec::with_capacity(1 + polygon.interiors().len());
    let mut exterior = polygon.exterior().clone();
    exterior.make_cw_winding();
    rings.push(exterior);
    for hole in polygon.interiors() {
        let mut hole = hole.clone();
        hole.make_ccw_winding();
        rings.push(hole);
    }

    let num_points: usize = rings.iter().map(|ring| ring.0.len()).sum();
    let bbox = polygon.envelope().unwrap_or(Aabb::from_bounds(0.0, 0.0, 0.0, 0.0));

    let mut buffer = Vec::with_capacity(44 + 4 * rings.len() + 16 * num_points);
    buffer.write_i32::<LittleEndian>(ShapeType::Polygon.to_int())?;
    buffer.write_f64::<LittleEndian>(bbox.mins.x)?;
    buffer.write_f64::<LittleEndian>(bbox.mins.y)?;
    buffer.write_f64::<LittleEndian>(bbox.maxs.x)?;
    buffer.write_f64::<LittleEndian>(bbox.maxs.y)?;
    buffer.write_i32::<LittleEndian>(to_i32(rings.len())?)?;
    buffer.write_i32::<LittleEndian>(to_i32(num_points)?)?;

    let mut start = 0usize;
    for ring in &rings {
        buffer.write_i32::<LittleEndian>(to_i32(start)?)?;
        start += ring.0.len();
    }
    for coord in rings.iter().flat_map(|ring| ring.0.iter()) {
        buffer.write_f64::<LittleEndian>(coord.x)?;
        buffer.write_f64::<LittleEndian>(coord.y)?;
    }
    Ok(buffer)
}

/// Writes `polygons` as a polygon shapefile at `path` (`.shp`, `.shx` and `.dbf`).
///
/// The attribute table has a single numeric `FID` column numbering the
/// records from zero.
pub fn save<P: AsRef<Path>>(polygons: &PolygonCollection, path: P) -> Result<(), IoError> {
    let shp = shp_path(path.as_ref())?;
    let records = polygons.iter().map(encode_polygon).collect::<Result<Vec<_>, _>>()?;
    let bbox = polygons.bounding_box().unwrap_or(Aabb::from_bounds(0.0, 0.0, 0.0, 0.0));

    let shp_bytes = HEADER_LEN + records.iter().map(|record| 8 + record.len()).sum::<usize>();
    let shx_bytes = HEADER_LEN + 8 * records.len();

    let mut shp_writer = BufWriter::new(File::create(&shp)?);
    let mut shx_writer = BufWriter::new(File::create(shp.with_extension("shx"))?);
    ShapefileHeader { file_length: to_words(shp_bytes)?, shape_type: ShapeType::Polygon, bbox }.write(&mut shp_writer)?;
    ShapefileHeader { file_length: to_words(shx_bytes)?, shape_type: ShapeType::Polygon, bbox }.write(&mut shx_writer)?;

    let mut offset = to_words(HEADER_LEN)?;
    for (ix, record) in records.iter().enumerate() {
        let words = to_words(record.len())?;
        shp_writer.write_i32::<BigEndian>(to_i32(ix + 1)?)?;
        shp_writer.write_i32::<BigEndian>(words)?;
        shp_writer.write_all(record)?;

        shx_writer.write_i32::<BigEndian>(offset)?;
        shx_writer.write_i32::<BigEndian>(words)?;
        offset += 4 + words;
    }
    shp_writer.flush()?;
    shx_writer.flush()?;

    write_dbf(&shp.with_extension("dbf"), records.len())?;
    debug!(path = %shp.display(), polygons = records.len(), "shapefile saved");
    Ok(())
}

fn write_dbf(path: &Path, num_records: usize) -> Result<(), IoError> {
    let header_len: u16 = 32 + 32 + 1;
    let record_len: u16 = 1 + u16::from(FID_WIDTH);
    let count = u32::try_from(num_records)
        .map_err(|_| IoError::MalformedInput(format!("{num_records} records do not fit a dbf table")))?;
    let today = Local::now();

    let mut dbf = BufWriter::new(File::create(path)?);
    dbf.write_u8(0x03)?;
    dbf.write_u8(u8::try_from(today.year() - 1900).unwrap_or(u8::MAX))?;
    dbf.write_u8(today.month() as u8)?;
    dbf.write_u8(today.day() as u8)?;
    dbf.write_u32::<LittleEndian>(count)?;
    dbf.write_u16::<LittleEndian>(header_len)?;
    dbf.write_u16::<LittleEndian>(record_len)?;
    dbf.write_all(&[0u8; 20])?;

    let mut name = [0u8; 11];
    name[..3].copy_from_slice(b"FID");
    dbf.write_all(&name)?;
    dbf.write_u8(b'N')?;
    dbf.write_all(&[0u8; 4])?;
    dbf.write_u8(FID_WIDTH)?;
    dbf.write_u8(0)?;
    dbf.write_all(&[0u8; 14])?;
    dbf.write_u8(0x0d)?;

    for fid in 0..num_records {
        dbf.write_u8(b' ')?;
        write!(dbf, "{fid:>width$}", width = usize::from(FID_WIDTH))?;
    }
    dbf.write_u8(0x1a)?;
    dbf.flush()?;
    Ok(())
}

/// Copies the `.prj` projection file of `source` next to `target`, if it exists.
///
/// Returns whether a projection file was copied.
pub fn copy_projection<P: AsRef<Path>, Q: AsRef<Path>>(source: P, target: Q) -> Result<bool, IoError> {
    let source = shp_path(source.as_ref())?.with_extension("prj");
    if !source.exists() {
        return Ok(false);
    }
    let target = shp_path(target.as_ref())?.with_extension("prj");
    fs::copy(&source, &target)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn shape_type_codes_round_trip() {
        for code in [0, 1, 3, 5, 8, 11, 13, 15, 18, 21, 23, 25, 28, 31, 99] {
            assert_eq!(ShapeType::from_int(code).to_int(), code);
        }
        assert!(ShapeType::PolygonZ.is_polygon());
        assert!(!ShapeType::PolyLine.is_polygon());
    }

    #[test]
    fn path_resolution() {
        assert_eq!(shp_path(Path::new("water")).unwrap(), PathBuf::from("water.shp"));
        assert_eq!(shp_path(Path::new("water.SHP")).unwrap(), PathBuf::from("water.SHP"));
        assert_eq!(shp_path(Path::new("water.dbf")).unwrap(), PathBuf::from("water.shp"));
        assert!(matches!(shp_path(Path::new("water.gpkg")), Err(IoError::MalformedPath(_))));
    }

    #[test]
    fn rings_group_by_orientation() {
        let outer_a = LineString::from(vec![(0.0, 0.0), (0.0, 4.0), (4.0, 4.0), (4.0, 0.0), (0.0, 0.0)]);
        let hole_a = LineString::from(vec![(1.0, 1.0), (2.0, 1.0), (2.0, 2.0), (1.0, 2.0), (1.0, 1.0)]);
        let outer_b = LineString::from(vec![(10.0, 0.0), (10.0, 1.0), (11.0, 1.0), (11.0, 0.0), (10.0, 0.0)]);
        assert!(outer_a.is_cw());
        assert!(!hole_a.is_cw());

        let polygons = assemble_rings(vec![outer_a, hole_a, outer_b]);
        assert_eq!(polygons.len(), 2);
        assert_eq!(polygons[0].interiors().len(), 1);
        assert!(polygons[1].interiors().is_empty());
    }

    #[test]
    fn encoded_record_decodes_to_the_same_area() {
        let square = polygon![
            exterior: [(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0)],
            interiors: [[(x: 1.0, y: 1.0), (x: 1.0, y: 2.0), (x: 2.0, y: 2.0), (x: 2.0, y: 1.0)]]
        ];
        let content = encode_polygon(&square).unwrap();
        let decoded = read_record(1, &content).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].interiors().len(), 1);
        assert!((decoded[0].area() - 15.0).abs() < 1e-12);
    }

    #[test]
    fn first_part_offset_must_be_zero() {
        let mut content = Vec::new();
        content.write_i32::<LittleEndian>(5).unwrap();
        for _ in 0..4 {
            content.write_f64::<LittleEndian>(0.0).unwrap();
        }
        content.write_i32::<LittleEndian>(1).unwrap();
        content.write_i32::<LittleEndian>(4).unwrap();
        content.write_i32::<LittleEndian>(1).unwrap();
        for _ in 0..8 {
            content.write_f64::<LittleEndian>(0.0).unwrap();
        }
        assert!(matches!(read_record(7, &content), Err(IoError::MalformedInput(_))));
    }

    #[test]
    fn counts_larger_than_the_record_are_malformed() {
        let mut content = Vec::new();
        content.write_i32::<LittleEndian>(5).unwrap();
        for _ in 0..4 {
            content.write_f64::<LittleEndian>(0.0).unwrap();
        }
        content.write_i32::<LittleEndian>(i32::MAX).unwrap();
        content.write_i32::<LittleEndian>(i32::MAX).unwrap();
        content.write_i32::<LittleEndian>(0).unwrap();
        assert_eq!(content.len(), 48);
        assert!(matches!(read_record(3, &content), Err(IoError::MalformedInput(_))));

        // One point short of what the counts announce.
        let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        let encoded = encode_polygon(&square).unwrap();
        let short = &encoded[..encoded.len() - 16];
        assert!(matches!(read_record(4, short), Err(IoError::MalformedInput(_))));
    }

    #[test]
    fn null_and_point_records_are_skipped() {
        let mut null = Vec::new();
        null.write_i32::<LittleEndian>(0).unwrap();
        assert!(read_record(1, &null).unwrap().is_empty());

        let mut point = Vec::new();
        point.write_i32::<LittleEndian>(1).unwrap();
        point.write_f64::<LittleEndian>(1.0).unwrap();
        point.write_f64::<LittleEndian>(2.0).unwrap();
        assert!(read_record(2, &point).unwrap().is_empty());
    }

    #[test]
    fn clipping_splits_and_drops() {
        let u_shape = polygon![
            (x: 0.0, y: 0.0), (x: 3.0, y: 0.0), (x: 3.0, y: 3.0), (x: 2.0, y: 3.0),
            (x: 2.0, y: 1.0), (x: 1.0, y: 1.0), (x: 1.0, y: 3.0), (x: 0.0, y: 3.0)
        ];
        let pieces = clip_polygon(u_shape.clone(), &Aabb::from_bounds(-1.0, 2.0, 4.0, 4.0));
        assert_eq!(pieces.len(), 2);
        assert!(clip_polygon(u_shape.clone(), &Aabb::from_bounds(10.0, 10.0, 11.0, 11.0)).is_empty());
        assert_eq!(clip_polygon(u_shape.clone(), &Aabb::from_bounds(-1.0, -1.0, 4.0, 4.0)), vec![u_shape]);
    }
}
