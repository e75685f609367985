//! MySQL's WKB (Well-Known Binary) geometry encoding: a 4-byte SRID prefix
//! followed by a standard OGC WKB geometry. Byte order is per-geometry, not
//! inherited by nested geometries (each MultiX/GeometryCollection member
//! repeats its own byte-order flag and type tag).

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point),
    LineString(Vec<Point>),
    Polygon(Vec<Vec<Point>>),
    MultiPoint(Vec<Point>),
    MultiLineString(Vec<Vec<Point>>),
    MultiPolygon(Vec<Vec<Vec<Point>>>),
    GeometryCollection(Vec<Geometry>),
}

struct Cursor<'a> {
    buf: &'a [u8],
    off: usize,
}

impl<'a> Cursor<'a> {
    fn u8(&mut self) -> Result<u8> {
        let v = *self.buf.get(self.off).ok_or(Error::MalformedFrame("wkb truncated"))?;
        self.off += 1;
        Ok(v)
    }

    fn u32(&mut self, little_endian: bool) -> Result<u32> {
        let b = self
            .buf
            .get(self.off..self.off + 4)
            .ok_or(Error::MalformedFrame("wkb truncated"))?;
        self.off += 4;
        Ok(if little_endian {
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        } else {
            u32::from_be_bytes([b[0], b[1], b[2], b[3]])
        })
    }

    fn f64(&mut self, little_endian: bool) -> Result<f64> {
        let b = self
            .buf
            .get(self.off..self.off + 8)
            .ok_or(Error::MalformedFrame("wkb truncated"))?;
        self.off += 8;
        let arr: [u8; 8] = b.try_into().map_err(|_| Error::MalformedFrame("wkb truncated"))?;
        Ok(if little_endian { f64::from_le_bytes(arr) } else { f64::from_be_bytes(arr) })
    }

    fn point(&mut self, little_endian: bool) -> Result<Point> {
        let x = self.f64(little_endian)?;
        let y = self.f64(little_endian)?;
        Ok(Point { x, y })
    }

    fn ring(&mut self, little_endian: bool) -> Result<Vec<Point>> {
        let n = self.u32(little_endian)?;
        (0..n).map(|_| self.point(little_endian)).collect()
    }

    fn geometry(&mut self) -> Result<Option<Geometry>> {
        let byte_order = self.u8()?;
        let little_endian = byte_order != 0;
        let wkb_type = self.u32(little_endian)?;
        match wkb_type {
            1 => Ok(Some(Geometry::Point(self.point(little_endian)?))),
            2 => Ok(Some(Geometry::LineString(self.ring(little_endian)?))),
            3 => {
                let n = self.u32(little_endian)?;
                let rings = (0..n).map(|_| self.ring(little_endian)).collect::<Result<Vec<_>>>()?;
                Ok(Some(Geometry::Polygon(rings)))
            }
            4 => {
                let n = self.u32(little_endian)?;
                let points = (0..n)
                    .map(|_| {
                        let sub = self.geometry()?;
                        match sub {
                            Some(Geometry::Point(p)) => Ok(p),
                            _ => Err(Error::MalformedFrame("expected point in multipoint")),
                        }
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Some(Geometry::MultiPoint(points)))
            }
            5 => {
                let n = self.u32(little_endian)?;
                let lines = (0..n)
                    .map(|_| {
                        let sub = self.geometry()?;
                        match sub {
                            Some(Geometry::LineString(l)) => Ok(l),
                            _ => Err(Error::MalformedFrame("expected linestring in multilinestring")),
                        }
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Some(Geometry::MultiLineString(lines)))
            }
            6 => {
                let n = self.u32(little_endian)?;
                let polys = (0..n)
                    .map(|_| {
                        let sub = self.geometry()?;
                        match sub {
                            Some(Geometry::Polygon(p)) => Ok(p),
                            _ => Err(Error::MalformedFrame("expected polygon in multipolygon")),
                        }
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Some(Geometry::MultiPolygon(polys)))
            }
            7 => {
                let n = self.u32(little_endian)?;
                let mut members = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    if let Some(g) = self.geometry()? {
                        members.push(g);
                    }
                }
                Ok(Some(Geometry::GeometryCollection(members)))
            }
            _ => Ok(None),
        }
    }
}

/// Parses a MySQL WKB geometry cell (4-byte SRID + WKB body). An undefined
/// WKB type tag yields `None` (not an error); a buffer shorter than 4 bytes
/// also yields `None`, matching `geometry(buf)`'s null-on-short-input rule.
pub fn parse(buf: &[u8]) -> Result<Option<Geometry>> {
    if buf.len() < 4 {
        return Ok(None);
    }
    let mut cursor = Cursor { buf: &buf[4..], off: 0 };
    cursor.geometry()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wkb_point(x: f64, y: f64) -> Vec<u8> {
        let mut out = vec![0, 0, 0, 0]; // SRID
        out.push(1); // little-endian
        out.extend_from_slice(&1u32.to_le_bytes()); // POINT
        out.extend_from_slice(&x.to_le_bytes());
        out.extend_from_slice(&y.to_le_bytes());
        out
    }

    #[test]
    fn test_point() {
        let buf = wkb_point(1.5, -2.5);
        let g = parse(&buf).unwrap().unwrap();
        assert_eq!(g, Geometry::Point(Point { x: 1.5, y: -2.5 }));
    }

    #[test]
    fn test_linestring() {
        let mut out = vec![0, 0, 0, 0];
        out.push(1);
        out.extend_from_slice(&2u32.to_le_bytes()); // LINESTRING
        out.extend_from_slice(&2u32.to_le_bytes()); // 2 points
        out.extend_from_slice(&0f64.to_le_bytes());
        out.extend_from_slice(&0f64.to_le_bytes());
        out.extend_from_slice(&1f64.to_le_bytes());
        out.extend_from_slice(&1f64.to_le_bytes());
        let g = parse(&out).unwrap().unwrap();
        assert_eq!(
            g,
            Geometry::LineString(vec![Point { x: 0.0, y: 0.0 }, Point { x: 1.0, y: 1.0 }])
        );
    }

    #[test]
    fn test_short_buffer_is_none() {
        assert_eq!(parse(&[0, 0]).unwrap(), None);
    }

    #[test]
    fn test_unknown_type_is_none() {
        let mut out = vec![0, 0, 0, 0];
        out.push(1);
        out.extend_from_slice(&99u32.to_le_bytes());
        assert_eq!(parse(&out).unwrap(), None);
    }
}
