//! Basic geometric types for PDF

use crate::error::{PdfError, Result};
use crate::objects::Object;
use std::str::FromStr;

/// A point in 2D space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0 }
    }
}

/// A rectangle defined by two corner points.
///
/// Corner ordering is not enforced; callers own that invariant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    pub lower_left: Point,
    pub upper_right: Point,
}

impl Rectangle {
    pub fn new(lower_left: Point, upper_right: Point) -> Self {
        Self {
            lower_left,
            upper_right,
        }
    }

    pub fn from_corners(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            lower_left: Point::new(x0, y0),
            upper_right: Point::new(x1, y1),
        }
    }

    pub fn width(&self) -> f64 {
        self.upper_right.x - self.lower_left.x
    }

    pub fn height(&self) -> f64 {
        self.upper_right.y - self.lower_left.y
    }

    /// Build from a 4-element PDF array of numbers.
    pub fn from_object(obj: &Object) -> Result<Self> {
        let arr = obj
            .as_array()
            .ok_or_else(|| PdfError::InvalidStructure("rectangle is not an array".to_string()))?;
        if arr.len() != 4 {
            return Err(PdfError::InvalidStructure(format!(
                "rectangle array has {} elements, expected 4",
                arr.len()
            )));
        }
        let mut coords = [0.0f64; 4];
        for (i, value) in arr.iter().enumerate() {
            coords[i] = value.as_real().ok_or_else(|| {
                PdfError::InvalidStructure("rectangle element is not a number".to_string())
            })?;
        }
        Ok(Self::from_corners(coords[0], coords[1], coords[2], coords[3]))
    }

    /// The stored PDF representation: `[x0 y0 x1 y1]` of reals.
    pub fn to_object(&self) -> Object {
        Object::Array(vec![
            Object::Real(self.lower_left.x),
            Object::Real(self.lower_left.y),
            Object::Real(self.upper_right.x),
            Object::Real(self.upper_right.y),
        ])
    }
}

impl From<[f64; 4]> for Rectangle {
    fn from(c: [f64; 4]) -> Self {
        Self::from_corners(c[0], c[1], c[2], c[3])
    }
}

impl FromStr for Rectangle {
    type Err = PdfError;

    /// Parses the textual array form, e.g. `"[ 200 300 250 350 ]"`.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let inner = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| {
                PdfError::InvalidStructure(format!("not a rectangle array: {trimmed:?}"))
            })?;
        let coords: Vec<f64> = inner
            .split_whitespace()
            .map(|tok| {
                tok.parse::<f64>().map_err(|_| {
                    PdfError::InvalidStructure(format!("bad rectangle coordinate: {tok:?}"))
                })
            })
            .collect::<Result<_>>()?;
        if coords.len() != 4 {
            return Err(PdfError::InvalidStructure(format!(
                "rectangle has {} coordinates, expected 4",
                coords.len()
            )));
        }
        Ok(Self::from_corners(coords[0], coords[1], coords[2], coords[3]))
    }
}
