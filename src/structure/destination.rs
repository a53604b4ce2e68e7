//! Explicit destinations (ISO 32000-1 §12.3.2.2).

use crate::error::{PdfError, Result};
use crate::objects::{Object, ObjectId};

/// The eight destination fit styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStyle {
    /// `[page /XYZ left top zoom]`
    Xyz,
    /// `[page /Fit]`
    Fit,
    /// `[page /FitH top]`
    FitH,
    /// `[page /FitV left]`
    FitV,
    /// `[page /FitR left bottom right top]`
    FitR,
    /// `[page /FitB]`
    FitB,
    /// `[page /FitBH top]`
    FitBH,
    /// `[page /FitBV left]`
    FitBV,
}

impl FitStyle {
    /// Number of numeric operands the style requires.
    pub fn operand_count(self) -> usize {
        match self {
            FitStyle::Fit | FitStyle::FitB => 0,
            FitStyle::FitH | FitStyle::FitV | FitStyle::FitBH | FitStyle::FitBV => 1,
            FitStyle::Xyz => 3,
            FitStyle::FitR => 4,
        }
    }

    pub fn pdf_name(self) -> &'static str {
        match self {
            FitStyle::Xyz => "XYZ",
            FitStyle::Fit => "Fit",
            FitStyle::FitH => "FitH",
            FitStyle::FitV => "FitV",
            FitStyle::FitR => "FitR",
            FitStyle::FitB => "FitB",
            FitStyle::FitBH => "FitBH",
            FitStyle::FitBV => "FitBV",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "XYZ" => FitStyle::Xyz,
            "Fit" => FitStyle::Fit,
            "FitH" => FitStyle::FitH,
            "FitV" => FitStyle::FitV,
            "FitR" => FitStyle::FitR,
            "FitB" => FitStyle::FitB,
            "FitBH" => FitStyle::FitBH,
            "FitBV" => FitStyle::FitBV,
            _ => return None,
        })
    }
}

/// A validated destination ready to serialize as its array form.
#[derive(Debug, Clone)]
pub struct Destination {
    page: ObjectId,
    style: FitStyle,
    operands: Vec<Object>,
}

impl Destination {
    /// Validates the operand arity before anything else; a failed
    /// construction leaves no partial state anywhere.
    ///
    /// `Object::Null` is a legal operand (XYZ allows "leave unchanged"
    /// slots).
    pub fn new(page: ObjectId, style: FitStyle, operands: Vec<Object>) -> Result<Self> {
        let expected = style.operand_count();
        if operands.len() != expected {
            return Err(PdfError::InvalidFitOperands {
                style: style.pdf_name(),
                expected,
                found: operands.len(),
            });
        }
        Ok(Self {
            page,
            style,
            operands,
        })
    }

    pub fn fit(page: ObjectId) -> Self {
        Self {
            page,
            style: FitStyle::Fit,
            operands: Vec::new(),
        }
    }

    pub fn page(&self) -> ObjectId {
        self.page
    }

    pub fn style(&self) -> FitStyle {
        self.style
    }

    /// `[page /Style operands…]`
    pub fn to_array(&self) -> Object {
        let mut array = Vec::with_capacity(2 + self.operands.len());
        array.push(Object::Reference(self.page));
        array.push(Object::name(self.style.pdf_name()));
        array.extend(self.operands.iter().cloned());
        Object::Array(array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operand_counts() {
        assert_eq!(FitStyle::Fit.operand_count(), 0);
        assert_eq!(FitStyle::FitB.operand_count(), 0);
        assert_eq!(FitStyle::FitH.operand_count(), 1);
        assert_eq!(FitStyle::FitV.operand_count(), 1);
        assert_eq!(FitStyle::FitBH.operand_count(), 1);
        assert_eq!(FitStyle::FitBV.operand_count(), 1);
        assert_eq!(FitStyle::Xyz.operand_count(), 3);
        assert_eq!(FitStyle::FitR.operand_count(), 4);
    }

    #[test]
    fn test_arity_mismatch_rejected() {
        let page = ObjectId::new(3, 0);
        let err = Destination::new(page, FitStyle::FitH, vec![]).unwrap_err();
        match err {
            PdfError::InvalidFitOperands {
                style,
                expected,
                found,
            } => {
                assert_eq!(style, "FitH");
                assert_eq!(expected, 1);
                assert_eq!(found, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_xyz_allows_null_operands() {
        let page = ObjectId::new(3, 0);
        let dest = Destination::new(
            page,
            FitStyle::Xyz,
            vec![Object::Real(100.0), Object::Null, Object::Null],
        )
        .unwrap();
        let Object::Array(array) = dest.to_array() else {
            panic!("not an array");
        };
        assert_eq!(array[0], Object::Reference(page));
        assert_eq!(array[1], Object::name("XYZ"));
        assert_eq!(array.len(), 5);
        assert_eq!(array[3], Object::Null);
    }

    #[test]
    fn test_name_roundtrip() {
        for style in [
            FitStyle::Xyz,
            FitStyle::Fit,
            FitStyle::FitH,
            FitStyle::FitV,
            FitStyle::FitR,
            FitStyle::FitB,
            FitStyle::FitBH,
            FitStyle::FitBV,
        ] {
            assert_eq!(FitStyle::from_name(style.pdf_name()), Some(style));
        }
        assert_eq!(FitStyle::from_name("FitZ"), None);
    }
}
