//! Canonical detection schema returned by `/analyze`.
//!
//! Both types can only be built through their validating constructors, so a
//! value in hand always satisfies the numeric invariants.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Overshoot tolerated on `x + w` and `y + h` before a box is rejected.
pub const EXTENT_EPSILON: f64 = 1e-3;

/// Category of a schema violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorKind {
    OutOfRange,
    MissingField,
    TypeMismatch,
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::MissingField => "MISSING_FIELD",
            Self::TypeMismatch => "TYPE_MISMATCH",
        };
        f.write_str(s)
    }
}

/// A field that failed schema validation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} on `{field}`: {detail}")]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub field: String,
    pub detail: String,
}

impl ValidationError {
    pub fn out_of_range(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self { kind: ValidationErrorKind::OutOfRange, field: field.into(), detail: detail.into() }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self {
            kind: ValidationErrorKind::MissingField,
            field: field.into(),
            detail: "field is required".into(),
        }
    }

    pub fn type_mismatch(field: impl Into<String>, expected: &str) -> Self {
        Self {
            kind: ValidationErrorKind::TypeMismatch,
            field: field.into(),
            detail: format!("expected {expected}"),
        }
    }
}

fn check_unit(field: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::out_of_range(field, format!("{value} is outside [0, 1]")))
    }
}

/// A rectangle in normalized image coordinates (top-left corner plus size).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
    confidence: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, w: f64, h: f64, confidence: f64) -> Result<Self, ValidationError> {
        check_unit("x", x)?;
        check_unit("y", y)?;
        check_unit("w", w)?;
        check_unit("h", h)?;
        check_unit("confidence", confidence)?;

        if x + w > 1.0 + EXTENT_EPSILON {
            return Err(ValidationError::out_of_range("w", format!("x + w = {} exceeds 1", x + w)));
        }
        if y + h > 1.0 + EXTENT_EPSILON {
            return Err(ValidationError::out_of_range("h", format!("y + h = {} exceeds 1", y + h)));
        }

        Ok(Self { x, y, w, h, confidence })
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn w(&self) -> f64 {
        self.w
    }

    pub fn h(&self) -> f64 {
        self.h
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }
}

/// The normalized answer for one `/analyze` request.
///
/// `boxes` keeps the order the agent reported them in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    found: bool,
    confidence: f64,
    boxes: Vec<BoundingBox>,
}

impl DetectionResult {
    pub fn new(found: bool, confidence: f64, boxes: Vec<BoundingBox>) -> Result<Self, ValidationError> {
        check_unit("confidence", confidence)?;
        if !found && !boxes.is_empty() {
            return Err(ValidationError::out_of_range(
                "boxes",
                format!("{} boxes reported while found is false", boxes.len()),
            ));
        }
        Ok(Self { found, confidence, boxes })
    }

    pub fn found(&self) -> bool {
        self.found
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_box_inside_unit_square() {
        let b = BoundingBox::new(0.12, 0.34, 0.22, 0.19, 0.83).unwrap();
        assert_eq!(b.x(), 0.12);
        assert_eq!(b.confidence(), 0.83);
    }

    #[test]
    fn rejects_coordinate_out_of_range() {
        let err = BoundingBox::new(-0.1, 0.0, 0.5, 0.5, 0.9).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::OutOfRange);
        assert_eq!(err.field, "x");

        let err = BoundingBox::new(0.0, 0.0, 0.5, 0.5, f64::NAN).unwrap_err();
        assert_eq!(err.field, "confidence");
    }

    #[test]
    fn tolerates_small_extent_overshoot() {
        assert!(BoundingBox::new(0.6, 0.5, 0.4005, 0.5, 0.9).is_ok());
        let err = BoundingBox::new(0.6, 0.0, 0.5, 0.2, 0.9).unwrap_err();
        assert_eq!(err.field, "w");
        let err = BoundingBox::new(0.0, 0.7, 0.2, 0.31, 0.9).unwrap_err();
        assert_eq!(err.field, "h");
    }

    #[test]
    fn not_found_cannot_carry_boxes() {
        let b = BoundingBox::new(0.1, 0.1, 0.1, 0.1, 0.5).unwrap();
        let err = DetectionResult::new(false, 0.1, vec![b]).unwrap_err();
        assert_eq!(err.field, "boxes");
        assert!(DetectionResult::new(false, 0.05, Vec::new()).is_ok());
    }

    #[test]
    fn serializes_to_wire_shape() {
        let b = BoundingBox::new(0.12, 0.34, 0.22, 0.19, 0.83).unwrap();
        let r = DetectionResult::new(true, 0.87, vec![b]).unwrap();
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "found": true,
                "confidence": 0.87,
                "boxes": [{"x": 0.12, "y": 0.34, "w": 0.22, "h": 0.19, "confidence": 0.83}]
            })
        );
    }
}
