//! Result normalizer.
//!
//! Turns whatever the vision agent produced into a [`DetectionResult`] or one
//! of two typed failures. Pure: no I/O, no logging, no clock.
//!
//! Coercion policy:
//! - `confidence` (overall and per box) and box coordinates are clamped into `[0, 1]`.
//! - A missing `found` is inferred as `true` only when the agent listed boxes.
//! - A box missing a coordinate, or still overshooting the image after
//!   clamping, is dropped; the remaining boxes are kept in order.
//! - A box without its own confidence inherits the overall confidence.
//! - `found = true` with no surviving box is demoted to `found = false`.
//! - `found = false` never carries boxes; any reported ones are discarded.
//! - A missing or non-numeric overall `confidence` fails validation.

pub mod extract;

mod coerce;

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;
use visionproxy_core::{BoundingBox, DetectionResult, ErrorCode, RawAgentOutput, ValidationError};

use coerce::{boolean, clamp_unit, lookup, number, Field};

pub use extract::extract_object;

const BOX_KEYS: &[&str] = &["boxes", "bounding_boxes", "bboxes"];

/// A repair applied while normalizing.
#[derive(Debug, Clone, PartialEq)]
pub enum Adjustment {
    Clamped { field: String, from: f64, to: f64 },
    FoundInferred { value: bool },
    FoundDemoted,
    BoxDropped { index: usize, reason: String },
    BoxConfidenceInherited { index: usize },
    BoxesDiscarded { count: usize },
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clamped { field, from, to } => write!(f, "clamped `{field}` from {from} to {to}"),
            Self::FoundInferred { value } => write!(f, "`found` missing, inferred {value}"),
            Self::FoundDemoted => f.write_str("`found` demoted to false: no valid boxes"),
            Self::BoxDropped { index, reason } => write!(f, "dropped boxes[{index}]: {reason}"),
            Self::BoxConfidenceInherited { index } => {
                write!(f, "boxes[{index}] has no confidence, inherited overall value")
            }
            Self::BoxesDiscarded { count } => {
                write!(f, "discarded {count} boxes reported alongside found=false")
            }
        }
    }
}

/// A validated result plus the repairs it took to get there.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub result: DetectionResult,
    pub adjustments: Vec<Adjustment>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    #[error("agent output is unparseable: {0}")]
    Unparseable(String),

    #[error("agent output failed validation: {0}")]
    ValidationFailed(#[from] ValidationError),
}

impl NormalizeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Unparseable(_) => ErrorCode::Unparseable,
            Self::ValidationFailed(_) => ErrorCode::ValidationFailed,
        }
    }
}

/// Normalize raw agent output.
pub fn normalize(raw: &RawAgentOutput) -> Result<Normalized, NormalizeError> {
    match raw {
        RawAgentOutput::Json(Value::Object(object)) => normalize_object(object),
        RawAgentOutput::Json(Value::String(text)) | RawAgentOutput::Text(text) => {
            if text.trim().is_empty() {
                return Err(NormalizeError::Unparseable("agent returned an empty answer".into()));
            }
            let object = extract_object(text).ok_or_else(|| {
                NormalizeError::Unparseable("no JSON object found in agent answer".into())
            })?;
            normalize_object(&object)
        }
        RawAgentOutput::Json(_) => Err(NormalizeError::Unparseable(
            "agent answer is JSON but not an object".into(),
        )),
    }
}

/// Normalize an already-extracted JSON object.
pub fn normalize_object(object: &Map<String, Value>) -> Result<Normalized, NormalizeError> {
    let mut adjustments = Vec::new();

    let confidence = match number(object.get("confidence")) {
        Field::Present(v) => clamp_recorded("confidence", v, &mut adjustments),
        Field::Missing => return Err(ValidationError::missing("confidence").into()),
        Field::Invalid => {
            return Err(ValidationError::type_mismatch("confidence", "a number in [0, 1]").into())
        }
    };

    let raw_boxes: &[Value] = match lookup(object, BOX_KEYS) {
        None => &[],
        Some(Value::Array(items)) => items,
        Some(_) => return Err(ValidationError::type_mismatch("boxes", "an array").into()),
    };

    let claimed = match boolean(object.get("found")) {
        Field::Present(value) => value,
        Field::Missing => {
            let value = !raw_boxes.is_empty();
            adjustments.push(Adjustment::FoundInferred { value });
            value
        }
        Field::Invalid => return Err(ValidationError::type_mismatch("found", "a boolean").into()),
    };

    let mut boxes = Vec::with_capacity(raw_boxes.len());
    for (index, entry) in raw_boxes.iter().enumerate() {
        match coerce_box(index, entry, confidence) {
            Ok((bbox, repairs)) => {
                adjustments.extend(repairs);
                boxes.push(bbox);
            }
            Err(reason) => adjustments.push(Adjustment::BoxDropped { index, reason }),
        }
    }

    let found = if !claimed {
        if !boxes.is_empty() {
            adjustments.push(Adjustment::BoxesDiscarded { count: boxes.len() });
            boxes.clear();
        }
        false
    } else if boxes.is_empty() {
        adjustments.push(Adjustment::FoundDemoted);
        false
    } else {
        true
    };

    let result = DetectionResult::new(found, confidence, boxes)?;
    Ok(Normalized { result, adjustments })
}

fn clamp_recorded(field: &str, value: f64, adjustments: &mut Vec<Adjustment>) -> f64 {
    let clamped = clamp_unit(value);
    if clamped != value {
        adjustments.push(Adjustment::Clamped { field: field.to_string(), from: value, to: clamped });
    }
    clamped
}

fn coerce_box(
    index: usize,
    entry: &Value,
    fallback_confidence: f64,
) -> Result<(BoundingBox, Vec<Adjustment>), String> {
    let Some(fields) = entry.as_object() else {
        return Err("entry is not an object".into());
    };

    let mut repairs = Vec::new();
    let mut coords = [0.0f64; 4];
    let slots: [(&str, &[&str]); 4] =
        [("x", &["x"]), ("y", &["y"]), ("w", &["w", "width"]), ("h", &["h", "height"])];

    for (slot, (name, aliases)) in coords.iter_mut().zip(slots) {
        *slot = match number(lookup(fields, aliases)) {
            Field::Present(v) => clamp_recorded(&format!("boxes[{index}].{name}"), v, &mut repairs),
            Field::Missing => return Err(format!("missing `{name}`")),
            Field::Invalid => return Err(format!("`{name}` is not a number")),
        };
    }

    let confidence = match number(fields.get("confidence")) {
        Field::Present(v) => {
            clamp_recorded(&format!("boxes[{index}].confidence"), v, &mut repairs)
        }
        Field::Missing => {
            repairs.push(Adjustment::BoxConfidenceInherited { index });
            fallback_confidence
        }
        Field::Invalid => return Err("`confidence` is not a number".into()),
    };

    let [x, y, w, h] = coords;
    let bbox = BoundingBox::new(x, y, w, h, confidence).map_err(|e| e.to_string())?;
    Ok((bbox, repairs))
}
