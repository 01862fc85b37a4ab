//! Instructions and message parts sent to the vision model.

use base64::{engine::general_purpose::STANDARD, Engine};

/// System instructions describing the detection contract.
pub const DETECTION_INSTRUCTIONS: &str = "You are a strict visual detector. You receive an image and a \
target_prompt describing an object to look for.

Decide whether at least one object in the image clearly matches the target_prompt and report every \
matching region.

Respond with a single JSON object and nothing else:
{\"found\": boolean, \"confidence\": number, \"boxes\": [{\"x\": number, \"y\": number, \"w\": number, \"h\": number, \"confidence\": number}]}

Rules:
- All numbers are between 0 and 1.
- x and y are the top-left corner of a box as a fraction of image width and height; w and h are its \
width and height as fractions.
- confidence is your overall certainty that the target is present; each box has its own confidence.
- Be conservative: if the object is ambiguous, occluded or only similar, answer found=false.
- When found is false, boxes must be an empty array.
- No text outside the JSON object.";

/// User text carrying the caller's prompt.
pub fn user_text(prompt: &str) -> String {
    format!("target_prompt: {prompt}")
}

/// Inline `data:` URL for the uploaded image.
pub fn data_url(mime_type: &str, image: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(image))
}
