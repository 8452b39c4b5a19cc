use crate::error::EligibilityError;
use crate::feed::{Enclosure, FeedItem};

/// Enclosure MIME types poke downloads
pub const ACCEPTED_MIME_TYPES: [&str; 2] = ["audio/mpeg", "audio/mp3"];

/// Items newer than `watermark`, oldest first.
///
/// The sort is stable so items sharing a publish time keep their feed order.
/// Processing oldest-first keeps the watermark a contiguous prefix of what
/// has actually been handled.
pub fn select_new(items: &[FeedItem], watermark: i64) -> Vec<&FeedItem> {
    let mut selected: Vec<&FeedItem> = items
        .iter()
        .filter(|item| item.published > watermark)
        .collect();
    selected.sort_by_key(|item| item.published);
    selected
}

/// The single downloadable enclosure of `item`, if it has one
pub fn check_eligibility(item: &FeedItem) -> Result<&Enclosure, EligibilityError> {
    let enclosure = match item.enclosures.as_slice() {
        [] => return Err(EligibilityError::NoEnclosure),
        [enclosure] => enclosure,
        many => {
            return Err(EligibilityError::MultipleEnclosures { count: many.len() });
        }
    };

    let mime_type = enclosure.mime_type.as_deref().unwrap_or("");
    if is_accepted_mime_type(mime_type) {
        Ok(enclosure)
    } else {
        Err(EligibilityError::UnsupportedType {
            mime_type: mime_type.to_string(),
        })
    }
}

/// Case-insensitive match that ignores parameters such as `; charset=`
fn is_accepted_mime_type(mime_type: &str) -> bool {
    let essence = mime_type.split(';').next().unwrap_or("").trim();
    ACCEPTED_MIME_TYPES
        .iter()
        .any(|accepted| essence.eq_ignore_ascii_case(accepted))
}
