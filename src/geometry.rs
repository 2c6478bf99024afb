//! Spatial tests over detected boxes.
//!
//! Everything here is pure. Checks that need a particular set of objects
//! report a `GeometryError` instead of guessing when the set is wrong.

use crate::detect::{DetectedObject, Label};

/// Height/width ratio above which a tray counts as standing upright.
pub const TRAY_VERTICAL_RATIO: f32 = 1.2;

#[derive(Clone, Debug, PartialEq)]
pub enum GeometryError {
    /// No object of the required label was present.
    MissingObject { label: Label },
    /// The check needs exactly `expected` objects of a kind.
    CountMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    /// A box with zero or negative extent.
    DegenerateBox { label: Label },
}

impl std::fmt::Display for GeometryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeometryError::MissingObject { label } => write!(f, "no {} in frame", label),
            GeometryError::CountMismatch {
                what,
                expected,
                found,
            } => write!(f, "expected {} {}, found {}", expected, what, found),
            GeometryError::DegenerateBox { label } => write!(f, "{} box has no extent", label),
        }
    }
}

impl std::error::Error for GeometryError {}

/// Objects with `label`, highest confidence first.
pub fn filter_by_label(objects: &[DetectedObject], label: Label) -> Vec<DetectedObject> {
    let mut matched: Vec<DetectedObject> = objects
        .iter()
        .filter(|obj| obj.label == label)
        .copied()
        .collect();
    matched.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    matched
}

/// Per-label filtered lists concatenated in the order of `labels`.
pub fn filter_by_labels(objects: &[DetectedObject], labels: &[Label]) -> Vec<DetectedObject> {
    labels
        .iter()
        .flat_map(|label| filter_by_label(objects, *label))
        .collect()
}

/// Highest-confidence object with `label`.
pub fn best_by_label(objects: &[DetectedObject], label: Label) -> Option<DetectedObject> {
    objects
        .iter()
        .filter(|obj| obj.label == label)
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        .copied()
}

/// Whether the most confident tray stands upright.
pub fn check_tray_vertical(objects: &[DetectedObject]) -> Result<bool, GeometryError> {
    let tray = best_by_label(objects, Label::Tray).ok_or(GeometryError::MissingObject {
        label: Label::Tray,
    })?;
    let (width, height) = (tray.width(), tray.height());
    if width <= 0.0 || height <= 0.0 {
        return Err(GeometryError::DegenerateBox { label: Label::Tray });
    }

    let ratio = height / width;
    let vertical = ratio > TRAY_VERTICAL_RATIO;
    log::debug!(
        "tray height: {}, tray width: {}, height / width: {:.3}, vertical? {}",
        height,
        width,
        ratio,
        vertical
    );
    Ok(vertical)
}

/// Whether the lever hangs from the lower-left corner of the tray.
///
/// Needs exactly one tray and exactly one `lever`/`leverside` box. The lever
/// must start near the tray's left edge, start near the tray's bottom edge,
/// and end before 40% of the tray's width.
pub fn check_dangling(objects: &[DetectedObject]) -> Result<bool, GeometryError> {
    let trays = filter_by_label(objects, Label::Tray);
    let levers = filter_by_labels(objects, &[Label::Lever, Label::LeverSide]);
    let (tray, lever) = match (trays.as_slice(), levers.as_slice()) {
        ([tray], [lever]) => (tray, lever),
        ([_], _) => {
            return Err(GeometryError::CountMismatch {
                what: "lever boxes",
                expected: 1,
                found: levers.len(),
            })
        }
        _ => {
            return Err(GeometryError::CountMismatch {
                what: "tray boxes",
                expected: 1,
                found: trays.len(),
            })
        }
    };

    let width = tray.width();
    let height = tray.height();
    if width <= 0.0 || height <= 0.0 {
        return Err(GeometryError::DegenerateBox { label: Label::Tray });
    }

    let near_left_edge = tray.x1 - 0.1 * width < lever.x1 && lever.x1 < tray.x1 + 0.2 * width;
    let near_bottom_edge = tray.y2 - 0.1 * height < lever.y1 && lever.y1 < tray.y2 + 0.1 * height;
    let left_of_center = lever.x2 < tray.x1 + 0.4 * width;
    log::debug!("tray is at: {:?}", tray);
    log::debug!("lever is at: {:?}", lever);
    log::debug!(
        "lever near left edge? {}, near bottom edge? {}, left of tray center? {}",
        near_left_edge,
        near_bottom_edge,
        left_of_center
    );
    Ok(near_left_edge && near_bottom_edge && left_of_center)
}
