use crate::detect::result::DetectedObject;

/// Greedy per-label non-max suppression.
///
/// Leaves `objects` sorted by confidence, highest first, with every box that
/// overlaps a stronger box of the same label by more than `iou_threshold`
/// removed.
pub fn non_max_suppression(objects: &mut Vec<DetectedObject>, iou_threshold: f32) {
    objects.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept = 0;
    for index in 0..objects.len() {
        let drop = (0..kept).any(|prev| {
            objects[prev].label == objects[index].label
                && objects[prev].iou(&objects[index]) > iou_threshold
        });
        if !drop {
            objects.swap(kept, index);
            kept += 1;
        }
    }
    objects.truncate(kept);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Label;

    #[test]
    fn suppresses_overlapping_boxes_of_same_label() {
        let mut objects = vec![
            DetectedObject::new(Label::Tray, [0.0, 0.0, 10.0, 10.0], 0.6),
            DetectedObject::new(Label::Tray, [1.0, 1.0, 11.0, 11.0], 0.9),
            DetectedObject::new(Label::Tray, [100.0, 100.0, 110.0, 110.0], 0.7),
        ];
        non_max_suppression(&mut objects, 0.3);
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].confidence, 0.9);
        assert_eq!(objects[1].confidence, 0.7);
    }

    #[test]
    fn keeps_overlapping_boxes_of_different_labels() {
        let mut objects = vec![
            DetectedObject::new(Label::Arc, [0.0, 0.0, 10.0, 10.0], 0.9),
            DetectedObject::new(Label::Pin, [0.0, 0.0, 10.0, 10.0], 0.8),
        ];
        non_max_suppression(&mut objects, 0.3);
        assert_eq!(objects.len(), 2);
    }
}
