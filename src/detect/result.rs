use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Components the detector is trained to recognise.
///
/// The declaration order is the detector's class order; `Label::ALL` and
/// `Label::index` depend on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Tray,
    Lever,
    LeverSide,
    Arc,
    Pin,
    Assembled,
    SlotPin,
    Clamped,
}

impl Label {
    pub const COUNT: usize = 8;

    pub const ALL: [Label; Label::COUNT] = [
        Label::Tray,
        Label::Lever,
        Label::LeverSide,
        Label::Arc,
        Label::Pin,
        Label::Assembled,
        Label::SlotPin,
        Label::Clamped,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Tray => "tray",
            Label::Lever => "lever",
            Label::LeverSide => "leverside",
            Label::Arc => "arc",
            Label::Pin => "pin",
            Label::Assembled => "assembled",
            Label::SlotPin => "slotpin",
            Label::Clamped => "clamped",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase();
        Label::ALL
            .iter()
            .copied()
            .find(|label| label.as_str() == name)
            .ok_or_else(|| anyhow!("unknown label '{}'", s))
    }
}

/// One bounding box reported by the detector, in image pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub label: Label,
}

impl DetectedObject {
    pub fn new(label: Label, bbox: [f32; 4], confidence: f32) -> Self {
        Self {
            x1: bbox[0],
            y1: bbox[1],
            x2: bbox[2],
            y2: bbox[3],
            confidence,
            label,
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Map a box found on a resized image back to the original image.
    pub fn rescaled(&self, resize_ratio: f32) -> Self {
        Self {
            x1: self.x1 / resize_ratio,
            y1: self.y1 / resize_ratio,
            x2: self.x2 / resize_ratio,
            y2: self.y2 / resize_ratio,
            ..*self
        }
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &DetectedObject) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = ix * iy;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// Per-label tally covering every known label, zero by default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LabelCounts([u32; Label::COUNT]);

impl LabelCounts {
    /// Number of objects per label in one frame.
    pub fn tally(objects: &[DetectedObject]) -> Self {
        let mut counts = Self::default();
        for obj in objects {
            counts[obj.label] += 1;
        }
        counts
    }

    pub fn reset(&mut self) {
        self.0 = [0; Label::COUNT];
    }

    pub fn iter(&self) -> impl Iterator<Item = (Label, u32)> + '_ {
        Label::ALL.iter().map(move |label| (*label, self.0[label.index()]))
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|count| *count == 0)
    }
}

impl Index<Label> for LabelCounts {
    type Output = u32;

    fn index(&self, label: Label) -> &u32 {
        &self.0[label.index()]
    }
}

impl IndexMut<Label> for LabelCounts {
    fn index_mut(&mut self, label: Label) -> &mut u32 {
        &mut self.0[label.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_order_matches_index() {
        for (idx, label) in Label::ALL.iter().enumerate() {
            assert_eq!(label.index(), idx);
            assert_eq!(Label::from_index(idx), Some(*label));
        }
        assert_eq!(Label::from_index(Label::COUNT), None);
    }

    #[test]
    fn label_parses_lowercase_names() {
        assert_eq!("leverside".parse::<Label>().unwrap(), Label::LeverSide);
        assert_eq!(" SlotPin ".parse::<Label>().unwrap(), Label::SlotPin);
        assert!("screw".parse::<Label>().is_err());
    }

    #[test]
    fn label_serializes_as_lowercase() {
        let json = serde_json::to_string(&Label::SlotPin).unwrap();
        assert_eq!(json, "\"slotpin\"");
    }

    #[test]
    fn rescale_divides_by_ratio() {
        let obj = DetectedObject::new(Label::Tray, [10.0, 20.0, 30.0, 40.0], 0.7);
        let back = obj.rescaled(0.5);
        assert_eq!([back.x1, back.y1, back.x2, back.y2], [20.0, 40.0, 60.0, 80.0]);
        assert_eq!(back.confidence, 0.7);
        assert_eq!(back.label, Label::Tray);
    }

    #[test]
    fn iou_of_half_overlap() {
        let a = DetectedObject::new(Label::Pin, [0.0, 0.0, 10.0, 10.0], 0.9);
        let b = DetectedObject::new(Label::Pin, [5.0, 0.0, 15.0, 10.0], 0.8);
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
        let far = DetectedObject::new(Label::Pin, [50.0, 50.0, 60.0, 60.0], 0.8);
        assert_eq!(a.iou(&far), 0.0);
    }

    #[test]
    fn tally_counts_each_label() {
        let objects = [
            DetectedObject::new(Label::Tray, [0.0, 0.0, 1.0, 1.0], 0.9),
            DetectedObject::new(Label::Tray, [0.0, 0.0, 1.0, 1.0], 0.8),
            DetectedObject::new(Label::Pin, [0.0, 0.0, 1.0, 1.0], 0.8),
        ];
        let counts = LabelCounts::tally(&objects);
        assert_eq!(counts[Label::Tray], 2);
        assert_eq!(counts[Label::Pin], 1);
        assert_eq!(counts[Label::Lever], 0);
        assert_eq!(counts.iter().count(), Label::COUNT);
    }
}
