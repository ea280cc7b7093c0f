//! Class-aware non-maximum suppression.
//!
//! The network emits many overlapping candidates for one object. Candidates are
//! visited in descending confidence order; each kept candidate removes every
//! remaining candidate of the same class whose IoU with it reaches the threshold.

use std::cmp::Ordering;

use super::detection::Detection;

pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    // Ascending, so the most confident candidate is popped first.
    detections.sort_unstable_by(|a, b| {
        a.confidence
            .partial_cmp(&b.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut kept = Vec::new();
    while let Some(seed) = detections.pop() {
        detections.retain(|other| {
            other.class_id != seed.class_id || seed.bbox.iou(&other.bbox) < iou_threshold
        });
        kept.push(seed);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::detection::BoundingBox;

    fn det(class_id: usize, confidence: f32, x1: f32) -> Detection {
        Detection {
            class_id,
            label: format!("class{}", class_id),
            confidence,
            bbox: BoundingBox::new(x1, 0.0, x1 + 10.0, 10.0),
        }
    }

    #[test]
    fn test_suppresses_overlapping_same_class() {
        let kept = non_max_suppression(vec![det(0, 0.6, 1.0), det(0, 0.9, 0.0)], 0.5);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_keeps_overlapping_other_class() {
        let kept = non_max_suppression(vec![det(0, 0.6, 1.0), det(1, 0.9, 0.0)], 0.5);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_keeps_disjoint_in_confidence_order() {
        let kept = non_max_suppression(
            vec![det(0, 0.3, 0.0), det(0, 0.8, 50.0), det(0, 0.5, 100.0)],
            0.5,
        );
        let confidences: Vec<f32> = kept.iter().map(|d| d.confidence).collect();
        assert_eq!(confidences, vec![0.8, 0.5, 0.3]);
    }

    #[test]
    fn test_empty_input() {
        assert!(non_max_suppression(Vec::new(), 0.5).is_empty());
    }
}
