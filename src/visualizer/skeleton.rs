// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Limb topology for 17-keypoint poses.

/// Pairs of keypoint indices joined by a limb line.
pub const SKELETON: [[usize; 2]; 19] = [
    [15, 13], // left ankle to left knee
    [13, 11], // left knee to left hip
    [16, 14], // right ankle to right knee
    [14, 12], // right knee to right hip
    [11, 12], // hips
    [5, 11],  // left shoulder to left hip
    [6, 12],  // right shoulder to right hip
    [5, 6],   // shoulders
    [5, 7],   // left shoulder to left elbow
    [6, 8],   // right shoulder to right elbow
    [7, 9],   // left elbow to left wrist
    [8, 10],  // right elbow to right wrist
    [1, 2],   // eyes
    [0, 1],   // nose to left eye
    [0, 2],   // nose to right eye
    [1, 3],   // left eye to left ear
    [2, 4],   // right eye to right ear
    [3, 5],   // left ear to left shoulder
    [4, 6],   // right ear to right shoulder
];

/// Palette index per limb in [`SKELETON`]: legs orange, torso pink, arms blue, face green.
pub const LIMB_COLOR_INDICES: [usize; 19] = [
    0, 0, 0, 0, 7, 7, 7, 9, 9, 9, 9, 9, 16, 16, 16, 16, 16, 16, 16,
];

/// Palette index per keypoint: face green, arms blue, legs orange.
pub const KPT_COLOR_INDICES: [usize; 17] = [16, 16, 16, 16, 16, 9, 9, 9, 9, 9, 9, 0, 0, 0, 0, 0, 0];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::COCO_KEYPOINT_COUNT;
    use crate::visualizer::color::POSE_PALETTE_LEN;

    #[test]
    fn test_skeleton_indices_in_range() {
        assert!(SKELETON.iter().flatten().all(|&i| i < COCO_KEYPOINT_COUNT));
        assert_eq!(KPT_COLOR_INDICES.len(), COCO_KEYPOINT_COUNT);
        assert_eq!(LIMB_COLOR_INDICES.len(), SKELETON.len());
        let slots = LIMB_COLOR_INDICES.iter().chain(KPT_COLOR_INDICES.iter());
        assert!(slots.copied().all(|i| i < POSE_PALETTE_LEN));
    }
}
