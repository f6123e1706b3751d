// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 重复轨迹抑制 (Duplicate track suppression)
//!
//! 两个跟踪器可能收敛到同一个物体上。综合相似度取三项平均:
//! 1. IOU
//! 2. 1 - 中心距离 / 帧对角线
//! 3. 1 - 速度差 / (2 × 帧对角线)
//!
//! 每个无序对只从面积较大的一方评估一次,被标记的总是较小的一方。

use std::collections::HashSet;

use super::types::{BBox, FrameSize};

/// 参与抑制的轨迹快照
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuppressionCandidate {
    pub bbox: BBox,
    pub velocity: (i32, i32),
}

/// 两个轨迹的综合相似度,范围 [0, 1]
pub fn similarity(a: &SuppressionCandidate, b: &SuppressionCandidate, frame: FrameSize) -> f64 {
    let diagonal = frame.diagonal().max(1.0);

    let iou = a.bbox.iou(&b.bbox);
    let norm_dist = (a.bbox.center_distance(&b.bbox) / diagonal).min(1.0);

    let dvx = (a.velocity.0 - b.velocity.0) as f64;
    let dvy = (a.velocity.1 - b.velocity.1) as f64;
    let norm_speed = ((dvx * dvx + dvy * dvy).sqrt() / (2.0 * diagonal)).min(1.0);

    (iou + (1.0 - norm_dist) + (1.0 - norm_speed)) / 3.0
}

/// 找出需要删除的重复轨迹下标 (降序)
///
/// 按降序删除可以保证先删的元素不会移动后删的下标。
pub fn find_duplicates(
    candidates: &[SuppressionCandidate],
    frame: FrameSize,
    threshold: f64,
) -> Vec<usize> {
    let mut affinity: Vec<(usize, f64)> = Vec::new();

    for (i, ci) in candidates.iter().enumerate() {
        let area_i = ci.bbox.area();
        for (j, cj) in candidates.iter().enumerate() {
            if i == j {
                continue;
            }
            let area_j = cj.bbox.area();
            if area_i < area_j || (area_i == area_j && i > j) {
                continue;
            }

            let score = similarity(ci, cj, frame);
            if score >= threshold {
                log::debug!("track #{j} duplicates #{i} (score {score:.3})");
                affinity.push((j, score));
            }
        }
    }

    affinity.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut seen = HashSet::new();
    let mut removing: Vec<usize> = affinity
        .into_iter()
        .filter_map(|(j, _)| seen.insert(j).then_some(j))
        .collect();
    removing.sort_unstable_by(|a, b| b.cmp(a));
    removing
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: FrameSize = FrameSize {
        width: 640,
        height: 480,
    };

    fn candidate(x: i32, y: i32, w: i32, h: i32, velocity: (i32, i32)) -> SuppressionCandidate {
        SuppressionCandidate {
            bbox: BBox::new(x, y, w, h),
            velocity,
        }
    }

    #[test]
    fn test_similarity_bounds() {
        let a = candidate(0, 0, 100, 100, (0, 0));
        assert!((similarity(&a, &a, FRAME) - 1.0).abs() < 1e-12);

        let b = candidate(600, 440, 30, 30, (-40, 30));
        let s = similarity(&a, &b, FRAME);
        assert!((0.0..=1.0).contains(&s));
        assert!(s < 0.75);
    }

    #[test]
    fn test_overlapping_pair_removes_one() {
        let tracks = [
            candidate(0, 0, 100, 100, (3, 0)),
            candidate(5, 5, 100, 100, (4, 1)),
        ];
        let removed = find_duplicates(&tracks, FRAME, 0.75);
        assert_eq!(removed, vec![1]);
    }

    #[test]
    fn test_smaller_box_is_removed() {
        let tracks = [
            candidate(12, 10, 90, 90, (0, 0)),
            candidate(10, 10, 100, 100, (0, 0)),
        ];
        assert_eq!(find_duplicates(&tracks, FRAME, 0.75), vec![0]);
    }

    #[test]
    fn test_distinct_tracks_kept() {
        let tracks = [
            candidate(0, 0, 80, 80, (5, 0)),
            candidate(400, 300, 80, 80, (-5, 0)),
            candidate(200, 0, 60, 120, (0, 8)),
        ];
        assert!(find_duplicates(&tracks, FRAME, 0.75).is_empty());
    }

    #[test]
    fn test_cluster_indices_unique_and_descending() {
        let tracks = [
            candidate(100, 100, 60, 60, (0, 0)),
            candidate(300, 300, 50, 50, (0, 0)),
            candidate(102, 101, 58, 59, (0, 0)),
            candidate(101, 103, 59, 58, (1, 0)),
            candidate(302, 301, 49, 49, (0, 0)),
        ];
        let removed = find_duplicates(&tracks, FRAME, 0.75);
        assert_eq!(removed, vec![4, 3, 2]);
    }

    #[test]
    fn test_idempotent() {
        let mut tracks = vec![
            candidate(0, 0, 100, 100, (2, 2)),
            candidate(5, 5, 100, 100, (2, 1)),
            candidate(3, 2, 100, 100, (1, 1)),
            candidate(500, 300, 40, 40, (0, 0)),
        ];
        let removed = find_duplicates(&tracks, FRAME, 0.75);
        assert!(!removed.is_empty());
        for idx in removed {
            tracks.remove(idx);
        }
        assert!(find_duplicates(&tracks, FRAME, 0.75).is_empty());
    }
}
