// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 单目标运动轨迹 (Motion track)
//!
//! 一个 [`Track`] 包装一个运动跟踪器实例,记录位置、速度与连续失败次数。
//! 失败策略区分 "跟丢" 与 "卡住":
//! - 跟踪器报告失败 → 失败计数 +1
//! - 成功但中心位移在 `stationary_epsilon` 内 → 失败计数 +2
//! - 真实运动 → 清零

use image::RgbImage;

use super::capability::MotionTracker;
use super::types::{BBox, FrameSize, TrackerKind};

/// 跟踪轨迹
pub struct Track {
    /// 唯一ID,引擎生命周期内不复用
    id: u64,
    kind: TrackerKind,
    tracker: Box<dyn MotionTracker>,
    bbox: BBox,
    center: (i32, i32),
    /// 中心点位移 (上次更新以来)
    velocity: (i32, i32),
    failures: u32,
    last_success: bool,
    /// 最近一次非退化的框,短暂遮挡时用来替代零框
    last_good_bbox: Option<BBox>,
    stationary_epsilon: i32,
}

impl std::fmt::Debug for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Track")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("bbox", &self.bbox)
            .field("velocity", &self.velocity)
            .field("failures", &self.failures)
            .field("last_success", &self.last_success)
            .finish()
    }
}

impl Track {
    pub(crate) fn new(
        id: u64,
        kind: TrackerKind,
        tracker: Box<dyn MotionTracker>,
        stationary_epsilon: i32,
    ) -> Self {
        Self {
            id,
            kind,
            tracker,
            bbox: BBox::default(),
            center: (0, 0),
            velocity: (0, 0),
            failures: 0,
            last_success: false,
            last_good_bbox: None,
            stationary_epsilon,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> TrackerKind {
        self.kind
    }

    pub fn bbox(&self) -> BBox {
        self.bbox
    }

    pub fn center(&self) -> (i32, i32) {
        self.center
    }

    pub fn velocity(&self) -> (i32, i32) {
        self.velocity
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn last_success(&self) -> bool {
        self.last_success
    }

    pub fn last_good_bbox(&self) -> Option<BBox> {
        self.last_good_bbox
    }

    /// 初始化跟踪器,记录初始中心,重置计数
    pub fn init(&mut self, frame: &RgbImage, bbox: BBox) -> bool {
        let bbox = bbox.clamp(FrameSize::of(frame));
        self.bbox = bbox;
        self.center = bbox.center();
        self.failures = 0;
        self.last_success = self.tracker.init(frame, bbox);
        if self.last_success {
            self.last_good_bbox = Some(bbox);
        }
        self.last_success
    }

    /// 在新帧上更新
    pub fn update(&mut self, frame: &RgbImage) -> (bool, BBox) {
        let (success, raw) = self.tracker.update(frame);
        let bbox = raw.clamp(FrameSize::of(frame));

        let center = bbox.center();
        self.velocity = (center.0 - self.center.0, center.1 - self.center.1);
        self.center = center;
        self.bbox = bbox;
        self.last_success = success;

        let eps = self.stationary_epsilon;
        if !success {
            self.failures += 1;
        } else if self.velocity.0.abs() <= eps && self.velocity.1.abs() <= eps {
            // 锁定在静止区域比短暂丢失惩罚更重
            self.failures += 2;
        } else {
            self.failures = 0;
        }

        (success, bbox)
    }

    /// 退化框回退到最近的有效框 (返回实际使用的框)
    pub(crate) fn settle_bbox(&mut self, success: bool, bbox: BBox) -> BBox {
        match self.last_good_bbox {
            Some(good) if !success && bbox.is_degenerate() => {
                self.bbox = good;
                good
            }
            _ => {
                if !bbox.is_degenerate() {
                    self.last_good_bbox = Some(bbox);
                }
                bbox
            }
        }
    }

    /// 用新的跟踪器实例在新位置重新初始化,保留ID与历史
    pub fn reinit(
        &mut self,
        frame: &RgbImage,
        bbox: BBox,
        tracker: Box<dyn MotionTracker>,
    ) -> bool {
        self.tracker = tracker;
        let velocity = self.velocity;
        let last_good = self.last_good_bbox;

        let ok = self.init(frame, bbox);
        self.velocity = velocity;
        if !ok {
            self.last_good_bbox = last_good;
        }
        ok
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// 按脚本返回结果的跟踪器
    pub(crate) struct ScriptedTracker {
        pub steps: Rc<RefCell<VecDeque<(bool, BBox)>>>,
        pub current: BBox,
    }

    impl MotionTracker for ScriptedTracker {
        fn init(&mut self, _frame: &RgbImage, bbox: BBox) -> bool {
            self.current = bbox;
            true
        }

        fn update(&mut self, _frame: &RgbImage) -> (bool, BBox) {
            match self.steps.borrow_mut().pop_front() {
                Some((ok, bbox)) => {
                    if ok {
                        self.current = bbox;
                    }
                    (ok, bbox)
                }
                None => (true, self.current),
            }
        }
    }

    /// 初始化总是失败的跟踪器
    struct RefusingTracker;

    impl MotionTracker for RefusingTracker {
        fn init(&mut self, _frame: &RgbImage, _bbox: BBox) -> bool {
            false
        }

        fn update(&mut self, _frame: &RgbImage) -> (bool, BBox) {
            (false, BBox::default())
        }
    }

    fn scripted(steps: Vec<(bool, BBox)>) -> Box<dyn MotionTracker> {
        Box::new(ScriptedTracker {
            steps: Rc::new(RefCell::new(steps.into())),
            current: BBox::default(),
        })
    }

    fn frame() -> RgbImage {
        RgbImage::new(200, 100)
    }

    #[test]
    fn test_init_records_center() {
        let mut track = Track::new(3, TrackerKind::Template, scripted(vec![]), 5);
        assert!(track.init(&frame(), BBox::new(10, 10, 20, 30)));
        assert_eq!(track.center(), (20, 25));
        assert_eq!(track.failures(), 0);
        assert_eq!(track.last_good_bbox(), Some(BBox::new(10, 10, 20, 30)));
    }

    #[test]
    fn test_failure_policy() {
        let steps = vec![
            (true, BBox::new(30, 10, 20, 30)), // moved 20px
            (false, BBox::default()),          // lost
            (true, BBox::new(31, 11, 20, 30)), // recovered
            (true, BBox::new(33, 12, 20, 30)), // stuck
            (true, BBox::new(60, 12, 20, 30)), // moving again
        ];
        let mut track = Track::new(0, TrackerKind::Template, scripted(steps), 5);
        track.init(&frame(), BBox::new(10, 10, 20, 30));

        track.update(&frame());
        assert_eq!(track.failures(), 0);
        assert_eq!(track.velocity(), (20, 0));

        let (ok, _) = track.update(&frame());
        assert!(!ok);
        assert_eq!(track.failures(), 1);

        track.update(&frame());
        // displacement is measured from the zero box's center
        assert_eq!(track.failures(), 0);
        track.update(&frame());
        assert_eq!(track.failures(), 2);
        assert_eq!(track.velocity(), (2, 1));

        track.update(&frame());
        assert_eq!(track.failures(), 0);
    }

    #[test]
    fn test_update_clamps_to_frame() {
        let steps = vec![(true, BBox::new(-20, 90, 300, 50))];
        let mut track = Track::new(0, TrackerKind::Template, scripted(steps), 5);
        track.init(&frame(), BBox::new(10, 10, 20, 30));

        let (_, bbox) = track.update(&frame());
        assert_eq!(bbox, BBox::new(0, 90, 199, 9));
        assert_eq!(track.bbox(), bbox);
    }

    #[test]
    fn test_settle_bbox_falls_back_on_zero_box() {
        let mut track = Track::new(0, TrackerKind::Template, scripted(vec![]), 5);
        track.init(&frame(), BBox::new(10, 10, 20, 30));

        let settled = track.settle_bbox(false, BBox::default());
        assert_eq!(settled, BBox::new(10, 10, 20, 30));
        assert_eq!(track.bbox(), settled);

        let moved = BBox::new(12, 10, 20, 30);
        assert_eq!(track.settle_bbox(true, moved), moved);
        assert_eq!(track.last_good_bbox(), Some(moved));
    }

    #[test]
    fn test_zero_box_never_becomes_last_good() {
        let mut track = Track::new(0, TrackerKind::Template, Box::new(RefusingTracker), 5);
        assert!(!track.init(&frame(), BBox::new(10, 10, 20, 30)));
        assert_eq!(track.last_good_bbox(), None);

        let (ok, bbox) = track.update(&frame());
        assert!(!ok);
        assert_eq!(track.settle_bbox(ok, bbox), BBox::default());
        assert_eq!(track.last_good_bbox(), None);

        let found = BBox::new(40, 20, 20, 30);
        track.settle_bbox(true, found);
        assert_eq!(track.settle_bbox(false, BBox::default()), found);
        assert_eq!(track.last_good_bbox(), Some(found));
    }

    #[test]
    fn test_reinit_keeps_identity() {
        let mut track = Track::new(7, TrackerKind::Csrt, scripted(vec![]), 5);
        track.init(&frame(), BBox::new(10, 10, 20, 30));
        track.update(&frame());
        track.update(&frame());
        assert_eq!(track.failures(), 4);

        assert!(track.reinit(&frame(), BBox::new(100, 40, 20, 20), scripted(vec![])));
        assert_eq!(track.id(), 7);
        assert_eq!(track.kind(), TrackerKind::Csrt);
        assert_eq!(track.failures(), 0);
        assert_eq!(track.bbox(), BBox::new(100, 40, 20, 20));
        assert_eq!(track.center(), (110, 50));
    }
}
