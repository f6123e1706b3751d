// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 融合引擎数据结构定义
//! Data structures shared by tracks, the fusion engine and the face archive

use std::fmt;
use std::str::FromStr;

use image::GenericImageView;
use serde::{Deserialize, Serialize};

use crate::error::TrackingError;

// ========== 枚举类型 ==========

/// 运动跟踪算法类型 (motion-tracking capability tag)
///
/// Reinitialization asks the factory for the same tag instead of inspecting
/// the live capability instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerKind {
    Mosse,
    Kcf,
    Csrt,
    /// 内置模板匹配跟踪器
    Template,
}

impl TrackerKind {
    pub const ALL: [TrackerKind; 4] = [
        TrackerKind::Mosse,
        TrackerKind::Kcf,
        TrackerKind::Csrt,
        TrackerKind::Template,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerKind::Mosse => "MOSSE",
            TrackerKind::Kcf => "KCF",
            TrackerKind::Csrt => "CSRT",
            TrackerKind::Template => "TEMPLATE",
        }
    }
}

impl fmt::Display for TrackerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackerKind {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        TrackerKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| TrackingError::unsupported(name))
    }
}

// ========== 数据结构 ==========

/// 帧尺寸 (Frame size in pixels)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of<I: GenericImageView>(image: &I) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }

    /// 对角线长度,用于归一化距离
    pub fn diagonal(&self) -> f64 {
        let w = self.width as f64;
        let h = self.height as f64;
        (w * w + h * h).sqrt()
    }
}

/// 检测框 (x, y, w, h),整数像素坐标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl BBox {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn xmax(&self) -> i32 {
        self.x + self.w
    }

    pub fn ymax(&self) -> i32 {
        self.y + self.h
    }

    pub fn area(&self) -> i64 {
        if self.is_degenerate() {
            0
        } else {
            self.w as i64 * self.h as i64
        }
    }

    /// 零面积或负面积
    pub fn is_degenerate(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    /// 中心点 (x + w/2, y + h/2),整数除法
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.w / 2, self.y + self.h / 2)
    }

    pub fn intersection_area(&self, another: &BBox) -> i64 {
        let iw = self.xmax().min(another.xmax()) - self.x.max(another.x);
        let ih = self.ymax().min(another.ymax()) - self.y.max(another.y);
        if iw <= 0 || ih <= 0 {
            return 0;
        }
        iw as i64 * ih as i64
    }

    /// 交并比 (Intersection over Union)
    pub fn iou(&self, another: &BBox) -> f64 {
        let intersection = self.intersection_area(another);
        if intersection == 0 {
            return 0.0;
        }
        let union = self.area() + another.area() - intersection;
        if union <= 0 {
            return 0.0;
        }
        intersection as f64 / union as f64
    }

    /// 中心点欧氏距离
    pub fn center_distance(&self, another: &BBox) -> f64 {
        let (cx1, cy1) = self.center();
        let (cx2, cy2) = another.center();
        let dx = (cx2 - cx1) as f64;
        let dy = (cy2 - cy1) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// 限制在帧内: x,y,w,h ≥ 0, x+w ≤ width-1, y+h ≤ height-1
    pub fn clamp(&self, frame: FrameSize) -> BBox {
        let max_x = frame.width.saturating_sub(1) as i32;
        let max_y = frame.height.saturating_sub(1) as i32;

        let x = self.x.max(0).min(max_x);
        let y = self.y.max(0).min(max_y);
        let w = self.w.max(0).min(max_x - x);
        let h = self.h.max(0).min(max_y - y);
        BBox { x, y, w, h }
    }

    /// 按比例缩放 (tracking frame → full-resolution frame)
    pub fn scale(&self, factor: f64) -> BBox {
        BBox {
            x: (self.x as f64 * factor) as i32,
            y: (self.y as f64 * factor) as i32,
            w: (self.w as f64 * factor) as i32,
            h: (self.h as f64 * factor) as i32,
        }
    }

    pub fn translate(&self, dx: i32, dy: i32) -> BBox {
        BBox {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }
}

/// 融合结果 (one reconciled object of a frame)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FusedObject {
    /// 是否成功定位
    pub success: bool,
    pub bbox: BBox,
    /// 对象身份; `None` 表示尚未分配
    pub identity: Option<u64>,
    /// 本帧由检测器给出或修正
    pub changed: bool,
}

impl FusedObject {
    pub(crate) fn detected(bbox: BBox) -> Self {
        Self {
            success: true,
            bbox,
            identity: None,
            changed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn random_bbox(rng: &mut impl Rng) -> BBox {
        BBox::new(
            rng.gen_range(-50..600),
            rng.gen_range(-50..400),
            rng.gen_range(-10..300),
            rng.gen_range(-10..300),
        )
    }

    #[test]
    fn test_iou_identity_and_disjoint() {
        let a = BBox::new(10, 10, 40, 30);
        assert_eq!(a.iou(&a), 1.0);

        let b = BBox::new(50, 10, 40, 30);
        assert_eq!(a.iou(&b), 0.0);
        let c = BBox::new(200, 200, 5, 5);
        assert_eq!(a.iou(&c), 0.0);
    }

    #[test]
    fn test_iou_symmetric() {
        let mut rng = rand::thread_rng();
        for _ in 0..500 {
            let a = random_bbox(&mut rng);
            let b = random_bbox(&mut rng);
            assert_eq!(a.iou(&b), b.iou(&a));
            let iou = a.iou(&b);
            assert!((0.0..=1.0).contains(&iou));
        }
    }

    #[test]
    fn test_iou_known_overlap() {
        let detection = BBox::new(50, 50, 40, 40);
        let predicted = BBox::new(52, 51, 38, 39);
        let iou = detection.iou(&predicted);
        assert!((iou - 0.926).abs() < 0.01, "iou = {iou}");

        let a = BBox::new(0, 0, 100, 100);
        let b = BBox::new(5, 5, 100, 100);
        assert!((a.iou(&b) - 9025.0 / 10975.0).abs() < 1e-9);
    }

    #[test]
    fn test_clamp_within_frame() {
        let frame = FrameSize::new(640, 480);
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let b = random_bbox(&mut rng).clamp(frame);
            assert!(b.x >= 0 && b.y >= 0 && b.w >= 0 && b.h >= 0);
            assert!(b.x + b.w <= frame.width as i32 - 1);
            assert!(b.y + b.h <= frame.height as i32 - 1);
        }
    }

    #[test]
    fn test_clamp_examples() {
        let frame = FrameSize::new(100, 80);
        assert_eq!(
            BBox::new(-5, -5, 20, 20).clamp(frame),
            BBox::new(0, 0, 20, 20)
        );
        assert_eq!(
            BBox::new(90, 70, 20, 20).clamp(frame),
            BBox::new(90, 70, 9, 9)
        );
        assert_eq!(
            BBox::new(150, 10, 20, 20).clamp(frame),
            BBox::new(99, 10, 0, 20)
        );
    }

    #[test]
    fn test_center_and_degenerate() {
        let b = BBox::new(10, 20, 5, 7);
        assert_eq!(b.center(), (12, 23));
        assert!(!b.is_degenerate());
        assert!(BBox::new(1, 1, 0, 4).is_degenerate());
        assert!(BBox::new(1, 1, 4, -2).is_degenerate());
        assert_eq!(BBox::new(1, 1, 4, -2).area(), 0);
    }

    #[test]
    fn test_scale_and_translate() {
        let b = BBox::new(10, 20, 30, 40);
        assert_eq!(b.scale(2.5), BBox::new(25, 50, 75, 100));
        assert_eq!(b.translate(5, -5), BBox::new(15, 15, 30, 40));
    }

    #[test]
    fn test_tracker_kind_parse() {
        assert_eq!("csrt".parse::<TrackerKind>().unwrap(), TrackerKind::Csrt);
        assert_eq!(" KCF ".parse::<TrackerKind>().unwrap(), TrackerKind::Kcf);
        assert_eq!(
            "Template".parse::<TrackerKind>().unwrap(),
            TrackerKind::Template
        );
        let err = "boosting".parse::<TrackerKind>().unwrap_err();
        assert!(matches!(err, TrackingError::CapabilityUnsupported { ref kind } if kind == "boosting"));
    }
}
