// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 模板匹配跟踪器 (built-in motion tracker)
//!
//! 在上一位置附近的搜索窗口内做归一化 SSD 模板匹配。

use image::{imageops, GenericImageView, GrayImage, RgbImage};
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};

use super::capability::MotionTracker;
use super::types::{BBox, FrameSize};

pub struct TemplateTracker {
    template: Option<GrayImage>,
    bbox: BBox,
    max_error: f32,
}

impl TemplateTracker {
    /// 归一化 SSD 超过此值视为跟丢
    pub const DEFAULT_MAX_ERROR: f32 = 0.15;

    /// 搜索窗口相对目标尺寸的外扩比例
    const SEARCH_MARGIN: f32 = 0.5;
    const MIN_MARGIN: i32 = 4;

    pub fn new() -> Self {
        Self::with_max_error(Self::DEFAULT_MAX_ERROR)
    }

    pub fn with_max_error(max_error: f32) -> Self {
        Self {
            template: None,
            bbox: BBox::default(),
            max_error,
        }
    }

    fn search_window(&self, frame: FrameSize) -> Option<BBox> {
        let mx = ((self.bbox.w as f32 * Self::SEARCH_MARGIN) as i32).max(Self::MIN_MARGIN);
        let my = ((self.bbox.h as f32 * Self::SEARCH_MARGIN) as i32).max(Self::MIN_MARGIN);

        let x0 = (self.bbox.x - mx).max(0);
        let y0 = (self.bbox.y - my).max(0);
        let x1 = (self.bbox.xmax() + mx).min(frame.width as i32);
        let y1 = (self.bbox.ymax() + my).min(frame.height as i32);

        let window = BBox::new(x0, y0, x1 - x0, y1 - y0);
        (window.w >= self.bbox.w && window.h >= self.bbox.h).then_some(window)
    }
}

impl Default for TemplateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionTracker for TemplateTracker {
    fn init(&mut self, frame: &RgbImage, bbox: BBox) -> bool {
        let bbox = bbox.clamp(FrameSize::of(frame));
        if bbox.is_degenerate() {
            self.template = None;
            return false;
        }

        let gray = imageops::grayscale(frame);
        let patch = gray
            .view(bbox.x as u32, bbox.y as u32, bbox.w as u32, bbox.h as u32)
            .to_image();
        self.template = Some(patch);
        self.bbox = bbox;
        true
    }

    fn update(&mut self, frame: &RgbImage) -> (bool, BBox) {
        let Some(template) = self.template.as_ref() else {
            return (false, BBox::default());
        };
        let Some(window) = self.search_window(FrameSize::of(frame)) else {
            return (false, BBox::default());
        };

        let gray = imageops::grayscale(frame);
        let region = gray
            .view(
                window.x as u32,
                window.y as u32,
                window.w as u32,
                window.h as u32,
            )
            .to_image();

        let scores = match_template(
            &region,
            template,
            MatchTemplateMethod::SumOfSquaredErrorsNormalized,
        );
        let extremes = find_extremes(&scores);
        if extremes.min_value > self.max_error {
            return (false, BBox::default());
        }

        let (dx, dy) = extremes.min_value_location;
        self.bbox = BBox::new(
            window.x + dx as i32,
            window.y + dy as i32,
            self.bbox.w,
            self.bbox.h,
        );
        (true, self.bbox)
    }
}
