// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 外部能力接口 (pluggable capabilities)
//!
//! The fusion engine never implements detection or visual tracking itself;
//! it talks to these traits.

use anyhow::Result as AnyResult;
use image::{GrayImage, RgbImage};

use super::template::TemplateTracker;
use super::types::{BBox, TrackerKind};
use crate::error::{Result, TrackingError};

// ========== 检测器 ==========

/// 目标检测器 (frame → candidate regions, no identity attached)
pub trait ObjectDetector {
    /// 检测当前帧中的目标
    ///
    /// 返回 (x, y, w, h) 列表,不保证跨帧稳定
    fn detect(&mut self, frame: &RgbImage) -> AnyResult<Vec<BBox>>;

    /// 检测器描述,写入运行摘要
    fn describe(&self) -> String;
}

// ========== 运动跟踪 ==========

/// 单目标运动跟踪器 (algorithm-agnostic)
pub trait MotionTracker {
    /// 用首帧和目标框初始化
    fn init(&mut self, frame: &RgbImage, bbox: BBox) -> bool;

    /// 在新帧中定位目标,返回 (是否成功, 新框)
    fn update(&mut self, frame: &RgbImage) -> (bool, BBox);
}

/// 按类型标签创建跟踪器实例
pub trait MotionTrackerFactory {
    fn create(&self, kind: TrackerKind) -> Result<Box<dyn MotionTracker>>;

    fn supports(&self, kind: TrackerKind) -> bool;
}

/// 内置跟踪器工厂
///
/// Only [`TrackerKind::Template`] is built in; correlation and discriminative
/// trackers come from an external backend through its own factory.
#[derive(Debug, Clone)]
pub struct BuiltinTrackers {
    /// 模板匹配最大归一化误差
    pub max_match_error: f32,
}

impl BuiltinTrackers {
    pub fn new() -> Self {
        Self {
            max_match_error: TemplateTracker::DEFAULT_MAX_ERROR,
        }
    }
}

impl Default for BuiltinTrackers {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionTrackerFactory for BuiltinTrackers {
    fn create(&self, kind: TrackerKind) -> Result<Box<dyn MotionTracker>> {
        match kind {
            TrackerKind::Template => Ok(Box::new(TemplateTracker::with_max_error(
                self.max_match_error,
            ))),
            other => Err(TrackingError::unsupported(other.as_str())),
        }
    }

    fn supports(&self, kind: TrackerKind) -> bool {
        kind == TrackerKind::Template
    }
}

// ========== 人脸检测 ==========

/// 人脸区域检测器 (Haar-cascade style)
pub trait FaceRegionDetector {
    /// 在灰度裁剪图中检测人脸,返回裁剪图局部坐标
    fn detect(&mut self, gray: &GrayImage) -> AnyResult<Vec<BBox>>;
}
