// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 融合系统 (Fusion System)
///
/// 检测器给出无身份的候选框,运动跟踪器逐帧预测,融合引擎负责:
/// - Track:       单目标运动轨迹与失败计数
/// - Suppression: 重复轨迹抑制
/// - Fusion:      检测/轨迹关联、生成、重新初始化与删除
pub mod capability;
pub mod fusion;
pub mod suppression;
pub mod template;
pub mod track;
pub mod types;

pub use capability::{
    BuiltinTrackers, FaceRegionDetector, MotionTracker, MotionTrackerFactory, ObjectDetector,
};
pub use fusion::{merge_detections, FusionConfig, FusionEngine};
pub use template::TemplateTracker;
pub use track::Track;
pub use types::{BBox, FrameSize, FusedObject, TrackerKind};
