// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // JSON配置
pub mod detection; // 检测/跟踪融合
pub mod error; // 错误类型
pub mod faces; // 人脸质量归档
pub mod pipeline; // 逐帧流水线

pub use crate::config::TrackerConfig;
pub use crate::detection::{
    BBox, BuiltinTrackers, FaceRegionDetector, FrameSize, FusedObject, FusionConfig, FusionEngine,
    MotionTracker, MotionTrackerFactory, ObjectDetector, TemplateTracker, Track, TrackerKind,
};
pub use crate::error::{Result, TrackingError};
pub use crate::faces::{ArchiveConfig, FaceArchive, FaceRecord};
pub use crate::pipeline::{FrameReport, PipelineConfig, RunSummary, TrackingPipeline};

/// 本地时间字符串,各字段以 `delimiter` 分隔
pub fn gen_time_string(delimiter: &str) -> String {
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S",
        delimiter, delimiter, delimiter, delimiter, delimiter
    );
    chrono::Local::now().format(&fmt).to_string()
}
