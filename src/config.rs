// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 跟踪器配置 - 通过JSON文件调整参数

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::detection::{FusionConfig, TrackerKind};
use crate::error::{Result, TrackingError};
use crate::faces::ArchiveConfig;
use crate::pipeline::PipelineConfig;

/// 跟踪器参数配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    // === 运动跟踪参数 ===
    pub tracker: String,           // 跟踪器类型 (MOSSE / KCF / CSRT / TEMPLATE)
    pub max_failures: u32,         // 最大连续失败次数
    pub stationary_epsilon: i32,   // 静止判定阈值(像素)

    // === 融合参数 ===
    pub association_iou_threshold: f64, // 检测关联IOU阈值
    pub suppression_threshold: f64,     // 重复轨迹相似度阈值
    pub prefer_detection_on_overlap: bool, // 重叠时采用检测框

    // === 流水线参数 ===
    pub detection_period: u32,       // 每隔N帧检测一次
    pub tracking_width: Option<u32>, // 跟踪分辨率宽度 (None 表示原始分辨率)

    // === 人脸归档参数 ===
    pub max_faces: usize,     // 每个身份保留的人脸数
    pub width_exponent: f64,  // 人脸宽度加权指数
}

impl Default for TrackerConfig {
    fn default() -> Self {
        let fusion = FusionConfig::default();
        let archive = ArchiveConfig::default();
        Self {
            // 运动跟踪
            tracker: fusion.default_tracker.to_string(),
            max_failures: fusion.max_failures,
            stationary_epsilon: fusion.stationary_epsilon,

            // 融合
            association_iou_threshold: fusion.association_iou_threshold,
            suppression_threshold: fusion.suppression_threshold,
            prefer_detection_on_overlap: true,

            // 流水线
            detection_period: 1,
            tracking_width: None,

            // 人脸归档
            max_faces: archive.max_faces,
            width_exponent: archive.width_exponent,
        }
    }
}

impl TrackerConfig {
    /// 从JSON文件加载配置
    ///
    /// 文件不存在时写入默认配置;格式错误返回 `ConfigFormat`。
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("配置文件不存在,创建默认配置: {}", path.display());
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        let json = fs::read_to_string(path).map_err(|e| TrackingError::persistence(path, e))?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        log::info!("配置已从 {} 加载", path.display());
        Ok(config)
    }

    /// 保存配置到JSON文件
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| TrackingError::persistence(path, e))?;
        log::info!("配置已保存到 {}", path.display());
        Ok(())
    }

    /// 跟踪器类型,未知名称返回 `CapabilityUnsupported`
    pub fn tracker_kind(&self) -> Result<TrackerKind> {
        self.tracker.parse()
    }

    /// 检查取值范围与跟踪器名称
    pub fn validate(&self) -> Result<()> {
        self.fusion_config()?.validate()?;
        if self.max_faces == 0 {
            return Err(TrackingError::invalid_config("max_faces must be at least 1"));
        }
        if !self.width_exponent.is_finite() {
            return Err(TrackingError::invalid_config("width exponent must be finite"));
        }
        if self.detection_period == 0 {
            return Err(TrackingError::invalid_config(
                "detection period must be at least 1",
            ));
        }
        if self.tracking_width == Some(0) {
            return Err(TrackingError::invalid_config("tracking width must be positive"));
        }
        Ok(())
    }

    pub fn fusion_config(&self) -> Result<FusionConfig> {
        Ok(FusionConfig {
            association_iou_threshold: self.association_iou_threshold,
            suppression_threshold: self.suppression_threshold,
            stationary_epsilon: self.stationary_epsilon,
            max_failures: self.max_failures,
            default_tracker: self.tracker_kind()?,
        })
    }

    pub fn archive_config(&self) -> ArchiveConfig {
        ArchiveConfig {
            max_faces: self.max_faces,
            width_exponent: self.width_exponent,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            detection_period: self.detection_period,
            tracking_width: self.tracking_width,
            prefer_detection_on_overlap: self.prefer_detection_on_overlap,
        }
    }

    /// 打印当前配置
    pub fn log_summary(&self) {
        log::info!("当前跟踪器配置:");
        log::info!("  跟踪器: {}", self.tracker);
        log::info!("  最大失败次数: {}", self.max_failures);
        log::info!("  关联IOU阈值: {:.2}", self.association_iou_threshold);
        log::info!("  抑制阈值: {:.2}", self.suppression_threshold);
        log::info!("  检测间隔: {} 帧", self.detection_period);
        match self.tracking_width {
            Some(width) => log::info!("  跟踪宽度: {width}px"),
            None => log::info!("  跟踪宽度: 原始分辨率"),
        }
        log::info!("  每身份人脸数: {}", self.max_faces);
    }
}
