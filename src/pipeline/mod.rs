// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 逐帧处理流水线 (Frame pipeline)
///
/// 单线程,一帧处理完再取下一帧:
/// - Resize:   可选缩放到跟踪分辨率
/// - Detect:   每 `detection_period` 帧调用一次检测器
/// - Fuse:     检测与轨迹融合,删除失败过多的轨迹
/// - Faces:    在全分辨率帧上为成功跟踪的身份搜索人脸
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use image::{imageops, RgbImage};

use crate::config::TrackerConfig;
use crate::detection::{
    BBox, BuiltinTrackers, FaceRegionDetector, FusedObject, FusionEngine, MotionTrackerFactory,
    ObjectDetector, TrackerKind,
};
use crate::error::{Result, TrackingError};
use crate::faces::FaceArchive;

/// FPS 指数平滑系数
const FPS_SMOOTHING: f64 = 0.05;

/// 运行摘要文件名
pub const INFO_FILE: &str = "info.txt";

/// 流水线参数
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub detection_period: u32,
    pub tracking_width: Option<u32>,
    pub prefer_detection_on_overlap: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detection_period: 1,
            tracking_width: None,
            prefer_detection_on_overlap: true,
        }
    }
}

// ========== 输出类型 ==========

/// 单帧处理结果
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame_id: u64,
    /// 本帧是否运行了检测器
    pub detected: bool,
    /// 融合结果 (跟踪分辨率坐标)
    pub objects: Vec<FusedObject>,
    /// 本帧删除的身份
    pub removed: Vec<u64>,
    /// 人脸框 (全分辨率坐标)
    pub faces: Vec<BBox>,
    /// 平滑后的FPS
    pub fps: f64,
}

impl FrameReport {
    /// 成功跟踪的 (身份, 框)
    pub fn successful(&self) -> Vec<(u64, BBox)> {
        self.objects
            .iter()
            .filter(|o| o.success)
            .filter_map(|o| o.identity.map(|id| (id, o.bbox)))
            .collect()
    }

    /// 本帧跟踪失败的身份
    pub fn failed(&self) -> Vec<u64> {
        self.objects
            .iter()
            .filter(|o| !o.success)
            .filter_map(|o| o.identity)
            .collect()
    }
}

/// 运行结束摘要
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub frames: u64,
    pub average_fps: f64,
    pub identities: usize,
    pub faces_written: usize,
    pub info_path: PathBuf,
}

// ========== 流水线 ==========

pub struct TrackingPipeline {
    detector: Box<dyn ObjectDetector>,
    engine: FusionEngine,
    archive: FaceArchive,
    config: PipelineConfig,
    tracker_kind: TrackerKind,

    // 统计
    count: u64,
    total_secs: f64,
    started_at: Option<String>,
    current_fps: f64,
}

impl TrackingPipeline {
    /// 创建流水线,配置错误在处理第一帧之前返回
    pub fn new(
        config: &TrackerConfig,
        detector: Box<dyn ObjectDetector>,
        factory: Box<dyn MotionTrackerFactory>,
        face_detector: Box<dyn FaceRegionDetector>,
    ) -> Result<Self> {
        config.validate()?;
        config.log_summary();
        let fusion = config.fusion_config()?;
        let tracker_kind = fusion.default_tracker;
        let engine = FusionEngine::new(fusion, factory)?;
        let archive = FaceArchive::new(config.archive_config(), face_detector)?;

        log::info!(
            "流水线就绪: tracker={}, detector={}",
            tracker_kind,
            detector.describe()
        );
        Ok(Self {
            detector,
            engine,
            archive,
            config: config.pipeline_config(),
            tracker_kind,
            count: 0,
            total_secs: 0.0,
            started_at: None,
            current_fps: 0.0,
        })
    }

    /// 使用内置跟踪器
    pub fn with_builtin(
        config: &TrackerConfig,
        detector: Box<dyn ObjectDetector>,
        face_detector: Box<dyn FaceRegionDetector>,
    ) -> Result<Self> {
        Self::new(
            config,
            detector,
            Box::new(BuiltinTrackers::new()),
            face_detector,
        )
    }

    pub fn engine(&self) -> &FusionEngine {
        &self.engine
    }

    pub fn archive(&self) -> &FaceArchive {
        &self.archive
    }

    pub fn frame_count(&self) -> u64 {
        self.count
    }

    pub fn current_fps(&self) -> f64 {
        self.current_fps
    }

    /// 平均FPS: 帧数 / 累计处理时间 (不含帧间空闲)
    pub fn average_fps(&self) -> f64 {
        if self.total_secs > 0.0 {
            self.count as f64 / self.total_secs
        } else {
            0.0
        }
    }

    /// 处理一帧
    pub fn process(&mut self, frame: &RgbImage) -> Result<FrameReport> {
        let start = Instant::now();
        if self.started_at.is_none() {
            self.started_at = Some(crate::gen_time_string("-"));
        }

        // 1. Resize: 原始分辨率 → 跟踪分辨率
        let (tracking_frame, scale) = self.tracking_frame(frame);

        // 2. 检测 (按间隔)
        let frame_id = self.count;
        let detected = frame_id % u64::from(self.config.detection_period) == 0;
        let detections = if detected {
            self.detector
                .detect(&tracking_frame)
                .map_err(TrackingError::Detector)?
        } else {
            Vec::new()
        };

        // 3. 融合
        let objects = self.engine.fuse(
            &tracking_frame,
            &detections,
            self.config.prefer_detection_on_overlap,
        )?;
        let removed = self.engine.remove_dead();

        // 4. 人脸 (人脸检测失败只跳过该目标,本帧照常完成)
        let mut faces = Vec::new();
        for object in objects.iter().filter(|o| o.success) {
            let Some(id) = object.identity else { continue };
            if removed.contains(&id) {
                continue;
            }
            match self
                .archive
                .detect_faces(frame, &[object.bbox], &[id], scale)
            {
                Ok(found) => faces.extend(found),
                Err(e) => log::warn!("identity {id}: face search skipped: {e}"),
            }
        }

        // 5. FPS
        let elapsed = start.elapsed().as_secs_f64();
        self.total_secs += elapsed;
        self.update_fps(elapsed);
        self.count += 1;

        log::debug!(
            "frame {frame_id}: {} detections, {} objects, {} faces, {:.1} fps",
            detections.len(),
            objects.len(),
            faces.len(),
            self.current_fps
        );

        Ok(FrameReport {
            frame_id,
            detected,
            objects,
            removed,
            faces,
            fps: self.current_fps,
        })
    }

    /// 结束运行: 人脸落盘并写入 info.txt
    pub fn finish(&self, output_dir: &Path) -> Result<RunSummary> {
        fs::create_dir_all(output_dir)
            .map_err(|e| TrackingError::persistence(output_dir, e))?;

        let faces_written = self.archive.dump(output_dir)?;
        let identities = self.archive.identities().len();
        let average_fps = self.average_fps();

        let info_path = output_dir.join(INFO_FILE);
        let info = format!(
            "tracker: {}\ndetector: {}\nframes: {}\naverage fps: {:.2}\nstarted: {}\nidentities: {}\nfaces: {}\n",
            self.tracker_kind,
            self.detector.describe(),
            self.count,
            average_fps,
            self.started_at.as_deref().unwrap_or("-"),
            identities,
            faces_written,
        );
        fs::write(&info_path, info).map_err(|e| TrackingError::persistence(&info_path, e))?;

        log::info!(
            "运行结束: {} 帧, 平均 {:.1} FPS, 摘要写入 {}",
            self.count,
            average_fps,
            info_path.display()
        );
        Ok(RunSummary {
            frames: self.count,
            average_fps,
            identities,
            faces_written,
            info_path,
        })
    }

    fn tracking_frame<'a>(&self, frame: &'a RgbImage) -> (Cow<'a, RgbImage>, Option<f64>) {
        match self.config.tracking_width {
            Some(width) if width != frame.width() && frame.width() > 0 => {
                let factor = frame.width() as f64 / width as f64;
                let height = ((frame.height() as f64 / factor).round() as u32).max(1);
                let resized =
                    imageops::resize(frame, width, height, imageops::FilterType::Triangle);
                (Cow::Owned(resized), Some(factor))
            }
            _ => (Cow::Borrowed(frame), None),
        }
    }

    fn update_fps(&mut self, frame_secs: f64) {
        if frame_secs <= 0.0 {
            return;
        }
        let instant = 1.0 / frame_secs;
        self.current_fps = if self.current_fps == 0.0 {
            instant
        } else {
            (1.0 - FPS_SMOOTHING) * self.current_fps + FPS_SMOOTHING * instant
        };
    }
}
