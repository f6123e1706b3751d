// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 检测/跟踪融合引擎 (Fusion engine)
//!
//! 每帧流程:
//! 1. 更新所有轨迹 (失败时回退到最近的有效框)
//! 2. 抑制重复轨迹
//! 3. 检测框与预测框按 IOU 关联
//! 4. 未匹配的检测生成新轨迹,检测修正过的轨迹重新初始化

use image::RgbImage;

use super::capability::{BuiltinTrackers, MotionTracker, MotionTrackerFactory};
use super::suppression::{find_duplicates, SuppressionCandidate};
use super::track::Track;
use super::types::{BBox, FrameSize, FusedObject, TrackerKind};
use crate::error::{Result, TrackingError};

/// 融合引擎参数
#[derive(Debug, Clone, PartialEq)]
pub struct FusionConfig {
    /// 检测与轨迹关联的最小 IOU
    pub association_iou_threshold: f64,
    /// 重复轨迹综合相似度阈值
    pub suppression_threshold: f64,
    /// 静止判定 (像素)
    pub stationary_epsilon: i32,
    /// 最大连续失败次数,超过即删除
    pub max_failures: u32,
    pub default_tracker: TrackerKind,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            association_iou_threshold: 0.2,
            suppression_threshold: 0.75,
            stationary_epsilon: 5,
            max_failures: 80,
            default_tracker: TrackerKind::Template,
        }
    }
}

impl FusionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.association_iou_threshold) {
            return Err(TrackingError::invalid_config(format!(
                "association IOU threshold {} outside [0, 1]",
                self.association_iou_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.suppression_threshold) {
            return Err(TrackingError::invalid_config(format!(
                "suppression threshold {} outside [0, 1]",
                self.suppression_threshold
            )));
        }
        if self.stationary_epsilon < 0 {
            return Err(TrackingError::invalid_config(
                "stationary epsilon must not be negative",
            ));
        }
        Ok(())
    }
}

/// 融合引擎: 持有所有活跃轨迹
pub struct FusionEngine {
    tracks: Vec<Track>,
    next_id: u64,
    config: FusionConfig,
    factory: Box<dyn MotionTrackerFactory>,
}

impl FusionEngine {
    /// 创建引擎
    ///
    /// 配置或默认跟踪器类型不可用时在进入帧循环前失败。
    pub fn new(config: FusionConfig, factory: Box<dyn MotionTrackerFactory>) -> Result<Self> {
        config.validate()?;
        if !factory.supports(config.default_tracker) {
            return Err(TrackingError::unsupported(config.default_tracker.as_str()));
        }
        Ok(Self {
            tracks: Vec::new(),
            next_id: 0,
            config,
            factory,
        })
    }

    /// 使用内置跟踪器
    pub fn with_builtin(config: FusionConfig) -> Result<Self> {
        Self::new(config, Box::new(BuiltinTrackers::new()))
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, id: u64) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id() == id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// 轨迹ID列表 (内部顺序,不保证有序)
    pub fn list_identities(&self) -> Vec<u64> {
        self.tracks.iter().map(Track::id).collect()
    }

    /// 新增轨迹
    pub fn add_track(
        &mut self,
        frame: &RgbImage,
        bbox: BBox,
        kind: Option<TrackerKind>,
    ) -> Result<&Track> {
        let kind = kind.unwrap_or(self.config.default_tracker);
        let bbox = bbox.clamp(FrameSize::of(frame));
        if bbox.is_degenerate() {
            log::warn!("refusing to track degenerate box {bbox:?}");
            return Err(TrackingError::DegenerateInput(bbox));
        }
        let tracker = self.factory.create(kind)?;
        Ok(self.spawn(frame, bbox, kind, tracker))
    }

    fn spawn(
        &mut self,
        frame: &RgbImage,
        bbox: BBox,
        kind: TrackerKind,
        tracker: Box<dyn MotionTracker>,
    ) -> &Track {
        let id = self.next_id;
        self.next_id += 1;

        let mut track = Track::new(id, kind, tracker, self.config.stationary_epsilon);
        if track.init(frame, bbox) {
            log::info!("spawned track #{id} ({kind}) at {bbox:?}");
        } else {
            log::warn!("track #{id} ({kind}) failed to initialize at {bbox:?}");
        }

        let index = self.tracks.len();
        self.tracks.push(track);
        &self.tracks[index]
    }

    /// 按ID删除轨迹
    pub fn remove_track(&mut self, id: u64) -> bool {
        match self.tracks.iter().position(|t| t.id() == id) {
            Some(index) => {
                self.tracks.remove(index);
                true
            }
            None => false,
        }
    }

    /// 用同类型的新跟踪器在新位置重新初始化
    pub fn reinit_track(&mut self, frame: &RgbImage, id: u64, bbox: BBox) -> Result<bool> {
        let Some(index) = self.tracks.iter().position(|t| t.id() == id) else {
            return Ok(false);
        };
        let tracker = self.factory.create(self.tracks[index].kind())?;
        Ok(self.tracks[index].reinit(frame, bbox, tracker))
    }

    /// 删除失败次数超过上限的轨迹,返回被删除的ID
    pub fn remove_dead(&mut self) -> Vec<u64> {
        let max_failures = self.config.max_failures;
        let mut dead = Vec::new();
        self.tracks.retain(|track| {
            let alive = track.failures() <= max_failures;
            if !alive {
                dead.push(track.id());
            }
            alive
        });
        if !dead.is_empty() {
            log::info!("removed dead tracks {dead:?}");
        }
        dead
    }

    /// 更新所有轨迹 (不与检测融合)
    ///
    /// 返回值与抑制后剩余的轨迹一一对应。
    pub fn update_all(&mut self, frame: &RgbImage) -> Vec<(bool, BBox)> {
        let mut results: Vec<(bool, BBox)> = self
            .tracks
            .iter_mut()
            .map(|track| {
                let (success, bbox) = track.update(frame);
                (success, track.settle_bbox(success, bbox))
            })
            .collect();

        for index in self.suppress_duplicates(FrameSize::of(frame)) {
            results.remove(index);
        }
        results
    }

    /// 删除收敛到同一物体上的重复轨迹,返回被删除的下标 (降序)
    pub fn suppress_duplicates(&mut self, frame: FrameSize) -> Vec<usize> {
        let candidates: Vec<SuppressionCandidate> = self
            .tracks
            .iter()
            .map(|t| SuppressionCandidate {
                bbox: t.bbox(),
                velocity: t.velocity(),
            })
            .collect();

        let removed = find_duplicates(&candidates, frame, self.config.suppression_threshold);
        for &index in &removed {
            let track = self.tracks.remove(index);
            log::info!("suppressed duplicate track #{}", track.id());
        }
        removed
    }

    /// 融合检测结果与轨迹
    ///
    /// `prefer_detection_on_overlap` 为 false 时,重叠部分保留轨迹的框。
    ///
    /// 工厂不支持所需的跟踪器类型时,在更新任何轨迹之前返回错误。
    pub fn fuse(
        &mut self,
        frame: &RgbImage,
        detections: &[BBox],
        prefer_detection_on_overlap: bool,
    ) -> Result<Vec<FusedObject>> {
        self.check_capabilities()?;

        let frame_size = FrameSize::of(frame);
        let updated = self.update_all(frame);

        let tracked: Vec<(u64, bool, BBox)> = self
            .tracks
            .iter()
            .zip(updated)
            .map(|(track, (success, bbox))| (track.id(), success, bbox))
            .collect();

        let detections: Vec<BBox> = detections
            .iter()
            .filter_map(|bbox| {
                let clamped = bbox.clamp(frame_size);
                if clamped.is_degenerate() {
                    log::warn!("skipping degenerate detection {bbox:?}");
                    None
                } else {
                    Some(clamped)
                }
            })
            .collect();

        let mut fused = merge_detections(
            &tracked,
            &detections,
            self.config.association_iou_threshold,
            prefer_detection_on_overlap,
        );
        self.apply_changes(frame, &mut fused)?;
        Ok(fused)
    }

    /// 生成与重新初始化可能用到的跟踪器类型都必须可用
    fn check_capabilities(&self) -> Result<()> {
        std::iter::once(self.config.default_tracker)
            .chain(self.tracks.iter().map(Track::kind))
            .find(|kind| !self.factory.supports(*kind))
            .map_or(Ok(()), |kind| Err(TrackingError::unsupported(kind.as_str())))
    }

    /// 新检测生成轨迹,被检测修正的轨迹重新初始化
    fn apply_changes(&mut self, frame: &RgbImage, fused: &mut [FusedObject]) -> Result<()> {
        // 先创建全部跟踪器实例,失败时不生成也不重新初始化任何轨迹
        let mut pending = Vec::new();
        for (index, object) in fused.iter().enumerate() {
            if !object.changed {
                continue;
            }
            let kind = match object.identity {
                None => self.config.default_tracker,
                Some(id) => match self.track(id) {
                    Some(track) => track.kind(),
                    None => continue,
                },
            };
            pending.push((index, kind, self.factory.create(kind)?));
        }

        for (index, kind, tracker) in pending {
            let object = &mut fused[index];
            match object.identity {
                None => {
                    let id = self.spawn(frame, object.bbox, kind, tracker).id();
                    object.identity = Some(id);
                }
                Some(id) => {
                    if let Some(track) = self.tracks.iter_mut().find(|t| t.id() == id) {
                        log::debug!("reinit track #{id} at {:?}", object.bbox);
                        track.reinit(frame, object.bbox, tracker);
                    }
                }
            }
        }
        Ok(())
    }
}

/// 检测框与轨迹预测框关联
///
/// 每条轨迹 (按轨迹顺序) 选择 IOU 最大且不低于阈值的未分配检测;
/// 严格大于才替换,因此相同 IOU 时先遇到的检测胜出。
/// 输出按身份升序排列,未分配的排在最后。
pub fn merge_detections(
    tracked: &[(u64, bool, BBox)],
    detections: &[BBox],
    iou_threshold: f64,
    prefer_detection_on_overlap: bool,
) -> Vec<FusedObject> {
    let mut fused: Vec<FusedObject> = detections
        .iter()
        .map(|&bbox| FusedObject::detected(bbox))
        .collect();
    let mut coasting = Vec::new();

    for &(id, success, predicted) in tracked {
        let mut best: Option<(usize, f64)> = None;
        for (slot, object) in fused.iter().enumerate() {
            if object.identity.is_some() {
                continue;
            }
            let iou = object.bbox.iou(&predicted);
            if iou >= iou_threshold && best.map_or(true, |(_, max)| iou > max) {
                best = Some((slot, iou));
            }
        }

        match best {
            Some((slot, iou)) => {
                log::debug!("track #{id} matched detection {slot} (iou {iou:.3})");
                let object = &mut fused[slot];
                object.identity = Some(id);
                if !prefer_detection_on_overlap {
                    object.bbox = predicted;
                    object.success = success;
                    object.changed = false;
                }
            }
            None => coasting.push(FusedObject {
                success,
                bbox: predicted,
                identity: Some(id),
                changed: false,
            }),
        }
    }

    fused.extend(coasting);
    fused.sort_by_key(|object| (object.identity.is_none(), object.identity));
    fused
}
