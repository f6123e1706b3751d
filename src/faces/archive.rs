// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 人脸质量归档 (Face quality archive)
//!
//! 每个身份保留得分最高的 `max_faces` 张人脸 (最小堆,溢出时淘汰最低分)。

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};
use std::fs;
use std::path::Path;

use image::{imageops, GenericImageView, RgbImage};

use super::sharpness::face_score;
use crate::detection::{BBox, FaceRegionDetector, FrameSize};
use crate::error::{Result, TrackingError};

/// 归档参数
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveConfig {
    /// 每个身份最多保留的人脸数
    pub max_faces: usize,
    /// 宽度加权指数 (0 表示只看清晰度)
    pub width_exponent: f64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            max_faces: 15,
            width_exponent: 0.0,
        }
    }
}

/// 一张人脸截图及其得分
#[derive(Debug, Clone)]
pub struct FaceRecord {
    pub image: RgbImage,
    pub score: f64,
}

impl FaceRecord {
    pub fn new(image: RgbImage, score: f64) -> Self {
        Self { image, score }
    }
}

// 按得分排序的包装,供 BinaryHeap 使用
#[derive(Debug)]
struct Ranked(FaceRecord);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.score.total_cmp(&other.0.score)
    }
}

/// 人脸归档
pub struct FaceArchive {
    config: ArchiveConfig,
    detector: Box<dyn FaceRegionDetector>,
    faces: BTreeMap<u64, BinaryHeap<Reverse<Ranked>>>,
}

impl FaceArchive {
    pub fn new(config: ArchiveConfig, detector: Box<dyn FaceRegionDetector>) -> Result<Self> {
        if config.max_faces == 0 {
            return Err(TrackingError::invalid_config("max_faces must be at least 1"));
        }
        if !config.width_exponent.is_finite() {
            return Err(TrackingError::invalid_config("width exponent must be finite"));
        }
        Ok(Self {
            config,
            detector,
            faces: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// 有归档人脸的身份 (升序)
    pub fn identities(&self) -> Vec<u64> {
        self.faces
            .iter()
            .filter(|(_, heap)| !heap.is_empty())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn face_count(&self, identity: u64) -> usize {
        self.faces.get(&identity).map_or(0, BinaryHeap::len)
    }

    pub fn total_faces(&self) -> usize {
        self.faces.values().map(BinaryHeap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_faces() == 0
    }

    /// 按得分降序返回某身份的人脸
    pub fn ranked(&self, identity: u64) -> Vec<&FaceRecord> {
        let Some(heap) = self.faces.get(&identity) else {
            return Vec::new();
        };
        let mut faces: Vec<&FaceRecord> = heap.iter().map(|Reverse(r)| &r.0).collect();
        faces.sort_by(|a, b| b.score.total_cmp(&a.score));
        faces
    }

    /// 归档一张人脸,超出容量时淘汰最低分
    pub fn record(&mut self, identity: u64, face: FaceRecord) {
        let max_faces = self.config.max_faces;
        let heap = self.faces.entry(identity).or_default();
        heap.push(Reverse(Ranked(face)));
        if heap.len() > max_faces {
            if let Some(Reverse(evicted)) = heap.pop() {
                log::debug!(
                    "identity {identity}: evicted face with score {:.1}",
                    evicted.0.score
                );
            }
        }
    }

    /// 在目标框内检测人脸并归档
    ///
    /// `scale` 把跟踪帧 (缩小后) 上的框投影回全分辨率帧。
    /// 返回人脸在帧中的绝对坐标。
    pub fn detect_faces(
        &mut self,
        frame: &RgbImage,
        object_bboxes: &[BBox],
        identities: &[u64],
        scale: Option<f64>,
    ) -> Result<Vec<BBox>> {
        if object_bboxes.len() != identities.len() {
            log::warn!(
                "{} object boxes but {} identities, extra entries ignored",
                object_bboxes.len(),
                identities.len()
            );
        }

        let frame_size = FrameSize::of(frame);
        let mut captured: Vec<(u64, FaceRecord)> = Vec::new();
        let mut face_bboxes = Vec::new();

        for (&object, &identity) in object_bboxes.iter().zip(identities) {
            let bbox = scale
                .map_or(object, |factor| object.scale(factor))
                .clamp(frame_size);
            if bbox.is_degenerate() {
                log::warn!("identity {identity}: skipping degenerate object box {object:?}");
                continue;
            }

            let crop = frame
                .view(bbox.x as u32, bbox.y as u32, bbox.w as u32, bbox.h as u32)
                .to_image();
            let gray = imageops::grayscale(&crop);
            let regions = self
                .detector
                .detect(&gray)
                .map_err(TrackingError::Detector)?;

            let crop_size = FrameSize::of(&crop);
            for region in regions {
                let region = region.clamp(crop_size);
                if region.is_degenerate() {
                    continue;
                }
                let (x, y, w, h) = (
                    region.x as u32,
                    region.y as u32,
                    region.w as u32,
                    region.h as u32,
                );
                let face_gray = gray.view(x, y, w, h).to_image();
                let score = face_score(&face_gray, self.config.width_exponent);
                let image = crop.view(x, y, w, h).to_image();

                captured.push((identity, FaceRecord::new(image, score)));
                face_bboxes.push(region.translate(bbox.x, bbox.y));
            }
        }

        for (identity, face) in captured {
            self.record(identity, face);
        }
        Ok(face_bboxes)
    }

    /// 持久化: 每个身份一个子目录,按得分降序最多保存 `max_faces` 张
    ///
    /// 返回写入的文件数。
    pub fn dump(&self, output_dir: &Path) -> Result<usize> {
        let mut written = 0;
        for identity in self.identities() {
            let folder = output_dir.join(identity.to_string());
            fs::create_dir_all(&folder)
                .map_err(|source| TrackingError::persistence(&folder, source))?;

            for (rank, face) in self
                .ranked(identity)
                .into_iter()
                .take(self.config.max_faces)
                .enumerate()
            {
                let path = folder.join(face_file_name(rank, face.score));
                face.image
                    .save(&path)
                    .map_err(|source| TrackingError::Encode {
                        path: path.clone(),
                        source,
                    })?;
                written += 1;
            }
        }
        log::info!(
            "dumped {written} faces for {} identities to {}",
            self.identities().len(),
            output_dir.display()
        );
        Ok(written)
    }
}

/// face_<rank>-score_<rounded score>.png
pub fn face_file_name(rank: usize, score: f64) -> String {
    format!("face_{}-score_{}.png", rank, score.round() as i64)
}
