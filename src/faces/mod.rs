// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 人脸归档系统 (Face archive)
///
/// - Sharpness: 拉普拉斯方差清晰度评分
/// - Archive:   按身份保留最好的 N 张人脸并落盘
pub mod archive;
pub mod sharpness;

pub use archive::{face_file_name, ArchiveConfig, FaceArchive, FaceRecord};
pub use sharpness::{face_score, laplacian_variance};
