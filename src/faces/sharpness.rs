// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 清晰度评分 (Laplacian variance)

use image::GrayImage;
use imageproc::filter::laplacian_filter;

/// 拉普拉斯响应的方差,越大越清晰
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    if gray.width() == 0 || gray.height() == 0 {
        return 0.0;
    }

    let response = laplacian_filter(gray);
    let n = (response.width() * response.height()) as f64;

    let mean = response.pixels().map(|p| p.0[0] as f64).sum::<f64>() / n;
    response
        .pixels()
        .map(|p| {
            let d = p.0[0] as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n
}

/// 人脸质量分: 清晰度 × 宽度^exponent
///
/// exponent > 0 时偏向更大 (更近) 的人脸。
pub fn face_score(gray: &GrayImage, width_exponent: f64) -> f64 {
    let variance = laplacian_variance(gray);
    if width_exponent == 0.0 {
        variance
    } else {
        variance * (gray.width() as f64).powf(width_exponent)
    }
}
