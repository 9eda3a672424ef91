//! 粒子内核共用的数学辅助函数

use glam::Vec2;
use rand::Rng;
use std::cmp::Ordering;

/// 在 `[min, max]` 内均匀采样
///
/// `min >= max` 时直接返回 `min`，不会 panic。
pub fn random_between<R: Rng + ?Sized>(rng: &mut R, min: f32, max: f32) -> f32 {
    match min.partial_cmp(&max) {
        Some(Ordering::Less) => min + rng.gen::<f32>() * (max - min),
        _ => min,
    }
}

/// 朝向角（度）对应的单位向量
///
/// 0° 朝上（-y），顺时针增加，即在标准三角约定上偏移 -90°。
pub fn facing_vector(degrees: f32) -> Vec2 {
    let radians = (degrees - 90.0).to_radians();
    Vec2::new(radians.cos(), radians.sin())
}

/// 圆内均匀随机点
pub fn random_in_circle<R: Rng + ?Sized>(rng: &mut R, radius: f32) -> Vec2 {
    let angle = rng.gen::<f32>() * std::f32::consts::TAU;
    let distance = radius * rng.gen::<f32>().sqrt();
    Vec2::new(angle.cos(), angle.sin()) * distance
}
