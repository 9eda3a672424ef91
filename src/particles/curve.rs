//! 分段线性参数曲线
//!
//! 曲线把粒子的生命比例 `[0,1]` 映射为一个乘数。提供求值 [`Curve::evaluate`]
//! 与区间积分 [`Curve::integrate`]，两者都不会失败，每帧都可以放心调用。

use crate::core::{ParticleError, ParticleResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 曲线控制点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    /// 生命比例（0-1）
    pub x: f32,
    /// 乘数
    pub y: f32,
}

impl CurvePoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// 线性下降 1→0
pub static LINEAR_POINTS: [CurvePoint; 2] = [CurvePoint::new(0.0, 1.0), CurvePoint::new(1.0, 0.0)];

/// 线性上升 0→1
pub static REVERSE_POINTS: [CurvePoint; 2] = [CurvePoint::new(0.0, 0.0), CurvePoint::new(1.0, 1.0)];

/// 三角形 0→1→0
pub static YOYO_POINTS: [CurvePoint; 3] = [
    CurvePoint::new(0.0, 0.0),
    CurvePoint::new(0.5, 1.0),
    CurvePoint::new(1.0, 0.0),
];

/// 分段线性曲线
///
/// 控制点共享存储，克隆只增加引用计数。
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    points: Arc<[CurvePoint]>,
}

impl Curve {
    /// 创建并校验曲线
    ///
    /// 要求至少一个点，x 单调不减，首点 x=0，末点 x=1，且所有值有限。
    pub fn new(points: Vec<CurvePoint>) -> ParticleResult<Self> {
        let (first, last) = match (points.first(), points.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Err(ParticleError::InvalidCurve("curve has no points".to_string())),
        };
        if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(ParticleError::InvalidCurve(
                "curve points must be finite".to_string(),
            ));
        }
        if first.x != 0.0 {
            return Err(ParticleError::InvalidCurve(format!(
                "first point must be at x=0, got {}",
                first.x
            )));
        }
        if last.x != 1.0 {
            return Err(ParticleError::InvalidCurve(format!(
                "last point must be at x=1, got {}",
                last.x
            )));
        }
        if points.windows(2).any(|w| w[1].x < w[0].x) {
            return Err(ParticleError::InvalidCurve(
                "curve points must be sorted by x".to_string(),
            ));
        }
        Ok(Self {
            points: points.into(),
        })
    }

    /// 创建曲线（不校验）
    ///
    /// # 警告
    /// 非法曲线不会崩溃，但求值结果只是平坦夹取后的近似
    pub fn from_points_unchecked(points: Vec<CurvePoint>) -> Self {
        Self {
            points: points.into(),
        }
    }

    /// 线性下降曲线 1→0
    pub fn linear() -> Self {
        Self::from_points_unchecked(LINEAR_POINTS.to_vec())
    }

    /// 线性上升曲线 0→1
    pub fn reverse() -> Self {
        Self::from_points_unchecked(REVERSE_POINTS.to_vec())
    }

    /// 先升后降的三角曲线
    pub fn yoyo() -> Self {
        Self::from_points_unchecked(YOYO_POINTS.to_vec())
    }

    /// 按名称查找预定义曲线
    pub fn named(name: &str) -> Option<Self> {
        match name {
            "linear" => Some(Self::linear()),
            "reverse" => Some(Self::reverse()),
            "yoyo" => Some(Self::yoyo()),
            _ => None,
        }
    }

    /// 控制点
    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    /// 在生命比例 `t` 处求值
    pub fn evaluate(&self, t: f32) -> f32 {
        evaluate(&self.points, t)
    }

    /// `[t0, t1]` 区间下的面积
    pub fn integrate(&self, t0: f32, t1: f32) -> f32 {
        integrate(&self.points, t0, t1)
    }

    /// `[t0, t1]` 区间的平均值；退化区间返回 `t0` 处的瞬时值
    pub fn mean(&self, t0: f32, t1: f32) -> f32 {
        if t0 >= t1 {
            return self.evaluate(t0);
        }
        self.integrate(t0, t1) / (t1 - t0)
    }
}

/// 曲线求值
///
/// 升序扫描找到 `p0.x <= t < p1.x` 并线性插值；恰好落在控制点上时直接返回该点的 y。
/// 超过末点返回末点 y，早于首点或只有一个点时返回首点 y。空曲线返回 1。
pub fn evaluate(points: &[CurvePoint], t: f32) -> f32 {
    let Some(first) = points.first() else {
        return 1.0;
    };
    if t <= first.x || points.len() == 1 {
        return first.y;
    }

    for pair in points.windows(2) {
        let (p0, p1) = (pair[0], pair[1]);
        if t == p1.x {
            return p1.y;
        }
        if p0.x <= t && t < p1.x {
            let span = p1.x - p0.x;
            if span <= 0.0 {
                return p1.y;
            }
            return p0.y + (t - p0.x) * (p1.y - p0.y) / span;
        }
    }

    points[points.len() - 1].y
}

/// 曲线区间积分（梯形法）
///
/// 对 `(t0, t1)` 内部的所有控制点以及两个插值端点做梯形求和。
/// `t0 >= t1` 时返回 `t0` 处的值，作为瞬时速率使用。
pub fn integrate(points: &[CurvePoint], t0: f32, t1: f32) -> f32 {
    if t0 >= t1 {
        return evaluate(points, t0);
    }

    let mut area = 0.0;
    let mut prev_x = t0;
    let mut prev_y = evaluate(points, t0);

    for point in points.iter().filter(|p| p.x > t0 && p.x < t1) {
        area += (point.x - prev_x) * (prev_y + point.y) * 0.5;
        prev_x = point.x;
        prev_y = point.y;
    }

    let end_y = evaluate(points, t1);
    area + (t1 - prev_x) * (prev_y + end_y) * 0.5
}
