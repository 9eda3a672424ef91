//! 随粒子生命演化的标量参数
//!
//! 参数可以保持常量、按步线性漂移（`delta`），也可以被生命曲线重塑（`control`）。
//! 每个粒子复位时都会从模板重新构造参数值，不同池槽之间不共享可变状态。

use super::curve::Curve;
use super::template::ParamSpec;
use rand::Rng;

/// 标量参数
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// 基础值，会被曲线缩放
    pub value: f32,
    /// 常量加性基线
    pub initial: f32,
    /// 每步加到 `value` 上的增量
    pub delta: f32,
    /// 曲线相位偏移（加到生命比例上）
    pub offset: f32,
    /// 下限
    pub min: Option<f32>,
    /// 上限
    pub max: Option<f32>,
    /// 生命曲线
    pub control: Option<Curve>,
    /// 最近一次步进算出的值
    pub calc: f32,
}

impl Parameter {
    /// 常量参数
    pub fn constant(value: f32) -> Self {
        Self {
            value,
            initial: 0.0,
            delta: 0.0,
            offset: 0.0,
            min: None,
            max: None,
            control: None,
            calc: value,
        }
    }

    /// 带夹取边界的常量参数
    pub fn bounded(value: f32, min: f32, max: f32) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            ..Self::constant(value)
        }
    }

    /// 按模板描述构造参数
    ///
    /// 描述中缺省的字段保留 `base` 的值；`Malformed` 描述直接返回 `base`。
    pub fn from_spec<R: Rng + ?Sized>(spec: &ParamSpec, base: &Parameter, rng: &mut R) -> Self {
        let mut param = base.clone();
        match spec {
            ParamSpec::Scalar(scalar) => param.value = scalar.sample(rng),
            ParamSpec::Full(full) => {
                if let Some(value) = full.value {
                    param.value = value.sample(rng);
                }
                if let Some(initial) = full.initial {
                    param.initial = initial.sample(rng);
                }
                if let Some(delta) = full.delta {
                    param.delta = delta.sample(rng);
                }
                if let Some(offset) = full.offset {
                    param.offset = offset;
                }
                if full.min.is_some() {
                    param.min = full.min;
                }
                if full.max.is_some() {
                    param.max = full.max;
                }
                if full.control.is_some() {
                    param.control = full.control.clone();
                }
            }
            ParamSpec::Malformed => {}
        }
        param
    }

    /// 曲线采样：无曲线时返回 `value`，否则返回 `value × curve(life + offset)`
    pub fn sample(&self, life: f32) -> f32 {
        match &self.control {
            Some(curve) => self.value * curve.evaluate(life + self.offset),
            None => self.value,
        }
    }

    /// 基线加曲线采样
    pub fn resolve(&self, life: f32) -> f32 {
        self.initial + self.sample(life)
    }

    /// 取整并夹取，用于必须以整数渲染的通道（如 0-255 颜色）
    pub fn clamped_sample(&self, life: f32) -> f32 {
        self.clamp(self.resolve(life).floor())
    }

    /// 按 `min/max` 夹取，未设置的一侧不限制
    pub fn clamp(&self, value: f32) -> f32 {
        let value = match self.min {
            Some(min) if value < min => min,
            _ => value,
        };
        match self.max {
            Some(max) if value > max => max,
            _ => value,
        }
    }

    /// `[t0, t1]` 区间的平均采样值；无曲线时就是 `value`
    pub fn mean(&self, t0: f32, t1: f32) -> f32 {
        match &self.control {
            Some(curve) => self.value * curve.mean(t0 + self.offset, t1 + self.offset),
            None => self.value,
        }
    }

    /// 漂移一步：`value += delta`
    pub fn advance(&mut self) {
        self.value += self.delta;
    }

    /// 漂移一步并重新计算 `calc = initial + sample(life)`
    pub fn step(&mut self, life: f32) -> f32 {
        self.advance();
        self.calc = self.resolve(life);
        self.calc
    }

    /// 漂移一步并重新计算取整夹取后的 `calc`
    pub fn step_clamped(&mut self, life: f32) -> f32 {
        self.advance();
        self.calc = self.clamped_sample(life);
        self.calc
    }
}

impl Default for Parameter {
    fn default() -> Self {
        Self::constant(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particles::template::{FullParamSpec, ScalarSpec};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sample_without_curve() {
        let param = Parameter::constant(5.0);
        assert_eq!(param.sample(0.0), 5.0);
        assert_eq!(param.sample(0.7), 5.0);
    }

    #[test]
    fn test_sample_with_curve() {
        let param = Parameter {
            control: Some(Curve::linear()),
            ..Parameter::constant(10.0)
        };
        assert_eq!(param.sample(0.0), 10.0);
        assert!((param.sample(0.5) - 5.0).abs() < 1e-5);
        assert_eq!(param.sample(1.0), 0.0);
    }

    #[test]
    fn test_offset_shifts_phase() {
        let param = Parameter {
            offset: 0.5,
            control: Some(Curve::reverse()),
            ..Parameter::constant(2.0)
        };
        assert!((param.sample(0.0) - 1.0).abs() < 1e-5);
        // 超出末点后保持平坦
        assert_eq!(param.sample(0.9), 2.0);
    }

    #[test]
    fn test_clamped_sample() {
        let param = Parameter {
            initial: 10.7,
            ..Parameter::bounded(250.0, 0.0, 255.0)
        };
        assert_eq!(param.clamped_sample(0.0), 255.0);

        let low = Parameter {
            initial: 0.9,
            ..Parameter::bounded(3.0, 0.0, 255.0)
        };
        assert_eq!(low.clamped_sample(0.0), 3.0);

        let negative = Parameter::bounded(-20.0, 0.0, 255.0);
        assert_eq!(negative.clamped_sample(0.0), 0.0);
    }

    #[test]
    fn test_step_drifts_linearly() {
        let mut param = Parameter {
            delta: 0.5,
            ..Parameter::constant(1.0)
        };
        assert_eq!(param.step(0.0), 1.5);
        assert_eq!(param.step(0.5), 2.0);
        assert_eq!(param.calc, 2.0);
    }

    #[test]
    fn test_from_spec_keeps_base_defaults() {
        let mut rng = StdRng::seed_from_u64(3);
        let base = Parameter::bounded(255.0, 0.0, 255.0);
        let spec = ParamSpec::Full(FullParamSpec {
            initial: Some(ScalarSpec::Constant(4.0)),
            ..FullParamSpec::default()
        });
        let param = Parameter::from_spec(&spec, &base, &mut rng);
        assert_eq!(param.value, 255.0);
        assert_eq!(param.initial, 4.0);
        assert_eq!(param.max, Some(255.0));

        let range = Parameter::from_spec(&ParamSpec::range(2.0, 4.0), &base, &mut rng);
        assert!((2.0..=4.0).contains(&range.value));

        let malformed = Parameter::from_spec(&ParamSpec::Malformed, &base, &mut rng);
        assert_eq!(malformed, base);
    }

    #[test]
    fn test_from_spec_keeps_base_offset_when_absent() {
        let mut rng = StdRng::seed_from_u64(5);
        let base = Parameter {
            offset: 0.5,
            control: Some(Curve::reverse()),
            ..Parameter::constant(5.0)
        };
        let drift = ParamSpec::Full(FullParamSpec {
            delta: Some(ScalarSpec::Constant(1.0)),
            ..FullParamSpec::default()
        });
        let param = Parameter::from_spec(&drift, &base, &mut rng);
        assert_eq!(param.offset, 0.5);
        assert_eq!(param.delta, 1.0);

        let shifted = ParamSpec::Full(FullParamSpec {
            offset: Some(0.25),
            ..FullParamSpec::default()
        });
        assert_eq!(Parameter::from_spec(&shifted, &base, &mut rng).offset, 0.25);
    }

    #[test]
    fn test_mean_without_curve_is_value() {
        let param = Parameter::constant(0.004);
        assert_eq!(param.mean(0.0, 0.1), 0.004);
    }
}
