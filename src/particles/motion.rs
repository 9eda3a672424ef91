//! 运动控制器
//!
//! 持有位置（积分得到）以及速度、加速度、缩放、旋转参数。步进顺序：
//!
//! 1. 缩放/旋转参数漂移并按曲线采样
//! 2. 新生粒子的第一帧到此为止，以初始姿态渲染
//! 3. 朝向加速度旋转到 x/y 后叠加到速度
//! 4. x/y 加速度叠加到速度
//! 5. 朝向速度直接叠加到位置
//! 6. x/y 速度叠加到位置
//!
//! 力（全局力、引力井、加速度）累积到速度参数的 `initial` 基线上。

use super::curve::Curve;
use super::math::{facing_vector, random_between};
use super::parameter::Parameter;
use super::template::{InheritFlags, Template};
use glam::Vec2;
use rand::Rng;

/// x/y/朝向 三分量参数
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VectorParameter {
    pub x: Parameter,
    pub y: Parameter,
    /// 沿当前旋转方向的分量
    pub facing: Parameter,
}

/// 目标模式路径
///
/// 位移按曲线面积比例分配，任意步长下都恰好在生命结束时到达终点。
#[derive(Debug, Clone, PartialEq)]
pub struct TargetPath {
    pub destination: Vec2,
    displacement: Vec2,
    control: Option<Curve>,
    area: f32,
}

impl TargetPath {
    pub fn new(start: Vec2, destination: Vec2, control: Option<Curve>) -> Self {
        let area = control.as_ref().map(|c| c.integrate(0.0, 1.0)).unwrap_or(1.0);
        // 面积为零的曲线无法到达，退化为匀速
        let control = if area.abs() > f32::EPSILON { control } else { None };
        Self {
            destination,
            displacement: destination - start,
            area: if control.is_some() { area } else { 1.0 },
            control,
        }
    }

    /// `[previous, life]` 区间内的位移
    pub fn advance(&self, previous: f32, life: f32) -> Vec2 {
        if life <= previous {
            return Vec2::ZERO;
        }
        let share = match &self.control {
            Some(curve) => curve.integrate(previous, life) / self.area,
            None => life - previous,
        };
        self.displacement * share
    }
}

/// 运动控制器
#[derive(Debug, Clone, PartialEq)]
pub struct MotionController {
    pub position: Vec2,
    pub velocity: VectorParameter,
    pub acceleration: VectorParameter,
    pub scale_x: Parameter,
    pub scale_y: Parameter,
    /// 旋转角（度，0° 朝上）
    pub rotation: Parameter,
    pub target: Option<TargetPath>,
}

impl Default for MotionController {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            velocity: VectorParameter::default(),
            acceleration: VectorParameter::default(),
            scale_x: Parameter::constant(1.0),
            scale_y: Parameter::constant(1.0),
            rotation: Parameter::default(),
            target: None,
        }
    }
}

impl MotionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// 恢复为惰性默认状态
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// 从父粒子逐字复制请求的参数簇
    pub fn inherit(&mut self, parent: &MotionController, flags: InheritFlags) {
        if flags.inherits_velocity() {
            self.velocity.x = parent.velocity.x.clone();
            self.velocity.y = parent.velocity.y.clone();
        }
        if flags.inherits_facing_velocity() {
            self.velocity.facing = parent.velocity.facing.clone();
        }
        if flags.inherits_scale() {
            self.scale_x = parent.scale_x.clone();
            self.scale_y = parent.scale_y.clone();
        }
        if flags.inherits_rotation() {
            self.rotation = parent.rotation.clone();
        }
    }

    /// 按模板初始化
    ///
    /// `keep` 中标记的参数簇是继承来的且不允许被模板覆盖。
    pub fn init<R: Rng + ?Sized>(&mut self, template: &Template, keep: InheritFlags, rng: &mut R) {
        if template.target.is_none() && !keep.inherits_velocity() {
            self.init_velocity(template, rng);
        }
        if !keep.inherits_facing_velocity() {
            if let Some(spec) = &template.facing_velocity {
                self.velocity.facing = Parameter::from_spec(spec, &self.velocity.facing, rng);
            }
        }

        if let Some(spec) = &template.acceleration {
            self.acceleration.x = Parameter::from_spec(spec, &self.acceleration.x, rng);
            self.acceleration.y = Parameter::from_spec(spec, &self.acceleration.y, rng);
        }
        if let Some(spec) = &template.ax {
            self.acceleration.x = Parameter::from_spec(spec, &self.acceleration.x, rng);
        }
        if let Some(spec) = &template.ay {
            self.acceleration.y = Parameter::from_spec(spec, &self.acceleration.y, rng);
        }
        if let Some(spec) = &template.facing_acceleration {
            self.acceleration.facing = Parameter::from_spec(spec, &self.acceleration.facing, rng);
        }

        if !keep.inherits_scale() {
            if let Some(spec) = &template.scale {
                // 统一缩放：一次采样同时用于两个轴
                self.scale_x = Parameter::from_spec(spec, &self.scale_x, rng);
                self.scale_y = self.scale_x.clone();
            }
            if let Some(spec) = &template.scale_x {
                self.scale_x = Parameter::from_spec(spec, &self.scale_x, rng);
            }
            if let Some(spec) = &template.scale_y {
                self.scale_y = Parameter::from_spec(spec, &self.scale_y, rng);
            }
        }

        if !keep.inherits_rotation() {
            if let Some(spec) = &template.rotation {
                self.rotation = Parameter::from_spec(spec, &self.rotation, rng);
            }
        }

        self.prime(0.0);
    }

    fn init_velocity<R: Rng + ?Sized>(&mut self, template: &Template, rng: &mut R) {
        if let Some(velocity) = &template.velocity {
            match velocity.radial {
                Some(arc) => {
                    let magnitude = Parameter::from_spec(&velocity.param, &Parameter::default(), rng);
                    let angle = random_between(rng, arc.arc_start, arc.arc_end);
                    let direction = facing_vector(angle);
                    self.velocity.x = scaled(&magnitude, direction.x);
                    self.velocity.y = scaled(&magnitude, direction.y);
                }
                None => {
                    self.velocity.x = Parameter::from_spec(&velocity.param, &self.velocity.x, rng);
                    self.velocity.y = Parameter::from_spec(&velocity.param, &self.velocity.y, rng);
                }
            }
        }
        if let Some(spec) = &template.vx {
            self.velocity.x = Parameter::from_spec(spec, &self.velocity.x, rng);
        }
        if let Some(spec) = &template.vy {
            self.velocity.y = Parameter::from_spec(spec, &self.velocity.y, rng);
        }
    }

    /// 保持速度大小，把方向改为给定旋转角
    pub fn align_velocity(&mut self, rotation: f32) {
        let direction = facing_vector(rotation);
        let value = Vec2::new(self.velocity.x.value, self.velocity.y.value).length();
        let initial = Vec2::new(self.velocity.x.initial, self.velocity.y.initial).length();
        self.velocity.x.value = direction.x * value;
        self.velocity.y.value = direction.y * value;
        self.velocity.x.initial = direction.x * initial;
        self.velocity.y.initial = direction.y * initial;
        self.prime(0.0);
    }

    /// 设置目标模式：从当前位置出发，生命结束时到达 `destination`
    pub fn set_target(&mut self, destination: Vec2, control: Option<Curve>) {
        self.velocity.x = Parameter::default();
        self.velocity.y = Parameter::default();
        self.target = Some(TargetPath::new(self.position, destination, control));
    }

    /// 不漂移地重新计算所有 `calc`
    pub fn prime(&mut self, life: f32) {
        for param in [
            &mut self.velocity.x,
            &mut self.velocity.y,
            &mut self.velocity.facing,
            &mut self.acceleration.x,
            &mut self.acceleration.y,
            &mut self.acceleration.facing,
            &mut self.scale_x,
            &mut self.scale_y,
            &mut self.rotation,
        ] {
            param.calc = param.resolve(life);
        }
    }

    /// 叠加一个速度增量（力、引力井）
    pub fn add_velocity(&mut self, delta: Vec2) {
        self.velocity.x.initial += delta.x;
        self.velocity.y.initial += delta.y;
    }

    /// 用恒定速度替换 x/y 速度参数，并取消目标模式
    pub fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity.x = Parameter::constant(velocity.x);
        self.velocity.y = Parameter::constant(velocity.y);
        self.target = None;
        self.velocity.x.calc = velocity.x;
        self.velocity.y.calc = velocity.y;
    }

    /// 当前 x/y 速度
    pub fn current_velocity(&self) -> Vec2 {
        Vec2::new(self.velocity.x.calc, self.velocity.y.calc)
    }

    /// 步进一帧
    ///
    /// `integrate` 为假时（新生粒子第一帧）只更新缩放与旋转。
    pub fn step(&mut self, previous_life: f32, life: f32, integrate: bool) {
        self.scale_x.step(life);
        self.scale_y.step(life);
        self.rotation.step(life);

        if !integrate {
            return;
        }

        let facing_acceleration = self.acceleration.facing.step(life);
        if facing_acceleration != 0.0 {
            self.add_velocity(facing_vector(self.rotation.calc) * facing_acceleration);
        }

        let acceleration = Vec2::new(
            self.acceleration.x.step(life),
            self.acceleration.y.step(life),
        );
        self.add_velocity(acceleration);

        let facing_velocity = self.velocity.facing.step(life);
        if facing_velocity != 0.0 {
            self.position += facing_vector(self.rotation.calc) * facing_velocity;
        }

        let velocity = Vec2::new(self.velocity.x.step(life), self.velocity.y.step(life));
        self.position += velocity;

        if let Some(target) = &self.target {
            self.position += target.advance(previous_life, life);
        }
    }
}

/// 按系数缩放参数的所有幅值分量
fn scaled(param: &Parameter, factor: f32) -> Parameter {
    Parameter {
        value: param.value * factor,
        initial: param.initial * factor,
        delta: param.delta * factor,
        offset: param.offset,
        min: None,
        max: None,
        control: param.control.clone(),
        calc: param.calc * factor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particles::template::{ParamSpec, RadialSpec, VelocitySpec};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_first_frame_skips_integration() {
        let mut motion = MotionController::new();
        motion.velocity.x = Parameter::constant(3.0);
        motion.step(0.0, 0.0, false);
        assert_eq!(motion.position, Vec2::ZERO);

        motion.step(0.0, 0.1, true);
        assert_eq!(motion.position, Vec2::new(3.0, 0.0));
    }

    #[test]
    fn test_acceleration_applies_before_velocity() {
        let mut motion = MotionController::new();
        motion.acceleration.y = Parameter::constant(1.0);
        motion.step(0.0, 0.1, true);
        assert_eq!(motion.position, Vec2::new(0.0, 1.0));
        motion.step(0.1, 0.2, true);
        assert_eq!(motion.position, Vec2::new(0.0, 3.0));
    }

    #[test]
    fn test_facing_velocity_uses_rotation() {
        let mut motion = MotionController::new();
        motion.velocity.facing = Parameter::constant(2.0);
        motion.rotation = Parameter::constant(90.0);
        motion.step(0.0, 0.5, true);
        assert!((motion.position.x - 2.0).abs() < 1e-5);
        assert!(motion.position.y.abs() < 1e-5);

        // 0° 朝上
        let mut up = MotionController::new();
        up.velocity.facing = Parameter::constant(2.0);
        up.step(0.0, 0.5, true);
        assert!((up.position.y + 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_facing_acceleration() {
        let mut motion = MotionController::new();
        motion.acceleration.facing = Parameter::constant(1.0);
        motion.rotation = Parameter::constant(180.0);
        motion.step(0.0, 0.1, true);
        assert!((motion.velocity.y.initial - 1.0).abs() < 1e-5);
        assert!((motion.position.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_rotation_drift() {
        let mut motion = MotionController::new();
        motion.rotation = Parameter {
            delta: 5.0,
            ..Parameter::constant(0.0)
        };
        motion.step(0.0, 0.0, false);
        motion.step(0.0, 0.1, true);
        assert_eq!(motion.rotation.calc, 10.0);
    }

    #[test]
    fn test_uniform_scale_shares_sample() {
        let template = Template {
            scale: Some(ParamSpec::range(0.5, 2.0)),
            ..Template::default()
        };
        let mut motion = MotionController::new();
        motion.init(&template, InheritFlags::default(), &mut rng());
        assert_eq!(motion.scale_x.value, motion.scale_y.value);
        assert_eq!(motion.scale_x.calc, motion.scale_x.value);
    }

    #[test]
    fn test_radial_velocity() {
        let template = Template {
            velocity: Some(VelocitySpec {
                param: ParamSpec::constant(4.0),
                radial: Some(RadialSpec {
                    arc_start: 90.0,
                    arc_end: 90.0,
                }),
            }),
            ..Template::default()
        };
        let mut motion = MotionController::new();
        motion.init(&template, InheritFlags::default(), &mut rng());
        assert!((motion.velocity.x.value - 4.0).abs() < 1e-5);
        assert!(motion.velocity.y.value.abs() < 1e-5);
    }

    #[test]
    fn test_keep_blocks_template_overwrite() {
        let mut parent = MotionController::new();
        parent.velocity.x = Parameter::constant(5.0);

        let template = Template {
            vx: Some(ParamSpec::constant(-1.0)),
            ..Template::default()
        };
        let flags = InheritFlags {
            velocity: true,
            ..InheritFlags::default()
        };

        let mut child = MotionController::new();
        child.inherit(&parent, flags);
        child.init(&template, flags, &mut rng());
        assert_eq!(child.velocity.x.value, 5.0);

        let mut overwritten = MotionController::new();
        overwritten.inherit(&parent, flags);
        overwritten.init(&template, InheritFlags::default(), &mut rng());
        assert_eq!(overwritten.velocity.x.value, -1.0);
    }

    #[test]
    fn test_align_velocity() {
        let mut motion = MotionController::new();
        motion.velocity.x = Parameter::constant(3.0);
        motion.velocity.y = Parameter::constant(4.0);
        motion.align_velocity(180.0);
        assert!(motion.velocity.x.value.abs() < 1e-4);
        assert!((motion.velocity.y.value - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_target_arrives_exactly() {
        for control in [None, Some(Curve::linear()), Some(Curve::yoyo())] {
            let mut motion = MotionController::new();
            motion.position = Vec2::new(10.0, 10.0);
            motion.set_target(Vec2::new(110.0, -40.0), control);

            let lives = [0.0, 0.13, 0.4, 0.41, 0.77, 1.0];
            for pair in lives.windows(2) {
                motion.step(pair[0], pair[1], true);
            }
            assert!((motion.position - Vec2::new(110.0, -40.0)).length() < 1e-3);
        }
    }
}
