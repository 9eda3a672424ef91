//! 粒子状态机
//!
//! ```text
//! Pooled ──reset──▶ Delayed ──delay 到期──▶ Active ──life==1──▶ Complete (keepAlive)
//!    ▲                                        │                      │
//!    └──────────────── Dead ◀─────────────────┴──────────────────────┘
//! ```
//!
//! 粒子每个池槽只构造一次，复用时复位而不是重新分配。

use super::color::ColorController;
use super::math::{random_between, random_in_circle};
use super::motion::MotionController;
use super::parameter::Parameter;
use super::renderer::VisualHandle;
use super::template::{AtSpec, ControlSpec, EmitSpec, InheritFlags, OffsetSpec, Template};
use super::visual::VisualController;
use glam::Vec2;
use rand::Rng;
use std::fmt;
use std::sync::Arc;

/// 粒子标识，每次生成分配新值，池复用后旧标识失效
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticleId(pub(crate) u64);

impl ParticleId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "particle#{}", self.0)
    }
}

/// 一次步进的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    /// 是否继续存活
    pub alive: bool,
    /// 本次步进首次到达 life == 1
    pub completed: bool,
    /// 本次步进需要发射的子粒子数
    pub children: u32,
}

/// 子粒子发射状态
#[derive(Debug, Clone, PartialEq)]
struct Emission {
    frequency: Parameter,
    counter: f32,
    at: Vec<AtSpec>,
    next_at: usize,
}

impl Emission {
    fn from_spec<R: Rng + ?Sized>(spec: &EmitSpec, rng: &mut R) -> Self {
        let mut frequency = Parameter::default();
        if let Some(value) = &spec.value {
            frequency = Parameter::from_spec(value, &frequency, rng);
        }
        if let Some(ControlSpec(Some(curve))) = &spec.control {
            frequency.control = Some(curve.clone());
        }
        let mut at = spec.at.clone();
        at.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self {
            frequency,
            counter: 0.0,
            at,
            next_at: 0,
        }
    }

    /// 累积发射计数，返回本次应发射的整数个数
    fn accumulate<R: Rng + ?Sized>(
        &mut self,
        previous_life: f32,
        life: f32,
        elapsed: f32,
        rng: &mut R,
    ) -> u32 {
        while let Some(entry) = self.at.get(self.next_at) {
            if entry.time > life {
                break;
            }
            self.next_at += 1;
            if entry.value > 0.0 && entry.value < 1.0 {
                if rng.gen::<f32>() < entry.value {
                    self.counter += 1.0;
                }
            } else if entry.value > 0.0 {
                self.counter += entry.value;
            }
        }

        self.frequency.advance();
        if self.frequency.value != 0.0 {
            self.counter += self.frequency.mean(previous_life, life) * elapsed;
        }

        let whole = self.counter.floor();
        if whole < 1.0 {
            return 0;
        }
        self.counter -= whole;
        whole as u32
    }
}

/// 粒子
#[derive(Debug, Clone)]
pub struct Particle {
    pub(crate) id: ParticleId,
    pub(crate) parent: Option<ParticleId>,
    pub(crate) age: f32,
    pub(crate) lifespan: f32,
    pub(crate) life: f32,
    pub(crate) previous_life: f32,
    pub(crate) delay: f32,
    pub(crate) delay_visible: bool,
    pub(crate) keep_alive: bool,
    pub(crate) ignore_force: bool,
    pub(crate) ignore_scroll_speed: bool,
    pub(crate) alive: bool,
    pub(crate) complete: bool,
    pub(crate) motion: MotionController,
    pub(crate) color: ColorController,
    pub(crate) visual: VisualController,
    pub(crate) handle: Option<VisualHandle>,
    template: Option<Arc<Template>>,
    emission: Option<Emission>,
}

impl Default for Particle {
    fn default() -> Self {
        Self::new()
    }
}

impl Particle {
    /// 创建惰性（池中）粒子
    pub fn new() -> Self {
        Self {
            id: ParticleId(0),
            parent: None,
            age: 0.0,
            lifespan: 0.0,
            life: 0.0,
            previous_life: 0.0,
            delay: 0.0,
            delay_visible: false,
            keep_alive: false,
            ignore_force: false,
            ignore_scroll_speed: false,
            alive: false,
            complete: false,
            motion: MotionController::new(),
            color: ColorController::new(),
            visual: VisualController::new(),
            handle: None,
            template: None,
            emission: None,
        }
    }

    /// 复位为惰性状态，放回池前调用
    pub fn clear(&mut self) {
        self.parent = None;
        self.age = 0.0;
        self.lifespan = 0.0;
        self.life = 0.0;
        self.previous_life = 0.0;
        self.delay = 0.0;
        self.delay_visible = false;
        self.keep_alive = false;
        self.ignore_force = false;
        self.ignore_scroll_speed = false;
        self.alive = false;
        self.complete = false;
        self.motion.reset();
        self.color.reset();
        self.visual.reset();
        self.handle = None;
        self.template = None;
        self.emission = None;
    }

    /// 按模板复位：Pooled → Delayed | Active
    ///
    /// 父粒子的发射描述请求继承时，先从父粒子复制参数簇，再应用自身模板。
    pub fn reset<R: Rng + ?Sized>(
        &mut self,
        id: ParticleId,
        template: Arc<Template>,
        position: Vec2,
        parent: Option<&Particle>,
        rng: &mut R,
    ) {
        self.clear();
        self.id = id;
        self.parent = parent.map(|p| p.id);
        self.alive = true;

        self.lifespan = template
            .lifespan
            .as_ref()
            .and_then(|s| s.sample_scalar(rng))
            .unwrap_or(0.0)
            .max(0.0);
        self.delay = template
            .delay
            .as_ref()
            .and_then(|s| s.sample_scalar(rng))
            .unwrap_or(0.0)
            .max(0.0);
        self.delay_visible = template.delay_visible;
        self.keep_alive = template.keep_alive;
        self.ignore_force = template.ignore_force;
        self.ignore_scroll_speed = template.ignore_scroll_speed;

        let (flags, overwrite) = parent
            .and_then(|p| p.emit_spec())
            .map(|emit| (emit.inherit_flags(), emit.overwrite))
            .unwrap_or((InheritFlags::default(), true));
        let keep = if overwrite {
            InheritFlags::default()
        } else {
            flags
        };

        if let Some(parent) = parent {
            self.motion.inherit(&parent.motion, flags);
        }
        self.motion.position = position;
        self.motion.init(&template, keep, rng);

        if let (true, Some(parent)) = (flags.angular_velocity, parent) {
            self.motion.align_velocity(parent.motion.rotation.calc);
        }

        if let Some(target) = &template.target {
            if self.lifespan > 0.0 {
                let control = target.control.as_ref().and_then(|c| c.0.clone());
                self.motion
                    .set_target(Vec2::new(target.x, target.y), control);
            } else {
                tracing::warn!(target: "particles", "Ignoring target on immortal particle {}", id);
            }
        }

        self.color.init(&template, rng);
        self.visual.init(&template, rng);
        self.emission = template
            .emit
            .as_ref()
            .map(|emit| Emission::from_spec(emit, rng));
        self.template = Some(template);
    }

    /// 步进一帧
    ///
    /// 延迟期间只检查到期；否则推进年龄与生命比例、施加全局力、步进控制器并累积子粒子发射。
    pub fn step<R: Rng + ?Sized>(&mut self, elapsed: f32, force: Vec2, rng: &mut R) -> StepOutcome {
        let mut outcome = StepOutcome {
            alive: self.alive,
            completed: false,
            children: 0,
        };
        if !self.alive {
            return outcome;
        }

        if self.delay > 0.0 {
            self.age += elapsed;
            if self.age >= self.delay {
                self.age = 0.0;
                self.delay = 0.0;
            }
            return outcome;
        }

        self.age += elapsed;
        self.previous_life = self.life;
        if self.lifespan > 0.0 {
            self.life = (self.age / self.lifespan).min(1.0);
        }

        if !self.ignore_force && force != Vec2::ZERO {
            self.motion.add_velocity(force);
        }

        self.motion.step(self.previous_life, self.life, self.age > 0.0);
        self.color.step(self.life);

        if let Some(emission) = self.emission.as_mut() {
            outcome.children = emission.accumulate(self.previous_life, self.life, elapsed, rng);
        }

        if self.life >= 1.0 && !self.complete {
            self.complete = true;
            outcome.completed = true;
        }

        outcome.alive = self.life < 1.0 || self.keep_alive;
        outcome
    }

    /// 标记死亡；实际回收由发射器完成
    pub fn kill(&mut self) {
        self.alive = false;
    }

    /// 子粒子的生成位置：发射偏移加发射区域
    pub fn emission_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec2 {
        let mut point = self.motion.position;
        let Some(emit) = self.emit_spec() else {
            return point;
        };

        point.x += self.resolve_offset(emit.offset_x.as_ref(), rng);
        point.y += self.resolve_offset(emit.offset_y.as_ref(), rng);

        if let Some(rect) = emit.rect {
            point.x += rect.x + random_between(rng, 0.0, rect.width);
            point.y += rect.y + random_between(rng, 0.0, rect.height);
        } else if let Some(radius) = emit.circle {
            point += random_in_circle(rng, radius);
        }
        point
    }

    fn resolve_offset<R: Rng + ?Sized>(&self, offset: Option<&OffsetSpec>, rng: &mut R) -> f32 {
        match offset {
            Some(OffsetSpec::Param(spec)) => spec.sample_scalar(rng).unwrap_or(0.0),
            Some(OffsetSpec::Breakpoints(points)) => points
                .iter()
                .filter(|p| p.time <= self.life)
                .max_by(|a, b| a.time.total_cmp(&b.time))
                .map(|p| p.value)
                .unwrap_or(0.0),
            None => 0.0,
        }
    }

    /// 发射描述
    pub fn emit_spec(&self) -> Option<&EmitSpec> {
        self.template.as_ref().and_then(|t| t.emit.as_ref())
    }

    /// 子粒子模板键
    pub fn emit_key(&self) -> Option<&str> {
        self.emit_spec().and_then(|e| e.name.as_deref())
    }

    pub fn id(&self) -> ParticleId {
        self.id
    }

    /// 生成者标识；父粒子回到池后不再有效
    pub fn parent(&self) -> Option<ParticleId> {
        self.parent
    }

    pub fn template(&self) -> Option<&Arc<Template>> {
        self.template.as_ref()
    }

    pub fn position(&self) -> Vec2 {
        self.motion.position
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.motion.position = position;
    }

    pub fn age(&self) -> f32 {
        self.age
    }

    pub fn lifespan(&self) -> f32 {
        self.lifespan
    }

    /// 生命比例 `[0,1]`
    pub fn life(&self) -> f32 {
        self.life
    }

    pub fn delay(&self) -> f32 {
        self.delay
    }

    /// 覆盖模板延迟（批量发射的逐个延迟）
    pub fn set_delay(&mut self, delay: f32, visible: bool) {
        if !self.alive || self.age > 0.0 {
            return;
        }
        self.delay = delay.max(0.0);
        self.delay_visible = visible;
    }

    pub fn is_delayed(&self) -> bool {
        self.delay > 0.0
    }

    /// 延迟期间只有 `delayVisible` 的粒子可见
    pub fn is_visible(&self) -> bool {
        self.alive && (!self.is_delayed() || self.delay_visible)
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn ignores_force(&self) -> bool {
        self.ignore_force
    }

    pub fn ignores_scroll_speed(&self) -> bool {
        self.ignore_scroll_speed
    }

    pub fn motion(&self) -> &MotionController {
        &self.motion
    }

    pub fn motion_mut(&mut self) -> &mut MotionController {
        &mut self.motion
    }

    pub fn color(&self) -> &ColorController {
        &self.color
    }

    pub fn color_mut(&mut self) -> &mut ColorController {
        &mut self.color
    }

    pub fn visual(&self) -> &VisualController {
        &self.visual
    }

    /// 渲染器在生成时返回的句柄
    pub fn handle(&self) -> Option<VisualHandle> {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn template(value: serde_json::Value) -> Arc<Template> {
        Arc::new(serde_json::from_value(value).unwrap())
    }

    fn spawn(template: Arc<Template>, rng: &mut StdRng) -> Particle {
        let mut particle = Particle::new();
        particle.reset(ParticleId(1), template, Vec2::ZERO, None, rng);
        particle
    }

    #[test]
    fn test_life_reaches_one_on_fourth_step() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut particle = spawn(template(json!({"lifespan": 1000})), &mut rng);

        let mut completions = 0;
        for step in 1..=4 {
            let outcome = particle.step(250.0, Vec2::ZERO, &mut rng);
            completions += outcome.completed as u32;
            if step < 4 {
                assert!(particle.life() < 1.0);
                assert!(outcome.alive);
            } else {
                assert_eq!(particle.life(), 1.0);
                assert!(!outcome.alive);
            }
        }
        assert_eq!(completions, 1);
    }

    #[test]
    fn test_keep_alive_completes_once() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut particle = spawn(template(json!({"lifespan": 100, "keepAlive": true})), &mut rng);
        let mut completions = 0;
        for _ in 0..10 {
            let outcome = particle.step(50.0, Vec2::ZERO, &mut rng);
            assert!(outcome.alive);
            completions += outcome.completed as u32;
        }
        assert_eq!(completions, 1);
        assert!(particle.is_complete());
    }

    #[test]
    fn test_immortal_particle_never_completes() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut particle = spawn(template(json!({"vx": 1})), &mut rng);
        for _ in 0..1_000_000 {
            let outcome = particle.step(16.0, Vec2::ZERO, &mut rng);
            assert!(!outcome.completed);
        }
        assert_eq!(particle.life(), 0.0);
        assert!(!particle.is_complete());
        // 永生粒子仍然会移动
        assert!(particle.position().x > 0.0);
    }

    #[test]
    fn test_delay_holds_life() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut particle = spawn(template(json!({"lifespan": 100, "delay": 50})), &mut rng);
        assert!(particle.is_delayed());
        assert!(!particle.is_visible());

        particle.step(30.0, Vec2::ZERO, &mut rng);
        assert_eq!(particle.life(), 0.0);
        particle.step(30.0, Vec2::ZERO, &mut rng);
        assert!(!particle.is_delayed());
        assert_eq!(particle.age(), 0.0);
        assert_eq!(particle.life(), 0.0);

        particle.step(50.0, Vec2::ZERO, &mut rng);
        assert_eq!(particle.life(), 0.5);
    }

    #[test]
    fn test_force_respects_opt_out() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut pushed = spawn(template(json!({"lifespan": 1000})), &mut rng);
        let mut ignoring = spawn(template(json!({"lifespan": 1000, "ignoreForce": true})), &mut rng);
        pushed.step(10.0, Vec2::new(0.0, 2.0), &mut rng);
        ignoring.step(10.0, Vec2::new(0.0, 2.0), &mut rng);
        assert_eq!(pushed.position(), Vec2::new(0.0, 2.0));
        assert_eq!(ignoring.position(), Vec2::ZERO);
    }

    #[test]
    fn test_flat_frequency_emission() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut particle = spawn(
            template(json!({"lifespan": 2500, "emit": {"name": "spark", "value": 0.004}})),
            &mut rng,
        );
        // 250ms 覆盖生命区间 [0, 0.1]
        let outcome = particle.step(250.0, Vec2::ZERO, &mut rng);
        assert_eq!(particle.life(), 0.1);
        assert_eq!(outcome.children, 1);
    }

    #[test]
    fn test_at_list_emission() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut particle = spawn(
            template(json!({
                "lifespan": 1000,
                "emit": {"name": "spark", "at": [{"time": 0.5, "value": 3}, {"time": 0.2, "value": 2}]}
            })),
            &mut rng,
        );
        let counts: Vec<u32> = (0..4)
            .map(|_| particle.step(250.0, Vec2::ZERO, &mut rng).children)
            .collect();
        assert_eq!(counts, vec![2, 3, 0, 0]);
    }

    #[test]
    fn test_at_probabilities() {
        let mut rng = StdRng::seed_from_u64(7);
        let template = template(json!({
            "lifespan": 100,
            "emit": {"name": "spark", "at": [{"time": 0, "value": 0.5}]}
        }));
        let mut total = 0;
        for _ in 0..2000 {
            let mut particle = spawn(template.clone(), &mut rng);
            total += particle.step(10.0, Vec2::ZERO, &mut rng).children;
        }
        assert!(total > 800 && total < 1200, "total = {}", total);
    }

    #[test]
    fn test_emission_point_breakpoints() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut particle = spawn(
            template(json!({
                "lifespan": 1000,
                "emit": {
                    "name": "spark",
                    "offsetX": [{"time": 0, "value": -5}, {"time": 0.5, "value": 5}],
                    "offsetY": 3
                }
            })),
            &mut rng,
        );
        assert_eq!(particle.emission_point(&mut rng), Vec2::new(-5.0, 3.0));
        particle.step(600.0, Vec2::ZERO, &mut rng);
        assert_eq!(particle.emission_point(&mut rng), Vec2::new(5.0, 3.0));
    }

    #[test]
    fn test_emission_point_rect() {
        let mut rng = StdRng::seed_from_u64(1);
        let particle = spawn(
            template(json!({
                "emit": {"name": "spark", "rect": {"x": 10, "y": 10, "width": 4, "height": 2}}
            })),
            &mut rng,
        );
        for _ in 0..50 {
            let p = particle.emission_point(&mut rng);
            assert!((10.0..=14.0).contains(&p.x));
            assert!((10.0..=12.0).contains(&p.y));
        }
    }

    #[test]
    fn test_inherit_velocity_from_parent() {
        let mut rng = StdRng::seed_from_u64(1);
        let parent = spawn(
            template(json!({
                "vx": {"value": 5, "control": "yoyo"},
                "emit": {"name": "child", "inherit": {"velocity": true}}
            })),
            &mut rng,
        );
        let mut child = Particle::new();
        child.reset(
            ParticleId(2),
            template(json!({"lifespan": 100})),
            Vec2::ZERO,
            Some(&parent),
            &mut rng,
        );
        assert_eq!(child.parent(), Some(ParticleId(1)));
        assert_eq!(child.motion().velocity.x.value, 5.0);
        for life in [0.0, 0.25, 0.5, 0.9] {
            assert_eq!(
                child.motion().velocity.x.sample(life),
                parent.motion().velocity.x.sample(life)
            );
        }
    }

    #[test]
    fn test_inherited_offset_survives_child_drift() {
        let mut rng = StdRng::seed_from_u64(1);
        let parent = spawn(
            template(json!({
                "vx": {"value": 5, "offset": 0.5, "control": "reverse"},
                "emit": {"name": "child", "inherit": {"velocity": true}}
            })),
            &mut rng,
        );
        let mut child = Particle::new();
        child.reset(
            ParticleId(2),
            template(json!({"vx": {"delta": 1}})),
            Vec2::ZERO,
            Some(&parent),
            &mut rng,
        );
        let velocity = &child.motion().velocity.x;
        assert_eq!(velocity.offset, 0.5);
        assert_eq!(velocity.delta, 1.0);
        assert_eq!(velocity.sample(0.0), parent.motion().velocity.x.sample(0.0));
    }

    #[test]
    fn test_emission_point_circle() {
        let mut rng = StdRng::seed_from_u64(1);
        let particle = spawn(
            template(json!({"emit": {"name": "spark", "circle": 5}})),
            &mut rng,
        );
        for _ in 0..200 {
            let p = particle.emission_point(&mut rng);
            assert!(p.length() <= 5.0 + 1e-4, "point = {:?}", p);
        }
    }

    #[test]
    fn test_delay_visible_particle_shows_while_delayed() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut particle = spawn(
            template(json!({"lifespan": 100, "delay": 50, "delayVisible": true})),
            &mut rng,
        );
        assert!(particle.is_delayed());
        assert!(particle.is_visible());

        particle.set_delay(20.0, false);
        assert!(particle.is_delayed());
        assert!(!particle.is_visible());
    }

    #[test]
    fn test_angular_velocity_inheritance() {
        let mut rng = StdRng::seed_from_u64(1);
        let parent = spawn(
            template(json!({
                "rotation": 90,
                "emit": {"name": "child", "inherit": {"angularVelocity": true}}
            })),
            &mut rng,
        );
        let mut child = Particle::new();
        child.reset(
            ParticleId(2),
            template(json!({"vy": -3})),
            Vec2::ZERO,
            Some(&parent),
            &mut rng,
        );
        assert!((child.motion().velocity.x.value - 3.0).abs() < 1e-4);
        assert!(child.motion().velocity.y.value.abs() < 1e-4);
    }

    #[test]
    fn test_clear_makes_inert() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut particle = spawn(template(json!({"lifespan": 10, "red": 0})), &mut rng);
        particle.step(5.0, Vec2::ZERO, &mut rng);
        particle.clear();
        assert!(!particle.is_alive());
        assert_eq!(particle.life(), 0.0);
        assert!(particle.template().is_none());
        assert!(!particle.color().is_tinted);
        assert_eq!(particle.position(), Vec2::ZERO);
    }
}
