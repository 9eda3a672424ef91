//! 粒子发射器
//!
//! 发射器拥有粒子池与活跃列表，每个粒子任一时刻恰好位于其中之一。
//! 一次 [`Emitter::update`] 分三个阶段：
//!
//! 1. 推进调度时钟并触发到期的重复批次
//! 2. 逐个粒子施加滚动、引力井并步进，记录结果
//! 3. 后处理：生成子粒子，再把死亡粒子交换删除回池
//!
//! 子粒子在所有粒子步进完之后才追加，因此步进阶段不会改动活跃列表。

use super::batch::{BatchConfig, ScheduledBatch};
use super::gravity_well::{GravityWell, GravityWellId};
use super::math::{facing_vector, random_between};
use super::particle::{Particle, ParticleId, StepOutcome};
use super::renderer::ParticleRenderer;
use super::template::{Template, TemplateLibrary};
use crate::config::EmitterConfig;
use crate::core::{ParticleError, ParticleResult};
use glam::Vec2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// 继承钩子：`(child, parent)`，返回 `false` 否决子粒子
pub type InheritHook = Box<dyn FnMut(&Particle, &Particle) -> bool>;
/// 发射钩子：`(parent, child)`
pub type EmitHook = Box<dyn FnMut(&Particle, &Particle)>;
/// 单粒子钩子
pub type ParticleHook = Box<dyn FnMut(&Particle)>;

/// 发射器事件，未注册的钩子不执行任何操作
#[derive(Default)]
pub struct EmitterEvents {
    pub on_inherit: Option<InheritHook>,
    pub on_emit: Option<EmitHook>,
    pub on_complete: Option<ParticleHook>,
    pub on_kill: Option<ParticleHook>,
}

/// 发射器统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitterStats {
    pub total_spawned: u64,
    pub total_killed: u64,
    /// 被 `on_inherit` 否决的次数
    pub total_vetoed: u64,
    /// 因数量上限被拒绝的次数
    pub total_refused: u64,
}

/// 粒子发射器
pub struct Emitter {
    config: EmitterConfig,
    active: Vec<Particle>,
    pool: Vec<Particle>,
    index: HashMap<ParticleId, usize>,
    templates: TemplateLibrary,
    wells: Vec<(GravityWellId, GravityWell)>,
    force: Vec2,
    scroll_speed: Vec2,
    schedule: Vec<ScheduledBatch>,
    clock: f64,
    renderer: Option<Box<dyn ParticleRenderer>>,
    events: EmitterEvents,
    rng: StdRng,
    next_id: u64,
    next_well_id: u32,
    paused: bool,
    destroyed: bool,
    stats: EmitterStats,
    outcomes: Vec<StepOutcome>,
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Emitter {
    /// 使用默认配置创建
    pub fn new() -> Self {
        Self::build(EmitterConfig::default())
    }

    /// 使用给定配置创建
    pub fn with_config(config: EmitterConfig) -> ParticleResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EmitterConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let pool = (0..config.initial_pool_size).map(|_| Particle::new()).collect();
        tracing::debug!(
            target: "emitter",
            "Creating emitter (pool: {}, max: {})",
            config.initial_pool_size,
            config.max_particles
        );
        Self {
            force: Vec2::from_array(config.force),
            scroll_speed: Vec2::from_array(config.scroll_speed),
            config,
            active: Vec::new(),
            pool,
            index: HashMap::new(),
            templates: TemplateLibrary::new(),
            wells: Vec::new(),
            schedule: Vec::new(),
            clock: 0.0,
            renderer: None,
            events: EmitterEvents::default(),
            rng,
            next_id: 1,
            next_well_id: 1,
            paused: false,
            destroyed: false,
            stats: EmitterStats::default(),
            outcomes: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // 模板
    // ------------------------------------------------------------------

    pub fn add_template(&mut self, key: impl Into<String>, template: Template) {
        self.templates.insert(key, template);
    }

    pub fn remove_template(&mut self, key: &str) -> Option<Arc<Template>> {
        self.templates.remove(key)
    }

    pub fn clear_templates(&mut self) {
        self.templates.clear();
    }

    pub fn template(&self, key: &str) -> Option<Arc<Template>> {
        self.templates.get(key)
    }

    /// 同 [`Emitter::template`]，但未知键返回错误
    pub fn require_template(&self, key: &str) -> ParticleResult<Arc<Template>> {
        self.templates
            .get(key)
            .ok_or_else(|| ParticleError::UnknownTemplate(key.to_string()))
    }

    /// 从 JSON 对象批量加载模板，返回加载数量
    pub fn load_templates_json(&mut self, content: &str) -> ParticleResult<usize> {
        self.templates.load_json_str(content)
    }

    pub fn load_templates_file<P: AsRef<Path>>(&mut self, path: P) -> ParticleResult<usize> {
        self.templates.load_json_file(path)
    }

    pub fn templates(&self) -> &TemplateLibrary {
        &self.templates
    }

    // ------------------------------------------------------------------
    // 生成
    // ------------------------------------------------------------------

    /// 按模板键生成一个粒子
    ///
    /// 暂停、已销毁、达到上限、未知键或被 `on_inherit` 否决时返回 `None`。
    pub fn spawn(&mut self, key: &str, x: f32, y: f32, parent: Option<ParticleId>) -> Option<ParticleId> {
        if self.paused || self.destroyed {
            return None;
        }
        let Some(template) = self.templates.get(key) else {
            tracing::debug!(target: "emitter", "Unknown template '{}', nothing spawned", key);
            return None;
        };
        self.spawn_template(template, Vec2::new(x, y), parent)
    }

    fn spawn_template(
        &mut self,
        template: Arc<Template>,
        position: Vec2,
        parent: Option<ParticleId>,
    ) -> Option<ParticleId> {
        if self.config.max_particles != 0 && self.active.len() >= self.config.max_particles {
            self.stats.total_refused += 1;
            tracing::trace!(target: "emitter", "Particle cap {} reached", self.config.max_particles);
            return None;
        }

        let mut particle = match self.pool.pop() {
            Some(particle) => particle,
            None => {
                tracing::trace!(target: "emitter", "Pool empty, allocating particle");
                Particle::new()
            }
        };
        let id = ParticleId(self.next_id);
        self.next_id += 1;

        let parent_ref = parent
            .and_then(|pid| self.index.get(&pid).copied())
            .map(|i| &self.active[i]);
        particle.reset(id, template, position, parent_ref, &mut self.rng);

        if let (Some(parent), Some(hook)) = (parent_ref, self.events.on_inherit.as_mut()) {
            if !hook(&particle, parent) {
                particle.clear();
                self.pool.push(particle);
                self.stats.total_vetoed += 1;
                return None;
            }
        }

        if let Some(renderer) = self.renderer.as_mut() {
            particle.handle = renderer.add(&particle);
        }
        particle.visual.step();

        if let (Some(parent), Some(hook)) = (parent_ref, self.events.on_emit.as_mut()) {
            hook(parent, &particle);
        }

        self.index.insert(id, self.active.len());
        self.active.push(particle);
        self.stats.total_spawned += 1;
        Some(id)
    }

    /// 批量发射
    ///
    /// 立即发射第一批；配置了重复时按 `frequency` 毫秒间隔调度后续批次。
    pub fn emit_batch(&mut self, key: &str, x: f32, y: f32, config: BatchConfig) -> Vec<ParticleId> {
        if self.paused || self.destroyed {
            return Vec::new();
        }
        let origin = Vec2::new(x, y);
        let ids = self.emit_batch_now(key, origin, &config);

        if let Some(remaining) = config.repeat.remaining_after_first() {
            if config.frequency > 0.0 {
                self.schedule.push(ScheduledBatch {
                    key: key.to_string(),
                    origin,
                    next_at: self.clock + config.frequency as f64,
                    remaining,
                    config,
                });
            } else {
                tracing::warn!(
                    target: "emitter",
                    "Repeat requested for '{}' without a positive frequency, emitting once",
                    key
                );
            }
        }
        ids
    }

    fn emit_batch_now(&mut self, key: &str, origin: Vec2, config: &BatchConfig) -> Vec<ParticleId> {
        let ids = match &config.zone {
            Some(zone) => zone.emit(self, key, origin, config),
            None => (0..config.total as usize)
                .filter_map(|i| {
                    let position = origin + config.step_offset(i);
                    self.spawn(key, position.x, position.y, None)
                })
                .collect(),
        };

        for (i, id) in ids.iter().enumerate() {
            let Some(&slot) = self.index.get(id) else {
                continue;
            };
            let particle = &mut self.active[slot];

            if let Some(delay) = config.delay_for(i) {
                particle.set_delay(delay, config.delay_visible);
            }
            if let Some(radiate) = config.radiate {
                let angle = random_between(&mut self.rng, radiate.arc_start, radiate.arc_end);
                particle
                    .motion
                    .set_velocity(facing_vector(angle) * radiate.velocity);
            }
            if let Some(from) = config.radiate_from {
                let direction = (particle.position() - from.point).normalize_or_zero();
                if direction != Vec2::ZERO {
                    particle.motion.set_velocity(direction * from.velocity);
                }
            }
            if let Some([red, green, blue, alpha]) = config.set_color {
                particle.color.set_color(red, green, blue, alpha);
            }
        }
        ids
    }

    /// 取消所有待执行的重复批次
    pub fn clear_schedule(&mut self) {
        self.schedule.clear();
    }

    pub fn scheduled_count(&self) -> usize {
        self.schedule.len()
    }

    fn run_schedule(&mut self) {
        if self.schedule.is_empty() {
            return;
        }
        let mut pending = std::mem::take(&mut self.schedule);
        for batch in pending.iter_mut() {
            while batch.remaining != Some(0) && batch.next_at <= self.clock {
                self.emit_batch_now(&batch.key, batch.origin, &batch.config);
                batch.next_at += batch.config.frequency as f64;
                if let Some(remaining) = batch.remaining.as_mut() {
                    *remaining -= 1;
                }
            }
        }
        pending.retain(|batch| batch.remaining != Some(0));
        pending.append(&mut self.schedule);
        self.schedule = pending;
    }

    // ------------------------------------------------------------------
    // 更新
    // ------------------------------------------------------------------

    /// 推进 `elapsed` 毫秒
    pub fn update(&mut self, elapsed: f32) {
        if self.paused || self.destroyed {
            return;
        }
        self.clock += elapsed as f64;
        self.run_schedule();

        let force = self.force;
        let scroll = self.scroll_speed;
        self.outcomes.clear();
        for particle in self.active.iter_mut() {
            if !particle.ignore_scroll_speed && scroll != Vec2::ZERO {
                particle.motion.position += scroll;
            }
            for (_, well) in &self.wells {
                well.apply(particle, elapsed);
            }

            let outcome = particle.step(elapsed, force, &mut self.rng);
            if outcome.alive {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.update(particle);
                }
            }
            if outcome.completed {
                if let Some(hook) = self.events.on_complete.as_mut() {
                    hook(&*particle);
                }
            }
            self.outcomes.push(outcome);
        }

        let stepped = self.outcomes.len();
        for i in 0..stepped {
            let children = self.outcomes[i].children;
            if children == 0 {
                continue;
            }
            let Some(key) = self.active[i].emit_key() else {
                continue;
            };
            let Some(template) = self.templates.get(key) else {
                tracing::debug!(target: "emitter", "Unknown child template '{}', emission skipped", key);
                continue;
            };
            let parent = self.active[i].id;
            for _ in 0..children {
                let point = self.active[i].emission_point(&mut self.rng);
                self.spawn_template(template.clone(), point, Some(parent));
            }
        }

        for i in (0..stepped).rev() {
            if !self.outcomes[i].alive {
                self.remove_at(i);
            }
        }
    }

    /// 交换删除活跃粒子并回池
    fn remove_at(&mut self, slot: usize) {
        let mut particle = self.active.swap_remove(slot);
        self.index.remove(&particle.id);
        if let Some(moved) = self.active.get(slot) {
            self.index.insert(moved.id, slot);
        }

        particle.kill();
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.kill(&particle);
        }
        if let Some(hook) = self.events.on_kill.as_mut() {
            hook(&particle);
        }
        particle.clear();
        self.pool.push(particle);
        self.stats.total_killed += 1;
    }

    /// 立即杀死粒子并回池；粒子不在活跃列表时返回 `false`
    pub fn kill(&mut self, id: ParticleId) -> bool {
        match self.index.get(&id).copied() {
            Some(slot) => {
                self.remove_at(slot);
                true
            }
            None => false,
        }
    }

    /// 杀死所有活跃粒子
    pub fn kill_all(&mut self) {
        while !self.active.is_empty() {
            self.remove_at(self.active.len() - 1);
        }
    }

    /// 销毁：杀死全部粒子、取消调度并释放渲染器；重复调用无效果
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.kill_all();
        self.schedule.clear();
        if let Some(mut renderer) = self.renderer.take() {
            renderer.destroy();
        }
        self.destroyed = true;
        tracing::debug!(target: "emitter", "Emitter destroyed ({} pooled)", self.pool.len());
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// 暂停：既不步进也不生成，状态保留
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // ------------------------------------------------------------------
    // 力与引力井
    // ------------------------------------------------------------------

    pub fn force(&self) -> Vec2 {
        self.force
    }

    pub fn set_force(&mut self, force: Vec2) {
        self.force = force;
    }

    pub fn scroll_speed(&self) -> Vec2 {
        self.scroll_speed
    }

    pub fn set_scroll_speed(&mut self, scroll_speed: Vec2) {
        self.scroll_speed = scroll_speed;
    }

    /// 创建引力井
    pub fn create_gravity_well(
        &mut self,
        x: f32,
        y: f32,
        power: f32,
        epsilon: f32,
    ) -> ParticleResult<GravityWellId> {
        let well = GravityWell::new(Vec2::new(x, y), power, epsilon)?;
        let id = GravityWellId(self.next_well_id);
        self.next_well_id += 1;
        self.wells.push((id, well));
        tracing::debug!(target: "emitter", "Created gravity well {:?} at ({}, {})", id, x, y);
        Ok(id)
    }

    pub fn remove_gravity_well(&mut self, id: GravityWellId) -> bool {
        let before = self.wells.len();
        self.wells.retain(|(well_id, _)| *well_id != id);
        self.wells.len() != before
    }

    pub fn gravity_well(&self, id: GravityWellId) -> Option<&GravityWell> {
        self.wells.iter().find(|(well_id, _)| *well_id == id).map(|(_, well)| well)
    }

    pub fn gravity_well_mut(&mut self, id: GravityWellId) -> Option<&mut GravityWell> {
        self.wells
            .iter_mut()
            .find(|(well_id, _)| *well_id == id)
            .map(|(_, well)| well)
    }

    pub fn gravity_wells(&self) -> impl Iterator<Item = (GravityWellId, &GravityWell)> {
        self.wells.iter().map(|(id, well)| (*id, well))
    }

    // ------------------------------------------------------------------
    // 渲染器与事件
    // ------------------------------------------------------------------

    /// 绑定渲染器；已存在的粒子立即补发 `add`
    pub fn set_renderer(&mut self, mut renderer: Box<dyn ParticleRenderer>) {
        for particle in self.active.iter_mut() {
            particle.handle = renderer.add(&*particle);
        }
        self.renderer = Some(renderer);
    }

    pub fn events_mut(&mut self) -> &mut EmitterEvents {
        &mut self.events
    }

    pub fn on_inherit(&mut self, hook: impl FnMut(&Particle, &Particle) -> bool + 'static) {
        self.events.on_inherit = Some(Box::new(hook));
    }

    pub fn on_emit(&mut self, hook: impl FnMut(&Particle, &Particle) + 'static) {
        self.events.on_emit = Some(Box::new(hook));
    }

    pub fn on_complete(&mut self, hook: impl FnMut(&Particle) + 'static) {
        self.events.on_complete = Some(Box::new(hook));
    }

    pub fn on_kill(&mut self, hook: impl FnMut(&Particle) + 'static) {
        self.events.on_kill = Some(Box::new(hook));
    }

    // ------------------------------------------------------------------
    // 查询
    // ------------------------------------------------------------------

    pub fn alive_count(&self) -> usize {
        self.active.len()
    }

    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    pub fn particles(&self) -> impl Iterator<Item = &Particle> {
        self.active.iter()
    }

    pub fn particle(&self, id: ParticleId) -> Option<&Particle> {
        self.index.get(&id).map(|&slot| &self.active[slot])
    }

    pub fn particle_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        match self.index.get(&id) {
            Some(&slot) => self.active.get_mut(slot),
            None => None,
        }
    }

    pub fn stats(&self) -> EmitterStats {
        self.stats
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    /// 模拟时钟（毫秒）
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// 发射器的随机源，供区域采样
    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}
