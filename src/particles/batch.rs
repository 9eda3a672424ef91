//! 批量发射配置与重复调度

use super::zone::Zone;
use crate::impl_default;
use glam::Vec2;
use std::rc::Rc;

/// 区域内的点分布方式
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ZoneDistribution {
    /// `total` 个随机点
    #[default]
    Random,
    /// 完整遍历区域，每 `step` 个点取一个
    Full { step: usize },
    /// 路径上百分比位置的一个点
    Percent(f32),
}

/// 重复次数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Repeat {
    #[default]
    Once,
    /// 第一批之后再发射 n 批
    Times(u32),
    Forever,
}

impl Repeat {
    /// 第一批之后还需调度的批数，`None` 表示无限
    pub fn remaining_after_first(self) -> Option<Option<u32>> {
        match self {
            Repeat::Once | Repeat::Times(0) => None,
            Repeat::Times(n) => Some(Some(n)),
            Repeat::Forever => Some(None),
        }
    }
}

/// 向外辐射的速度
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Radiate {
    pub velocity: f32,
    /// 弧起点（度，0° 朝上）
    pub arc_start: f32,
    pub arc_end: f32,
}

/// 远离某点的速度
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiateFrom {
    pub point: Vec2,
    pub velocity: f32,
}

/// 批量发射配置
#[derive(Clone)]
pub struct BatchConfig {
    /// 粒子数量（无区域或随机分布时）
    pub total: u32,
    pub zone: Option<Rc<dyn Zone>>,
    pub distribution: ZoneDistribution,
    /// 第 i 个粒子额外偏移 `i × step`
    pub x_step: f32,
    pub y_step: f32,
    /// 第 i 个粒子的延迟为 `delay_start + i × delay_step`（毫秒）
    pub delay_start: f32,
    pub delay_step: f32,
    pub delay_visible: bool,
    pub radiate: Option<Radiate>,
    pub radiate_from: Option<RadiateFrom>,
    /// 区域染色 `[r, g, b, a]`
    pub set_color: Option<[f32; 4]>,
    pub repeat: Repeat,
    /// 重复间隔（毫秒）
    pub frequency: f32,
}

impl_default!(BatchConfig {
    total: 1,
    zone: None,
    distribution: ZoneDistribution::Random,
    x_step: 0.0,
    y_step: 0.0,
    delay_start: 0.0,
    delay_step: 0.0,
    delay_visible: false,
    radiate: None,
    radiate_from: None,
    set_color: None,
    repeat: Repeat::Once,
    frequency: 0.0,
});

impl BatchConfig {
    pub fn new(total: u32) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn with_zone(mut self, zone: Rc<dyn Zone>, distribution: ZoneDistribution) -> Self {
        self.zone = Some(zone);
        self.distribution = distribution;
        self
    }

    pub fn with_step(mut self, x_step: f32, y_step: f32) -> Self {
        self.x_step = x_step;
        self.y_step = y_step;
        self
    }

    pub fn with_delay(mut self, start: f32, step: f32, visible: bool) -> Self {
        self.delay_start = start;
        self.delay_step = step;
        self.delay_visible = visible;
        self
    }

    pub fn with_radiate(mut self, velocity: f32, arc_start: f32, arc_end: f32) -> Self {
        self.radiate = Some(Radiate {
            velocity,
            arc_start,
            arc_end,
        });
        self
    }

    pub fn with_radiate_from(mut self, point: Vec2, velocity: f32) -> Self {
        self.radiate_from = Some(RadiateFrom { point, velocity });
        self
    }

    pub fn with_color(mut self, red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        self.set_color = Some([red, green, blue, alpha]);
        self
    }

    pub fn with_repeat(mut self, repeat: Repeat, frequency: f32) -> Self {
        self.repeat = repeat;
        self.frequency = frequency;
        self
    }

    /// 第 i 个粒子的位置步进偏移
    pub fn step_offset(&self, index: usize) -> Vec2 {
        Vec2::new(self.x_step, self.y_step) * index as f32
    }

    /// 第 i 个粒子的批量延迟；未配置时为 `None`
    pub fn delay_for(&self, index: usize) -> Option<f32> {
        if self.delay_start <= 0.0 && self.delay_step <= 0.0 {
            return None;
        }
        Some((self.delay_start + self.delay_step * index as f32).max(0.0))
    }
}

/// 待执行的重复批次
#[derive(Clone)]
pub(crate) struct ScheduledBatch {
    pub key: String,
    pub origin: Vec2,
    pub config: BatchConfig,
    /// 剩余批数，`None` 表示无限
    pub remaining: Option<u32>,
    /// 下一次触发的模拟时间（毫秒）
    pub next_at: f64,
}
