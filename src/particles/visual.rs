//! 外观描述控制器
//!
//! 只记录不透明的纹理/帧标识、动画集和层级提示，不持有任何像素。
//! 动画与层级提示只在生成时交给渲染器一次。

use super::template::{FrameRef, Template};
use glam::Vec2;
use rand::Rng;

/// 层级提示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZOrder {
    #[default]
    Unchanged,
    SendToBack,
    BringToFront,
}

/// 精灵表动画
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    pub name: String,
    pub frames: Vec<FrameRef>,
    pub frame_rate: f32,
    pub looped: bool,
}

/// 生成时交给渲染器的提示
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnHints<'a> {
    pub animation: Option<&'a Animation>,
    pub z_order: ZOrder,
}

/// 外观描述控制器
#[derive(Debug, Clone, PartialEq)]
pub struct VisualController {
    pub texture: Option<String>,
    pub frame: Option<FrameRef>,
    pub scale_mode: Option<String>,
    pub anchor: Vec2,
    pub animations: Vec<Animation>,
    /// 选中的动画下标
    pub selected: Option<usize>,
    pub z_order: ZOrder,
    hints_pending: bool,
}

impl Default for VisualController {
    fn default() -> Self {
        Self {
            texture: None,
            frame: None,
            scale_mode: None,
            anchor: Vec2::splat(0.5),
            animations: Vec::new(),
            selected: None,
            z_order: ZOrder::Unchanged,
            hints_pending: false,
        }
    }
}

impl VisualController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.texture = None;
        self.frame = None;
        self.scale_mode = None;
        self.anchor = Vec2::splat(0.5);
        self.animations.clear();
        self.selected = None;
        self.z_order = ZOrder::Unchanged;
        self.hints_pending = false;
    }

    pub fn init<R: Rng + ?Sized>(&mut self, template: &Template, rng: &mut R) {
        self.texture = template.image.as_ref().and_then(|i| i.pick(rng)).cloned();
        self.frame = template.frame.as_ref().and_then(|f| f.pick(rng)).cloned();
        self.scale_mode = template.scale_mode.clone();

        if let Some(anchor) = template.anchor {
            self.anchor = Vec2::splat(anchor);
        }
        if let Some(x) = template.anchor_x {
            self.anchor.x = x;
        }
        if let Some(y) = template.anchor_y {
            self.anchor.y = y;
        }

        self.animations.extend(template.animations.iter().map(|(name, spec)| Animation {
            name: name.clone(),
            frames: spec.frames.clone(),
            frame_rate: spec.frame_rate,
            looped: spec.looped,
        }));

        self.selected = match &template.play {
            Some(play) => play.pick(rng).and_then(|name| {
                let index = self.animations.iter().position(|a| &a.name == name);
                if index.is_none() {
                    tracing::warn!(target: "template", "Unknown animation `{}`", name);
                }
                index
            }),
            None if !self.animations.is_empty() => Some(0),
            None => None,
        };

        self.z_order = if template.send_to_back {
            ZOrder::SendToBack
        } else if template.bring_to_front {
            ZOrder::BringToFront
        } else {
            ZOrder::Unchanged
        };

        self.hints_pending = true;
    }

    /// 选中的动画
    pub fn animation(&self) -> Option<&Animation> {
        self.selected.and_then(|i| self.animations.get(i))
    }

    /// 尚未交给渲染器的生成提示
    pub fn spawn_hints(&self) -> Option<SpawnHints<'_>> {
        self.hints_pending.then(|| SpawnHints {
            animation: self.animation(),
            z_order: self.z_order,
        })
    }

    /// 提示已交付，之后不再重复推送
    pub fn step(&mut self) {
        self.hints_pending = false;
    }
}
