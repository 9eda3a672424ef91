//! 粒子模板
//!
//! 模板是应用层以数据形式编写的粒子定义（JSON/TOML），在每次粒子复位时被解析成
//! 各控制器的参数。解析规则：
//!
//! - 裸数字 → 常量
//! - `{min, max}` → 每次复位时在区间内随机采样
//! - 含 `value|initial|delta|offset|control` 任一键的对象 → 完整参数，其中的 `min/max` 为夹取边界
//!
//! 模板是外部数据，格式错误的字段只记录警告并回退为默认值，不会导致失败。

use super::curve::{Curve, CurvePoint};
use super::math::random_between;
use crate::core::{ParticleError, ParticleResult};
use crate::impl_default;
use crate::impl_default_and_new;
use rand::Rng;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

const FULL_PARAM_KEYS: [&str; 5] = ["value", "initial", "delta", "offset", "control"];

// ============================================================================
// 标量与参数描述
// ============================================================================

/// 标量描述：常量或随机区间
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarSpec {
    /// 常量
    Constant(f32),
    /// 随机区间
    Range { min: f32, max: f32 },
}

impl ScalarSpec {
    /// 采样一个具体值
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        match *self {
            Self::Constant(v) => v,
            Self::Range { min, max } => random_between(rng, min, max),
        }
    }

    /// 可能取到的最小值
    pub fn lower_bound(&self) -> f32 {
        match *self {
            Self::Constant(v) => v,
            Self::Range { min, max } => min.min(max),
        }
    }

    fn parse(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64().map(|v| Self::Constant(v as f32)),
            Value::Object(map) => {
                let min = map.get("min").and_then(Value::as_f64);
                let max = map.get("max").and_then(Value::as_f64);
                match (min, max) {
                    (Some(min), Some(max)) => Some(Self::Range {
                        min: min as f32,
                        max: max as f32,
                    }),
                    (Some(v), None) | (None, Some(v)) => Some(Self::Constant(v as f32)),
                    (None, None) => None,
                }
            }
            _ => None,
        }
    }
}

/// 完整参数描述
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FullParamSpec {
    /// 基础值
    pub value: Option<ScalarSpec>,
    /// 常量基线
    pub initial: Option<ScalarSpec>,
    /// 每步增量
    pub delta: Option<ScalarSpec>,
    /// 曲线相位偏移，缺省时沿用基准参数
    pub offset: Option<f32>,
    /// 下限
    pub min: Option<f32>,
    /// 上限
    pub max: Option<f32>,
    /// 生命曲线
    pub control: Option<Curve>,
}

impl FullParamSpec {
    fn parse(map: &Map<String, Value>) -> Self {
        let scalar = |key: &str| {
            map.get(key).and_then(|v| {
                let parsed = ScalarSpec::parse(v);
                if parsed.is_none() {
                    tracing::warn!(target: "template", "Ignoring malformed `{}`: {}", key, v);
                }
                parsed
            })
        };
        Self {
            value: scalar("value"),
            initial: scalar("initial"),
            delta: scalar("delta"),
            offset: map.get("offset").and_then(Value::as_f64).map(|v| v as f32),
            min: map.get("min").and_then(Value::as_f64).map(|v| v as f32),
            max: map.get("max").and_then(Value::as_f64).map(|v| v as f32),
            control: map.get("control").and_then(parse_control),
        }
    }
}

/// 参数描述
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub enum ParamSpec {
    /// 常量或随机区间
    Scalar(ScalarSpec),
    /// 完整参数
    Full(FullParamSpec),
    /// 无法识别的写法，按未设置处理
    Malformed,
}

impl ParamSpec {
    /// 常量参数
    pub fn constant(value: f32) -> Self {
        Self::Scalar(ScalarSpec::Constant(value))
    }

    /// 随机区间参数
    pub fn range(min: f32, max: f32) -> Self {
        Self::Scalar(ScalarSpec::Range { min, max })
    }

    /// 从 JSON 值解析
    pub fn parse(value: &Value) -> Self {
        if let Value::Object(map) = value {
            if FULL_PARAM_KEYS.iter().any(|k| map.contains_key(*k)) {
                return Self::Full(FullParamSpec::parse(map));
            }
        }
        match ScalarSpec::parse(value) {
            Some(scalar) => Self::Scalar(scalar),
            None => {
                tracing::warn!(target: "template", "Ignoring malformed parameter: {}", value);
                Self::Malformed
            }
        }
    }

    /// 采样单个标量（用于 lifespan、delay 等非参数字段）
    pub fn sample_scalar<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<f32> {
        match self {
            Self::Scalar(scalar) => Some(scalar.sample(rng)),
            Self::Full(full) => {
                let value = full.value.map(|s| s.sample(rng)).unwrap_or(0.0);
                let initial = full.initial.map(|s| s.sample(rng)).unwrap_or(0.0);
                Some(value + initial)
            }
            Self::Malformed => None,
        }
    }

    /// 可能取到的最小值
    fn lower_bound(&self) -> Option<f32> {
        match self {
            Self::Scalar(scalar) => Some(scalar.lower_bound()),
            Self::Full(full) => full.value.map(|s| s.lower_bound()),
            Self::Malformed => None,
        }
    }
}

impl From<Value> for ParamSpec {
    fn from(value: Value) -> Self {
        Self::parse(&value)
    }
}

/// 解析曲线：预定义名称或 `{x, y}` 点列表
fn parse_control(value: &Value) -> Option<Curve> {
    match value {
        Value::String(name) => {
            let curve = Curve::named(name);
            if curve.is_none() {
                tracing::warn!(target: "template", "Unknown control curve `{}`", name);
            }
            curve
        }
        Value::Array(items) => {
            let points: Option<Vec<CurvePoint>> = items
                .iter()
                .map(|item| {
                    let x = item.get("x").and_then(Value::as_f64)?;
                    let y = item.get("y").and_then(Value::as_f64)?;
                    Some(CurvePoint::new(x as f32, y as f32))
                })
                .collect();
            let Some(points) = points else {
                tracing::warn!(target: "template", "Control points must be {{x, y}} numbers");
                return None;
            };
            match Curve::new(points) {
                Ok(curve) => Some(curve),
                Err(e) => {
                    tracing::warn!(target: "template", "Dropping custom control: {}", e);
                    None
                }
            }
        }
        Value::Null => None,
        other => {
            tracing::warn!(target: "template", "Ignoring malformed control: {}", other);
            None
        }
    }
}

/// 独立出现的 `control` 字段
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub struct ControlSpec(pub Option<Curve>);

impl From<Value> for ControlSpec {
    fn from(value: Value) -> Self {
        Self(parse_control(&value))
    }
}

// ============================================================================
// 速度与目标
// ============================================================================

/// 径向速度弧（度，0° 朝上）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialSpec {
    pub arc_start: f32,
    pub arc_end: f32,
}

/// `velocity` 字段：同时作用于 x/y，或带 `radial` 时作为速度大小
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub struct VelocitySpec {
    pub param: ParamSpec,
    pub radial: Option<RadialSpec>,
}

impl From<Value> for VelocitySpec {
    fn from(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return Self {
                param: ParamSpec::parse(&value),
                radial: None,
            };
        };
        let radial = map.remove("radial").and_then(|radial| match radial {
            Value::Bool(true) => Some(RadialSpec {
                arc_start: 0.0,
                arc_end: 360.0,
            }),
            Value::Object(arc) => {
                let get = |key: &str, default: f32| {
                    arc.get(key)
                        .and_then(Value::as_f64)
                        .map(|v| v as f32)
                        .unwrap_or(default)
                };
                Some(RadialSpec {
                    arc_start: get("arcStart", 0.0),
                    arc_end: get("arcEnd", 360.0),
                })
            }
            _ => None,
        });
        Self {
            param: ParamSpec::parse(&Value::Object(map)),
            radial,
        }
    }
}

/// 目标模式：粒子在生命结束时恰好到达目标点
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TargetSpec {
    pub x: f32,
    pub y: f32,
    pub control: Option<ControlSpec>,
}

impl_default!(TargetSpec {
    x: 0.0,
    y: 0.0,
    control: None,
});

// ============================================================================
// 外观
// ============================================================================

/// 单个或多个候选值，多个时复位时随机选择
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// 选择一个值
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&T> {
        match self {
            Self::One(value) => Some(value),
            Self::Many(values) if values.is_empty() => None,
            Self::Many(values) => values.get(rng.gen_range(0..values.len())),
        }
    }
}

/// 帧引用：按索引或名称
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(untagged)]
pub enum FrameRef {
    Index(u32),
    Name(String),
}

/// 精灵表动画定义
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationSpec {
    pub frames: Vec<FrameRef>,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f32,
    #[serde(default, rename = "loop")]
    pub looped: bool,
}

fn default_frame_rate() -> f32 {
    60.0
}

/// 按书写顺序保留动画表，"第一个定义的动画" 才有意义
fn ordered_animations<'de, D>(deserializer: D) -> Result<Vec<(String, AnimationSpec)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedVisitor;

    impl<'de> Visitor<'de> for OrderedVisitor {
        type Value = Vec<(String, AnimationSpec)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of animation name to definition")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, spec)) = map.next_entry::<String, AnimationSpec>()? {
                out.push((name, spec));
            }
            Ok(out)
        }
    }

    deserializer.deserialize_map(OrderedVisitor)
}

// ============================================================================
// 子粒子发射描述
// ============================================================================

/// 时间断点 `{time, value}`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AtSpec {
    pub time: f32,
    pub value: f32,
}

/// 发射偏移：参数或按生命断点查表
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OffsetSpec {
    Breakpoints(Vec<AtSpec>),
    Param(ParamSpec),
}

/// 矩形发射区域（相对发射点）
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RectSpec {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl_default!(RectSpec {
    x: 0.0,
    y: 0.0,
    width: 0.0,
    height: 0.0,
});

/// 继承标记
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InheritFlags {
    pub all: bool,
    pub velocity: bool,
    pub facing_velocity: bool,
    pub scale: bool,
    pub rotation: bool,
    pub angular_velocity: bool,
}

impl InheritFlags {
    /// 是否请求了任何继承
    pub fn any(&self) -> bool {
        self.all
            || self.velocity
            || self.facing_velocity
            || self.scale
            || self.rotation
            || self.angular_velocity
    }

    pub fn inherits_velocity(&self) -> bool {
        self.all || self.velocity
    }

    pub fn inherits_facing_velocity(&self) -> bool {
        self.all || self.facing_velocity
    }

    pub fn inherits_scale(&self) -> bool {
        self.all || self.scale
    }

    pub fn inherits_rotation(&self) -> bool {
        self.all || self.rotation
    }
}

/// `inherit` 字段：`true` 表示全部继承，或逐项标记
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum InheritSpec {
    All(bool),
    Flags(InheritFlags),
}

impl InheritSpec {
    pub fn flags(&self) -> InheritFlags {
        match *self {
            Self::All(all) => InheritFlags {
                all,
                ..InheritFlags::default()
            },
            Self::Flags(flags) => flags,
        }
    }
}

/// 子粒子发射描述
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmitSpec {
    /// 子粒子模板键
    pub name: Option<String>,
    /// 发射频率（每毫秒）
    pub value: Option<ParamSpec>,
    /// 频率曲线
    pub control: Option<ControlSpec>,
    /// 离散发射断点；值在 (0,1) 之间表示概率
    pub at: Vec<AtSpec>,
    pub inherit: Option<InheritSpec>,
    pub offset_x: Option<OffsetSpec>,
    pub offset_y: Option<OffsetSpec>,
    pub rect: Option<RectSpec>,
    /// 圆形发射区域半径
    pub circle: Option<f32>,
    /// 子模板是否覆盖继承来的参数
    pub overwrite: bool,
}

impl_default!(EmitSpec {
    name: None,
    value: None,
    control: None,
    at: Vec::new(),
    inherit: None,
    offset_x: None,
    offset_y: None,
    rect: None,
    circle: None,
    overwrite: true,
});

impl EmitSpec {
    pub fn inherit_flags(&self) -> InheritFlags {
        self.inherit.map(|i| i.flags()).unwrap_or_default()
    }
}

// ============================================================================
// 模板
// ============================================================================

/// 粒子模板
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Template {
    /// 生命周期（毫秒），0 表示永生
    pub lifespan: Option<ParamSpec>,
    /// 延迟（毫秒）
    pub delay: Option<ParamSpec>,
    /// 延迟期间是否可见
    pub delay_visible: bool,
    pub keep_alive: bool,
    pub ignore_force: bool,
    pub ignore_scroll_speed: bool,

    pub anchor: Option<f32>,
    pub anchor_x: Option<f32>,
    pub anchor_y: Option<f32>,

    pub velocity: Option<VelocitySpec>,
    pub vx: Option<ParamSpec>,
    pub vy: Option<ParamSpec>,
    pub acceleration: Option<ParamSpec>,
    pub ax: Option<ParamSpec>,
    pub ay: Option<ParamSpec>,
    pub facing_velocity: Option<ParamSpec>,
    pub facing_acceleration: Option<ParamSpec>,
    pub scale: Option<ParamSpec>,
    pub scale_x: Option<ParamSpec>,
    pub scale_y: Option<ParamSpec>,
    pub rotation: Option<ParamSpec>,
    pub target: Option<TargetSpec>,

    pub red: Option<ParamSpec>,
    pub green: Option<ParamSpec>,
    pub blue: Option<ParamSpec>,
    pub hsv: Option<ParamSpec>,
    pub alpha: Option<ParamSpec>,
    pub blend_mode: Option<String>,

    pub image: Option<OneOrMany<String>>,
    pub frame: Option<OneOrMany<FrameRef>>,
    pub scale_mode: Option<String>,
    #[serde(deserialize_with = "ordered_animations")]
    pub animations: Vec<(String, AnimationSpec)>,
    pub play: Option<OneOrMany<String>>,
    pub send_to_back: bool,
    pub bring_to_front: bool,

    pub emit: Option<EmitSpec>,
}

impl Template {
    /// 从JSON字符串解析模板
    pub fn from_json_str(content: &str) -> ParticleResult<Self> {
        serde_json::from_str(content).map_err(|e| ParticleError::TemplateParse(e.to_string()))
    }

    /// 从TOML字符串解析模板
    pub fn from_toml_str(content: &str) -> ParticleResult<Self> {
        toml::from_str(content).map_err(|e| ParticleError::TemplateParse(e.to_string()))
    }

    /// 校验契约约束
    ///
    /// 创作错误在解析时已降级；这里只拒绝负的生命周期/延迟，以及同时指定目标与显式速度。
    pub fn validate(&self) -> ParticleResult<()> {
        if let Some(min) = self.lifespan.as_ref().and_then(ParamSpec::lower_bound) {
            if min < 0.0 {
                return Err(ParticleError::InvalidArgument(format!(
                    "lifespan must not be negative, got {}",
                    min
                )));
            }
        }
        if let Some(min) = self.delay.as_ref().and_then(ParamSpec::lower_bound) {
            if min < 0.0 {
                return Err(ParticleError::InvalidArgument(format!(
                    "delay must not be negative, got {}",
                    min
                )));
            }
        }
        if self.target.is_some()
            && (self.velocity.is_some() || self.vx.is_some() || self.vy.is_some())
        {
            return Err(ParticleError::InvalidArgument(
                "target and explicit velocity are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }

    /// 是否定义了任何颜色通道
    pub fn is_tinted(&self) -> bool {
        self.red.is_some() || self.green.is_some() || self.blue.is_some() || self.hsv.is_some()
    }
}

// ============================================================================
// 模板库
// ============================================================================

/// 模板库：键 → 模板
#[derive(Debug, Clone)]
pub struct TemplateLibrary {
    templates: HashMap<String, Arc<Template>>,
}

impl_default_and_new!(TemplateLibrary {
    templates: HashMap::new(),
});

impl TemplateLibrary {
    /// 注册模板，返回被替换的旧模板
    pub fn insert(&mut self, key: impl Into<String>, template: Template) -> Option<Arc<Template>> {
        self.templates.insert(key.into(), Arc::new(template))
    }

    pub fn remove(&mut self, key: &str) -> Option<Arc<Template>> {
        self.templates.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<Arc<Template>> {
        self.templates.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.templates.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.templates.clear();
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// 从 `{ "key": template, ... }` 形式的JSON加载，返回加载数量
    pub fn load_json_str(&mut self, content: &str) -> ParticleResult<usize> {
        let parsed: HashMap<String, Template> = serde_json::from_str(content)
            .map_err(|e| ParticleError::TemplateParse(e.to_string()))?;
        let count = parsed.len();
        for (key, template) in parsed {
            tracing::debug!(target: "template", "Registered template `{}`", key);
            self.insert(key, template);
        }
        Ok(count)
    }

    /// 从JSON文件加载
    pub fn load_json_file<P: AsRef<Path>>(&mut self, path: P) -> ParticleResult<usize> {
        let content = std::fs::read_to_string(path)?;
        self.load_json_str(&content)
    }
}
