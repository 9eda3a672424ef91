//! 颜色控制器
//!
//! 红/绿/蓝通道（0-255）、透明度（0-1）以及可选的色相模式（0-359，查预计算色轮）。
//! 通道默认 255，即不染色。

use super::parameter::Parameter;
use super::template::Template;
use rand::Rng;
use std::fmt::Write;
use std::sync::LazyLock;

/// 360 项全饱和度、全明度色轮
pub static HUE_WHEEL: LazyLock<[[u8; 3]; 360]> = LazyLock::new(|| {
    let mut wheel = [[0u8; 3]; 360];
    for (hue, entry) in wheel.iter_mut().enumerate() {
        *entry = hue_to_rgb(hue as f32);
    }
    wheel
});

fn hue_to_rgb(hue: f32) -> [u8; 3] {
    let sector = hue / 60.0;
    let fraction = sector - sector.floor();
    let rising = (fraction * 255.0).round() as u8;
    let falling = 255 - rising;
    match sector.floor() as u32 {
        0 => [255, rising, 0],
        1 => [falling, 255, 0],
        2 => [0, 255, rising],
        3 => [0, falling, 255],
        4 => [rising, 0, 255],
        _ => [255, 0, falling],
    }
}

/// 颜色控制器
#[derive(Debug, Clone, PartialEq)]
pub struct ColorController {
    pub red: Parameter,
    pub green: Parameter,
    pub blue: Parameter,
    pub alpha: Parameter,
    pub hue: Parameter,
    /// 色相模式：由色轮推导红绿蓝
    pub hsv_mode: bool,
    /// 是否有颜色通道驱动染色，只在复位时清除
    pub is_tinted: bool,
    pub blend_mode: Option<String>,
    /// 打包的 0xRRGGBB 染色值
    pub tint: u32,
    /// `rgba(r,g,b,a)` 字符串
    pub rgba: String,
    last_life: f32,
}

impl Default for ColorController {
    fn default() -> Self {
        Self {
            red: Parameter::bounded(255.0, 0.0, 255.0),
            green: Parameter::bounded(255.0, 0.0, 255.0),
            blue: Parameter::bounded(255.0, 0.0, 255.0),
            alpha: Parameter::bounded(1.0, 0.0, 1.0),
            hue: Parameter::bounded(0.0, 0.0, 359.0),
            hsv_mode: false,
            is_tinted: false,
            blend_mode: None,
            tint: 0xFFFFFF,
            rgba: String::from("rgba(255,255,255,1)"),
            last_life: 0.0,
        }
    }
}

impl ColorController {
    pub fn new() -> Self {
        Self::default()
    }

    /// 恢复默认状态，保留字符串缓冲区
    pub fn reset(&mut self) {
        let rgba = std::mem::take(&mut self.rgba);
        *self = Self {
            rgba,
            ..Self::default()
        };
        self.refresh(0.0);
    }

    pub fn init<R: Rng + ?Sized>(&mut self, template: &Template, rng: &mut R) {
        if let Some(spec) = &template.red {
            self.red = Parameter::from_spec(spec, &self.red, rng);
        }
        if let Some(spec) = &template.green {
            self.green = Parameter::from_spec(spec, &self.green, rng);
        }
        if let Some(spec) = &template.blue {
            self.blue = Parameter::from_spec(spec, &self.blue, rng);
        }
        if let Some(spec) = &template.hsv {
            self.hue = Parameter::from_spec(spec, &self.hue, rng);
            self.hsv_mode = true;
        }
        if let Some(spec) = &template.alpha {
            self.alpha = Parameter::from_spec(spec, &self.alpha, rng);
        }
        self.blend_mode = template.blend_mode.clone();
        self.is_tinted = template.is_tinted();
        self.refresh(0.0);
    }

    /// 外部直接指定颜色（区域染色），绕过模板并立即重新计算
    pub fn set_color(&mut self, red: f32, green: f32, blue: f32, alpha: f32) {
        self.red = Parameter::bounded(red, 0.0, 255.0);
        self.green = Parameter::bounded(green, 0.0, 255.0);
        self.blue = Parameter::bounded(blue, 0.0, 255.0);
        self.alpha = Parameter::bounded(alpha, 0.0, 1.0);
        self.hsv_mode = false;
        self.is_tinted = true;
        self.step(self.last_life);
    }

    /// 步进一帧
    pub fn step(&mut self, life: f32) {
        self.red.advance();
        self.green.advance();
        self.blue.advance();
        self.hue.advance();
        self.alpha.advance();
        self.refresh(life);
    }

    /// 不漂移地重新计算 `calc`、染色值和颜色字符串
    fn refresh(&mut self, life: f32) {
        self.last_life = life;

        if self.hsv_mode {
            self.hue.calc = self.hue.clamped_sample(life);
            let index = (self.hue.calc.max(0.0) as usize) % 360;
            let [r, g, b] = HUE_WHEEL[index];
            self.red.calc = r as f32;
            self.green.calc = g as f32;
            self.blue.calc = b as f32;
        } else {
            self.red.calc = self.red.clamped_sample(life);
            self.green.calc = self.green.clamped_sample(life);
            self.blue.calc = self.blue.clamped_sample(life);
        }
        self.alpha.calc = self.alpha.clamp(self.alpha.resolve(life));

        // 模板可放宽通道上限，打包前仍需落在 0..=255
        let channel = |v: f32| v.clamp(0.0, 255.0) as u32;
        let (r, g, b) = (
            channel(self.red.calc),
            channel(self.green.calc),
            channel(self.blue.calc),
        );
        if self.is_tinted {
            self.tint = (r << 16) | (g << 8) | b;
        }

        self.rgba.clear();
        let _ = write!(self.rgba, "rgba({},{},{},{})", r, g, b, self.alpha.calc);
    }
}
