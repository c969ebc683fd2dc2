//! Software-rendered visualizer using `minifb`.
//!
//! Layout (the window is resizable; everything is placed relative to its
//! current size):
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │               VIRTUAL INAUGURATION DEEPAM                    │
//! │                   prompt for the phase                       │
//! │    ·        ·          hint            ·          ·          │
//! │         ·          ( glow )                 ·                │
//! │                     main lamp          ·                     │
//! │   ·                                          ·               │
//! │                    moving lamp ← hand cursor                 │
//! │  status bar                                                  │
//! │  key legend                                                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::sync::mpsc::Sender;
use std::time::Duration;

use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

use ceremony_core::{CeremonyPhase, CeremonySnapshot, ScenePoint};

use crate::error::{AppError, AppResult};
use crate::hand::SimInput;
use crate::scene::{flame_color, SceneState};

// ════════════════════════════════════════════════════════════════════════════
// Palette
// ════════════════════════════════════════════════════════════════════════════

const SKY_TOP: u32 = 0xFF0B1026;
const SKY_BOTTOM: u32 = 0xFF1E1B4B;
const STAR_COLOR: u32 = 0xFFFCD34D;
const GOLD: u32 = 0xFFF59E0B;
const BRASS: u32 = 0xFFD97706;
const BRASS_DARK: u32 = 0xFFB45309;
const BRASS_RIM: u32 = 0xFFFBBF24;
const WICK: u32 = 0xFF451A03;
const GLOW: u32 = 0xFFFFB020;
const TEXT: u32 = 0xFFF5F0E6;
const MUTED: u32 = 0xFF9CA3AF;
const CURSOR: u32 = 0xFFE0F2FE;
const PANEL_BG: u32 = 0xFF1E3A5F;
const STATUS_BG: u32 = 0xFF0F1A33;

const TITLE: &str = "Virtual Inauguration Deepam";

/// Scale of the 3×5 font for each text role.
const TITLE_SCALE: usize = 4;
const PROMPT_SCALE: usize = 3;
const BODY_SCALE: usize = 2;

/// Lamp artwork is drawn in a 120×144 box; the moving lamp at half size.
const MAIN_LAMP_SCALE: f32 = 1.0;
const MOVING_LAMP_SCALE: f32 = 0.5;

// ════════════════════════════════════════════════════════════════════════════
// Canvas: a resizable ARGB framebuffer with drawing primitives
// ════════════════════════════════════════════════════════════════════════════

pub struct Canvas {
    buf: Vec<u32>,
    w: usize,
    h: usize,
}

impl Canvas {
    pub fn new(w: usize, h: usize) -> Self {
        Canvas { buf: vec![SKY_TOP; w * h], w, h }
    }

    pub fn width(&self) -> usize {
        self.w
    }
    pub fn height(&self) -> usize {
        self.h
    }
    pub fn pixels(&self) -> &[u32] {
        &self.buf
    }

    /// Change the buffer size. Returns true if it changed.
    pub fn resize(&mut self, w: usize, h: usize) -> bool {
        if (w, h) == (self.w, self.h) {
            return false;
        }
        self.w = w;
        self.h = h;
        self.buf.resize(w * h, SKY_TOP);
        true
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        (x < self.w && y < self.h).then(|| self.buf[y * self.w + x])
    }

    fn set_pixel(&mut self, x: isize, y: isize, color: u32) {
        if x >= 0 && y >= 0 && (x as usize) < self.w && (y as usize) < self.h {
            self.buf[y as usize * self.w + x as usize] = color;
        }
    }

    fn blend_pixel(&mut self, x: isize, y: isize, color: u32, alpha: f32) {
        if x >= 0 && y >= 0 && (x as usize) < self.w && (y as usize) < self.h {
            let i = y as usize * self.w + x as usize;
            self.buf[i] = blend(self.buf[i], color, alpha);
        }
    }

    /// Vertical gradient over the whole buffer.
    fn fill_sky(&mut self) {
        let h = self.h.max(1) as f32;
        for row in 0..self.h {
            let c = blend(SKY_TOP, SKY_BOTTOM, row as f32 / h);
            self.buf[row * self.w..(row + 1) * self.w].fill(c);
        }
    }

    pub fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        for row in y..(y + h).min(self.h) {
            for col in x..(x + w).min(self.w) {
                self.buf[row * self.w + col] = color;
            }
        }
    }

    fn blend_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32, alpha: f32) {
        for row in y..(y + h).min(self.h) {
            for col in x..(x + w).min(self.w) {
                let i = row * self.w + col;
                self.buf[i] = blend(self.buf[i], color, alpha);
            }
        }
    }

    fn draw_border(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        if w == 0 || h == 0 {
            return;
        }
        let (x, y) = (x as isize, y as isize);
        let (w, h) = (w as isize, h as isize);
        for col in x..x + w {
            self.set_pixel(col, y, color);
            self.set_pixel(col, y + h - 1, color);
        }
        for row in y..y + h {
            self.set_pixel(x, row, color);
            self.set_pixel(x + w - 1, row, color);
        }
    }

    fn fill_ellipse(&mut self, cx: f32, cy: f32, rx: f32, ry: f32, color: u32) {
        if rx <= 0.0 || ry <= 0.0 {
            return;
        }
        let y0 = (cy - ry).floor() as isize;
        let y1 = (cy + ry).ceil() as isize;
        for y in y0..=y1 {
            let dy = (y as f32 + 0.5 - cy) / ry;
            if dy.abs() > 1.0 {
                continue;
            }
            let half = rx * (1.0 - dy * dy).sqrt();
            for x in (cx - half).round() as isize..(cx + half).round() as isize {
                self.set_pixel(x, y, color);
            }
        }
    }

    /// Soft radial glow: alpha falls off quadratically to zero at `r`.
    fn radial_glow(&mut self, cx: f32, cy: f32, r: f32, color: u32, strength: f32) {
        if r <= 0.0 {
            return;
        }
        for y in (cy - r) as isize..=(cy + r) as isize {
            for x in (cx - r) as isize..=(cx + r) as isize {
                let d = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt() / r;
                if d < 1.0 {
                    self.blend_pixel(x, y, color, strength * (1.0 - d) * (1.0 - d));
                }
            }
        }
    }

    fn draw_ring(&mut self, cx: f32, cy: f32, r: f32, color: u32, dashed: bool) {
        // Never more samples than the canvas has border pixels.
        let visible = 4 * (self.w + self.h);
        let steps = ((r * std::f32::consts::TAU) as usize).clamp(16, visible.max(16));
        for i in 0..steps {
            if dashed && (i / 8) % 2 == 1 {
                continue;
            }
            let a = i as f32 / steps as f32 * std::f32::consts::TAU;
            self.set_pixel((cx + r * a.cos()) as isize, (cy + r * a.sin()) as isize, color);
        }
    }

    /// Teardrop flame with its base at (`cx`, `base_y`).
    fn fill_flame(&mut self, cx: f32, base_y: f32, height: f32, width: f32) {
        let rows = height.max(1.0) as isize;
        for i in 0..rows {
            // t: 0 at the tip, 1 at the base.
            let t = i as f32 / rows as f32;
            let half = width * 0.5 * (std::f32::consts::PI * t * t).sin().max(0.0);
            let y = (base_y - height) as isize + i;
            let span = half.ceil() as isize;
            for dx in -span..=span {
                let edge = (dx as f32).abs() / half.max(0.5);
                if edge > 1.0 {
                    continue;
                }
                let heat = (1.0 - edge) * (0.35 + 0.65 * t);
                self.set_pixel(cx as isize + dx, y, flame_color(heat));
            }
        }
    }

    /// Minimal bitmap font: 3×5 characters, each pixel drawn `scale`×`scale`.
    pub fn draw_label(&mut self, text: &str, x: usize, y: usize, color: u32, scale: usize) {
        let scale = scale.max(1);
        let mut cx = x;
        for ch in text.chars() {
            if cx + 3 * scale > self.w {
                break;
            }
            let glyph = char_glyph(ch);
            for (row, &bits) in glyph.iter().enumerate() {
                for col in 0..3usize {
                    if bits & (1 << (2 - col)) != 0 {
                        self.fill_rect(cx + col * scale, y + row * scale, scale, scale, color);
                    }
                }
            }
            cx += 4 * scale; // 3 wide + 1 gap
        }
    }

    /// Draw `text` horizontally centred on the canvas.
    fn draw_label_centered(&mut self, text: &str, y: usize, color: u32, scale: usize) {
        let w = label_width(text, scale);
        self.draw_label(text, self.w.saturating_sub(w) / 2, y, color, scale);
    }
}

/// Pixel width of `text` in the 3×5 font at `scale`.
pub fn label_width(text: &str, scale: usize) -> usize {
    (text.chars().count() * 4).saturating_sub(1) * scale.max(1)
}

// ════════════════════════════════════════════════════════════════════════════
// Lamp artwork
// ════════════════════════════════════════════════════════════════════════════

/// Draw a deepam whose 120×144 artwork box is centred on `(cx, cy)`.
/// `flame` is the flame height multiplier; `None` leaves the wick dark.
fn draw_deepam(c: &mut Canvas, cx: f32, cy: f32, s: f32, flame: Option<f32>) {
    let at = |vx: f32, vy: f32| (cx + (vx - 60.0) * s, cy + (vy - 72.0) * s);

    // Base: trapezoid from (30,120)-(90,120) narrowing to (35,130)-(85,130).
    let (_, top) = at(0.0, 120.0);
    let (_, bottom) = at(0.0, 130.0);
    let rows = (bottom - top).max(1.0);
    for y in top as isize..bottom as isize {
        let t = (y as f32 - top) / rows;
        let half = (30.0 - 5.0 * t) * s;
        for x in (cx - half) as isize..(cx + half) as isize {
            c.set_pixel(x, y, BRASS_DARK);
        }
    }

    let (bx, by) = at(60.0, 105.0);
    c.fill_ellipse(bx, by, 25.0 * s + 1.0, 15.0 * s + 1.0, BRASS_DARK);
    c.fill_ellipse(bx, by, 25.0 * s, 15.0 * s, BRASS);

    let (rx, ry) = at(60.0, 90.0);
    c.fill_ellipse(rx, ry, 28.0 * s, 8.0 * s, BRASS_RIM);

    let (wx, wy) = at(58.0, 85.0);
    c.fill_rect(wx.max(0.0) as usize, wy.max(0.0) as usize, (4.0 * s).max(1.0) as usize, (10.0 * s).max(1.0) as usize, WICK);

    if let Some(k) = flame {
        let (fx, fy) = at(60.0, 86.0);
        c.radial_glow(fx, fy - 18.0 * s, 34.0 * s, GLOW, 0.45);
        c.fill_flame(fx, fy, 40.0 * s * k, 18.0 * s);
    }
}

// ════════════════════════════════════════════════════════════════════════════
// RenderView: what one frame shows
// ════════════════════════════════════════════════════════════════════════════

pub struct RenderView<'a> {
    pub snapshot: &'a CeremonySnapshot,
    pub scene: &'a SceneState,
    pub prompt: &'a str,
    pub hint: &'a str,
    pub status: &'a str,
    /// Proximity radius around the target, drawn while approaching.
    pub threshold: Option<f32>,
}

/// Draw one frame into `c`.
pub fn paint(c: &mut Canvas, view: &RenderView<'_>) {
    let snap = view.snapshot;
    let scene = view.scene;
    let (w, h) = (c.width() as f32, c.height() as f32);

    // ── Sky and stars ─────────────────────────────────────────────────────
    c.fill_sky();
    for star in &scene.stars {
        let x = (star.x * w) as isize;
        let y = (star.y * h) as isize;
        let b = star.brightness(scene.time);
        c.blend_pixel(x, y, STAR_COLOR, b);
        c.blend_pixel(x + 1, y, STAR_COLOR, b * 0.6);
        c.blend_pixel(x, y + 1, STAR_COLOR, b * 0.6);
    }

    // ── Main lamp ─────────────────────────────────────────────────────────
    if let Some(target) = snap.target {
        let cy = target.y + scene.bob();
        if scene.glow > 0.0 {
            let r = 60.0 + 3.0 * 60.0 * scene.glow_eased();
            c.radial_glow(target.x, cy, r, GLOW, 0.35 * scene.glow_eased());
        }
        let flame = snap.activated.then(|| scene.flicker());
        draw_deepam(c, target.x, cy, MAIN_LAMP_SCALE, flame);

        if let (CeremonyPhase::Approaching, Some(r)) = (snap.phase, view.threshold) {
            c.draw_ring(target.x, target.y, r, blend(SKY_BOTTOM, GOLD, 0.45), true);
        }
    }

    // ── Moving lamp and hand ──────────────────────────────────────────────
    if snap.moving.visible {
        let ScenePoint { x, y } = snap.moving.position;
        c.radial_glow(x, y, 40.0, GLOW, 0.3);
        draw_deepam(c, x, y, MOVING_LAMP_SCALE, Some(scene.flicker()));
    }
    if let Some(hand) = snap.hand {
        c.draw_ring(hand.x, hand.y, 14.0, CURSOR, false);
        c.draw_ring(hand.x, hand.y, 3.0, CURSOR, false);
    }

    // ── Blessing ──────────────────────────────────────────────────────────
    if scene.blessing > 0.0 {
        draw_blessing(c, scene.blessing);
    }

    // ── Text ──────────────────────────────────────────────────────────────
    c.draw_label_centered(TITLE, 24, GOLD, TITLE_SCALE);
    c.draw_label_centered(view.prompt, 24 + 8 * TITLE_SCALE, TEXT, PROMPT_SCALE);
    c.draw_label_centered(view.hint, 24 + 8 * TITLE_SCALE + 8 * PROMPT_SCALE, MUTED, BODY_SCALE);

    let status_h = 6 * BODY_SCALE + 12;
    let legend_y = c.height().saturating_sub(5 * BODY_SCALE + 8);
    let status_y = legend_y.saturating_sub(status_h + 4);
    let cw = c.width();
    c.fill_rect(0, status_y, cw, status_h, STATUS_BG);
    c.draw_label(view.status, 10, status_y + 6, TEXT, BODY_SCALE);
    c.draw_label("Move=hand  Space/click=fist  R=reset  Q=quit", 10, legend_y, MUTED, BODY_SCALE);
}

const BLESSING_LINES: [(&str, u32, usize); 4] = [
    ("Tamaso ma jyotirgamaya", GOLD, PROMPT_SCALE),
    ("\"Lead us from darkness to light\"", TEXT, BODY_SCALE),
    ("May this sacred light illuminate your path", TEXT, BODY_SCALE),
    ("and bring peace, prosperity, and wisdom to your life", MUTED, BODY_SCALE),
];

fn draw_blessing(c: &mut Canvas, fade: f32) {
    let (cw, ch) = (c.width(), c.height());
    c.blend_rect(0, 0, cw, ch, SKY_TOP, 0.6 * fade);

    let text_w = BLESSING_LINES
        .iter()
        .map(|&(t, _, s)| label_width(t, s))
        .max()
        .unwrap_or(0);
    let pw = (text_w + 64).min(cw);
    let ph = 200.min(ch);
    let px = (cw - pw) / 2;
    let py = (ch - ph) / 2;
    c.blend_rect(px, py, pw, ph, PANEL_BG, 0.8 * fade);
    c.draw_border(px, py, pw, ph, blend(PANEL_BG, GOLD, fade));

    if fade < 0.5 {
        return;
    }
    let mut y = py + 36;
    for &(text, color, scale) in &BLESSING_LINES {
        c.draw_label_centered(text, y, color, scale);
        y += 8 * scale + 12;
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Visualizer: the window
// ════════════════════════════════════════════════════════════════════════════

pub struct Visualizer {
    window: Window,
    canvas: Canvas,
    sim_tx: Sender<SimInput>,
}

impl Visualizer {
    pub fn new(width: usize, height: usize, sim_tx: Sender<SimInput>) -> AppResult<Self> {
        let mut window = Window::new(
            "Deepam: Virtual Inauguration",
            width,
            height,
            WindowOptions { resize: true, ..WindowOptions::default() },
        )
        .map_err(|e| AppError::Window(e.to_string()))?;

        window.limit_update_rate(Some(Duration::from_millis(16))); // ~60fps

        Ok(Visualizer { window, canvas: Canvas::new(width, height), sim_tx })
    }

    /// Returns false when the window should close.
    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    /// Current drawable size. Follows window resizes.
    pub fn size(&mut self) -> (usize, usize) {
        let (w, h) = self.window.get_size();
        self.canvas.resize(w.max(1), h.max(1));
        (self.canvas.width(), self.canvas.height())
    }

    /// Poll mouse and keyboard and translate to SimInput events.
    pub fn poll_input(&mut self) -> bool {
        if !self.window.is_open() {
            return false;
        }

        if self.window.is_key_pressed(Key::Q, KeyRepeat::No) || self.window.is_key_down(Key::Escape) {
            let _ = self.sim_tx.send(SimInput::Quit);
            return false;
        }
        if self.window.is_key_pressed(Key::R, KeyRepeat::No) {
            let _ = self.sim_tx.send(SimInput::Reset);
        }

        let (w, h) = (self.canvas.width() as f32, self.canvas.height() as f32);
        let pointer = match self.window.get_mouse_pos(MouseMode::Discard) {
            Some((x, y)) => SimInput::Pointer { x, y, width: w, height: h },
            None => SimInput::PointerLost,
        };
        let _ = self.sim_tx.send(pointer);

        let grip = self.window.is_key_down(Key::Space) || self.window.get_mouse_down(MouseButton::Left);
        let _ = self.sim_tx.send(SimInput::Grip(grip));

        true
    }

    /// Render one frame.
    pub fn render(&mut self, view: &RenderView<'_>) {
        paint(&mut self.canvas, view);
        let (w, h) = (self.canvas.width(), self.canvas.height());
        self.window.update_with_buffer(self.canvas.pixels(), w, h).ok();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Minimal 3×5 bitmap font
// ────────────────────────────────────────────────────────────────────────────

fn char_glyph(c: char) -> [u8; 5] {
    match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'a' | 'A' => [0b111, 0b101, 0b111, 0b101, 0b101],
        'b' | 'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'c' | 'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        'd' | 'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'e' | 'E' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'f' | 'F' => [0b111, 0b100, 0b111, 0b100, 0b100],
        'g' | 'G' => [0b111, 0b100, 0b101, 0b101, 0b111],
        'h' | 'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'i' | 'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'j' | 'J' => [0b001, 0b001, 0b001, 0b101, 0b111],
        'k' | 'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'l' | 'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'm' | 'M' => [0b101, 0b111, 0b101, 0b101, 0b101],
        'n' | 'N' => [0b111, 0b101, 0b101, 0b101, 0b101],
        'o' | 'O' => [0b111, 0b101, 0b101, 0b101, 0b111],
        'p' | 'P' => [0b111, 0b101, 0b111, 0b100, 0b100],
        'q' | 'Q' => [0b111, 0b101, 0b101, 0b111, 0b001],
        'r' | 'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        's' | 'S' => [0b111, 0b100, 0b111, 0b001, 0b111],
        't' | 'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'u' | 'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'v' | 'V' => [0b101, 0b101, 0b101, 0b010, 0b010],
        'w' | 'W' => [0b101, 0b101, 0b101, 0b111, 0b101],
        'x' | 'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'y' | 'Y' => [0b101, 0b101, 0b111, 0b010, 0b010],
        'z' | 'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
        '"' => [0b101, 0b101, 0b000, 0b000, 0b000],
        '\'' => [0b010, 0b010, 0b000, 0b000, 0b000],
        '!' => [0b010, 0b010, 0b010, 0b000, 0b010],
        '(' => [0b001, 0b010, 0b010, 0b010, 0b001],
        ')' => [0b100, 0b010, 0b010, 0b010, 0b100],
        ' ' => [0b000, 0b000, 0b000, 0b000, 0b000],
        _ => [0b000, 0b000, 0b010, 0b000, 0b000], // fallback dot
    }
}

/// Alpha-blend two ARGB colors. `t` = 0.0 → all `a`, `t` = 1.0 → all `b`.
pub fn blend(a: u32, b: u32, t: f32) -> u32 {
    let t = t.clamp(0.0, 1.0);
    let lerp = |ca: u32, cb: u32| (ca as f32 * (1.0 - t) + cb as f32 * t) as u32;
    let ar = (a >> 16) & 0xFF;
    let br = (b >> 16) & 0xFF;
    let ag = (a >> 8) & 0xFF;
    let bg = (b >> 8) & 0xFF;
    let ab = a & 0xFF;
    let bb = b & 0xFF;
    0xFF000000 | (lerp(ar, br) << 16) | (lerp(ag, bg) << 8) | lerp(ab, bb)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
