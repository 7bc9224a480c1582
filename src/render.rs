use crossterm::{
    cursor, queue,
    style::{self, Color as CColor},
};
use std::io::{self, Write};

use crate::game::{CLOUD_PARALLAX, Game, GROUND_BAND, METER, STAND_X, State, WORLD_HEIGHT};

// ── Colors ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    const fn lerp(a: Rgb, b: Rgb, t_256: u16) -> Rgb {
        let t = t_256 as i32;
        Rgb(
            (a.0 as i32 + (b.0 as i32 - a.0 as i32) * t / 256) as u8,
            (a.1 as i32 + (b.1 as i32 - a.1 as i32) * t / 256) as u8,
            (a.2 as i32 + (b.2 as i32 - a.2 as i32) * t / 256) as u8,
        )
    }
}

const SKY_TOP: Rgb = Rgb(92, 160, 230);
const SKY_BOT: Rgb = Rgb(185, 225, 250);
const CLOUD: Rgb = Rgb(250, 250, 252);
const CLOUD_SHADE: Rgb = Rgb(215, 222, 235);
const GRASS: Rgb = Rgb(96, 175, 70);
const GRASS_LIGHT: Rgb = Rgb(122, 200, 85);
const DIRT: Rgb = Rgb(150, 115, 80);
const DIRT_DARK: Rgb = Rgb(128, 95, 64);
const WOOD: Rgb = Rgb(145, 100, 55);
const WOOD_DARK: Rgb = Rgb(110, 75, 40);
const PAPER: Rgb = Rgb(248, 248, 245);
const PAPER_SHADE: Rgb = Rgb(190, 196, 210);
const PAPER_FOLD: Rgb = Rgb(130, 138, 155);
const MARKER: Rgb = Rgb(235, 235, 235);
const HUD_BAR: Rgb = Rgb(255, 215, 80);
const HUD_FRAME: Rgb = Rgb(255, 255, 255);
const PANEL: Rgb = Rgb(225, 205, 150);
const PANEL_EDGE: Rgb = Rgb(30, 30, 30);
const WHITE: Rgb = Rgb(255, 255, 255);
const GOLD: Rgb = Rgb(255, 210, 60);
const SHADOW: Rgb = Rgb(30, 30, 30);

// ── Pixel buffer with half-block rendering ──────────────────────────────────

pub struct PixelBuf {
    pub w: usize,
    pub h: usize, // pixel height = terminal rows * 2
    px: Vec<Rgb>,
}

impl PixelBuf {
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            px: vec![SKY_TOP; w * h],
        }
    }

    pub fn resize(&mut self, w: usize, h: usize) {
        self.w = w;
        self.h = h;
        self.px.resize(w * h, SKY_TOP);
    }

    fn set(&mut self, x: i32, y: i32, c: Rgb) {
        if x >= 0 && y >= 0 && (x as usize) < self.w && (y as usize) < self.h {
            self.px[y as usize * self.w + x as usize] = c;
        }
    }

    fn get(&self, x: usize, y: usize) -> Rgb {
        self.px[y * self.w + x]
    }

    fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, c: Rgb) {
        for dy in 0..h {
            for dx in 0..w {
                self.set(x + dx, y + dy, c);
            }
        }
    }

    fn fill_circle(&mut self, cx: i32, cy: i32, r: i32, c: Rgb) {
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy <= r * r {
                    self.set(cx + dx, cy + dy, c);
                }
            }
        }
    }

    fn fill_triangle(&mut self, p0: (f64, f64), p1: (f64, f64), p2: (f64, f64), c: Rgb) {
        let min_x = p0.0.min(p1.0).min(p2.0).floor() as i32;
        let max_x = p0.0.max(p1.0).max(p2.0).ceil() as i32;
        let min_y = p0.1.min(p1.1).min(p2.1).floor() as i32;
        let max_y = p0.1.max(p1.1).max(p2.1).ceil() as i32;

        let edge = |a: (f64, f64), b: (f64, f64), px: f64, py: f64| {
            (b.0 - a.0) * (py - a.1) - (b.1 - a.1) * (px - a.0)
        };
        let area = edge(p0, p1, p2.0, p2.1);
        if area.abs() < 1e-9 {
            return;
        }
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let (px, py) = (x as f64 + 0.5, y as f64 + 0.5);
                let w0 = edge(p1, p2, px, py) / area;
                let w1 = edge(p2, p0, px, py) / area;
                let w2 = edge(p0, p1, px, py) / area;
                if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                    self.set(x, y, c);
                }
            }
        }
    }

    fn line(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, c: Rgb) {
        let steps = (x1 - x0).abs().max((y1 - y0).abs()).ceil().max(1.0) as i32;
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            self.set(
                (x0 + (x1 - x0) * t).round() as i32,
                (y0 + (y1 - y0) * t).round() as i32,
                c,
            );
        }
    }

    fn darken(&mut self) {
        for c in &mut self.px {
            *c = Rgb(c.0 / 2, c.1 / 2, c.2 / 2);
        }
    }

    /// Writes the buffer as U+2580 half-blocks, two pixels per cell, only
    /// re-emitting color codes when a color actually changes.
    pub fn render(&self, out: &mut impl Write) -> io::Result<()> {
        queue!(out, cursor::MoveTo(0, 0))?;
        let rows = self.h / 2;
        let mut fg: Option<Rgb> = None;
        let mut bg: Option<Rgb> = None;

        for row in 0..rows {
            for col in 0..self.w {
                let top = self.get(col, row * 2);
                let bot = self.get(col, row * 2 + 1);

                if top == bot {
                    if bg != Some(top) {
                        queue!(out, style::SetBackgroundColor(term_color(top)))?;
                        bg = Some(top);
                    }
                    queue!(out, style::Print(' '))?;
                } else {
                    if fg != Some(top) {
                        queue!(out, style::SetForegroundColor(term_color(top)))?;
                        fg = Some(top);
                    }
                    if bg != Some(bot) {
                        queue!(out, style::SetBackgroundColor(term_color(bot)))?;
                        bg = Some(bot);
                    }
                    queue!(out, style::Print('\u{2580}'))?; // ▀
                }
            }
            if row < rows - 1 {
                queue!(out, style::ResetColor, style::Print("\r\n"))?;
                fg = None;
                bg = None;
            }
        }
        queue!(out, style::ResetColor)?;
        out.flush()
    }
}

fn term_color(c: Rgb) -> CColor {
    CColor::Rgb {
        r: c.0,
        g: c.1,
        b: c.2,
    }
}

// ── 3x5 bitmap glyphs for the HUD ───────────────────────────────────────────

#[rustfmt::skip]
const DIGITS: [[u8; 15]; 10] = [
    [1,1,1, 1,0,1, 1,0,1, 1,0,1, 1,1,1], // 0
    [0,1,0, 1,1,0, 0,1,0, 0,1,0, 1,1,1], // 1
    [1,1,1, 0,0,1, 1,1,1, 1,0,0, 1,1,1], // 2
    [1,1,1, 0,0,1, 0,1,1, 0,0,1, 1,1,1], // 3
    [1,0,1, 1,0,1, 1,1,1, 0,0,1, 0,0,1], // 4
    [1,1,1, 1,0,0, 1,1,1, 0,0,1, 1,1,1], // 5
    [1,1,1, 1,0,0, 1,1,1, 1,0,1, 1,1,1], // 6
    [1,1,1, 0,0,1, 0,1,0, 0,1,0, 0,1,0], // 7
    [1,1,1, 1,0,1, 1,1,1, 1,0,1, 1,1,1], // 8
    [1,1,1, 1,0,1, 1,1,1, 0,0,1, 1,1,1], // 9
];

#[rustfmt::skip]
const GLYPH_M: [u8; 15] = [1,0,1, 1,1,1, 1,0,1, 1,0,1, 1,0,1];

fn draw_glyph(buf: &mut PixelBuf, x: i32, y: i32, glyph: &[u8; 15], fg: Rgb) {
    for row in 0..5 {
        for col in 0..3 {
            if glyph[row * 3 + col] == 1 {
                let px = x + col as i32;
                let py = y + row as i32;
                buf.set(px + 1, py + 1, SHADOW);
                buf.set(px, py, fg);
            }
        }
    }
}

/// Draws `42.3m`-style labels centered on `cx`: digits, one dot, one `m`.
fn draw_meters(buf: &mut PixelBuf, cx: i32, y: i32, meters: f64, fg: Rgb) {
    let s = format!("{:.1}m", meters);
    let width: i32 = s.chars().map(|ch| if ch == '.' { 2 } else { 4 }).sum();
    let mut x = cx - width / 2;
    for ch in s.chars() {
        match ch {
            '.' => {
                buf.set(x + 1, y + 5, SHADOW);
                buf.set(x, y + 4, fg);
                x += 2;
            }
            'm' => {
                draw_glyph(buf, x, y, &GLYPH_M, fg);
                x += 4;
            }
            d => {
                draw_glyph(buf, x, y, &DIGITS[(d as u8 - b'0') as usize], fg);
                x += 4;
            }
        }
    }
}

// ── Frame drawing ───────────────────────────────────────────────────────────

/// Draws one frame of the current game state. Reads the state, never writes
/// it; the same state always produces the same frame.
pub fn draw_frame(game: &Game, buf: &mut PixelBuf, wind: f32) {
    // One uniform world-to-pixel scale, since the world is always 600 tall.
    let s = buf.h as f64 / WORLD_HEIGHT;

    draw_sky(buf);
    draw_clouds(game, buf, s);
    draw_ground(game, buf, s);
    draw_stand(game, buf, s);
    draw_particles(game, buf, s);
    draw_plane(game, buf, s);
    draw_hud(game, buf, wind);

    if game.state == State::End {
        draw_end_panel(game, buf);
    }
}

fn draw_sky(buf: &mut PixelBuf) {
    for y in 0..buf.h {
        let t = (y as u32 * 256 / buf.h.max(1) as u32) as u16;
        let c = Rgb::lerp(SKY_TOP, SKY_BOT, t);
        for x in 0..buf.w {
            buf.set(x as i32, y as i32, c);
        }
    }
}

fn draw_clouds(game: &Game, buf: &mut PixelBuf, s: f64) {
    for cloud in &game.clouds {
        let cx = ((cloud.x - CLOUD_PARALLAX * game.camera_x) * s) as i32;
        let cy = (cloud.y * s) as i32;
        let w = cloud.width * s;
        let r = (w * 0.28).max(2.0) as i32;
        let side = (w * 0.22).max(1.0) as i32;
        // Layered-circle silhouette with a shaded underside.
        buf.fill_circle(cx - (w * 0.30) as i32, cy + (w * 0.10) as i32, side, CLOUD_SHADE);
        buf.fill_circle(cx + (w * 0.30) as i32, cy + (w * 0.10) as i32, side, CLOUD_SHADE);
        buf.fill_circle(cx, cy + (w * 0.08) as i32, r, CLOUD_SHADE);
        buf.fill_circle(cx - (w * 0.28) as i32, cy, side, CLOUD);
        buf.fill_circle(cx + (w * 0.28) as i32, cy, side, CLOUD);
        buf.fill_circle(cx, cy - (w * 0.06) as i32, r, CLOUD);
    }
}

fn draw_ground(game: &Game, buf: &mut PixelBuf, s: f64) {
    let gy = ((WORLD_HEIGHT - GROUND_BAND) * s) as i32;
    let scroll = game.camera_x * s;

    for x in 0..buf.w as i32 {
        let alt = ((x as f64 + scroll) as i32 / 3) % 2 == 0;
        buf.set(x, gy, if alt { GRASS } else { GRASS_LIGHT });
        buf.set(x, gy + 1, GRASS);
    }
    for y in (gy + 2)..buf.h as i32 {
        for x in 0..buf.w as i32 {
            let stripe = ((x as f64 + scroll * 0.8) as i32 + (y - gy) * 2) % 12 < 6;
            buf.set(x, y, if stripe { DIRT } else { DIRT_DARK });
        }
    }

    // A numbered post every ten meters.
    let step = 10.0 * METER;
    let first = ((game.camera_x - STAND_X) / step).ceil().max(0.0) as i64;
    for k in first..first + (game.viewport_w / step) as i64 + 2 {
        let wx = STAND_X + k as f64 * step;
        let px = ((wx - game.camera_x) * s) as i32;
        let post_h = (12.0 * s).max(3.0) as i32;
        buf.fill_rect(px, gy - post_h, (2.0 * s).max(1.0) as i32, post_h, WOOD_DARK);
        draw_meters(buf, px + 1, gy - post_h - 7, k as f64 * 10.0, MARKER);
    }
}

fn draw_stand(game: &Game, buf: &mut PixelBuf, s: f64) {
    let sx = ((STAND_X - game.camera_x) * s) as i32;
    let top = ((game.stand_y() + 8.0) * s) as i32;
    let gy = (game.ground_y() * s) as i32;
    let post_w = (6.0 * s).max(2.0) as i32;
    let plat_w = (44.0 * s).max(6.0) as i32;
    let plat_h = (5.0 * s).max(2.0) as i32;

    buf.fill_rect(sx - post_w / 2, top, post_w, gy - top, WOOD_DARK);
    buf.fill_rect(sx - plat_w / 2, top, plat_w, plat_h, WOOD);
    buf.fill_rect(sx - plat_w / 2, top, plat_w, (s as i32).max(1), Rgb(175, 130, 80));
    // Base slab on the ground.
    buf.fill_rect(sx - post_w, gy - plat_h, post_w * 2, plat_h, WOOD);
}

fn draw_plane(game: &Game, buf: &mut PixelBuf, s: f64) {
    let plane = &game.plane;
    let cx = (plane.x - game.camera_x) * s;
    let cy = plane.y * s;
    let k = plane.scale * s;
    let (sin, cos) = plane.angle.sin_cos();

    let at = |lx: f64, ly: f64| {
        (
            cx + (lx * cos - ly * sin) * k,
            cy + (lx * sin + ly * cos) * k,
        )
    };

    // Paper dart: nose, tail corners, notch at the fold.
    let nose = at(16.0, 0.0);
    let tail_top = at(-14.0, -7.0);
    let tail_bot = at(-14.0, 7.0);
    let notch = at(-8.0, 0.0);

    buf.fill_triangle(nose, tail_top, notch, PAPER);
    buf.fill_triangle(nose, notch, tail_bot, PAPER_SHADE);
    buf.line(nose.0, nose.1, notch.0, notch.1, PAPER_FOLD);
}

fn draw_particles(game: &Game, buf: &mut PixelBuf, s: f64) {
    for p in &game.particles {
        let px = ((p.x - game.camera_x) * s) as i32;
        let py = (p.y * s) as i32;
        let r = ((1.0 + 2.5 * p.life) * s * 0.8).max(1.0) as i32;
        let fade = ((1.0 - p.life) * 230.0) as u16;
        buf.fill_circle(px, py, r, Rgb::lerp(CLOUD, SKY_BOT, fade));
    }
}

fn draw_hud(game: &Game, buf: &mut PixelBuf, wind: f32) {
    // Wind bar, top-left: filled width is the wind force as 0-100%.
    let bar_w = 52;
    let bar_h = 5;
    buf.fill_rect(3, 3, bar_w + 2, bar_h + 2, HUD_FRAME);
    buf.fill_rect(4, 4, bar_w, bar_h, SHADOW);
    let fill = (wind.clamp(0.0, 1.0) * bar_w as f32) as i32;
    buf.fill_rect(4, 4, fill, bar_h, HUD_BAR);

    let mid = buf.w as i32 / 2;
    draw_meters(buf, mid, 4, game.distance, WHITE);
}

fn draw_end_panel(game: &Game, buf: &mut PixelBuf) {
    buf.darken();

    let cx = buf.w as i32 / 2;
    let cy = buf.h as i32 / 2;
    let panel_w = (buf.w as i32 / 3).max(44);
    let panel_h = 22;
    let px = cx - panel_w / 2;
    let py = cy - panel_h / 2;

    buf.fill_rect(px - 1, py - 1, panel_w + 2, panel_h + 2, PANEL_EDGE);
    buf.fill_rect(px, py, panel_w, panel_h, PANEL);

    draw_meters(buf, cx, py + 4, game.distance, WHITE);
    draw_meters(buf, cx, py + 13, game.high_score, GOLD);
}
