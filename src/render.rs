use crate::color::Rgb;
use crate::controller::Phase;
use crate::field::Point;
use crate::snapshot::{FrameSnapshot, PathView};
use crossterm::{
    cursor,
    event::{DisableMouseCapture, EnableMouseCapture},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use std::io::{self, Write};

/// Text rows kept free under the field for the scale.
const SCALE_ROWS: u16 = 3;
/// Text rows kept free above the field for the HUD.
const HUD_ROWS: u16 = 2;
/// Minimum subpixel alpha that lights a braille dot.
const INK_ALPHA: u8 = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cell {
    pub(crate) ch: char,
    pub(crate) fg: Color,
    pub(crate) bg: Color,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::White,
            bg: Color::Black,
        }
    }
}

pub(crate) struct CellBuffer {
    pub(crate) w: u16,
    pub(crate) h: u16,
    pub(crate) cells: Vec<Cell>,
}

impl CellBuffer {
    pub(crate) fn new(w: u16, h: u16) -> Self {
        Self {
            w,
            h,
            cells: vec![Cell::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn set(&mut self, x: u16, y: u16, c: Cell) {
        if x < self.w && y < self.h {
            let i = self.idx(x, y);
            self.cells[i] = c;
        }
    }
    pub(crate) fn get(&self, x: u16, y: u16) -> Option<Cell> {
        (x < self.w && y < self.h).then(|| self.cells[self.idx(x, y)])
    }
    pub(crate) fn clear(&mut self, bg: Color) {
        self.cells.fill(Cell {
            bg,
            ..Cell::default()
        });
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Pixel {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
    pub(crate) a: u8,
}

impl Pixel {
    fn from_rgb(c: Rgb, alpha: f64) -> Self {
        Self {
            r: c.r,
            g: c.g,
            b: c.b,
            a: alpha.round().clamp(0.0, 255.0) as u8,
        }
    }
}

pub(crate) struct PixelCanvas {
    pub(crate) w: u32,
    pub(crate) h: u32,
    pub(crate) px: Vec<Pixel>,
}

impl PixelCanvas {
    pub(crate) fn new(w: u32, h: u32) -> Self {
        Self {
            w,
            h,
            px: vec![Pixel::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn clear(&mut self) {
        self.px.fill(Pixel::default());
    }

    /// Source-over compositing of `src` at `(x, y)`; off-canvas writes are dropped.
    pub(crate) fn blend_over(&mut self, x: i32, y: i32, src: Pixel) {
        if x < 0 || y < 0 || src.a == 0 {
            return;
        }
        let (x, y) = (x as u32, y as u32);
        if x >= self.w || y >= self.h {
            return;
        }
        let i = self.idx(x, y);
        let dst = self.px[i];

        let sa = src.a as f32 / 255.0;
        let da = dst.a as f32 / 255.0;

        let out_a = sa + da * (1.0 - sa);
        if out_a <= 1e-6 {
            self.px[i] = Pixel::default();
            return;
        }

        let blend = |sc: u8, dc: u8| -> u8 {
            let sc = sc as f32 / 255.0;
            let dc = dc as f32 / 255.0;
            let out = (sc * sa + dc * da * (1.0 - sa)) / out_a;
            (out.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
        };

        self.px[i] = Pixel {
            r: blend(src.r, dst.r),
            g: blend(src.g, dst.g),
            b: blend(src.b, dst.b),
            a: (out_a.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
        };
    }

    fn disk(&mut self, cx: f64, cy: f64, radius: f64, p: Pixel) {
        if radius < 0.75 {
            self.blend_over(cx.round() as i32, cy.round() as i32, p);
            return;
        }
        let r = radius.ceil() as i32;
        let (ix, iy) = (cx.round() as i32, cy.round() as i32);
        let r2 = radius * radius;
        for dy in -r..=r {
            for dx in -r..=r {
                if (dx * dx + dy * dy) as f64 <= r2 {
                    self.blend_over(ix + dx, iy + dy, p);
                }
            }
        }
    }

    fn line(&mut self, a: Point, b: Point, width: f64, p: Pixel) {
        let len = a.dist(b);
        let steps = (len * 2.0).ceil().max(1.0) as usize;
        let mut last = None;
        for s in 0..=steps {
            let q = a.lerp(b, s as f64 / steps as f64);
            let key = (q.x.round() as i32, q.y.round() as i32);
            if last == Some(key) {
                continue;
            }
            last = Some(key);
            self.disk(q.x, q.y, width / 2.0, p);
        }
    }

    /// Even-odd scanline fill of a closed polygon.
    fn fill_polygon(&mut self, pts: &[Point], p: Pixel) {
        if pts.len() < 3 {
            return;
        }
        let min_y = pts.iter().map(|q| q.y).fold(f64::INFINITY, f64::min).floor().max(0.0) as i32;
        let max_y = pts
            .iter()
            .map(|q| q.y)
            .fold(f64::NEG_INFINITY, f64::max)
            .ceil()
            .min(self.h as f64 - 1.0) as i32;

        let mut xs = Vec::new();
        for y in min_y..=max_y {
            let sy = y as f64 + 0.5;
            xs.clear();
            for i in 0..pts.len() {
                let (a, b) = (pts[i], pts[(i + 1) % pts.len()]);
                if (a.y <= sy) != (b.y <= sy) {
                    xs.push(a.x + (sy - a.y) / (b.y - a.y) * (b.x - a.x));
                }
            }
            xs.sort_by(|l, r| l.total_cmp(r));
            for pair in xs.chunks_exact(2) {
                let x0 = pair[0].round() as i32;
                let x1 = pair[1].round() as i32;
                for x in x0..x1 {
                    self.blend_over(x, y, p);
                }
            }
        }
    }
}

/// Maps field coordinates onto the canvas area reserved for the field.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Viewport {
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) w: f64,
    pub(crate) h: f64,
    pub(crate) field_w: f64,
    pub(crate) field_h: f64,
}

impl Viewport {
    pub(crate) fn to_px(&self, p: Point) -> Point {
        Point::new(
            self.x + p.x / self.field_w * self.w,
            self.y + p.y / self.field_h * self.h,
        )
    }
    pub(crate) fn scale(&self) -> f64 {
        self.w / self.field_w
    }
}

/// Catmull-Rom spline through `pts`, with the ends held by duplicated controls.
pub(crate) fn catmull_rom(pts: &[Point], steps: usize) -> Vec<Point> {
    if pts.len() < 2 {
        return pts.to_vec();
    }
    let steps = steps.max(1);
    let at = |i: isize| pts[i.clamp(0, pts.len() as isize - 1) as usize];
    let mut out = Vec::with_capacity((pts.len() - 1) * steps + 1);
    for i in 0..pts.len() as isize - 1 {
        let (p0, p1, p2, p3) = (at(i - 1), at(i), at(i + 1), at(i + 2));
        for s in 0..steps {
            let t = s as f64 / steps as f64;
            let (t2, t3) = (t * t, t * t * t);
            let f = |a: f64, b: f64, c: f64, d: f64| {
                0.5 * ((2.0 * b)
                    + (-a + c) * t
                    + (2.0 * a - 5.0 * b + 4.0 * c - d) * t2
                    + (-a + 3.0 * b - 3.0 * c + d) * t3)
            };
            out.push(Point::new(
                f(p0.x, p1.x, p2.x, p3.x),
                f(p0.y, p1.y, p2.y, p3.y),
            ));
        }
    }
    out.push(pts[pts.len() - 1]);
    out
}

pub(crate) struct Terminal {
    pub(crate) out: io::Stdout,
    pub(crate) cols: u16,
    pub(crate) rows: u16,
    pub(crate) prev: CellBuffer,
    pub(crate) cur: CellBuffer,
    pub(crate) canvas: PixelCanvas,
}

impl Terminal {
    pub(crate) fn begin() -> anyhow::Result<Self> {
        let mut out = io::stdout();
        execute!(
            out,
            EnterAlternateScreen,
            EnableMouseCapture,
            cursor::Hide,
            DisableLineWrap,
            terminal::Clear(ClearType::All)
        )?;
        terminal::enable_raw_mode()?;

        let (cols, rows) = terminal::size()?;
        Ok(Self {
            out,
            cols,
            rows,
            prev: CellBuffer::new(cols, rows),
            cur: CellBuffer::new(cols, rows),
            // Braille: 2×4 pixels per cell
            canvas: PixelCanvas::new(cols as u32 * 2, rows as u32 * 4),
        })
    }

    pub(crate) fn end(&mut self) -> anyhow::Result<()> {
        queue!(
            self.out,
            BeginSynchronizedUpdate,
            ResetColor,
            Clear(ClearType::All),
            cursor::Show,
            EnableLineWrap,
            EndSynchronizedUpdate,
            DisableMouseCapture,
            LeaveAlternateScreen
        )?;
        self.out.flush()?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    pub(crate) fn resize_if_needed(&mut self) -> anyhow::Result<bool> {
        let (c, r) = terminal::size()?;
        if c == self.cols && r == self.rows {
            return Ok(false);
        }
        self.cols = c;
        self.rows = r;
        self.prev = CellBuffer::new(c, r);
        self.cur = CellBuffer::new(c, r);
        self.canvas = PixelCanvas::new(c as u32 * 2, r as u32 * 4);
        queue!(self.out, Clear(ClearType::All))?;
        Ok(true)
    }

    pub(crate) fn present(&mut self, diff_only: bool) -> anyhow::Result<()> {
        queue!(self.out, BeginSynchronizedUpdate)?;

        let mut last_fg = None;
        let mut last_bg = None;

        for y in 0..self.rows {
            for x in 0..self.cols {
                let i = self.cur.idx(x, y);
                let c = self.cur.cells[i];
                if diff_only && c == self.prev.cells[i] {
                    continue;
                }

                queue!(self.out, cursor::MoveTo(x, y))?;

                if last_fg != Some(c.fg) {
                    queue!(self.out, SetForegroundColor(c.fg))?;
                    last_fg = Some(c.fg);
                }
                if last_bg != Some(c.bg) {
                    queue!(self.out, SetBackgroundColor(c.bg))?;
                    last_bg = Some(c.bg);
                }

                queue!(self.out, Print(c.ch))?;
            }
        }

        queue!(self.out, ResetColor, EndSynchronizedUpdate)?;
        self.out.flush()?;
        self.prev.cells.copy_from_slice(&self.cur.cells);
        Ok(())
    }

    /// Composes one frame into `cur`; `present` puts it on screen.
    pub(crate) fn draw(&mut self, snap: &FrameSnapshot, enable_color: bool) {
        let bg = Color::Black;
        self.cur.clear(bg);
        self.canvas.clear();

        let field_rows = self.rows.saturating_sub(SCALE_ROWS + HUD_ROWS).max(1);
        let vp = Viewport {
            x: 0.0,
            y: HUD_ROWS as f64 * 4.0,
            w: self.canvas.w as f64,
            h: field_rows as f64 * 4.0,
            field_w: snap.width,
            field_h: snap.height,
        };
        draw_field(&mut self.canvas, snap, vp);
        canvas_to_cells(&self.canvas, &mut self.cur, enable_color, bg);

        let scale_y = HUD_ROWS + field_rows;
        draw_scale(&mut self.cur, snap, scale_y, enable_color);
        draw_hud(&mut self.cur, snap);
    }
}

/* -----------------------------
   Field: dots, then the path on top
------------------------------ */

pub(crate) fn draw_field(canvas: &mut PixelCanvas, snap: &FrameSnapshot, vp: Viewport) {
    let k = vp.scale();
    for d in &snap.dots {
        if d.alpha <= 0.0 {
            continue;
        }
        let q = vp.to_px(d.pos);
        canvas.disk(q.x, q.y, d.size * k / 2.0, Pixel::from_rgb(d.color, d.alpha));
    }
    if let Some(path) = &snap.path {
        draw_path(canvas, path, vp);
    }
}

fn draw_path(canvas: &mut PixelCanvas, path: &PathView, vp: Viewport) {
    if path.progress <= 0.0 {
        return;
    }
    let pts: Vec<Point> = path.points.iter().map(|&p| vp.to_px(p)).collect();
    let curve = catmull_rom(&pts, 8);

    if path.style.fills() && path.fill_alpha > 0.0 {
        canvas.fill_polygon(&curve, Pixel::from_rgb(path.color, path.fill_alpha));
    }
    if path.style.strokes() && path.stroke_alpha > 0.0 {
        // boost so a faint stroke still clears the braille ink threshold
        let alpha = (path.stroke_alpha * 3.0).min(255.0);
        let p = Pixel::from_rgb(path.color, alpha);
        for w in curve.windows(2) {
            canvas.line(w[0], w[1], path.stroke_width * 0.5, p);
        }
    }
}

/* -----------------------------
   Braille encoding: 2×4 pixels -> U+2800..U+28FF
------------------------------ */

fn braille_bit(dx: u32, dy: u32) -> u8 {
    // (0,0)=1 (0,1)=2 (0,2)=4 (0,3)=64
    // (1,0)=8 (1,1)=16 (1,2)=32 (1,3)=128
    match (dx, dy) {
        (0, 0) => 0x01,
        (0, 1) => 0x02,
        (0, 2) => 0x04,
        (0, 3) => 0x40,
        (1, 0) => 0x08,
        (1, 1) => 0x10,
        (1, 2) => 0x20,
        (1, 3) => 0x80,
        _ => 0x00,
    }
}

pub(crate) fn canvas_to_cells(
    canvas: &PixelCanvas,
    out: &mut CellBuffer,
    enable_color: bool,
    bg: Color,
) {
    for cy in 0..out.h as u32 {
        for cx in 0..out.w as u32 {
            let mut mask: u8 = 0;
            let (mut sr, mut sg, mut sb, mut sa) = (0u32, 0u32, 0u32, 0u32);

            for dy in 0..4 {
                for dx in 0..2 {
                    let (x, y) = (cx * 2 + dx, cy * 4 + dy);
                    if x >= canvas.w || y >= canvas.h {
                        continue;
                    }
                    let p = canvas.px[canvas.idx(x, y)];
                    if p.a >= INK_ALPHA {
                        mask |= braille_bit(dx, dy);
                        // alpha-weighted so faint pixels tint less
                        let a = p.a as u32;
                        sr += p.r as u32 * a;
                        sg += p.g as u32 * a;
                        sb += p.b as u32 * a;
                        sa += a;
                    }
                }
            }
            if mask == 0 {
                continue;
            }

            let ch = char::from_u32(0x2800 + mask as u32).unwrap_or(' ');
            let fg = if enable_color && sa > 0 {
                // dim by mean coverage so fading dots read darker
                let lit = mask.count_ones();
                let cover = (sa as f32 / (lit as f32 * 255.0)).clamp(0.25, 1.0);
                let shade = |s: u32| ((s / sa) as f32 * cover) as u8;
                Color::Rgb {
                    r: shade(sr),
                    g: shade(sg),
                    b: shade(sb),
                }
            } else {
                Color::White
            };
            out.set(cx as u16, cy as u16, Cell { ch, fg, bg });
        }
    }
}

/* -----------------------------
   Text overlays
------------------------------ */

pub(crate) fn draw_text(buf: &mut CellBuffer, x: u16, y: u16, s: &str, fg: Color, bg: Color) {
    for (i, ch) in s.chars().enumerate() {
        let xx = x.saturating_add(i as u16);
        if xx >= buf.w || y >= buf.h {
            break;
        }
        buf.set(xx, y, Cell { ch, fg, bg });
    }
}

fn draw_text_centered(buf: &mut CellBuffer, cx: i32, y: u16, s: &str, fg: Color) {
    let len = s.chars().count() as i32;
    let x = (cx - len / 2).clamp(0, (buf.w as i32 - len).max(0));
    draw_text(buf, x as u16, y, s, fg, Color::Black);
}

fn to_color(c: Rgb, enable_color: bool) -> Color {
    if enable_color {
        Color::Rgb {
            r: c.r,
            g: c.g,
            b: c.b,
        }
    } else {
        Color::White
    }
}

/// Gradient bar, σ ticks and the average / risk-centre markers.
fn draw_scale(buf: &mut CellBuffer, snap: &FrameSnapshot, y: u16, enable_color: bool) {
    let cols = buf.w as f64;
    let col_of = |x: f64| (x / snap.width * cols).floor() as i32;
    let g = snap.gradient;
    let (start, end) = (col_of(g.start).max(0), col_of(g.end).min(buf.w as i32));

    for cx in start..end {
        let x = (cx as f64 + 0.5) / cols * snap.width;
        let fg = to_color(g.color_at(x), enable_color);
        buf.set(cx as u16, y, Cell { ch: '▀', fg, bg: Color::Black });
    }

    let white = Color::White;
    for sigma in -3..=3 {
        let x = g.start + (sigma + 3) as f64 / 6.0 * (g.end - g.start);
        let label = format!("{sigma}");
        draw_text_centered(buf, col_of(x), y + 1, &label, white);
        if let Some(mut c) = buf.get(col_of(x).max(0) as u16, y) {
            c.ch = '┼';
            buf.set(col_of(x).max(0) as u16, y, c);
        }
    }

    if let Some(path) = &snap.path {
        let (lo, hi) = path.section;
        let fg = to_color(path.color, enable_color);
        for (x, ch) in [(col_of(lo), '['), (col_of(hi) - 1, ']')] {
            if x >= 0 {
                buf.set(x as u16, y, Cell { ch, fg, bg: Color::Black });
            }
        }
    }

    draw_text_centered(buf, col_of(snap.average_x), y + 2, "^ Portfolio Average", white);
    if let Some(risk) = snap.risk_center {
        let label_y = y + 2;
        let cx = col_of(risk);
        let overlaps = (cx - col_of(snap.average_x)).abs() < 24;
        let text = "^ center of this risk";
        if overlaps {
            draw_text_centered(buf, cx, label_y.saturating_sub(1), text, white);
        } else {
            draw_text_centered(buf, cx, label_y, text, white);
        }
    }
}

fn draw_hud(buf: &mut CellBuffer, snap: &FrameSnapshot) {
    let (fg, bg) = (Color::White, Color::Black);
    let phase = match snap.phase {
        Phase::Animating => "settling",
        Phase::Paused => "constellation",
    };
    let state = if snap.running { "running" } else { "frozen" };
    draw_text(
        buf,
        1,
        0,
        &format!("{phase} | {state} | q quit | s/space/click freeze"),
        fg,
        bg,
    );

    if let Some(w) = snap.width_percent {
        let line1 = format!("Constellation Width: {w:.1}%");
        let line2 = format!("Average Width: {:.1}%", snap.average_width);
        let x1 = buf.w.saturating_sub(line1.chars().count() as u16 + 1);
        let x2 = buf.w.saturating_sub(line2.chars().count() as u16 + 1);
        draw_text(buf, x1, 0, &line1, fg, bg);
        draw_text(buf, x2, 1, &line2, fg, bg);
    }
}
