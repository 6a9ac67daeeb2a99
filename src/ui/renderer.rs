/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// The arena is in pixels; one terminal cell covers `CELL_PX_W` x
/// `CELL_PX_H` pixels. A cell shows whatever entity overlaps it, with the
/// player drawn on top. Solids of the inactive world are drawn as faint
/// outlines so the player can plan a swap.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::entity::{DoorKind, World};
use crate::domain::geometry::{overlaps, Rect};
use crate::sim::run::format_ms;
use crate::sim::world::{Phase, WorldState};

const CELL_PX_W: f64 = 8.0;
const CELL_PX_H: f64 = 16.0;

const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;
/// HUD + gap + message + help
const RESERVED_ROWS: usize = MAP_ROW + 3;

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Sentinel used to invalidate the back buffer; never equal to a real cell.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        Cell { ch, fg, bg }
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Cell::new(ch, fg, bg));
        }
    }

    fn fill_row(&mut self, y: usize, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Cell::new(' ', Color::White, bg));
        }
    }
}

// ── Camera ──

/// A viewport into the arena, in cells.
///
/// `(x, y)` is the cell coordinate of the top-left visible cell; negative
/// when the arena is smaller than the view and gets centered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Camera {
    pub x: i32,
    pub y: i32,
    pub view_w: usize,
    pub view_h: usize,
}

impl Camera {
    pub fn new() -> Self {
        Camera { x: 0, y: 0, view_w: 0, view_h: 0 }
    }

    /// Dead-zone follow: scroll only when the target leaves the inner 60%
    /// of the view. Arenas narrower than the view are centered.
    pub fn follow(&mut self, target_x: i32, target_y: i32, world_w: usize, world_h: usize) {
        if self.view_w == 0 || self.view_h == 0 { return; }
        self.x = follow_axis(self.x, target_x, self.view_w, world_w);
        self.y = follow_axis(self.y, target_y, self.view_h, world_h);
    }

    /// Snap to center on a target (level load / reset).
    pub fn center_on(&mut self, target_x: i32, target_y: i32, world_w: usize, world_h: usize) {
        if self.view_w == 0 || self.view_h == 0 { return; }
        self.x = center_axis(target_x, self.view_w, world_w);
        self.y = center_axis(target_y, self.view_h, world_h);
    }
}

fn follow_axis(cam: i32, target: i32, view: usize, world: usize) -> i32 {
    let view = view as i32;
    let world = world as i32;
    if world <= view {
        return -((view - world) / 2);
    }
    let margin = view / 5;
    let next = if target < cam + margin {
        target - margin
    } else if target > cam + view - margin - 1 {
        target - view + margin + 1
    } else {
        cam
    };
    next.clamp(0, world - view)
}

fn center_axis(target: i32, view: usize, world: usize) -> i32 {
    let view = view as i32;
    let world = world as i32;
    if world <= view {
        -((view - world) / 2)
    } else {
        (target - view / 2).clamp(0, world - view)
    }
}

// ── Palette ──

struct Palette {
    bg: Color,
    solid: Color,
    ghost: Color,
    mover: Color,
}

fn palette(world: World) -> Palette {
    match world {
        World::Light => Palette {
            bg: Color::Rgb { r: 40, g: 44, b: 60 },
            solid: Color::Rgb { r: 220, g: 205, b: 160 },
            ghost: Color::Rgb { r: 70, g: 70, b: 110 },
            mover: Color::Rgb { r: 240, g: 170, b: 60 },
        },
        World::Dark => Palette {
            bg: Cell::BASE_BG,
            solid: Color::Rgb { r: 110, g: 100, b: 200 },
            ghost: Color::Rgb { r: 90, g: 85, b: 70 },
            mover: Color::Rgb { r: 170, g: 110, b: 230 },
        },
    }
}

// ── Renderer ──

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    camera: Camera,
    /// Level/phase last drawn, to snap the camera on a fresh countdown.
    last_view: Option<(usize, Phase)>,
    /// Key release reporting was pushed and must be popped on cleanup.
    key_release: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            camera: Camera::new(),
            last_view: None,
            key_release: false,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.resize(tw as usize, th as usize);
        Ok(())
    }

    /// Ask the terminal to report key releases. Returns whether it will.
    pub fn enable_key_release(&mut self) -> bool {
        if !terminal::supports_keyboard_enhancement().unwrap_or(false) {
            return false;
        }
        self.key_release = execute!(
            self.writer,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )
        .is_ok();
        self.key_release
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        if self.key_release {
            execute!(self.writer, PopKeyboardEnhancementFlags)?;
        }
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    fn resize(&mut self, w: usize, h: usize) {
        self.term_w = w;
        self.term_h = h;
        self.front.resize(w, h);
        self.back.resize(w, h);
        // Force full repaint: back differs from front everywhere.
        self.back.cells.fill(Cell::INVALID);
    }

    pub fn render(&mut self, world: &WorldState) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.resize(tw as usize, th as usize);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        self.update_camera(world);

        self.front.clear();
        self.compose_hud(world);
        self.compose_arena(world);
        self.compose_overlay(world);
        self.compose_footer(world);

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    fn update_camera(&mut self, w: &WorldState) {
        let world_w = (w.level.width / CELL_PX_W).ceil() as usize;
        let world_h = (w.level.height / CELL_PX_H).ceil() as usize;
        self.camera.view_w = self.term_w.min(world_w.max(1));
        self.camera.view_h = self.term_h.saturating_sub(RESERVED_ROWS).max(1).min(world_h.max(1));

        let (cx, cy) = player_cell(w);
        let view = (w.current_level, w.phase);
        if self.last_view != Some(view) && w.phase == Phase::Countdown {
            self.camera.center_on(cx, cy, world_w, world_h);
        } else {
            self.camera.follow(cx, cy, world_w, world_h);
        }
        self.last_view = Some(view);
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut cursor_at: Option<(usize, usize)> = None;

        queue!(self.writer, SetForegroundColor(last_fg), SetBackgroundColor(last_bg))?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    continue;
                }
                if cursor_at != Some((x, y)) {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.ch))?;
                cursor_at = Some((x + 1, y));
            }
        }

        self.writer.flush()
    }

    // ── Compose ──

    fn compose_hud(&mut self, w: &WorldState) {
        let bar = Color::Rgb { r: 20, g: 20, b: 60 };
        let best = w.best_time_ms.map(format_ms).unwrap_or_else(|| "--:--.---".into());
        // Hold the finishing time on screen while the completion message is up.
        let shown = match (w.phase, w.last_run_ms) {
            (Phase::Completing, Some(ms)) => ms,
            _ => w.run_time_ms as u64,
        };
        let hud = format!(
            " {}/{} {:<20} World:{:<5}  Time {}  Best {} ",
            w.current_level + 1,
            w.levels.len(),
            w.level.name,
            w.current_world.name().to_uppercase(),
            format_ms(shown),
            best,
        );
        self.front.fill_row(HUD_ROW, bar);
        self.front.put_str(0, HUD_ROW, &hud, Color::White, bar);
    }

    fn compose_arena(&mut self, w: &WorldState) {
        let pal = palette(w.current_world);
        let cam = self.camera.clone();

        for vy in 0..cam.view_h {
            let row = MAP_ROW + vy;
            if row >= self.front.height { break; }
            for vx in 0..cam.view_w {
                if vx >= self.front.width { break; }
                let cx = cam.x + vx as i32;
                let cy = cam.y + vy as i32;
                let cell = arena_cell(w, &pal, cx, cy);
                self.front.set(vx, row, cell);
            }
        }
    }

    fn compose_overlay(&mut self, w: &WorldState) {
        let text = match w.phase {
            Phase::Countdown => match w.countdown_value() {
                Some(v) => format!("  {}  ", v),
                None => return,
            },
            Phase::Running | Phase::Completing => return,
        };
        let row = MAP_ROW + self.camera.view_h / 2;
        let col = self.camera.view_w.saturating_sub(text.len()) / 2;
        self.front.put_str(col, row, &text, Color::Black, Color::Rgb { r: 230, g: 230, b: 230 });
    }

    fn compose_footer(&mut self, w: &WorldState) {
        let msg_row = MAP_ROW + self.camera.view_h;
        if !w.message.is_empty() && msg_row < self.front.height {
            let bar = Color::Rgb { r: 200, g: 180, b: 50 };
            self.front.fill_row(msg_row, bar);
            self.front.put_str(0, msg_row, &format!(" {} ", w.message), Color::Black, bar);
        }

        let help_row = msg_row + 1;
        if help_row < self.front.height {
            let help = " A/D:Move  W/Space:Jump  S/X:Swap  R:Reset  1-9:Level  Q:Quit";
            self.front.put_str(0, help_row, help, Color::DarkGrey, Cell::BASE_BG);
        }
    }
}

/// Cell coordinate of the player's center.
fn player_cell(w: &WorldState) -> (i32, i32) {
    let p = &w.player;
    (
        ((p.x + p.w / 2.0) / CELL_PX_W).floor() as i32,
        ((p.y + p.h / 2.0) / CELL_PX_H).floor() as i32,
    )
}

/// What to draw for the arena cell `(cx, cy)`. Priority: player, exit,
/// hazard, mover, platform, other-world outline.
fn arena_cell(w: &WorldState, pal: &Palette, cx: i32, cy: i32) -> Cell {
    let area = Rect::new(cx as f64 * CELL_PX_W, cy as f64 * CELL_PX_H, CELL_PX_W, CELL_PX_H);
    if area.x < 0.0 || area.y < 0.0 || area.x >= w.level.width || area.y >= w.level.height {
        return Cell::BLANK;
    }
    let active = w.current_world;

    if overlaps(&area, &w.player.rect()) {
        return Cell::new('@', Color::White, pal.bg);
    }
    for d in &w.level.doors {
        if d.world.active_in(active) && overlaps(&area, &d.rect) {
            return match d.kind {
                DoorKind::Exit => Cell::new('▯', Color::Green, pal.bg),
                DoorKind::Decorative => Cell::new('▯', Color::DarkGrey, pal.bg),
            };
        }
    }
    for h in &w.level.hazards {
        if h.world.active_in(active) && overlaps(&area, &h.rect) {
            return Cell::new('^', Color::Red, pal.bg);
        }
    }
    for m in &w.level.movers {
        if m.world.active_in(active) && overlaps(&area, &m.rect) {
            return Cell::new('=', pal.mover, pal.bg);
        }
    }
    for p in &w.level.platforms {
        if p.world.active_in(active) && overlaps(&area, &p.rect) {
            return Cell::new('█', pal.solid, pal.bg);
        }
    }

    let ghost = w.level.platforms.iter().any(|p| overlaps(&area, &p.rect))
        || w.level.movers.iter().any(|m| overlaps(&area, &m.rect));
    if ghost {
        return Cell::new('░', pal.ghost, pal.bg);
    }
    Cell::new(' ', Color::White, pal.bg)
}
