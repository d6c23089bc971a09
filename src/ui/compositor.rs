//! Frame compositor.
//!
//! Combines a brightness grid (one cell per logical pixel) with a glyph grid
//! (two terminal columns per logical pixel) and serializes the result as
//! true-color ANSI text.
//!
//! ```text
//! terminal: cols x rows
//! pixels:   width  = cols / 2,   height = rows - 1
//! glyphs:   2 * width columns,   height rows
//! ```

use thiserror::Error;
use tracing::{debug, trace};

use crate::ui::navigation::{GlyphSpan, Navigator};
use crate::ui::overlay::{Align, Component, Overlay, Overlays, Position};

/// Row separator for a raw-mode terminal
pub const ROW_SEPARATOR: &str = "\r\n";

/// Brightness painted under bordered components
pub const BORDER_SHADE: f32 = 0.5;

/// Levels above this get dark text
const FOREGROUND_FLIP_LEVEL: u8 = 128;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompositorError {
    #[error("Unknown overlay: {0:?}")]
    UnknownOverlay(String),
}

/// A component whose glyphs or border fell partly outside the grid.
///
/// Non-fatal: the overflowing cells are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutOfBounds {
    /// Index of the component in its overlay
    pub component: usize,
    pub kind: &'static str,
    /// Number of cells dropped
    pub clipped: usize,
}

/// Outcome of a successful frame build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub actions: usize,
    pub out_of_bounds: Vec<OutOfBounds>,
}

/// Text palette chosen per cell for legibility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Palette {
    /// Bright text for dark cells
    Light,
    /// Dark text for bright cells
    Dark,
}

impl Palette {
    /// SGR foreground code
    pub fn sgr(self) -> u8 {
        match self {
            Palette::Light => 97,
            Palette::Dark => 30,
        }
    }
}

/// Resolved colors of one logical pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellColor {
    /// Gray level of the background
    pub level: u8,
    pub foreground: Palette,
}

/// Map a brightness in `[0, 1)` to a gray background and a legible foreground.
pub fn cell_color(brightness: f32) -> CellColor {
    let level = (brightness * 255.0).floor().clamp(0.0, 255.0) as u8;
    let foreground = if level > FOREGROUND_FLIP_LEVEL {
        Palette::Dark
    } else {
        Palette::Light
    };
    CellColor { level, foreground }
}

/// Brightness of cell `k` in row-major order: a slow gradient stepping by 0.001
/// through `[0.001, 0.999]`.
fn seed_brightness(k: usize) -> f32 {
    0.001 * ((((k + 1) % 999) + 1) as f32)
}

/// The two grids
#[derive(Debug, Clone, PartialEq)]
struct Canvas {
    width: usize,
    height: usize,
    brightness: Vec<f32>,
    glyphs: Vec<char>,
}

impl Canvas {
    fn new(cols: u16, rows: u16) -> Self {
        let width = usize::from(cols) / 2;
        let height = usize::from(rows).saturating_sub(1);
        let mut canvas = Self {
            width,
            height,
            brightness: vec![0.0; width * height],
            glyphs: vec![' '; width * 2 * height],
        };
        canvas.reset();
        canvas
    }

    fn glyph_cols(&self) -> usize {
        self.width * 2
    }

    fn reset(&mut self) {
        for (k, cell) in self.brightness.iter_mut().enumerate() {
            *cell = seed_brightness(k);
        }
        self.glyphs.fill(' ');
    }

    /// Write text at a glyph position. Returns the number of dropped glyphs.
    fn put_text(&mut self, text: &str, col: usize, row: usize) -> usize {
        let cols = self.glyph_cols();
        let mut clipped = 0;
        for (i, ch) in text.chars().enumerate() {
            let x = col.saturating_add(i);
            if row < self.height && x < cols {
                self.glyphs[row * cols + x] = ch;
            } else {
                clipped += 1;
            }
        }
        clipped
    }

    /// Shade a rectangle of logical pixels. Returns the number of dropped cells.
    fn shade(&mut self, rows: std::ops::Range<usize>, cols: std::ops::Range<usize>) -> usize {
        let mut clipped = 0;
        for y in rows {
            for x in cols.clone() {
                if y < self.height && x < self.width {
                    self.brightness[y * self.width + x] = BORDER_SHADE;
                } else {
                    clipped += 1;
                }
            }
        }
        clipped
    }
}

/// Owns the frame buffers, the registered overlays and the focus state
#[derive(Debug, Clone)]
pub struct Compositor {
    cols: u16,
    rows: u16,
    canvas: Canvas,
    overlays: Overlays,
    navigator: Navigator,
}

impl Compositor {
    pub fn new(cols: u16, rows: u16, overlays: Overlays) -> Self {
        Self {
            cols,
            rows,
            canvas: Canvas::new(cols, rows),
            overlays,
            navigator: Navigator::new(),
        }
    }

    /// Reallocate the buffers for a new terminal size.
    ///
    /// The frame is blank until the next `build_frame`.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.cols = cols;
        self.rows = rows;
        self.canvas = Canvas::new(cols, rows);
        self.navigator.reset(false);
    }

    /// Terminal size the buffers were built for (cols, rows)
    pub fn terminal_size(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    /// Logical pixel grid size (width, height)
    pub fn dimensions(&self) -> (usize, usize) {
        (self.canvas.width, self.canvas.height)
    }

    pub fn overlay(&self, name: &str) -> Option<&Overlay> {
        self.overlays.get(name)
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn navigator_mut(&mut self) -> &mut Navigator {
        &mut self.navigator
    }

    #[cfg(test)]
    pub fn brightness_at(&self, row: usize, col: usize) -> Option<f32> {
        if row < self.canvas.height && col < self.canvas.width {
            Some(self.canvas.brightness[row * self.canvas.width + col])
        } else {
            None
        }
    }

    #[cfg(test)]
    pub fn glyph_at(&self, row: usize, col: usize) -> Option<char> {
        let cols = self.canvas.glyph_cols();
        if row < self.canvas.height && col < cols {
            Some(self.canvas.glyphs[row * cols + col])
        } else {
            None
        }
    }

    #[cfg(test)]
    /// Glyphs of one row as plain text
    pub fn row_text(&self, row: usize) -> String {
        let cols = self.canvas.glyph_cols();
        if row >= self.canvas.height {
            return String::new();
        }
        self.canvas.glyphs[row * cols..(row + 1) * cols].iter().collect()
    }

    /// Rebuild both grids and the action registry from an overlay.
    pub fn build_frame(&mut self, name: &str) -> Result<BuildReport, CompositorError> {
        let overlay = self
            .overlays
            .get(name)
            .ok_or_else(|| CompositorError::UnknownOverlay(name.to_string()))?;

        self.canvas.reset();
        self.navigator.reset(overlay.lockable);

        let mut report = BuildReport::default();
        let glyph_cols = self.canvas.glyph_cols();

        for (index, component) in overlay.components.iter().enumerate() {
            let (text, origin) = resolve(component, glyph_cols);
            let len = text.chars().count();
            let border = usize::from(component.border());

            // Boxed components are inset by the border
            let inset = border.saturating_sub(1);
            let glyph_pos = Position::new(origin.x + 2 * inset, origin.y + inset);

            if let Some(action) = component.action() {
                self.navigator.register(
                    action.clone(),
                    GlyphSpan {
                        row: glyph_pos.y,
                        col: glyph_pos.x,
                        len,
                    },
                );
            }

            let mut clipped = self.canvas.put_text(&text, glyph_pos.x, glyph_pos.y);

            let px = origin.x / 2;
            clipped += match border {
                0 => 0,
                1 => self.canvas.shade(origin.y..origin.y + 1, px..px + len / 2),
                b => {
                    if b > 2 {
                        trace!("Border level {} uses the extrapolated box rule", b);
                    }
                    let margin = 2 * (b - 1);
                    self.canvas.shade(
                        origin.y..origin.y + 2 * b - 1,
                        px..px + (len + 1) / 2 + margin,
                    )
                }
            };

            if clipped > 0 {
                report.out_of_bounds.push(OutOfBounds {
                    component: index,
                    kind: component.kind(),
                    clipped,
                });
            }
        }

        report.actions = self.navigator.registry().len();
        debug!(
            "Built overlay {:?}: {}x{}, {} action(s)",
            name, self.canvas.width, self.canvas.height, report.actions
        );
        Ok(report)
    }

    /// Serialize the current frame as one ANSI string.
    ///
    /// Each logical pixel emits its background and foreground, both glyphs and a
    /// reset. Rows are joined by [`ROW_SEPARATOR`]. The focused button is drawn in
    /// reverse video.
    pub fn render(&self) -> String {
        let Canvas {
            width,
            height,
            ref brightness,
            ref glyphs,
        } = self.canvas;
        let glyph_cols = width * 2;
        let focus = self.navigator.focused_span();

        let mut frame = String::with_capacity(width * height * 40);
        for row in 0..height {
            if row > 0 {
                frame.push_str(ROW_SEPARATOR);
            }
            for px in 0..width {
                let color = cell_color(brightness[row * width + px]);
                frame.push_str(&format!(
                    "\x1b[48;2;{l};{l};{l}m\x1b[{fg}m",
                    l = color.level,
                    fg = color.foreground.sgr()
                ));
                for col in [px * 2, px * 2 + 1] {
                    let ch = glyphs[row * glyph_cols + col];
                    if focus.map_or(false, |span| span.contains(row, col)) {
                        frame.push_str("\x1b[7m");
                        frame.push(ch);
                        frame.push_str("\x1b[27m");
                    } else {
                        frame.push(ch);
                    }
                }
                frame.push_str("\x1b[0m");
            }
        }
        frame
    }
}

/// Text and unshifted origin of a component.
fn resolve(component: &Component, glyph_cols: usize) -> (String, Position) {
    match component {
        Component::StaticText { text, pos } | Component::Button { text, pos, .. } => {
            (text.clone(), *pos)
        }
        Component::DynamicText { source, pos } | Component::DynamicButton { source, pos, .. } => {
            (source(), *pos)
        }
        Component::TextInput { source, pos, .. } => (format!("{}_", source()), *pos),
        Component::AlignedText { text, align, row } => {
            let len = text.chars().count();
            let x = match align {
                Align::Left => 0,
                Align::Right => glyph_cols.saturating_sub(len),
                Align::Center => glyph_cols.saturating_sub(len) / 2,
            };
            (text.clone(), Position::new(x, *row))
        }
    }
}
