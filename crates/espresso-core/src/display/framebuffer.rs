//! Off-screen monochrome frame with change tracking.
//!
//! A whole frame is drawn here first. [`FrameBuffer::flush`] compares it
//! with the content last committed to the panel and sends the bounding box
//! of every differing pixel in one `fill_contiguous` call, so an unchanged
//! frame costs no panel I/O at all.

use alloc::vec;
use alloc::vec::Vec;
use core::convert::Infallible;

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use log::debug;

/// SH1106 panel width in pixels.
pub const PANEL_WIDTH: usize = 128;
/// SH1106 panel height in pixels.
pub const PANEL_HEIGHT: usize = 64;

/// Inclusive pixel bounds of the changed area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Changed {
    left: usize,
    top: usize,
    right: usize,
    bottom: usize,
}

impl Changed {
    fn pixel(x: usize, y: usize) -> Self {
        Self {
            left: x,
            top: y,
            right: x,
            bottom: y,
        }
    }

    fn whole_panel() -> Self {
        Self {
            left: 0,
            top: 0,
            right: PANEL_WIDTH - 1,
            bottom: PANEL_HEIGHT - 1,
        }
    }

    fn include(&mut self, x: usize, y: usize) {
        self.left = self.left.min(x);
        self.top = self.top.min(y);
        self.right = self.right.max(x);
        self.bottom = self.bottom.max(y);
    }

    fn width(&self) -> usize {
        self.right - self.left + 1
    }

    fn height(&self) -> usize {
        self.bottom - self.top + 1
    }
}

/// `DrawTarget` over a RAM copy of the panel.
pub struct FrameBuffer {
    pixels: Vec<BinaryColor>,
    /// Content the panel holds after the last successful flush. `None`
    /// until then, as the panel's power-on content is unknown.
    committed: Option<Vec<BinaryColor>>,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    /// A blank frame. The first flush always covers the whole panel.
    pub fn new() -> Self {
        Self {
            pixels: vec![BinaryColor::Off; PANEL_WIDTH * PANEL_HEIGHT],
            committed: None,
        }
    }

    /// True when the next flush would send anything.
    pub fn is_dirty(&self) -> bool {
        self.changed().is_some()
    }

    /// Bounds of every pixel that differs from the committed content.
    fn changed(&self) -> Option<Changed> {
        let Some(committed) = &self.committed else {
            return Some(Changed::whole_panel());
        };

        let mut changed: Option<Changed> = None;
        let differing = self
            .pixels
            .iter()
            .zip(committed)
            .enumerate()
            .filter(|(_, (drawn, shown))| drawn != shown);
        for (idx, _) in differing {
            let (x, y) = (idx % PANEL_WIDTH, idx / PANEL_WIDTH);
            match &mut changed {
                Some(changed) => changed.include(x, y),
                None => changed = Some(Changed::pixel(x, y)),
            }
        }
        changed
    }

    fn set(&mut self, x: usize, y: usize, color: BinaryColor) {
        self.pixels[y * PANEL_WIDTH + x] = color;
    }

    /// Send the changed area to `panel`. The frame only counts as committed
    /// once the panel accepted it, so a failed flush is retried in full by
    /// the next one.
    pub fn flush<D>(&mut self, panel: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        let Some(changed) = self.changed() else {
            return Ok(());
        };

        let width = changed.width();
        debug!(
            "Flushing {}x{} at ({}, {})",
            width,
            changed.height(),
            changed.left,
            changed.top
        );

        let area = Rectangle::new(
            Point::new(changed.left as i32, changed.top as i32),
            Size::new(width as u32, changed.height() as u32),
        );
        let pixels = &self.pixels;
        let colors = (changed.top..=changed.bottom).flat_map(move |y| {
            let start = y * PANEL_WIDTH + changed.left;
            pixels[start..start + width].iter().copied()
        });
        panel.fill_contiguous(&area, colors)?;

        self.committed
            .get_or_insert_with(|| vec![BinaryColor::Off; PANEL_WIDTH * PANEL_HEIGHT])
            .copy_from_slice(&self.pixels);
        Ok(())
    }

    fn clip(point: Point) -> Option<(usize, usize)> {
        let x = usize::try_from(point.x).ok()?;
        let y = usize::try_from(point.y).ok()?;
        (x < PANEL_WIDTH && y < PANEL_HEIGHT).then_some((x, y))
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(PANEL_WIDTH as u32, PANEL_HEIGHT as u32)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if let Some((x, y)) = Self::clip(point) {
                self.set(x, y, color);
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let area = area.intersection(&self.bounding_box());
        for point in area.points() {
            if let Some((x, y)) = Self::clip(point) {
                self.set(x, y, color);
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        for y in 0..PANEL_HEIGHT {
            for x in 0..PANEL_WIDTH {
                self.set(x, y, color);
            }
        }
        Ok(())
    }
}
