//! Render surface
//!
//! The controller hands a [`Screen`] the full list of [`Line`]s for a frame.
//! [`CanvasScreen`] draws them into a [`FrameBuffer`] and commits the frame
//! to the panel in one flush.

pub mod framebuffer;

pub use framebuffer::{FrameBuffer, PANEL_HEIGHT, PANEL_WIDTH};

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Debug;

use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};

/// Left margin of every line.
pub const LINE_X: i32 = 5;
/// Top of the first line.
pub const FIRST_LINE_Y: i32 = 15;
/// Vertical distance between consecutive lines.
pub const LINE_SPACING: i32 = 15;

/// A positioned piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub position: Point,
    pub text: String,
}

/// Place one message per line, top to bottom.
pub fn layout_lines<I, S>(messages: I) -> Vec<Line>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    messages
        .into_iter()
        .zip((0..).map(|i| FIRST_LINE_Y + LINE_SPACING * i))
        .map(|(text, y)| Line {
            position: Point::new(LINE_X, y),
            text: text.into(),
        })
        .collect()
}

/// A text display.
pub trait Screen {
    type Error: Debug;

    /// Replace whatever is shown with `lines`, committed as one frame.
    fn render(&mut self, lines: &[Line]) -> Result<(), Self::Error>;
}

/// Screen type of a controller without a display. It has no values, so it
/// can only ever appear as `None`.
#[derive(Debug)]
pub enum NoScreen {}

impl Screen for NoScreen {
    type Error = core::convert::Infallible;

    fn render(&mut self, _lines: &[Line]) -> Result<(), Self::Error> {
        match *self {}
    }
}

/// Monochrome panel driven through an off-screen frame.
pub struct CanvasScreen<D> {
    panel: D,
    frame: FrameBuffer,
}

impl<D> CanvasScreen<D>
where
    D: DrawTarget<Color = BinaryColor>,
{
    pub fn new(panel: D) -> Self {
        Self {
            panel,
            frame: FrameBuffer::new(),
        }
    }

    pub fn panel(&self) -> &D {
        &self.panel
    }
}

impl<D> Screen for CanvasScreen<D>
where
    D: DrawTarget<Color = BinaryColor>,
    D::Error: Debug,
{
    type Error = D::Error;

    fn render(&mut self, lines: &[Line]) -> Result<(), D::Error> {
        let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);

        // Drawing into the frame cannot fail.
        let Ok(()) = self.frame.clear(BinaryColor::Off);
        for line in lines {
            let Ok(_) = Text::with_baseline(&line.text, line.position, style, Baseline::Top)
                .draw(&mut self.frame);
        }

        self.frame.flush(&mut self.panel)
    }
}
