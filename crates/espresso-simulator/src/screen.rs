//! OLED stand-in.
//!
//! Frames go through the core [`CanvasScreen`] into a 128x64
//! `SimulatorDisplay`. With the `window` feature the display is shown in an
//! SDL2 window; without it each frame's text is logged at debug level.

use std::convert::Infallible;

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics_simulator::SimulatorDisplay;
use espresso_core::display::{CanvasScreen, Line, PANEL_HEIGHT, PANEL_WIDTH, Screen};
use log::debug;

#[cfg(feature = "window")]
use embedded_graphics_simulator::{
    BinaryColorTheme, OutputSettingsBuilder, SimulatorEvent, Window, sdl2::Keycode,
};

/// Pixel scale factor for the simulator window.
#[cfg(feature = "window")]
const WINDOW_SCALE: u32 = 4;

pub struct SimulatorScreen {
    canvas: CanvasScreen<SimulatorDisplay<BinaryColor>>,
    #[cfg(feature = "window")]
    window: Window,
}

impl Default for SimulatorScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatorScreen {
    pub fn new() -> Self {
        let display =
            SimulatorDisplay::<BinaryColor>::new(Size::new(PANEL_WIDTH as u32, PANEL_HEIGHT as u32));

        #[cfg(feature = "window")]
        let window = {
            let output_settings = OutputSettingsBuilder::new()
                .theme(BinaryColorTheme::OledBlue)
                .scale(WINDOW_SCALE)
                .build();
            Window::new("Espresso Machine", &output_settings)
        };

        Self {
            canvas: CanvasScreen::new(display),
            #[cfg(feature = "window")]
            window,
        }
    }

    /// Show the panel and handle window events. Closing the window or
    /// pressing Q ends the process.
    #[cfg(feature = "window")]
    fn present(&mut self) {
        self.window.update(self.canvas.panel());

        let quit = self.window.events().any(|event| match event {
            SimulatorEvent::Quit => true,
            SimulatorEvent::KeyDown { keycode, .. } => {
                keycode == Keycode::Q || keycode == Keycode::Escape
            }
            _ => false,
        });
        if quit {
            log::info!("Simulator exiting");
            std::process::exit(0);
        }
    }
}

impl Screen for SimulatorScreen {
    type Error = Infallible;

    fn render(&mut self, lines: &[Line]) -> Result<(), Infallible> {
        self.canvas.render(lines)?;
        for line in lines {
            debug!("[{:>3},{:>3}] {}", line.position.x, line.position.y, line.text);
        }

        #[cfg(feature = "window")]
        self.present();

        Ok(())
    }
}
