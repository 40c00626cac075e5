//! Presentation adapter boundary.
//!
//! The state machine never draws anything itself: it emits
//! [`PresentationEvent`]s and the adapter decides what they look like. The
//! adapter also dictates the control loop's inter-tick holdoff, because
//! redraw scheduling is a display concern, not a network one.

use std::time::Duration;

/// Output events the state machine sends toward the display surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationEvent {
    /// Replace the display content with a status message.
    ShowMessage(&'static str),
    /// Replace the status message with the toggle widget.
    ShowToggle,
    /// Set the toggle widget's on/off position.
    SetToggle(bool),
    /// Set the link indicator in the status bar.
    SetLinkIcon(bool),
}

/// Receives presentation events and paces the control loop.
pub trait Presenter: Send {
    fn present(&mut self, event: PresentationEvent);

    /// How long the control loop should sleep between ticks.
    fn holdoff(&self) -> Duration {
        Duration::from_millis(100)
    }
}

/// Renders the display surface as terminal status lines.
#[derive(Debug)]
pub struct TerminalPanel {
    holdoff: Duration,
}

impl TerminalPanel {
    pub fn new() -> Self {
        Self {
            holdoff: Duration::from_millis(100),
        }
    }
}

impl Default for TerminalPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl Presenter for TerminalPanel {
    fn present(&mut self, event: PresentationEvent) {
        match event {
            PresentationEvent::ShowMessage(text) => {
                println!("[display] {}", text.replace('\n', " "));
            }
            PresentationEvent::ShowToggle => {
                println!("[display] <toggle widget>");
            }
            PresentationEvent::SetToggle(on) => {
                println!("[display] toggle: {}", if on { "ON" } else { "OFF" });
            }
            PresentationEvent::SetLinkIcon(up) => {
                println!("[display] link icon: {}", if up { "up" } else { "down" });
            }
        }
    }

    fn holdoff(&self) -> Duration {
        self.holdoff
    }
}
