//! ANSI styling for dump output and diagnostics.
//!
//! Every code is routed through [`Styler`] so the `--colours false`
//! flag can switch the whole frontend to plain text.

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const RED_FG: &str = "\x1b[31m";
pub const GREEN_FG: &str = "\x1b[32m";
pub const YELLOW_FG: &str = "\x1b[33m";
pub const BLUE_FG: &str = "\x1b[34m";
pub const MAGENTA_FG: &str = "\x1b[35m";
pub const WHITE_FG: &str = "\x1b[37m";

/// Hands out ANSI codes, or empty strings when colours are off.
#[derive(Debug, Clone, Copy)]
pub struct Styler {
    pub enabled: bool,
}

impl Styler {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    fn pick(&self, code: &'static str) -> &'static str {
        if self.enabled {
            code
        } else {
            ""
        }
    }

    pub fn reset(&self) -> &'static str {
        self.pick(RESET)
    }
    pub fn bold(&self) -> &'static str {
        self.pick(BOLD)
    }
    pub fn red(&self) -> &'static str {
        self.pick(RED_FG)
    }
    pub fn green(&self) -> &'static str {
        self.pick(GREEN_FG)
    }
    pub fn yellow(&self) -> &'static str {
        self.pick(YELLOW_FG)
    }
    pub fn blue(&self) -> &'static str {
        self.pick(BLUE_FG)
    }
    pub fn magenta(&self) -> &'static str {
        self.pick(MAGENTA_FG)
    }
    pub fn white(&self) -> &'static str {
        self.pick(WHITE_FG)
    }
}
