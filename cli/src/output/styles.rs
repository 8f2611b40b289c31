//! Terminal palette for human output.

use owo_colors::Style;

/// Named styles, plain until [`Styles::colorize`] is called.
#[derive(Default, Clone)]
pub struct Styles {
    pub success: Style,
    pub warning: Style,
    pub error: Style,
    pub info: Style,
    /// Command templates and other secondary detail.
    pub dim: Style,
    pub header: Style,
    /// Stage names heading each blueprint group.
    pub stage: Style,
}

impl Styles {
    /// Switch every entry to its colored form.
    pub fn colorize(&mut self) {
        *self = Self {
            success: Style::new().green(),
            warning: Style::new().yellow(),
            error: Style::new().red(),
            info: Style::new().blue(),
            dim: Style::new().dimmed(),
            header: Style::new().bold().cyan(),
            stage: Style::new().bold().truecolor(26, 107, 160),
        };
    }
}
