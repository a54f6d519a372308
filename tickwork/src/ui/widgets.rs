//! View models the host renders. They hold plain values and are only ever
//! touched on the UI thread, through a `UiLoop` binding.

use tickwork_api::Widget;

use crate::ui::progress::Progress;

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressBar {
    pub progress: Progress,
    pub show_percentage: bool,
    pub show_values: bool,
}

impl Default for ProgressBar {
    fn default() -> Self {
        Self {
            progress: Progress::default(),
            show_percentage: true,
            show_values: false,
        }
    }
}

impl ProgressBar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(mut self, show_values: bool) -> Self {
        self.show_values = show_values;
        self
    }

    pub fn with_percentage(mut self, show_percentage: bool) -> Self {
        self.show_percentage = show_percentage;
        self
    }

    /// Caption drawn on the bar, e.g. `"Loading 40% (4/10)"`.
    pub fn display_text(&self) -> String {
        let mut text = self.progress.text.clone();
        if self.show_percentage {
            text.push_str(&format!(" {}%", self.progress.percent()));
        }
        if self.show_values {
            text.push_str(&format!(
                " ({}/{})",
                self.progress.current, self.progress.max
            ));
        }
        text.trim_start().to_string()
    }
}

impl Widget<Progress> for ProgressBar {
    fn apply(&mut self, value: &Progress) {
        self.progress = value.clone();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Label {
    pub text: String,
}

impl Label {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Widget<String> for Label {
    fn apply(&mut self, value: &String) {
        self.text.clone_from(value);
    }
}
