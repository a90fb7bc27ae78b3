use ratatui::style::{Color, Modifier, Style};

/// Colors for every view. Built once at startup and handed to the render
/// functions.
#[derive(Debug, Clone)]
pub struct Theme {
    pub name: &'static str,
    pub fg: Color,
    pub muted: Color,
    pub accent: Color,
    pub user: Color,
    pub assistant: Color,
    pub system: Color,
    pub error: Color,
    pub border: Color,
    pub focus_border: Color,
    pub editing_border: Color,
    pub highlight_bg: Color,
    pub highlight_fg: Color,
    pub header_bg: Color,
    pub code_fg: Color,
    pub code_bg: Color,
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            name: "dark",
            fg: Color::Rgb(220, 228, 238),
            muted: Color::DarkGray,
            accent: Color::Cyan,
            user: Color::Rgb(74, 158, 255),
            assistant: Color::Rgb(255, 107, 107),
            system: Color::Yellow,
            error: Color::Red,
            border: Color::DarkGray,
            focus_border: Color::Cyan,
            editing_border: Color::Yellow,
            highlight_bg: Color::Blue,
            highlight_fg: Color::White,
            header_bg: Color::Rgb(45, 45, 45),
            code_fg: Color::Rgb(230, 219, 116),
            code_bg: Color::Rgb(31, 31, 31),
        }
    }

    pub fn light() -> Self {
        Self {
            name: "light",
            fg: Color::Rgb(26, 26, 26),
            muted: Color::Gray,
            accent: Color::Blue,
            user: Color::Rgb(30, 100, 200),
            assistant: Color::Rgb(200, 60, 60),
            system: Color::Rgb(150, 110, 0),
            error: Color::Red,
            border: Color::Gray,
            focus_border: Color::Blue,
            editing_border: Color::Rgb(200, 130, 0),
            highlight_bg: Color::Rgb(200, 220, 255),
            highlight_fg: Color::Black,
            header_bg: Color::Rgb(230, 230, 230),
            code_fg: Color::Rgb(120, 40, 140),
            code_bg: Color::Rgb(240, 240, 240),
        }
    }

    pub fn by_name(name: &str) -> Self {
        match name {
            "light" => Self::light(),
            _ => Self::dark(),
        }
    }

    pub fn text(&self) -> Style {
        Style::default().fg(self.fg)
    }

    pub fn dim(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn code(&self) -> Style {
        Style::default().fg(self.code_fg).bg(self.code_bg)
    }

    pub fn label(&self, color: Color) -> Style {
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }

    pub fn highlight(&self) -> Style {
        Style::default()
            .bg(self.highlight_bg)
            .fg(self.highlight_fg)
            .add_modifier(Modifier::BOLD)
    }

    pub fn border(&self, focused: bool) -> Style {
        Style::default().fg(if focused { self.focus_border } else { self.border })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_name_falls_back_to_dark() {
        assert_eq!(Theme::by_name("light").name, "light");
        assert_eq!(Theme::by_name("solarized").name, "dark");
    }
}
