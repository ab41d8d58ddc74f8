/// Read-only results region. Each render replaces the whole content.
#[derive(Debug, Default, Clone)]
pub struct ResultView {
    content: String,
    scroll: u16,
}

impl ResultView {
    pub fn render(&mut self, content: impl Into<String>) {
        self.content.clear();
        self.content.push_str(&content.into());
        self.scroll = 0;
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn scroll(&self) -> u16 {
        self.scroll
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.content.lines().count().saturating_sub(1) as u16;
        self.scroll = self.scroll.saturating_add(lines).min(max);
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replaces_content() {
        let mut view = ResultView::default();
        view.render("A");
        view.render("B");
        assert_eq!(view.content(), "B");
    }

    #[test]
    fn test_render_resets_scroll() {
        let mut view = ResultView::default();
        view.render("1\n2\n3\n4");
        view.scroll_down(2);
        assert_eq!(view.scroll(), 2);
        view.render("fresh");
        assert_eq!(view.scroll(), 0);
    }

    #[test]
    fn test_scroll_is_bounded() {
        let mut view = ResultView::default();
        view.render("1\n2\n3");
        view.scroll_down(10);
        assert_eq!(view.scroll(), 2);
        view.scroll_up(10);
        assert_eq!(view.scroll(), 0);
    }
}
