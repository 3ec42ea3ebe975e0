//! Pure scroll-state derivation.

use crate::config::ScrollConfig;
use crate::dom::Section;

/// Presentation state derived from the scroll position
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrollState {
    pub navbar_scrolled: bool,
    pub back_to_top_visible: bool,
    /// None, or the id of exactly one registered section
    pub active_section_id: Option<String>,
}

/// Navbar "scrolled" flag. No hysteresis.
#[inline]
pub fn navbar_scrolled(scroll_y: f64, config: &ScrollConfig) -> bool {
    scroll_y > config.navbar_threshold
}

/// Back-to-top visibility. No hysteresis.
#[inline]
pub fn back_to_top_visible(scroll_y: f64, config: &ScrollConfig) -> bool {
    scroll_y > config.back_to_top_threshold
}

/// Last section in document order containing `scroll_y + lookahead`
pub fn active_section<'a>(sections: &'a [Section], scroll_y: f64, lookahead: f64) -> Option<&'a Section> {
    let position = scroll_y + lookahead;
    sections.iter().rev().find(|section| section.contains(position))
}

/// Full state for one scroll position
pub fn derive(scroll_y: f64, sections: &[Section], config: &ScrollConfig) -> ScrollState {
    ScrollState {
        navbar_scrolled: navbar_scrolled(scroll_y, config),
        back_to_top_visible: back_to_top_visible(scroll_y, config),
        active_section_id: active_section(sections, scroll_y, config.section_lookahead)
            .map(|section| section.id.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sections() -> Vec<Section> {
        vec![
            Section::new("a", 0.0, 100.0),
            Section::new("b", 100.0, 200.0),
            Section::new("c", 300.0, 200.0),
        ]
    }

    #[test]
    fn test_threshold_exactness() {
        let config = ScrollConfig::default();
        assert!(!navbar_scrolled(99.0, &config));
        assert!(!navbar_scrolled(100.0, &config));
        assert!(navbar_scrolled(101.0, &config));
        assert!(!back_to_top_visible(299.0, &config));
        assert!(!back_to_top_visible(300.0, &config));
        assert!(back_to_top_visible(301.0, &config));
    }

    #[test]
    fn test_active_section_selection() {
        let sections = sections();
        let active = active_section(&sections, 150.0, 100.0).map(|s| s.id.as_str());
        assert_eq!(active, Some("b"));

        // Effective 550 is past the last section
        assert_eq!(active_section(&sections, 450.0, 100.0), None);

        assert_eq!(active_section(&sections, 0.0, 100.0).map(|s| s.id.as_str()), Some("b"));
        assert_eq!(active_section(&sections, -100.0, 100.0).map(|s| s.id.as_str()), Some("a"));
    }

    #[test]
    fn test_overlapping_sections_last_match_wins() {
        let sections = vec![
            Section::new("outer", 0.0, 1000.0),
            Section::new("inner", 200.0, 100.0),
        ];
        assert_eq!(
            active_section(&sections, 150.0, 100.0).map(|s| s.id.as_str()),
            Some("inner")
        );
        assert_eq!(
            active_section(&sections, 400.0, 100.0).map(|s| s.id.as_str()),
            Some("outer")
        );
    }

    #[test]
    fn test_derive() {
        let state = derive(150.0, &sections(), &ScrollConfig::default());
        assert_eq!(
            state,
            ScrollState {
                navbar_scrolled: true,
                back_to_top_visible: false,
                active_section_id: Some("b".to_string()),
            }
        );
    }
}
