use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::visibility::RootMargin;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub scroll: ScrollConfig,
    #[serde(default)]
    pub rate: RateConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub menu: MenuConfig,
    #[serde(default)]
    pub reveal: RevealConfig,
    #[serde(default)]
    pub images: ImageConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Scroll-derived state thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollConfig {
    /// Navbar gets the "scrolled" marker strictly above this offset
    #[serde(default = "default_navbar_threshold")]
    pub navbar_threshold: f64,
    /// Back-to-top control becomes visible strictly above this offset
    #[serde(default = "default_back_to_top_threshold")]
    pub back_to_top_threshold: f64,
    /// Read-ahead added to the scroll offset when picking the active section
    #[serde(default = "default_section_lookahead")]
    pub section_lookahead: f64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            navbar_threshold: default_navbar_threshold(),
            back_to_top_threshold: default_back_to_top_threshold(),
            section_lookahead: default_section_lookahead(),
        }
    }
}

/// Rate limiting intervals for the scroll and resize streams
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateConfig {
    /// Throttle for navbar / back-to-top / reveal polling
    #[serde(default = "default_fast_scroll_ms")]
    pub fast_scroll_ms: u64,
    /// Throttle for active section recomputation
    #[serde(default = "default_slow_scroll_ms")]
    pub slow_scroll_ms: u64,
    /// Quiet period before a resize is handled
    #[serde(default = "default_resize_debounce_ms")]
    pub resize_debounce_ms: u64,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            fast_scroll_ms: default_fast_scroll_ms(),
            slow_scroll_ms: default_slow_scroll_ms(),
            resize_debounce_ms: default_resize_debounce_ms(),
        }
    }
}

impl RateConfig {
    pub fn fast_scroll(&self) -> Duration {
        Duration::from_millis(self.fast_scroll_ms)
    }

    pub fn slow_scroll(&self) -> Duration {
        Duration::from_millis(self.slow_scroll_ms)
    }

    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }
}

/// Easing curve for animated scrolling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EasingType {
    /// Jump at the end of the animation
    None,
    Linear,
    #[default]
    Cubic,
    Quintic,
    /// Exponential ease-out
    EaseOut,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Height of the fixed navbar subtracted from anchor targets
    #[serde(default = "default_header_offset")]
    pub header_offset: f64,
    /// Easing used when the host animates scrolling itself
    #[serde(default)]
    pub easing: EasingType,
    /// Duration of a host-animated smooth scroll (0 = jump)
    #[serde(default = "default_animation_duration")]
    pub animation_duration_ms: u64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            header_offset: default_header_offset(),
            easing: EasingType::default(),
            animation_duration_ms: default_animation_duration(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuConfig {
    /// Viewport widths above this close the mobile menu
    #[serde(default = "default_mobile_breakpoint")]
    pub mobile_breakpoint: f64,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            mobile_breakpoint: default_mobile_breakpoint(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealConfig {
    /// Selectors whose matches are prepared for reveal on window load.
    /// The stagger index restarts for every selector.
    #[serde(default = "default_reveal_selectors")]
    pub selectors: Vec<String>,
    /// Visible fraction required before a reveal fires
    #[serde(default = "default_reveal_threshold")]
    pub threshold: f64,
    /// Margin applied to the viewport when observing reveal targets
    #[serde(default = "default_reveal_root_margin")]
    pub root_margin: RootMargin,
    /// Transition delay per index within a group, in seconds
    #[serde(default = "default_stagger_secs")]
    pub stagger_secs: f64,
    /// Scroll polling fallback: reveal once the element top is this far above the viewport bottom
    #[serde(default = "default_fallback_visible_px")]
    pub fallback_visible_px: f64,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            selectors: default_reveal_selectors(),
            threshold: default_reveal_threshold(),
            root_margin: default_reveal_root_margin(),
            stagger_secs: default_stagger_secs(),
            fallback_visible_px: default_fallback_visible_px(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Source substituted for images that fail to load
    #[serde(default = "default_fallback_src")]
    pub fallback_src: String,
    /// Alt text set together with the fallback source
    #[serde(default = "default_fallback_alt")]
    pub fallback_alt: String,
    /// Document base URL used to resolve relative sources before comparing them
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            fallback_src: default_fallback_src(),
            fallback_alt: default_fallback_alt(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Minimum time the loader overlay stays up
    #[serde(default = "default_min_display")]
    pub min_display_ms: u64,
    /// Delay between fading the loader and removing it from layout
    #[serde(default = "default_removal_delay")]
    pub removal_delay_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            min_display_ms: default_min_display(),
            removal_delay_ms: default_removal_delay(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_navbar_threshold() -> f64 {
    100.0
}

fn default_back_to_top_threshold() -> f64 {
    300.0
}

fn default_section_lookahead() -> f64 {
    100.0
}

fn default_fast_scroll_ms() -> u64 {
    16 // ~60fps
}

fn default_slow_scroll_ms() -> u64 {
    100
}

fn default_resize_debounce_ms() -> u64 {
    250
}

fn default_header_offset() -> f64 {
    80.0 // navbar height
}

fn default_animation_duration() -> u64 {
    400
}

fn default_mobile_breakpoint() -> f64 {
    768.0
}

fn default_reveal_selectors() -> Vec<String> {
    [".game-card", ".server-card", ".community-card", ".tip-card"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_reveal_threshold() -> f64 {
    0.1
}

fn default_reveal_root_margin() -> RootMargin {
    RootMargin {
        top: 0.0,
        right: 0.0,
        bottom: -50.0,
        left: 0.0,
    }
}

fn default_stagger_secs() -> f64 {
    0.1
}

fn default_fallback_visible_px() -> f64 {
    150.0
}

fn default_fallback_src() -> String {
    "img/pageload-spinner.gif".to_string()
}

fn default_fallback_alt() -> String {
    "Image not available".to_string()
}

fn default_min_display() -> u64 {
    1000
}

fn default_removal_delay() -> u64 {
    500
}

impl PageConfig {
    /// Load configuration from the default location or return defaults
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty TOML
    pub fn to_toml_string(&self) -> crate::Result<String> {
        toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Get the configuration file path
    /// Always uses ~/.config/pagectl/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("pagectl")
            .join("config.toml")
    }

    fn validate(&self) -> crate::Result<()> {
        let thresholds = [
            ("scroll.navbar_threshold", self.scroll.navbar_threshold),
            ("scroll.back_to_top_threshold", self.scroll.back_to_top_threshold),
            ("scroll.section_lookahead", self.scroll.section_lookahead),
            ("navigation.header_offset", self.navigation.header_offset),
            ("menu.mobile_breakpoint", self.menu.mobile_breakpoint),
            ("reveal.stagger_secs", self.reveal.stagger_secs),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(crate::Error::Config(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.reveal.threshold) {
            return Err(crate::Error::Config(format!(
                "reveal.threshold must be within [0, 1], got {}",
                self.reveal.threshold
            )));
        }

        Ok(())
    }
}
