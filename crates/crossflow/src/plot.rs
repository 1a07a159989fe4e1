use crossflow_lib::{Section, Track, TrackImage};

/// Configuration for one overlay render.
///
/// An explicit, immutable record: construct with `PlotOptions::default()` and
/// override fields as needed. Defaults are fixed values, never shared state.
#[derive(Clone, Debug, PartialEq)]
pub struct PlotOptions {
    /// Vehicle classes included in the plot.
    pub filter_classes: Vec<String>,
    /// Tracks spanning fewer frames than this are skipped.
    pub num_min_frames: u32,
    /// Start of the plotted time window; `None` means open.
    pub start_time: Option<String>,
    /// End of the plotted time window.
    pub end_time: String,
    /// Mark the start and end point of each track.
    pub start_end: bool,
    /// Draw the section overlays.
    pub plot_sections: bool,
    /// Overlay transparency.
    pub alpha: f64,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            filter_classes: ["car", "motorcycle", "person", "truck", "bicycle", "train"]
                .map(str::to_owned)
                .into(),
            num_min_frames: 30,
            start_time: None,
            end_time: "2022-09-15 07:05:00".to_owned(),
            start_end: true,
            plot_sections: true,
            alpha: 0.1,
        }
    }
}

/// External overlay renderer.
///
/// Implementations draw the given tracks and sections onto a transparent
/// image of exactly `width` by `height` pixels.
pub trait TrackPlotter<I: TrackImage> {
    fn plot(
        &self,
        tracks: &[Track],
        sections: &[Section],
        width: u32,
        height: u32,
        options: &PlotOptions,
    ) -> I;
}

#[cfg(test)]
mod tests {
    use super::PlotOptions;

    #[test]
    fn documented_defaults() {
        let options = PlotOptions::default();
        assert_eq!(
            options.filter_classes,
            ["car", "motorcycle", "person", "truck", "bicycle", "train"]
        );
        assert_eq!(options.num_min_frames, 30);
        assert_eq!(options.start_time, None);
        assert_eq!(options.end_time, "2022-09-15 07:05:00");
        assert!(options.start_end);
        assert!(options.plot_sections);
        assert_eq!(options.alpha, 0.1);
    }
}
