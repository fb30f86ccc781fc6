//! Chart renderer registry
//!
//! Maps a chart-type tag to a rendering component. The registry is an
//! explicit object built at startup and passed to whoever renders; there is
//! no process-wide mutable state. Unknown tags and empty shaped data render
//! visible placeholders, never a crash.

use std::collections::HashMap;

use vizql_spec::{ChartConfig, ChartType};
use vizql_transform::ProcessedChartData;

mod charts;
pub mod svg;

pub use charts::{
    AreaRenderer, BarRenderer, FunnelRenderer, HeatmapRenderer, LineRenderer, PieRenderer,
    RadarRenderer, ScatterRenderer,
};

/// A rendering component: a pure presentational consumer of transformed
/// chart data producing SVG markup.
pub trait Renderer: Send + Sync {
    fn render(&self, data: &ProcessedChartData, config: &ChartConfig) -> String;
}

pub struct RendererRegistry {
    renderers: HashMap<String, Box<dyn Renderer>>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self {
            renderers: HashMap::new(),
        }
    }

    /// Registry with the eight built-in chart types.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ChartType::Bar.as_str(), Box::new(BarRenderer));
        registry.register(ChartType::Line.as_str(), Box::new(LineRenderer));
        registry.register(ChartType::Pie.as_str(), Box::new(PieRenderer));
        registry.register(ChartType::Scatter.as_str(), Box::new(ScatterRenderer));
        registry.register(ChartType::Area.as_str(), Box::new(AreaRenderer));
        registry.register(ChartType::Heatmap.as_str(), Box::new(HeatmapRenderer));
        registry.register(ChartType::Radar.as_str(), Box::new(RadarRenderer));
        registry.register(ChartType::Funnel.as_str(), Box::new(FunnelRenderer));
        registry
    }

    /// Extension point for new chart types.
    pub fn register(&mut self, tag: impl Into<String>, renderer: Box<dyn Renderer>) {
        self.renderers.insert(tag.into(), renderer);
    }

    pub fn supports(&self, tag: &str) -> bool {
        self.renderers.contains_key(tag)
    }

    /// Render `data` with the component registered for `tag`.
    ///
    /// An unregistered tag yields an "unsupported" placeholder; empty
    /// shaped data yields a "no data" placeholder.
    pub fn render(&self, tag: &str, data: &ProcessedChartData, config: &ChartConfig) -> String {
        let renderer = match self.renderers.get(tag) {
            Some(renderer) => renderer,
            None => return placeholder::unsupported(tag, config),
        };
        if data.shaped.is_empty() {
            return placeholder::no_data(config);
        }
        renderer.render(data, config)
    }
}

impl Default for RendererRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Placeholder documents for the terminal non-chart states.
pub mod placeholder {
    use vizql_spec::ChartConfig;

    use crate::svg::SvgDoc;

    const WIDTH: u32 = 640;
    const HEIGHT: u32 = 400;

    fn message(config: &ChartConfig, text: &str) -> String {
        let mut doc = SvgDoc::new(WIDTH, config.height.unwrap_or(HEIGHT));
        if !config.title.is_empty() {
            let x = doc.width() / 2.0;
            doc.text(x, 24.0, "middle", 16, &config.title);
        }
        let (cx, cy) = (doc.width() / 2.0, doc.height() / 2.0);
        doc.text(cx, cy, "middle", 14, text);
        doc.finish()
    }

    pub fn no_data(config: &ChartConfig) -> String {
        message(config, "no data")
    }

    pub fn unsupported(tag: &str, config: &ChartConfig) -> String {
        message(config, &format!("chart type not supported: {tag}"))
    }
}
