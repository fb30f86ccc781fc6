//! Minimal SVG document builder shared by the chart renderers.

/// Accumulates SVG elements and closes the document on `finish`.
pub struct SvgDoc {
    width: u32,
    height: u32,
    body: String,
}

impl SvgDoc {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            body: String::new(),
        }
    }

    pub fn width(&self) -> f64 {
        self.width as f64
    }

    pub fn height(&self) -> f64 {
        self.height as f64
    }

    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, fill: &str, opacity: f64) {
        self.body.push_str(&format!(
            "<rect x=\"{x:.1}\" y=\"{y:.1}\" width=\"{w:.1}\" height=\"{h:.1}\" \
             fill=\"{fill}\" fill-opacity=\"{opacity:.2}\"/>"
        ));
    }

    pub fn circle(&mut self, cx: f64, cy: f64, r: f64, fill: &str, opacity: f64) {
        self.body.push_str(&format!(
            "<circle cx=\"{cx:.1}\" cy=\"{cy:.1}\" r=\"{r:.1}\" fill=\"{fill}\" \
             fill-opacity=\"{opacity:.2}\"/>"
        ));
    }

    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, stroke: &str) {
        self.body.push_str(&format!(
            "<line x1=\"{x1:.1}\" y1=\"{y1:.1}\" x2=\"{x2:.1}\" y2=\"{y2:.1}\" \
             stroke=\"{stroke}\" stroke-width=\"1\"/>"
        ));
    }

    pub fn polyline(&mut self, points: &[(f64, f64)], stroke: &str) {
        self.body.push_str(&format!(
            "<polyline points=\"{}\" fill=\"none\" stroke=\"{stroke}\" stroke-width=\"2\"/>",
            join_points(points)
        ));
    }

    pub fn polygon(&mut self, points: &[(f64, f64)], fill: &str, opacity: f64, stroke: &str) {
        self.body.push_str(&format!(
            "<polygon points=\"{}\" fill=\"{fill}\" fill-opacity=\"{opacity:.2}\" \
             stroke=\"{stroke}\" stroke-width=\"1\"/>",
            join_points(points)
        ));
    }

    pub fn path(&mut self, d: &str, fill: &str, opacity: f64) {
        self.body.push_str(&format!(
            "<path d=\"{d}\" fill=\"{fill}\" fill-opacity=\"{opacity:.2}\"/>"
        ));
    }

    pub fn text(&mut self, x: f64, y: f64, anchor: &str, size: u32, content: &str) {
        self.body.push_str(&format!(
            "<text x=\"{x:.1}\" y=\"{y:.1}\" text-anchor=\"{anchor}\" font-size=\"{size}\" \
             font-family=\"sans-serif\" fill=\"#333\">{}</text>",
            escape_text(content)
        ));
    }

    pub fn finish(self) -> String {
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{}\" height=\"{}\" \
             viewBox=\"0 0 {} {}\">{}</svg>",
            self.width, self.height, self.width, self.height, self.body
        )
    }
}

fn join_points(points: &[(f64, f64)]) -> String {
    points
        .iter()
        .map(|(x, y)| format!("{x:.1},{y:.1}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_shape() {
        let mut doc = SvgDoc::new(100, 50);
        doc.rect(0.0, 0.0, 10.0, 10.0, "#fff", 1.0);
        let svg = doc.finish();
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("<rect"));
    }

    #[test]
    fn test_text_escaped() {
        let mut doc = SvgDoc::new(10, 10);
        doc.text(0.0, 0.0, "middle", 12, "a < b & c");
        assert!(doc.finish().contains("a &lt; b &amp; c"));
    }
}
