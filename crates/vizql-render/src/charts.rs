//! Built-in SVG renderers, one per chart type.
//!
//! Renderers are pure consumers of `ProcessedChartData`: all shaping has
//! already happened, so each renderer only maps its shape onto geometry.

use std::f64::consts::PI;

use vizql_spec::{ChartConfig, ScalarValue};
use vizql_transform::{
    format_value, CategoryRow, ProcessedChartData, ShapedData, ValueFormat,
};

use crate::svg::SvgDoc;
use crate::{placeholder, Renderer};

const WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 400;
const PAD: f64 = 48.0;

const PALETTE: [&str; 8] = [
    "#5b8ff9", "#5ad8a6", "#5d7092", "#f6bd16", "#e8684a", "#6dc8ec", "#9270ca", "#ff9d4d",
];

fn color_at(config: &ChartConfig, index: usize) -> String {
    if config.colors.is_empty() {
        PALETTE[index % PALETTE.len()].to_string()
    } else {
        config.colors[index % config.colors.len()].clone()
    }
}

fn frame(config: &ChartConfig) -> SvgDoc {
    let mut doc = SvgDoc::new(WIDTH, config.height.unwrap_or(DEFAULT_HEIGHT));
    if !config.title.is_empty() {
        let x = doc.width() / 2.0;
        doc.text(x, 24.0, "middle", 16, &config.title);
    }
    doc
}

fn plot_area(doc: &SvgDoc) -> (f64, f64) {
    (doc.width() - 2.0 * PAD, doc.height() - 2.0 * PAD)
}

fn column_max(rows: &[CategoryRow]) -> f64 {
    rows.iter()
        .flat_map(|r| r.columns.iter().map(|c| c.value))
        .fold(0.0_f64, f64::max)
        .max(f64::EPSILON)
}

fn axes(doc: &mut SvgDoc) {
    let (w, h) = plot_area(doc);
    doc.line(PAD, PAD + h, PAD + w, PAD + h, "#999");
    doc.line(PAD, PAD, PAD, PAD + h, "#999");
}

pub struct BarRenderer;

impl Renderer for BarRenderer {
    fn render(&self, data: &ProcessedChartData, config: &ChartConfig) -> String {
        match &data.shaped {
            ShapedData::Category { rows } => {
                let mut doc = frame(config);
                let (w, h) = plot_area(&doc);
                axes(&mut doc);
                let max = column_max(rows);
                let slot = w / rows.len() as f64;
                for (i, row) in rows.iter().enumerate() {
                    let n = row.columns.len().max(1) as f64;
                    let bar_w = (slot * 0.8) / n;
                    for (j, col) in row.columns.iter().enumerate() {
                        let bar_h = col.value / max * h;
                        let x = PAD + slot * i as f64 + slot * 0.1 + bar_w * j as f64;
                        let y = PAD + h - bar_h;
                        doc.rect(x, y, bar_w, bar_h, &color_at(config, j), 1.0);
                    }
                    let label_x = PAD + slot * (i as f64 + 0.5);
                    doc.text(label_x, PAD + h + 16.0, "middle", 11, &row.category.label());
                    if row.columns.len() == 1 {
                        let value = ScalarValue::Float(row.columns[0].value);
                        let y = PAD + h - row.columns[0].value / max * h - 4.0;
                        doc.text(label_x, y, "middle", 10, &format_value(&value, ValueFormat::Number));
                    }
                }
                doc.finish()
            }
            ShapedData::Stacked { categories } => {
                let mut doc = frame(config);
                let (w, h) = plot_area(&doc);
                axes(&mut doc);
                let max = categories
                    .iter()
                    .map(|c| c.layers.iter().map(|l| l.value).sum::<f64>())
                    .fold(0.0_f64, f64::max)
                    .max(f64::EPSILON);
                let slot = w / categories.len() as f64;
                for (i, cat) in categories.iter().enumerate() {
                    let x = PAD + slot * i as f64 + slot * 0.1;
                    for (j, layer) in cat.layers.iter().enumerate() {
                        let y0 = PAD + h - layer.baseline / max * h;
                        let seg_h = layer.value / max * h;
                        doc.rect(x, y0 - seg_h, slot * 0.8, seg_h, &color_at(config, j), 1.0);
                    }
                    doc.text(
                        PAD + slot * (i as f64 + 0.5),
                        PAD + h + 16.0,
                        "middle",
                        11,
                        &cat.category.label(),
                    );
                }
                doc.finish()
            }
            _ => placeholder::no_data(config),
        }
    }
}

fn category_points(rows: &[CategoryRow], column: usize, w: f64, h: f64, max: f64) -> Vec<(f64, f64)> {
    let step = if rows.len() > 1 {
        w / (rows.len() - 1) as f64
    } else {
        0.0
    };
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let value = row.columns.get(column).map(|c| c.value).unwrap_or(0.0);
            (PAD + step * i as f64, PAD + h - value / max * h)
        })
        .collect()
}

fn column_names(rows: &[CategoryRow]) -> Vec<String> {
    rows.first()
        .map(|r| r.columns.iter().map(|c| c.name.clone()).collect())
        .unwrap_or_default()
}

pub struct LineRenderer;

impl Renderer for LineRenderer {
    fn render(&self, data: &ProcessedChartData, config: &ChartConfig) -> String {
        let rows = match &data.shaped {
            ShapedData::Category { rows } => rows,
            _ => return placeholder::no_data(config),
        };
        let mut doc = frame(config);
        let (w, h) = plot_area(&doc);
        axes(&mut doc);
        let max = column_max(rows);
        for (j, name) in column_names(rows).iter().enumerate() {
            let points = category_points(rows, j, w, h, max);
            doc.polyline(&points, &color_at(config, j));
            if let Some(last) = points.last() {
                doc.text(last.0 + 4.0, last.1, "start", 10, name);
            }
        }
        for (i, row) in rows.iter().enumerate() {
            let step = if rows.len() > 1 {
                w / (rows.len() - 1) as f64
            } else {
                0.0
            };
            doc.text(
                PAD + step * i as f64,
                PAD + h + 16.0,
                "middle",
                11,
                &row.category.label(),
            );
        }
        doc.finish()
    }
}

pub struct AreaRenderer;

impl Renderer for AreaRenderer {
    fn render(&self, data: &ProcessedChartData, config: &ChartConfig) -> String {
        let opacity = config.fill_opacity.unwrap_or(0.35);
        match &data.shaped {
            ShapedData::Category { rows } => {
                let mut doc = frame(config);
                let (w, h) = plot_area(&doc);
                axes(&mut doc);
                let max = column_max(rows);
                for (j, _name) in column_names(rows).iter().enumerate() {
                    let mut points = category_points(rows, j, w, h, max);
                    doc.polyline(&points, &color_at(config, j));
                    if let (Some(first), Some(last)) = (points.first().copied(), points.last().copied()) {
                        points.push((last.0, PAD + h));
                        points.push((first.0, PAD + h));
                        doc.polygon(&points, &color_at(config, j), opacity, "none");
                    }
                }
                doc.finish()
            }
            // Stacked cumulative bands: layer k fills between its baseline
            // and baseline + value, in series order.
            ShapedData::Stacked { categories } => {
                let mut doc = frame(config);
                let (w, h) = plot_area(&doc);
                axes(&mut doc);
                let max = categories
                    .iter()
                    .map(|c| c.layers.iter().map(|l| l.value).sum::<f64>())
                    .fold(0.0_f64, f64::max)
                    .max(f64::EPSILON);
                let step = if categories.len() > 1 {
                    w / (categories.len() - 1) as f64
                } else {
                    0.0
                };
                let layer_count = categories.first().map(|c| c.layers.len()).unwrap_or(0);
                for j in 0..layer_count {
                    let mut band: Vec<(f64, f64)> = Vec::new();
                    for (i, cat) in categories.iter().enumerate() {
                        let top = cat.layers[j].baseline + cat.layers[j].value;
                        band.push((PAD + step * i as f64, PAD + h - top / max * h));
                    }
                    for (i, cat) in categories.iter().enumerate().rev() {
                        let bottom = cat.layers[j].baseline;
                        band.push((PAD + step * i as f64, PAD + h - bottom / max * h));
                    }
                    doc.polygon(&band, &color_at(config, j), opacity, "none");
                }
                doc.finish()
            }
            _ => placeholder::no_data(config),
        }
    }
}

pub struct PieRenderer;

impl Renderer for PieRenderer {
    fn render(&self, data: &ProcessedChartData, config: &ChartConfig) -> String {
        let slices = match &data.shaped {
            ShapedData::Pie { slices } => slices,
            _ => return placeholder::no_data(config),
        };
        let mut doc = frame(config);
        let cx = doc.width() / 2.0;
        let cy = doc.height() / 2.0 + 10.0;
        let r = (doc.height() / 2.0 - PAD).max(40.0);

        let mut angle = -PI / 2.0;
        for (i, slice) in slices.iter().enumerate() {
            let sweep = slice.percentage * 2.0 * PI;
            let end = angle + sweep;
            let (x1, y1) = (cx + r * angle.cos(), cy + r * angle.sin());
            let (x2, y2) = (cx + r * end.cos(), cy + r * end.sin());
            let large_arc = i32::from(sweep > PI);
            let d = format!(
                "M {cx:.1} {cy:.1} L {x1:.1} {y1:.1} \
                 A {r:.1} {r:.1} 0 {large_arc} 1 {x2:.1} {y2:.1} Z"
            );
            doc.path(&d, &color_at(config, i), 1.0);

            // Labels only on slices wide enough to hold them.
            if slice.percentage > 0.05 {
                let mid = angle + sweep / 2.0;
                let lx = cx + r * 0.65 * mid.cos();
                let ly = cy + r * 0.65 * mid.sin();
                let pct = format_value(&ScalarValue::Float(slice.percentage), ValueFormat::Percent);
                doc.text(lx, ly, "middle", 11, &format!("{} {}", slice.name, pct));
            }
            angle = end;
        }
        doc.finish()
    }
}

pub struct ScatterRenderer;

impl Renderer for ScatterRenderer {
    fn render(&self, data: &ProcessedChartData, config: &ChartConfig) -> String {
        let groups = match &data.shaped {
            ShapedData::Scatter { groups } => groups,
            _ => return placeholder::no_data(config),
        };
        let mut doc = frame(config);
        let (w, h) = plot_area(&doc);
        axes(&mut doc);

        let all: Vec<(f64, f64, Option<f64>)> = groups
            .iter()
            .flat_map(|g| g.points.iter())
            .enumerate()
            .map(|(i, p)| (p.x.as_f64().unwrap_or(i as f64), p.y, p.size))
            .collect();
        let (x_min, x_max) = bounds(all.iter().map(|p| p.0));
        let (y_min, y_max) = bounds(all.iter().map(|p| p.1));

        let mut cursor = 0;
        for (gi, group) in groups.iter().enumerate() {
            for _ in 0..group.points.len() {
                let (x, y, size) = all[cursor];
                cursor += 1;
                let px = PAD + (x - x_min) / (x_max - x_min).max(f64::EPSILON) * w;
                let py = PAD + h - (y - y_min) / (y_max - y_min).max(f64::EPSILON) * h;
                doc.circle(px, py, size.unwrap_or(5.0), &color_at(config, gi), 0.8);
            }
            if let Some(name) = &group.name {
                doc.text(PAD + 8.0, PAD + 14.0 * (gi as f64 + 1.0), "start", 11, name);
            }
        }
        doc.finish()
    }
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

pub struct HeatmapRenderer;

impl Renderer for HeatmapRenderer {
    fn render(&self, data: &ProcessedChartData, config: &ChartConfig) -> String {
        let grid = match &data.shaped {
            ShapedData::Heatmap(grid) => grid,
            _ => return placeholder::no_data(config),
        };
        let mut doc = frame(config);
        let (w, h) = plot_area(&doc);
        let cell_w = w / grid.x_values.len().max(1) as f64;
        let cell_h = h / grid.y_values.len().max(1) as f64;
        let max = grid
            .cells
            .iter()
            .map(|c| c.value)
            .fold(0.0_f64, f64::max)
            .max(f64::EPSILON);

        for cell in &grid.cells {
            let x = PAD + cell.x as f64 * cell_w;
            let y = PAD + cell.y as f64 * cell_h;
            doc.rect(x, y, cell_w - 1.0, cell_h - 1.0, &color_at(config, 0), cell.value / max);
        }
        for (i, x_value) in grid.x_values.iter().enumerate() {
            doc.text(
                PAD + (i as f64 + 0.5) * cell_w,
                PAD + h + 16.0,
                "middle",
                11,
                &x_value.label(),
            );
        }
        for (j, y_value) in grid.y_values.iter().enumerate() {
            doc.text(
                PAD - 6.0,
                PAD + (j as f64 + 0.5) * cell_h,
                "end",
                11,
                &y_value.label(),
            );
        }
        doc.finish()
    }
}

pub struct RadarRenderer;

impl Renderer for RadarRenderer {
    fn render(&self, data: &ProcessedChartData, config: &ChartConfig) -> String {
        let radar = match &data.shaped {
            ShapedData::Radar(radar) => radar,
            _ => return placeholder::no_data(config),
        };
        if radar.indicators.is_empty() {
            return placeholder::no_data(config);
        }
        let mut doc = frame(config);
        let cx = doc.width() / 2.0;
        let cy = doc.height() / 2.0 + 10.0;
        let r = (doc.height() / 2.0 - PAD).max(40.0);
        let n = radar.indicators.len();
        let angle_of = |k: usize| -PI / 2.0 + 2.0 * PI * k as f64 / n as f64;

        // Spokes and axis labels.
        for (k, indicator) in radar.indicators.iter().enumerate() {
            let a = angle_of(k);
            doc.line(cx, cy, cx + r * a.cos(), cy + r * a.sin(), "#ccc");
            doc.text(
                cx + (r + 14.0) * a.cos(),
                cy + (r + 14.0) * a.sin(),
                "middle",
                11,
                &indicator.name,
            );
        }
        // Reference rings.
        for ring in 1..=4 {
            let rr = r * ring as f64 / 4.0;
            let points: Vec<(f64, f64)> = (0..n)
                .map(|k| (cx + rr * angle_of(k).cos(), cy + rr * angle_of(k).sin()))
                .collect();
            doc.polygon(&points, "none", 0.0, "#ddd");
        }

        for (si, series) in radar.series.iter().enumerate() {
            let points: Vec<(f64, f64)> = radar
                .indicators
                .iter()
                .enumerate()
                .map(|(k, indicator)| {
                    let value = series.values.get(k).copied().unwrap_or(0.0);
                    let ratio = (value / indicator.max.max(f64::EPSILON)).clamp(0.0, 1.0);
                    let a = angle_of(k);
                    (cx + r * ratio * a.cos(), cy + r * ratio * a.sin())
                })
                .collect();
            let color = color_at(config, si);
            doc.polygon(&points, &color, 0.3, &color);
        }
        doc.finish()
    }
}

pub struct FunnelRenderer;

impl Renderer for FunnelRenderer {
    fn render(&self, data: &ProcessedChartData, config: &ChartConfig) -> String {
        let stages = match &data.shaped {
            ShapedData::Funnel { stages } => stages,
            _ => return placeholder::no_data(config),
        };
        let mut doc = frame(config);
        let (w, h) = plot_area(&doc);
        let max = stages
            .iter()
            .map(|s| s.value)
            .fold(0.0_f64, f64::max)
            .max(f64::EPSILON);
        let band_h = h / stages.len() as f64;
        let cx = PAD + w / 2.0;

        for (i, stage) in stages.iter().enumerate() {
            let band_w = stage.value / max * w;
            let y = PAD + band_h * i as f64;
            doc.rect(cx - band_w / 2.0, y, band_w, band_h * 0.82, &color_at(config, i), 1.0);
            let label = format!(
                "{} {}",
                stage.name,
                format_value(&ScalarValue::Float(stage.value), ValueFormat::Number)
            );
            doc.text(cx, y + band_h * 0.5, "middle", 11, &label);
        }
        doc.finish()
    }
}
