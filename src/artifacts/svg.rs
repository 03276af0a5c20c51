//! Minimal SVG renderer for the planned charts.
//!
//! Output is plain text assembled with `fmt::Write`, so identical requests
//! always produce byte-identical files.

use std::fmt::Write as _;

use anyhow::{Result, bail};

use crate::{
    charts::{BoxSummary, CategoryShare, ChartRequest, ChartSeries, HistogramBin},
    dataset::format_number,
};

const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 60.0;
const Y_TICKS: usize = 5;
const PALETTE: [&str; 6] = [
    "#87ceeb", "#f08080", "#90ee90", "#ffd700", "#ffa500", "#ff8c00",
];

pub fn render(request: &ChartRequest, width: u32, height: u32) -> Result<String> {
    if width as f64 <= MARGIN_LEFT + MARGIN_RIGHT || height as f64 <= MARGIN_TOP + MARGIN_BOTTOM {
        bail!("Chart canvas {width}x{height} is too small");
    }
    let mut canvas = Canvas::new(width, height, request.id.title());
    match &request.series {
        ChartSeries::Histogram { bins, density } => canvas.histogram(bins, density)?,
        ChartSeries::Boxplot(boxes) => canvas.boxplot(boxes)?,
        ChartSeries::Frequencies(shares) => canvas.frequencies(shares)?,
        ChartSeries::Means(means) => canvas.means(means)?,
    }
    Ok(canvas.finish())
}

struct Canvas {
    width: f64,
    height: f64,
    body: String,
}

impl Canvas {
    fn new(width: u32, height: u32, title: &str) -> Self {
        let mut body = String::new();
        let _ = writeln!(
            body,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}" font-family="sans-serif">"#
        );
        let _ = writeln!(body, r#"<rect width="100%" height="100%" fill="white"/>"#);
        let _ = writeln!(
            body,
            r#"<text x="{}" y="30" text-anchor="middle" font-size="18" font-weight="bold">{}</text>"#,
            width as f64 / 2.0,
            escape(title)
        );
        Self {
            width: width as f64,
            height: height as f64,
            body,
        }
    }

    fn plot_width(&self) -> f64 {
        self.width - MARGIN_LEFT - MARGIN_RIGHT
    }

    fn plot_height(&self) -> f64 {
        self.height - MARGIN_TOP - MARGIN_BOTTOM
    }

    fn baseline(&self) -> f64 {
        self.height - MARGIN_BOTTOM
    }

    fn y_for(&self, value: f64, top: f64) -> f64 {
        self.baseline() - (value / top) * self.plot_height()
    }

    fn y_axis(&mut self, low: f64, high: f64, label: &str) -> Result<()> {
        let baseline = self.baseline();
        let plot_height = self.plot_height();
        writeln!(
            self.body,
            r##"<line x1="{MARGIN_LEFT}" y1="{MARGIN_TOP}" x2="{MARGIN_LEFT}" y2="{baseline}" stroke="#333"/>"##
        )?;
        writeln!(
            self.body,
            r##"<line x1="{MARGIN_LEFT}" y1="{baseline}" x2="{}" y2="{baseline}" stroke="#333"/>"##,
            self.width - MARGIN_RIGHT
        )?;
        for tick in 0..=Y_TICKS {
            let fraction = tick as f64 / Y_TICKS as f64;
            let value = low + (high - low) * fraction;
            let y = baseline - fraction * plot_height;
            writeln!(
                self.body,
                r##"<line x1="{MARGIN_LEFT}" y1="{y:.1}" x2="{:.1}" y2="{y:.1}" stroke="#ddd"/>"##,
                self.width - MARGIN_RIGHT
            )?;
            writeln!(
                self.body,
                r#"<text x="{:.1}" y="{:.1}" text-anchor="end" font-size="11">{}</text>"#,
                MARGIN_LEFT - 6.0,
                y + 4.0,
                format_tick(value)
            )?;
        }
        writeln!(
            self.body,
            r#"<text x="18" y="{:.1}" text-anchor="middle" font-size="12" transform="rotate(-90 18 {:.1})">{}</text>"#,
            MARGIN_TOP + plot_height / 2.0,
            MARGIN_TOP + plot_height / 2.0,
            escape(label)
        )?;
        Ok(())
    }

    fn x_label(&mut self, x: f64, text: &str) -> Result<()> {
        writeln!(
            self.body,
            r#"<text x="{x:.1}" y="{:.1}" text-anchor="middle" font-size="11">{}</text>"#,
            self.baseline() + 18.0,
            escape(text)
        )?;
        Ok(())
    }

    fn bar(&mut self, x: f64, width: f64, value: f64, top: f64, fill: &str) -> Result<()> {
        let y = self.y_for(value, top);
        writeln!(
            self.body,
            r##"<rect x="{x:.1}" y="{y:.1}" width="{width:.1}" height="{:.1}" fill="{fill}" stroke="#222"/>"##,
            self.baseline() - y
        )?;
        Ok(())
    }

    fn histogram(&mut self, bins: &[HistogramBin], density: &[(f64, f64)]) -> Result<()> {
        let (Some(first), Some(last)) = (bins.first(), bins.last()) else {
            bail!("Histogram has no bins");
        };
        let (x_low, x_high) = (first.start, last.end);
        let top = bins
            .iter()
            .map(|bin| bin.density)
            .chain(density.iter().map(|(_, y)| *y))
            .fold(0.0, f64::max)
            .max(f64::MIN_POSITIVE)
            * 1.1;
        self.y_axis(0.0, top, "Densidade")?;
        let span = x_high - x_low;
        let plot_width = self.plot_width();
        let x_for = |value: f64| MARGIN_LEFT + (value - x_low) / span * plot_width;
        for bin in bins {
            let x = x_for(bin.start);
            let width = x_for(bin.end) - x;
            self.bar(x, width, bin.density, top, PALETTE[0])?;
        }
        if !density.is_empty() {
            let points = density
                .iter()
                .map(|(x, y)| format!("{:.1},{:.1}", x_for(*x), self.y_for(*y, top)))
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(
                self.body,
                r#"<polyline points="{points}" fill="none" stroke="red" stroke-width="2"/>"#
            )?;
        }
        for value in [x_low, (x_low + x_high) / 2.0, x_high] {
            self.x_label(x_for(value), &format_tick(value))?;
        }
        Ok(())
    }

    fn boxplot(&mut self, boxes: &[BoxSummary]) -> Result<()> {
        if boxes.is_empty() {
            bail!("Boxplot has no groups");
        }
        let top = boxes
            .iter()
            .flat_map(|b| b.outliers.iter().copied().chain([b.upper_whisker]))
            .fold(0.0, f64::max)
            .max(1.0)
            * 1.1;
        self.y_axis(0.0, top, "Produtividade (t/ha)")?;
        let slot = self.plot_width() / boxes.len() as f64;
        for (idx, summary) in boxes.iter().enumerate() {
            let center = MARGIN_LEFT + slot * (idx as f64 + 0.5);
            let half = slot * 0.3;
            let (q1, q3) = (self.y_for(summary.q1, top), self.y_for(summary.q3, top));
            let median = self.y_for(summary.median, top);
            let low = self.y_for(summary.lower_whisker, top);
            let high = self.y_for(summary.upper_whisker, top);
            writeln!(
                self.body,
                r##"<line x1="{center:.1}" y1="{low:.1}" x2="{center:.1}" y2="{high:.1}" stroke="#222"/>"##
            )?;
            writeln!(
                self.body,
                r##"<rect x="{:.1}" y="{q3:.1}" width="{:.1}" height="{:.1}" fill="{}" stroke="#222"/>"##,
                center - half,
                half * 2.0,
                (q1 - q3).max(1.0),
                PALETTE[idx % PALETTE.len()]
            )?;
            writeln!(
                self.body,
                r##"<line x1="{:.1}" y1="{median:.1}" x2="{:.1}" y2="{median:.1}" stroke="#222" stroke-width="2"/>"##,
                center - half,
                center + half
            )?;
            for outlier in &summary.outliers {
                writeln!(
                    self.body,
                    r##"<circle cx="{center:.1}" cy="{:.1}" r="3" fill="none" stroke="#222"/>"##,
                    self.y_for(*outlier, top)
                )?;
            }
            self.x_label(center, &summary.label)?;
        }
        Ok(())
    }

    fn frequencies(&mut self, shares: &[CategoryShare]) -> Result<()> {
        if shares.is_empty() {
            bail!("Frequency chart has no categories");
        }
        let top = shares.iter().map(|s| s.count).max().unwrap_or(1).max(1) as f64 * 1.15;
        self.y_axis(0.0, top, "Contagem")?;
        let slot = self.plot_width() / shares.len() as f64;
        for (idx, share) in shares.iter().enumerate() {
            let x = MARGIN_LEFT + slot * idx as f64 + slot * 0.15;
            self.bar(x, slot * 0.7, share.count as f64, top, PALETTE[(idx + 1) % PALETTE.len()])?;
            let label_y = self.y_for(share.count as f64, top) - 6.0;
            writeln!(
                self.body,
                r#"<text x="{:.1}" y="{label_y:.1}" text-anchor="middle" font-size="12" font-weight="bold">{:.1}%</text>"#,
                x + slot * 0.35,
                share.proportion * 100.0
            )?;
            self.x_label(x + slot * 0.35, &share.label)?;
        }
        Ok(())
    }

    fn means(&mut self, means: &[(String, f64)]) -> Result<()> {
        if means.is_empty() {
            bail!("Mean chart has no bars");
        }
        let top = means
            .iter()
            .map(|(_, mean)| *mean)
            .fold(0.0, f64::max)
            .max(f64::MIN_POSITIVE)
            * 1.15;
        self.y_axis(0.0, top, "Produtividade média (t/ha)")?;
        let slot = self.plot_width() / means.len() as f64;
        for (idx, (label, mean)) in means.iter().enumerate() {
            let x = MARGIN_LEFT + slot * idx as f64 + slot * 0.15;
            self.bar(x, slot * 0.7, *mean, top, PALETTE[3 + idx % 3])?;
            let label_y = self.y_for(*mean, top) - 6.0;
            writeln!(
                self.body,
                r#"<text x="{:.1}" y="{label_y:.1}" text-anchor="middle" font-size="12" font-weight="bold">{mean:.2}</text>"#,
                x + slot * 0.35
            )?;
            self.x_label(x + slot * 0.35, label)?;
        }
        Ok(())
    }

    fn finish(mut self) -> String {
        self.body.push_str("</svg>\n");
        self.body
    }
}

fn format_tick(value: f64) -> String {
    if value.abs() >= 10.0 || value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format_number((value * 100.0).round() / 100.0)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::{ChartId, box_summary, histogram};

    fn histogram_request() -> ChartRequest {
        ChartRequest {
            id: ChartId::Histogram,
            series: ChartSeries::Histogram {
                bins: histogram(&[1.0, 2.0, 2.5, 4.0], 4),
                density: vec![(1.0, 0.1), (4.0, 0.2)],
            },
        }
    }

    #[test]
    fn renders_deterministic_svg() {
        let first = render(&histogram_request(), 1200, 720).expect("render");
        let second = render(&histogram_request(), 1200, 720).expect("render");
        assert_eq!(first, second);
        assert!(first.starts_with("<svg"));
        assert!(first.trim_end().ends_with("</svg>"));
        assert_eq!(first.matches("<rect").count(), 1 + 4);
        assert!(first.contains("<polyline"));
    }

    #[test]
    fn labels_are_escaped() {
        let request = ChartRequest {
            id: ChartId::CultureBoxplot,
            series: ChartSeries::Boxplot(vec![box_summary("<empty>", &[1.0, 2.0])]),
        };
        let svg = render(&request, 800, 600).expect("render");
        assert!(svg.contains("&lt;empty&gt;"));
        assert!(!svg.contains("<empty>"));
    }

    #[test]
    fn tiny_canvas_is_rejected() {
        assert!(render(&histogram_request(), 50, 50).is_err());
    }

    #[test]
    fn empty_series_fail_instead_of_drawing_nothing() {
        let request = ChartRequest {
            id: ChartId::SubtypeMeans,
            series: ChartSeries::Means(Vec::new()),
        };
        assert!(render(&request, 1200, 720).is_err());
    }
}
