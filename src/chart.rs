use std::f64::consts::PI;
use std::fmt::Write as _;
use std::path::Path;

use crate::storage::write_atomic;

const PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// Cosine range around 90 and 270 degrees where labels are centred.
const LABEL_CENTRE_BAND: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    pub label: String,
    pub hours: f64,
}

/// Turns per-category hours into an image artifact on disk.
pub trait ChartRenderer {
    fn render(&self, title: &str, slices: &[Slice], path: &Path) -> Result<(), std::io::Error>;
}

/// Pie chart written as a standalone SVG document.
#[derive(Debug, Clone, Copy)]
pub struct SvgPieChart {
    pub size: u32,
}

impl Default for SvgPieChart {
    fn default() -> Self {
        Self { size: 600 }
    }
}

impl ChartRenderer for SvgPieChart {
    fn render(&self, title: &str, slices: &[Slice], path: &Path) -> Result<(), std::io::Error> {
        write_atomic(path, self.to_svg(title, slices).as_bytes())
    }
}

impl SvgPieChart {
    pub fn to_svg(&self, title: &str, slices: &[Slice]) -> String {
        let size = f64::from(self.size);
        let cx = size / 2.0;
        let cy = size / 2.0 + size * 0.04;
        let radius = size * 0.33;

        let mut svg = String::new();
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{0}" height="{0}" viewBox="0 0 {0} {0}" font-family="sans-serif">"#,
            self.size
        );
        let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
        let _ = writeln!(
            svg,
            r#"<text x="{cx:.1}" y="{:.1}" text-anchor="middle" font-size="{:.1}">{}</text>"#,
            size * 0.07,
            size * 0.035,
            escape_xml(title)
        );

        let fractions = slice_fractions(slices);
        // Slices run counter-clockwise from three o'clock.
        let mut angle = 0.0_f64;
        for (index, (slice, fraction)) in slices.iter().zip(&fractions).enumerate() {
            let color = PALETTE[index % PALETTE.len()];
            let sweep = fraction * 2.0 * PI;

            if *fraction >= 1.0 {
                let _ = writeln!(
                    svg,
                    r#"<circle cx="{cx:.1}" cy="{cy:.1}" r="{radius:.1}" fill="{color}"/>"#
                );
            } else if *fraction > 0.0 {
                let (x0, y0) = polar(cx, cy, radius, angle);
                let (x1, y1) = polar(cx, cy, radius, angle + sweep);
                let large_arc = u8::from(sweep > PI);
                let _ = writeln!(
                    svg,
                    r#"<path d="M {cx:.1} {cy:.1} L {x0:.1} {y0:.1} A {radius:.1} {radius:.1} 0 {large_arc} 0 {x1:.1} {y1:.1} Z" fill="{color}"/>"#
                );
            }

            let middle = angle + sweep / 2.0;
            let (lx, ly) = polar(cx, cy, radius * 1.12, middle);
            // Labels straight above or below the pie stay centred on it.
            let anchor = if middle.cos().abs() < LABEL_CENTRE_BAND {
                "middle"
            } else if middle.cos() < 0.0 {
                "end"
            } else {
                "start"
            };
            let _ = writeln!(
                svg,
                r#"<text x="{lx:.1}" y="{ly:.1}" text-anchor="{anchor}" font-size="14">{}</text>"#,
                escape_xml(&slice.label)
            );
            let (px, py) = polar(cx, cy, radius * 0.6, middle);
            let _ = writeln!(
                svg,
                r#"<text x="{px:.1}" y="{py:.1}" text-anchor="middle" font-size="13">{:.1}%</text>"#,
                fraction * 100.0
            );

            angle += sweep;
        }

        svg.push_str("</svg>\n");
        svg
    }
}

/// Share of the pie per slice. When every value rounds to zero hours the
/// slices are drawn evenly.
fn slice_fractions(slices: &[Slice]) -> Vec<f64> {
    let total: f64 = slices.iter().map(|slice| slice.hours.max(0.0)).sum();
    if total <= 0.0 {
        let even = 1.0 / slices.len().max(1) as f64;
        return vec![even; slices.len()];
    }
    slices
        .iter()
        .map(|slice| slice.hours.max(0.0) / total)
        .collect()
}

/// SVG y grows downwards, so counter-clockwise means subtracting the sine.
fn polar(cx: f64, cy: f64, radius: f64, angle: f64) -> (f64, f64) {
    (cx + radius * angle.cos(), cy - radius * angle.sin())
}

fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}
