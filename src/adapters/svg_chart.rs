//! SVG chart of the portfolio value series.

use crate::domain::error::CrossrevError;
use crate::domain::portfolio::EquityPoint;
use crate::ports::report_port::ReportPort;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::info;

const WIDTH: f64 = 1000.0;
const HEIGHT: f64 = 500.0;
const PAD_LEFT: f64 = 90.0;
const PAD_RIGHT: f64 = 30.0;
const PAD_TOP: f64 = 50.0;
const PAD_BOTTOM: f64 = 60.0;
const Y_TICKS: usize = 5;
const X_TICKS: usize = 5;

const TITLE: &str = "Portfolio Value Over Time";
const X_LABEL: &str = "Date";
const Y_LABEL: &str = "Portfolio Value ($)";

/// `1234.6` → `$1,235`, `-50` → `-$50`.
pub fn format_currency(value: f64) -> String {
    let rounded = value.abs().round() as u64;
    let digits = rounded.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if value < 0.0 && rounded > 0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

/// Value range shown on the y axis, always including the starting value.
fn y_range(values: &[EquityPoint], initial_value: f64) -> (f64, f64) {
    let (min, max) = values
        .iter()
        .map(|p| p.value)
        .fold((initial_value, initial_value), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let margin = if max > min {
        (max - min) * 0.05
    } else {
        initial_value.abs().max(1.0) * 0.01
    };
    (min - margin, max + margin)
}

pub fn render_value_chart(values: &[EquityPoint], initial_value: f64) -> String {
    let plot_width = WIDTH - PAD_LEFT - PAD_RIGHT;
    let plot_height = HEIGHT - PAD_TOP - PAD_BOTTOM;
    let bottom = HEIGHT - PAD_BOTTOM;

    let (y_min, y_max) = y_range(values, initial_value);
    let scale_y = plot_height / (y_max - y_min);
    let scale_x = if values.len() > 1 {
        plot_width / (values.len() - 1) as f64
    } else {
        0.0
    };
    let x_at = |i: usize| PAD_LEFT + i as f64 * scale_x;
    let y_at = |v: f64| bottom - (v - y_min) * scale_y;

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH:.0}" height="{HEIGHT:.0}" viewBox="0 0 {WIDTH:.0} {HEIGHT:.0}" font-family="sans-serif">"#
    );
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = writeln!(
        svg,
        r#"<text x="{:.1}" y="30" text-anchor="middle" font-size="20">{TITLE}</text>"#,
        WIDTH / 2.0
    );

    for i in 0..=Y_TICKS {
        let value = y_min + (y_max - y_min) * i as f64 / Y_TICKS as f64;
        let y = y_at(value);
        let _ = writeln!(
            svg,
            r##"<line x1="{PAD_LEFT:.1}" y1="{y:.1}" x2="{:.1}" y2="{y:.1}" stroke="#dddddd" stroke-width="1"/>"##,
            WIDTH - PAD_RIGHT
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="end" font-size="12">{}</text>"#,
            PAD_LEFT - 8.0,
            y + 4.0,
            format_currency(value)
        );
    }

    if !values.is_empty() {
        let ticks = X_TICKS.min(values.len());
        for t in 0..ticks {
            let i = if ticks > 1 {
                t * (values.len() - 1) / (ticks - 1)
            } else {
                0
            };
            let _ = writeln!(
                svg,
                r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="12">{}</text>"#,
                x_at(i),
                bottom + 20.0,
                values[i].timestamp.format("%Y-%m-%d")
            );
        }

        let line: Vec<String> = values
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{:.1},{:.1}", x_at(i), y_at(p.value)))
            .collect();
        let line = line.join(" ");
        let last_x = x_at(values.len() - 1);

        let _ = writeln!(
            svg,
            r##"<polygon points="{PAD_LEFT:.1},{bottom:.1} {line} {last_x:.1},{bottom:.1}" fill="#1f77b4" fill-opacity="0.3" stroke="none"/>"##
        );
        let _ = writeln!(
            svg,
            r##"<polyline points="{line}" fill="none" stroke="#1f77b4" stroke-width="2"/>"##
        );
    } else {
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="14">No portfolio data available.</text>"#,
            WIDTH / 2.0,
            HEIGHT / 2.0
        );
    }

    let start_y = y_at(initial_value);
    let _ = writeln!(
        svg,
        r##"<line x1="{PAD_LEFT:.1}" y1="{start_y:.1}" x2="{:.1}" y2="{start_y:.1}" stroke="#d62728" stroke-width="1.5" stroke-dasharray="6,4"/>"##,
        WIDTH - PAD_RIGHT
    );
    let _ = writeln!(
        svg,
        r##"<text x="{:.1}" y="{:.1}" text-anchor="end" font-size="12" fill="#d62728">Starting Value {}</text>"##,
        WIDTH - PAD_RIGHT - 4.0,
        start_y - 6.0,
        format_currency(initial_value)
    );

    let _ = writeln!(
        svg,
        r#"<line x1="{PAD_LEFT:.1}" y1="{PAD_TOP:.1}" x2="{PAD_LEFT:.1}" y2="{bottom:.1}" stroke="black" stroke-width="1"/>"#
    );
    let _ = writeln!(
        svg,
        r#"<line x1="{PAD_LEFT:.1}" y1="{bottom:.1}" x2="{:.1}" y2="{bottom:.1}" stroke="black" stroke-width="1"/>"#,
        WIDTH - PAD_RIGHT
    );
    let _ = writeln!(
        svg,
        r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="14">{X_LABEL}</text>"#,
        PAD_LEFT + plot_width / 2.0,
        HEIGHT - 15.0
    );
    let mid_y = PAD_TOP + plot_height / 2.0;
    let _ = writeln!(
        svg,
        r#"<text x="20" y="{mid_y:.1}" text-anchor="middle" font-size="14" transform="rotate(-90 20 {mid_y:.1})">{Y_LABEL}</text>"#
    );
    svg.push_str("</svg>\n");
    svg
}

#[derive(Debug, Default)]
pub struct SvgChartReport;

impl ReportPort for SvgChartReport {
    fn write(
        &self,
        values: &[EquityPoint],
        initial_value: f64,
        output_path: &Path,
    ) -> Result<(), CrossrevError> {
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(output_path, render_value_chart(values, initial_value))?;
        info!(path = %output_path.display(), points = values.len(), "wrote value chart");
        Ok(())
    }
}
