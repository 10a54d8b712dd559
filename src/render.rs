//! SVG rendering of the rasi chart in the two classical layouts.
//!
//! Pure string templating driven by computed placements; presentation only,
//! no astronomy happens here.

use std::fmt::Write;

use crate::{CelestialBody, Chart, ChartStyle, ZodiacSign};

// Unicode zodiac glyphs, Aries..Pisces.
const ZODIAC_GLYPHS: [&str; 12] = [
    "\u{2648}", "\u{2649}", "\u{264A}", "\u{264B}", "\u{264C}", "\u{264D}",
    "\u{264E}", "\u{264F}", "\u{2650}", "\u{2651}", "\u{2652}", "\u{2653}",
];

fn planet_color(body: CelestialBody) -> &'static str {
    match body {
        CelestialBody::Sun => "#E4572E",
        CelestialBody::Moon => "#4C78A8",
        CelestialBody::Mercury => "#2E8B57",
        CelestialBody::Venus => "#FF7F0E",
        CelestialBody::Mars => "#D62728",
        CelestialBody::Jupiter => "#8C564B",
        CelestialBody::Saturn => "#6A5ACD",
        CelestialBody::Rahu => "#7F7F7F",
        CelestialBody::Ketu => "#2B2B2B",
    }
}

// Sign cells in units of (columns, rows). The North arrangement rings a 3x3
// grid, the South one a 4x3 ring read clockwise from Aries at top-right.
const NORTH_LAYOUT: [(usize, f64, f64); 12] = [
    (0, 1.0, 0.0),
    (1, 2.0, 0.0),
    (2, 2.0, 0.5),
    (3, 2.0, 1.5),
    (4, 2.0, 2.0),
    (5, 1.0, 2.0),
    (6, 0.0, 2.0),
    (7, 0.0, 1.5),
    (8, 0.0, 0.5),
    (9, 0.0, 0.0),
    (10, 1.02, 0.5),
    (11, 1.02, 1.5),
];

const SOUTH_LAYOUT: [(usize, f64, f64); 12] = [
    (0, 3.0, 0.0),
    (1, 2.0, 0.0),
    (2, 1.0, 0.0),
    (3, 0.0, 0.0),
    (4, 0.0, 1.0),
    (5, 0.0, 2.0),
    (6, 1.0, 2.0),
    (7, 2.0, 2.0),
    (8, 3.0, 2.0),
    (9, 3.0, 1.0),
    (10, 2.0, 1.0),
    (11, 1.0, 1.0),
];

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub size: f64,
    pub bg_color: String,
    pub stroke_color: String,
    pub text_color: String,
    pub font_family: String,
    pub show_degrees: bool,
    pub title: Option<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            size: 900.0,
            bg_color: "#ffffff".into(),
            stroke_color: "#222222".into(),
            text_color: "#111111".into(),
            font_family: "Segoe UI, Roboto, Arial, Helvetica, sans-serif".into(),
            show_degrees: true,
            title: None,
        }
    }
}

fn deg_min(degree_in_sign: f64) -> String {
    let mut d = degree_in_sign.floor() as u32;
    let mut m = ((degree_in_sign - degree_in_sign.floor()) * 60.0).round() as u32;
    if m == 60 {
        d += 1;
        m = 0;
    }
    format!("{}\u{b0}{:02}'", d, m)
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Render the chart as a standalone SVG document.
pub fn render_chart(chart: &Chart, style: ChartStyle, options: &RenderOptions) -> String {
    let (layout, cols): (&[(usize, f64, f64)], f64) = match style {
        ChartStyle::NorthIndian => (&NORTH_LAYOUT, 3.0),
        ChartStyle::SouthIndian => (&SOUTH_LAYOUT, 4.0),
    };
    let rows = 3.0;

    let size = options.size;
    let margin = (size * 0.06).max(20.0);
    let title_h = if options.title.is_some() { size * 0.06 } else { 0.0 };
    let grid_y0 = margin + title_h + 6.0;
    let grid_w = size - 2.0 * margin;
    let grid_h = size - 2.0 * margin - title_h - 10.0;
    let cell_w = grid_w / cols;
    let cell_h = grid_h / rows;
    let font = (size * 0.014).max(12.0);

    let mut svg = String::new();
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{size}\" height=\"{size}\" viewBox=\"0 0 {size} {size}\">"
    );
    let _ = write!(
        svg,
        "<rect x=\"0\" y=\"0\" width=\"{size}\" height=\"{size}\" fill=\"{}\"/>",
        options.bg_color
    );
    if let Some(title) = &options.title {
        let _ = write!(
            svg,
            "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"{:.1}\" font-family=\"{}\" font-weight=\"700\" fill=\"{}\">{}</text>",
            margin + 10.0,
            margin + title_h * 0.6,
            size * 0.03,
            options.font_family,
            options.text_color,
            escape_text(title)
        );
    }

    let asc_sign = chart.ascendant_sign().index();

    for &(sign_index, cx, cy) in layout {
        let x = margin + cx * cell_w;
        let y = grid_y0 + cy * cell_h;
        let w = cell_w * 0.94;
        let h = cell_h * 0.9;
        let sign = ZodiacSign::from_index(sign_index);

        let _ = write!(
            svg,
            "<rect x=\"{x:.1}\" y=\"{y:.1}\" width=\"{w:.1}\" height=\"{h:.1}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1.6\"/>",
            options.stroke_color
        );
        // Header: glyph then sign name.
        let header_y = y + font + 4.0;
        let _ = write!(
            svg,
            "<text x=\"{:.1}\" y=\"{header_y:.1}\" font-size=\"{:.1}\" font-family=\"{}\" fill=\"{}\">{}</text>",
            x + 8.0,
            font * 1.2,
            options.font_family,
            options.text_color,
            ZODIAC_GLYPHS[sign_index]
        );
        let _ = write!(
            svg,
            "<text x=\"{:.1}\" y=\"{header_y:.1}\" font-size=\"{font:.1}\" font-family=\"{}\" font-weight=\"700\" fill=\"{}\">{}</text>",
            x + 8.0 + font * 1.6,
            options.font_family,
            options.text_color,
            sign.name()
        );

        // Planets in this sign, two-column flow below the header.
        let occupants: Vec<_> = chart
            .positions
            .values()
            .filter(|p| p.sign() == sign)
            .collect();
        let start_y = y + font * 1.9 + 6.0;
        let left_x = x + 8.0;
        let right_x = x + w / 2.0 + 6.0;
        let dot_r = (size * 0.0035).max(3.0);
        let mut line_y = start_y;
        let mut left = true;
        for position in occupants {
            let col_x = if left { left_x } else { right_x };
            let label = if options.show_degrees {
                format!("{} {}", position.body.name(), deg_min(position.degree_in_sign()))
            } else {
                position.body.name().to_string()
            };
            let _ = write!(
                svg,
                "<circle cx=\"{col_x:.1}\" cy=\"{:.1}\" r=\"{dot_r:.1}\" fill=\"{}\"/>",
                line_y + 2.0,
                planet_color(position.body)
            );
            let _ = write!(
                svg,
                "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"{:.1}\" font-family=\"{}\" fill=\"{}\">{label}</text>",
                col_x + dot_r + 6.0,
                line_y + font * 0.6,
                font * 0.95,
                options.font_family,
                options.text_color
            );
            if left {
                left = false;
            } else {
                left = true;
                line_y += font * 1.3;
            }
        }

        if sign_index == asc_sign {
            let badge_r = (cell_h.min(cell_w) * 0.07).max(10.0);
            let bx = x + w - badge_r - 10.0;
            let by = y + badge_r + 10.0;
            let _ = write!(
                svg,
                "<circle cx=\"{bx:.1}\" cy=\"{by:.1}\" r=\"{badge_r:.1}\" fill=\"#111111\" stroke=\"#ffffff\" stroke-width=\"1.2\"/>"
            );
            let _ = write!(
                svg,
                "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"{:.1}\" font-family=\"{}\" font-weight=\"700\" fill=\"#ffffff\">ASC</text>",
                bx - badge_r * 0.7,
                by + badge_r * 0.28,
                font * 0.8,
                options.font_family
            );
        }
    }

    // Footer legend.
    let legend_y = grid_y0 + grid_h + 6.0;
    let _ = write!(
        svg,
        "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"{:.1}\" font-family=\"{}\" font-weight=\"700\" fill=\"{}\">Legend:</text>",
        margin + 6.0,
        legend_y + 12.0,
        font * 0.9,
        options.font_family,
        options.text_color
    );
    for (i, body) in CelestialBody::iter().enumerate() {
        let lx = margin + 74.0 + i as f64 * 80.0;
        let _ = write!(
            svg,
            "<circle cx=\"{lx:.1}\" cy=\"{:.1}\" r=\"4\" fill=\"{}\"/>",
            legend_y + 8.0,
            planet_color(body)
        );
        let _ = write!(
            svg,
            "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"{:.1}\" font-family=\"{}\" fill=\"{}\">{}</text>",
            lx + 10.0,
            legend_y + 12.0,
            font * 0.85,
            options.font_family,
            options.text_color,
            body.name()
        );
    }

    svg.push_str("</svg>");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chart() -> Chart {
        Chart::new(
            15.0,
            [
                (CelestialBody::Sun, 95.5),
                (CelestialBody::Moon, 210.0),
                (CelestialBody::Jupiter, 105.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn both_styles_produce_well_formed_svg() {
        for style in [ChartStyle::NorthIndian, ChartStyle::SouthIndian] {
            let svg = render_chart(&sample_chart(), style, &RenderOptions::default());
            assert!(svg.starts_with("<svg "));
            assert!(svg.ends_with("</svg>"));
            assert_eq!(svg.matches("<rect").count(), 13); // background + 12 cells
        }
    }

    #[test]
    fn ascendant_badge_lands_once() {
        let svg = render_chart(
            &sample_chart(),
            ChartStyle::SouthIndian,
            &RenderOptions::default(),
        );
        assert_eq!(svg.matches(">ASC<").count(), 1);
    }

    #[test]
    fn planet_labels_carry_degrees() {
        let svg = render_chart(
            &sample_chart(),
            ChartStyle::NorthIndian,
            &RenderOptions::default(),
        );
        assert!(svg.contains("Sun 5\u{b0}30'"));
        assert!(svg.contains("Jupiter 15\u{b0}00'"));
        // Every sign header is present regardless of occupancy.
        for sign in ["Aries", "Virgo", "Pisces"] {
            assert!(svg.contains(sign), "missing {}", sign);
        }
    }

    #[test]
    fn titles_are_escaped() {
        let mut options = RenderOptions::default();
        options.title = Some("Rasi <chart> & more".into());
        let svg = render_chart(&sample_chart(), ChartStyle::NorthIndian, &options);
        assert!(svg.contains("Rasi &lt;chart&gt; &amp; more"));
    }
}
