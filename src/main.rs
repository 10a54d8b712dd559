use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sahadev_core::{
    generate_horoscope, narrative, render_chart, BirthInfo, ChartStyle, HorizonsProvider,
    Location, NarrativeEngine, RenderOptions,
};

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Style {
    North,
    South,
}

impl From<Style> for ChartStyle {
    fn from(style: Style) -> ChartStyle {
        match style {
            Style::North => ChartStyle::NorthIndian,
            Style::South => ChartStyle::SouthIndian,
        }
    }
}

/// Compute a sidereal birth chart and print its placements, yogas and dasas.
#[derive(Debug, Parser)]
#[command(name = "sahadev", version)]
struct Cli {
    /// Birth instant with UTC offset, e.g. "1991-06-18 07:10:00 +05:30"
    datetime: String,
    /// Birth latitude in degrees, north positive
    latitude: f64,
    /// Birth longitude in degrees, east positive
    longitude: f64,
    /// Chart layout for the SVG output
    #[arg(long, value_enum, default_value = "north")]
    style: Style,
    /// Write the rendered chart to this path
    #[arg(long)]
    svg_out: Option<PathBuf>,
    /// Skip the LLM call and use the local fallback reading
    #[arg(long)]
    offline: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let date_time: DateTime<Utc> = DateTime::parse_from_str(&cli.datetime, "%Y-%m-%d %H:%M:%S %z")
        .with_context(|| format!("could not parse datetime {:?}", cli.datetime))?
        .with_timezone(&Utc);
    let birth_info = BirthInfo {
        date_time,
        location: Location::new(cli.latitude, cli.longitude)?,
    };

    let provider = HorizonsProvider::new()?;
    let horoscope = generate_horoscope(&provider, &birth_info)?;

    println!("Natal chart for {} at {:.4}, {:.4}", date_time, cli.latitude, cli.longitude);
    println!("Ascendant: {:.2}\u{b0} ({})", horoscope.chart.ascendant_longitude, horoscope.chart.ascendant_sign());
    println!("----------------------------------------");
    for placement in &horoscope.placements {
        let Some(position) = horoscope.chart.position(placement.body) else {
            continue;
        };
        println!(
            "{:<8} {:>7.2}\u{b0}  {:<11} house {:<2} {:?}",
            placement.body.name(),
            position.longitude,
            placement.sign.name(),
            placement.house.index(),
            position.nakshatra(),
        );
    }

    if horoscope.yogas.is_empty() {
        println!("\nNo classical yogas matched.");
    } else {
        println!("\nYogas:");
        for matched in &horoscope.yogas {
            let bodies: Vec<&str> = matched.involved.iter().map(|b| b.name()).collect();
            println!("  {} ({})", matched.yoga, bodies.join(", "));
        }
    }

    if let Some(dasa) = &horoscope.dasa {
        println!(
            "\nCurrent mahadasha: {} ({:.2} years remaining)",
            dasa.current, dasa.remaining_years
        );
        for period in &dasa.periods {
            println!(
                "  {:<8} {} -> {}",
                period.lord.name(),
                period.start.format("%Y-%m-%d"),
                period.end.format("%Y-%m-%d")
            );
        }
    }

    if let Some(path) = &cli.svg_out {
        let mut options = RenderOptions::default();
        options.title = Some(match cli.style {
            Style::North => "Rasi Chart (North Indian)".to_string(),
            Style::South => "Rasi Chart (South Indian)".to_string(),
        });
        let svg = render_chart(&horoscope.chart, cli.style.into(), &options);
        fs::write(path, svg).with_context(|| format!("could not write {}", path.display()))?;
        println!("\nChart written to {}", path.display());
    }

    let payload = narrative::structured_payload(&horoscope, &birth_info);
    let analysis = if cli.offline {
        narrative::fallback_analysis(&payload)
    } else {
        NarrativeEngine::from_env()?.generate_or_fallback(&payload)
    };

    println!("\n{}", analysis.headline);
    for bullet in &analysis.bullets {
        println!("- {}", bullet);
    }
    if !analysis.narrative.is_empty() {
        println!("\n{}", analysis.narrative);
    }

    Ok(())
}
