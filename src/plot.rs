//! Cumulative publication chart.
//!
//! One line per technique, year on the x axis and cumulative publications on
//! the y axis, rendered to SVG with `plotters`.

use crate::aggregate::{cumulative_series, order_series, CountTable, CumulativeSeries};
use crate::error::{Result, SurveyError};
use plotters::prelude::*;
use std::path::Path;
use tracing::info;

/// Chart appearance
#[derive(Debug, Clone)]
pub struct PlotOptions {
    /// Image size in pixels
    pub size: (u32, u32),
    /// Overrides the year range taken from the data
    pub year_range: Option<(i32, i32)>,
    pub caption: Option<String>,
    /// Legend and colour order; unlisted techniques follow in label order
    pub technique_order: Vec<String>,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            size: (1024, 768),
            year_range: None,
            caption: None,
            technique_order: Vec::new(),
        }
    }
}

fn plot_err<E: std::fmt::Display>(e: E) -> SurveyError {
    SurveyError::Plot(e.to_string())
}

/// Year span covered by any series
fn data_year_range(series: &[CumulativeSeries]) -> Option<(i32, i32)> {
    let years = series.iter().flat_map(|s| s.points.iter().map(|(y, _)| *y));
    let min = years.clone().min()?;
    let max = years.max()?;
    Some((min, max))
}

/// Render the cumulative count of every technique in `counts` to `path`.
///
/// Returns the series that were drawn.
pub fn render_chart(path: &Path, counts: &CountTable, options: &PlotOptions) -> Result<Vec<CumulativeSeries>> {
    let mut series = cumulative_series(counts);
    order_series(&mut series, &options.technique_order);

    let (first_year, last_year) = options
        .year_range
        .or_else(|| data_year_range(&series))
        .ok_or_else(|| SurveyError::Validation("no counts to plot".to_string()))?;
    if first_year > last_year {
        return Err(SurveyError::Validation(format!(
            "year range {}..{} is empty",
            first_year, last_year
        )));
    }
    let x_end = last_year
        .checked_add(1)
        .ok_or_else(|| SurveyError::Validation(format!("last year {} is out of range", last_year)))?;

    let y_max = series.iter().map(CumulativeSeries::total).max().unwrap_or(0).max(1);

    let root = SVGBackend::new(path, options.size).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut builder = ChartBuilder::on(&root);
    builder.margin(20).x_label_area_size(50).y_label_area_size(70);
    if let Some(caption) = &options.caption {
        builder.caption(caption, ("sans-serif", 28));
    }

    // Pad the x range by one year so single-year data still has a visible span.
    let mut chart = builder
        .build_cartesian_2d(first_year..x_end, 0u64..y_max + y_max / 10 + 1)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Year")
        .y_desc("Cumulative publications")
        .draw()
        .map_err(plot_err)?;

    for (idx, s) in series.iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        let points = s
            .points
            .iter()
            .copied()
            .filter(|(year, _)| (first_year..=last_year).contains(year));

        chart
            .draw_series(LineSeries::new(points, color.stroke_width(3)))
            .map_err(plot_err)?
            .label(s.technique.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(3)));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    info!(path = ?path, techniques = series.len(), "Rendered chart");

    Ok(series)
}
