//! Bar chart of how many cards the collection holds per type.

use anyhow::{Context, Result};
use plotters::prelude::*;
use std::path::Path;

use super::counts::CardCount;

const UNTYPED_LABEL: &str = "(none)";

/// Total copies per type, in report order.
pub fn type_totals(counts: &[CardCount]) -> Vec<(String, u32)> {
    let mut totals: Vec<(String, u32)> = Vec::new();
    for row in counts {
        let label = row.card_type.as_deref().unwrap_or(UNTYPED_LABEL);
        match totals.iter_mut().find(|(existing, _)| existing == label) {
            Some((_, total)) => *total += row.count,
            None => totals.push((label.to_string(), row.count)),
        }
    }
    totals
}

pub fn draw_type_chart(totals: &[(String, u32)], path: &Path) -> Result<()> {
    let bar_color = RGBColor(232, 124, 32);
    let outline_color = RGBColor(190, 90, 10);
    let grid_color = RGBColor(220, 220, 220);

    let root = BitMapBackend::new(path, (900, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let max_total = totals.iter().map(|(_, total)| *total).max().unwrap_or(1);
    let bars = totals.len() as u32;

    let mut chart = ChartBuilder::on(&root)
        .caption("Cards by type", ("sans-serif", 28))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(50)
        .build_cartesian_2d((0u32..bars).into_segmented(), 0u32..(max_total + 1))
        .context("Failed to build chart")?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc("Cards")
        .x_labels(totals.len().max(1))
        .x_label_formatter(&|value| match value {
            SegmentValue::CenterOf(i) => totals
                .get(*i as usize)
                .map(|(label, _)| label.clone())
                .unwrap_or_default(),
            _ => String::new(),
        })
        .light_line_style(grid_color)
        .draw()
        .context("Failed to draw mesh")?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(bar_color.filled())
            .margin(12)
            .data(totals.iter().enumerate().map(|(i, (_, total))| (i as u32, *total))),
    )?;
    chart.draw_series(
        Histogram::vertical(&chart)
            .style(outline_color.stroke_width(1))
            .margin(12)
            .data(totals.iter().enumerate().map(|(i, (_, total))| (i as u32, *total))),
    )?;

    root.present().context("Failed to write chart")?;
    Ok(())
}
