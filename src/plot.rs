//! Three-panel ordination figure: PC1xPC2 scatter, PC1xPC3 scatter with
//! legend, and a lower-triangular heatmap of mean site-to-site distances
//! annotated with standard deviations.
//!
//! The same drawing routine is presented through the bitmap backend (PNG)
//! and the SVG backend so raster and vector outputs share one layout.

use crate::meta::{MarkerShape, SiteMap};
use crate::pcoa::PcoaResult;
use crate::stats::SiteStats;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontTransform;
use std::error::Error;

/// Output canvas size in pixels; three equal panels side by side.
const FIGURE_SIZE: (u32, u32) = (1800, 600);
/// Marker half-size in pixels.
const MARKER_SIZE: i32 = 4;
/// X offset of the highlight marker next to its sample, in PC units.
const HIGHLIGHT_X_OFFSET: f64 = 0.04;
/// Padding applied to each scatter axis before squaring, fraction of range.
const RANGE_PAD: f64 = 0.05;
/// Mean distance above which a heatmap cell is light enough for black text.
const DARK_TEXT_THRESHOLD: f64 = 0.4;

/// Render the composite figure to both output files.
pub fn render_figure(
    pcoa: &PcoaResult,
    sites: &SiteMap,
    highlights: &[String],
    stats: &SiteStats,
    png_path: &str,
    svg_path: &str,
) -> Result<(), Box<dyn Error>> {
    {
        let root = BitMapBackend::new(png_path, FIGURE_SIZE).into_drawing_area();
        draw_panels(&root, pcoa, sites, highlights, stats)?;
        root.present()?;
    }
    {
        let root = SVGBackend::new(svg_path, FIGURE_SIZE).into_drawing_area();
        draw_panels(&root, pcoa, sites, highlights, stats)?;
        root.present()?;
    }
    Ok(())
}

fn draw_panels<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    pcoa: &PcoaResult,
    sites: &SiteMap,
    highlights: &[String],
    stats: &SiteStats,
) -> Result<(), Box<dyn Error>>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let panels = root.split_evenly((1, 3));
    draw_scatter(&panels[0], pcoa, 0, 1, sites, highlights, false)?;
    draw_scatter(&panels[1], pcoa, 0, 2, sites, highlights, true)?;
    draw_heatmap(&panels[2], stats)?;
    Ok(())
}

/// Expand the shorter of the two ranges symmetrically about its midpoint so
/// both span the same length and visual distances are not distorted.
pub fn square_limits(x: (f64, f64), y: (f64, f64)) -> ((f64, f64), (f64, f64)) {
    let x_len = x.1 - x.0;
    let y_len = y.1 - y.0;
    if y_len > x_len {
        let mid = x.0 + x_len / 2.0;
        ((mid - y_len / 2.0, mid + y_len / 2.0), y)
    } else {
        let mid = y.0 + y_len / 2.0;
        (x, (mid - x_len / 2.0, mid + x_len / 2.0))
    }
}

/// Heatmap masking: only the lower triangle (including the diagonal) of the
/// site-by-site table is shown.
pub fn cell_masked(row: usize, col: usize) -> bool {
    col > row
}

/// Annotation text is black on light (high-distance) cells, white otherwise.
pub fn annotation_is_dark(cell_mean: f64) -> bool {
    cell_mean > DARK_TEXT_THRESHOLD
}

fn heat_color(value: f64, v_min: f64, v_max: f64) -> RGBColor {
    let t = if (v_max - v_min).abs() < f64::EPSILON {
        0.5
    } else {
        ((value - v_min) / (v_max - v_min)).clamp(0.0, 1.0)
    };
    let c = colorous::VIRIDIS.eval_continuous(t);
    RGBColor(c.r, c.g, c.b)
}

fn draw_scatter<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    pcoa: &PcoaResult,
    axis_x: usize,
    axis_y: usize,
    sites: &SiteMap,
    highlights: &[String],
    with_legend: bool,
) -> Result<(), Box<dyn Error>>
where
    DB::ErrorType: 'static,
{
    // Per-site points in metadata order.
    let mut site_points: Vec<Vec<(f64, f64)>> = Vec::with_capacity(sites.sites.len());
    for site in &sites.sites {
        let mut points = Vec::with_capacity(site.samples.len());
        for sample in &site.samples {
            points.push((
                pcoa.coordinate(sample, axis_x)?,
                pcoa.coordinate(sample, axis_y)?,
            ));
        }
        site_points.push(points);
    }

    // Highlighted samples in ordination order, marked just right of the point.
    let mut highlight_points = Vec::new();
    for sample in pcoa.labels() {
        if highlights.iter().any(|h| h == sample) {
            highlight_points.push((
                pcoa.coordinate(sample, axis_x)? + HIGHLIGHT_X_OFFSET,
                pcoa.coordinate(sample, axis_y)?,
            ));
        }
    }

    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for &(x, y) in site_points.iter().flatten().chain(highlight_points.iter()) {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }
    if !x_min.is_finite() {
        return Err("no samples to plot".into());
    }
    let x_pad = (x_max - x_min).max(f64::EPSILON) * RANGE_PAD;
    let y_pad = (y_max - y_min).max(f64::EPSILON) * RANGE_PAD;
    let ((x0, x1), (y0, y1)) = square_limits(
        (x_min - x_pad, x_max + x_pad),
        (y_min - y_pad, y_max + y_pad),
    );

    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(55)
        .build_cartesian_2d(x0..x1, y0..y1)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_desc(format!(
            "PC{} {:.2}",
            axis_x + 1,
            pcoa.proportion_explained[axis_x]
        ))
        .y_desc(format!(
            "PC{} {:.2}",
            axis_y + 1,
            pcoa.proportion_explained[axis_y]
        ))
        .draw()?;

    for (site, points) in sites.sites.iter().zip(&site_points) {
        // Hollow markers: stroke in the site colour, no fill.
        let style = ShapeStyle {
            color: site.color.to_rgba(),
            filled: false,
            stroke_width: 1,
        };
        match site.marker {
            MarkerShape::Circle => {
                let anno = chart.draw_series(
                    points
                        .iter()
                        .map(move |&(x, y)| Circle::new((x, y), MARKER_SIZE, style)),
                )?;
                if with_legend {
                    anno.label(&site.name)
                        .legend(move |(x, y)| Circle::new((x, y), MARKER_SIZE, style));
                }
            }
            MarkerShape::Square => {
                let anno = chart.draw_series(points.iter().map(move |&(x, y)| {
                    EmptyElement::at((x, y))
                        + Rectangle::new(
                            [(-MARKER_SIZE, -MARKER_SIZE), (MARKER_SIZE, MARKER_SIZE)],
                            style,
                        )
                }))?;
                if with_legend {
                    anno.label(&site.name).legend(move |(x, y)| {
                        Rectangle::new(
                            [
                                (x - MARKER_SIZE, y - MARKER_SIZE),
                                (x + MARKER_SIZE, y + MARKER_SIZE),
                            ],
                            style,
                        )
                    });
                }
            }
            MarkerShape::Cross => {
                let anno = chart.draw_series(
                    points
                        .iter()
                        .map(move |&(x, y)| Cross::new((x, y), MARKER_SIZE, style)),
                )?;
                if with_legend {
                    anno.label(&site.name)
                        .legend(move |(x, y)| Cross::new((x, y), MARKER_SIZE, style));
                }
            }
            MarkerShape::TriangleUp => {
                let anno = chart.draw_series(points.iter().map(move |&(x, y)| {
                    EmptyElement::at((x, y))
                        + PathElement::new(
                            vec![
                                (0, -MARKER_SIZE),
                                (MARKER_SIZE, MARKER_SIZE - 1),
                                (-MARKER_SIZE, MARKER_SIZE - 1),
                                (0, -MARKER_SIZE),
                            ],
                            style,
                        )
                }))?;
                if with_legend {
                    anno.label(&site.name).legend(move |(x, y)| {
                        PathElement::new(
                            vec![
                                (x, y - MARKER_SIZE),
                                (x + MARKER_SIZE, y + MARKER_SIZE - 1),
                                (x - MARKER_SIZE, y + MARKER_SIZE - 1),
                                (x, y - MARKER_SIZE),
                            ],
                            style,
                        )
                    });
                }
            }
            MarkerShape::TriangleDown => {
                let anno = chart.draw_series(points.iter().map(move |&(x, y)| {
                    EmptyElement::at((x, y))
                        + PathElement::new(
                            vec![
                                (-MARKER_SIZE, -MARKER_SIZE + 1),
                                (MARKER_SIZE, -MARKER_SIZE + 1),
                                (0, MARKER_SIZE),
                                (-MARKER_SIZE, -MARKER_SIZE + 1),
                            ],
                            style,
                        )
                }))?;
                if with_legend {
                    anno.label(&site.name).legend(move |(x, y)| {
                        PathElement::new(
                            vec![
                                (x - MARKER_SIZE, y - MARKER_SIZE + 1),
                                (x + MARKER_SIZE, y - MARKER_SIZE + 1),
                                (x, y + MARKER_SIZE),
                                (x - MARKER_SIZE, y - MARKER_SIZE + 1),
                            ],
                            style,
                        )
                    });
                }
            }
        }
    }

    // Black left-pointing triangle beside each highlighted sample.
    if !highlight_points.is_empty() {
        chart.draw_series(highlight_points.iter().map(|&(x, y)| {
            EmptyElement::at((x, y))
                + Polygon::new(
                    vec![
                        (MARKER_SIZE, -MARKER_SIZE),
                        (-MARKER_SIZE, 0),
                        (MARKER_SIZE, MARKER_SIZE),
                    ],
                    BLACK.filled(),
                )
        }))?;
    }

    if with_legend {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font(("sans-serif", 12))
            .draw()?;
    }
    Ok(())
}

fn draw_heatmap<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    stats: &SiteStats,
) -> Result<(), Box<dyn Error>>
where
    DB::ErrorType: 'static,
{
    let n = stats.n_sites();
    let mut v_min = f64::INFINITY;
    let mut v_max = f64::NEG_INFINITY;
    for i in 0..n {
        for j in 0..=i {
            v_min = v_min.min(stats.mean[i][j]);
            v_max = v_max.max(stats.mean[i][j]);
        }
    }

    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .margin_right(80)
        .x_label_area_size(95)
        .y_label_area_size(95)
        .build_cartesian_2d(0.0..n as f64, 0.0..n as f64)?;

    // Cells. Row 0 (northernmost site) sits at the top, as in the table.
    for i in 0..n {
        for j in 0..n {
            if cell_masked(i, j) {
                continue;
            }
            let cell_mean = stats.mean[i][j];
            let y0 = (n - 1 - i) as f64;
            chart.draw_series(std::iter::once(Rectangle::new(
                [(j as f64, y0), (j as f64 + 1.0, y0 + 1.0)],
                heat_color(cell_mean, v_min, v_max).filled(),
            )))?;

            let text_color = if annotation_is_dark(cell_mean) {
                BLACK
            } else {
                WHITE
            };
            let style = ("sans-serif", 13)
                .into_font()
                .color(&text_color)
                .pos(Pos::new(HPos::Center, VPos::Center));
            chart.draw_series(std::iter::once(Text::new(
                format!("{:.2}", stats.stdev[i][j]),
                (j as f64 + 0.5, y0 + 0.5),
                style,
            )))?;
        }
    }

    // Tick labels are drawn by hand so they sit at the cell centres:
    // site names vertical below the x axis, horizontal left of the y axis.
    let (bx, by) = area.get_base_pixel();
    for j in 0..n {
        let (px, py) = chart.backend_coord(&(j as f64 + 0.5, 0.0));
        let style = ("sans-serif", 13)
            .into_font()
            .transform(FontTransform::Rotate270)
            .color(&BLACK)
            .pos(Pos::new(HPos::Right, VPos::Center));
        area.draw(&Text::new(
            stats.names[j].clone(),
            (px - bx, py - by + 6),
            style,
        ))?;
    }
    for i in 0..n {
        let (px, py) = chart.backend_coord(&(0.0, (n - 1 - i) as f64 + 0.5));
        let style = ("sans-serif", 13)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Right, VPos::Center));
        area.draw(&Text::new(
            stats.names[i].clone(),
            (px - bx - 6, py - by),
            style,
        ))?;
    }

    // Vertical colour bar along the right edge of the panel.
    let (x_range, y_range) = chart.plotting_area().get_pixel_range();
    let bar_x0 = x_range.end - bx + 18;
    let bar_x1 = bar_x0 + 14;
    let bar_y0 = y_range.start - by;
    let bar_y1 = y_range.end - by;
    let steps = 64;
    let height = bar_y1 - bar_y0;
    for s in 0..steps {
        let top = bar_y1 - (height * (s + 1)) / steps;
        let bottom = bar_y1 - (height * s) / steps;
        let value = v_min + (v_max - v_min) * s as f64 / (steps - 1) as f64;
        area.draw(&Rectangle::new(
            [(bar_x0, top), (bar_x1, bottom)],
            heat_color(value, v_min, v_max).filled(),
        ))?;
    }
    let bar_font = ("sans-serif", 12).into_font().color(&BLACK);
    area.draw(&Text::new(
        format!("{:.2}", v_max),
        (bar_x1 + 4, bar_y0),
        bar_font.clone().pos(Pos::new(HPos::Left, VPos::Top)),
    ))?;
    area.draw(&Text::new(
        format!("{:.2}", v_min),
        (bar_x1 + 4, bar_y1),
        bar_font.pos(Pos::new(HPos::Left, VPos::Bottom)),
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn square_limits_expands_shorter_x() {
        let ((x0, x1), (y0, y1)) = square_limits((1.0, 2.0), (0.0, 4.0));
        // Y is longer; X grows symmetrically about its midpoint 1.5.
        assert_relative_eq!(x0, -0.5);
        assert_relative_eq!(x1, 3.5);
        assert_relative_eq!(x1 - x0, y1 - y0);
        assert_relative_eq!((x0 + x1) / 2.0, 1.5);
        assert_relative_eq!(y0, 0.0);
        assert_relative_eq!(y1, 4.0);
    }

    #[test]
    fn square_limits_expands_shorter_y() {
        let ((x0, x1), (y0, y1)) = square_limits((-3.0, 3.0), (0.0, 1.0));
        assert_relative_eq!(x0, -3.0);
        assert_relative_eq!(x1, 3.0);
        assert_relative_eq!(y0, -2.5);
        assert_relative_eq!(y1, 3.5);
        assert_relative_eq!((y0 + y1) / 2.0, 0.5);
    }

    #[test]
    fn square_limits_leaves_equal_ranges_alone() {
        let ((x0, x1), (y0, y1)) = square_limits((0.0, 2.0), (5.0, 7.0));
        assert_relative_eq!(x1 - x0, 2.0);
        assert_relative_eq!(y1 - y0, 2.0);
        assert_relative_eq!(y0, 5.0);
        assert_relative_eq!(y1, 7.0);
    }

    #[test]
    fn mask_populates_lower_triangle_only() {
        // Three sites: exactly the row >= col cells are drawn.
        let mut shown = Vec::new();
        for row in 0..3 {
            for col in 0..3 {
                if !cell_masked(row, col) {
                    shown.push((row, col));
                }
            }
        }
        assert_eq!(shown, vec![(0, 0), (1, 0), (1, 1), (2, 0), (2, 1), (2, 2)]);
    }

    #[test]
    fn annotation_color_threshold() {
        assert!(annotation_is_dark(0.41));
        assert!(!annotation_is_dark(0.4));
        assert!(!annotation_is_dark(0.1));
    }
}
