use std::io::Cursor;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::*;
use crate::drivers::{AnalyzerError, RenderSnapshot};
#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub adc1_color: RGBColor,
    pub adc2_color: RGBColor,
    pub peak_color: RGBColor,
    /// Caption, axis labels and legend need a system font.
    pub draw_labels: bool,
}
impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 500,
            background: RGBColor(10, 10, 10),
            adc1_color: BLUE,
            adc2_color: GREEN,
            peak_color: RED,
            draw_labels: true,
        }
    }
}
/// Draw both channels of `snapshot` and their peak markers into a PNG.
pub fn render_snapshot_png(
    snapshot: &RenderSnapshot,
    style: &PlotStyle,
) -> Result<Vec<u8>, AnalyzerError> {
    if snapshot.is_empty() {
        return Err(AnalyzerError::Plot("snapshot has no samples".into()));
    }
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let (y_min, y_max) = snapshot
            .adc1_samples
            .iter()
            .chain(&snapshot.adc2_samples)
            .fold((f64::MAX, f64::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let y_bounds = if (y_max - y_min).abs() < f64::EPSILON {
            (y_min - 50.0, y_max + 50.0)
        } else {
            (y_min, y_max)
        };
        let (t0, t1) = snapshot.window;
        let x_bounds = if (t1 - t0).abs() < f64::EPSILON {
            (t0, t0 + 1.0)
        } else {
            (t0, t1)
        };
        let mut builder = ChartBuilder::on(&root);
        builder.margin(10);
        if style.draw_labels {
            builder
                .caption(
                    "Dual ADC Signal Analyzer",
                    ("sans-serif", 20).into_font().color(&WHITE),
                )
                .set_label_area_size(LabelAreaPosition::Left, 45)
                .set_label_area_size(LabelAreaPosition::Bottom, 40);
        }
        let mut chart =
            builder.build_cartesian_2d(x_bounds.0..x_bounds.1, y_bounds.0..y_bounds.1)?;
        if style.draw_labels {
            chart
                .configure_mesh()
                .x_desc("Time (s)")
                .y_desc("ADC Value")
                .light_line_style(&WHITE.mix(0.1))
                .draw()?;
        }
        let channels = [
            (
                "ADC1",
                &snapshot.adc1_samples,
                &snapshot.adc1_peak_positions,
                style.adc1_color,
            ),
            (
                "ADC2",
                &snapshot.adc2_samples,
                &snapshot.adc2_peak_positions,
                style.adc2_color,
            ),
        ];
        for (label, samples, peaks, color) in channels {
            let line = RenderSnapshot::line_points(samples, &snapshot.time_axis);
            let series = chart.draw_series(LineSeries::new(
                line.into_iter().map(|[t, v]| (t, v)),
                &color,
            ))?;
            if style.draw_labels {
                series
                    .label(format!("{label} Signal"))
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
            }
            let markers = RenderSnapshot::peak_points(samples, &snapshot.time_axis, peaks);
            let peak_color = style.peak_color;
            chart.draw_series(
                markers
                    .into_iter()
                    .map(|[t, v]| Cross::new((t, v), 6, peak_color.stroke_width(2))),
            )?;
        }
        if style.draw_labels {
            chart
                .configure_series_labels()
                .border_style(&WHITE.mix(0.2))
                .background_style(&style.background)
                .draw()?;
        }
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}
fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, AnalyzerError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| AnalyzerError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
