use textplots::{Chart, Plot, Shape};

use crate::types::Capture;

/// Most points handed to the chart per channel
const MAX_POINTS: usize = 2000;

/// Reduce samples to at most `max_points` `(index, code)` pairs by striding
fn decimate(samples: &[u8], max_points: usize) -> Vec<(f32, f32)> {
    let stride = samples.len().div_ceil(max_points.max(1)).max(1);
    samples
        .iter()
        .enumerate()
        .step_by(stride)
        .map(|(i, &code)| (i as f32, code as f32))
        .collect()
}

/// Print every channel of a capture as a terminal line chart
///
/// # Arguments
/// * `capture` - The capture to plot
/// * `width` - Optional plot width (default: 140)
/// * `height` - Optional plot height (default: 40)
pub fn plot_capture(
    capture: &Capture,
    width: Option<usize>,
    height: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    if capture.sample_count() == 0 {
        return Err("Cannot plot an empty capture".into());
    }

    let width = width.unwrap_or(140);
    let height = height.unwrap_or(40);

    println!(
        "Capture at {} | {} channel(s)",
        capture.acquired_at().format("%Y-%m-%d %H:%M:%S%.3f"),
        capture.channel_count()
    );

    for (channel, samples) in capture.iter() {
        if samples.is_empty() {
            continue;
        }

        let frame = decimate(samples, MAX_POINTS);
        let max_index = (samples.len() - 1).max(1) as f32;
        let min_code = samples.iter().copied().min().unwrap_or(0);
        let max_code = samples.iter().copied().max().unwrap_or(0);

        println!(
            "{channel}: {} samples | codes {min_code} to {max_code}",
            samples.len()
        );
        println!("{}", "─".repeat(width));

        Chart::new(width as u32, height as u32, 0.0, max_index)
            .lineplot(&Shape::Lines(&frame))
            .nice();
    }

    println!("Sample Index →");

    Ok(())
}
