//! Scatter plot rendering of cluster assignments into inline PNG payloads

use std::io::Cursor;
use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{ImageFormat, RgbImage};
use ndarray::ArrayView1;
use plotters::prelude::*;
use plotters::style::register_font;

use crate::data::ReferenceDataset;
use crate::error::ServiceError;
use crate::model::ClusterAssignment;

/// MIME type of every payload produced here
pub const PNG_MIME_TYPE: &str = "image/png";

/// Font family used for the caption and axis labels
const FONT_FAMILY: &str = "sans-serif";

/// Bundled DejaVu Sans, so text renders without system fonts
static FONT_BYTES: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

static FONT_REGISTRATION: OnceLock<Result<(), String>> = OnceLock::new();

/// Ten evenly spaced stops of the viridis colormap
const CLUSTER_PALETTE: [RGBColor; 10] = [
    RGBColor(0x44, 0x01, 0x54),
    RGBColor(0x48, 0x28, 0x78),
    RGBColor(0x3e, 0x49, 0x89),
    RGBColor(0x31, 0x68, 0x8e),
    RGBColor(0x26, 0x82, 0x8e),
    RGBColor(0x1f, 0x9e, 0x89),
    RGBColor(0x35, 0xb7, 0x79),
    RGBColor(0x6e, 0xce, 0x58),
    RGBColor(0xb5, 0xde, 0x2b),
    RGBColor(0xfd, 0xe7, 0x25),
];

/// Plot dimensions and marker size
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    /// Radius of each point marker in pixels
    pub point_radius: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 600,
            height: 400,
            point_radius: 4,
        }
    }
}

/// Encoded image bytes with their MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            mime_type: PNG_MIME_TYPE,
            bytes,
        }
    }

    /// Self-contained `data:` URI suitable for inline embedding
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

/// Color of a cluster id, sampled across the palette according to `k`
pub fn cluster_color(cluster_id: usize, k: usize) -> RGBColor {
    let last = CLUSTER_PALETTE.len() - 1;
    if k <= 1 {
        return CLUSTER_PALETTE[0];
    }
    let idx = (cluster_id * last + (k - 1) / 2) / (k - 1);
    CLUSTER_PALETTE[idx.min(last)]
}

/// Render a sepal length / sepal width scatter plot colored by cluster
///
/// # Arguments
/// * `dataset` - Reference points; only the first two features are drawn
/// * `assignment` - Cluster id of every point
/// * `k` - Cluster count, drives the color mapping
/// * `config` - Image size and marker radius
///
/// # Returns
/// * PNG `ImagePayload`. The pixel buffer and drawing area live only for
///   the duration of this call.
pub fn render(
    dataset: &ReferenceDataset,
    assignment: &ClusterAssignment,
    k: usize,
    config: &RenderConfig,
) -> crate::Result<ImagePayload> {
    if assignment.len() != dataset.len() {
        return Err(ServiceError::render(format!(
            "assignment has {} labels for {} points",
            assignment.len(),
            dataset.len()
        )));
    }
    if config.width == 0 || config.height == 0 {
        return Err(ServiceError::render("image dimensions must be non-zero"));
    }

    ensure_font_registered()?;

    let mut pixels = vec![0u8; config.width as usize * config.height as usize * 3];
    draw_scatter(&mut pixels, dataset, assignment, k, config).map_err(ServiceError::render)?;

    let png = encode_png(pixels, config.width, config.height)?;
    log::debug!("Rendered k={} cluster plot ({} PNG bytes)", k, png.len());

    Ok(ImagePayload::png(png))
}

fn draw_scatter(
    pixels: &mut [u8],
    dataset: &ReferenceDataset,
    assignment: &ClusterAssignment,
    k: usize,
    config: &RenderConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let sepal_length = dataset.column(0);
    let sepal_width = dataset.column(1);
    let x_range = padded_range(&sepal_length);
    let y_range = padded_range(&sepal_width);

    let root = BitMapBackend::with_buffer(pixels, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("K-Means Clusters (k={})", k), (FONT_FAMILY, 20))
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(40)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_desc("Sepal Length")
        .y_desc("Sepal Width")
        .axis_desc_style((FONT_FAMILY, 14))
        .draw()?;

    let radius = config.point_radius;
    chart.draw_series(
        sepal_length
            .iter()
            .zip(sepal_width.iter())
            .zip(assignment.labels.iter())
            .map(|((&x, &y), &label)| Circle::new((x, y), radius, cluster_color(label, k).filled())),
    )?;

    root.present()?;
    Ok(())
}

fn ensure_font_registered() -> crate::Result<()> {
    FONT_REGISTRATION
        .get_or_init(|| {
            register_font(FONT_FAMILY, FontStyle::Normal, FONT_BYTES)
                .map_err(|_| "bundled font could not be loaded".to_string())
        })
        .clone()
        .map_err(ServiceError::render)
}

/// Data bounds widened by 5% on each side
fn padded_range(values: &ArrayView1<f64>) -> std::ops::Range<f64> {
    let min = values.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max = values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let pad = if max > min { (max - min) * 0.05 } else { 0.5 };
    (min - pad)..(max + pad)
}

fn encode_png(pixels: Vec<u8>, width: u32, height: u32) -> crate::Result<Vec<u8>> {
    let image = RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| ServiceError::render("pixel buffer does not match image dimensions"))?;

    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(ServiceError::render)?;
    Ok(png)
}
