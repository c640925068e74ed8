//! `DataVisualization`: renders bar, line, scatter and pie charts to PNG.
//!
//! Input is `"<kind>|<data>|<title>"` where `data` is a flat
//! `label,value,label,value,…` list.  The chart is written to
//! `<visualizations dir>/<sanitized title>.png`; a repeated title
//! overwrites the previous file.

use std::f64::consts::PI;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::tools::{sanitize_title, Tool, ToolMeta};

const WIDTH: u32 = 1000;
const HEIGHT: u32 = 600;

/// Input-format errors.  The `Display` text is what the caller sees.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChartError {
    #[error("Error: Format should be 'type|data|title'")]
    Format,
    #[error("Error: Data should be comma-separated x,y pairs")]
    OddData,
    #[error("Error creating visualization: invalid number '{0}'")]
    InvalidNumber(String),
    #[error("Error: Unsupported visualization type '{0}'")]
    UnsupportedKind(String),
    #[error("Error creating visualization: pie charts need non-negative values with a positive total")]
    PieValues,
}

/// Rejected at render time, before the output file is created.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("values span too wide to plot")]
pub struct RangeOverflow;


/// Supported chart kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Line,
    Scatter,
    Pie,
}

impl ChartKind {
    /// Case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "bar" => Some(ChartKind::Bar),
            "line" => Some(ChartKind::Line),
            "scatter" => Some(ChartKind::Scatter),
            "pie" => Some(ChartKind::Pie),
            _ => None,
        }
    }
}

/// A validated render request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartRequest {
    pub kind: ChartKind,
    pub points: Vec<(String, f64)>,
    pub title: String,
}

impl ChartRequest {
    /// Parse `"<kind>|<data>|<title>"`.
    ///
    /// Checks run in a fixed order: part count, even token count, numeric
    /// values, then the kind.  `inf` and `nan` are not numbers here.
    pub fn parse(input: &str) -> Result<Self, ChartError> {
        let mut parts = input.trim().splitn(3, '|');
        let (Some(kind), Some(data), Some(title)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(ChartError::Format);
        };

        let tokens: Vec<&str> = data.split(',').collect();
        if tokens.len() % 2 != 0 {
            return Err(ChartError::OddData);
        }

        let points = tokens
            .chunks(2)
            .map(|pair| {
                let raw = pair[1].trim();
                let value = raw
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| ChartError::InvalidNumber(raw.to_string()))?;
                Ok((pair[0].trim().to_string(), value))
            })
            .collect::<Result<Vec<_>, ChartError>>()?;

        let kind =
            ChartKind::parse(kind).ok_or_else(|| ChartError::UnsupportedKind(kind.to_string()))?;

        if kind == ChartKind::Pie {
            let total: f64 = points.iter().map(|(_, v)| v).sum();
            if points.iter().any(|(_, v)| *v < 0.0) || !total.is_finite() || total <= 0.0 {
                return Err(ChartError::PieValues);
            }
        }

        Ok(Self {
            kind,
            points,
            title: title.to_string(),
        })
    }
}

// ── Fonts ────────────────────────────────────────────────────

const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

static FONT_READY: OnceLock<bool> = OnceLock::new();

/// Register the first available system font as `sans-serif`, once per
/// process.  Returns whether text can be drawn.
fn text_available() -> bool {
    *FONT_READY.get_or_init(|| {
        for path in FONT_CANDIDATES {
            let Ok(bytes) = std::fs::read(path) else {
                continue;
            };
            let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            if plotters::style::register_font("sans-serif", plotters::style::FontStyle::Normal, bytes).is_ok() {
                tracing::debug!(font = path, "chart font registered");
                return true;
            }
        }
        tracing::warn!("no TrueType font found; charts will be drawn without text");
        false
    })
}

fn draw_err(e: impl std::fmt::Display) -> anyhow::Error {
    anyhow::anyhow!("{e}")
}

// ── Renderer ─────────────────────────────────────────────────

/// Writes charts into one directory.
#[derive(Debug, Clone)]
pub struct ChartRenderer {
    dir: PathBuf,
}

impl ChartRenderer {
    /// Create the renderer, creating `dir` if it does not exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "cannot create visualizations directory");
        }
        Self { dir }
    }

    /// Deterministic output path for a title.
    pub fn output_path(&self, title: &str) -> PathBuf {
        self.dir.join(format!("{}.png", sanitize_title(title)))
    }

    /// Render `req` and return the written path.  Blocking.
    pub fn render(&self, req: &ChartRequest) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.output_path(&req.title);
        let y_range = match req.kind {
            ChartKind::Pie => None,
            _ => Some(value_range(req.points.iter().map(|(_, v)| *v))?),
        };
        let text = text_available();
        {
            let root = BitMapBackend::new(&path, (WIDTH, HEIGHT)).into_drawing_area();
            root.fill(&WHITE).map_err(draw_err)?;
            match y_range {
                None => draw_pie(&root, req, text)?,
                Some(range) => draw_cartesian(&root, req, req.kind, range, text)?,
            }
            root.present().map_err(draw_err)?;
        }
        tracing::info!(path = %path.display(), kind = ?req.kind, "chart rendered");
        Ok(path)
    }
}

/// Y-axis range that always includes zero, padded by 10 %.  Fails when the
/// padded range is not representable.
fn value_range(values: impl Iterator<Item = f64>) -> Result<(f64, f64), RangeOverflow> {
    let (mut lo, mut hi) = (0.0f64, 0.0f64);
    for v in values {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    let span = hi - lo;
    if !span.is_finite() {
        return Err(RangeOverflow);
    }
    if span < f64::EPSILON {
        return Ok((-1.0, 1.0));
    }
    let pad = span * 0.1;
    let range = (if lo < 0.0 { lo - pad } else { lo }, hi + pad);
    if range.0.is_finite() && range.1.is_finite() {
        Ok(range)
    } else {
        Err(RangeOverflow)
    }
}

fn draw_cartesian(
    root: &DrawingArea<BitMapBackend<'_>, plotters::coord::Shift>,
    req: &ChartRequest,
    kind: ChartKind,
    (y_lo, y_hi): (f64, f64),
    text: bool,
) -> anyhow::Result<()> {
    let n = req.points.len();
    let x_hi = n.max(1) as f64 - 0.5;

    let mut builder = ChartBuilder::on(root);
    builder.margin(20);
    if text {
        builder
            .caption(&req.title, ("sans-serif", 28))
            .x_label_area_size(40)
            .y_label_area_size(60);
    }
    let mut chart = builder
        .build_cartesian_2d(-0.5f64..x_hi, y_lo..y_hi)
        .map_err(draw_err)?;

    if text {
        let labels: Vec<&str> = req.points.iter().map(|(l, _)| l.as_str()).collect();
        let label_for = |x: &f64| {
            let i = x.round();
            if (x - i).abs() < 1e-6 && i >= 0.0 && (i as usize) < labels.len() {
                labels[i as usize].to_string()
            } else {
                String::new()
            }
        };
        chart
            .configure_mesh()
            .x_labels(n.max(1))
            .x_label_formatter(&label_for)
            .draw()
            .map_err(draw_err)?;
    }

    let coords: Vec<(f64, f64)> = req
        .points
        .iter()
        .enumerate()
        .map(|(i, (_, v))| (i as f64, *v))
        .collect();

    match kind {
        ChartKind::Bar => {
            chart
                .draw_series(coords.iter().map(|&(x, y)| {
                    Rectangle::new([(x - 0.4, 0.0), (x + 0.4, y)], BLUE.mix(0.8).filled())
                }))
                .map_err(draw_err)?;
        }
        ChartKind::Line => {
            chart
                .draw_series(LineSeries::new(coords.iter().copied(), BLUE.stroke_width(2)))
                .map_err(draw_err)?;
            chart
                .draw_series(coords.iter().map(|&c| Circle::new(c, 5, BLUE.filled())))
                .map_err(draw_err)?;
        }
        ChartKind::Scatter => {
            chart
                .draw_series(coords.iter().map(|&c| Circle::new(c, 5, BLUE.filled())))
                .map_err(draw_err)?;
        }
        ChartKind::Pie => unreachable!("pie charts are drawn by draw_pie"),
    }
    Ok(())
}

fn draw_pie(
    root: &DrawingArea<BitMapBackend<'_>, plotters::coord::Shift>,
    req: &ChartRequest,
    text: bool,
) -> anyhow::Result<()> {
    let area = if text {
        root.titled(&req.title, ("sans-serif", 28)).map_err(draw_err)?
    } else {
        root.clone()
    };
    let (w, h) = area.dim_in_pixel();
    let (cx, cy) = (f64::from(w) / 2.0, f64::from(h) / 2.0);
    let radius = f64::from(w.min(h)) * 0.38;
    let total: f64 = req.points.iter().map(|(_, v)| v).sum();

    let centered =
        |font: FontDesc<'static>| TextStyle::from(font).pos(Pos::new(HPos::Center, VPos::Center));
    let at = |angle: f64, r: f64| {
        (
            (cx + r * angle.cos()).round() as i32,
            (cy + r * angle.sin()).round() as i32,
        )
    };

    // Counter-clockwise from three o'clock.
    let mut angle = 0.0f64;
    for (i, (label, value)) in req.points.iter().enumerate() {
        let sweep = value / total * 2.0 * PI;
        if sweep <= 0.0 {
            continue;
        }
        let steps = ((sweep / (2.0 * PI)) * 360.0).ceil().max(2.0) as usize;
        let mut outline = Vec::with_capacity(steps + 2);
        outline.push((cx.round() as i32, cy.round() as i32));
        for s in 0..=steps {
            outline.push(at(-(angle + sweep * s as f64 / steps as f64), radius));
        }
        area.draw(&Polygon::new(outline, Palette99::pick(i).filled()))
            .map_err(draw_err)?;

        if text {
            let mid = -(angle + sweep / 2.0);
            let label_style = centered(("sans-serif", 18).into_font());
            area.draw(&Text::new(label.clone(), at(mid, radius * 1.15), label_style))
                .map_err(draw_err)?;
            let pct = format!("{:.1}%", value / total * 100.0);
            let pct_style = centered(("sans-serif", 16).into_font());
            area.draw(&Text::new(pct, at(mid, radius * 0.6), pct_style))
                .map_err(draw_err)?;
        }
        angle += sweep;
    }
    Ok(())
}

// ── Tool adapter ─────────────────────────────────────────────

/// The `DataVisualization` tool.
pub struct ChartTool {
    renderer: Arc<ChartRenderer>,
}

impl ChartTool {
    /// Builds the renderer, which creates `dir` immediately.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            renderer: Arc::new(ChartRenderer::new(dir)),
        }
    }

    /// Validate, render on a blocking thread, and describe the outcome.
    pub async fn create_visualization(&self, input: &str) -> String {
        let req = match ChartRequest::parse(input) {
            Ok(r) => r,
            Err(e) => return e.to_string(),
        };
        let renderer = Arc::clone(&self.renderer);
        describe(tokio::task::spawn_blocking(move || renderer.render(&req)).await)
    }
}

/// Outcome text of a blocking render.  A panicked render task is reported
/// like any other failure.
fn describe(outcome: Result<anyhow::Result<PathBuf>, tokio::task::JoinError>) -> String {
    match outcome {
        Ok(Ok(path)) => format!("Visualization created and saved as {}", path.display()),
        Ok(Err(e)) => format!("Error creating visualization: {e:#}"),
        Err(e) => format!("Error creating visualization: {e}"),
    }
}

#[async_trait]
impl Tool for ChartTool {
    fn meta(&self) -> ToolMeta {
        ToolMeta {
            name: "DataVisualization".into(),
            description: "Create data visualizations. Input format should be 'type|data|title' where:\n\
                - type: bar, line, scatter, or pie\n\
                - data: comma-separated values for x:y pairs (x1,y1,x2,y2,...)\n\
                - title: chart title\n\
                Example: 'bar|Jan,10,Feb,15,Mar,7,Apr,22|Monthly Sales'"
                .into(),
        }
    }

    async fn invoke(&self, input: &str) -> String {
        self.create_visualization(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_request() {
        let req = ChartRequest::parse("Bar|Jan,10,Feb, 15.5|Monthly Sales").unwrap();
        assert_eq!(req.kind, ChartKind::Bar);
        assert_eq!(
            req.points,
            vec![("Jan".to_string(), 10.0), ("Feb".to_string(), 15.5)]
        );
        assert_eq!(req.title, "Monthly Sales");
    }

    #[test]
    fn title_keeps_extra_pipes() {
        let req = ChartRequest::parse("line|a,1|x|y").unwrap();
        assert_eq!(req.title, "x|y");
    }

    #[test]
    fn parse_errors_in_order() {
        assert_eq!(ChartRequest::parse("bar|a,1"), Err(ChartError::Format));
        assert_eq!(ChartRequest::parse("donut|a,1,b|t"), Err(ChartError::OddData));
        assert_eq!(
            ChartRequest::parse("donut|a,x|t"),
            Err(ChartError::InvalidNumber("x".into()))
        );
        assert_eq!(
            ChartRequest::parse("donut|a,1|t"),
            Err(ChartError::UnsupportedKind("donut".into()))
        );
    }

    #[test]
    fn empty_data_is_odd() {
        assert_eq!(ChartRequest::parse("bar||t"), Err(ChartError::OddData));
    }

    #[test]
    fn pie_rejects_negative_or_zero_total() {
        assert_eq!(ChartRequest::parse("pie|a,-1,b,2|t"), Err(ChartError::PieValues));
        assert_eq!(ChartRequest::parse("pie|a,0,b,0|t"), Err(ChartError::PieValues));
        assert_eq!(
            ChartRequest::parse("pie|a,1e308,b,1e308|t"),
            Err(ChartError::PieValues)
        );
        assert!(ChartRequest::parse("pie|a,0,b,2|t").is_ok());
    }

    #[test]
    fn value_range_includes_zero() {
        assert_eq!(value_range([5.0, 10.0].into_iter()), Ok((0.0, 11.0)));
        let (lo, hi) = value_range([-10.0, 10.0].into_iter()).unwrap();
        assert!(lo < -10.0 && hi > 10.0);
        assert_eq!(value_range([0.0].into_iter()), Ok((-1.0, 1.0)));
    }

    #[test]
    fn value_range_rejects_overflow() {
        assert_eq!(value_range([1e308, -1e308].into_iter()), Err(RangeOverflow));
        assert_eq!(value_range([f64::MAX].into_iter()), Err(RangeOverflow));
    }

    #[test]
    fn non_finite_values_are_not_numbers() {
        for token in ["inf", "-inf", "nan", "infinity"] {
            assert_eq!(
                ChartRequest::parse(&format!("bar|a,{token}|t")),
                Err(ChartError::InvalidNumber(token.into()))
            );
        }
    }

    #[tokio::test]
    async fn panicked_render_is_reported() {
        let outcome = tokio::task::spawn_blocking(|| -> anyhow::Result<PathBuf> {
            panic!("renderer blew up")
        })
        .await;
        let out = describe(outcome);
        assert!(out.starts_with("Error creating visualization: "), "{out}");
    }

    #[tokio::test]
    async fn unplottable_values_return_error_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ChartTool::new(dir.path());
        for input in [
            "bar|a,inf|t",
            "bar|a,-inf|t",
            "line|a,1e308,b,-1e308|t",
            "pie|a,1e308,b,1e308|t",
        ] {
            let out = tokio::time::timeout(
                std::time::Duration::from_secs(10),
                tool.create_visualization(input),
            )
            .await
            .expect("chart tool should answer promptly");
            assert!(out.starts_with("Error creating visualization: "), "{input}: {out}");
            assert!(!dir.path().join("t.png").exists(), "{input}");
        }
    }

    #[test]
    fn output_path_is_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let r = ChartRenderer::new(dir.path());
        assert_eq!(r.output_path("Monthly Sales"), dir.path().join("Monthly_Sales.png"));
    }

    #[test]
    fn construction_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let viz = dir.path().join("visualizations");
        let _tool = ChartTool::new(&viz);
        assert!(viz.is_dir());
    }

    #[tokio::test]
    async fn renders_every_kind() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ChartTool::new(dir.path());
        for kind in ["bar", "line", "scatter", "pie"] {
            let out = tool
                .create_visualization(&format!("{kind}|a,1,b,2,c,3|chart {kind}"))
                .await;
            let path = dir.path().join(format!("chart_{kind}.png"));
            assert!(out.contains(&path.display().to_string()), "{out}");
            let bytes = std::fs::read(&path).unwrap();
            assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        }
    }
}
