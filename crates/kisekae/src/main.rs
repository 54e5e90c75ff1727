//! Fit garment cutouts onto a person photo from the command line.
//!
//! With `--edit-endpoint` the external synthesis path is used (masked
//! edit, timeout, guarded reconciliation, heuristic fallback); without
//! it the pure heuristic pipeline runs locally and can emit per-stage
//! diagnostics.

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kisekae_pipeline::{
    CanvasSize, FitConfig, FitError, GarmentItem, Point, RegionChoice, decode, flatten,
};
use kisekae_service::{
    FittingPath, FittingRequest, HttpEditClient, HttpRemovalClient, Orchestrator, RemovalService,
    ServiceError,
};

/// Fit garment cutouts onto a person photo.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Person photo path.
    person: PathBuf,

    /// Garment as "CATEGORY=PATH" (e.g. "t-shirt=tee.png"). Repeatable;
    /// layering follows category dressing order, not flag order.
    #[arg(short, long = "garment", value_name = "CATEGORY=PATH")]
    garments: Vec<String>,

    /// Output composite path (PNG).
    #[arg(short, long)]
    output: PathBuf,

    /// Canonical canvas size as "WxH".
    #[arg(long, value_name = "WxH", default_value = "1024x1536")]
    canvas: String,

    /// External edit service endpoint. Heuristic-only when omitted.
    #[arg(long, value_name = "URL")]
    edit_endpoint: Option<String>,

    /// Background-removal endpoint, applied to garment images that
    /// carry no transparency yet.
    #[arg(long, value_name = "URL")]
    removal_endpoint: Option<String>,

    /// External edit timeout in seconds.
    #[arg(long, default_value_t = 45)]
    timeout_secs: u64,

    /// Index of the person to fit when several are detected.
    #[arg(long, value_name = "INDEX")]
    person_index: Option<usize>,

    /// Manual left-shoulder calibration as "X,Y" canvas coordinates.
    /// Requires --right-shoulder; bypasses automatic detection.
    #[arg(long, value_name = "X,Y", requires = "right_shoulder")]
    left_shoulder: Option<String>,

    /// Manual right-shoulder calibration as "X,Y" canvas coordinates.
    #[arg(long, value_name = "X,Y", requires = "left_shoulder")]
    right_shoulder: Option<String>,

    /// Surface external-edit failures instead of falling back to the
    /// heuristic path.
    #[arg(long)]
    no_fallback: bool,

    /// Use garment images as-is, skipping cutout flattening.
    #[arg(long)]
    raw_garments: bool,

    /// Idempotency key forwarded to the orchestrator.
    #[arg(long, value_name = "KEY")]
    idempotency_key: Option<String>,

    /// Write per-stage diagnostics JSON to this path (heuristic path
    /// only).
    #[arg(long, value_name = "PATH")]
    diagnostics: Option<PathBuf>,
}

/// Parse an "X,Y" coordinate pair.
fn parse_point(s: &str) -> Result<Point, String> {
    let (x_str, y_str) = s
        .split_once(',')
        .ok_or_else(|| format!("coordinates must be 'X,Y', got: '{s}'"))?;
    let x: f64 = x_str
        .trim()
        .parse()
        .map_err(|e| format!("invalid X '{x_str}': {e}"))?;
    let y: f64 = y_str
        .trim()
        .parse()
        .map_err(|e| format!("invalid Y '{y_str}': {e}"))?;
    Ok(Point::new(x, y))
}

/// Parse a "WxH" canvas size.
fn parse_canvas(s: &str) -> Result<CanvasSize, String> {
    let (w_str, h_str) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("canvas must be 'WxH', got: '{s}'"))?;
    let width: u32 = w_str
        .trim()
        .parse()
        .map_err(|e| format!("invalid width '{w_str}': {e}"))?;
    let height: u32 = h_str
        .trim()
        .parse()
        .map_err(|e| format!("invalid height '{h_str}': {e}"))?;
    CanvasSize::new(width, height).map_err(|e| e.to_string())
}

/// Parse a "CATEGORY=PATH" garment specification.
fn parse_garment_spec(s: &str) -> Result<(String, PathBuf), String> {
    let (category, path) = s
        .split_once('=')
        .ok_or_else(|| format!("garment must be 'CATEGORY=PATH', got: '{s}'"))?;
    if category.trim().is_empty() {
        return Err(format!("empty category in garment spec '{s}'"));
    }
    Ok((category.trim().to_owned(), PathBuf::from(path)))
}

/// Load one garment: decode, remove background if needed and possible,
/// flatten onto the standard square cutout canvas.
async fn load_garment(
    spec: &str,
    removal: Option<&HttpRemovalClient>,
    raw: bool,
) -> Result<GarmentItem, Box<dyn std::error::Error>> {
    let (category, path) = parse_garment_spec(spec)?;
    let bytes = std::fs::read(&path)?;
    let mut image = decode::decode_rgba(&bytes)?;

    if !decode::has_alpha(&image) {
        if let Some(client) = removal {
            info!(path = %path.display(), "garment has no transparency; removing background");
            image = client.remove_background(&bytes).await?;
        } else {
            warn!(
                path = %path.display(),
                "garment has no transparency and no removal endpoint; placing it as-is",
            );
        }
    }

    if !raw {
        match flatten::flatten_cutout(
            &image,
            flatten::DEFAULT_CANVAS_SIDE,
            flatten::DEFAULT_PADDING_RATIO,
            flatten::DEFAULT_ALPHA_THRESHOLD,
        ) {
            Ok(flattened) => image = flattened,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "flattening skipped");
            }
        }
    }

    Ok(GarmentItem::new(
        path.file_stem()
            .map_or_else(|| spec.to_owned(), |stem| stem.to_string_lossy().into_owned()),
        &category,
        image,
    ))
}

/// Print detected candidates when disambiguation is required.
fn report_ambiguity(regions: &[kisekae_pipeline::HumanRegion]) {
    warn!(
        candidates = regions.len(),
        "several people detected; re-run with --person-index",
    );
    for (index, region) in regions.iter().enumerate() {
        let center = region.center();
        info!(
            index,
            center_x = center.x,
            center_y = center.y,
            width = region.width(),
            height = region.height(),
            "candidate region",
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let canvas = parse_canvas(&args.canvas).map_err(|e| format!("--canvas: {e}"))?;
    let config = FitConfig {
        canvas,
        ..FitConfig::default()
    };

    let choice = RegionChoice {
        selected: args.person_index,
        manual_shoulders: match (&args.left_shoulder, &args.right_shoulder) {
            (Some(left), Some(right)) => Some((
                parse_point(left).map_err(|e| format!("--left-shoulder: {e}"))?,
                parse_point(right).map_err(|e| format!("--right-shoulder: {e}"))?,
            )),
            _ => None,
        },
    };

    info!(person = %args.person.display(), "reading person photo");
    let person_bytes = std::fs::read(&args.person)?;

    let removal_client = args.removal_endpoint.as_deref().map(HttpRemovalClient::new);
    let mut garments = Vec::with_capacity(args.garments.len());
    for spec in &args.garments {
        garments.push(load_garment(spec, removal_client.as_ref(), args.raw_garments).await?);
    }
    info!(garments = garments.len(), "garments prepared");

    let composite = if args.edit_endpoint.is_some() {
        let edit_client = args.edit_endpoint.as_deref().map(HttpEditClient::new);
        let mut orchestrator = Orchestrator::new(edit_client, config)
            .with_timeout(std::time::Duration::from_secs(args.timeout_secs));
        let request = FittingRequest {
            choice,
            idempotency_key: args.idempotency_key.clone(),
            allow_fallback: !args.no_fallback,
            ..FittingRequest::new(person_bytes, garments)
        };

        match orchestrator.run(&request).await {
            Ok(outcome) => {
                let path_name = match outcome.path {
                    FittingPath::External => "external edit",
                    FittingPath::Heuristic => "heuristic fallback",
                };
                info!(path = path_name, "fitting complete");
                outcome.composite
            }
            Err(ServiceError::Pipeline(FitError::AmbiguousHumanRegion { regions })) => {
                report_ambiguity(&regions);
                return Err("ambiguous human region".into());
            }
            Err(err) => return Err(err.into()),
        }
    } else {
        match kisekae_pipeline::compose_staged(&person_bytes, &garments, &config, &choice) {
            Ok(outcome) => {
                info!(
                    regions = outcome.regions.len(),
                    total_secs = outcome.diagnostics.total_duration.as_secs_f64(),
                    "heuristic fitting complete",
                );
                if let Some(path) = &args.diagnostics {
                    std::fs::write(path, serde_json::to_vec_pretty(&outcome.diagnostics)?)?;
                    info!(path = %path.display(), "diagnostics written");
                }
                outcome.composite
            }
            Err(FitError::AmbiguousHumanRegion { regions }) => {
                report_ambiguity(&regions);
                return Err("ambiguous human region".into());
            }
            Err(err) => return Err(err.into()),
        }
    };

    std::fs::write(&args.output, decode::encode_png(&composite)?)?;
    info!(output = %args.output.display(), "composite written");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_point_accepts_spaces() {
        let p = parse_point(" 120.5 , 300 ").unwrap();
        assert!((p.x - 120.5).abs() < f64::EPSILON);
        assert!((p.y - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_point_rejects_garbage() {
        assert!(parse_point("120").is_err());
        assert!(parse_point("a,b").is_err());
    }

    #[test]
    fn parse_canvas_accepts_both_separators() {
        assert_eq!(parse_canvas("1024x1536").unwrap(), CanvasSize::PORTRAIT);
        assert_eq!(parse_canvas("1024X1536").unwrap(), CanvasSize::PORTRAIT);
    }

    #[test]
    fn parse_canvas_rejects_zero() {
        assert!(parse_canvas("0x100").is_err());
        assert!(parse_canvas("100").is_err());
    }

    #[test]
    fn parse_garment_spec_splits_on_first_equals() {
        let (category, path) = parse_garment_spec("t-shirt=dir/tee=v2.png").unwrap();
        assert_eq!(category, "t-shirt");
        assert_eq!(path, PathBuf::from("dir/tee=v2.png"));
    }

    #[test]
    fn parse_garment_spec_rejects_missing_parts() {
        assert!(parse_garment_spec("tee.png").is_err());
        assert!(parse_garment_spec("=tee.png").is_err());
    }
}
