//! Category-driven garment placement and compositing.
//!
//! Maps each garment's category to a target rectangle relative to the
//! active pose keypoints, layers garments back-to-front by category
//! z-priority, and draws each one with an aspect-preserving letterbox
//! fit plus a thin synthetic shadow along the lower and trailing edges.
//!
//! Every function here is pure over immutable buffers: each draw takes
//! a canvas in and returns a new canvas out, so a garment that fails to
//! fit contributes nothing without corrupting the rest. Given the same
//! (canvas size, pose, garment list) the output is identical down to
//! the pixel -- there is no randomness anywhere in this module.

use image::imageops::{self, FilterType};

use crate::garment::{GarmentCategory, GarmentItem};
use crate::types::{CanvasSize, PoseKeypoints, RgbaImage};

/// Shadow band half-thickness in pixels.
const SHADOW_OFFSET: f64 = 2.0;

/// Channel multiplier inside shadow bands (~15% darkening).
const SHADOW_FACTOR: u16 = 217;

/// A target placement rectangle in canvas coordinates.
///
/// May extend past the canvas; it is clipped before any pixel work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PlacementRect {
    /// Intersect with the canvas, returning integer pixel bounds.
    ///
    /// `None` when the rectangle is degenerate or lies entirely
    /// outside the canvas.
    #[must_use]
    pub fn clip(&self, canvas: CanvasSize) -> Option<ClippedRect> {
        let x0 = self.x.max(0.0);
        let y0 = self.y.max(0.0);
        let x1 = (self.x + self.width).min(canvas.w());
        let y1 = (self.y + self.height).min(canvas.h());
        if x1 - x0 < 1.0 || y1 - y0 < 1.0 {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let clipped = ClippedRect {
            x: x0.floor() as u32,
            y: y0.floor() as u32,
            width: (x1 - x0).round().max(1.0) as u32,
            height: (y1 - y0).round().max(1.0) as u32,
        };
        Some(clipped)
    }
}

/// A placement rectangle clipped to canvas bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClippedRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Compute the target rectangle for a category under the active pose.
///
/// The strategy table anchors upper-body categories at the shoulder
/// center (width a multiple of the shoulder span, bulkier categories
/// wider and longer) and lower-body categories at the hip center. When
/// a needed keypoint is missing -- or the shoulder span is degenerate --
/// the canvas-proportional default for the category is used instead,
/// so placement never fails.
///
/// Face-protection invariant: whenever shoulders are known, the
/// rectangle's top edge is clamped to be no higher than the
/// shoulder-center Y, regardless of which branch produced it.
#[must_use = "returns the placement rectangle"]
pub fn placement_rect(
    category: GarmentCategory,
    pose: &PoseKeypoints,
    canvas: CanvasSize,
) -> PlacementRect {
    let shoulders = pose
        .shoulder_line()
        .filter(|(_, span)| *span > f64::EPSILON);

    let mut rect = match shoulders {
        Some((center, span)) => pose_rect(category, pose, center, span)
            .unwrap_or_else(|| default_rect(category, canvas)),
        None => default_rect(category, canvas),
    };

    if let Some((center, _)) = shoulders {
        rect.y = rect.y.max(center.y);
    }
    rect
}

/// Pose-anchored geometry per category. `None` for the categories that
/// always use canvas-proportional placement (accessories, bags, and the
/// default bucket).
fn pose_rect(
    category: GarmentCategory,
    pose: &PoseKeypoints,
    shoulder_center: crate::types::Point,
    span: f64,
) -> Option<PlacementRect> {
    let (cx, sy) = (shoulder_center.x, shoulder_center.y);

    // Upper-body rectangles: (width multiple, height multiple) of the
    // shoulder span. Bulkier categories get wider and longer boxes.
    let upper = |w_mul: f64, h_mul: f64| PlacementRect {
        x: cx - span * w_mul / 2.0,
        y: sy,
        width: span * w_mul,
        height: span * h_mul,
    };

    // Lower-body anchor, with shoulder-relative fallbacks when the
    // hips were not derived.
    let (hip_center, hip_span) = pose.hip_line().unwrap_or((
        crate::types::Point::new(cx, sy + span * 1.2),
        span,
    ));
    let knee_drop = pose.left_knee.map(|knee| (knee.y - hip_center.y).abs());
    let ankle_drop = pose.left_ankle.map(|ankle| (ankle.y - hip_center.y).abs());

    match category {
        GarmentCategory::Underwear => Some(upper(1.4, 0.7)),
        GarmentCategory::TShirt | GarmentCategory::Shirt | GarmentCategory::Knit => {
            Some(upper(1.7, 0.85))
        }
        GarmentCategory::Hoodie => Some(upper(1.6, 1.0)),
        GarmentCategory::Jacket => Some(upper(1.8, 1.2)),
        GarmentCategory::Puffer => Some(upper(1.8, 1.4)),
        GarmentCategory::Coat => Some(upper(1.8, 1.6)),
        GarmentCategory::Dress => {
            let height = knee_drop.map_or(span * 2.0, |drop| {
                (hip_center.y + drop - sy) + span * 0.2
            });
            Some(PlacementRect {
                x: cx - span * 0.8,
                y: sy,
                width: span * 1.6,
                height,
            })
        }
        GarmentCategory::Pants => Some(PlacementRect {
            x: hip_center.x - hip_span * 0.4,
            y: hip_center.y,
            width: hip_span * 0.8,
            height: ankle_drop.unwrap_or(span * 1.5),
        }),
        GarmentCategory::Shorts => Some(PlacementRect {
            x: hip_center.x - hip_span * 0.4,
            y: hip_center.y,
            width: hip_span * 0.8,
            height: knee_drop.unwrap_or(span * 0.8),
        }),
        GarmentCategory::Skirt => Some(PlacementRect {
            x: hip_center.x - hip_span * 0.5,
            y: hip_center.y,
            width: hip_span,
            height: knee_drop.map_or(span * 1.2, |drop| drop * 1.2),
        }),
        GarmentCategory::Accessory | GarmentCategory::Bag | GarmentCategory::Other => None,
    }
}

/// Canvas-proportional default rectangles, independent of any detected
/// person. Used when keypoints are missing or a category has no
/// pose-anchored geometry.
fn default_rect(category: GarmentCategory, canvas: CanvasSize) -> PlacementRect {
    let (w, h) = (canvas.w(), canvas.h());
    let frac = |x: f64, y: f64, rw: f64, rh: f64| PlacementRect {
        x: w * x,
        y: h * y,
        width: w * rw,
        height: h * rh,
    };

    match category {
        GarmentCategory::TShirt | GarmentCategory::Shirt | GarmentCategory::Knit => {
            frac(0.2, 0.25, 0.6, 0.25)
        }
        GarmentCategory::Hoodie => frac(0.2, 0.22, 0.6, 0.3),
        GarmentCategory::Jacket => frac(0.15, 0.22, 0.7, 0.35),
        GarmentCategory::Coat | GarmentCategory::Puffer => frac(0.15, 0.22, 0.7, 0.4),
        GarmentCategory::Pants => frac(0.25, 0.5, 0.5, 0.45),
        GarmentCategory::Shorts => frac(0.25, 0.5, 0.5, 0.25),
        GarmentCategory::Skirt => frac(0.25, 0.45, 0.5, 0.4),
        GarmentCategory::Dress => frac(0.2, 0.25, 0.6, 0.6),
        GarmentCategory::Underwear
        | GarmentCategory::Accessory
        | GarmentCategory::Bag
        | GarmentCategory::Other => frac(0.3, 0.3, 0.4, 0.4),
    }
}

/// Composite a garment list onto the person canvas.
///
/// Garments are drawn back-to-front by category z-priority (stable
/// within a layer, preserving catalog order), so outerwear occludes
/// mid-layers which occlude undergarments. Returns a new buffer; the
/// input canvas is untouched.
#[must_use = "returns the composited canvas"]
pub fn compose(person: &RgbaImage, garments: &[GarmentItem], pose: &PoseKeypoints) -> RgbaImage {
    let canvas =
        CanvasSize::new(person.width(), person.height()).unwrap_or(CanvasSize::PORTRAIT);

    let mut sorted: Vec<&GarmentItem> = garments.iter().collect();
    sorted.sort_by_key(|item| item.category.z_priority());

    sorted
        .into_iter()
        .fold(person.clone(), |acc, item| draw_item(acc, item, pose, canvas))
}

/// Draw a single garment onto the canvas, returning the new canvas.
///
/// The garment is fit into its clipped placement rectangle preserving
/// aspect ratio (centered letterbox, never stretched), drawn at full
/// opacity, then finished with shadow bands along the bottom and
/// trailing edges. A garment that cannot be placed (degenerate
/// rectangle or empty art) returns the canvas unchanged.
fn draw_item(
    mut canvas_buf: RgbaImage,
    item: &GarmentItem,
    pose: &PoseKeypoints,
    canvas: CanvasSize,
) -> RgbaImage {
    let rect = placement_rect(item.category, pose, canvas);
    let Some(clipped) = rect.clip(canvas) else {
        return canvas_buf;
    };
    if item.image.width() == 0 || item.image.height() == 0 {
        return canvas_buf;
    }

    // Aspect-preserving letterbox fit inside the clipped rectangle.
    let scale = (f64::from(clipped.width) / f64::from(item.image.width()))
        .min(f64::from(clipped.height) / f64::from(item.image.height()));
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let draw_w = (f64::from(item.image.width()) * scale).round().max(1.0) as u32;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let draw_h = (f64::from(item.image.height()) * scale).round().max(1.0) as u32;
    let draw_x = i64::from(clipped.x) + i64::from((clipped.width - draw_w.min(clipped.width)) / 2);
    let draw_y = i64::from(clipped.y) + i64::from((clipped.height - draw_h.min(clipped.height)) / 2);

    let scaled = imageops::resize(&item.image, draw_w, draw_h, FilterType::Triangle);
    imageops::overlay(&mut canvas_buf, &scaled, draw_x, draw_y);

    // Thin shadow bands suggesting material thickness: one along the
    // lower edge, one along the trailing (right) edge.
    #[allow(clippy::cast_precision_loss)]
    let (gx, gy) = (draw_x as f64, draw_y as f64);
    let (gw, gh) = (f64::from(draw_w), f64::from(draw_h));
    darken_band(
        &mut canvas_buf,
        gx - SHADOW_OFFSET,
        gy + gh - SHADOW_OFFSET,
        gx + gw + SHADOW_OFFSET,
        gy + gh + SHADOW_OFFSET,
    );
    darken_band(
        &mut canvas_buf,
        gx + gw - SHADOW_OFFSET,
        gy,
        gx + gw + SHADOW_OFFSET,
        gy + gh,
    );

    canvas_buf
}

/// Darken every pixel in the given band by the shadow factor, clipped
/// to the buffer. Alpha is left untouched.
fn darken_band(buf: &mut RgbaImage, x0: f64, y0: f64, x1: f64, y1: f64) {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (px0, py0) = (x0.max(0.0) as u32, y0.max(0.0) as u32);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (px1, py1) = (
        (x1.min(f64::from(buf.width()))).max(0.0) as u32,
        (y1.min(f64::from(buf.height()))).max(0.0) as u32,
    );
    for y in py0..py1 {
        for x in px0..px1 {
            let mut p = *buf.get_pixel(x, y);
            for c in &mut p.0[..3] {
                *c = u8::try_from(u16::from(*c) * SHADOW_FACTOR / 255).unwrap_or(u8::MAX);
            }
            buf.put_pixel(x, y, p);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pose;
    use crate::types::HumanRegion;

    const ALL_CATEGORIES: [GarmentCategory; 15] = [
        GarmentCategory::Underwear,
        GarmentCategory::TShirt,
        GarmentCategory::Shirt,
        GarmentCategory::Knit,
        GarmentCategory::Hoodie,
        GarmentCategory::Jacket,
        GarmentCategory::Coat,
        GarmentCategory::Puffer,
        GarmentCategory::Pants,
        GarmentCategory::Shorts,
        GarmentCategory::Skirt,
        GarmentCategory::Dress,
        GarmentCategory::Accessory,
        GarmentCategory::Bag,
        GarmentCategory::Other,
    ];

    fn canvas(w: u32, h: u32) -> CanvasSize {
        CanvasSize::new(w, h).unwrap()
    }

    fn centered_pose(size: CanvasSize) -> PoseKeypoints {
        let region = HumanRegion {
            min_x: size.w() * 0.3,
            min_y: size.h() * 0.15,
            max_x: size.w() * 0.7,
            max_y: size.h() * 0.85,
            samples: 500,
        };
        pose::estimate(&region)
    }

    fn solid_garment(color: [u8; 4], w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |_, _| image::Rgba(color))
    }

    #[test]
    fn top_never_rises_above_shoulder_center() {
        let size = canvas(400, 600);
        let pose = centered_pose(size);
        let (shoulder_center, _) = pose.shoulder_line().unwrap();
        for category in ALL_CATEGORIES {
            let rect = placement_rect(category, &pose, size);
            assert!(
                rect.y >= shoulder_center.y - 1e-9,
                "{category:?}: rect top {} above shoulder center {}",
                rect.y,
                shoulder_center.y,
            );
        }
    }

    #[test]
    fn clipped_rects_stay_in_canvas() {
        let size = canvas(400, 600);
        let pose = centered_pose(size);
        for category in ALL_CATEGORIES {
            let clipped = placement_rect(category, &pose, size).clip(size).unwrap();
            assert!(clipped.x + clipped.width <= 400, "{category:?} x overflow");
            assert!(clipped.y + clipped.height <= 600, "{category:?} y overflow");
        }
    }

    #[test]
    fn extreme_pose_is_clipped_not_rejected() {
        // A pose whose shoulders sit near the right canvas edge pushes
        // wide rectangles past the boundary; clipping must rein them in.
        let pose = pose::estimate_manual(
            crate::types::Point::new(340.0, 100.0),
            crate::types::Point::new(460.0, 100.0),
        );
        let size = canvas(400, 600);
        let clipped = placement_rect(GarmentCategory::Coat, &pose, size)
            .clip(size)
            .unwrap();
        assert!(clipped.x + clipped.width <= 400);
    }

    #[test]
    fn missing_pose_uses_canvas_defaults() {
        let size = canvas(400, 600);
        let rect = placement_rect(GarmentCategory::TShirt, &PoseKeypoints::default(), size);
        assert_eq!(
            rect,
            PlacementRect {
                x: 80.0,
                y: 150.0,
                width: 240.0,
                height: 150.0,
            },
        );
    }

    #[test]
    fn degenerate_shoulder_span_uses_canvas_defaults() {
        let p = crate::types::Point::new(200.0, 100.0);
        let pose = pose::estimate_manual(p, p);
        let size = canvas(400, 600);
        let with_span = placement_rect(GarmentCategory::TShirt, &pose, size);
        let default = placement_rect(GarmentCategory::TShirt, &PoseKeypoints::default(), size);
        assert_eq!(with_span, default);
    }

    #[test]
    fn bulkier_categories_get_larger_boxes() {
        let size = canvas(400, 600);
        let pose = centered_pose(size);
        let tee = placement_rect(GarmentCategory::TShirt, &pose, size);
        let coat = placement_rect(GarmentCategory::Coat, &pose, size);
        assert!(coat.width > tee.width);
        assert!(coat.height > tee.height);
    }

    #[test]
    fn pants_anchor_at_hip_center() {
        let size = canvas(400, 600);
        let pose = centered_pose(size);
        let (hip_center, _) = pose.hip_line().unwrap();
        let rect = placement_rect(GarmentCategory::Pants, &pose, size);
        assert!((rect.y - hip_center.y).abs() < 1e-9);
        let rect_cx = rect.x + rect.width / 2.0;
        assert!((rect_cx - hip_center.x).abs() < 1e-9);
    }

    #[test]
    fn letterbox_preserves_aspect_ratio() {
        // A tall 1:2 garment into a wide rect must not stretch: it is
        // pillarboxed, leaving background at the rect's left edge.
        let size = canvas(200, 200);
        let person = solid_garment([255, 255, 255, 255], 200, 200);
        let garment = GarmentItem::new("g", "t-shirt", solid_garment([255, 0, 0, 255], 40, 80));
        let pose = centered_pose(size);
        let out = compose(&person, std::slice::from_ref(&garment), &pose);

        let rect = placement_rect(GarmentCategory::TShirt, &pose, size)
            .clip(size)
            .unwrap();
        // The rect's center is covered by the garment...
        let mid_y = rect.y + rect.height / 2;
        let mid_x = rect.x + rect.width / 2;
        assert_eq!(out.get_pixel(mid_x, mid_y).0[0], 255);
        assert!(out.get_pixel(mid_x, mid_y).0[2] < 50);
        // ...but the rect's left edge stays background: the pillarboxed
        // garment does not fill the full rect width.
        let corner = out.get_pixel(rect.x + 1, rect.y + 1);
        assert!(
            corner.0[2] > 200,
            "pillarbox margin should keep background, got {corner:?}",
        );
    }

    #[test]
    fn outerwear_occludes_underwear_in_overlap() {
        let size = canvas(200, 300);
        let person = solid_garment([255, 255, 255, 255], 200, 300);
        let pose = centered_pose(size);

        // Listed with the outerwear first: z-ordering, not list order,
        // must decide who wins the overlap.
        let garments = vec![
            GarmentItem::new("coat", "coat", solid_garment([0, 0, 255, 255], 60, 60)),
            GarmentItem::new("base", "underwear", solid_garment([255, 0, 0, 255], 60, 60)),
        ];
        let out = compose(&person, &garments, &pose);

        // Both rects are anchored at the shoulder center; sample just
        // below it, inside both.
        let (shoulder_center, _) = pose.shoulder_line().unwrap();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (sx, sy) = (shoulder_center.x as u32, shoulder_center.y as u32 + 10);
        let p = out.get_pixel(sx, sy);
        assert!(
            p.0[2] > 150 && p.0[0] < 100,
            "outerwear must be visible in the overlap, got {p:?}",
        );
    }

    #[test]
    fn shadow_darkens_below_garment() {
        let size = canvas(200, 300);
        let person = solid_garment([200, 200, 200, 255], 200, 300);
        let pose = centered_pose(size);
        let garment = GarmentItem::new("g", "t-shirt", solid_garment([10, 200, 10, 255], 60, 60));
        let out = compose(&person, std::slice::from_ref(&garment), &pose);

        // Find the garment's bottom edge via its placement geometry.
        let rect = placement_rect(GarmentCategory::TShirt, &pose, size)
            .clip(size)
            .unwrap();
        let below = out.get_pixel(rect.x + rect.width / 2, rect.y + rect.height + 1);
        assert!(
            below.0[0] < 200,
            "expected shadow band below the garment, got {below:?}",
        );
    }

    #[test]
    fn empty_garment_art_leaves_canvas_untouched() {
        let size = canvas(100, 150);
        let person = solid_garment([1, 2, 3, 255], 100, 150);
        let pose = centered_pose(size);
        let garment = GarmentItem::new("g", "t-shirt", RgbaImage::new(0, 0));
        let out = compose(&person, std::slice::from_ref(&garment), &pose);
        assert_eq!(out, person);
    }

    #[test]
    fn compose_does_not_mutate_input() {
        let size = canvas(100, 150);
        let person = solid_garment([9, 9, 9, 255], 100, 150);
        let original = person.clone();
        let pose = centered_pose(size);
        let garment = GarmentItem::new("g", "coat", solid_garment([50, 50, 50, 255], 20, 20));
        let _ = compose(&person, std::slice::from_ref(&garment), &pose);
        assert_eq!(person, original);
    }

    #[test]
    fn compose_is_deterministic() {
        let size = canvas(120, 180);
        let person = solid_garment([240, 230, 220, 255], 120, 180);
        let pose = centered_pose(size);
        let garments = vec![
            GarmentItem::new("a", "t-shirt", solid_garment([255, 0, 0, 255], 30, 30)),
            GarmentItem::new("b", "jacket", solid_garment([0, 0, 255, 255], 40, 40)),
        ];
        let first = compose(&person, &garments, &pose);
        assert_eq!(compose(&person, &garments, &pose), first);
    }
}
