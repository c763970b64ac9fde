//! Annotation overlay renderer
//!
//! Composes a rasterized page with the persistent field annotations and the
//! transient focus highlight. `layout` is the pure half (normalized boxes to
//! placed display rectangles, focus last/topmost); `compose` is the pixel
//! half (resize the raster to the zoomed display size, then paint fills and
//! borders straight into the RGB buffer).

use fast_image_resize as fir;
use rayon::prelude::*;

use crate::analysis::{Annotation, AnnotationCategory, PageIndex};
use crate::geometry::{DisplayRect, Zoom};
use crate::highlight::HighlightState;
use crate::raster::{RasterFault, RenderedPage};
use crate::theme::{OverlayTheme, Treatment};

/// Region pixel count above which fills go row-parallel.
const PARALLEL_PIXEL_THRESHOLD: u64 = 200_000;

/// What a placed region represents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegionKind {
    Annotation(AnnotationCategory),
    Focus,
}

/// One rectangle to draw over the page, in display pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedRegion {
    pub kind: RegionKind,
    pub label: Option<String>,
    pub rect: DisplayRect,
}

/// A page raster composed with its overlay, ready for display.
pub struct ComposedPage {
    pub width_px: u32,
    pub height_px: u32,
    /// RGB pixel data with the overlay painted in
    pub pixels: Vec<u8>,
    /// The regions that were painted, topmost last
    pub regions: Vec<PlacedRegion>,
}

impl std::fmt::Debug for ComposedPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedPage")
            .field("width_px", &self.width_px)
            .field("height_px", &self.height_px)
            .field("regions", &self.regions.len())
            .finish()
    }
}

/// Place the overlay rectangles for one page, purely.
///
/// `display_width`/`display_height` are the page's display dimensions at
/// zoom 1; the clamped `zoom` factor scales every rectangle linearly.
/// Annotations on other pages, and annotations whose reported coordinates
/// fail validation, are skipped. The focus highlight, when it targets this
/// page, is appended last so it always renders above the annotations.
/// Calling this again with the same inputs yields the same output.
#[must_use]
pub fn layout(
    display_width: f32,
    display_height: f32,
    page: PageIndex,
    annotations: &[Annotation],
    focus: &HighlightState,
    zoom: f32,
) -> Vec<PlacedRegion> {
    let factor = Zoom::clamp_factor(zoom);
    let zoomed_w = display_width * factor;
    let zoomed_h = display_height * factor;

    let mut regions: Vec<PlacedRegion> = annotations
        .iter()
        .filter(|a| a.page == page)
        .filter_map(|a| {
            let bounds = a.bounds()?;
            Some(PlacedRegion {
                kind: RegionKind::Annotation(a.category),
                label: Some(a.label.clone()),
                rect: bounds.to_rect(zoomed_w, zoomed_h),
            })
        })
        .collect();

    if focus.page == Some(page) {
        if let Some(bounds) = focus.bounds {
            regions.push(PlacedRegion {
                kind: RegionKind::Focus,
                label: None,
                rect: bounds.to_rect(zoomed_w, zoomed_h),
            });
        }
    }

    regions
}

/// Compose a rendered page with its overlay at the given zoom.
pub fn compose(
    page: &RenderedPage,
    annotations: &[Annotation],
    focus: &HighlightState,
    zoom: f32,
    theme: &OverlayTheme,
) -> Result<ComposedPage, RasterFault> {
    let factor = Zoom::clamp_factor(zoom);
    let dst_w = ((page.width_px as f32 * factor).round() as u32).max(1);
    let dst_h = ((page.height_px as f32 * factor).round() as u32).max(1);

    let mut pixels = if dst_w == page.width_px && dst_h == page.height_px {
        page.pixels.clone()
    } else {
        resize_rgb(&page.pixels, page.width_px, page.height_px, dst_w, dst_h)?
    };

    let regions = layout(
        page.width_px as f32,
        page.height_px as f32,
        page.index,
        annotations,
        focus,
        factor,
    );

    for region in &regions {
        let treatment = match region.kind {
            RegionKind::Annotation(category) => theme.treatment(category),
            RegionKind::Focus => theme.focus,
        };
        paint_region(&mut pixels, dst_w as usize, dst_h as usize, region.rect, &treatment);
    }

    Ok(ComposedPage {
        width_px: dst_w,
        height_px: dst_h,
        pixels,
        regions,
    })
}

/// Exact resize of a tight RGB buffer.
fn resize_rgb(
    pixels: &[u8],
    src_w: u32,
    src_h: u32,
    dst_w: u32,
    dst_h: u32,
) -> Result<Vec<u8>, RasterFault> {
    use std::num::NonZeroU32;

    let src_nz_width =
        NonZeroU32::new(src_w).ok_or_else(|| RasterFault::decode("invalid source width"))?;
    let src_nz_height =
        NonZeroU32::new(src_h).ok_or_else(|| RasterFault::decode("invalid source height"))?;
    let dst_nz_width =
        NonZeroU32::new(dst_w).ok_or_else(|| RasterFault::decode("invalid target width"))?;
    let dst_nz_height =
        NonZeroU32::new(dst_h).ok_or_else(|| RasterFault::decode("invalid target height"))?;

    let src = fir::Image::from_vec_u8(
        src_nz_width,
        src_nz_height,
        pixels.to_vec(),
        fir::PixelType::U8x3,
    )
    .map_err(|e| RasterFault::decode(format!("resize source error: {e}")))?;
    let mut dst = fir::Image::new(dst_nz_width, dst_nz_height, fir::PixelType::U8x3);
    let mut resizer = fir::Resizer::new(fir::ResizeAlg::Convolution(fir::FilterType::Bilinear));
    resizer
        .resize(&src.view(), &mut dst.view_mut())
        .map_err(|e| RasterFault::decode(format!("resize error: {e}")))?;

    Ok(dst.into_vec())
}

/// Integer pixel bounds of a display rect, clamped to the image. A
/// zero-width or zero-height rect clamps to zero coverage.
fn clamp_rect(rect: DisplayRect, width: usize, height: usize) -> Option<(usize, usize, usize, usize)> {
    if rect.width <= 0.0 || rect.height <= 0.0 {
        return None;
    }
    let x0 = rect.left.floor().max(0.0) as usize;
    let y0 = rect.top.floor().max(0.0) as usize;
    let x1 = ((rect.left + rect.width).ceil().max(0.0) as usize).min(width);
    let y1 = ((rect.top + rect.height).ceil().max(0.0) as usize).min(height);

    if x0 >= x1 || y0 >= y1 {
        return None;
    }
    Some((x0, y0, x1, y1))
}

fn paint_region(
    pixels: &mut [u8],
    width: usize,
    height: usize,
    rect: DisplayRect,
    treatment: &Treatment,
) {
    // Degenerate rectangles clamp to zero coverage: rendered, zero pixels.
    let Some((x0, y0, x1, y1)) = clamp_rect(rect, width, height) else {
        return;
    };

    let stride = width * 3;
    let area = ((x1 - x0) as u64) * ((y1 - y0) as u64);
    let use_parallel = area >= PARALLEL_PIXEL_THRESHOLD && (y1 - y0) >= 4;

    if use_parallel {
        pixels
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(y, row)| {
                if y >= y0 && y < y1 {
                    paint_row(row, y, x0, x1, y0, y1, treatment);
                }
            });
    } else {
        for y in y0..y1 {
            let row = &mut pixels[y * stride..(y + 1) * stride];
            paint_row(row, y, x0, x1, y0, y1, treatment);
        }
    }
}

fn paint_row(
    row: &mut [u8],
    y: usize,
    x0: usize,
    x1: usize,
    y0: usize,
    y1: usize,
    treatment: &Treatment,
) {
    let bp = treatment.border_px as usize;
    let horizontal_border = y < y0 + bp || y + bp >= y1;

    for x in x0..x1 {
        let px = &mut row[x * 3..x * 3 + 3];
        let vertical_border = x < x0 + bp || x + bp >= x1;

        if horizontal_border || vertical_border {
            px[0] = treatment.border.r;
            px[1] = treatment.border.g;
            px[2] = treatment.border.b;
        } else {
            let a = treatment.fill_alpha;
            px[0] = blend(px[0], treatment.fill.r, a);
            px[1] = blend(px[1], treatment.fill.g, a);
            px[2] = blend(px[2], treatment.fill.b, a);
        }
    }
}

#[inline]
fn blend(base: u8, over: u8, alpha: f32) -> u8 {
    (f32::from(base) * (1.0 - alpha) + f32::from(over) * alpha).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::NormalizedBox;

    fn annotation(label: &str, category: AnnotationCategory, raw: [f32; 4], page: usize) -> Annotation {
        // Round-trip through serde keeps the test on the public contract.
        let json = format!(
            r#"{{"label": "{label}", "type": "{category:?}", "box_2d": [{}, {}, {}, {}], "page": {page}}}"#,
            raw[0], raw[1], raw[2], raw[3],
        );
        serde_json::from_str(&json).unwrap()
    }

    fn white_page(width: u32, height: u32) -> RenderedPage {
        RenderedPage {
            index: PageIndex(1),
            pixels: vec![255; (width * height * 3) as usize],
            width_px: width,
            height_px: height,
            scale: 1.0,
        }
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn layout_places_signature_scenario() {
        let ann = annotation("Sign Here", AnnotationCategory::Signature, [500.0, 100.0, 550.0, 400.0], 1);
        let regions = layout(100.0, 100.0, PageIndex(1), &[ann], &HighlightState::cleared(), 1.0);

        assert_eq!(regions.len(), 1);
        let rect = regions[0].rect;
        assert!(approx(rect.top, 50.0));
        assert!(approx(rect.left, 10.0));
        assert!(approx(rect.height, 5.0));
        assert!(approx(rect.width, 30.0));
        assert_eq!(
            regions[0].kind,
            RegionKind::Annotation(AnnotationCategory::Signature)
        );
    }

    #[test]
    fn layout_filters_other_pages_and_invalid_boxes() {
        let on_page_2 = annotation("Date", AnnotationCategory::Date, [0.0, 0.0, 50.0, 50.0], 2);
        let malformed = annotation("Bad", AnnotationCategory::Input, [500.0, 0.0, 100.0, 50.0], 1);
        let regions = layout(
            100.0,
            100.0,
            PageIndex(1),
            &[on_page_2, malformed],
            &HighlightState::cleared(),
            1.0,
        );
        assert!(regions.is_empty());
    }

    #[test]
    fn focus_is_last_and_only_on_its_page() {
        let ann = annotation("Sign", AnnotationCategory::Signature, [0.0, 0.0, 100.0, 100.0], 1);
        let focus = HighlightState {
            bounds: NormalizedBox::try_new(200.0, 200.0, 300.0, 300.0),
            page: Some(PageIndex(1)),
        };

        let regions = layout(100.0, 100.0, PageIndex(1), std::slice::from_ref(&ann), &focus, 1.0);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions.last().unwrap().kind, RegionKind::Focus);

        let elsewhere = HighlightState {
            page: Some(PageIndex(2)),
            ..focus
        };
        let regions = layout(100.0, 100.0, PageIndex(1), &[ann], &elsewhere, 1.0);
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn zoom_round_trips_through_scale() {
        let ann = annotation("Sign", AnnotationCategory::Signature, [500.0, 100.0, 550.0, 400.0], 1);
        let focus = HighlightState {
            bounds: NormalizedBox::try_new(0.0, 0.0, 100.0, 200.0),
            page: Some(PageIndex(1)),
        };

        for zoom in [0.5, 1.3, 2.0, 3.0] {
            let zoomed = layout(120.0, 90.0, PageIndex(1), std::slice::from_ref(&ann), &focus, zoom);
            let base = layout(120.0, 90.0, PageIndex(1), std::slice::from_ref(&ann), &focus, 1.0);
            for (z, b) in zoomed.iter().zip(base.iter()) {
                let inverted = z.rect.scaled(1.0 / zoom);
                assert!(approx(inverted.top, b.rect.top));
                assert!(approx(inverted.left, b.rect.left));
                assert!(approx(inverted.width, b.rect.width));
                assert!(approx(inverted.height, b.rect.height));
            }
        }
    }

    #[test]
    fn layout_is_idempotent() {
        let ann = annotation("Sign", AnnotationCategory::Signature, [500.0, 100.0, 550.0, 400.0], 1);
        let focus = HighlightState {
            bounds: NormalizedBox::try_new(0.0, 0.0, 100.0, 200.0),
            page: Some(PageIndex(1)),
        };
        let a = layout(100.0, 100.0, PageIndex(1), std::slice::from_ref(&ann), &focus, 1.5);
        let b = layout(100.0, 100.0, PageIndex(1), std::slice::from_ref(&ann), &focus, 1.5);
        assert_eq!(a, b);
    }

    #[test]
    fn compose_paints_border_and_fill() {
        let page = white_page(100, 100);
        let ann = annotation("Sign", AnnotationCategory::Warning, [100.0, 100.0, 500.0, 500.0], 1);
        let theme = OverlayTheme::default();

        let composed = compose(&page, &[ann], &HighlightState::cleared(), 1.0, &theme).unwrap();
        assert_eq!(composed.width_px, 100);
        assert_eq!(composed.regions.len(), 1);

        // region spans x,y in [10, 50); border pixel at its top-left corner
        let idx = (10 * 100 + 10) * 3;
        let border = theme.warning.border;
        assert_eq!(&composed.pixels[idx..idx + 3], &[border.r, border.g, border.b]);

        // interior pixel is tinted, not pure white, not border-colored
        let idx = (30 * 100 + 30) * 3;
        let interior = &composed.pixels[idx..idx + 3];
        assert_ne!(interior, &[255, 255, 255]);
        assert_ne!(interior, &[border.r, border.g, border.b]);

        // outside the region the page is untouched
        let idx = (60 * 100 + 60) * 3;
        assert_eq!(&composed.pixels[idx..idx + 3], &[255, 255, 255]);
    }

    #[test]
    fn compose_is_idempotent_for_unchanged_inputs() {
        let page = white_page(64, 48);
        let ann = annotation("Sign", AnnotationCategory::Signature, [100.0, 100.0, 600.0, 700.0], 1);
        let focus = HighlightState {
            bounds: NormalizedBox::try_new(0.0, 0.0, 250.0, 250.0),
            page: Some(PageIndex(1)),
        };
        let theme = OverlayTheme::default();

        let a = compose(&page, std::slice::from_ref(&ann), &focus, 1.5, &theme).unwrap();
        let b = compose(&page, std::slice::from_ref(&ann), &focus, 1.5, &theme).unwrap();
        assert_eq!(a.pixels, b.pixels);
        assert_eq!(a.regions, b.regions);
    }

    #[test]
    fn compose_scales_output_dimensions_with_zoom() {
        let page = white_page(100, 80);
        let theme = OverlayTheme::default();

        let composed = compose(&page, &[], &HighlightState::cleared(), 2.0, &theme).unwrap();
        assert_eq!(composed.width_px, 200);
        assert_eq!(composed.height_px, 160);

        // out-of-range zoom clamps instead of erroring
        let composed = compose(&page, &[], &HighlightState::cleared(), 100.0, &theme).unwrap();
        assert_eq!(composed.width_px, 300);
    }

    #[test]
    fn focus_paints_over_annotations() {
        let page = white_page(100, 100);
        // annotation and focus cover the same area; focus must win
        let ann = annotation("Sign", AnnotationCategory::Signature, [200.0, 200.0, 800.0, 800.0], 1);
        let focus = HighlightState {
            bounds: NormalizedBox::try_new(200.0, 200.0, 800.0, 800.0),
            page: Some(PageIndex(1)),
        };
        let theme = OverlayTheme::default();

        let composed = compose(&page, &[ann], &focus, 1.0, &theme).unwrap();
        let idx = (20 * 100 + 20) * 3;
        let focus_border = theme.focus.border;
        assert_eq!(
            &composed.pixels[idx..idx + 3],
            &[focus_border.r, focus_border.g, focus_border.b]
        );
    }

    #[test]
    fn degenerate_box_composes_without_painting() {
        let page = white_page(50, 50);
        let ann = annotation("Dot", AnnotationCategory::Input, [250.0, 250.0, 250.0, 250.0], 1);
        let theme = OverlayTheme::default();

        let composed = compose(&page, &[ann], &HighlightState::cleared(), 1.0, &theme).unwrap();
        // the region is placed (zero-size) and the raster is untouched
        assert_eq!(composed.regions.len(), 1);
        assert!(composed.pixels.iter().all(|&b| b == 255));
    }
}
