use crate::error::VisionError;
use crate::frame::GrayFrame;

/// Axis-aligned face rectangle in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub confidence: f32,
}

impl FaceBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence: 1.0,
        }
    }

    /// Intersect with a `width × height` frame. `None` if nothing is left.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<FaceBox> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.width.min(width - self.x);
        let h = self.height.min(height - self.y);
        (w > 0 && h > 0).then_some(FaceBox {
            width: w,
            height: h,
            ..*self
        })
    }
}

/// Tuning knobs passed to the locator on every call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorParams {
    /// Ratio between successive pyramid levels. Must be > 1.
    pub scale_factor: f32,
    /// Overlapping raw detections required to keep a face.
    pub min_neighbors: u32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.3,
            min_neighbors: 5,
        }
    }
}

/// Finds faces in a grayscale frame.
///
/// Boxes are returned in the detector's own order; callers that want one
/// face take the first.
pub trait FaceLocator: Send + Sync {
    fn locate(&self, frame: &GrayFrame, params: &DetectorParams) -> Result<Vec<FaceBox>, VisionError>;
}

/// A raw detection before grouping, corner form, frame pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub score: f32,
}

impl Candidate {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    pub fn iou(&self, other: &Candidate) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = ix * iy;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// Turn a flat `[x1, y1, x2, y2, score]*` detector output into candidates.
///
/// Coordinates are normalized to the level they came from, so scaling by
/// the frame size maps every level back to frame pixels. Rows at or below
/// `min_score` and trailing partial rows are skipped.
pub fn candidates_from_rows(
    rows: &[f32],
    frame_width: u32,
    frame_height: u32,
    min_score: f32,
) -> Vec<Candidate> {
    let (fw, fh) = (frame_width as f32, frame_height as f32);
    rows.chunks_exact(5)
        .filter(|r| r[4] > min_score)
        .map(|r| Candidate {
            x1: r[0].clamp(0.0, 1.0) * fw,
            y1: r[1].clamp(0.0, 1.0) * fh,
            x2: r[2].clamp(0.0, 1.0) * fw,
            y2: r[3].clamp(0.0, 1.0) * fh,
            score: r[4],
        })
        .filter(|c| c.x2 > c.x1 && c.y2 > c.y1)
        .collect()
}

/// Image sizes for each pyramid level, largest first.
///
/// Each level shrinks by `scale_factor` until the short side would drop
/// below `min_side` or `max_levels` is reached. Level 0 is the frame itself.
pub fn pyramid_levels(
    width: u32,
    height: u32,
    scale_factor: f32,
    min_side: u32,
    max_levels: usize,
) -> Vec<(u32, u32)> {
    let mut levels = Vec::new();
    if width.min(height) < min_side || max_levels == 0 {
        return levels;
    }
    levels.push((width, height));
    if scale_factor <= 1.0 {
        return levels;
    }
    let mut scale = 1.0f32;
    while levels.len() < max_levels {
        scale *= scale_factor;
        let w = (width as f32 / scale).round() as u32;
        let h = (height as f32 / scale).round() as u32;
        if w.min(h) < min_side {
            break;
        }
        levels.push((w, h));
    }
    levels
}

/// Merge overlapping raw detections into faces.
///
/// Candidates join the first existing group whose seed overlaps them by at
/// least `iou_threshold`. Groups with fewer than `min_neighbors` members are
/// dropped; the rest become the member-averaged box with the best score.
/// Output keeps group creation order.
pub fn group_candidates(
    candidates: &[Candidate],
    min_neighbors: u32,
    iou_threshold: f32,
) -> Vec<FaceBox> {
    let mut groups: Vec<Vec<Candidate>> = Vec::new();
    for cand in candidates {
        match groups
            .iter_mut()
            .find(|g| g[0].iou(cand) >= iou_threshold)
        {
            Some(group) => group.push(*cand),
            None => groups.push(vec![*cand]),
        }
    }

    groups
        .into_iter()
        .filter(|g| g.len() as u32 >= min_neighbors.max(1))
        .map(|g| {
            let n = g.len() as f32;
            let (sx1, sy1, sx2, sy2) = g.iter().fold((0.0, 0.0, 0.0, 0.0), |acc, c| {
                (acc.0 + c.x1, acc.1 + c.y1, acc.2 + c.x2, acc.3 + c.y2)
            });
            let best = g.iter().map(|c| c.score).fold(f32::MIN, f32::max);
            let x1 = (sx1 / n).max(0.0);
            let y1 = (sy1 / n).max(0.0);
            FaceBox {
                x: x1.round() as u32,
                y: y1.round() as u32,
                width: ((sx2 / n) - x1).max(0.0).round() as u32,
                height: ((sy2 / n) - y1).max(0.0).round() as u32,
                confidence: best,
            }
        })
        .filter(|b| b.width > 0 && b.height > 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> Candidate {
        Candidate { x1, y1, x2, y2, score }
    }

    #[test]
    fn default_params_match_detector_tuning() {
        let p = DetectorParams::default();
        assert_eq!(p.scale_factor, 1.3);
        assert_eq!(p.min_neighbors, 5);
    }

    #[test]
    fn clamp_trims_overhang() {
        let b = FaceBox::new(90, 50, 40, 40).clamp_to(100, 80).unwrap();
        assert_eq!((b.x, b.y, b.width, b.height), (90, 50, 10, 30));
        assert!(FaceBox::new(100, 0, 10, 10).clamp_to(100, 80).is_none());
        assert!(FaceBox::new(0, 0, 0, 10).clamp_to(100, 80).is_none());
    }

    #[test]
    fn iou_basics() {
        let a = cand(0.0, 0.0, 10.0, 10.0, 0.9);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        let b = cand(5.0, 0.0, 15.0, 10.0, 0.9);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
        let c = cand(20.0, 20.0, 30.0, 30.0, 0.9);
        assert_eq!(a.iou(&c), 0.0);
    }

    #[test]
    fn pyramid_shrinks_by_scale_factor() {
        let levels = pyramid_levels(640, 480, 1.3, 48, 6);
        assert_eq!(levels[0], (640, 480));
        assert_eq!(levels[1], (492, 369));
        assert_eq!(levels.len(), 6);
        for w in levels.windows(2) {
            assert!(w[1].0 < w[0].0);
        }
    }

    #[test]
    fn pyramid_stops_at_min_side() {
        let levels = pyramid_levels(100, 60, 2.0, 48, 10);
        assert_eq!(levels, vec![(100, 60)]);
        assert!(pyramid_levels(40, 40, 1.3, 48, 6).is_empty());
    }

    #[test]
    fn grouping_requires_min_neighbors() {
        let mut raw = Vec::new();
        for i in 0..5 {
            let d = i as f32;
            raw.push(cand(100.0 + d, 100.0, 200.0 + d, 200.0, 0.8));
        }
        // Lone false positive elsewhere.
        raw.push(cand(400.0, 10.0, 450.0, 60.0, 0.99));

        let faces = group_candidates(&raw, 5, 0.3);
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].x, 102);
        assert_eq!(faces[0].width, 100);

        let all = group_candidates(&raw, 1, 0.3);
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].confidence, 0.99);
    }

    #[test]
    fn grouping_keeps_discovery_order() {
        let raw = vec![
            cand(300.0, 0.0, 350.0, 50.0, 0.6),
            cand(0.0, 0.0, 50.0, 50.0, 0.9),
        ];
        let faces = group_candidates(&raw, 1, 0.3);
        assert_eq!(faces[0].x, 300);
        assert_eq!(faces[1].x, 0);
    }

    #[test]
    fn rows_scale_to_frame_and_filter_by_score() {
        let rows = [
            0.25, 0.5, 0.75, 1.0, 0.9, // kept
            0.0, 0.0, 0.1, 0.1, 0.5, // at threshold
            0.5, 0.5, 0.4, 0.9, 0.99, // inverted
            0.1, 0.1, // partial row
        ];
        let c = candidates_from_rows(&rows, 200, 100, 0.5);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0], cand(50.0, 50.0, 150.0, 100.0, 0.9));
    }

    #[test]
    fn grouping_empty_input() {
        assert!(group_candidates(&[], 3, 0.3).is_empty());
    }
}
