use kurbo::Point;
use smallvec::SmallVec;

use crate::foundation::error::{TrailvizError, TrailvizResult};
use crate::foundation::math::lerp;

/// Per-frame (x, y) positions of N tracked points across T frames.
///
/// Stored flat in frame-major order and validated rectangular at
/// construction; read-only once built.
#[derive(Clone, Debug)]
pub struct TrackSet {
    frames: usize,
    points: usize,
    xy: Vec<Point>,
}

impl TrackSet {
    pub fn from_rows(rows: &[Vec<[f64; 2]>]) -> TrailvizResult<Self> {
        let frames = rows.len();
        let points = rows.first().map_or(0, Vec::len);
        let mut xy = Vec::with_capacity(frames * points);
        for (t, row) in rows.iter().enumerate() {
            if row.len() != points {
                return Err(TrailvizError::validation(format!(
                    "tracks are not rectangular: frame {t} has {} points, frame 0 has {points}",
                    row.len()
                )));
            }
            xy.extend(row.iter().map(|&[x, y]| Point::new(x, y)));
        }
        Ok(Self { frames, points, xy })
    }

    pub fn from_flat(frames: usize, points: usize, xy: Vec<Point>) -> TrailvizResult<Self> {
        if xy.len() != frames * points {
            return Err(TrailvizError::validation(format!(
                "tracks length {} does not match {frames} frames x {points} points",
                xy.len()
            )));
        }
        Ok(Self { frames, points, xy })
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn points(&self) -> usize {
        self.points
    }

    pub fn get(&self, frame: usize, point: usize) -> Point {
        self.xy[frame * self.points + point]
    }

    /// Element-wise linear blend of two equal-shape track sets.
    pub fn lerp(a: &Self, b: &Self, t: f64) -> TrailvizResult<Self> {
        if a.frames != b.frames || a.points != b.points {
            return Err(TrailvizError::validation(format!(
                "cannot blend track sets of different shape ({}x{} vs {}x{})",
                a.frames, a.points, b.frames, b.points
            )));
        }
        let xy = a
            .xy
            .iter()
            .zip(&b.xy)
            .map(|(pa, pb)| Point::new(lerp(pa.x, pb.x, t), lerp(pa.y, pb.y, t)))
            .collect();
        Ok(Self {
            frames: a.frames,
            points: a.points,
            xy,
        })
    }
}

/// Per-frame (x, y, z) positions; z is consumed only by the depth renderer.
#[derive(Clone, Debug)]
pub struct DepthTrackSet {
    frames: usize,
    points: usize,
    xy: Vec<Point>,
    z: Vec<f64>,
}

impl DepthTrackSet {
    pub fn from_rows(rows: &[Vec<[f64; 3]>]) -> TrailvizResult<Self> {
        let frames = rows.len();
        let points = rows.first().map_or(0, Vec::len);
        let mut xy = Vec::with_capacity(frames * points);
        let mut z = Vec::with_capacity(frames * points);
        for (t, row) in rows.iter().enumerate() {
            if row.len() != points {
                return Err(TrailvizError::validation(format!(
                    "tracks are not rectangular: frame {t} has {} points, frame 0 has {points}",
                    row.len()
                )));
            }
            for &[x, y, d] in row {
                xy.push(Point::new(x, y));
                z.push(d);
            }
        }
        Ok(Self {
            frames,
            points,
            xy,
            z,
        })
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn points(&self) -> usize {
        self.points
    }

    pub fn get(&self, frame: usize, point: usize) -> (Point, f64) {
        let idx = frame * self.points + point;
        (self.xy[idx], self.z[idx])
    }

    /// Global z extent over every sample; a degenerate extent is widened by 1
    /// so normalization never divides by zero.
    pub fn z_range(&self) -> (f64, f64) {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &z in &self.z {
            min = min.min(z);
            max = max.max(z);
        }
        if !min.is_finite() || !max.is_finite() {
            return (0.0, 1.0);
        }
        if max == min {
            max += 1.0;
        }
        (min, max)
    }
}

/// Parallel (T x N) boolean visibility mask.
#[derive(Clone, Debug)]
pub struct Visibility {
    frames: usize,
    points: usize,
    mask: Vec<bool>,
}

impl Visibility {
    /// The all-visible default used when no mask is supplied.
    pub fn all(frames: usize, points: usize) -> Self {
        Self {
            frames,
            points,
            mask: vec![true; frames * points],
        }
    }

    pub fn from_rows(rows: &[Vec<bool>]) -> TrailvizResult<Self> {
        let frames = rows.len();
        let points = rows.first().map_or(0, Vec::len);
        let mut mask = Vec::with_capacity(frames * points);
        for (t, row) in rows.iter().enumerate() {
            if row.len() != points {
                return Err(TrailvizError::validation(format!(
                    "visibility is not rectangular: frame {t} has {} entries, frame 0 has {points}",
                    row.len()
                )));
            }
            mask.extend_from_slice(row);
        }
        Ok(Self {
            frames,
            points,
            mask,
        })
    }

    pub fn get(&self, frame: usize, point: usize) -> bool {
        self.mask[frame * self.points + point]
    }

    /// Logical AND of two equal-shape masks (a point counts as visible only
    /// when both sources agree).
    pub fn intersect(a: &Self, b: &Self) -> TrailvizResult<Self> {
        if a.frames != b.frames || a.points != b.points {
            return Err(TrailvizError::validation(
                "cannot intersect visibility masks of different shape",
            ));
        }
        let mask = a.mask.iter().zip(&b.mask).map(|(&x, &y)| x && y).collect();
        Ok(Self {
            frames: a.frames,
            points: a.points,
            mask,
        })
    }

    pub fn expect_shape(&self, frames: usize, points: usize) -> TrailvizResult<()> {
        if self.frames != frames || self.points != points {
            return Err(TrailvizError::validation(format!(
                "visibility shape {}x{} does not match tracks {frames}x{points}",
                self.frames, self.points
            )));
        }
        Ok(())
    }
}

/// One sample inside a trail run. `offset` is the frame offset from the
/// window start (the depth renderer tapers by it).
#[derive(Clone, Copy, Debug)]
pub(crate) struct RunPoint {
    pub(crate) offset: usize,
    pub(crate) pos: Point,
    pub(crate) z: f64,
}

pub(crate) type TrailRun = SmallVec<[RunPoint; 16]>;

/// Collect the latest contiguous visible run inside `[window_start, frame]`.
///
/// A frame contributes only when it is visible and not at the (0, 0) sentinel
/// ("absent"); any other frame ends the current run. Of all runs in the
/// window, only the latest survives, so a point that disappears and
/// reappears shows its newest segment only. This mirrors the historical
/// behavior of the figure scripts and is relied upon by callers.
pub(crate) fn trailing_visible_run(
    window_start: usize,
    frame: usize,
    sample: impl Fn(usize) -> (Point, f64),
    visible: impl Fn(usize) -> bool,
) -> TrailRun {
    let mut current = TrailRun::new();
    let mut latest = TrailRun::new();

    for s in window_start..=frame {
        let (pos, z) = sample(s);
        let present = visible(s) && !(pos.x == 0.0 && pos.y == 0.0);
        if present {
            current.push(RunPoint {
                offset: s - window_start,
                pos,
                z,
            });
        } else if !current.is_empty() {
            latest = std::mem::take(&mut current);
        }
    }

    if current.is_empty() { latest } else { current }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(rows: &[Vec<[f64; 2]>]) -> TrackSet {
        TrackSet::from_rows(rows).unwrap()
    }

    fn run_for(tracks: &TrackSet, vis: &Visibility, start: usize, frame: usize) -> TrailRun {
        trailing_visible_run(
            start,
            frame,
            |s| (tracks.get(s, 0), 0.0),
            |s| vis.get(s, 0),
        )
    }

    #[test]
    fn from_rows_rejects_ragged_input() {
        let rows = vec![vec![[0.0, 0.0], [1.0, 1.0]], vec![[2.0, 2.0]]];
        assert!(TrackSet::from_rows(&rows).is_err());
    }

    #[test]
    fn lerp_blends_positions() {
        let a = set(&[vec![[0.0, 0.0]]]);
        let b = set(&[vec![[10.0, 20.0]]]);
        let m = TrackSet::lerp(&a, &b, 0.5).unwrap();
        assert_eq!(m.get(0, 0), Point::new(5.0, 10.0));
    }

    #[test]
    fn run_collects_fully_visible_window() {
        let tracks = set(&[vec![[1.0, 1.0]], vec![[2.0, 1.0]], vec![[3.0, 1.0]]]);
        let vis = Visibility::all(3, 1);
        let run = run_for(&tracks, &vis, 0, 2);
        assert_eq!(run.len(), 3);
        assert_eq!(run[0].offset, 0);
        assert_eq!(run[2].pos, Point::new(3.0, 1.0));
    }

    #[test]
    fn gap_keeps_only_latest_run() {
        let tracks = set(&[
            vec![[1.0, 1.0]],
            vec![[2.0, 1.0]],
            vec![[3.0, 1.0]],
            vec![[4.0, 1.0]],
        ]);
        let vis = Visibility::from_rows(&[vec![true], vec![false], vec![true], vec![true]]).unwrap();
        let run = run_for(&tracks, &vis, 0, 3);
        assert_eq!(run.len(), 2);
        assert_eq!(run[0].pos, Point::new(3.0, 1.0));
    }

    #[test]
    fn run_ending_before_frame_still_counts() {
        let tracks = set(&[vec![[1.0, 1.0]], vec![[2.0, 1.0]], vec![[3.0, 1.0]]]);
        let vis = Visibility::from_rows(&[vec![true], vec![true], vec![false]]).unwrap();
        let run = run_for(&tracks, &vis, 0, 2);
        assert_eq!(run.len(), 2);
        assert_eq!(run[1].pos, Point::new(2.0, 1.0));
    }

    #[test]
    fn origin_sentinel_splits_runs_even_when_visible() {
        let tracks = set(&[vec![[1.0, 1.0]], vec![[0.0, 0.0]], vec![[3.0, 1.0]]]);
        let vis = Visibility::all(3, 1);
        let run = run_for(&tracks, &vis, 0, 2);
        assert_eq!(run.len(), 1);
        assert_eq!(run[0].pos, Point::new(3.0, 1.0));
    }

    #[test]
    fn depth_z_range_widens_degenerate_extent() {
        let d = DepthTrackSet::from_rows(&[vec![[1.0, 2.0, 5.0]], vec![[3.0, 4.0, 5.0]]]).unwrap();
        assert_eq!(d.z_range(), (5.0, 6.0));
    }

    #[test]
    fn visibility_intersection_requires_matching_shape() {
        let a = Visibility::all(2, 1);
        let b = Visibility::from_rows(&[vec![true], vec![false]]).unwrap();
        let c = Visibility::intersect(&a, &b).unwrap();
        assert!(c.get(0, 0));
        assert!(!c.get(1, 0));

        let d = Visibility::all(3, 1);
        assert!(Visibility::intersect(&a, &d).is_err());
    }
}
