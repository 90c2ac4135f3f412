//! Exact rasterisation of a straight trail onto the pixel grid.
//!
//! The trail is cut at every integer `i` and `j` boundary it crosses, which partitions it
//! into pieces lying entirely inside one pixel. The length of each piece is the chord the
//! trail traverses in that pixel.
use serde::Deserialize;

/// Crossings closer than this distance (in pixels) along the trail are treated as one.
///
/// This merges a trail passing through a lattice corner into a single crossing, and stops
/// a trail ending on a pixel border from producing an empty chord.
pub const COINCIDENCE_TOLERANCE: f64 = 1e-9;

/// A position in continuous pixel coordinates.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
pub struct PixelCoord {
    pub i: f64,
    pub j: f64,
}

impl PixelCoord {
    pub fn new(i: f64, j: f64) -> Self {
        Self { i, j }
    }

    pub fn distance(&self, other: &Self) -> f64 {
        (other.i - self.i).hypot(other.j - self.j)
    }

    fn midpoint(&self, other: &Self) -> Self {
        Self::new(0.5 * (self.i + other.i), 0.5 * (self.j + other.j))
    }
}

/// Extent of the pixel grid, pixels are indexed `0..rows` and `0..cols`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridBounds {
    pub rows: usize,
    pub cols: usize,
}

impl GridBounds {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Whether the point lies in the closed rectangle `[0, rows] x [0, cols]`.
    fn contains(&self, point: &PixelCoord) -> bool {
        (-COINCIDENCE_TOLERANCE..=self.rows as f64 + COINCIDENCE_TOLERANCE).contains(&point.i)
            && (-COINCIDENCE_TOLERANCE..=self.cols as f64 + COINCIDENCE_TOLERANCE)
                .contains(&point.j)
    }

    /// The pixel containing the point, if it is on the grid.
    fn pixel_at(&self, point: &PixelCoord) -> Option<(usize, usize)> {
        let (i, j) = (point.i.floor(), point.j.floor());
        ((0.0..self.rows as f64).contains(&i) && (0.0..self.cols as f64).contains(&j))
            .then_some((i as usize, j as usize))
    }
}

impl From<(usize, usize)> for GridBounds {
    fn from((rows, cols): (usize, usize)) -> Self {
        Self::new(rows, cols)
    }
}

/// Length of trail traversed inside pixel `(i, j)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelChord {
    pub i: usize,
    pub j: usize,
    pub length: f64,
}

/// The pixels crossed by a trail, ordered along the direction of increasing `i`.
///
/// Each pixel appears at most once.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrailSegment(Vec<PixelChord>);

impl TrailSegment {
    pub fn iter(&self) -> std::slice::Iter<'_, PixelChord> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total_length(&self) -> f64 {
        self.0.iter().map(|chord| chord.length).sum()
    }
}

impl<'a> IntoIterator for &'a TrailSegment {
    type Item = &'a PixelChord;
    type IntoIter = std::slice::Iter<'a, PixelChord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Ordering of crossings at exactly the same position along the trail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum CrossingKind {
    Endpoint,
    IBoundary,
    JBoundary,
}

#[derive(Clone, Copy, Debug)]
struct Crossing {
    /// Fraction of the trail preceding the crossing, in `[0, 1]`.
    position: f64,
    kind: CrossingKind,
    point: PixelCoord,
}

impl Crossing {
    /// Merges a coincident crossing into this one, snapping onto the boundary it lies on.
    fn absorb(&mut self, other: &Crossing) {
        match (self.kind, other.kind) {
            (CrossingKind::IBoundary, CrossingKind::JBoundary) => self.point.j = other.point.j,
            (CrossingKind::JBoundary, CrossingKind::IBoundary) => self.point.i = other.point.i,
            _ => {}
        }
    }
}

/// Integer boundaries strictly between `from` and `to`, restricted to `[0, limit]`.
fn interior_boundaries(from: f64, to: f64, limit: usize) -> impl Iterator<Item = f64> {
    let (lower, upper) = if from < to { (from, to) } else { (to, from) };
    let first = (lower.floor() + 1.0).max(0.0);
    let last = (upper.ceil() - 1.0).min(limit as f64);
    let boundaries = if first <= last {
        first as u64..=last as u64
    } else {
        1..=0
    };
    boundaries.map(|boundary| boundary as f64)
}

/// Every boundary crossing of the trail from `p0` to `p1`, plus both endpoints, unsorted.
fn boundary_crossings(p0: PixelCoord, p1: PixelCoord, bounds: GridBounds) -> Vec<Crossing> {
    let di = p1.i - p0.i;
    let dj = p1.j - p0.j;

    let mut crossings = vec![
        Crossing {
            position: 0.0,
            kind: CrossingKind::Endpoint,
            point: p0,
        },
        Crossing {
            position: 1.0,
            kind: CrossingKind::Endpoint,
            point: p1,
        },
    ];
    if di != 0.0 {
        crossings.extend(interior_boundaries(p0.i, p1.i, bounds.rows).map(|i| {
            let position = (i - p0.i) / di;
            Crossing {
                position,
                kind: CrossingKind::IBoundary,
                point: PixelCoord::new(i, p0.j + position * dj),
            }
        }));
    }
    if dj != 0.0 {
        crossings.extend(interior_boundaries(p0.j, p1.j, bounds.cols).map(|j| {
            let position = (j - p0.j) / dj;
            Crossing {
                position,
                kind: CrossingKind::JBoundary,
                point: PixelCoord::new(p0.i + position * di, j),
            }
        }));
    }
    crossings
}

/// Computes the pixels crossed by the trail from `start` to `end`, and the chord length
/// traversed in each.
///
/// The part of the trail outside the grid is discarded. A zero length trail yields the
/// single pixel containing it, with a zero chord.
#[tracing::instrument(skip_all, level = "trace", fields(num_pixels))]
pub fn traverse(start: PixelCoord, end: PixelCoord, bounds: GridBounds) -> TrailSegment {
    let (p0, p1) = if start.i < end.i {
        (start, end)
    } else {
        (end, start)
    };
    let length = p0.distance(&p1);

    let mut crossings = boundary_crossings(p0, p1, bounds);
    crossings.sort_by(|a, b| {
        a.position
            .total_cmp(&b.position)
            .then(a.kind.cmp(&b.kind))
    });

    let mut merged = Vec::<Crossing>::with_capacity(crossings.len());
    for crossing in crossings {
        match merged.last_mut() {
            Some(previous)
                if (crossing.position - previous.position) * length <= COINCIDENCE_TOLERANCE =>
            {
                previous.absorb(&crossing)
            }
            _ => merged.push(crossing),
        }
    }
    merged.retain(|crossing| bounds.contains(&crossing.point));

    let chords: Vec<PixelChord> = match merged.as_slice() {
        [only] if length <= COINCIDENCE_TOLERANCE => bounds
            .pixel_at(&only.point)
            .map(|(i, j)| PixelChord { i, j, length })
            .into_iter()
            .collect(),
        crossings => crossings
            .windows(2)
            .filter_map(|pair| match pair {
                [a, b] => bounds
                    .pixel_at(&a.point.midpoint(&b.point))
                    .map(|(i, j)| PixelChord {
                        i,
                        j,
                        length: a.point.distance(&b.point),
                    }),
                _ => None,
            })
            .collect(),
    };
    tracing::Span::current().record("num_pixels", chords.len());
    TrailSegment(chords)
}
