//! Perspective grid projection and hit testing
//!
//! The farm is drawn as a skewed quadrilateral over the background
//! illustration. Cells are addressed in normalized field coordinates
//! `(u, v)` and mapped to pixels by bilinear interpolation of the four
//! field corners. Iso-`u` and iso-`v` lines of a bilinear patch are straight,
//! so every cell maps to a quadrilateral with straight edges and
//! screen-to-cell lookup is a point-in-quad test.

use cyberfarm_protocol::FieldRatio;
use thiserror::Error;

/// Screen-space point in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned placement rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// A projected point plus its normalized depth (`v`) for perspective scaling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedPoint {
    pub x: f64,
    pub y: f64,
    pub depth: f64,
}

impl ProjectedPoint {
    pub const fn point(self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Discrete cell address: column `x`, row `y`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellPos {
    pub x: usize,
    pub y: usize,
}

/// The field corners resolved to pixels for the current layout
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenField {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_left: Point,
    pub bottom_right: Point,
}

impl ScreenField {
    /// Bilinear map from field coordinates to pixels
    pub fn at(&self, u: f64, v: f64) -> ProjectedPoint {
        let (tl, tr, bl, br) = (
            self.top_left,
            self.top_right,
            self.bottom_left,
            self.bottom_right,
        );
        let w_tl = (1.0 - u) * (1.0 - v);
        let w_tr = u * (1.0 - v);
        let w_bl = (1.0 - u) * v;
        let w_br = u * v;
        ProjectedPoint {
            x: tl.x * w_tl + tr.x * w_tr + bl.x * w_bl + br.x * w_br,
            y: tl.y * w_tl + tr.y * w_tr + bl.y * w_bl + br.y * w_br,
            depth: v,
        }
    }

    /// Corners in traversal order TL, TR, BR, BL
    pub const fn outline(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }
}

/// Rejected field configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("grid must have at least 2 cells per side, got {0}")]
    GridTooSmall(i64),

    #[error("field ratio corner {corner} has component {value} outside [0, 1]")]
    RatioOutOfRange { corner: &'static str, value: f64 },

    #[error("field ratio corners do not form a convex quadrilateral")]
    NotConvex,
}

/// Traversal direction of a polygon in screen space (y down)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winding {
    Clockwise,
    CounterClockwise,
}

fn cross(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    ax * by - ay * bx
}

/// Turn direction at each corner of `quad`
fn corner_turns(quad: &[Point; 4]) -> [f64; 4] {
    let mut turns = [0.0; 4];
    for (i, turn) in turns.iter_mut().enumerate() {
        let a = quad[i];
        let b = quad[(i + 1) % 4];
        let c = quad[(i + 2) % 4];
        *turn = cross(b.x - a.x, b.y - a.y, c.x - b.x, c.y - b.y);
    }
    turns
}

/// Winding of `quad`, or `None` when its signed area is zero
pub fn winding(quad: &[Point; 4]) -> Option<Winding> {
    let twice_area: f64 = (0..4)
        .map(|i| {
            let a = quad[i];
            let b = quad[(i + 1) % 4];
            cross(a.x, a.y, b.x, b.y)
        })
        .sum();
    if twice_area > 0.0 {
        Some(Winding::Clockwise)
    } else if twice_area < 0.0 {
        Some(Winding::CounterClockwise)
    } else {
        None
    }
}

/// True when every corner turns the same way and none is collinear
pub fn is_convex(quad: &[Point; 4]) -> bool {
    let turns = corner_turns(quad);
    turns.iter().all(|t| *t > 0.0) || turns.iter().all(|t| *t < 0.0)
}

/// Sign-consistency test over the four edges of a convex quad
///
/// A point on an edge counts as inside. Either winding is accepted; the quad
/// must be convex and not self-intersecting.
pub fn point_in_quad(p: Point, quad: &[Point; 4]) -> bool {
    let mut sign = 0.0_f64;

    for i in 0..4 {
        let a = quad[i];
        let b = quad[(i + 1) % 4];
        let c = cross(b.x - a.x, b.y - a.y, p.x - a.x, p.y - a.y);

        if c == 0.0 {
            continue;
        }
        if sign == 0.0 {
            sign = c.signum();
        } else if c.signum() != sign {
            return false;
        }
    }
    true
}

/// Maps discrete cells onto the field quadrilateral
#[derive(Debug, Clone, PartialEq)]
pub struct GridProjector {
    grid: usize,
    ratio: FieldRatio,
}

impl GridProjector {
    /// Validate the session geometry
    ///
    /// Fails for `grid < 2` (the projection divides by `grid - 1`), for ratio
    /// components outside `[0, 1]`, and for a field that is not a strictly
    /// convex quadrilateral.
    pub fn new(grid: i64, ratio: FieldRatio) -> Result<Self, GeometryError> {
        let grid = usize::try_from(grid)
            .ok()
            .filter(|g| *g >= 2)
            .ok_or(GeometryError::GridTooSmall(grid))?;

        let corners = [
            ("topLeft", ratio.top_left),
            ("topRight", ratio.top_right),
            ("bottomRight", ratio.bottom_right),
            ("bottomLeft", ratio.bottom_left),
        ];
        for (corner, [u, v]) in corners {
            for value in [u, v] {
                if !(0.0..=1.0).contains(&value) {
                    return Err(GeometryError::RatioOutOfRange { corner, value });
                }
            }
        }

        let unit = corners.map(|(_, [u, v])| Point::new(u, v));
        if !is_convex(&unit) {
            return Err(GeometryError::NotConvex);
        }

        Ok(Self { grid, ratio })
    }

    pub const fn grid(&self) -> usize {
        self.grid
    }

    pub const fn ratio(&self) -> &FieldRatio {
        &self.ratio
    }

    /// Resolve the field ratio against the background placement rectangle
    pub fn resolve_field(&self, background: Rect) -> ScreenField {
        let place = |[u, v]: [f64; 2]| {
            Point::new(background.x + u * background.w, background.y + v * background.h)
        };
        ScreenField {
            top_left: place(self.ratio.top_left),
            top_right: place(self.ratio.top_right),
            bottom_left: place(self.ratio.bottom_left),
            bottom_right: place(self.ratio.bottom_right),
        }
    }

    fn span(&self) -> f64 {
        (self.grid - 1) as f64
    }

    /// Anchor point of a cell's sprite
    ///
    /// Biased by `(0.35, 0.2)` of a cell toward the visual base of an
    /// isometric sprite rather than the geometric centre.
    pub fn cell_center(&self, x: usize, y: usize, field: &ScreenField) -> ProjectedPoint {
        let u = (x as f64 + 0.35) / self.span();
        let v = (y as f64 + 0.2) / self.span();
        field.at(u, v)
    }

    /// Outline of one cell in TL, TR, BR, BL order
    pub fn cell_corners(&self, x: usize, y: usize, field: &ScreenField) -> [Point; 4] {
        let step = 1.0 / self.span();

        let u0 = x as f64 * step;
        let v0 = y as f64 * step;
        let u1 = (x + 1) as f64 * step;
        let v1 = (y + 1) as f64 * step;

        [
            field.at(u0, v0).point(),
            field.at(u1, v0).point(),
            field.at(u1, v1).point(),
            field.at(u0, v1).point(),
        ]
    }

    /// All cells in row-major scan order
    pub fn cells(&self) -> impl Iterator<Item = CellPos> {
        let grid = self.grid;
        (0..grid).flat_map(move |y| (0..grid).map(move |x| CellPos { x, y }))
    }

    /// First cell in row-major order whose outline contains `p`
    ///
    /// Points on a shared edge resolve to whichever neighbour is scanned
    /// first.
    pub fn hit_test(&self, p: Point, field: &ScreenField) -> Option<CellPos> {
        self.cells()
            .find(|cell| point_in_quad(p, &self.cell_corners(cell.x, cell.y, field)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn square_ratio() -> FieldRatio {
        FieldRatio {
            top_left: [0.0, 0.0],
            top_right: [1.0, 0.0],
            bottom_left: [0.0, 1.0],
            bottom_right: [1.0, 1.0],
        }
    }

    fn farm_ratio() -> FieldRatio {
        FieldRatio {
            top_left: [0.425, 0.545],
            top_right: [0.755, 0.625],
            bottom_left: [0.165, 0.625],
            bottom_right: [0.565, 0.815],
        }
    }

    fn rect(w: f64, h: f64) -> Rect {
        Rect { x: 0.0, y: 0.0, w, h }
    }

    #[test]
    fn test_rejects_small_grid() {
        assert_eq!(
            GridProjector::new(1, square_ratio()),
            Err(GeometryError::GridTooSmall(1))
        );
        assert_eq!(
            GridProjector::new(-4, square_ratio()),
            Err(GeometryError::GridTooSmall(-4))
        );
    }

    #[test]
    fn test_rejects_ratio_out_of_range() {
        let mut ratio = square_ratio();
        ratio.bottom_right = [1.2, 1.0];
        assert!(matches!(
            GridProjector::new(6, ratio),
            Err(GeometryError::RatioOutOfRange { corner: "bottomRight", .. })
        ));
    }

    #[test]
    fn test_rejects_bow_tie_and_degenerate_fields() {
        let mut crossed = square_ratio();
        crossed.bottom_left = [1.0, 1.0];
        crossed.bottom_right = [0.0, 1.0];
        assert_eq!(GridProjector::new(6, crossed), Err(GeometryError::NotConvex));

        let flat = FieldRatio {
            top_left: [0.0, 0.5],
            top_right: [0.5, 0.5],
            bottom_left: [0.25, 0.5],
            bottom_right: [1.0, 0.5],
        };
        assert_eq!(GridProjector::new(6, flat), Err(GeometryError::NotConvex));
    }

    #[test]
    fn test_accepts_farm_field() {
        assert!(GridProjector::new(6, farm_ratio()).is_ok());
    }

    #[test]
    fn test_resolve_field_places_corners() {
        let projector = GridProjector::new(6, farm_ratio()).unwrap();
        let field = projector.resolve_field(Rect { x: 10.0, y: 20.0, w: 1000.0, h: 500.0 });
        assert!((field.top_left.x - 435.0).abs() < 1e-9);
        assert!((field.top_left.y - 292.5).abs() < 1e-9);
        assert!((field.bottom_right.x - 575.0).abs() < 1e-9);
        assert!((field.bottom_right.y - 427.5).abs() < 1e-9);
    }

    #[test]
    fn test_cell_center_bias_and_depth() {
        let projector = GridProjector::new(5, square_ratio()).unwrap();
        let field = projector.resolve_field(rect(400.0, 400.0));
        let p = projector.cell_center(0, 0, &field);
        // step = 100px
        assert!((p.x - 35.0).abs() < 1e-9);
        assert!((p.y - 20.0).abs() < 1e-9);
        assert!((p.depth - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_cell_corners_axis_aligned() {
        let projector = GridProjector::new(5, square_ratio()).unwrap();
        let field = projector.resolve_field(rect(400.0, 400.0));
        let q = projector.cell_corners(1, 2, &field);
        assert_eq!(q[0], Point::new(100.0, 200.0));
        assert_eq!(q[1], Point::new(200.0, 200.0));
        assert_eq!(q[2], Point::new(200.0, 300.0));
        assert_eq!(q[3], Point::new(100.0, 300.0));
    }

    #[test]
    fn test_point_in_quad_edges_count_inside() {
        let q = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        assert!(point_in_quad(Point::new(5.0, 5.0), &q));
        assert!(point_in_quad(Point::new(10.0, 5.0), &q));
        assert!(point_in_quad(Point::new(0.0, 0.0), &q));
        assert!(!point_in_quad(Point::new(10.5, 5.0), &q));
        assert!(!point_in_quad(Point::new(-1.0, -1.0), &q));
    }

    #[test]
    fn test_point_in_quad_relabel_and_reverse() {
        let q = [
            Point::new(3.0, 1.0),
            Point::new(9.0, 2.0),
            Point::new(8.0, 9.0),
            Point::new(1.0, 7.0),
        ];
        let rotated = [q[2], q[3], q[0], q[1]];
        let reversed = [q[3], q[2], q[1], q[0]];

        assert_eq!(winding(&q), Some(Winding::Clockwise));
        assert_eq!(winding(&rotated), Some(Winding::Clockwise));
        assert_eq!(winding(&reversed), Some(Winding::CounterClockwise));

        for p in [
            Point::new(5.0, 5.0),
            Point::new(0.5, 0.5),
            Point::new(8.9, 2.5),
            Point::new(9.5, 9.5),
        ] {
            let inside = point_in_quad(p, &q);
            assert_eq!(point_in_quad(p, &rotated), inside);
            assert_eq!(point_in_quad(p, &reversed), inside);
        }
    }

    #[test]
    fn test_hit_test_outside_field() {
        let projector = GridProjector::new(6, farm_ratio()).unwrap();
        let field = projector.resolve_field(rect(1000.0, 600.0));
        assert_eq!(projector.hit_test(Point::new(5.0, 5.0), &field), None);
    }

    #[test]
    fn test_shared_edge_goes_to_first_scanned_cell() {
        // step = 0.25 keeps every coordinate exact in binary
        let projector = GridProjector::new(5, square_ratio()).unwrap();
        let field = projector.resolve_field(rect(500.0, 500.0));
        let boundary = Point::new(375.0, 187.5);

        assert!(point_in_quad(boundary, &projector.cell_corners(2, 1, &field)));
        assert!(point_in_quad(boundary, &projector.cell_corners(3, 1, &field)));
        assert_eq!(
            projector.hit_test(boundary, &field),
            Some(CellPos { x: 2, y: 1 })
        );
    }

    fn corner(lo_u: f64, lo_v: f64) -> impl Strategy<Value = [f64; 2]> {
        (lo_u..lo_u + 0.1, lo_v..lo_v + 0.1).prop_map(|(u, v)| [u, v])
    }

    prop_compose! {
        fn convex_ratio()(
            top_left in corner(0.0, 0.0),
            top_right in corner(0.9, 0.0),
            bottom_right in corner(0.9, 0.9),
            bottom_left in corner(0.0, 0.9),
        ) -> FieldRatio {
            FieldRatio { top_left, top_right, bottom_left, bottom_right }
        }
    }

    proptest! {
        #[test]
        fn prop_center_lands_in_own_cell(
            ratio in convex_ratio(),
            grid in 3_i64..12,
            w in 200.0_f64..2000.0,
            h in 200.0_f64..2000.0,
            cx in 0_usize..12,
            cy in 0_usize..12,
        ) {
            let projector = GridProjector::new(grid, ratio).unwrap();
            let x = cx % projector.grid();
            let y = cy % projector.grid();
            let field = projector.resolve_field(Rect { x: 15.0, y: 0.0, w, h });

            let center = projector.cell_center(x, y, &field).point();
            prop_assert_eq!(projector.hit_test(center, &field), Some(CellPos { x, y }));
        }

        #[test]
        fn prop_cells_are_convex_and_tile(
            ratio in convex_ratio(),
            grid in 2_i64..10,
        ) {
            let projector = GridProjector::new(grid, ratio).unwrap();
            let field = projector.resolve_field(Rect { x: 0.0, y: 0.0, w: 800.0, h: 600.0 });
            let n = projector.grid();
            let outer = winding(&field.outline());

            for y in 0..n {
                for x in 0..n {
                    let q = projector.cell_corners(x, y, &field);
                    prop_assert!(is_convex(&q));
                    prop_assert_eq!(winding(&q), outer);

                    if x + 1 < n {
                        let right = projector.cell_corners(x + 1, y, &field);
                        prop_assert_eq!(q[1], right[0]);
                        prop_assert_eq!(q[2], right[3]);
                    }
                    if y + 1 < n {
                        let below = projector.cell_corners(x, y + 1, &field);
                        prop_assert_eq!(q[3], below[0]);
                        prop_assert_eq!(q[2], below[1]);
                    }
                }
            }
        }
    }
}
