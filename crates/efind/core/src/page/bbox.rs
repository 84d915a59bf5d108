// eFIND
// Copyright (C) 2025 FESTIval contributors

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

/// Axis-aligned 2-D bounding box used by entries and by the flushing scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    /// Lower corner (x, y)
    pub min: [f64; 2],
    /// Upper corner (x, y)
    pub max: [f64; 2],
}

impl BBox {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Self { min, max }
    }

    /// Area of the box. Degenerate boxes have area 0.
    pub fn area(&self) -> f64 {
        let dx = (self.max[0] - self.min[0]).max(0.0);
        let dy = (self.max[1] - self.min[1]).max(0.0);
        dx * dy
    }

    /// Grows this box so that it also covers `other`.
    pub fn expand(&mut self, other: &BBox) {
        for d in 0..2 {
            if other.min[d] < self.min[d] {
                self.min[d] = other.min[d];
            }
            if other.max[d] > self.max[d] {
                self.max[d] = other.max[d];
            }
        }
    }

    /// Area of the intersection with `other`, 0 when disjoint.
    pub fn intersection_area(&self, other: &BBox) -> f64 {
        let mut area = 1.0;
        for d in 0..2 {
            let lo = self.min[d].max(other.min[d]);
            let hi = self.max[d].min(other.max[d]);
            if hi <= lo {
                return 0.0;
            }
            area *= hi - lo;
        }
        area
    }
}

/// Sum of the pairwise intersection areas of a set of boxes. This is the
/// self-overlap metric of a modified region: 0 when no two boxes intersect.
pub fn overlapping_area(boxes: &[BBox]) -> f64 {
    let mut total = 0.0;
    for i in 0..boxes.len() {
        for j in (i + 1)..boxes.len() {
            total += boxes[i].intersection_area(&boxes[j]);
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_and_expand() {
        let mut a = BBox::new([0.0, 0.0], [2.0, 3.0]);
        assert_eq!(a.area(), 6.0);

        a.expand(&BBox::new([-1.0, 1.0], [1.0, 5.0]));
        assert_eq!(a.min, [-1.0, 0.0]);
        assert_eq!(a.max, [2.0, 5.0]);
        assert_eq!(a.area(), 15.0);
    }

    #[test]
    fn test_intersection_area() {
        let a = BBox::new([0.0, 0.0], [2.0, 2.0]);
        let b = BBox::new([1.0, 1.0], [3.0, 3.0]);
        let c = BBox::new([5.0, 5.0], [6.0, 6.0]);

        assert_eq!(a.intersection_area(&b), 1.0);
        assert_eq!(b.intersection_area(&a), 1.0);
        assert_eq!(a.intersection_area(&c), 0.0);
    }

    #[test]
    fn test_overlapping_area_of_set() {
        let boxes = [
            BBox::new([0.0, 0.0], [2.0, 2.0]),
            BBox::new([1.0, 1.0], [3.0, 3.0]),
            BBox::new([10.0, 10.0], [11.0, 11.0]),
        ];
        // only the first two intersect
        assert_eq!(overlapping_area(&boxes), 1.0);
        assert_eq!(overlapping_area(&boxes[2..]), 0.0);
        assert_eq!(overlapping_area(&[]), 0.0);
    }
}
