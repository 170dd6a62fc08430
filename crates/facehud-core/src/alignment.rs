//! Canonical face alignment.
//!
//! Maps the five landmark anchors of a detected face onto fixed reference
//! positions in a 112×112 crop via a least-squares similarity transform,
//! then warps the RGB frame accordingly. The descriptor, age/gender, and
//! expression nets all consume this aligned crop.

/// Reference anchor positions for a 112×112 aligned crop:
/// [left eye, right eye, nose tip, left mouth, right mouth].
pub const REFERENCE_ANCHORS: [(f32, f32); 5] = [
    (38.2946, 51.6963),
    (73.5318, 51.5014),
    (56.0252, 71.7366),
    (41.5493, 92.3655),
    (70.7299, 92.2041),
];

/// Side length of the aligned crop.
pub const ALIGNED_SIZE: usize = 112;

/// A 4-DOF similarity transform (uniform scale, rotation, translation):
///
/// ```text
/// | a  -b  tx |
/// | b   a  ty |
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SimilarityTransform {
    pub a: f32,
    pub b: f32,
    pub tx: f32,
    pub ty: f32,
}

impl SimilarityTransform {
    /// Least-squares estimate mapping `src` anchors onto `dst` anchors.
    ///
    /// Each point pair contributes two rows to an overdetermined system in
    /// (a, b, tx, ty); the normal equations are solved by Gaussian
    /// elimination with partial pivoting.
    pub fn estimate(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> Self {
        let mut ata = [[0.0f32; 4]; 4];
        let mut atb = [0.0f32; 4];

        for i in 0..5 {
            let (sx, sy) = src[i];
            let (dx, dy) = dst[i];

            // sx*a - sy*b + tx = dx
            // sy*a + sx*b + ty = dy
            let rows = [([sx, -sy, 1.0, 0.0], dx), ([sy, sx, 0.0, 1.0], dy)];
            for (row, rhs) in rows {
                for j in 0..4 {
                    for k in 0..4 {
                        ata[j][k] += row[j] * row[k];
                    }
                    atb[j] += row[j] * rhs;
                }
            }
        }

        let x = solve_normal_equations(ata, atb);
        Self { a: x[0], b: x[1], tx: x[2], ty: x[3] }
    }

    /// Map an output-space point back into source-space coordinates.
    /// Returns `None` for a degenerate (near-zero scale) transform.
    fn invert_point(&self, ox: f32, oy: f32) -> Option<(f32, f32)> {
        let det = self.a * self.a + self.b * self.b;
        if det.abs() < 1e-12 {
            return None;
        }
        let dx = ox - self.tx;
        let dy = oy - self.ty;
        let sx = (self.a * dx + self.b * dy) / det;
        let sy = (-self.b * dx + self.a * dy) / det;
        Some((sx, sy))
    }
}

fn solve_normal_equations(ata: [[f32; 4]; 4], atb: [f32; 4]) -> [f32; 4] {
    // Augmented matrix [A | b]
    let mut m = [[0.0f32; 5]; 4];
    for (i, row) in ata.iter().enumerate() {
        m[i][..4].copy_from_slice(row);
        m[i][4] = atb[i];
    }

    for col in 0..4 {
        let mut pivot_row = col;
        for row in (col + 1)..4 {
            if m[row][col].abs() > m[pivot_row][col].abs() {
                pivot_row = row;
            }
        }
        m.swap(col, pivot_row);

        let pivot = m[col][col];
        if pivot.abs() < 1e-12 {
            // Degenerate anchor configuration; fall back to identity scale.
            return [1.0, 0.0, 0.0, 0.0];
        }

        for row in (col + 1)..4 {
            let factor = m[row][col] / pivot;
            for j in col..5 {
                m[row][j] -= factor * m[col][j];
            }
        }
    }

    let mut x = [0.0f32; 4];
    for i in (0..4).rev() {
        x[i] = m[i][4];
        for j in (i + 1)..4 {
            x[i] -= m[i][j] * x[j];
        }
        x[i] /= m[i][i];
    }
    x
}

/// Warp an RGB frame into a canonical 112×112 aligned crop.
///
/// `rgb` is tightly packed `width * height * 3` bytes. Sampling is bilinear
/// per channel; out-of-bounds samples are black.
pub fn align_face(
    rgb: &[u8],
    width: u32,
    height: u32,
    anchors: &[(f32, f32); 5],
) -> Vec<u8> {
    let transform = SimilarityTransform::estimate(anchors, &REFERENCE_ANCHORS);
    warp_rgb(rgb, width as usize, height as usize, &transform, ALIGNED_SIZE)
}

fn warp_rgb(
    rgb: &[u8],
    src_width: usize,
    src_height: usize,
    transform: &SimilarityTransform,
    out_size: usize,
) -> Vec<u8> {
    let mut output = vec![0u8; out_size * out_size * 3];

    for oy in 0..out_size {
        for ox in 0..out_size {
            let Some((sx, sy)) = transform.invert_point(ox as f32, oy as f32) else {
                return output;
            };

            let x0 = sx.floor() as i32;
            let y0 = sy.floor() as i32;
            let fx = sx - x0 as f32;
            let fy = sy - y0 as f32;

            let sample = |x: i32, y: i32, c: usize| -> f32 {
                if x >= 0 && x < src_width as i32 && y >= 0 && y < src_height as i32 {
                    rgb[(y as usize * src_width + x as usize) * 3 + c] as f32
                } else {
                    0.0
                }
            };

            let out_base = (oy * out_size + ox) * 3;
            for c in 0..3 {
                let val = sample(x0, y0, c) * (1.0 - fx) * (1.0 - fy)
                    + sample(x0 + 1, y0, c) * fx * (1.0 - fy)
                    + sample(x0, y0 + 1, c) * (1.0 - fx) * fy
                    + sample(x0 + 1, y0 + 1, c) * fx * fy;
                output[out_base + c] = val.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_identity() {
        let t = SimilarityTransform::estimate(&REFERENCE_ANCHORS, &REFERENCE_ANCHORS);
        assert!((t.a - 1.0).abs() < 1e-4, "a = {}", t.a);
        assert!(t.b.abs() < 1e-4, "b = {}", t.b);
        assert!(t.tx.abs() < 1e-3, "tx = {}", t.tx);
        assert!(t.ty.abs() < 1e-3, "ty = {}", t.ty);
    }

    #[test]
    fn test_estimate_half_scale() {
        // Source anchors at 2x → transform scale ≈ 0.5.
        let src: [(f32, f32); 5] =
            std::array::from_fn(|i| (REFERENCE_ANCHORS[i].0 * 2.0, REFERENCE_ANCHORS[i].1 * 2.0));
        let t = SimilarityTransform::estimate(&src, &REFERENCE_ANCHORS);
        assert!((t.a - 0.5).abs() < 0.02, "a = {}", t.a);
    }

    #[test]
    fn test_align_output_dimensions() {
        let rgb = vec![90u8; 320 * 240 * 3];
        let aligned = align_face(&rgb, 320, 240, &REFERENCE_ANCHORS);
        assert_eq!(aligned.len(), ALIGNED_SIZE * ALIGNED_SIZE * 3);
    }

    #[test]
    fn test_uniform_frame_stays_uniform_inside() {
        // Identity anchors → interior pixels sample the uniform frame.
        let rgb = vec![120u8; 200 * 200 * 3];
        let aligned = align_face(&rgb, 200, 200, &REFERENCE_ANCHORS);
        // Center of the crop maps inside the source for an identity-ish warp.
        let mid = (ALIGNED_SIZE / 2 * ALIGNED_SIZE + ALIGNED_SIZE / 2) * 3;
        assert_eq!(aligned[mid], 120);
        assert_eq!(aligned[mid + 1], 120);
        assert_eq!(aligned[mid + 2], 120);
    }

    #[test]
    fn test_colored_patch_lands_at_reference_anchor() {
        // Paint a red patch at the source left-eye anchor and verify it ends
        // up near the reference left-eye position after warping.
        let w = 200usize;
        let h = 200usize;
        let mut rgb = vec![0u8; w * h * 3];

        let src: [(f32, f32); 5] = [
            (80.0, 60.0),
            (120.0, 60.0),
            (100.0, 85.0),
            (85.0, 110.0),
            (115.0, 110.0),
        ];

        let (lx, ly) = (src[0].0 as usize, src[0].1 as usize);
        for dy in 0..5 {
            for dx in 0..5 {
                let px = lx - 2 + dx;
                let py = ly - 2 + dy;
                rgb[(py * w + px) * 3] = 255; // red channel
            }
        }

        let aligned = align_face(&rgb, w as u32, h as u32, &src);

        let ref_x = REFERENCE_ANCHORS[0].0.round() as usize;
        let ref_y = REFERENCE_ANCHORS[0].1.round() as usize;
        let mut max_red = 0u8;
        for dy in 0..3 {
            for dx in 0..3 {
                let x = ref_x - 1 + dx;
                let y = ref_y - 1 + dy;
                max_red = max_red.max(aligned[(y * ALIGNED_SIZE + x) * 3]);
            }
        }
        assert!(max_red > 100, "expected red patch near ({ref_x}, {ref_y}), max={max_red}");
    }
}
