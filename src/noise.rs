//! A deterministic 3D coherent noise function in the OpenSimplex family.
//!
//! Every table here is fixed data evaluated at compile time.
//! Nothing depends on a seed; seeding happens one layer up, by offsetting where each octave samples (see [`OctaveOffsets`](crate::density::OctaveOffsets)).

use bevy_math::Vec3;

const STRETCH_3D: f32 = -1.0 / 6.0;
const SQUISH_3D: f32 = 1.0 / 3.0;
const NORM_3D: f32 = 1.0 / 103.0;

/// The longest chain of lattice points that can contribute to a single sample.
const MAX_CHAIN_LEN: usize = 8;
const CHAIN_COUNT: usize = 24;
/// Marks an in-cell hash that has no contribution chain.
const NO_CHAIN: u8 = u8::MAX;

/// The base sets of contributing points, as `(multiplier, dx, dy, dz)` quadruples.
const BASE_3D: [&[i8]; 3] = [
    &[0, 0, 0, 0, 1, 1, 0, 0, 1, 0, 1, 0, 1, 0, 0, 1],
    &[2, 1, 1, 0, 2, 1, 0, 1, 2, 0, 1, 1, 3, 1, 1, 1],
    &[
        1, 1, 0, 0, 1, 0, 1, 0, 1, 0, 0, 1, 2, 1, 1, 0, 2, 1, 0, 1, 2, 0, 1, 1,
    ],
];

/// Each group of 9 is a base set index followed by two extra `(multiplier, dx, dy, dz)` points.
#[rustfmt::skip]
const P_3D: [i8; CHAIN_COUNT * 9] = [
    0, 0, 1, -1, 0, 0, 1, 0, -1,
    0, 0, -1, 1, 0, 0, 0, 1, -1,
    0, 0, -1, 0, 1, 0, 0, -1, 1,
    0, 2, 1, 1, 0, 1, 1, 1, -1,
    0, 2, 1, 0, 1, 1, 1, -1, 1,
    0, 2, 0, 1, 1, 1, -1, 1, 1,
    1, 3, 2, 1, 0, 3, 1, 2, 0,
    1, 3, 2, 0, 1, 3, 1, 0, 2,
    1, 3, 0, 2, 1, 3, 0, 1, 2,
    1, 1, 1, 0, 0, 2, 2, 0, 0,
    1, 1, 0, 1, 0, 2, 0, 2, 0,
    1, 1, 0, 0, 1, 2, 0, 0, 2,
    2, 0, 0, 0, 0, 1, 1, -1, 1,
    2, 0, 0, 0, 0, 1, -1, 1, 1,
    2, 0, 0, 0, 0, 1, 1, 1, -1,
    2, 3, 1, 1, 1, 2, 0, 0, 2,
    2, 3, 1, 1, 1, 2, 2, 0, 0,
    2, 3, 1, 1, 1, 2, 0, 2, 0,
    2, 1, 1, -1, 1, 2, 0, 0, 2,
    2, 1, 1, -1, 1, 2, 2, 0, 0,
    2, 1, -1, 1, 1, 2, 0, 0, 2,
    2, 1, -1, 1, 1, 2, 0, 2, 0,
    2, 1, 1, 1, -1, 2, 2, 0, 0,
    2, 1, 1, 1, -1, 2, 0, 2, 0,
];

/// Pairs of `(in-cell hash, chain index)`.
#[rustfmt::skip]
const LOOKUP_PAIRS_3D: [u16; 144] = [
    0, 2, 1, 1, 2, 2, 5, 1, 6, 0, 7, 0, 32, 2, 34, 2, 129, 1, 133, 1, 160, 5, 161, 5,
    518, 0, 519, 0, 546, 4, 550, 4, 645, 3, 647, 3, 672, 5, 673, 5, 674, 4, 677, 3,
    678, 4, 679, 3, 680, 13, 681, 13, 682, 12, 685, 14, 686, 12, 687, 14, 712, 20, 714, 18,
    809, 21, 813, 23, 840, 20, 841, 21, 1198, 19, 1199, 22, 1226, 18, 1230, 19, 1325, 23, 1327, 22,
    1352, 15, 1353, 17, 1354, 15, 1357, 17, 1358, 16, 1359, 16, 1360, 11, 1361, 10, 1362, 11, 1365, 10,
    1366, 9, 1367, 9, 1392, 11, 1394, 11, 1489, 10, 1493, 10, 1520, 8, 1521, 8, 1878, 9, 1879, 9,
    1906, 7, 1910, 7, 2005, 6, 2007, 6, 2032, 8, 2033, 8, 2034, 7, 2037, 6, 2038, 7, 2039, 6,
];

/// 24 gradient directions of magnitude `(11, 4, 4)`, flattened.
#[rustfmt::skip]
const GRADIENTS_3D: [f32; 72] = [
    -11.0, 4.0, 4.0,    -4.0, 11.0, 4.0,    -4.0, 4.0, 11.0,
    11.0, 4.0, 4.0,     4.0, 11.0, 4.0,     4.0, 4.0, 11.0,
    -11.0, -4.0, 4.0,   -4.0, -11.0, 4.0,   -4.0, -4.0, 11.0,
    11.0, -4.0, 4.0,    4.0, -11.0, 4.0,    4.0, -4.0, 11.0,
    -11.0, 4.0, -4.0,   -4.0, 11.0, -4.0,   -4.0, 4.0, -11.0,
    11.0, 4.0, -4.0,    4.0, 11.0, -4.0,    4.0, 4.0, -11.0,
    -11.0, -4.0, -4.0,  -4.0, -11.0, -4.0,  -4.0, -4.0, -11.0,
    11.0, -4.0, -4.0,   4.0, -11.0, -4.0,   4.0, -4.0, -11.0,
];

/// The fixed permutation used to hash integer lattice coordinates.
#[rustfmt::skip]
const PERM: [u8; 256] = [
    151, 160, 137, 91, 90, 15, 131, 13, 201, 95, 96, 53, 194, 233, 7, 225,
    140, 36, 103, 30, 69, 142, 8, 99, 37, 240, 21, 10, 23, 190, 6, 148,
    247, 120, 234, 75, 0, 26, 197, 62, 94, 252, 219, 203, 117, 35, 11, 32,
    57, 177, 33, 88, 237, 149, 56, 87, 174, 20, 125, 136, 171, 168, 68, 175,
    74, 165, 71, 134, 139, 48, 27, 166, 77, 146, 158, 231, 83, 111, 229, 122,
    60, 211, 133, 230, 220, 105, 92, 41, 55, 46, 245, 40, 244, 102, 143, 54,
    65, 25, 63, 161, 1, 216, 80, 73, 209, 76, 132, 187, 208, 89, 18, 169,
    200, 196, 135, 130, 116, 188, 159, 86, 164, 100, 109, 198, 173, 186, 3, 64,
    52, 217, 226, 250, 124, 123, 5, 202, 38, 147, 118, 126, 255, 82, 85, 212,
    207, 206, 59, 227, 47, 16, 58, 17, 182, 189, 28, 42, 223, 183, 170, 213,
    119, 248, 152, 2, 44, 154, 163, 70, 221, 153, 101, 155, 167, 43, 172, 9,
    129, 22, 39, 253, 19, 98, 108, 110, 79, 113, 224, 232, 178, 185, 112, 104,
    218, 246, 97, 228, 251, 34, 242, 193, 238, 210, 144, 12, 191, 179, 162, 241,
    81, 51, 145, 235, 249, 14, 239, 107, 49, 192, 214, 31, 181, 199, 106, 157,
    184, 84, 204, 176, 115, 121, 50, 45, 127, 4, 150, 254, 138, 236, 205, 93,
    222, 114, 67, 29, 24, 72, 243, 141, 128, 195, 78, 66, 215, 61, 156, 180,
];

/// Maps a hashed lattice point to the start of its gradient in [`GRADIENTS_3D`].
static PERM_GRADIENT_3D: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = (PERM[i] % 24) * 3;
        i += 1;
    }
    table
};

static CHAINS_3D: [ContributionChain; CHAIN_COUNT] = build_chains();

static LOOKUP_3D: [u8; 2048] = {
    let mut lookup = [NO_CHAIN; 2048];
    let mut i = 0;
    while i < LOOKUP_PAIRS_3D.len() {
        lookup[LOOKUP_PAIRS_3D[i] as usize] = LOOKUP_PAIRS_3D[i + 1] as u8;
        i += 2;
    }
    lookup
};

/// One lattice point that may contribute to a sample, relative to the sample's skewed cell.
#[derive(Clone, Copy)]
struct Contribution {
    dx: f32,
    dy: f32,
    dz: f32,
    xsb: i32,
    ysb: i32,
    zsb: i32,
}

impl Contribution {
    const ZERO: Self = Self::new(0, 0, 0, 0);

    const fn new(multiplier: i8, xsb: i8, ysb: i8, zsb: i8) -> Self {
        let squish = multiplier as f32 * SQUISH_3D;
        Self {
            dx: -(xsb as f32) - squish,
            dy: -(ysb as f32) - squish,
            dz: -(zsb as f32) - squish,
            xsb: xsb as i32,
            ysb: ysb as i32,
            zsb: zsb as i32,
        }
    }
}

#[derive(Clone, Copy)]
struct ContributionChain {
    len: usize,
    points: [Contribution; MAX_CHAIN_LEN],
}

impl ContributionChain {
    const EMPTY: Self = Self {
        len: 0,
        points: [Contribution::ZERO; MAX_CHAIN_LEN],
    };

    #[inline]
    fn points(&self) -> &[Contribution] {
        &self.points[..self.len]
    }
}

const fn build_chains() -> [ContributionChain; CHAIN_COUNT] {
    let mut chains = [ContributionChain::EMPTY; CHAIN_COUNT];
    let mut i = 0;
    while i < P_3D.len() {
        let chain = i / 9;
        let base = BASE_3D[P_3D[i] as usize];
        let mut len = 0;
        let mut k = 0;
        while k < base.len() {
            chains[chain].points[len] =
                Contribution::new(base[k], base[k + 1], base[k + 2], base[k + 3]);
            len += 1;
            k += 4;
        }
        chains[chain].points[len] =
            Contribution::new(P_3D[i + 1], P_3D[i + 2], P_3D[i + 3], P_3D[i + 4]);
        chains[chain].points[len + 1] =
            Contribution::new(P_3D[i + 5], P_3D[i + 6], P_3D[i + 7], P_3D[i + 8]);
        chains[chain].len = len + 2;
        i += 9;
    }
    chains
}

/// A pure, continuous 3D noise function.
///
/// Output lies roughly within `[-1, 1]`.
/// The same input always produces bit-identical output, and the type holds no state,
/// so it can be freely copied and shared between threads.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NoiseField;

impl NoiseField {
    /// Evaluates the noise at `point`.
    #[inline]
    pub fn sample(self, point: Vec3) -> f32 {
        self.evaluate(point.x, point.y, point.z)
    }

    /// Evaluates the noise at `(x, y, z)`.
    pub fn evaluate(self, x: f32, y: f32, z: f32) -> f32 {
        let stretch_offset = (x + y + z) * STRETCH_3D;
        let xs = x + stretch_offset;
        let ys = y + stretch_offset;
        let zs = z + stretch_offset;

        let xsb = xs.floor() as i32;
        let ysb = ys.floor() as i32;
        let zsb = zs.floor() as i32;

        let squish_offset = (xsb + ysb + zsb) as f32 * SQUISH_3D;
        let dx0 = x - (xsb as f32 + squish_offset);
        let dy0 = y - (ysb as f32 + squish_offset);
        let dz0 = z - (zsb as f32 + squish_offset);

        let xins = xs - xsb as f32;
        let yins = ys - ysb as f32;
        let zins = zs - zsb as f32;
        let in_sum = xins + yins + zins;

        // Every term here is non-negative, so the casts truncate like a floor.
        let hash = (yins - zins + 1.0) as usize
            | ((xins - yins + 1.0) as usize) << 1
            | ((xins - zins + 1.0) as usize) << 2
            | (in_sum as usize) << 3
            | ((in_sum + zins) as usize) << 5
            | ((in_sum + yins) as usize) << 7
            | ((in_sum + xins) as usize) << 9;

        let Some(chain) = CHAINS_3D.get(LOOKUP_3D[hash & 0x7FF] as usize) else {
            return 0.0;
        };

        let mut value = 0.0;
        for c in chain.points() {
            let dx = dx0 + c.dx;
            let dy = dy0 + c.dy;
            let dz = dz0 + c.dz;
            let mut attn = 2.0 - dx * dx - dy * dy - dz * dz;
            if attn > 0.0 {
                let gradient = gradient_index(xsb + c.xsb, ysb + c.ysb, zsb + c.zsb);
                let extrapolation = GRADIENTS_3D[gradient] * dx
                    + GRADIENTS_3D[gradient + 1] * dy
                    + GRADIENTS_3D[gradient + 2] * dz;
                attn *= attn;
                value += attn * attn * extrapolation;
            }
        }
        value * NORM_3D
    }
}

#[inline]
fn gradient_index(x: i32, y: i32, z: i32) -> usize {
    let hx = PERM[(x & 0xFF) as usize] as i32;
    let hy = PERM[((hx + y) & 0xFF) as usize] as i32;
    PERM_GRADIENT_3D[((hy + z) & 0xFF) as usize] as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_points() -> impl Iterator<Item = Vec3> {
        (0..4000).map(|i| {
            let i = i as f32;
            Vec3::new(i * 0.731 - 900.0, i * -0.377 + 40.5, (i * 1.913) % 517.0 - 250.0)
        })
    }

    #[test]
    fn permutation_is_a_bijection() {
        let mut seen = [false; 256];
        for p in PERM {
            assert!(!seen[p as usize], "{p} appears twice");
            seen[p as usize] = true;
        }
    }

    #[test]
    fn chains_are_complete() {
        for chain in &CHAINS_3D {
            assert!(chain.len == 6 || chain.len == 8);
        }
        let mapped = LOOKUP_3D.iter().filter(|&&c| c != NO_CHAIN).count();
        assert_eq!(mapped, LOOKUP_PAIRS_3D.len() / 2);
        assert!(
            LOOKUP_3D
                .iter()
                .all(|&c| c == NO_CHAIN || (c as usize) < CHAIN_COUNT)
        );
    }

    #[test]
    fn repeated_evaluation_is_identical() {
        let noise = NoiseField;
        for p in sample_points() {
            let a = noise.sample(p);
            let b = NoiseField.evaluate(p.x, p.y, p.z);
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn known_values() {
        let expected = [
            ((0.5, 0.25, 0.125), 0xbe8c_63f7),
            ((0.1, 0.2, 0.3), 0xbe3c_9b19),
            ((12.3, -4.56, 7.89), 0xbefb_8a9b),
            ((-100.5, 33.25, 0.75), 0xbece_aaf5),
            ((1234.5, -678.25, 91.0), 0xbedc_0ff9),
        ];
        for ((x, y, z), bits) in expected {
            let n = NoiseField.evaluate(x, y, z);
            assert_eq!(n.to_bits(), bits, "{n} at ({x}, {y}, {z})");
        }
    }

    #[test]
    fn output_is_bounded() {
        for p in sample_points() {
            let n = NoiseField.sample(p);
            assert!(n.is_finite());
            assert!(n.abs() <= 1.0, "{n} at {p}");
        }
    }

    #[test]
    fn output_is_continuous() {
        for p in sample_points().take(500) {
            let a = NoiseField.sample(p);
            let b = NoiseField.sample(p + Vec3::splat(1e-3));
            assert!((a - b).abs() < 0.05, "jump from {a} to {b} at {p}");
        }
    }

    #[test]
    fn lattice_origin_is_near_zero() {
        assert!(NoiseField.evaluate(0.0, 0.0, 0.0).abs() < 1e-6);
    }

    #[test]
    fn output_varies() {
        let values: Vec<f32> = sample_points().map(|p| NoiseField.sample(p)).collect();
        let min = values.iter().copied().fold(f32::MAX, f32::min);
        let max = values.iter().copied().fold(f32::MIN, f32::max);
        assert!(max - min > 0.5);
    }
}
