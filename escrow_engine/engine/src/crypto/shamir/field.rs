//! GF(2^8) arithmetic with the AES reduction polynomial x^8 + x^4 + x^3 + x + 1.

/// Low byte of the reduction polynomial (0x11b).
const REDUCTION: u8 = 0x1b;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Gf256(pub u8);

impl Gf256 {
    pub const ZERO: Gf256 = Gf256(0);
    pub const ONE: Gf256 = Gf256(1);

    pub fn add(self, other: Gf256) -> Gf256 {
        Gf256(self.0 ^ other.0)
    }

    /// Shift-and-add multiply. Runs a fixed eight iterations regardless of input.
    pub fn mul(self, other: Gf256) -> Gf256 {
        let mut a = self.0;
        let mut b = other.0;
        let mut product = 0u8;
        for _ in 0..8 {
            let take = 0u8.wrapping_sub(b & 1);
            product ^= a & take;
            let carry = 0u8.wrapping_sub(a >> 7);
            a = (a << 1) ^ (REDUCTION & carry);
            b >>= 1;
        }
        Gf256(product)
    }

    /// Multiplicative inverse via a^254. The inverse of zero is defined as zero.
    pub fn inverse(self) -> Gf256 {
        let mut result = Gf256::ONE;
        let mut base = self;
        let mut exponent = 254u8;
        while exponent > 0 {
            if exponent & 1 == 1 {
                result = result.mul(base);
            }
            base = base.mul(base);
            exponent >>= 1;
        }
        result
    }

    pub fn div(self, other: Gf256) -> Gf256 {
        self.mul(other.inverse())
    }

    /// Horner evaluation of `coefficients` (constant term first) at `x`.
    pub fn evaluate(coefficients: &[Gf256], x: Gf256) -> Gf256 {
        coefficients
            .iter()
            .rev()
            .fold(Gf256::ZERO, |acc, c| acc.mul(x).add(*c))
    }

    /// Lagrange interpolation of the polynomial through `points`, evaluated at zero.
    pub fn interpolate_at_zero(points: &[(Gf256, Gf256)]) -> Gf256 {
        let mut secret = Gf256::ZERO;
        for (i, (xi, yi)) in points.iter().enumerate() {
            let mut basis = Gf256::ONE;
            for (j, (xj, _)) in points.iter().enumerate() {
                if i != j {
                    // subtraction is xor in characteristic 2
                    basis = basis.mul(xj.div(xj.add(*xi)));
                }
            }
            secret = secret.add(yi.mul(basis));
        }
        secret
    }
}

#[cfg(test)]
mod tests {
    use super::Gf256;

    #[test]
    fn every_nonzero_element_has_an_inverse() {
        for v in 1..=255u8 {
            assert_eq!(Gf256(v).mul(Gf256(v).inverse()), Gf256::ONE, "inverse of {v}");
        }
    }

    #[test]
    fn known_aes_product() {
        // FIPS-197 worked example: {57} x {83} = {c1}
        assert_eq!(Gf256(0x57).mul(Gf256(0x83)), Gf256(0xc1));
    }
}
