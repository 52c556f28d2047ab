/// Display-space RGB colour with components in 0.0-1.0. Values are written
/// to the frame as-is, without any further transfer function.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

/// Hue, saturation and lightness, each in 0.0-1.0.
#[cfg(test)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hsl {
    pub h: f32,
    pub s: f32,
    pub l: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    #[cfg(test)]
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Build from a packed 0xRRGGBB value.
    pub fn from_hex(hex: u32) -> Self {
        Self::rgb(
            ((hex >> 16) & 0xff) as f32 / 255.0,
            ((hex >> 8) & 0xff) as f32 / 255.0,
            (hex & 0xff) as f32 / 255.0,
        )
    }

    /// Hue wraps around 1.0; saturation and lightness are clamped.
    pub fn from_hsl(h: f32, s: f32, l: f32) -> Self {
        let h = h.rem_euclid(1.0);
        let s = s.clamp(0.0, 1.0);
        let l = l.clamp(0.0, 1.0);

        if s == 0.0 {
            return Self::rgb(l, l, l);
        }

        let p = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let q = 2.0 * l - p;

        Self::rgb(
            hue_to_rgb(q, p, h + 1.0 / 3.0),
            hue_to_rgb(q, p, h),
            hue_to_rgb(q, p, h - 1.0 / 3.0),
        )
    }

    #[cfg(test)]
    pub fn to_hsl(self) -> Hsl {
        let max = self.r.max(self.g).max(self.b);
        let min = self.r.min(self.g).min(self.b);
        let l = (min + max) / 2.0;

        if min == max {
            return Hsl { h: 0.0, s: 0.0, l };
        }

        let delta = max - min;
        let s = if l <= 0.5 {
            delta / (max + min)
        } else {
            delta / (2.0 - max - min)
        };

        let h = if max == self.r {
            (self.g - self.b) / delta + if self.g < self.b { 6.0 } else { 0.0 }
        } else if max == self.g {
            (self.b - self.r) / delta + 2.0
        } else {
            (self.r - self.g) / delta + 4.0
        };

        Hsl { h: h / 6.0, s, l }
    }

    /// Move `alpha` of the way towards `target`.
    pub fn lerp(self, target: Color, alpha: f32) -> Self {
        Self::rgb(
            self.r + (target.r - self.r) * alpha,
            self.g + (target.g - self.g) * alpha,
            self.b + (target.b - self.b) * alpha,
        )
    }

    pub fn to_rgba(self) -> [f32; 4] {
        [self.r, self.g, self.b, 1.0]
    }
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 1.0 / 2.0 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * 6.0 * (2.0 / 3.0 - t);
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Color, b: Color) -> bool {
        (a.r - b.r).abs() < 1e-5 && (a.g - b.g).abs() < 1e-5 && (a.b - b.b).abs() < 1e-5
    }

    #[test]
    fn primary_hues() {
        assert!(close(Color::from_hsl(0.0, 1.0, 0.5), Color::rgb(1.0, 0.0, 0.0)));
        assert!(close(Color::from_hsl(1.0 / 3.0, 1.0, 0.5), Color::rgb(0.0, 1.0, 0.0)));
        assert!(close(Color::from_hsl(2.0 / 3.0, 1.0, 0.5), Color::rgb(0.0, 0.0, 1.0)));
    }

    #[test]
    fn lightness_extremes() {
        assert!(close(Color::from_hsl(0.3, 1.0, 1.0), Color::WHITE));
        assert!(close(Color::from_hsl(0.3, 1.0, 0.0), Color::BLACK));
        assert!(close(Color::from_hsl(0.7, 1.0, 1.5), Color::WHITE));
    }

    #[test]
    fn hsl_round_trip_keeps_hue() {
        let hsl = Color::from_hsl(0.625, 1.0, 0.4).to_hsl();
        assert!((hsl.h - 0.625).abs() < 1e-4);
        assert!((hsl.s - 1.0).abs() < 1e-4);
        assert!((hsl.l - 0.4).abs() < 1e-4);
    }

    #[test]
    fn lerp_moves_fraction_of_the_way() {
        let c = Color::from_hex(0xffff00).lerp(Color::WHITE, 0.05);
        assert!(close(c, Color::rgb(1.0, 1.0, 0.05)));
    }
}
