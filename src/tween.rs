use crate::foundation::math::lerp;

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub enum Ease {
    Linear,
    InQuad,
    OutQuad,
    InOutQuad,
    InCubic,
    OutCubic,
    InOutCubic,
}

impl Ease {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::InQuad => t * t,
            Self::OutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Self::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(2) / 2.0)
                }
            }
            Self::InCubic => t * t * t,
            Self::OutCubic => 1.0 - (1.0 - t).powi(3),
            Self::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(3) / 2.0)
                }
            }
        }
    }
}

/// An eased linear interpolation between two values, sampled on [0, 1].
///
/// This is an interpolation utility for layer-opacity ramps and track
/// blending, not a timeline: there is no scheduling here.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct Tween {
    pub from: f64,
    pub to: f64,
    pub ease: Ease,
}

impl Tween {
    pub fn linear(from: f64, to: f64) -> Self {
        Self {
            from,
            to,
            ease: Ease::Linear,
        }
    }

    pub fn sample(&self, t: f64) -> f64 {
        lerp(self.from, self.to, self.ease.apply(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ease_endpoints_are_fixed() {
        for ease in [
            Ease::Linear,
            Ease::InQuad,
            Ease::OutQuad,
            Ease::InOutQuad,
            Ease::InCubic,
            Ease::OutCubic,
            Ease::InOutCubic,
        ] {
            assert!((ease.apply(0.0)).abs() < 1e-12);
            assert!((ease.apply(1.0) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn ease_input_is_clamped() {
        assert_eq!(Ease::Linear.apply(-3.0), 0.0);
        assert_eq!(Ease::Linear.apply(7.0), 1.0);
    }

    #[test]
    fn tween_samples_between_endpoints() {
        let tw = Tween::linear(10.0, 20.0);
        assert_eq!(tw.sample(0.0), 10.0);
        assert_eq!(tw.sample(0.5), 15.0);
        assert_eq!(tw.sample(1.0), 20.0);

        let eased = Tween {
            from: 0.0,
            to: 1.0,
            ease: Ease::InQuad,
        };
        assert!(eased.sample(0.5) < 0.5);
    }
}
