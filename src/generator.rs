//! Synthetic readings for seeding history and simulating a live sensor.

use rand::Rng;
use std::ops::Range;

/// Representative PM2.5 range (µg/m³) inside each CPCB band, Good → Severe.
pub const PM25_BAND_RANGES: [(f64, f64); 6] = [
    (5.0, 25.0),
    (35.0, 55.0),
    (65.0, 85.0),
    (95.0, 115.0),
    (140.0, 220.0),
    (260.0, 320.0),
];

/// Ranges for the non-PM measurements.
#[derive(Debug, Clone, PartialEq)]
pub struct AmbientRanges {
    pub co2: Range<f64>,
    pub temp: Range<f64>,
    pub rh: Range<f64>,
}

/// Ambient ranges used when seeding history.
pub fn seed_ambient() -> AmbientRanges {
    AmbientRanges {
        co2: 450.0..1200.0,
        temp: 22.0..33.0,
        rh: 35.0..70.0,
    }
}

/// Ambient ranges used by the live simulator.
pub fn simulator_ambient() -> AmbientRanges {
    AmbientRanges {
        co2: 400.0..1200.0,
        temp: 20.0..34.0,
        rh: 30.0..75.0,
    }
}

/// One generated set of measurements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticSample {
    pub pm25: f64,
    pub co2: f64,
    pub temp: f64,
    pub rh: f64,
}

/// Sample measurements with PM2.5 drawn from `band`'s representative range.
pub fn sample<R: Rng>(rng: &mut R, band: usize, ambient: &AmbientRanges) -> SyntheticSample {
    let (lo, hi) = PM25_BAND_RANGES[band % PM25_BAND_RANGES.len()];
    SyntheticSample {
        pm25: rng.gen_range(lo..hi),
        co2: rng.gen_range(ambient.co2.clone()),
        temp: rng.gen_range(ambient.temp.clone()),
        rh: rng.gen_range(ambient.rh.clone()),
    }
}

/// Band used for the `i`-th of `n` seeded readings: the series is split
/// into six equal blocks, one per band.
pub fn seed_band(i: usize, n: usize) -> usize {
    (i / (n / PM25_BAND_RANGES.len()).max(1)) % PM25_BAND_RANGES.len()
}

/// Random walk across the PM2.5 bands.
#[derive(Debug, Clone)]
pub struct RandomWalk {
    band: usize,
    step_probability: f64,
}

impl RandomWalk {
    /// Probability of moving to a neighbouring band on each tick.
    pub const DEFAULT_STEP_PROBABILITY: f64 = 0.1;

    pub fn new() -> Self {
        Self {
            band: 0,
            step_probability: Self::DEFAULT_STEP_PROBABILITY,
        }
    }

    pub fn with_step_probability(step_probability: f64) -> Self {
        Self {
            band: 0,
            step_probability: step_probability.clamp(0.0, 1.0),
        }
    }

    pub fn band(&self) -> usize {
        self.band
    }

    /// Possibly step one band up or down (wrapping), then sample.
    pub fn next_sample<R: Rng>(
        &mut self,
        rng: &mut R,
        ambient: &AmbientRanges,
    ) -> SyntheticSample {
        let bands = PM25_BAND_RANGES.len();
        if rng.gen_bool(self.step_probability) {
            self.band = if rng.gen_bool(0.5) {
                (self.band + 1) % bands
            } else {
                (self.band + bands - 1) % bands
            };
        }
        sample(rng, self.band, ambient)
    }
}

impl Default for RandomWalk {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Category, Classifier};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_band_ranges_classify_into_their_band() {
        let classifier = Classifier::cpcb_pm25();
        for (band, (lo, hi)) in PM25_BAND_RANGES.iter().enumerate() {
            for value in [*lo, *hi] {
                let category = classifier.classify(Some(value)).category.unwrap();
                assert_eq!(category, Category::ALL[band], "value {value}");
            }
        }
    }

    #[test]
    fn test_seed_band_blocks() {
        assert_eq!(seed_band(0, 60), 0);
        assert_eq!(seed_band(9, 60), 0);
        assert_eq!(seed_band(10, 60), 1);
        assert_eq!(seed_band(59, 60), 5);
        // Fewer readings than bands still cycles.
        assert_eq!(seed_band(4, 3), 4);
    }

    #[test]
    fn test_samples_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let ambient = seed_ambient();
        for band in 0..6 {
            let s = sample(&mut rng, band, &ambient);
            let (lo, hi) = PM25_BAND_RANGES[band];
            assert!(s.pm25 >= lo && s.pm25 < hi);
            assert!(ambient.co2.contains(&s.co2));
            assert!(ambient.temp.contains(&s.temp));
            assert!(ambient.rh.contains(&s.rh));
        }
    }

    #[test]
    fn test_random_walk_moves_one_band_at_a_time() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut walk = RandomWalk::with_step_probability(1.0);
        let ambient = simulator_ambient();

        let mut previous = walk.band();
        for _ in 0..100 {
            walk.next_sample(&mut rng, &ambient);
            let band = walk.band();
            let distance = (band + 6 - previous) % 6;
            assert!(distance == 1 || distance == 5, "jumped {previous} -> {band}");
            previous = band;
        }
    }

    #[test]
    fn test_random_walk_can_stand_still() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut walk = RandomWalk::with_step_probability(0.0);
        for _ in 0..20 {
            let s = walk.next_sample(&mut rng, &simulator_ambient());
            assert_eq!(walk.band(), 0);
            assert!(s.pm25 < 25.0);
        }
    }
}
