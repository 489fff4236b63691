/// Loudness normalization factor in `(0, 1]`.
///
/// Tracks mastered louder than the reference are attenuated; quieter ones
/// are never boosted.
pub fn normalization_factor(enabled: bool, loudness_db: Option<f64>) -> f32 {
    match loudness_db {
        Some(db) if enabled => (10f64.powf(-db / 20.0) as f32).min(1.0),
        _ => 1.0,
    }
}

/// Combines the user volume with the normalization factor.
///
/// Setters return the new output only when it actually changed, so the
/// caller never re-applies an identical volume.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumePipeline {
    player_volume: f32,
    normalize: bool,
    loudness_db: Option<f64>,
    output: f32,
}

impl VolumePipeline {
    pub fn new(player_volume: f32, normalize: bool) -> Self {
        let player_volume = player_volume.clamp(0.0, 1.0);
        Self {
            player_volume,
            normalize,
            loudness_db: None,
            output: player_volume,
        }
    }

    pub fn player_volume(&self) -> f32 {
        self.player_volume
    }

    pub fn factor(&self) -> f32 {
        normalization_factor(self.normalize, self.loudness_db)
    }

    pub fn output(&self) -> f32 {
        self.output
    }

    pub fn set_player_volume(&mut self, volume: f32) -> Option<f32> {
        self.player_volume = volume.clamp(0.0, 1.0);
        self.recompute()
    }

    pub fn set_normalize(&mut self, enabled: bool) -> Option<f32> {
        self.normalize = enabled;
        self.recompute()
    }

    pub fn set_loudness(&mut self, loudness_db: Option<f64>) -> Option<f32> {
        self.loudness_db = loudness_db;
        self.recompute()
    }

    fn recompute(&mut self) -> Option<f32> {
        let output = self.player_volume * self.factor();
        if output == self.output {
            return None;
        }
        self.output = output;
        Some(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_track_is_not_boosted() {
        assert_eq!(normalization_factor(true, Some(-6.0)), 1.0);
    }

    #[test]
    fn test_loud_track_is_attenuated() {
        let f = normalization_factor(true, Some(6.0));
        assert!((f - 0.501).abs() < 1e-3, "factor = {f}");
    }

    #[test]
    fn test_disabled_or_unknown_is_unity() {
        assert_eq!(normalization_factor(false, Some(12.0)), 1.0);
        assert_eq!(normalization_factor(true, None), 1.0);
    }

    #[test]
    fn test_pipeline_dedupes_unchanged_output() {
        let mut p = VolumePipeline::new(0.8, true);
        assert_eq!(p.set_player_volume(0.8), None);
        assert_eq!(p.set_loudness(Some(-3.0)), None);

        let out = p.set_loudness(Some(6.0)).expect("changed");
        assert!((out - 0.8 * 0.501).abs() < 1e-3);

        let out = p.set_normalize(false).expect("changed");
        assert_eq!(out, 0.8);
        assert_eq!(p.set_loudness(Some(20.0)), None);
    }
}
