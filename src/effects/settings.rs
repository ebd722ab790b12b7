use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Filter applied to luma before chroma is modulated into it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LumaFilter {
    None,
    /// Four-tap box average
    Box,
    /// Notch at the color subcarrier
    #[default]
    Notch,
}

/// Chroma bandwidth limiting strength
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChromaLowpass {
    None,
    /// Both chroma planes limited to 2.6 MHz
    Light,
    /// I limited to 1.3 MHz and Q to 0.6 MHz, as broadcast
    #[default]
    Full,
}

/// Lowpass design used for chroma bandwidth limiting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    /// Three single-pole lowpasses in series
    #[default]
    ConstantK,
    Butterworth,
}

/// How the subcarrier phase advances from one scanline to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PhaseShift {
    #[serde(rename = "0")]
    Degrees0,
    #[serde(rename = "90")]
    Degrees90,
    #[default]
    #[serde(rename = "180")]
    Degrees180,
    #[serde(rename = "270")]
    Degrees270,
}

impl PhaseShift {
    /// Shift in quarter turns
    pub fn quarter_turns(self) -> u32 {
        match self {
            PhaseShift::Degrees0 => 0,
            PhaseShift::Degrees90 => 1,
            PhaseShift::Degrees180 => 2,
            PhaseShift::Degrees270 => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterlaceMode {
    /// Every line comes from the current frame
    Full,
    /// Alternate frames contribute alternate lines
    #[default]
    Interlaced,
}

/// VHS recording speed; slower speeds trade bandwidth for tape length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VhsTapeSpeed {
    #[default]
    SP,
    LP,
    EP,
}

impl VhsTapeSpeed {
    /// Luma cutoff in Hz
    pub fn luma_cut(self) -> f64 {
        match self {
            VhsTapeSpeed::SP => 2_400_000.0,
            VhsTapeSpeed::LP => 1_900_000.0,
            VhsTapeSpeed::EP => 1_400_000.0,
        }
    }

    /// Chroma cutoff in Hz
    pub fn chroma_cut(self) -> f64 {
        match self {
            VhsTapeSpeed::SP => 320_000.0,
            VhsTapeSpeed::LP => 300_000.0,
            VhsTapeSpeed::EP => 280_000.0,
        }
    }

    /// Horizontal chroma delay in pixels
    pub fn chroma_delay(self) -> i32 {
        match self {
            VhsTapeSpeed::SP => 4,
            VhsTapeSpeed::LP => 5,
            VhsTapeSpeed::EP => 6,
        }
    }
}

/// Switch point falling partway through a scanline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MidLine {
    /// Fraction of the width where the switch happens
    pub position: f32,
    /// Random per-frame variation of `position`
    pub jitter: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadSwitchingSettings {
    /// Rows affected at the bottom of the image
    pub height: u32,
    /// Rows of the switching curve hidden above the visible band
    pub offset: u32,
    /// Horizontal shift of the bottom row, in pixels
    pub horiz_shift: f32,
    #[serde(default)]
    pub mid_line: Option<MidLine>,
}

impl Default for HeadSwitchingSettings {
    fn default() -> Self {
        Self {
            height: 8,
            offset: 3,
            horiz_shift: 72.0,
            mid_line: Some(MidLine {
                position: 0.95,
                jitter: 0.03,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackingNoiseSettings {
    /// Rows affected at the bottom of the image
    pub height: u32,
    /// Peak horizontal wobble, in pixels
    pub wave_intensity: f32,
    pub snow_intensity: f32,
    pub snow_anisotropy: f32,
    pub noise_intensity: f32,
}

impl Default for TrackingNoiseSettings {
    fn default() -> Self {
        Self {
            height: 12,
            wave_intensity: 15.0,
            snow_intensity: 0.025,
            snow_anisotropy: 0.25,
            noise_intensity: 0.25,
        }
    }
}

/// Fractal noise along each scanline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseSettings {
    /// Noise cycles per pixel
    pub frequency: f32,
    pub intensity: f32,
    /// Octaves of detail
    pub detail: u32,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            frequency: 0.5,
            intensity: 0.01,
            detail: 1,
        }
    }
}

/// Overshoot around sharp edges, produced by a notch filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RingingSettings {
    /// Notch frequency, normalized to Nyquist
    pub frequency: f32,
    /// Notch quality
    pub power: f32,
    pub intensity: f32,
}

impl Default for RingingSettings {
    fn default() -> Self {
        Self {
            frequency: 0.45,
            power: 4.0,
            intensity: 4.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VhsSharpenSettings {
    pub intensity: f32,
    /// Multiplier of the tape's luma cutoff
    pub frequency: f32,
}

impl Default for VhsSharpenSettings {
    fn default() -> Self {
        Self {
            intensity: 1.0,
            frequency: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VhsEdgeWaveSettings {
    /// Peak horizontal displacement, in pixels
    pub intensity: f32,
    pub speed: f32,
    pub frequency: f32,
    pub detail: u32,
}

impl Default for VhsEdgeWaveSettings {
    fn default() -> Self {
        Self {
            intensity: 1.0,
            speed: 4.0,
            frequency: 0.05,
            detail: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VhsSettings {
    /// `None` skips tape bandwidth limiting
    #[serde(default)]
    pub tape_speed: Option<VhsTapeSpeed>,
    /// Chance of a line losing its chroma
    pub chroma_loss: f32,
    #[serde(default)]
    pub sharpen: Option<VhsSharpenSettings>,
    #[serde(default)]
    pub edge_wave: Option<VhsEdgeWaveSettings>,
}

impl Default for VhsSettings {
    fn default() -> Self {
        Self {
            tape_speed: Some(VhsTapeSpeed::SP),
            chroma_loss: 0.0,
            sharpen: Some(VhsSharpenSettings::default()),
            edge_wave: Some(VhsEdgeWaveSettings::default()),
        }
    }
}

/// Every tunable parameter of the pipeline
///
/// Read by stages once per frame and never modified by them. Optional
/// settings objects double as switches: `None` bypasses the stage. When
/// loading, a missing optional section means that effect is off, while other
/// missing keys take their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectConfiguration {
    pub input_luma_filter: LumaFilter,
    pub chroma_lowpass_in: ChromaLowpass,
    pub chroma_lowpass_out: ChromaLowpass,
    pub filter_type: FilterType,

    /// Carry chroma on a subcarrier inside luma and demodulate it afterwards
    pub composite_signal: bool,
    pub composite_preemphasis: f32,
    pub video_scanline_phase_shift: PhaseShift,
    pub video_scanline_phase_shift_offset: i32,

    #[serde(default)]
    pub head_switching: Option<HeadSwitchingSettings>,
    #[serde(default)]
    pub tracking_noise: Option<TrackingNoiseSettings>,
    #[serde(default)]
    pub composite_noise: Option<NoiseSettings>,
    #[serde(default)]
    pub ringing: Option<RingingSettings>,
    #[serde(default)]
    pub luma_noise: Option<NoiseSettings>,
    #[serde(default)]
    pub chroma_noise: Option<NoiseSettings>,

    /// Chance of any pixel starting a snow speck
    pub snow_intensity: f32,
    /// How far specks streak horizontally (0..1)
    pub snow_anisotropy: f32,

    /// Constant hue rotation, in half turns
    pub chroma_phase_error: f32,
    pub chroma_phase_noise_intensity: f32,

    #[serde(default)]
    pub vhs_settings: Option<VhsSettings>,
    pub chroma_vert_blend: bool,
    /// Multiplies the emulated sample rate, widening every Hz-based filter
    pub bandwidth_scale: f32,
    pub interlace_mode: InterlaceMode,
}

impl Default for EffectConfiguration {
    fn default() -> Self {
        Self {
            input_luma_filter: LumaFilter::Notch,
            chroma_lowpass_in: ChromaLowpass::Full,
            chroma_lowpass_out: ChromaLowpass::Full,
            filter_type: FilterType::ConstantK,
            composite_signal: true,
            composite_preemphasis: 1.0,
            video_scanline_phase_shift: PhaseShift::Degrees180,
            video_scanline_phase_shift_offset: 0,
            head_switching: Some(HeadSwitchingSettings::default()),
            tracking_noise: Some(TrackingNoiseSettings::default()),
            composite_noise: Some(NoiseSettings::default()),
            ringing: Some(RingingSettings::default()),
            luma_noise: Some(NoiseSettings::default()),
            chroma_noise: Some(NoiseSettings {
                frequency: 0.05,
                intensity: 0.1,
                detail: 1,
            }),
            snow_intensity: 0.003,
            snow_anisotropy: 0.5,
            chroma_phase_error: 0.0,
            chroma_phase_noise_intensity: 0.001,
            vhs_settings: Some(VhsSettings::default()),
            chroma_vert_blend: true,
            bandwidth_scale: 1.0,
            interlace_mode: InterlaceMode::Interlaced,
        }
    }
}

impl EffectConfiguration {
    /// Configuration with every effect switched off
    pub fn passthrough() -> Self {
        Self {
            input_luma_filter: LumaFilter::None,
            chroma_lowpass_in: ChromaLowpass::None,
            chroma_lowpass_out: ChromaLowpass::None,
            filter_type: FilterType::ConstantK,
            composite_signal: false,
            composite_preemphasis: 0.0,
            video_scanline_phase_shift: PhaseShift::Degrees0,
            video_scanline_phase_shift_offset: 0,
            head_switching: None,
            tracking_noise: None,
            composite_noise: None,
            ringing: None,
            luma_noise: None,
            chroma_noise: None,
            snow_intensity: 0.0,
            snow_anisotropy: 0.0,
            chroma_phase_error: 0.0,
            chroma_phase_noise_intensity: 0.0,
            vhs_settings: None,
            chroma_vert_blend: false,
            bandwidth_scale: 1.0,
            interlace_mode: InterlaceMode::Full,
        }
    }

    /// Sample rate of the emulated signal after `bandwidth_scale`
    pub fn sample_rate(&self) -> f64 {
        crate::filter::NTSC_RATE * self.bandwidth_scale as f64
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.bandwidth_scale.is_finite() || self.bandwidth_scale <= 0.0 {
            return Err(invalid("effect.bandwidth_scale", self.bandwidth_scale));
        }

        non_negative("effect.composite_preemphasis", self.composite_preemphasis)?;
        unit_range("effect.snow_intensity", self.snow_intensity)?;
        unit_range("effect.snow_anisotropy", self.snow_anisotropy)?;
        non_negative(
            "effect.chroma_phase_noise_intensity",
            self.chroma_phase_noise_intensity,
        )?;
        if !self.chroma_phase_error.is_finite() {
            return Err(invalid("effect.chroma_phase_error", self.chroma_phase_error));
        }

        if let Some(head_switching) = &self.head_switching {
            if head_switching.height == 0 {
                return Err(invalid("effect.head_switching.height", head_switching.height));
            }
            if let Some(mid_line) = &head_switching.mid_line {
                unit_range("effect.head_switching.mid_line.position", mid_line.position)?;
                non_negative("effect.head_switching.mid_line.jitter", mid_line.jitter)?;
            }
        }

        if let Some(tracking) = &self.tracking_noise {
            if tracking.height == 0 {
                return Err(invalid("effect.tracking_noise.height", tracking.height));
            }
            unit_range("effect.tracking_noise.snow_intensity", tracking.snow_intensity)?;
            unit_range("effect.tracking_noise.snow_anisotropy", tracking.snow_anisotropy)?;
            non_negative("effect.tracking_noise.noise_intensity", tracking.noise_intensity)?;
        }

        for (key, noise) in [
            ("effect.composite_noise", &self.composite_noise),
            ("effect.luma_noise", &self.luma_noise),
            ("effect.chroma_noise", &self.chroma_noise),
        ] {
            if let Some(noise) = noise {
                non_negative(&format!("{}.frequency", key), noise.frequency)?;
                non_negative(&format!("{}.intensity", key), noise.intensity)?;
            }
        }

        if let Some(ringing) = &self.ringing {
            unit_range("effect.ringing.frequency", ringing.frequency)?;
            if ringing.power.is_nan() || ringing.power <= 0.0 {
                return Err(invalid("effect.ringing.power", ringing.power));
            }
        }

        if let Some(vhs) = &self.vhs_settings {
            unit_range("effect.vhs_settings.chroma_loss", vhs.chroma_loss)?;
            if let Some(sharpen) = &vhs.sharpen {
                non_negative("effect.vhs_settings.sharpen.intensity", sharpen.intensity)?;
                if sharpen.frequency.is_nan() || sharpen.frequency <= 0.0 {
                    return Err(invalid(
                        "effect.vhs_settings.sharpen.frequency",
                        sharpen.frequency,
                    ));
                }
            }
            if let Some(edge_wave) = &vhs.edge_wave {
                non_negative("effect.vhs_settings.edge_wave.intensity", edge_wave.intensity)?;
            }
        }

        Ok(())
    }
}

fn invalid<V: ToString>(key: &str, value: V) -> crate::error::NtscError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
    .into()
}

fn non_negative(key: &str, value: f32) -> Result<()> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(invalid(key, value))
    }
}

fn unit_range(key: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(EffectConfiguration::default().validate().is_ok());
        assert!(EffectConfiguration::passthrough().validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut config = EffectConfiguration::default();
        config.ringing = Some(RingingSettings {
            frequency: 1.5,
            ..RingingSettings::default()
        });
        assert!(config.validate().is_err());

        let mut config = EffectConfiguration::default();
        config.bandwidth_scale = 0.0;
        assert!(config.validate().is_err());

        let mut config = EffectConfiguration::default();
        config.head_switching = Some(HeadSwitchingSettings {
            height: 0,
            ..HeadSwitchingSettings::default()
        });
        assert!(config.validate().is_err());

        let mut config = EffectConfiguration::default();
        config.luma_noise = Some(NoiseSettings {
            intensity: -0.1,
            ..NoiseSettings::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tape_speed_table() {
        assert_eq!(VhsTapeSpeed::LP.luma_cut(), 1_900_000.0);
        assert_eq!(VhsTapeSpeed::EP.chroma_cut(), 280_000.0);
        assert_eq!(VhsTapeSpeed::SP.chroma_delay(), 4);
    }

    #[test]
    fn test_toml_uses_readable_names() {
        let text = toml::to_string(&EffectConfiguration::default()).unwrap();
        assert!(text.contains("input_luma_filter = \"notch\""));
        assert!(text.contains("video_scanline_phase_shift = \"180\""));

        let parsed: EffectConfiguration = toml::from_str(
            "chroma_lowpass_in = \"light\"\nvideo_scanline_phase_shift = \"90\"\n",
        )
        .unwrap();
        assert_eq!(parsed.chroma_lowpass_in, ChromaLowpass::Light);
        assert_eq!(parsed.video_scanline_phase_shift, PhaseShift::Degrees90);
        assert_eq!(parsed.interlace_mode, InterlaceMode::Interlaced);
        assert!(parsed.head_switching.is_none());
    }

    #[test]
    fn test_disabled_sections_survive_toml() {
        let mut config = EffectConfiguration::default();
        config.ringing = None;
        let text = toml::to_string(&config).unwrap();
        let parsed: EffectConfiguration = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);

        let passthrough = EffectConfiguration::passthrough();
        let text = toml::to_string(&passthrough).unwrap();
        assert_eq!(toml::from_str::<EffectConfiguration>(&text).unwrap(), passthrough);
    }
}
