use crate::audio;
use crate::error::VoiceError;
use avatar_types::VoiceProfile;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Known voice cloning targets, keyed by profile id. Fixed at start-up.
#[derive(Debug, Clone, Default)]
pub struct VoiceRegistry {
    profiles: Arc<HashMap<String, VoiceProfile>>,
}

impl VoiceRegistry {
    /// Builds the registry. A repeated id keeps the last profile.
    pub fn from_profiles(profiles: impl IntoIterator<Item = VoiceProfile>) -> Self {
        let map = profiles.into_iter().map(|p| (p.id.clone(), p)).collect();
        Self {
            profiles: Arc::new(map),
        }
    }

    /// Retrieves a voice profile by ID.
    pub fn get_profile(&self, id: &str) -> Option<VoiceProfile> {
        self.profiles.get(id).cloned()
    }
}

/// Checks that a profile's reference recording exists and is a non-empty
/// WAV stream, returning the path to hand to the engine.
pub async fn validate_reference(profile: &VoiceProfile) -> Result<PathBuf, VoiceError> {
    let path = &profile.reference_audio_path;
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        VoiceError::VoiceProfile(format!(
            "reference audio for '{}' unreadable at {:?}: {}",
            profile.id, path, e
        ))
    })?;

    let spec = audio::inspect(&bytes).map_err(|e| {
        VoiceError::VoiceProfile(format!(
            "reference audio for '{}' is not valid WAV: {}",
            profile.id, e
        ))
    })?;
    let peak = audio::peak_amplitude(&bytes).unwrap_or(0.0);
    if peak == 0.0 {
        return Err(VoiceError::VoiceProfile(format!(
            "reference audio for '{}' contains no signal",
            profile.id
        )));
    }

    tracing::debug!(
        profile = %profile.id,
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        "validated reference voice"
    );
    Ok(path.clone())
}
