use rand::RngCore;

/// Generates world-wide names for provisioned block devices.
///
/// A WWN is 16 random bytes hex-encoded to 32 characters. Uniqueness rests
/// on the randomness; there is no registration authority or interior state.
#[derive(Debug, Clone, Copy, Default)]
pub struct WwnGenerator;

impl WwnGenerator {
    pub fn new() -> Self {
        Self
    }

    /// A fresh 32-character hexadecimal WWN.
    pub fn generate(&self) -> String {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}
