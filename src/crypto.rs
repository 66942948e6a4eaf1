use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, OsRng},
};
use anyhow::{Result, anyhow};
use base64::{Engine as _, engine::general_purpose};
use rand::RngCore;

// AES Key size for AES256-GCM
const AES_KEY_SIZE: usize = 32; // 256 bits
const NONCE_SIZE: usize = 12; // 96 bits for GCM

/// Seals lab result payloads at rest. Stored blobs are `nonce || ciphertext`.
#[derive(Clone)]
pub struct LabDataCipher {
    key: [u8; AES_KEY_SIZE],
}

impl LabDataCipher {
    pub fn new(key: [u8; AES_KEY_SIZE]) -> Self {
        Self { key }
    }

    // Decodes a base64 deployment key
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| anyhow!("Failed to decode base64: {}", e))?;
        let key: [u8; AES_KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| anyhow!("Invalid AES key size"))?;
        Ok(Self::new(key))
    }

    // Generates a new AES key, base64 encoded
    pub fn generate_key() -> String {
        let mut key = [0u8; AES_KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        general_purpose::STANDARD.encode(key)
    }

    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| anyhow!("Failed to create AES cipher: {}", e))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| anyhow!("Failed to encrypt data: {}", e))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_SIZE {
            return Err(anyhow!("Invalid Nonce size"));
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| anyhow!("Failed to create AES cipher: {}", e))?;
        let nonce = Nonce::from_slice(nonce_bytes);

        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| anyhow!("Failed to decrypt data: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_payload_opens_with_same_key() {
        let cipher = LabDataCipher::from_base64(&LabDataCipher::generate_key()).unwrap();
        let sealed = cipher.seal(b"HbA1c 5.4%").unwrap();

        assert_ne!(&sealed[NONCE_SIZE..], b"HbA1c 5.4%");
        assert_eq!(cipher.open(&sealed).unwrap(), b"HbA1c 5.4%");
    }

    #[test]
    fn other_key_cannot_open() {
        let a = LabDataCipher::new([7u8; AES_KEY_SIZE]);
        let b = LabDataCipher::new([8u8; AES_KEY_SIZE]);
        let sealed = a.seal(b"glucose 90 mg/dL").unwrap();
        assert!(b.open(&sealed).is_err());
    }

    #[test]
    fn short_keys_and_blobs_are_rejected() {
        let short = general_purpose::STANDARD.encode([1u8; 16]);
        assert!(LabDataCipher::from_base64(&short).is_err());
        assert!(LabDataCipher::new([1u8; AES_KEY_SIZE]).open(&[0u8; 4]).is_err());
    }
}
