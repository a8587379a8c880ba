//! Credential crypto codec - AES-CBC with the shared secret's raw bytes as key
//!
//! Matches the companion app exactly: no KDF, the shared secret string's
//! bytes are the key (so the secret must be 16, 24 or 32 ASCII characters),
//! the IV travels as hex and the ciphertext as standard padded base64.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use data_encoding::{BASE64, HEXLOWER_PERMISSIVE};

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes192CbcDec = cbc::Decryptor<aes::Aes192>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes192CbcEnc = cbc::Encryptor<aes::Aes192>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

/// Decode failures. All non-fatal: the triggering request is rejected
/// without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid hex iv")]
    BadHex,
    #[error("invalid base64 ciphertext")]
    BadBase64,
    /// Wrong key length, wrong IV length, bad padding, or non-UTF-8 plaintext.
    #[error("decryption failed")]
    CipherFailure,
}

/// Decrypt a credential payload: hex IV + base64 ciphertext under the
/// shared secret. Returns the plaintext sub-frame.
pub fn decrypt(shared_secret: &str, iv_hex: &str, ciphertext_b64: &str) -> Result<String, DecodeError> {
    let iv = HEXLOWER_PERMISSIVE
        .decode(iv_hex.as_bytes())
        .map_err(|_| DecodeError::BadHex)?;
    let ciphertext = BASE64
        .decode(ciphertext_b64.as_bytes())
        .map_err(|_| DecodeError::BadBase64)?;

    let key = shared_secret.as_bytes();
    let plain = match key.len() {
        16 => cbc_decrypt::<Aes128CbcDec>(key, &iv, &ciphertext)?,
        24 => cbc_decrypt::<Aes192CbcDec>(key, &iv, &ciphertext)?,
        32 => cbc_decrypt::<Aes256CbcDec>(key, &iv, &ciphertext)?,
        _ => return Err(DecodeError::CipherFailure),
    };

    String::from_utf8(plain).map_err(|_| DecodeError::CipherFailure)
}

/// Encrypt a plaintext under the shared secret with the given 16-byte IV.
/// Returns `(iv_hex, ciphertext_b64)` in the wire form `decrypt` accepts.
/// Used by the companion side of tests and simulators.
pub fn encrypt(shared_secret: &str, iv: &[u8], plaintext: &str) -> Result<(String, String), DecodeError> {
    let key = shared_secret.as_bytes();
    let ciphertext = match key.len() {
        16 => cbc_encrypt::<Aes128CbcEnc>(key, iv, plaintext.as_bytes())?,
        24 => cbc_encrypt::<Aes192CbcEnc>(key, iv, plaintext.as_bytes())?,
        32 => cbc_encrypt::<Aes256CbcEnc>(key, iv, plaintext.as_bytes())?,
        _ => return Err(DecodeError::CipherFailure),
    };

    Ok((HEXLOWER_PERMISSIVE.encode(iv), BASE64.encode(&ciphertext)))
}

fn cbc_decrypt<C: BlockDecryptMut + KeyIvInit>(key: &[u8], iv: &[u8], ct: &[u8]) -> Result<Vec<u8>, DecodeError> {
    C::new_from_slices(key, iv)
        .map_err(|_| DecodeError::CipherFailure)?
        .decrypt_padded_vec_mut::<Pkcs7>(ct)
        .map_err(|_| DecodeError::CipherFailure)
}

fn cbc_encrypt<C: BlockEncryptMut + KeyIvInit>(key: &[u8], iv: &[u8], pt: &[u8]) -> Result<Vec<u8>, DecodeError> {
    Ok(C::new_from_slices(key, iv)
        .map_err(|_| DecodeError::CipherFailure)?
        .encrypt_padded_vec_mut::<Pkcs7>(pt))
}
