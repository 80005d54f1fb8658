// ABOUTME: Hashing, encoding and RSA encryption helpers exposed to templates
// ABOUTME: Digest/base64/url codecs plus PKCS#1 v1.5 encryption with a PEM public key

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rsa::pkcs8::der::Decode;
use rsa::pkcs8::SubjectPublicKeyInfoRef;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use sha2::{Digest, Sha256};

use super::error::{CryptoError, InlineText};

/// Characters left as-is by query escaping; space is turned into `+` afterwards.
const QUERY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b' ');

pub fn md5_hex(text: &str) -> String {
    hex::encode(md5::compute(text.as_bytes()).0)
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

pub fn base64_encode(text: &str) -> String {
    BASE64.encode(text.as_bytes())
}

/// Decode standard base64. A decode failure yields the error message as fallback text.
pub fn base64_decode(text: &str) -> InlineText {
    match BASE64.decode(text) {
        Ok(bytes) => InlineText::Value(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => InlineText::Fallback(e.to_string()),
    }
}

pub fn url_encode(text: &str) -> String {
    utf8_percent_encode(text, QUERY_ESCAPE)
        .to_string()
        .replace(' ', "+")
}

/// Unescape query text. Malformed `%` escapes or invalid UTF-8 fall back to an empty string.
pub fn url_decode(text: &str) -> InlineText {
    if has_malformed_escape(text) {
        return InlineText::Fallback(String::new());
    }

    let spaced = text.replace('+', " ");
    match percent_decode_str(&spaced).decode_utf8() {
        Ok(decoded) => InlineText::Value(decoded.into_owned()),
        Err(_) => InlineText::Fallback(String::new()),
    }
}

fn has_malformed_escape(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes
        .iter()
        .enumerate()
        .filter(|(_, byte)| **byte == b'%')
        .any(|(index, _)| {
            !matches!(
                bytes.get(index + 1..index + 3),
                Some(digits) if digits.iter().all(u8::is_ascii_hexdigit)
            )
        })
}

/// Encrypt `content` with the RSA public key in `key` (PEM wrapped
/// SubjectPublicKeyInfo) using PKCS#1 v1.5 padding, returning base64 ciphertext.
pub fn rsa_encrypt_with_public_key(content: &str, key: &str) -> Result<String, CryptoError> {
    let block = pem::parse(key).map_err(|e| CryptoError::PemParse(e.to_string()))?;

    let spki = SubjectPublicKeyInfoRef::from_der(block.contents())
        .map_err(|e| CryptoError::DerParse(e.to_string()))?;

    if spki.algorithm.oid != rsa::pkcs1::ALGORITHM_OID {
        return Err(CryptoError::NotRsa);
    }

    let public_key =
        RsaPublicKey::try_from(spki).map_err(|e| CryptoError::DerParse(e.to_string()))?;

    let encrypted = public_key
        .encrypt(&mut rand::thread_rng(), Pkcs1v15Encrypt, content.as_bytes())
        .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

    Ok(BASE64.encode(encrypted))
}
