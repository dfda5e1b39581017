//! Base85 codec using the RFC 1924 alphabet.
//!
//! This is the network-transmitted encoding for keys, hashes, and signatures.
//! It is not the Adobe variant: the alphabet avoids quote characters and
//! whitespace so encoded values survive JSON payloads untouched. Base64 is
//! still used inside Argon2 hash strings, where `$` is a field delimiter.

/// The 85-character alphabet from RFC 1924.
const ALPHABET: &[u8; 85] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz!#$%&()*+-;<=>?@^_`{|}~";

const fn build_decode_map() -> [i8; 256] {
    let mut map = [-1i8; 256];
    let mut i = 0;
    while i < ALPHABET.len() {
        map[ALPHABET[i] as usize] = i as i8;
        i += 1;
    }
    map
}

static DECODE_MAP: [i8; 256] = build_decode_map();

/// Encode a byte slice as base85 text.
pub fn encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(4) * 5);

    for chunk in data.chunks(4) {
        let mut word: u32 = 0;
        for (i, b) in chunk.iter().enumerate() {
            word |= (*b as u32) << (24 - i * 8);
        }

        let mut digits = [0u8; 5];
        let mut value = word;
        for d in digits.iter_mut().rev() {
            *d = ALPHABET[(value % 85) as usize];
            value /= 85;
        }

        // A partial group of n bytes emits only n+1 digits.
        out.extend(
            digits[..chunk.len() + 1]
                .iter()
                .map(|b| *b as char),
        );
    }

    out
}

/// Decode base85 text into bytes. Returns `None` on characters outside the
/// alphabet or an impossible group length.
pub fn decode(text: &str) -> Option<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() / 5 * 4 + 3);

    for chunk in bytes.chunks(5) {
        if chunk.len() == 1 {
            // One digit cannot carry even a single byte.
            return None;
        }

        let mut word: u32 = 0;
        for i in 0..5 {
            // Missing digits in a partial group decode as the maximum digit,
            // mirroring the zero-padding applied on the encode side.
            let digit = match chunk.get(i) {
                Some(c) => {
                    let v = DECODE_MAP[*c as usize];
                    if v < 0 {
                        return None;
                    }
                    v as u32
                }
                None => 84,
            };
            word = word.checked_mul(85)?.checked_add(digit)?;
        }

        let produced = chunk.len() - 1;
        for i in 0..produced {
            out.push((word >> (24 - i * 8)) as u8);
        }
    }

    Some(out)
}
