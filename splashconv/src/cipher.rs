//! The "wwcode" rolling XOR used by WonderWitch transfer images
//!
//! Each byte is XORed with the previous ciphertext byte. The chain restarts
//! from 0xFF at every 128-byte boundary.

const WINDOW_SIZE: usize = 128;
const INITIAL_KEY: u8 = 0xFF;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Encode,
    Decode,
}

pub fn wwcode(data: &[u8], direction: Direction) -> Vec<u8> {
    let mut output = Vec::with_capacity(data.len());
    for window in data.chunks(WINDOW_SIZE) {
        let mut key = INITIAL_KEY;
        for &byte in window {
            let out = byte ^ key;
            key = match direction {
                Direction::Encode => out,
                Direction::Decode => byte,
            };
            output.push(out);
        }
    }
    output
}

pub fn encode(data: &[u8]) -> Vec<u8> {
    wwcode(data, Direction::Encode)
}

pub fn decode(data: &[u8]) -> Vec<u8> {
    wwcode(data, Direction::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        assert_eq!(encode(&[0x00, 0x00, 0xFF, 0x12]), vec![0xFF, 0xFF, 0x00, 0x12]);
        assert_eq!(decode(&[0xFF, 0xFF, 0x00, 0x12]), vec![0x00, 0x00, 0xFF, 0x12]);
    }

    #[test]
    fn key_resets_every_window() {
        let data = vec![0u8; 300];
        let encoded = encode(&data);
        assert_eq!(encoded[127], 0x00);
        assert_eq!(encoded[128], 0xFF);
        assert_eq!(encoded[256], 0xFF);
    }

    #[test]
    fn round_trips() {
        assert!(encode(&[]).is_empty());
        assert!(decode(&[]).is_empty());
        for len in [1, 127, 128, 129, 300, 64168] {
            let data: Vec<u8> = (0..len).map(|i| (i * 7 + i / 13) as u8).collect();
            assert_eq!(decode(&encode(&data)), data, "length {len}");
        }
    }
}
