use rand::seq::SliceRandom;

/// Alphabet generated codes draw from.
pub const CODE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Length of generated codes.
pub const CODE_LEN: usize = 15;

/// A random voucher code: 15 characters over a 36-symbol alphabet.
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .filter_map(|_| CODE_ALPHABET.choose(&mut rng).copied().map(char::from))
        .collect()
}
