//! Redemption token generation
//!
//! Tokens are read aloud / typed by venue staff, so the alphabet drops
//! glyphs that are easy to confuse (0/O, 1/I/L).

/// 去掉易混淆字符后的字母表（31 个符号）
const ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// 随机符号数量（不含分隔符）
const SYMBOLS: usize = 8;

/// 展示长度：XXXX-XXXX
pub const TOKEN_LEN: usize = SYMBOLS + 1;

/// Generate a fixed-width redemption code such as `K7QM-4TZP`
pub fn generate_redemption_token() -> String {
    let mut token = String::with_capacity(TOKEN_LEN);
    for i in 0..SYMBOLS {
        if i == SYMBOLS / 2 {
            token.push('-');
        }
        token.push(ALPHABET[rand::random_range(0..ALPHABET.len())] as char);
    }
    token
}

/// Normalize staff input into the canonical `XXXX-XXXX` form
///
/// Returns `None` when the input cannot be a token at all.
pub fn normalize_token(input: &str) -> Option<String> {
    let symbols: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if symbols.len() != SYMBOLS || !symbols.bytes().all(|b| ALPHABET.contains(&b)) {
        return None;
    }

    Some(format!("{}-{}", &symbols[..SYMBOLS / 2], &symbols[SYMBOLS / 2..]))
}
