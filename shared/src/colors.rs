use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid hex color: {0:?}")]
pub struct ColorParseError(pub String);

/// Parse a CSS hex color (`#rrggbb` or `#rgb`, leading `#` optional) into RGB.
pub fn parse_hex_color(value: &str) -> Result<(u8, u8, u8), ColorParseError> {
    let err = || ColorParseError(value.to_owned());
    let hex = value.trim();
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if !hex.is_ascii() {
        return Err(err());
    }

    let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| err());
    match hex.len() {
        6 => Ok((channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
        3 => {
            let expand = |s: &str| channel(s).map(|v| v * 17);
            Ok((expand(&hex[0..1])?, expand(&hex[1..2])?, expand(&hex[2..3])?))
        }
        _ => Err(err()),
    }
}
