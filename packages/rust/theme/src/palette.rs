//! Deterministic name-derived palettes and color arithmetic.
//!
//! The derived palette is an explicit, documented hash-to-parameter
//! function (SHA-256 of the lowercased name), so every distinct subject
//! gets a distinct, stable theme across runs and across platforms:
//!
//! - hue        = first two digest bytes (big-endian) mod 360
//! - saturation = 62 + (byte 2 mod 19)  → 62–80%
//! - lightness  = 44 + (byte 3 mod 13)  → 44–56%
//! - accent hue = hue + 150 + (byte 4 mod 60), wrapped

use sha2::{Digest, Sha256};

/// Derive a (primary, accent) hex pair from a subject name.
pub fn derive_palette(name: &str) -> (String, String) {
    let digest = Sha256::digest(name.trim().to_lowercase().as_bytes());

    let hue = u16::from_be_bytes([digest[0], digest[1]]) % 360;
    let sat = 62 + (digest[2] % 19) as u16;
    let light = 44 + (digest[3] % 13) as u16;
    let accent_hue = (hue + 150 + (digest[4] % 60) as u16) % 360;

    (
        hsl_to_hex(hue as f32, sat as f32 / 100.0, light as f32 / 100.0),
        hsl_to_hex(accent_hue as f32, sat as f32 / 100.0, light as f32 / 100.0),
    )
}

/// Derive an accent for an extracted primary by rotating its hue.
pub fn accent_for(primary_hex: &str) -> String {
    match parse_hex(primary_hex) {
        Some((r, g, b)) => {
            let (h, s, l) = rgb_to_hsl(r, g, b);
            // Keep the accent readable even for muted primaries
            hsl_to_hex((h + 165.0) % 360.0, s.max(0.45), l.clamp(0.38, 0.6))
        }
        None => derive_palette(primary_hex).1,
    }
}

// ---------------------------------------------------------------------------
// Usability filter
// ---------------------------------------------------------------------------

/// Whether a color is usable as a brand primary: not near-white, not
/// near-black, not a low-saturation gray.
pub fn is_usable_color(hex: &str) -> bool {
    let Some((r, g, b)) = parse_hex(hex) else {
        return false;
    };

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);

    if min > 235 {
        return false; // near-white
    }
    if max < 25 {
        return false; // near-black
    }
    if max - min < 25 {
        return false; // gray
    }
    true
}

/// Saturation of an RGB color in 0.0–1.0 (HSL definition).
pub fn saturation(r: u8, g: u8, b: u8) -> f32 {
    rgb_to_hsl(r, g, b).1
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// Parse `#rgb` or `#rrggbb` into channels.
pub fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.trim().strip_prefix('#')?;
    match hex.len() {
        3 => {
            let r = u8::from_str_radix(&hex[0..1], 16).ok()?;
            let g = u8::from_str_radix(&hex[1..2], 16).ok()?;
            let b = u8::from_str_radix(&hex[2..3], 16).ok()?;
            Some((r * 17, g * 17, b * 17))
        }
        6 | 8 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some((r, g, b))
        }
        _ => None,
    }
}

pub fn to_hex(r: u8, g: u8, b: u8) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

fn rgb_to_hsl(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if (max - min).abs() < f32::EPSILON {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };

    let h = if (max - r).abs() < f32::EPSILON {
        ((g - b) / d + if g < b { 6.0 } else { 0.0 }) * 60.0
    } else if (max - g).abs() < f32::EPSILON {
        ((b - r) / d + 2.0) * 60.0
    } else {
        ((r - g) / d + 4.0) * 60.0
    };

    (h, s, l)
}

fn hsl_to_hex(h: f32, s: f32, l: f32) -> String {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = l - c / 2.0;

    let (r, g, b) = match h as u32 {
        0..60 => (c, x, 0.0),
        60..120 => (x, c, 0.0),
        120..180 => (0.0, c, x),
        180..240 => (0.0, x, c),
        240..300 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    to_hex(
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_is_deterministic() {
        let (p1, a1) = derive_palette("Acme Rockets");
        let (p2, a2) = derive_palette("acme rockets");
        assert_eq!(p1, p2);
        assert_eq!(a1, a2);
    }

    #[test]
    fn distinct_names_get_distinct_palettes() {
        let (p1, _) = derive_palette("Acme Rockets");
        let (p2, _) = derive_palette("Road Runner LLC");
        assert_ne!(p1, p2);
    }

    #[test]
    fn derived_palette_passes_usability_filter() {
        for name in ["a", "Acme", "stripe", "Müller GmbH", "北京公司", "x y z"] {
            let (primary, accent) = derive_palette(name);
            assert!(is_usable_color(&primary), "{name} → {primary}");
            assert!(is_usable_color(&accent), "{name} → {accent}");
        }
    }

    #[test]
    fn usability_filter_rejects_extremes() {
        assert!(!is_usable_color("#ffffff"));
        assert!(!is_usable_color("#fdfdfd"));
        assert!(!is_usable_color("#000000"));
        assert!(!is_usable_color("#111111"));
        assert!(!is_usable_color("#888888")); // gray
        assert!(!is_usable_color("not-a-color"));
        assert!(is_usable_color("#336699"));
        assert!(is_usable_color("#e44d26"));
    }

    #[test]
    fn hex_parsing_variants() {
        assert_eq!(parse_hex("#fff"), Some((255, 255, 255)));
        assert_eq!(parse_hex("#336699"), Some((0x33, 0x66, 0x99)));
        assert_eq!(parse_hex("#33669980"), Some((0x33, 0x66, 0x99)));
        assert_eq!(parse_hex("garbage"), None);
    }

    #[test]
    fn accent_differs_from_primary() {
        let accent = accent_for("#336699");
        assert!(is_usable_color(&accent));
        assert_ne!(accent, "#336699");
    }
}
