const RED_HUE: f64 = 0.0;
/// Cyan-ish blue reserved for the last ("done") column.
const BLUE_HUE: f64 = 198.0;

const SATURATION: f64 = 83.0;
const LIGHTNESS: f64 = 61.0;
const BLUE_SATURATION: f64 = 50.0;
const BLUE_LIGHTNESS: f64 = 41.0;

pub const MAX_DISTINCT_COLUMNS: usize = 47;

/// Column colors from red through orange and yellow to green, with the last
/// column always blue. Same `count` always yields the same list.
///
/// Colors are distinct for up to `MAX_DISTINCT_COLUMNS` columns. Past that,
/// neighbouring hues near red round to the same hex value.
pub fn column_colors(count: usize) -> Vec<String> {
    (0..count)
        .map(|index| {
            if index == count - 1 {
                return hsl_to_hex(BLUE_HUE, BLUE_SATURATION, BLUE_LIGHTNESS);
            }
            if index == 0 {
                return hsl_to_hex(RED_HUE, SATURATION, LIGHTNESS);
            }

            let step = 1.0 / (count - 1) as f64;
            let percent = ((index + 1) as f64 * step * 100.0).round();
            hsl_to_hex(red_shift(percent), SATURATION, LIGHTNESS)
        })
        .collect()
}

/// Bends a 0–100 position onto hues so the middle lands on orange instead of
/// yellow: 0 stays red, 50 becomes ~31, 100 becomes 120 (green).
fn red_shift(percent: f64) -> f64 {
    percent.powi(2) * 0.012
}

/// Hue in degrees, saturation and lightness in percent, to `#RRGGBB`.
pub fn hsl_to_hex(hue: f64, saturation: f64, lightness: f64) -> String {
    let (r, g, b) = hsl_to_rgb(hue, saturation, lightness);
    format!("#{r:02X}{g:02X}{b:02X}")
}

fn hsl_to_rgb(hue: f64, saturation: f64, lightness: f64) -> (u8, u8, u8) {
    let h = hue / 360.0;
    let s = saturation / 100.0;
    let l = lightness / 100.0;

    if s == 0.0 {
        let v = to_channel(l);
        return (v, v, v);
    }

    let t2 = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let t1 = 2.0 * l - t2;

    let channel = |offset: f64| {
        let mut t3 = h + offset;
        if t3 < 0.0 {
            t3 += 1.0;
        }
        if t3 > 1.0 {
            t3 -= 1.0;
        }

        let v = if 6.0 * t3 < 1.0 {
            t1 + (t2 - t1) * 6.0 * t3
        } else if 2.0 * t3 < 1.0 {
            t2
        } else if 3.0 * t3 < 2.0 {
            t1 + (t2 - t1) * (2.0 / 3.0 - t3) * 6.0
        } else {
            t1
        };
        to_channel(v)
    };

    (channel(1.0 / 3.0), channel(0.0), channel(-1.0 / 3.0))
}

fn to_channel(v: f64) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}
