use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits. Used for volumes
/// (m3) and flow rates (m3/h) so fills and transfers are bit-for-bit
/// reproducible.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulation time. One tick is one second of
/// plant time.
pub type Ticks = u64;

/// Ticks per hour of plant time.
pub const TICKS_PER_HOUR: Ticks = 3600;

/// Convert an f64 to Fixed64. Use only for initialization, never in sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert Fixed64 to f64. Use only for display and observer sampling.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Ticks from an `(hours, minutes, seconds)` triple.
#[inline]
pub const fn hms(hours: u64, minutes: u64, seconds: u64) -> Ticks {
    hours * 3600 + minutes * 60 + seconds
}

/// Ticks from a `(minutes, seconds)` pair.
#[inline]
pub const fn ms(minutes: u64, seconds: u64) -> Ticks {
    minutes * 60 + seconds
}

/// Ticks needed to move `amount` m3 at `rate` m3/h, rounded down.
///
/// Multiplies before dividing so that whole-number configurations stay exact.
/// Returns `None` for a non-positive rate.
pub fn flow_ticks(amount: Fixed64, rate: Fixed64) -> Option<Ticks> {
    if rate <= Fixed64::ZERO {
        return None;
    }
    if amount <= Fixed64::ZERO {
        return Some(0);
    }
    let scaled = amount.checked_mul(Fixed64::from_num(TICKS_PER_HOUR))?;
    let ticks = scaled.checked_div(rate)?;
    Some(ticks.to_num::<i64>().max(0) as Ticks)
}

/// Ticks needed to push `litres` through a line running at `rate` m3/h.
pub fn flow_ticks_litres(litres: u32, rate: Fixed64) -> Option<Ticks> {
    if rate <= Fixed64::ZERO {
        return None;
    }
    let per_hour = rate.checked_mul(Fixed64::from_num(1000))?;
    let scaled = Fixed64::from_num(u64::from(litres) * TICKS_PER_HOUR);
    let ticks = scaled.checked_div(per_hour)?;
    Some(ticks.to_num::<i64>().max(0) as Ticks)
}
