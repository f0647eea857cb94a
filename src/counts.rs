use rand::Rng;

/// Rate of the exponential distribution behind [`random_count`].
pub const RATE: f64 = 1.0 / 3.0;
pub const MAX_COMMITS: u32 = 50;

/// Draw a per-repository commit count: `1 + floor(Exp(1/3))`, capped at 50.
pub fn random_count<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    // Inverse transform sampling; `gen` yields [0, 1) so the log argument stays positive.
    let u: f64 = rng.gen();
    let sample = -(1.0 - u).ln() / RATE;
    let drawn = sample.floor().min((MAX_COMMITS - 1) as f64) as u32;
    1 + drawn
}

/// Split `total` commits over `slots` repositories.
///
/// Every slot but the last draws from `[1, remaining - slots_after]`, which
/// leaves at least one commit for each later slot. The last slot takes what
/// is left. When the upper bound drops below 1 the slot gets 0 instead of
/// failing; that only happens when `slots > total`.
pub fn split_total<R: Rng + ?Sized>(total: u32, slots: usize, rng: &mut R) -> Vec<u32> {
    let mut counts = Vec::with_capacity(slots);
    let mut remaining = i64::from(total);

    for i in 0..slots {
        if i == slots - 1 {
            counts.push(remaining.max(0) as u32);
            break;
        }
        let slots_after = (slots - i - 1) as i64;
        let upper = (remaining - slots_after).min(remaining - 1);
        if upper <= 0 {
            counts.push(0);
            continue;
        }
        let n = rng.gen_range(1..=upper);
        remaining -= n;
        counts.push(n as u32);
    }

    counts
}
