/// Picks how many workers a session of `recipients` messages gets.
///
/// The bot API caps throughput per bot, so past a few workers extra
/// concurrency only adds contention. The curve flattens on purpose.
pub fn worker_count(recipients: usize) -> usize {
    match recipients {
        0..=4 => recipients.clamp(1, 2),
        5..=9 => 2,
        10..=49 => 3,
        50..=99 => 3,
        100..=499 => 4,
        500..=999 => 7,
        _ => 10,
    }
}
