use std::time::Duration;

const NANOS_PER_CS: u128 = 10_000_000;

/// GIF frame delays (centiseconds) for the given display durations.
///
/// Each delay is the difference between consecutive rounded cumulative
/// timestamps, so rounding never accumulates: the summed delays stay within
/// half a centisecond of the true total. Delays above `u16::MAX` saturate.
pub fn delays_centiseconds(durations: &[Duration]) -> Vec<u16> {
    let mut elapsed = Duration::ZERO;
    let mut prev_cs = 0u128;

    durations
        .iter()
        .map(|&duration| {
            elapsed += duration;
            let cs = (elapsed.as_nanos() + NANOS_PER_CS / 2) / NANOS_PER_CS;
            let delay = cs - prev_cs;
            prev_cs = cs;
            delay.min(u16::MAX as u128) as u16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_centiseconds() {
        let durations = vec![Duration::from_millis(100), Duration::from_millis(40)];
        assert_eq!(delays_centiseconds(&durations), vec![10, 4]);
    }

    #[test]
    fn test_rounding_does_not_compound() {
        // 30 fps: 3.333cs per frame, naive rounding would give 30 * 3 = 90cs.
        let durations = vec![Duration::from_nanos(33_333_333); 30];
        let delays = delays_centiseconds(&durations);
        let total: u32 = delays.iter().map(|&d| d as u32).sum();
        assert_eq!(total, 100);
        assert!(delays.iter().all(|&d| d == 3 || d == 4));
    }

    #[test]
    fn test_sub_centisecond_frames() {
        let durations = vec![Duration::from_millis(4); 10];
        let delays = delays_centiseconds(&durations);
        assert_eq!(delays.iter().map(|&d| d as u32).sum::<u32>(), 4);
    }

    #[test]
    fn test_saturates() {
        let delays = delays_centiseconds(&[Duration::from_secs(1_000)]);
        assert_eq!(delays, vec![u16::MAX]);
    }
}
