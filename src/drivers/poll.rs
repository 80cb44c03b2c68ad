// StrainLog - Bounded Polling
//
// Hardware events with no interrupt line (power-up ready, conversion ready,
// conversion restart) are waited for by polling a status flag with short
// sleeps. The number of polls is fixed up front so no wait can run forever.

use embedded_hal::delay::DelayNs;

/// Poll `ready` every `interval_ms` until it reports `true` or `timeout_ms`
/// has been spent sleeping.
///
/// Returns `Ok(false)` when the budget runs out. Bus errors from `ready`
/// abort the wait immediately.
pub fn poll_until<D, E, F>(
    delay: &mut D,
    timeout_ms: u32,
    interval_ms: u32,
    mut ready: F,
) -> Result<bool, E>
where
    D: DelayNs,
    F: FnMut() -> Result<bool, E>,
{
    let interval_ms = interval_ms.max(1);
    let attempts = (timeout_ms / interval_ms).max(1);

    for _ in 0..attempts {
        if ready()? {
            return Ok(true);
        }
        delay.delay_ms(interval_ms);
    }
    ready()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingDelay {
        slept_ms: u64,
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.slept_ms += u64::from(ns) / 1_000_000;
        }

        fn delay_ms(&mut self, ms: u32) {
            self.slept_ms += u64::from(ms);
        }
    }

    #[test]
    fn ready_after_k_polls() {
        let mut delay = CountingDelay::default();
        let mut polls = 0;
        let ready = poll_until::<_, (), _>(&mut delay, 100, 1, || {
            polls += 1;
            Ok(polls == 4)
        })
        .unwrap();

        assert!(ready);
        assert_eq!(polls, 4);
        assert_eq!(delay.slept_ms, 3);
    }

    #[test]
    fn never_ready_stops_at_budget() {
        let mut delay = CountingDelay::default();
        let mut polls = 0;
        let ready = poll_until::<_, (), _>(&mut delay, 50, 5, || {
            polls += 1;
            Ok(false)
        })
        .unwrap();

        assert!(!ready);
        assert_eq!(polls, 11);
        assert_eq!(delay.slept_ms, 50);
    }

    #[test]
    fn bus_error_aborts_wait() {
        let mut delay = CountingDelay::default();
        let result = poll_until(&mut delay, 50, 1, || Err::<bool, _>("nack"));

        assert_eq!(result, Err("nack"));
        assert_eq!(delay.slept_ms, 0);
    }
}
