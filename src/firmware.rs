/*
 * This file is part of dasharo-sensors.
 *
 * Copyright (C) 2025 dasharo-sensors contributors
 *
 * dasharo-sensors is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * dasharo-sensors is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with dasharo-sensors. If not, see <https://www.gnu.org/licenses/>.
 */

//! Firmware query interface
//!
//! Two layers:
//! - [`MethodEvaluator`] evaluates a named ACPI method with integer arguments.
//!   Transports (`acpi_call`, scripted profiles) implement this.
//! - [`FirmwareQuery`] is the narrow interface the capability tables use:
//!   one discovery call and one retrieval call per feature.
//!
//! [`MethodFirmware`] bridges the two by resolving each operation to its
//! method name. [`TimedEvaluator`] optionally bounds how long one evaluation
//! may block.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::constants::methods;
use crate::error::{DasharoError, Result};
use crate::feature::Feature;

/// Firmware operations used for discovery and reads.
///
/// Implementations must be callable from several threads at once; each call
/// is an independent round trip.
#[cfg_attr(test, mockall::automock)]
pub trait FirmwareQuery: Send + Sync {
    /// Number of capability instances in `group` of `feature`
    fn capability_count(&self, feature: Feature, group: u8) -> Result<i64>;

    /// Temperature in whole degrees Celsius
    fn temperature(&self, group: u8, index: u32) -> Result<i64>;

    /// Fan speed in RPM
    fn fan_tachometer(&self, group: u8, index: u32) -> Result<i64>;

    /// Fan duty cycle in raw firmware units
    fn fan_duty_cycle(&self, group: u8, index: u32) -> Result<i64>;
}

/// Evaluates a named firmware method that returns one integer
#[cfg_attr(test, mockall::automock)]
pub trait MethodEvaluator: Send + Sync {
    fn evaluate_integer(&self, method: &str, args: &[u64]) -> Result<u64>;
}

impl<T: MethodEvaluator + ?Sized> MethodEvaluator for Box<T> {
    fn evaluate_integer(&self, method: &str, args: &[u64]) -> Result<u64> {
        (**self).evaluate_integer(method, args)
    }
}

impl<T: MethodEvaluator + ?Sized> MethodEvaluator for Arc<T> {
    fn evaluate_integer(&self, method: &str, args: &[u64]) -> Result<u64> {
        (**self).evaluate_integer(method, args)
    }
}

/// [`FirmwareQuery`] on top of any method evaluator
pub struct MethodFirmware<E> {
    evaluator: E,
}

impl<E: MethodEvaluator> MethodFirmware<E> {
    pub fn new(evaluator: E) -> Self {
        Self { evaluator }
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    fn read_by_group_index(&self, method: &str, group: u8, index: u32) -> Result<i64> {
        let raw = self
            .evaluator
            .evaluate_integer(method, &[u64::from(group), u64::from(index)])?;
        trace!(method, group, index, raw, "firmware reading");
        // ACPI integers are 64-bit; reinterpret so negative readings survive
        Ok(raw as i64)
    }
}

impl<E: MethodEvaluator> FirmwareQuery for MethodFirmware<E> {
    fn capability_count(&self, feature: Feature, group: u8) -> Result<i64> {
        let raw = self.evaluator.evaluate_integer(
            methods::GET_FEATURE_CAP_COUNT,
            &[feature.index() as u64, u64::from(group)],
        )?;
        Ok(raw as i64)
    }

    fn temperature(&self, group: u8, index: u32) -> Result<i64> {
        self.read_by_group_index(methods::GET_TEMPERATURE, group, index)
    }

    fn fan_tachometer(&self, group: u8, index: u32) -> Result<i64> {
        self.read_by_group_index(methods::GET_FAN_TACH, group, index)
    }

    fn fan_duty_cycle(&self, group: u8, index: u32) -> Result<i64> {
        self.read_by_group_index(methods::GET_FAN_DUTY, group, index)
    }
}

/// Bounds each evaluation of the wrapped evaluator by a deadline.
///
/// The evaluation runs on a helper thread. When the deadline passes the
/// caller gets [`DasharoError::Timeout`] and the helper is abandoned; its
/// late result is discarded. While an abandoned helper is still running no
/// new helper is started and calls fail with `Timeout` at once, so a hung
/// transport costs at most one thread.
pub struct TimedEvaluator<E> {
    inner: Arc<E>,
    timeout: Duration,
    abandoned: Arc<AtomicUsize>,
}

impl<E: MethodEvaluator + 'static> TimedEvaluator<E> {
    pub fn new(inner: E, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            timeout,
            abandoned: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Helpers that timed out and have not returned yet
    pub fn abandoned(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }

    fn timed_out(&self, method: &str) -> DasharoError {
        DasharoError::Timeout {
            method: method.to_string(),
            timeout: self.timeout,
        }
    }
}

impl<E: MethodEvaluator + 'static> MethodEvaluator for TimedEvaluator<E> {
    fn evaluate_integer(&self, method: &str, args: &[u64]) -> Result<u64> {
        if self.abandoned() > 0 {
            debug!(method, "previous firmware query still outstanding");
            return Err(self.timed_out(method));
        }

        let (tx, rx) = mpsc::channel();
        // Set by whichever side finishes first: the helper with a result or
        // the caller giving up
        let settled = Arc::new(AtomicBool::new(false));
        let inner = Arc::clone(&self.inner);
        let abandoned = Arc::clone(&self.abandoned);
        let helper_settled = Arc::clone(&settled);
        let owned_method = method.to_string();
        let owned_args = args.to_vec();

        thread::Builder::new()
            .name("firmware-query".to_string())
            .spawn(move || {
                let result = inner.evaluate_integer(&owned_method, &owned_args);
                if helper_settled.swap(true, Ordering::SeqCst) {
                    abandoned.fetch_sub(1, Ordering::SeqCst);
                } else {
                    let _ = tx.send(result);
                }
            })?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) if !settled.swap(true, Ordering::SeqCst) => {
                self.abandoned.fetch_add(1, Ordering::SeqCst);
                warn!(method, timeout_ms = self.timeout.as_millis() as u64, "firmware query timed out");
                Err(self.timed_out(method))
            }
            // The helper settled right at the deadline and its send is in flight
            Err(RecvTimeoutError::Timeout) => rx
                .recv()
                .unwrap_or_else(|_| Err(DasharoError::firmware(method, "query thread exited without a result"))),
            Err(RecvTimeoutError::Disconnected) => Err(DasharoError::firmware(
                method,
                "query thread exited without a result",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_count_uses_gfcp_with_feature_and_group() {
        let mut evaluator = MockMethodEvaluator::new();
        evaluator
            .expect_evaluate_integer()
            .withf(|method, args| method == "GFCP" && args == [2, 1])
            .times(1)
            .returning(|_, _| Ok(3));

        let fw = MethodFirmware::new(evaluator);
        assert_eq!(fw.capability_count(Feature::FanTach, 1).unwrap(), 3);
    }

    #[test]
    fn test_retrievals_use_feature_methods() {
        let mut evaluator = MockMethodEvaluator::new();
        evaluator
            .expect_evaluate_integer()
            .withf(|method, args| method == "GTMP" && args == [1, 0])
            .returning(|_, _| Ok(52));
        evaluator
            .expect_evaluate_integer()
            .withf(|method, args| method == "GFTH" && args == [0, 2])
            .returning(|_, _| Ok(2100));
        evaluator
            .expect_evaluate_integer()
            .withf(|method, args| method == "GFDC" && args == [2, 0])
            .returning(|_, _| Ok(77));

        let fw = MethodFirmware::new(evaluator);
        assert_eq!(fw.temperature(1, 0).unwrap(), 52);
        assert_eq!(fw.fan_tachometer(0, 2).unwrap(), 2100);
        assert_eq!(fw.fan_duty_cycle(2, 0).unwrap(), 77);
    }

    #[test]
    fn test_negative_acpi_integer_is_preserved() {
        let mut evaluator = MockMethodEvaluator::new();
        evaluator
            .expect_evaluate_integer()
            .returning(|_, _| Ok(u64::MAX));

        let fw = MethodFirmware::new(evaluator);
        assert_eq!(fw.capability_count(Feature::Temperature, 0).unwrap(), -1);
    }

    #[test]
    fn test_evaluator_errors_propagate() {
        let mut evaluator = MockMethodEvaluator::new();
        evaluator
            .expect_evaluate_integer()
            .returning(|method, _| Err(DasharoError::firmware(method, "AE_NOT_FOUND")));

        let fw = MethodFirmware::new(evaluator);
        let err = fw.fan_tachometer(0, 0).unwrap_err();
        assert!(matches!(err, DasharoError::Firmware { ref method, .. } if method == "GFTH"));
    }

    #[test]
    fn test_timed_evaluator_passes_result_through() {
        let mut evaluator = MockMethodEvaluator::new();
        evaluator
            .expect_evaluate_integer()
            .withf(|method, _| method == "GTMP")
            .returning(|_, _| Ok(40));

        let timed = TimedEvaluator::new(evaluator, Duration::from_secs(5));
        assert_eq!(timed.evaluate_integer("GTMP", &[0, 0]).unwrap(), 40);
    }

    #[test]
    fn test_timed_evaluator_times_out() {
        let mut evaluator = MockMethodEvaluator::new();
        evaluator.expect_evaluate_integer().returning(|_, _| {
            thread::sleep(Duration::from_millis(500));
            Ok(1)
        });

        let timed = TimedEvaluator::new(evaluator, Duration::from_millis(20));
        let err = timed.evaluate_integer("GFCP", &[0, 0]).unwrap_err();
        assert!(matches!(err, DasharoError::Timeout { ref method, .. } if method == "GFCP"));
    }

    #[test]
    fn test_timed_evaluator_keeps_one_helper_for_hung_transport() {
        let started = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&started);
        let mut evaluator = MockMethodEvaluator::new();
        evaluator.expect_evaluate_integer().returning(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(300));
            Ok(1)
        });

        let timed = TimedEvaluator::new(evaluator, Duration::from_millis(5));
        for _ in 0..50 {
            let err = timed.evaluate_integer("GTMP", &[0, 0]).unwrap_err();
            assert!(matches!(err, DasharoError::Timeout { .. }));
        }
        // Only the first call reached the transport
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(timed.abandoned(), 1);

        // Once the hung helper returns, queries are attempted again
        thread::sleep(Duration::from_millis(600));
        assert_eq!(timed.abandoned(), 0);
        assert!(timed.evaluate_integer("GTMP", &[0, 0]).is_err());
        assert_eq!(started.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_boxed_evaluator() {
        let mut evaluator = MockMethodEvaluator::new();
        evaluator
            .expect_evaluate_integer()
            .withf(|method, args| method == "GFDC" && args == [0, 0])
            .returning(|_, _| Ok(9));

        let boxed: Box<dyn MethodEvaluator> = Box::new(evaluator);
        assert_eq!(boxed.evaluate_integer("GFDC", &[0, 0]).unwrap(), 9);
    }
}
