// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Frame timing.

use std::time::{Duration, Instant};

/// Measures the time between consecutive frames.
///
/// The tick driver calls [`FrameClock::lap`] once per frame and feeds the
/// result to the scheduler as the elapsed time of that frame.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last_lap: Instant,
}

impl FrameClock {
    /// Creates a clock whose first lap starts now.
    #[inline]
    pub fn new() -> Self {
        Self {
            last_lap: Instant::now(),
        }
    }

    /// Time since the last lap, without restarting it.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.last_lap.elapsed()
    }

    /// Returns the seconds since the previous lap and starts a new one.
    pub fn lap(&mut self) -> f64 {
        let now = Instant::now();
        let delta = now.duration_since(self.last_lap);
        self.last_lap = now;
        delta.as_secs_f64()
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
