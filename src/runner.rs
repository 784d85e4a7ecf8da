/*!
  Continuous execution on a background thread.

  A front end that lets a machine run on its own still needs to reset it and draw it
  between steps, so the machine is shared behind a mutex and every step, reset, and read
  takes the lock. A step always completes once started; stopping a `Runner` only
  prevents the next one.
*/

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::machine::{ExecutionError, Machine, StepOutcome};

pub type SharedMachine = Arc<Mutex<Machine>>;

pub fn share(machine: Machine) -> SharedMachine {
  Arc::new(Mutex::new(machine))
}

/// Locks `machine`. A panic on another thread cannot leave a machine half-stepped, so a
/// poisoned lock is used as is.
pub fn lock(machine: &SharedMachine) -> MutexGuard<'_, Machine> {
  machine.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Delays between steps, from slowest to fastest.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum Speed {
  Slowest,
  Slow,
  Medium,
  Fast,
  Fastest
}

impl Speed {
  pub fn interval(&self) -> Duration {
    let millis = match self {
      Speed::Slowest => 1000,
      Speed::Slow    => 500,
      Speed::Medium  => 100,
      Speed::Fast    => 50,
      Speed::Fastest => 10,
    };
    Duration::from_millis(millis)
  }
}

impl Default for Speed {
  fn default() -> Speed {
    Speed::Slow
  }
}

/// What a runner did before it finished.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct RunSummary {
  pub steps : usize,
  pub error : Option<ExecutionError>,
}

pub struct Runner {
  stop   : Arc<AtomicBool>,
  handle : Option<JoinHandle<RunSummary>>,
}

impl Runner {

  /// Steps `machine` every `interval` until it halts or the runner is stopped.
  pub fn spawn(machine: SharedMachine, interval: Duration) -> Runner {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    let handle = thread::spawn(move || {
      let mut summary = RunSummary::default();
      loop {
        if stop_flag.load(Ordering::SeqCst) {
          break;
        }
        thread::sleep(interval);
        if stop_flag.load(Ordering::SeqCst) {
          break;
        }

        let mut guard = lock(&machine);
        if guard.is_halted() {
          break;
        }
        let outcome = guard.step();
        summary.steps += 1;
        if let StepOutcome::Faulted(error) = outcome {
          summary.error = Some(error);
        }
        if guard.is_halted() {
          break;
        }
      }
      summary
    });

    Runner{ stop, handle: Some(handle) }
  }

  pub fn is_finished(&self) -> bool {
    self.handle.as_ref().map_or(true, JoinHandle::is_finished)
  }

  /// Prevents any further step and waits for the one in progress, if any.
  pub fn stop(mut self) -> RunSummary {
    self.stop.store(true, Ordering::SeqCst);
    self.wait()
  }

  /// Waits for the machine to halt.
  pub fn join(mut self) -> RunSummary {
    self.wait()
  }

  fn wait(&mut self) -> RunSummary {
    match self.handle.take() {
      Some(handle) => handle.join().unwrap_or_default(),
      None => RunSummary::default()
    }
  }

}

impl Drop for Runner {
  fn drop(&mut self) {
    self.stop.store(true, Ordering::SeqCst);
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::compile;
  use crate::machine::ExecutionErrorKind;

  fn shared(source: &str, tape_length: usize) -> SharedMachine {
    let mut machine = Machine::new(tape_length, 2).unwrap();
    machine.set_program(compile(source).unwrap());
    share(machine)
  }

  #[test]
  fn runs_until_halted(){
    let machine = shared("add 2\nadd 3\nwrite 0\nhalt", 1);
    let summary = Runner::spawn(Arc::clone(&machine), Duration::from_millis(1)).join();
    assert_eq!(summary, RunSummary{ steps: 4, error: None });

    let machine = lock(&machine);
    assert!(machine.is_halted());
    assert_eq!(machine.tape(0), Some(5));
  }

  #[test]
  fn reports_faults(){
    let machine = shared("write 3", 1);
    let summary = Runner::spawn(Arc::clone(&machine), Duration::from_millis(1)).join();
    assert_eq!(summary.steps, 1);
    assert_eq!(
      summary.error.map(|e| e.kind),
      Some(ExecutionErrorKind::TapeWriteOutOfBounds(3))
    );
  }

  #[test]
  fn stop_interrupts_an_endless_program(){
    let machine = shared("loop: add 1\njump loop", 0);
    let runner = Runner::spawn(Arc::clone(&machine), Duration::from_millis(1));
    thread::sleep(Duration::from_millis(30));
    let summary = runner.stop();
    assert!(summary.steps > 0);

    let mut machine = lock(&machine);
    assert!(!machine.is_halted());
    machine.reset();
    assert_eq!(machine.accumulator(), 0);
  }

  #[test]
  fn speeds(){
    assert_eq!(Speed::default().interval(), Duration::from_millis(500));
    assert_eq!(Speed::Fastest.interval(), Duration::from_millis(10));
  }

}
