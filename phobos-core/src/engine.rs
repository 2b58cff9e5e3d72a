//! Worker-task control layer around a [`Cpu`].
//!
//! The engine runs the core on a dedicated thread and exposes the control
//! surface a debugger front-end needs: start, stop, reset, pause, resume,
//! single-step, breakpoints, and PC/register inspection. Control operations
//! are safe to call from any thread; they are delivered over a channel and
//! observed by the worker at instruction boundaries, so no instruction is
//! ever half-executed because of a pause request.
//!
//! State machine: `Stopped` (no worker thread), `Paused` (worker idling),
//! `Running`, and a transient `Stepping` that executes exactly one
//! instruction before falling back to `Paused`. Instruction errors and
//! breakpoint hits transition `Running` to `Paused` and are logged; the
//! worker keeps accepting commands afterwards.

use crate::cpu::Cpu;
use crate::registers::RegisterBank;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// How long the worker sleeps waiting for commands while paused.
const IDLE_POLL: Duration = Duration::from_millis(1);

/// Control messages delivered to the worker thread.
enum Command {
    Pause,
    Continue,
    Step,
    Reset,
    Stop,
    AddBreakpoint(u32),
    RemoveBreakpoint(u32),
    SetPc(u32),
    ReadPc(oneshot::Sender<u32>),
    ReadRegisters(oneshot::Sender<RegisterBank>),
    ReadCycleCount(oneshot::Sender<u64>),
}

/// Handle controlling a [`Cpu`] that executes on its own worker thread.
///
/// While stopped the engine owns the core directly and control operations
/// apply immediately; once started they are forwarded to the worker.
#[derive(Debug)]
pub struct Engine {
    /// The core, present while no worker thread is running.
    cpu: Option<Cpu>,
    worker: Option<Worker>,
    paused: Arc<AtomicBool>,
}

struct Worker {
    commands: Sender<Command>,
    handle: JoinHandle<Cpu>,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker").finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(cpu: Cpu) -> Self {
        Self {
            cpu: Some(cpu),
            worker: None,
            paused: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Spawn the worker thread with the core in the paused state.
    ///
    /// Idempotent; calling `start` on a started engine does nothing. Starting
    /// resets the core, so follow up with [`Engine::set_pc`] if execution
    /// should not begin at 0.
    pub fn start(&mut self) {
        if self.worker.is_some() {
            return;
        }
        let Some(cpu) = self.cpu.take() else {
            // The previous worker panicked and took the core with it.
            log::error!("cannot start: cpu worker is gone");
            return;
        };
        let (commands, receiver) = mpsc::channel();
        let paused = Arc::clone(&self.paused);
        let handle = std::thread::spawn(move || run_loop(cpu, receiver, paused));
        self.worker = Some(Worker { commands, handle });
    }

    /// Stop the worker thread, reclaiming the core. Idempotent.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = worker.commands.send(Command::Stop);
        match worker.handle.join() {
            Ok(cpu) => self.cpu = Some(cpu),
            Err(_) => log::error!("cpu worker panicked"),
        }
        self.paused.store(true, Ordering::Release);
    }

    /// Pause execution (`Running` to `Paused`).
    pub fn pause(&mut self) {
        self.send(Command::Pause);
    }

    /// Continue execution (`Paused` to `Running`).
    pub fn resume(&mut self) {
        self.send(Command::Continue);
    }

    /// Execute exactly one instruction, then pause again.
    pub fn step(&mut self) {
        self.send(Command::Step);
    }

    /// Clear all registers and set the PC back to 0. The run state (running
    /// or paused) is preserved.
    pub fn reset(&mut self) {
        match &mut self.cpu {
            Some(cpu) => cpu.reset(),
            None => self.send(Command::Reset),
        }
    }

    pub fn add_breakpoint(&mut self, address: u32) {
        match &mut self.cpu {
            Some(cpu) => cpu.add_breakpoint(address),
            None => self.send(Command::AddBreakpoint(address)),
        }
    }

    pub fn remove_breakpoint(&mut self, address: u32) {
        match &mut self.cpu {
            Some(cpu) => cpu.remove_breakpoint(address),
            None => self.send(Command::RemoveBreakpoint(address)),
        }
    }

    pub fn set_pc(&mut self, pc: u32) {
        match &mut self.cpu {
            Some(cpu) => cpu.set_pc(pc),
            None => self.send(Command::SetPc(pc)),
        }
    }

    pub fn pc(&self) -> u32 {
        match &self.cpu {
            Some(cpu) => cpu.pc(),
            None => self.request(Command::ReadPc).unwrap_or(0),
        }
    }

    /// Snapshot of the register bank.
    pub fn registers(&self) -> RegisterBank {
        match &self.cpu {
            Some(cpu) => cpu.registers().clone(),
            None => self.request(Command::ReadRegisters).unwrap_or_default(),
        }
    }

    /// Number of instructions retired since the last reset.
    pub fn cycle_count(&self) -> u64 {
        match &self.cpu {
            Some(cpu) => cpu.cycle_count(),
            None => self.request(Command::ReadCycleCount).unwrap_or(0),
        }
    }

    /// Whether the core is currently paused (or not started at all).
    pub fn paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Direct access to the core while the engine is stopped.
    pub fn cpu(&self) -> Option<&Cpu> {
        self.cpu.as_ref()
    }

    /// Direct mutable access to the core while the engine is stopped.
    pub fn cpu_mut(&mut self) -> Option<&mut Cpu> {
        self.cpu.as_mut()
    }

    fn send(&self, command: Command) {
        if let Some(worker) = &self.worker {
            if worker.commands.send(command).is_err() {
                log::error!("cpu worker is gone, dropping control command");
            }
        }
    }

    fn request<T, F>(&self, make: F) -> Option<T>
    where
        F: FnOnce(oneshot::Sender<T>) -> Command,
    {
        let worker = self.worker.as_ref()?;
        let (reply, receiver) = oneshot::channel();
        worker.commands.send(make(reply)).ok()?;
        receiver.recv().ok()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The worker loop. Owns the core until a `Stop` command (or the engine
/// handle going away) makes it return the core to the caller.
fn run_loop(mut cpu: Cpu, commands: Receiver<Command>, paused: Arc<AtomicBool>) -> Cpu {
    cpu.reset();
    let mut running = false;
    let mut step_one = false;
    paused.store(true, Ordering::Release);

    loop {
        // Drain pending control commands. While paused this blocks in short
        // intervals instead of spinning.
        loop {
            let command = if running {
                match commands.try_recv() {
                    Ok(command) => command,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return cpu,
                }
            } else {
                match commands.recv_timeout(IDLE_POLL) {
                    Ok(command) => command,
                    Err(RecvTimeoutError::Timeout) => break,
                    Err(RecvTimeoutError::Disconnected) => return cpu,
                }
            };
            match command {
                Command::Stop => return cpu,
                Command::Pause => running = false,
                Command::Continue => running = true,
                Command::Step => {
                    running = true;
                    step_one = true;
                }
                Command::Reset => cpu.reset(),
                Command::AddBreakpoint(address) => cpu.add_breakpoint(address),
                Command::RemoveBreakpoint(address) => cpu.remove_breakpoint(address),
                Command::SetPc(pc) => cpu.set_pc(pc),
                Command::ReadPc(reply) => {
                    let _ = reply.send(cpu.pc());
                }
                Command::ReadRegisters(reply) => {
                    let _ = reply.send(cpu.registers().clone());
                }
                Command::ReadCycleCount(reply) => {
                    let _ = reply.send(cpu.cycle_count());
                }
            }
            paused.store(!running, Ordering::Release);
        }

        if !running {
            continue;
        }

        if let Err(error) = cpu.step() {
            log::error!("{}", error);
            running = false;
        }
        if step_one {
            log::info!("paused at {:08x}", cpu.pc());
            running = false;
            step_one = false;
        }
        if cpu.breakpoints().contains(&cpu.pc()) {
            log::info!("breakpoint reached at {:08x}", cpu.pc());
            running = false;
        }
        paused.store(!running, Ordering::Release);
    }
}
