//! A CHIP-8 interpreter, modelled on the COSMAC VIP.
//!
//! ## Design
//!
//! * behave like the VIP interpreter where it matters: 4K memory map with the
//!   stack and display living in RAM, 60Hz timers, 16-level call stack
//! * CHIP-8 instructions run as fast as possible then sleep, to match a
//!   target instruction rate; so not quite authentic
//! * devices are traits so alternatives can be plugged in; starting with a
//!   TUI in-console display, a raw-mode keyboard and the PC speaker
//! * dummy devices let the interpreter run headless, which is what the tests do
//!
//! Model
//!
//! main
//!  |-- config (file, command line)
//!  |-- display, input, sound, random
//!  |-- interpreter(display, input, sound, random)
//!  |    |-- memory (font, program, stack page, display page)
//!  |    `-- instruction set
//!  `-- main loop
//!       |-- delta = time since last tick
//!       |-- interpreter.tick(delta)
//!       |     |-- drain input events; quit or satisfy LD Vx, K
//!       |     |-- timers -= whole 60ths of a second elapsed
//!       |     `-- fetch/decode/execute one instruction
//!       |-- every 60th of a second: interpreter.interrupt() redraws
//!       `-- sleep until the next cycle is due
pub mod config;
pub mod display;
pub mod error;
pub mod input;
pub mod instruction;
pub mod interpreter;
pub mod loader;
pub mod memory;
pub mod random;
pub mod sound;

pub use error::{Error, Result};
