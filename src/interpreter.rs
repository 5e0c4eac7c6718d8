/// # interpreter
///
/// (from: https://laurencescotford.com/chip-8-on-the-cosmac-vip-initialisation/)
/// the COSMAC VIP keeps the CHIP-8 machine state in RCA1802 registers and in
/// RAM; here it is:
///  - V0-VF, I and the program counter (starting at 0x200) as fields
///  - the call stack in the stack page of RAM, pointed to by the stack pointer
///  - the display in the last page of RAM
///  - tone and general timers, counting down at 60Hz
///
/// Each call to `tick` services input, advances the timers by the wallclock
/// time that passed, then runs a single instruction. `main_loop` paces ticks
/// with spin_sleep and refreshes the display at 60Hz.
use crate::display::{self, CHIP8_RESOLUTION};
use crate::error::{Error, Result};
use crate::input::InputEvent;
use crate::instruction::Instruction;
use crate::loader::Gamefile;
use crate::memory::{self, MemoryMap, CHIP8_DISPLAY_SIZE_BYTES};
use crate::{display::Display, input::Input, random::RandomSource, sound::Sound};
use spin_sleep::LoopHelper;
use std::io;
use std::time::Duration;
use tracing::{debug, info, trace};

/// the delay and sound timers count down at 60Hz
const TIMER_PERIOD: Duration = Duration::from_nanos(1_000_000_000 / 60);

/// the VIP refreshes its display on the same 60Hz interrupt
const REFRESH_PERIOD: Duration = TIMER_PERIOD;

/// where the program counter goes after an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramCounter {
    Next,
    Skip,
    Jump(u16),
    /// stay put; used while waiting for a key
    Wait,
}

/// what a call to `tick` got done
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// one instruction ran
    Ran,
    /// suspended on LD Vx, K; nothing ran
    Waiting,
    /// the user asked to stop
    Quit,
}

impl ProgramCounter {
    fn skip_if(condition: bool) -> ProgramCounter {
        if condition {
            ProgramCounter::Skip
        } else {
            ProgramCounter::Next
        }
    }
}

pub struct Chip8Interpreter<'a> {
    memory: memory::Chip8MemoryMap,
    display: &'a mut dyn Display,
    input: &'a mut dyn Input,
    sound: &'a mut dyn Sound,
    random: &'a mut dyn RandomSource,
    v: [u8; 16],
    i: u16,
    program_counter: u16,
    stack_pointer: u16,
    delay_timer: u8,
    sound_timer: u8,
    /// wallclock time not yet accounted for by the timers
    timer_elapsed: Duration,
    /// register LD Vx, K will store the next key in
    waiting_for_key: Option<u8>,
    wrap_sprites: bool,
    sounding: bool,
    display_dirty: bool,
}

impl<'a> Chip8Interpreter<'a> {
    pub fn new(
        display: &'a mut dyn Display,
        input: &'a mut dyn Input,
        sound: &'a mut dyn Sound,
        random: &'a mut dyn RandomSource,
    ) -> Result<Chip8Interpreter<'a>> {
        let actual = display.get_display_size_bytes();
        if actual != CHIP8_DISPLAY_SIZE_BYTES {
            return Err(Error::DisplaySize {
                expected: CHIP8_DISPLAY_SIZE_BYTES,
                actual,
            });
        }
        let memory = memory::Chip8MemoryMap::new()?;
        Ok(Chip8Interpreter {
            display,
            input,
            sound,
            random,
            v: [0; 16],
            i: 0x0000,
            program_counter: memory.program_addr,
            stack_pointer: memory.stack_addr,
            delay_timer: 0x00,
            sound_timer: 0x00,
            timer_elapsed: Duration::ZERO,
            waiting_for_key: None,
            wrap_sprites: false,
            sounding: false,
            display_dirty: true,
            memory,
        })
    }

    /// sprites running off one edge of the screen reappear on the other
    pub fn set_wrap_sprites(&mut self, wrap: bool) {
        self.wrap_sprites = wrap;
    }

    /// load a chip8 program
    pub fn load_program(&mut self, reader: &mut impl io::Read) -> Result<()> {
        let size = self.memory.load_program(reader)?;
        info!(size, "loaded program");
        Ok(())
    }

    pub fn load(&mut self, gamefile: &Gamefile) -> Result<()> {
        self.load_program(&mut gamefile.bytecode.as_slice())
    }

    pub fn program_counter(&self) -> u16 {
        self.program_counter
    }

    pub fn registers(&self) -> &[u8; 16] {
        &self.v
    }

    pub fn is_waiting_for_key(&self) -> bool {
        self.waiting_for_key.is_some()
    }

    /// external interrupt; refreshes the display if anything was drawn
    pub fn interrupt(&mut self) -> Result<()> {
        if self.display_dirty {
            let frame = self
                .memory
                .get_ro_slice(self.memory.display_addr, CHIP8_DISPLAY_SIZE_BYTES)?;
            self.display.draw(frame)?;
            self.display_dirty = false;
        }
        Ok(())
    }

    /// back to power-on state; the program has to be loaded again
    pub fn hard_reset(&mut self) -> Result<()> {
        self.memory.reset()?;
        self.v = [0; 16];
        self.i = 0x0000;
        self.program_counter = self.memory.program_addr;
        self.stack_pointer = self.memory.stack_addr;
        self.delay_timer = 0x00;
        self.sound_timer = 0x00;
        self.timer_elapsed = Duration::ZERO;
        self.waiting_for_key = None;
        self.display_dirty = true;
        self.update_sound()?;
        self.interrupt()?;
        info!("reset");
        Ok(())
    }

    /// service input, let `delta` pass on the timers and run one
    /// instruction unless suspended on LD Vx, K
    pub fn tick(&mut self, delta: Duration) -> Result<Tick> {
        for event in self.input.poll_events()? {
            if !self.handle_event(event) {
                return Ok(Tick::Quit);
            }
        }
        self.update_timers(delta);
        let tick = if self.waiting_for_key.is_none() {
            self.step()?;
            Tick::Ran
        } else {
            Tick::Waiting
        };
        self.update_sound()?;
        Ok(tick)
    }

    /// returns false if the event asks us to stop
    pub fn handle_event(&mut self, event: InputEvent) -> bool {
        match event {
            InputEvent::Quit => {
                debug!("quit requested");
                false
            }
            InputEvent::KeyDown(key) => {
                if let Some(x) = self.waiting_for_key.take() {
                    self.v[x as usize] = key;
                    self.program_counter = self.program_counter.wrapping_add(2);
                }
                true
            }
        }
    }

    fn update_timers(&mut self, delta: Duration) {
        self.timer_elapsed += delta;
        while self.timer_elapsed >= TIMER_PERIOD {
            self.timer_elapsed -= TIMER_PERIOD;
            self.delay_timer = self.delay_timer.saturating_sub(1);
            self.sound_timer = self.sound_timer.saturating_sub(1);
        }
    }

    fn update_sound(&mut self) -> Result<()> {
        let should_sound = self.sound_timer > 0;
        if should_sound != self.sounding {
            let toggled = if should_sound {
                self.sound.beep()
            } else {
                self.sound.stop()
            };
            toggled.map_err(|e| Error::Sound(e.to_string()))?;
            self.sounding = should_sound;
        }
        Ok(())
    }

    /// fetch, decode and execute the instruction at the program counter
    pub fn step(&mut self) -> Result<()> {
        let pc = self.program_counter;
        let opcode = self.memory.get_word(pc)?;
        let instruction = Instruction::decode(opcode).ok_or(Error::UnknownOpcode { opcode, pc })?;
        trace!("0x{:03x}: 0x{:04x}  -->  {}", pc, opcode, instruction);

        match self.execute(instruction)? {
            ProgramCounter::Next => self.program_counter = pc.wrapping_add(2),
            ProgramCounter::Skip => self.program_counter = pc.wrapping_add(4),
            ProgramCounter::Jump(addr) => self.program_counter = addr,
            ProgramCounter::Wait => {}
        }
        Ok(())
    }

    /// carry out one instruction as if it were at the program counter
    pub fn execute(&mut self, instruction: Instruction) -> Result<ProgramCounter> {
        use Instruction::*;

        let pc = self.program_counter;
        let next = match instruction {
            Cls => {
                let display_addr = self.memory.display_addr;
                display::clear_frame(
                    self.memory
                        .get_rw_slice(display_addr, CHIP8_DISPLAY_SIZE_BYTES)?,
                );
                self.display_dirty = true;
                ProgramCounter::Next
            }
            Ret => {
                if self.stack_pointer >= self.memory.stack_addr {
                    return Err(Error::StackUnderflow { pc });
                }
                let caller = self.memory.get_word(self.stack_pointer)?;
                self.stack_pointer += 2;
                ProgramCounter::Jump(caller.wrapping_add(2))
            }
            Jp(addr) => ProgramCounter::Jump(addr),
            Call(addr) => {
                if self.stack_pointer <= self.memory.stack_limit {
                    return Err(Error::StackOverflow { pc });
                }
                self.stack_pointer -= 2;
                self.memory.put_word(self.stack_pointer, pc)?;
                ProgramCounter::Jump(addr)
            }
            SeByte(x, kk) => ProgramCounter::skip_if(self.v[x as usize] == kk),
            SneByte(x, kk) => ProgramCounter::skip_if(self.v[x as usize] != kk),
            SeReg(x, y) => ProgramCounter::skip_if(self.v[x as usize] == self.v[y as usize]),
            LdByte(x, kk) => {
                self.v[x as usize] = kk;
                ProgramCounter::Next
            }
            AddByte(x, kk) => {
                self.v[x as usize] = self.v[x as usize].wrapping_add(kk);
                ProgramCounter::Next
            }
            LdReg(x, y) => {
                self.v[x as usize] = self.v[y as usize];
                ProgramCounter::Next
            }
            Or(x, y) => {
                self.v[x as usize] |= self.v[y as usize];
                ProgramCounter::Next
            }
            And(x, y) => {
                self.v[x as usize] &= self.v[y as usize];
                ProgramCounter::Next
            }
            Xor(x, y) => {
                self.v[x as usize] ^= self.v[y as usize];
                ProgramCounter::Next
            }
            // for the arithmetic the flag is written last, so VF as an
            // operand ends up holding the flag
            AddReg(x, y) => {
                let (sum, carry) = self.v[x as usize].overflowing_add(self.v[y as usize]);
                self.v[x as usize] = sum;
                self.v[0xf] = carry as u8;
                ProgramCounter::Next
            }
            Sub(x, y) => {
                let (vx, vy) = (self.v[x as usize], self.v[y as usize]);
                self.v[x as usize] = vx.wrapping_sub(vy);
                self.v[0xf] = (vx > vy) as u8;
                ProgramCounter::Next
            }
            Shr(x) => {
                let vx = self.v[x as usize];
                self.v[x as usize] = vx >> 1;
                self.v[0xf] = vx & 0x01;
                ProgramCounter::Next
            }
            Subn(x, y) => {
                let (vx, vy) = (self.v[x as usize], self.v[y as usize]);
                self.v[x as usize] = vy.wrapping_sub(vx);
                self.v[0xf] = (vy > vx) as u8;
                ProgramCounter::Next
            }
            Shl(x) => {
                let vx = self.v[x as usize];
                self.v[x as usize] = vx << 1;
                self.v[0xf] = vx >> 7;
                ProgramCounter::Next
            }
            SneReg(x, y) => ProgramCounter::skip_if(self.v[x as usize] != self.v[y as usize]),
            LdI(addr) => {
                self.i = addr;
                ProgramCounter::Next
            }
            JpV0(addr) => ProgramCounter::Jump(addr.wrapping_add(self.v[0x0] as u16)),
            Rnd(x, kk) => {
                self.v[x as usize] = self.random.random_byte() & kk;
                ProgramCounter::Next
            }
            Drw(x, y, n) => {
                let sprite = self.memory.get_ro_slice(self.i, n as usize)?.to_vec();
                let (vx, vy) = (self.v[x as usize], self.v[y as usize]);
                let wrap = self.wrap_sprites;
                let display_addr = self.memory.display_addr;
                let frame = self
                    .memory
                    .get_rw_slice(display_addr, CHIP8_DISPLAY_SIZE_BYTES)?;
                let collision =
                    CHIP8_RESOLUTION.draw_sprite(frame, vx as usize, vy as usize, &sprite, wrap);
                self.v[0xf] = collision as u8;
                self.display_dirty = true;
                ProgramCounter::Next
            }
            Skp(x) => ProgramCounter::skip_if(self.input.is_key_pressed(self.v[x as usize])?),
            Sknp(x) => ProgramCounter::skip_if(!self.input.is_key_pressed(self.v[x as usize])?),
            LdRegDt(x) => {
                self.v[x as usize] = self.delay_timer;
                ProgramCounter::Next
            }
            LdKey(x) => {
                self.waiting_for_key = Some(x);
                ProgramCounter::Wait
            }
            LdDtReg(x) => {
                self.delay_timer = self.v[x as usize];
                ProgramCounter::Next
            }
            LdSt(x) => {
                self.sound_timer = self.v[x as usize];
                ProgramCounter::Next
            }
            AddI(x) => {
                self.i = self.i.wrapping_add(self.v[x as usize] as u16);
                ProgramCounter::Next
            }
            LdF(x) => {
                self.i = self.memory.font_glyph_addr(self.v[x as usize]);
                ProgramCounter::Next
            }
            LdB(x) => {
                let vx = self.v[x as usize];
                self.memory.write(&[vx / 100, vx / 10 % 10, vx % 10], self.i, 3)?;
                ProgramCounter::Next
            }
            StoreRegs(x) => {
                let len = x as usize + 1;
                self.memory.write(&self.v[..len], self.i, len)?;
                ProgramCounter::Next
            }
            LoadRegs(x) => {
                let len = x as usize + 1;
                let src = self.memory.get_ro_slice(self.i, len)?;
                self.v[..len].copy_from_slice(src);
                ProgramCounter::Next
            }
        };
        Ok(next)
    }

    /// run until the user quits, `cycle_limit` instructions have run, or
    /// something goes wrong
    pub fn main_loop(&mut self, cycles_per_second: f64, cycle_limit: Option<u64>) -> Result<()> {
        let mut loop_helper = LoopHelper::builder().build_with_target_rate(cycles_per_second);
        let mut since_refresh = Duration::ZERO;
        let mut cycles: u64 = 0;

        self.interrupt()?;
        loop {
            if cycle_limit.map_or(false, |limit| cycles >= limit) {
                info!(cycles, "cycle limit reached");
                break;
            }
            let delta = loop_helper.loop_start();
            match self.tick(delta)? {
                Tick::Ran => cycles += 1,
                Tick::Waiting => {}
                Tick::Quit => break,
            }
            if refresh_due(&mut since_refresh, delta) {
                self.interrupt()?;
            }
            loop_helper.loop_sleep();
        }
        info!(cycles, "stopped");
        self.interrupt()
    }
}

/// add `delta` to the time since the last refresh and say whether a refresh
/// is due; the remainder carries over, a backlog of whole periods is dropped
fn refresh_due(since_refresh: &mut Duration, delta: Duration) -> bool {
    *since_refresh += delta;
    if *since_refresh < REFRESH_PERIOD {
        return false;
    }
    *since_refresh -= REFRESH_PERIOD;
    if *since_refresh >= REFRESH_PERIOD {
        *since_refresh = Duration::ZERO;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::DummyDisplay;
    use crate::input::DummyInput;
    use crate::random::FixedRandom;
    use crate::sound::Mute;

    /// devices for an interpreter to borrow
    struct Rig {
        display: DummyDisplay,
        input: DummyInput,
        sound: Mute,
        random: FixedRandom,
    }

    impl Rig {
        fn new() -> Self {
            Rig {
                display: DummyDisplay::new(),
                input: DummyInput::new(&[]),
                sound: Mute::new(),
                random: FixedRandom(0xff),
            }
        }

        fn holding(keys: &[u8]) -> Self {
            Rig {
                input: DummyInput::new(keys),
                ..Rig::new()
            }
        }

        fn interpreter(&mut self) -> Chip8Interpreter<'_> {
            Chip8Interpreter::new(
                &mut self.display,
                &mut self.input,
                &mut self.sound,
                &mut self.random,
            )
            .unwrap()
        }
    }

    fn run(i: &mut Chip8Interpreter, opcode: u16) -> Result<()> {
        i.execute_opcode(opcode)
    }

    impl<'a> Chip8Interpreter<'a> {
        /// put an opcode at the program counter and step it
        fn execute_opcode(&mut self, opcode: u16) -> Result<()> {
            self.memory.put_word(self.program_counter, opcode)?;
            self.step()
        }

        fn frame(&self) -> &[u8] {
            self.memory
                .get_ro_slice(self.memory.display_addr, CHIP8_DISPLAY_SIZE_BYTES)
                .unwrap()
        }
    }

    #[test]
    fn test_program_load_ok() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        let mut prog: &[u8] = &[0x00, 0xe0]; // clear screen
        i.load_program(&mut prog)?;
        assert_eq!(i.memory.get_word(0x200)?, 0x00e0);
        Ok(())
    }

    #[test]
    fn test_rejects_wrong_sized_display() {
        struct Tiny;
        impl Display for Tiny {
            fn draw(&mut self, _data: &[u8]) -> io::Result<()> {
                Ok(())
            }
            fn get_display_size_bytes(&mut self) -> usize {
                0x80
            }
        }
        let mut rig = Rig::new();
        let mut tiny = Tiny;
        let r = Chip8Interpreter::new(&mut tiny, &mut rig.input, &mut rig.sound, &mut rig.random);
        assert!(matches!(
            r,
            Err(Error::DisplaySize {
                expected: 0x100,
                actual: 0x80
            })
        ));
    }

    #[test]
    fn test_cls() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        let addr = i.memory.display_addr;
        i.memory.write(&[0xff; 0x100], addr, 0x100)?;
        run(&mut i, 0x00e0)?;
        assert_eq!(i.frame(), &[0u8; 0x100][..]);
        assert_eq!(i.program_counter, 0x202);
        Ok(())
    }

    #[test]
    fn test_call_and_ret() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        run(&mut i, 0x2344)?;
        assert_eq!(i.program_counter, 0x344);
        assert_eq!(i.stack_pointer, i.memory.stack_addr - 2);
        assert_eq!(i.memory.get_word(i.stack_pointer)?, 0x200);
        run(&mut i, 0x00ee)?;
        assert_eq!(i.program_counter, 0x202);
        assert_eq!(i.stack_pointer, i.memory.stack_addr);
        Ok(())
    }

    #[test]
    fn test_ret_on_empty_stack() {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        assert!(matches!(
            run(&mut i, 0x00ee),
            Err(Error::StackUnderflow { pc: 0x200 })
        ));
    }

    #[test]
    fn test_stack_overflow() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        // every subroutine calls the next one along
        for level in 0..16u16 {
            let addr = 0x300 + 2 * level;
            i.memory.put_word(addr, 0x2000 | (addr + 2))?;
        }
        run(&mut i, 0x2300)?;
        for _ in 0..15 {
            i.step()?;
        }
        assert_eq!(i.stack_pointer, i.memory.stack_limit);
        assert!(matches!(i.step(), Err(Error::StackOverflow { pc: 0x31e })));
        Ok(())
    }

    #[test]
    fn test_jp() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        run(&mut i, 0x1220)?;
        assert_eq!(i.program_counter, 0x220);
        Ok(())
    }

    #[test]
    fn test_se_sne_byte() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        i.v[0x0] = 0x44;
        run(&mut i, 0x3044)?;
        assert_eq!(i.program_counter, 0x204);
        run(&mut i, 0x3043)?;
        assert_eq!(i.program_counter, 0x206);
        run(&mut i, 0x4043)?;
        assert_eq!(i.program_counter, 0x20a);
        run(&mut i, 0x4044)?;
        assert_eq!(i.program_counter, 0x20c);
        Ok(())
    }

    #[test]
    fn test_se_sne_reg() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        i.v[0x0] = 0x44;
        i.v[0x9] = 0x44;
        i.v[0xd] = 0x12;
        run(&mut i, 0x5090)?;
        assert_eq!(i.program_counter, 0x204);
        run(&mut i, 0x50d0)?;
        assert_eq!(i.program_counter, 0x206);
        run(&mut i, 0x90d0)?;
        assert_eq!(i.program_counter, 0x20a);
        run(&mut i, 0x9090)?;
        assert_eq!(i.program_counter, 0x20c);
        Ok(())
    }

    #[test]
    fn test_ld_add_byte() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        run(&mut i, 0x6d33)?;
        assert_eq!(i.v[0xd], 0x33);
        i.v[0x3] = 0x0f;
        run(&mut i, 0x7310)?;
        assert_eq!(i.v[0x3], 0x1f);
        // wraps, and leaves the flag alone
        i.v[0xf] = 0x7;
        run(&mut i, 0x73f0)?;
        assert_eq!(i.v[0x3], 0x0f);
        assert_eq!(i.v[0xf], 0x7);
        Ok(())
    }

    #[test]
    fn test_logic_ops() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        for (opcode, expected) in [
            (0x82a0, 0x05),
            (0x82a1, 0x0f | 0x05),
            (0x82a2, 0x0f & 0x05),
            (0x82a3, 0x0f ^ 0x05),
        ] {
            i.v[0x2] = 0x0f;
            i.v[0xa] = 0x05;
            run(&mut i, opcode)?;
            assert_eq!(i.v[0x2], expected, "0x{:04x}", opcode);
        }
        Ok(())
    }

    #[test]
    fn test_add_reg_carry() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        i.v[0x2] = 0x0f;
        i.v[0xa] = 0x05;
        run(&mut i, 0x82a4)?;
        assert_eq!(i.v[0x2], 0x14);
        assert_eq!(i.v[0xf], 0);

        i.v[0x2] = 0xff;
        i.v[0xa] = 0x01;
        run(&mut i, 0x82a4)?;
        assert_eq!(i.v[0x2], 0x00);
        assert_eq!(i.v[0xf], 1);
        Ok(())
    }

    #[test]
    fn test_sub_and_subn() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        i.v[0x2] = 0x0f;
        i.v[0xa] = 0x05;
        run(&mut i, 0x82a5)?;
        assert_eq!(i.v[0x2], 0x0a);
        assert_eq!(i.v[0xf], 1);

        i.v[0x2] = 0x0f;
        run(&mut i, 0x8a25)?;
        assert_eq!(i.v[0xa], 0xf6);
        assert_eq!(i.v[0xf], 0);

        i.v[0x2] = 0x0f;
        i.v[0xa] = 0x05;
        run(&mut i, 0x82a7)?;
        assert_eq!(i.v[0x2], 0xf6);
        assert_eq!(i.v[0xf], 0);

        i.v[0x2] = 0x0f;
        i.v[0xa] = 0x05;
        run(&mut i, 0x8a27)?;
        assert_eq!(i.v[0xa], 0x0a);
        assert_eq!(i.v[0xf], 1);

        // equal operands don't count as "no borrow"
        i.v[0x2] = 0x05;
        i.v[0xa] = 0x05;
        run(&mut i, 0x82a5)?;
        assert_eq!(i.v[0x2], 0x00);
        assert_eq!(i.v[0xf], 0);
        Ok(())
    }

    #[test]
    fn test_shifts() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        i.v[0x5] = 0x01;
        run(&mut i, 0x8506)?;
        assert_eq!((i.v[0x5], i.v[0xf]), (0x00, 1));
        i.v[0x5] = 0x02;
        run(&mut i, 0x8506)?;
        assert_eq!((i.v[0x5], i.v[0xf]), (0x01, 0));
        i.v[0x5] = 0xff;
        run(&mut i, 0x850e)?;
        assert_eq!((i.v[0x5], i.v[0xf]), (0xfe, 1));
        i.v[0x5] = 0x02;
        run(&mut i, 0x850e)?;
        assert_eq!((i.v[0x5], i.v[0xf]), (0x04, 0));
        Ok(())
    }

    #[test]
    fn test_flag_register_as_operand_holds_flag() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        i.v[0xf] = 0xff;
        i.v[0x1] = 0x01;
        run(&mut i, 0x8f14)?;
        assert_eq!(i.v[0xf], 1);
        Ok(())
    }

    #[test]
    fn test_ld_i_and_jp_v0() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        run(&mut i, 0xa111)?;
        assert_eq!(i.i, 0x111);
        i.v[0x0] = 0x10;
        run(&mut i, 0xb220)?;
        assert_eq!(i.program_counter, 0x230);
        Ok(())
    }

    #[test]
    fn test_rnd_is_masked() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        run(&mut i, 0xc0fa)?;
        assert_eq!(i.v[0x0], 0xfa);
        run(&mut i, 0xc203)?;
        assert_eq!(i.v[0x2], 0x03);
        i.v[0x4] = 0x10;
        run(&mut i, 0xc400)?;
        assert_eq!(i.v[0x4], 0x00);
        Ok(())
    }

    #[test]
    fn test_drw_no_collision() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        i.i = 0x00; // "0"
        i.v[0x1] = 0x0;
        i.v[0xf] = 0x1;
        run(&mut i, 0xd115)?;
        assert_eq!(i.v[0xf], 0);
        let frame = i.frame();
        for (row, bits) in [0xf0, 0x90, 0x90, 0x90, 0xf0].iter().enumerate() {
            assert_eq!(frame[row * 8], *bits);
        }
        Ok(())
    }

    #[test]
    fn test_drw_collision() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        i.i = 0x05; // "1"
        run(&mut i, 0xd115)?;
        i.i = 0x00; // "0"
        run(&mut i, 0xd115)?;
        assert_eq!(i.v[0xf], 1);
        let one = [0x20, 0x60, 0x20, 0x20, 0x70];
        let zero = [0xf0, 0x90, 0x90, 0x90, 0xf0];
        let frame = i.frame();
        for row in 0..5 {
            assert_eq!(frame[row * 8], one[row] ^ zero[row]);
        }
        Ok(())
    }

    #[test]
    fn test_drw_wraps_when_asked() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        i.set_wrap_sprites(true);
        i.i = 0x00;
        i.v[0x1] = 62;
        i.v[0x2] = 0;
        run(&mut i, 0xd125)?;
        assert_eq!(i.frame()[7], 0x03);
        assert_eq!(i.frame()[0], 0xc0);
        Ok(())
    }

    #[test]
    fn test_drw_reads_outside_memory() {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        i.i = 0x0ffe;
        assert!(matches!(
            run(&mut i, 0xd005),
            Err(Error::AddressOutOfRange { addr: 0x0ffe, len: 5 })
        ));
    }

    #[test]
    fn test_skp_sknp() -> Result<()> {
        let mut rig = Rig::holding(&[0xc]);
        let mut i = rig.interpreter();
        i.v[0x1] = 0xc;
        run(&mut i, 0xe19e)?;
        assert_eq!(i.program_counter, 0x204);
        run(&mut i, 0xe1a1)?;
        assert_eq!(i.program_counter, 0x206);
        i.v[0x1] = 0x3;
        run(&mut i, 0xe19e)?;
        assert_eq!(i.program_counter, 0x208);
        run(&mut i, 0xe1a1)?;
        assert_eq!(i.program_counter, 0x20c);
        Ok(())
    }

    #[test]
    fn test_timer_registers() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        i.v[0x4] = 0xf1;
        run(&mut i, 0xf415)?;
        assert_eq!(i.delay_timer, 0xf1);
        run(&mut i, 0xf418)?;
        assert_eq!(i.sound_timer, 0xf1);
        i.v[0x4] = 0x00;
        run(&mut i, 0xf407)?;
        assert_eq!(i.v[0x4], 0xf1);
        Ok(())
    }

    #[test]
    fn test_ld_key_waits_for_keypress() -> Result<()> {
        let mut rig = Rig::new();
        rig.input.push_poll(&[]);
        rig.input.push_poll(&[]);
        rig.input.push_poll(&[InputEvent::KeyDown(0xc)]);
        let mut i = rig.interpreter();
        // LD V4, K; LD V5, 0x01
        i.load_program(&mut [0xf4u8, 0x0a, 0x65, 0x01].as_slice())?;

        assert_eq!(i.tick(Duration::ZERO)?, Tick::Ran);
        assert!(i.is_waiting_for_key());
        assert_eq!(i.program_counter, 0x200);

        // nothing happens without a key
        assert_eq!(i.tick(Duration::ZERO)?, Tick::Waiting);
        assert_eq!(i.program_counter, 0x200);

        assert_eq!(i.tick(Duration::ZERO)?, Tick::Ran);
        assert!(!i.is_waiting_for_key());
        assert_eq!(i.v[0x4], 0xc);
        assert_eq!(i.v[0x5], 0x01);
        assert_eq!(i.program_counter, 0x204);
        Ok(())
    }

    #[test]
    fn test_keys_ignored_when_not_waiting() {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        assert!(i.handle_event(InputEvent::KeyDown(0x3)));
        assert_eq!(i.program_counter, 0x200);
        assert_eq!(i.v, [0; 16]);
    }

    #[test]
    fn test_quit() -> Result<()> {
        let mut rig = Rig::new();
        rig.input.push_poll(&[InputEvent::Quit]);
        let mut i = rig.interpreter();
        i.load_program(&mut [0x12u8, 0x00].as_slice())?;
        assert_eq!(i.tick(Duration::ZERO)?, Tick::Quit);
        Ok(())
    }

    #[test]
    fn test_add_i() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        i.v[0x7] = 0x45;
        i.i = 0x0f;
        run(&mut i, 0xf71e)?;
        assert_eq!(i.i, 0x54);
        Ok(())
    }

    #[test]
    fn test_ld_f() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        i.v[0x1] = 0x01;
        run(&mut i, 0xf129)?;
        assert_eq!(i.i, 0x05);
        i.v[0x1] = 0x0f;
        run(&mut i, 0xf129)?;
        assert_eq!(i.i, 0x4b);
        Ok(())
    }

    #[test]
    fn test_ld_b() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        i.v[0x3] = 216;
        i.i = 0x300;
        run(&mut i, 0xf333)?;
        assert_eq!(i.memory.get_ro_slice(0x300, 3)?, &[2, 1, 6]);
        Ok(())
    }

    #[test]
    fn test_store_and_load_registers() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        for r in 0..16u8 {
            i.v[r as usize] = r;
        }
        i.i = 0x300;
        run(&mut i, 0xff55)?;
        assert_eq!(
            i.memory.get_ro_slice(0x300, 16)?,
            (0..16u8).collect::<Vec<_>>().as_slice()
        );
        assert_eq!(i.i, 0x300);

        i.v = [0; 16];
        run(&mut i, 0xf265)?;
        assert_eq!(i.v[..4], [0, 1, 2, 0]);
        assert_eq!(i.i, 0x300);
        Ok(())
    }

    #[test]
    fn test_unknown_opcode_halts() {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        assert!(matches!(
            run(&mut i, 0x8008),
            Err(Error::UnknownOpcode {
                opcode: 0x8008,
                pc: 0x200
            })
        ));
    }

    #[test]
    fn test_timers_count_down_at_60hz() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        // LD V0, 0x03; LD DT, V0; LD ST, V0; JP 0x206
        i.load_program(&mut [0x60u8, 0x03, 0xf0, 0x15, 0xf0, 0x18, 0x12, 0x06].as_slice())?;
        for _ in 0..3 {
            i.tick(Duration::ZERO)?;
        }
        assert_eq!((i.delay_timer, i.sound_timer), (3, 3));
        assert!(i.sounding);

        i.tick(Duration::from_millis(10))?;
        assert_eq!(i.delay_timer, 3);
        i.tick(Duration::from_millis(10))?;
        assert_eq!(i.delay_timer, 2);
        i.tick(Duration::from_millis(100))?;
        assert_eq!((i.delay_timer, i.sound_timer), (0, 0));
        assert!(!i.sounding);
        drop(i);
        assert_eq!((rig.sound.beeps, rig.sound.stops), (1, 1));
        Ok(())
    }

    #[test]
    fn test_interrupt_draws_only_when_dirty() -> Result<()> {
        let mut rig = Rig::new();
        {
            let mut i = rig.interpreter();
            i.interrupt()?;
            i.interrupt()?;
            i.i = 0x00;
            run(&mut i, 0xd005)?;
            i.interrupt()?;
        }
        assert_eq!(rig.display.frames_drawn, 2);
        assert_eq!(rig.display.last_frame[..5], [0xf0, 0x00, 0x00, 0x00, 0x00]);
        Ok(())
    }

    #[test]
    fn test_hard_reset() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        i.load_program(&mut [0x22u8, 0x04].as_slice())?;
        i.step()?;
        i.v[0x3] = 0x33;
        i.i = 0x123;
        i.delay_timer = 9;
        i.sound_timer = 9;
        i.update_sound()?;
        run(&mut i, 0xd005)?;

        i.hard_reset()?;
        assert_eq!(i.program_counter, 0x200);
        assert_eq!(i.stack_pointer, i.memory.stack_addr);
        assert_eq!(i.v, [0; 16]);
        assert_eq!((i.i, i.delay_timer, i.sound_timer), (0, 0, 0));
        assert!(!i.sounding);
        assert_eq!(i.memory.get_word(0x200)?, 0x0000);
        assert_eq!(i.memory.get_ro_slice(0x00, 1)?, &[0xf0]);
        assert_eq!(i.frame(), &[0u8; 0x100][..]);
        Ok(())
    }

    #[test]
    fn test_main_loop_stops_at_cycle_limit() -> Result<()> {
        let mut rig = Rig::new();
        {
            let mut i = rig.interpreter();
            // draw "0" then spin
            i.load_program(&mut [0xa0u8, 0x00, 0xd0, 0x05, 0x12, 0x04].as_slice())?;
            i.main_loop(100_000.0, Some(50))?;
            assert_eq!(i.program_counter, 0x204);
        }
        assert!(rig.display.frames_drawn >= 2);
        assert_eq!(rig.display.last_frame[0], 0xf0);
        Ok(())
    }

    #[test]
    fn test_cycle_limit_zero_runs_nothing() -> Result<()> {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        // LD V0, 0x01; LD V1, 0x02
        i.load_program(&mut [0x60u8, 0x01, 0x61, 0x02].as_slice())?;
        i.main_loop(100_000.0, Some(0))?;
        assert_eq!(i.program_counter, 0x200);
        assert_eq!(i.v[0x0], 0);
        Ok(())
    }

    #[test]
    fn test_cycle_limit_ignores_ticks_spent_waiting() -> Result<()> {
        let mut rig = Rig::new();
        for _ in 0..5 {
            rig.input.push_poll(&[]);
        }
        rig.input.push_poll(&[InputEvent::KeyDown(0x7)]);
        let mut i = rig.interpreter();
        // LD V4, K; LD V5, 0x01; LD V6, 0x02
        i.load_program(&mut [0xf4u8, 0x0a, 0x65, 0x01, 0x66, 0x02].as_slice())?;
        i.main_loop(100_000.0, Some(2))?;
        assert!(!i.is_waiting_for_key());
        assert_eq!((i.v[0x4], i.v[0x5], i.v[0x6]), (0x7, 0x01, 0x00));
        assert_eq!(i.program_counter, 0x204);
        Ok(())
    }

    #[test]
    fn test_refresh_keeps_leftover_time() {
        let mut since_refresh = Duration::ZERO;
        let refreshes = (0..100)
            .filter(|_| refresh_due(&mut since_refresh, Duration::from_millis(10)))
            .count();
        assert_eq!(refreshes, 60);
    }

    #[test]
    fn test_refresh_drops_backlog() {
        let mut since_refresh = Duration::ZERO;
        assert!(refresh_due(&mut since_refresh, Duration::from_secs(1)));
        assert_eq!(since_refresh, Duration::ZERO);
        assert!(!refresh_due(&mut since_refresh, Duration::from_millis(10)));
    }

    #[test]
    fn test_main_loop_surfaces_errors() {
        let mut rig = Rig::new();
        let mut i = rig.interpreter();
        i.load_program(&mut [0xffu8, 0xff].as_slice()).unwrap();
        assert!(matches!(
            i.main_loop(100_000.0, None),
            Err(Error::UnknownOpcode { opcode: 0xffff, .. })
        ));
    }
}
