use crossterm::event::{poll, read, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::time::{Duration, Instant};
use tracing::debug;

/// map of characters read from the keyboard to what the chip8 might expect
/// where '1' => 0x01 and 'a' => 0x0a
const CHIP8_LITERAL_KEYMAP: [(char, u8); 16] = [
    ('0', 0x00),
    ('1', 0x01),
    ('2', 0x02),
    ('3', 0x03),
    ('4', 0x04),
    ('5', 0x05),
    ('6', 0x06),
    ('7', 0x07),
    ('8', 0x08),
    ('9', 0x09),
    ('a', 0x0a),
    ('b', 0x0b),
    ('c', 0x0c),
    ('d', 0x0d),
    ('e', 0x0e),
    ('f', 0x0f),
];

/// ditto using left-hand side of qwerty keyboard, laid out like the COSMAC
/// keypad:
///   1 2 3 C      1 2 3 4
///   4 5 6 D  =>  q w e r
///   7 8 9 E      a s d f
///   A 0 B F      z x c v
const CHIP8_CONVENTIONAL_KEYMAP: [(char, u8); 16] = [
    ('x', 0x00),
    ('1', 0x01),
    ('2', 0x02),
    ('3', 0x03),
    ('q', 0x04),
    ('w', 0x05),
    ('e', 0x06),
    ('a', 0x07),
    ('s', 0x08),
    ('d', 0x09),
    ('z', 0x0a),
    ('c', 0x0b),
    ('4', 0x0c),
    ('r', 0x0d),
    ('f', 0x0e),
    ('v', 0x0f),
];

/// which keymap to read the keyboard with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Keymap {
    /// the keypad layout on the left of a qwerty keyboard
    #[default]
    Conventional,
    /// keys 0-9 and a-f
    Literal,
}

impl Keymap {
    pub fn mapping(&self) -> HashMap<char, u8> {
        match self {
            Keymap::Conventional => HashMap::from(CHIP8_CONVENTIONAL_KEYMAP),
            Keymap::Literal => HashMap::from(CHIP8_LITERAL_KEYMAP),
        }
    }
}

/// something that happened on the input device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// a COSMAC key, 0x0-0xf, went down
    KeyDown(u8),
    /// the user wants out
    Quit,
}

/// reads keypresses
pub trait Input {
    /// drain everything the device has seen since the last call
    fn poll_events(&mut self) -> Result<Vec<InputEvent>, io::Error>;

    /// is the COSMAC key currently held down
    fn is_key_pressed(&mut self, key: u8) -> Result<bool, io::Error>;
}

/// implementation of Input using the terminal in raw mode.
///
/// terminals don't report key releases, so a key counts as held for
/// `hold` after its last press; auto-repeat keeps it held
pub struct StdinInput {
    keymap: HashMap<char, u8>,
    last_pressed: [Option<Instant>; 16],
    hold: Duration,
    pending: Vec<InputEvent>,
}

impl StdinInput {
    pub fn new(keymap: Keymap, hold: Duration) -> Result<Self, io::Error> {
        terminal::enable_raw_mode()?;
        Ok(StdinInput {
            keymap: keymap.mapping(),
            last_pressed: [None; 16],
            hold,
            pending: Vec::new(),
        })
    }

    fn read_stdin(&mut self) -> Result<(), io::Error> {
        while poll(Duration::from_millis(0))? {
            match read()? {
                Event::Key(evt) => self.handle_key(evt),
                evt => debug!(?evt, "ignoring terminal event"),
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, evt: KeyEvent) {
        match evt.code {
            KeyCode::Esc => self.pending.push(InputEvent::Quit),
            KeyCode::Char('c') if evt.modifiers.contains(KeyModifiers::CONTROL) => {
                self.pending.push(InputEvent::Quit)
            }
            KeyCode::Char(key) => match self.keymap.get(&key.to_ascii_lowercase()) {
                Some(&mapped_key) => {
                    self.last_pressed[mapped_key as usize] = Some(Instant::now());
                    self.pending.push(InputEvent::KeyDown(mapped_key));
                }
                None => debug!("can't map {:?} to a COSMAC key", key),
            },
            code => debug!(?code, "unknown key event received"),
        }
    }
}

impl Drop for StdinInput {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

impl Input for StdinInput {
    fn poll_events(&mut self) -> Result<Vec<InputEvent>, io::Error> {
        self.read_stdin()?;
        Ok(std::mem::take(&mut self.pending))
    }

    fn is_key_pressed(&mut self, key: u8) -> Result<bool, io::Error> {
        self.read_stdin()?;
        Ok(self
            .last_pressed
            .get(key as usize)
            .copied()
            .flatten()
            .map_or(false, |at| at.elapsed() < self.hold))
    }
}

/// dummy Input implementation for testing: a fixed set of held keys, and
/// batches of events handed out one batch per poll
pub struct DummyInput {
    held: Vec<u8>,
    batches: VecDeque<Vec<InputEvent>>,
}

impl DummyInput {
    pub fn new(keys: &[u8]) -> Self {
        DummyInput {
            held: Vec::from(keys),
            batches: VecDeque::new(),
        }
    }

    /// queue up what a future poll will return
    pub fn push_poll(&mut self, events: &[InputEvent]) {
        self.batches.push_back(Vec::from(events));
    }
}

impl Input for DummyInput {
    fn poll_events(&mut self) -> Result<Vec<InputEvent>, io::Error> {
        Ok(self.batches.pop_front().unwrap_or_default())
    }

    fn is_key_pressed(&mut self, key: u8) -> Result<bool, io::Error> {
        Ok(self.held.contains(&key))
    }
}
