//! Local line editor for the pipeline shell client.
//!
//! The terminal is in raw mode, so every keystroke arrives as bytes with no
//! local echo. This state machine buffers a command line, echoes the edits
//! itself (insert with tail redraw, backspace, arrow-key cursor movement)
//! and hands back completed lines on Enter. It is a byte-at-a-time machine
//! so escape sequences split across reads still parse.

/// Escape-sequence scanning state.
#[derive(Debug, Clone, Copy, PartialEq)]
enum EditState {
    Normal,
    Escape, // saw ESC
    Csi,    // saw ESC [
}

pub struct LineEditor {
    buffer: Vec<u8>,
    cursor: usize,
    state: EditState,
}

impl LineEditor {
    pub fn new() -> Self {
        LineEditor {
            buffer: Vec::new(),
            cursor: 0,
            state: EditState::Normal,
        }
    }

    /// Feed raw input bytes. Returns the bytes to echo locally and any
    /// completed command lines.
    pub fn process_bytes(&mut self, input: &[u8]) -> (Vec<u8>, Vec<String>) {
        let mut echo = Vec::new();
        let mut lines = Vec::new();

        for &byte in input {
            match self.state {
                EditState::Normal => self.process_normal(byte, &mut echo, &mut lines),
                EditState::Escape => {
                    if byte == b'[' {
                        self.state = EditState::Csi;
                    } else {
                        // Not a CSI sequence; drop it.
                        self.state = EditState::Normal;
                    }
                }
                EditState::Csi => {
                    match byte {
                        b'D' => {
                            // Left arrow
                            if self.cursor > 0 {
                                self.cursor -= 1;
                                echo.push(b'\x08');
                            }
                        }
                        b'C' => {
                            // Right arrow
                            if self.cursor < self.buffer.len() {
                                self.cursor += 1;
                                echo.extend_from_slice(b"\x1b[C");
                            }
                        }
                        _ => {} // other sequences are ignored
                    }
                    self.state = EditState::Normal;
                }
            }
        }

        (echo, lines)
    }

    fn process_normal(&mut self, byte: u8, echo: &mut Vec<u8>, lines: &mut Vec<String>) {
        match byte {
            b'\r' | b'\n' => {
                echo.push(b'\n');
                lines.push(String::from_utf8_lossy(&self.buffer).into_owned());
                self.buffer.clear();
                self.cursor = 0;
            }
            0x7f => {
                // Backspace
                if self.cursor > 0 {
                    self.buffer.remove(self.cursor - 1);
                    self.cursor -= 1;
                    echo.extend_from_slice(b"\x08 \x08");
                }
            }
            0x1b => {
                self.state = EditState::Escape;
            }
            _ => {
                self.buffer.insert(self.cursor, byte);
                self.cursor += 1;
                echo.push(byte);
                if self.cursor < self.buffer.len() {
                    // Redraw the tail, then park the cursor back at the
                    // insertion point.
                    echo.extend_from_slice(&self.buffer[self.cursor..]);
                    for _ in self.cursor..self.buffer.len() {
                        echo.push(b'\x08');
                    }
                }
            }
        }
    }
}

impl Default for LineEditor {
    fn default() -> Self {
        LineEditor::new()
    }
}
