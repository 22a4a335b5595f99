//! Double-buffer line reader.
//!
//! `LineWindow` presents an arbitrary byte stream as whole lines without a
//! per-line allocation. The caller (the I/O source) writes into the tail
//! slice handed back by [`LineWindow::buffer`], reports how much it wrote via
//! [`LineWindow::update`], and pulls completed lines with
//! [`LineWindow::getline`]. Two same-sized regions sit back to back in one
//! allocation so a line that straddles the boundary is still one contiguous
//! slice; `rotate` copies the unread tail back to the front once the read
//! cursor has crossed into the second region, which `buffer()` does
//! automatically before handing out a new write target.
//!
//! The Rust borrow checker gives the "a view from `getline` stays valid
//! until the next mutating call" invariant for free: `getline` borrows
//! `&mut self` and returns a slice tied to that borrow, so the compiler
//! refuses a second mutating call while the line is still held.

const DEFAULT_REGION_SIZE: usize = 8 * 1024;

pub struct LineWindow {
    buf: Vec<u8>,
    region_size: usize,
    /// First unread byte.
    start: usize,
    /// One past the last byte written.
    end: usize,
    eof: bool,
}

impl Default for LineWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl LineWindow {
    pub fn new() -> Self {
        Self::with_region_size(DEFAULT_REGION_SIZE)
    }

    pub fn with_region_size(region_size: usize) -> Self {
        let region_size = region_size.max(64);
        Self {
            buf: vec![0u8; region_size * 2],
            region_size,
            start: 0,
            end: 0,
            eof: false,
        }
    }

    /// Writable tail slice the producer should fill, then report via
    /// [`update`](Self::update). Rotates or grows first if needed.
    pub fn buffer(&mut self) -> &mut [u8] {
        self.rotate();
        if self.available() == 0 {
            self.grow();
        }
        &mut self.buf[self.end..]
    }

    /// Bytes available in the writable tail without growing or rotating.
    pub fn available(&self) -> usize {
        self.buf.len() - self.end
    }

    /// Producer reports `n` bytes were just written into the slice handed
    /// out by `buffer()`.
    pub fn update(&mut self, n: usize) {
        assert!(self.end + n <= self.buf.len(), "update beyond buffer end");
        self.end += n;
    }

    /// Marks that the producer has no more bytes to deliver.
    pub fn set_eof(&mut self) {
        self.eof = true;
    }

    pub fn eof(&self) -> bool {
        self.eof && self.start == self.end
    }

    /// If the read cursor has crossed into the second region, copies the
    /// live tail down to the start of the first region.
    pub fn rotate(&mut self) {
        if self.start < self.region_size {
            return;
        }
        let live = self.end - self.start;
        self.buf.copy_within(self.start..self.end, 0);
        self.start = 0;
        self.end = live;
    }

    /// Doubles the region size, preserving unread bytes, for a line longer
    /// than the current region.
    fn grow(&mut self) {
        let live = self.end - self.start;
        let new_region = self.region_size * 2;
        let mut new_buf = vec![0u8; new_region * 2];
        new_buf[..live].copy_from_slice(&self.buf[self.start..self.end]);
        self.buf = new_buf;
        self.region_size = new_region;
        self.start = 0;
        self.end = live;
    }

    /// Returns the next whole line (including its terminator), or `None` if
    /// no whole line is buffered yet — the caller should write more via
    /// `buffer()`/`update()` and try again, unless `eof()` is reachable, in
    /// which case any remaining unterminated bytes are returned once as a
    /// final line.
    pub fn getline(&mut self) -> Option<&[u8]> {
        let window = &self.buf[self.start..self.end];
        if let Some(pos) = window.iter().position(|&b| b == b'\n') {
            let line_start = self.start;
            let line_end = self.start + pos + 1;
            self.start = line_end;
            return Some(&self.buf[line_start..line_end]);
        }
        if self.eof && self.start < self.end {
            let line_start = self.start;
            let line_end = self.end;
            self.start = self.end;
            return Some(&self.buf[line_start..line_end]);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(win: &mut LineWindow, bytes: &[u8]) {
        let dst = win.buffer();
        let n = bytes.len().min(dst.len());
        dst[..n].copy_from_slice(&bytes[..n]);
        win.update(n);
        assert_eq!(n, bytes.len(), "test chunk must fit in one buffer() call");
    }

    #[test]
    fn delivers_whole_lines_across_writes() {
        let mut win = LineWindow::new();
        feed(&mut win, b"line1");
        assert!(win.getline().is_none());
        feed(&mut win, b"\nline2\n");
        assert_eq!(win.getline().unwrap(), b"line1\n");
        assert_eq!(win.getline().unwrap(), b"line2\n");
        assert!(win.getline().is_none());
    }

    #[test]
    fn eof_flushes_trailing_partial_line() {
        let mut win = LineWindow::new();
        feed(&mut win, b"partial no newline");
        assert!(win.getline().is_none());
        win.set_eof();
        assert_eq!(win.getline().unwrap(), b"partial no newline");
        assert!(win.getline().is_none());
        assert!(win.eof());
    }

    #[test]
    fn concatenating_lines_reconstructs_stream() {
        let mut win = LineWindow::with_region_size(64);
        let original = b"alpha\nbeta\ngamma\ndelta\nepsilon\n".to_vec();
        let mut offset = 0;
        let mut out = Vec::new();
        loop {
            if offset < original.len() {
                let dst = win.buffer();
                let n = (original.len() - offset).min(dst.len());
                dst[..n].copy_from_slice(&original[offset..offset + n]);
                win.update(n);
                offset += n;
                if offset == original.len() {
                    win.set_eof();
                }
            }
            match win.getline() {
                Some(line) => out.extend_from_slice(line),
                None => {
                    if offset >= original.len() {
                        break;
                    }
                }
            }
            if win.eof() {
                break;
            }
        }
        assert_eq!(out, original);
    }

    #[test]
    fn line_longer_than_region_triggers_growth() {
        let mut win = LineWindow::with_region_size(8);
        feed(&mut win, b"short\n");
        assert_eq!(win.getline().unwrap(), b"short\n");

        let long_line: Vec<u8> = std::iter::repeat(b'x').take(40).chain([b'\n']).collect();
        let mut pos = 0;
        while pos < long_line.len() {
            let dst = win.buffer();
            let n = (long_line.len() - pos).min(dst.len());
            dst[..n].copy_from_slice(&long_line[pos..pos + n]);
            win.update(n);
            pos += n;
        }
        assert_eq!(win.getline().unwrap(), long_line.as_slice());
    }
}
