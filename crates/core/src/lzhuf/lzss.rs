//! LZSS layer: ring-buffer history, binary-tree match finder, and the
//! symbol stream bridging into the adaptive Huffman coder.

use super::bitio::{BitReader, BitWriter};
use super::huffman::{HuffTree, PositionCoder};
use super::{F, N, THRESHOLD};

const NIL: usize = N;

/// Compresses `input` into an LZHUF code stream (no preamble).
pub(super) fn encode(input: &[u8]) -> Vec<u8> {
    let mut bw = BitWriter::new();
    if input.is_empty() {
        return bw.finish();
    }
    let mut tree = HuffTree::new();
    let positions = PositionCoder::new();
    let mut mf = MatchFinder::new();

    let mut s = 0usize;
    let mut r = N - F;
    let mut len = input.len().min(F);
    mf.text[r..r + len].copy_from_slice(&input[..len]);
    let mut next = len;
    for i in 1..=F {
        mf.insert_node(r - i);
    }
    mf.insert_node(r);

    loop {
        let mut match_length = mf.match_length.min(len);
        if match_length <= THRESHOLD {
            match_length = 1;
            tree.encode_char(&mut bw, mf.text[r] as usize);
        } else {
            tree.encode_char(&mut bw, 255 - THRESHOLD + match_length);
            positions.encode_position(&mut bw, mf.match_position as u16);
        }
        let last_match_length = match_length;

        let mut i = 0;
        while i < last_match_length && next < input.len() {
            let c = input[next];
            next += 1;
            mf.delete_node(s);
            mf.text[s] = c;
            if s < F - 1 {
                // Mirror the window head so lookahead comparisons can run
                // past the wrap point without masking.
                mf.text[s + N] = c;
            }
            s = (s + 1) & (N - 1);
            r = (r + 1) & (N - 1);
            mf.insert_node(r);
            i += 1;
        }
        while i < last_match_length {
            i += 1;
            mf.delete_node(s);
            s = (s + 1) & (N - 1);
            r = (r + 1) & (N - 1);
            len -= 1;
            if len > 0 {
                mf.insert_node(r);
            }
        }
        if len == 0 {
            break;
        }
    }
    bw.finish()
}

/// Expands a code stream back into `out_len` original bytes.
pub(super) fn decode(stream: &[u8], out_len: usize) -> Result<Vec<u8>, &'static str> {
    let mut out = Vec::with_capacity(out_len);
    if out_len == 0 {
        return Ok(out);
    }
    let mut tree = HuffTree::new();
    let positions = PositionCoder::new();
    let mut br = BitReader::new(stream);
    let mut text = vec![0x20u8; N];
    let mut r = N - F;

    while out.len() < out_len {
        let c = tree.decode_char(&mut br).ok_or("truncated code stream")?;
        if c < 256 {
            out.push(c as u8);
            text[r] = c as u8;
            r = (r + 1) & (N - 1);
        } else {
            let pos = positions
                .decode_position(&mut br)
                .ok_or("truncated code stream")? as usize;
            let i = (r + N - pos - 1) & (N - 1);
            let count = c as usize + THRESHOLD - 255;
            for k in 0..count {
                let ch = text[(i + k) & (N - 1)];
                out.push(ch);
                text[r] = ch;
                r = (r + 1) & (N - 1);
            }
        }
    }
    // The final match may run a byte or two past the declared length.
    out.truncate(out_len);
    Ok(out)
}

struct MatchFinder {
    text: Vec<u8>,
    lson: Vec<usize>,
    rson: Vec<usize>,
    dad: Vec<usize>,
    match_position: usize,
    match_length: usize,
}

impl MatchFinder {
    fn new() -> MatchFinder {
        // rson[N + 1 ..= N + 256] are the 256 per-first-byte tree roots;
        // index N is the NIL sentinel slot.
        MatchFinder {
            text: vec![0x20; N + F - 1],
            lson: vec![NIL; N + 1],
            rson: vec![NIL; N + 257],
            dad: vec![NIL; N + 1],
            match_position: 0,
            match_length: 0,
        }
    }

    /// Inserts the F-byte string starting at `r` and records the longest
    /// match against the current history in `match_position`/`match_length`.
    fn insert_node(&mut self, r: usize) {
        let mut cmp: i32 = 1;
        let mut p = N + 1 + self.text[r] as usize;
        self.rson[r] = NIL;
        self.lson[r] = NIL;
        self.match_length = 0;
        loop {
            if cmp >= 0 {
                if self.rson[p] != NIL {
                    p = self.rson[p];
                } else {
                    self.rson[p] = r;
                    self.dad[r] = p;
                    return;
                }
            } else if self.lson[p] != NIL {
                p = self.lson[p];
            } else {
                self.lson[p] = r;
                self.dad[r] = p;
                return;
            }
            let mut i = 1;
            while i < F {
                cmp = i32::from(self.text[r + i]) - i32::from(self.text[p + i]);
                if cmp != 0 {
                    break;
                }
                i += 1;
            }
            if i > self.match_length {
                self.match_position = ((r + N - p) & (N - 1)) - 1;
                self.match_length = i;
                if i >= F {
                    break;
                }
            }
        }
        // Full-length match: r supersedes p in the tree.
        self.dad[r] = self.dad[p];
        self.lson[r] = self.lson[p];
        self.rson[r] = self.rson[p];
        let lp = self.lson[p];
        let rp = self.rson[p];
        self.dad[lp] = r;
        self.dad[rp] = r;
        let dp = self.dad[p];
        if self.rson[dp] == p {
            self.rson[dp] = r;
        } else {
            self.lson[dp] = r;
        }
        self.dad[p] = NIL;
    }

    /// Removes the string at `p` from the tree before its window slot is
    /// overwritten.
    fn delete_node(&mut self, p: usize) {
        if self.dad[p] == NIL {
            return;
        }
        let q;
        if self.rson[p] == NIL {
            q = self.lson[p];
        } else if self.lson[p] == NIL {
            q = self.rson[p];
        } else {
            let mut t = self.lson[p];
            if self.rson[t] != NIL {
                while self.rson[self.rson[t]] != NIL {
                    t = self.rson[t];
                }
                t = self.rson[t];
                let dt = self.dad[t];
                self.rson[dt] = self.lson[t];
                let lt = self.lson[t];
                self.dad[lt] = dt;
                self.lson[t] = self.lson[p];
                let lp = self.lson[p];
                self.dad[lp] = t;
            }
            q = t;
            self.rson[q] = self.rson[p];
            let rp = self.rson[p];
            self.dad[rp] = q;
        }
        self.dad[q] = self.dad[p];
        let dp = self.dad[p];
        if self.rson[dp] == p {
            self.rson[dp] = q;
        } else {
            self.lson[dp] = q;
        }
        self.dad[p] = NIL;
    }
}
