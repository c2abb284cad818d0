//! Interactive read-eval-print session
//!
//! One session owns one connection's streams. Turns are host-framed: raw
//! bytes up to and including a terminator byte, no line editing on our
//! side. Each turn is a goal `module:predicate(Arg)` (module defaults to
//! `user`); the argument syntax covers integers, double-quoted strings,
//! bare symbols and `[..]` lists. The goal runs through a [`QueryCursor`],
//! every solution is printed in host rendering, and the cursor is closed
//! before the next prompt.
//!
//! The session ends at end-of-stream, on the `halt.` turn, or when a
//! `halt` interrupt is signalled to the worker.

use plbridge_core::{codec, decode, HostValue, Term};
use plbridge_engine::{interrupt, Engine, QueryCursor, Step};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use tracing::{debug, warn};

const PROMPT: &[u8] = b"?- ";

/// Drive a read-eval-print session over an accepted connection until its
/// input reaches end-of-stream or a termination goal arrives. Closes both
/// stream halves before returning.
pub fn run_session(engine: Arc<dyn Engine>, stream: TcpStream) {
    let reader = match stream.try_clone() {
        Ok(input) => BufReader::new(input),
        Err(e) => {
            warn!(error = %e, "session stream not cloneable");
            let _ = stream.shutdown(Shutdown::Both);
            return;
        }
    };
    let mut writer = stream;
    serve_turns(engine, reader, &mut writer);
    let _ = writer.flush();
    let _ = writer.shutdown(Shutdown::Both);
}

fn serve_turns(engine: Arc<dyn Engine>, mut reader: BufReader<impl Read>, writer: &mut impl Write) {
    let mut frame = Vec::new();
    loop {
        if check_interrupt(writer) {
            return;
        }
        if writer.write_all(PROMPT).is_err() || writer.flush().is_err() {
            return;
        }

        frame.clear();
        match reader.read_until(b'\n', &mut frame) {
            Ok(0) => return, // end-of-stream
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "session read failed");
                return;
            }
        }

        // Host framing: the trailing delimiter byte is the terminator the
        // engine side must strip.
        let turn = match codec::string_from_host(&frame) {
            Ok(text) => text,
            Err(e) => {
                let _ = writeln!(writer, "error: {}", e);
                continue;
            }
        };
        let turn = turn.trim();
        if turn.is_empty() {
            continue;
        }
        if turn == "halt." {
            return;
        }

        match parse_goal(turn) {
            Ok((module, predicate, arg)) => {
                if run_goal(&engine, &module, &predicate, &arg, writer) {
                    return;
                }
            }
            Err(reason) => {
                let _ = writeln!(writer, "error: {}", reason);
            }
        }
    }
}

/// Run one goal to exhaustion, printing each solution. Returns true when
/// the session should terminate (halt signalled mid-goal).
fn run_goal(
    engine: &Arc<dyn Engine>,
    module: &str,
    predicate: &str,
    arg: &HostValue,
    writer: &mut impl Write,
) -> bool {
    let mut cursor = match QueryCursor::open(engine.clone(), module, module, predicate, arg) {
        Ok(cursor) => cursor,
        Err(e) => {
            let _ = writeln!(writer, "error: {}", e);
            return false;
        }
    };

    let mut halt = false;
    loop {
        match cursor.next() {
            Step::Solution { term, last } => {
                let _ = writeln!(writer, "{}", decode(&term));
                if last {
                    break;
                }
            }
            Step::Exhausted => {
                let _ = writeln!(writer, "no.");
                break;
            }
            Step::Exception(term) => {
                halt = is_halt(&term);
                let _ = writeln!(writer, "exception: {}", decode(&term));
                break;
            }
        }
    }
    // Discard bindings; the next turn starts fresh either way
    if let Some(raised) = cursor.close() {
        let _ = writeln!(writer, "exception: {}", decode(&raised));
    }
    halt
}

// A halt interrupt between turns ends the session; anything else is
// reported and the session continues.
fn check_interrupt(writer: &mut impl Write) -> bool {
    match interrupt::take_pending() {
        Some(term) if is_halt(&term) => true,
        Some(term) => {
            let _ = writeln!(writer, "interrupted: {}", decode(&term));
            false
        }
        None => false,
    }
}

fn is_halt(term: &Term) -> bool {
    matches!(term, Term::Atom(name) if name == "halt")
}

/// Parse `module:predicate(Arg)`, `predicate(Arg)` or a bare `predicate`
/// (argument defaults to nil). A trailing period is accepted.
pub fn parse_goal(text: &str) -> Result<(String, String, HostValue), String> {
    let text = text.trim().trim_end_matches('.').trim_end();
    let (name_part, arg_part) = match text.find('(') {
        Some(open) => {
            let Some(rest) = text[open..].strip_prefix('(') else {
                return Err("unbalanced parentheses".to_string());
            };
            let Some(inner) = rest.strip_suffix(')') else {
                return Err("missing closing parenthesis".to_string());
            };
            (&text[..open], Some(inner.trim()))
        }
        None => (text, None),
    };

    let (module, predicate) = match name_part.split_once(':') {
        Some((module, predicate)) => (module.trim(), predicate.trim()),
        None => ("user", name_part.trim()),
    };
    if predicate.is_empty() || !predicate.chars().all(is_name_char) {
        return Err(format!("invalid predicate name: {:?}", name_part));
    }
    if module.is_empty() || !module.chars().all(is_name_char) {
        return Err(format!("invalid module name: {:?}", module));
    }

    let arg = match arg_part {
        None | Some("") => HostValue::Nil,
        Some(src) => {
            let mut parser = ValueParser::new(src);
            let value = parser.parse_value()?;
            parser.expect_end()?;
            value
        }
    };
    Ok((module.to_string(), predicate.to_string(), arg))
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

struct ValueParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> ValueParser<'a> {
    fn new(src: &'a str) -> Self {
        ValueParser { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn parse_value(&mut self) -> Result<HostValue, String> {
        self.skip_ws();
        match self.peek() {
            None => Err("expected a value".to_string()),
            Some('[') => self.parse_list(),
            Some('"') => self.parse_string(),
            Some(c) if c == '-' || c.is_ascii_digit() => self.parse_integer(),
            Some(c) if is_name_char(c) => Ok(self.parse_symbol()),
            Some(c) => Err(format!("unexpected character {:?}", c)),
        }
    }

    fn parse_list(&mut self) -> Result<HostValue, String> {
        self.bump(); // consume '['
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(']') => {
                    self.bump();
                    return Ok(HostValue::list(items));
                }
                None => return Err("unterminated list".to_string()),
                Some(',') if !items.is_empty() => {
                    self.bump();
                }
                _ if items.is_empty() => {}
                Some(c) => return Err(format!("expected ',' or ']', found {:?}", c)),
            }
            items.push(self.parse_value()?);
        }
    }

    fn parse_string(&mut self) -> Result<HostValue, String> {
        self.bump(); // consume '"'
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err("unterminated string".to_string()),
                Some('"') => return Ok(HostValue::Str(out)),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c @ ('"' | '\\')) => out.push(c),
                    Some(c) => return Err(format!("unknown escape \\{}", c)),
                    None => return Err("unterminated escape".to_string()),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_integer(&mut self) -> Result<HostValue, String> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        self.src[start..self.pos]
            .parse::<i64>()
            .map(HostValue::Integer)
            .map_err(|e| format!("invalid integer: {}", e))
    }

    fn parse_symbol(&mut self) -> HostValue {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if is_name_char(c)) {
            self.bump();
        }
        HostValue::symbol(&self.src[start..self.pos])
    }

    fn expect_end(&mut self) -> Result<(), String> {
        self.skip_ws();
        match self.peek() {
            None => Ok(()),
            Some(c) => Err(format!("trailing input at {:?}", c)),
        }
    }
}
