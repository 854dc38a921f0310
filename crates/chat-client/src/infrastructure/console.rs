//! Terminal adapters: stdin as a [`LineSource`], stdout as a [`MessageSink`].

use std::io::{self, BufRead, Write};

use chat_core::ChatMessage;

use crate::application::display::{format_line, MessageSink};
use crate::application::send_messages::LineSource;

/// Line source over any buffered reader: the terminal, or a script of lines.
#[derive(Debug)]
pub struct LineReader<R> {
    input: R,
}

/// User input from the process's standard input.
pub type StdinLineSource = LineReader<io::BufReader<io::Stdin>>;

impl<R: BufRead + Send> LineReader<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }
}

impl LineReader<io::BufReader<io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(io::BufReader::new(io::stdin()))
    }
}

impl<R: BufRead + Send> LineSource for LineReader<R> {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        match self.input.read_line(&mut line)? {
            0 => Ok(None),
            _ => Ok(Some(line)),
        }
    }
}

/// Writes one formatted line per message.
#[derive(Debug)]
pub struct ConsoleRenderer<W> {
    out: W,
}

impl ConsoleRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsoleRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> MessageSink for ConsoleRenderer<W> {
    fn render(&mut self, message: &ChatMessage, own_ip: &str) -> io::Result<()> {
        writeln!(self.out, "{}", format_line(message, own_ip))?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_line_reader_yields_lines_then_none() {
        let mut source = LineReader::new(Cursor::new("one\ntwo\n"));

        assert_eq!(source.read_line().unwrap().as_deref(), Some("one\n"));
        assert_eq!(source.read_line().unwrap().as_deref(), Some("two\n"));
        assert_eq!(source.read_line().unwrap(), None);
    }

    #[test]
    fn test_renderer_writes_one_line_per_message() {
        // Arrange
        let mut renderer = ConsoleRenderer::new(Vec::new());
        let mut message = ChatMessage::new("10.0.0.3", "carl", "hey");
        message.timestamp = "09:00:00".to_string();

        // Act
        renderer.render(&message, "10.0.0.3").unwrap();
        renderer.render(&message, "10.0.0.4").unwrap();

        // Assert
        let out = String::from_utf8(renderer.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("[carl ] >> hey"));
        assert!(lines[1].contains("[carl ] << hey"));
    }
}
