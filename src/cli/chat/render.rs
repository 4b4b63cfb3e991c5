use std::io::{self, Write};

use color_print::cformat;
use crossterm::cursor::{MoveTo, MoveToColumn};
use crossterm::style::{Color, ResetColor, SetForegroundColor};
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::queue;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::cli::chat::conversation_state::ConversationLog;
use crate::qa_client::ConversationEntry;

const DEFAULT_WIDTH: usize = 80;
const MIN_TEXT_WIDTH: usize = 10;
const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Author {
    User,
    Assistant,
}

impl Author {
    fn label(self) -> &'static str {
        match self {
            Author::User => "You",
            Author::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bubble<'a> {
    pub author: Author,
    pub text: &'a str,
    pub time: Option<String>,
}

/// Two bubbles per entry, question first, in log order.
pub fn bubbles(entries: &[ConversationEntry]) -> Vec<Bubble<'_>> {
    entries
        .iter()
        .flat_map(|entry| {
            let time = entry.timestamp.map(|t| t.format("%H:%M").to_string());
            [
                Bubble {
                    author: Author::User,
                    text: entry.question.as_str(),
                    time: time.clone(),
                },
                Bubble {
                    author: Author::Assistant,
                    text: entry.answer.as_str(),
                    time,
                },
            ]
        })
        .collect()
}

/// Lay a bubble out for a terminal `width` columns wide.
///
/// Bubbles take at most 60% of the width. User bubbles hug the right edge,
/// assistant bubbles the left one.
pub fn format_bubble(bubble: &Bubble<'_>, width: usize) -> String {
    let max_text = (width * 3 / 5).saturating_sub(4).max(MIN_TEXT_WIDTH);
    let lines = wrap(bubble.text, max_text);
    let text_width = lines.iter().map(|l| l.width()).max().unwrap_or(0);
    let box_width = text_width + 4;

    let header = match &bubble.time {
        Some(time) => format!("{} · {}", bubble.author.label(), time),
        None => bubble.author.label().to_string(),
    };

    let (box_indent, header_indent) = match bubble.author {
        Author::User => (
            width.saturating_sub(box_width),
            width.saturating_sub(header.width()),
        ),
        Author::Assistant => (0, 0),
    };
    let pad = " ".repeat(box_indent);

    let mut out = Vec::with_capacity(lines.len() + 3);
    out.push(format!("{}{}", " ".repeat(header_indent), header));
    out.push(format!("{}╭{}╮", pad, "─".repeat(text_width + 2)));
    for line in &lines {
        let fill = text_width - line.width();
        out.push(format!("{}│ {}{} │", pad, line, " ".repeat(fill)));
    }
    out.push(format!("{}╰{}╯", pad, "─".repeat(text_width + 2)));
    out.join("\n")
}

/// Greedy word wrap measured in terminal columns. Explicit newlines are
/// kept and words wider than `max` are split.
pub fn wrap(text: &str, max: usize) -> Vec<String> {
    let max = max.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();

        for word in paragraph.split_whitespace() {
            for piece in split_to_width(word, max) {
                let current_width = current.width();
                if current_width > 0 && current_width + 1 + piece.width() > max {
                    lines.push(std::mem::take(&mut current));
                }
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(&piece);
            }
        }

        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn split_to_width(word: &str, max: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut piece_width = 0;

    for c in word.chars() {
        let char_width = c.width().unwrap_or(0);
        if piece_width + char_width > max && !piece.is_empty() {
            pieces.push(std::mem::take(&mut piece));
            piece_width = 0;
        }
        piece.push(c);
        piece_width += char_width;
    }

    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

pub fn terminal_width() -> usize {
    terminal::size()
        .map(|(cols, _)| cols as usize)
        .unwrap_or(DEFAULT_WIDTH)
}

/// Redraws the conversation whenever the log has changed since the last call.
///
/// A replaced log (new generation) is drawn from scratch; an appended one only
/// gets its new bubbles. Either way the newest bubble ends up on the last
/// lines of the terminal.
pub struct Renderer {
    rendered: Option<(u64, usize)>,
    clear_screen: bool,
    width: Option<usize>,
}

impl Renderer {
    pub fn new(clear_screen: bool) -> Self {
        Self {
            rendered: None,
            clear_screen,
            width: None,
        }
    }

    #[cfg(test)]
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }

    pub fn refresh<W: Write>(&mut self, out: &mut W, log: &ConversationLog) -> io::Result<()> {
        let width = self.width.unwrap_or_else(terminal_width);

        let start = match self.rendered {
            Some((generation, len)) if generation == log.generation() && len <= log.len() => len,
            _ => {
                self.draw_header(out, log)?;
                0
            }
        };

        for bubble in bubbles(&log.entries()[start..]) {
            write_bubble(out, &bubble, width)?;
        }

        self.rendered = Some((log.generation(), log.len()));
        out.flush()
    }

    fn draw_header<W: Write>(&self, out: &mut W, log: &ConversationLog) -> io::Result<()> {
        if self.clear_screen {
            queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;
        }
        writeln!(out, "{}", cformat!("<bold><blue>Healthcare Conversational Agent</></>"))?;
        if log.is_empty() {
            writeln!(out, "{}", cformat!("<dim>No previous conversations.</>"))?;
        }
        writeln!(out)
    }
}

fn write_bubble<W: Write>(out: &mut W, bubble: &Bubble<'_>, width: usize) -> io::Result<()> {
    let color = match bubble.author {
        Author::User => Color::Green,
        Author::Assistant => Color::Reset,
    };
    queue!(out, SetForegroundColor(color))?;
    writeln!(out, "{}", format_bubble(bubble, width))?;
    queue!(out, ResetColor)?;
    writeln!(out)
}

pub fn draw_spinner<W: Write>(out: &mut W, frame: usize) -> io::Result<()> {
    queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
    write!(
        out,
        "{} Fetching answer...",
        SPINNER_FRAMES[frame % SPINNER_FRAMES.len()]
    )?;
    out.flush()
}

pub fn clear_spinner<W: Write>(out: &mut W) -> io::Result<()> {
    queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
    out.flush()
}

pub fn write_notice<W: Write>(out: &mut W, message: &str) -> io::Result<()> {
    writeln!(out, "{}", cformat!("<bold><yellow>! {}</></>", message))?;
    out.flush()
}
