//! Lexical analysis (tokenization) of a single command line.
//!
//! A line is split into argument tokens on unquoted whitespace. Quoting follows
//! the usual shell conventions:
//! - inside single quotes every character is taken literally, backslash included;
//! - inside double quotes a backslash escapes only `"`, `\` and `$`, any other
//!   character after it keeps the backslash;
//! - outside quotes a backslash escapes whatever character follows it.
//!
//! Quote characters themselves never reach the output, and fragments written
//! next to each other (`'ab'cd"ef"`) join into one token.

use log::debug;

const ESCAPE: char = '\\';
const SINGLE_QUOTE: char = '\'';
const DOUBLE_QUOTE: char = '"';

/// Quoting context a backslash was read in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeContext {
    Unquoted,
    DoubleQuote,
}

/// State of the tokenizer between two input characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexingState {
    /// Outside any quotes.
    Unquoted,
    /// After an opening `'`.
    InSingleQuote,
    /// After an opening `"`.
    InDoubleQuote,
    /// Right after a backslash; the next character decides what it means.
    PendingEscape(EscapeContext),
}

/// What to do with the character that caused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Consume the character, produce nothing.
    Skip,
    /// Append the character to the current token.
    Push(char),
    /// Append a backslash and then the character.
    PushEscaped(char),
    /// Close the current token if it holds any text.
    EndToken,
}

/// Transition table of the tokenizer.
///
/// Given the current state and the next input character, returns the state to
/// move to and the action to apply to the token being built.
pub fn transition(state: LexingState, ch: char) -> (LexingState, Action) {
    use LexingState::*;

    match (state, ch) {
        (Unquoted, ESCAPE) => (PendingEscape(EscapeContext::Unquoted), Action::Skip),
        (Unquoted, SINGLE_QUOTE) => (InSingleQuote, Action::Skip),
        (Unquoted, DOUBLE_QUOTE) => (InDoubleQuote, Action::Skip),
        (Unquoted, c) if c.is_whitespace() => (Unquoted, Action::EndToken),
        (Unquoted, c) => (Unquoted, Action::Push(c)),

        (InSingleQuote, SINGLE_QUOTE) => (Unquoted, Action::Skip),
        (InSingleQuote, c) => (InSingleQuote, Action::Push(c)),

        (InDoubleQuote, ESCAPE) => (PendingEscape(EscapeContext::DoubleQuote), Action::Skip),
        (InDoubleQuote, DOUBLE_QUOTE) => (Unquoted, Action::Skip),
        (InDoubleQuote, c) => (InDoubleQuote, Action::Push(c)),

        (PendingEscape(EscapeContext::Unquoted), c) => (Unquoted, Action::Push(c)),
        (PendingEscape(EscapeContext::DoubleQuote), c @ (DOUBLE_QUOTE | ESCAPE | '$')) => {
            (InDoubleQuote, Action::Push(c))
        }
        (PendingEscape(EscapeContext::DoubleQuote), c) => (InDoubleQuote, Action::PushEscaped(c)),
    }
}

struct LexingFSM<'a> {
    input: std::str::Chars<'a>,
    state: LexingState,
    buffer: String,
    tokens: Vec<String>,
}

impl<'a> LexingFSM<'a> {
    fn new(line: &'a str) -> Self {
        LexingFSM {
            input: line.chars(),
            state: LexingState::Unquoted,
            buffer: String::new(),
            tokens: Vec::new(),
        }
    }

    fn make_tokens(mut self) -> Vec<String> {
        while let Some(ch) = self.input.next() {
            let (next, action) = transition(self.state, ch);
            self.apply(action);
            self.state = next;
        }
        self.finish()
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::Skip => {}
            Action::Push(c) => self.buffer.push(c),
            Action::PushEscaped(c) => {
                self.buffer.push(ESCAPE);
                self.buffer.push(c);
            }
            Action::EndToken => self.end_token(),
        }
    }

    fn end_token(&mut self) {
        if !self.buffer.is_empty() {
            self.tokens.push(std::mem::take(&mut self.buffer));
        }
    }

    /// Malformed endings are accepted: whatever was collected becomes the last token.
    fn finish(mut self) -> Vec<String> {
        match self.state {
            LexingState::PendingEscape(_) => self.buffer.push(ESCAPE),
            LexingState::InSingleQuote | LexingState::InDoubleQuote => {
                debug!("unterminated quote, keeping {:?}", self.buffer);
            }
            LexingState::Unquoted => {}
        }
        self.end_token();
        self.tokens
    }
}

/// Split a command line into tokens.
///
/// The first token, if any, is the command name. Never fails: an empty or
/// blank line gives an empty vector, and unterminated quotes are closed at
/// the end of the line.
pub fn split_into_tokens(line: &str) -> Vec<String> {
    LexingFSM::new(line).make_tokens()
}
