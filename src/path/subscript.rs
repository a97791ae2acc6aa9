//! Array subscript validation.
//!
//! Accepts exactly the subscript forms the SQL/JSON path language understands:
//! - `*`
//! - a single index `N`
//! - a range `N to M` (with `M >= N`)
//! - comma-separated lists of indexes and ranges
//!
//! Whitespace is tolerated around every token and dropped from the normalised form.
//! The `to` keyword must have whitespace on both sides.

use std::fmt;

/// One entry of a subscript list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptItem {
    Index(u64),
    Range(u64, u64),
}

/// A validated array subscript, the text between `[` and `]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArraySubscript {
    All,
    List(Vec<SubscriptItem>),
}

impl ArraySubscript {
    /// Validate subscript text. Returns `None` when the text is malformed.
    pub fn parse(text: &str) -> Option<Self> {
        SubscriptScanner::default().run(text)
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, ArraySubscript::All)
    }
}

impl fmt::Display for ArraySubscript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArraySubscript::All => f.write_str("[*]"),
            ArraySubscript::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    match item {
                        SubscriptItem::Index(n) => write!(f, "{}", n)?,
                        SubscriptItem::Range(lo, hi) => write!(f, "{} to {}", lo, hi)?,
                    }
                }
                f.write_str("]")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Star,
    Index,
    AfterIndex,
    T,
    To,
    RangeGap,
    RangeEnd,
    AfterRangeEnd,
    Comma,
}

#[derive(Default)]
struct SubscriptScanner {
    items: Vec<SubscriptItem>,
    digits: String,
    range_start: Option<u64>,
}

impl SubscriptScanner {
    fn run(mut self, text: &str) -> Option<ArraySubscript> {
        let mut state = State::Start;

        for ch in text.chars() {
            state = match (state, ch) {
                (State::Start, c) if c.is_whitespace() => State::Start,
                (State::Start, '*') => State::Star,
                (State::Start, c) if c.is_ascii_digit() => self.digit(c, State::Index),

                (State::Star, c) if c.is_whitespace() => State::Star,

                (State::Index, c) if c.is_ascii_digit() => self.digit(c, State::Index),
                (State::Index, c) if c.is_whitespace() => self.end_index(State::AfterIndex)?,
                (State::Index, ',') => {
                    let next = self.end_index(State::Comma)?;
                    self.finish_index()?;
                    next
                }

                (State::AfterIndex, c) if c.is_whitespace() => State::AfterIndex,
                (State::AfterIndex, ',') => {
                    self.finish_index()?;
                    State::Comma
                }
                (State::AfterIndex, 't') => State::T,

                (State::T, 'o') => State::To,

                (State::To, c) if c.is_whitespace() => State::RangeGap,

                (State::RangeGap, c) if c.is_whitespace() => State::RangeGap,
                (State::RangeGap, c) if c.is_ascii_digit() => self.digit(c, State::RangeEnd),

                (State::RangeEnd, c) if c.is_ascii_digit() => self.digit(c, State::RangeEnd),
                (State::RangeEnd, c) if c.is_whitespace() => {
                    self.finish_range()?;
                    State::AfterRangeEnd
                }
                (State::RangeEnd, ',') => {
                    self.finish_range()?;
                    State::Comma
                }

                (State::AfterRangeEnd, c) if c.is_whitespace() => State::AfterRangeEnd,
                (State::AfterRangeEnd, ',') => State::Comma,

                (State::Comma, c) if c.is_whitespace() => State::Comma,
                (State::Comma, c) if c.is_ascii_digit() => self.digit(c, State::Index),

                _ => return None,
            };
        }

        match state {
            State::Star => Some(ArraySubscript::All),
            State::Index => {
                self.end_index(State::AfterIndex)?;
                self.finish_index()?;
                Some(ArraySubscript::List(self.items))
            }
            State::AfterIndex => {
                self.finish_index()?;
                Some(ArraySubscript::List(self.items))
            }
            State::RangeEnd => {
                self.finish_range()?;
                Some(ArraySubscript::List(self.items))
            }
            State::AfterRangeEnd => Some(ArraySubscript::List(self.items)),
            _ => None,
        }
    }

    fn digit(&mut self, c: char, next: State) -> State {
        self.digits.push(c);
        next
    }

    fn take_number(&mut self) -> Option<u64> {
        let n = self.digits.parse::<u64>().ok();
        self.digits.clear();
        n
    }

    /// Close the digits of an index that may still become the start of a range.
    fn end_index(&mut self, next: State) -> Option<State> {
        if !self.digits.is_empty() {
            self.range_start = Some(self.take_number()?);
        }
        Some(next)
    }

    fn finish_index(&mut self) -> Option<()> {
        let n = self.range_start.take()?;
        self.items.push(SubscriptItem::Index(n));
        Some(())
    }

    fn finish_range(&mut self) -> Option<()> {
        let lo = self.range_start.take()?;
        let hi = self.take_number()?;
        if hi < lo {
            return None;
        }
        self.items.push(SubscriptItem::Range(lo, hi));
        Some(())
    }
}
