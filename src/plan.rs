//! # Route plans
//!
//! A plan is what the oracle executes: a sequence of door tokens (`'0'`-`'5'`)
//! and mark tokens (`"[L]"`, `L` in `'0'`-`'3'`). A mark rewrites the label of
//! the current room for the rest of that single execution without moving.

use crate::error::{Error, Result};
use crate::graph::{NUM_DOORS, NUM_LABELS};
use rand::Rng;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    /// Take this door out of the current room.
    Door(usize),
    /// Overwrite the current room's label.
    Mark(u8),
}

impl Token {
    pub fn validate(self) -> Result<Self> {
        match self {
            Token::Door(d) if d >= NUM_DOORS => {
                Err(Error::InvalidPlan(format!("door {} out of 0..{}", d, NUM_DOORS)))
            }
            Token::Mark(l) if l >= NUM_LABELS => {
                Err(Error::InvalidPlan(format!("label {} out of 0..{}", l, NUM_LABELS)))
            }
            t => Ok(t),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Plan {
    tokens: Vec<Token>,
}

impl Plan {
    pub fn new(tokens: Vec<Token>) -> Result<Self> {
        for &t in &tokens {
            t.validate()?;
        }
        Ok(Self { tokens })
    }

    /// A plan made only of door tokens.
    pub fn from_doors(doors: &[usize]) -> Result<Self> {
        Self::new(doors.iter().map(|&d| Token::Door(d)).collect())
    }

    /// A uniformly random door-only plan of length `len`.
    pub fn random<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Self {
        Self {
            tokens: (0..len)
                .map(|_| Token::Door(rng.random_range(0..NUM_DOORS)))
                .collect(),
        }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Door indices in order, marks skipped.
    pub fn doors(&self) -> impl Iterator<Item = usize> + '_ {
        self.tokens.iter().filter_map(|t| match *t {
            Token::Door(d) => Some(d),
            Token::Mark(_) => None,
        })
    }

    /// First `len` tokens.
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            tokens: self.tokens[..len.min(self.tokens.len())].to_vec(),
        }
    }

    /// Appends random door tokens until the plan is `len` tokens long.
    pub fn extend_random<R: Rng + ?Sized>(&self, len: usize, rng: &mut R) -> Self {
        let mut tokens = self.tokens.clone();
        while tokens.len() < len {
            tokens.push(Token::Door(rng.random_range(0..NUM_DOORS)));
        }
        Self { tokens }
    }

    /// Returns a copy with a mark inserted right before the `pos`-th door token,
    /// i.e. right after the `pos`-th observation of the trace. `pos` equal to the
    /// number of doors appends the mark at the end.
    pub fn with_mark(&self, pos: usize, label: u8) -> Result<Self> {
        Token::Mark(label).validate()?;
        let at = self
            .tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| matches!(t, Token::Door(_)))
            .map(|(i, _)| i)
            .nth(pos)
            .unwrap_or(self.tokens.len());
        if at == self.tokens.len() && pos > self.doors().count() {
            return Err(Error::InvalidPlan(format!(
                "mark position {} past the end of the plan",
                pos
            )));
        }
        let mut tokens = self.tokens.clone();
        tokens.insert(at, Token::Mark(label));
        Ok(Self { tokens })
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for t in &self.tokens {
            match t {
                Token::Door(d) => write!(f, "{}", d)?,
                Token::Mark(l) => write!(f, "[{}]", l)?,
            }
        }
        Ok(())
    }
}

impl FromStr for Plan {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut tokens = vec![];
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            let token = match c {
                '[' => {
                    let label = chars.next();
                    let close = chars.next();
                    match (label.and_then(|l| l.to_digit(10)), close) {
                        (Some(l), Some(']')) => Token::Mark(l as u8),
                        _ => {
                            return Err(Error::InvalidPlan(format!(
                                "malformed mark in {:?}",
                                s
                            )));
                        }
                    }
                }
                c => match c.to_digit(10) {
                    Some(d) => Token::Door(d as usize),
                    None => {
                        return Err(Error::InvalidPlan(format!(
                            "unexpected character {:?} in {:?}",
                            c, s
                        )));
                    }
                },
            };
            tokens.push(token.validate()?);
        }
        Ok(Self { tokens })
    }
}
