//! Named bit-flag algebra with derived flags.
//!
//! Primitive flags get one bit each, assigned in first-seen order. Derived
//! flags are built from boolean expressions over already-defined names
//! (`&`, `|`, `^`, `~`, parentheses, plus the reserved names `ALL`/`ANY`
//! and `NO`/`NONE`) and are resolved once, at configuration load, by
//! [`FlagSet::resolve_all`]. The result is a set of immutable [`Flag`]
//! values; expressions are parsed, never executed.

use core::ops::{BitAnd, BitOr, BitXor, Not};

use heapless::Vec;

/// Max number of primitive and derived flags in one [`FlagSet`].
pub const FLAG_MAX_NUM: usize = 32;

/// An opaque bitmask with a display name. Two flags are equal iff their
/// bitmasks are equal; the name is ignored.
#[derive(Debug, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Flag {
    name: &'static str,
    bits: u32,
}

impl Flag {
    pub const fn named(name: &'static str, bits: u32) -> Self {
        Self { name, bits }
    }

    pub const fn bits(&self) -> u32 {
        self.bits
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// `self` is satisfied by `other` when every bit of `other` is set in
    /// `self`.
    pub const fn contains(&self, other: Flag) -> bool {
        self.bits & other.bits == other.bits
    }
}

impl PartialEq for Flag {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl Eq for Flag {}

impl BitOr for Flag {
    type Output = Flag;

    fn bitor(self, rhs: Flag) -> Flag {
        Flag::named("", self.bits | rhs.bits)
    }
}

impl BitAnd for Flag {
    type Output = Flag;

    fn bitand(self, rhs: Flag) -> Flag {
        Flag::named("", self.bits & rhs.bits)
    }
}

impl BitXor for Flag {
    type Output = Flag;

    fn bitxor(self, rhs: Flag) -> Flag {
        Flag::named("", self.bits ^ rhs.bits)
    }
}

impl Not for Flag {
    type Output = Flag;

    fn not(self) -> Flag {
        Flag::named("", !self.bits)
    }
}

/// All bits set; satisfied by every flag.
pub const ALL: Flag = Flag::named("ALL", u32::MAX);
/// No bits set; satisfied by no flag.
pub const NONE: Flag = Flag::named("NONE", 0);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlagError {
    /// A derived expression references a name outside the set, or one that
    /// is itself not resolved yet.
    UnresolvedReference(&'static str),
    DuplicateName(&'static str),
    TooManyFlags,
    /// The expression could not be parsed.
    InvalidExpression(&'static str),
}

#[derive(Debug)]
struct Entry {
    name: &'static str,
    expr: Option<&'static str>,
    bits: Option<u32>,
}

/// Registry of named flags, filled at configuration time.
#[derive(Debug, Default)]
pub struct FlagSet {
    entries: Vec<Entry, FLAG_MAX_NUM>,
    next_bit: u32,
}

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a primitive flag, reserving the next free bit.
    pub fn define(&mut self, name: &'static str) -> Result<Flag, FlagError> {
        self.check_free(name)?;
        if self.next_bit >= 32 {
            return Err(FlagError::TooManyFlags);
        }
        let bits = 1 << self.next_bit;
        self.next_bit += 1;
        self.entries
            .push(Entry {
                name,
                expr: None,
                bits: Some(bits),
            })
            .map_err(|_| FlagError::TooManyFlags)?;
        Ok(Flag::named(name, bits))
    }

    /// Record a derived flag. Its bitmask is computed by [`resolve_all`].
    ///
    /// [`resolve_all`]: FlagSet::resolve_all
    pub fn derive(&mut self, name: &'static str, expr: &'static str) -> Result<(), FlagError> {
        self.check_free(name)?;
        self.entries
            .push(Entry {
                name,
                expr: Some(expr),
                bits: None,
            })
            .map_err(|_| FlagError::TooManyFlags)
    }

    /// Resolve every derived flag, in declaration order. Primitive flags
    /// were numbered when defined, so an expression may reference any
    /// primitive and any earlier-resolved derived flag. Idempotent: entries
    /// that already have a bitmask are skipped.
    pub fn resolve_all(&mut self) -> Result<(), FlagError> {
        for i in 0..self.entries.len() {
            if self.entries[i].bits.is_some() {
                continue;
            }
            let Some(expr) = self.entries[i].expr else {
                continue;
            };
            let bits = self.eval(expr)?;
            self.entries[i].bits = Some(bits);
        }
        Ok(())
    }

    /// Look up a resolved flag by name.
    pub fn get(&self, name: &str) -> Option<Flag> {
        match name {
            "ALL" | "ANY" => Some(ALL),
            "NO" | "NONE" => Some(NONE),
            _ => self
                .entries
                .iter()
                .find(|e| e.name == name)
                .and_then(|e| e.bits.map(|bits| Flag::named(e.name, bits))),
        }
    }

    fn check_free(&self, name: &'static str) -> Result<(), FlagError> {
        if self.entries.iter().any(|e| e.name == name) {
            return Err(FlagError::DuplicateName(name));
        }
        Ok(())
    }

    fn resolved_bits(&self, name: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .and_then(|e| e.bits)
    }

    fn eval(&self, expr: &'static str) -> Result<u32, FlagError> {
        let mut parser = ExprParser {
            set: self,
            src: expr,
            pos: 0,
        };
        let bits = parser.or_expr()?;
        parser.skip_ws();
        if parser.pos != expr.len() {
            return Err(FlagError::InvalidExpression(expr));
        }
        Ok(bits)
    }
}

/// Recursive-descent parser with the usual precedence: `~` binds tightest,
/// then `&`, `^`, `|`.
struct ExprParser<'s> {
    set: &'s FlagSet,
    src: &'static str,
    pos: usize,
}

impl ExprParser<'_> {
    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn eat(&mut self, c: u8) -> bool {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn or_expr(&mut self) -> Result<u32, FlagError> {
        let mut bits = self.xor_expr()?;
        while self.eat(b'|') {
            bits |= self.xor_expr()?;
        }
        Ok(bits)
    }

    fn xor_expr(&mut self) -> Result<u32, FlagError> {
        let mut bits = self.and_expr()?;
        while self.eat(b'^') {
            bits ^= self.and_expr()?;
        }
        Ok(bits)
    }

    fn and_expr(&mut self) -> Result<u32, FlagError> {
        let mut bits = self.unary()?;
        while self.eat(b'&') {
            bits &= self.unary()?;
        }
        Ok(bits)
    }

    fn unary(&mut self) -> Result<u32, FlagError> {
        self.skip_ws();
        match self.peek() {
            Some(b'~') => {
                self.pos += 1;
                Ok(!self.unary()?)
            }
            Some(b'(') => {
                self.pos += 1;
                let bits = self.or_expr()?;
                if self.eat(b')') {
                    Ok(bits)
                } else {
                    Err(FlagError::InvalidExpression(self.src))
                }
            }
            Some(c) if c == b'_' || c.is_ascii_alphabetic() => self.name(),
            _ => Err(FlagError::InvalidExpression(self.src)),
        }
    }

    fn name(&mut self) -> Result<u32, FlagError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == b'_' || c.is_ascii_alphanumeric() {
                self.pos += 1;
            } else {
                break;
            }
        }
        let src: &'static str = self.src;
        let name = &src[start..self.pos];
        match name {
            "ALL" | "ANY" => Ok(u32::MAX),
            "NO" | "NONE" => Ok(0),
            _ => self
                .set
                .resolved_bits(name)
                .ok_or(FlagError::UnresolvedReference(name)),
        }
    }
}
