//! Token data model (spec §3 "Token", §4.1).

use crate::string_table::Sym;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Int,
    Char,
    Short,
    Long,
    Float,
    Double,
    Void,
    Signed,
    Unsigned,
    Struct,
    Union,
    Enum,
    Typedef,
    Static,
    Extern,
    Register,
    Auto,
    Const,
    Volatile,
    If,
    Else,
    While,
    Do,
    For,
    Switch,
    Case,
    Default,
    Break,
    Continue,
    Return,
    Goto,
    Sizeof,
    /// Non-standard extension (spec §4.4, §9 Open Questions): `delete name`
    /// erases a global definition.
    Delete,
}

impl Keyword {
    pub fn from_str(s: &str) -> Option<Keyword> {
        use Keyword::*;
        Some(match s {
            "int" => Int,
            "char" => Char,
            "short" => Short,
            "long" => Long,
            "float" => Float,
            "double" => Double,
            "void" => Void,
            "signed" => Signed,
            "unsigned" => Unsigned,
            "struct" => Struct,
            "union" => Union,
            "enum" => Enum,
            "typedef" => Typedef,
            "static" => Static,
            "extern" => Extern,
            "register" => Register,
            "auto" => Auto,
            "const" => Const,
            "volatile" => Volatile,
            "if" => If,
            "else" => Else,
            "while" => While,
            "do" => Do,
            "for" => For,
            "switch" => Switch,
            "case" => Case,
            "default" => Default,
            "break" => Break,
            "continue" => Continue,
            "return" => Return,
            "goto" => Goto,
            "sizeof" => Sizeof,
            "delete" => Delete,
            _ => return None,
        })
    }
}

/// Punctuator / operator tokens. The lexer maximally-munches these: longer
/// prefixes always win (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Not,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Shl,
    Shr,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    AmpEq,
    PipeEq,
    CaretEq,
    ShlEq,
    ShrEq,
    PlusPlus,
    MinusMinus,
    Arrow,
    Dot,
    Comma,
    Semicolon,
    Colon,
    Question,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Ellipsis,
}

/// Punctuators in longest-first order so maximal-munch lexing is a simple
/// linear scan (spec §4.1: "multi-character punctuators win over shorter
/// prefixes").
pub const PUNCTUATORS: &[(&str, Punct)] = &[
    ("...", Punct::Ellipsis),
    ("<<=", Punct::ShlEq),
    (">>=", Punct::ShrEq),
    ("==", Punct::Eq),
    ("!=", Punct::Ne),
    ("<=", Punct::Le),
    (">=", Punct::Ge),
    ("&&", Punct::AndAnd),
    ("||", Punct::OrOr),
    ("<<", Punct::Shl),
    (">>", Punct::Shr),
    ("+=", Punct::PlusEq),
    ("-=", Punct::MinusEq),
    ("*=", Punct::StarEq),
    ("/=", Punct::SlashEq),
    ("%=", Punct::PercentEq),
    ("&=", Punct::AmpEq),
    ("|=", Punct::PipeEq),
    ("^=", Punct::CaretEq),
    ("++", Punct::PlusPlus),
    ("--", Punct::MinusMinus),
    ("->", Punct::Arrow),
    ("+", Punct::Plus),
    ("-", Punct::Minus),
    ("*", Punct::Star),
    ("/", Punct::Slash),
    ("%", Punct::Percent),
    ("=", Punct::Assign),
    ("<", Punct::Lt),
    (">", Punct::Gt),
    ("!", Punct::Not),
    ("&", Punct::Amp),
    ("|", Punct::Pipe),
    ("^", Punct::Caret),
    ("~", Punct::Tilde),
    (".", Punct::Dot),
    (",", Punct::Comma),
    (";", Punct::Semicolon),
    (":", Punct::Colon),
    ("?", Punct::Question),
    ("(", Punct::LParen),
    (")", Punct::RParen),
    ("{", Punct::LBrace),
    ("}", Punct::RBrace),
    ("[", Punct::LBracket),
    ("]", Punct::RBracket),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntSuffix {
    None,
    Unsigned,
    Long,
    UnsignedLong,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(Sym),
    Keyword(Keyword),
    Punct(Punct),
    Int { value: i64, suffix: IntSuffix },
    Float(f64),
    Str(Sym),
    Char(i64),
    /// `#define` — handled by the statement driver (spec §4.1, §4.4).
    HashDefine,
    /// `#include` — handled by the statement driver (spec §4.1, §4.7).
    HashInclude,
    Eol,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub col: u32,
}

impl Token {
    pub fn new(kind: TokenKind, line: u32, col: u32) -> Self {
        Self { kind, line, col }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}
