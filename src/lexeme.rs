/// All lexemes in the accepted source subset.
///
/// The subset is indentation-sensitive, so the lexer emits explicit
/// `Newline`, `Indent` and `Dedent` lexemes alongside the token stream.
#[derive(Clone, Debug, PartialEq)]
pub enum Lexeme {
    // Keywords
    Def,
    If,
    Elif,
    Else,
    While,
    For,
    In,
    Return,
    Pass,
    And,
    Or,
    Not,
    True,
    False,
    NoneKw,

    // Keywords that are recognized so the parser can name them in
    // unsupported-construct errors.
    Lambda,
    Try,
    Except,
    Finally,
    Raise,
    Import,
    From,
    Global,
    Nonlocal,
    Del,
    Assert,
    Yield,
    Async,
    Await,
    With,
    Class,
    Is,

    // Symbols
    LParen,       // (
    RParen,       // )
    LBracket,     // [
    RBracket,     // ]
    LBrace,       // {
    RBrace,       // }
    Comma,        // ,
    Colon,        // :
    Semicolon,    // ;
    Dot,          // .
    Eq,           // =
    PlusEq,       // +=
    MinusEq,      // -=
    StarEq,       // *=
    SlashSlashEq, // //=
    PercentEq,    // %=
    Plus,         // +
    Minus,        // -
    Star,         // *
    StarStar,     // **
    Slash,        // /
    SlashSlash,   // //
    Percent,      // %
    EqEq,         // ==
    BangEq,       // !=
    Lt,           // <
    LtEq,         // <=
    Gt,           // >
    GtEq,         // >=
    Arrow,        // ->
    At,           // @

    // Layout
    Newline,
    Indent,
    Dedent,

    // Literals
    Integer(i128),
    Ident(String),

    // End of file
    Eof,
}

impl Lexeme {
    /// Try to match an identifier string to a keyword lexeme.
    pub fn from_keyword(s: &str) -> Option<Lexeme> {
        match s {
            "def" => Some(Lexeme::Def),
            "if" => Some(Lexeme::If),
            "elif" => Some(Lexeme::Elif),
            "else" => Some(Lexeme::Else),
            "while" => Some(Lexeme::While),
            "for" => Some(Lexeme::For),
            "in" => Some(Lexeme::In),
            "return" => Some(Lexeme::Return),
            "pass" => Some(Lexeme::Pass),
            "and" => Some(Lexeme::And),
            "or" => Some(Lexeme::Or),
            "not" => Some(Lexeme::Not),
            "True" => Some(Lexeme::True),
            "False" => Some(Lexeme::False),
            "None" => Some(Lexeme::NoneKw),
            "lambda" => Some(Lexeme::Lambda),
            "try" => Some(Lexeme::Try),
            "except" => Some(Lexeme::Except),
            "finally" => Some(Lexeme::Finally),
            "raise" => Some(Lexeme::Raise),
            "import" => Some(Lexeme::Import),
            "from" => Some(Lexeme::From),
            "global" => Some(Lexeme::Global),
            "nonlocal" => Some(Lexeme::Nonlocal),
            "del" => Some(Lexeme::Del),
            "assert" => Some(Lexeme::Assert),
            "yield" => Some(Lexeme::Yield),
            "async" => Some(Lexeme::Async),
            "await" => Some(Lexeme::Await),
            "with" => Some(Lexeme::With),
            "class" => Some(Lexeme::Class),
            "is" => Some(Lexeme::Is),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Lexeme::Def => "'def'",
            Lexeme::If => "'if'",
            Lexeme::Elif => "'elif'",
            Lexeme::Else => "'else'",
            Lexeme::While => "'while'",
            Lexeme::For => "'for'",
            Lexeme::In => "'in'",
            Lexeme::Return => "'return'",
            Lexeme::Pass => "'pass'",
            Lexeme::And => "'and'",
            Lexeme::Or => "'or'",
            Lexeme::Not => "'not'",
            Lexeme::True => "'True'",
            Lexeme::False => "'False'",
            Lexeme::NoneKw => "'None'",
            Lexeme::Lambda => "'lambda'",
            Lexeme::Try => "'try'",
            Lexeme::Except => "'except'",
            Lexeme::Finally => "'finally'",
            Lexeme::Raise => "'raise'",
            Lexeme::Import => "'import'",
            Lexeme::From => "'from'",
            Lexeme::Global => "'global'",
            Lexeme::Nonlocal => "'nonlocal'",
            Lexeme::Del => "'del'",
            Lexeme::Assert => "'assert'",
            Lexeme::Yield => "'yield'",
            Lexeme::Async => "'async'",
            Lexeme::Await => "'await'",
            Lexeme::With => "'with'",
            Lexeme::Class => "'class'",
            Lexeme::Is => "'is'",
            Lexeme::LParen => "'('",
            Lexeme::RParen => "')'",
            Lexeme::LBracket => "'['",
            Lexeme::RBracket => "']'",
            Lexeme::LBrace => "'{'",
            Lexeme::RBrace => "'}'",
            Lexeme::Comma => "','",
            Lexeme::Colon => "':'",
            Lexeme::Semicolon => "';'",
            Lexeme::Dot => "'.'",
            Lexeme::Eq => "'='",
            Lexeme::PlusEq => "'+='",
            Lexeme::MinusEq => "'-='",
            Lexeme::StarEq => "'*='",
            Lexeme::SlashSlashEq => "'//='",
            Lexeme::PercentEq => "'%='",
            Lexeme::Plus => "'+'",
            Lexeme::Minus => "'-'",
            Lexeme::Star => "'*'",
            Lexeme::StarStar => "'**'",
            Lexeme::Slash => "'/'",
            Lexeme::SlashSlash => "'//'",
            Lexeme::Percent => "'%'",
            Lexeme::EqEq => "'=='",
            Lexeme::BangEq => "'!='",
            Lexeme::Lt => "'<'",
            Lexeme::LtEq => "'<='",
            Lexeme::Gt => "'>'",
            Lexeme::GtEq => "'>='",
            Lexeme::Arrow => "'->'",
            Lexeme::At => "'@'",
            Lexeme::Newline => "end of line",
            Lexeme::Indent => "indentation",
            Lexeme::Dedent => "end of block",
            Lexeme::Integer(_) => "integer literal",
            Lexeme::Ident(_) => "identifier",
            Lexeme::Eof => "end of file",
        }
    }
}
