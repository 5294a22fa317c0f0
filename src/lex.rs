//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone el texto fuente
//! en unidades léxicas denominadas tokens. Los espacios en blanco y los
//! comentarios se descartan durante esta operación. Cada token emitido
//! lleva el número de línea donde comienza, lo cual permite rastrear
//! errores tanto en esta fase como en constructos más elevados de fases
//! posteriores.
//!
//! # Contenido de un token
//! Todo token preserva su lexema original tal como aparece en el texto
//! fuente, con una excepción: las palabras clave se almacenan siempre
//! en minúsculas sin importar cómo fueron escritas.
//!
//! # Reglas importantes del lenguaje
//! - Las palabras clave son case-insensitive, por lo cual tanto `while`
//!   como `WHILE` y `While` resultan en la misma palabra clave.
//! - Existen dos estilos de comentario de bloque, `/* */` y `[* *]`.
//! - La secuencia `$$` es un separador de dos caracteres y además corta
//!   cualquier secuencia de identificador o constante en curso.
//!
//! # Errores
//! El lexer es total: nunca falla ni descarta entrada irreconocible.
//! Las secuencias malformadas se emiten como tokens de tipo
//! [`TokenKind::LexError`] o [`TokenKind::Invalid`], de manera que el
//! parser pueda continuar y reportar sobre ellas. Las condiciones que
//! no producen token alguno se anuncian por la bitácora.

use std::fmt::{self, Display};

use log::warn;
use thiserror::Error;

// Case-insensitive
pub use unicase::Ascii as NoCase;

/// Palabras reservadas, en su forma canónica en minúsculas.
const KEYWORDS: &[NoCase<&str>] = &[
    NoCase::new("if"),
    NoCase::new("else"),
    NoCase::new("endif"),
    NoCase::new("while"),
    NoCase::new("endwhile"),
    NoCase::new("for"),
    NoCase::new("function"),
    NoCase::new("return"),
    NoCase::new("integer"),
    NoCase::new("boolean"),
    NoCase::new("print"),
    NoCase::new("scan"),
    NoCase::new("true"),
    NoCase::new("false"),
];

/// Condición de escaneo que no produce tokens.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexWarning {
    /// Un comentario de bloque nunca encontró su cierre.
    #[error("Unclosed comment starting at line {0}")]
    UnterminatedComment(u32),

    /// Una secuencia no corresponde a ninguna clase conocida.
    #[error("Invalid token '{0}' at line {1}")]
    InvalidRun(String, u32),
}

/// Clase léxica de un token.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// Palabra reservada.
    Keyword,

    /// Identificador.
    Identifier,

    /// Constante entera no negativa.
    Integer,

    /// Operador aritmético, relacional o de asignación.
    Operator,

    /// Separador de un carácter o la sección `$$`.
    Separator,

    /// Secuencia malformada que comenzaba como identificador o número.
    LexError,

    /// Secuencia que no comienza ningún token conocido.
    Invalid,

    /// Fin del flujo de tokens; nunca lo produce el lexer.
    Eof,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Keyword => "keyword",
            TokenKind::Identifier => "identifier",
            TokenKind::Integer => "integer",
            TokenKind::Operator => "operator",
            TokenKind::Separator => "separator",
            TokenKind::LexError => "error",
            TokenKind::Invalid => "invalid",
            TokenKind::Eof => "EOF",
        }
    }
}

impl Display for TokenKind {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.pad(self.as_str())
    }
}

/// Objeto resultante del análisis léxico.
///
/// Un token contiene suficiente información para describir completamente
/// a una entidad léxica del programa fuente: su clase, su lexema y la
/// línea donde comienza.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: u32,
}

impl Token {
    fn new(kind: TokenKind, lexeme: impl Into<String>, line: u32) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            line,
        }
    }

    /// Token sintético de fin de flujo.
    pub fn eof(line: u32) -> Self {
        Token::new(TokenKind::Eof, "", line)
    }

    pub fn is(&self, kind: TokenKind, lexeme: &str) -> bool {
        self.kind == kind && self.lexeme == lexeme
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.is(TokenKind::Keyword, word)
    }

    pub fn is_separator(&self, text: &str) -> bool {
        self.is(TokenKind::Separator, text)
    }

    pub fn is_operator(&self, text: &str) -> bool {
        self.is(TokenKind::Operator, text)
    }
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "Token: {:<15} Lexeme: {}", self.kind, self.lexeme)
    }
}

/// Reduce un texto fuente completo a su secuencia de tokens.
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).collect()
}

/// Escáner por posiciones sobre el texto fuente.
///
/// El escáner clasifica a partir del carácter inicial de cada token y,
/// para identificadores, constantes y secuencias desconocidas, consume
/// una secuencia completa hasta la siguiente frontera. Una frontera es
/// espacio en blanco, uno de `( ) { } ; ,`, o el inicio de `$$`.
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    /// Par de caracteres visible en la posición actual, si lo hay.
    fn pair(&self) -> Option<(char, char)> {
        Some((*self.chars.get(self.pos)?, *self.chars.get(self.pos + 1)?))
    }

    /// Determina si una secuencia termina en la posición dada.
    fn run_boundary(&self, at: usize) -> bool {
        match self.chars.get(at) {
            None => true,
            Some(&c) => {
                c.is_whitespace()
                    || matches!(c, '(' | ')' | '{' | '}' | ';' | ',')
                    || (c == '$' && self.chars.get(at + 1) == Some(&'$'))
            }
        }
    }

    /// Consume una secuencia desde la posición actual hasta su frontera.
    fn take_run(&mut self) -> String {
        let start = self.pos;

        // El primer carácter ya fue clasificado por el llamador
        self.pos += 1;
        while !self.run_boundary(self.pos) {
            self.pos += 1;
        }

        self.chars[start..self.pos].iter().collect()
    }

    /// Salta un comentario de bloque ya abierto.
    ///
    /// Si el comentario nunca se cierra, la advertencia queda en la
    /// bitácora y el escaneo termina en el fin de la entrada.
    fn skip_comment(&mut self, closer: (char, char)) {
        let opened_at = self.line;

        self.pos += 2;
        loop {
            match self.pair() {
                Some(pair) if pair == closer => {
                    self.pos += 2;
                    return;
                }

                _ => match self.chars.get(self.pos) {
                    Some('\n') => {
                        self.line += 1;
                        self.pos += 1;
                    }

                    Some(_) => self.pos += 1,

                    None => {
                        warn!("{}", LexWarning::UnterminatedComment(opened_at));
                        return;
                    }
                },
            }
        }
    }
}

impl Iterator for Lexer {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            let c = *self.chars.get(self.pos)?;

            // Los saltos de línea avanzan el contador; el resto del
            // espacio en blanco solo se descarta
            if c == '\n' {
                self.line += 1;
                self.pos += 1;
                continue;
            }

            if c.is_whitespace() {
                self.pos += 1;
                continue;
            }

            match self.pair() {
                // Comentarios de bloque, en sus dos estilos
                Some(('/', '*')) => {
                    self.skip_comment(('*', '/'));
                    continue;
                }

                Some(('[', '*')) => {
                    self.skip_comment(('*', ']'));
                    continue;
                }

                // Separador de sección
                Some(('$', '$')) => {
                    let token = Token::new(TokenKind::Separator, "$$", self.line);
                    self.pos += 2;
                    return Some(token);
                }

                _ => (),
            }

            let line = self.line;

            // Identificadores, palabras clave y secuencias malformadas
            // que comienzan con letra
            if c.is_alphabetic() {
                let run = self.take_run();
                let token = match keyword(&run) {
                    Some(canonical) => Token::new(TokenKind::Keyword, canonical, line),

                    None if run.chars().all(|c| c.is_alphanumeric() || c == '_') => {
                        Token::new(TokenKind::Identifier, run, line)
                    }

                    None => Token::new(TokenKind::LexError, run, line),
                };

                return Some(token);
            }

            // Un punto inicial nunca forma un token válido
            if c == '.' {
                let run = self.take_run();
                return Some(Token::new(TokenKind::LexError, run, line));
            }

            // Constantes numéricas; el lenguaje solo admite enteros
            if c.is_ascii_digit() {
                let run = self.take_run();
                let kind = if run.chars().all(|c| c.is_ascii_digit()) {
                    TokenKind::Integer
                } else {
                    TokenKind::LexError
                };

                return Some(Token::new(kind, run, line));
            }

            if matches!(c, ',' | ';' | '(' | ')' | '{' | '}') {
                self.pos += 1;
                return Some(Token::new(TokenKind::Separator, c, line));
            }

            // Operadores de dos caracteres tienen prioridad sobre
            // cualquier prefijo de un carácter
            if let Some((a, b)) = self.pair() {
                if matches!((a, b), ('=', '=') | ('!', '=') | ('<', '=') | ('=', '>')) {
                    self.pos += 2;
                    return Some(Token::new(TokenKind::Operator, format!("{a}{b}"), line));
                }
            }

            if matches!(c, '+' | '-' | '*' | '/' | '=' | '<' | '>') {
                self.pos += 1;
                return Some(Token::new(TokenKind::Operator, c, line));
            }

            // Ninguna clase conocida comienza con este carácter
            let run = self.take_run();
            warn!("{}", LexWarning::InvalidRun(run.clone(), line));
            return Some(Token::new(TokenKind::Invalid, run, line));
        }
    }
}

/// Busca la forma canónica de una palabra reservada.
fn keyword(run: &str) -> Option<&'static str> {
    KEYWORDS
        .iter()
        .find(|&&name| name == NoCase::new(run))
        .map(|name| name.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<(TokenKind, String)> {
        tokenize(source)
            .into_iter()
            .map(|token| (token.kind, token.lexeme))
            .collect()
    }

    #[test]
    fn keywords_are_case_insensitive_and_lowercased() {
        for source in ["while", "WHILE", "While", "wHiLe"] {
            let tokens = tokenize(source);
            assert_eq!(tokens.len(), 1);
            assert_eq!(tokens[0].kind, TokenKind::Keyword);
            assert_eq!(tokens[0].lexeme, "while");
        }
    }

    #[test]
    fn identifiers_allow_digits_and_underscores() {
        assert_eq!(
            kinds("abc a_1 z9"),
            vec![
                (TokenKind::Identifier, "abc".to_owned()),
                (TokenKind::Identifier, "a_1".to_owned()),
                (TokenKind::Identifier, "z9".to_owned()),
            ]
        );
    }

    #[test]
    fn malformed_identifier_run_is_a_lex_error() {
        assert_eq!(kinds("ab$c"), vec![(TokenKind::LexError, "ab$c".to_owned())]);
    }

    #[test]
    fn section_separator_cuts_runs() {
        assert_eq!(
            kinds("x$$y"),
            vec![
                (TokenKind::Identifier, "x".to_owned()),
                (TokenKind::Separator, "$$".to_owned()),
                (TokenKind::Identifier, "y".to_owned()),
            ]
        );
    }

    #[test]
    fn integers_and_malformed_numbers() {
        assert_eq!(kinds("123"), vec![(TokenKind::Integer, "123".to_owned())]);
        assert_eq!(kinds("12.5"), vec![(TokenKind::LexError, "12.5".to_owned())]);
        assert_eq!(kinds("12ab"), vec![(TokenKind::LexError, "12ab".to_owned())]);
        assert_eq!(kinds(".5"), vec![(TokenKind::LexError, ".5".to_owned())]);
    }

    #[test]
    fn two_char_operators_take_precedence() {
        assert_eq!(
            kinds("<= => == != < > = + - * /"),
            vec![
                (TokenKind::Operator, "<=".to_owned()),
                (TokenKind::Operator, "=>".to_owned()),
                (TokenKind::Operator, "==".to_owned()),
                (TokenKind::Operator, "!=".to_owned()),
                (TokenKind::Operator, "<".to_owned()),
                (TokenKind::Operator, ">".to_owned()),
                (TokenKind::Operator, "=".to_owned()),
                (TokenKind::Operator, "+".to_owned()),
                (TokenKind::Operator, "-".to_owned()),
                (TokenKind::Operator, "*".to_owned()),
                (TokenKind::Operator, "/".to_owned()),
            ]
        );
    }

    #[test]
    fn comments_are_skipped_and_count_lines() {
        let tokens = tokenize("/* uno\ndos */ x [* tres *] y");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].lexeme, "x");
        assert_eq!(tokens[0].line, 2);
        assert_eq!(tokens[1].lexeme, "y");
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn unterminated_comment_ends_the_stream() {
        let tokens = tokenize("x /* sin cierre");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].lexeme, "x");

        let tokens = tokenize("y [* tampoco");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].lexeme, "y");
    }

    #[test]
    fn unknown_runs_become_invalid_tokens() {
        assert_eq!(kinds("@#!"), vec![(TokenKind::Invalid, "@#!".to_owned())]);
    }

    #[test]
    fn line_numbers_attach_to_token_starts() {
        let tokens = tokenize("a\nb\n\nc");
        let lines: Vec<u32> = tokens.iter().map(|token| token.line).collect();
        assert_eq!(lines, vec![1, 2, 4]);
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \n\t ").is_empty());
    }

    #[test]
    fn tokenize_is_deterministic() {
        let source = "integer x; WHILE (x <= 10) x = x + 1; endwhile $$";
        assert_eq!(tokenize(source), tokenize(source));
    }
}
