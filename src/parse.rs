//! Análisis sintáctico y semántico.
//!
//! El parser es de descenso recursivo con un token de lookahead y
//! verificación semántica integrada: cada regla gramatical anota su
//! producción en la traza, consume tokens, consulta y actualiza la
//! tabla de símbolos, y alimenta al listado de instrucciones conforme
//! reconoce expresiones, asignaciones, E/S y saltos. Ante cualquier
//! error se registra un diagnóstico y se resincroniza en modo pánico,
//! por lo cual una compilación siempre llega hasta el final de la
//! entrada.

use std::collections::HashMap;
use std::ops::Range;

use crate::{
    error::{Diagnostic, Diagnostics},
    ir::{Instruction, Listing},
    lex::{Token, TokenKind},
    semantic::{FunctionInfo, SymbolTable, Type},
};

/// Artefactos producidos por una compilación.
///
/// La traza intercala producciones, tokens y diagnósticos en su orden
/// de emisión; la tabla de símbolos y el listado quedan en su estado
/// final. El listado solo es confiable cuando no hubo diagnósticos.
pub struct Compilation {
    pub trace: Vec<String>,
    pub symbols: SymbolTable,
    pub listing: Listing,
    pub diagnostics: Diagnostics,
}

impl Compilation {
    pub fn error_count(&self) -> usize {
        self.diagnostics.len()
    }
}

/// Consume el flujo completo de tokens y produce los artefactos.
pub fn parse(tokens: Vec<Token>) -> Compilation {
    let mut parser = Parser::new(tokens);
    parser.parse_program();
    parser.finish()
}

/// Palabras clave donde la recuperación en modo pánico se detiene.
const SYNC_KEYWORDS: &[&str] = &[
    "if",
    "while",
    "function",
    "return",
    "endif",
    "endwhile",
    "else",
];

/// Contexto único de una compilación.
///
/// Todo el estado mutable del proceso vive aquí y se libera al
/// finalizar; no existen singletons ni estado compartido.
pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
    current_line: u32,
    trace: Vec<String>,
    diagnostics: Diagnostics,
    symbols: SymbolTable,
    functions: HashMap<String, FunctionInfo>,

    /// Definiciones de función en curso, la más interna al tope.
    function_stack: Vec<String>,
    listing: Listing,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let current_line = if tokens.is_empty() { 0 } else { 1 };

        Parser {
            tokens,
            index: 0,
            current_line,
            trace: Vec::new(),
            diagnostics: Diagnostics::default(),
            symbols: SymbolTable::default(),
            functions: HashMap::new(),
            function_stack: Vec::new(),
            listing: Listing::default(),
        }
    }

    pub fn finish(self) -> Compilation {
        Compilation {
            trace: self.trace,
            symbols: self.symbols,
            listing: self.listing,
            diagnostics: self.diagnostics,
        }
    }

    // ------------------------------------------------------------------
    // Manejo del flujo de tokens

    /// Token bajo el cursor; sintetiza EOF al agotarse la entrada.
    fn current(&mut self) -> Token {
        match self.tokens.get(self.index) {
            Some(token) => {
                self.current_line = token.line;
                token.clone()
            }

            None => Token::eof(self.current_line),
        }
    }

    fn lookahead(&self, steps: usize) -> Option<&Token> {
        self.tokens.get(self.index + steps)
    }

    fn at_end(&self) -> bool {
        self.index >= self.tokens.len()
    }

    /// Consume el token actual y lo anota en la traza.
    fn advance(&mut self) {
        let token = self.current();
        if token.kind != TokenKind::Eof {
            self.trace.push(token.to_string());
        }

        self.index += 1;
    }

    fn production(&mut self, production: &str) {
        self.trace.push(production.to_owned());
    }

    /// Exige un token de la clase dada y, opcionalmente, con un lexema
    /// exacto. El fracaso registra un diagnóstico y resincroniza.
    fn expect(&mut self, kind: TokenKind, lexeme: Option<&str>) -> bool {
        let token = self.current();
        if token.kind == kind && lexeme.map_or(true, |expected| token.lexeme == expected) {
            self.advance();
            return true;
        }

        let mut expected = kind.to_string();
        if let Some(lexeme) = lexeme {
            expected = format!("{expected} {lexeme}");
        }

        let found = if token.lexeme.is_empty() {
            token.kind.to_string()
        } else {
            format!("{} {}", token.kind, token.lexeme)
        };

        self.error(format!("Expected {expected} but found {found}"));
        false
    }

    /// Registra un diagnóstico y recupera en modo pánico.
    ///
    /// La recuperación descarta tokens hasta un punto de sincronía:
    /// un `;` (que sí se consume), una palabra clave estructural, el
    /// separador `$$` o un `}`. Los marcadores `endif`, `endwhile` y
    /// `else` bajo el cursor no se descartan, ya que la regla que los
    /// abrió sabrá resincronizar con ellos.
    fn error(&mut self, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            line: self.current_line,
            message: message.into(),
        };

        self.trace.push(diagnostic.to_string());
        self.diagnostics.push(diagnostic);

        let token = self.current();
        if token.kind == TokenKind::Keyword
            && matches!(token.lexeme.as_str(), "endif" | "endwhile" | "else")
        {
            return;
        }

        let mut recovered = false;
        while !self.at_end() {
            let token = self.current();

            if token.is_separator(";") {
                self.advance();
                recovered = true;
                break;
            } else if token.kind == TokenKind::Keyword
                && SYNC_KEYWORDS.contains(&token.lexeme.as_str())
            {
                recovered = true;
                break;
            } else if token.is_separator("$$") || token.is_separator("}") {
                recovered = true;
                break;
            } else {
                self.index += 1;
            }
        }

        // Sin punto de sincronía, un avance mínimo evita ciclos
        if !recovered && !self.at_end() {
            self.index += 1;
        }
    }

    fn declare(&mut self, name: &str, ty: Type) {
        if let Err(error) = self.symbols.declare(name, ty) {
            self.error(error.to_string());
        }
    }

    // ------------------------------------------------------------------
    // Reglas gramaticales

    pub fn parse_program(&mut self) {
        self.production("<Program> -> <Statement List>");
        self.parse_statement_list();
    }

    fn parse_statement_list(&mut self) {
        self.production("<Statement List> -> <Statement> <Statement List> | ε");

        while !self.at_end() {
            let token = self.current();

            if token.is_separator("$$") {
                self.expect(TokenKind::Separator, Some("$$"));
                continue;
            }

            // Los cierres de bloque pertenecen a la regla que los abrió
            if token.kind == TokenKind::Keyword
                && matches!(token.lexeme.as_str(), "endif" | "endwhile" | "else")
            {
                break;
            }

            self.parse_statement();
        }
    }

    fn parse_statement(&mut self) {
        self.production(
            "<Statement> -> <Compound> | <Assign> | <If> | <Return> | <Print> | <Scan> | <While> | <Declaration>",
        );

        let token = self.current();
        match (token.kind, token.lexeme.as_str()) {
            (TokenKind::Keyword, "function") => self.parse_function_def(),
            (TokenKind::Keyword, "if") => self.parse_if_stmt(),
            (TokenKind::Keyword, "while") => self.parse_while_stmt(),
            (TokenKind::Keyword, "return") => self.parse_return_stmt(),
            (TokenKind::Keyword, "integer" | "boolean") => self.parse_declaration(),
            (TokenKind::Keyword, "print") => self.parse_print_stmt(),
            (TokenKind::Keyword, "scan") => self.parse_scan_stmt(),

            (TokenKind::Identifier, _) => {
                // Un token de lookahead distingue asignación de llamada
                let assigns = self
                    .lookahead(1)
                    .map_or(false, |next| next.is_operator("="));

                if assigns {
                    self.parse_assignment();
                } else {
                    self.parse_function_call();

                    // Una llamada en posición de sentencia lleva su
                    // propio punto y coma
                    if self.current().is_separator(";") {
                        self.expect(TokenKind::Separator, Some(";"));
                    }
                }
            }

            (TokenKind::Separator, "{") => self.parse_compound(),

            (TokenKind::Keyword, "endif" | "endwhile" | "else") => (),

            (TokenKind::Keyword, "true" | "false") => {
                self.error(format!(
                    "Boolean literal '{}' cannot be used as a statement",
                    token.lexeme
                ));
                self.advance();
            }

            _ => {
                self.error(format!("Unexpected token in statement: {}", token.lexeme));
                self.advance();
            }
        }
    }

    fn parse_compound(&mut self) {
        self.production("<Compound> -> { <Statement List> }");
        self.symbols.enter_scope();

        if !self.expect(TokenKind::Separator, Some("{")) {
            self.symbols.exit_scope();
            return;
        }

        while !self.at_end() && !self.current().is_separator("}") {
            let token = self.current();
            if token.kind == TokenKind::Keyword
                && matches!(token.lexeme.as_str(), "endif" | "endwhile")
            {
                break;
            }

            self.parse_statement();
        }

        self.expect(TokenKind::Separator, Some("}"));
        self.symbols.exit_scope();
    }

    fn parse_function_def(&mut self) {
        self.production("<Function> -> function <Identifier> ( <Parameter List> ) <Compound>");

        if !self.expect(TokenKind::Keyword, Some("function")) {
            return;
        }

        let name = self.current().lexeme;
        if self.functions.contains_key(&name) {
            self.error(format!("Function {name} already defined"));
        }

        if !self.expect(TokenKind::Identifier, None) {
            return;
        }

        if !self.expect(TokenKind::Separator, Some("(")) {
            return;
        }

        // Los parámetros se declaran en el ámbito propio de la función,
        // antes de reconocer el cuerpo
        self.symbols.enter_scope();
        let params = self.parse_parameter_list();

        // El tipo de retorno se refina con la primera sentencia return
        self.functions.insert(
            name.clone(),
            FunctionInfo {
                params,
                return_type: Type::Unknown,
            },
        );
        self.function_stack.push(name);

        if !self.expect(TokenKind::Separator, Some(")")) {
            self.function_stack.pop();
            self.symbols.exit_scope();
            return;
        }

        self.parse_compound();

        self.function_stack.pop();
        self.symbols.exit_scope();
    }

    fn parse_parameter_list(&mut self) -> Vec<(String, Type)> {
        self.production("<Parameter List> -> <Parameter> <Parameter List Prime> | ε");

        let mut params = Vec::new();
        if self.current().kind == TokenKind::Identifier {
            if let Some(param) = self.parse_parameter() {
                params.push(param);
            }

            params.extend(self.parse_parameter_list_prime());
        } else {
            self.production("<Parameter List> -> ε");
        }

        params
    }

    fn parse_parameter_list_prime(&mut self) -> Vec<(String, Type)> {
        self.production("<Parameter List Prime> -> , <Parameter> <Parameter List Prime> | ε");

        let mut params = Vec::new();
        if self.current().is_separator(",") {
            self.expect(TokenKind::Separator, Some(","));
            if let Some(param) = self.parse_parameter() {
                params.push(param);
            }

            params.extend(self.parse_parameter_list_prime());
        } else {
            self.production("<Parameter List Prime> -> ε");
        }

        params
    }

    fn parse_parameter(&mut self) -> Option<(String, Type)> {
        self.production("<Parameter> -> <IDs> <Qualifier>");

        let name = self.current().lexeme;
        if !self.expect(TokenKind::Identifier, None) {
            return None;
        }

        let token = self.current();
        let ty = if token.kind == TokenKind::Keyword
            && matches!(token.lexeme.as_str(), "integer" | "boolean")
        {
            Type::from_qualifier(&token.lexeme)
        } else {
            Type::Unknown
        };

        self.parse_qualifier();
        self.declare(&name, ty);

        Some((name, ty))
    }

    fn parse_qualifier(&mut self) {
        self.production("<Qualifier> -> integer | boolean");

        let token = self.current();
        if token.kind == TokenKind::Keyword
            && matches!(token.lexeme.as_str(), "integer" | "boolean")
        {
            self.expect(TokenKind::Keyword, Some(&token.lexeme));
        } else {
            self.error("Type qualifier expected (integer or boolean)");
        }
    }

    fn parse_declaration(&mut self) {
        self.production("<Declaration> -> <Qualifier> <IDs> ;");

        let ty = Type::from_qualifier(&self.current().lexeme);
        self.parse_qualifier();
        self.parse_ids(ty);

        if !self.expect(TokenKind::Separator, Some(";")) {
            self.error("Expected semicolon after variable declaration");
        }
    }

    fn parse_ids(&mut self, ty: Type) {
        self.production("<IDs> -> <Identifier> <IDsPrime>");

        let name = self.current().lexeme;
        if !self.expect(TokenKind::Identifier, None) {
            return;
        }

        self.declare(&name, ty);
        self.parse_ids_prime(ty);
    }

    fn parse_ids_prime(&mut self, ty: Type) {
        self.production("<IDsPrime> -> , <Identifier> <IDsPrime> | ε");

        if self.current().is_separator(",") {
            self.expect(TokenKind::Separator, Some(","));

            let name = self.current().lexeme;
            if !self.expect(TokenKind::Identifier, None) {
                return;
            }

            self.declare(&name, ty);
            self.parse_ids_prime(ty);
        } else {
            self.production("<IDsPrime> -> ε");
        }
    }

    fn parse_scan_stmt(&mut self) {
        self.production("<Scan> -> scan ( <IDs> );");

        if !self.expect(TokenKind::Keyword, Some("scan")) {
            return;
        }

        if !self.expect(TokenKind::Separator, Some("(")) {
            return;
        }

        let mut targets = Vec::new();
        self.parse_scan_ids(&mut targets);

        if !self.expect(TokenKind::Separator, Some(")")) {
            return;
        }

        self.expect(TokenKind::Separator, Some(";"));

        self.listing.push(Instruction::StdIn);

        // El tope de la pila corresponde al último objetivo textual
        for name in targets.iter().rev() {
            if let Some(address) = self.symbols.address_of(name) {
                self.listing.push(Instruction::PopMem(address));
            }
        }
    }

    fn parse_scan_ids(&mut self, targets: &mut Vec<String>) {
        self.production("<IDs> -> <Identifier> <IDsPrime>");

        let name = self.current().lexeme;
        if !self.symbols.is_declared(&name) {
            self.error(format!(
                "Variable '{name}' used in scan procedure without prior declaration."
            ));
        }
        targets.push(name);

        if !self.expect(TokenKind::Identifier, None) {
            return;
        }

        self.parse_scan_ids_prime(targets);
    }

    fn parse_scan_ids_prime(&mut self, targets: &mut Vec<String>) {
        self.production("<IDsPrime> -> , <Identifier> <IDsPrime> | ε");

        if self.current().is_separator(",") {
            self.expect(TokenKind::Separator, Some(","));

            let name = self.current().lexeme;
            if !self.symbols.is_declared(&name) {
                self.error(format!(
                    "Variable '{name}' used in scan procedure without prior declaration."
                ));
            }
            targets.push(name);

            if !self.expect(TokenKind::Identifier, None) {
                return;
            }

            self.parse_scan_ids_prime(targets);
        } else {
            self.production("<IDsPrime> -> ε");
        }
    }

    fn parse_print_stmt(&mut self) {
        self.production("<Print> -> print ( <Expression> );");

        if !self.expect(TokenKind::Keyword, Some("print")) {
            return;
        }

        if !self.expect(TokenKind::Separator, Some("(")) {
            return;
        }

        self.parse_expression();
        self.listing.push(Instruction::StdOut);

        if !self.expect(TokenKind::Separator, Some(")")) {
            return;
        }

        self.expect(TokenKind::Separator, Some(";"));
    }

    fn parse_if_stmt(&mut self) {
        self.production("<If> -> if ( <Condition> ) <Statement> <IfPrime>");

        // Ámbito para la estructura if/else completa
        self.symbols.enter_scope();

        if !self.expect(TokenKind::Keyword, Some("if")) {
            self.symbols.exit_scope();
            return;
        }

        if !self.expect(TokenKind::Separator, Some("(")) {
            self.symbols.exit_scope();
            return;
        }

        self.parse_condition();

        if !self.expect(TokenKind::Separator, Some(")")) {
            self.symbols.exit_scope();
            return;
        }

        // Salto por encima de la rama verdadera; el destino se resuelve
        // al conocer el final de la rama
        let jump_false = self.listing.push(Instruction::JumpIfZero(None));

        self.symbols.enter_scope();
        self.parse_statement();
        self.symbols.exit_scope();

        let has_else = self.current().is_keyword("else");
        let skip_else = if has_else {
            // La rama verdadera salta por encima de la rama else
            let skip = self.listing.push(Instruction::Jump(None));
            let else_label = self.listing.push(Instruction::Label);
            self.listing.patch(jump_false, else_label);
            Some(skip)
        } else {
            let end_label = self.listing.push(Instruction::Label);
            self.listing.patch(jump_false, end_label);
            None
        };

        self.parse_if_prime();

        if let Some(skip) = skip_else {
            let end_label = self.listing.push(Instruction::Label);
            self.listing.patch(skip, end_label);
        }

        self.symbols.exit_scope();
    }

    fn parse_if_prime(&mut self) {
        self.production("<IfPrime> -> else <Statement> endif | endif");

        let token = self.current();
        if token.is_keyword("else") {
            self.expect(TokenKind::Keyword, Some("else"));

            self.symbols.enter_scope();
            self.parse_statement();
            self.symbols.exit_scope();

            if !self.expect(TokenKind::Keyword, Some("endif")) {
                self.error("Expected 'endif' after else clause");
            }
        } else if token.is_keyword("endif") {
            self.expect(TokenKind::Keyword, Some("endif"));
        } else {
            self.error("Expected 'else' or 'endif'");
        }
    }

    fn parse_while_stmt(&mut self) {
        self.production("<While> -> while ( <Condition> ) <Statement List> endwhile");

        self.symbols.enter_scope();

        if !self.expect(TokenKind::Keyword, Some("while")) {
            self.symbols.exit_scope();
            return;
        }

        if !self.expect(TokenKind::Separator, Some("(")) {
            self.symbols.exit_scope();
            return;
        }

        // La condición se reevalúa a partir de esta etiqueta
        let start_label = self.listing.push(Instruction::Label);

        self.parse_condition();

        if !self.expect(TokenKind::Separator, Some(")")) {
            self.symbols.exit_scope();
            return;
        }

        let jump_out = self.listing.push(Instruction::JumpIfZero(None));

        if self.current().is_separator("{") {
            self.parse_compound();
        } else {
            self.parse_statement();

            while !self.at_end() && !self.current().is_keyword("endwhile") {
                if self.current().is_separator("$$") {
                    self.error("Expected 'endwhile' before end of section");
                    break;
                }

                self.parse_statement();
            }
        }

        self.listing.push(Instruction::Jump(Some(start_label + 1)));

        let end_label = self.listing.push(Instruction::Label);
        self.listing.patch(jump_out, end_label);

        if self.current().is_keyword("endwhile") {
            self.expect(TokenKind::Keyword, Some("endwhile"));
        } else {
            self.error("Expected 'endwhile' to close while loop");
        }

        self.symbols.exit_scope();
    }

    fn parse_condition(&mut self) {
        self.production("<Condition> -> <Expression> <Relop> <Expression>");

        let left_start = self.index;
        self.parse_expression();

        let relop = self.current().lexeme;
        self.parse_relop();

        let right_start = self.index;
        self.parse_expression();
        let end = self.index;

        let comparison = match relop.as_str() {
            "==" => Some(Instruction::Equal),
            "!=" => Some(Instruction::NotEqual),
            ">" => Some(Instruction::Greater),
            "<" => Some(Instruction::Less),
            "<=" => Some(Instruction::LessEqual),
            "=>" => Some(Instruction::GreaterEqual),
            _ => None,
        };

        if let Some(comparison) = comparison {
            self.listing.push(comparison);
        }

        let left = self.expression_type_at(left_start);
        let right = self.expression_type_at(right_start);

        if left != Type::Unknown && right != Type::Unknown && left != right {
            let special = match (left, right) {
                (Type::Boolean, Type::Integer) => self.is_literal_bool_span(right_start..end),

                (Type::Integer, Type::Boolean) => {
                    // El span izquierdo excluye al operador relacional
                    self.is_literal_bool_span(left_start..right_start.saturating_sub(1))
                }

                _ => false,
            };

            if !special {
                self.error(format!(
                    "Type mismatch: You cannot compare {left} with {right} using {relop}"
                ));
            }
        }
    }

    fn parse_relop(&mut self) {
        self.production("<Relop> -> == | != | > | < | <= | =>");

        let token = self.current();
        if token.kind == TokenKind::Operator
            && matches!(token.lexeme.as_str(), "==" | "!=" | ">" | "<" | "<=" | "=>")
        {
            self.expect(TokenKind::Operator, Some(&token.lexeme));
        } else {
            self.error("Relational operator expected");
        }
    }

    fn parse_return_stmt(&mut self) {
        self.production("<Return> -> return <Expression> ;");

        if !self.expect(TokenKind::Keyword, Some("return")) {
            return;
        }

        let expr_start = self.index;
        self.parse_expression();
        let return_type = self.expression_type_at(expr_start);

        // La función contenedora es la definición en curso más interna
        if let Some(name) = self.function_stack.last() {
            if let Some(function) = self.functions.get_mut(name) {
                function.return_type = return_type;
            }
        }

        if !self.expect(TokenKind::Separator, Some(";")) {
            self.error("Expected semicolon after return statement");
        }
    }

    fn parse_assignment(&mut self) {
        self.production("<Assign> -> <Identifier> = <Expression> ;");

        let name = self.current().lexeme;
        if !self.symbols.is_declared(&name) {
            self.error(format!("Variable '{name}' used before declaration"));
        }

        let target = self.symbols.type_of(&name).unwrap_or(Type::Unknown);

        if !self.expect(TokenKind::Identifier, None) {
            return;
        }

        if !self.expect(TokenKind::Operator, Some("=")) {
            return;
        }

        let expr_start = self.index;
        self.parse_expression();
        let span = expr_start..self.index;

        let expr = self.expression_type_at(expr_start);
        if expr != Type::Unknown
            && target != Type::Unknown
            && target != expr
            && !self.compatible(target, expr, span)
        {
            self.error(format!(
                "Type mismatch: Cannot assign {expr} value to {target} variable '{name}'"
            ));
        }

        if let Some(address) = self.symbols.address_of(&name) {
            self.listing.push(Instruction::PopMem(address));
        }

        if !self.expect(TokenKind::Separator, Some(";")) {
            self.error("Expected semicolon after assignment");
        }
    }

    fn parse_expression(&mut self) {
        self.production("<Expression> -> <Term> <ExpressionPrime>");

        self.parse_term();
        self.parse_expression_prime();
    }

    fn parse_expression_prime(&mut self) {
        self.production(
            "<ExpressionPrime> -> + <Term> <ExpressionPrime> | - <Term> <ExpressionPrime> | ε",
        );

        let token = self.current();
        if token.kind == TokenKind::Operator && matches!(token.lexeme.as_str(), "+" | "-") {
            let op = token.lexeme;
            self.expect(TokenKind::Operator, Some(&op));

            let right_start = self.index;
            let left_start = right_start.saturating_sub(2);

            self.parse_term();

            self.listing.push(if op == "+" {
                Instruction::Add
            } else {
                Instruction::Sub
            });

            let left = self.expression_type_at(left_start);
            let right = self.expression_type_at(right_start);
            if left == Type::Boolean || right == Type::Boolean {
                self.error(format!("Cannot use {op} operator with boolean operands"));
            }

            self.parse_expression_prime();
        } else {
            self.production("<ExpressionPrime> -> ε");
        }
    }

    fn parse_term(&mut self) {
        self.production("<Term> -> <Factor> <TermPrime>");

        self.parse_factor();
        self.parse_term_prime();
    }

    fn parse_term_prime(&mut self) {
        self.production(
            "<TermPrime> -> * <Factor> <TermPrime> | / <Factor> <TermPrime> | ε",
        );

        let token = self.current();
        if token.kind == TokenKind::Operator && matches!(token.lexeme.as_str(), "*" | "/") {
            let op = token.lexeme;
            self.expect(TokenKind::Operator, Some(&op));

            let right_start = self.index;
            let left_start = right_start.saturating_sub(2);

            self.parse_factor();

            self.listing.push(if op == "*" {
                Instruction::Mul
            } else {
                Instruction::Div
            });

            let left = self.expression_type_at(left_start);
            let right = self.expression_type_at(right_start);
            if left == Type::Boolean || right == Type::Boolean {
                self.error(format!("Cannot use {op} operator with boolean operands"));
            }

            self.parse_term_prime();
        } else {
            self.production("<TermPrime> -> ε");
        }
    }

    fn parse_factor(&mut self) {
        self.production("<Factor> -> <Identifier> | <Number> | ( <Expression> ) | <Function Call>");

        let token = self.current();
        match (token.kind, token.lexeme.as_str()) {
            (TokenKind::Identifier, _) => {
                let calls = self
                    .lookahead(1)
                    .map_or(false, |next| next.is_separator("("));

                if calls {
                    self.parse_function_call();
                    return;
                }

                let name = token.lexeme.clone();
                if !self.symbols.is_declared(&name) && !self.functions.contains_key(&name) {
                    self.error(format!("Variable '{name}' used before declaration"));
                } else if let Some(address) = self.symbols.address_of(&name) {
                    // Solo las globales tienen celda asignada
                    self.listing.push(Instruction::PushMem(address));
                }

                self.expect(TokenKind::Identifier, None);
            }

            (TokenKind::Integer, _) => {
                self.listing.push(Instruction::PushImm(token.lexeme.clone()));
                self.expect(TokenKind::Integer, None);
            }

            (TokenKind::Separator, "(") => {
                self.expect(TokenKind::Separator, Some("("));
                self.parse_expression();
                self.expect(TokenKind::Separator, Some(")"));
            }

            // Los literales booleanos se reducen a 1 y 0
            (TokenKind::Keyword, "true") => {
                self.listing.push(Instruction::PushImm("1".to_owned()));
                self.expect(TokenKind::Keyword, None);
            }

            (TokenKind::Keyword, "false") => {
                self.listing.push(Instruction::PushImm("0".to_owned()));
                self.expect(TokenKind::Keyword, None);
            }

            _ => {
                self.error(format!("Unexpected token in factor: {}", token.lexeme));
                self.advance();
            }
        }
    }

    fn parse_function_call(&mut self) {
        self.production("<Function Call> -> <Identifier> ( <Arguments> )");

        let name = self.current().lexeme;

        if !self.functions.contains_key(&name) {
            self.error(format!("Function '{name}' used before declaration"));

            if !self.expect(TokenKind::Identifier, None) {
                return;
            }

            if !self.expect(TokenKind::Separator, Some("(")) {
                return;
            }

            self.parse_arguments(None);
            self.expect(TokenKind::Separator, Some(")"));
            return;
        }

        let params = self.functions[&name].params.clone();

        if !self.expect(TokenKind::Identifier, None) {
            return;
        }

        if !self.expect(TokenKind::Separator, Some("(")) {
            return;
        }

        let arguments = self.parse_arguments(Some(params.len() as i32));

        if arguments.len() != params.len() {
            self.error(format!(
                "Function '{}' called with {} arguments but expects {}",
                name,
                arguments.len(),
                params.len()
            ));
        } else {
            for (position, ((argument, span), (param_name, param_type))) in
                arguments.into_iter().zip(params.iter()).enumerate()
            {
                if argument != Type::Unknown
                    && *param_type != Type::Unknown
                    && argument != *param_type
                    && !self.compatible(*param_type, argument, span)
                {
                    self.error(format!(
                        "Type mismatch in function call '{}': argument {} is {}, but parameter '{}' expects {}",
                        name,
                        position + 1,
                        argument,
                        param_name,
                        param_type
                    ));
                }
            }
        }

        self.expect(TokenKind::Separator, Some(")"));
    }

    /// Reconoce la lista de argumentos y retorna el tipo y span de
    /// cada uno. El conteo esperado, si se conoce, permite reportar
    /// faltantes en el punto exacto donde la lista se corta.
    fn parse_arguments(&mut self, expected: Option<i32>) -> Vec<(Type, Range<usize>)> {
        self.production("<Arguments> -> <Expression> <ArgumentsPrime> | ε");

        let mut arguments = Vec::new();

        if !self.current().is_separator(")") {
            let start = self.index;
            self.parse_expression();
            arguments.push((self.expression_type_at(start), start..self.index));

            arguments.extend(self.parse_arguments_prime(expected.map(|count| count - 1)));
        } else {
            self.production("<Arguments> -> ε");

            if let Some(count) = expected {
                if count > 0 {
                    self.error(format!("Expected {count} arguments but got 0"));
                }
            }
        }

        arguments
    }

    fn parse_arguments_prime(&mut self, expected: Option<i32>) -> Vec<(Type, Range<usize>)> {
        self.production("<ArgumentsPrime> -> , <Expression> <ArgumentsPrime> | ε");

        let mut arguments = Vec::new();

        if self.current().is_separator(",") {
            self.expect(TokenKind::Separator, Some(","));

            let start = self.index;
            self.parse_expression();
            arguments.push((self.expression_type_at(start), start..self.index));

            arguments.extend(self.parse_arguments_prime(expected.map(|count| count - 1)));
        } else {
            self.production("<ArgumentsPrime> -> ε");

            if let Some(count) = expected {
                if count > 0 {
                    self.error(format!("Too few arguments: expected {count} more"));
                }
            }
        }

        arguments
    }

    // ------------------------------------------------------------------
    // Tipos de expresiones

    /// Determina el tipo de la expresión que comienza en la posición
    /// dada, a partir de su primer token.
    fn expression_type_at(&self, at: usize) -> Type {
        let token = match self.tokens.get(at) {
            Some(token) => token,
            None => return Type::Unknown,
        };

        match (token.kind, token.lexeme.as_str()) {
            (TokenKind::Integer, _) => Type::Integer,

            (TokenKind::Keyword, "true" | "false") => Type::Boolean,

            (TokenKind::Identifier, _) => {
                let calls = self
                    .tokens
                    .get(at + 1)
                    .map_or(false, |next| next.is_separator("("));

                if calls {
                    self.functions
                        .get(&token.lexeme)
                        .map(|function| function.return_type)
                        .unwrap_or(Type::Unknown)
                } else {
                    self.symbols.type_of(&token.lexeme).unwrap_or(Type::Unknown)
                }
            }

            (TokenKind::Separator, "(") => self.expression_type_at(at + 1),

            _ => {
                // Con un operador aritmético más adelante, la expresión
                // terminará siendo entera
                let arithmetic = self.tokens.iter().skip(at + 1).any(|token| {
                    token.kind == TokenKind::Operator
                        && matches!(token.lexeme.as_str(), "+" | "-" | "*" | "/")
                });

                if arithmetic {
                    Type::Integer
                } else {
                    Type::Unknown
                }
            }
        }
    }

    /// Compatibilidad de asignación y de paso de argumentos.
    fn compatible(&self, target: Type, expr: Type, span: Range<usize>) -> bool {
        if target == expr {
            return true;
        }

        target == Type::Boolean && expr == Type::Integer && self.is_literal_bool_span(span)
    }

    /// Caso especial booleano: un literal entero `0` o `1` sin
    /// operadores aritméticos en su span puede ocupar el lugar de un
    /// booleano.
    fn is_literal_bool_span(&self, span: Range<usize>) -> bool {
        let literal = match self.tokens.get(span.start) {
            Some(token) if token.kind == TokenKind::Integer => {
                matches!(token.lexeme.as_str(), "0" | "1")
            }

            _ => false,
        };

        literal
            && !self.span_tokens(span).iter().any(|token| {
                token.kind == TokenKind::Operator
                    && matches!(token.lexeme.as_str(), "+" | "-" | "*" | "/")
            })
    }

    /// Tokens dentro de un rango de posiciones, recortado a la entrada.
    fn span_tokens(&self, span: Range<usize>) -> &[Token] {
        let end = span.end.min(self.tokens.len());
        let start = span.start.min(end);
        &self.tokens[start..end]
    }
}
